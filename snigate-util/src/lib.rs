// Copyright 2024-2025 Tree xie.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use base64::{engine::general_purpose::STANDARD, Engine};
use path_absolutize::*;
use snafu::Snafu;
use std::path::Path;
use substring::Substring;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("Base64 decode {source}"))]
    Base64Decode { source: base64::DecodeError },
    #[snafu(display("Invalid {message}"))]
    Invalid { message: String },
    #[snafu(display("Io error {source}, {file}"))]
    Io {
        source: std::io::Error,
        file: String,
    },
}

type Result<T, E = Error> = std::result::Result<T, E>;

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Gets the package version.
pub fn get_pkg_version() -> &'static str {
    VERSION
}

/// Resolves a path string to its absolute form.
/// A leading '~' is expanded to the user's home directory.
/// Returns an empty string if the input path is empty.
pub fn resolve_path(path: &str) -> String {
    if path.is_empty() {
        return "".to_string();
    }
    let mut p = path.to_string();
    if p.starts_with('~') {
        if let Some(home) = dirs::home_dir() {
            p = home.to_string_lossy().to_string() + p.substring(1, p.len());
        };
    }
    if let Ok(p) = Path::new(&p).absolutize() {
        p.to_string_lossy().to_string()
    } else {
        p
    }
}

/// Checks if a string looks like PEM data by its "-----" prefix.
pub fn is_pem(value: &str) -> bool {
    value.trim_start().starts_with("-----")
}

pub fn base64_encode<T: AsRef<[u8]>>(data: T) -> String {
    STANDARD.encode(data)
}

pub fn base64_decode<T: AsRef<[u8]>>(
    data: T,
) -> Result<Vec<u8>, base64::DecodeError> {
    STANDARD.decode(data)
}

/// Loads certificate or key bytes from inline PEM, a file path or
/// base64 encoded data, in that order.
///
/// The bytes are returned as they are, nothing is decoded or verified.
pub fn load_certificate_bytes(value: &str) -> Result<Vec<u8>> {
    let value = value.trim();
    if value.is_empty() {
        return Err(Error::Invalid {
            message: "certificate data is empty".to_string(),
        });
    }
    if is_pem(value) {
        return Ok(value.as_bytes().to_vec());
    }
    let file = resolve_path(value);
    if Path::new(&file).is_file() {
        return std::fs::read(&file).map_err(|e| Error::Io { source: e, file });
    }
    base64_decode(value).map_err(|e| Error::Base64Decode { source: e })
}
