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

use glob::glob;
use snafu::Snafu;
use std::path::Path;
use tokio::fs;
use tracing::debug;

mod common;

pub use common::*;

pub static LOG_TARGET: &str = "snigate::config";

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("Invalid error {message}"))]
    Invalid { message: String },
    #[snafu(display("Glob pattern error {source}, {path}"))]
    Pattern {
        source: glob::PatternError,
        path: String,
    },
    #[snafu(display("Glob error {source}"))]
    Glob { source: glob::GlobError },
    #[snafu(display("Io error {source}, {file}"))]
    Io {
        source: std::io::Error,
        file: String,
    },
    #[snafu(display("Toml de error {source}"))]
    De { source: toml::de::Error },
}
type Result<T, E = Error> = std::result::Result<T, E>;

/// Reads every `*.toml` file below `dir` and joins them with newlines,
/// sorted by path so the result does not depend on directory order.
pub async fn read_all_toml_files(dir: &str) -> Result<Vec<u8>> {
    let mut files = vec![];
    for entry in
        glob(&format!("{dir}/**/*.toml")).map_err(|e| Error::Pattern {
            source: e,
            path: dir.to_string(),
        })?
    {
        files.push(entry.map_err(|e| Error::Glob { source: e })?);
    }
    files.sort();

    let mut data = vec![];
    for f in files {
        let mut buf = fs::read(&f).await.map_err(|e| Error::Io {
            source: e,
            file: f.to_string_lossy().to_string(),
        })?;
        debug!(
            target: LOG_TARGET,
            filename = format!("{f:?}"),
            "read toml file"
        );
        data.append(&mut buf);
        data.push(0x0a);
    }
    Ok(data)
}

/// Reads raw toml from a file or from all toml files of a directory.
pub async fn read_toml(path: &str) -> Result<String> {
    let target = Path::new(path);
    let data = if target.is_dir() {
        read_all_toml_files(path).await?
    } else {
        fs::read(target).await.map_err(|e| Error::Io {
            source: e,
            file: path.to_string(),
        })?
    };
    Ok(String::from_utf8_lossy(&data).trim().to_string())
}

/// Loads and validates the configuration from a file or directory.
pub async fn load_config(path: &str) -> Result<SnigateConf> {
    let data = read_toml(path).await?;
    let conf = SnigateConf::from_toml(&data)?;
    conf.validate()?;
    Ok(conf)
}
