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

use snafu::Snafu;
use std::time::{SystemTime, UNIX_EPOCH};

mod service;

pub static LOG_TARGET: &str = "snigate::core";

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("invalid error, {message}"))]
    Invalid { message: String },
}

/// Returns the current unix timestamp in seconds.
#[inline]
pub fn now_sec() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

pub use service::*;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_now_sec() {
        assert!(now_sec() > 1_700_000_000);
    }

    #[test]
    fn test_error_display() {
        let err = Error::Invalid {
            message: "bad input".to_string(),
        };
        assert_eq!("invalid error, bad input", err.to_string());
    }
}
