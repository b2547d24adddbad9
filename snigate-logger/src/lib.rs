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

use snafu::{ResultExt, Snafu};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::filter::Directive;
use tracing_subscriber::EnvFilter;

const LOG_TARGET: &str = "snigate::logger";
const MIN_BUFFERED_LINES: usize = 16;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("IO error {source}"))]
    Io { source: std::io::Error },
    #[snafu(display("Invalid {message}"))]
    Invalid { message: String },
}

type Result<T, E = Error> = std::result::Result<T, E>;

/// Builds an env filter from comma separated directives,
/// e.g. `info,snigate::certificate=debug`. Invalid directives are skipped.
pub fn new_env_filter(level: &str) -> EnvFilter {
    let mut initial_filter = EnvFilter::from_default_env();
    for item in level.split(',').filter(|item| !item.trim().is_empty()) {
        match item.trim().parse::<Directive>() {
            Ok(directive) => {
                initial_filter = initial_filter.add_directive(directive);
            },
            Err(e) => {
                error!(
                    target: LOG_TARGET,
                    error = e.to_string(),
                    "parse directive fail"
                );
            },
        };
    }
    initial_filter
}

/// Parameters for logger configuration
#[derive(Default, Debug)]
pub struct LoggerParams {
    /// Log file, `path?rolling=hourly` selects the rolling period,
    /// empty means stdout
    pub log: String,
    pub level: String,
    pub capacity: u64,
    pub json: bool,
}

#[derive(Debug, PartialEq)]
struct FileLog {
    dir: PathBuf,
    filename: String,
    rolling: String,
}

fn parse_file_log(log: &str) -> Result<FileLog> {
    let (file, query) = log.split_once('?').unwrap_or((log, ""));
    let rolling = query
        .split('&')
        .filter_map(|item| item.split_once('='))
        .find(|(key, _)| *key == "rolling")
        .map(|(_, value)| value.to_string())
        .unwrap_or_default();

    let file = snigate_util::resolve_path(file);
    let filepath = Path::new(&file);
    if filepath.is_dir() {
        return Ok(FileLog {
            dir: filepath.to_path_buf(),
            filename: "snigate.log".to_string(),
            rolling,
        });
    }
    let dir = filepath.parent().ok_or_else(|| Error::Invalid {
        message: "parent of file log is invalid".to_string(),
    })?;
    let filename = filepath
        .file_name()
        .ok_or_else(|| Error::Invalid {
            message: "file log is invalid".to_string(),
        })?
        .to_string_lossy()
        .to_string();
    Ok(FileLog {
        dir: dir.to_path_buf(),
        filename,
        rolling,
    })
}

/// Initializes the global tracing subscriber.
///
/// Logs are written through a non blocking writer, the returned guard
/// flushes it on drop and must be held for the process lifetime.
pub fn logger_try_init(params: LoggerParams) -> Result<WorkerGuard> {
    let level = if params.level.is_empty() {
        "info".to_string()
    } else {
        params.level.clone()
    };

    let mut builder =
        tracing_appender::non_blocking::NonBlockingBuilder::default()
            .thread_name("snigate-logger");
    builder = builder.buffered_lines_limit(
        (params.capacity as usize).max(MIN_BUFFERED_LINES),
    );
    let mut log_type = "stdio";
    let (writer, guard) = if params.log.is_empty() {
        builder.finish(std::io::stdout())
    } else {
        let file_log = parse_file_log(&params.log)?;
        fs::create_dir_all(&file_log.dir).context(IoSnafu)?;
        log_type = "file";
        let dir = file_log.dir;
        let filename = file_log.filename;
        let file_appender = match file_log.rolling.as_str() {
            "minutely" => tracing_appender::rolling::minutely(dir, filename),
            "hourly" => tracing_appender::rolling::hourly(dir, filename),
            "never" => tracing_appender::rolling::never(dir, filename),
            _ => tracing_appender::rolling::daily(dir, filename),
        };
        builder.finish(file_appender)
    };

    let seconds = chrono::Local::now().offset().local_minus_utc();
    let hours = (seconds / 3600) as i8;
    let minutes = ((seconds % 3600) / 60) as i8;
    let offset = time::UtcOffset::from_hms(hours, minutes, 0)
        .unwrap_or(time::UtcOffset::UTC);
    let is_dev = cfg!(debug_assertions);

    let builder = tracing_subscriber::fmt()
        .with_env_filter(new_env_filter(&level))
        .with_ansi(is_dev && params.log.is_empty())
        .with_timer(tracing_subscriber::fmt::time::OffsetTime::new(
            offset,
            time::format_description::well_known::Rfc3339,
        ))
        .with_target(true)
        .with_writer(writer);
    let result = if params.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    result.map_err(|e| Error::Invalid {
        message: e.to_string(),
    })?;

    info!(
        target: LOG_TARGET,
        capacity = params.capacity,
        log_type,
        level,
        json_format = params.json,
        utc_offset = chrono::Local::now().offset().to_string(),
        "init tracing subscriber success",
    );

    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_new_env_filter() {
        let filter = new_env_filter("info,snigate::certificate=debug");
        let value = filter.to_string();
        assert_eq!(true, value.contains("snigate::certificate=debug"));
        assert_eq!(true, value.contains("info"));

        // the invalid directive is skipped
        let filter = new_env_filter("warn,snigate=[");
        assert_eq!(true, filter.to_string().contains("warn"));
    }

    #[test]
    fn test_parse_file_log() {
        let dir = tempfile::tempdir().unwrap();
        let dir_path = dir.path().to_path_buf();

        let file_log =
            parse_file_log(&dir_path.to_string_lossy()).unwrap();
        assert_eq!(
            FileLog {
                dir: dir_path.clone(),
                filename: "snigate.log".to_string(),
                rolling: "".to_string(),
            },
            file_log
        );

        let log = format!(
            "{}/logs/access.log?rolling=hourly",
            dir_path.to_string_lossy()
        );
        let file_log = parse_file_log(&log).unwrap();
        assert_eq!(
            FileLog {
                dir: dir_path.join("logs"),
                filename: "access.log".to_string(),
                rolling: "hourly".to_string(),
            },
            file_log
        );
    }
}
