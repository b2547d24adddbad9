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

mod applier;
mod provider;
mod signal;

pub use applier::ConfigApplier;
pub use provider::{
    ConfigMessage, FileProvider, Provider, ProviderAggregator,
};
pub use signal::ShutdownSignal;

pub static LOG_TARGET: &str = "snigate::provider";

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("Config error {source}"))]
    Config { source: snigate_config::Error },
    #[snafu(display("Invalid error {message}"))]
    Invalid { message: String },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
