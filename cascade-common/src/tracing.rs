// Copyright 2024-2025 Golem Cloud
//
// Licensed under the Golem Source License v1.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://license.golem.cloud/LICENSE
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use crate::SafeDisplay;
use serde::{Deserialize, Serialize};
use std::fmt::Write;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TracingConfig {
    pub service_name: String,
    /// Emit one-line JSON log records instead of the human readable format
    pub json: bool,
    pub ansi: bool,
    /// Overrides RUST_LOG; standard env-filter syntax
    pub directives: Option<String>,
    pub span_events: bool,
}

impl TracingConfig {
    pub fn local_dev(service_name: &str) -> Self {
        Self {
            service_name: service_name.to_string(),
            json: false,
            ansi: true,
            directives: None,
            span_events: false,
        }
    }

    pub fn deployment(service_name: &str) -> Self {
        Self {
            service_name: service_name.to_string(),
            json: true,
            ansi: false,
            directives: None,
            span_events: false,
        }
    }
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self::local_dev("cascade")
    }
}

impl SafeDisplay for TracingConfig {
    fn to_safe_string(&self) -> String {
        let mut result = String::new();
        let _ = writeln!(&mut result, "service name: {}", self.service_name);
        let _ = writeln!(&mut result, "json: {}", self.json);
        let _ = writeln!(
            &mut result,
            "directives: {}",
            self.directives.as_deref().unwrap_or("-")
        );
        result
    }
}

pub fn init_tracing(config: &TracingConfig) {
    let filter = match &config.directives {
        Some(directives) => EnvFilter::try_new(directives)
            .unwrap_or_else(|_| EnvFilter::new("info")),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };

    let span_events = if config.span_events {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_span_events(span_events)
        .with_ansi(config.ansi);

    if config.json {
        let _ = builder.json().try_init();
    } else {
        let _ = builder.try_init();
    }
}

pub fn init_tracing_with_default_debug_env_filter(config: &TracingConfig) {
    let mut config = config.clone();
    if config.directives.is_none() {
        config.directives = Some("debug".to_string());
    }
    init_tracing(&config);
}
