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
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt::Write;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::time::Duration;

const ENV_PREFIX: &str = "CASCADE__";

pub trait ConfigLoaderConfig: Serialize + DeserializeOwned + Default {}

impl<T: Serialize + DeserializeOwned + Default> ConfigLoaderConfig for T {}

/// Layered configuration loader: compiled-in defaults, then the TOML config
/// file (if present), then `CASCADE__`-prefixed environment variables, each
/// layer overriding the previous one.
pub struct ConfigLoader<T: ConfigLoaderConfig> {
    pub config_file_name: PathBuf,
    phantom: PhantomData<T>,
}

impl<T: ConfigLoaderConfig> ConfigLoader<T> {
    pub fn new(config_file_name: &Path) -> Self {
        Self {
            config_file_name: config_file_name.to_path_buf(),
            phantom: PhantomData,
        }
    }

    pub fn figment(&self) -> Figment {
        Figment::new()
            .merge(Serialized::defaults(T::default()))
            .merge(Toml::file(&self.config_file_name))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    pub fn load(&self) -> figment::Result<T> {
        self.figment().extract()
    }

    /// Loads the configuration, or dumps the effective default configuration
    /// as TOML to stdout and returns `None` when the process was started with
    /// `--dump-config`.
    pub fn load_or_dump_config(&self) -> Option<T> {
        if std::env::args().any(|arg| arg == "--dump-config") {
            let defaults = T::default();
            match toml_string(&defaults) {
                Ok(dump) => println!("{dump}"),
                Err(err) => eprintln!("Failed to dump default config: {err}"),
            }
            None
        } else {
            match self.load() {
                Ok(config) => Some(config),
                Err(err) => {
                    eprintln!("Failed to load config: {err}");
                    None
                }
            }
        }
    }
}

fn toml_string<T: Serialize>(value: &T) -> Result<String, String> {
    // figment has no TOML emitter; go through serde_json's object model
    let json = serde_json::to_value(value).map_err(|err| err.to_string())?;
    render_toml_table(&json, "")
}

fn render_toml_table(value: &serde_json::Value, prefix: &str) -> Result<String, String> {
    let mut scalars = String::new();
    let mut tables = String::new();
    match value {
        serde_json::Value::Object(map) => {
            for (key, val) in map {
                match val {
                    serde_json::Value::Object(_) => {
                        let child_prefix = if prefix.is_empty() {
                            key.clone()
                        } else {
                            format!("{prefix}.{key}")
                        };
                        let _ = writeln!(&mut tables, "\n[{child_prefix}]");
                        tables.push_str(&render_toml_table(val, &child_prefix)?);
                    }
                    other => {
                        let _ = writeln!(&mut scalars, "{key} = {other}");
                    }
                }
            }
            Ok(format!("{scalars}{tables}"))
        }
        other => Err(format!("expected a table, got: {other}")),
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    pub max_attempts: u32,
    #[serde(with = "humantime_serde")]
    pub min_delay: Duration,
    #[serde(with = "humantime_serde")]
    pub max_delay: Duration,
    pub multiplier: f64,
    pub max_jitter_factor: Option<f64>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::max_attempts_3()
    }
}

impl RetryConfig {
    pub fn max_attempts_3() -> Self {
        Self {
            max_attempts: 3,
            min_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(2),
            multiplier: 2.0,
            max_jitter_factor: Some(0.15),
        }
    }

    pub fn max_attempts_5() -> Self {
        Self {
            max_attempts: 5,
            min_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(2),
            multiplier: 2.0,
            max_jitter_factor: Some(0.15),
        }
    }

    pub fn no_retries() -> Self {
        Self {
            max_attempts: 1,
            min_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            multiplier: 1.0,
            max_jitter_factor: None,
        }
    }
}

impl SafeDisplay for RetryConfig {
    fn to_safe_string(&self) -> String {
        let mut result = String::new();
        let _ = writeln!(&mut result, "max attempts: {}", self.max_attempts);
        let _ = writeln!(&mut result, "min delay: {:?}", self.min_delay);
        let _ = writeln!(&mut result, "max delay: {:?}", self.max_delay);
        let _ = writeln!(&mut result, "multiplier: {}", self.multiplier);
        result
    }
}

/// Address of a remote Cascade service (another cluster's frontend) together
/// with the retry policy used when calling it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RemoteServiceConfig {
    pub host: String,
    pub port: u16,
    pub retries: RetryConfig,
}

impl RemoteServiceConfig {
    pub fn url(&self) -> url::Url {
        url::Url::parse(&format!("http://{}:{}", self.host, self.port))
            .expect("Failed to parse remote service URL")
    }
}

impl Default for RemoteServiceConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 8080,
            retries: RetryConfig::default(),
        }
    }
}

impl SafeDisplay for RemoteServiceConfig {
    fn to_safe_string(&self) -> String {
        let mut result = String::new();
        let _ = writeln!(&mut result, "host: {}", self.host);
        let _ = writeln!(&mut result, "port: {}", self.port);
        let _ = writeln!(&mut result, "retries:");
        let _ = writeln!(&mut result, "{}", self.retries.to_safe_string_indented());
        result
    }
}

#[cfg(test)]
mod tests {
    use test_r::test;

    use super::*;

    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    struct TestConfig {
        name: String,
        port: u16,
        retries: RetryConfig,
    }

    impl Default for TestConfig {
        fn default() -> Self {
            Self {
                name: "default".to_string(),
                port: 9090,
                retries: RetryConfig::default(),
            }
        }
    }

    #[test]
    fn defaults_are_loaded_when_no_file_exists() {
        let loader: ConfigLoader<TestConfig> =
            ConfigLoader::new(Path::new("/nonexistent/config.toml"));
        let config = loader.load().expect("Failed to load config");
        assert_eq!(config, TestConfig::default());
    }

    #[test]
    fn default_config_is_dumpable() {
        let dump = toml_string(&TestConfig::default()).expect("Failed to dump config");
        assert!(dump.contains("port = 9090"));
        assert!(dump.contains("[retries]"));
    }
}
