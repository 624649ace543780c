//
// Copyright © 2025 Hardcore Engineering Inc.
//
// Licensed under the Eclipse Public License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License. You may
// obtain a copy of the License at https://www.eclipse.org/legal/epl-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
//
// See the License for the specific language governing permissions and
// limitations under the License.
//

use derive_builder::Builder;
use secrecy::SecretString;
use serde::Deserialize;
use serde_with::{DisplayFromStr, DurationMilliSeconds, DurationSeconds, serde_as};
use std::time::Duration;
use url::Url;

const DEFAULT_API_BASE: &str = "http://localhost:8080/api/v6/";

#[serde_as]
#[derive(Deserialize, Debug, Clone, Builder)]
#[builder(default)]
pub struct Config {
    #[builder(setter(into))]
    pub api_base: Url,

    #[serde(default)]
    #[builder(setter(into, strip_option))]
    pub token: Option<SecretString>,

    /// Messages retained per channel, `0` disables retention
    #[serde(default = "default_message_cache_max_size")]
    pub message_cache_max_size: usize,

    #[serde(default = "default_typing_refresh_interval")]
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub typing_refresh_interval: Duration,

    #[serde(default)]
    pub disable_everyone: bool,

    #[serde(default = "default_retry_total_duration")]
    #[serde_as(as = "DurationSeconds<u64>")]
    pub retry_total_duration: Duration,

    #[serde(default = "default_log")]
    #[serde_as(as = "DisplayFromStr")]
    pub log: tracing::Level,
}

fn default_message_cache_max_size() -> usize {
    200
}

fn default_typing_refresh_interval() -> Duration {
    Duration::from_millis(9000)
}

fn default_retry_total_duration() -> Duration {
    Duration::from_secs(30)
}

fn default_log() -> tracing::Level {
    tracing::Level::INFO
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base: Url::parse(DEFAULT_API_BASE).expect("default api base is a valid url"),
            token: None,
            message_cache_max_size: default_message_cache_max_size(),
            typing_refresh_interval: default_typing_refresh_interval(),
            disable_everyone: false,
            retry_total_duration: default_retry_total_duration(),
            log: default_log(),
        }
    }
}

impl Config {
    pub fn from_env() -> crate::Result<Self> {
        let config = config::Config::builder()
            .set_default("api_base", DEFAULT_API_BASE)?
            .add_source(config::Environment::with_prefix("CHATRS").try_parsing(true))
            .build()
            .and_then(|c| c.try_deserialize::<Config>())?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn test_builder_keeps_defaults() {
        let config = ConfigBuilder::default()
            .token(String::from("t0ken"))
            .message_cache_max_size(5usize)
            .build()
            .unwrap();

        assert_eq!(config.message_cache_max_size, 5);
        assert_eq!(config.typing_refresh_interval, Duration::from_secs(9));
        assert_eq!(config.api_base.as_str(), DEFAULT_API_BASE);
        assert_eq!(config.token.unwrap().expose_secret(), "t0ken");
    }

    #[test]
    fn test_deserialize_with_defaults() -> anyhow::Result<()> {
        let config: Config = serde_json::from_value(serde_json::json!({
            "api_base": "https://chat.example.com/api/v6/",
            "typing_refresh_interval": 2500,
            "log": "debug",
        }))?;

        assert_eq!(config.typing_refresh_interval, Duration::from_millis(2500));
        assert_eq!(config.log, tracing::Level::DEBUG);
        assert_eq!(config.message_cache_max_size, 200);
        assert!(!config.disable_everyone);
        assert!(config.token.is_none());

        Ok(())
    }
    #[test]
    fn test_from_env() -> anyhow::Result<()> {
        let vars = [
            ("CHATRS_API_BASE", "https://chat.example.com/api/v6/"),
            ("CHATRS_TOKEN", "env-t0ken"),
            ("CHATRS_MESSAGE_CACHE_MAX_SIZE", "42"),
            ("CHATRS_TYPING_REFRESH_INTERVAL", "2500"),
            ("CHATRS_DISABLE_EVERYONE", "true"),
            ("CHATRS_LOG", "debug"),
        ];

        // Only this test touches CHATRS_* variables
        for (name, value) in vars {
            unsafe { std::env::set_var(name, value) };
        }

        let config = Config::from_env();

        unsafe { std::env::set_var("CHATRS_API_BASE", "not a url") };
        let invalid = Config::from_env();

        for (name, _) in vars {
            unsafe { std::env::remove_var(name) };
        }

        let config = config?;
        assert_eq!(config.api_base.as_str(), "https://chat.example.com/api/v6/");
        assert_eq!(config.token.unwrap().expose_secret(), "env-t0ken");
        assert_eq!(config.message_cache_max_size, 42);
        assert_eq!(config.typing_refresh_interval, Duration::from_millis(2500));
        assert!(config.disable_everyone);
        assert_eq!(config.log, tracing::Level::DEBUG);
        assert_eq!(config.retry_total_duration, Duration::from_secs(30));

        assert!(matches!(invalid, Err(crate::Error::Config(_))));

        Ok(())
    }
}
