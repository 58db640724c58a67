use std::time::Duration;

use anyhow::Result;
use figment::providers::{Env, Format, Toml};
use figment::Figment;
use serde::Deserialize;

pub static CONFIG_FILE: &str = "config.toml";

#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub discord_token: String,
    #[serde(default = "default_prefix")]
    pub prefix: String,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_quality")]
    pub quality: u32,
    #[serde(default = "default_timeout_secs")]
    pub expand_timeout_secs: u64,
    #[serde(default = "default_timeout_secs")]
    pub api_timeout_secs: u64,
    #[serde(default = "default_upload_limit")]
    pub upload_limit_bytes: u64,
    #[serde(default)]
    pub dump_messages: bool,
}

fn default_prefix() -> String {
    "~".into()
}

fn default_api_base() -> String {
    "http://114.134.188.188:3003".into()
}

fn default_quality() -> u32 {
    80
}

fn default_timeout_secs() -> u64 {
    20
}

// Discord's upload cap for unboosted servers
fn default_upload_limit() -> u64 {
    8 * 1024 * 1024
}

impl Config {
    pub fn get_config() -> Result<Self> {
        Ok(Figment::new()
            .merge(Toml::file(CONFIG_FILE))
            .merge(Env::prefixed("BILIBOT_"))
            .extract()?)
    }

    pub fn expand_timeout(&self) -> Duration {
        Duration::from_secs(self.expand_timeout_secs)
    }

    pub fn api_timeout(&self) -> Duration {
        Duration::from_secs(self.api_timeout_secs)
    }
}
