use std::sync::OnceLock;

use figment::Figment;
use figment::providers::{Env, Format, Toml};
use serde::Deserialize;

mod log_config;
pub use log_config::LogConfig;

pub static CONFIG: OnceLock<ServerConfig> = OnceLock::new();

pub fn init() {
    let raw_config = Figment::new()
        .merge(Toml::file(
            Env::var("APP_CONFIG").as_deref().unwrap_or("config.toml"),
        ))
        .merge(Env::prefixed("APP_").global());

    let config = match raw_config.extract::<ServerConfig>() {
        Ok(s) => s,
        Err(e) => {
            eprintln!("It looks like your config is invalid. The following error occurred: {e}");
            std::process::exit(1);
        }
    };
    crate::config::CONFIG
        .set(config)
        .expect("config should be set");
}

pub fn get() -> &'static ServerConfig {
    CONFIG.get().expect("config should be set")
}

#[derive(Deserialize, Clone, Debug)]
pub struct ServerConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_listen_port")]
    pub listen_port: u16,
    /// Origin header required on the websocket handshake. `None` means any
    /// origin is accepted, acceptable only for local development.
    pub allowed_origin: Option<String>,
    #[serde(default)]
    pub log: LogConfig,
}

fn default_bind_address() -> String {
    "0.0.0.0".into()
}

fn default_listen_port() -> u16 {
    8080
}

#[cfg(test)]
pub fn ensure_init_for_test() {
    CONFIG.get_or_init(|| ServerConfig {
        bind_address: default_bind_address(),
        listen_port: default_listen_port(),
        allowed_origin: None,
        log: LogConfig::default(),
    });
}
