//! Configuration management

use std::path::Path;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub app: AppSettings,
    pub database: DatabaseSettings,
    pub redis: RedisSettings,
    pub jwt: JwtSettings,
    pub tenancy: TenancySettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppSettings {
    pub env: String,
    pub host: String,
    pub port: u16,
    pub name: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseSettings {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub run_migrations: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RedisSettings {
    /// When disabled the API rate counter lives in process memory.
    pub enabled: bool,
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct JwtSettings {
    pub secret: String,
    pub access_token_expiry: i64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TenancySettings {
    /// Connection target template; `{tenant_id}` is replaced on signup.
    pub connection_template: String,
    pub default_subscription_months: u32,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(Path::new("."))
    }

    /// Load `config/default` and `config/{APP_ENV}` below `base_dir`, then
    /// overlay environment variables (`DATABASE__URL`, `JWT__SECRET`, ...).
    pub fn load_from(base_dir: &Path) -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".into());
        let default_file = base_dir.join("config").join("default");
        let env_file = base_dir.join("config").join(&env);

        let config = Config::builder()
            .set_default("app.env", env.clone())?
            .set_default("app.host", "127.0.0.1")?
            .set_default("app.port", 8080)?
            .set_default("app.name", "stockhub-server")?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 1)?
            .set_default("database.run_migrations", true)?
            .set_default("redis.enabled", false)?
            .set_default("redis.url", "redis://127.0.0.1:6379")?
            .set_default("redis.max_connections", 16)?
            .set_default("jwt.access_token_expiry", 3600)?
            .set_default(
                "tenancy.connection_template",
                "postgres://localhost/stockhub_{tenant_id}",
            )?
            .set_default("tenancy.default_subscription_months", 1)?
            .add_source(File::from(default_file).required(false))
            .add_source(File::from(env_file).required(false))
            .add_source(Environment::default().separator("__").try_parsing(true))
            .build()?;
        config.try_deserialize()
    }
}
