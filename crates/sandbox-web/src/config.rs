use sandbox_container::ContainerConfig;
use std::env;

/// Process-wide configuration, built once at startup from environment
/// variables. A parsing failure here is fatal — this is the one place an
/// unrecoverable error before the server starts is acceptable.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub sandbox_image: String,
    pub bind_addr: String,
    pub ide_api_base: String,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            database_url: env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://sandbox.db".to_string()),
            sandbox_image: env::var("SANDBOX_IMAGE").unwrap_or_else(|_| "sandbox-terminal:latest".to_string()),
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8000".to_string()),
            ide_api_base: env::var("IDE_API_BASE").unwrap_or_else(|_| "http://host.docker.internal:8000".to_string()),
        }
    }

    pub fn container_config(&self) -> ContainerConfig {
        ContainerConfig {
            image: self.sandbox_image.clone(),
            ide_api_base: self.ide_api_base.clone(),
            ..ContainerConfig::default()
        }
    }
}
