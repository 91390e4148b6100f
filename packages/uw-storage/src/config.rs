//! Environment-driven configuration. No other configuration mechanism is
//! permitted; every field has a documented default.

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    pub password: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout: Duration,
    pub idle_timeout: Duration,
    pub max_lifetime: Duration,
}

impl DatabaseConfig {
    /// Defaults match a local development database out of the box.
    pub fn from_env() -> Self {
        Self {
            host: env_or("POSTGRES_HOST", "localhost"),
            port: env_or("POSTGRES_PORT", "5432").parse().unwrap_or(5432),
            database: env_or("POSTGRES_DB", "aura_underwriting"),
            user: env_or("POSTGRES_USER", "aura_user"),
            password: env_or("POSTGRES_PASSWORD", "aura_password"),
            max_connections: env_or("POSTGRES_MAX_CONNECTIONS", "20").parse().unwrap_or(20),
            min_connections: env_or("POSTGRES_MIN_CONNECTIONS", "2").parse().unwrap_or(2),
            acquire_timeout: Duration::from_secs(3),
            idle_timeout: Duration::from_secs(600),
            max_lifetime: Duration::from_secs(1800),
        }
    }

    pub fn connection_string(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.user, self.password, self.host, self.port, self.database
        )
    }
}

#[derive(Debug, Clone)]
pub struct BrokerConfig {
    pub emulator_host: Option<String>,
    pub project_id: String,
    pub ack_deadline_seconds: u32,
}

impl BrokerConfig {
    pub fn from_env() -> Self {
        Self {
            emulator_host: std::env::var("PUBSUB_EMULATOR_HOST").ok(),
            project_id: env_or("PUBSUB_PROJECT_ID", "aura-underwriting-local"),
            ack_deadline_seconds: env_or("PUBSUB_ACK_DEADLINE_SECONDS", "60").parse().unwrap_or(60),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExecutionConfig {
    pub worker_pool_size: usize,
}

impl ExecutionConfig {
    pub fn from_env() -> Self {
        Self {
            worker_pool_size: env_or("WORKER_POOL_SIZE", "5").parse().unwrap_or(5),
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn database_config_defaults_match_local_development_values() {
        std::env::remove_var("POSTGRES_HOST");
        let cfg = DatabaseConfig::from_env();
        assert_eq!(cfg.host, "localhost");
        assert_eq!(cfg.port, 5432);
        assert_eq!(cfg.database, "aura_underwriting");
    }

    #[test]
    fn execution_config_default_worker_pool_is_five() {
        std::env::remove_var("WORKER_POOL_SIZE");
        assert_eq!(ExecutionConfig::from_env().worker_pool_size, 5);
    }
}
