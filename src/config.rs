//! Configuration management for the StudyVault server

use rand::RngCore;
use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub jwt_audience: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 3000,
            },
            database: DatabaseConfig {
                url: "sqlite:./studyvault.db".to_string(),
            },
            auth: AuthConfig {
                jwt_secret: generated_secret(),
                jwt_audience: "authenticated".to_string(),
            },
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Config {
            server: ServerConfig {
                host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: env::var("SERVER_PORT")
                    .unwrap_or_else(|_| "3000".to_string())
                    .parse()
                    .unwrap_or(3000),
            },
            database: DatabaseConfig {
                url: env::var("DATABASE_URL")
                    .unwrap_or_else(|_| "sqlite:./studyvault.db".to_string()),
            },
            auth: AuthConfig {
                jwt_secret: env::var("JWT_SECRET").unwrap_or_else(|_| generated_secret()),
                jwt_audience: env::var("JWT_AUDIENCE")
                    .unwrap_or_else(|_| "authenticated".to_string()),
            },
        }
    }
}

/// Random per-process secret for when JWT_SECRET is unset. Tokens signed
/// against it become invalid on restart.
fn generated_secret() -> String {
    let mut key_bytes = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut key_bytes);
    tracing::warn!(
        "JWT_SECRET is not set; generated a random secret for this session. \
         All tokens will be invalid after restart."
    );
    hex::encode(key_bytes)
}
