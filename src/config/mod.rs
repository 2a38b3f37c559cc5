use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub database: DatabaseConfig,
    pub security: SecurityConfig,
    pub registration: RegistrationConfig,
    pub notes: NotesConfig,
    pub uploads: UploadConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub max_connections: u32,
    pub connection_timeout: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub enable_cors: bool,
    pub cors_origins: Vec<String>,
    #[serde(skip_serializing)]
    pub jwt_secret: String,
    pub jwt_expiry_hours: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrationConfig {
    pub code_ttl_secs: u64,
    pub code_length: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotesConfig {
    pub undelete_window_hours: u64,
    pub search_limit: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    pub dir: String,
    pub max_bytes: usize,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Set defaults based on environment, then override with specific env vars
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        // Database overrides
        if let Ok(v) = env::var("DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = v.parse().unwrap_or(self.database.max_connections);
        }
        if let Ok(v) = env::var("DATABASE_CONNECTION_TIMEOUT") {
            self.database.connection_timeout = v.parse().unwrap_or(self.database.connection_timeout);
        }

        // Security overrides
        if let Ok(v) = env::var("SECURITY_ENABLE_CORS") {
            self.security.enable_cors = v.parse().unwrap_or(self.security.enable_cors);
        }
        if let Ok(v) = env::var("SECURITY_CORS_ORIGINS") {
            self.security.cors_origins = v.split(',').map(|s| s.trim().to_string()).collect();
        }
        if let Ok(v) = env::var("JWT_SECRET") {
            self.security.jwt_secret = v;
        }
        if let Ok(v) = env::var("SECURITY_JWT_EXPIRY_HOURS") {
            self.security.jwt_expiry_hours = v.parse().unwrap_or(self.security.jwt_expiry_hours);
        }

        // Registration overrides
        if let Ok(v) = env::var("REGISTRATION_CODE_TTL_SECS") {
            self.registration.code_ttl_secs = v.parse().unwrap_or(self.registration.code_ttl_secs);
        }

        // Notes overrides
        if let Ok(v) = env::var("NOTES_UNDELETE_WINDOW_HOURS") {
            self.notes.undelete_window_hours = v.parse().unwrap_or(self.notes.undelete_window_hours);
        }
        if let Ok(v) = env::var("NOTES_SEARCH_LIMIT") {
            self.notes.search_limit = v.parse().unwrap_or(self.notes.search_limit);
        }

        // Upload overrides
        if let Ok(v) = env::var("UPLOADS_DIR") {
            self.uploads.dir = v;
        }
        if let Ok(v) = env::var("UPLOADS_MAX_BYTES") {
            self.uploads.max_bytes = v.parse().unwrap_or(self.uploads.max_bytes);
        }

        self
    }

    pub fn development() -> Self {
        Self {
            environment: Environment::Development,
            database: DatabaseConfig {
                max_connections: 10,
                connection_timeout: 30,
            },
            security: SecurityConfig {
                enable_cors: true,
                cors_origins: vec!["*".to_string()],
                jwt_secret: "development-only-secret".to_string(),
                jwt_expiry_hours: 24 * 7, // 1 week
            },
            registration: RegistrationConfig {
                code_ttl_secs: 10 * 60,
                code_length: 6,
            },
            notes: NotesConfig {
                undelete_window_hours: 24 * 30,
                search_limit: 500,
            },
            uploads: UploadConfig {
                dir: "./uploads".to_string(),
                max_bytes: 10 * 1024 * 1024, // 10MB
            },
        }
    }

    pub fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            database: DatabaseConfig {
                max_connections: 20,
                connection_timeout: 10,
            },
            security: SecurityConfig {
                enable_cors: true,
                cors_origins: vec!["https://staging.example.com".to_string()],
                jwt_secret: String::new(),
                jwt_expiry_hours: 24,
            },
            registration: RegistrationConfig {
                code_ttl_secs: 10 * 60,
                code_length: 6,
            },
            notes: NotesConfig {
                undelete_window_hours: 24 * 14,
                search_limit: 200,
            },
            uploads: UploadConfig {
                dir: "./uploads".to_string(),
                max_bytes: 5 * 1024 * 1024, // 5MB
            },
        }
    }

    pub fn production() -> Self {
        Self {
            environment: Environment::Production,
            database: DatabaseConfig {
                max_connections: 50,
                connection_timeout: 5,
            },
            security: SecurityConfig {
                enable_cors: true,
                cors_origins: vec!["https://app.example.com".to_string()],
                jwt_secret: String::new(),
                jwt_expiry_hours: 24 * 7,
            },
            registration: RegistrationConfig {
                code_ttl_secs: 10 * 60,
                code_length: 6,
            },
            notes: NotesConfig {
                undelete_window_hours: 24 * 7,
                search_limit: 100,
            },
            uploads: UploadConfig {
                dir: "/var/lib/family-notes/uploads".to_string(),
                max_bytes: 2 * 1024 * 1024, // 2MB
            },
        }
    }
}

// Global singleton config - initialized once at startup
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);

// Convenience function for accessing config
pub fn config() -> &'static AppConfig {
    &CONFIG
}

#[macro_export]
macro_rules! is_production {
    () => {
        matches!($crate::config::CONFIG.environment, $crate::config::Environment::Production)
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_development_config() {
        let config = AppConfig::development();
        assert!(!config.security.jwt_secret.is_empty());
        assert_eq!(config.registration.code_length, 6);
        assert_eq!(config.registration.code_ttl_secs, 600);
    }

    #[test]
    fn test_default_production_config() {
        let config = AppConfig::production();
        // Production must be given a secret through JWT_SECRET
        assert!(config.security.jwt_secret.is_empty());
        assert_eq!(config.uploads.max_bytes, 2 * 1024 * 1024);
        assert!(config.notes.search_limit <= 100);
    }

    #[test]
    fn test_jwt_secret_is_not_serialized() {
        let value = serde_json::to_value(AppConfig::development()).unwrap();
        assert!(value["security"].get("jwt_secret").is_none());
    }
}
