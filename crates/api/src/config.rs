//! Process configuration, read once from the environment at startup.

use std::net::SocketAddr;

use thiserror::Error;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
pub const DEFAULT_PAYMENT_LINK_BASE: &str = "https://payment.example.com/pay";
pub const DEFAULT_DB_MAX_CONNECTIONS: u32 = 10;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("JWT_SECRET must be set to a non-empty value")]
    MissingJwtSecret,

    #[error("invalid {key}: {value}")]
    Invalid { key: &'static str, value: String },

    #[error("BOOTSTRAP_ADMIN_USERNAME and BOOTSTRAP_ADMIN_PASSWORD must be set together")]
    IncompleteBootstrapAdmin,
}

/// Administrator created (if missing) and granted `admin` at startup.
#[derive(Clone, PartialEq, Eq)]
pub struct BootstrapAdmin {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for BootstrapAdmin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BootstrapAdmin")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub jwt_secret: String,
    /// Postgres when set, in-memory store otherwise.
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub bind_addr: SocketAddr,
    pub payment_link_base: String,
    pub bootstrap_admin: Option<BootstrapAdmin>,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("jwt_secret", &"<redacted>")
            .field("database_url", &self.database_url.as_ref().map(|_| "<set>"))
            .field("database_max_connections", &self.database_max_connections)
            .field("bind_addr", &self.bind_addr)
            .field("payment_link_base", &self.payment_link_base)
            .field("bootstrap_admin", &self.bootstrap_admin)
            .finish()
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key → value source. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let jwt_secret = get("JWT_SECRET").ok_or(ConfigError::MissingJwtSecret)?;

        let bind_raw = get("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = bind_raw.parse().map_err(|_| ConfigError::Invalid {
            key: "BIND_ADDR",
            value: bind_raw.clone(),
        })?;

        let database_max_connections = match get("DATABASE_MAX_CONNECTIONS") {
            Some(raw) => raw
                .parse::<u32>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or(ConfigError::Invalid {
                    key: "DATABASE_MAX_CONNECTIONS",
                    value: raw,
                })?,
            None => DEFAULT_DB_MAX_CONNECTIONS,
        };

        let bootstrap_admin = match (get("BOOTSTRAP_ADMIN_USERNAME"), get("BOOTSTRAP_ADMIN_PASSWORD")) {
            (Some(username), Some(password)) => Some(BootstrapAdmin { username, password }),
            (None, None) => None,
            _ => return Err(ConfigError::IncompleteBootstrapAdmin),
        };

        Ok(Self {
            jwt_secret,
            database_url: get("DATABASE_URL"),
            database_max_connections,
            bind_addr,
            payment_link_base: get("PAYMENT_LINK_BASE").unwrap_or_else(|| DEFAULT_PAYMENT_LINK_BASE.to_string()),
            bootstrap_admin,
        })
    }

    /// In-memory config on an ephemeral port.
    pub fn for_tests(jwt_secret: &str) -> Self {
        Self {
            jwt_secret: jwt_secret.to_string(),
            database_url: None,
            database_max_connections: DEFAULT_DB_MAX_CONNECTIONS,
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            payment_link_base: DEFAULT_PAYMENT_LINK_BASE.to_string(),
            bootstrap_admin: None,
        }
    }

    pub fn with_bootstrap_admin(mut self, username: &str, password: &str) -> Self {
        self.bootstrap_admin = Some(BootstrapAdmin {
            username: username.to_string(),
            password: password.to_string(),
        });
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn secret_is_required() {
        assert_eq!(AppConfig::from_lookup(lookup(&[])), Err(ConfigError::MissingJwtSecret));
        assert_eq!(
            AppConfig::from_lookup(lookup(&[("JWT_SECRET", "   ")])),
            Err(ConfigError::MissingJwtSecret)
        );
    }

    #[test]
    fn defaults_apply() {
        let cfg = AppConfig::from_lookup(lookup(&[("JWT_SECRET", "s")])).unwrap();
        assert_eq!(cfg.bind_addr.to_string(), DEFAULT_BIND_ADDR);
        assert_eq!(cfg.payment_link_base, DEFAULT_PAYMENT_LINK_BASE);
        assert_eq!(cfg.database_url, None);
        assert_eq!(cfg.bootstrap_admin, None);
    }

    #[test]
    fn bad_values_are_rejected() {
        assert!(matches!(
            AppConfig::from_lookup(lookup(&[("JWT_SECRET", "s"), ("BIND_ADDR", "nowhere")])),
            Err(ConfigError::Invalid { key: "BIND_ADDR", .. })
        ));
        assert!(matches!(
            AppConfig::from_lookup(lookup(&[("JWT_SECRET", "s"), ("DATABASE_MAX_CONNECTIONS", "0")])),
            Err(ConfigError::Invalid { .. })
        ));
        assert_eq!(
            AppConfig::from_lookup(lookup(&[("JWT_SECRET", "s"), ("BOOTSTRAP_ADMIN_USERNAME", "root")])),
            Err(ConfigError::IncompleteBootstrapAdmin)
        );
    }

    #[test]
    fn debug_output_hides_secrets() {
        let cfg = AppConfig::for_tests("super-secret").with_bootstrap_admin("root", "hunter2-hunter2");
        let printed = format!("{cfg:?}");
        assert!(!printed.contains("super-secret"));
        assert!(!printed.contains("hunter2"));
    }
}
