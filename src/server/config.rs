use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::auth::{AccessRules, InMemoryUserStore, JwtManager, ROLE_ADMIN, ROLE_USER, User};
use crate::proto::methods;
use crate::store::{DiskImageStore, ImageStore, InMemoryImageStore};
use crate::{Error, Result};

/// Default location of the configuration file.
pub const DEFAULT_CONFIG_PATH: &str = "config/server.toml";

/// Server configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Hostname or IP address to bind to.
    pub host: String,
    /// Port number to listen on.
    pub port: u16,
    /// Token signing settings.
    pub auth: AuthSettings,
    /// Folder for uploaded images; images stay in memory when unset.
    pub image_dir: Option<PathBuf>,
    /// Roles allowed per full method name. Methods not listed are public.
    ///
    /// A table from the file or the environment replaces the built-in one
    /// whole instead of being merged into it.
    #[serde(default = "default_access", skip_serializing)]
    pub access: HashMap<String, Vec<String>>,
    /// Accounts created at startup.
    pub users: Vec<SeedUser>,
    /// Metrics exporter configuration.
    pub metrics: MetricsSettings,
}

/// Token signing settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AuthSettings {
    /// HMAC key for access tokens.
    pub secret_key: String,
    /// Token lifetime in seconds.
    pub token_duration_secs: u64,
}

/// An account registered when the server starts.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SeedUser {
    /// Login name.
    pub username: String,
    /// Plain-text password, hashed when the account is created.
    pub password: String,
    /// Role granted to the account, `admin` or `user`.
    pub role: String,
}

/// Metrics exporter settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MetricsSettings {
    /// Whether metrics export is enabled.
    pub enabled: bool,
    /// Hostname or IP address for metrics server.
    pub host: String,
    /// Port number for metrics server.
    pub port: u16,
}

impl MetricsSettings {
    /// Converts host and port into a socket address for the metrics server.
    pub fn addr(&self) -> Result<SocketAddr> {
        socket_addr(&self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            auth: AuthSettings {
                secret_key: "secret".to_string(),
                token_duration_secs: 15 * 60,
            },
            image_dir: None,
            access: default_access(),
            users: vec![
                SeedUser {
                    username: "admin".to_string(),
                    password: "password".to_string(),
                    role: ROLE_ADMIN.to_string(),
                },
                SeedUser {
                    username: "user1".to_string(),
                    password: "password".to_string(),
                    role: ROLE_USER.to_string(),
                },
            ],
            metrics: MetricsSettings {
                enabled: false,
                host: "127.0.0.1".to_string(),
                port: 9090,
            },
        }
    }
}

fn default_access() -> HashMap<String, Vec<String>> {
    [
        (methods::CREATE_LAPTOP, vec![ROLE_ADMIN]),
        (methods::UPLOAD_IMAGE, vec![ROLE_ADMIN]),
        (methods::RATE_LAPTOP, vec![ROLE_ADMIN, ROLE_USER]),
    ]
    .into_iter()
    .map(|(method, roles)| {
        (
            method.to_string(),
            roles.into_iter().map(str::to_string).collect(),
        )
    })
    .collect()
}

fn socket_addr(host: &str, port: u16) -> Result<SocketAddr> {
    format!("{host}:{port}")
        .parse()
        .map_err(|e| Error::Config(format!("invalid address {host}:{port}: {e}")))
}

impl ServerConfig {
    /// Loads configuration from the TOML file at `path` and environment
    /// variables.
    ///
    /// Configuration priority: environment variables > TOML file > defaults.
    /// Nested keys use a double underscore, e.g. `SERVER_AUTH__SECRET_KEY`.
    #[allow(clippy::result_large_err)]
    pub fn load(path: impl AsRef<Path>) -> figment::error::Result<Self> {
        Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("SERVER_").split("__"))
            .extract()
    }

    /// Loads configuration from [`DEFAULT_CONFIG_PATH`] and the environment.
    #[allow(clippy::result_large_err)]
    pub fn from_env() -> figment::error::Result<Self> {
        Self::load(DEFAULT_CONFIG_PATH)
    }

    /// Listening address.
    pub fn addr(&self) -> Result<SocketAddr> {
        socket_addr(&self.host, self.port)
    }

    /// Checks values the type system cannot.
    pub fn validate(&self) -> Result<()> {
        if self.auth.secret_key.is_empty() {
            return Err(Error::Config("auth.secret_key must not be empty".into()));
        }
        if self.auth.token_duration_secs == 0 {
            return Err(Error::Config(
                "auth.token_duration_secs must be positive".into(),
            ));
        }

        let known = |role: &str| role == ROLE_ADMIN || role == ROLE_USER;

        for user in &self.users {
            if user.username.is_empty() {
                return Err(Error::Config("seed user without a username".into()));
            }
            if !known(&user.role) {
                return Err(Error::Config(format!(
                    "user {} has unknown role {}",
                    user.username, user.role
                )));
            }
        }

        for (method, roles) in &self.access {
            if let Some(role) = roles.iter().find(|role| !known(role.as_str())) {
                return Err(Error::Config(format!(
                    "method {method} lists unknown role {role}"
                )));
            }
        }

        self.addr()?;
        if self.metrics.enabled {
            self.metrics.addr()?;
        }

        Ok(())
    }

    /// Method-to-role table for the authorization interceptor.
    pub fn access_rules(&self) -> AccessRules {
        AccessRules::new(self.access.clone())
    }

    /// Token manager built from the auth settings.
    pub fn jwt_manager(&self) -> JwtManager {
        JwtManager::new(
            &self.auth.secret_key,
            Duration::from_secs(self.auth.token_duration_secs),
        )
    }

    /// Image store selected by `image_dir`.
    pub fn image_store(&self) -> Arc<dyn ImageStore> {
        match &self.image_dir {
            Some(folder) => Arc::new(DiskImageStore::new(folder)),
            None => Arc::new(InMemoryImageStore::new()),
        }
    }

    /// Registers the configured accounts in `users`.
    pub async fn seed_users(&self, users: &InMemoryUserStore) -> Result<()> {
        for seed in &self.users {
            users
                .save(User::new(&seed.username, &seed.password, &seed.role)?)
                .await?;
            info!(username = %seed.username, role = %seed.role, "seeded user");
        }
        Ok(())
    }
}
