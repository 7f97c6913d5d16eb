use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::net::SocketAddr;

use serde::{Deserialize, Serialize};
use tessera_auth::config::AuthConfig;
use tessera_auth::types::{GrantType, ResponseType};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Token engine configuration
    #[serde(default)]
    pub auth: AuthConfig,
    /// Clients and users registered at startup
    #[serde(default)]
    pub bootstrap: BootstrapConfig,
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.server.port == 0 {
            return Err("server.port must be > 0".into());
        }
        if self.server.body_limit_bytes == 0 {
            return Err("server.body_limit_bytes must be > 0".into());
        }
        let lvl = self.logging.level.to_ascii_lowercase();
        let valid_levels = ["trace", "debug", "info", "warn", "error", "off"];
        if !valid_levels.contains(&lvl.as_str()) {
            return Err(format!("logging.level must be one of {valid_levels:?}"));
        }
        self.auth
            .validate()
            .map_err(|e| format!("auth config error: {e}"))?;

        let mut seen = BTreeSet::new();
        for client in &self.bootstrap.clients {
            if client.client_id.is_empty() {
                return Err("bootstrap.clients entries need a client_id".into());
            }
            if !seen.insert(client.client_id.as_str()) {
                return Err(format!(
                    "bootstrap.clients has duplicate client_id '{}'",
                    client.client_id
                ));
            }
        }
        if self.bootstrap.users.iter().any(|u| u.username.is_empty()) {
            return Err("bootstrap.users entries need a username".into());
        }
        Ok(())
    }

    pub fn addr(&self) -> SocketAddr {
        use std::net::{IpAddr, Ipv4Addr};
        let host: IpAddr = self
            .server
            .host
            .parse()
            .unwrap_or(IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)));
        SocketAddr::from((host, self.server.port))
    }

    /// Renders the effective configuration as TOML with secrets masked.
    pub fn to_redacted_toml(&self) -> Result<String, toml::ser::Error> {
        let mut redacted = self.clone();
        for client in &mut redacted.bootstrap.clients {
            if client.secret.is_some() {
                client.secret = Some(REDACTED.to_string());
            }
        }
        for user in &mut redacted.bootstrap.users {
            user.password = REDACTED.to_string();
        }
        if redacted.auth.crypto.encryption_key.is_some() {
            redacted.auth.crypto.encryption_key = Some(REDACTED.to_string());
        }
        toml::to_string_pretty(&redacted)
    }
}

const REDACTED: &str = "********";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_body_limit")]
    pub body_limit_bytes: usize,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8443
}
fn default_body_limit() -> usize {
    64 * 1024
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            body_limit_bytes: default_body_limit(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BootstrapConfig {
    #[serde(default)]
    pub clients: Vec<BootstrapClient>,
    #[serde(default)]
    pub users: Vec<BootstrapUser>,
}

/// A client registered at startup. `secret` is plaintext and hashed on load.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BootstrapClient {
    pub client_id: String,
    #[serde(default)]
    pub secret: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    pub service_id_pattern: String,
    #[serde(default)]
    pub allowed_grant_types: BTreeSet<GrantType>,
    #[serde(default)]
    pub allowed_response_types: BTreeSet<ResponseType>,
    #[serde(default)]
    pub scopes: Vec<String>,
    #[serde(default)]
    pub jwt_access_token: bool,
    #[serde(default = "default_true")]
    pub generate_refresh_token: bool,
    #[serde(default)]
    pub renew_refresh_token: bool,
}

fn default_true() -> bool {
    true
}

/// A resource owner for the password grant and device approval.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BootstrapUser {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub attributes: BTreeMap<String, serde_json::Value>,
}

pub mod loader {
    use super::AppConfig;
    use config::{Config, Environment, File};
    use std::path::PathBuf;

    /// Loads `path` (or `tessera.toml`), then `TESSERA__SECTION__KEY`
    /// environment overrides, and validates the result.
    ///
    /// A missing file is not an error; defaults apply.
    pub fn load_config(path: Option<&str>) -> Result<AppConfig, String> {
        let mut builder = Config::builder();
        let pathbuf = PathBuf::from(path.unwrap_or("tessera.toml"));
        if pathbuf.exists() {
            builder = builder.add_source(File::from(pathbuf));
        }
        // Environment variable overrides, e.g., TESSERA__SERVER__PORT=9090
        builder = builder.add_source(
            Environment::with_prefix("TESSERA")
                .prefix_separator("__")
                .try_parsing(true)
                .separator("__"),
        );
        let cfg = builder
            .build()
            .map_err(|e| format!("config build error: {e}"))?;
        let merged: AppConfig = cfg
            .try_deserialize()
            .map_err(|e| format!("config deserialize error: {e}"))?;
        merged.validate()?;
        Ok(merged)
    }
}
