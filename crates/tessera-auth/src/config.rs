//! Token engine configuration.
//!
//! One section per ticket kind drives the expiration policy set, plus the
//! signing and encryption settings used by the response encoder.

use std::time::Duration;

use base64::{Engine, engine::general_purpose::STANDARD};
use serde::{Deserialize, Serialize};

/// Root token engine configuration.
///
/// # Example (TOML)
///
/// ```toml
/// [auth]
/// issuer = "https://sso.example.com"
///
/// [auth.oauth.access_token]
/// max_time_to_live = "8h"
/// time_to_kill = "2h"
/// sovereign = true
///
/// [auth.oauth.device_token]
/// time_to_kill = "5m"
/// refresh_interval = "15s"
/// ```
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Public server prefix.
    /// Used as the JWT `iss` claim and to build the device verification URI.
    pub issuer: String,

    /// Ticket lifetimes per kind.
    pub oauth: OAuthConfig,

    /// JWT signing configuration.
    pub signing: SigningConfig,

    /// JWT access token encryption.
    pub crypto: CryptoConfig,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            issuer: "http://localhost:8443/sso".to_string(),
            oauth: OAuthConfig::default(),
            signing: SigningConfig::default(),
            crypto: CryptoConfig::default(),
        }
    }
}

/// Lifetimes and device flow settings, one subsection per ticket kind.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct OAuthConfig {
    /// Authorization code settings.
    pub code: CodeConfig,

    /// Access token settings.
    pub access_token: AccessTokenConfig,

    /// Refresh token settings.
    pub refresh_token: RefreshTokenConfig,

    /// Device token settings.
    pub device_token: DeviceTokenConfig,

    /// Device user code settings.
    pub device_user_code: DeviceUserCodeConfig,
}

/// Authorization code settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CodeConfig {
    /// How long an unredeemed code stays valid.
    #[serde(with = "humantime_serde")]
    pub time_to_kill: Duration,
}

impl Default for CodeConfig {
    fn default() -> Self {
        Self {
            time_to_kill: Duration::from_secs(30),
        }
    }
}

/// Access token settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AccessTokenConfig {
    /// Hard upper bound on the token lifetime.
    #[serde(with = "humantime_serde")]
    pub max_time_to_live: Duration,

    /// Lifetime advertised as `expires_in`.
    #[serde(with = "humantime_serde")]
    pub time_to_kill: Duration,

    /// Bound the lifetime by the remaining life of the backing SSO session.
    pub sovereign: bool,
}

impl Default for AccessTokenConfig {
    fn default() -> Self {
        Self {
            max_time_to_live: Duration::from_secs(8 * 3600), // 8 hours
            time_to_kill: Duration::from_secs(7200),         // 2 hours
            sovereign: true,
        }
    }
}

/// Refresh token settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RefreshTokenConfig {
    /// Refresh token lifetime.
    #[serde(with = "humantime_serde")]
    pub time_to_kill: Duration,

    /// Bound the lifetime by the remaining life of the backing SSO session.
    pub sovereign: bool,
}

impl Default for RefreshTokenConfig {
    fn default() -> Self {
        Self {
            time_to_kill: Duration::from_secs(30 * 24 * 3600), // 30 days
            sovereign: false,
        }
    }
}

/// Device token settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DeviceTokenConfig {
    /// How long a device code may be polled before it expires.
    #[serde(with = "humantime_serde")]
    pub time_to_kill: Duration,

    /// Minimum spacing between two polls of the same device code.
    #[serde(with = "humantime_serde")]
    pub refresh_interval: Duration,
}

impl Default for DeviceTokenConfig {
    fn default() -> Self {
        Self {
            time_to_kill: Duration::from_secs(300),
            refresh_interval: Duration::from_secs(15),
        }
    }
}

/// Device user code settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DeviceUserCodeConfig {
    /// Number of characters in a generated user code.
    pub user_code_length: usize,
}

impl Default for DeviceUserCodeConfig {
    fn default() -> Self {
        Self {
            user_code_length: 8,
        }
    }
}

/// JWT signing configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SigningConfig {
    /// Signing algorithm.
    /// Supported: "RS256", "RS384", "ES384"
    pub algorithm: String,

    /// Key id published in the JWT header and JWKS.
    pub kid: Option<String>,

    /// Path to a PEM-encoded private key.
    /// When unset, a key pair is generated at startup.
    pub private_key_pem: Option<String>,

    /// Path to the matching PEM-encoded public key.
    pub public_key_pem: Option<String>,
}

impl Default for SigningConfig {
    fn default() -> Self {
        Self {
            algorithm: "RS256".to_string(),
            kid: None,
            private_key_pem: None,
            public_key_pem: None,
        }
    }
}

/// JWT access token encryption.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct CryptoConfig {
    /// Wrap signed access tokens in a JWE.
    pub encryption_enabled: bool,

    /// Base64-encoded 256-bit AES key.
    pub encryption_key: Option<String>,
}

impl CryptoConfig {
    /// Decodes the configured encryption key.
    ///
    /// Returns `Ok(None)` when encryption is disabled.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if encryption is enabled and the key is missing,
    /// not valid base64, or not 32 bytes long.
    pub fn key_bytes(&self) -> Result<Option<[u8; 32]>, ConfigError> {
        if !self.encryption_enabled {
            return Ok(None);
        }
        let encoded = self
            .encryption_key
            .as_deref()
            .ok_or_else(|| ConfigError::Missing("crypto.encryption_key".to_string()))?;
        let bytes = STANDARD.decode(encoded.trim()).map_err(|e| {
            ConfigError::InvalidValue(format!("crypto.encryption_key is not base64: {e}"))
        })?;
        let key: [u8; 32] = bytes.try_into().map_err(|b: Vec<u8>| {
            ConfigError::InvalidValue(format!(
                "crypto.encryption_key must be 32 bytes, got {}",
                b.len()
            ))
        })?;
        Ok(Some(key))
    }
}

/// Configuration validation errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    /// An invalid configuration value was provided.
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),

    /// A required configuration value is missing.
    #[error("Missing required configuration: {0}")]
    Missing(String),
}

impl AuthConfig {
    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if:
    /// - The issuer is not an absolute URL
    /// - Any ticket lifetime is zero
    /// - The user code length is outside 4..=32
    /// - The signing algorithm is not supported
    /// - Encryption is enabled without a usable key
    pub fn validate(&self) -> Result<(), ConfigError> {
        if url::Url::parse(&self.issuer).is_err() {
            return Err(ConfigError::InvalidValue(format!(
                "issuer must be an absolute URL, got '{}'",
                self.issuer
            )));
        }

        let lifetimes = [
            ("oauth.code.time_to_kill", self.oauth.code.time_to_kill),
            (
                "oauth.access_token.max_time_to_live",
                self.oauth.access_token.max_time_to_live,
            ),
            (
                "oauth.access_token.time_to_kill",
                self.oauth.access_token.time_to_kill,
            ),
            (
                "oauth.refresh_token.time_to_kill",
                self.oauth.refresh_token.time_to_kill,
            ),
            (
                "oauth.device_token.time_to_kill",
                self.oauth.device_token.time_to_kill,
            ),
        ];
        for (name, value) in lifetimes {
            if value.is_zero() {
                return Err(ConfigError::InvalidValue(format!("{name} must be > 0")));
            }
        }

        let len = self.oauth.device_user_code.user_code_length;
        if !(4..=32).contains(&len) {
            return Err(ConfigError::InvalidValue(format!(
                "oauth.device_user_code.user_code_length must be 4..=32, got {len}"
            )));
        }

        match self.signing.algorithm.as_str() {
            "RS256" | "RS384" | "ES384" => {}
            other => {
                return Err(ConfigError::InvalidValue(format!(
                    "Invalid signing algorithm: '{other}'. Must be RS256, RS384, or ES384"
                )));
            }
        }

        if self.signing.private_key_pem.is_some() != self.signing.public_key_pem.is_some() {
            return Err(ConfigError::Missing(
                "signing.private_key_pem and signing.public_key_pem must be set together"
                    .to_string(),
            ));
        }

        self.crypto.key_bytes()?;
        Ok(())
    }

    /// The device verification URI advertised in device authorization responses.
    #[must_use]
    pub fn device_verification_uri(&self) -> String {
        format!("{}/oauth2.0/device", self.issuer.trim_end_matches('/'))
    }
}
