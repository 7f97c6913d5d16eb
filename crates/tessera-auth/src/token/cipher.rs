//! Access token cipher: signed JWTs, optionally wrapped in a JWE.
//!
//! The JWE form is compact serialization with direct key agreement:
//!
//! ```text
//! BASE64URL(header) . "" . BASE64URL(iv) . BASE64URL(ciphertext) . BASE64URL(tag)
//! ```
//!
//! with header `{"alg":"dir","enc":"A256GCM","cty":"JWT"}` and the encoded
//! header as additional authenticated data (RFC 7516 section 5.1).

use aes_gcm::{
    Aes256Gcm, Nonce,
    aead::{Aead, KeyInit, Payload},
};
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::RngCore;
use serde::{Deserialize, Serialize};

use super::jwt::{AccessTokenClaims, JwtError, JwtService, Jwks, SigningKeyPair};
use crate::config::AuthConfig;

const NONCE_SIZE: usize = 12;
const TAG_SIZE: usize = 16;

#[derive(Debug, Serialize, Deserialize)]
struct JweHeader {
    alg: String,
    enc: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    cty: Option<String>,
}

/// Signs access token claims and optionally encrypts the result.
#[derive(Debug)]
pub struct AccessTokenCipher {
    jwt: JwtService,
    encryption_key: Option<[u8; 32]>,
}

impl AccessTokenCipher {
    #[must_use]
    pub fn new(jwt: JwtService, encryption_key: Option<[u8; 32]>) -> Self {
        Self {
            jwt,
            encryption_key,
        }
    }

    /// Builds the cipher from the signing and crypto sections.
    ///
    /// # Errors
    ///
    /// Returns an error if the key cannot be loaded or generated, or the
    /// encryption key is unusable.
    pub fn from_config(config: &AuthConfig) -> Result<Self, JwtError> {
        let key = SigningKeyPair::from_config(&config.signing)?;
        let encryption_key = config
            .crypto
            .key_bytes()
            .map_err(|e| JwtError::invalid_key(e.to_string()))?;
        Ok(Self::new(JwtService::new(key, &config.issuer), encryption_key))
    }

    /// Returns `true` if tokens are wrapped in a JWE.
    #[must_use]
    pub fn encryption_enabled(&self) -> bool {
        self.encryption_key.is_some()
    }

    #[must_use]
    pub fn issuer(&self) -> &str {
        self.jwt.issuer()
    }

    #[must_use]
    pub fn jwks(&self) -> Jwks {
        self.jwt.jwks()
    }

    /// Signs the claims, then encrypts when a key is configured.
    ///
    /// # Errors
    ///
    /// Returns an error if signing or encryption fails.
    pub fn encode(&self, claims: &AccessTokenClaims) -> Result<String, JwtError> {
        let signed = self.jwt.encode(claims)?;
        match &self.encryption_key {
            Some(key) => encrypt_compact(key, &signed),
            None => Ok(signed),
        }
    }

    /// Decodes a JWS or JWE access token and verifies its signature.
    ///
    /// Expiry is not checked here; the ticket store is the authority on
    /// whether the token is still live.
    ///
    /// # Errors
    ///
    /// Returns an error if decryption, signature or issuer checks fail.
    pub fn decode(&self, token: &str) -> Result<AccessTokenClaims, JwtError> {
        let signed = match segment_count(token) {
            5 => {
                let key = self
                    .encryption_key
                    .as_ref()
                    .ok_or_else(|| JwtError::decoding_error("encrypted token but no key"))?;
                decrypt_compact(key, token)?
            }
            3 => token.to_string(),
            _ => return Err(JwtError::decoding_error("not a compact JWS or JWE")),
        };
        Ok(self.jwt.decode_allow_expired(&signed)?.claims)
    }
}

/// Returns `true` if `token` has the shape of a compact JWS or JWE.
#[must_use]
pub fn looks_like_jwt(token: &str) -> bool {
    matches!(segment_count(token), 3 | 5)
}

fn segment_count(token: &str) -> usize {
    token.split('.').count()
}

/// Encrypts `plaintext` into a compact `dir` + `A256GCM` JWE.
///
/// # Errors
///
/// Returns `JwtError::EncodingError` if encryption fails.
pub fn encrypt_compact(key: &[u8; 32], plaintext: &str) -> Result<String, JwtError> {
    let header = JweHeader {
        alg: "dir".to_string(),
        enc: "A256GCM".to_string(),
        cty: Some("JWT".to_string()),
    };
    let header_json =
        serde_json::to_vec(&header).map_err(|e| JwtError::encoding_error(e.to_string()))?;
    let encoded_header = URL_SAFE_NO_PAD.encode(header_json);

    let cipher = Aes256Gcm::new_from_slice(key)
        .map_err(|e| JwtError::encoding_error(format!("Failed to create cipher: {e}")))?;
    let mut nonce_bytes = [0u8; NONCE_SIZE];
    rand::thread_rng().fill_bytes(&mut nonce_bytes);

    let sealed = cipher
        .encrypt(
            Nonce::from_slice(&nonce_bytes),
            Payload {
                msg: plaintext.as_bytes(),
                aad: encoded_header.as_bytes(),
            },
        )
        .map_err(|e| JwtError::encoding_error(format!("Encryption failed: {e}")))?;
    // aes-gcm appends the tag to the ciphertext
    let (ciphertext, tag) = sealed.split_at(sealed.len() - TAG_SIZE);

    Ok(format!(
        "{encoded_header}..{}.{}.{}",
        URL_SAFE_NO_PAD.encode(nonce_bytes),
        URL_SAFE_NO_PAD.encode(ciphertext),
        URL_SAFE_NO_PAD.encode(tag)
    ))
}

/// Decrypts a compact `dir` + `A256GCM` JWE.
///
/// # Errors
///
/// Returns `JwtError::DecodingError` if the token is malformed, uses another
/// algorithm, or fails authentication.
pub fn decrypt_compact(key: &[u8; 32], token: &str) -> Result<String, JwtError> {
    let parts: Vec<&str> = token.split('.').collect();
    let [encoded_header, encrypted_key, iv, ciphertext, tag] = parts.as_slice() else {
        return Err(JwtError::decoding_error("JWE must have five segments"));
    };
    if !encrypted_key.is_empty() {
        return Err(JwtError::decoding_error(
            "direct encryption carries no encrypted key",
        ));
    }

    let decode = |segment: &str, name: &str| {
        URL_SAFE_NO_PAD
            .decode(segment)
            .map_err(|e| JwtError::decoding_error(format!("invalid {name}: {e}")))
    };
    let header: JweHeader = serde_json::from_slice(&decode(*encoded_header, "header")?)
        .map_err(|e| JwtError::decoding_error(format!("invalid header: {e}")))?;
    if header.alg != "dir" || header.enc != "A256GCM" {
        return Err(JwtError::decoding_error(format!(
            "unsupported JWE algorithms {}/{}",
            header.alg, header.enc
        )));
    }

    let nonce_bytes = decode(*iv, "iv")?;
    if nonce_bytes.len() != NONCE_SIZE {
        return Err(JwtError::decoding_error("invalid iv size"));
    }
    let mut sealed = decode(*ciphertext, "ciphertext")?;
    let tag = decode(*tag, "tag")?;
    if tag.len() != TAG_SIZE {
        return Err(JwtError::decoding_error("invalid tag size"));
    }
    sealed.extend_from_slice(&tag);

    let cipher = Aes256Gcm::new_from_slice(key)
        .map_err(|e| JwtError::decoding_error(format!("Failed to create cipher: {e}")))?;
    let plaintext = cipher
        .decrypt(
            Nonce::from_slice(&nonce_bytes),
            Payload {
                msg: &sealed,
                aad: encoded_header.as_bytes(),
            },
        )
        .map_err(|e| JwtError::decoding_error(format!("Decryption failed: {e}")))?;

    String::from_utf8(plaintext)
        .map_err(|e| JwtError::decoding_error(format!("Invalid UTF-8 in payload: {e}")))
}
