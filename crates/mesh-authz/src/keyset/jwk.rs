//! JSON Web Key decoding

use std::collections::HashMap;

use jsonwebtoken::{Algorithm, DecodingKey};
use serde::Deserialize;

use super::fetch::FetchError;

/// JSON Web Key
#[derive(Debug, Clone, Deserialize)]
pub struct Jwk {
    /// Key ID
    #[serde(default)]
    pub kid: Option<String>,
    /// Key type (RSA, EC)
    pub kty: String,
    /// Algorithm
    #[serde(default)]
    pub alg: Option<String>,
    /// Key usage
    #[serde(default)]
    pub r#use: Option<String>,
    // RSA components
    #[serde(default)]
    pub n: Option<String>,
    #[serde(default)]
    pub e: Option<String>,
    // EC components
    #[serde(default)]
    pub crv: Option<String>,
    #[serde(default)]
    pub x: Option<String>,
    #[serde(default)]
    pub y: Option<String>,
}

/// Decoded verification key and the algorithms it may verify
#[derive(Clone)]
pub struct PublicKey {
    key: DecodingKey,
    algorithms: Vec<Algorithm>,
}

impl std::fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PublicKey")
            .field("algorithms", &self.algorithms)
            .finish_non_exhaustive()
    }
}

impl PublicKey {
    #[must_use]
    pub const fn new(key: DecodingKey, algorithms: Vec<Algorithm>) -> Self {
        Self { key, algorithms }
    }

    #[must_use]
    pub const fn decoding_key(&self) -> &DecodingKey {
        &self.key
    }

    #[must_use]
    pub fn algorithms(&self) -> &[Algorithm] {
        &self.algorithms
    }

    #[must_use]
    pub fn allows(&self, algorithm: Algorithm) -> bool {
        self.algorithms.contains(&algorithm)
    }
}

/// Decode a JWKS document: `{"keys": [...]}` or a bare `[...]`.
///
/// Entries without `kid` or with undecodable material are skipped. A JSON
/// object without a `keys` array yields an empty set.
pub fn parse_key_set(url: &str, body: &[u8]) -> Result<HashMap<String, PublicKey>, FetchError> {
    let document: serde_json::Value =
        serde_json::from_slice(body).map_err(|e| FetchError::Parse {
            url: url.to_owned(),
            reason: e.to_string(),
        })?;

    let entries = match document {
        serde_json::Value::Array(entries) => entries,
        serde_json::Value::Object(mut object) => match object.remove("keys") {
            Some(serde_json::Value::Array(entries)) => entries,
            _ => Vec::new(),
        },
        _ => {
            return Err(FetchError::Parse {
                url: url.to_owned(),
                reason: "expected a JWK set object or array".to_owned(),
            });
        }
    };

    let mut keys = HashMap::with_capacity(entries.len());
    for entry in entries {
        let jwk: Jwk = match serde_json::from_value(entry) {
            Ok(jwk) => jwk,
            Err(e) => {
                tracing::warn!(url, error = %e, "Skipping malformed JWK");
                continue;
            }
        };
        let Some(kid) = jwk.kid.clone().filter(|kid| !kid.is_empty()) else {
            tracing::warn!(url, kty = %jwk.kty, "Skipping JWK without kid");
            continue;
        };
        match decode_jwk(&jwk) {
            Ok(Some(key)) => {
                keys.insert(kid, key);
            }
            Ok(None) => {
                tracing::debug!(url, kid = %kid, kty = %jwk.kty, "Skipping unsupported JWK");
            }
            Err(reason) => {
                tracing::warn!(url, kid = %kid, reason = %reason, "Skipping undecodable JWK");
            }
        }
    }
    Ok(keys)
}

fn decode_jwk(jwk: &Jwk) -> Result<Option<PublicKey>, String> {
    let algorithms = match jwk.alg.as_deref() {
        Some("RS256") => vec![Algorithm::RS256],
        Some("RS384") => vec![Algorithm::RS384],
        Some("RS512") => vec![Algorithm::RS512],
        Some("PS256") => vec![Algorithm::PS256],
        Some("PS384") => vec![Algorithm::PS384],
        Some("PS512") => vec![Algorithm::PS512],
        Some("ES256") => vec![Algorithm::ES256],
        Some("ES384") => vec![Algorithm::ES384],
        None => match jwk.kty.as_str() {
            "RSA" => vec![Algorithm::RS256, Algorithm::RS384, Algorithm::RS512],
            "EC" => match jwk.crv.as_deref() {
                Some("P-256") => vec![Algorithm::ES256],
                Some("P-384") => vec![Algorithm::ES384],
                _ => return Ok(None),
            },
            _ => return Ok(None),
        },
        Some(_) => return Ok(None),
    };

    let key = match jwk.kty.as_str() {
        "RSA" => {
            let n = jwk.n.as_deref().ok_or("missing 'n' in RSA key")?;
            let e = jwk.e.as_deref().ok_or("missing 'e' in RSA key")?;
            DecodingKey::from_rsa_components(&to_base64url(n), &to_base64url(e))
                .map_err(|e| format!("invalid RSA components: {e}"))?
        }
        "EC" => {
            let x = jwk.x.as_deref().ok_or("missing 'x' in EC key")?;
            let y = jwk.y.as_deref().ok_or("missing 'y' in EC key")?;
            DecodingKey::from_ec_components(&to_base64url(x), &to_base64url(y))
                .map_err(|e| format!("invalid EC components: {e}"))?
        }
        _ => return Ok(None),
    };

    Ok(Some(PublicKey::new(key, algorithms)))
}

/// Normalize standard or padded base64 to unpadded base64url.
fn to_base64url(value: &str) -> String {
    value
        .trim_end_matches('=')
        .chars()
        .map(|c| match c {
            '+' => '-',
            '/' => '_',
            other => other,
        })
        .collect()
}
