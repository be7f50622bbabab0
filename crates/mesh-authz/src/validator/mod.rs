//! Bearer token verification and claim rule evaluation

mod claims;
mod oauth;

use std::time::Duration;

use jsonwebtoken::{Validation, decode_header};

pub use claims::{ClaimValue, Claims, Resolved, check_rule};
pub use oauth::{EXPIRED_TOKEN, OAuthError, OAuthErrorCode};

use crate::config::ValidationConfig;
use crate::constants::SCOPE_CLAIM;
use crate::keyset::KeySet;
use crate::policy::Rule;

/// Verifies JWT signatures against a key set and applies claim rules
#[derive(Debug, Clone)]
pub struct TokenValidator {
    clock_skew: Duration,
}

impl Default for TokenValidator {
    fn default() -> Self {
        Self::new(&ValidationConfig::default())
    }
}

impl TokenValidator {
    #[must_use]
    pub const fn new(config: &ValidationConfig) -> Self {
        Self {
            clock_skew: config.clock_skew,
        }
    }

    /// Verify `token` and check `rules` in order; the first failing rule rejects.
    pub async fn validate(
        &self,
        token: &str,
        key_set: &dyn KeySet,
        rules: &[Rule],
    ) -> Result<Claims, OAuthError> {
        let result = self.verify(token, key_set, rules).await;
        match &result {
            Ok(_) => tracing::debug!(jwks_url = key_set.url(), "Token has been validated"),
            Err(err) => {
                tracing::debug!(
                    jwks_url = key_set.url(),
                    code = %err.code,
                    error = %err.message,
                    "Token rejected"
                );
                #[cfg(feature = "metrics")]
                crate::observability::record_validation_failure(err.code);
            }
        }
        result
    }

    async fn verify(
        &self,
        token: &str,
        key_set: &dyn KeySet,
        rules: &[Rule],
    ) -> Result<Claims, OAuthError> {
        if token.is_empty() {
            return Err(OAuthError::invalid_token("token not provided"));
        }

        let header = decode_header(token)?;
        let kid = header
            .kid
            .filter(|kid| !kid.is_empty())
            .ok_or_else(|| OAuthError::invalid_token("token validation error - kid is missing"))?;

        let key = key_set.public_key(&kid).await.ok_or_else(|| {
            OAuthError::invalid_token(format!("token validation error - key not found :: {kid}"))
        })?;
        if !key.allows(header.alg) {
            return Err(OAuthError::invalid_token(format!(
                "token validation error - algorithm {:?} does not match key :: {kid}",
                header.alg
            )));
        }

        let mut validation = Validation::new(header.alg);
        validation.required_spec_claims.clear();
        validation.validate_aud = false;
        validation.validate_nbf = true;
        validation.leeway = self.clock_skew.as_secs();

        let claims = jsonwebtoken::decode::<Claims>(token, key.decoding_key(), &validation)?.claims;

        for rule in rules {
            check_rule(rule, &claims).map_err(|message| {
                let err = OAuthError::invalid_token(message);
                if rule.claim == SCOPE_CLAIM {
                    err.with_scopes(rule.values.clone())
                } else {
                    err
                }
            })?;
        }

        Ok(claims)
    }
}
