//! OAuth 2.0 bearer token errors (RFC 6750 §3.1)

use std::fmt;

use serde::Serialize;
use thiserror::Error;

pub const EXPIRED_TOKEN: &str = "Token is expired";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OAuthErrorCode {
    InvalidRequest,
    InvalidToken,
    InsufficientScope,
    ServerError,
}

impl OAuthErrorCode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InvalidRequest => "invalid_request",
            Self::InvalidToken => "invalid_token",
            Self::InsufficientScope => "insufficient_scope",
            Self::ServerError => "server_error",
        }
    }

    /// HTTP reason phrase for the code
    #[must_use]
    pub const fn short_description(self) -> &'static str {
        match self {
            Self::InvalidRequest => "Bad Request",
            Self::InvalidToken => "Unauthorized",
            Self::InsufficientScope => "Forbidden",
            Self::ServerError => "Internal Server Error",
        }
    }

    #[must_use]
    pub const fn http_status(self) -> u16 {
        match self {
            Self::InvalidRequest => 400,
            Self::InvalidToken => 401,
            Self::InsufficientScope => 403,
            Self::ServerError => 500,
        }
    }
}

impl fmt::Display for OAuthErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rejection of a bearer token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[error("{code}: {message}")]
pub struct OAuthError {
    #[serde(rename = "error")]
    pub code: OAuthErrorCode,
    #[serde(rename = "error_description")]
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub scopes: Vec<String>,
}

impl OAuthError {
    pub fn new(code: OAuthErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            scopes: Vec::new(),
        }
    }

    pub fn invalid_token(message: impl Into<String>) -> Self {
        Self::new(OAuthErrorCode::InvalidToken, message)
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(OAuthErrorCode::InvalidRequest, message)
    }

    pub fn server_error(message: impl Into<String>) -> Self {
        Self::new(OAuthErrorCode::ServerError, message)
    }

    #[must_use]
    pub fn with_scopes(mut self, scopes: Vec<String>) -> Self {
        self.scopes = scopes;
        self
    }

    #[must_use]
    pub const fn short_description(&self) -> &'static str {
        self.code.short_description()
    }

    #[must_use]
    pub const fn http_status(&self) -> u16 {
        self.code.http_status()
    }

    /// Scopes as a space separated list, empty when there are none
    #[must_use]
    pub fn scope_str(&self) -> String {
        self.scopes.join(" ")
    }

    /// `WWW-Authenticate` challenge for this error.
    ///
    /// Server errors carry no error attributes; the description is stripped of
    /// characters RFC 6750 forbids in quoted attribute values.
    #[must_use]
    pub fn www_authenticate(&self) -> String {
        if self.code == OAuthErrorCode::ServerError {
            return "Bearer".to_string();
        }
        let description: String = self
            .message
            .chars()
            .map(|c| if c == '"' || c == '\\' { '\'' } else { c })
            .collect();
        let mut challenge = format!(
            "Bearer error=\"{}\", error_description=\"{description}\"",
            self.code
        );
        if !self.scopes.is_empty() {
            challenge.push_str(&format!(", scope=\"{}\"", self.scope_str()));
        }
        challenge
    }
}

impl From<jsonwebtoken::errors::Error> for OAuthError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;
        let message = match err.kind() {
            ErrorKind::ExpiredSignature => EXPIRED_TOKEN.to_string(),
            ErrorKind::ImmatureSignature => "Token is not valid yet".to_string(),
            ErrorKind::InvalidSignature => "token validation error - invalid signature".to_string(),
            ErrorKind::InvalidAlgorithm => {
                "token validation error - algorithm does not match key".to_string()
            }
            _ => format!("token validation error - {err}"),
        };
        Self::invalid_token(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_token() {
        let err = OAuthError::invalid_token("my error message")
            .with_scopes(vec!["scope1".to_string(), "scope2".to_string()]);
        assert_eq!(err.code, OAuthErrorCode::InvalidToken);
        assert_eq!(err.http_status(), 401);
        assert_eq!(err.to_string(), "invalid_token: my error message");
        assert_eq!(err.short_description(), "Unauthorized");
        assert_eq!(err.scope_str(), "scope1 scope2");
    }

    #[test]
    fn test_invalid_request() {
        let err = OAuthError::invalid_request("my error message");
        assert_eq!(err.http_status(), 400);
        assert_eq!(err.short_description(), "Bad Request");
        assert_eq!(err.scope_str(), "");
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(OAuthErrorCode::InsufficientScope.http_status(), 403);
        assert_eq!(OAuthErrorCode::InsufficientScope.short_description(), "Forbidden");
        assert_eq!(OAuthErrorCode::ServerError.http_status(), 500);
    }

    #[test]
    fn test_serialize() {
        let err = OAuthError::invalid_token("expired").with_scopes(vec!["read".to_string()]);
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["error"], "invalid_token");
        assert_eq!(json["error_description"], "expired");
        assert_eq!(json["scopes"][0], "read");

        let json = serde_json::to_value(OAuthError::invalid_request("bad")).unwrap();
        assert!(json.get("scopes").is_none());
    }

    #[test]
    fn test_www_authenticate() {
        let err = OAuthError::invalid_token("claim `x` \"quoted\"")
            .with_scopes(vec!["read".to_string(), "write".to_string()]);
        assert_eq!(
            err.www_authenticate(),
            "Bearer error=\"invalid_token\", error_description=\"claim `x` 'quoted'\", scope=\"read write\""
        );
        assert_eq!(OAuthError::server_error("boom").www_authenticate(), "Bearer");
    }

    #[test]
    fn test_from_expired_signature() {
        let err: OAuthError =
            jsonwebtoken::errors::Error::from(jsonwebtoken::errors::ErrorKind::ExpiredSignature)
                .into();
        assert_eq!(err.code, OAuthErrorCode::InvalidToken);
        assert_eq!(err.message, EXPIRED_TOKEN);
    }
}
