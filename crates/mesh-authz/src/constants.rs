//! Constants for the authorization engine

/// Path segment marking a prefix (subtree) policy
pub const WILDCARD_SEGMENT: &str = "/*";

/// Root path
pub const ROOT_PATH: &str = "/";

/// Suffix of the OIDC callback endpoint served under a protected path
pub const CALLBACK_ENDPOINT: &str = "/oidc/callback";

/// Suffix of the OIDC logout endpoint served under a protected path
pub const LOGOUT_ENDPOINT: &str = "/oidc/logout";

/// Token endpoint auth method used when a client config leaves it empty
pub const DEFAULT_AUTH_METHOD: &str = "client_secret_basic";

/// Claim name carrying OAuth 2.0 scopes
pub const SCOPE_CLAIM: &str = "scope";

/// Default `User-Agent` for key set and discovery fetches
pub const DEFAULT_USER_AGENT: &str = concat!("mesh-authz/", env!("CARGO_PKG_VERSION"));
