//! Route policy types shared by the store, engine and validator

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Authentication flow a path policy requires
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyType {
    /// Bearer access/identity token checked against a key set
    Jwt,
    /// Browser session established through an OIDC client
    Oidc,
}

impl fmt::Display for PolicyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Jwt => f.write_str("jwt"),
            Self::Oidc => f.write_str("oidc"),
        }
    }
}

/// How a rule's values are matched against a claim
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE", try_from = "String")]
pub enum MatchMode {
    /// Every expected value must be present
    #[default]
    All,
    /// At least one expected value must be present
    Any,
    /// None of the expected values may be present
    Not,
}

impl MatchMode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::All => "ALL",
            Self::Any => "ANY",
            Self::Not => "NOT",
        }
    }
}

impl FromStr for MatchMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "" | "ALL" => Ok(Self::All),
            "ANY" => Ok(Self::Any),
            "NOT" => Ok(Self::Not),
            other => Err(format!("unknown match mode `{other}`")),
        }
    }
}

impl TryFrom<String> for MatchMode {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for MatchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Declarative claim requirement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    /// Dotted path into the token claims, e.g. `realm_access.roles`
    pub claim: String,
    #[serde(default, rename = "match")]
    pub match_mode: MatchMode,
    #[serde(default, alias = "value")]
    pub values: Vec<String>,
}

impl Rule {
    pub fn new(claim: impl Into<String>, match_mode: MatchMode, values: &[&str]) -> Self {
        Self {
            claim: claim.into(),
            match_mode,
            values: values.iter().map(ToString::to_string).collect(),
        }
    }
}

/// One policy action declared for a path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PathPolicy {
    pub policy_type: PolicyType,
    /// Name of the JWKS or OIDC client config within the policy's namespace
    pub config: String,
    #[serde(default, rename = "redirectUri")]
    pub redirect_uri: String,
    #[serde(default)]
    pub rules: Vec<Rule>,
}

/// Actions governing one path/method entry, tagged with the record that owns them
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RoutePolicy {
    pub policy_reference: String,
    pub actions: Vec<PathPolicy>,
}

impl RoutePolicy {
    pub fn new(policy_reference: impl Into<String>, actions: Vec<PathPolicy>) -> Self {
        Self {
            policy_reference: policy_reference.into(),
            actions,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}
