//! Verified claim sets and claim rule matching

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::policy::{MatchMode, Rule};

/// JSON value of a single claim
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ClaimValue {
    Null,
    Bool(bool),
    Number(serde_json::Number),
    String(String),
    Array(Vec<ClaimValue>),
    Object(BTreeMap<String, ClaimValue>),
}

impl ClaimValue {
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Number(_) => "number",
            Self::String(_) => "string",
            Self::Array(_) => "array",
            Self::Object(_) => "object",
        }
    }

    /// Value set a rule is matched against.
    ///
    /// Strings split on spaces (`scope` style), scalars stringify, arrays
    /// stringify element-wise. Objects and nested containers are unsupported.
    pub fn match_set(&self) -> Result<HashSet<String>, String> {
        match self {
            Self::Null => Ok(HashSet::new()),
            Self::Bool(b) => Ok(HashSet::from([b.to_string()])),
            Self::Number(n) => Ok(HashSet::from([n.to_string()])),
            Self::String(s) => Ok(s.split(' ').map(str::to_string).collect()),
            Self::Array(items) => items
                .iter()
                .map(|item| match item {
                    Self::Bool(b) => Ok(b.to_string()),
                    Self::Number(n) => Ok(n.to_string()),
                    Self::String(s) => Ok(s.clone()),
                    other => Err(unsupported(other)),
                })
                .collect(),
            Self::Object(_) => Err(unsupported(self)),
        }
    }
}

fn unsupported(value: &ClaimValue) -> String {
    format!("claim is not of a supported type: {}", value.type_name())
}

/// Claim set of a verified token
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Claims(BTreeMap<String, ClaimValue>);

/// Result of resolving a dotted claim path
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Resolved<'a> {
    Value(&'a ClaimValue),
    /// Every intermediate object exists but the leaf does not
    MissingLeaf,
    /// An intermediate segment is absent or not an object
    BrokenPath,
}

impl Claims {
    pub fn get(&self, name: &str) -> Option<&ClaimValue> {
        self.0.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ClaimValue)> {
        self.0.iter()
    }

    /// Resolve `a.b.c` through nested objects
    pub fn resolve(&self, path: &str) -> Resolved<'_> {
        let (parents, leaf) = match path.rsplit_once('.') {
            Some((parents, leaf)) => (Some(parents), leaf),
            None => (None, path),
        };
        let mut current = &self.0;
        for segment in parents.into_iter().flat_map(|p| p.split('.')) {
            match current.get(segment) {
                Some(ClaimValue::Object(inner)) => current = inner,
                _ => return Resolved::BrokenPath,
            }
        }
        match current.get(leaf) {
            Some(ClaimValue::Null) | None => Resolved::MissingLeaf,
            Some(value) => Resolved::Value(value),
        }
    }
}

impl From<BTreeMap<String, ClaimValue>> for Claims {
    fn from(map: BTreeMap<String, ClaimValue>) -> Self {
        Self(map)
    }
}

/// `[a b c]`
pub(crate) fn format_values(values: &[String]) -> String {
    format!("[{}]", values.join(" "))
}

/// Check one rule against the claim set, returning the rejection message on failure
pub fn check_rule(rule: &Rule, claims: &Claims) -> Result<(), String> {
    let name = rule.claim.as_str();
    let expected = format_values(&rule.values);
    let does_not_exist = || {
        format!("token validation error - expected claim `{name}` does not exist - rule requires: {expected}")
    };

    let present = match claims.resolve(name) {
        Resolved::Value(value) => value.match_set()?,
        Resolved::BrokenPath => return Err(does_not_exist()),
        Resolved::MissingLeaf => match rule.match_mode {
            MatchMode::Not => return Ok(()),
            MatchMode::All | MatchMode::Any => return Err(does_not_exist()),
        },
    };

    match rule.match_mode {
        MatchMode::All => {
            if rule.values.is_empty() {
                return Err(format!(
                    "token validation error - expected claim `{name}` to match all of: {expected}, but is empty"
                ));
            }
            if rule.values.iter().all(|v| present.contains(v)) {
                Ok(())
            } else {
                Err(format!(
                    "token validation error - expected claim `{name}` to match all of: {expected}"
                ))
            }
        }
        MatchMode::Any => {
            if rule.values.iter().any(|v| present.contains(v)) {
                Ok(())
            } else {
                Err(format!(
                    "token validation error - expected claim `{name}` to match one of: {expected}"
                ))
            }
        }
        MatchMode::Not => {
            if rule.values.iter().any(|v| present.contains(v)) {
                Err(format!(
                    "token validation error - expected claim `{name}` to not match any of: {expected}"
                ))
            } else {
                Ok(())
            }
        }
    }
}
