mod credentials;

use std::env;
use std::fmt::Display;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

pub use crate::credentials::Credentials;

const ORGANIZATION_VAR: &str = "CONCORD_ORGANIZATION";
const ENVIRONMENT_VAR: &str = "CONCORD_ENVIRONMENT";
const TOKEN_VAR: &str = "CONCORD_TOKEN";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ContextError {
    #[error("missing environment variable: {0}")]
    MissingVar(&'static str),

    #[error("environment variable {0} is empty")]
    EmptyVar(&'static str),
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrganizationId(String);

impl OrganizationId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for OrganizationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EnvironmentName(String);

impl EnvironmentName {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for EnvironmentName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Who is calling and where: passed by reference into every backend call.
///
/// Immutable once built. Nothing in the engine reads organization,
/// environment or credentials from anywhere else.
#[derive(Debug, Clone)]
pub struct Context {
    organization: OrganizationId,
    environment: EnvironmentName,
    credentials: Credentials,
}

impl Context {
    pub fn new(
        organization: OrganizationId,
        environment: EnvironmentName,
        credentials: Credentials,
    ) -> Self {
        Self {
            organization,
            environment,
            credentials,
        }
    }

    /// Build from `CONCORD_ORGANIZATION`, `CONCORD_ENVIRONMENT` and
    /// `CONCORD_TOKEN`.
    pub fn from_env() -> Result<Self, ContextError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ContextError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &'static str| -> Result<String, ContextError> {
            let value = lookup(name).ok_or(ContextError::MissingVar(name))?;
            if value.trim().is_empty() {
                return Err(ContextError::EmptyVar(name));
            }
            Ok(value)
        };

        let organization = OrganizationId::new(var(ORGANIZATION_VAR)?);
        let environment = EnvironmentName::new(var(ENVIRONMENT_VAR)?);
        let credentials = Credentials::new(var(TOKEN_VAR)?);
        debug!(%organization, %environment, "context loaded from environment");

        Ok(Self::new(organization, environment, credentials))
    }

    pub fn organization(&self) -> &OrganizationId {
        &self.organization
    }

    pub fn environment(&self) -> &EnvironmentName {
        &self.environment
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| vars.get(name).cloned()
    }

    #[test]
    fn loads_all_vars() {
        let ctx = Context::from_lookup(lookup(&[
            ("CONCORD_ORGANIZATION", "acme"),
            ("CONCORD_ENVIRONMENT", "staging"),
            ("CONCORD_TOKEN", "s3cret"),
        ]))
        .unwrap();
        assert_eq!(ctx.organization().as_str(), "acme");
        assert_eq!(ctx.environment().as_str(), "staging");
        assert_eq!(ctx.credentials().expose(), "s3cret");
    }

    #[test]
    fn missing_var() {
        let err = Context::from_lookup(lookup(&[("CONCORD_ORGANIZATION", "acme")])).unwrap_err();
        assert_eq!(err, ContextError::MissingVar("CONCORD_ENVIRONMENT"));
    }

    #[test]
    fn empty_var() {
        let err = Context::from_lookup(lookup(&[
            ("CONCORD_ORGANIZATION", "acme"),
            ("CONCORD_ENVIRONMENT", "prod"),
            ("CONCORD_TOKEN", "  "),
        ]))
        .unwrap_err();
        assert_eq!(err, ContextError::EmptyVar("CONCORD_TOKEN"));
    }
}
