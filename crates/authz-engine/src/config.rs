//! Engine configuration.
//!
//! Configuration is loaded from environment variables with defaults that
//! match a conventional application layout (`application` fallback resource,
//! `log/authorization.log`).

use authz_rules::ResourceName;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{AuthzError, AuthzResult};

/// Authorization engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorizationConfig {
    /// Resource consulted after the requested one.
    pub fallback_resource: String,

    /// Prefix stripped from paths before route resolution (e.g. `/appname`).
    pub relative_url_root: Option<String>,

    /// Tag at the start of every authorization log line.
    pub log_tag: String,

    /// Authorization log file.
    pub log_path: PathBuf,

    /// Most verbose level written to the authorization log.
    pub log_level: String,
}

impl Default for AuthorizationConfig {
    fn default() -> Self {
        Self {
            fallback_resource: ResourceName::APPLICATION.to_string(),
            relative_url_root: None,
            log_tag: "Auth |".to_string(),
            log_path: PathBuf::from("log").join("authorization.log"),
            log_level: "info".to_string(),
        }
    }
}

impl AuthorizationConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `AUTHZ_FALLBACK_RESOURCE`: Fallback resource (default: application)
    /// - `AUTHZ_RELATIVE_URL_ROOT`: Path prefix to strip (default: none)
    /// - `AUTHZ_LOG_TAG`: Log line tag (default: "Auth |")
    /// - `AUTHZ_LOG_PATH`: Log file (default: log/authorization.log)
    /// - `AUTHZ_LOG_LEVEL`: Authorization log level (default: info)
    pub fn from_env() -> Self {
        let default = Self::default();

        Self {
            fallback_resource: std::env::var("AUTHZ_FALLBACK_RESOURCE")
                .unwrap_or(default.fallback_resource),
            relative_url_root: std::env::var("AUTHZ_RELATIVE_URL_ROOT")
                .ok()
                .filter(|s| !s.is_empty()),
            log_tag: std::env::var("AUTHZ_LOG_TAG").unwrap_or(default.log_tag),
            log_path: std::env::var("AUTHZ_LOG_PATH")
                .map(PathBuf::from)
                .unwrap_or(default.log_path),
            log_level: std::env::var("AUTHZ_LOG_LEVEL").unwrap_or(default.log_level),
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> AuthzResult<()> {
        self.fallback()?;
        if let Some(root) = &self.relative_url_root {
            if !root.starts_with('/') {
                return Err(AuthzError::Config {
                    key: "relative_url_root".to_string(),
                    message: format!("must start with '/', got {:?}", root),
                });
            }
        }
        Ok(())
    }

    /// The fallback resource as a validated name.
    pub fn fallback(&self) -> AuthzResult<ResourceName> {
        ResourceName::parse(&self.fallback_resource).map_err(|e| AuthzError::Config {
            key: "fallback_resource".to_string(),
            message: e.to_string(),
        })
    }
}
