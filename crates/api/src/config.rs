use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{Context, Result};

use gatekeep_auth::{NameCase, Permission};

/// API process configuration sourced from environment variables.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub bind_addr: SocketAddr,
    /// `None` runs against the in-memory store.
    pub database_url: Option<String>,
    /// Identity service base URL; `None` derives it from the request host.
    pub identity_base_url: Option<String>,
    pub identity_timeout: Duration,
    pub names: NameCase,
    pub guest_permissions: Vec<Permission>,
    pub refresh_interval: Duration,
}

impl ApiConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let bind_addr = lookup("BIND_ADDR")
            .unwrap_or_else(|| "0.0.0.0:8080".to_string())
            .parse()
            .with_context(|| "parse BIND_ADDR")?;

        let database_url = lookup("DATABASE_URL").filter(|v| !v.is_empty());

        let identity_base_url = lookup("PLATFORM_APISERVER_DOMAIN")
            .map(|v| v.trim_end_matches('/').to_string())
            .filter(|v| !v.is_empty());

        let identity_timeout = Duration::from_secs(
            lookup("IDENTITY_TIMEOUT_SECS")
                .map(|v| v.parse::<u64>())
                .transpose()
                .with_context(|| "parse IDENTITY_TIMEOUT_SECS")?
                .unwrap_or(10),
        );

        let case_sensitive = lookup("CASE_SENSITIVE")
            .map(|v| v.parse::<bool>())
            .transpose()
            .with_context(|| "parse CASE_SENSITIVE")?
            .unwrap_or(false);

        let guest_permissions = match lookup("GUEST_PERMISSIONS") {
            Some(raw) if !raw.trim().is_empty() => {
                serde_json::from_str(&raw).with_context(|| "parse GUEST_PERMISSIONS")?
            }
            _ => Vec::new(),
        };

        let refresh_interval = Duration::from_secs(
            lookup("PERMISSION_REFRESH_SECS")
                .map(|v| v.parse::<u64>())
                .transpose()
                .with_context(|| "parse PERMISSION_REFRESH_SECS")?
                .unwrap_or(30),
        );

        Ok(Self {
            bind_addr,
            database_url,
            identity_base_url,
            identity_timeout,
            names: NameCase::from_case_sensitive(case_sensitive),
            guest_permissions,
            refresh_interval,
        })
    }
}
