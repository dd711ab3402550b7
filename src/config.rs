use std::fmt::{Debug, Formatter};
use std::time::Duration;

use crate::connection_string;
use crate::constants::*;
use crate::credential::Redact;
use crate::{Context, Credential, Error, Permissions, Result};

/// Configuration for the issuance flow.
///
/// Everything is injectable: the container name, policy identifier,
/// window length, and permission set that the original deployment
/// hard-coded are plain fields here, with the historical values as
/// defaults.
#[derive(Clone)]
#[cfg_attr(test, derive(PartialEq))]
pub struct Config {
    /// Storage account name.
    pub account_name: Option<String>,
    /// Storage account key, base64 encoded.
    pub account_key: Option<String>,
    /// Pre-issued SAS token. Cannot sign; kept so misconfiguration is
    /// reported as such instead of surfacing as a generic failure.
    pub sas_token: Option<String>,
    /// Blob service endpoint, e.g. `https://{account}.blob.core.windows.net`.
    pub endpoint: Option<String>,
    /// Container the policies and tokens are scoped to.
    pub container: String,
    /// Well-known stored access policy identifier managed by this service.
    pub policy_id: String,
    /// Validity window length for each freshly upserted policy.
    pub policy_ttl: Duration,
    /// Permission set granted by the managed policy. Defaults to the full
    /// grant the original function used; override for least privilege.
    pub permissions: Permissions,
}

impl Debug for Config {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("account_name", &self.account_name)
            .field("account_key", &self.account_key.as_deref().map(Redact))
            .field("sas_token", &self.sas_token.as_deref().map(Redact))
            .field("endpoint", &self.endpoint)
            .field("container", &self.container)
            .field("policy_id", &self.policy_id)
            .field("policy_ttl", &self.policy_ttl)
            .field("permissions", &self.permissions)
            .finish()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            account_name: None,
            account_key: None,
            sas_token: None,
            endpoint: None,
            container: DEFAULT_CONTAINER.to_string(),
            policy_id: DEFAULT_POLICY_ID.to_string(),
            policy_ttl: Duration::from_secs(DEFAULT_POLICY_TTL_SECS),
            permissions: Permissions::all(),
        }
    }
}

impl Config {
    /// Load config from the environment behind `ctx`.
    ///
    /// `AzureWebJobsStorage` (the hosting platform's connection string) is
    /// consulted first, then individual `AZBLOB_*` variables override its
    /// fields, then the issuance knobs (`SAS_CONTAINER`, `SAS_POLICY_ID`,
    /// `SAS_POLICY_TTL_SECS`, `SAS_PERMISSIONS`).
    pub fn from_env(mut self, ctx: &Context) -> Result<Self> {
        if let Some(conn_str) = ctx.env_var(ENV_CONNECTION_STRING) {
            let parsed = Self::try_from_connection_string(&conn_str)?;
            self.account_name = parsed.account_name.or(self.account_name);
            self.account_key = parsed.account_key.or(self.account_key);
            self.sas_token = parsed.sas_token.or(self.sas_token);
            self.endpoint = parsed.endpoint.or(self.endpoint);
        }

        if let Some(v) = ctx.env_var(ENV_ACCOUNT_NAME) {
            self.account_name = Some(v);
        }
        if let Some(v) = ctx.env_var(ENV_ACCOUNT_KEY) {
            self.account_key = Some(v);
        }
        if let Some(v) = ctx.env_var(ENV_ENDPOINT) {
            self.endpoint = Some(v);
        }
        if let Some(v) = ctx.env_var(ENV_CONTAINER) {
            self.container = v;
        }
        if let Some(v) = ctx.env_var(ENV_POLICY_ID) {
            self.policy_id = v;
        }
        if let Some(v) = ctx.env_var(ENV_POLICY_TTL_SECS) {
            let secs = v.parse::<u64>().map_err(|e| {
                Error::config_invalid(format!("invalid {ENV_POLICY_TTL_SECS}: {v}")).with_source(e)
            })?;
            self.policy_ttl = Duration::from_secs(secs);
        }
        if let Some(v) = ctx.env_var(ENV_PERMISSIONS) {
            self.permissions = v.parse()?;
        }

        Ok(self)
    }

    /// Parse a connection string directly into a config.
    pub fn try_from_connection_string(conn_str: &str) -> Result<Self> {
        let parsed = connection_string::parse(conn_str)?;
        Ok(Self {
            account_name: parsed.account_name,
            account_key: parsed.account_key,
            sas_token: parsed.sas_token,
            endpoint: parsed.endpoint,
            ..Default::default()
        })
    }

    /// Resolve the credential this config describes.
    pub fn credential(&self) -> Result<Credential> {
        if let (Some(name), Some(key)) = (&self.account_name, &self.account_key) {
            return Ok(Credential::with_shared_key(name, key));
        }
        if let Some(token) = &self.sas_token {
            return Ok(Credential::with_sas_token(token));
        }
        Err(Error::config_invalid(format!(
            "no usable credential: set {ENV_CONNECTION_STRING} or {ENV_ACCOUNT_NAME}/{ENV_ACCOUNT_KEY}"
        )))
    }

    /// Resolve the blob endpoint, without a trailing slash.
    pub fn endpoint(&self) -> Result<String> {
        if let Some(endpoint) = &self.endpoint {
            return Ok(endpoint.trim_end_matches('/').to_string());
        }
        if let Some(name) = &self.account_name {
            return Ok(format!("https://{name}.blob.core.windows.net"));
        }
        Err(Error::config_invalid(format!(
            "endpoint cannot be resolved: set {ENV_ENDPOINT} or an account name"
        )))
    }
}
