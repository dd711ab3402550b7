//! The issuance flow: provision the container, refresh the stored access
//! policy, and mint a SAS bound to it.

use chrono::TimeDelta;
use log::{debug, info};

use crate::acl::AccessPolicyManager;
use crate::policy::AccessPolicy;
use crate::provision::ContainerProvisioner;
use crate::sas::{SasMode, ServiceSharedAccessSignature};
use crate::time::{now, DateTime};
use crate::{Config, Context, Credential, Error, Permissions, Result};

/// Outcome of one issuance.
#[derive(Debug, Clone)]
pub struct IssuanceResult {
    /// The SAS query string, ready to append to a container URI.
    pub sas_token: String,
    /// When the backend recorded the policy write backing this token.
    pub policy_last_modified: DateTime,
}

/// Issues container SAS tokens backed by a managed stored access policy.
///
/// Every call to [`issue`](Self::issue) re-provisions the container,
/// rewrites the policy with a fresh validity window, and signs a new
/// token against it. Rewriting on every call keeps the window sliding;
/// it also means a burst of concurrent calls race on the policy write,
/// with the last one defining the window all of them share.
#[derive(Debug)]
pub struct SasIssuer {
    config: Config,
    credential: Credential,
    provisioner: ContainerProvisioner,
    manager: AccessPolicyManager,
}

impl SasIssuer {
    /// Build an issuer from a resolved config.
    ///
    /// Fails if the config yields no credential or endpoint; nothing is
    /// sent to the backend yet.
    pub fn new(ctx: Context, config: Config) -> Result<Self> {
        let credential = config.credential()?;
        if !credential.is_valid() {
            return Err(Error::credential_invalid(
                "resolved credential is empty; check the account key / sas token values",
            ));
        }
        let endpoint = config.endpoint()?;
        debug!("issuer ready for endpoint {endpoint}");

        Ok(Self {
            provisioner: ContainerProvisioner::new(ctx.clone(), credential.clone(), &endpoint),
            manager: AccessPolicyManager::new(ctx, credential.clone(), &endpoint),
            config,
            credential,
        })
    }

    /// Run the full issuance flow and return a stored-policy SAS.
    pub async fn issue(&self) -> Result<IssuanceResult> {
        let container = &self.config.container;
        self.provisioner.ensure(container).await?;

        let starts_on = now();
        let expires_on = starts_on + ttl_delta(self.config.policy_ttl)?;
        let policy = AccessPolicy::new(
            &self.config.policy_id,
            starts_on,
            expires_on,
            self.config.permissions,
        )?;
        let meta = self.manager.upsert(container, &policy).await?;

        let sas_token = self
            .signature(SasMode::Policy {
                id: self.config.policy_id.clone(),
            })?
            .query_string()?;
        info!(
            "issued stored-policy sas for {container}, policy {} valid until {expires_on}",
            self.config.policy_id
        );

        Ok(IssuanceResult {
            sas_token,
            policy_last_modified: meta.last_modified,
        })
    }

    /// Mint an ad-hoc SAS with inline permissions and expiry.
    ///
    /// Purely local: no container provisioning, no policy write, and no
    /// way to revoke the token short of rotating the account key.
    pub fn issue_ad_hoc(
        &self,
        permissions: Permissions,
        expires_in: std::time::Duration,
    ) -> Result<String> {
        let token = self
            .signature(SasMode::AdHoc {
                permissions,
                starts_on: None,
                expires_on: now() + ttl_delta(expires_in)?,
            })?
            .query_string()?;
        info!("issued ad-hoc sas for {}", self.config.container);
        Ok(token)
    }

    fn signature(&self, mode: SasMode) -> Result<ServiceSharedAccessSignature> {
        let Some((account_name, account_key)) = self.credential.shared_key() else {
            return Err(Error::credential_invalid(
                "signing a sas requires a shared account key; \
                 the configured credential cannot sign one",
            ));
        };
        Ok(ServiceSharedAccessSignature::new(
            account_name,
            account_key,
            &self.config.container,
            mode,
        ))
    }
}

fn ttl_delta(ttl: std::time::Duration) -> Result<TimeDelta> {
    TimeDelta::from_std(ttl)
        .map_err(|e| Error::config_invalid(format!("ttl out of range: {ttl:?}")).with_source(e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;
    use std::time::Duration;

    fn config() -> Config {
        Config {
            account_name: Some("testaccount".to_string()),
            account_key: Some("dGVzdGtleQ==".to_string()),
            container: "c1".to_string(),
            policy_id: "p1".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_new_requires_credential() {
        let err = SasIssuer::new(Context::new(), Config::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConfigInvalid);
    }

    #[test]
    fn test_new_rejects_empty_credential() {
        // Present but empty values resolve to a credential that cannot
        // sign anything; that is caught at construction, not at issuance.
        let err = SasIssuer::new(
            Context::new(),
            Config {
                account_name: Some("testaccount".to_string()),
                account_key: Some(String::new()),
                ..Default::default()
            },
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CredentialInvalid);
    }

    #[test]
    fn test_ad_hoc_is_local() {
        // Context has no transport; ad-hoc issuance must not need one.
        let issuer = SasIssuer::new(Context::new(), config()).unwrap();
        let token = issuer
            .issue_ad_hoc(Permissions::read_write(), Duration::from_secs(600))
            .unwrap();
        assert!(token.contains("sp=rw"));
        assert!(token.contains("se="));
        assert!(!token.contains("si="));
    }

    #[test]
    fn test_ad_hoc_requires_shared_key() {
        let issuer = SasIssuer::new(
            Context::new(),
            Config {
                sas_token: Some("sv=2022-11-02&sig=abc".to_string()),
                endpoint: Some("https://testaccount.blob.core.windows.net".to_string()),
                ..Default::default()
            },
        )
        .unwrap();

        // The config resolves, but a borrowed SAS cannot sign a new one.
        let err = issuer
            .issue_ad_hoc(Permissions::read_write(), Duration::from_secs(600))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CredentialInvalid);
    }
}
