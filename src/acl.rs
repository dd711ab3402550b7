//! Stored access policy management through the container ACL.
//!
//! - [Set Container ACL](https://learn.microsoft.com/en-us/rest/api/storageservices/set-container-acl)

use bytes::Bytes;
use http::header;
use log::debug;

use crate::policy::{to_signed_identifiers_xml, AccessPolicy};
use crate::sign::{send_signed, storage_error, RequestSigner};
use crate::time::{parse_http_date, DateTime};
use crate::{Context, Credential, Error, Result};

/// Backend metadata returned from a successful policy write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyMetadata {
    /// When the container ACL was last modified, per the backend.
    pub last_modified: DateTime,
    /// Entity tag of the container after the write.
    pub etag: Option<String>,
}

/// Writes stored access policies on a container.
///
/// The container ACL write is total: the set of signed identifiers sent
/// becomes the container's complete policy set, and anything previously
/// stored is gone. Callers that need to preserve other policies must read
/// them first and include them in the list; concurrent writers can still
/// clobber each other, last write wins.
#[derive(Debug)]
pub struct AccessPolicyManager {
    ctx: Context,
    credential: Credential,
    endpoint: String,
    signer: RequestSigner,
}

impl AccessPolicyManager {
    /// Create a manager against `endpoint`, signing with `credential`.
    pub fn new(ctx: Context, credential: Credential, endpoint: impl Into<String>) -> Self {
        Self {
            ctx,
            credential,
            endpoint: endpoint.into(),
            signer: RequestSigner::new(),
        }
    }

    /// Replace the container's entire policy set with `policies`.
    pub async fn replace_policy_set(
        &self,
        container: &str,
        policies: &[AccessPolicy],
    ) -> Result<PolicyMetadata> {
        let body = to_signed_identifiers_xml(policies)?;
        debug!(
            "replacing policy set on {container} with {} policies",
            policies.len()
        );

        let req = http::Request::builder()
            .method(http::Method::PUT)
            .uri(format!(
                "{}/{container}?restype=container&comp=acl",
                self.endpoint
            ))
            .header(header::CONTENT_TYPE, "application/xml")
            .body(Bytes::from(body))?;

        let resp = send_signed(&self.ctx, &self.signer, &self.credential, req).await?;
        if resp.status() != http::StatusCode::OK {
            return Err(storage_error(&resp, "set container acl"));
        }

        let last_modified = resp
            .headers()
            .get(header::LAST_MODIFIED)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                Error::unexpected("set container acl response carries no Last-Modified header")
            })
            .and_then(parse_http_date)?;
        let etag = resp
            .headers()
            .get(header::ETAG)
            .and_then(|v| v.to_str().ok())
            .map(Into::into);

        Ok(PolicyMetadata {
            last_modified,
            etag,
        })
    }

    /// Install `policy` as the container's sole stored access policy.
    ///
    /// This is the issuance path's destructive upsert: any other policy on
    /// the container is removed by the same write.
    pub async fn upsert(&self, container: &str, policy: &AccessPolicy) -> Result<PolicyMetadata> {
        self.replace_policy_set(container, std::slice::from_ref(policy))
            .await
    }
}
