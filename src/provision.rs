//! Idempotent container provisioning.
//!
//! - [Create Container](https://learn.microsoft.com/en-us/rest/api/storageservices/create-container)

use bytes::Bytes;
use log::debug;

use crate::constants::ERROR_CONTAINER_ALREADY_EXISTS;
use crate::sign::{error_code, send_signed, storage_error, RequestSigner};
use crate::{Context, Credential, Result};

/// Creates the issuance container if it does not exist yet.
#[derive(Debug)]
pub struct ContainerProvisioner {
    ctx: Context,
    credential: Credential,
    endpoint: String,
    signer: RequestSigner,
}

impl ContainerProvisioner {
    /// Create a provisioner against `endpoint`, signing with `credential`.
    pub fn new(ctx: Context, credential: Credential, endpoint: impl Into<String>) -> Self {
        Self {
            ctx,
            credential,
            endpoint: endpoint.into(),
            signer: RequestSigner::new(),
        }
    }

    /// Ensure `container` exists.
    ///
    /// Succeeds both when the container was created by this call and when
    /// it already existed; the two cases are indistinguishable to the
    /// caller. Any other backend outcome is an error.
    pub async fn ensure(&self, container: &str) -> Result<()> {
        let req = http::Request::builder()
            .method(http::Method::PUT)
            .uri(format!("{}/{container}?restype=container", self.endpoint))
            .body(Bytes::new())?;

        let resp = send_signed(&self.ctx, &self.signer, &self.credential, req).await?;
        match resp.status() {
            http::StatusCode::CREATED => {
                debug!("container {container} created");
                Ok(())
            }
            http::StatusCode::CONFLICT
                if error_code(&resp) == Some(ERROR_CONTAINER_ALREADY_EXISTS) =>
            {
                debug!("container {container} already exists");
                Ok(())
            }
            _ => Err(storage_error(&resp, "create container")),
        }
    }
}
