//! Container SAS issuance for Azure Blob Storage.
//!
//! The flow this crate implements:
//!
//! 1. ensure the configured container exists ([`ContainerProvisioner`]),
//! 2. install a fresh stored access policy on it ([`AccessPolicyManager`]),
//! 3. sign a container SAS referencing that policy
//!    ([`ServiceSharedAccessSignature`]).
//!
//! [`SasIssuer`] ties the three together; the `sas-issuer` binary exposes
//! the flow over HTTP.
//!
//! # Example
//!
//! ```no_run
//! use sas_issuer::{Config, Context, OsEnv, ReqwestHttpSend, SasIssuer};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let ctx = Context::new()
//!         .with_http_send(ReqwestHttpSend::default())
//!         .with_env(OsEnv);
//!     let config = Config::default().from_env(&ctx)?;
//!
//!     let issuer = SasIssuer::new(ctx, config)?;
//!     let issued = issuer.issue().await?;
//!     println!("{}", issued.sas_token);
//!     Ok(())
//! }
//! ```

mod error;
pub use error::{Error, ErrorKind, Result};

mod context;
pub use context::{
    Context, Env, HttpSend, NoopEnv, NoopHttpSend, OsEnv, RecordedRequest, ReplayHttpSend,
    ReqwestHttpSend, StaticEnv,
};

mod config;
pub use config::Config;

mod credential;
pub use credential::Credential;

mod policy;
pub use policy::{AccessPolicy, Permissions};

mod provision;
pub use provision::ContainerProvisioner;

mod acl;
pub use acl::{AccessPolicyManager, PolicyMetadata};

mod sas;
pub use sas::{SasMode, ServiceSharedAccessSignature};

mod issuer;
pub use issuer::{IssuanceResult, SasIssuer};

mod connection_string;
mod constants;
mod hash;
mod sign;
pub mod time;
