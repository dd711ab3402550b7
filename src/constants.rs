use http::HeaderName;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC};

// Storage service REST headers.
pub const X_MS_DATE: HeaderName = HeaderName::from_static("x-ms-date");
pub const X_MS_VERSION: HeaderName = HeaderName::from_static("x-ms-version");
pub const X_MS_ERROR_CODE: HeaderName = HeaderName::from_static("x-ms-error-code");

/// Service version sent with every request and signed into every SAS.
pub const STORAGE_VERSION: &str = "2022-11-02";

/// Error code returned for an idempotent re-create of a container.
pub const ERROR_CONTAINER_ALREADY_EXISTS: &str = "ContainerAlreadyExists";

// Environment variables.
pub const ENV_CONNECTION_STRING: &str = "AzureWebJobsStorage";
pub const ENV_ACCOUNT_NAME: &str = "AZBLOB_ACCOUNT_NAME";
pub const ENV_ACCOUNT_KEY: &str = "AZBLOB_ACCOUNT_KEY";
pub const ENV_ENDPOINT: &str = "AZBLOB_ENDPOINT";
pub const ENV_CONTAINER: &str = "SAS_CONTAINER";
pub const ENV_POLICY_ID: &str = "SAS_POLICY_ID";
pub const ENV_POLICY_TTL_SECS: &str = "SAS_POLICY_TTL_SECS";
pub const ENV_PERMISSIONS: &str = "SAS_PERMISSIONS";

// Defaults carried over from the function this service replaces. Both are
// overridable through the environment.
pub const DEFAULT_CONTAINER: &str = "mlblobcontainer2137";
pub const DEFAULT_POLICY_ID: &str = "mlsaspolicy2137";
pub const DEFAULT_POLICY_TTL_SECS: u64 = 3600;

/// Characters percent-encoded in SAS query values. Unreserved characters
/// stay as-is; everything else (notably `+`, `/`, `=` in base64
/// signatures and `:` in timestamps) is escaped.
pub const QUERY_ENCODE_SET: AsciiSet = NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');
