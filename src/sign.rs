//! Shared Key authorization for the storage REST calls this crate makes
//! (create container, set container ACL).
//!
//! - [Authorize with Shared Key](https://docs.microsoft.com/en-us/rest/api/storageservices/authorize-with-shared-key)

use std::fmt::Write;

use bytes::Bytes;
use http::request::Parts;
use http::{header, HeaderName, HeaderValue};
use log::debug;

use crate::constants::{STORAGE_VERSION, X_MS_DATE, X_MS_ERROR_CODE, X_MS_VERSION};
use crate::hash::{base64_decode, base64_hmac_sha256};
use crate::time::{format_http_date, now, DateTime};
use crate::{Context, Credential, Error, Result};

const CONTENT_MD5: HeaderName = HeaderName::from_static("content-md5");

/// Signs outgoing backend requests with the account's shared key.
#[derive(Debug, Default)]
pub(crate) struct RequestSigner {
    time: Option<DateTime>,
}

impl RequestSigner {
    pub fn new() -> Self {
        Self { time: None }
    }

    /// Pin the signing time. Only for tests; production signing always
    /// takes the current time.
    #[cfg(test)]
    pub fn with_time(mut self, time: DateTime) -> Self {
        self.time = Some(time);
        self
    }

    /// Add `x-ms-date`, `x-ms-version` and the `Authorization` header.
    pub fn sign(&self, req: &mut Parts, credential: &Credential) -> Result<()> {
        let Some((account_name, account_key)) = credential.shared_key() else {
            return Err(Error::credential_invalid(
                "management requests require a shared account key; \
                 the configured credential cannot sign them",
            ));
        };

        let signing_time = self.time.unwrap_or_else(now);
        req.headers
            .insert(X_MS_DATE, format_http_date(signing_time).parse()?);
        req.headers
            .insert(X_MS_VERSION, HeaderValue::from_static(STORAGE_VERSION));

        let string_to_sign = string_to_sign(req, account_name)?;
        let key = base64_decode(account_key)
            .map_err(|e| Error::credential_invalid("account key is not valid base64").with_source(e))?;
        let signature = base64_hmac_sha256(&key, string_to_sign.as_bytes());

        req.headers.insert(header::AUTHORIZATION, {
            let mut value: HeaderValue =
                format!("SharedKey {account_name}:{signature}").parse()?;
            value.set_sensitive(true);
            value
        });

        Ok(())
    }
}

/// Construct the string to sign.
///
/// ## Format
///
/// ```text
/// VERB + "\n" +
/// Content-Encoding + "\n" +
/// Content-Language + "\n" +
/// Content-Length + "\n" +
/// Content-MD5 + "\n" +
/// Content-Type + "\n" +
/// Date + "\n" +
/// If-Modified-Since + "\n" +
/// If-Match + "\n" +
/// If-None-Match + "\n" +
/// If-Unmodified-Since + "\n" +
/// Range + "\n" +
/// CanonicalizedHeaders +
/// CanonicalizedResource;
/// ```
fn string_to_sign(req: &Parts, account_name: &str) -> Result<String> {
    let mut s = String::with_capacity(128);

    writeln!(&mut s, "{}", req.method.as_str())?;
    writeln!(&mut s, "{}", header_or_default(req, &header::CONTENT_ENCODING)?)?;
    writeln!(&mut s, "{}", header_or_default(req, &header::CONTENT_LANGUAGE)?)?;
    writeln!(&mut s, "{}", {
        // An empty body is signed as an empty string, not "0".
        let v = header_or_default(req, &header::CONTENT_LENGTH)?;
        if v == "0" {
            ""
        } else {
            v
        }
    })?;
    writeln!(&mut s, "{}", header_or_default(req, &CONTENT_MD5)?)?;
    writeln!(&mut s, "{}", header_or_default(req, &header::CONTENT_TYPE)?)?;
    writeln!(&mut s, "{}", header_or_default(req, &header::DATE)?)?;
    writeln!(&mut s, "{}", header_or_default(req, &header::IF_MODIFIED_SINCE)?)?;
    writeln!(&mut s, "{}", header_or_default(req, &header::IF_MATCH)?)?;
    writeln!(&mut s, "{}", header_or_default(req, &header::IF_NONE_MATCH)?)?;
    writeln!(&mut s, "{}", header_or_default(req, &header::IF_UNMODIFIED_SINCE)?)?;
    writeln!(&mut s, "{}", header_or_default(req, &header::RANGE)?)?;
    writeln!(&mut s, "{}", canonicalize_headers(req)?)?;
    write!(&mut s, "{}", canonicalize_resource(req, account_name))?;

    debug!("string to sign: {}", &s);

    Ok(s)
}

fn header_or_default<'a>(req: &'a Parts, key: &HeaderName) -> Result<&'a str> {
    match req.headers.get(key) {
        Some(v) => Ok(v.to_str()?),
        None => Ok(""),
    }
}

/// All `x-ms-` headers, lowercased and sorted, joined as `name:value`
/// lines. A header value that is not valid utf-8 cannot be signed.
fn canonicalize_headers(req: &Parts) -> Result<String> {
    let mut headers: Vec<(String, &str)> = Vec::new();
    for (k, v) in req.headers.iter() {
        if k.as_str().starts_with("x-ms-") {
            headers.push((k.as_str().to_lowercase(), v.to_str()?));
        }
    }
    headers.sort();

    let mut s = String::new();
    for (idx, (k, v)) in headers.into_iter().enumerate() {
        if idx != 0 {
            s.push('\n');
        }
        s.push_str(&k);
        s.push(':');
        s.push_str(v);
    }
    Ok(s)
}

/// `/{account}{path}` plus the sorted, decoded query parameters as
/// `name:value` lines.
fn canonicalize_resource(req: &Parts, account_name: &str) -> String {
    let path = req.uri.path();

    let mut query: Vec<(String, String)> = req
        .uri
        .query()
        .map(|q| {
            form_urlencoded::parse(q.as_bytes())
                .map(|(k, v)| (k.to_lowercase(), v.into_owned()))
                .collect()
        })
        .unwrap_or_default();

    if query.is_empty() {
        return format!("/{account_name}{path}");
    }
    query.sort();

    let mut s = format!("/{account_name}{path}");
    for (k, v) in query {
        s.push('\n');
        s.push_str(&k);
        s.push(':');
        s.push_str(&v);
    }
    s
}

/// Sign and send one backend request.
pub(crate) async fn send_signed(
    ctx: &Context,
    signer: &RequestSigner,
    credential: &Credential,
    req: http::Request<Bytes>,
) -> Result<http::Response<Bytes>> {
    let (mut parts, body) = req.into_parts();
    signer.sign(&mut parts, credential)?;
    ctx.http_send(http::Request::from_parts(parts, body)).await
}

/// The `x-ms-error-code` header of a failed response, if present.
pub(crate) fn error_code(resp: &http::Response<Bytes>) -> Option<&str> {
    resp.headers()
        .get(X_MS_ERROR_CODE)
        .and_then(|v| v.to_str().ok())
}

/// Map a non-success backend response to a storage error, preserving the
/// status, service error code, and body.
pub(crate) fn storage_error(resp: &http::Response<Bytes>, what: &str) -> Error {
    Error::storage(format!(
        "{what} failed: status {}, error code {}: {}",
        resp.status(),
        error_code(resp).unwrap_or("unknown"),
        String::from_utf8_lossy(resp.body()).trim(),
    ))
}
