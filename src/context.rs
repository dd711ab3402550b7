//! Execution context: pluggable environment access and HTTP transport.
//!
//! The issuer never talks to `std::env` or a concrete HTTP client
//! directly. Everything goes through [`Context`], so tests can script
//! backend responses and inject environments without touching process
//! state.

use std::collections::HashMap;
use std::collections::VecDeque;
use std::fmt::Debug;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::BodyExt;

use crate::{Error, Result};

/// Context carries the environment and HTTP implementations used by the
/// issuance flow.
///
/// A fresh `Context::new()` uses no-op implementations; configure the
/// components you need with the `with_*` builders.
#[derive(Clone)]
pub struct Context {
    http: Arc<dyn HttpSend>,
    env: Arc<dyn Env>,
}

impl Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("http", &self.http)
            .field("env", &self.env)
            .finish()
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl Context {
    /// Create a new Context with no-op implementations.
    pub fn new() -> Self {
        Self {
            http: Arc::new(NoopHttpSend),
            env: Arc::new(NoopEnv),
        }
    }

    /// Replace the HTTP transport implementation.
    pub fn with_http_send(mut self, http: impl HttpSend) -> Self {
        self.http = Arc::new(http);
        self
    }

    /// Replace the environment implementation.
    pub fn with_env(mut self, env: impl Env) -> Self {
        self.env = Arc::new(env);
        self
    }

    /// Send an HTTP request and return the collected response.
    #[inline]
    pub async fn http_send(&self, req: http::Request<Bytes>) -> Result<http::Response<Bytes>> {
        self.http.http_send(req).await
    }

    /// Get an environment variable.
    #[inline]
    pub fn env_var(&self, key: &str) -> Option<String> {
        self.env.var(key)
    }
}

/// Environment variable access.
pub trait Env: Debug + Send + Sync + 'static {
    /// Get an environment variable.
    ///
    /// Returns `None` if the variable is unset or not valid utf-8.
    fn var(&self, key: &str) -> Option<String>;
}

/// Env backed by the process environment.
#[derive(Debug, Copy, Clone)]
pub struct OsEnv;

impl Env for OsEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var_os(key)?.into_string().ok()
    }
}

/// Env backed by a fixed map. Useful for tests.
#[derive(Debug, Clone, Default)]
pub struct StaticEnv {
    /// The environment variables to use.
    pub envs: HashMap<String, String>,
}

impl Env for StaticEnv {
    fn var(&self, key: &str) -> Option<String> {
        self.envs.get(key).cloned()
    }
}

/// NoopEnv always returns `None`.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopEnv;

impl Env for NoopEnv {
    fn var(&self, _key: &str) -> Option<String> {
        None
    }
}

/// HTTP transport used for the storage backend round-trips.
#[async_trait]
pub trait HttpSend: Debug + Send + Sync + 'static {
    /// Send an HTTP request and return the response with a collected body.
    async fn http_send(&self, req: http::Request<Bytes>) -> Result<http::Response<Bytes>>;
}

/// NoopHttpSend always returns an error. Used when no transport is
/// configured, e.g. for SAS computation that never leaves the process.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopHttpSend;

#[async_trait]
impl HttpSend for NoopHttpSend {
    async fn http_send(&self, _req: http::Request<Bytes>) -> Result<http::Response<Bytes>> {
        Err(Error::unexpected(
            "HTTP sending not supported: no HTTP client configured",
        ))
    }
}

/// HttpSend backed by a `reqwest::Client`.
#[derive(Debug, Default)]
pub struct ReqwestHttpSend {
    client: reqwest::Client,
}

impl ReqwestHttpSend {
    /// Create a new ReqwestHttpSend from an existing client.
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HttpSend for ReqwestHttpSend {
    async fn http_send(&self, req: http::Request<Bytes>) -> Result<http::Response<Bytes>> {
        let req = reqwest::Request::try_from(req)
            .map_err(|e| Error::unexpected("failed to build http request").with_source(e))?;
        let resp: http::Response<_> = self
            .client
            .execute(req)
            .await
            .map_err(|e| Error::storage("failed to send http request").with_source(e))?
            .into();

        let (parts, body) = resp.into_parts();
        let bs = BodyExt::collect(body)
            .await
            .map(|buf| buf.to_bytes())
            .map_err(|e| Error::storage("failed to read http response").with_source(e))?;
        Ok(http::Response::from_parts(parts, bs))
    }
}

/// A recorded request, kept by [`ReplayHttpSend`] for later inspection.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    /// Request method.
    pub method: http::Method,
    /// Full request URI.
    pub uri: String,
    /// Request headers.
    pub headers: http::HeaderMap,
    /// Request body.
    pub body: Bytes,
}

/// Scripted HttpSend: replays canned responses in order and records every
/// request it sees. Clones share state, so tests keep one handle for
/// inspection and move the other into a [`Context`].
#[derive(Debug, Clone, Default)]
pub struct ReplayHttpSend {
    responses: Arc<Mutex<VecDeque<http::Response<Bytes>>>>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl ReplayHttpSend {
    /// Create a scripted transport from an ordered list of responses.
    pub fn new(responses: Vec<http::Response<Bytes>>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses.into())),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// All requests sent so far, in order.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().expect("lock poisoned").clone()
    }
}

#[async_trait]
impl HttpSend for ReplayHttpSend {
    async fn http_send(&self, req: http::Request<Bytes>) -> Result<http::Response<Bytes>> {
        let (parts, body) = req.into_parts();
        self.requests.lock().expect("lock poisoned").push(RecordedRequest {
            method: parts.method,
            uri: parts.uri.to_string(),
            headers: parts.headers,
            body,
        });

        self.responses
            .lock()
            .expect("lock poisoned")
            .pop_front()
            .ok_or_else(|| Error::unexpected("no scripted response left"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_replay_http_send() {
        let transport = ReplayHttpSend::new(vec![http::Response::builder()
            .status(201)
            .body(Bytes::new())
            .unwrap()]);
        let ctx = Context::new().with_http_send(transport.clone());

        let req = http::Request::builder()
            .method(http::Method::PUT)
            .uri("https://testaccount.blob.core.windows.net/c1?restype=container")
            .body(Bytes::new())
            .unwrap();
        let resp = ctx.http_send(req).await.unwrap();
        assert_eq!(resp.status(), 201);

        let recorded = transport.requests();
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].method, http::Method::PUT);
        assert!(recorded[0].uri.contains("restype=container"));

        // Script exhausted.
        let req = http::Request::builder()
            .uri("https://testaccount.blob.core.windows.net/")
            .body(Bytes::new())
            .unwrap();
        assert!(ctx.http_send(req).await.is_err());
    }

    #[test]
    fn test_static_env() {
        let env = StaticEnv {
            envs: HashMap::from([("SAS_CONTAINER".to_string(), "c1".to_string())]),
        };
        let ctx = Context::new().with_env(env);

        assert_eq!(ctx.env_var("SAS_CONTAINER").as_deref(), Some("c1"));
        assert_eq!(ctx.env_var("MISSING"), None);
    }
}
