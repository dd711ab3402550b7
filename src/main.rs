//! HTTP front end for the SAS issuer.
//!
//! `GET /` and `GET /api/sas` run the issuance flow and return
//! `{"ResponseMessage": ..., "SasToken": ...}`.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use axum::Router;
use log::{error, info};
use serde::Serialize;

use sas_issuer::{Config, Context, ErrorKind, OsEnv, ReqwestHttpSend, SasIssuer};

const ENV_BIND_ADDR: &str = "SAS_ISSUER_ADDR";
const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8080";

#[derive(Clone)]
struct AppState {
    issuer: Arc<SasIssuer>,
}

/// Response body, field names fixed by the clients consuming it.
#[derive(Serialize)]
struct SasTokenResponse {
    #[serde(rename = "ResponseMessage")]
    response_message: String,
    #[serde(rename = "SasToken")]
    sas_token: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let ctx = Context::new()
        .with_http_send(ReqwestHttpSend::default())
        .with_env(OsEnv);
    let config = Config::default().from_env(&ctx)?;
    let issuer = SasIssuer::new(ctx.clone(), config)?;

    let state = AppState {
        issuer: Arc::new(issuer),
    };
    let app = Router::new()
        .route("/", get(issue_sas))
        .route("/api/sas", get(issue_sas))
        .with_state(state);

    let addr = ctx
        .env_var(ENV_BIND_ADDR)
        .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("sas issuer listening on {addr}");
    axum::serve(listener, app).await?;

    Ok(())
}

async fn issue_sas(State(state): State<AppState>) -> Response {
    match state.issuer.issue().await {
        Ok(issued) => Json(SasTokenResponse {
            response_message: format!(
                "container access policy updated at {}",
                sas_issuer::time::format_rfc3339(issued.policy_last_modified)
            ),
            sas_token: issued.sas_token,
        })
        .into_response(),
        Err(err) => {
            error!("issuance failed: {err}: {err:?}");
            let status = match err.kind() {
                ErrorKind::Validation => StatusCode::BAD_REQUEST,
                ErrorKind::Storage => StatusCode::BAD_GATEWAY,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            };
            (
                status,
                Json(SasTokenResponse {
                    response_message: format!("sas issuance failed: {err}"),
                    sas_token: String::new(),
                }),
            )
                .into_response()
        }
    }
}
