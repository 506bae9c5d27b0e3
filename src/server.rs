//! HTTP gateway in front of the issuer and the key generator.
//!
//! | Route               | Body                         | Response          |
//! |---------------------|------------------------------|-------------------|
//! | `POST /certificate` | `{"Csr": "...", "Ac": "..."}` | `{"pem": "..."}`  |
//! | `GET /pkey`         |                              | `{"pem": "..."}`  |
//! | `POST /pkey`        | `{"passphrase": "...", "bits": 2048}` | `{"pem": "..."}` |
//! | `GET /healthz`      |                              | `"ok"`            |
//!
//! Errors are returned as `{"error": "..."}`.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use axum_server::tls_rustls::RustlsConfig;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use zeroize::Zeroizing;

use crate::config::ServerConfig;
use crate::error::PkiError;
use crate::issuer::CertificateIssuer;
use crate::keygen::KeyGenerator;

/// Body of `POST /certificate`.
#[derive(Debug, Deserialize)]
pub struct CertificateRequest {
    /// Base64 of the PEM encoded PKCS#10 request.
    #[serde(rename = "Csr", alias = "csr", default)]
    pub csr: String,
    /// Name of the signing authority.
    #[serde(rename = "Ac", alias = "ac", default)]
    pub authority: String,
}

/// Body of `POST /pkey`.
#[derive(Deserialize)]
pub struct KeyRequest {
    pub passphrase: Zeroizing<String>,
    pub bits: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PemResponse {
    pub pem: String,
}

/// Shared, read-only state of the gateway.
#[derive(Clone, Debug)]
pub struct AppState {
    pub issuer: CertificateIssuer,
    pub keygen: KeyGenerator,
    /// Upper bound on a single issue or generate call.
    pub request_timeout: Duration,
}

#[derive(Debug)]
pub enum ApiError {
    Pki(PkiError),
    BadRequest(String),
    Unavailable(String),
    Timeout,
    Internal(String),
}

impl From<PkiError> for ApiError {
    fn from(err: PkiError) -> Self {
        ApiError::Pki(err)
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Pki(PkiError::UnknownAuthority(_)) => StatusCode::NOT_FOUND,
            ApiError::Pki(e) if e.is_client_error() => StatusCode::BAD_REQUEST,
            ApiError::Pki(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unavailable(_) | ApiError::Timeout => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match self {
            ApiError::Pki(e) => e.to_string(),
            ApiError::BadRequest(m) | ApiError::Unavailable(m) | ApiError::Internal(m) => m,
            ApiError::Timeout => "request timed out".to_string(),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/certificate", post(issue_certificate))
        .route("/pkey", get(generate_key).post(generate_key_with))
        .route("/healthz", get(healthz))
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::new(state))
}

/// Runs CPU-bound work on the blocking pool, bounded by `timeout`.
///
/// On timeout the caller gets [`ApiError::Timeout`], but the task is
/// abandoned rather than cancelled: it keeps running on the blocking pool
/// until it finishes and its result is dropped. A panic inside `task`
/// becomes an internal error.
async fn run_blocking<T, F>(timeout: Duration, task: F) -> Result<T, ApiError>
where
    F: FnOnce() -> crate::error::Result<T> + Send + 'static,
    T: Send + 'static,
{
    match tokio::time::timeout(timeout, tokio::task::spawn_blocking(task)).await {
        Err(_) => {
            warn!(timeout_secs = timeout.as_secs(), "request timed out");
            Err(ApiError::Timeout)
        }
        Ok(Err(join_error)) => {
            error!(error = %join_error, "request worker failed");
            Err(ApiError::Internal("internal error".to_string()))
        }
        Ok(Ok(result)) => result.map_err(ApiError::from),
    }
}

async fn issue_certificate(
    State(state): State<Arc<AppState>>,
    body: Result<Json<CertificateRequest>, JsonRejection>,
) -> Result<Json<PemResponse>, ApiError> {
    let request = match body {
        Ok(Json(request)) if !request.csr.is_empty() && !request.authority.is_empty() => request,
        Ok(_) | Err(_) => return Err(ApiError::BadRequest("invalid CSR request".to_string())),
    };

    let issuer = state.issuer.clone();
    let pem = run_blocking(state.request_timeout, move || {
        issuer.issue(&request.csr, &request.authority)
    })
    .await?;
    Ok(Json(PemResponse { pem }))
}

async fn generate_key(State(state): State<Arc<AppState>>) -> Result<Json<PemResponse>, ApiError> {
    if !state.keygen.has_passphrase() {
        return Err(ApiError::Unavailable(
            "no key passphrase is configured".to_string(),
        ));
    }
    let keygen = state.keygen.clone();
    let pem = run_blocking(state.request_timeout, move || keygen.generate()).await?;
    Ok(Json(PemResponse {
        pem: pem.to_string(),
    }))
}

async fn generate_key_with(
    State(state): State<Arc<AppState>>,
    body: Result<Json<KeyRequest>, JsonRejection>,
) -> Result<Json<PemResponse>, ApiError> {
    let Json(request) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let keygen = state.keygen.clone();
    let bits = request
        .bits
        .map(|bits| bits as usize)
        .unwrap_or(keygen.default_bits());
    let pem = run_blocking(state.request_timeout, move || {
        keygen.generate_with(bits, &request.passphrase)
    })
    .await?;
    Ok(Json(PemResponse {
        pem: pem.to_string(),
    }))
}

async fn healthz() -> Json<&'static str> {
    Json("ok")
}

/// Serves the gateway until the listener fails, over HTTPS when `tls` is set.
pub async fn serve(config: &ServerConfig, state: AppState) -> crate::error::Result<()> {
    let addr = config.bind_address()?;
    let app = router(state);

    if config.tls {
        let (Some(certificate), Some(private_key)) =
            (&config.tlscertificatefile, &config.tlsprivatekeyfile)
        else {
            return Err(PkiError::Config(
                "tls is enabled but no certificate or key file is set".to_string(),
            ));
        };
        let tls = RustlsConfig::from_pem_file(certificate, private_key)
            .await
            .map_err(|e| PkiError::Config(format!("cannot load TLS credentials: {e}")))?;
        info!(%addr, "listening for HTTPS requests");
        axum_server::bind_rustls(addr, tls)
            .serve(app.into_make_service())
            .await
            .map_err(|e| PkiError::Config(format!("server on {addr} failed: {e}")))?;
    } else {
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| PkiError::Config(format!("cannot bind {addr}: {e}")))?;
        info!(%addr, "listening for HTTP requests");
        axum::serve(listener, app)
            .await
            .map_err(|e| PkiError::Config(format!("server on {addr} failed: {e}")))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_mapping() {
        let cases = [
            (ApiError::Pki(PkiError::CsrDecode("x".into())), StatusCode::BAD_REQUEST),
            (ApiError::Pki(PkiError::InvalidInput("x".into())), StatusCode::BAD_REQUEST),
            (ApiError::Pki(PkiError::UnknownAuthority("x".into())), StatusCode::NOT_FOUND),
            (ApiError::Pki(PkiError::Signing("x".into())), StatusCode::INTERNAL_SERVER_ERROR),
            (ApiError::Pki(PkiError::KeyGeneration("x".into())), StatusCode::INTERNAL_SERVER_ERROR),
            (ApiError::Timeout, StatusCode::SERVICE_UNAVAILABLE),
        ];
        for (error, status) in cases {
            assert_eq!(error.status(), status, "{error:?}");
        }
    }

    #[tokio::test]
    async fn test_panicking_worker_is_an_internal_error() {
        let result: Result<(), ApiError> =
            run_blocking(Duration::from_secs(5), || panic!("boom")).await;
        assert!(matches!(result, Err(ApiError::Internal(_))));
    }

    #[tokio::test]
    async fn test_slow_worker_times_out() {
        let result = run_blocking(Duration::from_millis(10), || {
            std::thread::sleep(Duration::from_millis(500));
            Ok(())
        })
        .await;
        assert!(matches!(result, Err(ApiError::Timeout)));
    }
}
