//! HTTPS admission server

use crate::mutator::mutate_handler;
use crate::namespace::mutate_namespace_handler;
use crate::validator::validate_handler;
use crate::{WebhookError, WebhookState};
use axum::routing::{get, post};
use axum::Router;
use axum_server::tls_rustls::RustlsConfig;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;

pub const VALIDATE_HC_PATH: &str = "/validate-hco-kubevirt-io-v1beta1-hyperconverged";
pub const MUTATE_HC_V1BETA1_PATH: &str = "/mutate-hco-kubevirt-io-v1beta1-hyperconverged";
pub const MUTATE_HC_V1_PATH: &str = "/mutate-hco-kubevirt-io-v1-hyperconverged";
pub const MUTATE_NAMESPACE_PATH: &str = "/mutate-ns-hco-kubevirt-io";

/// Certificate and key file names inside the certificate directory.
pub const CERT_FILE: &str = "apiserver.crt";
pub const KEY_FILE: &str = "apiserver.key";

/// Routes of the admission server.
pub fn router(state: Arc<WebhookState>) -> Router {
    Router::new()
        .route(VALIDATE_HC_PATH, post(validate_handler))
        .route(MUTATE_HC_V1BETA1_PATH, post(mutate_handler))
        .route(MUTATE_HC_V1_PATH, post(mutate_handler))
        .route(MUTATE_NAMESPACE_PATH, post(mutate_namespace_handler))
        .route("/readyz", get(|| async { "ok" }))
        .route("/livez", get(|| async { "ok" }))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serves the admission routes over TLS until the listener fails.
pub async fn serve(state: Arc<WebhookState>, cert_dir: &Path, port: u16) -> Result<(), WebhookError> {
    let cert = cert_dir.join(CERT_FILE);
    let key = cert_dir.join(KEY_FILE);
    let tls_config = RustlsConfig::from_pem_file(&cert, &key)
        .await
        .map_err(|e| WebhookError::Tls(format!("{}: {e}", cert.display())))?;

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(addr = %addr, cert_dir = %cert_dir.display(), "Starting admission webhook server");

    axum_server::bind_rustls(addr, tls_config)
        .serve(router(state).into_make_service())
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{hc, hc_review, review_json, state, NAMESPACE};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use cluster_store::MockObjectStore;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn post_json(uri: &str, body: &Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(body).unwrap()))
            .unwrap()
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let body = axum::body::to_bytes(response.into_body(), 1024 * 1024).await.unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn test_health_endpoints() {
        let mock = MockObjectStore::new();
        let app = router(Arc::new(state(&mock)));

        for path in ["/readyz", "/livez"] {
            let request = Request::builder().uri(path).body(Body::empty()).unwrap();
            let response = app.clone().oneshot(request).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }
    }

    #[tokio::test]
    async fn test_validate_route_answers_with_review() {
        let mock = MockObjectStore::new();
        let app = router(Arc::new(state(&mock)));

        let response = app
            .oneshot(post_json(VALIDATE_HC_PATH, &hc_review("CREATE", Some(&hc()), None)))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let review = body_json(response).await;
        assert_eq!(review["kind"], "AdmissionReview");
        assert_eq!(review["response"]["uid"], "705ab4f5-6393-11e8-b7cc-42010a800002");
        assert_eq!(review["response"]["allowed"], true);
    }

    #[tokio::test]
    async fn test_both_mutate_routes_patch() {
        let mock = MockObjectStore::new();
        let app = router(Arc::new(state(&mock)));

        for path in [MUTATE_HC_V1BETA1_PATH, MUTATE_HC_V1_PATH] {
            let response = app
                .clone()
                .oneshot(post_json(path, &hc_review("CREATE", Some(&hc()), None)))
                .await
                .unwrap();
            let review = body_json(response).await;
            assert_eq!(review["response"]["allowed"], true);
            assert_eq!(review["response"]["patchType"], "JSONPatch");
        }
    }

    #[tokio::test]
    async fn test_namespace_route() {
        let mock = MockObjectStore::new();
        let app = router(Arc::new(state(&mock)));
        let ns = json!({"apiVersion": "v1", "kind": "Namespace", "metadata": {"name": NAMESPACE}});
        let review = review_json(
            "DELETE",
            ("", "v1", "Namespace", "namespaces"),
            NAMESPACE,
            None,
            None,
            Some(ns),
        );

        let response = app.oneshot(post_json(MUTATE_NAMESPACE_PATH, &review)).await.unwrap();

        let review = body_json(response).await;
        assert_eq!(review["response"]["allowed"], true);
    }

    #[tokio::test]
    async fn test_review_without_request_is_bad_request() {
        let mock = MockObjectStore::new();
        let app = router(Arc::new(state(&mock)));
        let body = json!({"apiVersion": "admission.k8s.io/v1", "kind": "AdmissionReview"});

        let response = app.oneshot(post_json(VALIDATE_HC_PATH, &body)).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let error = body_json(response).await;
        assert!(error["error"].as_str().unwrap().contains("invalid admission review"));
    }

    #[tokio::test]
    async fn test_missing_certificates_fail_startup() {
        let mock = MockObjectStore::new();
        let dir = std::env::temp_dir().join("hco-webhook-no-such-certs");

        let err = serve(Arc::new(state(&mock)), &dir, 0).await.unwrap_err();

        assert!(matches!(err, WebhookError::Tls(_)));
    }
}
