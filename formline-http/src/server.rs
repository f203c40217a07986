//! Notification settings HTTP server

use std::{net::SocketAddr, sync::Arc};

use axum::{
    Json, Router,
    extract::{FromRequestParts, Path, State},
    http::{Method, StatusCode, request::Parts},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use formline_common::{ActionError, FormId, Signal, ValidationError};
use serde_json::json;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::{HttpConfig, HttpError, NotificationService, body::SubmittedFields};

/// Status code for each action failure.
#[must_use]
pub const fn status_for(error: &ActionError) -> StatusCode {
    match error {
        ActionError::NotFound(_) => StatusCode::NOT_FOUND,
        ActionError::Validation(_) | ActionError::TestService { .. } => StatusCode::BAD_REQUEST,
        ActionError::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
        ActionError::Unverified(_) => StatusCode::CONFLICT,
        ActionError::Store { .. } | ActionError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// An [`ActionError`] rendered as `{"success": false, "error": ...}`.
#[derive(Debug)]
pub struct ActionFailure(pub ActionError);

impl From<ActionError> for ActionFailure {
    fn from(error: ActionError) -> Self {
        Self(error)
    }
}

impl IntoResponse for ActionFailure {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        if !self.0.is_internal() {
            tracing::debug!(%status, error = %self.0, "Action failed");
        }

        (
            status,
            Json(json!({ "success": false, "error": self.0.public_message() })),
        )
            .into_response()
    }
}

type ActionResult = Result<Response, ActionFailure>;

/// The `{form_id}` path segment. A segment that does not percent-decode to
/// UTF-8 is answered with the JSON failure body like any other bad input.
#[derive(Debug)]
struct FormPath(FormId);

impl<S> FromRequestParts<S> for FormPath
where
    S: Send + Sync,
{
    type Rejection = ActionFailure;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(form_id) = Path::<String>::from_request_parts(parts, state)
            .await
            .map_err(|rejection| ValidationError::InvalidFormId(rejection.body_text()))
            .map_err(ActionError::from)?;
        Ok(Self(FormId::from(form_id)))
    }
}

/// Build the router serving the notification actions and the liveness probe.
pub fn router(service: Arc<NotificationService>) -> Router {
    Router::new()
        .route(
            "/forms/{form_id}/settings/notifications",
            get(load_handler)
                .post(save_handler)
                .delete(clear_handler)
                .fallback(method_not_allowed),
        )
        .route(
            "/forms/{form_id}/settings/notifications/test",
            post(test_handler).fallback(method_not_allowed),
        )
        .route("/health/live", get(liveness_handler))
        .with_state(service)
        .layer(TraceLayer::new_for_http())
}

/// HTTP server for the notification settings actions
pub struct HttpServer {
    listener: TcpListener,
    router: Router,
}

impl HttpServer {
    /// Bind the listener and build the router.
    ///
    /// # Errors
    ///
    /// Returns an error if binding to the configured address fails.
    pub async fn new(
        config: &HttpConfig,
        service: Arc<NotificationService>,
    ) -> Result<Self, HttpError> {
        let listener = TcpListener::bind(&config.listen_address)
            .await
            .map_err(|e| HttpError::BindError {
                address: config.listen_address.clone(),
                source: e,
            })?;

        tracing::info!(
            address = %config.listen_address,
            enforce_test_gate = service.enforces_test_gate(),
            "HTTP server bound successfully"
        );

        Ok(Self {
            listener,
            router: router(service),
        })
    }

    /// Address the listener is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, HttpError> {
        self.listener
            .local_addr()
            .map_err(|e| HttpError::ServerError(e.to_string()))
    }

    /// Serve requests until a shutdown signal is received.
    ///
    /// # Errors
    ///
    /// Returns an error if the server encounters a runtime error.
    pub async fn serve(
        self,
        mut shutdown: tokio::sync::broadcast::Receiver<Signal>,
    ) -> Result<(), HttpError> {
        tracing::info!("HTTP server starting");

        axum::serve(self.listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("HTTP server received shutdown signal");
            })
            .await
            .map_err(|e| HttpError::ServerError(e.to_string()))?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

async fn load_handler(
    State(service): State<Arc<NotificationService>>,
    FormPath(form_id): FormPath,
) -> ActionResult {
    let settings = service.load(&form_id).await?;
    Ok(Json(json!({ "success": true, "settings": settings })).into_response())
}

async fn save_handler(
    State(service): State<Arc<NotificationService>>,
    FormPath(form_id): FormPath,
    SubmittedFields(submission): SubmittedFields,
) -> ActionResult {
    service.save(&form_id, &submission).await?;
    Ok(Json(json!({ "success": true })).into_response())
}

async fn clear_handler(
    State(service): State<Arc<NotificationService>>,
    FormPath(form_id): FormPath,
) -> ActionResult {
    service.clear(&form_id).await?;
    Ok(Json(json!({ "success": true })).into_response())
}

async fn test_handler(
    State(service): State<Arc<NotificationService>>,
    FormPath(form_id): FormPath,
    SubmittedFields(submission): SubmittedFields,
) -> ActionResult {
    let delivery = service.test(&form_id, &submission).await?;
    Ok(Json(json!({ "success": true, "deliveryId": delivery })).into_response())
}

async fn method_not_allowed(method: Method) -> ActionFailure {
    ActionFailure(ActionError::MethodNotAllowed(method.to_string()))
}

/// Liveness probe handler
async fn liveness_handler() -> Response {
    (StatusCode::OK, "OK").into_response()
}
