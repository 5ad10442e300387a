//! HTTP request handlers

use super::types::{
    ApproveResponse, CleanupResponse, ConversationListResponse, ConversationResponse,
    ErrorResponse, MessagesResponse, OpportunityQuery, QuoteListResponse, QuoteQuery,
    QuoteResponse, RespondQuery, SignAgreementRequest, SignAgreementResponse, StartConversationRequest,
    StartConversationResponse, SubmitQuoteRequest, VendorResponse, VendorResponseRequest,
    VendorResponseResponse,
};
use super::AppState;
use crate::db::NewQuote;
use crate::engine::EngineError;
use crate::retention::run_sweep;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Conversation tracking
        .route(
            "/api/conversations",
            post(start_conversation).get(list_conversations),
        )
        .route("/api/conversations/:id", get(get_conversation))
        .route("/api/conversations/:id/messages", get(get_messages))
        // Buyer approval (awards the winner, declines the rest)
        .route("/api/conversations/:id/approve", post(approve))
        // Vendor yes/no responses: API form and emailed-link form
        .route("/api/vendor-response", post(vendor_response))
        .route("/respond/:id", get(respond_link))
        // Quotes
        .route("/api/quotes", post(submit_quote).get(list_quotes))
        // E-signature
        .route("/api/agreement/sign", post(sign_agreement))
        // Retention
        .route("/api/cleanup", post(cleanup))
        // Vendor directory lookup
        .route("/api/vendors/:id", get(get_vendor))
        // Version
        .route("/version", get(get_version))
        .with_state(state)
}

// ============================================================
// Conversations
// ============================================================

async fn start_conversation(
    State(state): State<AppState>,
    Json(req): Json<StartConversationRequest>,
) -> Result<Json<StartConversationResponse>, AppError> {
    if req.opportunity_id.trim().is_empty() {
        return Err(AppError::BadRequest(
            "opportunity_id must not be empty".to_string(),
        ));
    }

    let outcome = state
        .engine
        .start_conversation(req.vendor_id, &req.opportunity_id)
        .await?;

    Ok(Json(StartConversationResponse {
        conversation: outcome.conversation,
        created: outcome.created,
    }))
}

async fn list_conversations(
    State(state): State<AppState>,
    Query(query): Query<OpportunityQuery>,
) -> Result<Json<ConversationListResponse>, AppError> {
    let conversations = state.engine.db().list_conversations(&query.opportunity_id)?;
    Ok(Json(ConversationListResponse { conversations }))
}

async fn get_conversation(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ConversationResponse>, AppError> {
    let conversation = state.engine.db().get_conversation(&id)?;
    Ok(Json(ConversationResponse { conversation }))
}

async fn get_messages(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<MessagesResponse>, AppError> {
    let conversation = state.engine.db().get_conversation(&id)?;
    let messages = state.engine.db().get_messages(&id)?;
    Ok(Json(MessagesResponse {
        conversation,
        messages,
    }))
}

async fn approve(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApproveResponse>, AppError> {
    let outcome = state.engine.approve(&id).await?;
    Ok(Json(ApproveResponse {
        conversation: outcome.conversation,
        rejected_count: outcome.rejected_count,
    }))
}

// ============================================================
// Vendor responses
// ============================================================

async fn vendor_response(
    State(state): State<AppState>,
    Json(req): Json<VendorResponseRequest>,
) -> Result<Json<VendorResponseResponse>, AppError> {
    let outcome = state
        .engine
        .record_response(req.vendor_id, &req.opportunity_id, req.interested)
        .await?;

    Ok(Json(VendorResponseResponse {
        conversation: outcome.conversation,
        applied: outcome.applied,
    }))
}

/// Target of the yes/no links in the opportunity email
async fn respond_link(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<RespondQuery>,
) -> Result<Html<String>, AppError> {
    let interested = match query.interested.as_str() {
        "yes" => true,
        "no" => false,
        other => {
            return Err(AppError::BadRequest(format!(
                "interested must be yes or no, got {other}"
            )))
        }
    };

    let conversation = state.engine.db().get_conversation(&id)?;
    state
        .engine
        .record_response(conversation.vendor_id, &conversation.opportunity_id, interested)
        .await?;

    let body = if interested {
        "<h1>Thank you!</h1><p>Check your inbox for the bid request form.</p>"
    } else {
        "<h1>Response recorded</h1><p>Thank you for letting us know.</p>"
    };
    Ok(Html(body.to_string()))
}

// ============================================================
// Quotes
// ============================================================

async fn submit_quote(
    State(state): State<AppState>,
    Json(req): Json<SubmitQuoteRequest>,
) -> Result<Json<QuoteResponse>, AppError> {
    if !req.amount.is_finite() || req.amount <= 0.0 {
        return Err(AppError::BadRequest(
            "amount must be a positive number".to_string(),
        ));
    }

    let outcome = state
        .engine
        .submit_quote(
            &req.conversation_id,
            NewQuote {
                amount: req.amount,
                notes: req.notes,
                arrival_date: req.arrival_date,
                arrival_time: req.arrival_time,
            },
        )
        .await?;

    Ok(Json(QuoteResponse {
        conversation: outcome.conversation,
        quote: outcome.quote,
    }))
}

async fn list_quotes(
    State(state): State<AppState>,
    Query(query): Query<QuoteQuery>,
) -> Result<Json<QuoteListResponse>, AppError> {
    let quotes = match (&query.conversation_id, &query.opportunity_id) {
        (Some(conversation_id), _) => state
            .engine
            .db()
            .find_quote(conversation_id)?
            .into_iter()
            .collect(),
        (None, Some(opportunity_id)) => state.engine.db().list_quotes(opportunity_id)?,
        (None, None) => {
            return Err(AppError::BadRequest(
                "conversation_id or opportunity_id is required".to_string(),
            ))
        }
    };
    Ok(Json(QuoteListResponse { quotes }))
}

// ============================================================
// Agreement signing
// ============================================================

async fn sign_agreement(
    State(state): State<AppState>,
    Json(req): Json<SignAgreementRequest>,
) -> Result<Json<SignAgreementResponse>, AppError> {
    if req.full_name.trim().is_empty() || req.title.trim().is_empty() {
        return Err(AppError::BadRequest(
            "full_name and title are required".to_string(),
        ));
    }

    let outcome = state
        .engine
        .sign_agreement(&req.conversation_id, &req.full_name, &req.title)
        .await?;

    Ok(Json(SignAgreementResponse {
        conversation: outcome.conversation,
        po_number: outcome.po_number,
    }))
}

// ============================================================
// Retention, directory, version
// ============================================================

async fn cleanup(State(state): State<AppState>) -> Result<Json<CleanupResponse>, AppError> {
    let removed = run_sweep(state.engine.db(), state.retention_window)?;
    Ok(Json(CleanupResponse { removed }))
}

async fn get_vendor(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<VendorResponse>, AppError> {
    let vendor = state.engine.vendor(id)?;
    Ok(Json(VendorResponse { vendor }))
}

async fn get_version() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

// ============================================================
// Error handling
// ============================================================

enum AppError {
    BadRequest(String),
    NotFound(String),
    Conflict(String),
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = Json(ErrorResponse::new(message));
        (status, body).into_response()
    }
}

impl From<EngineError> for AppError {
    fn from(e: EngineError) -> Self {
        match e {
            EngineError::NotFound(_)
            | EngineError::VendorNotFound(_)
            | EngineError::QuoteRequired => AppError::NotFound(e.to_string()),
            EngineError::StateConflict { .. } | EngineError::DuplicateQuote => {
                AppError::Conflict(e.to_string())
            }
            EngineError::Store(_) | EngineError::Internal(_) => AppError::Internal(e.to_string()),
        }
    }
}

impl From<crate::db::DbError> for AppError {
    fn from(e: crate::db::DbError) -> Self {
        AppError::from(EngineError::from(e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::engine::testing::{RecordingNotifier, StaticDirectory};
    use crate::engine::ConversationEngine;
    use crate::directory::VendorProfile;
    use axum::body::Body;
    use axum::http::Request;
    use std::sync::Arc;
    use tower::ServiceExt;

    fn test_router() -> Router {
        let db = Database::open_in_memory().unwrap();
        let directory = StaticDirectory::new([VendorProfile {
            id: 1,
            name: "Test".to_string(),
            last_name: "Vendor".to_string(),
            company_name: "Test Vendor Inc".to_string(),
            email: "test@example.com".to_string(),
        }]);
        let engine = ConversationEngine::new(
            db,
            Arc::new(directory),
            Arc::new(RecordingNotifier::default()),
            "http://localhost:8000".to_string(),
        );
        create_router(AppState::new(engine, chrono::Duration::hours(1)))
    }

    fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn start_and_fetch_conversation() {
        let app = test_router();

        let response = app
            .clone()
            .oneshot(post_json(
                "/api/conversations",
                serde_json::json!({"vendor_id": 1, "opportunity_id": "opp-1"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/conversations?opportunity_id=opp-1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn unknown_vendor_is_404() {
        let app = test_router();
        let response = app
            .oneshot(post_json(
                "/api/conversations",
                serde_json::json!({"vendor_id": 42, "opportunity_id": "opp-1"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn non_positive_amount_is_400() {
        let app = test_router();
        let response = app
            .oneshot(post_json(
                "/api/quotes",
                serde_json::json!({"conversation_id": "x", "amount": 0.0}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn approve_without_quote_is_404() {
        let db = Database::open_in_memory().unwrap();
        let directory = StaticDirectory::new([VendorProfile {
            id: 1,
            name: "Test".to_string(),
            last_name: "Vendor".to_string(),
            company_name: "Test Vendor Inc".to_string(),
            email: "test@example.com".to_string(),
        }]);
        let engine = ConversationEngine::new(
            db,
            Arc::new(directory),
            Arc::new(RecordingNotifier::default()),
            "http://localhost:8000".to_string(),
        );
        let state = AppState::new(engine, chrono::Duration::hours(1));
        let start = state.engine.start_conversation(1, "opp-1").await.unwrap();

        let app = create_router(state);
        let response = app
            .oneshot(post_json(
                &format!("/api/conversations/{}/approve", start.conversation.id),
                serde_json::json!({}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn approve_on_missing_conversation_is_404() {
        let app = test_router();
        let response = app
            .oneshot(post_json(
                "/api/conversations/bogus/approve",
                serde_json::json!({}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn missing_conversation_is_404() {
        let app = test_router();
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/conversations/nope")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
