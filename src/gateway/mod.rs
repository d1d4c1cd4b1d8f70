//! Axum-based HTTP gateway with body limits and timeouts.
//!
//! Thin JSON endpoints over the credit ledger, checkout store, auth store and
//! the two opaque collaborators (Completion Service, Payment Provider). All
//! business rules live in those modules; handlers translate outcomes into
//! status codes and JSON.

use crate::auth::AuthStore;
use crate::billing::{
    find_package, CheckoutError, CheckoutStatus, CheckoutStore, PaymentProvider, StripeCheckout,
    PACKAGES,
};
use crate::chat::{
    find_language, find_scenario, system_prompt, ChatMessage, CompletionProvider, OpenAiCompletion,
    LANGUAGES, SCENARIOS,
};
use crate::config::Config;
use crate::ledger::{ConsumePolicy, CreditLedger};
use anyhow::{Context, Result};
use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, StatusCode},
    response::Json,
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;

/// Maximum request body size (64KB) — prevents memory exhaustion
pub const MAX_BODY_SIZE: usize = 65_536;
/// Request timeout (30s) — covers one completion round-trip
pub const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Shared state for all handlers.
#[derive(Clone)]
pub struct AppState {
    pub ledger: Arc<CreditLedger>,
    pub checkout: Arc<CheckoutStore>,
    pub auth: Arc<AuthStore>,
    pub policy: ConsumePolicy,
    pub completion: Arc<dyn CompletionProvider>,
    pub payment: Arc<dyn PaymentProvider>,
    pub allow_registration: bool,
    pub max_users: u64,
}

type ApiResponse = (StatusCode, Json<serde_json::Value>);

/// Build the application router with CORS, body-limit and timeout layers.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            axum::http::Method::GET,
            axum::http::Method::POST,
            axum::http::Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .max_age(Duration::from_secs(3600));

    Router::new()
        .route("/health", get(handle_health))
        .route("/api/auth/register", post(handle_auth_register))
        .route("/api/auth/login", post(handle_auth_login))
        .route("/api/auth/logout", post(handle_auth_logout))
        .route("/api/auth/me", get(handle_auth_me))
        .route("/api/credits", get(handle_credits))
        .route("/api/credits/track", post(handle_credits_track))
        .route("/api/credits/deduct", post(handle_credits_deduct))
        .route("/api/packages", get(handle_packages))
        .route("/api/checkout", post(handle_checkout))
        .route("/api/checkout/status", get(handle_checkout_status))
        .route("/api/scenarios", get(handle_scenarios))
        .route("/api/chat", post(handle_chat))
        .with_state(state)
        .layer(cors)
        .layer(RequestBodyLimitLayer::new(MAX_BODY_SIZE))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(REQUEST_TIMEOUT_SECS),
        ))
}

/// Open the stores, build the provider clients and serve until shutdown.
pub async fn run_gateway(host: &str, port: u16, config: Config) -> Result<()> {
    let workspace = crate::config::workspace_dir()?;
    std::fs::create_dir_all(&workspace)
        .with_context(|| format!("failed to create workspace dir {}", workspace.display()))?;

    let ledger = Arc::new(CreditLedger::open(
        &workspace.join("credits.db"),
        config.credits.free_credits,
        config.credits.batch_size,
    )?);
    let checkout = Arc::new(CheckoutStore::attach(&ledger)?);
    let auth = Arc::new(AuthStore::new(
        &workspace.join("auth.db"),
        config.auth.session_ttl_secs,
    )?);

    match auth.cleanup_expired_sessions() {
        Ok(0) => {}
        Ok(purged) => tracing::info!(purged, "Removed expired sessions"),
        Err(e) => tracing::warn!("Session cleanup failed: {e}"),
    }

    let payment_key = match config.payment.resolve_api_key() {
        Some(key) => key,
        None => {
            tracing::warn!("No payment provider key configured; checkout will be rejected");
            String::new()
        }
    };
    let payment: Arc<dyn PaymentProvider> = Arc::new(StripeCheckout::new(
        &config.payment.api_url,
        &payment_key,
        &config.payment.currency,
        &config.payment.success_url,
        &config.payment.cancel_url,
    ));

    let completion: Arc<dyn CompletionProvider> = Arc::new(OpenAiCompletion::new(
        &config.completion.api_url,
        config.completion.resolve_api_key(),
        &config.completion.model,
        config.completion.temperature,
        config.completion.max_tokens,
    ));

    let state = AppState {
        ledger,
        checkout,
        auth,
        policy: config.credits.policy,
        completion,
        payment,
        allow_registration: config.auth.allow_registration,
        max_users: config.auth.max_users,
    };

    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    let actual = listener.local_addr()?;

    println!("🗣️  Fluente Gateway listening on http://{actual}");
    println!("  POST /api/auth/register    — create account (+ session token)");
    println!("  POST /api/auth/login       — authenticate and get session token");
    println!("  POST /api/auth/logout      — revoke current session");
    println!("  GET  /api/auth/me          — current user info");
    println!("  GET  /api/credits          — credit balance + message counter");
    println!("  POST /api/credits/track    — count one message against the allowance");
    println!("  POST /api/credits/deduct   — spend one whole credit");
    println!("  GET  /api/packages         — purchasable credit packages");
    println!("  POST /api/checkout         — open a payment session");
    println!("  GET  /api/checkout/status  — poll payment status, grant on success");
    println!("  GET  /api/scenarios        — practice scenarios + languages");
    println!("  POST /api/chat             — one practice turn (charges the allowance)");
    println!("  GET  /health               — health check");
    println!("  Press Ctrl+C to stop.\n");

    tracing::info!(
        policy = ?state.policy,
        free_credits = config.credits.free_credits,
        batch_size = config.credits.batch_size,
        "Gateway started"
    );

    axum::serve(listener, router(state)).await?;
    Ok(())
}

// ══════════════════════════════════════════════════════════════════════════════
// AXUM HANDLERS
// ══════════════════════════════════════════════════════════════════════════════

/// GET /health — always public (no secrets leaked)
async fn handle_health(State(state): State<AppState>) -> ApiResponse {
    let users = state.auth.user_count().unwrap_or(0);
    (
        StatusCode::OK,
        Json(serde_json::json!({
            "status": "ok",
            "service": "fluente",
            "users": users,
        })),
    )
}

// ── Auth ────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct AuthRegisterBody {
    username: String,
    password: String,
}

#[derive(Deserialize)]
struct AuthLoginBody {
    username: String,
    password: String,
}

/// Extract bearer token from Authorization header.
fn extract_bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}

/// Validate a session token and return the session. Returns error response if invalid.
fn require_session(
    state: &AppState,
    headers: &HeaderMap,
) -> Result<crate::auth::Session, ApiResponse> {
    let token = extract_bearer_token(headers).ok_or_else(|| {
        (
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({"error": "Missing Authorization header"})),
        )
    })?;

    state.auth.validate_session(token).ok_or_else(|| {
        (
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({"error": "Invalid or expired session token"})),
        )
    })
}

/// POST /api/auth/register — create a new user account and log it in.
async fn handle_auth_register(
    State(state): State<AppState>,
    body: Result<Json<AuthRegisterBody>, axum::extract::rejection::JsonRejection>,
) -> ApiResponse {
    if !state.allow_registration {
        return (
            StatusCode::FORBIDDEN,
            Json(serde_json::json!({"error": "Registration is disabled"})),
        );
    }

    // Enforce max_users limit (0 = unlimited)
    if state.max_users > 0 {
        if let Ok(count) = state.auth.user_count() {
            if count >= state.max_users {
                return (
                    StatusCode::FORBIDDEN,
                    Json(serde_json::json!({"error": "Maximum user limit reached"})),
                );
            }
        }
    }

    let body = match body {
        Ok(Json(b)) => b,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({"error": format!("Invalid request: {e}")})),
            );
        }
    };

    let user_id = match state.auth.register(&body.username, &body.password) {
        Ok(id) => id,
        Err(e) => {
            let msg = e.to_string();
            let status = if msg.contains("already taken") {
                StatusCode::CONFLICT
            } else {
                StatusCode::BAD_REQUEST
            };
            return (status, Json(serde_json::json!({"error": msg})));
        }
    };

    // Auto-login so the client lands straight in the app. The ledger
    // bootstraps the free allotment lazily on first read.
    match state.auth.create_session(&user_id) {
        Ok(token) => (
            StatusCode::CREATED,
            Json(serde_json::json!({
                "status": "registered",
                "user_id": user_id,
                "username": body.username.trim(),
                "token": token,
            })),
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({"error": format!("Session creation failed: {e}")})),
        ),
    }
}

/// POST /api/auth/login — authenticate and get a session token.
async fn handle_auth_login(
    State(state): State<AppState>,
    body: Result<Json<AuthLoginBody>, axum::extract::rejection::JsonRejection>,
) -> ApiResponse {
    let body = match body {
        Ok(Json(b)) => b,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({"error": format!("Invalid request: {e}")})),
            );
        }
    };

    let user = match state.auth.authenticate(&body.username, &body.password) {
        Ok(u) => u,
        Err(_) => {
            return (
                StatusCode::UNAUTHORIZED,
                Json(serde_json::json!({"error": "Invalid username or password"})),
            );
        }
    };

    match state.auth.create_session(&user.id) {
        Ok(token) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "status": "authenticated",
                "token": token,
                "user_id": user.id,
                "username": user.username,
            })),
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({"error": format!("Session creation failed: {e}")})),
        ),
    }
}

/// POST /api/auth/logout — revoke current session.
async fn handle_auth_logout(State(state): State<AppState>, headers: HeaderMap) -> ApiResponse {
    let token = match extract_bearer_token(&headers) {
        Some(t) => t,
        None => {
            return (
                StatusCode::UNAUTHORIZED,
                Json(serde_json::json!({"error": "Missing Authorization header"})),
            );
        }
    };

    match state.auth.revoke_session(token) {
        Ok(true) => (
            StatusCode::OK,
            Json(serde_json::json!({"status": "logged_out"})),
        ),
        Ok(false) => (
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({"error": "Invalid session"})),
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({"error": format!("Logout failed: {e}")})),
        ),
    }
}

/// GET /api/auth/me — get current user info from session token.
async fn handle_auth_me(State(state): State<AppState>, headers: HeaderMap) -> ApiResponse {
    let session = match require_session(&state, &headers) {
        Ok(s) => s,
        Err(resp) => return resp,
    };

    match state.auth.get_user(&session.user_id) {
        Ok(Some(user)) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "user_id": user.id,
                "username": user.username,
                "created_at": user.created_at,
            })),
        ),
        _ => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({"error": "User not found"})),
        ),
    }
}

// ── Credits ─────────────────────────────────────────────────────────

/// GET /api/credits — current balance. Unauthenticated readers see zeroes,
/// never an error, so the dashboard renders before login.
async fn handle_credits(State(state): State<AppState>, headers: HeaderMap) -> ApiResponse {
    let session = extract_bearer_token(&headers).and_then(|t| state.auth.validate_session(t));
    let session = match session {
        Some(s) => s,
        None => {
            return (
                StatusCode::OK,
                Json(serde_json::json!({"credits": 0, "messageCount": 0})),
            );
        }
    };

    match state.ledger.balance(&session.user_id) {
        Ok(balance) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "credits": balance.credits,
                "messageCount": balance.message_count,
            })),
        ),
        Err(e) => {
            tracing::error!("Balance read failed: {e}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({"error": "Balance unavailable"})),
            )
        }
    }
}

/// POST /api/credits/track — count one user message against the allowance.
async fn handle_credits_track(State(state): State<AppState>, headers: HeaderMap) -> ApiResponse {
    let session = match require_session(&state, &headers) {
        Ok(s) => s,
        Err(_) => {
            return (
                StatusCode::UNAUTHORIZED,
                Json(serde_json::json!({
                    "success": false,
                    "remainingCredits": 0,
                    "messageCount": 0,
                    "creditDeducted": false,
                    "error": "Not authenticated",
                })),
            );
        }
    };

    match state.ledger.consume_message(&session.user_id) {
        Ok(outcome) => {
            let status = if outcome.success {
                StatusCode::OK
            } else {
                StatusCode::BAD_REQUEST
            };
            (
                status,
                Json(serde_json::json!({
                    "success": outcome.success,
                    "remainingCredits": outcome.remaining_credits,
                    "messageCount": outcome.message_count,
                    "creditDeducted": outcome.credit_deducted,
                })),
            )
        }
        Err(e) => {
            tracing::error!("Message tracking failed: {e}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({"error": "Credit store unavailable"})),
            )
        }
    }
}

/// POST /api/credits/deduct — spend one whole credit (conversation start).
async fn handle_credits_deduct(State(state): State<AppState>, headers: HeaderMap) -> ApiResponse {
    let session = match require_session(&state, &headers) {
        Ok(s) => s,
        Err(_) => {
            return (
                StatusCode::UNAUTHORIZED,
                Json(serde_json::json!({
                    "success": false,
                    "remainingCredits": 0,
                    "error": "Not authenticated",
                })),
            );
        }
    };

    match state.ledger.deduct_credit(&session.user_id) {
        Ok(outcome) => {
            let status = if outcome.success {
                StatusCode::OK
            } else {
                StatusCode::BAD_REQUEST
            };
            (
                status,
                Json(serde_json::json!({
                    "success": outcome.success,
                    "remainingCredits": outcome.remaining_credits,
                })),
            )
        }
        Err(e) => {
            tracing::error!("Credit deduction failed: {e}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({"error": "Credit store unavailable"})),
            )
        }
    }
}

// ── Billing ─────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct CheckoutBody {
    package_id: String,
}

#[derive(Deserialize)]
struct CheckoutStatusQuery {
    session_id: String,
}

/// GET /api/packages — the purchasable package catalog.
async fn handle_packages() -> ApiResponse {
    (
        StatusCode::OK,
        Json(serde_json::json!({"packages": PACKAGES})),
    )
}

/// POST /api/checkout — open a payment session for a package.
async fn handle_checkout(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<CheckoutBody>, axum::extract::rejection::JsonRejection>,
) -> ApiResponse {
    let session = match require_session(&state, &headers) {
        Ok(s) => s,
        Err(resp) => return resp,
    };

    let body = match body {
        Ok(Json(b)) => b,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({"error": format!("Invalid request: {e}")})),
            );
        }
    };

    let package = match find_package(&body.package_id) {
        Some(p) => p,
        None => {
            return (
                StatusCode::NOT_FOUND,
                Json(serde_json::json!({
                    "error": format!("Unknown package: {}", body.package_id),
                })),
            );
        }
    };

    let record = match state.checkout.create(&session.user_id, package) {
        Ok(r) => r,
        Err(e) => {
            tracing::error!("Checkout creation failed: {e}");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({"error": "Checkout store unavailable"})),
            );
        }
    };

    let provider_session = match state
        .payment
        .create_session(package, &record.session_id)
        .await
    {
        Ok(s) => s,
        Err(e) => {
            tracing::error!("Payment provider session failed: {e}");
            return (
                StatusCode::BAD_GATEWAY,
                Json(serde_json::json!({"error": "Payment provider unavailable"})),
            );
        }
    };

    if let Err(e) = state
        .checkout
        .set_provider_session(&record.session_id, &provider_session.id)
    {
        tracing::error!("Failed to persist provider session: {e}");
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({"error": "Checkout store unavailable"})),
        );
    }

    tracing::info!(
        package = package.id,
        session = record.session_id.as_str(),
        "Checkout session opened"
    );

    (
        StatusCode::OK,
        Json(serde_json::json!({
            "session_id": record.session_id,
            "redirect_url": provider_session.redirect_url,
        })),
    )
}

/// GET /api/checkout/status — poll the provider; grant credits exactly once
/// when the payment is complete.
async fn handle_checkout_status(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<CheckoutStatusQuery>,
) -> ApiResponse {
    let session = match require_session(&state, &headers) {
        Ok(s) => s,
        Err(resp) => return resp,
    };

    let record = match state.checkout.get(&query.session_id) {
        Ok(Some(r)) => r,
        Ok(None) => {
            return (
                StatusCode::NOT_FOUND,
                Json(serde_json::json!({"error": "Checkout session not found"})),
            );
        }
        Err(e) => {
            tracing::error!("Checkout lookup failed: {e}");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({"error": "Checkout store unavailable"})),
            );
        }
    };

    if record.user_id != session.user_id {
        return (
            StatusCode::FORBIDDEN,
            Json(serde_json::json!({"error": "Checkout session belongs to another user"})),
        );
    }

    // Already settled: answer from our own store without another provider
    // round-trip. Reloading the success page stays idempotent.
    match record.status {
        CheckoutStatus::Complete => {
            return status_response(&state, &session.user_id, "complete", record.credits);
        }
        CheckoutStatus::Failed => return status_response(&state, &session.user_id, "failed", 0),
        CheckoutStatus::Pending => {}
    }

    let provider_session_id = match record.provider_session_id {
        Some(ref id) => id,
        None => return status_response(&state, &session.user_id, "pending", 0),
    };

    let provider_status = match state.payment.session_status(provider_session_id).await {
        Ok(s) => s,
        Err(e) => {
            tracing::error!("Payment provider status failed: {e}");
            return (
                StatusCode::BAD_GATEWAY,
                Json(serde_json::json!({"error": "Payment provider unavailable"})),
            );
        }
    };

    match provider_status.status.as_str() {
        "complete" => match state.checkout.finalize_complete(&record.session_id) {
            Ok(finalized) => {
                tracing::info!(
                    session = record.session_id.as_str(),
                    credits = finalized.credits,
                    "Checkout finalized, credits granted"
                );
                status_response(&state, &session.user_id, "complete", finalized.credits)
            }
            Err(CheckoutError::NotPending(_)) | Err(CheckoutError::SessionNotFound(_)) => (
                StatusCode::CONFLICT,
                Json(serde_json::json!({"error": "Checkout session is not pending"})),
            ),
            Err(e) => {
                tracing::error!("Checkout finalize failed: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(serde_json::json!({"error": "Checkout store unavailable"})),
                )
            }
        },
        "expired" => {
            if let Err(e) = state.checkout.mark_failed(&record.session_id) {
                tracing::error!("Failed to mark checkout expired: {e}");
            }
            status_response(&state, &session.user_id, "failed", 0)
        }
        _ => status_response(&state, &session.user_id, "pending", 0),
    }
}

/// Checkout status payload with the caller's fresh balance attached.
fn status_response(state: &AppState, user_id: &str, status: &str, credits: u32) -> ApiResponse {
    let balance = match state.ledger.balance(user_id) {
        Ok(b) => b,
        Err(e) => {
            tracing::error!("Balance read failed: {e}");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({"error": "Balance unavailable"})),
            );
        }
    };

    (
        StatusCode::OK,
        Json(serde_json::json!({
            "status": status,
            "credits": credits,
            "balance": {
                "credits": balance.credits,
                "messageCount": balance.message_count,
            },
        })),
    )
}

// ── Chat ────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct ChatBody {
    scenario_id: String,
    language: String,
    messages: Vec<ChatMessage>,
}

/// GET /api/scenarios — scenario and language catalogs.
async fn handle_scenarios() -> ApiResponse {
    (
        StatusCode::OK,
        Json(serde_json::json!({
            "scenarios": SCENARIOS,
            "languages": LANGUAGES,
        })),
    )
}

/// POST /api/chat — one practice turn. Charges the allowance first, then
/// asks the Completion Service for the character's reply.
async fn handle_chat(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<ChatBody>, axum::extract::rejection::JsonRejection>,
) -> ApiResponse {
    let session = match require_session(&state, &headers) {
        Ok(s) => s,
        Err(resp) => return resp,
    };

    let body = match body {
        Ok(Json(b)) => b,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({"error": format!("Invalid request: {e}")})),
            );
        }
    };

    let scenario = match find_scenario(&body.scenario_id) {
        Some(s) => s,
        None => {
            return (
                StatusCode::NOT_FOUND,
                Json(serde_json::json!({
                    "error": format!("Unknown scenario: {}", body.scenario_id),
                })),
            );
        }
    };
    let language = match find_language(&body.language) {
        Some(l) => l,
        None => {
            return (
                StatusCode::NOT_FOUND,
                Json(serde_json::json!({
                    "error": format!("Unknown language: {}", body.language),
                })),
            );
        }
    };

    if body.messages.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({"error": "No messages provided"})),
        );
    }

    // Charge before generating. A completion failure after a successful
    // charge is not refunded.
    let outcome = match state.policy.charge_turn(&state.ledger, &session.user_id) {
        Ok(o) => o,
        Err(e) => {
            tracing::error!("Turn charge failed: {e}");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({"error": "Credit store unavailable"})),
            );
        }
    };

    if !outcome.success {
        return (
            StatusCode::FORBIDDEN,
            Json(serde_json::json!({
                "success": false,
                "error": "No credits available. Please purchase more credits to continue.",
                "remainingCredits": outcome.remaining_credits,
                "messageCount": outcome.message_count,
            })),
        );
    }

    let prompt = system_prompt(scenario, language);
    let reply = match state.completion.complete(&prompt, &body.messages).await {
        Ok(text) => text,
        Err(e) => {
            tracing::error!("Completion failed: {e}");
            return (
                StatusCode::BAD_GATEWAY,
                Json(serde_json::json!({"error": "Completion service unavailable"})),
            );
        }
    };

    (
        StatusCode::OK,
        Json(serde_json::json!({
            "message": reply,
            "remainingCredits": outcome.remaining_credits,
            "messageCount": outcome.message_count,
            "creditDeducted": outcome.credit_deducted,
        })),
    )
}

// ══════════════════════════════════════════════════════════════════════════════
// TESTS
// ══════════════════════════════════════════════════════════════════════════════
