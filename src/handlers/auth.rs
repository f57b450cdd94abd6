use crate::auth::RegisterInput;
use crate::entities::UserModel;
use crate::errors::ApiError;
use crate::handlers::common::{created_response, map_service_error, success_response};
use crate::AppState;
use axum::{
    extract::{Json, State},
    response::Response,
    routing::post,
    Router,
};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Creates the router for auth endpoints
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/signup", post(signup))
        .route("/login", post(login))
        .route("/logout", post(logout))
}

#[derive(Debug, Serialize)]
struct AuthResponse {
    token: String,
    user: UserModel,
}

async fn signup(
    State(state): State<AppState>,
    Json(payload): Json<RegisterInput>,
) -> Result<Response, ApiError> {
    let user = state
        .auth
        .register(payload)
        .await
        .map_err(map_service_error)?;

    state
        .event_sender
        .send_or_log(crate::events::Event::UserRegistered(user.id))
        .await;

    let token = state.auth.issue_token(&user).map_err(map_service_error)?;
    Ok(created_response(AuthResponse { token, user }))
}

#[derive(Debug, Deserialize)]
struct LoginRequest {
    email: String,
    password: String,
    /// Anonymous cart session key to merge into the user's cart on login
    cart_session_key: Option<String>,
}

async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Response, ApiError> {
    let (token, user) = state
        .auth
        .login(&payload.email, &payload.password)
        .await
        .map_err(map_service_error)?;

    // Merge the anonymous cart into the user's cart. A merge failure must
    // not fail the login itself.
    if let Some(session_key) = payload
        .cart_session_key
        .as_deref()
        .filter(|key| !key.trim().is_empty())
    {
        if let Err(err) = state
            .services
            .cart
            .merge_session_cart(user.id, session_key)
            .await
        {
            warn!("Failed to merge session cart on login: {}", err);
        }
    }

    Ok(success_response(AuthResponse { token, user }))
}

/// Access tokens are stateless; logout is acknowledged so clients discard
/// the token.
async fn logout() -> Response {
    success_response(serde_json::json!({
        "message": "Logged out successfully."
    }))
}
