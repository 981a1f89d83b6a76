// ============================
// crates/backend-lib/src/middleware/auth.rs
// ============================
use std::sync::Arc;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::error::AppError;
use crate::extract::{bearer_token, CurrentIdentity};
use crate::AppState;

/// Resolve the bearer access token to an identity, or reject with `InvalidToken`
pub async fn require_identity(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = bearer_token(req.headers()).ok_or(AppError::InvalidToken)?;
    let identity_id = state.auth.parse_access_token(token)?;

    req.extensions_mut().insert(CurrentIdentity(identity_id));
    Ok(next.run(req).await)
}
