//! Post-login redirect.

use axum::{
    extract::{Query, State},
    response::Redirect,
};
use gate_core::for_log;
use serde::Deserialize;
use tracing::warn;

use crate::response::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct RedirectParams {
    pub next: Option<String>,
}

/// GET /auth/redirect?next= - 303 to an allow-listed relative path.
pub async fn redirect_handler(
    State(state): State<AppState>,
    Query(params): Query<RedirectParams>,
) -> Result<Redirect, ApiError> {
    let target = state
        .redirect
        .resolve(params.next.as_deref())
        .inspect_err(|_| {
            warn!(
                next = %for_log(params.next.as_deref().unwrap_or_default()),
                "Rejected redirect target"
            );
        })?;

    Ok(Redirect::to(target))
}
