use crate::config::InternalState;
use crate::core::errors::Result;
use crate::server::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;

pub async fn get_internal_state(State(state): State<AppState>) -> Json<InternalState> {
    Json(InternalState::fetch(&state.db).await)
}

pub async fn complete_first_run_setup(State(state): State<AppState>) -> Result<StatusCode> {
    InternalState::complete_first_run_setup(&state.db).await?;
    Ok(StatusCode::OK)
}
