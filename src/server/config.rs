use crate::config::Settings;
use crate::core::errors::Result;
use crate::server::AppState;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use std::collections::HashMap;

pub async fn get_settings(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<Settings>> {
    let settings = if params.contains_key("reload") {
        state.settings.reload()?
    } else {
        state.settings.current()
    };
    Ok(Json(settings))
}

pub async fn update_settings(
    State(state): State<AppState>,
    Json(settings): Json<Settings>,
) -> Result<StatusCode> {
    state.settings.replace(settings)?;
    Ok(StatusCode::OK)
}

pub async fn reset_settings(State(state): State<AppState>) -> Result<StatusCode> {
    state.settings.reset()?;
    Ok(StatusCode::OK)
}
