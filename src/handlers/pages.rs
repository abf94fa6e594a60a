//! HTML page handlers

use std::collections::HashMap;

use axum::{extract::State, response::Html};

use crate::{AppResult, AppState};

/// Empty input form
pub async fn index(State(state): State<AppState>) -> AppResult<Html<String>> {
    state.templates.input_form(&HashMap::new(), None)
}
