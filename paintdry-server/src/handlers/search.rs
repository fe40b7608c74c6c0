use axum::{Json, extract::State};
use paintdry_model::SearchPage;
use serde::Deserialize;

use crate::AppState;
use crate::errors::AppResult;

#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    #[serde(default)]
    pub search: String,
    #[serde(default = "first_page")]
    pub page: u32,
}

fn first_page() -> u32 {
    1
}

/// Substring search across resources, observations and changes, 50 rows
/// per page.
pub async fn search(
    State(state): State<AppState>,
    Json(request): Json<SearchRequest>,
) -> AppResult<Json<SearchPage>> {
    let page = state.store.search(&request.search, request.page).await?;
    Ok(Json(page))
}
