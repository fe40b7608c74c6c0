use axum::{
    Json,
    extract::{Path, State},
};
use paintdry_model::{ChangeRecord, ObservationRecord, ResourceRecord};

use crate::AppState;
use crate::errors::{AppError, AppResult};

pub async fn list_resources(
    State(state): State<AppState>,
) -> AppResult<Json<Vec<ResourceRecord>>> {
    Ok(Json(state.store.resources().await?))
}

pub async fn get_resource(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<ResourceRecord>> {
    state
        .store
        .resource(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::not_found(format!("Resource {id} not found")))
}

pub async fn list_observations(
    State(state): State<AppState>,
) -> AppResult<Json<Vec<ObservationRecord>>> {
    Ok(Json(state.store.observations().await?))
}

pub async fn get_observation(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<ObservationRecord>> {
    state
        .store
        .observation(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::not_found(format!("Observation {id} not found")))
}

pub async fn list_changes(
    State(state): State<AppState>,
) -> AppResult<Json<Vec<ChangeRecord>>> {
    Ok(Json(state.store.changes().await?))
}

pub async fn get_change(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<ChangeRecord>> {
    state
        .store
        .change(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::not_found(format!("Change {id} not found")))
}
