//! Airdrop catalog and claim endpoints

use airdrop_core::{Airdrop, ClaimedAirdrop, NewAirdrop, NewClaimedAirdrop};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};

use crate::error::ApiError;
use crate::AppState;

/// Create airdrop routes
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/airdrops", get(list_airdrops).post(create_airdrop))
        .route("/airdrops/{id}", get(get_airdrop))
        .route("/claimed", get(list_claimed).post(claim_airdrop))
}

async fn list_airdrops(State(state): State<AppState>) -> Json<Vec<Airdrop>> {
    Json(state.catalog.list_airdrops())
}

async fn get_airdrop(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<Airdrop>, ApiError> {
    Ok(Json(state.catalog.get_airdrop(id)?))
}

async fn create_airdrop(
    State(state): State<AppState>,
    Json(new): Json<NewAirdrop>,
) -> Result<(StatusCode, Json<Airdrop>), ApiError> {
    let airdrop = state.catalog.create_airdrop(new)?;
    Ok((StatusCode::CREATED, Json(airdrop)))
}

async fn list_claimed(State(state): State<AppState>) -> Json<Vec<ClaimedAirdrop>> {
    Json(state.catalog.list_claimed())
}

async fn claim_airdrop(
    State(state): State<AppState>,
    Json(new): Json<NewClaimedAirdrop>,
) -> Result<(StatusCode, Json<ClaimedAirdrop>), ApiError> {
    let claimed = state.catalog.claim(new)?;
    Ok((StatusCode::CREATED, Json(claimed)))
}
