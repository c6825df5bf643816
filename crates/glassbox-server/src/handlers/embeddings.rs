//! Embeddings handler.

use axum::{
    extract::{Query, State},
    Json,
};

use crate::{
    error::ServerError,
    models::{EmbeddingsQuery, EmbeddingsResponse},
    state::AppState,
};

/// Handle embedding requests.
///
/// Fails with 503 while the models are loading; embedding never triggers a
/// load on its own.
pub async fn handle_embeddings(
    State(state): State<AppState>,
    Query(query): Query<EmbeddingsQuery>,
) -> Result<Json<EmbeddingsResponse>, ServerError> {
    if query.text.trim().is_empty() {
        return Err(ServerError::InvalidRequest(
            "text must not be empty".to_string(),
        ));
    }

    let embeddings = state.service.embed(query.text).await?;
    Ok(Json(EmbeddingsResponse { embeddings }))
}
