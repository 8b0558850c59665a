//! Comment board endpoints

use airdrop_core::{Comment, NewComment};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};

use crate::error::ApiError;
use crate::AppState;

/// Create comment routes
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/comments", get(list_comments).post(create_comment))
        .route("/comments/{id}/like", post(like_comment))
}

async fn list_comments(State(state): State<AppState>) -> Json<Vec<Comment>> {
    Json(state.comments.list())
}

/// Post a comment; it is returned as `pending` and moderated in the background
async fn create_comment(
    State(state): State<AppState>,
    Json(new): Json<NewComment>,
) -> Result<(StatusCode, Json<Comment>), ApiError> {
    let comment = state.comments.create(new)?;
    Ok((StatusCode::CREATED, Json(comment)))
}

async fn like_comment(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<Comment>, ApiError> {
    Ok(Json(state.comments.like(id)?))
}

#[cfg(test)]
mod tests {
    use crate::routes::testing::{get, json_body, post_json, send, state};
    use axum::http::StatusCode;
    use serde_json::json;

    #[tokio::test]
    async fn test_post_list_and_like() {
        let state = state(None);

        let response = send(
            state.clone(),
            post_json("/api/comments", json!({ "userId": 3, "content": "wen airdrop" })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let created = json_body(response).await;
        assert_eq!(created["moderation"]["status"], "pending");
        assert_eq!(created["parentId"], serde_json::Value::Null);

        let listed = json_body(send(state.clone(), get("/api/comments")).await).await;
        assert_eq!(listed.as_array().unwrap().len(), 1);

        let id = created["id"].as_u64().unwrap();
        let response = send(
            state.clone(),
            post_json(&format!("/api/comments/{}/like", id), json!({})),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["likes"], 1);

        let response = send(state, post_json("/api/comments/404/like", json!({}))).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_invalid_comment_rejected() {
        let state = state(None);
        let response = send(
            state.clone(),
            post_json("/api/comments", json!({ "userId": 3, "content": "  " })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = send(
            state,
            post_json(
                "/api/comments",
                json!({ "userId": 3, "parentId": 12, "content": "reply" }),
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
