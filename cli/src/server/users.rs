use std::sync::Arc;

use anyhow::anyhow;
use axum::{
    Json,
    extract::State,
};

use super::{ApiError, ApiJson, ApiPath, AppState, MessageResponse, message};
use crate::identity::{IdentityClient, UserNameUpdate, Users};

const LOOKUP_FAILED: &str = "Unexpected error retrieving users.";
const UPDATE_FAILED: &str = "Unexpected error updating user.";

fn identity(state: &AppState, failure: &'static str) -> Result<Arc<IdentityClient>, ApiError> {
    state
        .identity
        .clone()
        .ok_or_else(|| ApiError::Upstream(failure, anyhow!("identity provider not configured")))
}

async fn lookup(state: &AppState, id: Option<&str>) -> Result<Json<Users>, ApiError> {
    let client = identity(state, LOOKUP_FAILED)?;
    let users = client
        .users(id)
        .await
        .map_err(|e| ApiError::Upstream(LOOKUP_FAILED, e))?;
    Ok(Json(users))
}

pub(super) async fn get_users(State(state): State<AppState>) -> Result<Json<Users>, ApiError> {
    lookup(&state, None).await
}

pub(super) async fn get_user(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<String>,
) -> Result<Json<Users>, ApiError> {
    lookup(&state, Some(&id)).await
}

pub(super) async fn update_user(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<String>,
    ApiJson(update): ApiJson<UserNameUpdate>,
) -> Result<Json<MessageResponse>, ApiError> {
    let client = identity(&state, UPDATE_FAILED)?;
    client
        .update_user(&id, &update)
        .await
        .map_err(|e| ApiError::Upstream(UPDATE_FAILED, e))?;
    Ok(message("User updated sucessfully."))
}

#[cfg(test)]
mod tests {
    use super::super::test_util::{send, test_app};
    use super::*;
    use axum::http::StatusCode;
    use serde_json::json;

    #[tokio::test]
    async fn unconfigured_lookup_is_500() {
        let (app, _, _) = test_app();
        let (status, body) = send(&app, "GET", "/api/v1/user", None).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], LOOKUP_FAILED);

        let (status, _) = send(&app, "GET", "/api/v1/user/auth0%7C1", None).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn unconfigured_update_is_500() {
        let (app, _, _) = test_app();
        let (status, body) = send(
            &app,
            "PUT",
            "/api/v1/user/auth0%7C1",
            Some(json!({"given_name": "Ann"})),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], UPDATE_FAILED);
    }
}
