use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use lift_core::{LiftRequestView, ObserverId, SessionId, SessionView};

use crate::error::ApiError;
use crate::server::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateSessionBody {
    pub floors: i64,
    pub lifts: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallLiftBody {
    pub floor: i64,
    /// Observer id of the caller's own WebSocket, so it gets no echo.
    #[serde(default)]
    pub client_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RequestQuery {
    pub status: Option<String>,
}

pub async fn create_session(
    State(state): State<AppState>,
    body: Result<Json<CreateSessionBody>, JsonRejection>,
) -> Result<(StatusCode, Json<SessionView>), ApiError> {
    let Json(body) = body?;
    let view = state.service.create_session(body.floors, body.lifts)?;
    Ok((StatusCode::CREATED, Json(view)))
}

pub async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionView>, ApiError> {
    let view = state.service.get_session(&SessionId::from_raw(id))?;
    Ok(Json(view))
}

pub async fn call_lift(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<CallLiftBody>, JsonRejection>,
) -> Result<(StatusCode, Json<LiftRequestView>), ApiError> {
    let Json(body) = body?;
    let requester = body
        .client_id
        .filter(|c| !c.trim().is_empty())
        .map(ObserverId::from_raw);
    let view = state
        .service
        .call_lift(&SessionId::from_raw(id), body.floor, requester)
        .await?;
    Ok((StatusCode::CREATED, Json(view)))
}

pub async fn list_requests(
    State(state): State<AppState>,
    Path(id): Path<String>,
    query: Result<Query<RequestQuery>, QueryRejection>,
) -> Result<Json<Vec<LiftRequestView>>, ApiError> {
    let Query(query) = query?;
    let status = query.status.as_deref().filter(|s| !s.trim().is_empty());
    let views = state
        .service
        .get_lift_requests(Some(&SessionId::from_raw(id)), status)?;
    Ok(Json(views))
}

pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let pool = state.service.pool().stats().await.ok();
    let queue = state.service.queue();

    let (status, label) = match pool {
        Some(_) => (StatusCode::OK, "ok"),
        None => (StatusCode::SERVICE_UNAVAILABLE, "degraded"),
    };

    let body = json!({
        "status": label,
        "queue": {
            "occupancy": queue.occupancy(),
            "capacity": queue.capacity(),
        },
        "pool": pool,
        "metrics": state.metrics.snapshot(),
    });
    (status, Json(body))
}
