use axum::{
    Json, Router,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::{StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::{get, post, put},
};
use polebot_core::{CategoryId, MissionId};
use polebot_protocol::{
    ApiResponse, CategoryBody, CategoryList, CategoryRequest, ErrorBody, GoalAppended, GoalBody,
    GoalSetBody, GoalSetList, GoalSetSaved, MapBody, MapList, MessageBody, MissionBody,
    MissionExecuted, MissionList, MissionRequest, PoseInput, ReplaceMissionGoalsRequest,
    SaveGoalSetRequest, SaveMapRequest,
};
use serde::Deserialize;
use tower_http::cors::CorsLayer;

use crate::{AppState, error::ApiError, store, telemetry};

type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;
type Created<T> = Result<(StatusCode, Json<ApiResponse<T>>), ApiError>;

#[derive(Debug, Deserialize)]
struct GoalSetQuery {
    map: Option<String>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/api/maps", get(list_maps).post(save_map))
        .route("/api/maps/{name}", get(get_map))
        .route("/api/goal-sets", get(list_goal_sets).post(save_goal_set))
        .route("/api/goal-sets/{name}", get(get_goal_set).delete(delete_goal_set))
        .route("/api/goal-sets/{name}/goals", post(append_goal))
        .route("/api/goal-sets/{name}/goals/{sequence}", put(update_goal).delete(remove_goal))
        .route("/api/categories", get(list_categories).post(create_category))
        .route("/api/categories/{id}", put(update_category).delete(delete_category))
        .route("/api/missions", get(list_missions).post(create_mission))
        .route("/api/missions/{id}", get(get_mission).put(update_mission).delete(delete_mission))
        .route("/api/missions/{id}/goals", put(replace_mission_goals))
        .route("/api/missions/{id}/execute", post(mark_executed))
        .route("/api/telemetry", get(telemetry::latest).post(telemetry::publish))
        .route("/ws", get(telemetry::viewer_socket))
        .route("/ws/publish", get(telemetry::publisher_socket))
        .fallback(endpoint_not_found)
        .method_not_allowed_fallback(endpoint_not_found)
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Unwraps a JSON body, turning axum's rejection into a 400 with our error shape.
pub(crate) fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload.map(|Json(body)| body).map_err(|rejection| ApiError::bad_request(rejection.body_text()))
}

fn path_param<T>(param: Result<Path<T>, PathRejection>) -> Result<T, ApiError> {
    param.map(|Path(value)| value).map_err(|rejection| ApiError::bad_request(rejection.body_text()))
}

fn query_param<T>(query: Result<Query<T>, QueryRejection>) -> Result<T, ApiError> {
    query.map(|Query(value)| value).map_err(|rejection| ApiError::bad_request(rejection.body_text()))
}

fn ok<T>(body: T) -> ApiResult<T> {
    Ok(Json(ApiResponse::ok(body)))
}

fn created<T>(body: T) -> Created<T> {
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(body))))
}

fn message(text: &str) -> ApiResult<MessageBody> {
    ok(MessageBody { message: text.to_string() })
}

async fn healthz() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "success": true }))
}

async fn endpoint_not_found(uri: Uri) -> Response {
    let body = ErrorBody {
        error: "Endpoint not found".to_string(),
        details: None,
        path: Some(uri.path().to_string()),
    };
    (StatusCode::NOT_FOUND, Json(body)).into_response()
}

async fn list_maps(State(state): State<AppState>) -> ApiResult<MapList> {
    let db = state.db.lock().await;
    ok(MapList { maps: store::list_maps(&db)? })
}

async fn save_map(
    State(state): State<AppState>,
    payload: Result<Json<SaveMapRequest>, JsonRejection>,
) -> ApiResult<MapBody> {
    let request = json_body(payload)?;
    let mut db = state.db.lock().await;
    ok(MapBody { map: store::upsert_map(&mut db, &request)? })
}

async fn get_map(State(state): State<AppState>, Path(name): Path<String>) -> ApiResult<MapBody> {
    let db = state.db.lock().await;
    let map = store::get_map(&db, &name)?
        .ok_or_else(|| ApiError::not_found(format!("map '{name}' not found")))?;
    ok(MapBody { map })
}

async fn list_goal_sets(
    State(state): State<AppState>,
    query: Result<Query<GoalSetQuery>, QueryRejection>,
) -> ApiResult<GoalSetList> {
    let query = query_param(query)?;
    let db = state.db.lock().await;
    ok(GoalSetList { goal_sets: store::list_goal_sets(&db, query.map.as_deref())? })
}

async fn save_goal_set(
    State(state): State<AppState>,
    payload: Result<Json<SaveGoalSetRequest>, JsonRejection>,
) -> ApiResult<GoalSetSaved> {
    let request = json_body(payload)?;
    let mut db = state.db.lock().await;
    ok(store::replace_goal_set(&mut db, &request)?)
}

async fn get_goal_set(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<GoalSetBody> {
    let db = state.db.lock().await;
    let goal_set = store::get_goal_set(&db, &name)?
        .ok_or_else(|| ApiError::not_found(format!("goal set '{name}' not found")))?;
    ok(GoalSetBody { goal_set })
}

async fn delete_goal_set(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<MessageBody> {
    let mut db = state.db.lock().await;
    store::delete_goal_set(&mut db, &name)?;
    message("goal set deleted")
}

async fn append_goal(
    State(state): State<AppState>,
    Path(name): Path<String>,
    payload: Result<Json<PoseInput>, JsonRejection>,
) -> Created<GoalAppended> {
    let pose = json_body(payload)?;
    let mut db = state.db.lock().await;
    created(store::append_goal(&mut db, &name, &pose)?)
}

async fn update_goal(
    State(state): State<AppState>,
    params: Result<Path<(String, u32)>, PathRejection>,
    payload: Result<Json<PoseInput>, JsonRejection>,
) -> ApiResult<GoalBody> {
    let (name, sequence_number) = path_param(params)?;
    let pose = json_body(payload)?;
    let mut db = state.db.lock().await;
    ok(GoalBody { goal: store::update_goal(&mut db, &name, sequence_number, &pose)? })
}

async fn remove_goal(
    State(state): State<AppState>,
    params: Result<Path<(String, u32)>, PathRejection>,
) -> ApiResult<MessageBody> {
    let (name, sequence_number) = path_param(params)?;
    let mut db = state.db.lock().await;
    store::remove_goal(&mut db, &name, sequence_number)?;
    message("goal removed")
}

async fn list_categories(State(state): State<AppState>) -> ApiResult<CategoryList> {
    let db = state.db.lock().await;
    ok(CategoryList { categories: store::list_categories(&db)? })
}

async fn create_category(
    State(state): State<AppState>,
    payload: Result<Json<CategoryRequest>, JsonRejection>,
) -> Created<CategoryBody> {
    let request = json_body(payload)?;
    let mut db = state.db.lock().await;
    created(CategoryBody { category: store::create_category(&mut db, &request)? })
}

async fn update_category(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
    payload: Result<Json<CategoryRequest>, JsonRejection>,
) -> ApiResult<CategoryBody> {
    let category_id = CategoryId(path_param(id)?);
    let request = json_body(payload)?;
    let mut db = state.db.lock().await;
    ok(CategoryBody { category: store::update_category(&mut db, category_id, &request)? })
}

async fn delete_category(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
) -> ApiResult<MessageBody> {
    let category_id = CategoryId(path_param(id)?);
    let mut db = state.db.lock().await;
    store::delete_category(&mut db, category_id)?;
    message("category deleted")
}

async fn list_missions(State(state): State<AppState>) -> ApiResult<MissionList> {
    let db = state.db.lock().await;
    ok(MissionList { missions: store::list_missions(&db)? })
}

async fn create_mission(
    State(state): State<AppState>,
    payload: Result<Json<MissionRequest>, JsonRejection>,
) -> Created<MissionBody> {
    let request = json_body(payload)?;
    let mut db = state.db.lock().await;
    created(MissionBody { mission: store::create_mission(&mut db, &request)? })
}

async fn get_mission(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
) -> ApiResult<MissionBody> {
    let mission_id = MissionId(path_param(id)?);
    let db = state.db.lock().await;
    let mission = store::get_mission(&db, mission_id)?
        .ok_or_else(|| ApiError::not_found(format!("mission {mission_id} not found")))?;
    ok(MissionBody { mission })
}

async fn update_mission(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
    payload: Result<Json<MissionRequest>, JsonRejection>,
) -> ApiResult<MissionBody> {
    let mission_id = MissionId(path_param(id)?);
    let request = json_body(payload)?;
    let mut db = state.db.lock().await;
    ok(MissionBody { mission: store::update_mission(&mut db, mission_id, &request)? })
}

async fn delete_mission(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
) -> ApiResult<MessageBody> {
    let mission_id = MissionId(path_param(id)?);
    let mut db = state.db.lock().await;
    store::delete_mission(&mut db, mission_id)?;
    message("mission deleted")
}

async fn replace_mission_goals(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
    payload: Result<Json<ReplaceMissionGoalsRequest>, JsonRejection>,
) -> ApiResult<MissionBody> {
    let mission_id = MissionId(path_param(id)?);
    let request = json_body(payload)?;
    let mut db = state.db.lock().await;
    ok(MissionBody { mission: store::replace_mission_goals(&mut db, mission_id, &request)? })
}

async fn mark_executed(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
) -> ApiResult<MissionExecuted> {
    let mission_id = MissionId(path_param(id)?);
    let mut db = state.db.lock().await;
    let last_executed_ms = store::mark_executed(&mut db, mission_id)?;
    ok(MissionExecuted { mission_id, last_executed_ms })
}
