use std::sync::{Arc, Mutex, MutexGuard};

use axum::{
    extract::{DefaultBodyLimit, Path, Query, State},
    http::{HeaderMap, Method},
    middleware,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use uuid::Uuid;

use reel_shared::{BlobRef, Principal, UserRole};
use reel_store::{
    CallerProfile, Database, Notification, ProfileUpdate, UserProfile, UserSearchHit, VideoPost,
};

use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::rate_limit::{rate_limit_middleware, RateLimiter};

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Mutex<Database>>,
    pub rate_limiter: RateLimiter,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    /// Lock the store for one statement sequence. SQLite serializes the
    /// actual writes; the mutex only keeps the connection single-caller.
    fn db(&self) -> Result<MutexGuard<'_, Database>, ServerError> {
        self.db
            .lock()
            .map_err(|e| ServerError::Internal(format!("store lock poisoned: {e}")))
    }
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_check))
        .route("/info", get(server_info))
        .route("/profile", get(get_caller_profile).post(save_caller_profile))
        .route("/profile/{principal}", get(get_user_profile))
        .route("/role", get(get_caller_role))
        .route("/role/is-admin", get(is_caller_admin))
        .route("/role/assign", post(assign_role))
        .route("/posts", get(get_all_posts).post(create_post))
        .route("/posts/{id}", get(get_post))
        .route("/posts/{id}/like", post(like_post))
        .route("/posts/{id}/unlike", post(unlike_post))
        .route("/posts/{id}/comments", post(add_comment))
        .route("/users/search", get(search_users))
        .route("/users/{principal}/follow", post(follow_user))
        .route("/users/{principal}/unfollow", post(unfollow_user))
        .route("/users/{principal}/followers", get(get_followers))
        .route("/users/{principal}/following", get(get_following))
        .route("/notifications", get(get_notifications))
        .route("/notifications/{id}/status", post(update_notification_status))
        .route("/verification/start", post(start_verification))
        .route("/verification/confirm", post(confirm_verification))
        .layer(DefaultBodyLimit::max(64 * 1024))
        .layer(middleware::from_fn_with_state(
            state.rate_limiter.clone(),
            rate_limit_middleware,
        ))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// The authenticated principal for this request.
///
/// The identity handshake happens upstream; the trusted `x-principal` header
/// carries its result. Requests without it are guests and may only use the
/// public read surface.
fn caller(headers: &HeaderMap) -> Result<Principal, ServerError> {
    let text = headers
        .get("x-principal")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or(ServerError::Unauthenticated)?;

    Principal::parse(text).map_err(|e| ServerError::BadRequest(format!("invalid principal: {e}")))
}

// ---------------------------------------------------------------------------
// Request / response payloads
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

#[derive(Serialize)]
struct ServerInfoResponse {
    name: String,
    version: &'static str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AssignRoleRequest {
    user: Principal,
    role: UserRole,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreatePostRequest {
    title: String,
    #[serde(default)]
    description: String,
    video_blob: BlobRef,
}

#[derive(Serialize)]
struct CreatePostResponse {
    id: Uuid,
}

#[derive(Serialize)]
struct LikeResponse {
    liked: bool,
}

#[derive(Deserialize)]
struct AddCommentRequest {
    text: String,
}

#[derive(Serialize)]
struct CommentResponse {
    id: Uuid,
}

#[derive(Serialize)]
struct FollowResponse {
    following: bool,
}

#[derive(Deserialize)]
struct SearchParams {
    #[serde(default)]
    q: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct NotificationStatusRequest {
    is_read: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StartVerificationRequest {
    phone_number: String,
}

#[derive(Serialize)]
struct StartVerificationResponse {
    code: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConfirmVerificationRequest {
    phone_number: String,
    code: String,
}

// ---------------------------------------------------------------------------
// Meta
// ---------------------------------------------------------------------------

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn server_info(State(state): State<AppState>) -> Json<ServerInfoResponse> {
    Json(ServerInfoResponse {
        name: state.config.instance_name.clone(),
        version: env!("CARGO_PKG_VERSION"),
    })
}

// ---------------------------------------------------------------------------
// Profiles & roles
// ---------------------------------------------------------------------------

async fn get_caller_profile(
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Result<Json<Option<CallerProfile>>, ServerError> {
    let caller = caller(&headers)?;
    Ok(Json(state.db()?.get_caller_profile(&caller)?))
}

async fn save_caller_profile(
    headers: HeaderMap,
    State(state): State<AppState>,
    Json(update): Json<ProfileUpdate>,
) -> Result<Json<serde_json::Value>, ServerError> {
    let caller = caller(&headers)?;
    state.db()?.save_profile(&caller, &update)?;
    Ok(Json(serde_json::json!({ "saved": true })))
}

async fn get_user_profile(
    State(state): State<AppState>,
    Path(principal): Path<Principal>,
) -> Result<Json<Option<UserProfile>>, ServerError> {
    Ok(Json(state.db()?.get_profile(&principal)?))
}

async fn get_caller_role(
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Result<Json<UserRole>, ServerError> {
    // Unauthenticated callers are guests by definition.
    let Ok(caller) = caller(&headers) else {
        return Ok(Json(UserRole::Guest));
    };
    Ok(Json(state.db()?.get_role(&caller)?))
}

async fn is_caller_admin(
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Result<Json<bool>, ServerError> {
    let Ok(caller) = caller(&headers) else {
        return Ok(Json(false));
    };
    Ok(Json(state.db()?.is_admin(&caller)?))
}

async fn assign_role(
    headers: HeaderMap,
    State(state): State<AppState>,
    Json(req): Json<AssignRoleRequest>,
) -> Result<Json<serde_json::Value>, ServerError> {
    let caller = caller(&headers)?;
    state.db()?.assign_role(&caller, &req.user, req.role)?;

    info!(principal = %req.user, role = %req.role, "role assigned via API");
    Ok(Json(serde_json::json!({ "assigned": true })))
}

async fn search_users(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Vec<UserSearchHit>>, ServerError> {
    Ok(Json(state.db()?.search_users(&params.q)?))
}

// ---------------------------------------------------------------------------
// Content
// ---------------------------------------------------------------------------

async fn create_post(
    headers: HeaderMap,
    State(state): State<AppState>,
    Json(req): Json<CreatePostRequest>,
) -> Result<Json<CreatePostResponse>, ServerError> {
    let caller = caller(&headers)?;
    let id = state
        .db()?
        .create_video_post(&caller, &req.title, &req.description, &req.video_blob)?;
    Ok(Json(CreatePostResponse { id }))
}

async fn get_all_posts(
    State(state): State<AppState>,
) -> Result<Json<Vec<VideoPost>>, ServerError> {
    Ok(Json(state.db()?.get_all_video_posts()?))
}

async fn get_post(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Option<VideoPost>>, ServerError> {
    Ok(Json(state.db()?.get_video_post(id)?))
}

async fn like_post(
    headers: HeaderMap,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<LikeResponse>, ServerError> {
    let caller = caller(&headers)?;
    let liked = state.db()?.like_video(&caller, id)?;
    Ok(Json(LikeResponse { liked }))
}

async fn unlike_post(
    headers: HeaderMap,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<LikeResponse>, ServerError> {
    let caller = caller(&headers)?;
    state.db()?.unlike_video(&caller, id)?;
    Ok(Json(LikeResponse { liked: false }))
}

async fn add_comment(
    headers: HeaderMap,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<AddCommentRequest>,
) -> Result<Json<CommentResponse>, ServerError> {
    let caller = caller(&headers)?;
    let comment_id = state.db()?.add_comment(&caller, id, &req.text)?;
    Ok(Json(CommentResponse { id: comment_id }))
}

// ---------------------------------------------------------------------------
// Social graph
// ---------------------------------------------------------------------------

async fn follow_user(
    headers: HeaderMap,
    State(state): State<AppState>,
    Path(target): Path<Principal>,
) -> Result<Json<FollowResponse>, ServerError> {
    let caller = caller(&headers)?;
    state.db()?.follow_user(&caller, &target)?;
    Ok(Json(FollowResponse { following: true }))
}

async fn unfollow_user(
    headers: HeaderMap,
    State(state): State<AppState>,
    Path(target): Path<Principal>,
) -> Result<Json<FollowResponse>, ServerError> {
    let caller = caller(&headers)?;
    state.db()?.unfollow_user(&caller, &target)?;
    Ok(Json(FollowResponse { following: false }))
}

async fn get_followers(
    State(state): State<AppState>,
    Path(principal): Path<Principal>,
) -> Result<Json<Vec<Principal>>, ServerError> {
    Ok(Json(state.db()?.get_followers(&principal)?))
}

async fn get_following(
    State(state): State<AppState>,
    Path(principal): Path<Principal>,
) -> Result<Json<Vec<Principal>>, ServerError> {
    Ok(Json(state.db()?.get_following(&principal)?))
}

// ---------------------------------------------------------------------------
// Notifications
// ---------------------------------------------------------------------------

async fn get_notifications(
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Result<Json<Vec<Notification>>, ServerError> {
    let caller = caller(&headers)?;
    Ok(Json(state.db()?.get_notifications(&caller)?))
}

async fn update_notification_status(
    headers: HeaderMap,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<NotificationStatusRequest>,
) -> Result<Json<serde_json::Value>, ServerError> {
    let caller = caller(&headers)?;
    state
        .db()?
        .update_notification_status(&caller, id, req.is_read)?;
    Ok(Json(serde_json::json!({ "updated": true })))
}

// ---------------------------------------------------------------------------
// Phone verification
// ---------------------------------------------------------------------------

async fn start_verification(
    headers: HeaderMap,
    State(state): State<AppState>,
    Json(req): Json<StartVerificationRequest>,
) -> Result<Json<StartVerificationResponse>, ServerError> {
    let caller = caller(&headers)?;
    let code = state
        .db()?
        .start_phone_verification(&caller, &req.phone_number)?;

    // The code goes straight back to the caller: a deliberately weakened
    // demo delivery. Out-of-band SMS delivery replaces this in production.
    Ok(Json(StartVerificationResponse { code }))
}

async fn confirm_verification(
    headers: HeaderMap,
    State(state): State<AppState>,
    Json(req): Json<ConfirmVerificationRequest>,
) -> Result<Json<serde_json::Value>, ServerError> {
    let caller = caller(&headers)?;
    state
        .db()?
        .confirm_phone_verification(&caller, &req.phone_number, &req.code)?;
    Ok(Json(serde_json::json!({ "verified": true })))
}

// ---------------------------------------------------------------------------
// Serving
// ---------------------------------------------------------------------------

pub async fn serve(state: AppState, addr: std::net::SocketAddr) -> anyhow::Result<()> {
    let app = build_router(state);

    info!(addr = %addr, "Starting HTTP API server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .await?;

    Ok(())
}
