//! HTTP surface. Thin translation layer: parse inputs, call the service,
//! map `AppError` through `ResponseError`.

use actix_web::{delete, get, post, web, HttpRequest, HttpResponse};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::cache::TimelineCache;
use crate::error::{AppError, Result};
use crate::services::{PullTimelineService, TimelineService};

pub struct AppState {
    pub timeline: Arc<TimelineService>,
    pub pull: Arc<PullTimelineService>,
    pub cache: Arc<TimelineCache>,
}

/// Caller identity. Auth is out of scope, so the id rides in a header.
fn caller_id(req: &HttpRequest) -> Result<Uuid> {
    req.headers()
        .get("User-Id")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| Uuid::parse_str(value).ok())
        .ok_or_else(|| AppError::Validation("Missing or invalid User-Id header".into()))
}

#[derive(Debug, Deserialize)]
pub struct CreatePostRequest {
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    #[serde(default)]
    pub page: u32,
    #[serde(default = "default_page_size")]
    pub size: u32,
}

fn default_page_size() -> u32 {
    20
}

#[post("/posts")]
async fn create_post(
    req: HttpRequest,
    body: web::Json<CreatePostRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let author_id = caller_id(&req)?;
    let post = state.timeline.create_post(author_id, &body.content).await?;
    Ok(HttpResponse::Created().json(post))
}

#[get("/posts/{post_id}")]
async fn get_post(
    path: web::Path<Uuid>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let post = state.timeline.get_post(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(post))
}

#[delete("/posts/{post_id}")]
async fn delete_post(
    path: web::Path<Uuid>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    state.timeline.delete_post(path.into_inner()).await?;
    Ok(HttpResponse::NoContent().finish())
}

#[get("/timeline")]
async fn get_timeline(
    req: HttpRequest,
    query: web::Query<PageQuery>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let user_id = caller_id(&req)?;
    let page = state
        .timeline
        .get_user_feed(user_id, query.page, query.size)
        .await?;
    Ok(HttpResponse::Ok().json(page))
}

#[post("/follow/{followee_id}")]
async fn follow_user(
    req: HttpRequest,
    path: web::Path<Uuid>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let follower_id = caller_id(&req)?;
    state
        .timeline
        .follow_user(follower_id, path.into_inner())
        .await?;
    Ok(HttpResponse::Ok().finish())
}

#[delete("/follow/{followee_id}")]
async fn unfollow_user(
    req: HttpRequest,
    path: web::Path<Uuid>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let follower_id = caller_id(&req)?;
    state
        .timeline
        .unfollow_user(follower_id, path.into_inner())
        .await?;
    Ok(HttpResponse::Ok().finish())
}

#[post("/users/{user_id}/activity")]
async fn record_activity(
    path: web::Path<Uuid>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    state.timeline.record_activity(path.into_inner()).await?;
    Ok(HttpResponse::NoContent().finish())
}

#[get("/timeline/{user_id}")]
async fn get_pull_timeline(
    path: web::Path<Uuid>,
    query: web::Query<PageQuery>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let page = state
        .pull
        .get_user_feed(path.into_inner(), query.page, query.size)
        .await?;
    Ok(HttpResponse::Ok().json(page))
}

#[get("/stats/{user_id}")]
async fn get_pull_stats(
    path: web::Path<Uuid>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let stats = state.pull.estimate_complexity(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(stats))
}

#[get("/cache/stats")]
async fn get_cache_stats(state: web::Data<AppState>) -> Result<HttpResponse> {
    Ok(HttpResponse::Ok().json(state.cache.stats()))
}

#[get("/health")]
async fn health() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({ "status": "ok" }))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/feed")
            .service(create_post)
            .service(get_post)
            .service(delete_post)
            .service(get_timeline)
            .service(follow_user)
            .service(unfollow_user),
    )
    .service(
        web::scope("/api/pull-feed")
            .service(get_pull_timeline)
            .service(get_pull_stats),
    )
    .service(web::scope("/api").service(record_activity).service(get_cache_stats))
    .service(health);
}
