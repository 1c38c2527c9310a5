//! HTTP handlers

use std::net::SocketAddr;

use axum::extract::rejection::JsonRejection;
use axum::extract::{ConnectInfo, Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{ApiResult, AppState};
use crate::analytics::AnalyticsResponse;
use crate::auth;
use crate::error::Error;
use crate::links::{LinkDetails, LinkUpdate, NewLink, NewTask, PublicLink, TaskUpdate};
use crate::model::{CompletionMethod, CompletionStatus, Link, Task};
use crate::service::{GateView, Linksy};
use crate::verify::{OpenTicket, Submission, WebhookPayload};
use crate::visits::ClientMeta;

// =============================================================================
// Request/response bodies
// =============================================================================

#[derive(Debug, Serialize)]
pub struct CreatedLink {
    pub id: String,
    pub slug: String,
}

#[derive(Debug, Deserialize)]
pub struct VisitRequest {
    pub link_id: String,
}

#[derive(Debug, Serialize)]
pub struct IdResponse {
    pub id: String,
}

#[derive(Debug, Serialize)]
pub struct CompletionResponse {
    pub id: String,
    pub status: CompletionStatus,
}

#[derive(Debug, Deserialize)]
pub struct OpenRequest {
    pub visit_id: String,
}

#[derive(Debug, Deserialize)]
pub struct ReviewRequest {
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct ReviewResponse {
    pub id: String,
    pub status: CompletionStatus,
    pub method: CompletionMethod,
    pub created_at: DateTime<Utc>,
}

/// Public landing data: the link plus the visit recorded for this load.
#[derive(Debug, Serialize)]
pub struct Landing {
    pub link: PublicLink,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visit_id: Option<String>,
}

// =============================================================================
// Helpers
// =============================================================================

fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, Error> {
    body.map(|Json(value)| value)
        .map_err(|rejection| Error::InvalidArgument(format!("invalid JSON body: {}", rejection.body_text())))
}

fn authorization(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

fn owner(state: &AppState, headers: &HeaderMap) -> Result<String, Error> {
    state.authenticate(authorization(headers))
}

pub fn client_meta(headers: &HeaderMap, peer: Option<SocketAddr>) -> ClientMeta {
    let ip = ClientMeta::client_ip(
        header_str(headers, "x-forwarded-for"),
        header_str(headers, "x-real-ip"),
        peer.map(|addr| addr.ip()),
    );
    ClientMeta::new(
        ip,
        header_str(headers, header::USER_AGENT.as_str()),
        header_str(headers, header::REFERER.as_str()),
    )
}

/// Throttle a public request and return the caller's metadata.
fn public_client(
    state: &AppState,
    headers: &HeaderMap,
    peer: Option<ConnectInfo<SocketAddr>>,
) -> Result<ClientMeta, Error> {
    let client = client_meta(headers, peer.map(|ConnectInfo(addr)| addr));
    state.throttle(&client.ip)?;
    Ok(client)
}

/// Run a facade call on the blocking pool. Storage calls may sleep while
/// waiting on a file lock.
async fn blocking<T, F>(state: &AppState, work: F) -> Result<T, Error>
where
    F: FnOnce(&Linksy) -> Result<T, Error> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    tokio::task::spawn_blocking(move || work(state.as_ref()))
        .await
        .map_err(|err| Error::OperationFailed(format!("storage task failed: {err}")))?
}

// =============================================================================
// Handlers
// =============================================================================

pub async fn health() -> &'static str {
    "ok"
}

/// GET /api/links
pub async fn list_links(State(state): State<AppState>, headers: HeaderMap) -> ApiResult<Json<Vec<Link>>> {
    let user = owner(&state, &headers)?;
    let links = blocking(&state, move |app| app.list_links(&user)).await?;
    Ok(Json(links))
}

/// POST /api/links
pub async fn create_link(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<NewLink>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<CreatedLink>)> {
    let user = owner(&state, &headers)?;
    let input = json_body(body)?;
    let link = blocking(&state, move |app| app.create_link(&user, input)).await?;
    Ok((
        StatusCode::CREATED,
        Json(CreatedLink {
            id: link.id,
            slug: link.slug,
        }),
    ))
}

/// GET /api/links/:id
pub async fn get_link(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> ApiResult<Json<LinkDetails>> {
    let user = owner(&state, &headers)?;
    let details = blocking(&state, move |app| app.get_link(&user, &id)).await?;
    Ok(Json(details))
}

/// PATCH /api/links/:id
pub async fn update_link(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    body: Result<Json<LinkUpdate>, JsonRejection>,
) -> ApiResult<Json<Link>> {
    let user = owner(&state, &headers)?;
    let changes = json_body(body)?;
    let link = blocking(&state, move |app| app.update_link(&user, &id, changes)).await?;
    Ok(Json(link))
}

/// DELETE /api/links/:id
pub async fn delete_link(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> ApiResult<StatusCode> {
    let user = owner(&state, &headers)?;
    blocking(&state, move |app| app.delete_link(&user, &id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/links/:id/tasks
pub async fn add_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    body: Result<Json<NewTask>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Task>)> {
    let user = owner(&state, &headers)?;
    let input = json_body(body)?;
    let task = blocking(&state, move |app| app.add_task(&user, &id, input)).await?;
    Ok((StatusCode::CREATED, Json(task)))
}

/// PATCH /api/links/:id/tasks/:task_id
pub async fn update_task(
    State(state): State<AppState>,
    Path((id, task_id)): Path<(String, String)>,
    headers: HeaderMap,
    body: Result<Json<TaskUpdate>, JsonRejection>,
) -> ApiResult<Json<Task>> {
    let user = owner(&state, &headers)?;
    let changes = json_body(body)?;
    let task = blocking(&state, move |app| app.update_task(&user, &id, &task_id, changes)).await?;
    Ok(Json(task))
}

/// DELETE /api/links/:id/tasks/:task_id
pub async fn delete_task(
    State(state): State<AppState>,
    Path((id, task_id)): Path<(String, String)>,
    headers: HeaderMap,
) -> ApiResult<StatusCode> {
    let user = owner(&state, &headers)?;
    blocking(&state, move |app| app.remove_task(&user, &id, &task_id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/analytics/:link_id
pub async fn analytics(
    State(state): State<AppState>,
    Path(link_id): Path<String>,
    headers: HeaderMap,
) -> ApiResult<Json<AnalyticsResponse>> {
    let user = owner(&state, &headers)?;
    let report = blocking(&state, move |app| app.analytics(&user, &link_id)).await?;
    Ok(Json(report))
}

/// GET /api/links/slug/:slug
pub async fn public_link(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> ApiResult<Json<PublicLink>> {
    let link = blocking(&state, move |app| app.public_link(&slug)).await?;
    Ok(Json(link))
}

/// GET /l/:slug
///
/// Visit recording is best effort here: the page must load even when the
/// visit log cannot be written.
pub async fn landing(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    headers: HeaderMap,
    peer: Option<ConnectInfo<SocketAddr>>,
) -> ApiResult<Json<Landing>> {
    let client = client_meta(&headers, peer.map(|ConnectInfo(addr)| addr));
    let page = blocking(&state, move |app| {
        let link = app.public_link(&slug)?;
        let visit_id = app
            .record_visit_best_effort(&link.id, &client)
            .map(|visit| visit.id);
        Ok(Landing { link, visit_id })
    })
    .await?;
    Ok(Json(page))
}

/// POST /api/visits
pub async fn record_visit(
    State(state): State<AppState>,
    headers: HeaderMap,
    peer: Option<ConnectInfo<SocketAddr>>,
    body: Result<Json<VisitRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<IdResponse>)> {
    let client = public_client(&state, &headers, peer)?;
    let request = json_body(body)?;
    let visit = blocking(&state, move |app| app.record_visit(&request.link_id, &client)).await?;
    Ok((StatusCode::CREATED, Json(IdResponse { id: visit.id })))
}

/// POST /api/claims
pub async fn claim(
    State(state): State<AppState>,
    headers: HeaderMap,
    peer: Option<ConnectInfo<SocketAddr>>,
    body: Result<Json<Submission>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<CompletionResponse>)> {
    public_client(&state, &headers, peer)?;
    let submission = json_body(body)?;
    let row = blocking(&state, move |app| app.claim(submission)).await?;
    Ok((
        StatusCode::CREATED,
        Json(CompletionResponse {
            id: row.id,
            status: row.status,
        }),
    ))
}

/// POST /api/verify/:task_id
pub async fn verify(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
    headers: HeaderMap,
    peer: Option<ConnectInfo<SocketAddr>>,
    body: Result<Json<Submission>, JsonRejection>,
) -> ApiResult<Json<CompletionResponse>> {
    public_client(&state, &headers, peer)?;
    let submission = json_body(body)?;
    let row = blocking(&state, move |app| app.verify(&task_id, submission)).await?;
    Ok(Json(CompletionResponse {
        id: row.id,
        status: row.status,
    }))
}

/// POST /api/open/:task_id
pub async fn open_task(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
    headers: HeaderMap,
    peer: Option<ConnectInfo<SocketAddr>>,
    body: Result<Json<OpenRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<OpenTicket>)> {
    public_client(&state, &headers, peer)?;
    let request = json_body(body)?;
    // The timed append is detached; the blocking pool keeps the runtime context.
    let ticket = blocking(&state, move |app| {
        app.open_task(&request.visit_id, &task_id)
            .map(|(ticket, _scheduled)| ticket)
    })
    .await?;
    Ok((StatusCode::ACCEPTED, Json(ticket)))
}

/// POST /api/webhooks/social-callback
pub async fn social_callback(
    State(state): State<AppState>,
    headers: HeaderMap,
    peer: Option<ConnectInfo<SocketAddr>>,
    body: Result<Json<WebhookPayload>, JsonRejection>,
) -> ApiResult<Json<CompletionResponse>> {
    public_client(&state, &headers, peer)?;
    let payload = json_body(body)?;
    let row = blocking(&state, move |app| app.webhook(payload)).await?;
    Ok(Json(CompletionResponse {
        id: row.id,
        status: row.status,
    }))
}

/// GET /api/gate/:visit_id
pub async fn gate(
    State(state): State<AppState>,
    Path(visit_id): Path<String>,
) -> ApiResult<Json<GateView>> {
    let view = blocking(&state, move |app| app.gate(&visit_id)).await?;
    Ok(Json(view))
}

/// PATCH /api/admin/completions/:id
pub async fn review_completion(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    body: Result<Json<ReviewRequest>, JsonRejection>,
) -> ApiResult<Json<ReviewResponse>> {
    let token = authorization(&headers)
        .and_then(auth::bearer_token)
        .map(str::to_string);
    let request = json_body(body)?;
    let status: CompletionStatus = request.status.parse()?;
    let row = blocking(&state, move |app| app.review(&id, status, token.as_deref())).await?;
    Ok(Json(ReviewResponse {
        id: row.id,
        status: row.status,
        method: row.method,
        created_at: row.created_at,
    }))
}
