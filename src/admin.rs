//! Admin listener routes.
//!
//! Thin axum handlers over the [`Gateway`] admin operations. Errors
//! render through `IntoResponse` on [`RegistryError`] and [`AuditError`].

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{delete, get};
use axum::{Json, Router};
use serde::Deserialize;

use crate::config::model::ServiceConfig;
use crate::error::{AuditError, RegistryError};
use crate::gateway::{Gateway, ServiceSummary};
use crate::health::health_handler;

#[derive(Debug, Deserialize)]
pub struct UpstreamBody {
    pub url: String,
}

#[derive(Debug, Deserialize)]
pub struct ReplaceUpstreamBody {
    pub old_url: String,
    pub url: String,
}

pub fn router() -> Router<Arc<Gateway>> {
    Router::new()
        .route("/health", get(health_handler))
        .route("/services", get(list_services).post(register_service))
        .route("/services/{service}", delete(deregister_service))
        .route(
            "/services/{service}/upstreams",
            get(list_upstreams)
                .post(add_upstream)
                .put(replace_upstream)
                .delete(remove_upstream),
        )
        .route("/logs", get(read_logs))
}

async fn list_services(State(gateway): State<Arc<Gateway>>) -> Json<Vec<ServiceSummary>> {
    Json(gateway.describe_services())
}

async fn register_service(
    State(gateway): State<Arc<Gateway>>,
    Json(service): Json<ServiceConfig>,
) -> Result<impl IntoResponse, RegistryError> {
    let key = service.key().to_string();
    let replaced = gateway.register_service(service)?;
    let status = if replaced {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };
    Ok((status, Json(gateway.list_upstreams(&key)?)))
}

async fn deregister_service(
    State(gateway): State<Arc<Gateway>>,
    Path(service): Path<String>,
) -> Result<StatusCode, RegistryError> {
    gateway.deregister_service(&service)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_upstreams(
    State(gateway): State<Arc<Gateway>>,
    Path(service): Path<String>,
) -> Result<Json<Vec<String>>, RegistryError> {
    Ok(Json(gateway.list_upstreams(&service)?))
}

async fn add_upstream(
    State(gateway): State<Arc<Gateway>>,
    Path(service): Path<String>,
    Json(body): Json<UpstreamBody>,
) -> Result<impl IntoResponse, RegistryError> {
    gateway.add_upstream(&service, &body.url)?;
    Ok((StatusCode::CREATED, Json(gateway.list_upstreams(&service)?)))
}

async fn replace_upstream(
    State(gateway): State<Arc<Gateway>>,
    Path(service): Path<String>,
    Json(body): Json<ReplaceUpstreamBody>,
) -> Result<Json<Vec<String>>, RegistryError> {
    gateway.replace_upstream(&service, &body.old_url, &body.url)?;
    Ok(Json(gateway.list_upstreams(&service)?))
}

async fn remove_upstream(
    State(gateway): State<Arc<Gateway>>,
    Path(service): Path<String>,
    Query(query): Query<UpstreamBody>,
) -> Result<StatusCode, RegistryError> {
    gateway.remove_upstream(&service, &query.url)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn read_logs(State(gateway): State<Arc<Gateway>>) -> Result<impl IntoResponse, AuditError> {
    let contents = gateway.read_audit_log().await?;
    Ok(([(header::CONTENT_TYPE, "application/x-ndjson")], contents))
}
