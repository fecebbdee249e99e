use std::convert::Infallible;

use axum::{
    extract::{Path, Query, State},
    response::sse::{Event, KeepAlive, Sse},
    routing::{get, post, put},
    Json, Router,
};
use futures_util::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tokio_stream::wrappers::BroadcastStream;
use tracing::info;

use embarque_core::booking::Leg;
use embarque_core::store::BulkAssignReport;
use embarque_manifest::{
    CityGroupBy, Hierarchy, OrganizeMode, ReorderScope, SeatMap, SeatState,
};

use crate::error::AppError;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/trips/{trip_id}/manifest", get(get_manifest))
        .route("/v1/trips/{trip_id}/order", post(reorder))
        .route("/v1/trips/{trip_id}/order/move", post(move_node))
        .route("/v1/trips/{trip_id}/order/sync-city", post(sync_city_order))
        .route("/v1/trips/{trip_id}/links", post(link))
        .route("/v1/trips/{trip_id}/links/{booking_id}", axum::routing::delete(unlink))
        .route("/v1/trips/{trip_id}/bookings/{booking_id}/tag", put(set_tag))
        .route(
            "/v1/trips/{trip_id}/bookings/{booking_id}/seat",
            put(bind_seat).delete(unbind_seat),
        )
        .route("/v1/trips/{trip_id}/vehicles/{vehicle_id}/seats", get(seat_map))
        .route(
            "/v1/trips/{trip_id}/vehicles/{vehicle_id}/seats/{seat_number}",
            get(inspect_seat),
        )
        .route("/v1/trips/{trip_id}/selection/expand", post(expand_selection))
        .route("/v1/trips/{trip_id}/dispatch", post(dispatch))
        .route("/v1/trips/{trip_id}/events", get(events))
}

#[derive(Debug, Deserialize)]
struct ManifestQuery {
    mode: Option<OrganizeMode>,
    city_group_by: Option<CityGroupBy>,
}

async fn get_manifest(
    State(state): State<AppState>,
    Path(trip_id): Path<i64>,
    Query(query): Query<ManifestQuery>,
) -> Result<Json<Hierarchy>, AppError> {
    let organizer = state.organizer(trip_id).await?;

    let (mode, city_group_by) = organizer.view().await;
    organizer
        .set_view(
            query.mode.unwrap_or(mode),
            query.city_group_by.unwrap_or(city_group_by),
        )
        .await;

    Ok(Json(organizer.hierarchy().await))
}

#[derive(Debug, Deserialize)]
struct ReorderRequest {
    order: Vec<i64>,
    mode: Option<OrganizeMode>,
}

#[derive(Debug, Serialize)]
struct ReorderResponse {
    scope: ReorderScope,
}

async fn reorder(
    State(state): State<AppState>,
    Path(trip_id): Path<i64>,
    Json(req): Json<ReorderRequest>,
) -> Result<Json<ReorderResponse>, AppError> {
    let organizer = state.organizer(trip_id).await?;
    if let Some(mode) = req.mode {
        let (_, city_group_by) = organizer.view().await;
        organizer.set_view(mode, city_group_by).await;
    }

    let scope = organizer.reorder(&req.order).await?;
    Ok(Json(ReorderResponse { scope }))
}

#[derive(Debug, Deserialize)]
struct MoveRequest {
    node_id: i64,
    /// Move before this node's group; absent means move to the end.
    target_id: Option<i64>,
}

async fn move_node(
    State(state): State<AppState>,
    Path(trip_id): Path<i64>,
    Json(req): Json<MoveRequest>,
) -> Result<Json<ReorderResponse>, AppError> {
    let organizer = state.organizer(trip_id).await?;
    let scope = match req.target_id {
        Some(target_id) => organizer.move_before(req.node_id, target_id).await?,
        None => organizer.move_to_end(req.node_id).await?,
    };
    Ok(Json(ReorderResponse { scope }))
}

async fn sync_city_order(
    State(state): State<AppState>,
    Path(trip_id): Path<i64>,
) -> Result<axum::http::StatusCode, AppError> {
    let organizer = state.organizer(trip_id).await?;
    organizer.sync_city_order().await?;
    Ok(axum::http::StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
struct LinkRequest {
    booking_id: i64,
    anchor_id: i64,
}

async fn link(
    State(state): State<AppState>,
    Path(trip_id): Path<i64>,
    Json(req): Json<LinkRequest>,
) -> Result<axum::http::StatusCode, AppError> {
    let organizer = state.organizer(trip_id).await?;
    organizer.link(req.booking_id, req.anchor_id).await?;
    Ok(axum::http::StatusCode::NO_CONTENT)
}

async fn unlink(
    State(state): State<AppState>,
    Path((trip_id, booking_id)): Path<(i64, i64)>,
) -> Result<axum::http::StatusCode, AppError> {
    let organizer = state.organizer(trip_id).await?;
    organizer.unlink(booking_id).await?;
    Ok(axum::http::StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
struct TagRequest {
    color: Option<String>,
}

async fn set_tag(
    State(state): State<AppState>,
    Path((trip_id, booking_id)): Path<(i64, i64)>,
    Json(req): Json<TagRequest>,
) -> Result<axum::http::StatusCode, AppError> {
    let organizer = state.organizer(trip_id).await?;
    organizer.set_tag(booking_id, req.color.as_deref()).await?;
    Ok(axum::http::StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
struct BindSeatRequest {
    vehicle_id: i64,
    seat_number: String,
}

async fn bind_seat(
    State(state): State<AppState>,
    Path((trip_id, booking_id)): Path<(i64, i64)>,
    Json(req): Json<BindSeatRequest>,
) -> Result<axum::http::StatusCode, AppError> {
    let organizer = state.organizer(trip_id).await?;
    organizer
        .bind_seat(booking_id, req.vehicle_id, &req.seat_number)
        .await?;
    Ok(axum::http::StatusCode::NO_CONTENT)
}

async fn unbind_seat(
    State(state): State<AppState>,
    Path((trip_id, booking_id)): Path<(i64, i64)>,
) -> Result<axum::http::StatusCode, AppError> {
    let organizer = state.organizer(trip_id).await?;
    organizer.unbind_seat(booking_id).await?;
    Ok(axum::http::StatusCode::NO_CONTENT)
}

async fn seat_map(
    State(state): State<AppState>,
    Path((trip_id, vehicle_id)): Path<(i64, i64)>,
) -> Result<Json<SeatMap>, AppError> {
    let organizer = state.organizer(trip_id).await?;
    Ok(Json(organizer.seat_map(vehicle_id).await?))
}

async fn inspect_seat(
    State(state): State<AppState>,
    Path((trip_id, vehicle_id, seat_number)): Path<(i64, i64, String)>,
) -> Result<Json<SeatState>, AppError> {
    let organizer = state.organizer(trip_id).await?;
    Ok(Json(organizer.inspect_seat(vehicle_id, &seat_number).await?))
}

#[derive(Debug, Deserialize)]
struct ExpandRequest {
    ids: Vec<i64>,
}

#[derive(Debug, Serialize)]
struct ExpandResponse {
    ids: Vec<i64>,
}

async fn expand_selection(
    State(state): State<AppState>,
    Path(trip_id): Path<i64>,
    Json(req): Json<ExpandRequest>,
) -> Result<Json<ExpandResponse>, AppError> {
    let organizer = state.organizer(trip_id).await?;
    Ok(Json(ExpandResponse {
        ids: organizer.expand_selection(&req.ids).await,
    }))
}

#[derive(Debug, Deserialize)]
struct DispatchRequest {
    ids: Vec<i64>,
    driver_id: Option<i64>,
    leg: Leg,
}

async fn dispatch(
    State(state): State<AppState>,
    Path(trip_id): Path<i64>,
    Json(req): Json<DispatchRequest>,
) -> Result<Json<BulkAssignReport>, AppError> {
    let organizer = state.organizer(trip_id).await?;
    let report = organizer
        .bulk_assign(&req.ids, req.driver_id, req.leg)
        .await?;
    info!(trip_id, applied = report.applied.len(), "dispatch applied");
    Ok(Json(report))
}

async fn events(
    State(state): State<AppState>,
    Path(trip_id): Path<i64>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.events.subscribe();

    let stream = BroadcastStream::new(rx).filter_map(move |result| async move {
        match result {
            Ok(event) if event.trip_id == trip_id => serde_json::to_string(&event)
                .ok()
                .map(|data| Ok(Event::default().event("manifest").data(data))),
            _ => None,
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}
