//! Axum router and all HTTP handlers for scm-daemon.
//!
//! `build_router` is the single entry point; `main.rs` calls it and attaches
//! middleware layers. The scenario tests in `tests/` compose the bare router.

use std::{convert::Infallible, sync::Arc};

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use futures_util::{Stream, StreamExt};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tracing::info;

use scm_core::{
    dates::now_local,
    filters::{apply_filters, facets},
    kpi::calculate_kpis,
    pipeline::{orders_in_stage, pipeline_board},
    template::{order_sheet_template, supplier_sheet_template},
    Order, OrderStatus,
};

use crate::{
    api_types::{
        CancelRequest, ErrorResponse, ErrorsResponse, HealthResponse, ImportRequest, KpisResponse,
        OrdersResponse, PipelineResponse, SuppliersResponse, ViewQuery,
    },
    refresh::{self, RefreshOutcome},
    state::{AppState, BusMsg, RefreshTrigger},
};

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Build the complete application router wired to the given shared state.
///
/// Middleware layers (CORS, tracing) are **not** applied here; `main.rs`
/// attaches them after this call so tests can use the bare router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/health", get(health))
        .route("/v1/status", get(status_handler))
        .route("/v1/stream", get(stream))
        .route("/v1/orders", get(orders))
        .route("/v1/orders/:id", get(order_by_id))
        .route("/v1/orders/:id/cancel", post(cancel_order))
        .route("/v1/suppliers", get(suppliers))
        .route("/v1/errors", get(errors))
        .route("/v1/kpis", get(kpis))
        .route("/v1/pipeline", get(pipeline))
        .route("/v1/pipeline/:stage/orders", get(pipeline_stage_orders))
        .route("/v1/facets", get(facets_handler))
        .route("/v1/import", post(import))
        .route("/v1/refresh", post(refresh_handler))
        .route("/v1/mode/mock", post(mode_mock))
        .route("/v1/mode/live", post(mode_live))
        .route("/v1/templates/:kind", get(template))
        .with_state(state)
}

fn error(status: StatusCode, msg: impl Into<String>) -> Response {
    (status, Json(ErrorResponse { error: msg.into() })).into_response()
}

/// `(in_view, all)` for the active dataset under `q`.
async fn view(st: &AppState, q: &ViewQuery) -> Result<(Vec<Order>, Vec<Order>), Response> {
    let filters = q
        .filter_options()
        .map_err(|e| error(StatusCode::BAD_REQUEST, e))?;
    let s = st.session.read().await;
    let all = s.active().orders.clone();
    let in_view = apply_filters(&all, &filters, q.search_term());
    Ok((in_view, all))
}

// ---------------------------------------------------------------------------
// GET /v1/health, /v1/status
// ---------------------------------------------------------------------------

pub(crate) async fn health(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            ok: true,
            service: st.build.service,
            version: st.build.version,
        }),
    )
}

pub(crate) async fn status_handler(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    let snap = st.status_snapshot().await;
    let _ = st.bus.send(BusMsg::Status(snap.clone()));
    (StatusCode::OK, Json(snap))
}

// ---------------------------------------------------------------------------
// Dataset views
// ---------------------------------------------------------------------------

pub(crate) async fn orders(
    State(st): State<Arc<AppState>>,
    Query(q): Query<ViewQuery>,
) -> Response {
    let (in_view, all) = match view(&st, &q).await {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let data_mode = st.session.read().await.mode;
    Json(OrdersResponse {
        data_mode,
        total: all.len(),
        orders: in_view,
    })
    .into_response()
}

pub(crate) async fn order_by_id(
    State(st): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Response {
    let s = st.session.read().await;
    match s.active().orders.iter().find(|o| o.id == id) {
        Some(order) => Json(order.clone()).into_response(),
        None => error(StatusCode::NOT_FOUND, format!("order not found: {id}")),
    }
}

pub(crate) async fn suppliers(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    let s = st.session.read().await;
    Json(SuppliersResponse {
        suppliers: s.active().suppliers.clone(),
    })
}

pub(crate) async fn errors(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    let s = st.session.read().await;
    Json(ErrorsResponse {
        errors: s.errors.clone(),
    })
}

pub(crate) async fn kpis(State(st): State<Arc<AppState>>, Query(q): Query<ViewQuery>) -> Response {
    let (in_view, all) = match view(&st, &q).await {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let summary = calculate_kpis(&in_view, &all);
    let tiles = summary.tiles();
    Json(KpisResponse { summary, tiles }).into_response()
}

pub(crate) async fn pipeline(
    State(st): State<Arc<AppState>>,
    Query(q): Query<ViewQuery>,
) -> Response {
    let (in_view, all) = match view(&st, &q).await {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let stages = pipeline_board(&in_view, &all, &st.reconcile_options.sla, now_local());
    Json(PipelineResponse { stages }).into_response()
}

/// Drill-down. `stage` accepts a label or identifier in any case.
pub(crate) async fn pipeline_stage_orders(
    State(st): State<Arc<AppState>>,
    Path(stage): Path<String>,
    Query(q): Query<ViewQuery>,
) -> Response {
    let Some(stage) = OrderStatus::parse(&stage) else {
        return error(StatusCode::NOT_FOUND, format!("unknown stage: {stage}"));
    };
    let (in_view, _) = match view(&st, &q).await {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let orders: Vec<Order> = orders_in_stage(&in_view, stage).into_iter().cloned().collect();
    Json(orders).into_response()
}

pub(crate) async fn facets_handler(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    let s = st.session.read().await;
    Json(facets(&s.active().orders))
}

// ---------------------------------------------------------------------------
// Mutations
// ---------------------------------------------------------------------------

/// Body is optional; `{}` and an empty body both cancel without a reason.
pub(crate) async fn cancel_order(
    State(st): State<Arc<AppState>>,
    Path(id): Path<String>,
    body: Bytes,
) -> Response {
    let req: CancelRequest = if body.is_empty() {
        CancelRequest::default()
    } else {
        match serde_json::from_slice(&body) {
            Ok(r) => r,
            Err(e) => return error(StatusCode::BAD_REQUEST, format!("invalid body: {e}")),
        }
    };
    match refresh::cancel(&st, &id, req.reason.as_deref()).await {
        Some(order) => {
            info!(order_id = %id, "orders/cancel");
            Json(order).into_response()
        }
        None => error(StatusCode::NOT_FOUND, format!("order not found: {id}")),
    }
}

pub(crate) async fn import(
    State(st): State<Arc<AppState>>,
    Json(req): Json<ImportRequest>,
) -> impl IntoResponse {
    let outcome = refresh::import_csv(&st, &req.order_csv, &req.supplier_csv).await;
    info!(
        switched = outcome.switched_to_live,
        orders = outcome.orders_count,
        errors = outcome.errors.len(),
        "import"
    );
    Json(outcome)
}

pub(crate) async fn refresh_handler(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    let outcome = refresh::refresh(&st, RefreshTrigger::Manual).await;
    let status = match outcome {
        RefreshOutcome::Completed { .. } => StatusCode::OK,
        RefreshOutcome::Skipped | RefreshOutcome::NotLive => StatusCode::CONFLICT,
    };
    (status, Json(outcome))
}

pub(crate) async fn mode_mock(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    refresh::switch_to_mock(&st).await;
    let snap = st.status_snapshot().await;
    let _ = st.bus.send(BusMsg::Status(snap.clone()));
    Json(snap)
}

pub(crate) async fn mode_live(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    let outcome = refresh::switch_to_live(&st).await;
    let status = match outcome {
        RefreshOutcome::Completed { .. } => StatusCode::OK,
        _ => StatusCode::CONFLICT,
    };
    (status, Json(outcome))
}

// ---------------------------------------------------------------------------
// GET /v1/templates/:kind  (text/csv)
// ---------------------------------------------------------------------------

pub(crate) async fn template(Path(kind): Path<String>) -> Response {
    let today = now_local().date();
    let (rendered, filename) = match kind.as_str() {
        "orders" => (order_sheet_template(today), "order_data_template.csv"),
        "suppliers" => (
            supplier_sheet_template(today),
            "supplier_lineitem_data_template.csv",
        ),
        other => return error(StatusCode::NOT_FOUND, format!("unknown template: {other}")),
    };
    let body = match rendered {
        Ok(b) => b,
        Err(e) => return error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    };

    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/csv; charset=utf-8"),
    );
    if let Ok(v) = HeaderValue::from_str(&format!("attachment; filename=\"{filename}\"")) {
        headers.insert(header::CONTENT_DISPOSITION, v);
    }
    (StatusCode::OK, headers, body).into_response()
}

// ---------------------------------------------------------------------------
// GET /v1/stream  (SSE)
// ---------------------------------------------------------------------------

pub(crate) async fn stream(State(st): State<Arc<AppState>>) -> Response {
    let mut headers = HeaderMap::new();
    headers.insert("Cache-Control", HeaderValue::from_static("no-cache"));
    headers.insert("Connection", HeaderValue::from_static("keep-alive"));

    let rx = st.bus.subscribe();
    let events = broadcast_to_sse(rx);

    (headers, Sse::new(events).keep_alive(KeepAlive::new())).into_response()
}

fn broadcast_to_sse(
    rx: broadcast::Receiver<BusMsg>,
) -> impl Stream<Item = Result<Event, Infallible>> {
    BroadcastStream::new(rx).filter_map(|msg| async move {
        match msg {
            Ok(m) => {
                let event_name = match &m {
                    BusMsg::Heartbeat { .. } => "heartbeat",
                    BusMsg::Status(_) => "status",
                    BusMsg::LogLine { .. } => "log",
                    BusMsg::Dataset(_) => "dataset",
                };
                let data = serde_json::to_string(&m).ok()?;
                Some(Ok(Event::default().event(event_name).data(data)))
            }
            Err(_) => None, // lagged / closed
        }
    })
}
