//! Defines the Axum API routes and handlers.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;

use crate::inputs::ManualDrive;
use crate::robot::{RobotHandles, RobotRequest};
use crate::scheduler::TimeInterface;
use crate::telemetry::TelemetryFrame;
use crate::web::models::{DriveRequest, DriveResponse, TrackingRequest, TrackingResponse};

#[derive(Clone)]
pub struct AppState {
    pub robot: RobotHandles,
    /// Same clock the control loop reads, so manual timestamps compare directly.
    pub clock: Arc<dyn TimeInterface>,
}

/// Creates the Axum router with all the API endpoints.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/status", get(get_status))
        .route("/api/v1/drive", post(drive))
        .route("/api/v1/tracking", post(set_tracking))
        .route("/api/v1/trajectory/clear", post(clear_trajectory))
        .route("/api/v1/odometry/reset", post(reset_odometry))
        .with_state(state)
}

/// Serve on an already bound listener until shutdown fires.
pub async fn serve(
    listener: TcpListener,
    state: AppState,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> std::io::Result<()> {
    tracing::info!("Web API listening on http://{}", listener.local_addr()?);
    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.recv().await;
        })
        .await
}

/// Latest telemetry frame; 503 until the control loop has ticked once.
async fn get_status(State(state): State<AppState>) -> Result<Json<TelemetryFrame>, StatusCode> {
    let latest = state.robot.status.borrow().clone();
    latest.map(Json).ok_or(StatusCode::SERVICE_UNAVAILABLE)
}

async fn drive(State(state): State<AppState>, Json(payload): Json<DriveRequest>) -> Json<DriveResponse> {
    let drive = ManualDrive::new(payload.vx, payload.vy, state.clock.now_monotonic());
    tracing::debug!("Manual drive vx={:.2} vy={:.2}", drive.vx, drive.vy);
    state.robot.inputs.set_manual(drive);
    Json(DriveResponse { vx: drive.vx, vy: drive.vy })
}

async fn set_tracking(
    State(state): State<AppState>,
    Json(payload): Json<TrackingRequest>,
) -> Json<TrackingResponse> {
    tracing::info!("Tracking {}", if payload.enabled { "enabled" } else { "disabled" });
    state.robot.inputs.set_tracking(payload.enabled);
    Json(TrackingResponse { tracking_enabled: payload.enabled })
}

async fn clear_trajectory(State(state): State<AppState>) -> StatusCode {
    queue_request(&state, RobotRequest::ClearTrajectory).await
}

async fn reset_odometry(State(state): State<AppState>) -> StatusCode {
    queue_request(&state, RobotRequest::ResetOdometry).await
}

async fn queue_request(state: &AppState, request: RobotRequest) -> StatusCode {
    match state.robot.requests.send(request).await {
        Ok(()) => StatusCode::ACCEPTED,
        Err(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}
