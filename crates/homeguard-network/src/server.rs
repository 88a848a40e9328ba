//! HTTP control API.
//!
//! ```text
//! POST /api/arm        -> {"success": true, "message": "System armed"}
//! POST /api/disarm     -> {"success": true, "message": "System disarmed"}
//! POST /api/reset      -> {"success": true, "message": "Alarm reset"}
//! POST /api/emergency  -> {"success": true, "message": "..."}
//! GET  /api/status     -> {"success": true, "armed": ..., "alarm_active": ..., ...}
//! POST /api/system     {"active": bool} -> arm / disarm
//! POST /api/alarm      {"active": bool} -> emergency / reset
//! ```
//!
//! Handlers only translate between HTTP and [`ControlSurface`]; every state
//! change goes through the controllers.

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use homeguard_alarm::{Ack, ControlSurface};
use homeguard_core::{Command, SystemState};
use serde::Serialize;
use serde_json::{Value, json};
use std::future::Future;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

/// Body of `GET /api/status`.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub success: bool,
    #[serde(flatten)]
    pub state: SystemState,
}

/// `400` reply for malformed toggle requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError(String);

impl ApiError {
    pub fn message(&self) -> &str {
        &self.0
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            StatusCode::BAD_REQUEST,
            Json(json!({"success": false, "error": self.0})),
        )
            .into_response()
    }
}

/// Build the control API around `control`.
pub fn control_router(control: ControlSurface) -> Router {
    Router::new()
        .route("/api/arm", post(arm))
        .route("/api/disarm", post(disarm))
        .route("/api/reset", post(reset))
        .route("/api/emergency", post(emergency))
        .route("/api/status", get(status))
        .route("/api/system", post(set_system))
        .route("/api/alarm", post(set_alarm))
        .layer(CorsLayer::permissive())
        .with_state(control)
}

/// Serve the control API on `listener` until `shutdown` resolves.
pub async fn serve(
    listener: TcpListener,
    control: ControlSurface,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "Control API listening");
    }
    axum::serve(listener, control_router(control))
        .with_graceful_shutdown(shutdown)
        .await
}

async fn arm(State(control): State<ControlSurface>) -> Json<Ack> {
    Json(control.execute(Command::Arm))
}

async fn disarm(State(control): State<ControlSurface>) -> Json<Ack> {
    Json(control.execute(Command::Disarm))
}

async fn reset(State(control): State<ControlSurface>) -> Json<Ack> {
    Json(control.execute(Command::Reset))
}

async fn emergency(State(control): State<ControlSurface>) -> Json<Ack> {
    Json(control.execute(Command::Emergency))
}

async fn status(State(control): State<ControlSurface>) -> Json<StatusResponse> {
    Json(StatusResponse {
        success: true,
        state: control.status(),
    })
}

async fn set_system(
    State(control): State<ControlSurface>,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let active = parse_active(&body)?;
    control.execute(if active { Command::Arm } else { Command::Disarm });

    let armed = control.status().armed;
    Ok(Json(json!({
        "success": true,
        "system_on": armed,
        "message": format!("System {}", activation(armed)),
    })))
}

async fn set_alarm(
    State(control): State<ControlSurface>,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let active = parse_active(&body)?;
    let ack = control.execute(if active { Command::Emergency } else { Command::Reset });

    let alarm_on = control.status().alarm_active;
    if active && !alarm_on {
        // Emergency ignored while disarmed.
        return Ok(Json(json!({
            "success": true,
            "alarm_on": false,
            "message": ack.message,
        })));
    }
    Ok(Json(json!({
        "success": true,
        "alarm_on": alarm_on,
        "message": format!("Alarm {}", activation(alarm_on)),
    })))
}

fn activation(on: bool) -> &'static str {
    if on { "activated" } else { "deactivated" }
}

/// Extract the boolean `active` field from a toggle request body.
fn parse_active(body: &[u8]) -> Result<bool, ApiError> {
    let data: Value = match serde_json::from_slice(body) {
        Ok(value) => value,
        Err(_) if body.iter().all(u8::is_ascii_whitespace) => {
            return Err(ApiError("No data provided".to_string()));
        }
        Err(e) => {
            warn!(error = %e, "Rejected malformed toggle body");
            return Err(ApiError("No data provided".to_string()));
        }
    };

    let fields = match data.as_object() {
        Some(fields) if !fields.is_empty() => fields,
        _ => return Err(ApiError("No data provided".to_string())),
    };

    fields
        .get("active")
        .and_then(Value::as_bool)
        .ok_or_else(|| ApiError("Missing required fields: active".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(br#"{"active": true}"#.as_slice(), Ok(true))]
    #[case(br#"{"active": false, "extra": 1}"#.as_slice(), Ok(false))]
    #[case(b"".as_slice(), Err("No data provided"))]
    #[case(b"  ".as_slice(), Err("No data provided"))]
    #[case(b"{}".as_slice(), Err("No data provided"))]
    #[case(b"null".as_slice(), Err("No data provided"))]
    #[case(b"not json".as_slice(), Err("No data provided"))]
    #[case(br#"{"enabled": true}"#.as_slice(), Err("Missing required fields: active"))]
    #[case(br#"{"active": "yes"}"#.as_slice(), Err("Missing required fields: active"))]
    fn test_parse_active(#[case] body: &[u8], #[case] expected: Result<bool, &str>) {
        let parsed = parse_active(body).map_err(|e| e.message().to_string());
        assert_eq!(parsed, expected.map_err(str::to_string));
    }
}
