//! Network surfaces of the homeguard appliance.
//!
//! # Components
//!
//! - **HttpNotifier**: posts alert events to the external alert service
//! - **control_router**: the axum router behind the local control API
//!
//! # Example
//!
//! ```no_run
//! use homeguard_alarm::{AlarmController, ControlSurface, SharedState};
//! use homeguard_hardware::mock::MockIndicator;
//! use homeguard_network::{HttpNotifier, HttpNotifierConfig};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let notifier = HttpNotifier::new(HttpNotifierConfig::default())?;
//! let alarm = AlarmController::new(
//!     SharedState::default(),
//!     Arc::new(MockIndicator::new()),
//!     Arc::new(notifier),
//! );
//!
//! let listener = tokio::net::TcpListener::bind("127.0.0.1:8080").await?;
//! homeguard_network::serve(listener, ControlSurface::new(alarm), async {
//!     let _ = tokio::signal::ctrl_c().await;
//! })
//! .await?;
//! # Ok(())
//! # }
//! ```

mod notifier;
mod server;

pub use notifier::{HttpNotifier, HttpNotifierConfig, NotifyError};
pub use server::{ApiError, StatusResponse, control_router, serve};
