//! Appliance wiring and lifecycle.
//!
//! ```text
//! start:  devices ─► state ─► notifier ─► controllers ─► monitors ─► listener
//! run:    serve control API until the shutdown future resolves
//! stop:   drain HTTP, cancel monitors, wait out the grace period
//! ```

use crate::config::Config;
use crate::hardware::{self, MockHandles};
use anyhow::{Context, Result};
use homeguard_alarm::{
    AlarmController, ControlSurface, MonitorHandle, MonitorSupervisor, Notifier, NullNotifier,
    SharedState, ShutdownReport,
};
use homeguard_network::HttpNotifier;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{info, warn};

/// A started appliance: monitors running, listener bound, not yet serving.
pub struct Appliance {
    control: ControlSurface,
    monitors: MonitorHandle,
    listener: TcpListener,
    mocks: MockHandles,
    grace: Duration,
}

impl Appliance {
    pub async fn start(config: &Config) -> Result<Self> {
        let devices = hardware::build(&config.hardware).context("Failed to initialise hardware")?;

        let notifier: Arc<dyn Notifier> = if config.notifier.enabled {
            let notifier = HttpNotifier::new(config.notifier_config())
                .context("Failed to create alert notifier")?;
            info!(url = %notifier.url(), "Alerts enabled");
            Arc::new(notifier)
        } else {
            info!("Alerts disabled");
            Arc::new(NullNotifier)
        };

        let state = SharedState::with_threshold(config.alarm.distance_threshold_cm);
        let alarm = AlarmController::new(state, Arc::clone(&devices.indicator), notifier);

        let mut supervisor = MonitorSupervisor::new(config.monitor_config(), alarm.clone());
        supervisor.register_motion(devices.motion);
        supervisor.register_distance(devices.distance);
        supervisor.register_card(devices.card);

        let addr = config.bind_addr()?;
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind control API on {}", addr))?;

        let monitors = supervisor.start();

        Ok(Self {
            control: ControlSurface::new(alarm),
            monitors,
            listener,
            mocks: devices.mocks,
            grace: config.shutdown_grace(),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn control(&self) -> &ControlSurface {
        &self.control
    }

    pub fn mocks(&self) -> &MockHandles {
        &self.mocks
    }

    /// Serve until `shutdown` resolves, then stop the monitors.
    pub async fn run(
        self,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> Result<ShutdownReport> {
        let Self {
            control,
            monitors,
            listener,
            mocks,
            grace,
        } = self;

        let served = homeguard_network::serve(listener, control, shutdown).await;
        info!("Control API stopped, shutting down monitors");

        let report = monitors.shutdown(grace).await;
        if !report.is_clean() {
            warn!(?report, "Monitors did not shut down cleanly");
        }
        drop(mocks);

        served.context("Control API failed")?;
        Ok(report)
    }
}
