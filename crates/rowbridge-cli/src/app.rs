//! Process wiring: radio, telemetry source, supervisor and signals

use rowbridge_ble::{PlatformRadio, Radio};
use rowbridge_core::standard_profiles;
use rowbridge_runtime::{
    JsonLinesSource, ShutdownHandle, SimulatedRower, Supervisor, TelemetrySource,
};
use tracing::{info, warn};

use crate::config::{AppConfig, RadioKind, SourceKind};
use crate::error::Result;

/// Run the bridge until a termination signal or a fatal error
pub async fn run_bridge(config: AppConfig) -> Result<()> {
    let radio = match config.radio {
        RadioKind::Platform => PlatformRadio::new(),
        RadioKind::Memory => PlatformRadio::in_memory(),
    };

    match config.source {
        SourceKind::Simulated => {
            let source = SimulatedRower::new(config.interval());
            supervise(radio, source, &config).await
        }
        SourceKind::Stdin => supervise(radio, JsonLinesSource::stdin(), &config).await,
    }
}

async fn supervise<R, S>(radio: R, source: S, config: &AppConfig) -> Result<()>
where
    R: Radio,
    S: TelemetrySource,
{
    let mut supervisor = Supervisor::new(radio, source, standard_profiles(), config.bridge_config());

    let signals = tokio::spawn(shutdown_on_signal(supervisor.shutdown_handle()));
    let result = supervisor.run().await;
    signals.abort();

    result?;
    info!("rowbridge stopped after {} cycles", supervisor.cycles());
    Ok(())
}

async fn shutdown_on_signal(shutdown: ShutdownHandle) {
    wait_for_signal().await;
    info!("Termination requested, stopping advertising");
    shutdown.shutdown();
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut terminate) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = terminate.recv() => {}
            }
        }
        Err(e) => {
            warn!("Failed to install SIGTERM handler: {}", e);
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl-C: {}", e);
    }
}
