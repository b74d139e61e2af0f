//! corridord — hosts one Corridor protocol node on a UDP broadcast socket.

use std::time::Duration;

use anyhow::Result;
use tokio::time::{self, Instant};

use corridor_core::config::CorridorConfig;
use corridor_services::{LinearMobility, ProtocolNode};

mod host;
mod radio;

const SNAPSHOT_INTERVAL: Duration = Duration::from_secs(5);
const MAX_DATAGRAM: usize = 65_535;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // Load config
    if let Err(e) = CorridorConfig::write_default_if_missing() {
        tracing::warn!(error = %e, "failed to write default config");
    }
    let config = CorridorConfig::load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "failed to load config, using defaults");
        CorridorConfig::default()
    });
    tracing::info!(
        role = ?config.node.role,
        cch = %config.node.cch_address,
        sch = %config.node.sch_address,
        strategy = ?config.planner.strategy,
        "corridord starting"
    );

    let socket = radio::bind(&config.radio)?;
    let target = radio::broadcast_target(&config.radio);

    let mobility = LinearMobility::new(config.mobility.position, config.mobility.velocity);
    let mut node = ProtocolNode::new(&config, Box::new(mobility));
    let started = Instant::now();
    let mut timers = host::Timers::new();

    // ── Shutdown channel ─────────────────────────────────────────────────────
    let (shutdown_tx, mut shutdown_rx) = tokio::sync::broadcast::channel::<()>(1);
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        tracing::info!("shutdown signal received");
        let _ = shutdown_tx.send(());
    });

    let actions = node.start(Duration::ZERO);
    host::execute(actions, &socket, target, &mut timers).await;

    // ── Event loop ───────────────────────────────────────────────────────────
    let mut snapshot = time::interval(SNAPSHOT_INTERVAL);
    let mut buf = vec![0u8; MAX_DATAGRAM];

    loop {
        let next = timers.next();
        let deadline = next.map_or_else(|| Instant::now() + SNAPSHOT_INTERVAL, |(_, at)| at);

        tokio::select! {
            received = socket.recv_from(&mut buf) => match received {
                Ok((n, from)) => {
                    tracing::trace!(bytes = n, %from, "datagram received");
                    let actions = node.on_packet_received(&buf[..n], started.elapsed());
                    host::execute(actions, &socket, target, &mut timers).await;
                }
                Err(e) => tracing::warn!(error = %e, "receive failed"),
            },
            _ = time::sleep_until(deadline), if next.is_some() => {
                if let Some((timer, _)) = next {
                    timers.disarm(timer);
                    let actions = node.on_timer_fired(timer, started.elapsed());
                    host::execute(actions, &socket, target, &mut timers).await;
                }
            }
            _ = snapshot.tick() => host::log_snapshot(&node),
            _ = shutdown_rx.recv() => {
                tracing::info!("shutting down");
                let actions = node.shutdown();
                host::execute(actions, &socket, target, &mut timers).await;
                break;
            }
        }
    }

    Ok(())
}
