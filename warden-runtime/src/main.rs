//! Warden Runtime - Demo entry point.
//!
//! Wires the reference Macro Analyst agent to the stub toolkit and runs the
//! orchestrator until interrupted.

use anyhow::Result;
use std::sync::Arc;

use warden_agent::instances::MacroAnalystAgent;
use warden_agent::tools::StubToolkit;
use warden_agent::Agent;
use warden_common::logging::init_logging;
use warden_common::{EventBus, EventKind, RuntimeConfig, Subscription};
use warden_runtime::Runtime;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = RuntimeConfig::from_env();
    for problem in config.validate() {
        anyhow::bail!("Invalid configuration: {problem}");
    }

    // Initialize logging
    init_logging(&config.log_level, &config.log_format);
    tracing::info!("Warden Runtime v{}", env!("CARGO_PKG_VERSION"));

    let bus = Arc::new(EventBus::with_capacity(config.event_log_capacity));
    bus.subscribe(Subscription::Kind(EventKind::Approval), |event| {
        tracing::info!(agent_id = %event.agent_id, payload = %event.payload, "Approval recorded");
        Ok(())
    });

    let runtime = Runtime::new(Arc::clone(&bus), config);

    // Seed the stub toolkit with a series that trips the 3% threshold, so
    // the demo produces a full decision → action → completion round.
    let toolkit = Arc::new(StubToolkit::new());
    toolkit.seed_records(
        warden_agent::instances::M2_SERIES,
        vec![
            serde_json::json!({ "date": "2026-05-29", "value": 21000.0 }),
            serde_json::json!({ "date": "2026-08-28", "value": 21900.0 }),
        ],
    );

    let agent = Arc::new(MacroAnalystAgent::new(toolkit));
    let agent_id = agent.config().id.clone();
    runtime.register_agent(agent).await?;
    runtime.start().await;

    // Kick one cycle immediately rather than waiting for the first tick.
    runtime.trigger_monitoring(&agent_id).await?;

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down");
    runtime.stop().await;

    Ok(())
}
