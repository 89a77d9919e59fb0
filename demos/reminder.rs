//! # Example: reminder
//!
//! Two outbound appointment reminders run side by side: one callee confirms
//! with `1`, the other stays silent and hears the no-input prompt.
//!
//! ## Run
//! ```bash
//! RUST_LOG=callvisor=debug,info cargo run --example reminder
//! ```

mod sim;

use std::sync::Arc;

use callvisor::{Config, DtmfTone, FlowScript, LogWriter, Orchestrator, Participant, Subscribe};
use sim::{Press, Simulator};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let (backend, webhooks) = Simulator::new(vec![Press::Tone(DtmfTone::One), Press::Silence]);
    let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter)];
    let orch = Orchestrator::builder(Config::from_env()?, backend)
        .with_subscribers(subs)
        .build();
    sim::pump(Arc::clone(&orch), webhooks);

    let source = Participant::parse("+15550009999");
    let handles = ["+15551234567", "+15557654321"].map(|callee| {
        orch.start_outbound(
            source.clone(),
            Participant::parse(callee),
            FlowScript::appointment_reminder("https://example.invalid/audio"),
        )
    });

    for handle in handles {
        let report = handle.wait().await?;
        println!("{} -> {}", report.id, report.outcome.as_label());
    }

    orch.shutdown().await?;
    Ok(())
}
