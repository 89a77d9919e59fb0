//! # Example: ivr
//!
//! An inbound call walks the department menu: the caller presses `4`, hears
//! the agent announcement and the agent is added to the call.
//!
//! ## Flow
//! ```text
//! IncomingCall (Event Grid) ──► decode_incoming_call ──► start_inbound(main_menu)
//!     answer ─► CallConnected ─► recognize(mainmenu.wav) ─► RecognizeCompleted(4)
//!     play(agent.wav) ─► PlayCompleted ─► add_participant ─► hang_up ─► CallDisconnected
//! ```
//!
//! ## Run
//! ```bash
//! RUST_LOG=info cargo run --example ivr
//! ```

mod sim;

use std::sync::Arc;

use callvisor::{
    Config, DtmfTone, FlowScript, LogWriter, Orchestrator, Participant, Subscribe,
    webhook::{self, InboundNotice},
};
use sim::{Press, Simulator};
use tracing_subscriber::EnvFilter;

const INCOMING: &str = r#"[{
    "eventType": "Microsoft.Communication.IncomingCall",
    "data": {
        "incomingCallContext": "demo-incoming-context",
        "from": { "kind": "phoneNumber", "rawId": "+15551230000" }
    }
}]"#;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cfg = Config::from_env()?;
    let (backend, webhooks) = Simulator::new(vec![Press::Tone(DtmfTone::Four)]);
    let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter)];
    let orch = Orchestrator::builder(cfg, backend)
        .with_subscribers(subs)
        .build();
    sim::pump(Arc::clone(&orch), webhooks);

    let (incoming_call_context, caller) = match webhook::decode_incoming_call(INCOMING)? {
        InboundNotice::IncomingCall {
            incoming_call_context,
            caller,
        } => (incoming_call_context, caller),
        InboundNotice::Validation { .. } => anyhow::bail!("expected an incoming call notice"),
    };
    tracing::info!(caller = %caller, "incoming call");

    let agent = Participant::parse("+15550001111");
    let script = FlowScript::main_menu("https://example.invalid/audio", agent);
    let handle = orch.start_inbound(incoming_call_context, script);
    let report = handle.wait().await?;
    println!(
        "session {} ended: {} after {:?}",
        report.id,
        report.outcome.as_label(),
        report.history
    );

    orch.shutdown().await?;
    Ok(())
}
