use crypto_command_assistant::{
    config::AssistantConfig,
    models::RawInput,
    responder::CannedResponder,
    router::IntentRouter,
    state::AppController,
};
use std::sync::Arc;
use tracing::info;

const SAMPLE_INPUTS: &[&str] = &[
    "Create a DCA to purchase 10 USDC worth of ETH on daily basis",
    "swap 1 eth for usdc and show me trending tokens",
    "asdkjasd",
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();
    let config = AssistantConfig::from_env();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .init();

    info!("Crypto Command Assistant starting");

    let router = IntentRouter::new(Some(Arc::new(CannedResponder::new())))
        .with_timeout(config.fallback_timeout);
    let mut app = AppController::new(config.pacing, config.transcript_capacity);

    for text in SAMPLE_INPUTS {
        let outcome = router.submit(&mut app, RawInput::new(*text)).await;

        println!("\n=== INPUT: {} ===", text);
        for (i, clause) in outcome.clauses.iter().enumerate() {
            println!(
                "  {}: \"{}\" -> {:?} [{}]",
                i + 1,
                clause.clause,
                clause.extraction.command,
                clause.extraction.pattern.unwrap_or("no pattern")
            );
        }
        for turn in &outcome.turns {
            println!("  > {}", turn.reply.text);
        }
    }

    // Run whichever flow the last input left open
    if let Some(flow) = app.active_flow() {
        println!("\n=== CONFIRMING: {} ===", flow.summary);
        app.confirm_flow()?;

        let mut progress = app
            .active_flow()
            .map(|f| f.run.status_text)
            .unwrap_or_default();
        println!("  {}", progress);

        loop {
            tokio::time::sleep(config.pacing.stage_dwell / 2).await;
            let Some(view) = app.active_flow() else { break };
            if view.run.status_text != progress {
                progress = view.run.status_text.clone();
                println!("  {:>5.1}% {}", view.run.progress, progress);
            }
            if view.run.is_terminal() {
                break;
            }
        }

        let outcome = app.close_flow()?;
        println!("  Final status: {:?}", outcome.status);
    }

    println!("\nTranscript ({} turns):", app.transcript().len());
    for turn in app.transcript().turns() {
        println!("  [{:?}] {} -> {}", turn.kind, turn.user, turn.reply.text);
    }

    Ok(())
}
