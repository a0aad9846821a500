mod cli;
mod config;
mod demo;
mod engine;
mod error;
mod logging;
mod orchestrator;
mod session;
mod transfer;
mod ui;
mod wallet;

use std::time::Duration;

use anyhow::Result;
use clap::Parser;

use cli::{Cli, Command};
use config::BridgeConfig;
use engine::{BridgeEngine, ScriptedEngine};
use ui::TransferView;
use wallet::StaticSwitcher;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => BridgeConfig::load_from(path)?,
        None => BridgeConfig::load()?,
    };
    logging::init_logging(&config, cli.verbose);

    match cli.command {
        Command::Chains => {
            ui::print_chains(&ScriptedEngine::with_testnet_chains().supported_chains());
        }
        Command::Estimate { route } => {
            let form = route.into_form(&config);
            let engine = ScriptedEngine::with_testnet_chains();
            engine.push_estimate(Ok(demo::sample_estimate(&form)));
            let mut session = demo::session(engine, StaticSwitcher::new(), &config);
            let outcome = session.estimate(&form).await;
            ui::print_lines(&session.progress().lines());
            tracing::debug!(
                estimate_calls = session.orchestrator().engine().estimate_calls(),
                "estimate finished"
            );
            outcome?;
        }
        Command::Demo { scenario, route } => {
            let mut form = route.into_form(&config);
            let mut session = demo::session(
                demo::scripted_engine(scenario),
                demo::switcher(scenario),
                &config,
            );
            let progress = session.progress();
            let activity = session.activity();
            let view = TransferView::start(&format!(
                "{} USDC {} → {}",
                form.amount, form.from_chain, form.to_chain
            ));

            let outcome = {
                let submit = session.submit(&mut form);
                tokio::pin!(submit);
                let mut ticker = tokio::time::interval(Duration::from_millis(50));
                loop {
                    tokio::select! {
                        outcome = &mut submit => break outcome,
                        _ = ticker.tick() => view.render(&progress, &activity),
                    }
                }
            };
            view.render(&progress, &activity);
            view.complete(&outcome, &activity);

            let engine = session.orchestrator().engine();
            tracing::debug!(
                ?scenario,
                status = ?session.status(),
                bridge_calls = engine.bridge_calls(),
                retry_calls = engine.retry_calls(),
                peak_handlers = engine.peak_handlers(),
                leaked_handlers = engine.active_handlers(),
                switch_requests = ?session.orchestrator().switcher().requested(),
                "demo finished"
            );
        }
    }

    Ok(())
}
