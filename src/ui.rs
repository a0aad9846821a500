//! Terminal rendering: a spinner showing the current phase, the transfer log
//! streamed above it, and a coloured final verdict.

use std::cell::Cell;
use std::time::Duration;

use console::Style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::engine::ChainInfo;
use crate::error::BridgeError;
use crate::orchestrator::EngineActivity;
use crate::session::CompletedTransfer;
use crate::transfer::{Phase, ProgressHandle};

pub struct TransferView {
    pb: ProgressBar,
    // Log lines already printed.
    printed: Cell<usize>,
    green: Style,
    red: Style,
    yellow: Style,
    dim: Style,
}

impl TransferView {
    pub fn start(description: &str) -> Self {
        let pb = ProgressBar::new_spinner();
        let style = ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        pb.set_style(style);
        pb.set_message(description.to_string());
        pb.enable_steady_tick(Duration::from_millis(100));

        Self {
            pb,
            printed: Cell::new(0),
            green: Style::new().green().bold(),
            red: Style::new().red().bold(),
            yellow: Style::new().yellow(),
            dim: Style::new().dim(),
        }
    }

    /// Prints log lines added since the last call and shows the current phase.
    /// Lines without a timestamp (fee breakdowns) are dimmed.
    pub fn render(&self, progress: &ProgressHandle, activity: &EngineActivity) {
        let entries = progress.entries();
        // A reset shrinks the log; start over.
        if entries.len() < self.printed.get() {
            self.printed.set(0);
        }
        for entry in &entries[self.printed.get()..] {
            if entry.is_timestamped() {
                self.pb.println(format!("  {entry}"));
            } else {
                self.pb.println(format!("  {}", self.dim.apply_to(entry.text())));
            }
        }
        self.printed.set(entries.len());

        let phase = progress.phase();
        let style = match phase {
            Phase::Error => &self.red,
            Phase::Completed => &self.green,
            _ => &self.yellow,
        };
        let mut label = style.apply_to(phase.as_str()).to_string();
        if !phase.is_terminal() && !activity.is_busy() {
            label.push_str(" (waiting for wallet)");
        }
        self.pb.set_message(label);
    }

    pub fn complete(
        &self,
        outcome: &Result<CompletedTransfer, BridgeError>,
        activity: &EngineActivity,
    ) {
        self.pb.finish_and_clear();
        match outcome {
            Ok(done) if done.retried => println!(
                "  {} Transferred {} USDC after one retry ({})",
                self.green.apply_to("✓"),
                done.amount,
                done.transfer_id
            ),
            Ok(done) => println!(
                "  {} Transferred {} USDC ({})",
                self.green.apply_to("✓"),
                done.amount,
                done.transfer_id
            ),
            Err(err) => {
                println!("  {} Transfer failed: {err}", self.red.apply_to("✗"));
                if let Some(engine_error) = activity.last_error()
                    && engine_error != err.to_string()
                {
                    println!("    {}", self.dim.apply_to(format!("engine: {engine_error}")));
                }
            }
        }
    }
}

pub fn print_lines(lines: &[String]) {
    for line in lines {
        println!("{line}");
    }
}

pub fn print_chains(chains: &[ChainInfo]) {
    let bold = Style::new().bold();
    let dim = Style::new().dim();
    for chain in chains {
        let id = chain
            .chain_id
            .map(|id| id.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{} {:<18} {:<7} {}",
            bold.apply_to(format!("{:<20}", chain.chain)),
            chain.name,
            chain.kind.to_string(),
            dim.apply_to(id)
        );
    }
}
