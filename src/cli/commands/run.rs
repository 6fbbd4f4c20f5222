//! `mimic run`: one simulation from a persona seed.

use anyhow::{Context, Result};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::cli::display::{list_table, output, truncate, CommandOutput};
use crate::cli::runtime::SimulationRuntime;
use crate::cli::types::RunArgs;
use crate::domain::models::{Config, RunArtifact};

/// Human view of a finished run; JSON mode prints the full artifact.
#[derive(Debug, Serialize)]
#[serde(transparent)]
pub struct RunReport {
    pub artifact: RunArtifact,
}

impl CommandOutput for RunReport {
    fn to_human(&self) -> String {
        let a = &self.artifact;
        let mut lines = vec![
            format!("Run {}", a.run_id),
            format!("  seed:        {}", truncate(&a.seed, 70)),
            format!("  intent:      {}", truncate(&a.persona_profile.intent, 70)),
            format!(
                "  thresholds:  positive {:.2}, negative {:.2} (gamma {:.2})",
                a.thresholds.positive_threshold, a.thresholds.negative_threshold, a.gamma
            ),
            format!("  stop:        {} after {} step(s)", a.stop_reason, a.steps_used),
        ];
        if let Some(detail) = &a.stop_detail {
            lines.push(format!("  detail:      {detail}"));
        }

        if !a.turns.is_empty() {
            let mut table =
                list_table(&["step", "user", "agent", "actions", "pos", "neg", "judge"]);
            for turn in &a.turns {
                let actions: Vec<&str> = turn.actions.iter().map(|a| a.kind()).collect();
                table.add_row(vec![
                    turn.step.to_string(),
                    truncate(&turn.user_text, 40),
                    truncate(&turn.assistant_text, 40),
                    actions.join(","),
                    format!("{:.2}", turn.emotion.positive),
                    format!("{:.2}", turn.emotion.negative),
                    format!("{:.2}", turn.verdict.score),
                ]);
            }
            lines.push(String::new());
            lines.push(table.to_string());
        }
        lines.join("\n")
    }
}

pub async fn execute(
    args: RunArgs,
    mut config: Config,
    json_mode: bool,
    cancel: CancellationToken,
) -> Result<()> {
    if let Some(max_steps) = args.max_steps {
        config.simulation.max_steps = max_steps;
    }

    let runtime = SimulationRuntime::build(config, args.dry_run).await?;
    let result = runtime.controller.run(&args.seed, &cancel).await;
    runtime.shutdown().await;
    let artifact = result.context("Simulation failed to start")?;

    if let Some(path) = &args.output {
        let json = artifact.to_json_pretty()?;
        tokio::fs::write(path, json)
            .await
            .with_context(|| format!("Failed to write artifact to {}", path.display()))?;
    }

    output(&RunReport { artifact }, json_mode);
    Ok(())
}
