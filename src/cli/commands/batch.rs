//! `mimic batch`: one simulation per seed, run concurrently.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::cli::display::{
    create_progress_bar, list_table, output, render_list, truncate, CommandOutput,
};
use crate::cli::runtime::SimulationRuntime;
use crate::cli::types::BatchArgs;
use crate::domain::models::Config;
use crate::services::{BatchOutcome, BatchRunner};

#[derive(Debug, Serialize)]
pub struct BatchRow {
    pub index: usize,
    pub run_id: Uuid,
    pub seed: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_reason: Option<String>,
    pub steps_used: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct BatchReport {
    pub runs: Vec<BatchRow>,
    pub failed: usize,
}

impl CommandOutput for BatchReport {
    fn to_human(&self) -> String {
        let mut table = list_table(&["#", "run", "seed", "stop", "steps"]);
        for row in &self.runs {
            let stop = row
                .stop_reason
                .clone()
                .or_else(|| row.error.as_ref().map(|e| format!("error: {}", truncate(e, 30))))
                .unwrap_or_default();
            table.add_row(vec![
                row.index.to_string(),
                row.run_id.to_string()[..8].to_string(),
                truncate(&row.seed, 40),
                stop,
                row.steps_used.to_string(),
            ]);
        }
        render_list("run", &table, self.runs.len())
    }
}

/// Non-empty lines that are not `#` comments.
pub fn parse_seeds(contents: &str) -> Vec<String> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(ToString::to_string)
        .collect()
}

async fn write_artifact(dir: &Path, outcome: &BatchOutcome) -> Result<Option<PathBuf>> {
    let Ok(artifact) = &outcome.result else {
        return Ok(None);
    };
    let path = dir.join(format!("{}.json", outcome.run_id));
    tokio::fs::write(&path, artifact.to_json_pretty()?)
        .await
        .with_context(|| format!("Failed to write artifact to {}", path.display()))?;
    Ok(Some(path))
}

pub async fn execute(
    args: BatchArgs,
    mut config: Config,
    json_mode: bool,
    cancel: CancellationToken,
) -> Result<()> {
    let contents = tokio::fs::read_to_string(&args.seeds_file)
        .await
        .with_context(|| format!("Failed to read seeds from {}", args.seeds_file.display()))?;
    let seeds = parse_seeds(&contents);
    if seeds.is_empty() {
        bail!("No seeds found in {}", args.seeds_file.display());
    }

    if let Some(max_steps) = args.max_steps {
        config.simulation.max_steps = max_steps;
    }
    if let Some(concurrency) = args.concurrency {
        config.batch.max_concurrent_runs = concurrency;
    }
    if let Some(dir) = &args.output_dir {
        tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("Failed to create {}", dir.display()))?;
    }

    let batch_config = config.batch.clone();
    let runtime = SimulationRuntime::build(config, args.dry_run).await?;
    let runner = BatchRunner::from_config(Arc::clone(&runtime.controller), &batch_config);

    let progress = create_progress_bar(seeds.len() as u64, json_mode);
    let outcomes = runner
        .run_all_with_progress(seeds, &cancel, |outcome| {
            progress.set_message(truncate(&outcome.seed, 30));
            progress.inc(1);
        })
        .await;
    progress.finish_and_clear();
    drop(runner);
    runtime.shutdown().await;

    let mut runs = Vec::with_capacity(outcomes.len());
    for outcome in &outcomes {
        let artifact_path = match &args.output_dir {
            Some(dir) => write_artifact(dir, outcome).await?,
            None => None,
        };
        runs.push(BatchRow {
            index: outcome.index,
            run_id: outcome.run_id,
            seed: outcome.seed.clone(),
            stop_reason: outcome.result.as_ref().ok().map(|a| a.stop_reason.to_string()),
            steps_used: outcome.result.as_ref().map_or(0, |a| a.steps_used),
            artifact_path,
            error: outcome.result.as_ref().err().map(ToString::to_string),
        });
    }
    let failed = runs.iter().filter(|r| r.error.is_some()).count();

    output(&BatchReport { runs, failed }, json_mode);
    Ok(())
}
