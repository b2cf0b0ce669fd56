//! Running pipelines for many applications
//!
//! Applications are processed on a `rayon` pool. Pipelines for the same
//! repository still run one after the other because they share the
//! process-wide lock registry; distinct repositories proceed in parallel.

use log::{error, warn};
use rayon::prelude::*;
use serde::Serialize;

use crate::cancel::CancellationToken;
use crate::config::PipelineConfig;
use crate::error::Result;
use crate::pipeline::{Pipeline, PipelineReport, PipelineResult};

/// An application whose pipeline ended in an error
#[derive(Debug, Clone, Serialize)]
pub struct ApplicationFailure {
    pub application: String,
    pub error: String,
}

/// Outcome of a batch of pipelines
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    #[serde(flatten)]
    pub totals: PipelineResult,
    pub reports: Vec<PipelineReport>,
    pub failures: Vec<ApplicationFailure>,
}

impl RunSummary {
    /// Whether every application finished without error
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    /// Fold one pipeline result into the summary
    pub fn record(&mut self, config: &PipelineConfig, result: Result<PipelineReport>) {
        match result {
            Ok(report) => {
                self.totals += report.summary();
                self.reports.push(report);
            }
            Err(e) => {
                error!("could not update application {}: {}", config.application_name, e);
                self.totals += PipelineResult {
                    applications_processed: 1,
                    images_found: config.changes.len(),
                    errors: 1,
                    ..Default::default()
                };
                self.failures.push(ApplicationFailure {
                    application: config.application_name.clone(),
                    error: e.to_string(),
                });
            }
        }
    }
}

/// Run `pipeline` for every configuration using up to `jobs` workers.
///
/// Reports and failures keep the order of `configs`.
pub fn update_applications(
    configs: &[PipelineConfig],
    pipeline: &Pipeline,
    jobs: usize,
    cancel: &CancellationToken,
) -> RunSummary {
    let run_all = || -> Vec<Result<PipelineReport>> {
        configs
            .par_iter()
            .map(|config| pipeline.run(config, cancel))
            .collect()
    };

    let results = match rayon::ThreadPoolBuilder::new()
        .num_threads(jobs.max(1))
        .thread_name(|i| format!("pipeline-{}", i))
        .build()
    {
        Ok(pool) => pool.install(run_all),
        Err(e) => {
            warn!("could not start worker pool, running sequentially: {}", e);
            configs
                .iter()
                .map(|config| pipeline.run(config, cancel))
                .collect()
        }
    };

    let mut summary = RunSummary::default();
    for (config, result) in configs.iter().zip(results) {
        summary.record(config, result);
    }
    summary
}
