//! Post-processing for complete runs: run summary and raw-output cleanup

use std::io::ErrorKind;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs;

use shared::{run_info, AnalysisType, RunId};
use crate::core::ResultPaths;
use crate::error::DispatchResult;
use crate::services::result_store::write_atomic;
use crate::traits::PostProcessor;
use crate::types::RunReport;

/// Persisted record of one complete run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: RunId,
    pub analysis_type: Option<AnalysisType>,
    pub species: String,
    pub models: Vec<String>,
    pub total: usize,
    pub completed: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Writes `runs/<run_id>-<analysis>.json` and optionally removes the raw response tree
#[derive(Debug, Clone)]
pub struct RunSummaryWriter {
    paths: ResultPaths,
    species: String,
    models: Vec<String>,
    skip_raw_saving: bool,
}

impl RunSummaryWriter {
    pub fn new(paths: ResultPaths, species: impl Into<String>, models: Vec<String>) -> Self {
        Self {
            paths,
            species: species.into(),
            models,
            skip_raw_saving: false,
        }
    }

    /// Delete `raw/` once the summary is written
    pub fn skip_raw_saving(mut self, skip: bool) -> Self {
        self.skip_raw_saving = skip;
        self
    }

    async fn cleanup_raw_dir(&self) -> DispatchResult<()> {
        let raw_dir = self.paths.raw_dir();
        match fs::remove_dir_all(&raw_dir).await {
            Ok(()) => {
                run_info!("🧹 Removed raw results in {}", raw_dir.display());
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl PostProcessor for RunSummaryWriter {
    async fn process(&self, report: &RunReport) -> DispatchResult<()> {
        let summary = RunSummary {
            run_id: report.run_id.clone(),
            analysis_type: report.analysis_type,
            species: self.species.clone(),
            models: self.models.clone(),
            total: report.total,
            completed: report.completed,
            started_at: report.started_at,
            finished_at: report.finished_at,
        };

        let path = self.paths.run_summary(report.run_id.as_str(), report.analysis_type);
        fs::create_dir_all(self.paths.runs_dir()).await?;
        write_atomic(&path, &serde_json::to_vec_pretty(&summary)?).await?;
        run_info!("📝 Run summary written to {}", path.display());

        if self.skip_raw_saving {
            self.cleanup_raw_dir().await?;
        }
        Ok(())
    }
}
