//! Deterministic on-disk locations of task outputs

use std::path::{Path, PathBuf};

use shared::{AnalysisType, Task};

pub const DEFAULT_RESULTS_DIR: &str = "results";

/// Builds output paths under one results root
///
/// Layout, with `<hemi>` being `separation/<side>` or `no_separation`:
/// - `raw/<analysis>/<species>/<atlas>/<model>/<template>/<hemi>/<region>.json`
/// - `raw/.../<hemi>/cleaned/<region>/<model>.json`
/// - `embeddings/<analysis>/<species>/<atlas>/<model>/<template>/<hemi>/<region>.csv`
/// - `runs/<run_id>-<analysis>.json`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultPaths {
    root: PathBuf,
    species: String,
    atlas: String,
    template: String,
}

impl ResultPaths {
    pub fn new(
        root: impl Into<PathBuf>,
        species: impl Into<String>,
        atlas: impl Into<String>,
        template: impl Into<String>,
    ) -> Self {
        Self {
            root: root.into(),
            species: species.into(),
            atlas: atlas.into(),
            template: template.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn raw_dir(&self) -> PathBuf {
        self.root.join("raw")
    }

    pub fn runs_dir(&self) -> PathBuf {
        self.root.join("runs")
    }

    fn hemisphere_segment(task: &Task) -> PathBuf {
        match task.hemisphere {
            Some(side) => Path::new("separation").join(side.to_string()),
            None => PathBuf::from("no_separation"),
        }
    }

    fn task_dir(&self, base: PathBuf, task: &Task) -> PathBuf {
        base.join(task.analysis_type.to_string())
            .join(&self.species)
            .join(&self.atlas)
            .join(&task.model)
            .join(&self.template)
            .join(Self::hemisphere_segment(task))
    }

    /// Raw responses (functions) or probabilities document for the task's region
    pub fn query_document(&self, task: &Task) -> PathBuf {
        self.task_dir(self.raw_dir(), task).join(format!("{}.json", task.region))
    }

    /// Cleaned function list document for the task's region and model
    pub fn cleaned_document(&self, task: &Task) -> PathBuf {
        self.task_dir(self.raw_dir(), task)
            .join("cleaned")
            .join(&task.region)
            .join(format!("{}.json", task.model))
    }

    pub fn embedding_table(&self, task: &Task) -> PathBuf {
        self.task_dir(self.root.join("embeddings"), task)
            .join(format!("{}.csv", task.region))
    }

    /// Summary of one analysis pass; several passes may share a run id
    pub fn run_summary(&self, run_id: &str, analysis_type: Option<AnalysisType>) -> PathBuf {
        match analysis_type {
            Some(analysis) => self.runs_dir().join(format!("{run_id}-{analysis}.json")),
            None => self.runs_dir().join(format!("{run_id}.json")),
        }
    }
}
