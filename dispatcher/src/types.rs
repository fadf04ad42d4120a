//! Dispatcher-specific data types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use shared::{AnalysisType, RunId, Task};
use crate::error::{DispatchError, DispatchResult};

/// Data produced by one successful analysis task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TaskPayload {
    Functions {
        response: String,
        functions: Vec<String>,
        embedding_dimensions: usize,
    },
    Probability {
        function: String,
        probability: f64,
    },
}

/// Terminal state of a task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TaskOutcome<T> {
    Success(T),
    Failure { kind: String, message: String },
}

/// A task together with its terminal outcome
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResult<T = TaskPayload> {
    pub task: Task,
    pub outcome: TaskOutcome<T>,
}

impl<T> TaskResult<T> {
    pub fn success(task: Task, payload: T) -> Self {
        Self { task, outcome: TaskOutcome::Success(payload) }
    }

    pub fn failure(task: Task, error: &DispatchError) -> Self {
        Self {
            task,
            outcome: TaskOutcome::Failure {
                kind: error.kind().to_string(),
                message: error.to_string(),
            },
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, TaskOutcome::Success(_))
    }
}

/// A failed task as recorded in a run report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskFailure {
    pub task: Task,
    pub kind: String,
    pub message: String,
}

/// Tally of one dispatched batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: RunId,
    pub analysis_type: Option<AnalysisType>,
    pub total: usize,
    pub completed: usize,
    pub failures: Vec<TaskFailure>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunReport {
    pub fn from_results<T>(results: &[TaskResult<T>], total: usize, started_at: DateTime<Utc>) -> Self {
        let failures: Vec<TaskFailure> = results
            .iter()
            .filter_map(|result| match &result.outcome {
                TaskOutcome::Success(_) => None,
                TaskOutcome::Failure { kind, message } => Some(TaskFailure {
                    task: result.task.clone(),
                    kind: kind.clone(),
                    message: message.clone(),
                }),
            })
            .collect();

        Self {
            run_id: RunId::current().clone(),
            analysis_type: results.first().map(|result| result.task.analysis_type),
            total,
            completed: results.iter().filter(|result| result.is_success()).count(),
            failures,
            started_at,
            finished_at: Utc::now(),
        }
    }

    /// Every task in the batch reached success
    pub fn is_complete(&self) -> bool {
        self.completed == self.total
    }

    /// Turn an incomplete batch into an error
    pub fn ensure_complete(&self) -> DispatchResult<()> {
        if self.is_complete() {
            Ok(())
        } else {
            Err(DispatchError::IncompleteBatch {
                completed: self.completed,
                total: self.total,
            })
        }
    }
}
