//! Pipeline execution
//!
//! Runs an ordered task list strictly in order, short-circuiting on the
//! first failure. Serialization of overlapping triggers lives in the watch
//! session; this executor assumes it is called from one logical flow.

use std::sync::Arc;
use uuid::Uuid;

use crate::domain::task::{Task, TaskReport};
use crate::error::TaskError;
use crate::tasks::TaskRunner;

/// 一次流水线执行的结果
pub struct PipelineRun {
    /// 执行 ID（用于日志关联）
    pub id: String,
    /// 每个任务的执行记录，失败任务之后的记录为 Skipped
    pub reports: Vec<TaskReport>,
    /// 首个失败，全部成功时为 Ok
    pub result: Result<(), TaskError>,
}

impl PipelineRun {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// 流水线执行器
#[derive(Clone)]
pub struct PipelineExecutor {
    runner: Arc<dyn TaskRunner>,
}

impl PipelineExecutor {
    pub fn new(runner: Arc<dyn TaskRunner>) -> Self {
        Self { runner }
    }

    /// Execute tasks in order; the first failure aborts the remainder.
    pub async fn execute(&self, tasks: &[Task]) -> PipelineRun {
        let id = Uuid::new_v4().to_string();
        let mut reports: Vec<TaskReport> = tasks.iter().map(|t| TaskReport::new(*t)).collect();
        let mut result: Result<(), TaskError> = Ok(());

        tracing::info!(run_id = %id, tasks = tasks.len(), "Pipeline started");

        for (index, task) in tasks.iter().enumerate() {
            reports[index].start();
            tracing::info!(run_id = %id, task = %task, "Task started");

            match self.runner.run(*task).await {
                Ok(()) => {
                    reports[index].finish(true, None);
                    tracing::info!(
                        run_id = %id,
                        task = %task,
                        duration_ms = reports[index].duration_ms,
                        "Task finished"
                    );
                }
                Err(err) => {
                    reports[index].finish(false, Some(err.error.to_string()));
                    tracing::error!(run_id = %id, task = %task, error = %err, "Task failed");

                    // Remaining tasks are never invoked
                    for report in reports.iter_mut().skip(index + 1) {
                        report.skip(Some(format!("aborted after `{}` failed", task)));
                    }
                    result = Err(err);
                    break;
                }
            }
        }

        match &result {
            Ok(()) => tracing::info!(run_id = %id, "Pipeline finished"),
            Err(err) => tracing::warn!(run_id = %id, error = %err, "Pipeline aborted"),
        }

        PipelineRun { id, reports, result }
    }
}
