use crate::runtime::contract::{EnvironmentOverride, WorkerPhase};
use crate::runtime::log_stream::LogSink;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchRequest {
    pub cluster: String,
    pub task_definition: String,
    pub container_name: String,
    pub launch_type: String,
    pub environment: Vec<EnvironmentOverride>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerRunStatus {
    pub phase: WorkerPhase,
    pub exit_code: Option<i32>,
    pub stopped_reason: Option<String>,
}

impl WorkerRunStatus {
    pub fn is_stopped(&self) -> bool {
        self.phase == WorkerPhase::Stopped
    }
}

pub trait WorkerLauncher {
    /// Starts one worker run and returns its identifier.
    fn launch(&self, request: &LaunchRequest) -> Result<String, String>;

    /// Reports the lifecycle phase of `run_id` and, once stopped, the exit
    /// code of `container_name`.
    fn describe(
        &self,
        cluster: &str,
        run_id: &str,
        container_name: &str,
    ) -> Result<WorkerRunStatus, String>;

    /// Resolves the log sink configured for `container_name` in the template.
    fn log_sink(&self, task_definition: &str, container_name: &str) -> Result<LogSink, String>;
}
