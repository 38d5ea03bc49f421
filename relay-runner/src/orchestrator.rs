//! Pipeline orchestrator
//!
//! Runs a pipeline's stages strictly in order. Each stage's image is built, then
//! run with the previous stage's stdout as its stdin. Every run step mounts the
//! same shared volume. The first failure stops the run and is escalated to the
//! error handler; the shared volume is torn down only after a fully successful
//! run.

use chrono::{DateTime, Utc};
use relay_core::{Phase, Pipeline, PipelineResult, StageExecutionResult, Status, merge};
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info};

use crate::cancel::CancelToken;
use crate::config::RunnerConfig;
use crate::engine::CommandRunner;
use crate::error::{PipelineError, PipelineFailure};
use crate::escalation::ErrorEscalation;
use crate::executor::{ImageExecutor, record_step};
use crate::volume::VolumeManager;

/// Stage records accumulated during one run
pub(crate) struct RunLog {
    name: String,
    start: DateTime<Utc>,
    stage_results: Vec<StageExecutionResult>,
}

impl RunLog {
    pub fn start(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            start: Utc::now(),
            stage_results: Vec::new(),
        }
    }

    pub fn push(&mut self, stage: StageExecutionResult) {
        self.stage_results.push(stage);
    }

    pub fn finish(self, status: Status) -> PipelineResult {
        PipelineResult {
            name: self.name,
            stage_results: self.stage_results,
            start: self.start,
            end: Utc::now(),
            status,
        }
    }

    /// Closes the log with the status the error maps to
    pub fn fail(self, error: PipelineError) -> PipelineFailure {
        let status = error.status();
        PipelineFailure {
            result: self.finish(status),
            error,
        }
    }
}

/// Drives pipeline runs against a container engine
pub struct Orchestrator {
    executor: ImageExecutor,
    volumes: VolumeManager,
    volume_name: String,
}

impl Orchestrator {
    /// Creates an orchestrator issuing every engine call through `runner`
    pub fn new(runner: Arc<dyn CommandRunner>, config: &RunnerConfig) -> Self {
        Self {
            executor: ImageExecutor::new(runner.clone(), &config.engine),
            volumes: VolumeManager::new(runner, &config.engine),
            volume_name: config.volume_name.clone(),
        }
    }

    pub fn volume_name(&self) -> &str {
        &self.volume_name
    }

    /// Runs every stage of `pipeline` in order
    ///
    /// On failure the returned `PipelineFailure` still carries the partial result:
    /// every stage record up to and including the failing one, plus the error
    /// handler's record when it ran.
    pub async fn run(
        &self,
        pipeline: &Pipeline,
        cancel: &CancelToken,
    ) -> Result<PipelineResult, PipelineFailure> {
        let mut log = RunLog::start(&pipeline.name);

        if let Err(e) = pipeline.validate() {
            let error = PipelineError::from(e);
            error!("{}", error);
            return Err(log.fail(error));
        }

        let volume = match self
            .volumes
            .setup(Path::new(&pipeline.default_base_dir), &self.volume_name, cancel)
            .await
        {
            Ok(volume) => volume,
            Err(e) => {
                let error = PipelineError::Setup(e);
                error!("{}", error);
                return Err(log.fail(error));
            }
        };

        let escalation = ErrorEscalation {
            executor: &self.executor,
            volume: &volume,
            cancel,
        };

        let total = pipeline.stages.len();
        let mut previous_stdout = String::new();

        for (index, stage) in pipeline.stages.iter().enumerate() {
            info!(
                "Executing pipeline {} [{}/{}]",
                pipeline.name,
                index + 1,
                total
            );

            let id = pipeline.stage_id(stage);
            let dir = pipeline.stage_dir(stage);
            let mut record = StageExecutionResult::begin(&stage.name);

            let build_env = merge(&pipeline.default_build_env, &stage.build_env);
            let built = self.executor.build(&id, &dir, &build_env, cancel).await;
            if let Err(step) = record_step(built, &mut record.build_result, &id, Phase::Build) {
                return Err(escalation
                    .handle(log, record, PipelineError::Build(step), pipeline)
                    .await);
            }

            let run_env = merge(&pipeline.default_run_env, &stage.run_env);
            let ran = self
                .executor
                .run(&id, &dir, &previous_stdout, &run_env, &volume, cancel)
                .await;
            if let Err(step) = record_step(ran, &mut record.run_result, &id, Phase::Run) {
                return Err(escalation
                    .handle(log, record, PipelineError::Run(step), pipeline)
                    .await);
            }

            previous_stdout = record.run_result.stdout.clone();
            record.finish();
            log.push(record);
        }

        if let Err(e) = self.volumes.teardown(&volume, cancel).await {
            let error = PipelineError::Teardown(e);
            error!("{}", error);
            return Err(log.fail(error));
        }

        info!("Pipeline {} completed", pipeline.name);
        Ok(log.finish(Status::Ok))
    }
}
