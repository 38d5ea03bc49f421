//! Error escalation
//!
//! When a stage fails, the failing stage's record is handed to the pipeline's
//! error handler, with the failing record serialized as JSON on its stdin.
//! The handler is built from its directory exactly as given, with only its own
//! build and run variables: the pipeline's base directory and default
//! environment don't apply to it.
//!
//! The handler only records or processes the failure. A successful handler still
//! leaves the run failed with the failing stage's status and error; a failing handler
//! replaces both with its own. The shared volume is never torn down here.

use relay_core::{Phase, Pipeline, StageExecutionResult};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use tracing::{error, info, warn};

use crate::cancel::CancelToken;
use crate::error::{PipelineError, PipelineFailure};
use crate::executor::{ImageExecutor, record_step};
use crate::orchestrator::RunLog;
use crate::volume::SharedVolume;

/// Dispatches a stage failure to the configured error handler
pub(crate) struct ErrorEscalation<'a> {
    pub executor: &'a ImageExecutor,
    pub volume: &'a SharedVolume,
    pub cancel: &'a CancelToken,
}

impl ErrorEscalation<'_> {
    /// Records the failed stage, runs the handler if there is one, and finalizes the run
    pub async fn handle(
        &self,
        mut log: RunLog,
        mut failed: StageExecutionResult,
        error: PipelineError,
        pipeline: &Pipeline,
    ) -> PipelineFailure {
        error!("{}", error);

        failed.finish();
        log.push(failed.clone());

        let Some(handler) = &pipeline.error_handler else {
            warn!("No error handler configured for pipeline {}", pipeline.name);
            return log.fail(error);
        };

        if error.is_cancelled() {
            warn!("Run was cancelled, skipping error handler {}", handler.name);
            return log.fail(error);
        }

        let id = format!("{}/{} calls Error Handler", pipeline.name, failed.stage);
        let dir = Path::new(&handler.dir);
        let mut handled = StageExecutionResult::begin(&handler.name);

        info!("Escalating failure to error handler: {}", id);

        let build_env = sorted(&handler.build_env);
        let built = self.executor.build(&id, dir, &build_env, self.cancel).await;
        if let Err(step) = record_step(built, &mut handled.build_result, &id, Phase::Build) {
            return Self::handler_failed(log, handled, PipelineError::HandlerBuild(step));
        }

        let input = match serde_json::to_string(&failed) {
            Ok(input) => input,
            Err(e) => return Self::handler_failed(log, handled, PipelineError::HandlerInput(e)),
        };

        let run_env = sorted(&handler.run_env);
        let ran = self
            .executor
            .run(&id, dir, &input, &run_env, self.volume, self.cancel)
            .await;
        if let Err(step) = record_step(ran, &mut handled.run_result, &id, Phase::Run) {
            return Self::handler_failed(log, handled, PipelineError::HandlerRun(step));
        }

        info!("Error handler {} processed the failure", handler.name);

        handled.finish();
        log.push(handled);
        log.fail(error)
    }

    fn handler_failed(
        mut log: RunLog,
        mut handled: StageExecutionResult,
        error: PipelineError,
    ) -> PipelineFailure {
        error!("{}", error);
        handled.finish();
        log.push(handled);
        log.fail(error)
    }
}

fn sorted(env: &HashMap<String, String>) -> BTreeMap<String, String> {
    env.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
}
