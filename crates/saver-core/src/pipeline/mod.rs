//! Build orchestration
//!
//! One run: validate the request, prepare the target, run the build tool,
//! install the bundle, clean up, and report a single status string. A failed
//! build restarts from preparation until `max_attempts` is used up.

pub mod assets;
pub mod cache;
pub mod install;
pub mod lock;
mod session;
pub mod state;
pub mod toolchain;

use crate::config::BuilderConfig;
use crate::error::BuildError;
use crate::request::{BuildRequest, BuildResult};
use crate::templates::{check_compatibility, TargetTemplate, TemplateBinding, TemplateManifest};
use lock::{LockError, ProjectLock};
use session::BuildSession;
use std::path::PathBuf;
use tokio::sync::Mutex;

pub use state::{BuildPhase, PhaseTracker};
pub use toolchain::{BuildInvocation, SystemToolchain, ToolOutput, Toolchain};

/// Captured stderr (or error chain) of the last failed run
pub const ERROR_LOG: &str = "err.log";

/// Captured stdout of the last successful build
pub const RUN_LOG: &str = "run.log";

const NAME_REQUIRED: &str = "Please enter a name for the screensaver using letters or digits";

/// Drives build runs against one project
pub struct Orchestrator<T: Toolchain = SystemToolchain> {
    config: BuilderConfig,
    toolchain: T,
    running: Mutex<()>,
}

impl<T: Toolchain> Orchestrator<T> {
    pub fn new(config: BuilderConfig, toolchain: T) -> Self {
        Self {
            config,
            toolchain,
            running: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &BuilderConfig {
        &self.config
    }

    pub fn toolchain(&self) -> &T {
        &self.toolchain
    }

    /// Run one build and hand its status string to `report` exactly once
    pub async fn run<F>(&self, request: &BuildRequest, mut report: F) -> BuildResult
    where
        F: FnMut(&str),
    {
        let mut phases = PhaseTracker::new();
        let result = self.execute(request, &mut phases).await;
        tracing::info!(
            outcome = %phases.current(),
            phases = phases.history().len(),
            "build run finished"
        );
        report(result.message());
        result
    }

    /// Input checks; nothing on disk is touched
    pub fn validate(&self, request: &BuildRequest) -> Result<(), BuildError> {
        if !self.config.accepts(request.video_path()) {
            return Err(BuildError::Validation(self.config.extension_hint()));
        }
        if request.display_name().contains(['/', ':']) {
            return Err(BuildError::Validation(
                "Screensaver name cannot contain '/' or ':'".to_string(),
            ));
        }
        let target_name = request.target_name();
        if target_name.is_empty() {
            return Err(BuildError::Validation(NAME_REQUIRED.to_string()));
        }
        if TargetTemplate::new(&self.config, &target_name).is_foreign() {
            return Err(BuildError::Validation(format!(
                "The project already has a folder named \"{}\"; please choose another name",
                target_name
            )));
        }
        if !request.video_path().is_file() {
            return Err(BuildError::Validation(format!(
                "Video file not found: {}",
                request.video_path().display()
            )));
        }
        Ok(())
    }

    /// Tear down whatever a previous, interrupted run left for `display_name`
    pub fn clean(&self, display_name: &str) -> Result<(), BuildError> {
        let target_name = crate::request::sanitize_target_name(display_name);
        if target_name.is_empty() {
            return Err(BuildError::Validation(NAME_REQUIRED.to_string()));
        }

        let _running = self.running.try_lock().map_err(|_| BuildError::Busy)?;
        let _lock = self.acquire_lock()?;

        BuildSession::new(&self.toolchain, &self.config, &target_name).finish();
        tracing::info!(target_name = %target_name, "cleaned target");
        Ok(())
    }

    async fn execute(&self, request: &BuildRequest, phases: &mut PhaseTracker) -> BuildResult {
        phases.enter(BuildPhase::Validating);
        if let Err(err) = self.validate(request) {
            tracing::info!(error = %err, "request rejected");
            phases.enter(BuildPhase::Failed);
            return BuildResult::ValidationError {
                message: err.to_string(),
            };
        }

        let Ok(_running) = self.running.try_lock() else {
            phases.enter(BuildPhase::Failed);
            return BuildResult::busy();
        };

        let _lock = match self.acquire_lock() {
            Ok(lock) => lock,
            Err(BuildError::Busy) => {
                phases.enter(BuildPhase::Failed);
                return BuildResult::busy();
            }
            Err(err) => return self.fail(phases, err),
        };

        let manifest = match TemplateManifest::load(&self.config.template_dir) {
            Ok(manifest) => manifest,
            Err(err) => return self.fail(phases, BuildError::Preparation(err)),
        };
        if let Some(warning) = check_compatibility(crate::CORE_VERSION, &manifest.version) {
            tracing::warn!("{}", warning);
        }

        let mut attempt = 1;
        loop {
            tracing::info!(attempt, target_name = %request.target_name(), "starting build attempt");

            match self.attempt(request, &manifest, phases).await {
                Ok(artifact) => {
                    phases.enter(BuildPhase::Succeeded);
                    return BuildResult::Success { artifact };
                }
                Err(err) if err.is_retryable() && attempt < self.config.max_attempts => {
                    tracing::warn!(attempt, error = %err, "build failed; retrying from preparation");
                    attempt += 1;
                }
                Err(err) => return self.fail(phases, err),
            }
        }
    }

    /// Preparing through Installing, then cleanup whatever happened
    async fn attempt(
        &self,
        request: &BuildRequest,
        manifest: &TemplateManifest,
        phases: &mut PhaseTracker,
    ) -> Result<PathBuf, BuildError> {
        phases.enter(BuildPhase::Preparing);
        let mut session = BuildSession::new(&self.toolchain, &self.config, &request.target_name());

        let outcome = self
            .build_and_install(&mut session, request, manifest, phases)
            .await;

        phases.enter(BuildPhase::CleaningUp);
        session.finish();
        outcome
    }

    async fn build_and_install(
        &self,
        session: &mut BuildSession<'_, T>,
        request: &BuildRequest,
        manifest: &TemplateManifest,
        phases: &mut PhaseTracker,
    ) -> Result<PathBuf, BuildError> {
        let binding = TemplateBinding::for_request(manifest, &self.config.project_name, request);
        session
            .prepare(manifest, &binding, request)
            .await
            .map_err(BuildError::Preparation)?;

        phases.enter(BuildPhase::Building);
        let invocation = session.invocation(request);
        let output = self
            .toolchain
            .build(&invocation)
            .await
            .map_err(BuildError::Internal)?;

        if !output.success() {
            return Err(BuildError::BuildTool {
                tool: self.toolchain.build_tool_name().to_string(),
                code: output.code,
                stderr: output.stderr,
            });
        }
        self.write_log(RUN_LOG, &output.stdout);

        phases.enter(BuildPhase::Installing);
        install::install_bundle(&invocation.product_path(), &self.config.install_dir)
    }

    fn acquire_lock(&self) -> Result<ProjectLock, BuildError> {
        match ProjectLock::acquire(&self.config.lock_path()) {
            Ok(lock) => Ok(lock),
            Err(LockError::Contention { pid, .. }) => {
                tracing::info!(holder = %pid, "project locked by another build");
                Err(BuildError::Busy)
            }
            Err(err) => Err(BuildError::Internal(err.into())),
        }
    }

    fn fail(&self, phases: &mut PhaseTracker, err: BuildError) -> BuildResult {
        phases.enter(BuildPhase::Failed);
        tracing::error!(error = %err, "build failed");
        let log_path = self.write_log(ERROR_LOG, &err.log_contents());
        BuildResult::failure(log_path)
    }

    /// Best effort: a log that can't be written is itself only logged
    fn write_log(&self, name: &str, contents: &str) -> Option<PathBuf> {
        let path = self.config.log_dir.join(name);
        let written = std::fs::create_dir_all(&self.config.log_dir)
            .and_then(|_| std::fs::write(&path, contents));

        match written {
            Ok(()) => Some(path),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "failed to write log");
                None
            }
        }
    }
}
