//! End-to-end runs of the orchestrator against a scripted toolchain

use anyhow::Result;
use saver_core::pipeline::lock::ProjectLock;
use saver_core::pipeline::{BuildInvocation, ToolOutput, ERROR_LOG, RUN_LOG};
use saver_core::request::{FAILURE_MESSAGE, SUCCESS_MESSAGE};
use saver_core::{
    BuildRequest, BuildResult, BuilderConfig, Orchestrator, TargetTemplate, TemplateBinding,
    TemplateManifest, Toolchain,
};
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;

const ORIGINAL_DESCRIPTOR: &str = "// !$*UTF8*$!\n{\n\tobjects = {\n\t};\n}\n";

enum Step {
    Succeed,
    Fail(&'static str),
    Hang,
}

/// What the build tool saw on disk when it was called
#[derive(Debug, Clone)]
struct Observation {
    target: String,
    /// The header declares a class named after the target
    class_declared: String,
    descriptor_rendered: bool,
    video_staged: bool,
    preview_present: bool,
    sources_present: bool,
}

struct FakeToolchain {
    script: RefCell<VecDeque<Step>>,
    builds: Cell<usize>,
    refreshes: Cell<usize>,
    observed: RefCell<Vec<Observation>>,
    preview: bool,
}

impl FakeToolchain {
    fn new(script: impl IntoIterator<Item = Step>) -> Self {
        Self {
            script: RefCell::new(script.into_iter().collect()),
            builds: Cell::new(0),
            refreshes: Cell::new(0),
            observed: RefCell::new(Vec::new()),
            preview: true,
        }
    }

    fn without_preview(mut self) -> Self {
        self.preview = false;
        self
    }
}

impl Toolchain for FakeToolchain {
    async fn build(&self, invocation: &BuildInvocation) -> Result<ToolOutput> {
        self.builds.set(self.builds.get() + 1);

        let asset_dir = invocation.build_dir.parent().unwrap().to_path_buf();
        let descriptor = fs::read_to_string(invocation.project.join("project.pbxproj"))?;
        let header = asset_dir.join(format!("{}View.h", invocation.target));
        let class_declared = fs::read_to_string(header)
            .unwrap_or_default()
            .lines()
            .find_map(|line| line.strip_prefix("@interface "))
            .and_then(|rest| rest.split_whitespace().next())
            .unwrap_or_default()
            .to_string();
        self.observed.borrow_mut().push(Observation {
            target: invocation.target.clone(),
            class_declared,
            descriptor_rendered: descriptor.contains(&invocation.target),
            video_staged: asset_dir.join("video.mp4").is_file(),
            preview_present: asset_dir.join("preview.png").is_file(),
            sources_present: asset_dir
                .join(format!("{}View.m", invocation.target))
                .is_file(),
        });

        let step = self.script.borrow_mut().pop_front().unwrap_or(Step::Succeed);
        match step {
            Step::Succeed => {
                let contents = invocation.product_path().join("Contents");
                fs::create_dir_all(&contents)?;
                fs::write(contents.join("Info.plist"), "<plist/>")?;
                Ok(ToolOutput {
                    code: Some(0),
                    stdout: "** BUILD SUCCEEDED **\n".to_string(),
                    stderr: String::new(),
                })
            }
            Step::Fail(stderr) => Ok(ToolOutput {
                code: Some(65),
                stdout: "** BUILD FAILED **\n".to_string(),
                stderr: stderr.to_string(),
            }),
            Step::Hang => {
                std::future::pending::<()>().await;
                unreachable!()
            }
        }
    }

    async fn extract_preview(&self, _video: &Path, dest: &Path) -> bool {
        if !self.preview {
            return false;
        }
        fs::create_dir_all(dest.parent().unwrap()).unwrap();
        fs::write(dest, b"\x89PNG").unwrap();
        true
    }

    fn refresh_screensaver(&self, _processes: &[String]) {
        self.refreshes.set(self.refreshes.get() + 1);
    }
}

struct Fixture {
    dir: TempDir,
    config: BuilderConfig,
    video: PathBuf,
}

impl Fixture {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("project");
        let xcodeproj = root.join("myscreensaver.xcodeproj");
        fs::create_dir_all(&xcodeproj).unwrap();
        fs::write(xcodeproj.join("project.pbxproj"), ORIGINAL_DESCRIPTOR).unwrap();

        let videos = dir.path().join("videos");
        fs::create_dir_all(&videos).unwrap();
        let video = videos.join("clip.mp4");
        fs::write(&video, b"not really a movie").unwrap();

        let config = BuilderConfig {
            project_root: root,
            template_dir: Path::new(env!("CARGO_MANIFEST_DIR")).join("../../templates/saver"),
            install_dir: dir.path().join("Screen Savers"),
            derived_data_dir: dir.path().join("DerivedData"),
            log_dir: dir.path().join("logs"),
            state_dir: Some(dir.path().join("state")),
            ..BuilderConfig::default()
        };

        Self { dir, config, video }
    }

    fn root(&self) -> &Path {
        &self.config.project_root
    }

    fn descriptor(&self) -> String {
        fs::read_to_string(self.config.descriptor_path()).unwrap()
    }

    fn root_entries(&self) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(self.root())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    fn assert_restored(&self, target: &str) {
        assert_eq!(self.descriptor(), ORIGINAL_DESCRIPTOR);
        assert!(!self.root().join(target).exists(), "target dir left behind");
        assert!(!self.config.backup_path().exists(), "backup left behind");
    }
}

/// Run once, counting callback invocations
async fn run_counted(
    orchestrator: &Orchestrator<FakeToolchain>,
    request: &BuildRequest,
) -> (BuildResult, Vec<String>) {
    let mut reported = Vec::new();
    let result = orchestrator
        .run(request, |status| reported.push(status.to_string()))
        .await;
    (result, reported)
}

#[tokio::test]
async fn test_successful_build_installs_and_restores() {
    let fx = Fixture::new();
    let orchestrator = Orchestrator::new(fx.config.clone(), FakeToolchain::new([Step::Succeed]));
    let request = BuildRequest::new(fx.video.clone(), "My Saver");
    let before = fx.root_entries();

    let (result, reported) = run_counted(&orchestrator, &request).await;

    assert_eq!(reported, vec![SUCCESS_MESSAGE.to_string()]);
    let installed = fx.config.install_dir.join("My Saver.saver");
    assert_eq!(result, BuildResult::Success { artifact: installed.clone() });
    assert!(installed.join("Contents").join("Info.plist").is_file());

    let toolchain = orchestrator.toolchain();
    assert_eq!(toolchain.builds.get(), 1);
    assert_eq!(toolchain.refreshes.get(), 1);
    let seen = toolchain.observed.borrow()[0].clone();
    assert!(seen.descriptor_rendered);
    assert!(seen.video_staged);
    assert!(seen.preview_present);
    assert!(seen.sources_present);

    fx.assert_restored("MySaver");
    assert_eq!(fx.root_entries(), before);
    assert!(fx.config.log_dir.join(RUN_LOG).is_file());
    assert!(!fx.config.log_dir.join(ERROR_LOG).exists());
}

#[tokio::test]
async fn test_wrong_extension_is_rejected_without_side_effects() {
    let fx = Fixture::new();
    let avi = fx.dir.path().join("videos").join("clip.avi");
    fs::write(&avi, b"avi").unwrap();
    let before = fx.root_entries();

    let orchestrator = Orchestrator::new(fx.config.clone(), FakeToolchain::new([]));
    let (result, reported) = run_counted(&orchestrator, &BuildRequest::from_video(avi)).await;

    let expected = "Please select a video file in .mp4, .mov, or .m4v format";
    assert_eq!(reported, vec![expected.to_string()]);
    assert_eq!(
        result,
        BuildResult::ValidationError {
            message: expected.to_string()
        }
    );
    assert_eq!(orchestrator.toolchain().builds.get(), 0);
    assert_eq!(orchestrator.toolchain().refreshes.get(), 0);
    assert_eq!(fx.root_entries(), before);
    assert!(!fx.config.log_dir.exists());
    assert!(!fx.config.install_dir.exists());
}

#[tokio::test]
async fn test_missing_video_is_rejected() {
    let fx = Fixture::new();
    let orchestrator = Orchestrator::new(fx.config.clone(), FakeToolchain::new([]));
    let request = BuildRequest::new(fx.dir.path().join("gone.mov"), "Gone");

    let (result, _) = run_counted(&orchestrator, &request).await;

    assert!(matches!(result, BuildResult::ValidationError { .. }));
    assert!(result.message().contains("not found"));
    assert_eq!(orchestrator.toolchain().builds.get(), 0);
}

#[tokio::test]
async fn test_name_without_usable_characters_is_rejected() {
    let fx = Fixture::new();
    let orchestrator = Orchestrator::new(fx.config.clone(), FakeToolchain::new([]));
    let request = BuildRequest::new(fx.video.clone(), "  ...  ");

    let (result, _) = run_counted(&orchestrator, &request).await;

    assert!(matches!(result, BuildResult::ValidationError { .. }));
    assert_eq!(orchestrator.toolchain().builds.get(), 0);
}

#[tokio::test]
async fn test_name_of_existing_project_folder_is_rejected() {
    let fx = Fixture::new();
    let sources = fx.root().join("myscreensaver");
    fs::create_dir_all(&sources).unwrap();
    fs::write(sources.join("AppDelegate.m"), "// app").unwrap();
    let before = fx.root_entries();

    let orchestrator = Orchestrator::new(fx.config.clone(), FakeToolchain::new([]));
    let (result, reported) =
        run_counted(&orchestrator, &BuildRequest::new(fx.video.clone(), "myscreensaver")).await;

    assert!(matches!(result, BuildResult::ValidationError { .. }));
    assert!(result.message().contains("myscreensaver"));
    assert_eq!(reported.len(), 1);
    assert_eq!(orchestrator.toolchain().builds.get(), 0);
    assert_eq!(orchestrator.toolchain().refreshes.get(), 0);
    assert_eq!(
        fs::read_to_string(sources.join("AppDelegate.m")).unwrap(),
        "// app"
    );
    assert_eq!(fx.root_entries(), before);
    assert_eq!(fx.descriptor(), ORIGINAL_DESCRIPTOR);
}

#[tokio::test]
async fn test_punctuated_and_numeric_names_build_valid_classes() {
    let fx = Fixture::new();
    let orchestrator = Orchestrator::new(fx.config.clone(), FakeToolchain::new([]));

    for (display, target) in [("night-sky 2", "nightsky2"), ("2049", "Saver2049")] {
        let (result, _) =
            run_counted(&orchestrator, &BuildRequest::new(fx.video.clone(), display)).await;

        let installed = fx.config.install_dir.join(format!("{}.saver", display));
        assert_eq!(result, BuildResult::Success { artifact: installed });
        fx.assert_restored(target);
    }

    let observed = orchestrator.toolchain().observed.borrow();
    assert_eq!(observed[0].target, "nightsky2");
    assert_eq!(observed[0].class_declared, "nightsky2View");
    assert_eq!(observed[1].target, "Saver2049");
    assert_eq!(observed[1].class_declared, "Saver2049View");
}

#[tokio::test]
async fn test_two_build_failures_report_failure_and_restore() {
    let fx = Fixture::new();
    let orchestrator = Orchestrator::new(
        fx.config.clone(),
        FakeToolchain::new([
            Step::Fail("error: first failure"),
            Step::Fail("error: second failure"),
        ]),
    );
    let request = BuildRequest::new(fx.video.clone(), "My Saver");

    let (result, reported) = run_counted(&orchestrator, &request).await;

    assert_eq!(reported, vec![FAILURE_MESSAGE.to_string()]);
    assert_eq!(orchestrator.toolchain().builds.get(), 2);
    assert_eq!(orchestrator.toolchain().refreshes.get(), 2);

    let log_path = fx.config.log_dir.join(ERROR_LOG);
    assert_eq!(result.log_path(), Some(log_path.as_path()));
    let log = fs::read_to_string(&log_path).unwrap();
    assert!(log.contains("second failure"));
    assert!(!log.contains("first failure"));

    fx.assert_restored("MySaver");
    assert!(!fx.config.install_dir.join("My Saver.saver").exists());

    // The retry starts from a freshly prepared target
    let observed = orchestrator.toolchain().observed.borrow();
    assert!(observed.iter().all(|o| o.descriptor_rendered && o.video_staged));
}

#[tokio::test]
async fn test_failure_then_success_installs() {
    let fx = Fixture::new();
    let orchestrator = Orchestrator::new(
        fx.config.clone(),
        FakeToolchain::new([Step::Fail("error: flaky"), Step::Succeed]),
    );
    let request = BuildRequest::new(fx.video.clone(), "My Saver");

    let (result, reported) = run_counted(&orchestrator, &request).await;

    assert!(result.is_success());
    assert_eq!(reported.len(), 1);
    assert_eq!(orchestrator.toolchain().builds.get(), 2);
    fx.assert_restored("MySaver");
}

#[tokio::test]
async fn test_single_attempt_config_does_not_retry() {
    let mut fx = Fixture::new();
    fx.config.max_attempts = 1;
    let orchestrator = Orchestrator::new(
        fx.config.clone(),
        FakeToolchain::new([Step::Fail("error: once"), Step::Succeed]),
    );

    let (result, _) = run_counted(&orchestrator, &BuildRequest::new(fx.video.clone(), "One")).await;

    assert!(!result.is_success());
    assert_eq!(orchestrator.toolchain().builds.get(), 1);
}

#[tokio::test]
async fn test_install_failure_is_not_retried() {
    let fx = Fixture::new();
    // A regular file where the install directory should be
    fs::write(&fx.config.install_dir, b"in the way").unwrap();

    let orchestrator = Orchestrator::new(fx.config.clone(), FakeToolchain::new([]));
    let (result, reported) =
        run_counted(&orchestrator, &BuildRequest::new(fx.video.clone(), "My Saver")).await;

    assert_eq!(reported, vec![FAILURE_MESSAGE.to_string()]);
    assert!(matches!(result, BuildResult::BuildFailure { .. }));
    assert_eq!(orchestrator.toolchain().builds.get(), 1);
    assert!(fx.config.log_dir.join(ERROR_LOG).is_file());
    fx.assert_restored("MySaver");
}

#[tokio::test]
async fn test_missing_preview_tool_is_not_fatal() {
    let fx = Fixture::new();
    let orchestrator = Orchestrator::new(
        fx.config.clone(),
        FakeToolchain::new([Step::Succeed]).without_preview(),
    );

    let (result, _) = run_counted(&orchestrator, &BuildRequest::new(fx.video.clone(), "Quiet")).await;

    assert!(result.is_success());
    assert!(!orchestrator.toolchain().observed.borrow()[0].preview_present);
}

#[tokio::test]
async fn test_missing_template_is_preparation_failure() {
    let mut fx = Fixture::new();
    fx.config.template_dir = fx.dir.path().join("no-templates");
    let orchestrator = Orchestrator::new(fx.config.clone(), FakeToolchain::new([]));

    let (result, _) =
        run_counted(&orchestrator, &BuildRequest::new(fx.video.clone(), "My Saver")).await;

    assert_eq!(result.message(), FAILURE_MESSAGE);
    assert_eq!(orchestrator.toolchain().builds.get(), 0);
    let log = fs::read_to_string(fx.config.log_dir.join(ERROR_LOG)).unwrap();
    assert!(log.contains("Failed to prepare target"));
    assert_eq!(fx.descriptor(), ORIGINAL_DESCRIPTOR);
}

#[tokio::test]
async fn test_stale_derived_data_is_purged() {
    let fx = Fixture::new();
    let stale = fx.config.derived_data_dir.join("myscreensaver-abcdef");
    let unrelated = fx.config.derived_data_dir.join("OtherApp-123456");
    fs::create_dir_all(&stale).unwrap();
    fs::create_dir_all(&unrelated).unwrap();

    let orchestrator = Orchestrator::new(fx.config.clone(), FakeToolchain::new([]));
    let (result, _) =
        run_counted(&orchestrator, &BuildRequest::new(fx.video.clone(), "My Saver")).await;

    assert!(result.is_success());
    assert!(!stale.exists());
    assert!(unrelated.exists());
}

#[cfg(unix)]
#[tokio::test]
async fn test_locked_project_reports_busy() {
    let fx = Fixture::new();
    let _held = ProjectLock::acquire(&fx.config.lock_path()).unwrap();

    let orchestrator = Orchestrator::new(fx.config.clone(), FakeToolchain::new([]));
    let (result, reported) =
        run_counted(&orchestrator, &BuildRequest::new(fx.video.clone(), "My Saver")).await;

    assert_eq!(result, BuildResult::busy());
    assert_eq!(reported.len(), 1);
    assert_eq!(orchestrator.toolchain().builds.get(), 0);
    assert_eq!(fx.descriptor(), ORIGINAL_DESCRIPTOR);
}

#[tokio::test]
async fn test_overlapping_runs_on_one_orchestrator_report_busy() {
    let fx = Fixture::new();
    let orchestrator = Orchestrator::new(fx.config.clone(), FakeToolchain::new([Step::Hang]));
    let first_request = BuildRequest::new(fx.video.clone(), "My Saver");

    // Park the first run inside the build tool, still holding the project
    let mut first = Box::pin(orchestrator.run(&first_request, |_| {
        panic!("parked run must not report")
    }));
    let parked = tokio::time::timeout(Duration::from_millis(50), first.as_mut()).await;
    assert!(parked.is_err());
    assert_eq!(orchestrator.toolchain().builds.get(), 1);

    let (second, reported) =
        run_counted(&orchestrator, &BuildRequest::new(fx.video.clone(), "Other Saver")).await;
    assert_eq!(second, BuildResult::busy());
    assert_eq!(reported, vec![second.message().to_string()]);
    assert_eq!(orchestrator.toolchain().builds.get(), 1);
    assert!(!fx.root().join("OtherSaver").exists());

    drop(first);
    fx.assert_restored("MySaver");
}

#[tokio::test]
async fn test_cancelled_run_restores_project() {
    let fx = Fixture::new();
    let orchestrator = Orchestrator::new(fx.config.clone(), FakeToolchain::new([Step::Hang]));
    let request = BuildRequest::new(fx.video.clone(), "My Saver");

    let run = orchestrator.run(&request, |_| panic!("cancelled run must not report"));
    let timed_out = tokio::time::timeout(Duration::from_millis(50), run).await;

    assert!(timed_out.is_err());
    assert_eq!(orchestrator.toolchain().builds.get(), 1);
    assert_eq!(orchestrator.toolchain().refreshes.get(), 1);
    fx.assert_restored("MySaver");

    // The project is usable again
    let (result, _) = run_counted(&orchestrator, &request).await;
    assert!(result.is_success());
}

/// Leave the project the way a killed process would: target rendered, video
/// staged, descriptor backed up and replaced
fn abandon_target(fx: &Fixture, display_name: &str) {
    let request = BuildRequest::new(fx.video.clone(), display_name);
    let manifest = TemplateManifest::load(&fx.config.template_dir).unwrap();
    let binding =
        TemplateBinding::for_request(&manifest, &fx.config.project_name, &request);
    let mut target = TargetTemplate::new(&fx.config, &request.target_name());
    target.create_target(&manifest, &binding).unwrap();
    fs::copy(
        &fx.video,
        fx.config.target_dir(&request.target_name()).join("video.mp4"),
    )
    .unwrap();
}

#[test]
fn test_clean_recovers_abandoned_target_and_is_idempotent() {
    let fx = Fixture::new();
    abandon_target(&fx, "My Saver");
    assert_ne!(fx.descriptor(), ORIGINAL_DESCRIPTOR);
    assert!(fx.root().join("MySaver").is_dir());

    let orchestrator = Orchestrator::new(fx.config.clone(), FakeToolchain::new([]));
    orchestrator.clean("My Saver").unwrap();
    fx.assert_restored("MySaver");
    assert_eq!(orchestrator.toolchain().refreshes.get(), 1);

    orchestrator.clean("My Saver").unwrap();
    fx.assert_restored("MySaver");
}

#[tokio::test]
async fn test_run_after_interrupted_run_keeps_original_backup() {
    let fx = Fixture::new();
    abandon_target(&fx, "My Saver");

    let orchestrator = Orchestrator::new(fx.config.clone(), FakeToolchain::new([]));
    let (result, _) =
        run_counted(&orchestrator, &BuildRequest::new(fx.video.clone(), "My Saver")).await;

    assert!(result.is_success());
    fx.assert_restored("MySaver");
}

#[test]
fn test_shipped_template_binds_every_placeholder() {
    let fx = Fixture::new();
    let manifest = TemplateManifest::load(&fx.config.template_dir).unwrap();
    let request = BuildRequest::new(fx.video.clone(), "My Saver");
    let binding = TemplateBinding::for_request(&manifest, &fx.config.project_name, &request);

    for file in &manifest.files {
        let template = fs::read_to_string(fx.config.template_dir.join(&file.source)).unwrap();
        let rendered = binding.render(&template);
        assert!(
            !rendered.contains("{{"),
            "unbound placeholder left in {}",
            file.source
        );
    }
}
