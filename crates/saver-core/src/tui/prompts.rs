//! Charm-style CLI prompts using cliclack

use crate::config::BuilderConfig;
use crate::pipeline::{Orchestrator, SystemToolchain};
use crate::request::{default_display_name, BuildRequest, BuildResult};
use crate::runtime::{check_tools, ffmpeg_tool, xcodebuild_tool};
use anyhow::Result;
use std::path::{Path, PathBuf};

/// Arguments for the interactive build flow
#[derive(Debug, Clone, Default)]
pub struct BuildArgs {
    /// Video to build from; prompted for when absent
    pub video: Option<PathBuf>,

    /// Screensaver name; defaults to the video's file stem
    pub name: Option<String>,

    /// Open the error log without asking when the build fails
    pub open_log: bool,

    /// Skip the xcodebuild/ffmpeg availability check
    pub skip_tool_check: bool,

    /// Auto-confirm all prompts (non-interactive mode)
    pub yes: bool,
}

/// Run one build with interactive prompts.
///
/// Ctrl-C while building drops the run, which restores the project before
/// this returns.
pub async fn run(config: BuilderConfig, args: BuildArgs) -> Result<BuildResult> {
    cliclack::intro("Screensaver Builder")?;

    // Step 1: Check tools
    if args.skip_tool_check {
        cliclack::log::info("Skipping tool check")?;
    } else {
        handle_tool_check()?;
    }

    // Step 2: Pick the video
    let video = select_video(&config, &args)?;

    // Step 3: Name it
    let name = select_name(&video, &args)?;

    // Step 4: Build
    let request = BuildRequest::new(video, name);
    let orchestrator = Orchestrator::new(config, SystemToolchain::default());

    let spinner = cliclack::spinner();
    spinner.start(format!("Building \"{}\"...", request.display_name()));

    let result = tokio::select! {
        result = orchestrator.run(&request, |status| tracing::debug!(status, "run reported")) => result,
        _ = tokio::signal::ctrl_c() => {
            spinner.stop("Build cancelled");
            cliclack::outro_cancel("Project restored; nothing was installed.")?;
            anyhow::bail!("Build cancelled.");
        }
    };

    // Step 5: Report
    report_outcome(&spinner, &result, &args)?;
    Ok(result)
}

fn handle_tool_check() -> Result<()> {
    let spinner = cliclack::spinner();
    spinner.start("Checking tools...");

    match check_tools(&[xcodebuild_tool(), ffmpeg_tool()]) {
        Ok(tools) => {
            let summary: Vec<String> = tools
                .iter()
                .map(|t| match (&t.version, t.available) {
                    (Some(version), true) => format!("{} ({})", t.name, version),
                    (None, true) => t.name.to_string(),
                    (_, false) => format!("{} (not installed)", t.name),
                })
                .collect();
            spinner.stop(format!("Detected tools: {}", summary.join(", ")));

            if tools.iter().any(|t| !t.available) {
                cliclack::log::warning("Without ffmpeg the screensaver has no preview image")?;
            }
            Ok(())
        }
        Err(e) => {
            spinner.stop("Missing tools");
            cliclack::log::error(format!("{}", e))?;
            anyhow::bail!("Please install the missing tools and try again.");
        }
    }
}

fn select_video(config: &BuilderConfig, args: &BuildArgs) -> Result<PathBuf> {
    if let Some(video) = &args.video {
        cliclack::log::info(format!("Using video: {}", video.display()))?;
        return Ok(video.clone());
    }

    let accepted = config.clone();
    let input: String = cliclack::input("Video file")
        .placeholder("~/Movies/clip.mp4")
        .validate(move |input: &String| {
            let path = expand_home(input.trim());
            if !accepted.accepts(&path) {
                Err(accepted.extension_hint())
            } else if !path.is_file() {
                Err("File does not exist".to_string())
            } else {
                Ok(())
            }
        })
        .interact()?;

    Ok(expand_home(input.trim()))
}

fn select_name(video: &Path, args: &BuildArgs) -> Result<String> {
    if let Some(name) = &args.name {
        return Ok(name.clone());
    }

    let default = default_display_name(video);
    if args.yes {
        cliclack::log::info(format!("Using name: {}", default))?;
        return Ok(default);
    }

    let name: String = cliclack::input("Screensaver name")
        .placeholder(&default)
        .default_input(&default)
        .validate(|input: &String| {
            if input.contains(['/', ':']) {
                Err("Name cannot contain '/' or ':'")
            } else {
                Ok(())
            }
        })
        .interact()?;

    Ok(name)
}

fn report_outcome(
    spinner: &cliclack::ProgressBar,
    result: &BuildResult,
    args: &BuildArgs,
) -> Result<()> {
    match result {
        BuildResult::Success { artifact } => {
            spinner.stop(result.message());
            cliclack::log::success(format!("Installed to {}", artifact.display()))?;
            cliclack::outro("Pick it in System Settings > Screen Saver.")?;
        }
        BuildResult::ValidationError { message } => {
            spinner.stop("Nothing was built");
            cliclack::log::error(message)?;
            cliclack::outro_cancel("Fix the input and run again.")?;
        }
        BuildResult::BuildFailure { message, log_path } => {
            spinner.stop(message);
            if let Some(log_path) = log_path {
                cliclack::log::info(format!("Details: {}", log_path.display()))?;
                if should_open_log(args)? {
                    if let Err(e) = open::that(log_path) {
                        cliclack::log::warning(format!("Could not open log: {}", e))?;
                    }
                }
            }
            cliclack::outro_cancel("Build failed.")?;
        }
    }
    Ok(())
}

fn should_open_log(args: &BuildArgs) -> Result<bool> {
    if args.open_log {
        return Ok(true);
    }
    if args.yes {
        return Ok(false);
    }
    Ok(cliclack::confirm("Open the error log?")
        .initial_value(false)
        .interact()?)
}

fn expand_home(input: &str) -> PathBuf {
    match input.strip_prefix("~/") {
        Some(rest) => dirs::home_dir()
            .map(|home| home.join(rest))
            .unwrap_or_else(|| PathBuf::from(input)),
        None => PathBuf::from(input),
    }
}
