//! saver CLI - Build macOS screensavers from video files

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use saver_core::request::default_display_name;
use saver_core::runtime::{check_tools, ffmpeg_tool, print_report, xcodebuild_tool, ToolInfo};
use saver_core::tui::BuildArgs;
use saver_core::{BuildRequest, BuildResult, BuilderConfig, Orchestrator, SystemToolchain};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// CLI version
pub const CLI_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser, Debug)]
#[command(name = "saver")]
#[command(about = "Build and install a macOS screensaver from a video file")]
#[command(version)]
pub struct Args {
    /// Configuration file (defaults to $SAVER_CONFIG, then ./saver.yaml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Build a screensaver; prompts for anything not given
    Build(CliBuildArgs),
    /// Check that xcodebuild and ffmpeg are available
    Doctor,
    /// Remove what an interrupted build left behind for a screensaver
    Clean(CleanArgs),
    /// Print the resolved configuration
    Config,
}

#[derive(Parser, Debug)]
pub struct CliBuildArgs {
    /// Video file (.mp4, .mov or .m4v); prompted for when omitted
    pub video: Option<PathBuf>,

    /// Screensaver name (defaults to the video's file stem)
    #[arg(short, long)]
    pub name: Option<String>,

    /// Open the error log if the build fails
    #[arg(long = "open-log")]
    pub open_log: bool,

    /// Skip the xcodebuild/ffmpeg availability check
    #[arg(long = "skip-tool-check")]
    pub skip_tool_check: bool,

    /// Use the interactive prompts even when a video is given
    #[arg(short, long)]
    pub interactive: bool,

    /// Accept defaults instead of prompting (interactive mode only)
    #[arg(short, long)]
    pub yes: bool,
}

impl CliBuildArgs {
    fn wants_prompts(&self) -> bool {
        self.interactive || self.video.is_none()
    }
}

impl From<CliBuildArgs> for BuildArgs {
    fn from(args: CliBuildArgs) -> Self {
        BuildArgs {
            video: args.video,
            name: args.name,
            open_log: args.open_log,
            skip_tool_check: args.skip_tool_check,
            yes: args.yes,
        }
    }
}

#[derive(Parser, Debug)]
pub struct CleanArgs {
    /// Screensaver name used for the interrupted build
    pub name: String,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Ensure terminal cursor is restored on panic
    let default_panic = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let _ = console::Term::stderr().show_cursor();
        default_panic(info);
    }));

    let args = Args::parse();
    init_tracing(args.verbose);
    tracing::debug!(version = CLI_VERSION, "starting");

    let config = BuilderConfig::load(args.config.as_deref())?;

    let result = match args.command {
        Some(Command::Build(build_args)) if build_args.wants_prompts() => {
            saver_core::run(config, build_args.into())
                .await
                .map(|outcome| exit_code(&outcome))
        }
        Some(Command::Build(build_args)) => build(config, build_args).await,
        Some(Command::Doctor) => Ok(doctor()),
        Some(Command::Clean(clean_args)) => clean(config, &clean_args.name),
        Some(Command::Config) => {
            print!("{}", serde_yaml::to_string(&config)?);
            Ok(ExitCode::SUCCESS)
        }
        None => {
            // No subcommand provided, default to the interactive flow
            saver_core::run(config, BuildArgs::default())
                .await
                .map(|outcome| exit_code(&outcome))
        }
    };

    // Ensure cursor is visible on normal exit
    let _ = console::Term::stderr().show_cursor();

    result
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "saver_core=debug,saver=debug"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(verbose)
        .init();
}

async fn build(config: BuilderConfig, args: CliBuildArgs) -> Result<ExitCode> {
    let video = args
        .video
        .clone()
        .ok_or_else(|| anyhow::anyhow!("A video file is required"))?;

    if !args.skip_tool_check {
        check_tools(&[xcodebuild_tool(), ffmpeg_tool()])?;
    }

    let name = args
        .name
        .clone()
        .unwrap_or_else(|| default_display_name(&video));
    let request = BuildRequest::new(video, name);
    let orchestrator = Orchestrator::new(config, SystemToolchain::default());

    println!(
        "{} Building {}...",
        "->".blue(),
        request.display_name().bold()
    );

    let outcome = tokio::select! {
        outcome = orchestrator.run(&request, |status| tracing::debug!(status, "run reported")) => outcome,
        _ = tokio::signal::ctrl_c() => {
            eprintln!("{} Build cancelled; project restored", "!".yellow());
            return Ok(ExitCode::from(130));
        }
    };

    match &outcome {
        BuildResult::Success { artifact } => {
            println!("{} {}", "✓".green(), outcome.message());
            println!("  {} {}", "->".blue(), artifact.display());
        }
        BuildResult::ValidationError { message } => {
            eprintln!("{} {}", "✗".red(), message);
        }
        BuildResult::BuildFailure { message, log_path } => {
            eprintln!("{} {}", "✗".red(), message);
            if let Some(log_path) = log_path {
                eprintln!("  {} {}", "log:".dimmed(), log_path.display());
                if args.open_log {
                    if let Err(e) = open::that(log_path) {
                        eprintln!("  {} could not open log: {}", "!".yellow(), e);
                    }
                }
            }
        }
    }

    Ok(exit_code(&outcome))
}

fn doctor() -> ExitCode {
    let results: Vec<ToolInfo> = [xcodebuild_tool(), ffmpeg_tool()]
        .iter()
        .map(ToolInfo::probe)
        .collect();

    println!("{}", "Tools".bold());
    print_report(&results);

    if results.iter().any(|t| t.required && !t.available) {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

fn clean(config: BuilderConfig, name: &str) -> Result<ExitCode> {
    let orchestrator = Orchestrator::new(config, SystemToolchain::default());
    orchestrator.clean(name)?;
    println!("{} Cleaned up {}", "✓".green(), name.bold());
    Ok(ExitCode::SUCCESS)
}

fn exit_code(outcome: &BuildResult) -> ExitCode {
    if outcome.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
