// crates/framepress-cli/src/main.rs
// ============================================================================
// Module: Framepress CLI Entry Point
// Description: Command dispatcher for the Framepress service and offline tools.
// Purpose: Run the HTTP service, inspect configuration, and render offline.
// Dependencies: clap, framepress-core, framepress-render, framepress-server, tokio
// ============================================================================

//! ## Overview
//! The `framepress` binary exposes three commands: `serve` runs the HTTP
//! service, `check-config` loads and validates configuration and prints the
//! effective values, and `render` composes a single image from an already
//! extracted template directory without touching the network.
//!
//! Exit codes: 0 on success, 1 on operational failure, 2 on configuration
//! or usage failure.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Args;
use clap::Parser;
use clap::Subcommand;
use framepress_core::manifest;
use framepress_server::FramepressConfig;
use serde_json::json;

// ============================================================================
// SECTION: CLI Definition
// ============================================================================

/// Framepress: template-driven image composition service.
#[derive(Debug, Parser)]
#[command(name = "framepress", version, about = "Template-driven image composition service")]
struct Cli {
    /// Command to run.
    #[command(subcommand)]
    command: Command,
}

/// Top-level commands.
#[derive(Debug, Subcommand)]
enum Command {
    /// Run the HTTP service.
    Serve(ServeArgs),
    /// Load and validate configuration, printing the effective values.
    CheckConfig(CheckConfigArgs),
    /// Compose one image offline from an extracted template directory.
    Render(RenderArgs),
}

/// Arguments for `serve`.
#[derive(Debug, Args)]
struct ServeArgs {
    /// Path to the TOML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Bind address override (for example `0.0.0.0:9002`).
    #[arg(long)]
    bind: Option<String>,
}

/// Arguments for `check-config`.
#[derive(Debug, Args)]
struct CheckConfigArgs {
    /// Path to the TOML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,
}

/// Arguments for `render`.
#[derive(Debug, Args)]
struct RenderArgs {
    /// Extracted template directory containing manifest.json.
    #[arg(long)]
    template_dir: PathBuf,
    /// Raw photograph to compose.
    #[arg(long)]
    raw: PathBuf,
    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,
}

// ============================================================================
// SECTION: Entry Point
// ============================================================================

fn main() -> ExitCode {
    let cli = Cli::parse();
    match cli.command {
        Command::Serve(args) => run_serve(args),
        Command::CheckConfig(args) => run_check_config(&args),
        Command::Render(args) => run_render(&args),
    }
}

// ============================================================================
// SECTION: Commands
// ============================================================================

/// Runs the HTTP service until it fails or is interrupted.
fn run_serve(args: ServeArgs) -> ExitCode {
    let mut config = match FramepressConfig::load(args.config.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("framepress: {err}");
            return ExitCode::from(2);
        }
    };
    if let Some(bind) = args.bind {
        config.server.bind = bind;
        if let Err(err) = config.validate() {
            eprintln!("framepress: {err}");
            return ExitCode::from(2);
        }
    }

    let startup = json!({
        "event": "framepress_started",
        "bind": config.server.bind,
        "publicBaseUrl": config.server.public_base_url,
        "dataDir": config.storage.data_dir.display().to_string(),
        "cacheRoot": config.effective_cache_root().display().to_string(),
    });
    eprintln!("{startup}");

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(err) => {
            eprintln!("framepress: runtime init failed: {err}");
            return ExitCode::FAILURE;
        }
    };
    match runtime.block_on(framepress_server::serve(config)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("framepress: {err}");
            ExitCode::FAILURE
        }
    }
}

/// Loads, validates, and prints the effective configuration.
fn run_check_config(args: &CheckConfigArgs) -> ExitCode {
    match FramepressConfig::load(args.config.as_deref()) {
        Ok(config) => {
            let effective = json!({
                "server": {
                    "bind": config.server.bind,
                    "publicBaseUrl": config.server.public_base_url,
                },
                "storage": {"dataDir": config.storage.data_dir.display().to_string()},
                "cache": {"root": config.effective_cache_root().display().to_string()},
                "download": {
                    "connectTimeoutMs": config.download.connect_timeout_ms,
                    "readTimeoutMs": config.download.read_timeout_ms,
                },
            });
            match serde_json::to_string_pretty(&effective) {
                Ok(text) => {
                    println!("{text}");
                    ExitCode::SUCCESS
                }
                Err(err) => {
                    eprintln!("framepress: {err}");
                    ExitCode::FAILURE
                }
            }
        }
        Err(err) => {
            eprintln!("framepress: {err}");
            ExitCode::from(2)
        }
    }
}

/// Composes one image offline through the manifest and render chain.
fn run_render(args: &RenderArgs) -> ExitCode {
    let spec = match load_spec(&args.template_dir) {
        Ok(spec) => spec,
        Err(message) => {
            eprintln!("framepress: {message}");
            return ExitCode::FAILURE;
        }
    };
    let raw = match image::open(&args.raw) {
        Ok(raw) => raw.to_rgba8(),
        Err(err) => {
            eprintln!("framepress: raw decode failed: {err}");
            return ExitCode::FAILURE;
        }
    };
    let canvas = match framepress_render::render(&spec, &raw) {
        Ok(canvas) => canvas,
        Err(err) => {
            eprintln!("framepress: {err}");
            return ExitCode::FAILURE;
        }
    };
    if let Err(err) = canvas.save(&args.out) {
        eprintln!("framepress: output write failed: {err}");
        return ExitCode::FAILURE;
    }
    println!("{}", args.out.display());
    ExitCode::SUCCESS
}

/// Runs the manifest chain against an extracted template directory.
fn load_spec(template_dir: &std::path::Path) -> Result<framepress_core::RuntimeSpec, String> {
    // Absolute paths in the runtime spec need an absolute template root.
    let template_dir = std::fs::canonicalize(template_dir)
        .map_err(|err| format!("template dir unusable: {err}"))?;
    let doc = manifest::load_manifest(&template_dir).map_err(|err| err.to_string())?;
    manifest::validate_manifest(&doc).map_err(|err| err.to_string())?;
    let spec = manifest::to_runtime_spec(&doc, &template_dir).map_err(|err| err.to_string())?;
    manifest::validate_assets(&spec).map_err(|err| err.to_string())?;
    Ok(spec)
}
