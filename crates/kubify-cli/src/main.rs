mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use commands::{BuildArgs, ManifestArgs};
use kubify_container::CancellationToken;

#[derive(Parser)]
#[command(
    name = "kubify",
    about = "Generate Kubernetes manifests from an application manifest"
)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve the manifest and write Kubernetes artifacts
    Generate {
        #[command(flatten)]
        manifest: ManifestArgs,
        #[command(flatten)]
        build_args: BuildArgs,
        /// Build and push images before generating
        #[arg(long)]
        build: bool,
        /// Output directory [default: kubify-output]
        #[arg(long, short = 'o')]
        output_dir: Option<PathBuf>,
    },
    /// Build (and push) container images only
    Build {
        #[command(flatten)]
        manifest: ManifestArgs,
        #[command(flatten)]
        build_args: BuildArgs,
    },
    /// Show resolution order and the artifacts that would be written
    Plan {
        #[command(flatten)]
        manifest: ManifestArgs,
    },
    /// Check builder, daemon and configuration readiness
    Doctor,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                // arch-lint: allow(no-silent-result-drop) reason="RUST_LOG unset or unparsable falls back to info level"
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let cancel = CancellationToken::new();
    let watcher = cancel.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::warn!("interrupt received, cancelling");
                watcher.cancel();
            }
            // arch-lint: allow(no-error-swallowing) reason="without a signal handler the run continues uncancellable with nothing to recover"
            Err(e) => tracing::warn!(error = %e, "failed to listen for Ctrl-C"),
        }
    });

    let result = match cli.command {
        Commands::Generate {
            manifest,
            build_args,
            build,
            output_dir,
        } => commands::generate(&manifest, &build_args, build, output_dir, &cancel).await,
        Commands::Build {
            manifest,
            build_args,
        } => commands::build(&manifest, &build_args, &cancel).await,
        Commands::Plan { manifest } => commands::plan(&manifest),
        Commands::Doctor => commands::doctor().await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:?}");
            ExitCode::from(commands::exit_code(&e))
        }
    }
}
