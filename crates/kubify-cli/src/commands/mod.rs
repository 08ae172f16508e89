mod build;
mod doctor;
mod generate;
mod pipeline;
mod plan;

use std::io::{IsTerminal, Write};
use std::path::PathBuf;

use clap::Args;
use kubify_build::{GenerateError, OutputError};
use kubify_container::{BuildError, Prompt};
use kubify_core::{GraphError, HostStrategyKind, KubifyConfig, MalformedExpression, ParseError, ResolveError};

pub use build::build;
pub use doctor::doctor;
pub use generate::generate;
pub use plan::plan;

/// Options shared by every command that reads the manifest. Each one
/// overrides the matching kubify.toml setting.
#[derive(Debug, Default, Args)]
pub struct ManifestArgs {
    /// Manifest file [default: aspire-manifest.json]
    #[arg(long, short = 'm')]
    pub manifest: Option<PathBuf>,
    /// Namespace stamped on generated objects
    #[arg(long)]
    pub namespace: Option<String>,
    /// How binding hosts resolve: service, loopback or cluster-dns
    #[arg(long)]
    pub host_strategy: Option<HostStrategyKind>,
    /// Value for a parameter input (NAME=VALUE or NAME.INPUT=VALUE)
    #[arg(long = "parameter", short = 'p', value_parser = parse_parameter)]
    pub parameters: Vec<(String, String)>,
    /// Registry images are pushed to and pulled from
    #[arg(long)]
    pub registry: Option<String>,
    /// Image tag for built resources
    #[arg(long)]
    pub tag: Option<String>,
    /// Reference the image pull secret from every workload
    #[arg(long)]
    pub private_registry: bool,
}

/// Options for commands that build images.
#[derive(Debug, Default, Args)]
pub struct BuildArgs {
    /// Never prompt; retry recoverable build failures automatically
    #[arg(long)]
    pub non_interactive: bool,
}

impl ManifestArgs {
    pub(crate) fn apply(&self, config: &mut KubifyConfig) {
        if let Some(manifest) = &self.manifest {
            config.manifest.path = manifest.clone();
        }
        if let Some(namespace) = &self.namespace {
            config.output.namespace = Some(namespace.clone());
        }
        if let Some(strategy) = self.host_strategy {
            config.resolve.host_strategy = strategy;
        }
        for (name, value) in &self.parameters {
            config.parameters.insert(name.clone(), value.clone());
        }
        if let Some(registry) = &self.registry {
            config.registry.url = Some(registry.clone());
        }
        if let Some(tag) = &self.tag {
            config.registry.tag = tag.clone();
        }
        if self.private_registry {
            config.registry.private = true;
        }
    }
}

impl BuildArgs {
    pub(crate) fn apply(&self, config: &mut KubifyConfig) {
        if self.non_interactive {
            config.build.non_interactive = true;
        }
    }
}

fn parse_parameter(raw: &str) -> Result<(String, String), String> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got '{raw}'"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err("parameter name is empty".to_owned());
    }
    Ok((name.to_owned(), value.to_owned()))
}

/// Raised when Ctrl-C arrives between pipeline stages.
#[derive(Debug, thiserror::Error)]
#[error("cancelled")]
pub struct Cancelled;

/// Process exit code for a failed command.
///
/// 2 manifest or resolution error, 3 builder daemon, 4 registry
/// unreachable, tool exit code for build/push failures, 130 cancelled,
/// 1 otherwise.
pub fn exit_code(err: &anyhow::Error) -> u8 {
    for cause in err.chain() {
        if let Some(build) = cause.downcast_ref::<BuildError>() {
            return build.exit_code().clamp(1, 255) as u8;
        }
        if cause.is::<Cancelled>() {
            return 130;
        }
        if cause.is::<ParseError>()
            || cause.is::<GraphError>()
            || cause.is::<ResolveError>()
            || cause.is::<MalformedExpression>()
            || cause.is::<GenerateError>()
        {
            return 2;
        }
        if let Some(
            kubify_core::Error::ManifestRead { .. } | kubify_core::Error::ManifestParse { .. },
        ) = cause.downcast_ref::<kubify_core::Error>()
        {
            return 2;
        }
        if cause.is::<OutputError>() {
            return 1;
        }
    }
    1
}

/// Reads a yes/no answer from stdin. Declines when stdin is not a terminal.
pub(crate) struct StdinPrompt;

impl Prompt for StdinPrompt {
    fn confirm(&self, message: &str) -> bool {
        if !std::io::stdin().is_terminal() {
            tracing::debug!(message, "stdin is not a terminal, declining");
            return false;
        }

        print!("{message} [y/N] ");
        if let Err(e) = std::io::stdout().flush() {
            tracing::warn!(error = %e, "failed to flush prompt, declining");
            return false;
        }

        let mut input = String::new();
        match std::io::stdin().read_line(&mut input) {
            Ok(_) => matches!(input.trim(), "y" | "Y" | "yes" | "YES"),
            Err(e) => {
                tracing::warn!(error = %e, "failed to read answer, declining");
                false
            }
        }
    }
}
