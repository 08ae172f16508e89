use std::path::PathBuf;

use futures::{StreamExt, TryStreamExt, stream};
use kubify_core::KubifyConfig;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use crate::classify::{FailureClass, classify, is_registry_unreachable};
use crate::executor::{ExecOptions, ProcessRunner, RealRunner};
use crate::process::{ProcessError, ProcessOutput};
use crate::prompt::{DeclinePrompt, Prompt};
use crate::request::{BuildKind, BuildRequest};

/// Publish property that turns the duplicate-output error into a warning.
pub const DUPLICATE_OUTPUT_OVERRIDE: &str = "-p:ErrorOnDuplicatePublishOutputFiles=false";

#[derive(Debug, Clone)]
pub struct BuildOptions {
    pub builder: String,
    pub publish_command: String,
    pub max_concurrency: usize,
    /// Retry recoverable failures without asking.
    pub non_interactive: bool,
    /// Push after building; set when a registry is configured.
    pub push: bool,
    /// Directory relative manifest paths are resolved against.
    pub working_dir: Option<PathBuf>,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            builder: "docker".to_owned(),
            publish_command: "dotnet".to_owned(),
            max_concurrency: 4,
            non_interactive: false,
            push: false,
            working_dir: None,
        }
    }
}

impl BuildOptions {
    pub fn from_config(config: &KubifyConfig) -> Self {
        Self {
            builder: config.build.builder.clone(),
            publish_command: config.build.publish_command.clone(),
            max_concurrency: config.build.max_concurrency,
            non_interactive: config.build.non_interactive,
            push: config.registry.url.is_some(),
            working_dir: None,
        }
    }
}

/// Outcome of one successful build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltImage {
    pub resource: String,
    pub image: String,
    pub pushed: bool,
    pub retried: bool,
}

/// Daemon state reported by `<builder> info`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DaemonInfo {
    pub server_version: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InfoOutput {
    server_errors: Option<Vec<String>>,
    server_version: Option<String>,
}

/// Builds and pushes images, parameterized over the process runner and
/// prompt for testability.
///
/// Per resource: `check builder health → build → push?`. Health is checked
/// once per run before any build starts.
pub struct ContainerBuildCoordinator<R: ProcessRunner = RealRunner, P: Prompt = DeclinePrompt> {
    runner: R,
    prompt: P,
    options: BuildOptions,
    cancel: CancellationToken,
}

impl ContainerBuildCoordinator<RealRunner, DeclinePrompt> {
    pub fn new(options: BuildOptions, cancel: CancellationToken) -> Self {
        Self {
            runner: RealRunner::new(cancel.clone()),
            prompt: DeclinePrompt,
            options,
            cancel,
        }
    }
}

impl<R: ProcessRunner, P: Prompt> ContainerBuildCoordinator<R, P> {
    pub fn with_runner(runner: R, prompt: P, options: BuildOptions, cancel: CancellationToken) -> Self {
        Self {
            runner,
            prompt,
            options,
            cancel,
        }
    }

    pub fn with_prompt<Q: Prompt>(self, prompt: Q) -> ContainerBuildCoordinator<R, Q> {
        ContainerBuildCoordinator {
            runner: self.runner,
            prompt,
            options: self.options,
            cancel: self.cancel,
        }
    }

    pub fn options(&self) -> &BuildOptions {
        &self.options
    }

    pub(crate) fn runner(&self) -> &R {
        &self.runner
    }

    /// Build (and push) every request, at most `max_concurrency` at a time.
    ///
    /// The first failure stops the run; builds still in flight are dropped,
    /// which kills their processes. Results follow request order.
    pub async fn build_all(&self, requests: &[BuildRequest]) -> Result<Vec<BuiltImage>, BuildError> {
        if requests.is_empty() {
            return Ok(Vec::new());
        }
        self.ensure_not_cancelled()?;

        let needs_publish = requests.iter().any(BuildRequest::is_project);
        self.check_health(needs_publish).await?;

        let limit = self.options.max_concurrency.max(1);
        tracing::info!(images = requests.len(), concurrency = limit, "building images");

        let builds = requests
            .iter()
            .enumerate()
            .map(|(index, request)| async move { Ok::<_, BuildError>((index, self.build_one(request).await?)) });
        let mut built: Vec<(usize, BuiltImage)> = stream::iter(builds)
            .buffer_unordered(limit)
            .try_collect()
            .await?;

        built.sort_by_key(|(index, _)| *index);
        Ok(built.into_iter().map(|(_, image)| image).collect())
    }

    /// Verify the builder is installed and its daemon reports no errors.
    pub async fn check_health(&self, needs_publish: bool) -> Result<DaemonInfo, BuildError> {
        let builder = &self.options.builder;
        if !self.runner.is_available(builder).available {
            return Err(BuildError::BuilderNotFound {
                builder: builder.clone(),
            });
        }
        if needs_publish && !self.runner.is_available(&self.options.publish_command).available {
            return Err(BuildError::BuilderNotFound {
                builder: self.options.publish_command.clone(),
            });
        }

        let output = self
            .runner
            .execute(builder, &args(["info", "--format", "{{json .}}"]), &ExecOptions::default())
            .await
            .map_err(|source| process_error("health check", source))?;

        let info = parse_info(&output)?;
        if let Some(errors) = info.server_errors.filter(|errors| !errors.is_empty()) {
            return Err(BuildError::DaemonError { errors });
        }
        if !output.success() {
            return Err(BuildError::DaemonError {
                errors: vec![output.summary()],
            });
        }

        tracing::debug!(version = ?info.server_version, "builder daemon healthy");
        Ok(DaemonInfo {
            server_version: info.server_version,
        })
    }

    /// Build then, when configured, push one image.
    pub async fn build_one(&self, request: &BuildRequest) -> Result<BuiltImage, BuildError> {
        self.ensure_not_cancelled()?;
        let image = request.image();
        tracing::info!(resource = %request.resource, %image, "building image");

        let retried = self.build(request).await?;
        let pushed = if self.options.push {
            self.push(request, &image).await?;
            true
        } else {
            false
        };

        Ok(BuiltImage {
            resource: request.resource.clone(),
            image,
            pushed,
            retried,
        })
    }

    /// Returns whether the duplicate-output retry was needed.
    async fn build(&self, request: &BuildRequest) -> Result<bool, BuildError> {
        let (program, arguments) = self.build_command(request, false);
        let output = self.run(&request.resource, program, &arguments).await?;
        if output.success() {
            return Ok(false);
        }

        let retryable = request.is_project() && classify(&output.combined()) == FailureClass::Retryable;
        if !retryable {
            return Err(build_failure(request, &output));
        }

        let approved = self.options.non_interactive
            || self.prompt.confirm(&format!(
                "Publishing '{}' produced duplicate output files. Retry with {DUPLICATE_OUTPUT_OVERRIDE}?",
                request.resource
            ));
        if !approved {
            return Err(build_failure(request, &output));
        }

        tracing::warn!(
            resource = %request.resource,
            "duplicate publish output files, retrying with override"
        );
        self.ensure_not_cancelled()?;
        let (program, arguments) = self.build_command(request, true);
        let output = self.run(&request.resource, program, &arguments).await?;
        if output.success() {
            Ok(true)
        } else {
            Err(build_failure(request, &output))
        }
    }

    async fn push(&self, request: &BuildRequest, image: &str) -> Result<(), BuildError> {
        self.ensure_not_cancelled()?;
        tracing::info!(resource = %request.resource, %image, "pushing image");
        let output = self
            .run(&request.resource, &self.options.builder, &args(["push", image]))
            .await?;
        if output.success() {
            return Ok(());
        }
        if is_registry_unreachable(&output.combined()) {
            return Err(BuildError::RegistryUnreachable {
                image: image.to_owned(),
                detail: output.summary(),
            });
        }
        Err(BuildError::PushFailure {
            image: image.to_owned(),
            exit_code: output.exit_code,
            detail: output.summary(),
        })
    }

    /// Program and arguments for building `request`.
    pub fn build_command<'a>(&'a self, request: &BuildRequest, override_duplicates: bool) -> (&'a str, Vec<String>) {
        match &request.kind {
            BuildKind::Dockerfile {
                path,
                context,
                build_args,
            } => {
                let mut arguments = args(["build", "--tag", &request.image(), "--file", path]);
                for (key, value) in build_args {
                    arguments.push("--build-arg".to_owned());
                    arguments.push(format!("{key}={value}"));
                }
                arguments.push(context.clone());
                (self.options.builder.as_str(), arguments)
            }
            BuildKind::Project { path } => {
                let mut arguments = args([
                    "publish",
                    path,
                    "--configuration",
                    "Release",
                    "--os",
                    "linux",
                    "--arch",
                    "x64",
                    "/t:PublishContainer",
                ]);
                arguments.push(format!("-p:ContainerRepository={}", request.repository));
                arguments.push(format!("-p:ContainerImageTag={}", request.tag));
                if override_duplicates {
                    arguments.push(DUPLICATE_OUTPUT_OVERRIDE.to_owned());
                }
                (self.options.publish_command.as_str(), arguments)
            }
        }
    }

    async fn run(&self, resource: &str, program: &str, arguments: &[String]) -> Result<ProcessOutput, BuildError> {
        let options = ExecOptions {
            working_dir: self.options.working_dir.clone(),
        };
        self.runner
            .execute(program, arguments, &options)
            .await
            .map_err(|source| process_error(resource, source))
    }

    fn ensure_not_cancelled(&self) -> Result<(), BuildError> {
        if self.cancel.is_cancelled() {
            return Err(BuildError::Cancelled);
        }
        Ok(())
    }
}

fn process_error(resource: &str, source: ProcessError) -> BuildError {
    match source {
        ProcessError::Cancelled { .. } => BuildError::Cancelled,
        source => BuildError::Process {
            resource: resource.to_owned(),
            source,
        },
    }
}

fn parse_info(output: &ProcessOutput) -> Result<InfoOutput, BuildError> {
    let text = output.stdout.trim();
    if text.is_empty() {
        return Ok(InfoOutput::default());
    }
    serde_json::from_str(text).map_err(|e| BuildError::DaemonError {
        errors: vec![format!("unreadable daemon info: {e}")],
    })
}

fn build_failure(request: &BuildRequest, output: &ProcessOutput) -> BuildError {
    BuildError::BuildFailure {
        resource: request.resource.clone(),
        exit_code: output.exit_code,
        detail: output.summary(),
    }
}

fn args<const N: usize>(a: [&str; N]) -> Vec<String> {
    a.iter().map(|s| (*s).to_owned()).collect()
}

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("container builder '{builder}' not found on PATH")]
    BuilderNotFound { builder: String },

    #[error("container builder daemon is unhealthy: {}", errors.join("; "))]
    DaemonError { errors: Vec<String> },

    #[error("build of '{resource}' failed with exit code {exit_code}: {detail}")]
    BuildFailure {
        resource: String,
        exit_code: i32,
        detail: String,
    },

    #[error("push of '{image}' failed with exit code {exit_code}: {detail}")]
    PushFailure {
        image: String,
        exit_code: i32,
        detail: String,
    },

    #[error("registry for '{image}' is unreachable: {detail}")]
    RegistryUnreachable { image: String, detail: String },

    #[error("process failed for '{resource}'")]
    Process {
        resource: String,
        source: ProcessError,
    },

    #[error("build cancelled")]
    Cancelled,
}

impl BuildError {
    /// Process exit code for this failure. Tool failures keep the tool's
    /// own code when it is a usable one.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::BuilderNotFound { .. } | Self::DaemonError { .. } => 3,
            Self::RegistryUnreachable { .. } => 4,
            Self::BuildFailure { exit_code, .. } | Self::PushFailure { exit_code, .. } => {
                if (1..=255).contains(exit_code) {
                    *exit_code
                } else {
                    1
                }
            }
            Self::Cancelled => 130,
            Self::Process { .. } => 1,
        }
    }
}
