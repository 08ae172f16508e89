use std::path::{Path, PathBuf};

use anyhow::Context;
use kubify_build::{ArtifactGenerator, GeneratorOptions, ResourceModel};
use kubify_container::{
    BuildOptions, BuildRequest, BuiltImage, CancellationToken, ContainerBuildCoordinator,
};
use kubify_core::{ExpressionResolver, KubifyConfig, Manifest, SecretStore, resolution_order};

use super::{ManifestArgs, StdinPrompt};

/// Everything a command needs after the manifest is loaded and ordered.
pub(crate) struct Workspace {
    pub project_dir: PathBuf,
    pub config: KubifyConfig,
    pub manifest: Manifest,
    /// Directory holding the manifest. Project and Dockerfile paths are
    /// relative to it.
    pub manifest_dir: PathBuf,
    pub secrets: SecretStore,
    pub order: Vec<String>,
}

impl Workspace {
    /// Load kubify.toml, apply command-line overrides, then read and order
    /// the manifest.
    pub fn load(project_dir: &Path, args: &ManifestArgs) -> anyhow::Result<Self> {
        let mut config = KubifyConfig::load(project_dir)?;
        args.apply(&mut config);
        Self::from_config(project_dir, config)
    }

    pub fn from_config(project_dir: &Path, config: KubifyConfig) -> anyhow::Result<Self> {
        let manifest_path = project_dir.join(&config.manifest.path);
        let manifest = Manifest::load(&manifest_path)?;
        let manifest_dir = match manifest_path.parent() {
            Some(dir) => dir.to_path_buf(),
            None => project_dir.to_path_buf(),
        };

        let secrets = if config.secrets.persist {
            SecretStore::load(&project_dir.join(&config.secrets.state_file))?
        } else {
            SecretStore::new()
        };

        let order = resolution_order(&manifest)
            .with_context(|| format!("failed to order resources in {}", manifest_path.display()))?;
        tracing::debug!(resources = order.len(), manifest = %manifest_path.display(), "loaded manifest");

        Ok(Self {
            project_dir: project_dir.to_path_buf(),
            config,
            manifest,
            manifest_dir,
            secrets,
            order,
        })
    }

    pub fn resolver(&self) -> ExpressionResolver<'_> {
        let host = self
            .config
            .resolve
            .host_strategy
            .strategy(self.config.output.namespace.as_deref());
        ExpressionResolver::new(&self.manifest, &self.secrets)
            .with_host_strategy(host)
            .with_parameters(self.config.parameters.clone())
    }

    pub fn generator(&self) -> ArtifactGenerator {
        ArtifactGenerator::new(GeneratorOptions::from_config(&self.config))
    }

    /// Resolve every field of every resource. Runs before anything with a
    /// side effect, so a resolution error stops the run with nothing built,
    /// pushed or written.
    pub fn plan(
        &self,
        generator: &ArtifactGenerator,
        resolver: &ExpressionResolver<'_>,
    ) -> anyhow::Result<Vec<ResourceModel>> {
        let models = generator.plan(resolver, &self.order)?;
        tracing::debug!(workloads = models.len(), "resolved manifest");
        Ok(models)
    }

    pub fn output_dir(&self) -> PathBuf {
        self.project_dir.join(&self.config.output.dir)
    }

    /// Persist generated secret values so the next run reuses them.
    pub fn save_secrets(&self) -> anyhow::Result<()> {
        if !self.config.secrets.persist || self.secrets.generated_count() == 0 {
            return Ok(());
        }
        let path = self.project_dir.join(&self.config.secrets.state_file);
        self.secrets.save(&path)?;
        tracing::info!(
            path = %path.display(),
            generated = self.secrets.generated_count(),
            "saved generated secrets"
        );
        Ok(())
    }

    /// Build (and push when a registry is set) every project and Dockerfile
    /// resource. Call after [`Workspace::plan`] has succeeded.
    pub async fn build_images(
        &self,
        resolver: &ExpressionResolver<'_>,
        cancel: &CancellationToken,
    ) -> anyhow::Result<Vec<BuiltImage>> {
        let requests = BuildRequest::collect(resolver, &self.order, &self.config.registry)?;
        if requests.is_empty() {
            println!("No resources to build.");
            return Ok(Vec::new());
        }

        let mut options = BuildOptions::from_config(&self.config);
        options.working_dir = Some(self.manifest_dir.clone());
        let coordinator =
            ContainerBuildCoordinator::new(options, cancel.clone()).with_prompt(StdinPrompt);

        println!("Building {} image(s)...", requests.len());
        let built = coordinator
            .build_all(&requests)
            .await
            .context("image build failed")?;

        for image in &built {
            let pushed = if image.pushed { " (pushed)" } else { "" };
            println!("  {} -> {}{pushed}", image.resource, image.image);
        }
        Ok(built)
    }
}
