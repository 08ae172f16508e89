use std::path::{Path, PathBuf};

use kubify_build::write_bundles;
use kubify_container::CancellationToken;

use super::pipeline::Workspace;
use super::{BuildArgs, Cancelled, ManifestArgs};

/// Generate Kubernetes artifacts for every workload in the manifest,
/// optionally building images once every resource has resolved.
pub async fn generate(
    manifest_args: &ManifestArgs,
    build_args: &BuildArgs,
    build: bool,
    output_dir: Option<PathBuf>,
    cancel: &CancellationToken,
) -> anyhow::Result<()> {
    let mut workspace = Workspace::load(Path::new("."), manifest_args)?;
    build_args.apply(&mut workspace.config);
    if let Some(dir) = output_dir {
        workspace.config.output.dir = dir;
    }

    println!(
        "Loaded {} resource(s) from {}",
        workspace.order.len(),
        workspace.config.manifest.path.display()
    );

    let generator = workspace.generator();
    let resolver = workspace.resolver();
    let models = workspace.plan(&generator, &resolver)?;
    let bundles = models
        .iter()
        .map(|model| generator.render(model))
        .collect::<Result<Vec<_>, _>>()?;

    if build {
        workspace.build_images(&resolver, cancel).await?;
    }

    // Nothing touches disk once Ctrl-C has been seen.
    if cancel.is_cancelled() {
        return Err(Cancelled.into());
    }

    let output_dir = workspace.output_dir();
    let written = write_bundles(&output_dir, &bundles)?;
    workspace.save_secrets()?;

    println!();
    for (bundle, dir) in bundles.iter().zip(&written) {
        println!(
            "  {:<20} {} file(s) in {}",
            bundle.resource,
            bundle.documents.len(),
            dir.display()
        );
    }
    println!();
    println!(
        "Generated artifacts for {} workload(s) in {}",
        bundles.len(),
        output_dir.display()
    );

    Ok(())
}
