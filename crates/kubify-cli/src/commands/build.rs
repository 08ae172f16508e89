use std::path::Path;

use kubify_container::CancellationToken;

use super::pipeline::Workspace;
use super::{BuildArgs, ManifestArgs};

/// Build (and push) images without generating artifacts.
pub async fn build(
    manifest_args: &ManifestArgs,
    build_args: &BuildArgs,
    cancel: &CancellationToken,
) -> anyhow::Result<()> {
    let mut workspace = Workspace::load(Path::new("."), manifest_args)?;
    build_args.apply(&mut workspace.config);

    let resolver = workspace.resolver();
    workspace.plan(&workspace.generator(), &resolver)?;
    let built = workspace.build_images(&resolver, cancel).await?;
    workspace.save_secrets()?;

    if !built.is_empty() {
        println!();
        println!("Built {} image(s)", built.len());
    }
    Ok(())
}
