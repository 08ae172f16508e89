use std::path::Path;

use kubify_core::DependencyGraph;

use super::ManifestArgs;
use super::pipeline::Workspace;

/// Print the resolution order and the files `generate` would write,
/// without writing anything.
pub fn plan(manifest_args: &ManifestArgs) -> anyhow::Result<()> {
    let workspace = Workspace::load(Path::new("."), manifest_args)?;
    let graph = DependencyGraph::build(&workspace.manifest)?;

    let bundles = workspace
        .generator()
        .generate(&workspace.resolver(), &workspace.order)?;

    println!("Resolution order:");
    let resources = workspace
        .order
        .iter()
        .filter_map(|name| workspace.manifest.get(name));
    for (index, resource) in resources.enumerate() {
        let deps = graph.dependencies_of(&resource.name);
        let line = format!("{:>4}. {} ({})", index + 1, resource.name, resource.kind());
        if deps.is_empty() {
            println!("{line}");
        } else {
            println!("{line} <- {}", deps.join(", "));
        }
    }

    let output_dir = workspace.output_dir();
    println!();
    println!("Artifacts:");
    for bundle in &bundles {
        for document in &bundle.documents {
            println!(
                "  {}",
                output_dir
                    .join(&bundle.directory)
                    .join(&document.file_name)
                    .display()
            );
        }
    }
    Ok(())
}
