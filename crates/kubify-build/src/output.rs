use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};

use crate::generator::ArtifactBundle;

/// Writes each bundle to `<output_dir>/<bundle directory>/`.
///
/// A bundle's previous directory is removed first so files for objects
/// that are no longer generated do not linger. Returns the directories
/// written, in bundle order. Nothing is touched unless every bundle names
/// its own single directory.
pub fn write_bundles(
    output_dir: &Path,
    bundles: &[ArtifactBundle],
) -> Result<Vec<PathBuf>, OutputError> {
    let mut seen = HashSet::new();
    for bundle in bundles {
        if !is_single_component(&bundle.directory) || !seen.insert(bundle.directory.as_str()) {
            return Err(OutputError::InvalidDirectory {
                resource: bundle.resource.clone(),
                directory: bundle.directory.clone(),
            });
        }
    }

    std::fs::create_dir_all(output_dir).map_err(|e| OutputError::Create {
        path: output_dir.to_path_buf(),
        source: e,
    })?;

    let mut written = Vec::with_capacity(bundles.len());
    for bundle in bundles {
        let dir = output_dir.join(&bundle.directory);

        // Clean previous output
        if dir.exists() {
            std::fs::remove_dir_all(&dir).map_err(|e| OutputError::Cleanup {
                path: dir.clone(),
                source: e,
            })?;
        }
        std::fs::create_dir_all(&dir).map_err(|e| OutputError::Create {
            path: dir.clone(),
            source: e,
        })?;

        for document in &bundle.documents {
            let path = dir.join(&document.file_name);
            std::fs::write(&path, &document.content).map_err(|e| OutputError::Write {
                path: path.clone(),
                source: e,
            })?;
        }

        tracing::info!(
            resource = %bundle.resource,
            path = %dir.display(),
            documents = bundle.documents.len(),
            "wrote artifacts"
        );
        written.push(dir);
    }

    Ok(written)
}

/// Exactly one normal path component, so the directory stays inside the
/// output root.
fn is_single_component(directory: &str) -> bool {
    let mut components = Path::new(directory).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    #[error("resource '{resource}' has unusable output directory '{directory}'")]
    InvalidDirectory { resource: String, directory: String },
    #[error("failed to clean up output directory {path}")]
    Cleanup {
        path: std::path::PathBuf,
        source: std::io::Error,
    },
    #[error("failed to create directory {path}")]
    Create {
        path: std::path::PathBuf,
        source: std::io::Error,
    },
    #[error("failed to write {path}")]
    Write {
        path: std::path::PathBuf,
        source: std::io::Error,
    },
}
