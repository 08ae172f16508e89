use std::collections::BTreeMap;

use kubify_core::{ExpressionResolver, RegistryConfig, ResolveError, Resource, ResourceSpec};

/// What to build for one resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildKind {
    /// `<builder> build` of a Dockerfile
    Dockerfile {
        path: String,
        context: String,
        build_args: BTreeMap<String, String>,
    },
    /// `<publish command> publish` of a project file
    Project { path: String },
}

/// A fully resolved image build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildRequest {
    pub resource: String,
    /// `[<registry>/][<prefix>/]<name>`
    pub repository: String,
    pub tag: String,
    pub kind: BuildKind,
}

impl BuildRequest {
    /// `None` for resources that are not built.
    pub fn for_resource(
        resource: &Resource,
        resolver: &ExpressionResolver<'_>,
        registry: &RegistryConfig,
    ) -> Result<Option<Self>, ResolveError> {
        let kind = match &resource.spec {
            ResourceSpec::Project(spec) => BuildKind::Project {
                path: spec.path.clone(),
            },
            ResourceSpec::Dockerfile(spec) => {
                let mut build_args = BTreeMap::new();
                for (key, text) in &spec.build_args {
                    let resolved = resolver.resolve_text(text)?;
                    if resolved.secret {
                        tracing::warn!(
                            resource = %resource.name,
                            arg = %key,
                            "build argument contains a secret value"
                        );
                    }
                    build_args.insert(key.clone(), resolved.value);
                }
                BuildKind::Dockerfile {
                    path: spec.path.clone(),
                    context: spec.context(),
                    build_args,
                }
            }
            _ => return Ok(None),
        };

        Ok(Some(Self {
            resource: resource.name.clone(),
            repository: registry.repository_for(&resource.name),
            tag: registry.tag.clone(),
            kind,
        }))
    }

    /// Build requests for every buildable resource in `order`.
    pub fn collect(
        resolver: &ExpressionResolver<'_>,
        order: &[String],
        registry: &RegistryConfig,
    ) -> Result<Vec<Self>, ResolveError> {
        let manifest = resolver.manifest();
        let mut requests = Vec::new();
        for resource in order.iter().filter_map(|name| manifest.get(name)) {
            if let Some(request) = Self::for_resource(resource, resolver, registry)? {
                requests.push(request);
            }
        }
        Ok(requests)
    }

    pub fn image(&self) -> String {
        format!("{}:{}", self.repository, self.tag)
    }

    pub fn is_project(&self) -> bool {
        matches!(self.kind, BuildKind::Project { .. })
    }
}
