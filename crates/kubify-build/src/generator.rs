use std::collections::{BTreeMap, HashMap};

use kubify_core::expression::find_placeholder;
use kubify_core::resolver::dns_label;
use kubify_core::{
    ExpressionResolver, KubifyConfig, RegistryConfig, ResolveError, Resolved, Resource,
    ResourceSpec,
};

use crate::documents::Document;
use crate::model::{
    APP_LABEL, ExternalServiceModel, MANAGED_BY_LABEL, PortModel, ResourceModel, VolumeModel,
    WorkloadKind, port_name, port_protocol,
};
use crate::render::{RenderError, TemplateRenderer, YamlRenderer};

/// Settings that shape generated documents but are not part of the manifest.
#[derive(Debug, Clone)]
pub struct GeneratorOptions {
    pub namespace: Option<String>,
    /// Replicas for Deployments; StatefulSets always get one.
    pub replicas: u32,
    pub registry: RegistryConfig,
}

impl Default for GeneratorOptions {
    fn default() -> Self {
        Self {
            namespace: None,
            replicas: 1,
            registry: RegistryConfig::default(),
        }
    }
}

impl GeneratorOptions {
    pub fn from_config(config: &KubifyConfig) -> Self {
        Self {
            namespace: config.output.namespace.clone(),
            replicas: config.output.replicas,
            registry: config.registry.clone(),
        }
    }
}

/// Rendered documents for one resource.
#[derive(Debug, Clone, PartialEq)]
pub struct ArtifactBundle {
    /// Manifest resource name
    pub resource: String,
    /// Directory name under the output root
    pub directory: String,
    pub documents: Vec<RenderedDocument>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderedDocument {
    pub template: &'static str,
    pub file_name: String,
    pub content: String,
}

impl ArtifactBundle {
    pub fn document(&self, file_name: &str) -> Option<&RenderedDocument> {
        self.documents.iter().find(|d| d.file_name == file_name)
    }
}

/// Plans and renders Kubernetes documents for every workload resource.
///
/// Planning resolves all expressions into a [`ResourceModel`]; rendering
/// maps each model onto documents and hands them to the
/// [`TemplateRenderer`]. Nothing is written here.
pub struct ArtifactGenerator<R: TemplateRenderer = YamlRenderer> {
    options: GeneratorOptions,
    renderer: R,
}

impl ArtifactGenerator {
    pub fn new(options: GeneratorOptions) -> Self {
        Self {
            options,
            renderer: YamlRenderer,
        }
    }
}

impl<R: TemplateRenderer> ArtifactGenerator<R> {
    pub fn with_renderer(options: GeneratorOptions, renderer: R) -> Self {
        Self { options, renderer }
    }

    pub fn options(&self) -> &GeneratorOptions {
        &self.options
    }

    /// Plan then render every resource in `order`.
    pub fn generate(
        &self,
        resolver: &ExpressionResolver<'_>,
        order: &[String],
    ) -> Result<Vec<ArtifactBundle>, GenerateError> {
        let models = self.plan(resolver, order)?;
        models.iter().map(|model| self.render(model)).collect()
    }

    /// Resolve every resource in `order`. Value and parameter resources are
    /// resolved for validation but produce no model.
    pub fn plan(
        &self,
        resolver: &ExpressionResolver<'_>,
        order: &[String],
    ) -> Result<Vec<ResourceModel>, GenerateError> {
        let manifest = resolver.manifest();
        let mut models: Vec<ResourceModel> = Vec::new();
        let mut owners: HashMap<String, String> = HashMap::new();
        for name in order {
            let resource = manifest
                .get(name)
                .ok_or_else(|| GenerateError::UnknownResource(name.clone()))?;
            let Some(model) = self.plan_resource(resolver, resource)? else {
                continue;
            };
            if let Some(first) = owners.insert(model.name.clone(), model.resource.clone()) {
                return Err(GenerateError::NameCollision {
                    name: model.name,
                    first,
                    second: model.resource,
                });
            }
            models.push(model);
        }
        tracing::debug!(models = models.len(), "planned resources");
        Ok(models)
    }

    pub fn plan_resource(
        &self,
        resolver: &ExpressionResolver<'_>,
        resource: &Resource,
    ) -> Result<Option<ResourceModel>, GenerateError> {
        let resolve = |field: String, text: &str| -> Result<Resolved, GenerateError> {
            resolver
                .resolve_text(text)
                .map_err(|source| GenerateError::Resolve {
                    resource: resource.name.clone(),
                    field,
                    source,
                })
        };

        let kind = resource.kind();
        if !kind.is_workload() {
            for field in resource.expressions() {
                resolve(field.to_string(), field.text)?;
            }
            return Ok(None);
        }

        let name = object_name(&resource.name, &resource.name)?;

        let (image, args) = match &resource.spec {
            ResourceSpec::Container(spec) => {
                let image = resolve("image".to_owned(), &spec.image)?.value;
                let mut args = Vec::with_capacity(spec.args.len());
                for (i, arg) in spec.args.iter().enumerate() {
                    let resolved = resolve(format!("args.{i}"), arg)?;
                    if resolved.secret {
                        tracing::warn!(
                            resource = %resource.name,
                            index = i,
                            "container argument contains a secret value"
                        );
                    }
                    args.push(resolved.value);
                }
                (image, args)
            }
            _ => (self.options.registry.image_for(&resource.name), Vec::new()),
        };

        let mut config_entries = BTreeMap::new();
        let mut secret_entries = BTreeMap::new();
        for (key, text) in resource.env() {
            let resolved = resolve(format!("env.{key}"), text)?;
            if resolved.secret {
                secret_entries.insert(key.clone(), resolved.value);
            } else {
                config_entries.insert(key.clone(), resolved.value);
            }
        }

        let mut ports = Vec::new();
        let mut external_services = Vec::new();
        for (binding_name, binding) in resource.bindings() {
            let port = binding
                .effective_port()
                .ok_or_else(|| GenerateError::MissingPort {
                    resource: resource.name.clone(),
                    binding: binding_name.clone(),
                })?;
            let exposed_port = match binding.port {
                Some(declared) => declared,
                None => port,
            };
            let port = PortModel {
                name: port_name(binding_name, &ports),
                port,
                exposed_port,
                protocol: port_protocol(&binding.protocol),
            };
            if binding.external {
                external_services.push(ExternalServiceModel {
                    binding: binding_name.clone(),
                    name: format!("{name}-{}-external", port.name),
                    port: port.clone(),
                });
            }
            ports.push(port);
        }

        let mut volumes: Vec<VolumeModel> = Vec::new();
        for volume in resource.volumes() {
            let claim = object_name(&resource.name, &volume.name)?;
            if let Some(clash) = volumes.iter().find(|v| v.name == claim) {
                return Err(GenerateError::NameCollision {
                    name: claim,
                    first: clash.source.clone(),
                    second: volume.name.clone(),
                });
            }
            volumes.push(VolumeModel {
                name: claim,
                source: volume.name.clone(),
                mount_path: volume.target.clone(),
                read_only: volume.read_only,
                size: volume.claim_size().to_owned(),
            });
        }

        let (workload, replicas) = if volumes.is_empty() {
            (WorkloadKind::Deployment, self.options.replicas)
        } else {
            (WorkloadKind::StatefulSet, 1)
        };

        let labels = BTreeMap::from([
            (APP_LABEL.to_owned(), name.clone()),
            (MANAGED_BY_LABEL.to_owned(), "kubify".to_owned()),
        ]);

        let image_pull_secret = self
            .options
            .registry
            .private
            .then(|| self.options.registry.pull_secret.clone());

        tracing::debug!(
            resource = %resource.name,
            kind = %kind,
            workload = ?workload,
            config = config_entries.len(),
            secrets = secret_entries.len(),
            "planned resource"
        );

        Ok(Some(ResourceModel {
            resource: resource.name.clone(),
            name,
            kind,
            namespace: self.options.namespace.clone(),
            labels,
            workload,
            replicas,
            image,
            has_args: !args.is_empty(),
            args,
            has_ports: !ports.is_empty(),
            ports,
            has_config: !config_entries.is_empty(),
            config_entries,
            has_secrets: !secret_entries.is_empty(),
            secret_entries,
            has_volumes: !volumes.is_empty(),
            volumes,
            external_services,
            image_pull_secret,
        }))
    }

    /// Render one model. Fails if any placeholder survived into the text.
    pub fn render(&self, model: &ResourceModel) -> Result<ArtifactBundle, GenerateError> {
        let mut documents = Vec::new();
        for document in Document::for_model(model) {
            let template = document.template();
            let file_name = file_name(model, &document);
            let content = self
                .renderer
                .render(template, &document)
                .map_err(|source| GenerateError::Render {
                    resource: model.resource.clone(),
                    source,
                })?;
            if let Some(placeholder) = find_placeholder(&content) {
                return Err(GenerateError::UnresolvedPlaceholder {
                    resource: model.resource.clone(),
                    document: file_name,
                    placeholder: placeholder.to_owned(),
                });
            }
            documents.push(RenderedDocument {
                template,
                file_name,
                content,
            });
        }

        Ok(ArtifactBundle {
            resource: model.resource.clone(),
            directory: model.name.clone(),
            documents,
        })
    }
}

fn file_name(model: &ResourceModel, document: &Document) -> String {
    let object = &document.metadata().name;
    match model
        .external_services
        .iter()
        .find(|external| &external.name == object)
    {
        Some(external) => format!("service-{}-external.yaml", external.port.name),
        None => format!("{}.yaml", document.template()),
    }
}

/// DNS label for a manifest name, or `InvalidName` when nothing of it
/// survives normalization.
fn object_name(resource: &str, name: &str) -> Result<String, GenerateError> {
    let label = dns_label(name);
    if label.is_empty() {
        return Err(GenerateError::InvalidName {
            resource: resource.to_owned(),
            name: name.to_owned(),
        });
    }
    Ok(label)
}

#[derive(Debug, thiserror::Error)]
pub enum GenerateError {
    #[error("failed to resolve {field} of resource '{resource}'")]
    Resolve {
        resource: String,
        field: String,
        source: ResolveError,
    },
    #[error("resource '{0}' is not in the manifest")]
    UnknownResource(String),
    #[error("'{name}' in resource '{resource}' has no characters valid in a Kubernetes name")]
    InvalidName { resource: String, name: String },
    #[error("'{first}' and '{second}' both map to the Kubernetes name '{name}'")]
    NameCollision {
        name: String,
        first: String,
        second: String,
    },
    #[error("binding '{binding}' of resource '{resource}' has no port")]
    MissingPort { resource: String, binding: String },
    #[error("failed to render resource '{resource}'")]
    Render {
        resource: String,
        source: RenderError,
    },
    #[error("unresolved placeholder {placeholder} in {document} of resource '{resource}'")]
    UnresolvedPlaceholder {
        resource: String,
        document: String,
        placeholder: String,
    },
}
