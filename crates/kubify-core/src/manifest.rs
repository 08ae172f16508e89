//! Application manifest model and parser.
//!
//! The manifest is a JSON document of the shape
//!
//! ```json
//! { "resources": { "db": { "type": "container.v0", "image": "postgres:16" } } }
//! ```
//!
//! Each resource is dispatched on its `type` discriminator into the field set
//! of its variant ([`ResourceSpec`]). Manifest order is preserved; it breaks
//! ties when resources are ordered by dependency.

use serde::de::{DeserializeOwned, MapAccess, Visitor};
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

/// Capacity requested for a volume that declares no size.
pub const DEFAULT_VOLUME_SIZE: &str = "1Gi";

/// Length of a generated parameter value when `minLength` is omitted.
pub const DEFAULT_GENERATED_LENGTH: usize = 22;

/// A parsed manifest: resources in manifest order, names unique.
#[derive(Debug, Clone, PartialEq)]
pub struct Manifest {
    resources: Vec<Resource>,
}

/// A named resource and its variant-specific fields.
#[derive(Debug, Clone, PartialEq)]
pub struct Resource {
    pub name: String,
    pub spec: ResourceSpec,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ResourceSpec {
    Container(ContainerSpec),
    Project(ProjectSpec),
    Dockerfile(DockerfileSpec),
    Value(ValueSpec),
    Parameter(ParameterSpec),
}

/// The `type` discriminator of a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Container,
    Project,
    Dockerfile,
    Value,
    Parameter,
}

impl ResourceKind {
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "container.v0" => Some(Self::Container),
            "project.v0" => Some(Self::Project),
            "dockerfile.v0" => Some(Self::Dockerfile),
            "value.v0" => Some(Self::Value),
            "parameter.v0" => Some(Self::Parameter),
            _ => None,
        }
    }

    pub fn tag(self) -> &'static str {
        match self {
            Self::Container => "container.v0",
            Self::Project => "project.v0",
            Self::Dockerfile => "dockerfile.v0",
            Self::Value => "value.v0",
            Self::Parameter => "parameter.v0",
        }
    }

    /// Whether kubify builds an image for this kind.
    pub fn is_buildable(self) -> bool {
        matches!(self, Self::Project | Self::Dockerfile)
    }

    /// Whether this kind renders a workload.
    pub fn is_workload(self) -> bool {
        matches!(self, Self::Container | Self::Project | Self::Dockerfile)
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerSpec {
    pub image: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    #[serde(default)]
    pub bindings: BTreeMap<String, Binding>,
    #[serde(default)]
    pub volumes: Vec<Volume>,
    pub connection_string: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSpec {
    /// Path to the project file to publish.
    pub path: String,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    #[serde(default)]
    pub bindings: BTreeMap<String, Binding>,
    pub connection_string: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DockerfileSpec {
    /// Path to the Dockerfile.
    pub path: String,
    /// Build context; defaults to the directory containing the Dockerfile.
    pub context: Option<String>,
    #[serde(default)]
    pub build_args: BTreeMap<String, String>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    #[serde(default)]
    pub bindings: BTreeMap<String, Binding>,
    #[serde(default)]
    pub volumes: Vec<Volume>,
    pub connection_string: Option<String>,
}

impl DockerfileSpec {
    pub fn context(&self) -> String {
        if let Some(context) = &self.context {
            return context.clone();
        }
        match Path::new(&self.path).parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_string_lossy().into_owned(),
            _ => ".".to_owned(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValueSpec {
    pub value: Option<String>,
    pub connection_string: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParameterSpec {
    pub value: String,
    #[serde(default)]
    pub inputs: BTreeMap<String, Input>,
    pub connection_string: Option<String>,
}

/// A named network endpoint exposed by a resource.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Binding {
    pub scheme: String,
    #[serde(default = "default_protocol")]
    pub protocol: String,
    pub transport: Option<String>,
    pub target_port: Option<u16>,
    pub port: Option<u16>,
    #[serde(default)]
    pub external: bool,
}

impl Binding {
    pub fn transport(&self) -> &str {
        // arch-lint: allow(no-silent-result-drop) reason="transport defaults to the scheme when the manifest omits it"
        self.transport.as_deref().unwrap_or(&self.scheme)
    }

    /// Port the workload listens on: `targetPort`, then `port`, then the
    /// scheme default for http/https.
    pub fn effective_port(&self) -> Option<u16> {
        self.target_port
            .or(self.port)
            .or_else(|| match self.scheme.as_str() {
                "http" => Some(8080),
                "https" => Some(8443),
                _ => None,
            })
    }
}

fn default_protocol() -> String {
    "tcp".to_owned()
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Volume {
    pub name: String,
    pub target: String,
    #[serde(default)]
    pub read_only: bool,
    pub size: Option<String>,
}

impl Volume {
    pub fn claim_size(&self) -> &str {
        // arch-lint: allow(no-silent-result-drop) reason="volumes without a size get the default claim size"
        self.size.as_deref().unwrap_or(DEFAULT_VOLUME_SIZE)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Input {
    #[serde(rename = "type")]
    pub input_type: String,
    #[serde(default)]
    pub secret: bool,
    pub default: Option<InputDefault>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct InputDefault {
    pub value: Option<String>,
    pub generate: Option<GenerateDefault>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateDefault {
    pub min_length: Option<usize>,
}

impl GenerateDefault {
    pub fn min_length(&self) -> usize {
        // arch-lint: allow(no-silent-result-drop) reason="minLength is optional in generate defaults"
        self.min_length.unwrap_or(DEFAULT_GENERATED_LENGTH)
    }
}

/// An expression-bearing string field of a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldText<'a> {
    pub field: &'static str,
    pub key: Option<&'a str>,
    pub text: &'a str,
}

impl fmt::Display for FieldText<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.key {
            Some(key) => write!(f, "{}.{key}", self.field),
            None => f.write_str(self.field),
        }
    }
}

static NO_BINDINGS: BTreeMap<String, Binding> = BTreeMap::new();
static NO_ENV: BTreeMap<String, String> = BTreeMap::new();

impl Resource {
    pub fn kind(&self) -> ResourceKind {
        match &self.spec {
            ResourceSpec::Container(_) => ResourceKind::Container,
            ResourceSpec::Project(_) => ResourceKind::Project,
            ResourceSpec::Dockerfile(_) => ResourceKind::Dockerfile,
            ResourceSpec::Value(_) => ResourceKind::Value,
            ResourceSpec::Parameter(_) => ResourceKind::Parameter,
        }
    }

    pub fn env(&self) -> &BTreeMap<String, String> {
        match &self.spec {
            ResourceSpec::Container(c) => &c.env,
            ResourceSpec::Project(p) => &p.env,
            ResourceSpec::Dockerfile(d) => &d.env,
            ResourceSpec::Value(_) | ResourceSpec::Parameter(_) => &NO_ENV,
        }
    }

    pub fn bindings(&self) -> &BTreeMap<String, Binding> {
        match &self.spec {
            ResourceSpec::Container(c) => &c.bindings,
            ResourceSpec::Project(p) => &p.bindings,
            ResourceSpec::Dockerfile(d) => &d.bindings,
            ResourceSpec::Value(_) | ResourceSpec::Parameter(_) => &NO_BINDINGS,
        }
    }

    pub fn volumes(&self) -> &[Volume] {
        match &self.spec {
            ResourceSpec::Container(c) => &c.volumes,
            ResourceSpec::Dockerfile(d) => &d.volumes,
            _ => &[],
        }
    }

    pub fn connection_string(&self) -> Option<&str> {
        match &self.spec {
            ResourceSpec::Container(c) => c.connection_string.as_deref(),
            ResourceSpec::Project(p) => p.connection_string.as_deref(),
            ResourceSpec::Dockerfile(d) => d.connection_string.as_deref(),
            ResourceSpec::Value(v) => v.connection_string.as_deref(),
            ResourceSpec::Parameter(p) => p.connection_string.as_deref(),
        }
    }

    /// The `value` field of Value/Parameter resources.
    pub fn value(&self) -> Option<&str> {
        match &self.spec {
            ResourceSpec::Value(v) => v.value.as_deref(),
            ResourceSpec::Parameter(p) => Some(&p.value),
            _ => None,
        }
    }

    pub fn inputs(&self) -> Option<&BTreeMap<String, Input>> {
        match &self.spec {
            ResourceSpec::Parameter(p) => Some(&p.inputs),
            _ => None,
        }
    }

    /// Every string field that may carry placeholder expressions.
    pub fn expressions(&self) -> Vec<FieldText<'_>> {
        let mut fields: Vec<FieldText<'_>> = self
            .env()
            .iter()
            .map(|(key, text)| FieldText {
                field: "env",
                key: Some(key),
                text,
            })
            .collect();

        match &self.spec {
            ResourceSpec::Container(c) => {
                fields.extend(c.args.iter().map(|text| FieldText {
                    field: "args",
                    key: None,
                    text,
                }));
            }
            ResourceSpec::Dockerfile(d) => {
                fields.extend(d.build_args.iter().map(|(key, text)| FieldText {
                    field: "buildArgs",
                    key: Some(key),
                    text,
                }));
            }
            ResourceSpec::Parameter(p) => {
                for (key, input) in &p.inputs {
                    if let Some(text) = input.default.as_ref().and_then(|d| d.value.as_deref()) {
                        fields.push(FieldText {
                            field: "inputs",
                            key: Some(key),
                            text,
                        });
                    }
                }
            }
            ResourceSpec::Project(_) | ResourceSpec::Value(_) => {}
        }

        if let Some(text) = self.value() {
            fields.push(FieldText {
                field: "value",
                key: None,
                text,
            });
        }
        if let Some(text) = self.connection_string() {
            fields.push(FieldText {
                field: "connectionString",
                key: None,
                text,
            });
        }
        fields
    }

    fn from_value(name: String, value: Value) -> Result<Self, ParseError> {
        validate_name(&name)?;

        let tag = value
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| ParseError::MissingType {
                resource: name.clone(),
            })?;
        let kind = ResourceKind::from_tag(tag).ok_or_else(|| ParseError::UnknownType {
            resource: name.clone(),
            type_tag: tag.to_owned(),
        })?;

        let spec = match kind {
            ResourceKind::Container => ResourceSpec::Container(decode(&name, value)?),
            ResourceKind::Project => ResourceSpec::Project(decode(&name, value)?),
            ResourceKind::Dockerfile => ResourceSpec::Dockerfile(decode(&name, value)?),
            ResourceKind::Parameter => ResourceSpec::Parameter(decode(&name, value)?),
            ResourceKind::Value => {
                let spec: ValueSpec = decode(&name, value)?;
                if spec.value.is_none() && spec.connection_string.is_none() {
                    return Err(ParseError::MissingField {
                        resource: name,
                        field: "value",
                    });
                }
                ResourceSpec::Value(spec)
            }
        };

        Ok(Self { name, spec })
    }
}

fn decode<T: DeserializeOwned>(name: &str, value: Value) -> Result<T, ParseError> {
    serde_json::from_value(value).map_err(|source| ParseError::InvalidResource {
        resource: name.to_owned(),
        source,
    })
}

fn validate_name(name: &str) -> Result<(), ParseError> {
    let reason = if name.is_empty() {
        "name is empty"
    } else if name.contains(['.', '{', '}']) {
        "name must not contain '.', '{' or '}'"
    } else if name.chars().any(char::is_whitespace) {
        "name must not contain whitespace"
    } else {
        return Ok(());
    };
    Err(ParseError::InvalidName {
        name: name.to_owned(),
        reason,
    })
}

impl Manifest {
    /// Parse manifest JSON text.
    pub fn parse(text: &str) -> Result<Self, ParseError> {
        let raw: RawManifest =
            serde_json::from_str(text).map_err(|source| ParseError::Syntax { source })?;
        let entries = raw.resources.ok_or(ParseError::MissingResources)?;

        let resources = entries
            .0
            .into_iter()
            .map(|(name, value)| Resource::from_value(name, value))
            .collect::<Result<Vec<_>, _>>()?;

        let manifest = Self::from_resources(resources)?;
        tracing::debug!(resources = manifest.resources.len(), "parsed manifest");
        Ok(manifest)
    }

    /// Read and parse a manifest file.
    pub fn load(path: &Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| crate::Error::ManifestRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::parse(&content).map_err(|e| crate::Error::ManifestParse {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Build a manifest from resources, rejecting duplicate names.
    pub fn from_resources(resources: Vec<Resource>) -> Result<Self, ParseError> {
        for (i, resource) in resources.iter().enumerate() {
            if resources[..i].iter().any(|r| r.name == resource.name) {
                return Err(ParseError::DuplicateResource(resource.name.clone()));
            }
        }
        Ok(Self { resources })
    }

    pub fn resources(&self) -> &[Resource] {
        &self.resources
    }

    pub fn get(&self, name: &str) -> Option<&Resource> {
        self.resources.iter().find(|r| r.name == name)
    }

    /// Index of the resource in manifest order.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.resources.iter().position(|r| r.name == name)
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

#[derive(Deserialize)]
struct RawManifest {
    resources: Option<ResourceEntries>,
}

/// `resources` entries in document order, duplicates kept for validation.
struct ResourceEntries(Vec<(String, Value)>);

impl<'de> Deserialize<'de> for ResourceEntries {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct EntriesVisitor;

        impl<'de> Visitor<'de> for EntriesVisitor {
            type Value = ResourceEntries;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of resource name to resource definition")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
                let mut entries = Vec::new();
                while let Some(entry) = map.next_entry::<String, Value>()? {
                    entries.push(entry);
                }
                Ok(ResourceEntries(entries))
            }
        }

        deserializer.deserialize_map(EntriesVisitor)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("manifest is not well-formed JSON: {source}")]
    Syntax { source: serde_json::Error },

    #[error("manifest has no `resources` map")]
    MissingResources,

    #[error("resource '{0}' is declared more than once")]
    DuplicateResource(String),

    #[error("invalid resource name {name:?}: {reason}")]
    InvalidName { name: String, reason: &'static str },

    #[error("resource '{resource}' has no `type`")]
    MissingType { resource: String },

    #[error("resource '{resource}' has unrecognized type '{type_tag}'")]
    UnknownType { resource: String, type_tag: String },

    #[error("resource '{resource}' is missing required field `{field}`")]
    MissingField {
        resource: String,
        field: &'static str,
    },

    #[error("resource '{resource}' is invalid: {source}")]
    InvalidResource {
        resource: String,
        source: serde_json::Error,
    },
}
