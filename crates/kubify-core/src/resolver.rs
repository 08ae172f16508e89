//! Placeholder resolution.
//!
//! [`ExpressionResolver`] turns expression-bearing strings into literals.
//! Every lookup runs against an explicit resolution stack of in-progress
//! `(resource, path)` frames: re-entering a frame is a cycle. Results are
//! memoized per `(resource, path)` for the lifetime of the resolver, which
//! is one run.

use crate::expression::{self, MalformedExpression, Reference};
use crate::manifest::{Binding, Input, Manifest, Resource};
use crate::secrets::SecretStore;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Maps a binding to the host name other resources use to reach it.
///
/// The right answer depends on where the artifacts will run, so the
/// resolver never hard-codes one.
pub trait HostStrategy: Send + Sync {
    fn host(&self, resource: &str, binding: &str) -> String;
}

/// The resource name as a cluster-local service DNS label.
#[derive(Debug, Clone, Copy, Default)]
pub struct ServiceNameHost;

impl HostStrategy for ServiceNameHost {
    fn host(&self, resource: &str, _binding: &str) -> String {
        dns_label(resource)
    }
}

/// Everything reachable on the local loopback interface.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoopbackHost;

impl HostStrategy for LoopbackHost {
    fn host(&self, _resource: &str, _binding: &str) -> String {
        "localhost".to_owned()
    }
}

/// Fully qualified `<service>.<namespace>.svc.cluster.local`.
#[derive(Debug, Clone)]
pub struct ClusterDnsHost {
    pub namespace: String,
}

impl HostStrategy for ClusterDnsHost {
    fn host(&self, resource: &str, _binding: &str) -> String {
        format!(
            "{}.{}.svc.cluster.local",
            dns_label(resource),
            self.namespace
        )
    }
}

/// Selects a [`HostStrategy`] from configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HostStrategyKind {
    #[default]
    Service,
    Loopback,
    ClusterDns,
}

impl HostStrategyKind {
    pub fn strategy(self, namespace: Option<&str>) -> Box<dyn HostStrategy> {
        match self {
            Self::Service => Box::new(ServiceNameHost),
            Self::Loopback => Box::new(LoopbackHost),
            Self::ClusterDns => Box::new(ClusterDnsHost {
                // arch-lint: allow(no-silent-result-drop) reason="no namespace configured means the default namespace"
                namespace: namespace.unwrap_or("default").to_owned(),
            }),
        }
    }
}

impl FromStr for HostStrategyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "service" => Ok(Self::Service),
            "loopback" => Ok(Self::Loopback),
            "cluster-dns" => Ok(Self::ClusterDns),
            other => Err(format!(
                "unknown host strategy '{other}' (expected service, loopback, or cluster-dns)"
            )),
        }
    }
}

impl fmt::Display for HostStrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Service => "service",
            Self::Loopback => "loopback",
            Self::ClusterDns => "cluster-dns",
        })
    }
}

/// Lowercase RFC 1123 label: `[a-z0-9-]`, at most 63 characters.
pub fn dns_label(name: &str) -> String {
    let label: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '-'
            }
        })
        .collect();
    let trimmed = label.trim_matches('-');
    trimmed
        .char_indices()
        .take_while(|(i, _)| *i < 63)
        .map(|(_, c)| c)
        .collect::<String>()
        .trim_end_matches('-')
        .to_owned()
}

/// A resolved literal. `secret` is set when any secret input contributed
/// to the value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    pub value: String,
    pub secret: bool,
}

impl Resolved {
    fn literal(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            secret: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct Frame {
    resource: String,
    path: String,
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.resource, self.path)
    }
}

/// In-progress lookups of one top-level resolution.
#[derive(Debug, Default)]
struct ResolutionStack {
    frames: Vec<Frame>,
}

impl ResolutionStack {
    fn push(&mut self, frame: Frame) -> Result<(), ResolveError> {
        if let Some(start) = self.frames.iter().position(|f| *f == frame) {
            let mut chain: Vec<String> = self.frames[start..].iter().map(Frame::to_string).collect();
            chain.push(frame.to_string());
            return Err(ResolveError::CyclicReference { chain });
        }
        self.frames.push(frame);
        Ok(())
    }

    fn pop(&mut self) {
        self.frames.pop();
    }
}

pub struct ExpressionResolver<'a> {
    manifest: &'a Manifest,
    secrets: &'a SecretStore,
    host: Box<dyn HostStrategy>,
    parameters: HashMap<String, String>,
    memo: DashMap<(String, String), Resolved>,
}

impl<'a> ExpressionResolver<'a> {
    pub fn new(manifest: &'a Manifest, secrets: &'a SecretStore) -> Self {
        Self {
            manifest,
            secrets,
            host: Box::new(ServiceNameHost),
            parameters: HashMap::new(),
            memo: DashMap::new(),
        }
    }

    pub fn with_host_strategy(mut self, host: Box<dyn HostStrategy>) -> Self {
        self.host = host;
        self
    }

    /// Externally supplied input values, keyed by `<parameter>` or
    /// `<parameter>.<input>`.
    pub fn with_parameters(mut self, parameters: HashMap<String, String>) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn manifest(&self) -> &'a Manifest {
        self.manifest
    }

    /// Resolve every placeholder in `text`.
    pub fn resolve_text(&self, text: &str) -> Result<Resolved, ResolveError> {
        let mut stack = ResolutionStack::default();
        self.resolve_in(text, &mut stack)
    }

    /// Resolve a single reference such as `db.bindings.tcp.port`.
    pub fn resolve_reference(&self, reference: &Reference) -> Result<Resolved, ResolveError> {
        let mut stack = ResolutionStack::default();
        self.lookup(reference, &mut stack)
    }

    /// Resolve `path` (dotted) on `resource`.
    pub fn resolve_path(&self, resource: &str, path: &str) -> Result<Resolved, ResolveError> {
        let reference = Reference::parse(&format!("{resource}.{path}"))?;
        self.resolve_reference(&reference)
    }

    fn resolve_in(&self, text: &str, stack: &mut ResolutionStack) -> Result<Resolved, ResolveError> {
        let tokens = expression::scan(text)?;
        if tokens.is_empty() {
            return Ok(Resolved::literal(text));
        }

        let mut value = String::with_capacity(text.len());
        let mut secret = false;
        let mut last = 0;
        for token in &tokens {
            value.push_str(&text[last..token.start]);
            let resolved = self.lookup(&token.reference, stack)?;
            secret |= resolved.secret;
            value.push_str(&resolved.value);
            last = token.end;
        }
        value.push_str(&text[last..]);

        Ok(Resolved { value, secret })
    }

    fn lookup(
        &self,
        reference: &Reference,
        stack: &mut ResolutionStack,
    ) -> Result<Resolved, ResolveError> {
        let key = (reference.resource.clone(), reference.path_str());
        if let Some(hit) = self.memo.get(&key) {
            return Ok(hit.value().clone());
        }

        let resource = self.manifest.get(&reference.resource).ok_or_else(|| {
            ResolveError::UnknownResourceReference {
                resource: reference.resource.clone(),
                reference: reference.to_string(),
            }
        })?;

        stack.push(Frame {
            resource: key.0.clone(),
            path: key.1.clone(),
        })?;
        let result = self.navigate(resource, reference, stack);
        stack.pop();
        let resolved = result?;

        tracing::trace!(reference = %reference, secret = resolved.secret, "resolved");
        let entry = self.memo.entry(key).or_insert(resolved);
        Ok(entry.value().clone())
    }

    fn navigate(
        &self,
        resource: &Resource,
        reference: &Reference,
        stack: &mut ResolutionStack,
    ) -> Result<Resolved, ResolveError> {
        let unknown = || ResolveError::UnknownPath {
            resource: resource.name.clone(),
            path: reference.path_str(),
        };
        let path: Vec<&str> = reference.path.iter().map(String::as_str).collect();

        match path.as_slice() {
            ["bindings", binding, field] => {
                let spec = resource.bindings().get(*binding).ok_or_else(unknown)?;
                self.binding_field(resource, binding, spec, field)
                    .ok_or_else(unknown)
            }
            ["connectionString"] => {
                let text = resource.connection_string().ok_or_else(unknown)?;
                self.resolve_in(text, stack)
            }
            ["value"] => {
                let text = resource
                    .value()
                    .or_else(|| resource.connection_string())
                    .ok_or_else(unknown)?;
                self.resolve_in(text, stack)
            }
            ["inputs", input] | ["inputs", input, "value"] => {
                let spec = resource
                    .inputs()
                    .and_then(|inputs| inputs.get(*input))
                    .ok_or_else(unknown)?;
                self.input_value(resource, input, spec, stack)
            }
            _ => Err(unknown()),
        }
    }

    fn binding_field(
        &self,
        resource: &Resource,
        name: &str,
        binding: &Binding,
        field: &str,
    ) -> Option<Resolved> {
        let value = match field {
            "host" => self.host.host(&resource.name, name),
            "port" | "targetPort" => binding.effective_port()?.to_string(),
            "scheme" => binding.scheme.clone(),
            "protocol" => binding.protocol.clone(),
            "transport" => binding.transport().to_owned(),
            "url" => format!(
                "{}://{}:{}",
                binding.scheme,
                self.host.host(&resource.name, name),
                binding.effective_port()?
            ),
            _ => return None,
        };
        Some(Resolved::literal(value))
    }

    fn input_value(
        &self,
        resource: &Resource,
        name: &str,
        input: &Input,
        stack: &mut ResolutionStack,
    ) -> Result<Resolved, ResolveError> {
        let qualified = format!("{}.{name}", resource.name);
        let supplied = self.parameters.get(&qualified).or_else(|| {
            if name == "value" {
                self.parameters.get(&resource.name)
            } else {
                None
            }
        });
        if let Some(value) = supplied {
            return Ok(Resolved {
                value: value.clone(),
                secret: input.secret,
            });
        }

        let default = input.default.as_ref();
        if let Some(text) = default.and_then(|d| d.value.as_deref()) {
            let resolved = self.resolve_in(text, stack)?;
            return Ok(Resolved {
                value: resolved.value,
                secret: resolved.secret || input.secret,
            });
        }
        if let Some(generate) = default.and_then(|d| d.generate.as_ref()) {
            let key = if name == "value" {
                resource.name.clone()
            } else {
                qualified
            };
            return Ok(Resolved {
                value: self.secrets.get_or_generate(&key, generate.min_length()),
                secret: input.secret,
            });
        }

        Err(ResolveError::MissingParameterValue {
            parameter: resource.name.clone(),
            input: name.to_owned(),
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("unknown resource '{resource}' referenced by {reference}")]
    UnknownResourceReference { resource: String, reference: String },

    #[error("resource '{resource}' has no field path '{path}'")]
    UnknownPath { resource: String, path: String },

    #[error("cyclic reference: {}", chain.join(" -> "))]
    CyclicReference { chain: Vec<String> },

    #[error(transparent)]
    MalformedExpression(#[from] MalformedExpression),

    #[error(
        "parameter '{parameter}' input '{input}' has no supplied value, default, or generate policy"
    )]
    MissingParameterValue { parameter: String, input: String },
}
