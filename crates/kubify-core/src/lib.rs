//! Core types and configuration for kubify.
//!
//! This crate defines the `kubify.toml` schema ([`KubifyConfig`]), the
//! application manifest model ([`Manifest`]), dependency ordering
//! ([`DependencyGraph`]), placeholder resolution ([`ExpressionResolver`]),
//! and shared error types.

pub mod config;
pub mod error;
pub mod expression;
pub mod graph;
pub mod manifest;
pub mod resolver;
pub mod secrets;

pub use config::{
    BuildConfig, KubifyConfig, ManifestConfig, OutputConfig, RegistryConfig, ResolveConfig,
    SecretsConfig,
};
pub use error::{Error, Result};
pub use expression::{MalformedExpression, Reference};
pub use graph::{DependencyGraph, GraphError, resolution_order};
pub use manifest::{
    Binding, Input, Manifest, ParseError, Resource, ResourceKind, ResourceSpec, Volume,
};
pub use resolver::{
    ClusterDnsHost, ExpressionResolver, HostStrategy, HostStrategyKind, LoopbackHost,
    ResolveError, Resolved, ServiceNameHost,
};
pub use secrets::{SecretOrigin, SecretStore};
