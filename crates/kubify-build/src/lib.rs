//! Kubernetes document generation for kubify.
//!
//! # Generate pipeline
//!
//! ```text
//! kubify generate
//!   1. Parse      ── Manifest::load()
//!   2. Order      ── DependencyGraph::resolve_order()
//!   3. Build      ── ContainerBuildCoordinator (with --build)
//!   4. Plan       ── ArtifactGenerator::plan()   → ResourceModel per workload
//!   5. Render     ── ArtifactGenerator::render() → ArtifactBundle per workload
//!   6. Write      ── output::write_bundles()     → <output>/<resource>/*.yaml
//! ```
//!
//! # Documents per workload
//!
//! - `deployment.yaml`, or `statefulset.yaml` when the resource declares volumes
//! - `configmap.yaml` for plain environment entries
//! - `secret.yaml` for entries derived from secret parameters
//! - `service.yaml` when the resource has bindings
//! - `service-<binding>-external.yaml` per external binding
//!
//! Rendering never sees an expression: every value in a [`ResourceModel`]
//! is already resolved, and rendered text is checked for leftover
//! placeholders before it is returned.

pub mod documents;
pub mod generator;
pub mod model;
pub mod output;
pub mod render;

pub use documents::Document;
pub use generator::{ArtifactBundle, ArtifactGenerator, GenerateError, GeneratorOptions, RenderedDocument};
pub use model::{ResourceModel, WorkloadKind};
pub use output::{OutputError, write_bundles};
pub use render::{RenderError, TemplateRenderer, YamlRenderer};
