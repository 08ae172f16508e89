//! Typed Kubernetes objects emitted for a [`ResourceModel`].
//!
//! Only the fields kubify produces are modelled. Empty collections and
//! unset options are skipped so the rendered YAML stays minimal.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::model::{ExternalServiceModel, PortModel, ResourceModel, WorkloadKind};

const ACCESS_MODE: &str = "ReadWriteOnce";

/// One rendered file's worth of Kubernetes object.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Document {
    Deployment(Deployment),
    StatefulSet(StatefulSet),
    ConfigMap(ConfigMap),
    Secret(Secret),
    Service(Service),
}

impl Document {
    /// Template the renderer uses for this document.
    pub fn template(&self) -> &'static str {
        match self {
            Self::Deployment(_) => "deployment",
            Self::StatefulSet(_) => "statefulset",
            Self::ConfigMap(_) => "configmap",
            Self::Secret(_) => "secret",
            Self::Service(_) => "service",
        }
    }

    pub fn metadata(&self) -> &ObjectMeta {
        match self {
            Self::Deployment(d) => &d.metadata,
            Self::StatefulSet(s) => &s.metadata,
            Self::ConfigMap(c) => &c.metadata,
            Self::Secret(s) => &s.metadata,
            Self::Service(s) => &s.metadata,
        }
    }

    /// All documents for one resource, workload first.
    pub fn for_model(model: &ResourceModel) -> Vec<Document> {
        let mut documents = vec![workload(model)];
        if model.has_config {
            documents.push(Document::ConfigMap(ConfigMap::for_model(model)));
        }
        if model.has_secrets {
            documents.push(Document::Secret(Secret::for_model(model)));
        }
        if model.has_ports {
            documents.push(Document::Service(Service::cluster_ip(model)));
        } else if model.workload == WorkloadKind::StatefulSet {
            documents.push(Document::Service(Service::headless(model)));
        }
        documents.extend(
            model
                .external_services
                .iter()
                .map(|external| Document::Service(Service::load_balancer(model, external))),
        );
        documents
    }
}

fn workload(model: &ResourceModel) -> Document {
    match model.workload {
        WorkloadKind::Deployment => Document::Deployment(Deployment {
            api_version: "apps/v1",
            kind: "Deployment",
            metadata: ObjectMeta::for_model(model, model.name.clone()),
            spec: DeploymentSpec {
                replicas: model.replicas,
                selector: LabelSelector::for_model(model),
                template: PodTemplateSpec::for_model(model),
            },
        }),
        WorkloadKind::StatefulSet => Document::StatefulSet(StatefulSet {
            api_version: "apps/v1",
            kind: "StatefulSet",
            metadata: ObjectMeta::for_model(model, model.name.clone()),
            spec: StatefulSetSpec {
                service_name: model.name.clone(),
                replicas: model.replicas,
                selector: LabelSelector::for_model(model),
                template: PodTemplateSpec::for_model(model),
                volume_claim_templates: model
                    .volumes
                    .iter()
                    .map(|volume| PersistentVolumeClaim {
                        metadata: ClaimMeta {
                            name: volume.name.clone(),
                        },
                        spec: ClaimSpec {
                            access_modes: vec![ACCESS_MODE],
                            resources: ClaimResources {
                                requests: BTreeMap::from([("storage", volume.size.clone())]),
                            },
                        },
                    })
                    .collect(),
            },
        }),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ObjectMeta {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
}

impl ObjectMeta {
    fn for_model(model: &ResourceModel, name: String) -> Self {
        Self {
            name,
            namespace: model.namespace.clone(),
            labels: model.labels.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Deployment {
    pub api_version: &'static str,
    pub kind: &'static str,
    pub metadata: ObjectMeta,
    pub spec: DeploymentSpec,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeploymentSpec {
    pub replicas: u32,
    pub selector: LabelSelector,
    pub template: PodTemplateSpec,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatefulSet {
    pub api_version: &'static str,
    pub kind: &'static str,
    pub metadata: ObjectMeta,
    pub spec: StatefulSetSpec,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatefulSetSpec {
    pub service_name: String,
    pub replicas: u32,
    pub selector: LabelSelector,
    pub template: PodTemplateSpec,
    pub volume_claim_templates: Vec<PersistentVolumeClaim>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PersistentVolumeClaim {
    pub metadata: ClaimMeta,
    pub spec: ClaimSpec,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClaimMeta {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimSpec {
    pub access_modes: Vec<&'static str>,
    pub resources: ClaimResources,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClaimResources {
    pub requests: BTreeMap<&'static str, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelSelector {
    pub match_labels: BTreeMap<String, String>,
}

impl LabelSelector {
    fn for_model(model: &ResourceModel) -> Self {
        Self {
            match_labels: model.selector_labels(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PodTemplateSpec {
    pub metadata: PodMeta,
    pub spec: PodSpec,
}

impl PodTemplateSpec {
    fn for_model(model: &ResourceModel) -> Self {
        let env_from = [
            model.has_config.then(|| EnvFromSource {
                config_map_ref: Some(LocalObjectReference {
                    name: model.config_map_name(),
                }),
                secret_ref: None,
            }),
            model.has_secrets.then(|| EnvFromSource {
                config_map_ref: None,
                secret_ref: Some(LocalObjectReference {
                    name: model.secret_name(),
                }),
            }),
        ]
        .into_iter()
        .flatten()
        .collect();

        Self {
            metadata: PodMeta {
                labels: model.labels.clone(),
            },
            spec: PodSpec {
                containers: vec![Container {
                    name: model.name.clone(),
                    image: model.image.clone(),
                    image_pull_policy: "IfNotPresent",
                    args: model.args.clone(),
                    ports: model.ports.iter().map(ContainerPort::from).collect(),
                    env_from,
                    volume_mounts: model
                        .volumes
                        .iter()
                        .map(|volume| VolumeMount {
                            name: volume.name.clone(),
                            mount_path: volume.mount_path.clone(),
                            read_only: volume.read_only,
                        })
                        .collect(),
                }],
                image_pull_secrets: model
                    .image_pull_secret
                    .iter()
                    .map(|name| LocalObjectReference { name: name.clone() })
                    .collect(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PodMeta {
    pub labels: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PodSpec {
    pub containers: Vec<Container>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub image_pull_secrets: Vec<LocalObjectReference>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Container {
    pub name: String,
    pub image: String,
    pub image_pull_policy: &'static str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<ContainerPort>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub env_from: Vec<EnvFromSource>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub volume_mounts: Vec<VolumeMount>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerPort {
    pub name: String,
    pub container_port: u16,
    pub protocol: String,
}

impl From<&PortModel> for ContainerPort {
    fn from(port: &PortModel) -> Self {
        Self {
            name: port.name.clone(),
            container_port: port.port,
            protocol: port.protocol.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvFromSource {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_map_ref: Option<LocalObjectReference>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret_ref: Option<LocalObjectReference>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocalObjectReference {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeMount {
    pub name: String,
    pub mount_path: String,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub read_only: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigMap {
    pub api_version: &'static str,
    pub kind: &'static str,
    pub metadata: ObjectMeta,
    pub data: BTreeMap<String, String>,
}

impl ConfigMap {
    fn for_model(model: &ResourceModel) -> Self {
        Self {
            api_version: "v1",
            kind: "ConfigMap",
            metadata: ObjectMeta::for_model(model, model.config_map_name()),
            data: model.config_entries.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Secret {
    pub api_version: &'static str,
    pub kind: &'static str,
    pub metadata: ObjectMeta,
    #[serde(rename = "type")]
    pub secret_type: &'static str,
    pub string_data: BTreeMap<String, String>,
}

impl Secret {
    fn for_model(model: &ResourceModel) -> Self {
        Self {
            api_version: "v1",
            kind: "Secret",
            metadata: ObjectMeta::for_model(model, model.secret_name()),
            secret_type: "Opaque",
            string_data: model.secret_entries.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    pub api_version: &'static str,
    pub kind: &'static str,
    pub metadata: ObjectMeta,
    pub spec: ServiceSpec,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceSpec {
    #[serde(rename = "type")]
    pub service_type: &'static str,
    #[serde(rename = "clusterIP", skip_serializing_if = "Option::is_none")]
    pub cluster_ip: Option<&'static str>,
    pub selector: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<ServicePort>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServicePort {
    pub name: String,
    pub port: u16,
    pub target_port: u16,
    pub protocol: String,
}

impl ServicePort {
    fn internal(port: &PortModel) -> Self {
        Self {
            name: port.name.clone(),
            port: port.port,
            target_port: port.port,
            protocol: port.protocol.clone(),
        }
    }

    fn exposed(port: &PortModel) -> Self {
        Self {
            port: port.exposed_port,
            ..Self::internal(port)
        }
    }
}

impl Service {
    fn cluster_ip(model: &ResourceModel) -> Self {
        Self {
            api_version: "v1",
            kind: "Service",
            metadata: ObjectMeta::for_model(model, model.name.clone()),
            spec: ServiceSpec {
                service_type: "ClusterIP",
                cluster_ip: None,
                selector: model.selector_labels(),
                ports: model.ports.iter().map(ServicePort::internal).collect(),
            },
        }
    }

    /// Governing service for a StatefulSet without bindings.
    fn headless(model: &ResourceModel) -> Self {
        Self {
            api_version: "v1",
            kind: "Service",
            metadata: ObjectMeta::for_model(model, model.name.clone()),
            spec: ServiceSpec {
                service_type: "ClusterIP",
                cluster_ip: Some("None"),
                selector: model.selector_labels(),
                ports: Vec::new(),
            },
        }
    }

    fn load_balancer(model: &ResourceModel, external: &ExternalServiceModel) -> Self {
        Self {
            api_version: "v1",
            kind: "Service",
            metadata: ObjectMeta::for_model(model, external.name.clone()),
            spec: ServiceSpec {
                service_type: "LoadBalancer",
                cluster_ip: None,
                selector: model.selector_labels(),
                ports: vec![ServicePort::exposed(&external.port)],
            },
        }
    }
}
