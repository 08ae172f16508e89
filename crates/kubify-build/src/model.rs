use std::collections::BTreeMap;

use kubify_core::ResourceKind;

/// Label every generated object carries to select its pods.
pub const APP_LABEL: &str = "app.kubernetes.io/name";
/// Marks objects produced by this tool.
pub const MANAGED_BY_LABEL: &str = "app.kubernetes.io/managed-by";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkloadKind {
    Deployment,
    StatefulSet,
}

/// Everything needed to render one resource, fully resolved.
///
/// Every decision the documents depend on is taken while planning; the
/// `has_*` flags and option fields let rendering stay a straight mapping.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceModel {
    /// Manifest resource name
    pub resource: String,
    /// DNS-safe object name derived from the resource name
    pub name: String,
    pub kind: ResourceKind,
    pub namespace: Option<String>,
    pub labels: BTreeMap<String, String>,
    pub workload: WorkloadKind,
    pub replicas: u32,
    pub image: String,
    pub args: Vec<String>,
    pub ports: Vec<PortModel>,
    pub config_entries: BTreeMap<String, String>,
    pub secret_entries: BTreeMap<String, String>,
    pub volumes: Vec<VolumeModel>,
    pub external_services: Vec<ExternalServiceModel>,
    pub image_pull_secret: Option<String>,
    pub has_args: bool,
    pub has_ports: bool,
    pub has_config: bool,
    pub has_secrets: bool,
    pub has_volumes: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortModel {
    /// Binding name as a port name, unique within the resource
    pub name: String,
    /// Container port: the binding's effective target port
    pub port: u16,
    /// Port external services listen on: the declared binding port, else `port`
    pub exposed_port: u16,
    /// `TCP`, `UDP` or `SCTP`
    pub protocol: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeModel {
    /// Claim name
    pub name: String,
    /// Volume name as declared in the manifest
    pub source: String,
    pub mount_path: String,
    pub read_only: bool,
    pub size: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalServiceModel {
    /// Binding the service exposes
    pub binding: String,
    /// `<name>-<port name>-external`
    pub name: String,
    pub port: PortModel,
}

impl ResourceModel {
    pub fn config_map_name(&self) -> String {
        format!("{}-config", self.name)
    }

    pub fn secret_name(&self) -> String {
        format!("{}-secrets", self.name)
    }

    /// Labels used in selectors; a subset of `labels`.
    pub fn selector_labels(&self) -> BTreeMap<String, String> {
        BTreeMap::from([(APP_LABEL.to_owned(), self.name.clone())])
    }
}

const PORT_NAME_MAX: usize = 15;

/// Port name for `binding`, distinct from every name in `taken`.
///
/// Kubernetes port names are at most 15 characters and need at least one
/// letter. A name that clashes after shortening gets a `-2`, `-3`... suffix.
pub fn port_name(binding: &str, taken: &[PortModel]) -> String {
    let label = kubify_core::resolver::dns_label(binding);
    let base = if label.chars().any(|c| c.is_ascii_lowercase()) {
        shorten(&label, PORT_NAME_MAX)
    } else {
        shorten(&format!("port-{label}"), PORT_NAME_MAX)
    };

    let in_use = |name: &str| taken.iter().any(|port| port.name == name);
    if !in_use(&base) {
        return base;
    }
    let mut n = 2;
    loop {
        let suffix = format!("-{n}");
        let candidate = format!("{}{suffix}", shorten(&base, PORT_NAME_MAX - suffix.len()));
        if !in_use(&candidate) {
            return candidate;
        }
        n += 1;
    }
}

fn shorten(label: &str, max: usize) -> String {
    let short: String = label.chars().take(max).collect();
    short.trim_end_matches('-').to_owned()
}

pub fn port_protocol(protocol: &str) -> String {
    match protocol.to_ascii_lowercase().as_str() {
        "udp" => "UDP".to_owned(),
        "sctp" => "SCTP".to_owned(),
        _ => "TCP".to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn taken(names: &[&str]) -> Vec<PortModel> {
        names
            .iter()
            .map(|name| PortModel {
                name: (*name).to_owned(),
                port: 80,
                exposed_port: 80,
                protocol: "TCP".to_owned(),
            })
            .collect()
    }

    #[test]
    fn port_names_are_truncated() {
        assert_eq!(port_name("http", &[]), "http");
        assert_eq!(port_name("Management_Endpoint", &[]), "management-endp");
        assert_eq!(port_name("abcdefghijklmn-x", &[]), "abcdefghijklmn");
    }

    #[test]
    fn clashing_port_names_get_a_suffix() {
        let first = port_name("management-endpoint-a", &[]);
        assert_eq!(first, "management-endp");

        let second = port_name("management-endpoint-b", &taken(&[first.as_str()]));
        assert_eq!(second, "management-en-2");

        let third = port_name("management-endpoint-c", &taken(&[first.as_str(), second.as_str()]));
        assert_eq!(third, "management-en-3");
        assert!(third.len() <= 15);
    }

    #[test]
    fn port_names_always_contain_a_letter() {
        assert_eq!(port_name("8080", &[]), "port-8080");
        assert_eq!(port_name("_", &[]), "port");
        assert_eq!(port_name("-", &taken(&["port"])), "port-2");
    }

    #[test]
    fn protocols_are_uppercased() {
        assert_eq!(port_protocol("tcp"), "TCP");
        assert_eq!(port_protocol("UDP"), "UDP");
        assert_eq!(port_protocol("anything"), "TCP");
    }
}
