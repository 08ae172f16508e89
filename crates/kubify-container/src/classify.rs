//! Failure signatures of external build tools.

/// How a failed build should be handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// Eligible for one retry with the duplicate-output override.
    Retryable,
    Fatal,
}

/// Publish refused to overwrite duplicate output files.
const DUPLICATE_OUTPUT_SIGNATURES: &[&str] = &["netsdk1152", "multiple publish output files"];

/// Push failed before the registry answered.
const UNREACHABLE_REGISTRY_SIGNATURES: &[&str] = &[
    "no such host",
    "connection refused",
    "i/o timeout",
    "server misbehaving",
    "tls handshake timeout",
    "network is unreachable",
    "could not resolve host",
];

/// Classify a failed build from its combined output.
pub fn classify(output: &str) -> FailureClass {
    if contains_any(output, DUPLICATE_OUTPUT_SIGNATURES) {
        FailureClass::Retryable
    } else {
        FailureClass::Fatal
    }
}

/// Whether a failed push reports that the registry could not be reached.
pub fn is_registry_unreachable(output: &str) -> bool {
    contains_any(output, UNREACHABLE_REGISTRY_SIGNATURES)
}

fn contains_any(output: &str, signatures: &[&str]) -> bool {
    let lower = output.to_ascii_lowercase();
    signatures.iter().any(|sig| lower.contains(sig))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_publish_output_is_retryable() {
        let output = "error NETSDK1152: Found multiple publish output files with the same relative path: appsettings.json";
        assert_eq!(classify(output), FailureClass::Retryable);
        assert_eq!(
            classify("Found Multiple Publish Output Files with the same path"),
            FailureClass::Retryable
        );
    }

    #[test]
    fn other_failures_are_fatal() {
        assert_eq!(classify("error CS1002: ; expected"), FailureClass::Fatal);
        assert_eq!(classify(""), FailureClass::Fatal);
    }

    #[test]
    fn unreachable_registry_signatures() {
        assert!(is_registry_unreachable(
            "Get \"https://registry.local/v2/\": dial tcp: lookup registry.local: no such host"
        ));
        assert!(is_registry_unreachable("dial tcp 10.0.0.1:5000: connect: connection refused"));
        assert!(!is_registry_unreachable("denied: requested access to the resource is denied"));
    }
}
