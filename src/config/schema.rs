//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the admin
//! server and the collaborators it introspects. All types derive Serde traits
//! for deserialization from TOML.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Admin listener settings.
    pub admin: AdminConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Runtime layers.
    pub runtime: RuntimeConfig,

    /// Upstream clusters shown on `/clusters`.
    pub clusters: Vec<ClusterConfig>,

    /// Listeners shown on `/listeners`.
    pub listeners: Vec<ListenerConfig>,

    /// Certificates shown on `/certs`.
    pub certificates: Vec<CertificateConfig>,
}

/// Admin listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Bind address (e.g., "127.0.0.1:9901").
    pub bind_address: String,

    /// Access log destination. `/dev/null` disables it.
    pub access_log_path: String,

    /// Output path handed to the CPU profiler.
    pub profile_path: String,

    /// If set, the bound address is written here after startup.
    pub address_path: Option<String>,

    /// Largest request body the admin server buffers.
    pub max_request_body_bytes: usize,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:9901".to_string(),
            access_log_path: "/dev/null".to_string(),
            profile_path: "/var/log/proxy/proxy.prof".to_string(),
            address_path: None,
            max_request_body_bytes: 1024 * 1024,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Initial level for every logger.
    pub log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// Runtime layer configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Static layer values.
    pub values: BTreeMap<String, String>,

    /// TOML file holding the override layer.
    pub override_path: Option<String>,

    /// Reload the override file when it changes.
    pub watch: bool,
}

/// An upstream cluster.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ClusterConfig {
    pub name: String,

    #[serde(default)]
    pub hosts: Vec<HostConfig>,

    #[serde(default)]
    pub circuit_breakers: CircuitBreakerConfig,
}

/// A host within a cluster.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HostConfig {
    /// Host address (e.g., "10.0.0.1:8080").
    pub address: String,

    #[serde(default = "default_weight")]
    pub weight: u32,
}

fn default_weight() -> u32 {
    1
}

/// Per-cluster circuit breaker thresholds.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    pub max_connections: u64,
    pub max_pending_requests: u64,
    pub max_requests: u64,
    pub max_retries: u64,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            max_connections: 1024,
            max_pending_requests: 1024,
            max_requests: 1024,
            max_retries: 3,
        }
    }
}

/// A listener.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ListenerConfig {
    pub name: String,
    pub address: String,
}

/// A certificate chain and optional CA.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CertificateConfig {
    pub cert_chain: String,

    #[serde(default)]
    pub ca_cert: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let config: ProxyConfig = toml::from_str("").unwrap();
        assert_eq!(config.admin.bind_address, "127.0.0.1:9901");
        assert_eq!(config.admin.access_log_path, "/dev/null");
        assert_eq!(config.observability.log_level, "info");
        assert!(config.clusters.is_empty());
        assert!(!config.runtime.watch);
    }

    #[test]
    fn full_document_parses() {
        let doc = r#"
            [admin]
            bind_address = "0.0.0.0:9000"
            address_path = "/tmp/admin.addr"

            [runtime]
            override_path = "/etc/proxy/runtime.toml"
            watch = true
            [runtime.values]
            "upstream.healthy_panic_threshold" = "50"

            [[clusters]]
            name = "backend"
            [[clusters.hosts]]
            address = "10.0.0.1:80"
            weight = 3
            [[clusters.hosts]]
            address = "10.0.0.2:80"

            [[listeners]]
            name = "ingress"
            address = "0.0.0.0:8080"

            [[certificates]]
            cert_chain = "/etc/proxy/cert.pem"
        "#;
        let config: ProxyConfig = toml::from_str(doc).unwrap();
        assert_eq!(config.admin.bind_address, "0.0.0.0:9000");
        assert_eq!(config.admin.address_path.as_deref(), Some("/tmp/admin.addr"));
        assert!(config.runtime.watch);
        assert_eq!(
            config.runtime.values.get("upstream.healthy_panic_threshold").map(String::as_str),
            Some("50")
        );
        assert_eq!(config.clusters[0].hosts.len(), 2);
        assert_eq!(config.clusters[0].hosts[0].weight, 3);
        assert_eq!(config.clusters[0].hosts[1].weight, 1);
        assert_eq!(config.clusters[0].circuit_breakers.max_retries, 3);
        assert_eq!(config.listeners[0].name, "ingress");
        assert!(config.certificates[0].ca_cert.is_none());
    }
}
