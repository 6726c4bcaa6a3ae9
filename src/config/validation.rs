//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check addresses parse and names are unique
//! - Check the configured log level is recognized
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::ProxyConfig;
use crate::observability::logging::Level;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("admin.bind_address '{0}' is not a socket address")]
    InvalidBindAddress(String),

    #[error("observability.log_level '{0}' is not a known level")]
    InvalidLogLevel(String),

    #[error("{kind} name must not be empty")]
    EmptyName { kind: &'static str },

    #[error("duplicate {kind} name '{name}'")]
    DuplicateName { kind: &'static str, name: String },

    #[error("{owner}: address '{address}' is not a socket address")]
    InvalidAddress { owner: String, address: String },

    #[error("cluster '{0}': host weight must be positive")]
    ZeroWeight(String),

    #[error("admin.max_request_body_bytes must be positive")]
    ZeroBodyLimit,
}

pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.admin.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidBindAddress(
            config.admin.bind_address.clone(),
        ));
    }

    if config.admin.max_request_body_bytes == 0 {
        errors.push(ValidationError::ZeroBodyLimit);
    }

    if Level::parse(&config.observability.log_level).is_none() {
        errors.push(ValidationError::InvalidLogLevel(
            config.observability.log_level.clone(),
        ));
    }

    let mut seen = HashSet::new();
    for cluster in &config.clusters {
        check_name(&mut errors, &mut seen, "cluster", &cluster.name);
        for host in &cluster.hosts {
            check_address(&mut errors, &format!("cluster '{}'", cluster.name), &host.address);
            if host.weight == 0 {
                errors.push(ValidationError::ZeroWeight(cluster.name.clone()));
            }
        }
    }

    let mut seen = HashSet::new();
    for listener in &config.listeners {
        check_name(&mut errors, &mut seen, "listener", &listener.name);
        check_address(&mut errors, &format!("listener '{}'", listener.name), &listener.address);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_name<'a>(
    errors: &mut Vec<ValidationError>,
    seen: &mut HashSet<&'a str>,
    kind: &'static str,
    name: &'a str,
) {
    if name.is_empty() {
        errors.push(ValidationError::EmptyName { kind });
    } else if !seen.insert(name) {
        errors.push(ValidationError::DuplicateName {
            kind,
            name: name.to_string(),
        });
    }
}

fn check_address(errors: &mut Vec<ValidationError>, owner: &str, address: &str) {
    if address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            owner: owner.to_string(),
            address: address.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{ClusterConfig, HostConfig, ListenerConfig};

    fn cluster(name: &str, address: &str, weight: u32) -> ClusterConfig {
        ClusterConfig {
            name: name.to_string(),
            hosts: vec![HostConfig {
                address: address.to_string(),
                weight,
            }],
            circuit_breakers: Default::default(),
        }
    }

    #[test]
    fn default_config_is_valid() {
        assert_eq!(validate_config(&ProxyConfig::default()), Ok(()));
    }

    #[test]
    fn collects_every_error() {
        let mut config = ProxyConfig::default();
        config.admin.bind_address = "nowhere".to_string();
        config.observability.log_level = "loud".to_string();
        config.admin.max_request_body_bytes = 0;
        config.clusters = vec![
            cluster("a", "10.0.0.1:80", 1),
            cluster("a", "bad", 0),
            cluster("", "10.0.0.2:80", 1),
        ];
        config.listeners = vec![ListenerConfig {
            name: "l".to_string(),
            address: "0.0.0.0".to_string(),
        }];

        let errors = validate_config(&config).unwrap_err();
        assert!(errors.contains(&ValidationError::InvalidBindAddress("nowhere".to_string())));
        assert!(errors.contains(&ValidationError::InvalidLogLevel("loud".to_string())));
        assert!(errors.contains(&ValidationError::ZeroBodyLimit));
        assert!(errors.contains(&ValidationError::DuplicateName {
            kind: "cluster",
            name: "a".to_string()
        }));
        assert!(errors.contains(&ValidationError::EmptyName { kind: "cluster" }));
        assert!(errors.contains(&ValidationError::ZeroWeight("a".to_string())));
        assert_eq!(
            errors
                .iter()
                .filter(|e| matches!(e, ValidationError::InvalidAddress { .. }))
                .count(),
            2
        );
    }

    #[test]
    fn warning_is_an_accepted_level() {
        let mut config = ProxyConfig::default();
        config.observability.log_level = "warning".to_string();
        assert!(validate_config(&config).is_ok());
    }
}
