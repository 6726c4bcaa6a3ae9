//! Upstream cluster introspection for `/clusters`.
//!
//! Output is one `cluster::…::value` line per fact:
//! ```text
//! backend::default_priority::max_connections::1024
//! backend::added_via_api::false
//! backend::10.0.0.1:80::cx_active::0
//! backend::10.0.0.1:80::health_flags::healthy
//! backend::10.0.0.1:80::weight::1
//! ```

use std::sync::Arc;

use crate::config::schema::{CircuitBreakerConfig, ClusterConfig};
use crate::stats::StatsStore;

/// Per-host stats reported on `/clusters`.
pub const HOST_STATS: &[&str] = &[
    "cx_active",
    "cx_connect_fail",
    "cx_total",
    "rq_active",
    "rq_error",
    "rq_success",
    "rq_total",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostSummary {
    pub address: String,
    pub weight: u32,
    pub healthy: bool,
    pub stats: Vec<(String, u64)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterSummary {
    pub name: String,
    pub added_via_api: bool,
    pub circuit_breakers: CircuitBreakerConfig,
    pub hosts: Vec<HostSummary>,
}

pub trait ClusterSource: Send + Sync {
    /// Clusters ordered by name.
    fn clusters(&self) -> Vec<ClusterSummary>;
}

/// Clusters from configuration. Host stats are read from the stats store
/// under `cluster.<name>.host.<address>.<stat>`; a host is unhealthy while the
/// gauge `cluster.<name>.host.<address>.health_failed` is non-zero.
pub struct StaticClusters {
    clusters: Vec<ClusterConfig>,
    stats: Arc<StatsStore>,
}

impl StaticClusters {
    pub fn new(mut clusters: Vec<ClusterConfig>, stats: Arc<StatsStore>) -> Self {
        clusters.sort_by(|a, b| a.name.cmp(&b.name));
        Self { clusters, stats }
    }

    fn host_stat(&self, cluster: &str, address: &str, stat: &str) -> u64 {
        let name = format!("cluster.{}.host.{}.{}", cluster, address, stat);
        if let Some(counter) = self.stats.find_counter(&name) {
            return counter.value();
        }
        self.stats.find_gauge(&name).map(|g| g.value()).unwrap_or(0)
    }
}

impl ClusterSource for StaticClusters {
    fn clusters(&self) -> Vec<ClusterSummary> {
        self.clusters
            .iter()
            .map(|cluster| ClusterSummary {
                name: cluster.name.clone(),
                added_via_api: false,
                circuit_breakers: cluster.circuit_breakers.clone(),
                hosts: cluster
                    .hosts
                    .iter()
                    .map(|host| HostSummary {
                        address: host.address.clone(),
                        weight: host.weight,
                        healthy: self.host_stat(&cluster.name, &host.address, "health_failed") == 0,
                        stats: HOST_STATS
                            .iter()
                            .map(|stat| {
                                (
                                    stat.to_string(),
                                    self.host_stat(&cluster.name, &host.address, stat),
                                )
                            })
                            .collect(),
                    })
                    .collect(),
            })
            .collect()
    }
}

/// Render clusters in the `::`-separated text form.
pub fn render_clusters<'a>(clusters: impl IntoIterator<Item = &'a ClusterSummary>) -> String {
    let mut out = String::new();
    for cluster in clusters {
        let name = &cluster.name;
        let cb = &cluster.circuit_breakers;
        for (key, value) in [
            ("max_connections", cb.max_connections),
            ("max_pending_requests", cb.max_pending_requests),
            ("max_requests", cb.max_requests),
            ("max_retries", cb.max_retries),
        ] {
            out.push_str(&format!("{}::default_priority::{}::{}\n", name, key, value));
        }
        out.push_str(&format!("{}::added_via_api::{}\n", name, cluster.added_via_api));

        for host in &cluster.hosts {
            for (stat, value) in &host.stats {
                out.push_str(&format!("{}::{}::{}::{}\n", name, host.address, stat, value));
            }
            let health = if host.healthy { "healthy" } else { "/failed_active_hc" };
            out.push_str(&format!("{}::{}::health_flags::{}\n", name, host.address, health));
            out.push_str(&format!("{}::{}::weight::{}\n", name, host.address, host.weight));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::HostConfig;

    fn config(name: &str, hosts: &[&str]) -> ClusterConfig {
        ClusterConfig {
            name: name.to_string(),
            hosts: hosts
                .iter()
                .map(|a| HostConfig {
                    address: a.to_string(),
                    weight: 1,
                })
                .collect(),
            circuit_breakers: CircuitBreakerConfig::default(),
        }
    }

    #[test]
    fn clusters_are_sorted_and_read_stats() {
        let stats = Arc::new(StatsStore::new());
        stats.counter("cluster.web.host.10.0.0.1:80.rq_total").add(7);
        stats.gauge("cluster.web.host.10.0.0.1:80.health_failed").set(1);

        let source = StaticClusters::new(
            vec![config("web", &["10.0.0.1:80"]), config("api", &[])],
            Arc::clone(&stats),
        );
        let clusters = source.clusters();
        assert_eq!(clusters[0].name, "api");
        assert_eq!(clusters[1].name, "web");

        let host = &clusters[1].hosts[0];
        assert!(!host.healthy);
        assert!(host.stats.contains(&("rq_total".to_string(), 7)));
        assert!(host.stats.contains(&("cx_active".to_string(), 0)));
    }

    #[test]
    fn reading_does_not_create_stats() {
        let stats = Arc::new(StatsStore::new());
        let source = StaticClusters::new(vec![config("web", &["10.0.0.1:80"])], Arc::clone(&stats));
        source.clusters();
        assert!(stats.counters().is_empty());
        assert!(stats.gauges().is_empty());
    }

    #[test]
    fn renders_text_lines() {
        let stats = Arc::new(StatsStore::new());
        let source = StaticClusters::new(vec![config("web", &["10.0.0.1:80"])], stats);
        let text = render_clusters(&source.clusters());

        assert!(text.starts_with("web::default_priority::max_connections::1024\n"));
        assert!(text.contains("web::default_priority::max_retries::3\n"));
        assert!(text.contains("web::added_via_api::false\n"));
        assert!(text.contains("web::10.0.0.1:80::rq_total::0\n"));
        assert!(text.contains("web::10.0.0.1:80::health_flags::healthy\n"));
        assert!(text.ends_with("web::10.0.0.1:80::weight::1\n"));
    }
}
