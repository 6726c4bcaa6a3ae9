//! Shared utilities for admin integration tests.

use std::net::SocketAddr;
use std::sync::Arc;

use proxy_admin::config::schema::{ClusterConfig, HostConfig};
use proxy_admin::context::StaticClusters;
use proxy_admin::stats::StatsStore;
use proxy_admin::{AccessLog, AdminServer, ServerContext};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// A context with one cluster and a few stats already recorded.
pub fn test_context() -> Arc<ServerContext> {
    let stats = Arc::new(StatsStore::new());
    stats.counter("cluster.web.upstream_rq_total").add(12);
    stats.gauge("cluster.web.membership_healthy").set(2);

    let clusters = vec![ClusterConfig {
        name: "web".to_string(),
        hosts: vec![HostConfig {
            address: "10.0.0.1:80".to_string(),
            weight: 1,
        }],
        circuit_breakers: Default::default(),
    }];

    Arc::new(
        ServerContext::builder()
            .stats(Arc::clone(&stats))
            .clusters(Arc::new(StaticClusters::new(clusters, stats)))
            .build(),
    )
}

pub fn test_server(context: Arc<ServerContext>, access_log: AccessLog) -> AdminServer {
    let scope = context.stats().scope("http.admin.");
    AdminServer::new(access_log, "127.0.0.1:0".parse().unwrap(), context, scope)
}

/// Serve `server` on an ephemeral port. Returns the base URL and the serve task.
pub async fn spawn_server(server: AdminServer) -> (String, JoinHandle<std::io::Result<()>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr: SocketAddr = listener.local_addr().unwrap();
    let handle = tokio::spawn(server.serve(listener));
    (format!("http://{}", addr), handle)
}
