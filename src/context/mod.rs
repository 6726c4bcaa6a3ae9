//! Server context: the live process state the admin surface reads and mutates.
//!
//! # Responsibilities
//! - Own the stats store, runtime loader, and log control
//! - Hold the collaborator boundaries (clusters, listeners, certificates,
//!   profiler, hot restart) behind traits
//! - Track the health-check override flag, shutdown, and start time
//!
//! # Design Decisions
//! - Passed by `Arc` to the admin server; no globals
//! - Every collaborator is internally synchronized so handlers never lock the context
//! - `ServerContextBuilder` fills unset collaborators with in-process defaults

pub mod certs;
pub mod clusters;
pub mod config_tracker;
pub mod hot_restart;
pub mod listeners;
pub mod profiler;

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::json;

use crate::config::ProxyConfig;
use crate::lifecycle::Shutdown;
use crate::observability::{Level, LogControl};
use crate::runtime::RuntimeLoader;
use crate::stats::StatsStore;

pub use certs::{CertificateDetails, CertificateError, CertificateProvider, CertificateSet, FileCertificates};
pub use clusters::{ClusterSource, ClusterSummary, HostSummary, StaticClusters};
pub use config_tracker::{ConfigTracker, EntryOwner};
pub use hot_restart::{DisabledHotRestart, HotRestart};
pub use listeners::{ListenerSource, StaticListeners};
pub use profiler::{Profiler, ProfilerError, UnavailableProfiler};

const DEFAULT_PROFILE_PATH: &str = "/var/log/proxy/proxy.prof";

pub struct ServerContext {
    stats: Arc<StatsStore>,
    runtime: Arc<RuntimeLoader>,
    log_control: Arc<LogControl>,
    clusters: Arc<dyn ClusterSource>,
    listeners: Arc<dyn ListenerSource>,
    certificates: Arc<dyn CertificateProvider>,
    profiler: Arc<dyn Profiler>,
    hot_restart: Arc<dyn HotRestart>,
    config_tracker: ConfigTracker,
    shutdown: Shutdown,
    healthcheck_failed: AtomicBool,
    profile_path: PathBuf,
    start_time: Instant,
    original_start_time: Instant,
    _config_entries: Vec<EntryOwner>,
}

impl ServerContext {
    pub fn builder() -> ServerContextBuilder {
        ServerContextBuilder::default()
    }

    /// Build a context from configuration, with config-backed collaborators.
    ///
    /// A runtime override file that fails to load is logged and skipped.
    pub fn from_config(
        config: &ProxyConfig,
        stats: Arc<StatsStore>,
        log_control: Arc<LogControl>,
    ) -> Self {
        let runtime = Arc::new(RuntimeLoader::new(config.runtime.values.clone()));
        if let Some(path) = &config.runtime.override_path {
            if let Err(e) = runtime.load_override_file(Path::new(path)) {
                tracing::warn!(path = %path, error = %e, "Runtime override file not loaded");
            }
        }

        let mut context = Self::builder()
            .stats(Arc::clone(&stats))
            .runtime(runtime)
            .log_control(log_control)
            .clusters(Arc::new(StaticClusters::new(config.clusters.clone(), stats)))
            .listeners(Arc::new(StaticListeners::new(config.listeners.clone())))
            .certificates(Arc::new(FileCertificates::new(config.certificates.clone())))
            .profile_path(&config.admin.profile_path)
            .build();

        let clusters = config.clusters.clone();
        let listeners = config.listeners.clone();
        let entries = [
            context
                .config_tracker
                .add("clusters", move || json!(clusters)),
            context
                .config_tracker
                .add("listeners", move || json!(listeners)),
        ];
        context._config_entries = entries.into_iter().flatten().collect();
        context
    }

    pub fn stats(&self) -> &Arc<StatsStore> {
        &self.stats
    }

    pub fn runtime(&self) -> &Arc<RuntimeLoader> {
        &self.runtime
    }

    pub fn log_control(&self) -> &LogControl {
        &self.log_control
    }

    pub fn clusters(&self) -> &dyn ClusterSource {
        self.clusters.as_ref()
    }

    pub fn listeners(&self) -> &dyn ListenerSource {
        self.listeners.as_ref()
    }

    pub fn certificates(&self) -> &dyn CertificateProvider {
        self.certificates.as_ref()
    }

    pub fn profiler(&self) -> &dyn Profiler {
        self.profiler.as_ref()
    }

    pub fn hot_restart(&self) -> &dyn HotRestart {
        self.hot_restart.as_ref()
    }

    pub fn config_tracker(&self) -> &ConfigTracker {
        &self.config_tracker
    }

    pub fn shutdown(&self) -> &Shutdown {
        &self.shutdown
    }

    pub fn profile_path(&self) -> &Path {
        &self.profile_path
    }

    pub fn healthcheck_failed(&self) -> bool {
        self.healthcheck_failed.load(Ordering::Relaxed)
    }

    pub fn fail_healthcheck(&self) {
        self.healthcheck_failed.store(true, Ordering::Relaxed);
    }

    pub fn pass_healthcheck(&self) {
        self.healthcheck_failed.store(false, Ordering::Relaxed);
    }

    pub fn uptime_current_epoch(&self) -> Duration {
        self.start_time.elapsed()
    }

    pub fn uptime_all_epochs(&self) -> Duration {
        self.original_start_time.elapsed()
    }
}

#[derive(Default)]
pub struct ServerContextBuilder {
    stats: Option<Arc<StatsStore>>,
    runtime: Option<Arc<RuntimeLoader>>,
    log_control: Option<Arc<LogControl>>,
    clusters: Option<Arc<dyn ClusterSource>>,
    listeners: Option<Arc<dyn ListenerSource>>,
    certificates: Option<Arc<dyn CertificateProvider>>,
    profiler: Option<Arc<dyn Profiler>>,
    hot_restart: Option<Arc<dyn HotRestart>>,
    shutdown: Option<Shutdown>,
    profile_path: Option<PathBuf>,
    original_start_time: Option<Instant>,
}

impl ServerContextBuilder {
    pub fn stats(mut self, stats: Arc<StatsStore>) -> Self {
        self.stats = Some(stats);
        self
    }

    pub fn runtime(mut self, runtime: Arc<RuntimeLoader>) -> Self {
        self.runtime = Some(runtime);
        self
    }

    pub fn log_control(mut self, log_control: Arc<LogControl>) -> Self {
        self.log_control = Some(log_control);
        self
    }

    pub fn clusters(mut self, clusters: Arc<dyn ClusterSource>) -> Self {
        self.clusters = Some(clusters);
        self
    }

    pub fn listeners(mut self, listeners: Arc<dyn ListenerSource>) -> Self {
        self.listeners = Some(listeners);
        self
    }

    pub fn certificates(mut self, certificates: Arc<dyn CertificateProvider>) -> Self {
        self.certificates = Some(certificates);
        self
    }

    pub fn profiler(mut self, profiler: Arc<dyn Profiler>) -> Self {
        self.profiler = Some(profiler);
        self
    }

    pub fn hot_restart(mut self, hot_restart: Arc<dyn HotRestart>) -> Self {
        self.hot_restart = Some(hot_restart);
        self
    }

    pub fn shutdown(mut self, shutdown: Shutdown) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    pub fn profile_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.profile_path = Some(path.into());
        self
    }

    /// Start time of the first process in a hot-restart lineage.
    pub fn original_start_time(mut self, at: Instant) -> Self {
        self.original_start_time = Some(at);
        self
    }

    pub fn build(self) -> ServerContext {
        let start_time = Instant::now();
        let stats = self.stats.unwrap_or_default();
        ServerContext {
            clusters: self
                .clusters
                .unwrap_or_else(|| Arc::new(StaticClusters::new(Vec::new(), Arc::clone(&stats)))),
            stats,
            runtime: self.runtime.unwrap_or_default(),
            log_control: self
                .log_control
                .unwrap_or_else(|| Arc::new(LogControl::detached(Level::Info))),
            listeners: self
                .listeners
                .unwrap_or_else(|| Arc::new(StaticListeners::new(Vec::new()))),
            certificates: self
                .certificates
                .unwrap_or_else(|| Arc::new(FileCertificates::new(Vec::new()))),
            profiler: self.profiler.unwrap_or_else(|| Arc::new(UnavailableProfiler)),
            hot_restart: self.hot_restart.unwrap_or_else(|| Arc::new(DisabledHotRestart)),
            config_tracker: ConfigTracker::new(),
            shutdown: self.shutdown.unwrap_or_default(),
            healthcheck_failed: AtomicBool::new(false),
            profile_path: self
                .profile_path
                .unwrap_or_else(|| PathBuf::from(DEFAULT_PROFILE_PATH)),
            start_time,
            original_start_time: self.original_start_time.unwrap_or(start_time),
            _config_entries: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{ClusterConfig, ListenerConfig};

    #[test]
    fn builder_defaults() {
        let context = ServerContext::builder().build();
        assert!(!context.healthcheck_failed());
        assert!(!context.profiler().is_running());
        assert_eq!(context.hot_restart().version(), "disabled");
        assert!(context.clusters().clusters().is_empty());
        assert!(context.listeners().addresses().is_empty());
        assert!(context.uptime_all_epochs() >= context.uptime_current_epoch());
    }

    #[test]
    fn healthcheck_flag_toggles() {
        let context = ServerContext::builder().build();
        context.fail_healthcheck();
        assert!(context.healthcheck_failed());
        context.pass_healthcheck();
        assert!(!context.healthcheck_failed());
    }

    #[test]
    fn from_config_registers_config_dump_entries() {
        let mut config = ProxyConfig::default();
        config.clusters.push(ClusterConfig {
            name: "web".to_string(),
            hosts: Vec::new(),
            circuit_breakers: Default::default(),
        });
        config.listeners.push(ListenerConfig {
            name: "ingress".to_string(),
            address: "0.0.0.0:8080".to_string(),
        });
        config.runtime.values.insert("a".to_string(), "1".to_string());

        let context = ServerContext::from_config(
            &config,
            Arc::new(StatsStore::new()),
            Arc::new(LogControl::detached(Level::Info)),
        );

        assert_eq!(context.config_tracker().keys(), vec!["clusters", "listeners"]);
        let dump = context.config_tracker().dump();
        assert_eq!(dump["configs"]["clusters"][0]["name"], "web");
        assert_eq!(dump["configs"]["listeners"][0]["address"], "0.0.0.0:8080");
        assert_eq!(context.runtime().snapshot().get_integer("a", 0), 1);
        assert_eq!(context.clusters().clusters()[0].name, "web");
        assert_eq!(context.profile_path(), Path::new(&config.admin.profile_path));
    }
}
