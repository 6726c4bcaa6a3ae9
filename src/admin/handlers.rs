//! Built-in admin handlers.
//!
//! Each handler is a plain function of the server context and the completed
//! request; [`register_builtins`] binds them to their paths. Handlers that
//! change process state are registered as mutating and only run for POST.

use std::sync::{Arc, Weak};

use axum::http::StatusCode;
use serde::Serialize;
use serde_json::json;

use crate::admin::error::{AdminError, AdminResult};
use crate::admin::registry::{render_help, HandlerRegistry, Route};
use crate::admin::request::{AdminRequest, AdminResponse, PROMETHEUS_TEXT};
use crate::context::ServerContext;
use crate::observability::logging::{Level, LOGGERS};
use crate::stats::format::{all_stats, runtime_as_json, stats_as_json, stats_as_text};
use crate::stats::prometheus::{self, MetricSample};

const STATS_USAGE: &str = "usage: /stats?format=json  or /stats?format=prometheus";
const PROFILER_USAGE: &str = "?enable=<y|n>";

/// Register every built-in route. Built-ins are not removable.
///
/// `registry` is held weakly by the help handlers so routes never keep
/// their own registry alive.
pub fn register_builtins(registry: &Arc<HandlerRegistry>, context: &Arc<ServerContext>) {
    let help = Arc::downgrade(registry);
    add(registry, "/", "Admin home page", false, {
        let help = Weak::clone(&help);
        move |_req: &AdminRequest| help_page(&help)
    });
    add(
        registry,
        "/help",
        "print out list of admin commands",
        false,
        move |_req: &AdminRequest| help_page(&help),
    );

    bind(registry, context, "/certs", "print certs on machine", false, certs);
    bind(registry, context, "/clusters", "upstream cluster status", false, clusters);
    bind(registry, context, "/config_dump", "dump current configs", false, config_dump);
    bind(registry, context, "/cpuprofiler", "enable/disable the CPU profiler", true, cpu_profiler);
    bind(
        registry,
        context,
        "/healthcheck/fail",
        "cause the server to fail health checks",
        true,
        healthcheck_fail,
    );
    bind(
        registry,
        context,
        "/healthcheck/ok",
        "cause the server to pass health checks",
        true,
        healthcheck_ok,
    );
    bind(
        registry,
        context,
        "/hot_restart_version",
        "print the hot restart compatibility version",
        false,
        hot_restart_version,
    );
    bind(registry, context, "/listeners", "print listener addresses", false, listeners);
    bind(registry, context, "/logging", "query/change logging levels", true, logging);
    bind(registry, context, "/quitquitquit", "exit the server", true, quit);
    bind(registry, context, "/reset_counters", "reset all counters to zero", true, reset_counters);
    bind(registry, context, "/runtime", "print runtime values", false, runtime);
    bind(
        registry,
        context,
        "/server_info",
        "print server version/status information",
        false,
        server_info,
    );
    bind(registry, context, "/stats", "print server stats", false, stats);
    bind(
        registry,
        context,
        "/stats/prometheus",
        "print server stats in prometheus format",
        false,
        stats_prometheus,
    );
}

fn add<F>(registry: &HandlerRegistry, path: &str, help: &str, mutates: bool, handler: F)
where
    F: Fn(&AdminRequest) -> AdminResult + Send + Sync + 'static,
{
    let added = registry.add(Route::new(path, help, handler).mutates_state(mutates));
    if !added {
        tracing::warn!(path = %path, "Built-in admin route already registered");
    }
}

fn bind(
    registry: &HandlerRegistry,
    context: &Arc<ServerContext>,
    path: &str,
    help: &str,
    mutates: bool,
    handler: fn(&ServerContext, &AdminRequest) -> AdminResult,
) {
    let context = Arc::clone(context);
    add(registry, path, help, mutates, move |req: &AdminRequest| {
        handler(&context, req)
    });
}

fn help_page(registry: &Weak<HandlerRegistry>) -> AdminResult {
    let registry = registry
        .upgrade()
        .ok_or_else(|| AdminError::Internal("admin registry is gone".to_string()))?;
    Ok(AdminResponse::ok(render_help(&registry.list_sorted())))
}

fn ok() -> AdminResult {
    Ok(AdminResponse::ok("OK\n"))
}

fn pretty<T: Serialize + ?Sized>(value: &T) -> AdminResult {
    Ok(AdminResponse::json(serde_json::to_string_pretty(value)?))
}

pub fn stats(context: &ServerContext, req: &AdminRequest) -> AdminResult {
    let params = req.query_params();
    if params.is_empty() {
        return Ok(AdminResponse::ok(stats_as_text(&all_stats(context.stats()))));
    }
    match params.single() {
        Some(("format", "json")) => Ok(AdminResponse::json(stats_as_json(&all_stats(
            context.stats(),
        ))?)),
        Some(("format", "prometheus")) => stats_prometheus(context, req),
        _ => Err(AdminError::invalid_query(STATS_USAGE)),
    }
}

pub fn stats_prometheus(context: &ServerContext, _req: &AdminRequest) -> AdminResult {
    let counters: Vec<MetricSample> = context
        .stats()
        .counters()
        .iter()
        .map(|c| MetricSample::from(c.as_ref()))
        .collect();
    let gauges: Vec<MetricSample> = context
        .stats()
        .gauges()
        .iter()
        .map(|g| MetricSample::from(g.as_ref()))
        .collect();
    let (body, families) = prometheus::format(&counters, &gauges);
    tracing::debug!(families, "Rendered prometheus stats");
    Ok(AdminResponse::new(StatusCode::OK, body).with_content_type(PROMETHEUS_TEXT))
}

pub fn runtime(context: &ServerContext, _req: &AdminRequest) -> AdminResult {
    let snapshot = context.runtime().snapshot();
    Ok(AdminResponse::json(runtime_as_json(&snapshot.sorted_entries())?))
}

pub fn logging(context: &ServerContext, req: &AdminRequest) -> AdminResult {
    let control = context.log_control();
    let params = req.query_params();

    if params.is_empty() {
        return Ok(AdminResponse::ok(format!(
            "{}active loggers:\n{}",
            logging_usage(),
            control.render()
        )));
    }

    let changed = match params.single() {
        Some(("level", level)) => Level::parse(level).map(|level| control.set_all(level)),
        Some((logger, level)) if control.is_logger(logger) => {
            Level::parse(level).map(|level| control.set_level(logger, level))
        }
        _ => None,
    };

    match changed {
        Some(Ok(())) => {
            tracing::info!(query = ?req.query(), "Log levels changed");
            Ok(AdminResponse::ok(format!("active loggers:\n{}", control.render())))
        }
        Some(Err(e)) => Err(AdminError::Internal(e.to_string())),
        None => Err(AdminError::invalid_query(format!(
            "{}active loggers:\n{}",
            logging_usage(),
            control.render().trim_end()
        ))),
    }
}

fn logging_usage() -> String {
    let levels = [
        Level::Trace,
        Level::Debug,
        Level::Info,
        Level::Warning,
        Level::Error,
        Level::Critical,
        Level::Off,
    ]
    .iter()
    .map(|l| l.as_str())
    .collect::<Vec<_>>()
    .join(" ");
    format!(
        "usage: /logging?<name>=<level> (change single level)\n\
         usage: /logging?level=<level> (change all levels)\n\
         levels: {}\n\
         loggers: {}\n",
        levels,
        LOGGERS.join(" ")
    )
}

pub fn healthcheck_fail(context: &ServerContext, _req: &AdminRequest) -> AdminResult {
    context.fail_healthcheck();
    tracing::info!("Health checks forced to fail");
    ok()
}

pub fn healthcheck_ok(context: &ServerContext, _req: &AdminRequest) -> AdminResult {
    context.pass_healthcheck();
    tracing::info!("Forced health check failure cleared");
    ok()
}

pub fn reset_counters(context: &ServerContext, _req: &AdminRequest) -> AdminResult {
    context.stats().reset_counters();
    tracing::info!("Counters reset");
    ok()
}

pub fn quit(context: &ServerContext, _req: &AdminRequest) -> AdminResult {
    tracing::info!("Shutdown requested through admin");
    context.shutdown().trigger();
    ok()
}

pub fn cpu_profiler(context: &ServerContext, req: &AdminRequest) -> AdminResult {
    let profiler = context.profiler();
    match req.query_params().single() {
        Some(("enable", "y")) => {
            if !profiler.is_running() {
                profiler.start(context.profile_path())?;
                tracing::info!(path = ?context.profile_path(), "CPU profiler started");
            }
            ok()
        }
        Some(("enable", "n")) => {
            if profiler.is_running() {
                profiler.stop();
                tracing::info!("CPU profiler stopped");
            }
            ok()
        }
        _ => Err(AdminError::invalid_query(PROFILER_USAGE)),
    }
}

pub fn config_dump(context: &ServerContext, _req: &AdminRequest) -> AdminResult {
    pretty(&context.config_tracker().dump())
}

pub fn server_info(context: &ServerContext, _req: &AdminRequest) -> AdminResult {
    let state = if context.healthcheck_failed() {
        "draining"
    } else {
        "live"
    };
    let hot_restart = context.hot_restart();
    pretty(&json!({
        "version": env!("CARGO_PKG_VERSION"),
        "state": state,
        "uptime_current_epoch": context.uptime_current_epoch().as_secs(),
        "uptime_all_epochs": context.uptime_all_epochs().as_secs(),
        "hot_restart_version": hot_restart.version(),
        "restart_epoch": hot_restart.restart_epoch(),
    }))
}

pub fn clusters(context: &ServerContext, req: &AdminRequest) -> AdminResult {
    let clusters = context.clusters().clusters();
    let params = req.query_params();
    if params.is_empty() {
        return Ok(AdminResponse::ok(crate::context::clusters::render_clusters(&clusters)));
    }
    match params.single() {
        Some(("cluster", name)) => {
            let Some(cluster) = clusters.iter().find(|c| c.name == name) else {
                return Err(AdminError::invalid_query(format!("unknown cluster: {}", name)));
            };
            Ok(AdminResponse::ok(crate::context::clusters::render_clusters([cluster])))
        }
        _ => Err(AdminError::invalid_query("usage: /clusters?cluster=<name>")),
    }
}

pub fn listeners(context: &ServerContext, _req: &AdminRequest) -> AdminResult {
    let addresses = context.listeners().addresses();
    Ok(AdminResponse::json(serde_json::to_string(&addresses)?))
}

pub fn certs(context: &ServerContext, _req: &AdminRequest) -> AdminResult {
    pretty(&json!({ "certificates": context.certificates().certificates() }))
}

pub fn hot_restart_version(context: &ServerContext, _req: &AdminRequest) -> AdminResult {
    Ok(AdminResponse::ok(context.hot_restart().version()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::admin::request::{APPLICATION_JSON, TEXT_PLAIN};
    use crate::context::{Profiler, ProfilerError};
    use crate::observability::LogControl;
    use crate::stats::{StatsStore, Tag};
    use axum::http::Method;
    use bytes::Bytes;
    use serde_json::Value;
    use std::path::Path;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn context() -> ServerContext {
        ServerContext::builder()
            .log_control(Arc::new(LogControl::detached(Level::Info)))
            .build()
    }

    fn get(path: &str) -> AdminRequest {
        AdminRequest::get(path)
    }

    fn post(path: &str) -> AdminRequest {
        AdminRequest::new(Method::POST, path, Bytes::new())
    }

    #[test]
    fn stats_text_json_and_bad_format() {
        let ctx = context();
        ctx.stats().counter("b.count").add(2);
        ctx.stats().gauge("a.level").set(5);

        let text = stats(&ctx, &get("/stats")).unwrap();
        assert_eq!(text.body, "a.level: 5\nb.count: 2\n");

        let json = stats(&ctx, &get("/stats?format=json")).unwrap();
        assert_eq!(json.content_type(), Some(APPLICATION_JSON));
        let parsed: Value = serde_json::from_str(&json.body).unwrap();
        assert_eq!(parsed["b.count"], 2);

        let err = stats(&ctx, &get("/stats?format=xml")).unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn stats_prometheus_via_query_and_path_match() {
        let ctx = context();
        ctx.stats()
            .counter_with_tags(
                "cluster.foo.rq_total",
                "cluster.rq_total",
                vec![Tag::new("cluster_name", "foo")],
            )
            .add(3);

        let via_query = stats(&ctx, &get("/stats?format=prometheus")).unwrap();
        let via_path = stats_prometheus(&ctx, &get("/stats/prometheus")).unwrap();
        assert_eq!(via_query.body, via_path.body);
        assert_eq!(via_path.content_type(), Some(PROMETHEUS_TEXT));
        assert_eq!(
            via_path.body,
            "# TYPE envoy_cluster_rq_total counter\nenvoy_cluster_rq_total{cluster_name=\"foo\"} 3\n"
        );
    }

    #[test]
    fn logging_changes_one_or_all_levels() {
        let ctx = context();

        let response = logging(&ctx, &post("/logging?admin=debug")).unwrap();
        assert!(response.body.contains("  admin: debug\n"));
        assert_eq!(ctx.log_control().level_of("admin"), Some(Level::Debug));
        assert_eq!(ctx.log_control().level_of("stats"), Some(Level::Info));

        logging(&ctx, &post("/logging?level=warning")).unwrap();
        assert!(ctx
            .log_control()
            .loggers()
            .iter()
            .all(|(_, level)| *level == Level::Warning));
    }

    #[test]
    fn logging_rejects_bad_queries() {
        let ctx = context();
        for query in ["/logging?nope=debug", "/logging?admin=loud", "/logging?admin=debug&stats=info"] {
            let err = logging(&ctx, &post(query)).unwrap_err();
            assert_eq!(err.status(), StatusCode::BAD_REQUEST, "{}", query);
            assert!(err.to_string().contains("usage: /logging"));
        }
        assert_eq!(ctx.log_control().level_of("admin"), Some(Level::Info));
    }

    #[test]
    fn logging_without_query_lists_loggers() {
        let ctx = context();
        let response = logging(&ctx, &post("/logging")).unwrap();
        assert_eq!(response.status, StatusCode::OK);
        assert!(response.body.contains("active loggers:\n  admin: info\n"));
    }

    #[test]
    fn healthcheck_toggles_server_state() {
        let ctx = context();
        healthcheck_fail(&ctx, &post("/healthcheck/fail")).unwrap();
        let info: Value =
            serde_json::from_str(&server_info(&ctx, &get("/server_info")).unwrap().body).unwrap();
        assert_eq!(info["state"], "draining");

        healthcheck_ok(&ctx, &post("/healthcheck/ok")).unwrap();
        let info: Value =
            serde_json::from_str(&server_info(&ctx, &get("/server_info")).unwrap().body).unwrap();
        assert_eq!(info["state"], "live");
        assert_eq!(info["hot_restart_version"], "disabled");
        assert_eq!(info["restart_epoch"], 0);
        assert_eq!(info["version"], env!("CARGO_PKG_VERSION"));
    }

    #[test]
    fn reset_counters_and_quit() {
        let ctx = context();
        ctx.stats().counter("c").add(9);
        reset_counters(&ctx, &post("/reset_counters")).unwrap();
        assert_eq!(ctx.stats().counter("c").value(), 0);

        assert!(!ctx.shutdown().is_triggered());
        quit(&ctx, &post("/quitquitquit")).unwrap();
        assert!(ctx.shutdown().is_triggered());
    }

    #[derive(Default)]
    struct FakeProfiler {
        running: AtomicBool,
        fail: bool,
    }

    impl Profiler for FakeProfiler {
        fn start(&self, _path: &Path) -> Result<(), ProfilerError> {
            if self.fail {
                return Err(ProfilerError::Start("disk full".to_string()));
            }
            self.running.store(true, Ordering::SeqCst);
            Ok(())
        }

        fn stop(&self) {
            self.running.store(false, Ordering::SeqCst);
        }

        fn is_running(&self) -> bool {
            self.running.load(Ordering::SeqCst)
        }
    }

    #[test]
    fn cpu_profiler_toggles() {
        let profiler = Arc::new(FakeProfiler::default());
        let ctx = ServerContext::builder().profiler(profiler.clone()).build();

        cpu_profiler(&ctx, &post("/cpuprofiler?enable=y")).unwrap();
        assert!(profiler.is_running());
        cpu_profiler(&ctx, &post("/cpuprofiler?enable=n")).unwrap();
        assert!(!profiler.is_running());

        let err = cpu_profiler(&ctx, &post("/cpuprofiler?enable=maybe")).unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn cpu_profiler_failure_is_internal_error() {
        let ctx = ServerContext::builder()
            .profiler(Arc::new(FakeProfiler {
                fail: true,
                ..Default::default()
            }))
            .build();
        let err = cpu_profiler(&ctx, &post("/cpuprofiler?enable=y")).unwrap_err();
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let unavailable = context();
        let err = cpu_profiler(&unavailable, &post("/cpuprofiler?enable=y")).unwrap_err();
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn clusters_filter() {
        use crate::config::schema::{ClusterConfig, HostConfig};
        use crate::context::StaticClusters;

        let stats = Arc::new(StatsStore::new());
        let cluster = |name: &str| ClusterConfig {
            name: name.to_string(),
            hosts: vec![HostConfig {
                address: "10.0.0.1:80".to_string(),
                weight: 1,
            }],
            circuit_breakers: Default::default(),
        };
        let ctx = ServerContext::builder()
            .clusters(Arc::new(StaticClusters::new(
                vec![cluster("api"), cluster("web")],
                Arc::clone(&stats),
            )))
            .stats(stats)
            .build();

        let all = clusters(&ctx, &get("/clusters")).unwrap();
        assert!(all.body.contains("api::added_via_api::false"));
        assert!(all.body.contains("web::added_via_api::false"));

        let one = clusters(&ctx, &get("/clusters?cluster=web")).unwrap();
        assert!(!one.body.contains("api::"));
        assert!(one.body.contains("web::10.0.0.1:80::weight::1"));

        let err = clusters(&ctx, &get("/clusters?cluster=db")).unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn runtime_listeners_certs_and_config_dump_are_json() {
        let ctx = context();
        for (path, handler) in [
            ("/runtime", runtime as fn(&ServerContext, &AdminRequest) -> AdminResult),
            ("/listeners", listeners),
            ("/certs", certs),
            ("/config_dump", config_dump),
            ("/server_info", server_info),
        ] {
            let response = handler(&ctx, &get(path)).unwrap();
            assert_eq!(response.content_type(), Some(APPLICATION_JSON), "{}", path);
            serde_json::from_str::<Value>(&response.body).unwrap();
        }
    }

    #[test]
    fn hot_restart_version_is_text() {
        let response = hot_restart_version(&context(), &get("/hot_restart_version")).unwrap();
        assert_eq!(response.body, "disabled");
        assert_eq!(response.content_type(), Some(TEXT_PLAIN));
    }

    #[test]
    fn builtins_register_once_and_help_lists_them() {
        let registry = Arc::new(HandlerRegistry::new());
        let ctx = Arc::new(context());
        register_builtins(&registry, &ctx);
        let count = registry.len();
        assert_eq!(count, 17);

        let help = registry.lookup("/help").unwrap().invoke(&get("/help")).unwrap();
        let home = registry.lookup("/").unwrap().invoke(&get("/")).unwrap();
        assert_eq!(help.body, home.body);
        assert!(help.body.starts_with("admin commands are:\n  /: Admin home page\n"));
        assert!(help.body.contains("  /quitquitquit: exit the server\n"));

        for path in ["/", "/stats", "/quitquitquit"] {
            assert!(!registry.remove(path));
        }
        assert!(registry.lookup("/logging").unwrap().is_mutating());
        assert!(!registry.lookup("/stats").unwrap().is_mutating());
    }
}
