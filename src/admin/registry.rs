//! Admin route registry.
//!
//! # Responsibilities
//! - Map exact URL paths to handler callbacks
//! - Refuse duplicate paths and removal of built-in routes
//! - List routes sorted by path for the help page
//!
//! # Design Decisions
//! - Exact-path matching only; the caller strips the query string
//! - One mutex guards the map, held only for the map operation itself
//! - Lookups hand out `Arc<Route>` so handlers run without the lock held
//! - Sorting happens on demand in `list_sorted`, never cached

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::admin::error::AdminResult;
use crate::admin::request::AdminRequest;

/// Handler callback: completed request in, response (or error) out.
pub type HandlerFn = Arc<dyn Fn(&AdminRequest) -> AdminResult + Send + Sync>;

/// A registered (path, handler, metadata) binding.
#[derive(Clone)]
pub struct Route {
    path: String,
    help_text: String,
    handler: HandlerFn,
    removable: bool,
    mutates_state: bool,
}

impl Route {
    pub fn new<F>(path: impl Into<String>, help_text: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&AdminRequest) -> AdminResult + Send + Sync + 'static,
    {
        Self {
            path: path.into(),
            help_text: help_text.into(),
            handler: Arc::new(handler),
            removable: false,
            mutates_state: false,
        }
    }

    pub fn removable(mut self, removable: bool) -> Self {
        self.removable = removable;
        self
    }

    pub fn mutates_state(mut self, mutates_state: bool) -> Self {
        self.mutates_state = mutates_state;
        self
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn help_text(&self) -> &str {
        &self.help_text
    }

    pub fn is_removable(&self) -> bool {
        self.removable
    }

    pub fn is_mutating(&self) -> bool {
        self.mutates_state
    }

    pub fn invoke(&self, request: &AdminRequest) -> AdminResult {
        (self.handler)(request)
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("path", &self.path)
            .field("help_text", &self.help_text)
            .field("removable", &self.removable)
            .field("mutates_state", &self.mutates_state)
            .finish_non_exhaustive()
    }
}

/// The admin dispatch table.
#[derive(Debug, Default)]
pub struct HandlerRegistry {
    routes: Mutex<HashMap<String, Arc<Route>>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn routes(&self) -> MutexGuard<'_, HashMap<String, Arc<Route>>> {
        // Routes are immutable once inserted, so a poisoned map is still consistent.
        self.routes.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a route. Returns false, leaving the registry untouched, if the path exists.
    pub fn add(&self, route: Route) -> bool {
        match self.routes().entry(route.path.clone()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(Arc::new(route));
                true
            }
        }
    }

    /// Remove a route. Fails if the path is absent or the route is not removable.
    pub fn remove(&self, path: &str) -> bool {
        let mut routes = self.routes();
        match routes.get(path) {
            Some(route) if route.removable => {
                routes.remove(path);
                true
            }
            _ => false,
        }
    }

    pub fn lookup(&self, path: &str) -> Option<Arc<Route>> {
        self.routes().get(path).cloned()
    }

    pub fn list_sorted(&self) -> Vec<Arc<Route>> {
        let mut routes: Vec<Arc<Route>> = self.routes().values().cloned().collect();
        routes.sort_by(|a, b| a.path.cmp(&b.path));
        routes
    }

    pub fn len(&self) -> usize {
        self.routes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes().is_empty()
    }
}

/// Render the "admin commands are:" listing used by `/help` and 404 bodies.
pub fn render_help(routes: &[Arc<Route>]) -> String {
    let mut out = String::from("admin commands are:\n");
    for route in routes {
        out.push_str("  ");
        out.push_str(&route.path);
        out.push_str(": ");
        out.push_str(&route.help_text);
        out.push('\n');
    }
    out
}
