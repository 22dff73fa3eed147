//! The route catalog (§4.5): the concrete set of routes exposing tabs,
//! windows, extensions, debugger, inputs, and runtime introspection. This
//! is descriptive, not algorithmic — the hard work lives in
//! [`crate::route`], [`crate::contents`] and [`crate::pattern`].

mod debugger;
mod extensions;
mod inputs;
mod runtime;
mod tabs;
mod windows;

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use tokio::sync::Mutex;

use crate::browser::{BrowserCapabilities, ScriptInfo};
use crate::handle_registry::HandleRegistry;
use crate::route::{RouteBuilder, RouteTable};

/// One pending or completed evaluation, keyed by (tab id, eval filename)
/// in [`CatalogState::evals`].
#[derive(Clone, Debug, Default)]
pub struct EvalEntry {
    pub code: String,
    pub result: Option<String>,
}

/// Process-wide state shared by every route built from this catalog
/// (§5, "Shared resources"). Each table is guarded by its own lock,
/// never held across a call into [`BrowserCapabilities`].
pub struct CatalogState {
    pub browser: Arc<dyn BrowserCapabilities>,
    pub handles: Arc<Mutex<HandleRegistry>>,
    pub evals: Mutex<HashMap<(u64, String), EvalEntry>>,
    pub scripts: Mutex<HashMap<u64, HashMap<String, ScriptInfo>>>,
    pub background_source: Mutex<Option<String>>,
    /// Filled in once the full route table is built, so `/runtime/routes.txt`
    /// can read back the table it is itself a member of.
    pub routes: OnceLock<Arc<RouteTable>>,
}

impl CatalogState {
    pub fn new(browser: Arc<dyn BrowserCapabilities>) -> Arc<Self> {
        Arc::new(Self {
            browser,
            handles: Arc::new(Mutex::new(HandleRegistry::default())),
            evals: Mutex::new(HashMap::new()),
            scripts: Mutex::new(HashMap::new()),
            background_source: Mutex::new(None),
            routes: OnceLock::new(),
        })
    }

    /// Called from the debug-protocol event plumbing (out of scope here,
    /// §1) when a "script parsed" notification arrives.
    pub async fn record_script_parsed(&self, tab_id: u64, script: ScriptInfo) {
        self.scripts
            .lock()
            .await
            .entry(tab_id)
            .or_default()
            .insert(script.script_id.clone(), script);
    }

    /// Called when a "frame started loading" notification arrives.
    pub async fn clear_scripts(&self, tab_id: u64) {
        self.scripts.lock().await.remove(&tab_id);
    }
}

/// Builds every declared route in the catalog, in source order, against
/// shared `state`. The caller runs this through [`RouteTable::build`] and
/// then stores the result back into `state.routes`.
pub fn declared_routes(state: Arc<CatalogState>) -> Vec<RouteBuilder> {
    let mut routes = Vec::new();
    routes.extend(tabs::routes(&state));
    routes.extend(windows::routes(&state));
    routes.extend(extensions::routes(&state));
    routes.extend(debugger::routes(&state));
    routes.extend(inputs::routes(&state));
    routes.extend(runtime::routes(&state));
    routes
}

/// Builds the full table and completes the `routes.txt` wiring.
pub fn build_table(state: Arc<CatalogState>) -> Arc<RouteTable> {
    let declared = declared_routes(state.clone());
    let table = Arc::new(RouteTable::build(declared));
    // Only ever called once at startup; an already-filled cell would mean
    // the catalog was built twice against the same state.
    let _ = state.routes.set(table.clone());
    table
}
