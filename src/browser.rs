//! Browser capabilities as opaque trait objects (§1, out of scope beyond
//! their interface): the route catalog is generic over this trait rather
//! than calling any particular extension API directly.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Error;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TabInfo {
    pub id: u64,
    pub window_id: u64,
    pub title: String,
    pub url: String,
}

#[derive(Clone, Debug, Default)]
pub struct TabUpdate {
    pub url: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WindowInfo {
    pub id: u64,
    pub focused: bool,
    pub top: i32,
    pub left: i32,
    pub width: i32,
    pub height: i32,
    pub state: String,
}

#[derive(Clone, Debug, Default)]
pub struct WindowUpdate {
    pub focused: Option<bool>,
    pub top: Option<i32>,
    pub left: Option<i32>,
    pub width: Option<i32>,
    pub height: Option<i32>,
    pub state: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExtensionInfo {
    pub id: String,
    pub name: String,
    pub version: String,
    pub enabled: bool,
}

/// One script known to the debugger for a given tab, populated from
/// debug-protocol events (§4.5).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScriptInfo {
    pub script_id: String,
    pub url: String,
}

/// The full surface of browser-API calls the route catalog invokes.
/// Implementations talk to whatever extension API/debug protocol the host
/// provides; the catalog itself never depends on a specific one.
#[async_trait]
pub trait BrowserCapabilities: Send + Sync {
    async fn list_tabs(&self) -> Result<Vec<TabInfo>, Error>;
    async fn get_tab(&self, id: u64) -> Result<TabInfo, Error>;
    async fn update_tab(&self, id: u64, update: TabUpdate) -> Result<(), Error>;
    async fn close_tab(&self, id: u64) -> Result<(), Error>;
    async fn capture_tab(&self, id: u64) -> Result<Vec<u8>, Error>;
    async fn execute_script(&self, tab_id: u64, code: &str) -> Result<Value, Error>;
    /// Evaluates `code` in the extension's own background context, used to
    /// hot-reload `/runtime/background.js` (§4.5, §9).
    async fn execute_background_script(&self, code: &str) -> Result<Value, Error>;
    async fn set_input_value(&self, tab_id: u64, input_id: &str, value: &str) -> Result<(), Error>;
    async fn get_input_value(&self, tab_id: u64, input_id: &str) -> Result<String, Error>;
    /// Ids of DOM elements this tab has had an input value read or set
    /// against, for `readdir` on the tab's `inputs/` directory.
    async fn list_input_ids(&self, tab_id: u64) -> Result<Vec<String>, Error>;

    async fn list_windows(&self) -> Result<Vec<WindowInfo>, Error>;
    async fn get_window(&self, id: u64) -> Result<WindowInfo, Error>;
    async fn update_window(&self, id: u64, update: WindowUpdate) -> Result<(), Error>;
    async fn tabs_in_window(&self, id: u64) -> Result<Vec<u64>, Error>;

    async fn list_extensions(&self) -> Result<Vec<ExtensionInfo>, Error>;
    async fn get_extension(&self, id: &str) -> Result<ExtensionInfo, Error>;
    async fn set_extension_enabled(&self, id: &str, enabled: bool) -> Result<(), Error>;

    /// Ensures the debugger is attached to `tab_id`, detaching and
    /// reattaching if another client already holds it (§5).
    async fn attach_debugger(&self, tab_id: u64) -> Result<(), Error>;
    async fn debugger_get_script_source(&self, tab_id: u64, script_id: &str) -> Result<String, Error>;
    async fn debugger_set_script_source(
        &self,
        tab_id: u64,
        script_id: &str,
        source: &str,
    ) -> Result<(), Error>;
}

pub mod fixture {
    //! A fixed, in-memory [`BrowserCapabilities`]: useful both for
    //! exercising the route catalog in tests, and as the engine's binding
    //! when no real host-provided browser bridge is wired in, in the style
    //! of the teacher's fixed-`BTreeMap` `RootNodes` implementation.

    use super::*;
    use std::collections::HashMap;
    use tokio::sync::Mutex;

    pub struct FixtureBrowser {
        pub tabs: Mutex<HashMap<u64, TabInfo>>,
        pub windows: Mutex<HashMap<u64, WindowInfo>>,
        pub extensions: Mutex<HashMap<String, ExtensionInfo>>,
        pub inputs: Mutex<HashMap<(u64, String), String>>,
    }

    impl FixtureBrowser {
        pub fn new() -> Self {
            Self {
                tabs: Mutex::new(HashMap::new()),
                windows: Mutex::new(HashMap::new()),
                extensions: Mutex::new(HashMap::new()),
                inputs: Mutex::new(HashMap::new()),
            }
        }
    }

    #[async_trait]
    impl BrowserCapabilities for FixtureBrowser {
        async fn list_tabs(&self) -> Result<Vec<TabInfo>, Error> {
            Ok(self.tabs.lock().await.values().cloned().collect())
        }

        async fn get_tab(&self, id: u64) -> Result<TabInfo, Error> {
            self.tabs
                .lock()
                .await
                .get(&id)
                .cloned()
                .ok_or_else(|| Error::UnknownIdentifier(format!("tab {id}")))
        }

        async fn update_tab(&self, id: u64, update: TabUpdate) -> Result<(), Error> {
            let mut tabs = self.tabs.lock().await;
            let tab = tabs
                .get_mut(&id)
                .ok_or_else(|| Error::UnknownIdentifier(format!("tab {id}")))?;
            if let Some(url) = update.url {
                tab.url = url;
            }
            Ok(())
        }

        async fn close_tab(&self, id: u64) -> Result<(), Error> {
            self.tabs
                .lock()
                .await
                .remove(&id)
                .map(|_| ())
                .ok_or_else(|| Error::UnknownIdentifier(format!("tab {id}")))
        }

        async fn capture_tab(&self, _id: u64) -> Result<Vec<u8>, Error> {
            Ok(vec![0x89, b'P', b'N', b'G'])
        }

        async fn execute_script(&self, _tab_id: u64, _code: &str) -> Result<Value, Error> {
            Ok(Value::Null)
        }

        async fn execute_background_script(&self, _code: &str) -> Result<Value, Error> {
            Ok(Value::Null)
        }

        async fn set_input_value(&self, tab_id: u64, input_id: &str, value: &str) -> Result<(), Error> {
            self.inputs
                .lock()
                .await
                .insert((tab_id, input_id.to_string()), value.to_string());
            Ok(())
        }

        async fn get_input_value(&self, tab_id: u64, input_id: &str) -> Result<String, Error> {
            self.inputs
                .lock()
                .await
                .get(&(tab_id, input_id.to_string()))
                .cloned()
                .ok_or_else(|| Error::UnknownIdentifier(format!("input {input_id}")))
        }

        async fn list_input_ids(&self, tab_id: u64) -> Result<Vec<String>, Error> {
            Ok(self
                .inputs
                .lock()
                .await
                .keys()
                .filter(|(id, _)| *id == tab_id)
                .map(|(_, input_id)| input_id.clone())
                .collect())
        }

        async fn list_windows(&self) -> Result<Vec<WindowInfo>, Error> {
            Ok(self.windows.lock().await.values().cloned().collect())
        }

        async fn get_window(&self, id: u64) -> Result<WindowInfo, Error> {
            self.windows
                .lock()
                .await
                .get(&id)
                .cloned()
                .ok_or_else(|| Error::UnknownIdentifier(format!("window {id}")))
        }

        async fn update_window(&self, id: u64, update: WindowUpdate) -> Result<(), Error> {
            let mut windows = self.windows.lock().await;
            let window = windows
                .get_mut(&id)
                .ok_or_else(|| Error::UnknownIdentifier(format!("window {id}")))?;
            if let Some(v) = update.focused {
                window.focused = v;
            }
            if let Some(v) = update.top {
                window.top = v;
            }
            if let Some(v) = update.left {
                window.left = v;
            }
            if let Some(v) = update.width {
                window.width = v;
            }
            if let Some(v) = update.height {
                window.height = v;
            }
            if let Some(v) = update.state {
                window.state = v;
            }
            Ok(())
        }

        async fn tabs_in_window(&self, id: u64) -> Result<Vec<u64>, Error> {
            Ok(self
                .tabs
                .lock()
                .await
                .values()
                .filter(|t| t.window_id == id)
                .map(|t| t.id)
                .collect())
        }

        async fn list_extensions(&self) -> Result<Vec<ExtensionInfo>, Error> {
            Ok(self.extensions.lock().await.values().cloned().collect())
        }

        async fn get_extension(&self, id: &str) -> Result<ExtensionInfo, Error> {
            self.extensions
                .lock()
                .await
                .get(id)
                .cloned()
                .ok_or_else(|| Error::UnknownIdentifier(format!("extension {id}")))
        }

        async fn set_extension_enabled(&self, id: &str, enabled: bool) -> Result<(), Error> {
            let mut extensions = self.extensions.lock().await;
            let ext = extensions
                .get_mut(id)
                .ok_or_else(|| Error::UnknownIdentifier(format!("extension {id}")))?;
            ext.enabled = enabled;
            Ok(())
        }

        async fn attach_debugger(&self, _tab_id: u64) -> Result<(), Error> {
            Ok(())
        }

        async fn debugger_get_script_source(
            &self,
            _tab_id: u64,
            _script_id: &str,
        ) -> Result<String, Error> {
            Ok(String::new())
        }

        async fn debugger_set_script_source(
            &self,
            _tab_id: u64,
            _script_id: &str,
            _source: &str,
        ) -> Result<(), Error> {
            Ok(())
        }
    }
}
