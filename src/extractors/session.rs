//! Browser session abstraction used by the driven-session tier.
//!
//! Response events may arrive during or after navigation, in any order and
//! quantity; implementations buffer them until the tier drains the channel.

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use crate::config::BrowserConfig;
use crate::PipelineError;

/// A network response observed by the session
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseEvent {
    pub url: String,
    pub content_type: String,
    /// Parsed body, when the response was JSON and its body could be read
    pub json: Option<Value>,
}

/// A controlled browser page
#[async_trait]
pub trait BrowserSession: Send {
    /// Load a page and wait until the network settles
    async fn navigate(&mut self, url: &str) -> Result<()>;

    /// Inner text of every element matching `selector`, in document order
    async fn query_texts(&mut self, selector: &str) -> Result<Vec<String>>;

    /// Click the `index`-th match (or its first clickable descendant); false if absent
    async fn click(&mut self, selector: &str, index: usize) -> Result<bool>;

    /// Attribute of the first element matching `selector`
    async fn attribute(&mut self, selector: &str, name: &str) -> Result<Option<String>>;

    /// Same-origin JSON request issued from inside the page
    async fn fetch_json(&mut self, url: &str) -> Result<Value>;

    /// Let the page run for a while (animations, lazy loads)
    async fn wait(&mut self, duration: Duration);

    /// Take every response event buffered so far
    fn drain_responses(&mut self) -> Vec<ResponseEvent>;

    async fn close(&mut self) -> Result<()>;
}

/// Starts browser sessions
#[async_trait]
pub trait SessionLauncher: Send + Sync {
    /// Whether automation support exists in this build
    fn is_available(&self) -> bool;

    async fn launch(&self) -> Result<Box<dyn BrowserSession>>;
}

/// Launcher for builds without browser automation
pub struct UnavailableLauncher {
    reason: String,
}

impl UnavailableLauncher {
    pub fn new(reason: impl Into<String>) -> Self {
        Self { reason: reason.into() }
    }
}

#[async_trait]
impl SessionLauncher for UnavailableLauncher {
    fn is_available(&self) -> bool {
        false
    }

    async fn launch(&self) -> Result<Box<dyn BrowserSession>> {
        Err(PipelineError::AutomationUnavailable(self.reason.clone()).into())
    }
}

/// Launcher matching the compiled feature set
pub fn default_launcher(config: &BrowserConfig) -> Arc<dyn SessionLauncher> {
    #[cfg(feature = "js-rendering")]
    {
        Arc::new(super::chromium::ChromiumLauncher::new(config.clone()))
    }

    #[cfg(not(feature = "js-rendering"))]
    {
        let _ = config;
        Arc::new(UnavailableLauncher::new(
            "compiled without the js-rendering feature",
        ))
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted in-memory session for tier tests.

    use super::*;
    use std::collections::{HashMap, VecDeque};
    use std::sync::Mutex;

    /// Page content and network behaviour a scripted session replays
    #[derive(Debug, Clone, Default)]
    pub struct Script {
        /// Texts returned per selector
        pub texts: HashMap<String, Vec<String>>,
        /// Texts that replace `texts` entries once any click happened
        pub texts_after_click: HashMap<String, Vec<String>>,
        pub attributes: HashMap<(String, String), String>,
        /// JSON returned per fetched URL
        pub api: HashMap<String, Value>,
        /// Responses delivered while navigating
        pub navigation_responses: Vec<ResponseEvent>,
        /// Responses delivered after the first click
        pub click_responses: Vec<ResponseEvent>,
        pub fail_navigation: bool,
        /// Selectors whose queries error out
        pub broken_selectors: Vec<String>,
    }

    /// Everything the tier did to the session
    #[derive(Debug, Default)]
    pub struct Journal {
        pub navigations: Vec<String>,
        pub clicks: Vec<(String, usize)>,
        pub fetches: Vec<String>,
        pub closed: bool,
    }

    pub struct ScriptedSession {
        script: Script,
        journal: Arc<Mutex<Journal>>,
        pending: VecDeque<ResponseEvent>,
        clicked: bool,
    }

    #[async_trait]
    impl BrowserSession for ScriptedSession {
        async fn navigate(&mut self, url: &str) -> Result<()> {
            self.journal.lock().unwrap().navigations.push(url.to_string());
            if self.script.fail_navigation {
                anyhow::bail!("navigation timeout: {}", url);
            }
            self.pending.extend(self.script.navigation_responses.iter().cloned());
            Ok(())
        }

        async fn query_texts(&mut self, selector: &str) -> Result<Vec<String>> {
            if self.script.broken_selectors.iter().any(|s| s == selector) {
                anyhow::bail!("invalid selector: {}", selector);
            }
            if self.clicked {
                if let Some(texts) = self.script.texts_after_click.get(selector) {
                    return Ok(texts.clone());
                }
            }
            Ok(self.script.texts.get(selector).cloned().unwrap_or_default())
        }

        async fn click(&mut self, selector: &str, index: usize) -> Result<bool> {
            let exists = self
                .script
                .texts
                .get(selector)
                .map(|texts| index < texts.len())
                .unwrap_or(false);
            if !exists {
                return Ok(false);
            }
            self.journal.lock().unwrap().clicks.push((selector.to_string(), index));
            if !self.clicked {
                self.clicked = true;
                self.pending.extend(self.script.click_responses.iter().cloned());
            }
            Ok(true)
        }

        async fn attribute(&mut self, selector: &str, name: &str) -> Result<Option<String>> {
            Ok(self
                .script
                .attributes
                .get(&(selector.to_string(), name.to_string()))
                .cloned())
        }

        async fn fetch_json(&mut self, url: &str) -> Result<Value> {
            self.journal.lock().unwrap().fetches.push(url.to_string());
            match self.script.api.get(url) {
                Some(value) => {
                    self.pending.push_back(ResponseEvent {
                        url: url.to_string(),
                        content_type: "application/json".to_string(),
                        json: Some(value.clone()),
                    });
                    Ok(value.clone())
                }
                None => anyhow::bail!("HTTP 404 for {}", url),
            }
        }

        async fn wait(&mut self, _duration: Duration) {}

        fn drain_responses(&mut self) -> Vec<ResponseEvent> {
            self.pending.drain(..).collect()
        }

        async fn close(&mut self) -> Result<()> {
            self.journal.lock().unwrap().closed = true;
            Ok(())
        }
    }

    /// Launcher handing out sessions that replay one script
    pub struct ScriptedLauncher {
        pub script: Script,
        pub journal: Arc<Mutex<Journal>>,
    }

    impl ScriptedLauncher {
        pub fn new(script: Script) -> Self {
            Self {
                script,
                journal: Arc::new(Mutex::new(Journal::default())),
            }
        }
    }

    #[async_trait]
    impl SessionLauncher for ScriptedLauncher {
        fn is_available(&self) -> bool {
            true
        }

        async fn launch(&self) -> Result<Box<dyn BrowserSession>> {
            Ok(Box::new(ScriptedSession {
                script: self.script.clone(),
                journal: self.journal.clone(),
                pending: VecDeque::new(),
                clicked: false,
            }))
        }
    }

    pub fn json_response(url: &str, value: Value) -> ResponseEvent {
        ResponseEvent {
            url: url.to_string(),
            content_type: "application/json; charset=utf-8".to_string(),
            json: Some(value),
        }
    }

    pub fn audio_response(url: &str) -> ResponseEvent {
        ResponseEvent {
            url: url.to_string(),
            content_type: "audio/mpeg".to_string(),
            json: None,
        }
    }
}
