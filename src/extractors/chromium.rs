//! Headless Chromium sessions over the DevTools protocol.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig as ChromeConfig};
use chromiumoxide::cdp::browser_protocol::network::{
    EventLoadingFinished, EventResponseReceived, GetResponseBodyParams, RequestId,
};
use chromiumoxide::cdp::js_protocol::runtime::EvaluateParams;
use chromiumoxide::Page;
use futures_util::StreamExt;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::session::{BrowserSession, ResponseEvent, SessionLauncher};
use crate::config::BrowserConfig;

/// Launches one Chromium process per session
pub struct ChromiumLauncher {
    config: BrowserConfig,
}

impl ChromiumLauncher {
    pub fn new(config: BrowserConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl SessionLauncher for ChromiumLauncher {
    fn is_available(&self) -> bool {
        true
    }

    async fn launch(&self) -> Result<Box<dyn BrowserSession>> {
        tracing::info!("Launching headless Chrome browser...");

        let mut builder = ChromeConfig::builder();
        if !self.config.headless {
            builder = builder.with_head();
        }
        if !self.config.sandbox {
            builder = builder.no_sandbox();
        }
        builder = builder
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage")
            .arg("--no-first-run")
            .arg("--disable-extensions");

        let chrome_config = builder
            .build()
            .map_err(|e| anyhow!("Failed to build browser config: {}", e))?;

        let (browser, mut handler) = Browser::launch(chrome_config)
            .await
            .context("Failed to launch browser")?;

        let handler_task = tokio::spawn(async move {
            while let Some(result) = handler.next().await {
                if result.is_err() {
                    break;
                }
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .context("Failed to open browser tab")?;

        let (sender, events) = mpsc::unbounded_channel();
        let listener_task = spawn_response_listener(page.clone(), sender).await?;

        Ok(Box::new(ChromiumSession {
            browser,
            page,
            events,
            tasks: vec![handler_task, listener_task],
            config: self.config.clone(),
        }))
    }
}

/// Forward every network response of `page` into the channel.
///
/// JSON bodies are only readable once loading finished, so JSON responses are
/// held back until their `loadingFinished` event arrives.
async fn spawn_response_listener(
    page: Page,
    sender: mpsc::UnboundedSender<ResponseEvent>,
) -> Result<JoinHandle<()>> {
    let mut responses = page
        .event_listener::<EventResponseReceived>()
        .await
        .context("Failed to subscribe to responses")?;
    let mut finished = page
        .event_listener::<EventLoadingFinished>()
        .await
        .context("Failed to subscribe to loading events")?;

    Ok(tokio::spawn(async move {
        let mut pending_json: HashMap<RequestId, (String, String)> = HashMap::new();
        loop {
            tokio::select! {
                Some(event) = responses.next() => {
                    let url = event.response.url.clone();
                    let content_type = event.response.mime_type.clone();
                    if content_type.to_lowercase().contains("json") {
                        pending_json.insert(event.request_id.clone(), (url, content_type));
                    } else if sender.send(ResponseEvent { url, content_type, json: None }).is_err() {
                        break;
                    }
                }
                Some(event) = finished.next() => {
                    let Some((url, content_type)) = pending_json.remove(&event.request_id) else {
                        continue;
                    };
                    let json = match page.execute(GetResponseBodyParams::new(event.request_id.clone())).await {
                        Ok(body) if !body.result.base64_encoded => serde_json::from_str::<Value>(&body.result.body).ok(),
                        Ok(_) => None,
                        Err(e) => {
                            tracing::debug!("Response body unavailable for {}: {}", url, e);
                            None
                        }
                    };
                    if sender.send(ResponseEvent { url, content_type, json }).is_err() {
                        break;
                    }
                }
                else => break,
            }
        }
    }))
}

pub struct ChromiumSession {
    browser: Browser,
    page: Page,
    events: mpsc::UnboundedReceiver<ResponseEvent>,
    tasks: Vec<JoinHandle<()>>,
    config: BrowserConfig,
}

#[async_trait]
impl BrowserSession for ChromiumSession {
    async fn navigate(&mut self, url: &str) -> Result<()> {
        let load_timeout = Duration::from_secs(self.config.page_load_timeout_secs);
        tokio::time::timeout(load_timeout, self.page.goto(url))
            .await
            .map_err(|_| anyhow!("Page load timeout: {}", url))?
            .with_context(|| format!("Navigation failed: {}", url))?;
        tokio::time::timeout(load_timeout, self.page.wait_for_navigation())
            .await
            .map_err(|_| anyhow!("Page load timeout: {}", url))?
            .with_context(|| format!("Navigation failed: {}", url))?;

        // No idle-network signal is exposed; give late XHRs a moment
        tokio::time::sleep(Duration::from_millis(self.config.settle_ms)).await;
        Ok(())
    }

    async fn query_texts(&mut self, selector: &str) -> Result<Vec<String>> {
        let elements = match self.page.find_elements(selector).await {
            Ok(elements) => elements,
            Err(e) => {
                tracing::debug!("No elements for {}: {}", selector, e);
                return Ok(Vec::new());
            }
        };
        let mut texts = Vec::with_capacity(elements.len());
        for element in elements {
            if let Ok(Some(text)) = element.inner_text().await {
                texts.push(text);
            }
        }
        Ok(texts)
    }

    async fn click(&mut self, selector: &str, index: usize) -> Result<bool> {
        let elements = match self.page.find_elements(selector).await {
            Ok(elements) => elements,
            Err(_) => return Ok(false),
        };
        let Some(element) = elements.into_iter().nth(index) else {
            return Ok(false);
        };
        match element.find_element("a, button, [role='button']").await {
            Ok(clickable) => {
                clickable.click().await.context("Click failed")?;
            }
            Err(_) => {
                element.click().await.context("Click failed")?;
            }
        }
        Ok(true)
    }

    async fn attribute(&mut self, selector: &str, name: &str) -> Result<Option<String>> {
        match self.page.find_element(selector).await {
            Ok(element) => Ok(element.attribute(name).await?),
            Err(_) => Ok(None),
        }
    }

    async fn fetch_json(&mut self, url: &str) -> Result<Value> {
        let expression = format!(
            "fetch({}, {{credentials: 'same-origin'}}).then(r => {{ if (!r.ok) throw new Error('HTTP ' + r.status); return r.json(); }})",
            serde_json::to_string(url)?
        );
        let params = EvaluateParams::builder()
            .expression(expression)
            .await_promise(true)
            .return_by_value(true)
            .build()
            .map_err(|e| anyhow!("Invalid evaluate params: {}", e))?;

        let result = self
            .page
            .evaluate_expression(params)
            .await
            .with_context(|| format!("In-page fetch failed: {}", url))?;
        result
            .into_value::<Value>()
            .with_context(|| format!("In-page fetch returned no JSON: {}", url))
    }

    async fn wait(&mut self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }

    fn drain_responses(&mut self) -> Vec<ResponseEvent> {
        let mut drained = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            drained.push(event);
        }
        drained
    }

    async fn close(&mut self) -> Result<()> {
        if let Err(e) = self.page.clone().close().await {
            tracing::debug!("Failed to close page: {}", e);
        }
        let closed = self.browser.close().await.map(|_| ()).context("Failed to close browser");
        for task in self.tasks.drain(..) {
            task.abort();
        }
        closed
    }
}
