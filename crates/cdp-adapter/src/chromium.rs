//! chromiumoxide-backed browser session.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::input::InsertTextParams;
use chromiumoxide::error::CdpError;
use chromiumoxide::layout::Point;
use chromiumoxide::Page;
use futures::StreamExt;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::commands::{ElementProbe, ElementQuery};
use crate::config::CdpConfig;
use crate::driver::{BrowserSession, LaunchOptions, PageDriver, SessionLauncher};
use crate::error::{AdapterError, AdapterErrorKind};
use crate::metrics;
use crate::script::{element_script, ScriptMode, ScriptReply};

fn map_cdp_error(err: CdpError) -> AdapterError {
    let hint = err.to_string();
    match err {
        CdpError::Timeout => AdapterError::new(AdapterErrorKind::NavTimeout)
            .with_hint(hint)
            .retriable(true),
        CdpError::JavascriptException(_) => {
            AdapterError::new(AdapterErrorKind::Script).with_hint(hint)
        }
        CdpError::Serde(_) => AdapterError::new(AdapterErrorKind::Internal).with_hint(hint),
        CdpError::Ws(_) | CdpError::ChannelSendError(_) | CdpError::NoResponse => {
            AdapterError::new(AdapterErrorKind::SessionClosed).with_hint(hint)
        }
        _ => AdapterError::new(AdapterErrorKind::CdpIo)
            .with_hint(hint)
            .retriable(true),
    }
}

async fn instrumented<T, F>(method: &'static str, fut: F) -> Result<T, AdapterError>
where
    F: Future<Output = Result<T, AdapterError>>,
{
    metrics::record_command(method);
    let started = Instant::now();
    let result = fut.await;
    match &result {
        Ok(_) => metrics::record_command_success(method, started.elapsed()),
        Err(err) => {
            metrics::record_command_failure(method);
            debug!(target: "cdp-adapter", method, error = %err, "command failed");
        }
    }
    result
}

/// Launches a fresh Chromium per run.
#[derive(Clone, Debug, Default)]
pub struct ChromiumLauncher {
    config: CdpConfig,
}

impl ChromiumLauncher {
    pub fn new(config: CdpConfig) -> Self {
        Self { config }
    }

    fn browser_config(&self, options: &LaunchOptions) -> Result<BrowserConfig, AdapterError> {
        let mut builder = BrowserConfig::builder()
            .window_size(self.config.window_width, self.config.window_height)
            .viewport(None);
        if !options.headless {
            builder = builder.with_head();
        }
        if let Some(path) = self.config.resolve_executable() {
            builder = builder.chrome_executable(path);
        }
        for arg in self.config.launch_args() {
            builder = builder.arg(arg);
        }
        if let Some(ua) = self.config.pick_user_agent() {
            debug!(target: "cdp-adapter", user_agent = %ua, "selected user agent");
            builder = builder.arg(format!("--user-agent={ua}"));
        }
        builder
            .build()
            .map_err(|err| AdapterError::new(AdapterErrorKind::LaunchFailed).with_hint(err))
    }
}

#[async_trait]
impl SessionLauncher for ChromiumLauncher {
    async fn launch(&self, options: &LaunchOptions) -> Result<Box<dyn BrowserSession>, AdapterError> {
        let config = self.browser_config(options)?;
        info!(target: "cdp-adapter", headless = options.headless, "launching chromium");
        let (browser, mut handler) = Browser::launch(config).await.map_err(|err| {
            AdapterError::new(AdapterErrorKind::LaunchFailed).with_hint(err.to_string())
        })?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(err) = event {
                    debug!(target: "cdp-adapter", error = %err, "browser handler error");
                }
            }
            debug!(target: "cdp-adapter", "browser handler finished");
        });

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(err) => {
                handler_task.abort();
                return Err(AdapterError::new(AdapterErrorKind::LaunchFailed)
                    .with_hint(format!("failed to open page: {err}")));
            }
        };

        Ok(Box::new(ChromiumSession {
            browser: tokio::sync::Mutex::new(Some(browser)),
            handler: parking_lot::Mutex::new(Some(handler_task)),
            page: Arc::new(ChromiumPage { page }),
        }))
    }
}

pub struct ChromiumSession {
    browser: tokio::sync::Mutex<Option<Browser>>,
    handler: parking_lot::Mutex<Option<JoinHandle<()>>>,
    page: Arc<ChromiumPage>,
}

#[async_trait]
impl BrowserSession for ChromiumSession {
    fn page(&self) -> Arc<dyn PageDriver> {
        self.page.clone()
    }

    async fn close(&self) -> Result<(), AdapterError> {
        let Some(mut browser) = self.browser.lock().await.take() else {
            return Ok(());
        };
        let closed = browser.close().await.map(|_| ()).map_err(map_cdp_error);
        if let Err(err) = browser.wait().await {
            warn!(target: "cdp-adapter", error = %err, "waiting for chromium exit failed");
        }
        if let Some(handle) = self.handler.lock().take() {
            handle.abort();
        }
        info!(target: "cdp-adapter", "chromium closed");
        closed
    }
}

impl Drop for ChromiumSession {
    fn drop(&mut self) {
        if let Some(handle) = self.handler.get_mut().take() {
            handle.abort();
        }
    }
}

pub struct ChromiumPage {
    page: Page,
}

impl ChromiumPage {
    async fn run_script(
        &self,
        query: &ElementQuery,
        mode: ScriptMode,
    ) -> Result<ScriptReply, AdapterError> {
        let script = element_script(query, mode)?;
        let result = self.page.evaluate(script).await.map_err(map_cdp_error)?;
        result
            .into_value::<ScriptReply>()
            .map_err(|err| AdapterError::new(AdapterErrorKind::Internal).with_hint(err.to_string()))
    }

    async fn require(
        &self,
        query: &ElementQuery,
        mode: ScriptMode,
    ) -> Result<ElementProbe, AdapterError> {
        self.run_script(query, mode)
            .await?
            .into_probe()?
            .ok_or_else(|| {
                AdapterError::new(AdapterErrorKind::TargetNotFound)
                    .with_hint(format!("{query} is no longer on the page"))
            })
    }
}

#[async_trait]
impl PageDriver for ChromiumPage {
    async fn navigate(&self, url: &str, deadline: Duration) -> Result<(), AdapterError> {
        instrumented("Page.navigate", async {
            match tokio::time::timeout(deadline, self.page.goto(url)).await {
                Ok(Ok(_)) => Ok(()),
                Ok(Err(err)) => {
                    let err = map_cdp_error(err);
                    if err.kind == AdapterErrorKind::CdpIo {
                        Err(AdapterError::new(AdapterErrorKind::NavFailed)
                            .with_hint(format!("{url}: {}", err.hint.unwrap_or_default())))
                    } else {
                        Err(err)
                    }
                }
                Err(_) => Err(AdapterError::new(AdapterErrorKind::NavTimeout)
                    .with_hint(format!("{url} did not load within {}ms", deadline.as_millis()))
                    .retriable(true)),
            }
        })
        .await
    }

    async fn current_url(&self) -> Result<String, AdapterError> {
        let url = self.page.url().await.map_err(map_cdp_error)?;
        Ok(url.unwrap_or_default())
    }

    async fn probe(&self, query: &ElementQuery) -> Result<Option<ElementProbe>, AdapterError> {
        instrumented("Runtime.evaluate", async {
            self.run_script(query, ScriptMode::Probe).await?.into_probe()
        })
        .await
    }

    async fn click(&self, query: &ElementQuery) -> Result<(), AdapterError> {
        instrumented("Input.dispatchMouseEvent", async {
            let target = self.require(query, ScriptMode::Locate).await?;
            self.page
                .click(Point::new(target.x, target.y))
                .await
                .map_err(map_cdp_error)?;
            Ok(())
        })
        .await
    }

    async fn fill(&self, query: &ElementQuery, text: &str) -> Result<(), AdapterError> {
        instrumented("Input.insertText", async {
            self.require(query, ScriptMode::Focus).await?;
            self.page
                .execute(InsertTextParams::new(text))
                .await
                .map_err(map_cdp_error)?;
            Ok(())
        })
        .await
    }
}
