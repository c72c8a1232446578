//! Headless Chromium backend.
//!
//! Talks to Chrome over the DevTools protocol. Each render opens its own tab
//! (the rendering surface) and closes it on every exit path, including when
//! the render future is dropped by a timeout or a disconnected client.

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::page::PrintToPdfParams;
use chromiumoxide::Page;
use futures::StreamExt;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{oneshot, RwLock};
use tokio::task::JoinHandle;

use super::engine::PageLayout;
use super::traits::{BackendLauncher, RenderBackend};
use super::EngineError;
use crate::config::LaunchOptions;

/// Launches a headless Chrome process.
#[derive(Debug, Default)]
pub struct ChromiumLauncher;

impl ChromiumLauncher {
    pub fn new() -> Self {
        Self
    }
}

/// Build the browser configuration for a launch option.
pub fn browser_config(options: &LaunchOptions) -> Result<BrowserConfig, EngineError> {
    let builder = match options {
        LaunchOptions::Default => BrowserConfig::builder(),
        LaunchOptions::ExplicitPath {
            executable,
            no_sandbox,
        } => {
            let builder = BrowserConfig::builder().chrome_executable(executable);
            if *no_sandbox {
                builder.no_sandbox()
            } else {
                builder
            }
        }
    };

    builder.build().map_err(EngineError::LaunchFailure)
}

/// Translate the page layout into DevTools print parameters.
pub fn print_params(layout: &PageLayout) -> PrintToPdfParams {
    let (top, bottom, left, right) = layout.margins_in_inches();
    PrintToPdfParams {
        print_background: Some(layout.print_background),
        paper_width: Some(layout.paper_width),
        paper_height: Some(layout.paper_height),
        margin_top: Some(top),
        margin_bottom: Some(bottom),
        margin_left: Some(left),
        margin_right: Some(right),
        ..Default::default()
    }
}

#[async_trait]
impl BackendLauncher for ChromiumLauncher {
    async fn launch(&self, options: &LaunchOptions) -> Result<Arc<dyn RenderBackend>, EngineError> {
        let config = browser_config(options)?;
        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| EngineError::LaunchFailure(e.to_string()))?;

        // The handler drives the DevTools connection and must be polled for
        // as long as the browser lives.
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    log::debug!("Chromium handler event error: {}", e);
                }
            }
            log::info!("Chromium handler stopped");
        });

        Ok(Arc::new(ChromiumBackend {
            browser: Arc::new(RwLock::new(browser)),
            handler_task: parking_lot::Mutex::new(Some(handler_task)),
        }))
    }
}

/// Tabs are opened under a shared read lock; only shutdown takes it exclusively.
pub struct ChromiumBackend {
    browser: Arc<RwLock<Browser>>,
    handler_task: parking_lot::Mutex<Option<JoinHandle<()>>>,
}

impl ChromiumBackend {
    async fn open_surface(&self) -> Result<Surface, EngineError> {
        let browser = Arc::clone(&self.browser);
        hand_off(async move {
            let browser = browser.read().await;
            let page = browser.new_page("about:blank").await.map_err(render_failure)?;
            Ok(Surface::new(page))
        })
        .await
    }
}

#[async_trait]
impl RenderBackend for ChromiumBackend {
    async fn print_pdf(&self, markup: &str, layout: &PageLayout) -> Result<Vec<u8>, EngineError> {
        let surface = self.open_surface().await?;
        let result = surface.print(markup, layout).await;
        surface.close().await;
        result
    }

    async fn shutdown(&self) -> Result<(), EngineError> {
        let mut browser = self.browser.write().await;
        let closed = browser.close().await.map(|_| ()).map_err(render_failure);
        if let Err(e) = browser.wait().await {
            log::warn!("Failed to wait for Chromium to exit: {}", e);
        }

        if let Some(task) = self.handler_task.lock().take() {
            task.abort();
        }
        closed
    }
}

fn render_failure(err: impl std::fmt::Display) -> EngineError {
    EngineError::RenderFailure(err.to_string())
}

/// Run `open` on its own task and hand its output to the caller.
///
/// If the caller is dropped first (timeout, disconnected client) the task
/// still finishes and drops the output itself, so guards such as
/// [`Surface`] always run their cleanup.
async fn hand_off<T, F>(open: F) -> Result<T, EngineError>
where
    T: Send + 'static,
    F: Future<Output = Result<T, EngineError>> + Send + 'static,
{
    let (tx, rx) = oneshot::channel();
    tokio::spawn(async move {
        let _ = tx.send(open.await);
    });
    rx.await
        .map_err(|_| EngineError::RenderFailure("surface task ended without a result".to_string()))?
}

/// A browser tab scoped to one render.
struct Surface {
    page: Option<Page>,
}

impl Surface {
    fn new(page: Page) -> Self {
        Self { page: Some(page) }
    }

    async fn print(&self, markup: &str, layout: &PageLayout) -> Result<Vec<u8>, EngineError> {
        let page = self
            .page
            .as_ref()
            .ok_or_else(|| EngineError::RenderFailure("surface already closed".to_string()))?;

        page.set_content(markup).await.map_err(render_failure)?;
        page.pdf(print_params(layout)).await.map_err(render_failure)
    }

    async fn close(mut self) {
        if let Some(page) = self.page.take() {
            if let Err(e) = page.close().await {
                log::warn!("Failed to close rendering surface: {}", e);
            }
        }
    }
}

impl Drop for Surface {
    fn drop(&mut self) {
        // Reached when the render future is dropped before `close` ran.
        if let Some(page) = self.page.take() {
            match tokio::runtime::Handle::try_current() {
                Ok(handle) => {
                    handle.spawn(async move {
                        if let Err(e) = page.close().await {
                            log::warn!("Failed to close abandoned rendering surface: {}", e);
                        }
                    });
                }
                Err(_) => log::warn!("Rendering surface leaked: no runtime to close it on"),
            }
        }
    }
}
