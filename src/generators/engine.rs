//! Headless rendering engine lifecycle.
//!
//! One [`RenderingEngine`] is shared by every request. It moves through
//! `Uninitialized -> Launching -> Ready -> Terminated` (or `Failed` when the
//! launch does not succeed). Renders wait on the launch barrier for at most
//! `ready_timeout`, and every render runs on its own surface under a
//! concurrency ceiling and a per-call timeout.

use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinHandle;

use super::traits::{BackendLauncher, RenderBackend};
use super::EngineError;
use crate::config::LaunchOptions;

/// CSS pixels per inch, the unit the browser print margins are expressed in.
pub const CSS_PX_PER_INCH: f64 = 96.0;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineState {
    Uninitialized,
    Launching,
    Ready,
    Terminated,
    Failed(String),
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uninitialized => write!(f, "uninitialized"),
            Self::Launching => write!(f, "launching"),
            Self::Ready => write!(f, "ready"),
            Self::Terminated => write!(f, "terminated"),
            Self::Failed(_) => write!(f, "failed"),
        }
    }
}

/// Page margins in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Margins {
    pub top: f64,
    pub bottom: f64,
    pub left: f64,
    pub right: f64,
}

/// Paper format and print options for every rendered invoice.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageLayout {
    /// Paper width in inches.
    pub paper_width: f64,
    /// Paper height in inches.
    pub paper_height: f64,
    pub margins: Margins,
    pub print_background: bool,
}

impl PageLayout {
    /// A4 with the invoice margins (top 30, bottom 10, left/right 15).
    pub fn a4_invoice() -> Self {
        Self {
            paper_width: 8.27,
            paper_height: 11.7,
            margins: Margins {
                top: 30.0,
                bottom: 10.0,
                left: 15.0,
                right: 15.0,
            },
            print_background: true,
        }
    }

    /// Margins converted to inches, ordered top, bottom, left, right.
    pub fn margins_in_inches(&self) -> (f64, f64, f64, f64) {
        let m = self.margins;
        (
            m.top / CSS_PX_PER_INCH,
            m.bottom / CSS_PX_PER_INCH,
            m.left / CSS_PX_PER_INCH,
            m.right / CSS_PX_PER_INCH,
        )
    }
}

impl Default for PageLayout {
    fn default() -> Self {
        Self::a4_invoice()
    }
}

#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// Maximum number of surfaces rendering at the same time.
    pub max_concurrent_renders: usize,
    pub render_timeout: Duration,
    /// How long a render waits for a launching engine.
    pub ready_timeout: Duration,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            max_concurrent_renders: 4,
            render_timeout: Duration::from_secs(30),
            ready_timeout: Duration::from_secs(10),
        }
    }
}

pub struct RenderingEngine {
    settings: EngineSettings,
    layout: PageLayout,
    state: watch::Sender<EngineState>,
    backend: RwLock<Option<Arc<dyn RenderBackend>>>,
    permits: Arc<Semaphore>,
}

impl RenderingEngine {
    pub fn new(settings: EngineSettings) -> Self {
        Self::with_layout(settings, PageLayout::a4_invoice())
    }

    pub fn with_layout(settings: EngineSettings, layout: PageLayout) -> Self {
        let permits = Arc::new(Semaphore::new(settings.max_concurrent_renders.max(1)));
        Self {
            settings,
            layout,
            state: watch::Sender::new(EngineState::Uninitialized),
            backend: RwLock::new(None),
            permits,
        }
    }

    pub fn state(&self) -> EngineState {
        self.state.borrow().clone()
    }

    pub fn layout(&self) -> &PageLayout {
        &self.layout
    }

    /// Begin launching in the background and return immediately.
    ///
    /// The engine is already `Launching` when this returns, so requests that
    /// arrive before the launch completes wait on the barrier.
    pub fn start(
        self: &Arc<Self>,
        launcher: Arc<dyn BackendLauncher>,
        options: LaunchOptions,
    ) -> Result<JoinHandle<Result<(), EngineError>>, EngineError> {
        self.begin_launch()?;
        let engine = Arc::clone(self);
        Ok(tokio::spawn(async move {
            engine.finish_launch(launcher.as_ref(), &options).await
        }))
    }

    /// Launch and wait until the engine is `Ready` or `Failed`.
    pub async fn launch(
        &self,
        launcher: &dyn BackendLauncher,
        options: &LaunchOptions,
    ) -> Result<(), EngineError> {
        self.begin_launch()?;
        self.finish_launch(launcher, options).await
    }

    fn begin_launch(&self) -> Result<(), EngineError> {
        let started = self.state.send_if_modified(|state| {
            if *state == EngineState::Uninitialized {
                *state = EngineState::Launching;
                true
            } else {
                false
            }
        });

        if !started {
            return Err(EngineError::LaunchFailure(format!(
                "engine is already {}",
                self.state()
            )));
        }
        log::info!("Launching rendering engine");
        Ok(())
    }

    async fn finish_launch(
        &self,
        launcher: &dyn BackendLauncher,
        options: &LaunchOptions,
    ) -> Result<(), EngineError> {
        match launcher.launch(options).await {
            Ok(backend) => {
                // Publish under the backend lock so a concurrent shutdown
                // either takes this backend or has already terminated the state.
                let ready = {
                    let mut slot = self.backend.write();
                    let ready = self.state.send_if_modified(|state| {
                        if *state == EngineState::Launching {
                            *state = EngineState::Ready;
                            true
                        } else {
                            false
                        }
                    });
                    if ready {
                        *slot = Some(backend.clone());
                    }
                    ready
                };

                if ready {
                    log::info!("Rendering engine ready ({:?})", options);
                    return Ok(());
                }

                let state = self.state();
                log::warn!("Rendering engine launched after it was {}; stopping it", state);
                if let Err(e) = backend.shutdown().await {
                    log::error!("Failed to stop late rendering engine: {}", e);
                }
                Err(EngineError::Unavailable(state))
            }
            Err(e) => {
                log::error!("Rendering engine failed to launch: {}", e);
                self.state.send_if_modified(|state| {
                    if *state == EngineState::Launching {
                        *state = EngineState::Failed(e.to_string());
                        true
                    } else {
                        false
                    }
                });
                Err(EngineError::LaunchFailure(e.to_string()))
            }
        }
    }

    /// Wait on the launch barrier and return the backend once `Ready`.
    async fn ready_backend(&self) -> Result<Arc<dyn RenderBackend>, EngineError> {
        let mut rx = self.state.subscribe();
        let waited = tokio::time::timeout(
            self.settings.ready_timeout,
            rx.wait_for(|state| *state != EngineState::Launching),
        )
        .await;

        let state = match waited {
            Err(_) => return Err(EngineError::Unavailable(EngineState::Launching)),
            Ok(Err(_)) => EngineState::Terminated,
            Ok(Ok(state)) => state.clone(),
        };

        if state != EngineState::Ready {
            return Err(EngineError::Unavailable(state));
        }

        self.backend
            .read()
            .clone()
            .ok_or(EngineError::Unavailable(EngineState::Terminated))
    }

    /// Render `markup` into PDF bytes on an isolated surface.
    pub async fn render_to_pdf(&self, markup: &str) -> Result<Vec<u8>, EngineError> {
        let backend = self.ready_backend().await?;

        // The timeout covers queueing for a permit as well as the print.
        let render = async {
            let _permit = self
                .permits
                .acquire()
                .await
                .map_err(|_| EngineError::Unavailable(EngineState::Terminated))?;
            backend.print_pdf(markup, &self.layout).await
        };
        let pdf = tokio::time::timeout(self.settings.render_timeout, render)
            .await
            .map_err(|_| EngineError::Timeout(self.settings.render_timeout))??;

        if !pdf.starts_with(b"%PDF") {
            return Err(EngineError::RenderFailure(
                "engine returned output that is not a PDF document".to_string(),
            ));
        }

        Ok(pdf)
    }

    /// Stop the engine. Pending and future renders fail as unavailable.
    pub async fn shutdown(&self) {
        let (previous, backend) = {
            let mut slot = self.backend.write();
            (self.state.send_replace(EngineState::Terminated), slot.take())
        };
        self.permits.close();

        if let Some(backend) = backend {
            if let Err(e) = backend.shutdown().await {
                log::error!("Failed to stop rendering engine: {}", e);
            }
        }
        log::info!("Rendering engine terminated (was {})", previous);
    }
}
