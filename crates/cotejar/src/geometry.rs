//! Window geometry normalization.
//!
//! Before a comparable capture can be taken, the live window must match
//! the geometry recorded with the baseline. The normalizer drives an
//! external window-control capability through the minimal state machine:
//! restore maximized/fullscreen windows to normal, then resize to the
//! recorded pixel dimensions.
//!
//! Window-manager operations are asynchronous, so each command is
//! followed by a settle wait. Rather than a blind fixed delay, the wait
//! polls the live geometry until it confirms the command (early return)
//! or the settle budget elapses, in which case the normalizer proceeds
//! anyway: capture at a slightly-off geometry surfaces downstream as a
//! dimension mismatch, which is a better signal than hanging.

use crate::result::CotejarResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::{sleep, Instant};

// =============================================================================
// WINDOW STATE
// =============================================================================

/// Maximize/fullscreen mode of a window
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WindowState {
    /// Regular window with caller-controlled dimensions
    #[default]
    Normal,
    /// Maximized; the window manager controls dimensions
    Maximized,
    /// Fullscreen; the window manager controls dimensions
    Fullscreen,
}

impl WindowState {
    /// String form as used by window-management APIs
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Maximized => "maximized",
            Self::Fullscreen => "fullscreen",
        }
    }
}

impl std::fmt::Display for WindowState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Observed window geometry, re-read from the live window each call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowGeometry {
    /// Window width in pixels
    pub width: u32,
    /// Window height in pixels
    pub height: u32,
    /// Window state
    pub state: WindowState,
}

impl WindowGeometry {
    /// Create a new geometry value
    #[must_use]
    pub const fn new(width: u32, height: u32, state: WindowState) -> Self {
        Self {
            width,
            height,
            state,
        }
    }
}

/// Target geometry for normalization.
///
/// Absent width/height skip the resize step; the state defaults to
/// normal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeometryTarget {
    /// Target width (skip resize if absent)
    pub width: Option<u32>,
    /// Target height (skip resize if absent)
    pub height: Option<u32>,
    /// Target window state
    pub state: WindowState,
}

impl GeometryTarget {
    /// Target an exact size in the normal state
    #[must_use]
    pub const fn sized(width: u32, height: u32) -> Self {
        Self {
            width: Some(width),
            height: Some(height),
            state: WindowState::Normal,
        }
    }

    /// Target a window state without a size
    #[must_use]
    pub const fn stated(state: WindowState) -> Self {
        Self {
            width: None,
            height: None,
            state,
        }
    }

    /// Build the target that reproduces an observed geometry
    #[must_use]
    pub const fn from_geometry(geometry: WindowGeometry) -> Self {
        Self {
            width: Some(geometry.width),
            height: Some(geometry.height),
            state: geometry.state,
        }
    }
}

// =============================================================================
// WINDOW CONTROLLER SEAM
// =============================================================================

/// External window-management capability.
///
/// Only three operations are required: read geometry, change state, and
/// resize. `resize` implies the normal state (the platform forces it).
/// Implementations are platform glue (CDP, extension APIs); tests use a
/// mock.
#[async_trait]
pub trait WindowController: Send + Sync {
    /// Read the current window geometry
    async fn geometry(&self) -> CotejarResult<WindowGeometry>;

    /// Request a window state change
    async fn set_state(&mut self, state: WindowState) -> CotejarResult<()>;

    /// Request an exact window size; forces the normal state.
    ///
    /// Best-effort: the platform may not hit exact pixel targets (OS
    /// minimums), which is why callers re-read the achieved geometry.
    async fn resize(&mut self, width: u32, height: u32) -> CotejarResult<()>;
}

// =============================================================================
// NORMALIZER
// =============================================================================

/// Settle budgets and polling cadence for the normalizer
#[derive(Debug, Clone)]
pub struct NormalizerConfig {
    /// Budget after a state change or resize (ms)
    pub state_settle_ms: u64,
    /// Budget after restoring maximized/fullscreen to normal (ms)
    pub restore_settle_ms: u64,
    /// Geometry re-read cadence while settling (ms)
    pub poll_interval_ms: u64,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            state_settle_ms: 600,
            restore_settle_ms: 200,
            poll_interval_ms: 50,
        }
    }
}

impl NormalizerConfig {
    /// Set the state-change settle budget
    #[must_use]
    pub const fn with_state_settle_ms(mut self, ms: u64) -> Self {
        self.state_settle_ms = ms;
        self
    }

    /// Set the restore settle budget
    #[must_use]
    pub const fn with_restore_settle_ms(mut self, ms: u64) -> Self {
        self.restore_settle_ms = ms;
        self
    }

    /// Set the polling cadence
    #[must_use]
    pub const fn with_poll_interval_ms(mut self, ms: u64) -> Self {
        self.poll_interval_ms = ms;
        self
    }
}

/// Drives a window into a target geometry before capture
#[derive(Debug, Clone, Default)]
pub struct GeometryNormalizer {
    config: NormalizerConfig,
}

impl GeometryNormalizer {
    /// Create a normalizer with the given configuration
    #[must_use]
    pub const fn new(config: NormalizerConfig) -> Self {
        Self { config }
    }

    /// Get the configuration
    #[must_use]
    pub const fn config(&self) -> &NormalizerConfig {
        &self.config
    }

    /// Bring the window's observed geometry into alignment with the
    /// target.
    ///
    /// Idempotent: a window already at the target triggers no commands
    /// (no needless reflow or flicker). The `&mut` borrow on the
    /// controller keeps concurrent commands against the same window
    /// unrepresentable; callers run one normalize-then-capture sequence
    /// at a time.
    ///
    /// # Errors
    ///
    /// Propagates `WindowOperation` failures from the controller; the
    /// caller must abort the capture rather than shoot at a wrong
    /// geometry.
    pub async fn normalize<C>(&self, controller: &mut C, target: &GeometryTarget) -> CotejarResult<()>
    where
        C: WindowController + ?Sized,
    {
        let observed = controller.geometry().await?;
        tracing::debug!(
            observed_state = %observed.state,
            observed_width = observed.width,
            observed_height = observed.height,
            target_state = %target.state,
            "normalizing window geometry"
        );

        // Maximized/fullscreen targets: the window manager owns the
        // dimensions, so only the state is driven.
        if matches!(
            target.state,
            WindowState::Maximized | WindowState::Fullscreen
        ) {
            if observed.state != target.state {
                let want = target.state;
                controller.set_state(want).await?;
                self.settle(controller, self.config.state_settle_ms, move |g| {
                    g.state == want
                })
                .await?;
            }
            return Ok(());
        }

        let mut observed = observed;
        if matches!(
            observed.state,
            WindowState::Maximized | WindowState::Fullscreen
        ) {
            controller.set_state(WindowState::Normal).await?;
            self.settle(controller, self.config.restore_settle_ms, |g| {
                g.state == WindowState::Normal
            })
            .await?;
            observed = controller.geometry().await?;
        }

        if let (Some(width), Some(height)) = (target.width, target.height) {
            if observed.width != width || observed.height != height {
                controller.resize(width, height).await?;
                self.settle(controller, self.config.state_settle_ms, move |g| {
                    g.state == WindowState::Normal && g.width == width && g.height == height
                })
                .await?;
            }
        }

        Ok(())
    }

    /// Poll the live geometry until `confirmed` holds or the budget
    /// elapses. Timeout is not an error: proceed with whatever geometry
    /// the window settled into.
    async fn settle<C, F>(&self, controller: &C, budget_ms: u64, confirmed: F) -> CotejarResult<()>
    where
        C: WindowController + ?Sized,
        F: Fn(&WindowGeometry) -> bool,
    {
        let poll = Duration::from_millis(self.config.poll_interval_ms.max(1));
        let deadline = Instant::now() + Duration::from_millis(budget_ms);

        loop {
            let geometry = controller.geometry().await?;
            if confirmed(&geometry) {
                tracing::trace!(state = %geometry.state, "geometry settled");
                return Ok(());
            }

            let now = Instant::now();
            if now >= deadline {
                tracing::warn!(
                    budget_ms,
                    state = %geometry.state,
                    width = geometry.width,
                    height = geometry.height,
                    "settle budget elapsed, proceeding with unconfirmed geometry"
                );
                return Ok(());
            }
            sleep(poll.min(deadline - now)).await;
        }
    }
}
