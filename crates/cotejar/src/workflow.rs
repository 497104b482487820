//! Capture-and-compare orchestration.
//!
//! Ties the pieces together: load the stored baseline, drive the live
//! window back to the baseline's geometry, wait for the page to go
//! quiet, capture, and diff. One workflow invocation runs at a time
//! against a given window (the `&mut` borrows make concurrent resize
//! commands unrepresentable); comparisons over independent inputs can
//! run freely in parallel.

use crate::baseline::{BaselineStore, CaptureRecord};
use crate::diff::{DiffEngine, MaskRegion};
use crate::geometry::{GeometryNormalizer, WindowController, WindowGeometry};
use crate::payload;
use crate::result::CotejarResult;
use crate::stability::StabilityWatcher;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A fresh capture from the external capture collaborator
#[derive(Debug, Clone)]
pub struct Capture {
    /// PNG-encoded screenshot
    pub image: Vec<u8>,
    /// Window geometry observed at capture time
    pub geometry: WindowGeometry,
}

/// External screenshot capability.
///
/// The probe feeds the readiness wait: any cheap byte snapshot of the
/// monitored page (serialized DOM, layout digest). Sources with nothing
/// to report keep the default, which makes readiness immediate.
#[async_trait]
pub trait CaptureSource: Send + Sync {
    /// Take a screenshot of the current window contents
    async fn capture(&mut self) -> CotejarResult<Capture>;

    /// Snapshot the monitored resource for the stability watcher
    async fn probe(&self) -> CotejarResult<Vec<u8>> {
        Ok(Vec::new())
    }
}

/// Pass/fail outcome of a comparison.
///
/// Decided from the exact differing-pixel count, not the rounded
/// display percentage: one changed pixel fails even when it rounds to
/// 0.00.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    /// No pixel differed
    Pass,
    /// At least one pixel differed
    Fail,
}

/// Result of one comparison run; ownership transfers to the caller
#[derive(Debug, Clone)]
pub struct ComparisonReport {
    /// Key the comparison ran against
    pub key: String,
    /// Baseline screenshot (PNG)
    pub baseline_png: Vec<u8>,
    /// Current screenshot (PNG)
    pub current_png: Vec<u8>,
    /// Visualized diff (PNG)
    pub diff_png: Vec<u8>,
    /// Exact number of differing pixels
    pub diff_pixel_count: usize,
    /// Mismatch percentage rounded to 2 decimals
    pub mismatch_percent: f64,
    /// Pass/fail outcome
    pub verdict: Verdict,
    /// Local time of the run, `YYYY-MM-DD-HH-MM-SS`
    pub timestamp: String,
}

/// Orchestrates baseline recording and comparison runs
#[derive(Debug)]
pub struct CompareWorkflow {
    store: BaselineStore,
    normalizer: GeometryNormalizer,
    engine: DiffEngine,
    watcher: StabilityWatcher,
}

impl CompareWorkflow {
    /// Create a workflow over a baseline store with default components
    #[must_use]
    pub fn new(store: BaselineStore) -> Self {
        Self {
            store,
            normalizer: GeometryNormalizer::default(),
            engine: DiffEngine::default(),
            watcher: StabilityWatcher::default(),
        }
    }

    /// Replace the geometry normalizer
    #[must_use]
    pub fn with_normalizer(mut self, normalizer: GeometryNormalizer) -> Self {
        self.normalizer = normalizer;
        self
    }

    /// Replace the diff engine
    #[must_use]
    pub fn with_engine(mut self, engine: DiffEngine) -> Self {
        self.engine = engine;
        self
    }

    /// Replace the stability watcher
    #[must_use]
    pub fn with_watcher(mut self, watcher: StabilityWatcher) -> Self {
        self.watcher = watcher;
        self
    }

    /// The underlying baseline store
    #[must_use]
    pub const fn store(&self) -> &BaselineStore {
        &self.store
    }

    /// Capture and persist a new baseline under a key.
    ///
    /// Waits for the source's probe to go quiet first (a capped wait;
    /// a restless page is captured anyway).
    ///
    /// # Errors
    ///
    /// Propagates capture and store failures.
    pub async fn record_baseline<S>(
        &self,
        key: &str,
        source: &mut S,
    ) -> CotejarResult<CaptureRecord>
    where
        S: CaptureSource + ?Sized,
    {
        {
            let probe_src: &S = source;
            let status = self.watcher.wait_for_quiet(|| probe_src.probe()).await?;
            tracing::debug!(?status, "readiness wait before baseline capture");
        }

        let capture = source.capture().await?;
        let record = CaptureRecord {
            image: capture.image,
            width: capture.geometry.width,
            height: capture.geometry.height,
            state: capture.geometry.state,
        };
        self.store.save(key, &record)?;
        Ok(record)
    }

    /// Compare a fresh capture against the stored baseline.
    ///
    /// Restores the baseline's window geometry first, then waits for
    /// readiness (proceeding on timeout), captures, and diffs.
    ///
    /// # Errors
    ///
    /// `BaselineMissing` when no baseline exists for the key;
    /// `WindowOperation` when geometry restoration is rejected;
    /// `DimensionMismatch` when the captures still ended up unequal
    /// sizes (a sign the normalizer was silently defeated).
    pub async fn compare<S, C>(
        &self,
        key: &str,
        source: &mut S,
        controller: &mut C,
        masks: &[MaskRegion],
    ) -> CotejarResult<ComparisonReport>
    where
        S: CaptureSource + ?Sized,
        C: WindowController + ?Sized,
    {
        let record = self.store.load(key)?;

        self.normalizer
            .normalize(controller, &record.target())
            .await?;

        {
            let probe_src: &S = source;
            let status = self.watcher.wait_for_quiet(|| probe_src.probe()).await?;
            tracing::debug!(?status, "readiness wait before comparison capture");
        }

        let current = source.capture().await?;

        let baseline_img = payload::decode_bytes(&record.image)?;
        let current_img = payload::decode_bytes(&current.image)?;
        let outcome = self.engine.compare(&baseline_img, &current_img, masks)?;

        let verdict = if outcome.is_identical() {
            Verdict::Pass
        } else {
            Verdict::Fail
        };
        tracing::info!(
            key,
            mismatch_percent = outcome.mismatch_percent,
            diff_pixel_count = outcome.diff_pixel_count,
            ?verdict,
            "comparison complete"
        );

        Ok(ComparisonReport {
            key: key.to_string(),
            diff_png: payload::encode_png(&outcome.diff_image)?,
            baseline_png: record.image,
            current_png: current.image,
            diff_pixel_count: outcome.diff_pixel_count,
            mismatch_percent: outcome.mismatch_percent,
            verdict,
            timestamp: report_timestamp(),
        })
    }

    /// Compare an already-captured image against the stored baseline.
    ///
    /// The offline path for file-based runs: no window to normalize, no
    /// page to wait on — just the stored record against the bytes in
    /// hand.
    ///
    /// # Errors
    ///
    /// `BaselineMissing` when no baseline exists for the key; decode
    /// and dimension failures as in [`Self::compare`].
    pub fn compare_offline(
        &self,
        key: &str,
        current_png: Vec<u8>,
        masks: &[MaskRegion],
    ) -> CotejarResult<ComparisonReport> {
        let record = self.store.load(key)?;

        let baseline_img = payload::decode_bytes(&record.image)?;
        let current_img = payload::decode_bytes(&current_png)?;
        let outcome = self.engine.compare(&baseline_img, &current_img, masks)?;

        let verdict = if outcome.is_identical() {
            Verdict::Pass
        } else {
            Verdict::Fail
        };

        Ok(ComparisonReport {
            key: key.to_string(),
            diff_png: payload::encode_png(&outcome.diff_image)?,
            baseline_png: record.image,
            current_png,
            diff_pixel_count: outcome.diff_pixel_count,
            mismatch_percent: outcome.mismatch_percent,
            verdict,
            timestamp: report_timestamp(),
        })
    }
}

/// Local wall-clock formatted for report directory names
fn report_timestamp() -> String {
    chrono::Local::now().format("%Y-%m-%d-%H-%M-%S").to_string()
}
