//! On-disk report export.
//!
//! Lays comparison results out as a browsable tree; archive packaging
//! is left to downstream tooling:
//!
//! ```text
//! <root>/
//!   Baselines/<key>.png
//!   <timestamp>/<key>/baseline.png
//!   <timestamp>/<key>/current.png
//!   <timestamp>/<key>/diff.png
//! ```

use crate::baseline::{sanitize_key, BaselineStore};
use crate::result::CotejarResult;
use crate::workflow::ComparisonReport;
use std::path::{Path, PathBuf};

/// Writes comparison reports and baseline exports under a root directory
#[derive(Debug, Clone)]
pub struct ReportWriter {
    root: PathBuf,
}

impl ReportWriter {
    /// Create a writer rooted at the given directory (created lazily)
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Report root directory
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Write one comparison report's image triplet; returns the
    /// directory it landed in.
    ///
    /// # Errors
    ///
    /// Returns I/O errors from creating directories or writing files.
    pub fn write_report(&self, report: &ComparisonReport) -> CotejarResult<PathBuf> {
        let dir = self
            .root
            .join(&report.timestamp)
            .join(sanitize_key(&report.key));
        std::fs::create_dir_all(&dir)?;

        std::fs::write(dir.join("baseline.png"), &report.baseline_png)?;
        std::fs::write(dir.join("current.png"), &report.current_png)?;
        std::fs::write(dir.join("diff.png"), &report.diff_png)?;

        tracing::info!(dir = %dir.display(), "comparison report written");
        Ok(dir)
    }

    /// Export every stored baseline image; returns how many were
    /// written.
    ///
    /// # Errors
    ///
    /// Returns store and I/O errors.
    pub fn export_baselines(&self, store: &BaselineStore) -> CotejarResult<usize> {
        let keys = store.keys()?;
        if keys.is_empty() {
            return Ok(0);
        }

        let dir = self.root.join("Baselines");
        std::fs::create_dir_all(&dir)?;

        for key in &keys {
            let record = store.load(key)?;
            std::fs::write(dir.join(format!("{key}.png")), &record.image)?;
        }
        Ok(keys.len())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::baseline::CaptureRecord;
    use crate::geometry::WindowState;
    use crate::workflow::Verdict;

    fn sample_report() -> ComparisonReport {
        ComparisonReport {
            key: String::from("https://example.com/"),
            baseline_png: vec![1, 2, 3],
            current_png: vec![4, 5, 6],
            diff_png: vec![7, 8, 9],
            diff_pixel_count: 12,
            mismatch_percent: 0.12,
            verdict: Verdict::Fail,
            timestamp: String::from("2026-08-08-12-00-00"),
        }
    }

    #[test]
    fn report_triplet_lands_in_timestamped_dir() {
        let dir = tempfile::tempdir().unwrap();
        let writer = ReportWriter::new(dir.path());

        let out = writer.write_report(&sample_report()).unwrap();

        assert!(out.ends_with("2026-08-08-12-00-00/https___example_com_"));
        assert_eq!(std::fs::read(out.join("baseline.png")).unwrap(), vec![1, 2, 3]);
        assert_eq!(std::fs::read(out.join("current.png")).unwrap(), vec![4, 5, 6]);
        assert_eq!(std::fs::read(out.join("diff.png")).unwrap(), vec![7, 8, 9]);
    }

    #[test]
    fn baselines_export_by_key() {
        let store_dir = tempfile::tempdir().unwrap();
        let report_dir = tempfile::tempdir().unwrap();
        let store = BaselineStore::new(store_dir.path());

        let record = CaptureRecord {
            image: vec![9, 9, 9],
            width: 4,
            height: 4,
            state: WindowState::Normal,
        };
        store.save("front_page", &record).unwrap();

        let writer = ReportWriter::new(report_dir.path());
        let count = writer.export_baselines(&store).unwrap();

        assert_eq!(count, 1);
        assert_eq!(
            std::fs::read(report_dir.path().join("Baselines/front_page.png")).unwrap(),
            vec![9, 9, 9]
        );
    }

    #[test]
    fn empty_store_exports_nothing() {
        let store_dir = tempfile::tempdir().unwrap();
        let report_dir = tempfile::tempdir().unwrap();
        let store = BaselineStore::new(store_dir.path());
        let writer = ReportWriter::new(report_dir.path());

        assert_eq!(writer.export_baselines(&store).unwrap(), 0);
        assert!(!report_dir.path().join("Baselines").exists());
    }
}
