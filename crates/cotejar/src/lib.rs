//! Cotejar: visual regression core for web pages.
//!
//! Cotejar (Spanish: "to collate, to compare") captures a baseline
//! screenshot of a page, later reproduces the same window geometry,
//! and reports a pixel-level mismatch between the two captures along
//! with a visualized diff image.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                     COTEJAR Architecture                         │
//! ├──────────────────────────────────────────────────────────────────┤
//! │  ┌───────────┐   ┌────────────┐   ┌───────────┐   ┌──────────┐  │
//! │  │ Geometry  │──►│ Stability  │──►│ Capture   │──►│ Pixel    │  │
//! │  │ Normalize │   │ Watcher    │   │ (external)│   │ Diff     │  │
//! │  └───────────┘   └────────────┘   └───────────┘   └──────────┘  │
//! │        ▲                                               │        │
//! │  ┌───────────┐                                   ┌──────────┐   │
//! │  │ Baseline  │◄──────────────────────────────────│ Report   │   │
//! │  │ Store     │                                   │ Export   │   │
//! │  └───────────┘                                   └──────────┘   │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Capture itself and window control are external capabilities behind
//! the [`CaptureSource`] and [`WindowController`] seams; the core is
//! the deterministic comparison pipeline between them.

#![warn(missing_docs)]
// Lints are configured in workspace Cargo.toml [workspace.lints.clippy]

mod baseline;
mod diff;
mod geometry;
pub mod payload;
mod report;
mod result;
mod stability;
mod workflow;

pub use baseline::{sanitize_key, BaselineStore, CaptureRecord};
pub use diff::{DiffConfig, DiffEngine, DiffOutcome, MaskRegion};
pub use geometry::{
    GeometryNormalizer, GeometryTarget, NormalizerConfig, WindowController, WindowGeometry,
    WindowState,
};
pub use report::ReportWriter;
pub use result::{CotejarError, CotejarResult};
pub use stability::{StabilityConfig, StabilityStatus, StabilityWatcher};
pub use workflow::{Capture, CaptureSource, CompareWorkflow, ComparisonReport, Verdict};
