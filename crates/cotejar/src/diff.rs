//! Pixel-level image comparison.
//!
//! Compares two equal-size RGBA buffers with a perceptual (YIQ) color
//! metric, paints a highlight-colored diff image, and reports the share
//! of differing pixels. Pixels inside mask regions never contribute to
//! the count. Anti-aliasing suppression is on by default: a differing
//! pixel that sits on a significant local gradient in both images is
//! treated as sub-pixel rendering noise, not a real difference. Set
//! [`DiffConfig::with_antialiasing`] to `false` for a plain
//! perceptual-threshold diff.
//!
//! The comparison is pure: identical inputs always produce identical
//! counts and identical diff image bytes.

use crate::result::{CotejarError, CotejarResult};
use image::{Rgba, RgbaImage};

/// Maximum possible YIQ color distance (squared), reached between
/// pure black and pure white. Thresholds scale against this.
const MAX_YIQ_DELTA: f64 = 35215.0;

// =============================================================================
// CONFIGURATION
// =============================================================================

/// Configuration for pixel comparison
#[derive(Debug, Clone)]
pub struct DiffConfig {
    /// Perceptual sensitivity (0.0 = exact match only, 1.0 = most permissive)
    pub threshold: f64,
    /// Highlight color painted over differing pixels
    pub highlight_color: [u8; 3],
    /// Opacity of the dimmed grayscale background (0.0-1.0)
    pub highlight_alpha: f64,
    /// Color painted over pixels suppressed as anti-aliasing noise
    pub aa_color: [u8; 3],
    /// Whether to suppress anti-aliased edge pixels
    pub detect_antialiasing: bool,
}

impl Default for DiffConfig {
    fn default() -> Self {
        Self {
            threshold: 0.1,
            highlight_color: [255, 0, 255],
            highlight_alpha: 0.1,
            aa_color: [255, 255, 0],
            detect_antialiasing: true,
        }
    }
}

impl DiffConfig {
    /// Set the perceptual threshold
    #[must_use]
    pub const fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    /// Set the highlight color
    #[must_use]
    pub const fn with_highlight_color(mut self, color: [u8; 3]) -> Self {
        self.highlight_color = color;
        self
    }

    /// Set the background dimming opacity
    #[must_use]
    pub const fn with_highlight_alpha(mut self, alpha: f64) -> Self {
        self.highlight_alpha = alpha;
        self
    }

    /// Enable or disable anti-aliasing suppression
    #[must_use]
    pub const fn with_antialiasing(mut self, detect: bool) -> Self {
        self.detect_antialiasing = detect;
        self
    }
}

// =============================================================================
// MASK REGIONS
// =============================================================================

/// Screen rectangle excluded from comparison (timestamps, ads, dynamic
/// content). Resolved upstream; the engine only sees rectangles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct MaskRegion {
    /// X coordinate of the top-left corner
    pub x: u32,
    /// Y coordinate of the top-left corner
    pub y: u32,
    /// Region width
    pub width: u32,
    /// Region height
    pub height: u32,
}

impl MaskRegion {
    /// Create a new mask region
    #[must_use]
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Check whether a pixel position falls inside this region
    #[must_use]
    pub const fn contains(&self, px: u32, py: u32) -> bool {
        px >= self.x && px < self.x + self.width && py >= self.y && py < self.y + self.height
    }
}

// =============================================================================
// OUTCOME
// =============================================================================

/// Result of comparing two images
#[derive(Debug, Clone)]
pub struct DiffOutcome {
    /// Visualized diff: differing pixels highlighted, everything else
    /// rendered as dimmed grayscale of the baseline
    pub diff_image: RgbaImage,
    /// Number of differing pixels (post mask exclusion and AA suppression)
    pub diff_pixel_count: usize,
    /// Total number of pixels compared
    pub total_pixels: usize,
    /// Share of differing pixels as a percentage, rounded to 2 decimals
    pub mismatch_percent: f64,
}

impl DiffOutcome {
    /// Whether no pixel differed at all
    #[must_use]
    pub const fn is_identical(&self) -> bool {
        self.diff_pixel_count == 0
    }

    /// Unrounded mismatch percentage.
    ///
    /// Pass/fail decisions should use this (or `diff_pixel_count`)
    /// rather than the rounded display value: a single differing pixel
    /// in a large image rounds to 0.00 but is still a difference.
    #[must_use]
    pub fn raw_percent(&self) -> f64 {
        if self.total_pixels == 0 {
            0.0
        } else {
            (self.diff_pixel_count as f64 / self.total_pixels as f64) * 100.0
        }
    }
}

// =============================================================================
// ENGINE
// =============================================================================

/// Pixel comparison engine
#[derive(Debug, Clone, Default)]
pub struct DiffEngine {
    config: DiffConfig,
}

impl DiffEngine {
    /// Create an engine with the given configuration
    #[must_use]
    pub const fn new(config: DiffConfig) -> Self {
        Self { config }
    }

    /// Get the configuration
    #[must_use]
    pub const fn config(&self) -> &DiffConfig {
        &self.config
    }

    /// Compare two RGBA images of identical dimensions.
    ///
    /// # Errors
    ///
    /// Returns `DimensionMismatch` if the images differ in size and
    /// `EmptyImage` if either dimension is zero. Never truncates or
    /// stretches.
    pub fn compare(
        &self,
        baseline: &RgbaImage,
        current: &RgbaImage,
        masks: &[MaskRegion],
    ) -> CotejarResult<DiffOutcome> {
        let (width, height) = baseline.dimensions();
        let (cur_width, cur_height) = current.dimensions();

        if width != cur_width || height != cur_height {
            return Err(CotejarError::DimensionMismatch {
                baseline_width: width,
                baseline_height: height,
                current_width: cur_width,
                current_height: cur_height,
            });
        }
        if width == 0 || height == 0 {
            return Err(CotejarError::EmptyImage { width, height });
        }

        let max_delta = MAX_YIQ_DELTA * self.config.threshold * self.config.threshold;
        let highlight = Rgba([
            self.config.highlight_color[0],
            self.config.highlight_color[1],
            self.config.highlight_color[2],
            255,
        ]);
        let aa_paint = Rgba([
            self.config.aa_color[0],
            self.config.aa_color[1],
            self.config.aa_color[2],
            255,
        ]);

        let mut diff_image = RgbaImage::new(width, height);
        let mut diff_pixel_count = 0usize;

        for y in 0..height {
            for x in 0..width {
                let base_px = *baseline.get_pixel(x, y);

                if masks.iter().any(|m| m.contains(x, y)) {
                    diff_image.put_pixel(x, y, dim_pixel(base_px, self.config.highlight_alpha));
                    continue;
                }

                let delta = color_delta(base_px, *current.get_pixel(x, y), false);

                if delta.abs() > max_delta {
                    let suppressed = self.config.detect_antialiasing
                        && (antialiased(baseline, current, x, y)
                            || antialiased(current, baseline, x, y));
                    if suppressed {
                        diff_image.put_pixel(x, y, aa_paint);
                    } else {
                        diff_image.put_pixel(x, y, highlight);
                        diff_pixel_count += 1;
                    }
                } else {
                    diff_image.put_pixel(x, y, dim_pixel(base_px, self.config.highlight_alpha));
                }
            }
        }

        let total_pixels = (width as usize) * (height as usize);
        let mismatch_percent =
            round2((diff_pixel_count as f64 / total_pixels as f64) * 100.0);

        tracing::debug!(
            width,
            height,
            diff_pixel_count,
            mismatch_percent,
            "pixel comparison complete"
        );

        Ok(DiffOutcome {
            diff_image,
            diff_pixel_count,
            total_pixels,
            mismatch_percent,
        })
    }
}

// =============================================================================
// COLOR METRIC
// =============================================================================

/// Round to two decimal places
fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn rgb2y(r: f64, g: f64, b: f64) -> f64 {
    r.mul_add(0.298_895_31, g.mul_add(0.586_622_47, b * 0.114_482_23))
}

fn rgb2i(r: f64, g: f64, b: f64) -> f64 {
    r.mul_add(0.595_977_99, g.mul_add(-0.274_176_10, b * -0.321_801_89))
}

fn rgb2q(r: f64, g: f64, b: f64) -> f64 {
    r.mul_add(0.211_470_17, g.mul_add(-0.522_617_11, b * 0.311_146_94))
}

/// Blend a channel toward white by the given opacity
fn blend(channel: f64, alpha: f64) -> f64 {
    255.0 + (channel - 255.0) * alpha
}

/// Perceptual distance between two pixels in YIQ space.
///
/// Semi-transparent pixels are composited over white first. The sign
/// records which pixel is brighter; magnitude is what thresholds
/// compare against. With `y_only`, returns the brightness delta alone
/// (used by the anti-aliasing neighborhood scan).
fn color_delta(a: Rgba<u8>, b: Rgba<u8>, y_only: bool) -> f64 {
    if a == b {
        return 0.0;
    }

    let Rgba([r1, g1, b1, a1]) = a;
    let Rgba([r2, g2, b2, a2]) = b;

    let (mut r1, mut g1, mut b1) = (f64::from(r1), f64::from(g1), f64::from(b1));
    let (mut r2, mut g2, mut b2) = (f64::from(r2), f64::from(g2), f64::from(b2));
    let a1 = f64::from(a1) / 255.0;
    let a2 = f64::from(a2) / 255.0;

    if a1 < 1.0 {
        r1 = blend(r1, a1);
        g1 = blend(g1, a1);
        b1 = blend(b1, a1);
    }
    if a2 < 1.0 {
        r2 = blend(r2, a2);
        g2 = blend(g2, a2);
        b2 = blend(b2, a2);
    }

    let dy = rgb2y(r1, g1, b1) - rgb2y(r2, g2, b2);
    if y_only {
        return dy;
    }

    let di = rgb2i(r1, g1, b1) - rgb2i(r2, g2, b2);
    let dq = rgb2q(r1, g1, b1) - rgb2q(r2, g2, b2);

    let delta = 0.5053f64
        .mul_add(dy * dy, 0.299f64.mul_add(di * di, 0.1957 * dq * dq));

    // Sign marks which side is darker; count logic uses magnitude only.
    if dy > 0.0 {
        -delta
    } else {
        delta
    }
}

/// Render an unchanged pixel: its luma blended toward white
fn dim_pixel(px: Rgba<u8>, alpha: f64) -> Rgba<u8> {
    let Rgba([r, g, b, a]) = px;
    let luma = rgb2y(f64::from(r), f64::from(g), f64::from(b));
    let val = blend(luma, alpha * f64::from(a) / 255.0) as u8;
    Rgba([val, val, val, 255])
}

// =============================================================================
// ANTI-ALIASING HEURISTIC
// =============================================================================

/// Whether the pixel at (x, y) in `img` looks like an anti-aliased edge
/// pixel that also exists as an edge in `other`.
///
/// Scans the 3x3 neighborhood for the darkest and brightest neighbors;
/// the pixel is classified as anti-aliasing when one of those extremes
/// sits inside a flat run of identical pixels in both images.
fn antialiased(img: &RgbaImage, other: &RgbaImage, x: u32, y: u32) -> bool {
    let (width, height) = img.dimensions();
    let x0 = x.saturating_sub(1);
    let y0 = y.saturating_sub(1);
    let x2 = (x + 1).min(width - 1);
    let y2 = (y + 1).min(height - 1);

    let mut zeroes = u32::from(x == x0 || x == x2 || y == y0 || y == y2);
    let mut min = 0.0f64;
    let mut max = 0.0f64;
    let (mut min_x, mut min_y) = (0, 0);
    let (mut max_x, mut max_y) = (0, 0);

    let center = *img.get_pixel(x, y);
    for ny in y0..=y2 {
        for nx in x0..=x2 {
            if nx == x && ny == y {
                continue;
            }

            let delta = color_delta(center, *img.get_pixel(nx, ny), true);

            if delta == 0.0 {
                zeroes += 1;
                // More than two flat neighbors: not an edge pixel.
                if zeroes > 2 {
                    return false;
                }
            } else if delta < min {
                min = delta;
                min_x = nx;
                min_y = ny;
            } else if delta > max {
                max = delta;
                max_x = nx;
                max_y = ny;
            }
        }
    }

    // No darker or no brighter neighbor: not an edge.
    if min == 0.0 || max == 0.0 {
        return false;
    }

    (has_many_siblings(img, min_x, min_y) && has_many_siblings(other, min_x, min_y))
        || (has_many_siblings(img, max_x, max_y) && has_many_siblings(other, max_x, max_y))
}

/// Whether the pixel at (x, y) has more than two identical neighbors
fn has_many_siblings(img: &RgbaImage, x: u32, y: u32) -> bool {
    let (width, height) = img.dimensions();
    let x0 = x.saturating_sub(1);
    let y0 = y.saturating_sub(1);
    let x2 = (x + 1).min(width - 1);
    let y2 = (y + 1).min(height - 1);

    let mut zeroes = u32::from(x == x0 || x == x2 || y == y0 || y == y2);
    let center = img.get_pixel(x, y);

    for ny in y0..=y2 {
        for nx in x0..=x2 {
            if nx == x && ny == y {
                continue;
            }
            if img.get_pixel(nx, ny) == center {
                zeroes += 1;
            }
            if zeroes > 2 {
                return true;
            }
        }
    }

    false
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn solid(width: u32, height: u32, color: [u8; 4]) -> RgbaImage {
        let mut img = RgbaImage::new(width, height);
        for pixel in img.pixels_mut() {
            *pixel = Rgba(color);
        }
        img
    }

    #[test]
    fn config_defaults() {
        let config = DiffConfig::default();
        assert!((config.threshold - 0.1).abs() < f64::EPSILON);
        assert_eq!(config.highlight_color, [255, 0, 255]);
        assert!((config.highlight_alpha - 0.1).abs() < f64::EPSILON);
        assert!(config.detect_antialiasing);
    }

    #[test]
    fn config_builder() {
        let config = DiffConfig::default()
            .with_threshold(0.0)
            .with_highlight_color([255, 0, 0])
            .with_highlight_alpha(0.5)
            .with_antialiasing(false);
        assert!((config.threshold - 0.0).abs() < f64::EPSILON);
        assert_eq!(config.highlight_color, [255, 0, 0]);
        assert!(!config.detect_antialiasing);
    }

    #[test]
    fn identical_images_are_exact_zero() {
        let img = solid(100, 100, [255, 0, 0, 255]);
        let outcome = DiffEngine::default().compare(&img, &img, &[]).unwrap();

        assert!(outcome.is_identical());
        assert_eq!(outcome.diff_pixel_count, 0);
        assert_eq!(outcome.total_pixels, 10_000);
        assert!((outcome.mismatch_percent - 0.0).abs() < f64::EPSILON);

        // No highlighted pixel anywhere in the visualization.
        let magenta = Rgba([255, 0, 255, 255]);
        assert!(outcome.diff_image.pixels().all(|p| *p != magenta));
    }

    #[test]
    fn full_mismatch_is_one_hundred() {
        let black = solid(10, 10, [0, 0, 0, 255]);
        let white = solid(10, 10, [255, 255, 255, 255]);
        let outcome = DiffEngine::default().compare(&black, &white, &[]).unwrap();

        assert_eq!(outcome.diff_pixel_count, 100);
        assert!((outcome.mismatch_percent - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn differing_quadrant_counts_and_masks_out() {
        let baseline = solid(10, 10, [0, 0, 0, 255]);
        let mut current = solid(10, 10, [0, 0, 0, 255]);
        for y in 0..5 {
            for x in 0..5 {
                current.put_pixel(x, y, Rgba([255, 255, 255, 255]));
            }
        }

        let engine = DiffEngine::default();

        let unmasked = engine.compare(&baseline, &current, &[]).unwrap();
        assert_eq!(unmasked.diff_pixel_count, 25);
        assert!((unmasked.mismatch_percent - 25.0).abs() < f64::EPSILON);

        let masked = engine
            .compare(&baseline, &current, &[MaskRegion::new(0, 0, 5, 5)])
            .unwrap();
        assert_eq!(masked.diff_pixel_count, 0);
        assert!((masked.mismatch_percent - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn dimension_mismatch_is_an_error() {
        let a = solid(10, 10, [0, 0, 0, 255]);
        let b = solid(10, 12, [0, 0, 0, 255]);
        let result = DiffEngine::default().compare(&a, &b, &[]);
        assert!(matches!(
            result,
            Err(CotejarError::DimensionMismatch {
                baseline_width: 10,
                baseline_height: 10,
                current_width: 10,
                current_height: 12,
            })
        ));
    }

    #[test]
    fn empty_image_is_an_error() {
        let a = RgbaImage::new(0, 10);
        let b = RgbaImage::new(0, 10);
        let result = DiffEngine::default().compare(&a, &b, &[]);
        assert!(matches!(result, Err(CotejarError::EmptyImage { .. })));
    }

    #[test]
    fn count_is_symmetric() {
        let mut a = solid(8, 8, [20, 40, 60, 255]);
        let mut b = solid(8, 8, [20, 40, 60, 255]);
        a.put_pixel(1, 1, Rgba([200, 10, 10, 255]));
        a.put_pixel(6, 3, Rgba([0, 0, 0, 255]));
        b.put_pixel(4, 4, Rgba([255, 255, 255, 255]));

        let engine = DiffEngine::default();
        let ab = engine.compare(&a, &b, &[]).unwrap();
        let ba = engine.compare(&b, &a, &[]).unwrap();
        assert_eq!(ab.diff_pixel_count, ba.diff_pixel_count);
    }

    #[test]
    fn max_threshold_is_most_permissive() {
        // Even black vs white sits below the ceiling at threshold 1.0.
        let black = solid(4, 4, [0, 0, 0, 255]);
        let white = solid(4, 4, [255, 255, 255, 255]);
        let engine = DiffEngine::new(DiffConfig::default().with_threshold(1.0));
        let outcome = engine.compare(&black, &white, &[]).unwrap();
        assert_eq!(outcome.diff_pixel_count, 0);
    }

    #[test]
    fn zero_threshold_catches_minimal_difference() {
        let a = solid(4, 4, [100, 100, 100, 255]);
        let mut b = solid(4, 4, [100, 100, 100, 255]);
        b.put_pixel(0, 0, Rgba([101, 100, 100, 255]));

        let engine = DiffEngine::new(
            DiffConfig::default()
                .with_threshold(0.0)
                .with_antialiasing(false),
        );
        let outcome = engine.compare(&a, &b, &[]).unwrap();
        assert_eq!(outcome.diff_pixel_count, 1);
    }

    #[test]
    fn antialiased_edge_is_suppressed() {
        // Baseline has a smoothed edge (gray transition column); current
        // has the same edge without smoothing. Every differing pixel sits
        // on a gradient in both images.
        let mut baseline = RgbaImage::new(5, 5);
        let mut current = RgbaImage::new(5, 5);
        for y in 0..5 {
            for x in 0..5 {
                let base_col = match x {
                    0 | 1 => [0, 0, 0, 255],
                    2 => [128, 128, 128, 255],
                    _ => [255, 255, 255, 255],
                };
                let cur_col = if x < 2 {
                    [0, 0, 0, 255]
                } else {
                    [255, 255, 255, 255]
                };
                baseline.put_pixel(x, y, Rgba(base_col));
                current.put_pixel(x, y, Rgba(cur_col));
            }
        }

        let with_aa = DiffEngine::default()
            .compare(&baseline, &current, &[])
            .unwrap();
        let without_aa = DiffEngine::new(DiffConfig::default().with_antialiasing(false))
            .compare(&baseline, &current, &[])
            .unwrap();

        assert_eq!(without_aa.diff_pixel_count, 5);
        assert!(with_aa.diff_pixel_count < without_aa.diff_pixel_count);
    }

    #[test]
    fn isolated_pixel_change_is_not_suppressed() {
        // A lone changed pixel has no matching gradient and must count
        // even with anti-aliasing detection on.
        let baseline = solid(5, 5, [0, 0, 0, 255]);
        let mut current = solid(5, 5, [0, 0, 0, 255]);
        current.put_pixel(2, 2, Rgba([255, 255, 255, 255]));

        let outcome = DiffEngine::default()
            .compare(&baseline, &current, &[])
            .unwrap();
        assert_eq!(outcome.diff_pixel_count, 1);
    }

    #[test]
    fn rounded_zero_still_fails_identity() {
        // One pixel in 200x200 rounds to a 0.00 display value but the
        // exact count stays authoritative.
        let baseline = solid(200, 200, [0, 0, 0, 255]);
        let mut current = solid(200, 200, [0, 0, 0, 255]);
        current.put_pixel(0, 0, Rgba([255, 255, 255, 255]));

        let outcome = DiffEngine::default()
            .compare(&baseline, &current, &[])
            .unwrap();
        assert_eq!(outcome.diff_pixel_count, 1);
        assert!((outcome.mismatch_percent - 0.0).abs() < f64::EPSILON);
        assert!(outcome.raw_percent() > 0.0);
        assert!(!outcome.is_identical());
    }

    #[test]
    fn mask_outside_difference_changes_nothing() {
        let baseline = solid(10, 10, [0, 0, 0, 255]);
        let mut current = solid(10, 10, [0, 0, 0, 255]);
        current.put_pixel(0, 0, Rgba([255, 255, 255, 255]));

        let engine = DiffEngine::default();
        let masked = engine
            .compare(&baseline, &current, &[MaskRegion::new(5, 5, 5, 5)])
            .unwrap();
        assert_eq!(masked.diff_pixel_count, 1);
    }

    #[test]
    fn mask_region_contains() {
        let mask = MaskRegion::new(10, 20, 30, 40);
        assert!(mask.contains(10, 20));
        assert!(mask.contains(39, 59));
        assert!(!mask.contains(40, 20));
        assert!(!mask.contains(10, 60));
        assert!(!mask.contains(9, 20));
    }

    #[test]
    fn semi_transparent_pixels_composite_over_white() {
        // Fully transparent black and opaque white both composite to
        // white and must compare equal.
        let transparent = solid(4, 4, [0, 0, 0, 0]);
        let white = solid(4, 4, [255, 255, 255, 255]);
        let outcome = DiffEngine::default()
            .compare(&transparent, &white, &[])
            .unwrap();
        assert_eq!(outcome.diff_pixel_count, 0);
    }

    fn arb_image(width: u32, height: u32) -> impl Strategy<Value = RgbaImage> {
        proptest::collection::vec(0u8..=255, (width * height * 4) as usize).prop_map(
            move |bytes| {
                RgbaImage::from_raw(width, height, bytes).unwrap()
            },
        )
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn comparison_is_deterministic(a in arb_image(8, 8), b in arb_image(8, 8)) {
            let engine = DiffEngine::default();
            let first = engine.compare(&a, &b, &[]).unwrap();
            let second = engine.compare(&a, &b, &[]).unwrap();
            prop_assert_eq!(first.diff_pixel_count, second.diff_pixel_count);
            prop_assert_eq!(first.diff_image.as_raw(), second.diff_image.as_raw());
        }

        #[test]
        fn count_symmetry_holds(a in arb_image(8, 8), b in arb_image(8, 8)) {
            let engine = DiffEngine::default();
            let ab = engine.compare(&a, &b, &[]).unwrap();
            let ba = engine.compare(&b, &a, &[]).unwrap();
            prop_assert_eq!(ab.diff_pixel_count, ba.diff_pixel_count);
        }

        #[test]
        fn masking_more_never_increases_mismatch(
            a in arb_image(8, 8),
            b in arb_image(8, 8),
            x in 0u32..8,
            y in 0u32..8,
            w in 1u32..8,
            h in 1u32..8,
        ) {
            let engine = DiffEngine::default();
            let base_masks = vec![MaskRegion::new(0, 0, 3, 3)];
            let mut wider = base_masks.clone();
            wider.push(MaskRegion::new(x, y, w, h));

            let narrow = engine.compare(&a, &b, &base_masks).unwrap();
            let wide = engine.compare(&a, &b, &wider).unwrap();
            prop_assert!(wide.diff_pixel_count <= narrow.diff_pixel_count);
        }
    }
}
