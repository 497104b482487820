//! Cotejar CLI: offline visual regression comparisons
//!
//! ## Usage
//!
//! ```bash
//! cotejar diff old.png new.png --out diff.png     # Compare two files
//! cotejar baseline shot.png --key landing        # Record a baseline
//! cotejar compare shot.png --key landing         # Compare vs baseline
//! ```

use clap::{Args, Parser, Subcommand};
use cotejar::{
    BaselineStore, CaptureRecord, CompareWorkflow, CotejarError, CotejarResult, DiffConfig,
    DiffEngine, MaskRegion, ReportWriter, Verdict, WindowState,
};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(name = "cotejar", version, about = "Pixel-level visual regression comparisons")]
struct Cli {
    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Only report errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Compare two image files and write a visual diff
    Diff(DiffArgs),
    /// Record an image file as the baseline for a key
    Baseline(BaselineArgs),
    /// Compare an image file against a stored baseline
    Compare(CompareArgs),
}

#[derive(Debug, Args)]
struct DiffArgs {
    /// Baseline image file
    baseline: PathBuf,

    /// Current image file
    current: PathBuf,

    /// Where to write the visual diff
    #[arg(short, long, default_value = "diff.png")]
    out: PathBuf,

    /// Perceptual threshold (0.0 exact match, 1.0 most permissive)
    #[arg(short, long, default_value_t = 0.1)]
    threshold: f64,

    /// Rectangle to exclude from comparison, as x,y,w,h (repeatable)
    #[arg(long = "mask", value_name = "X,Y,W,H", value_parser = parse_mask)]
    masks: Vec<MaskRegion>,

    /// Disable anti-aliasing suppression
    #[arg(long)]
    no_aa: bool,
}

#[derive(Debug, Args)]
struct BaselineArgs {
    /// Screenshot file to record
    image: PathBuf,

    /// Key to store the baseline under (typically the page URL)
    #[arg(short, long)]
    key: String,

    /// Baseline store directory
    #[arg(long, default_value = "__baselines__")]
    store: PathBuf,
}

#[derive(Debug, Args)]
struct CompareArgs {
    /// Screenshot file to compare
    image: PathBuf,

    /// Key of the stored baseline
    #[arg(short, long)]
    key: String,

    /// Baseline store directory
    #[arg(long, default_value = "__baselines__")]
    store: PathBuf,

    /// Report output directory
    #[arg(long, default_value = "__reports__")]
    report: PathBuf,

    /// Perceptual threshold (0.0 exact match, 1.0 most permissive)
    #[arg(short, long, default_value_t = 0.1)]
    threshold: f64,

    /// Rectangle to exclude from comparison, as x,y,w,h (repeatable)
    #[arg(long = "mask", value_name = "X,Y,W,H", value_parser = parse_mask)]
    masks: Vec<MaskRegion>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(&cli);

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(cli: &Cli) {
    let level = if cli.quiet {
        "error"
    } else {
        match cli.verbose {
            0 => "warn",
            1 => "info",
            _ => "debug",
        }
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn run(cli: Cli) -> CotejarResult<ExitCode> {
    match cli.command {
        Commands::Diff(args) => run_diff(&args),
        Commands::Baseline(args) => run_baseline(&args),
        Commands::Compare(args) => run_compare(&args),
    }
}

fn run_diff(args: &DiffArgs) -> CotejarResult<ExitCode> {
    let baseline = cotejar::payload::decode_bytes(&std::fs::read(&args.baseline)?)?;
    let current = cotejar::payload::decode_bytes(&std::fs::read(&args.current)?)?;

    let engine = DiffEngine::new(
        DiffConfig::default()
            .with_threshold(args.threshold)
            .with_antialiasing(!args.no_aa),
    );
    let outcome = engine.compare(&baseline, &current, &args.masks)?;

    std::fs::write(&args.out, cotejar::payload::encode_png(&outcome.diff_image)?)?;

    println!(
        "{}",
        serde_json::json!({
            "mismatch_percent": format!("{:.2}", outcome.mismatch_percent),
            "diff_pixels": outcome.diff_pixel_count,
            "total_pixels": outcome.total_pixels,
            "diff_image": args.out,
        })
    );

    Ok(exit_for_count(outcome.diff_pixel_count))
}

fn run_baseline(args: &BaselineArgs) -> CotejarResult<ExitCode> {
    let bytes = std::fs::read(&args.image)?;
    let decoded = cotejar::payload::decode_bytes(&bytes)?;

    let record = CaptureRecord {
        image: cotejar::payload::encode_png(&decoded)?,
        width: decoded.width(),
        height: decoded.height(),
        state: WindowState::Normal,
    };

    let store = BaselineStore::new(&args.store);
    store.save(&args.key, &record)?;

    println!(
        "{}",
        serde_json::json!({
            "key": args.key,
            "width": record.width,
            "height": record.height,
            "store": args.store,
        })
    );

    Ok(ExitCode::SUCCESS)
}

fn run_compare(args: &CompareArgs) -> CotejarResult<ExitCode> {
    let current = std::fs::read(&args.image)?;

    let workflow = CompareWorkflow::new(BaselineStore::new(&args.store)).with_engine(
        DiffEngine::new(DiffConfig::default().with_threshold(args.threshold)),
    );

    let report = match workflow.compare_offline(&args.key, current, &args.masks) {
        Ok(report) => report,
        Err(CotejarError::BaselineMissing { name }) => {
            // Expected first-run condition, not a crash.
            eprintln!("No baseline found for '{name}'; record one with `cotejar baseline`");
            return Ok(ExitCode::FAILURE);
        }
        Err(e) => return Err(e),
    };

    let written = ReportWriter::new(&args.report).write_report(&report)?;

    println!(
        "{}",
        serde_json::json!({
            "key": report.key,
            "verdict": report.verdict,
            "mismatch_percent": format!("{:.2}", report.mismatch_percent),
            "diff_pixels": report.diff_pixel_count,
            "report_dir": written,
        })
    );

    Ok(match report.verdict {
        Verdict::Pass => ExitCode::SUCCESS,
        Verdict::Fail => ExitCode::FAILURE,
    })
}

fn exit_for_count(diff_pixels: usize) -> ExitCode {
    if diff_pixels == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

/// Parse a mask rectangle from `x,y,w,h`
fn parse_mask(raw: &str) -> Result<MaskRegion, String> {
    let parts: Vec<&str> = raw.split(',').map(str::trim).collect();
    if parts.len() != 4 {
        return Err(format!("expected x,y,w,h, got '{raw}'"));
    }
    let mut values = [0u32; 4];
    for (slot, part) in values.iter_mut().zip(&parts) {
        *slot = part
            .parse()
            .map_err(|_| format!("'{part}' is not a valid coordinate"))?;
    }
    let [x, y, w, h] = values;
    if w == 0 || h == 0 {
        return Err(String::from("mask width and height must be positive"));
    }
    Ok(MaskRegion::new(x, y, w, h))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn mask_parses_four_coordinates() {
        let mask = parse_mask("10,20,30,40").unwrap();
        assert_eq!(mask, MaskRegion::new(10, 20, 30, 40));
    }

    #[test]
    fn mask_allows_spaces() {
        let mask = parse_mask("1, 2, 3, 4").unwrap();
        assert_eq!(mask, MaskRegion::new(1, 2, 3, 4));
    }

    #[test]
    fn mask_rejects_wrong_arity() {
        assert!(parse_mask("1,2,3").is_err());
        assert!(parse_mask("1,2,3,4,5").is_err());
    }

    #[test]
    fn mask_rejects_non_numbers() {
        assert!(parse_mask("a,b,c,d").is_err());
    }

    #[test]
    fn mask_rejects_empty_rect() {
        assert!(parse_mask("0,0,0,10").is_err());
        assert!(parse_mask("0,0,10,0").is_err());
    }

    #[test]
    fn cli_parses_diff_command() {
        let cli = Cli::try_parse_from([
            "cotejar", "diff", "a.png", "b.png", "--out", "d.png", "--threshold", "0.2",
            "--mask", "0,0,10,10", "--no-aa",
        ])
        .unwrap();
        match cli.command {
            Commands::Diff(args) => {
                assert_eq!(args.baseline, PathBuf::from("a.png"));
                assert_eq!(args.current, PathBuf::from("b.png"));
                assert!((args.threshold - 0.2).abs() < f64::EPSILON);
                assert_eq!(args.masks.len(), 1);
                assert!(args.no_aa);
            }
            _ => panic!("expected diff command"),
        }
    }

    #[test]
    fn cli_parses_compare_defaults() {
        let cli =
            Cli::try_parse_from(["cotejar", "compare", "shot.png", "--key", "landing"]).unwrap();
        match cli.command {
            Commands::Compare(args) => {
                assert_eq!(args.key, "landing");
                assert_eq!(args.store, PathBuf::from("__baselines__"));
                assert_eq!(args.report, PathBuf::from("__reports__"));
            }
            _ => panic!("expected compare command"),
        }
    }
}
