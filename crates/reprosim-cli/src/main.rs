//! reprosim CLI
//!
//! Create, run and reproduce archived parameter sweeps.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use reprosim_core::metrics::METRICS;
use reprosim_core::telemetry::init_tracing;
use reprosim_core::{reproduce, LogProgress, ModelRegistry, Scalar, SimRecord, Spans};
use tracing::{warn, Level};

#[derive(Parser)]
#[command(name = "reprosim")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Reproducible stochastic parameter sweeps")]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the sweep described by a record, or check that it reproduces
    Simulate {
        /// Path to the simulation record
        path: PathBuf,

        /// Re-run and compare against the stored results
        #[arg(short, long)]
        reproduce: bool,

        /// Write the record here instead of back to <PATH>
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Write a fresh simulation record
    Create {
        /// Where to write the record
        path: PathBuf,

        /// Model reference (module:function)
        #[arg(short, long)]
        model: String,

        /// Parameter span as name=v1,v2,... (repeatable)
        #[arg(short, long = "span", value_name = "NAME=VALUES")]
        spans: Vec<String>,

        /// Output column name, in model return order (repeatable)
        #[arg(short, long = "output", value_name = "NAME", required = true)]
        outputs: Vec<String>,

        /// Seed for the pseudo-random generator
        #[arg(long)]
        seed: Option<u64>,

        /// Replicates per grid point
        #[arg(short, long, default_value_t = reprosim_core::DEFAULT_REPLICATES)]
        replicates: i64,
    },

    /// List registered models and their parameters
    Models,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    init_tracing(cli.json, level);

    let registry = ModelRegistry::with_builtins();

    let result = match cli.command {
        Commands::Simulate {
            path,
            reproduce,
            output,
        } => {
            if reproduce {
                cmd_reproduce(&registry, &path, output.as_deref()).map(|_| ())
            } else {
                cmd_simulate(&registry, &path, output.as_deref())
            }
        }
        Commands::Create {
            path,
            model,
            spans,
            outputs,
            seed,
            replicates,
        } => cmd_create(&path, &model, &spans, outputs, seed, replicates),
        Commands::Models => cmd_models(&registry),
    };

    METRICS.flush();
    result
}

/// Run a record's sweep and write the completed record
fn cmd_simulate(registry: &ModelRegistry, path: &Path, output: Option<&Path>) -> Result<()> {
    let mut record = SimRecord::load(path)
        .with_context(|| format!("Failed to load simulation record {:?}", path))?;

    let outcome = record
        .run(registry, &mut LogProgress::default(), None)
        .with_context(|| format!("Simulation of {} failed", record.model()))?;

    let target = output.unwrap_or(path);
    record
        .dump(target)
        .with_context(|| format!("Failed to write simulation record {:?}", target))?;

    println!(
        "Ran {} grid points ({} model calls, stream {})",
        outcome.grid_points, outcome.model_calls, outcome.origin
    );
    println!("Results written to: {}", target.display());
    Ok(())
}

/// Re-run a record and compare against its stored results.
///
/// The original file is never rewritten. A divergent re-run is saved to
/// `output`, or next to the original with a `.fail` suffix. Returns whether
/// the record reproduced.
fn cmd_reproduce(registry: &ModelRegistry, path: &Path, output: Option<&Path>) -> Result<bool> {
    let stored = SimRecord::load(path)
        .with_context(|| format!("Failed to load simulation record {:?}", path))?;
    if stored.results().is_none() {
        anyhow::bail!("No stored results to reproduce in {:?}", path);
    }

    let (report, rerun) = reproduce(&stored, registry, &mut LogProgress::default(), None)
        .with_context(|| format!("Re-run of {} failed", stored.model()))?;

    if report.reproduced() {
        println!("*** Simulation reproduced: OK ***");
        return Ok(true);
    }

    for mismatch in &report.mismatches {
        warn!(digest = %report.config_digest, "{}", mismatch);
    }
    println!("*** Simulation reproduced: FAIL ***");
    if let Some(hint) = reproduction_hint(&stored) {
        warn!("{hint}");
        println!("Note: {hint}");
    }

    let target = output.map(Path::to_path_buf).unwrap_or_else(|| fail_path(path));
    rerun
        .dump(&target)
        .with_context(|| format!("Failed to write divergent run {:?}", target))?;
    println!("Divergent run written to: {}", target.display());
    Ok(false)
}

/// Why a record cannot be expected to reproduce, if there is a known reason.
fn reproduction_hint(record: &SimRecord) -> Option<&'static str> {
    if record.seed().is_some() {
        return None;
    }
    Some(
        "record has no seed; its stored state is where the last run ended, \
         so a re-run continues the stream instead of repeating it",
    )
}

/// Build a new record from command-line spans and write it
fn cmd_create(
    path: &Path,
    model: &str,
    spans: &[String],
    outputs: Vec<String>,
    seed: Option<u64>,
    replicates: i64,
) -> Result<()> {
    if replicates < 0 {
        anyhow::bail!("Replicate count must not be negative, got {replicates}");
    }
    let spans = parse_spans(spans)?;
    let mut record = SimRecord::new(model, spans, outputs)
        .context("Invalid simulation record")?
        .with_replicates(replicates);
    if let Some(seed) = seed {
        record = record.with_seed(seed);
    }

    record
        .dump(path)
        .with_context(|| format!("Failed to write simulation record {:?}", path))?;
    println!("Created simulation record: {}", path.display());
    println!("  Model:  {}", record.model());
    println!("  Digest: {}", record.config_digest());
    Ok(())
}

fn cmd_models(registry: &ModelRegistry) -> Result<()> {
    if registry.is_empty() {
        println!("No models registered.");
        return Ok(());
    }
    for line in model_lines(registry) {
        println!("{line}");
    }
    Ok(())
}

/// One `reference(params)` line per registered model.
fn model_lines(registry: &ModelRegistry) -> Vec<String> {
    registry
        .list()
        .map(|(reference, signature)| format!("{reference}{signature}"))
        .collect()
}

fn fail_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".fail");
    PathBuf::from(name)
}

/// Parse `name=v1,v2,...` arguments into ordered spans. A bare `name=`
/// declares an empty span.
fn parse_spans(args: &[String]) -> Result<Spans> {
    let mut spans = Spans::new();
    for arg in args {
        let (name, values) = arg
            .split_once('=')
            .with_context(|| format!("Span must look like name=v1,v2: {arg:?}"))?;
        let name = name.trim();
        if name.is_empty() {
            anyhow::bail!("Span has no name: {arg:?}");
        }
        if spans.contains_key(name) {
            anyhow::bail!("Span {name:?} given more than once");
        }
        let candidates = values
            .split(',')
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(parse_value)
            .collect();
        spans.insert(name.to_string(), candidates);
    }
    Ok(spans)
}

/// Integer if it parses as one, then float, otherwise the raw string.
fn parse_value(text: &str) -> Scalar {
    if let Ok(i) = text.parse::<i64>() {
        Scalar::Int(i)
    } else if let Ok(f) = text.parse::<f64>() {
        Scalar::Float(f)
    } else {
        Scalar::Str(text.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_value_prefers_int_then_float() {
        assert_eq!(parse_value("3"), Scalar::Int(3));
        assert_eq!(parse_value("-2"), Scalar::Int(-2));
        assert_eq!(parse_value("0.5"), Scalar::Float(0.5));
        assert_eq!(parse_value("1e3"), Scalar::Float(1000.0));
        assert_eq!(parse_value("fast"), Scalar::Str("fast".to_string()));
    }

    #[test]
    fn test_parse_spans_keeps_order() {
        let spans = parse_spans(&strings(&["beta=0,0.5", "alpha=1, 2", "steps="])).unwrap();
        let names: Vec<&str> = spans.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["beta", "alpha", "steps"]);
        assert_eq!(spans["beta"], vec![Scalar::Int(0), Scalar::Float(0.5)]);
        assert_eq!(spans["alpha"], vec![Scalar::Int(1), Scalar::Int(2)]);
        assert!(spans["steps"].is_empty());
    }

    #[test]
    fn test_parse_spans_rejects_malformed() {
        assert!(parse_spans(&strings(&["alpha"])).is_err());
        assert!(parse_spans(&strings(&["=1,2"])).is_err());
        assert!(parse_spans(&strings(&["a=1", "a=2"])).is_err());
    }

    #[test]
    fn test_fail_path_appends_suffix() {
        assert_eq!(
            fail_path(Path::new("/tmp/run.json")),
            PathBuf::from("/tmp/run.json.fail")
        );
    }

    #[test]
    fn test_create_simulate_reproduce() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("urn.json");
        let registry = ModelRegistry::with_builtins();

        cmd_create(
            &path,
            "urn:draw",
            &strings(&["alpha=0,2", "steps=50"]),
            strings(&["quality", "efficiency"]),
            Some(9),
            2,
        )
        .unwrap();
        let created = SimRecord::load(&path).unwrap();
        assert_eq!(created.seed(), Some(9));
        assert_eq!(created.replicates(), 2);
        assert!(created.results().is_none());

        // Nothing stored yet, so there is nothing to reproduce.
        assert!(cmd_reproduce(&registry, &path, None).is_err());

        cmd_simulate(&registry, &path, None).unwrap();
        let ran = SimRecord::load(&path).unwrap();
        assert_eq!(ran, created);
        assert_eq!(ran.results().map(|ds| ds.len()), Some(2));

        assert!(cmd_reproduce(&registry, &path, None).unwrap());
        assert!(!fail_path(&path).exists());
    }

    #[test]
    fn test_divergent_run_is_written_beside_original() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("urn.json");
        let registry = ModelRegistry::with_builtins();

        cmd_create(
            &path,
            "urn:draw",
            &strings(&["steps=30"]),
            strings(&["quality", "efficiency"]),
            Some(4),
            1,
        )
        .unwrap();
        cmd_simulate(&registry, &path, None).unwrap();

        let mut tampered = SimRecord::load(&path).unwrap();
        let row = &mut tampered.results_mut().unwrap().records_mut()[0];
        row.insert("quality".to_string(), Scalar::Float(-1.0));
        tampered.dump(&path).unwrap();
        let before = std::fs::read_to_string(&path).unwrap();

        assert!(!cmd_reproduce(&registry, &path, None).unwrap());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), before);

        let divergent = SimRecord::load(fail_path(&path)).unwrap();
        assert_eq!(divergent, tampered);
        assert_ne!(divergent.results(), tampered.results());
    }

    #[test]
    fn test_simulate_to_separate_output() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("in.json");
        let out = dir.path().join("out.json");
        let registry = ModelRegistry::with_builtins();

        cmd_create(
            &path,
            "urn:draw",
            &strings(&["steps=10"]),
            strings(&["quality", "efficiency"]),
            None,
            1,
        )
        .unwrap();
        cmd_simulate(&registry, &path, Some(&out)).unwrap();

        assert!(SimRecord::load(&path).unwrap().results().is_none());
        let ran = SimRecord::load(&out).unwrap();
        assert!(ran.results().is_some());
        assert!(ran.state().is_some());
    }

    #[test]
    fn test_unseeded_record_fails_with_hint() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fresh.json");
        let registry = ModelRegistry::with_builtins();

        cmd_create(
            &path,
            "urn:draw",
            &strings(&["steps=40"]),
            strings(&["quality", "efficiency"]),
            None,
            1,
        )
        .unwrap();
        cmd_simulate(&registry, &path, None).unwrap();

        let stored = SimRecord::load(&path).unwrap();
        assert!(reproduction_hint(&stored).unwrap().contains("no seed"));
        assert!(!cmd_reproduce(&registry, &path, None).unwrap());
        assert!(fail_path(&path).exists());

        let seeded = stored.with_seed(1);
        assert!(reproduction_hint(&seeded).is_none());
    }

    #[test]
    fn test_create_rejects_negative_replicates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("neg.json");
        let err = cmd_create(
            &path,
            "urn:draw",
            &strings(&["steps=10"]),
            strings(&["quality", "efficiency"]),
            Some(1),
            -1,
        )
        .unwrap_err();
        assert!(err.to_string().contains("negative"));
        assert!(!path.exists());
    }

    #[test]
    fn test_models_lists_builtin_signature() {
        let registry = ModelRegistry::with_builtins();
        assert_eq!(
            model_lines(&registry),
            vec!["urn:draw(steps, n=10, alpha=1, beta=0.5, rng)".to_string()]
        );
        assert!(cmd_models(&registry).is_ok());
        assert!(cmd_models(&ModelRegistry::new()).is_ok());
        assert!(model_lines(&ModelRegistry::new()).is_empty());
    }

    #[test]
    fn test_create_rejects_bad_reference() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        let err = cmd_create(&path, "nocolon", &[], strings(&["q"]), None, 1);
        assert!(err.is_err());
        assert!(!path.exists());
    }
}
