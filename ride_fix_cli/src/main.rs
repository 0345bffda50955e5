use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use clap::{ArgAction, Parser, Subcommand, ValueHint};
use fitparser::de::from_bytes;
use fitparser::profile::MesgNum;
use fitparser::Value as FitValue;
use rayon::prelude::*;
use ride_fix::metrics::ride_power_index;
use ride_fix::{
    processor_for_name, processors, DataProcessor, MemorySettings, ProcessorConfig, RideFile,
    Sample,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Ride recording post-processing CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Apply post-processors to one or more FIT/JSON ride files
    Process(ProcessArgs),
    /// List registered post-processors
    List,
    /// Report samples, series, tags and power index for ride files
    Inspect(InspectArgs),
}

#[derive(Parser, Debug)]
struct ProcessArgs {
    /// FIT/JSON ride files to process
    #[arg(required = true, value_hint = ValueHint::FilePath)]
    inputs: Vec<PathBuf>,

    /// Processor names to run (defaults to every registered processor)
    #[arg(short, long)]
    processor: Vec<String>,

    /// Directory for filtered rides (defaults next to each input)
    #[arg(short, long, value_hint = ValueHint::DirPath)]
    output: Option<PathBuf>,

    /// Seconds to process (manual configuration for every processor)
    #[arg(long)]
    seconds: Option<f64>,

    /// JSON settings document seeding processor defaults
    #[arg(long, value_hint = ValueHint::FilePath)]
    settings: Option<PathBuf>,

    /// Verbose logging
    #[arg(long, action = ArgAction::SetTrue)]
    verbose: bool,
}

#[derive(Parser, Debug)]
struct InspectArgs {
    /// FIT/JSON ride files to inspect
    #[arg(required = true, value_hint = ValueHint::FilePath)]
    inputs: Vec<PathBuf>,

    /// Verbose logging
    #[arg(long, action = ArgAction::SetTrue)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let default_level = match &cli.command {
        Command::Process(args) if args.verbose => "debug",
        Command::Inspect(args) if args.verbose => "debug",
        _ => "info",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();

    match cli.command {
        Command::Process(args) => handle_process(args),
        Command::List => handle_list(),
        Command::Inspect(args) => handle_inspect(args),
    }
}

fn handle_process(args: ProcessArgs) -> Result<()> {
    let mut selected: Vec<&'static dyn DataProcessor> = Vec::new();
    if args.processor.is_empty() {
        selected.extend(processors().iter().copied());
    } else {
        for name in &args.processor {
            selected.push(processor_for_name(name)?);
        }
    }

    let settings = match args.settings.as_ref() {
        Some(path) => load_settings(path)?,
        None => MemorySettings::new(),
    };
    let config = args
        .seconds
        .map(|seconds_to_process| ProcessorConfig { seconds_to_process });

    if let Some(dir) = args.output.as_ref() {
        fs::create_dir_all(dir)
            .with_context(|| format!("failed to create {}", dir.display()))?;
    }

    let outputs: Vec<(PathBuf, RideFile, bool)> = args
        .inputs
        .par_iter()
        .map(|path| -> Result<(PathBuf, RideFile, bool)> {
            let mut ride = load_ride(path)?;
            let mut changed = false;
            for processor in &selected {
                changed |= processor.post_process(&mut ride, config.as_ref(), &settings)?;
            }

            let out_path = output_path(path, args.output.as_deref());
            let text =
                serde_json::to_string_pretty(&ride).context("failed to serialize ride")?;
            fs::write(&out_path, text)
                .with_context(|| format!("failed to write {}", out_path.display()))?;
            Ok((out_path, ride, changed))
        })
        .collect::<Result<Vec<_>>>()?;

    for (out_path, ride, changed) in &outputs {
        let deleted = ride.tag("Deleted Data Points").unwrap_or("0");
        let range = ride.tag("Deleted Power Range Time").unwrap_or("-");
        info!(
            "Wrote {} ({}, {} points deleted, power range {})",
            out_path.display(),
            if *changed { "changed" } else { "unchanged" },
            deleted,
            range
        );
    }

    Ok(())
}

fn handle_list() -> Result<()> {
    for processor in processors() {
        println!("{}: {}", processor.name(), processor.description());
    }
    Ok(())
}

fn handle_inspect(args: InspectArgs) -> Result<()> {
    for path in &args.inputs {
        let ride = load_ride(path)?;
        println!("{}", path.display());
        println!("  samples: {}", ride.sample_count());
        if let (Some(first), Some(last)) = (ride.samples().first(), ride.samples().last()) {
            println!("  span: {:.1} s to {:.1} s", first.secs, last.secs);
        }
        println!("  recording interval: {:.2} s", ride.rec_int_secs());
        let mut names: Vec<&str> = ride.xdata_names().collect();
        names.sort_unstable();
        for name in names {
            let count = ride.xdata(name).map(|s| s.points.len()).unwrap_or(0);
            println!("  xdata {name}: {count} points");
        }
        for (name, value) in ride.tags() {
            println!("  tag {name}: {value}");
        }
        match ride_power_index(&ride) {
            Some(index) => println!("  power index: {index:.1}"),
            None => println!("  power index: n/a"),
        }
    }
    Ok(())
}

fn load_ride(path: &Path) -> Result<RideFile> {
    let data = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let hint = path
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();
    match hint.as_str() {
        "fit" => parse_fit_ride(&data).with_context(|| format!("failed to parse {}", path.display())),
        "json" => serde_json::from_slice(&data)
            .with_context(|| format!("failed to parse {}", path.display())),
        other => Err(anyhow!("unsupported ride format: {other:?}")),
    }
}

fn load_settings(path: &Path) -> Result<MemorySettings> {
    let data =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    let values: HashMap<String, f64> = serde_json::from_str(&data)
        .with_context(|| format!("failed to parse settings {}", path.display()))?;
    Ok(MemorySettings::from_values(values))
}

fn parse_fit_ride(input: &[u8]) -> Result<RideFile> {
    let records = from_bytes(input).map_err(|e| anyhow!("bad FIT data: {e}"))?;
    let mut samples = Vec::new();
    let mut t0: Option<DateTime<Utc>> = None;

    for record in records.into_iter() {
        if record.kind() != MesgNum::Record {
            continue;
        }
        let mut row = Sample::default();
        let mut timestamp: Option<DateTime<Utc>> = None;
        for field in record.fields() {
            match field.name() {
                "timestamp" => {
                    if let FitValue::Timestamp(ts) = field.value() {
                        let utc = ts.with_timezone(&Utc);
                        timestamp = Some(utc);
                        if t0.is_none() {
                            t0 = Some(utc);
                        }
                        if let Some(base) = t0 {
                            row.secs = (utc - base).num_milliseconds() as f64 / 1000.0;
                        }
                    }
                }
                "power" => {
                    if let Some(val) = fit_value_to_f64(field.value()) {
                        row.watts = val;
                    }
                }
                "heart_rate" => {
                    if let Some(val) = fit_value_to_f64(field.value()) {
                        row.hr = Some(val);
                    }
                }
                "cadence" => {
                    if let Some(val) = fit_value_to_f64(field.value()) {
                        row.cad = Some(val);
                    }
                }
                "distance" | "enhanced_distance" => {
                    if let Some(val) = fit_value_to_f64(field.value()) {
                        row.km = Some(val / 1000.0);
                    }
                }
                "altitude" | "enhanced_altitude" => {
                    if let Some(val) = fit_value_to_f64(field.value()) {
                        row.alt = Some(val);
                    }
                }
                _ => {}
            }
        }
        if timestamp.is_some() {
            samples.push(row);
        }
    }

    let rec_int_secs = estimate_rec_int(&samples);
    Ok(RideFile::with_samples(rec_int_secs, samples))
}

fn fit_value_to_f64(value: &FitValue) -> Option<f64> {
    match value {
        FitValue::Float32(v) => Some(*v as f64),
        FitValue::Float64(v) => Some(*v),
        FitValue::SInt8(v) => Some(*v as f64),
        FitValue::UInt8(v) => Some(*v as f64),
        FitValue::UInt8z(v) => Some(*v as f64),
        FitValue::SInt16(v) => Some(*v as f64),
        FitValue::UInt16(v) => Some(*v as f64),
        FitValue::UInt16z(v) => Some(*v as f64),
        FitValue::SInt32(v) => Some(*v as f64),
        FitValue::UInt32(v) => Some(*v as f64),
        FitValue::UInt32z(v) => Some(*v as f64),
        FitValue::SInt64(v) => Some(*v as f64),
        FitValue::UInt64(v) => Some(*v as f64),
        FitValue::UInt64z(v) => Some(*v as f64),
        FitValue::Byte(v) => Some(*v as f64),
        FitValue::Array(values) => values.iter().find_map(fit_value_to_f64),
        _ => None,
    }
}

/// Nominal sampling period: median of the positive deltas between
/// successive samples, 1 Hz when the file gives nothing to go on.
fn estimate_rec_int(samples: &[Sample]) -> f64 {
    let mut deltas: Vec<f64> = samples
        .windows(2)
        .map(|w| w[1].secs - w[0].secs)
        .filter(|d| *d > 0.0)
        .collect();
    if deltas.is_empty() {
        return 1.0;
    }
    deltas.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    deltas[deltas.len() / 2]
}

fn output_path(input: &Path, output_dir: Option<&Path>) -> PathBuf {
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("ride");
    let name = format!("{stem}_fixed.json");
    match output_dir {
        Some(dir) => dir.join(&name),
        None => input.with_file_name(name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(secs: f64) -> Sample {
        Sample {
            secs,
            ..Sample::default()
        }
    }

    #[test]
    fn rec_int_median_of_deltas() {
        let samples: Vec<Sample> = [0.0, 1.0, 2.0, 3.0, 13.0].iter().map(|&s| sample(s)).collect();
        assert_eq!(estimate_rec_int(&samples), 1.0);
    }

    #[test]
    fn rec_int_defaults_to_one_hz() {
        assert_eq!(estimate_rec_int(&[]), 1.0);
        assert_eq!(estimate_rec_int(&[sample(5.0)]), 1.0);
    }

    #[test]
    fn output_path_next_to_input() {
        let path = output_path(Path::new("/rides/morning.fit"), None);
        assert_eq!(path, PathBuf::from("/rides/morning_fixed.json"));
    }

    #[test]
    fn output_path_in_directory() {
        let path = output_path(Path::new("/rides/morning.fit"), Some(Path::new("/out")));
        assert_eq!(path, PathBuf::from("/out/morning_fixed.json"));
    }
}
