mod config;
mod interactive;
mod size;

use std::{
    fs,
    io::{stdout, BufWriter, Write},
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use cache_core::{
    config::AddressWidth,
    report::StreamReport,
    sim::Simulator,
    stat::Stat,
    trace::{AccessKind, Trace},
};
use clap::{Parser, ValueEnum};
use serde::Serialize;
use terminal_size::terminal_size;

use crate::{
    config::{CacheArgs, PartialConfig},
    interactive::Prompter,
};

/// Simulates direct-mapped instruction and data caches over an access trace.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(flatten)]
    cache: CacheArgs,
    /// JSON file with any of the cache settings and the trace path
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Fail on missing settings instead of asking for them
    #[arg(long)]
    no_prompt: bool,
    /// Only print the final cache reports
    #[arg(long)]
    final_only: bool,
    /// Output format
    #[arg(long, value_enum, default_value_t = Format::Text)]
    format: Format,
    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Format {
    Text,
    Json,
}

#[derive(Serialize)]
struct JsonOutput {
    instruction: StreamReport,
    data: StreamReport,
    skipped: Vec<JsonSkipped>,
}

#[derive(Serialize)]
struct JsonSkipped {
    line: usize,
    reason: String,
}

fn main() -> anyhow::Result<()> {
    let args = Cli::parse();
    if args.verbose {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    } else {
        env_logger::init();
    }

    let from_file = match &args.config {
        Some(path) => PartialConfig::read(path)?,
        None => PartialConfig::default(),
    };
    let partial = PartialConfig::from(args.cache).or(from_file);
    let (config, trace_path) = if args.no_prompt {
        partial.resolve::<std::io::Empty, std::io::Sink>(None)?
    } else {
        partial.resolve(Some(&mut Prompter::stdio()))?
    };

    let mut sim = Simulator::new(&config)?;
    let trace = read_trace(&trace_path, config.address_width)?;

    let mut out = BufWriter::new(stdout().lock());
    let max_width = get_terminal_width().unwrap_or(120) as usize;
    output(&mut sim, &trace, args.format, args.final_only, max_width, &mut out)?;
    out.flush()?;
    log::info!("finished simulation.");
    Ok(())
}

/// runs `trace` through `sim` and writes the reports in `format`.
fn output<W: Write>(
    sim: &mut Simulator,
    trace: &Trace,
    format: Format,
    final_only: bool,
    max_width: usize,
    out: &mut W,
) -> Result<()> {
    match format {
        Format::Text => {
            let mut stream = None;
            sim.run(trace, |access, outcome, cache| -> Result<()> {
                if final_only {
                    return Ok(());
                }
                if stream != Some(access.kind) {
                    stream = Some(access.kind);
                    writeln!(out, "Simulating {}:", access.kind.cache_name())?;
                }
                let report = cache.report().labeled(access.kind);
                writeln!(
                    out,
                    "{} request {:#010x}: {outcome}",
                    access.kind, access.address
                )?;
                writeln!(out, "{}", report.view(max_width))?;
                Ok(())
            })?;
            writeln!(out, "{:-<77}", "")?;
            writeln!(out, "{}", sim.collect_stat().view(max_width))?;
        }
        Format::Json => {
            sim.run(trace, |_, _, _| Ok::<_, anyhow::Error>(()))?;
            let output = JsonOutput {
                instruction: sim.report(AccessKind::Instruction),
                data: sim.report(AccessKind::Data),
                skipped: trace
                    .skipped()
                    .iter()
                    .map(|s| JsonSkipped {
                        line: s.line_no,
                        reason: s.reason.to_string(),
                    })
                    .collect(),
            };
            serde_json::to_writer_pretty(&mut *out, &output)?;
            writeln!(out)?;
        }
    }
    Ok(())
}

fn read_trace(path: &Path, width: AddressWidth) -> Result<Trace> {
    let src = fs::read_to_string(path)
        .with_context(|| format!("failed to read trace {}", path.display()))?;
    let trace = Trace::parse(&src, width)
        .with_context(|| format!("invalid trace {}", path.display()))?;
    Ok(trace)
}

fn get_terminal_width() -> Option<u16> {
    terminal_size().map(|(w, _)| w.0.saturating_sub(4))
}

#[cfg(test)]
mod tests {
    use cache_core::config::SimConfig;
    use clap::CommandFactory;

    use super::*;

    const TRACE: &str = "\
0000I
0100D
2D
0000I
0100I
";

    fn run(format: Format, final_only: bool) -> String {
        let config = SimConfig {
            icache_bytes: 16,
            dcache_bytes: 16,
            line_bytes: 4,
            access_latency: 2,
            address_width: AddressWidth::BITS_32,
        };
        let mut sim = Simulator::new(&config).unwrap();
        let trace = Trace::parse(TRACE, config.address_width).unwrap();
        let mut out = Vec::new();
        output(&mut sim, &trace, format, final_only, 80, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_text_output() {
        let out = run(Format::Text, false);
        let lines: Vec<_> = out.lines().collect();
        let pos = |l: &str| lines.iter().position(|x| *x == l).unwrap();

        let requests: Vec<_> = lines
            .iter()
            .enumerate()
            .filter(|(_, l)| l.contains(" request 0x"))
            .collect();
        assert_eq!(
            vec![
                "instruction request 0x00000000: miss",
                "instruction request 0x00000000: hit",
                "instruction request 0x00000004: miss",
                "data request 0x00000004: miss",
            ],
            requests.iter().map(|(_, l)| **l).collect::<Vec<_>>()
        );

        let icache = pos("Simulating instruction cache:");
        let dcache = pos("Simulating data cache:");
        let separator = pos("-".repeat(77).as_str());
        assert_eq!(1, out.matches("Simulating instruction cache:").count());
        assert_eq!(1, out.matches("Simulating data cache:").count());
        assert!(icache < requests[0].0);
        assert!(requests[2].0 < dcache && dcache < requests[3].0);
        assert!(requests[3].0 < separator);

        let stats = &lines[separator + 1..];
        assert!(stats[0].contains(" statistics "));
        let i = stats.iter().position(|l| *l == "instruction cache:").unwrap();
        let d = stats.iter().position(|l| *l == "data cache:").unwrap();
        assert!(i < d);
    }

    #[test]
    fn test_final_only() {
        let out = run(Format::Text, true);
        assert!(!out.contains(" request 0x"));
        assert!(!out.contains("Simulating"));
        let mut lines = out.lines();
        assert_eq!(Some("-".repeat(77).as_str()), lines.next());
        assert!(lines.next().unwrap().contains(" statistics "));
        assert!(out.contains("instruction cache:"));
        assert!(out.contains("data cache:"));
    }

    #[test]
    fn test_json_output() {
        let out = run(Format::Json, false);
        let v: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(3, v["instruction"]["counters"]["requests"]);
        assert_eq!(1, v["instruction"]["counters"]["hits"]);
        assert_eq!(1, v["data"]["counters"]["requests"]);
        assert_eq!(1, v["data"]["counters"]["misses"]);
        let skipped = v["skipped"].as_array().unwrap();
        assert_eq!(1, skipped.len());
        assert_eq!(3, skipped[0]["line"]);
        assert!(!out.contains(" request 0x"));
    }

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_flags() {
        let cli = Cli::try_parse_from([
            "cache-sim",
            "--icache",
            "4K",
            "--dcache",
            "0x800",
            "-b",
            "16",
            "-l",
            "5",
            "--address-width",
            "30",
            "-t",
            "trace.txt",
            "--final-only",
            "--format",
            "json",
        ])
        .unwrap();
        assert!(cli.final_only);
        assert_eq!(Format::Json, cli.format);
        let partial = PartialConfig::from(cli.cache);
        assert_eq!(Some(4096), partial.icache_bytes);
        assert_eq!(Some(2048), partial.dcache_bytes);
        assert_eq!(Some(16), partial.line_bytes);
        assert_eq!(Some(5), partial.access_latency);
        assert_eq!(Some(30), partial.address_width);
        assert_eq!(Some(PathBuf::from("trace.txt")), partial.trace);
    }

    #[test]
    fn test_rejects_bad_size() {
        assert!(Cli::try_parse_from(["cache-sim", "--icache", "lots"]).is_err());
    }

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["cache-sim"]).unwrap();
        assert_eq!(Format::Text, cli.format);
        assert!(!cli.no_prompt);
        assert_eq!(PartialConfig::default(), PartialConfig::from(cli.cache));
    }
}
