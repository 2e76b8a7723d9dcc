use std::{
    fs::File,
    io::{BufRead, Write},
    path::{Path, PathBuf},
};

use anyhow::{anyhow, Context, Result};
use cache_core::{
    bits::is_pow2,
    config::{AddressWidth, SimConfig, ACCESS_LATENCY_RANGE},
};
use clap::Args;
use serde::Deserialize;

use crate::{
    interactive::Prompter,
    size::{parse_size, parse_u32},
};

/// Cache configuration given on the command line. Anything left out is taken
/// from `--config`, then asked for interactively.
#[derive(Args, Debug, Default)]
pub(crate) struct CacheArgs {
    /// Instruction cache size in bytes (e.g. 4096, 0x1000, 4K)
    #[arg(long = "icache", value_parser = parse_size)]
    icache_bytes: Option<u32>,
    /// Data cache size in bytes
    #[arg(long = "dcache", value_parser = parse_size)]
    dcache_bytes: Option<u32>,
    /// Cache block size in bytes
    #[arg(short = 'b', long = "block", value_parser = parse_size)]
    line_bytes: Option<u32>,
    /// Cache access latency in cycles (1-10)
    #[arg(short = 'l', long = "latency")]
    access_latency: Option<u32>,
    /// Address width in bits; wider trace addresses are skipped [default: 32]
    #[arg(long)]
    address_width: Option<u32>,
    /// File path to the access sequence
    #[arg(short, long)]
    trace: Option<PathBuf>,
}

/// Every setting of a run, each possibly missing.
#[derive(Deserialize, Debug, Default, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub(crate) struct PartialConfig {
    pub icache_bytes: Option<u32>,
    pub dcache_bytes: Option<u32>,
    pub line_bytes: Option<u32>,
    pub access_latency: Option<u32>,
    pub address_width: Option<u32>,
    pub trace: Option<PathBuf>,
}

impl From<CacheArgs> for PartialConfig {
    fn from(a: CacheArgs) -> Self {
        Self {
            icache_bytes: a.icache_bytes,
            dcache_bytes: a.dcache_bytes,
            line_bytes: a.line_bytes,
            access_latency: a.access_latency,
            address_width: a.address_width,
            trace: a.trace,
        }
    }
}

impl PartialConfig {
    pub fn read(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
        let mut c: Self = serde_json::from_reader(file)
            .with_context(|| format!("failed to parse config {}", path.display()))?;
        // trace paths are relative to the config file
        if let (Some(trace), Some(dir)) = (c.trace.as_mut(), path.parent()) {
            if trace.is_relative() {
                *trace = dir.join(&*trace);
            }
        }
        Ok(c)
    }

    /// fills each missing field of `self` from `other`.
    pub fn or(self, other: Self) -> Self {
        Self {
            icache_bytes: self.icache_bytes.or(other.icache_bytes),
            dcache_bytes: self.dcache_bytes.or(other.dcache_bytes),
            line_bytes: self.line_bytes.or(other.line_bytes),
            access_latency: self.access_latency.or(other.access_latency),
            address_width: self.address_width.or(other.address_width),
            trace: self.trace.or(other.trace),
        }
    }

    /// completes the configuration, asking `prompter` for missing values in the
    /// order the questions have always been asked.
    pub fn resolve<R: BufRead, W: Write>(
        self,
        mut prompter: Option<&mut Prompter<R, W>>,
    ) -> Result<(SimConfig, PathBuf)> {
        // nothing is asked for a run that cannot start
        let address_width = match self.address_width {
            Some(bits) => AddressWidth::new(bits)?,
            None => AddressWidth::default(),
        };
        macro_rules! get {
            ($field:ident, $flag:expr, $question:expr, $parse:expr) => {
                match (self.$field, prompter.as_deref_mut()) {
                    (Some(v), _) => v,
                    (None, Some(p)) => p.ask($question, $parse)?,
                    (None, None) => return Err(anyhow!("missing {}", $flag)),
                }
            };
        }
        let icache_bytes = get!(
            icache_bytes,
            "--icache",
            "Enter instruction cache size (in bytes)",
            pow2_size
        );
        let dcache_bytes = get!(
            dcache_bytes,
            "--dcache",
            "Enter data cache size (in bytes)",
            pow2_size
        );
        let line_bytes = get!(
            line_bytes,
            "--block",
            "Enter cache block size (in bytes)",
            |s: &str| block_size(s, icache_bytes.min(dcache_bytes))
        );
        let access_latency = get!(
            access_latency,
            "--latency",
            "Enter cache access latency (in cycles)",
            latency
        );
        let trace = get!(trace, "--trace", "Enter access sequence file name", |s: &str| {
            if s.is_empty() {
                Err("file name is empty".to_string())
            } else {
                Ok(PathBuf::from(s))
            }
        });
        let config = SimConfig {
            icache_bytes,
            dcache_bytes,
            line_bytes,
            access_latency,
            address_width,
        };
        Ok((config, trace))
    }
}

fn pow2_size(s: &str) -> Result<u32, String> {
    let v = parse_size(s)?;
    if is_pow2(v) {
        Ok(v)
    } else {
        Err(format!("{v} is not a power of 2"))
    }
}

fn block_size(s: &str, smallest_cache: u32) -> Result<u32, String> {
    let v = pow2_size(s)?;
    if v <= smallest_cache {
        Ok(v)
    } else {
        Err(format!(
            "block size {v} is larger than the smallest cache ({smallest_cache} bytes)"
        ))
    }
}

fn latency(s: &str) -> Result<u32, String> {
    let v = parse_u32(s)?;
    if ACCESS_LATENCY_RANGE.contains(&v) {
        Ok(v)
    } else {
        Err(format!("{v} is outside of 1..=10 cycles"))
    }
}
