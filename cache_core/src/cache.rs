//! Direct-mapped cache model.
//!
//! An address is split into `[tag | index | offset]`. The index selects exactly
//! one line; a request hits when that line is valid and holds the same tag,
//! otherwise the line is overwritten with the new tag. Only lines that have
//! been filled are stored, so the size of a cache costs nothing up front.
//!
//! ```
//! use cache_core::cache::{AccessOutcome, CacheModel};
//! use cache_core::config::{AddressWidth, CacheConfig};
//!
//! let config = CacheConfig::new(16, 4, 2, AddressWidth::default()).unwrap();
//! let mut cache = CacheModel::new(config);
//! assert_eq!(AccessOutcome::Miss, cache.request(0x0));
//! assert_eq!(AccessOutcome::Hit, cache.request(0x0));
//! assert_eq!(104, cache.counters().total_cycles);
//! assert_eq!(Some(52.0), cache.average_access_time());
//! ```

use std::{collections::BTreeMap, fmt};

use serde::Serialize;

use crate::{
    bits::{bit_string, log2, mask_lower},
    config::CacheConfig,
    report::{CacheReport, Geometry, LineReport},
};

/// cycles added on every miss to fetch the line from memory.
pub const MEMORY_LATENCY_CYCLES: u32 = 100;

/// a filled line. lines never filled are absent and count as invalid.
#[derive(Clone, Copy, Debug)]
struct Line {
    tag: u32,
    /// tracked for the report only; lines are always loaded clean.
    modified: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessOutcome {
    Hit,
    Miss,
}

impl AccessOutcome {
    pub fn is_hit(self) -> bool {
        self == AccessOutcome::Hit
    }
}

impl fmt::Display for AccessOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccessOutcome::Hit => write!(f, "hit"),
            AccessOutcome::Miss => write!(f, "miss"),
        }
    }
}

/// Running counters of a cache. None of them ever decreases.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Counters {
    pub requests: u64,
    pub hits: u64,
    pub misses: u64,
    pub total_cycles: u64,
}

impl Counters {
    fn ratio(&self, v: u64) -> Option<f64> {
        (self.requests != 0).then(|| v as f64 / self.requests as f64)
    }
    /// `None` until the first request.
    pub fn hit_rate(&self) -> Option<f64> {
        self.ratio(self.hits)
    }
    /// `None` until the first request.
    pub fn miss_rate(&self) -> Option<f64> {
        self.ratio(self.misses)
    }
    /// average memory access time in cycles. `None` until the first request.
    pub fn average_access_time(&self) -> Option<f64> {
        self.ratio(self.total_cycles)
    }
}

pub struct CacheModel {
    config: CacheConfig,
    line_count: u32,
    index_bits: u32,
    offset_bits: u32,
    tag_bits: u32,
    memory_latency: u32,
    lines: BTreeMap<u32, Line>,
    counters: Counters,
}

impl CacheModel {
    pub fn new(config: CacheConfig) -> Self {
        let line_count = config.total_bytes() / config.line_bytes();
        let index_bits = log2(line_count);
        let offset_bits = log2(config.line_bytes());
        let tag_bits = config.address_width().bits() - index_bits - offset_bits;
        Self {
            config,
            line_count,
            index_bits,
            offset_bits,
            tag_bits,
            memory_latency: MEMORY_LATENCY_CYCLES,
            lines: BTreeMap::new(),
            counters: Counters::default(),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }
    pub fn line_count(&self) -> u32 {
        self.line_count
    }
    pub fn index_bits(&self) -> u32 {
        self.index_bits
    }
    pub fn offset_bits(&self) -> u32 {
        self.offset_bits
    }
    pub fn tag_bits(&self) -> u32 {
        self.tag_bits
    }
    pub fn memory_latency(&self) -> u32 {
        self.memory_latency
    }

    #[inline]
    pub fn index(&self, addr: u32) -> u32 {
        (addr >> self.offset_bits) & (self.line_count - 1)
    }
    #[inline]
    pub fn tag(&self, addr: u32) -> u32 {
        addr.checked_shr(self.index_bits + self.offset_bits).unwrap_or(0)
    }
    #[inline]
    pub fn offset(&self, addr: u32) -> u32 {
        addr & mask_lower(self.offset_bits)
    }

    /// whether `addr` would hit, without touching any state.
    pub fn probe(&self, addr: u32) -> bool {
        self.lines
            .get(&self.index(addr))
            .map_or(false, |line| line.tag == self.tag(addr))
    }

    pub fn request(&mut self, addr: u32) -> AccessOutcome {
        self.counters.requests += 1;
        let index = self.index(addr);
        let tag = self.tag(addr);
        let access_latency = u64::from(self.config.access_latency());
        if self.lines.get(&index).map_or(false, |line| line.tag == tag) {
            self.counters.hits += 1;
            self.counters.total_cycles += access_latency;
            AccessOutcome::Hit
        } else {
            self.counters.misses += 1;
            self.lines.insert(
                index,
                Line {
                    tag,
                    modified: false,
                },
            );
            self.counters.total_cycles += access_latency + u64::from(self.memory_latency);
            AccessOutcome::Miss
        }
    }

    pub fn counters(&self) -> Counters {
        self.counters
    }
    pub fn hit_rate(&self) -> Option<f64> {
        self.counters.hit_rate()
    }
    pub fn miss_rate(&self) -> Option<f64> {
        self.counters.miss_rate()
    }
    pub fn average_access_time(&self) -> Option<f64> {
        self.counters.average_access_time()
    }

    pub fn report(&self) -> CacheReport {
        let lines = self
            .lines
            .iter()
            .map(|(&index, line)| LineReport {
                index,
                tag: bit_string(line.tag, self.tag_bits),
                modified: line.modified,
            })
            .collect();
        CacheReport {
            geometry: Geometry {
                total_bytes: self.config.total_bytes(),
                line_bytes: self.config.line_bytes(),
                line_count: self.line_count,
                access_latency: self.config.access_latency(),
                memory_latency: self.memory_latency,
                address_width: self.config.address_width().bits(),
                tag_bits: self.tag_bits,
                index_bits: self.index_bits,
                offset_bits: self.offset_bits,
            },
            lines,
            counters: self.counters,
            hit_rate: self.hit_rate(),
            miss_rate: self.miss_rate(),
            average_access_time: self.average_access_time(),
        }
    }
}
