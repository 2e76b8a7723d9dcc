//! Snapshot of a cache, detached from the model so it can be kept, rendered
//! through [`Stat`] or serialized.

use std::fmt;

use serde::Serialize;

use crate::{
    cache::Counters,
    stat::{Stat, StatView, Width},
    trace::AccessKind,
};

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Geometry {
    pub total_bytes: u32,
    pub line_bytes: u32,
    pub line_count: u32,
    pub access_latency: u32,
    pub memory_latency: u32,
    pub address_width: u32,
    pub tag_bits: u32,
    pub index_bits: u32,
    pub offset_bits: u32,
}

/// A valid line. `tag` is `tag_bits` wide, MSB first.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct LineReport {
    pub index: u32,
    pub tag: String,
    pub modified: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CacheReport {
    pub geometry: Geometry,
    pub lines: Vec<LineReport>,
    pub counters: Counters,
    pub hit_rate: Option<f64>,
    pub miss_rate: Option<f64>,
    pub average_access_time: Option<f64>,
}

impl CacheReport {
    pub fn labeled(self, kind: AccessKind) -> StreamReport {
        StreamReport { kind, report: self }
    }
}

/// Report of the cache serving one access stream.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct StreamReport {
    pub kind: AccessKind,
    #[serde(flatten)]
    pub report: CacheReport,
}

impl std::ops::Deref for StreamReport {
    type Target = CacheReport;

    fn deref(&self) -> &Self::Target {
        &self.report
    }
}

impl Stat for StreamReport {
    fn view(&self, max_width: usize) -> Box<dyn StatView + '_> {
        Box::new(StreamReportView::new(self, max_width))
    }
}

pub struct StreamReportView<'a> {
    stat: &'a StreamReport,
    chunk_size: usize,
}

impl<'a> StreamReportView<'a> {
    pub fn new(stat: &'a StreamReport, max_width: usize) -> Self {
        let mut view = Self {
            stat,
            chunk_size: 1,
        };
        view.chunk_size = view.chunk_size(max_width);
        view
    }
    fn index_width(&self) -> usize {
        let max_index = self.stat.geometry.line_count.saturating_sub(1);
        max_index.to_string().len()
    }
    fn entry_width(&self) -> usize {
        // `{index}: {tag}`
        self.index_width() + 2 + self.stat.geometry.tag_bits as usize
    }
}

const BODY_WIDTH: usize = 36;

impl Width for StreamReportView<'_> {
    fn width_by_chunk_size(&self, chunk_size: usize) -> usize {
        4 + chunk_size * self.entry_width() + (chunk_size - 1) * 2
    }
}

impl StatView for StreamReportView<'_> {
    fn header(&self) -> &str {
        self.stat.kind.cache_name()
    }
    fn width(&self) -> usize {
        if self.stat.lines.is_empty() {
            BODY_WIDTH
        } else {
            let per_row = self.chunk_size.min(self.stat.lines.len());
            self.width_by_chunk_size(per_row).max(BODY_WIDTH)
        }
    }
}

struct Rate(Option<f64>);

impl fmt::Display for Rate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(v) => write!(f, "{v:.2}"),
            None => write!(f, "n/a"),
        }
    }
}

impl fmt::Display for StreamReportView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let r = self.stat;
        let g = &r.geometry;
        let c = &r.counters;
        if r.lines.is_empty() {
            writeln!(f, "  valid lines: none")?;
        } else {
            writeln!(f, "  valid lines (index: tag):")?;
            let iw = self.index_width();
            let entries: Vec<_> = r
                .lines
                .iter()
                .map(|l| format!("{:>iw$}: {}", l.index, l.tag))
                .collect();
            for chunk in entries.chunks(self.chunk_size) {
                writeln!(f, "    {}", chunk.join("  "))?;
            }
        }
        let cycles = |v: u32| format!("{v} cycles");
        writeln!(f, "  cache size: {:>21}", format!("{} bytes", g.total_bytes))?;
        writeln!(f, "  block size: {:>21}", format!("{} bytes", g.line_bytes))?;
        writeln!(f, "  blocks: {:>25}", g.line_count)?;
        writeln!(f, "  access latency: {:>17}", cycles(g.access_latency))?;
        writeln!(f, "  memory latency: {:>17}", cycles(g.memory_latency))?;
        writeln!(
            f,
            "  tag/index/offset bits: {:>10}",
            format!("{}/{}/{}", g.tag_bits, g.index_bits, g.offset_bits)
        )?;
        writeln!(f, "  requests: {:>23}", format!("#{}", c.requests))?;
        writeln!(f, "  hits: {:>27}", format!("#{}", c.hits))?;
        writeln!(f, "  misses: {:>25}", format!("#{}", c.misses))?;
        writeln!(f, "  total cycles: {:>19}", format!("#{}", c.total_cycles))?;
        writeln!(f, "  hit rate: {:>23}", Rate(r.hit_rate).to_string())?;
        writeln!(f, "  miss rate: {:>22}", Rate(r.miss_rate).to_string())?;
        let amat = match r.average_access_time {
            Some(_) => format!("{} cycles", Rate(r.average_access_time)),
            None => Rate(None).to_string(),
        };
        writeln!(f, "  average access time: {amat:>12}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        cache::CacheModel,
        config::{AddressWidth, CacheConfig},
    };

    fn cache(total_bytes: u32, line_bytes: u32) -> CacheModel {
        let config = CacheConfig::new(total_bytes, line_bytes, 2, AddressWidth::default()).unwrap();
        CacheModel::new(config)
    }

    #[test]
    fn test_report_lines() {
        let mut c = cache(16, 4);
        c.request(0x0);
        c.request(0b1111_0100);
        let report = c.report();
        assert_eq!(28, report.geometry.tag_bits);
        assert_eq!(
            vec![
                LineReport {
                    index: 0,
                    tag: "0".repeat(28),
                    modified: false
                },
                LineReport {
                    index: 1,
                    tag: format!("{}1111", "0".repeat(24)),
                    modified: false
                },
            ],
            report.lines
        );
        assert_eq!(2, report.counters.misses);
        assert_eq!(Some(0.0), report.hit_rate);
        assert_eq!(Some(102.0), report.average_access_time);
    }

    #[test]
    fn test_report_is_snapshot() {
        let mut c = cache(16, 4);
        c.request(0x0);
        let before = c.report();
        c.request(0x10);
        assert_eq!(1, before.counters.requests);
        assert_eq!(before, before.clone());
        assert_ne!(before, c.report());
    }

    #[test]
    fn test_narrow_width_tag() {
        let config = CacheConfig::new(16, 4, 1, AddressWidth::BITS_30).unwrap();
        let mut c = CacheModel::new(config);
        c.request(0x3FFF_FFFF);
        let report = c.report();
        assert_eq!(26, report.geometry.tag_bits);
        assert_eq!("1".repeat(26), report.lines[0].tag);
        assert_eq!(3, report.lines[0].index);
    }

    #[test]
    fn test_view() {
        let mut c = cache(64, 4);
        for a in [0x0, 0x4, 0x8, 0x0] {
            c.request(a);
        }
        let stat = c.report().labeled(AccessKind::Data);
        let view = stat.view(120);
        assert_eq!("data cache", view.header());
        let text = view.to_string();
        assert!(text.contains("valid lines (index: tag):"));
        // all three entries fit on one row at this width
        let row = text.lines().nth(1).unwrap();
        assert!(row.starts_with("     0: "));
        assert_eq!(3, row.matches(": ").count());
        assert!(text.contains("  hits: "));
        assert!(text.lines().any(|l| l.ends_with("0.25")));
        assert!(text.contains("77.00 cycles"));

        let narrow = stat.view(10);
        assert_eq!(3, narrow.to_string().lines().filter(|l| l.starts_with("    ")).count());
    }

    #[test]
    fn test_view_without_requests() {
        let stat = cache(16, 4).report().labeled(AccessKind::Instruction);
        let text = stat.view(80).to_string();
        assert!(text.contains("valid lines: none"));
        assert!(text.lines().any(|l| l.ends_with("n/a")));
    }

    #[test]
    fn test_serialize() {
        let mut c = cache(16, 4);
        c.request(0x4);
        let v = serde_json::to_value(c.report().labeled(AccessKind::Instruction)).unwrap();
        assert_eq!("instruction", v["kind"]);
        assert_eq!(1, v["counters"]["misses"]);
        assert_eq!(1, v["lines"][0]["index"]);
        assert!(v["hit_rate"].is_number());
        let empty = serde_json::to_value(cache(16, 4).report()).unwrap();
        assert!(empty["hit_rate"].is_null());
    }
}
