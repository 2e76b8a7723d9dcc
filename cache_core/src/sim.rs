use crate::{
    cache::{AccessOutcome, CacheModel},
    config::{ConfigError, SimConfig},
    report::StreamReport,
    stat::{AddStats, Stats},
    trace::{Access, AccessKind, Trace},
};

/// Stream order of a run: every instruction access, then every data access.
pub const STREAM_ORDER: [AccessKind; 2] = [AccessKind::Instruction, AccessKind::Data];

/// Instruction and data caches fed from a single trace.
pub struct Simulator {
    icache: CacheModel,
    dcache: CacheModel,
    stat_builder: stat::SimStatBuilder,
}

impl Simulator {
    pub fn new(config: &SimConfig) -> Result<Self, ConfigError> {
        let (icache, dcache) = config.validate()?;
        log::info!(
            "caches configured. instruction: {} bytes, data: {} bytes, block: {} bytes",
            icache.total_bytes(),
            dcache.total_bytes(),
            icache.line_bytes()
        );
        Ok(Self {
            icache: CacheModel::new(icache),
            dcache: CacheModel::new(dcache),
            stat_builder: stat::SimStatBuilder::new(),
        })
    }

    pub fn cache(&self, kind: AccessKind) -> &CacheModel {
        match kind {
            AccessKind::Instruction => &self.icache,
            AccessKind::Data => &self.dcache,
        }
    }

    fn cache_mut(&mut self, kind: AccessKind) -> &mut CacheModel {
        match kind {
            AccessKind::Instruction => &mut self.icache,
            AccessKind::Data => &mut self.dcache,
        }
    }

    /// routes `access` to the cache of its stream.
    pub fn request(&mut self, access: Access) -> AccessOutcome {
        let outcome = self.cache_mut(access.kind).request(access.address);
        log::debug!("{} {:#010x}: {outcome}", access.kind, access.address);
        outcome
    }

    /// replays `trace` stream by stream, calling `on_request` after each access.
    /// stops at the first error returned by `on_request`.
    pub fn run<F, E>(&mut self, trace: &Trace, mut on_request: F) -> Result<(), E>
    where
        F: FnMut(&Access, AccessOutcome, &CacheModel) -> Result<(), E>,
    {
        self.stat_builder.start();
        for kind in STREAM_ORDER {
            log::info!("simulating {}", kind.cache_name());
            for access in trace.stream(kind) {
                let outcome = self.request(*access);
                on_request(access, outcome, self.cache(kind))?;
            }
        }
        self.stat_builder.finish_run(trace);
        Ok(())
    }

    pub fn report(&self, kind: AccessKind) -> StreamReport {
        self.cache(kind).report().labeled(kind)
    }

    pub fn collect_stat(&self) -> Stats {
        let mut ss = Stats::default();
        self.add_stats(&mut ss);
        ss
    }
}

impl AddStats for Simulator {
    fn add_stats(&self, buf: &mut Stats) {
        if let Some(s) = self.stat_builder.finish() {
            buf.push(Box::new(s));
        }
        for kind in STREAM_ORDER {
            buf.push(Box::new(self.report(kind)));
        }
    }
}

mod stat {
    use crate::stat::*;

    use super::*;
    use std::{fmt, time};

    #[derive(Default)]
    pub struct SimStatBuilder {
        begin: Option<time::Instant>,
        elapsed: Option<time::Duration>,
        accesses: usize,
        skipped: usize,
    }

    impl SimStatBuilder {
        pub fn new() -> Self {
            Self::default()
        }
        pub fn start(&mut self) {
            self.begin = Some(time::Instant::now())
        }
        pub fn finish_run(&mut self, trace: &Trace) {
            self.elapsed = self.begin.map(|b| b.elapsed());
            self.accesses = trace.len();
            self.skipped = trace.skipped().len();
        }
        /// `None` until a run has finished.
        pub fn finish(&self) -> Option<SimStat> {
            Some(SimStat {
                elapsed: self.elapsed?,
                accesses: self.accesses,
                skipped: self.skipped,
            })
        }
    }

    pub struct SimStat {
        elapsed: time::Duration,
        accesses: usize,
        skipped: usize,
    }

    impl Stat for SimStat {
        fn view(&self, _: usize) -> Box<dyn StatView + '_> {
            Box::new(self)
        }
    }

    impl StatView for &'_ SimStat {
        fn header(&self) -> &str {
            "simulator stat"
        }
        fn width(&self) -> usize {
            33
        }
    }

    impl fmt::Display for &'_ SimStat {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            let ms = format!("{} ms", self.elapsed.as_millis());
            writeln!(f, "  elapsed total: {ms:>16}")?;
            let accesses = format!("#{}", self.accesses);
            writeln!(f, "  accesses simulated: {accesses:>11}")?;
            let skipped = format!("#{}", self.skipped);
            writeln!(f, "  trace lines skipped: {skipped:>10}")
        }
    }
}
