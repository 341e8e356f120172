use dashmap::DashMap;
use nightscreen_core::{Interval, OhlcvSeries, Period};

/// Per-run, no-TTL cache: a series is never mutated after fetch, so once
/// cached it is valid for the rest of the process lifetime (unlike the
/// teacher's long-lived 5-minute-TTL server cache).
#[derive(Default)]
pub struct SeriesCache {
    inner: DashMap<(String, PeriodKey, IntervalKey), OhlcvSeries>,
}

type PeriodKey = u8;
type IntervalKey = u8;

fn period_key(p: Period) -> PeriodKey {
    match p {
        Period::D1 => 0,
        Period::D5 => 1,
        Period::Mo1 => 2,
        Period::Mo3 => 3,
        Period::Mo6 => 4,
        Period::Y1 => 5,
        Period::Y2 => 6,
    }
}

fn interval_key(i: Interval) -> IntervalKey {
    match i {
        Interval::M1 => 0,
        Interval::M5 => 1,
        Interval::M15 => 2,
        Interval::M30 => 3,
        Interval::H1 => 4,
        Interval::D1 => 5,
    }
}

impl SeriesCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, symbol: &str, period: Period, interval: Interval) -> Option<OhlcvSeries> {
        self.inner
            .get(&(symbol.to_string(), period_key(period), interval_key(interval)))
            .map(|entry| entry.clone())
    }

    pub fn insert(&self, symbol: &str, period: Period, interval: Interval, series: OhlcvSeries) {
        self.inner.insert(
            (symbol.to_string(), period_key(period), interval_key(interval)),
            series,
        );
    }
}
