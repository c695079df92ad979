//! Deterministic in-memory terminal for tests, built with the `testing` feature.
//!
//! Each symbol owns an ascending rate history. Position requests count back
//! from the newest bar; time requests return the bars at or before the
//! anchor, like the real terminal. Failure modes are switched on per symbol.

use super::provider::{DataError, RawRate, SymbolInfo, Terminal, TerminalInfo};
use crate::domain::Timeframe;
use chrono::{DateTime, Duration, Utc};
use std::collections::{HashMap, VecDeque};

#[derive(Debug, Clone, Default)]
struct FakeSymbol {
    rates: Vec<RawRate>,
    hidden: bool,
    refuse_enable: bool,
    /// Time requests before the first bar return the oldest chunk again
    /// instead of nothing.
    floor: bool,
    fail_fetch: bool,
    panic_fetch: bool,
    script: Option<VecDeque<Vec<RawRate>>>,
}

#[derive(Debug, Default)]
pub struct FakeTerminal {
    symbols: HashMap<String, FakeSymbol>,
    init_error: Option<String>,
    info: TerminalInfo,
    initialized: bool,
    shutdown_calls: usize,
    position_calls: usize,
    time_calls: usize,
    last_position_count: Option<usize>,
}

impl FakeTerminal {
    pub fn new() -> Self {
        Self {
            info: TerminalInfo {
                server: Some("FakeBroker-Demo".into()),
                login: Some(1_000_001),
            },
            ..Default::default()
        }
    }

    /// Register `count` consecutive one-minute bars starting at `start`.
    pub fn with_minute_history(self, symbol: &str, start: DateTime<Utc>, count: usize) -> Self {
        self.with_rates(symbol, minute_rates(start, count, 1.1))
    }

    /// Register an arbitrary history. Rates are sorted by time.
    pub fn with_rates(mut self, symbol: &str, mut rates: Vec<RawRate>) -> Self {
        rates.sort_by_key(|r| r.time);
        self.entry(symbol).rates = rates;
        self
    }

    pub fn with_hidden(mut self, symbol: &str) -> Self {
        self.entry(symbol).hidden = true;
        self
    }

    pub fn with_refused_enable(mut self, symbol: &str) -> Self {
        let entry = self.entry(symbol);
        entry.hidden = true;
        entry.refuse_enable = true;
        self
    }

    pub fn with_history_floor(mut self, symbol: &str) -> Self {
        self.entry(symbol).floor = true;
        self
    }

    pub fn with_failing_fetch(mut self, symbol: &str) -> Self {
        self.entry(symbol).fail_fetch = true;
        self
    }

    pub fn with_panicking_fetch(mut self, symbol: &str) -> Self {
        self.entry(symbol).panic_fetch = true;
        self
    }

    /// Time requests for `symbol` return these chunks in order, then nothing.
    pub fn with_scripted_chunks(mut self, symbol: &str, chunks: Vec<Vec<RawRate>>) -> Self {
        self.entry(symbol).script = Some(chunks.into());
        self
    }

    pub fn with_init_error(mut self, message: &str) -> Self {
        self.init_error = Some(message.to_string());
        self
    }

    /// Append bars to an existing history, replacing any at the same time.
    pub fn push_rates(&mut self, symbol: &str, rates: Vec<RawRate>) {
        let entry = self.entry(symbol);
        for rate in rates {
            match entry.rates.binary_search_by_key(&rate.time, |r| r.time) {
                Ok(i) => entry.rates[i] = rate,
                Err(i) => entry.rates.insert(i, rate),
            }
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn shutdown_calls(&self) -> usize {
        self.shutdown_calls
    }

    /// Bar requests of either kind.
    pub fn fetch_calls(&self) -> usize {
        self.position_calls + self.time_calls
    }

    pub fn position_calls(&self) -> usize {
        self.position_calls
    }

    pub fn time_calls(&self) -> usize {
        self.time_calls
    }

    /// `count` of the most recent position request.
    pub fn last_position_count(&self) -> Option<usize> {
        self.last_position_count
    }

    fn entry(&mut self, symbol: &str) -> &mut FakeSymbol {
        self.symbols.entry(symbol.to_string()).or_default()
    }

    fn fetchable(&self, symbol: &str) -> Result<&FakeSymbol, DataError> {
        let entry = self
            .symbols
            .get(symbol)
            .ok_or_else(|| DataError::Terminal(format!("unknown symbol {symbol}")))?;
        if entry.panic_fetch {
            panic!("fake terminal panicked fetching {symbol}");
        }
        if entry.fail_fetch {
            return Err(DataError::Terminal(format!("fetch failed for {symbol}")));
        }
        if entry.hidden {
            return Err(DataError::Terminal(format!("{symbol} is not selected")));
        }
        Ok(entry)
    }
}

impl Terminal for FakeTerminal {
    fn name(&self) -> &str {
        "fake"
    }

    fn initialize(&mut self) -> Result<TerminalInfo, DataError> {
        if let Some(message) = &self.init_error {
            return Err(DataError::TerminalInit(message.clone()));
        }
        self.initialized = true;
        Ok(self.info.clone())
    }

    fn shutdown(&mut self) {
        self.initialized = false;
        self.shutdown_calls += 1;
    }

    fn symbol_info(&mut self, symbol: &str) -> Result<Option<SymbolInfo>, DataError> {
        Ok(self.symbols.get(symbol).map(|s| SymbolInfo {
            name: symbol.to_string(),
            description: format!("{symbol} (fake)"),
            visible: !s.hidden,
        }))
    }

    fn enable_symbol(&mut self, symbol: &str) -> Result<bool, DataError> {
        match self.symbols.get_mut(symbol) {
            Some(s) if !s.refuse_enable => {
                s.hidden = false;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn fetch_bars_from_position(
        &mut self,
        symbol: &str,
        _timeframe: Timeframe,
        start_pos: usize,
        count: usize,
    ) -> Result<Vec<RawRate>, DataError> {
        self.position_calls += 1;
        self.last_position_count = Some(count);

        let rates = &self.fetchable(symbol)?.rates;
        let end = rates.len().saturating_sub(start_pos);
        let begin = end.saturating_sub(count);
        Ok(rates[begin..end].to_vec())
    }

    fn fetch_bars_from_time(
        &mut self,
        symbol: &str,
        _timeframe: Timeframe,
        anchor: DateTime<Utc>,
        count: usize,
    ) -> Result<Vec<RawRate>, DataError> {
        self.time_calls += 1;
        self.fetchable(symbol)?;

        let entry = self.entry(symbol);
        if let Some(script) = entry.script.as_mut() {
            return Ok(script.pop_front().unwrap_or_default());
        }

        let anchor = anchor.timestamp();
        let end = entry.rates.partition_point(|r| r.time <= anchor);
        if end == 0 {
            if entry.floor {
                let n = count.min(entry.rates.len());
                return Ok(entry.rates[..n].to_vec());
            }
            return Ok(Vec::new());
        }
        let begin = end.saturating_sub(count);
        Ok(entry.rates[begin..end].to_vec())
    }
}

/// `count` consecutive one-minute rates oscillating around `base`.
///
/// Every generated bar satisfies the OHLC relationships.
pub fn minute_rates(start: DateTime<Utc>, count: usize, base: f64) -> Vec<RawRate> {
    (0..count)
        .map(|i| {
            let ts = start + Duration::minutes(i as i64);
            let open = base + 0.0001 * ((i % 20) as f64 - 10.0);
            let close = open + 0.00005;
            RawRate {
                time: ts.timestamp(),
                open,
                high: close + 0.0002,
                low: open - 0.0002,
                close,
                tick_volume: 10 + (i % 7) as u64,
                spread: 2,
                real_volume: 0,
            }
        })
        .collect()
}
