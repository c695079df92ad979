//! HTTP bridge to a running trading terminal.
//!
//! The terminal's own API only exists inside its host process, so a small
//! bridge service exposes it as JSON over HTTP. Every call is one blocking
//! request; nothing is retried.
//!
//! | call | request |
//! |---|---|
//! | initialize | `POST /initialize` |
//! | shutdown | `POST /shutdown` |
//! | symbol info | `GET /symbol_info?symbol=S` (404 = unknown) |
//! | enable symbol | `POST /symbol_select {symbol, enable}` |
//! | bars by position | `POST /rates_from_pos {symbol, timeframe, start_pos, count}` |
//! | bars by time | `POST /rates_from {symbol, timeframe, date_from, count}` |
//!
//! Failures come back as a non-2xx status with `{"error": "..."}`. A rates
//! body of `null` means the terminal has no bars; a 404 from a rates endpoint
//! means the bridge cannot serve the symbol at all and is `NotAvailable`.

use super::provider::{DataError, RawRate, SymbolInfo, Terminal, TerminalInfo};
use crate::config::BridgeConfig;
use crate::domain::Timeframe;
use chrono::{DateTime, Utc};
use reqwest::blocking::{Client, RequestBuilder};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

#[derive(Debug, Serialize)]
struct SelectRequest<'a> {
    symbol: &'a str,
    enable: bool,
}

#[derive(Debug, Deserialize)]
struct SelectResponse {
    selected: bool,
}

#[derive(Debug, Serialize)]
struct PositionRequest<'a> {
    symbol: &'a str,
    timeframe: &'a str,
    start_pos: usize,
    count: usize,
}

#[derive(Debug, Serialize)]
struct TimeRequest<'a> {
    symbol: &'a str,
    timeframe: &'a str,
    /// Seconds since the Unix epoch.
    date_from: i64,
    count: usize,
}

pub struct BridgeTerminal {
    client: Client,
    base_url: String,
    connected: bool,
}

impl BridgeTerminal {
    pub fn new(config: &BridgeConfig) -> Result<Self, DataError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| DataError::Other(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            connected: false,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}/{endpoint}", self.base_url)
    }

    /// Send a request and decode the JSON body. `Ok(None)` means 404.
    fn send<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        request: RequestBuilder,
    ) -> Result<Option<T>, DataError> {
        let resp = request.send().map_err(|e| {
            if e.is_connect() || e.is_timeout() {
                DataError::NetworkUnreachable(format!("{}: {e}", self.base_url))
            } else {
                DataError::Terminal(format!("{endpoint}: {e}"))
            }
        })?;

        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            let message = resp
                .json::<ErrorBody>()
                .map(|b| b.error)
                .unwrap_or_else(|_| format!("HTTP {status}"));
            return Err(DataError::Terminal(format!("{endpoint}: {message}")));
        }

        resp.json::<T>().map(Some).map_err(|e| {
            DataError::ResponseFormatChanged(format!("failed to parse {endpoint} response: {e}"))
        })
    }

    fn post<B: Serialize, T: DeserializeOwned>(
        &self,
        endpoint: &str,
        body: &B,
    ) -> Result<Option<T>, DataError> {
        let request = self.client.post(self.url(endpoint)).json(body);
        self.send(endpoint, request)
    }

    /// Rate arrays may come back as `null` when the terminal has nothing.
    fn rates(
        &self,
        endpoint: &str,
        symbol: &str,
        body: &impl Serialize,
    ) -> Result<Vec<RawRate>, DataError> {
        let rates: Option<Option<Vec<RawRate>>> = self.post(endpoint, body)?;
        match rates {
            Some(rates) => Ok(rates.unwrap_or_default()),
            None => Err(DataError::NotAvailable {
                symbol: symbol.to_string(),
                reason: format!("bridge returned 404 for {endpoint}"),
            }),
        }
    }
}

impl Terminal for BridgeTerminal {
    fn name(&self) -> &str {
        "bridge"
    }

    fn initialize(&mut self) -> Result<TerminalInfo, DataError> {
        let info: Option<TerminalInfo> = self
            .post("initialize", &serde_json::json!({}))
            .map_err(|e| DataError::TerminalInit(e.to_string()))?;
        let info = info.ok_or_else(|| {
            DataError::TerminalInit(format!("no bridge endpoint at {}", self.base_url))
        })?;
        self.connected = true;
        tracing::debug!(url = %self.base_url, server = ?info.server, "bridge connected");
        Ok(info)
    }

    fn shutdown(&mut self) {
        if !self.connected {
            return;
        }
        self.connected = false;
        let result: Result<Option<serde_json::Value>, _> =
            self.post("shutdown", &serde_json::json!({}));
        if let Err(e) = result {
            tracing::warn!(error = %e, "bridge shutdown failed");
        }
    }

    fn symbol_info(&mut self, symbol: &str) -> Result<Option<SymbolInfo>, DataError> {
        let request = self
            .client
            .get(self.url("symbol_info"))
            .query(&[("symbol", symbol)]);
        self.send("symbol_info", request)
    }

    fn enable_symbol(&mut self, symbol: &str) -> Result<bool, DataError> {
        let resp: Option<SelectResponse> = self.post(
            "symbol_select",
            &SelectRequest {
                symbol,
                enable: true,
            },
        )?;
        Ok(resp.is_some_and(|r| r.selected))
    }

    fn fetch_bars_from_position(
        &mut self,
        symbol: &str,
        timeframe: Timeframe,
        start_pos: usize,
        count: usize,
    ) -> Result<Vec<RawRate>, DataError> {
        self.rates(
            "rates_from_pos",
            symbol,
            &PositionRequest {
                symbol,
                timeframe: timeframe.as_str(),
                start_pos,
                count,
            },
        )
    }

    fn fetch_bars_from_time(
        &mut self,
        symbol: &str,
        timeframe: Timeframe,
        anchor: DateTime<Utc>,
        count: usize,
    ) -> Result<Vec<RawRate>, DataError> {
        self.rates(
            "rates_from",
            symbol,
            &TimeRequest {
                symbol,
                timeframe: timeframe.as_str(),
                date_from: anchor.timestamp(),
                count,
            },
        )
    }
}
