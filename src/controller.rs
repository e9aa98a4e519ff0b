//! Dashboard state and the transitions user actions drive through it.
//!
//! The controller never awaits. Each `begin_*` call hands out a [`Ticket`] and a
//! [`CancelToken`]; the caller runs the fetch and passes the outcome back to the
//! matching `apply_*`. Only the most recent ticket of each kind is applied, so a
//! slow response can never overwrite a newer one.

use std::collections::HashMap;
use std::path::PathBuf;
use tracing::{debug, info, warn};

use crate::cancel::CancelToken;
use crate::chart_views::{HistogramRow, ScatterPoint, histogram_table, scatter_pairs};
use crate::error::ApiError;
use crate::models::{
    ChartData, ChartDataRequest, Coin, CorrelationResult, DateRange, PriceChartPoint,
    SentimentChartPoint,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestKind {
    Coins,
    Chart,
    Export,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket {
    id: u64,
    kind: RequestKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Loading,
    Ready,
    Errored,
}

/// Everything the presentation layer renders.
#[derive(Debug, Default)]
pub struct DashboardState {
    pub coins: Vec<Coin>,
    pub current_coin: Option<usize>,
    pub prices: Vec<PriceChartPoint>,
    pub fear_greed: Vec<SentimentChartPoint>,
    pub scatter: Vec<ScatterPoint>,
    pub histogram_prices: Vec<HistogramRow>,
    pub histogram_fear_greed: Vec<HistogramRow>,
    pub correlation: Option<CorrelationResult>,
    pub error: Option<String>,
    pub last_export: Option<PathBuf>,
}

impl DashboardState {
    pub fn current_coin(&self) -> Option<&Coin> {
        self.current_coin.and_then(|i| self.coins.get(i))
    }
}

pub struct Controller {
    state: DashboardState,
    range: DateRange,
    now: i64,
    next_request: u64,
    in_flight: HashMap<RequestKind, (u64, CancelToken)>,
}

impl Controller {
    /// `now` is the picker's notion of the current time, in epoch seconds.
    pub fn new(now: i64) -> Self {
        Self {
            state: DashboardState::default(),
            range: DateRange::last_day(now),
            now,
            next_request: 0,
            in_flight: HashMap::new(),
        }
    }

    pub fn state(&self) -> &DashboardState {
        &self.state
    }

    pub fn range(&self) -> DateRange {
        self.range
    }

    pub fn is_loading(&self) -> bool {
        self.in_flight.contains_key(&RequestKind::Coins)
            || self.in_flight.contains_key(&RequestKind::Chart)
    }

    /// CSV downloads are tracked apart from `is_loading` and never raise the overlay.
    pub fn is_exporting(&self) -> bool {
        self.in_flight.contains_key(&RequestKind::Export)
    }

    pub fn phase(&self) -> Phase {
        if self.is_loading() {
            Phase::Loading
        } else if self.state.error.is_some() {
            Phase::Errored
        } else if self.state.coins.is_empty() {
            Phase::Idle
        } else {
            Phase::Ready
        }
    }

    fn can_request_data(&self) -> bool {
        !self.state.coins.is_empty() && self.state.current_coin().is_some()
    }

    // --- Requests ---

    fn issue(&mut self, kind: RequestKind) -> (Ticket, CancelToken) {
        self.next_request += 1;
        let token = CancelToken::new();
        let previous = self
            .in_flight
            .insert(kind, (self.next_request, token.clone()));
        if let Some((superseded, old)) = previous {
            debug!(?kind, superseded, "cancelling superseded request");
            old.cancel();
        }
        (
            Ticket {
                id: self.next_request,
                kind,
            },
            token,
        )
    }

    /// True if `ticket` is still the latest of its kind; clears it from the in-flight set.
    fn settle(&mut self, ticket: Ticket) -> bool {
        match self.in_flight.get(&ticket.kind) {
            Some((id, _)) if *id == ticket.id => {
                self.in_flight.remove(&ticket.kind);
                true
            }
            _ => {
                debug!(kind = ?ticket.kind, id = ticket.id, "dropping stale result");
                false
            }
        }
    }

    fn current_request(&self) -> Option<ChartDataRequest> {
        self.state.current_coin().map(|coin| ChartDataRequest {
            coin_id: coin.id.clone(),
            range: self.range,
        })
    }

    pub fn begin_load_coins(&mut self) -> (Ticket, CancelToken) {
        self.issue(RequestKind::Coins)
    }

    pub fn apply_coins(&mut self, ticket: Ticket, result: Result<Vec<Coin>, ApiError>) -> bool {
        if !self.settle(ticket) {
            return false;
        }
        match result {
            Ok(coins) => {
                info!(count = coins.len(), "coins loaded");
                self.state.current_coin = if coins.is_empty() { None } else { Some(0) };
                self.state.coins = coins;
            }
            Err(e) => self.fail(e),
        }
        true
    }

    pub fn begin_fetch(&mut self) -> Option<(Ticket, ChartDataRequest, CancelToken)> {
        if !self.can_request_data() {
            return None;
        }
        let request = self.current_request()?;
        let (ticket, token) = self.issue(RequestKind::Chart);
        info!(
            coin = %request.coin_id,
            start = request.range.start,
            end = request.range.end,
            "fetching chart data"
        );
        Some((ticket, request, token))
    }

    pub fn apply_chart_data(
        &mut self,
        ticket: Ticket,
        result: Result<ChartData, ApiError>,
    ) -> bool {
        if !self.settle(ticket) {
            return false;
        }
        match result {
            Ok(chart) => self.store_chart(chart),
            Err(e) => self.fail(e),
        }
        true
    }

    pub fn begin_export(&mut self) -> Option<(Ticket, ChartDataRequest, CancelToken)> {
        if !self.can_request_data() {
            return None;
        }
        let request = self.current_request()?;
        let (ticket, token) = self.issue(RequestKind::Export);
        Some((ticket, request, token))
    }

    pub fn apply_export(&mut self, ticket: Ticket, result: Result<PathBuf, ApiError>) -> bool {
        if !self.settle(ticket) {
            return false;
        }
        match result {
            Ok(path) => self.state.last_export = Some(path),
            Err(e) => self.fail(e),
        }
        true
    }

    /// Cancels everything in flight; results that arrive afterwards are stale.
    pub fn shutdown(&mut self) {
        for (kind, (_, token)) in self.in_flight.drain() {
            debug!(?kind, "cancelling on shutdown");
            token.cancel();
        }
    }

    fn store_chart(&mut self, chart: ChartData) {
        let ChartData {
            prices,
            fear_greed,
            correlation,
        } = chart;

        self.state.scatter = scatter_pairs(&prices, &fear_greed);
        self.state.histogram_prices = histogram_table("Price", prices.iter().map(|p| p.value));
        self.state.histogram_fear_greed =
            histogram_table("Fear And Greed", fear_greed.iter().map(|f| f.value));
        self.state.prices = prices;
        self.state.fear_greed = fear_greed;
        self.state.correlation = Some(correlation);
    }

    fn fail(&mut self, error: ApiError) {
        if error.is_cancelled() {
            return;
        }
        warn!(%error, "request failed");
        self.state.error = Some(error.reason());
    }

    pub fn dismiss_error(&mut self) {
        self.state.error = None;
    }

    // --- Selection ---

    pub fn select_coin_by_name(&mut self, name: &str) -> bool {
        match self.state.coins.iter().position(|c| c.name == name) {
            Some(i) => {
                self.state.current_coin = Some(i);
                true
            }
            None => false,
        }
    }

    pub fn select_next_coin(&mut self) {
        let len = self.state.coins.len();
        if len > 0 {
            self.state.current_coin = Some(self.state.current_coin.map_or(0, |i| (i + 1) % len));
        }
    }

    pub fn select_previous_coin(&mut self) {
        let len = self.state.coins.len();
        if len > 0 {
            self.state.current_coin = Some(
                self.state
                    .current_coin
                    .and_then(|i| i.checked_sub(1))
                    .unwrap_or(len - 1),
            );
        }
    }

    // --- Date range picker ---
    // The start stops one day before `now`, the end stops at `now`.

    pub fn set_clock(&mut self, now: i64) {
        self.now = now;
    }

    pub fn set_start(&mut self, start: i64) {
        self.range.start = start.min(self.now - DateRange::DAY_SECS);
    }

    pub fn set_end(&mut self, end: i64) {
        self.range.end = end.min(self.now);
    }

    pub fn shift_start(&mut self, days: i64) {
        self.set_start(self.range.start + days * DateRange::DAY_SECS);
    }

    pub fn shift_end(&mut self, days: i64) {
        self.set_end(self.range.end + days * DateRange::DAY_SECS);
    }
}
