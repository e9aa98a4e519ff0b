//! Typed client for the dashboard backend.
//!
//! Every response goes through [`decode_json`] or [`decode_bytes`], which is the
//! only place HTTP failures and upstream error envelopes are recognized.

use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::cancel::CancelToken;
use crate::config::Endpoints;
use crate::convert::price_response_to_records;
use crate::error::ApiError;
use crate::models::{
    ChartDataResponse, Coin, DateRange, FearGreedResponse, PriceRecord, PriceResponse,
    SentimentRecord, UpstreamErrorEnvelope,
};
use crate::transport::{RawResponse, Transport};

pub struct RestApi<T> {
    transport: T,
    endpoints: Endpoints,
}

impl<T: Transport> RestApi<T> {
    pub fn new(transport: T, endpoints: Endpoints) -> Self {
        Self {
            transport,
            endpoints,
        }
    }

    #[cfg(test)]
    pub(crate) fn transport(&self) -> &T {
        &self.transport
    }

    pub async fn list_coins(&self, cancel: &CancelToken) -> Result<Vec<Coin>, ApiError> {
        let raw = self.transport.get(&self.endpoints.coins, &[], cancel).await?;
        decode_json(raw)
    }

    /// The upstream serves the whole history; records outside `range` are dropped here.
    pub async fn get_sentiment_series(
        &self,
        range: DateRange,
        cancel: &CancelToken,
    ) -> Result<Vec<SentimentRecord>, ApiError> {
        let raw = self
            .transport
            .get(&self.endpoints.fear_greed, &[], cancel)
            .await?;
        let response: FearGreedResponse = decode_json(raw)?;

        if let Some(message) = response.metadata.error.filter(|m| !m.trim().is_empty()) {
            warn!(source = %response.name, %message, "sentiment provider reported an error");
            return Err(ApiError::Upstream {
                code: None,
                reason: message,
            });
        }

        let total = response.data.len();
        let records: Vec<SentimentRecord> = response
            .data
            .into_iter()
            .filter(|r| range.contains(r.timestamp))
            .collect();
        debug!(total, kept = records.len(), "filtered sentiment series");
        Ok(records)
    }

    pub async fn get_price_series(
        &self,
        coin_id: &str,
        range: Option<DateRange>,
        cancel: &CancelToken,
    ) -> Result<Vec<PriceRecord>, ApiError> {
        let path = format!("{}/{}", self.endpoints.prices, coin_id);
        let query = range.map(|r| r.query()).unwrap_or_default();
        let raw = self.transport.get(&path, &query, cancel).await?;
        let response: PriceResponse = decode_json(raw)?;
        Ok(price_response_to_records(response))
    }

    pub async fn get_chart_data(
        &self,
        coin_id: &str,
        range: DateRange,
        cancel: &CancelToken,
    ) -> Result<ChartDataResponse, ApiError> {
        let path = format!("{}/{}", self.endpoints.chart_data, coin_id);
        let raw = self.transport.get(&path, &range.query(), cancel).await?;
        decode_json(raw)
    }

    pub async fn export_csv(
        &self,
        coin_id: &str,
        range: DateRange,
        cancel: &CancelToken,
    ) -> Result<Vec<u8>, ApiError> {
        let path = format!("{}/{}", self.endpoints.csv, coin_id);
        let raw = self.transport.get(&path, &range.query(), cancel).await?;
        decode_bytes(raw)
    }
}

pub fn decode_json<T: DeserializeOwned>(raw: RawResponse) -> Result<T, ApiError> {
    check_status(&raw)?;
    check_envelope(&raw.body)?;
    Ok(serde_json::from_slice(&raw.body)?)
}

pub fn decode_bytes(raw: RawResponse) -> Result<Vec<u8>, ApiError> {
    check_status(&raw)?;
    check_envelope(&raw.body)?;
    Ok(raw.body)
}

fn check_status(raw: &RawResponse) -> Result<(), ApiError> {
    if raw.status >= 400 {
        warn!(status = raw.status, reason = %raw.status_text, "backend returned an error status");
        return Err(ApiError::Status {
            code: raw.status,
            reason: raw.status_text.clone(),
        });
    }
    Ok(())
}

fn check_envelope(body: &[u8]) -> Result<(), ApiError> {
    // Only objects can be envelopes; skips parsing large arrays and CSV bodies.
    let looks_like_object = body
        .iter()
        .find(|b| !b.is_ascii_whitespace())
        .is_some_and(|&b| b == b'{');
    if !looks_like_object {
        return Ok(());
    }

    match serde_json::from_slice::<UpstreamErrorEnvelope>(body) {
        Ok(envelope) => {
            warn!(
                code = envelope.status.error_code,
                message = %envelope.status.error_message,
                "upstream error envelope"
            );
            Err(ApiError::Upstream {
                code: Some(envelope.status.error_code),
                reason: envelope.status.error_message,
            })
        }
        Err(_) => Ok(()),
    }
}
