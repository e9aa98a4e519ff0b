use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

// --- Domain ---

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Coin {
    pub id: String,
    pub symbol: String,
    pub name: String,
}

/// One point of a price series. `time_ms` is Unix epoch milliseconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceRecord {
    pub time_ms: i64,
    pub price: f64,
}

/// One sample of the fear & greed index. `timestamp` is Unix epoch seconds.
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct SentimentRecord {
    #[serde(deserialize_with = "deserialize_f64_lenient")]
    pub value: f64,
    pub value_classification: String,
    #[serde(deserialize_with = "deserialize_i64_lenient")]
    pub timestamp: i64,
    #[serde(default, deserialize_with = "deserialize_opt_i64_lenient")]
    pub time_until_update: Option<i64>,
}

/// Inclusive query window in Unix epoch seconds.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: i64,
    pub end: i64,
}

impl DateRange {
    pub const DAY_SECS: i64 = 86_400;

    pub fn new(start: i64, end: i64) -> Self {
        Self { start, end }
    }

    /// `[now - 1 day, now]`, the window the dashboard opens with.
    pub fn last_day(now: i64) -> Self {
        Self::new(now - Self::DAY_SECS, now)
    }

    pub fn contains(&self, timestamp: i64) -> bool {
        timestamp >= self.start && timestamp <= self.end
    }

    pub fn query(&self) -> Vec<(&'static str, String)> {
        vec![("start", self.start.to_string()), ("end", self.end.to_string())]
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChartDataRequest {
    pub coin_id: String,
    pub range: DateRange,
}

// --- Wire shapes ---

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct PriceResponse {
    pub prices: Vec<(f64, f64)>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct FearGreedResponse {
    #[serde(default)]
    pub name: String,
    pub data: Vec<SentimentRecord>,
    #[serde(default)]
    pub metadata: FearGreedMetadata,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct FearGreedMetadata {
    pub error: Option<String>,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct ChartDataResponse {
    pub p_value: f64,
    pub pearson: f64,
    pub data: Vec<ChartDataRow>,
}

/// A price sample joined with the sentiment of the same day. `time` is epoch ms.
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct ChartDataRow {
    pub time: i64,
    pub price: f64,
    pub fear_greed: FearGreedValue,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct FearGreedValue {
    #[serde(deserialize_with = "deserialize_f64_lenient")]
    pub value: f64,
    pub value_classification: String,
}

/// Error body the upstream price provider returns with a 2xx status.
#[derive(Deserialize, Debug, Clone)]
pub struct UpstreamErrorEnvelope {
    pub status: UpstreamErrorStatus,
}

#[derive(Deserialize, Debug, Clone)]
pub struct UpstreamErrorStatus {
    pub error_code: i64,
    pub error_message: String,
}

// --- Chart-ready shapes ---

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct PriceChartPoint {
    pub label: String,
    pub value: f64,
    pub timestamp: i64,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct SentimentChartPoint {
    pub label: String,
    pub value: f64,
    pub classification: String,
    pub timestamp: i64,
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq)]
pub struct CorrelationResult {
    pub pearson: f64,
    pub p_value: f64,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct ChartData {
    pub prices: Vec<PriceChartPoint>,
    pub fear_greed: Vec<SentimentChartPoint>,
    pub correlation: CorrelationResult,
}

// --- Lenient numbers ---
// The sentiment provider serves numbers as strings ("45", "1700000000").

struct LenientF64Visitor;

impl<'de> Visitor<'de> for LenientF64Visitor {
    type Value = Option<f64>;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a float, an integer, or a string representing a number")
    }

    fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E> {
        Ok(Some(v))
    }

    fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E> {
        Ok(Some(v as f64))
    }

    fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E> {
        Ok(Some(v as f64))
    }

    fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        if v.trim().is_empty() {
            Ok(None)
        } else {
            v.trim().parse::<f64>().map(Some).map_err(E::custom)
        }
    }

    fn visit_unit<E>(self) -> Result<Self::Value, E> {
        Ok(None)
    }
}

fn deserialize_opt_f64_lenient<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    deserializer.deserialize_any(LenientF64Visitor)
}

fn deserialize_f64_lenient<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    deserialize_opt_f64_lenient(deserializer)?
        .ok_or_else(|| de::Error::custom("expected a number, found an empty value"))
}

fn deserialize_i64_lenient<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    deserialize_f64_lenient(deserializer).map(|v| v as i64)
}

fn deserialize_opt_i64_lenient<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    deserialize_opt_f64_lenient(deserializer).map(|v| v.map(|v| v as i64))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentiment_accepts_string_and_number_fields() {
        let json = r#"[
            {"value": "45", "value_classification": "Fear", "timestamp": "1700000000",
             "time_until_update": "3600"},
            {"value": 72, "value_classification": "Greed", "timestamp": 1700086400}
        ]"#;
        let records: Vec<SentimentRecord> = serde_json::from_str(json).unwrap();

        assert_eq!(records[0].value, 45.0);
        assert_eq!(records[0].timestamp, 1_700_000_000);
        assert_eq!(records[0].time_until_update, Some(3600));
        assert_eq!(records[1].value, 72.0);
        assert_eq!(records[1].time_until_update, None);
    }

    #[test]
    fn empty_sentiment_value_is_rejected() {
        let json = r#"{"value": " ", "value_classification": "Fear", "timestamp": 1}"#;
        assert!(serde_json::from_str::<SentimentRecord>(json).is_err());
    }

    #[test]
    fn date_range_is_inclusive() {
        let range = DateRange::new(10, 20);
        assert!(range.contains(10));
        assert!(range.contains(20));
        assert!(!range.contains(9));
        assert!(!range.contains(21));
    }

    #[test]
    fn fear_greed_metadata_defaults_when_missing() {
        let response: FearGreedResponse =
            serde_json::from_str(r#"{"data": []}"#).unwrap();
        assert!(response.data.is_empty());
        assert!(response.metadata.error.is_none());
    }
}
