//! Conversions from upstream response shapes to chart-ready records.

use chrono::DateTime;

use crate::models::{
    ChartData, ChartDataResponse, CorrelationResult, PriceChartPoint, PriceRecord, PriceResponse,
    SentimentChartPoint, SentimentRecord,
};

const LABEL_FORMAT: &str = "%d-%m-%y";

/// Formats an epoch-millisecond timestamp as `DD-MM-YY` (UTC).
pub fn format_date_label(ts_ms: i64) -> String {
    DateTime::from_timestamp_millis(ts_ms)
        .map(|dt| dt.format(LABEL_FORMAT).to_string())
        .unwrap_or_else(|| "Unknown Time".to_string())
}

pub fn price_response_to_records(response: PriceResponse) -> Vec<PriceRecord> {
    response
        .prices
        .into_iter()
        .map(|(time, price)| PriceRecord {
            time_ms: time as i64,
            price,
        })
        .collect()
}

pub fn to_price_chart_point(record: &PriceRecord) -> PriceChartPoint {
    PriceChartPoint {
        label: format_date_label(record.time_ms),
        value: record.price,
        timestamp: record.time_ms,
    }
}

/// Sentiment timestamps are seconds; the label is derived from `timestamp * 1000`.
pub fn to_sentiment_chart_point(record: &SentimentRecord) -> SentimentChartPoint {
    SentimentChartPoint {
        label: format_date_label(record.timestamp.saturating_mul(1000)),
        value: record.value,
        classification: record.value_classification.clone(),
        timestamp: record.timestamp,
    }
}

/// Splits the joined rows into two series that share timestamps.
pub fn combined_response_to_chart_data(response: ChartDataResponse) -> ChartData {
    let ChartDataResponse {
        p_value,
        pearson,
        data,
    } = response;

    let prices = data
        .iter()
        .map(|row| PriceChartPoint {
            label: format_date_label(row.time),
            value: row.price,
            timestamp: row.time,
        })
        .collect();

    let fear_greed = data
        .into_iter()
        .map(|row| SentimentChartPoint {
            label: format_date_label(row.time),
            value: row.fear_greed.value,
            classification: row.fear_greed.value_classification,
            timestamp: row.time,
        })
        .collect();

    ChartData {
        prices,
        fear_greed,
        correlation: CorrelationResult { pearson, p_value },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ChartDataRow, FearGreedValue};

    #[test]
    fn price_pairs_become_records_in_order() {
        let response = PriceResponse {
            prices: vec![
                (1_700_000_000_000.0, 37_000.5),
                (1_700_086_400_000.0, 37_250.0),
                (1_700_172_800_000.0, 36_900.25),
            ],
        };
        let records = price_response_to_records(response);

        assert_eq!(records.len(), 3);
        assert_eq!((records[0].time_ms, records[0].price), (1_700_000_000_000, 37_000.5));
        assert_eq!((records[2].time_ms, records[2].price), (1_700_172_800_000, 36_900.25));
    }

    #[test]
    fn empty_inputs_convert_to_empty_outputs() {
        assert!(price_response_to_records(PriceResponse { prices: vec![] }).is_empty());

        let chart = combined_response_to_chart_data(ChartDataResponse {
            p_value: 1.0,
            pearson: 0.0,
            data: vec![],
        });
        assert!(chart.prices.is_empty());
        assert!(chart.fear_greed.is_empty());
    }

    #[test]
    fn labels_are_two_digit_day_month_year() {
        // 2023-11-14T22:13:20Z
        assert_eq!(format_date_label(1_700_000_000_000), "14-11-23");
        assert_eq!(format_date_label(1_700_000_000_000), format_date_label(1_700_000_000_000));
        assert_eq!(format_date_label(i64::MAX), "Unknown Time");
    }

    #[test]
    fn sentiment_point_uses_second_timestamps() {
        let record = SentimentRecord {
            value: 55.0,
            value_classification: "Greed".to_string(),
            timestamp: 1_700_000_000,
            time_until_update: None,
        };
        let point = to_sentiment_chart_point(&record);

        assert_eq!(point.label, "14-11-23");
        assert_eq!(point.timestamp, 1_700_000_000);
        assert_eq!(point.value, 55.0);
        assert_eq!(point.classification, "Greed");
    }

    #[test]
    fn combined_response_shares_timestamps() {
        let response = ChartDataResponse {
            p_value: 0.03,
            pearson: 0.61,
            data: vec![
                ChartDataRow {
                    time: 1_700_000_000_000,
                    price: 100.0,
                    fear_greed: FearGreedValue {
                        value: 40.0,
                        value_classification: "Fear".into(),
                    },
                },
                ChartDataRow {
                    time: 1_700_086_400_000,
                    price: 110.0,
                    fear_greed: FearGreedValue {
                        value: 60.0,
                        value_classification: "Greed".into(),
                    },
                },
            ],
        };
        let chart = combined_response_to_chart_data(response);

        let expected = CorrelationResult {
            pearson: 0.61,
            p_value: 0.03,
        };
        assert_eq!(chart.correlation, expected);
        let price_times: Vec<i64> = chart.prices.iter().map(|p| p.timestamp).collect();
        let fng_times: Vec<i64> = chart.fear_greed.iter().map(|p| p.timestamp).collect();
        assert_eq!(price_times, fng_times);
        assert_eq!(chart.prices[1].value, 110.0);
        assert_eq!(chart.fear_greed[1].classification, "Greed");
        assert_eq!(chart.fear_greed[0].label, chart.prices[0].label);
    }
}
