//! Secondary views derived from a loaded [`ChartData`](crate::models::ChartData).

use serde::Serialize;
use std::collections::HashMap;

use crate::models::{PriceChartPoint, SentimentChartPoint};

/// Price on x, fear & greed on y. `fear_greed` is `None` when no sample shares the timestamp.
#[derive(Serialize, Debug, Clone, Copy, PartialEq)]
pub struct ScatterPoint {
    pub price: f64,
    pub fear_greed: Option<f64>,
}

/// One row of the two-column table a histogram widget consumes.
#[derive(Debug, Clone, PartialEq)]
pub enum HistogramRow {
    Header(String, String),
    Data(String, f64),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HistogramBin {
    pub lower: f64,
    pub upper: f64,
    pub count: u64,
}

/// One entry per price point, in price order. Unmatched timestamps are kept.
pub fn scatter_pairs(
    prices: &[PriceChartPoint],
    fear_greed: &[SentimentChartPoint],
) -> Vec<ScatterPoint> {
    let by_timestamp: HashMap<i64, f64> = fear_greed
        .iter()
        .map(|f| (f.timestamp, f.value))
        .collect();

    prices
        .iter()
        .map(|p| ScatterPoint {
            price: p.value,
            fear_greed: by_timestamp.get(&p.timestamp).copied(),
        })
        .collect()
}

/// Header row followed by `(value as text, value)` for every value.
pub fn histogram_table(header: &str, values: impl IntoIterator<Item = f64>) -> Vec<HistogramRow> {
    let mut table = vec![HistogramRow::Header(header.to_string(), "Value".to_string())];
    table.extend(values.into_iter().map(|v| HistogramRow::Data(v.to_string(), v)));
    table
}

/// Buckets the numeric column of `table` into `bins` equal-width bins.
pub fn histogram_bins(table: &[HistogramRow], bins: usize) -> Vec<HistogramBin> {
    let values: Vec<f64> = table
        .iter()
        .filter_map(|row| match row {
            HistogramRow::Data(_, v) if v.is_finite() => Some(*v),
            _ => None,
        })
        .collect();

    if values.is_empty() || bins == 0 {
        return Vec::new();
    }

    let min = values.iter().cloned().fold(f64::INFINITY, f64::min);
    let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);

    if max == min {
        return vec![HistogramBin {
            lower: min,
            upper: max,
            count: values.len() as u64,
        }];
    }

    let width = (max - min) / bins as f64;
    let mut result: Vec<HistogramBin> = (0..bins)
        .map(|i| HistogramBin {
            lower: min + width * i as f64,
            upper: min + width * (i + 1) as f64,
            count: 0,
        })
        .collect();

    for v in values {
        // The maximum lands exactly on the upper edge; keep it in the last bin.
        let idx = (((v - min) / width) as usize).min(bins - 1);
        result[idx].count += 1;
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn price(timestamp: i64, value: f64) -> PriceChartPoint {
        PriceChartPoint {
            label: String::new(),
            value,
            timestamp,
        }
    }

    fn sentiment(timestamp: i64, value: f64) -> SentimentChartPoint {
        SentimentChartPoint {
            label: String::new(),
            value,
            classification: "Neutral".to_string(),
            timestamp,
        }
    }

    #[test]
    fn scatter_keeps_unmatched_prices() {
        let prices = [price(1, 10.0), price(2, 20.0), price(3, 30.0)];
        let fng = [sentiment(1, 40.0), sentiment(3, 60.0)];

        let pairs = scatter_pairs(&prices, &fng);

        assert_eq!(pairs.len(), 3);
        let paired: Vec<(f64, Option<f64>)> =
            pairs.iter().map(|p| (p.price, p.fear_greed)).collect();
        assert_eq!(
            paired,
            vec![(10.0, Some(40.0)), (20.0, None), (30.0, Some(60.0))]
        );
    }

    #[test]
    fn histogram_table_has_header_plus_one_row_per_value() {
        let table = histogram_table("Price", [37000.5, 42.0, 0.25]);

        assert_eq!(table.len(), 4);
        assert_eq!(table[0], HistogramRow::Header("Price".into(), "Value".into()));
        assert_eq!(table[1], HistogramRow::Data("37000.5".into(), 37000.5));
        assert_eq!(table[2], HistogramRow::Data("42".into(), 42.0));
        assert_eq!(table[3], HistogramRow::Data("0.25".into(), 0.25));
    }

    #[test]
    fn empty_histogram_table_is_header_only() {
        let table = histogram_table("Fear And Greed", std::iter::empty());
        assert_eq!(table.len(), 1);
        assert!(histogram_bins(&table, 5).is_empty());
    }

    #[test]
    fn bins_cover_every_value() {
        let table = histogram_table("Fear And Greed", [0.0, 10.0, 25.0, 50.0, 99.0, 100.0]);
        let bins = histogram_bins(&table, 4);

        assert_eq!(bins.len(), 4);
        assert_eq!(bins.iter().map(|b| b.count).sum::<u64>(), 6);
        assert_eq!(bins[0].count, 2); // 0 and 10
        assert_eq!(bins[3].count, 2); // 99 and 100
        assert_eq!(bins[0].lower, 0.0);
        assert_eq!(bins[3].upper, 100.0);
    }

    #[test]
    fn identical_values_share_a_single_bin() {
        let table = histogram_table("Price", [5.0, 5.0, 5.0]);
        let bins = histogram_bins(&table, 10);
        let expected = HistogramBin {
            lower: 5.0,
            upper: 5.0,
            count: 3,
        };
        assert_eq!(bins, vec![expected]);
    }
}
