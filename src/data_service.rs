use std::path::PathBuf;
use tracing::{info, instrument};

use crate::cancel::CancelToken;
use crate::convert::{
    combined_response_to_chart_data, to_price_chart_point, to_sentiment_chart_point,
};
use crate::error::ApiError;
use crate::models::{
    ChartData, ChartDataRequest, Coin, DateRange, PriceChartPoint, SentimentChartPoint,
};
use crate::rest_api::RestApi;
use crate::storage_utils::AsyncStorageManager;
use crate::transport::Transport;

pub const CSV_FILE_NAME: &str = "data.csv";

/// Composes the REST client with shape conversion and the CSV download target.
pub struct DataService<T> {
    api: RestApi<T>,
    downloads: AsyncStorageManager,
}

impl<T: Transport> DataService<T> {
    pub fn new(api: RestApi<T>, downloads: AsyncStorageManager) -> Self {
        Self { api, downloads }
    }

    #[cfg(test)]
    pub(crate) fn transport(&self) -> &T {
        self.api.transport()
    }

    pub async fn get_coins(&self, cancel: &CancelToken) -> Result<Vec<Coin>, ApiError> {
        self.api.list_coins(cancel).await
    }

    pub async fn get_price_chart_data(
        &self,
        coin_id: &str,
        range: Option<DateRange>,
        cancel: &CancelToken,
    ) -> Result<Vec<PriceChartPoint>, ApiError> {
        let records = self.api.get_price_series(coin_id, range, cancel).await?;
        Ok(records.iter().map(to_price_chart_point).collect())
    }

    pub async fn get_fear_greed_chart_data(
        &self,
        range: DateRange,
        cancel: &CancelToken,
    ) -> Result<Vec<SentimentChartPoint>, ApiError> {
        let records = self.api.get_sentiment_series(range, cancel).await?;
        Ok(records.iter().map(to_sentiment_chart_point).collect())
    }

    #[instrument(skip(self, cancel), fields(coin = %request.coin_id))]
    pub async fn get_chart_data(
        &self,
        request: &ChartDataRequest,
        cancel: &CancelToken,
    ) -> Result<ChartData, ApiError> {
        let response = self
            .api
            .get_chart_data(&request.coin_id, request.range, cancel)
            .await?;
        let chart = combined_response_to_chart_data(response);
        info!(
            points = chart.prices.len(),
            pearson = chart.correlation.pearson,
            "chart data loaded"
        );
        Ok(chart)
    }

    /// Downloads the CSV and saves it as `data.csv`; nothing is written on error.
    #[instrument(skip(self, cancel), fields(coin = %request.coin_id))]
    pub async fn export_csv(
        &self,
        request: &ChartDataRequest,
        cancel: &CancelToken,
    ) -> Result<PathBuf, ApiError> {
        let bytes = self
            .api
            .export_csv(&request.coin_id, request.range, cancel)
            .await?;

        if cancel.is_cancelled() {
            return Err(ApiError::Cancelled);
        }

        let path = self
            .downloads
            .save_bytes(CSV_FILE_NAME, &bytes)
            .await
            .map_err(|e| ApiError::Storage(e.to_string()))?;
        info!(path = %path.display(), bytes = bytes.len(), "csv saved");
        Ok(path)
    }
}
