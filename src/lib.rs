//! Terminal dashboard correlating coin prices with the crypto fear & greed index.

pub mod cancel;
pub mod chart_views;
pub mod config;
pub mod controller;
pub mod convert;
pub mod data_service;
pub mod error;
pub mod models;
pub mod report;
pub mod rest_api;
pub mod storage_utils;
pub mod transport;
pub mod tui;

use crate::config::AppConfig;
use crate::data_service::DataService;
use crate::rest_api::RestApi;
use crate::storage_utils::AsyncStorageManager;
use crate::transport::ReqwestTransport;

/// Wires the HTTP transport, REST client and download directory together.
pub async fn build_service(config: &AppConfig) -> anyhow::Result<DataService<ReqwestTransport>> {
    let transport = ReqwestTransport::new(&config.base_url, config.timeout())?;
    let api = RestApi::new(transport, config.endpoints.clone());
    let downloads = AsyncStorageManager::new_relative(&config.download_dir).await?;
    Ok(DataService::new(api, downloads))
}
