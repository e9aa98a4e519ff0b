use anyhow::{Result, anyhow};
use chrono::Utc;
use comfy_table::{
    Attribute, Cell, CellAlignment, Color, ContentArrangement, Table, modifiers::UTF8_ROUND_CORNERS,
    presets::UTF8_BORDERS_ONLY,
};
use tracing::info;

use crate::controller::Controller;
use crate::data_service::DataService;
use crate::models::DateRange;
use crate::transport::Transport;

pub struct ReportOptions {
    /// Coin display name; the first listed coin when absent.
    pub coin: Option<String>,
    pub days: i64,
    pub csv: bool,
}

// Maps an index value (0-100) onto a red → green ramp.
fn sentiment_color(value: f64) -> Color {
    let ratio = (value / 100.0).clamp(0.0, 1.0);
    Color::Rgb {
        r: (255.0 * (1.0 - ratio)) as u8,
        g: (255.0 * ratio) as u8,
        b: 0,
    }
}

pub fn build_table(controller: &Controller) -> Table {
    let state = controller.state();

    let mut table = Table::new();
    table
        .load_preset(UTF8_BORDERS_ONLY)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("Date").add_attribute(Attribute::Bold),
            Cell::new("Price")
                .add_attribute(Attribute::Bold)
                .set_alignment(CellAlignment::Right),
            Cell::new("Fear & Greed")
                .add_attribute(Attribute::Bold)
                .set_alignment(CellAlignment::Right),
            Cell::new("Classification").add_attribute(Attribute::Bold),
        ]);

    for (price, fng) in state.prices.iter().zip(&state.fear_greed) {
        table.add_row(vec![
            Cell::new(&price.label).fg(Color::DarkGrey),
            Cell::new(format!("{:.2}", price.value))
                .fg(Color::Cyan)
                .set_alignment(CellAlignment::Right),
            Cell::new(fng.value)
                .fg(sentiment_color(fng.value))
                .set_alignment(CellAlignment::Right),
            Cell::new(&fng.classification),
        ]);
    }

    table
}

fn correlation_line(controller: &Controller) -> String {
    match controller.state().correlation {
        Some(c) => format!("Pearson: {:.4}   P Value: {}", c.pearson, c.p_value),
        None => "No correlation available".to_string(),
    }
}

/// Headless mount → select → fetch (→ export), printing the result as a table.
pub async fn run<T: Transport>(service: &DataService<T>, options: ReportOptions) -> Result<()> {
    let now = Utc::now().timestamp();
    let mut controller = Controller::new(now);

    let (ticket, token) = controller.begin_load_coins();
    let coins = service.get_coins(&token).await;
    controller.apply_coins(ticket, coins);
    bail_on_error(&controller)?;

    if let Some(name) = &options.coin {
        if !controller.select_coin_by_name(name) {
            return Err(anyhow!("Unknown coin: {}", name));
        }
    }
    let days = options.days.max(1);
    let start = days
        .checked_mul(DateRange::DAY_SECS)
        .and_then(|span| now.checked_sub(span))
        .ok_or_else(|| anyhow!("--days out of range: {}", days))?;
    controller.set_start(start);
    controller.set_end(now);

    let (ticket, request, token) = controller
        .begin_fetch()
        .ok_or_else(|| anyhow!("No coins available"))?;
    let chart = service.get_chart_data(&request, &token).await;
    controller.apply_chart_data(ticket, chart);
    bail_on_error(&controller)?;

    let coin_name = controller
        .state()
        .current_coin()
        .map(|c| c.name.clone())
        .unwrap_or_default();

    if controller.state().prices.is_empty() {
        println!("No data found for {}.", coin_name);
    } else {
        println!("\n{} - last {} day(s)\n{}", coin_name, days, build_table(&controller));
    }
    println!("{}", correlation_line(&controller));

    if options.csv {
        if let Some((ticket, request, token)) = controller.begin_export() {
            let saved = service.export_csv(&request, &token).await;
            controller.apply_export(ticket, saved);
            bail_on_error(&controller)?;
        }
        if let Some(path) = &controller.state().last_export {
            info!(path = %path.display(), "report exported");
            println!("CSV saved to {}", path.display());
        }
    }

    Ok(())
}

fn bail_on_error(controller: &Controller) -> Result<()> {
    match &controller.state().error {
        Some(reason) => Err(anyhow!("{}", reason)),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Endpoints;
    use crate::rest_api::RestApi;
    use crate::storage_utils::AsyncStorageManager;
    use crate::transport::stub::StubTransport;
    use serde_json::json;

    fn loaded_controller() -> Controller {
        let mut controller = Controller::new(1_700_086_400);
        let (ticket, _) = controller.begin_load_coins();
        controller.apply_coins(
            ticket,
            Ok(vec![crate::models::Coin {
                id: "bitcoin".into(),
                symbol: "btc".into(),
                name: "Bitcoin".into(),
            }]),
        );
        controller
    }

    #[test]
    fn table_has_one_row_per_point() {
        let mut controller = loaded_controller();
        let (ticket, _, _) = controller.begin_fetch().unwrap();
        let chart = crate::convert::combined_response_to_chart_data(
            serde_json::from_value(json!({
                "p_value": 0.1, "pearson": 0.9,
                "data": [
                    {"time": 1700000000000u64, "price": 1.0,
                     "fear_greed": {"value": 10, "value_classification": "Extreme Fear"}},
                    {"time": 1700086400000u64, "price": 2.0,
                     "fear_greed": {"value": 90, "value_classification": "Extreme Greed"}}
                ]
            }))
            .unwrap(),
        );
        controller.apply_chart_data(ticket, Ok(chart));

        let rendered = build_table(&controller).to_string();
        assert!(rendered.contains("14-11-23"));
        assert!(rendered.contains("Extreme Greed"));
        assert_eq!(correlation_line(&controller), "Pearson: 0.9000   P Value: 0.1");
    }

    #[test]
    fn sentiment_colors_span_red_to_green() {
        assert_eq!(sentiment_color(0.0), Color::Rgb { r: 255, g: 0, b: 0 });
        assert_eq!(sentiment_color(100.0), Color::Rgb { r: 0, g: 255, b: 0 });
    }

    async fn coins_only_service(tag: &str) -> (DataService<StubTransport>, std::path::PathBuf) {
        let stub = StubTransport::new().json(
            "/coins",
            json!([{"id": "bitcoin", "symbol": "btc", "name": "Bitcoin"}]),
        );
        let dir = std::env::temp_dir().join(format!("fng-report-{}-{}", tag, std::process::id()));
        let service = DataService::new(
            RestApi::new(stub, Endpoints::default()),
            AsyncStorageManager::new(&dir).await.unwrap(),
        );
        (service, dir)
    }

    #[tokio::test]
    async fn unknown_coin_is_an_error() {
        let (service, dir) = coins_only_service("unknown").await;

        let options = ReportOptions {
            coin: Some("Dogecoin".into()),
            days: 1,
            csv: false,
        };
        let err = run(&service, options).await.unwrap_err();
        assert_eq!(err.to_string(), "Unknown coin: Dogecoin");

        let _ = tokio::fs::remove_dir_all(dir).await;
    }

    #[tokio::test]
    async fn huge_day_count_is_an_error_not_a_panic() {
        let (service, dir) = coins_only_service("days").await;

        let options = ReportOptions {
            coin: None,
            days: i64::MAX / 1000,
            csv: false,
        };
        let err = run(&service, options).await.unwrap_err();
        assert!(err.to_string().starts_with("--days out of range"));
        // Nothing beyond the coin list was requested.
        assert_eq!(service_calls(&service), vec!["/coins".to_string()]);

        let _ = tokio::fs::remove_dir_all(dir).await;
    }

    fn service_calls(service: &DataService<StubTransport>) -> Vec<String> {
        service.transport().calls().into_iter().map(|(path, _)| path).collect()
    }
}
