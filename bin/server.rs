// Fact Dashboard - Web Server
// JSON API over one pipeline run computed at start-up

use anyhow::{Context, Result};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::get,
    Router,
};
use fact_dashboard::{
    load_inputs, DashboardConfig, DashboardReport, EnrichedFactSet, MetricAggregator, Pipeline,
    PipelineOptions,
};
use log::{error, info};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

/// Shared application state (immutable after start-up)
#[derive(Clone)]
struct AppState {
    report: Arc<DashboardReport>,
    enriched: Arc<EnrichedFactSet>,
    options: PipelineOptions,
}

/// API Response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    fn err(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
        }
    }
}

#[derive(Deserialize)]
struct MonthlyQuery {
    year: Option<i32>,
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok("OK"))
}

/// GET /api/report - Full dashboard report
async fn get_report(State(state): State<AppState>) -> impl IntoResponse {
    Json(ApiResponse::ok(state.report.as_ref().clone()))
}

/// GET /api/kpis - Headline KPIs
async fn get_kpis(State(state): State<AppState>) -> impl IntoResponse {
    Json(ApiResponse::ok(state.report.kpis))
}

/// GET /api/series/yearly
async fn get_yearly(State(state): State<AppState>) -> impl IntoResponse {
    Json(ApiResponse::ok(state.report.yearly.clone()))
}

/// GET /api/series/monthly?year=2022 - Monthly totals, default the configured year
async fn get_monthly(
    State(state): State<AppState>,
    Query(query): Query<MonthlyQuery>,
) -> impl IntoResponse {
    let year = query.year.unwrap_or(state.options.selected_year);
    let agg = MetricAggregator::new(state.enriched.records());

    match agg.monthly_totals(year, state.options.missing_year_policy) {
        Ok(series) => (StatusCode::OK, Json(ApiResponse::ok(series))).into_response(),
        Err(e) => {
            error!("Monthly series for {} failed: {}", year, e);
            (StatusCode::NOT_FOUND, Json(ApiResponse::<()>::err(e.to_string()))).into_response()
        }
    }
}

/// GET /api/series/types
async fn get_types(State(state): State<AppState>) -> impl IntoResponse {
    Json(ApiResponse::ok(state.report.types.clone()))
}

/// GET /api/series/amounts - Raw amounts for client-side histogram binning
async fn get_amounts(State(state): State<AppState>) -> impl IntoResponse {
    Json(ApiResponse::ok(state.report.amounts.clone()))
}

/// GET /api/regions - Region table with sparklines
async fn get_regions(State(state): State<AppState>) -> impl IntoResponse {
    Json(ApiResponse::ok(state.report.regions.clone()))
}

/// GET /api/regions/:name - One region row
async fn get_region(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> impl IntoResponse {
    // Path has already percent-decoded the segment
    match state.report.region(&name) {
        Some(row) => (StatusCode::OK, Json(ApiResponse::ok(row.clone()))).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(ApiResponse::<()>::err(format!("Unknown region: {}", name))),
        )
            .into_response(),
    }
}

fn router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/report", get(get_report))
        .route("/kpis", get(get_kpis))
        .route("/series/yearly", get(get_yearly))
        .route("/series/monthly", get(get_monthly))
        .route("/series/types", get(get_types))
        .route("/series/amounts", get(get_amounts))
        .route("/regions", get(get_regions))
        .route("/regions/:name", get(get_region))
        .with_state(state);

    Router::new()
        .nest("/api", api_routes)
        .layer(CorsLayer::permissive())
}

// ============================================================================
// Main Server
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    println!("🌐 Fact Dashboard - Web Server");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let config = DashboardConfig::from_env().context("Failed to load configuration")?;
    let options = PipelineOptions::from(&config);

    let (facts, dims) = load_inputs(&config).with_context(|| {
        format!("Failed to load input tables from {}", config.data_dir.display())
    })?;
    let (enriched, report) = Pipeline::new(options)
        .run(facts, &dims)
        .context("Pipeline run failed")?;
    info!("✓ {}", report.summary());

    let state = AppState {
        report: Arc::new(report),
        enriched: Arc::new(enriched),
        options,
    };

    let listener = tokio::net::TcpListener::bind(&config.bind)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind))?;

    println!("\n🚀 Server running on http://{}", config.bind);
    println!("   API: http://{}/api/report", config.bind);
    println!("\n   Press Ctrl+C to stop\n");

    axum::serve(listener, router(state))
        .await
        .context("Server stopped with an error")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use fact_dashboard::{
        CustomerDimension, CustomerRow, DateDimension, DateRow, DimensionSet, FactRecord,
        FactSchema, FactTable, RegionDimension, RegionRow,
    };
    use tower::ServiceExt;

    fn state() -> AppState {
        let dims = DimensionSet::new(
            DateDimension::from_rows(vec![DateRow {
                date_key: "d1".to_string(),
                year: Some(2021),
                month: Some(1),
            }]),
            CustomerDimension::from_rows(vec![CustomerRow {
                customer_id: "c1".to_string(),
                region_id: Some("1".to_string()),
            }]),
            RegionDimension::from_rows(vec![RegionRow {
                region_id: "1".to_string(),
                region_name: Some("Zone%41".to_string()),
            }]),
        );
        let facts = FactTable::new(
            FactSchema::base(),
            vec![FactRecord::new("d1", "c1", 10.0, 0.1, "Online")],
        );

        let options = PipelineOptions::default();
        let (enriched, report) = Pipeline::new(options).run(facts, &dims).unwrap();
        AppState {
            report: Arc::new(report),
            enriched: Arc::new(enriched),
            options,
        }
    }

    async fn fetch(uri: &str) -> (StatusCode, serde_json::Value) {
        let response = router(state())
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn test_region_name_with_literal_percent() {
        let (status, json) = fetch("/api/regions/Zone%2541").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"]["region_name"], "Zone%41");

        let (status, json) = fetch("/api/regions/ZoneA").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["success"], false);
    }

    #[tokio::test]
    async fn test_monthly_defaults_to_selected_year() {
        let (status, json) = fetch("/api/series/monthly").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"][0]["key"], 1);
        assert_eq!(json["data"][0]["amount"], 10.0);
    }
}
