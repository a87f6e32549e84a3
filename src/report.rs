// Report Assembler - region rows with trend glyphs, and the full dashboard report

use crate::aggregation::{GroupedSeries, KpiSnapshot, RegionKpi, RegionMonthTotal};
use crate::reconciliation::ReconciliationReport;
use crate::sparkline::SparklineEncoder;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One row of the regional table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionReportRow {
    pub region_name: String,
    pub sum: f64,
    #[serde(deserialize_with = "crate::aggregation::nan_from_null")]
    pub mean: f64,
    pub count: usize,
    /// Monthly totals in ascending month order; empty when the region has no trend data
    pub trend: Vec<f64>,
    pub sparkline: String,
}

impl RegionReportRow {
    pub fn has_trend(&self) -> bool {
        !self.trend.is_empty()
    }
}

/// Group the region × month totals back into one ordered sequence per region
pub fn trends_by_region(totals: &[RegionMonthTotal]) -> HashMap<&str, Vec<f64>> {
    let mut trends: HashMap<&str, Vec<(u32, f64)>> = HashMap::new();
    for t in totals {
        trends
            .entry(t.region_name.as_str())
            .or_default()
            .push((t.month, t.amount));
    }

    trends
        .into_iter()
        .map(|(region, mut points)| {
            points.sort_by_key(|(month, _)| *month);
            (region, points.into_iter().map(|(_, amount)| amount).collect())
        })
        .collect()
}

/// Join region KPIs with their encoded trend
///
/// Anchored on the KPI table: every KPI row yields exactly one report row,
/// regions that only appear in `totals` are dropped.
pub fn assemble_region_rows(
    kpis: &[RegionKpi],
    totals: &[RegionMonthTotal],
    encoder: &SparklineEncoder,
) -> Vec<RegionReportRow> {
    let trends = trends_by_region(totals);

    kpis.iter()
        .map(|kpi| {
            let trend = trends
                .get(kpi.region_name.as_str())
                .cloned()
                .unwrap_or_default();
            let sparkline = encoder.encode(&trend);

            RegionReportRow {
                region_name: kpi.region_name.clone(),
                sum: kpi.sum,
                mean: kpi.mean,
                count: kpi.count,
                trend,
                sparkline,
            }
        })
        .collect()
}

// ============================================================================
// DASHBOARD REPORT
// ============================================================================

/// Everything the presentation layer needs from one pipeline run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardReport {
    pub run_id: String,
    pub generated_at: DateTime<Utc>,
    pub selected_year: i32,
    pub kpis: KpiSnapshot,
    pub yearly: GroupedSeries<i32>,
    pub monthly: GroupedSeries<u32>,
    pub types: GroupedSeries<String>,
    pub amounts: Vec<f64>,
    pub regions: Vec<RegionReportRow>,
    pub reconciliation: ReconciliationReport,
}

impl DashboardReport {
    pub fn region(&self, name: &str) -> Option<&RegionReportRow> {
        self.regions.iter().find(|r| r.region_name == name)
    }

    pub fn summary(&self) -> String {
        format!(
            "{} transactions, total {:.2}, mean {:.2}, fees {:.2}, {} regions",
            self.kpis.count,
            self.kpis.total_amount,
            self.kpis.mean_amount,
            self.kpis.total_fee,
            self.regions.len()
        )
    }
}
