// Pipeline - reconcile → aggregate → encode → assemble
//
// Each run is a pure function of its inputs; nothing is kept between runs.

use crate::aggregation::{MetricAggregator, MissingYearPolicy};
use crate::config::DashboardConfig;
use crate::dimensions::DimensionSet;
use crate::error::Result;
use crate::reconciliation::{EnrichedFactSet, Reconciler};
use crate::records::FactTable;
use crate::report::{assemble_region_rows, DashboardReport};
use crate::sparkline::SparklineEncoder;
use log::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineOptions {
    pub selected_year: i32,
    pub missing_year_policy: MissingYearPolicy,
    pub sparkline_max_len: usize,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        PipelineOptions::from(&DashboardConfig::default())
    }
}

impl From<&DashboardConfig> for PipelineOptions {
    fn from(config: &DashboardConfig) -> Self {
        PipelineOptions {
            selected_year: config.selected_year,
            missing_year_policy: config.missing_year_policy,
            sparkline_max_len: config.sparkline_max_len,
        }
    }
}

pub struct Pipeline {
    reconciler: Reconciler,
    options: PipelineOptions,
}

impl Pipeline {
    pub fn new(options: PipelineOptions) -> Self {
        Pipeline {
            reconciler: Reconciler::new(),
            options,
        }
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    /// Run reconciliation only
    pub fn reconcile(&self, facts: FactTable, dims: &DimensionSet) -> Result<EnrichedFactSet> {
        self.reconciler.reconcile(facts, dims)
    }

    /// Full run: enrich the facts, then build the dashboard report
    pub fn run(&self, facts: FactTable, dims: &DimensionSet) -> Result<(EnrichedFactSet, DashboardReport)> {
        let enriched = self.reconcile(facts, dims)?;
        let report = self.report(&enriched)?;
        Ok((enriched, report))
    }

    /// Aggregate and assemble from an already enriched fact set
    pub fn report(&self, enriched: &EnrichedFactSet) -> Result<DashboardReport> {
        if enriched.is_empty() {
            warn!("fact table is empty after reconciliation; charts will be empty");
        }

        let agg = MetricAggregator::new(enriched.records());
        let encoder = SparklineEncoder::new(self.options.sparkline_max_len);

        let kpis = agg.kpis();
        let monthly = agg.monthly_totals(self.options.selected_year, self.options.missing_year_policy)?;
        let regions = assemble_region_rows(&agg.region_kpis(), &agg.region_month_totals(), &encoder);

        let report = DashboardReport {
            run_id: uuid::Uuid::new_v4().to_string(),
            generated_at: chrono::Utc::now(),
            selected_year: self.options.selected_year,
            kpis,
            yearly: agg.yearly_totals(),
            monthly,
            types: agg.type_distribution(),
            amounts: agg.amount_distribution(),
            regions,
            reconciliation: enriched.report.clone(),
        };
        info!("Report {}: {}", report.run_id, report.summary());

        Ok(report)
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new(PipelineOptions::default())
    }
}
