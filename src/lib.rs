// Fact Dashboard - Core Library
// Exposes the pipeline for use in CLI, TUI, API server, and tests

pub mod error;
pub mod config;
pub mod records;
pub mod dimensions;
pub mod loader;
pub mod reconciliation;  // Dimensional reconciler
pub mod aggregation;     // KPIs and grouped series
pub mod sparkline;       // Glyph trend encoder
pub mod report;          // Region rows + dashboard report
pub mod pipeline;

// Re-export commonly used types
pub use error::{PipelineError, Result};
pub use config::DashboardConfig;
pub use records::{FactColumn, FactRecord, FactSchema, FactTable};
pub use dimensions::{
    CustomerDimension, CustomerRow, DateDimension, DateRow, DimensionRow, DimensionSet,
    DimensionTable, RegionDimension, RegionRow, YearMonth,
};
pub use loader::{
    load_dimension, load_dimension_from_reader, load_facts, load_facts_from_reader, load_inputs,
    load_optional_dimension, sample_facts,
};
pub use reconciliation::{
    CustomerRegionEnrichment, DateEnrichment, EnrichedFactSet, EnrichmentStage,
    ReconciliationReport, Reconciler, RegionNameEnrichment, StageReport, StageStatus,
};
pub use aggregation::{
    CompensatedSum, GroupedSeries, KpiSnapshot, MetricAggregator, MissingYearPolicy,
    RegionKpi, RegionMonthTotal, SeriesPoint,
};
pub use sparkline::{encode, SparklineEncoder, DEFAULT_MAX_LEN, GLYPHS};
pub use report::{assemble_region_rows, DashboardReport, RegionReportRow};
pub use pipeline::{Pipeline, PipelineOptions};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
