// ⚖️ Dimensional Reconciler - attach dimension attributes to facts
//
// Three enrichment stages, each a left join that runs only when the fact
// schema lacks its target columns:
//   Date_Key    -> Date_Dimension     -> Year, Month
//   Customer_ID -> Customer_Dimension -> Region_ID
//   Region_ID   -> Region_Dimension   -> Region_Name
//
// A join pulls exactly the columns it targets, and a column the fact table
// already has is never overwritten. Running the reconciler on its own output
// is a no-op.

use crate::dimensions::{DimensionSet, DimensionTable, DimensionRow};
use crate::error::{PipelineError, Result};
use crate::records::{FactColumn, FactRecord, FactSchema, FactTable};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

// ============================================================================
// STAGE REPORTING
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StageStatus {
    /// Target columns already present; join not performed
    Skipped,

    /// Join performed
    Applied { matched: usize, unmatched: usize },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageReport {
    pub stage: String,
    pub status: StageStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationReport {
    pub input_records: usize,
    pub output_records: usize,
    pub stages: Vec<StageReport>,
}

impl ReconciliationReport {
    pub fn applied_stages(&self) -> Vec<&str> {
        self.stages
            .iter()
            .filter(|s| matches!(s.status, StageStatus::Applied { .. }))
            .map(|s| s.stage.as_str())
            .collect()
    }

    pub fn total_unmatched(&self) -> usize {
        self.stages
            .iter()
            .map(|s| match s.status {
                StageStatus::Applied { unmatched, .. } => unmatched,
                StageStatus::Skipped => 0,
            })
            .sum()
    }

    pub fn summary(&self) -> String {
        format!(
            "Reconciled {} → {} records, stages applied: [{}], unmatched lookups: {}",
            self.input_records,
            self.output_records,
            self.applied_stages().join(", "),
            self.total_unmatched()
        )
    }
}

/// Output of reconciliation: the enriched fact table plus what was done to it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedFactSet {
    pub table: FactTable,
    pub report: ReconciliationReport,
}

impl EnrichedFactSet {
    pub fn records(&self) -> &[FactRecord] {
        &self.table.records
    }

    pub fn schema(&self) -> &FactSchema {
        &self.table.schema
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

// ============================================================================
// ENRICHMENT STAGES
// ============================================================================

/// Outcome of applying one stage
pub struct StageOutput {
    pub table: FactTable,
    pub matched: usize,
    pub unmatched: usize,
}

/// One optional enrichment pass over the fact table
pub trait EnrichmentStage {
    fn name(&self) -> &'static str;

    /// Columns this stage adds
    fn targets(&self) -> &'static [FactColumn];

    /// Fact column the join is keyed on
    fn key_column(&self) -> FactColumn;

    /// Dimension table the join reads from
    fn table_name(&self) -> &'static str;

    fn is_supplied(&self, dims: &DimensionSet) -> bool;

    fn apply(&self, table: FactTable, dims: &DimensionSet) -> Result<StageOutput>;

    fn is_satisfied(&self, schema: &FactSchema) -> bool {
        self.targets().iter().all(|c| schema.has(*c))
    }

    /// Verify the join can run against `schema` with `dims`
    fn check(&self, schema: &FactSchema, dims: &DimensionSet) -> Result<()> {
        if !self.is_supplied(dims) {
            return Err(PipelineError::MissingTable {
                table: self.table_name(),
                stage: self.name(),
            });
        }
        if !schema.has(self.key_column()) {
            return Err(PipelineError::missing_column(
                "fact",
                self.key_column().name(),
            ));
        }
        Ok(())
    }
}

fn require<'a, R: DimensionRow>(
    table: Option<&'a DimensionTable<R>>,
    stage: &'static str,
) -> Result<&'a DimensionTable<R>> {
    table.ok_or(PipelineError::MissingTable {
        table: R::TABLE,
        stage,
    })
}

/// Left-join every record through `join`, which returns the new record and
/// whether the lookup matched
fn left_join<F>(table: FactTable, added: &[FactColumn], mut join: F) -> StageOutput
where
    F: FnMut(FactRecord) -> (FactRecord, bool),
{
    let FactTable { mut schema, records } = table;
    let mut matched = 0;
    let mut out = Vec::with_capacity(records.len());

    for record in records {
        let (enriched, hit) = join(record);
        if hit {
            matched += 1;
        }
        out.push(enriched);
    }

    for column in added {
        schema.add(*column);
    }

    let unmatched = out.len() - matched;
    StageOutput {
        table: FactTable::new(schema, out),
        matched,
        unmatched,
    }
}

/// Date_Key → Year, Month
#[derive(Debug, Default, Clone, Copy)]
pub struct DateEnrichment;

impl EnrichmentStage for DateEnrichment {
    fn name(&self) -> &'static str {
        "date"
    }

    fn targets(&self) -> &'static [FactColumn] {
        &[FactColumn::Year, FactColumn::Month]
    }

    fn key_column(&self) -> FactColumn {
        FactColumn::DateKey
    }

    fn table_name(&self) -> &'static str {
        "Date_Dimension"
    }

    fn is_supplied(&self, dims: &DimensionSet) -> bool {
        dims.date.is_some()
    }

    fn apply(&self, table: FactTable, dims: &DimensionSet) -> Result<StageOutput> {
        let dates = require(dims.date.as_ref(), self.name())?;
        // a column the fact already carries wins over the joined one
        let keep_year = table.schema.has(FactColumn::Year);
        let keep_month = table.schema.has(FactColumn::Month);

        Ok(left_join(table, self.targets(), |record| {
            let found = dates.lookup(record.date_key.as_deref()).copied();
            let year = if keep_year { record.year } else { found.and_then(|d| d.year) };
            let month = if keep_month { record.month } else { found.and_then(|d| d.month) };
            (
                FactRecord {
                    year,
                    month,
                    ..record
                },
                found.is_some(),
            )
        }))
    }
}

/// Customer_ID → Region_ID
#[derive(Debug, Default, Clone, Copy)]
pub struct CustomerRegionEnrichment;

impl EnrichmentStage for CustomerRegionEnrichment {
    fn name(&self) -> &'static str {
        "customer_region"
    }

    fn targets(&self) -> &'static [FactColumn] {
        &[FactColumn::RegionId]
    }

    fn key_column(&self) -> FactColumn {
        FactColumn::CustomerId
    }

    fn table_name(&self) -> &'static str {
        "Customer_Dimension"
    }

    fn is_supplied(&self, dims: &DimensionSet) -> bool {
        dims.customer.is_some()
    }

    fn apply(&self, table: FactTable, dims: &DimensionSet) -> Result<StageOutput> {
        let customers = require(dims.customer.as_ref(), self.name())?;

        Ok(left_join(table, self.targets(), |record| {
            let found = customers.lookup(record.customer_id.as_deref());
            let region_id = found.cloned().flatten();
            (
                FactRecord {
                    region_id,
                    ..record
                },
                found.is_some(),
            )
        }))
    }
}

/// Region_ID → Region_Name
#[derive(Debug, Default, Clone, Copy)]
pub struct RegionNameEnrichment;

impl EnrichmentStage for RegionNameEnrichment {
    fn name(&self) -> &'static str {
        "region_name"
    }

    fn targets(&self) -> &'static [FactColumn] {
        &[FactColumn::RegionName]
    }

    fn key_column(&self) -> FactColumn {
        FactColumn::RegionId
    }

    fn table_name(&self) -> &'static str {
        "Region_Dimension"
    }

    fn is_supplied(&self, dims: &DimensionSet) -> bool {
        dims.region.is_some()
    }

    fn apply(&self, table: FactTable, dims: &DimensionSet) -> Result<StageOutput> {
        let regions = require(dims.region.as_ref(), self.name())?;

        Ok(left_join(table, self.targets(), |record| {
            let found = regions.lookup(record.region_id.as_deref());
            let region_name = found.cloned().flatten();
            (
                FactRecord {
                    region_name,
                    ..record
                },
                found.is_some(),
            )
        }))
    }
}

// ============================================================================
// RECONCILER
// ============================================================================

pub struct Reconciler {
    stages: Vec<Box<dyn EnrichmentStage + Send + Sync>>,
}

impl Reconciler {
    /// Date, customer region and region name stages, in dependency order
    pub fn new() -> Self {
        Reconciler {
            stages: vec![
                Box::new(DateEnrichment),
                Box::new(CustomerRegionEnrichment),
                Box::new(RegionNameEnrichment),
            ],
        }
    }

    /// Decide which stages run and validate all of them before any join
    ///
    /// Returns one flag per stage: `true` when the stage must run.
    pub fn plan(&self, schema: &FactSchema, dims: &DimensionSet) -> Result<Vec<bool>> {
        let mut projected = schema.clone();
        let mut plan = Vec::with_capacity(self.stages.len());

        for stage in &self.stages {
            if stage.is_satisfied(&projected) {
                plan.push(false);
                continue;
            }
            stage.check(&projected, dims)?;
            for column in stage.targets() {
                projected.add(*column);
            }
            plan.push(true);
        }

        Ok(plan)
    }

    /// Enrich `table` with every resolvable dimension attribute
    ///
    /// Left-join semantics throughout: the output always has as many records
    /// as the input. Missing tables or key columns fail before any join runs.
    pub fn reconcile(&self, table: FactTable, dims: &DimensionSet) -> Result<EnrichedFactSet> {
        let plan = self.plan(&table.schema, dims)?;
        let input_records = table.len();
        let mut table = table;
        let mut stages = Vec::with_capacity(self.stages.len());

        for (stage, run) in self.stages.iter().zip(plan) {
            if !run {
                debug!("stage {}: target columns present, skipped", stage.name());
                stages.push(StageReport {
                    stage: stage.name().to_string(),
                    status: StageStatus::Skipped,
                });
                continue;
            }

            let out = stage.apply(table, dims)?;
            debug!(
                "stage {}: joined {} records ({} matched)",
                stage.name(),
                out.table.len(),
                out.matched
            );
            if out.unmatched > 0 {
                warn!(
                    "stage {}: {} of {} records found no match in {}",
                    stage.name(),
                    out.unmatched,
                    out.table.len(),
                    stage.table_name()
                );
            }

            stages.push(StageReport {
                stage: stage.name().to_string(),
                status: StageStatus::Applied {
                    matched: out.matched,
                    unmatched: out.unmatched,
                },
            });
            table = out.table;
        }

        let report = ReconciliationReport {
            input_records,
            output_records: table.len(),
            stages,
        };
        info!("{}", report.summary());

        Ok(EnrichedFactSet { table, report })
    }
}

impl Default for Reconciler {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// TESTS
// ============================================================================
