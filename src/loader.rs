// CSV loading for the fact table and the three dimension tables

use crate::config::DashboardConfig;
use crate::dimensions::{
    CustomerDimension, CustomerRow, DateDimension, DateRow, DimensionRow, DimensionSet,
    DimensionTable, RegionDimension, RegionRow,
};
use crate::error::{PipelineError, Result};
use crate::records::{FactRecord, FactSchema, FactTable};
use log::{debug, info};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

fn csv_reader<R: Read>(reader: R) -> csv::Reader<R> {
    csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader)
}

fn open(path: &Path) -> Result<File> {
    File::open(path).map_err(|source| PipelineError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn csv_error(source_name: &str) -> impl Fn(csv::Error) -> PipelineError + '_ {
    move |source| PipelineError::Csv {
        path: PathBuf::from(source_name),
        source,
    }
}

/// Read a fact table; the header decides which optional columns are present
pub fn load_facts_from_reader<R: Read>(reader: R, source_name: &str) -> Result<FactTable> {
    let mut rdr = csv_reader(reader);
    let headers = rdr.headers().map_err(csv_error(source_name))?.clone();
    let schema = FactSchema::from_headers(headers.iter());

    if let Some(column) = schema.missing_required() {
        return Err(PipelineError::missing_column(source_name, column.name()));
    }

    let mut records = Vec::new();
    for result in rdr.deserialize() {
        let record: FactRecord = result.map_err(csv_error(source_name))?;
        records.push(record);
    }

    debug!(
        "{}: {} fact rows, columns [{}]",
        source_name,
        records.len(),
        schema.columns().map(|c| c.name()).collect::<Vec<_>>().join(", ")
    );

    Ok(FactTable::new(schema, records))
}

pub fn load_facts(path: &Path) -> Result<FactTable> {
    let file = open(path)?;
    load_facts_from_reader(file, &path.display().to_string())
}

/// Read a dimension table after checking its header carries every column
pub fn load_dimension_from_reader<D, R>(reader: R, source_name: &str) -> Result<DimensionTable<D>>
where
    D: DimensionRow,
    R: Read,
{
    let mut rdr = csv_reader(reader);
    let headers = rdr.headers().map_err(csv_error(source_name))?.clone();

    for column in D::COLUMNS {
        if !headers.iter().any(|h| h == *column) {
            return Err(PipelineError::missing_column(source_name, *column));
        }
    }

    let rows = rdr
        .deserialize::<D>()
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(csv_error(source_name))?;
    debug!("{}: {} rows read", source_name, rows.len());

    Ok(DimensionTable::from_rows(rows))
}

pub fn load_dimension<D: DimensionRow>(path: &Path) -> Result<DimensionTable<D>> {
    let file = open(path)?;
    load_dimension_from_reader(file, &path.display().to_string())
}

/// Keep `size` records picked by a seeded RNG, preserving their original order
pub fn sample_facts(table: FactTable, size: usize, seed: u64) -> FactTable {
    if size >= table.len() {
        return table;
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut picked = rand::seq::index::sample(&mut rng, table.len(), size).into_vec();
    picked.sort_unstable();

    let FactTable { schema, records } = table;
    let mut keep = vec![false; records.len()];
    for idx in picked {
        keep[idx] = true;
    }
    let records = records
        .into_iter()
        .zip(keep)
        .filter_map(|(record, k)| k.then_some(record))
        .collect();

    FactTable::new(schema, records)
}

/// Load every input named by `config`, sampling the fact table when asked
pub fn load_inputs(config: &DashboardConfig) -> Result<(FactTable, DimensionSet)> {
    let mut facts = load_facts(&config.fact_path())?;
    info!("Loaded {} fact rows from {}", facts.len(), config.fact_path().display());

    if let Some(size) = config.sample_size {
        facts = sample_facts(facts, size, config.sample_seed);
        info!("Sampled fact table down to {} rows (seed {})", facts.len(), config.sample_seed);
    }

    let date: Option<DateDimension> = load_optional_dimension::<DateRow>(&config.date_path())?;
    let customer: Option<CustomerDimension> =
        load_optional_dimension::<CustomerRow>(&config.customer_path())?;
    let region: Option<RegionDimension> =
        load_optional_dimension::<RegionRow>(&config.region_path())?;
    info!(
        "Loaded dimensions: {} dates, {} customers, {} regions",
        date.as_ref().map_or(0, |d| d.len()),
        customer.as_ref().map_or(0, |d| d.len()),
        region.as_ref().map_or(0, |d| d.len())
    );

    Ok((facts, DimensionSet { date, customer, region }))
}

/// Load a dimension file when it exists on disk
///
/// An absent file leaves the table unsupplied; the reconciler rejects the
/// run only if a stage actually needs it.
pub fn load_optional_dimension<D: DimensionRow>(path: &Path) -> Result<Option<DimensionTable<D>>> {
    if !path.exists() {
        info!("{} not found at {}; table not supplied", D::TABLE, path.display());
        return Ok(None);
    }
    load_dimension(path).map(Some)
}
