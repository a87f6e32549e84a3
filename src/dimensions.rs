// Dimension tables - read-only keyed lookups
//
// Each table maps one key column to the attributes a join pulls from it.
// Duplicate keys: the first row wins. A left join must never multiply fact
// records, so later rows for the same key are counted and reported instead.

use crate::records::normalize_key;
use log::{debug, warn};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// A row type that can back a dimension table
pub trait DimensionRow: DeserializeOwned {
    /// Human-readable table name used in logs and errors
    const TABLE: &'static str;

    /// Key column name
    const KEY_COLUMN: &'static str;

    /// Every column the CSV header must carry
    const COLUMNS: &'static [&'static str];

    /// What a successful lookup yields
    type Attributes: Clone + fmt::Debug;

    fn key(&self) -> &str;

    fn into_attributes(self) -> Self::Attributes;
}

// ============================================================================
// ROW TYPES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DateRow {
    #[serde(rename = "Date_Key")]
    pub date_key: String,

    #[serde(
        rename = "Year",
        default,
        deserialize_with = "crate::records::integral_cell"
    )]
    pub year: Option<i32>,

    #[serde(
        rename = "Month",
        default,
        deserialize_with = "crate::records::integral_cell"
    )]
    pub month: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct YearMonth {
    pub year: Option<i32>,
    pub month: Option<u32>,
}

impl DimensionRow for DateRow {
    const TABLE: &'static str = "Date_Dimension";
    const KEY_COLUMN: &'static str = "Date_Key";
    const COLUMNS: &'static [&'static str] = &["Date_Key", "Year", "Month"];
    type Attributes = YearMonth;

    fn key(&self) -> &str {
        &self.date_key
    }

    fn into_attributes(self) -> YearMonth {
        YearMonth {
            year: self.year,
            month: self.month,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerRow {
    #[serde(rename = "Customer_ID")]
    pub customer_id: String,

    #[serde(rename = "Region_ID", default)]
    pub region_id: Option<String>,
}

impl DimensionRow for CustomerRow {
    const TABLE: &'static str = "Customer_Dimension";
    const KEY_COLUMN: &'static str = "Customer_ID";
    const COLUMNS: &'static [&'static str] = &["Customer_ID", "Region_ID"];
    type Attributes = Option<String>;

    fn key(&self) -> &str {
        &self.customer_id
    }

    fn into_attributes(self) -> Option<String> {
        self.region_id.map(|id| normalize_key(&id).to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionRow {
    #[serde(rename = "Region_ID")]
    pub region_id: String,

    #[serde(rename = "Region_Name", default)]
    pub region_name: Option<String>,
}

impl DimensionRow for RegionRow {
    const TABLE: &'static str = "Region_Dimension";
    const KEY_COLUMN: &'static str = "Region_ID";
    const COLUMNS: &'static [&'static str] = &["Region_ID", "Region_Name"];
    type Attributes = Option<String>;

    fn key(&self) -> &str {
        &self.region_id
    }

    fn into_attributes(self) -> Option<String> {
        self.region_name
    }
}

// ============================================================================
// DIMENSION TABLE
// ============================================================================

#[derive(Debug, Clone)]
pub struct DimensionTable<R: DimensionRow> {
    index: HashMap<String, R::Attributes>,
    duplicate_keys: usize,
}

pub type DateDimension = DimensionTable<DateRow>;
pub type CustomerDimension = DimensionTable<CustomerRow>;
pub type RegionDimension = DimensionTable<RegionRow>;

impl<R: DimensionRow> DimensionTable<R> {
    pub fn from_rows<I>(rows: I) -> Self
    where
        I: IntoIterator<Item = R>,
    {
        let mut index = HashMap::new();
        let mut duplicate_keys = 0;
        let mut blank_keys = 0;

        for row in rows {
            let key = normalize_key(row.key()).to_string();
            if key.is_empty() {
                blank_keys += 1;
                continue;
            }
            if index.contains_key(&key) {
                duplicate_keys += 1;
                continue;
            }
            index.insert(key, row.into_attributes());
        }

        if duplicate_keys > 0 {
            warn!(
                "{}: {} duplicate {} rows ignored (first row wins)",
                R::TABLE,
                duplicate_keys,
                R::KEY_COLUMN
            );
        }
        if blank_keys > 0 {
            warn!("{}: {} rows with blank {} skipped", R::TABLE, blank_keys, R::KEY_COLUMN);
        }
        debug!("{}: {} distinct keys indexed", R::TABLE, index.len());

        DimensionTable {
            index,
            duplicate_keys,
        }
    }

    /// Left-join lookup: a null key or an unknown key yields `None`
    pub fn lookup(&self, key: Option<&str>) -> Option<&R::Attributes> {
        key.and_then(|k| self.index.get(normalize_key(k)))
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn duplicate_keys(&self) -> usize {
        self.duplicate_keys
    }

    pub fn table_name(&self) -> &'static str {
        R::TABLE
    }
}

// ============================================================================
// DIMENSION SET
// ============================================================================

/// The dimension tables available to a run
///
/// Tables are optional so a fact table that arrives already enriched can be
/// reconciled without them; the reconciler errors when a stage that must run
/// has no table.
#[derive(Debug, Clone, Default)]
pub struct DimensionSet {
    pub date: Option<DateDimension>,
    pub customer: Option<CustomerDimension>,
    pub region: Option<RegionDimension>,
}

impl DimensionSet {
    pub fn new(date: DateDimension, customer: CustomerDimension, region: RegionDimension) -> Self {
        DimensionSet {
            date: Some(date),
            customer: Some(customer),
            region: Some(region),
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_date(mut self, date: DateDimension) -> Self {
        self.date = Some(date);
        self
    }

    pub fn with_customer(mut self, customer: CustomerDimension) -> Self {
        self.customer = Some(customer);
        self
    }

    pub fn with_region(mut self, region: RegionDimension) -> Self {
        self.region = Some(region);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date_row(key: &str, year: i32, month: u32) -> DateRow {
        DateRow {
            date_key: key.to_string(),
            year: Some(year),
            month: Some(month),
        }
    }

    #[test]
    fn test_lookup_hits_and_misses() {
        let dates = DateDimension::from_rows(vec![
            date_row("20210101", 2021, 1),
            date_row("20210201", 2021, 2),
        ]);

        assert_eq!(dates.len(), 2);
        assert_eq!(
            dates.lookup(Some("20210201")),
            Some(&YearMonth {
                year: Some(2021),
                month: Some(2)
            })
        );
        assert_eq!(dates.lookup(Some("19990101")), None);
        assert_eq!(dates.lookup(None), None);
    }

    #[test]
    fn test_keys_are_trimmed() {
        let regions = RegionDimension::from_rows(vec![RegionRow {
            region_id: " 7 ".to_string(),
            region_name: Some("North".to_string()),
        }]);

        assert_eq!(regions.lookup(Some("7")), Some(&Some("North".to_string())));
        assert_eq!(regions.lookup(Some("  7")), Some(&Some("North".to_string())));
        assert_eq!(regions.lookup(Some("7.0")), Some(&Some("North".to_string())));
    }

    #[test]
    fn test_date_rows_accept_float_year_month() {
        let csv = "Date_Key,Year,Month\n20210115.0,2021.0,1.0\n";
        let mut rdr = csv::ReaderBuilder::new().from_reader(csv.as_bytes());
        let rows: Vec<DateRow> = rdr.deserialize().collect::<Result<_, _>>().unwrap();
        let dates = DateDimension::from_rows(rows);

        assert_eq!(
            dates.lookup(Some("20210115")),
            Some(&YearMonth {
                year: Some(2021),
                month: Some(1)
            })
        );
    }

    #[test]
    fn test_duplicate_keys_first_row_wins() {
        let customers = CustomerDimension::from_rows(vec![
            CustomerRow {
                customer_id: "C1".to_string(),
                region_id: Some("1".to_string()),
            },
            CustomerRow {
                customer_id: "C1".to_string(),
                region_id: Some("2".to_string()),
            },
        ]);

        assert_eq!(customers.len(), 1);
        assert_eq!(customers.duplicate_keys(), 1);
        assert_eq!(customers.lookup(Some("C1")), Some(&Some("1".to_string())));
    }

    #[test]
    fn test_blank_keys_are_skipped() {
        let customers = CustomerDimension::from_rows(vec![CustomerRow {
            customer_id: "  ".to_string(),
            region_id: Some("1".to_string()),
        }]);

        assert!(customers.is_empty());
        assert_eq!(customers.table_name(), "Customer_Dimension");
    }

    #[test]
    fn test_dimension_set_builder() {
        let set = DimensionSet::empty().with_region(RegionDimension::from_rows(Vec::new()));
        assert!(set.date.is_none());
        assert!(set.customer.is_none());
        assert!(set.region.is_some());
    }
}
