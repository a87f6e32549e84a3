use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// One transaction from the fact table
/// Core measures are always present; the dimensional attributes are optional
/// because they may come pre-populated or be attached by reconciliation
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct FactRecord {
    // ========================================================================
    // FOREIGN KEYS
    // ========================================================================
    #[serde(rename = "Date_Key", default)]
    pub date_key: Option<String>,

    #[serde(rename = "Customer_ID", default)]
    pub customer_id: Option<String>,

    // ========================================================================
    // MEASURES
    // ========================================================================
    #[serde(rename = "Amount")]
    pub amount: f64,

    #[serde(rename = "Transaction_Fee")]
    pub transaction_fee: f64,

    #[serde(rename = "Trans_Type")]
    pub trans_type: String,

    // ========================================================================
    // DIMENSIONAL ATTRIBUTES (filled by reconciliation when absent)
    // ========================================================================
    #[serde(rename = "Year", default, deserialize_with = "integral_cell")]
    pub year: Option<i32>,

    #[serde(rename = "Month", default, deserialize_with = "integral_cell")]
    pub month: Option<u32>,

    #[serde(rename = "Region_ID", default)]
    pub region_id: Option<String>,

    #[serde(rename = "Region_Name", default)]
    pub region_name: Option<String>,
}

impl FactRecord {
    /// Bare fact with keys and measures only
    pub fn new(
        date_key: &str,
        customer_id: &str,
        amount: f64,
        transaction_fee: f64,
        trans_type: &str,
    ) -> Self {
        FactRecord {
            date_key: Some(date_key.to_string()),
            customer_id: Some(customer_id.to_string()),
            amount,
            transaction_fee,
            trans_type: trans_type.to_string(),
            year: None,
            month: None,
            region_id: None,
            region_name: None,
        }
    }

    /// Year and month are both resolved
    pub fn year_month(&self) -> Option<(i32, u32)> {
        Some((self.year?, self.month?))
    }
}

// ============================================================================
// NUMERIC-LOOKING CELLS
// ============================================================================

/// Canonical form of a join key
///
/// Trims whitespace and writes an integral float (`1.0`, `2021.00`) as the
/// integer it holds, so `1.0` and `1` name the same dimension row.
pub fn normalize_key(raw: &str) -> &str {
    let key = raw.trim();
    match key.split_once('.') {
        Some((int_part, frac))
            if is_integer_text(int_part)
                && !frac.is_empty()
                && frac.bytes().all(|b| b == b'0') =>
        {
            int_part
        }
        _ => key,
    }
}

fn is_integer_text(text: &str) -> bool {
    let digits = text.strip_prefix('-').unwrap_or(text);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

#[derive(Deserialize)]
#[serde(untagged)]
enum IntegralCell {
    Int(i64),
    Float(f64),
    Text(String),
}

/// Whole-number cell that may have been written as a float (`2021.0`)
pub(crate) fn integral_cell<'de, D, T>(deserializer: D) -> std::result::Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: TryFrom<i64>,
{
    use serde::de::Error;

    let value = match Option::<IntegralCell>::deserialize(deserializer)? {
        None => return Ok(None),
        Some(IntegralCell::Int(v)) => v,
        Some(IntegralCell::Float(v)) if v.is_finite() && v.fract() == 0.0 => v as i64,
        Some(IntegralCell::Float(v)) => {
            return Err(D::Error::custom(format!("expected a whole number, got {v}")))
        }
        Some(IntegralCell::Text(text)) => {
            if text.trim().is_empty() {
                return Ok(None);
            }
            normalize_key(&text).parse::<i64>().map_err(|_| {
                D::Error::custom(format!("expected a whole number, got `{text}`"))
            })?
        }
    };

    T::try_from(value)
        .map(Some)
        .map_err(|_| D::Error::custom(format!("{value} is out of range")))
}

// ============================================================================
// FACT SCHEMA
// ============================================================================

/// Columns the fact table can carry
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum FactColumn {
    DateKey,
    CustomerId,
    Amount,
    TransactionFee,
    TransType,
    Year,
    Month,
    RegionId,
    RegionName,
}

impl FactColumn {
    pub const ALL: [FactColumn; 9] = [
        FactColumn::DateKey,
        FactColumn::CustomerId,
        FactColumn::Amount,
        FactColumn::TransactionFee,
        FactColumn::TransType,
        FactColumn::Year,
        FactColumn::Month,
        FactColumn::RegionId,
        FactColumn::RegionName,
    ];

    /// Measures every fact table must carry regardless of enrichment
    pub const REQUIRED: [FactColumn; 3] = [
        FactColumn::Amount,
        FactColumn::TransactionFee,
        FactColumn::TransType,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            FactColumn::DateKey => "Date_Key",
            FactColumn::CustomerId => "Customer_ID",
            FactColumn::Amount => "Amount",
            FactColumn::TransactionFee => "Transaction_Fee",
            FactColumn::TransType => "Trans_Type",
            FactColumn::Year => "Year",
            FactColumn::Month => "Month",
            FactColumn::RegionId => "Region_ID",
            FactColumn::RegionName => "Region_Name",
        }
    }

    pub fn from_header(header: &str) -> Option<Self> {
        let header = header.trim();
        FactColumn::ALL.into_iter().find(|c| c.name() == header)
    }
}

impl fmt::Display for FactColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Which columns the fact table actually has
///
/// Presence is a table-level property: a column can be present while
/// individual records hold `None` for it (a failed lookup).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FactSchema {
    columns: BTreeSet<FactColumn>,
}

impl FactSchema {
    /// Keys and measures, no dimensional attributes yet
    pub fn base() -> Self {
        FactSchema::default()
            .with(FactColumn::DateKey)
            .with(FactColumn::CustomerId)
            .with(FactColumn::Amount)
            .with(FactColumn::TransactionFee)
            .with(FactColumn::TransType)
    }

    /// Schema from a CSV header row; unknown headers are ignored
    pub fn from_headers<'a, I>(headers: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        FactSchema {
            columns: headers.into_iter().filter_map(FactColumn::from_header).collect(),
        }
    }

    pub fn with(mut self, column: FactColumn) -> Self {
        self.columns.insert(column);
        self
    }

    pub fn add(&mut self, column: FactColumn) {
        self.columns.insert(column);
    }

    pub fn has(&self, column: FactColumn) -> bool {
        self.columns.contains(&column)
    }

    pub fn has_year_month(&self) -> bool {
        self.has(FactColumn::Year) && self.has(FactColumn::Month)
    }

    pub fn has_region_id(&self) -> bool {
        self.has(FactColumn::RegionId)
    }

    pub fn has_region_name(&self) -> bool {
        self.has(FactColumn::RegionName)
    }

    pub fn missing_required(&self) -> Option<FactColumn> {
        FactColumn::REQUIRED.into_iter().find(|c| !self.has(*c))
    }

    pub fn columns(&self) -> impl Iterator<Item = FactColumn> + '_ {
        self.columns.iter().copied()
    }
}

// ============================================================================
// FACT TABLE
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactTable {
    pub schema: FactSchema,
    pub records: Vec<FactRecord>,
}

impl FactTable {
    pub fn new(schema: FactSchema, records: Vec<FactRecord>) -> Self {
        FactTable { schema, records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_from_headers() {
        let schema = FactSchema::from_headers([
            "Date_Key",
            "Customer_ID",
            "Amount",
            "Transaction_Fee",
            "Trans_Type",
            " Region_ID ",
            "Unrelated",
        ]);

        assert!(schema.has(FactColumn::DateKey));
        assert!(schema.has_region_id());
        assert!(!schema.has_region_name());
        assert!(!schema.has_year_month());
        assert_eq!(schema.missing_required(), None);
        assert_eq!(schema.columns().count(), 6);
    }

    #[test]
    fn test_year_month_needs_both_columns() {
        let schema = FactSchema::base().with(FactColumn::Year);
        assert!(!schema.has_year_month());

        let schema = schema.with(FactColumn::Month);
        assert!(schema.has_year_month());
    }

    #[test]
    fn test_missing_required_measure() {
        let schema = FactSchema::from_headers(["Date_Key", "Amount", "Trans_Type"]);
        assert_eq!(schema.missing_required(), Some(FactColumn::TransactionFee));
    }

    #[test]
    fn test_record_year_month() {
        let mut record = FactRecord::new("20210105", "C1", 10.0, 0.5, "Online");
        assert_eq!(record.year_month(), None);

        record.year = Some(2021);
        assert_eq!(record.year_month(), None);

        record.month = Some(1);
        assert_eq!(record.year_month(), Some((2021, 1)));
    }

    #[test]
    fn test_normalize_key() {
        assert_eq!(normalize_key(" 1.0 "), "1");
        assert_eq!(normalize_key("2021.00"), "2021");
        assert_eq!(normalize_key("-4.0"), "-4");
        assert_eq!(normalize_key("1.5"), "1.5");
        assert_eq!(normalize_key("C1"), "C1");
        assert_eq!(normalize_key("v1.0"), "v1.0");
        assert_eq!(normalize_key("1."), "1.");
    }

    #[test]
    fn test_year_month_accept_integral_floats() {
        let csv = "\
Date_Key,Customer_ID,Amount,Transaction_Fee,Trans_Type,Year,Month
20210115,C1,10,0.1,Online,2021.0,1.0
20210220,C2,20,0.2,Online,2021,
";
        let mut rdr = csv::ReaderBuilder::new().from_reader(csv.as_bytes());
        let records: Vec<FactRecord> = rdr.deserialize().collect::<std::result::Result<_, _>>().unwrap();

        assert_eq!(records[0].year_month(), Some((2021, 1)));
        assert_eq!(records[1].year, Some(2021));
        assert_eq!(records[1].month, None);
    }

    #[test]
    fn test_fractional_year_is_rejected() {
        let csv = "\
Date_Key,Customer_ID,Amount,Transaction_Fee,Trans_Type,Year,Month
20210115,C1,10,0.1,Online,2021.5,1
";
        let mut rdr = csv::ReaderBuilder::new().from_reader(csv.as_bytes());
        let result: std::result::Result<Vec<FactRecord>, _> = rdr.deserialize().collect();
        assert!(result.is_err());
    }
}
