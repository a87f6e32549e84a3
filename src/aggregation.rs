// 📊 Metric Aggregator - headline KPIs and grouped roll-ups
//
// All sums are compensated (Neumaier) so large fact tables do not drift.
// Groups with no records never appear; records whose group key is unresolved
// are left out of that grouping but still count toward the KPI snapshot.

use crate::error::{PipelineError, Result};
use crate::records::FactRecord;
use log::warn;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

// ============================================================================
// COMPENSATED SUMMATION
// ============================================================================

/// Running sum with Neumaier error compensation
#[derive(Debug, Clone, Copy, Default)]
pub struct CompensatedSum {
    sum: f64,
    compensation: f64,
}

impl CompensatedSum {
    pub fn add(&mut self, value: f64) {
        let t = self.sum + value;
        if self.sum.abs() >= value.abs() {
            self.compensation += (self.sum - t) + value;
        } else {
            self.compensation += (value - t) + self.sum;
        }
        self.sum = t;
    }

    pub fn value(&self) -> f64 {
        self.sum + self.compensation
    }
}

impl FromIterator<f64> for CompensatedSum {
    fn from_iter<I: IntoIterator<Item = f64>>(iter: I) -> Self {
        let mut acc = CompensatedSum::default();
        for v in iter {
            acc.add(v);
        }
        acc
    }
}

/// Sum, count and mean of one group
#[derive(Debug, Clone, Copy, Default)]
struct GroupStats {
    sum: CompensatedSum,
    count: usize,
}

impl GroupStats {
    fn add(&mut self, value: f64) {
        self.sum.add(value);
        self.count += 1;
    }

    fn total(&self) -> f64 {
        self.sum.value()
    }

    /// NaN for an empty group
    fn mean(&self) -> f64 {
        if self.count == 0 {
            f64::NAN
        } else {
            self.total() / self.count as f64
        }
    }
}

// ============================================================================
// OUTPUT TYPES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KpiSnapshot {
    pub total_amount: f64,
    /// NaN when there are no records (written to JSON as `null`)
    #[serde(deserialize_with = "nan_from_null")]
    pub mean_amount: f64,
    pub total_fee: f64,
    pub count: usize,
}

/// serde_json writes NaN as `null`; read it back as NaN
pub(crate) fn nan_from_null<'de, D>(deserializer: D) -> std::result::Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::NAN))
}

impl KpiSnapshot {
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

/// One point of a chart-ready series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint<K> {
    pub key: K,
    pub amount: f64,
}

pub type GroupedSeries<K> = Vec<SeriesPoint<K>>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionMonthTotal {
    pub region_name: String,
    pub month: u32,
    pub amount: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionKpi {
    pub region_name: String,
    pub sum: f64,
    #[serde(deserialize_with = "nan_from_null")]
    pub mean: f64,
    pub count: usize,
}

/// What to do when the selected year matches no record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissingYearPolicy {
    /// Return an empty monthly series
    #[default]
    Empty,

    /// Fail with `PipelineError::NoRecordsForYear`
    Error,
}

// ============================================================================
// METRIC AGGREGATOR
// ============================================================================

pub struct MetricAggregator<'a> {
    records: &'a [FactRecord],
}

impl<'a> MetricAggregator<'a> {
    pub fn new(records: &'a [FactRecord]) -> Self {
        MetricAggregator { records }
    }

    /// Total and mean amount, total fee, record count
    pub fn kpis(&self) -> KpiSnapshot {
        let mut amount = GroupStats::default();
        let mut fee = CompensatedSum::default();

        for record in self.records {
            amount.add(record.amount);
            fee.add(record.transaction_fee);
        }

        KpiSnapshot {
            total_amount: amount.total(),
            mean_amount: amount.mean(),
            total_fee: fee.value(),
            count: amount.count,
        }
    }

    /// Sum of amount per year, ascending
    pub fn yearly_totals(&self) -> GroupedSeries<i32> {
        self.sum_by(|r| r.year)
    }

    /// Sum of amount per month within `year`, ascending month
    pub fn monthly_totals(&self, year: i32, policy: MissingYearPolicy) -> Result<GroupedSeries<u32>> {
        let series = self.sum_by(|r| match r.year_month() {
            Some((y, m)) if y == year => Some(m),
            _ => None,
        });

        let year_present = self.records.iter().any(|r| r.year == Some(year));
        if !year_present && !self.records.is_empty() {
            match policy {
                MissingYearPolicy::Empty => {
                    warn!("no records with Year = {}; monthly series is empty", year);
                }
                MissingYearPolicy::Error => return Err(PipelineError::NoRecordsForYear { year }),
            }
        }

        Ok(series)
    }

    /// Sum of amount per transaction type
    pub fn type_distribution(&self) -> GroupedSeries<String> {
        self.sum_by(|r| Some(r.trans_type.clone()))
    }

    /// Every amount in record order, for histogram binning downstream
    pub fn amount_distribution(&self) -> Vec<f64> {
        self.records.iter().map(|r| r.amount).collect()
    }

    /// Sum of amount per (region name, month), ascending by region then month
    pub fn region_month_totals(&self) -> Vec<RegionMonthTotal> {
        self.sum_by(|r| Some((r.region_name.clone()?, r.month?)))
            .into_iter()
            .map(|p| RegionMonthTotal {
                region_name: p.key.0,
                month: p.key.1,
                amount: p.amount,
            })
            .collect()
    }

    /// Sum, mean and count of amount per region name, ascending region
    pub fn region_kpis(&self) -> Vec<RegionKpi> {
        self.group_by(|r| r.region_name.clone())
            .into_iter()
            .map(|(region_name, stats)| RegionKpi {
                region_name,
                sum: stats.total(),
                mean: stats.mean(),
                count: stats.count,
            })
            .collect()
    }

    fn group_by<K, F>(&self, key: F) -> BTreeMap<K, GroupStats>
    where
        K: Ord,
        F: Fn(&FactRecord) -> Option<K>,
    {
        let mut groups: BTreeMap<K, GroupStats> = BTreeMap::new();
        for record in self.records {
            if let Some(k) = key(record) {
                groups.entry(k).or_default().add(record.amount);
            }
        }
        groups
    }

    fn sum_by<K, F>(&self, key: F) -> GroupedSeries<K>
    where
        K: Ord,
        F: Fn(&FactRecord) -> Option<K>,
    {
        self.group_by(key)
            .into_iter()
            .map(|(key, stats)| SeriesPoint {
                key,
                amount: stats.total(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(year: Option<i32>, month: Option<u32>, region: Option<&str>, amount: f64, kind: &str) -> FactRecord {
        FactRecord {
            year,
            month,
            region_name: region.map(str::to_string),
            ..FactRecord::new("k", "c", amount, amount / 100.0, kind)
        }
    }

    fn sample() -> Vec<FactRecord> {
        vec![
            record(Some(2021), Some(1), Some("North"), 100.0, "Online"),
            record(Some(2021), Some(1), Some("North"), 50.0, "Offline"),
            record(Some(2021), Some(3), Some("South"), 30.0, "Online"),
            record(Some(2020), Some(12), Some("South"), 20.0, "Online"),
            record(Some(2022), Some(2), Some("North"), 10.0, "Offline"),
        ]
    }

    #[test]
    fn test_kpis() {
        let records = sample();
        let kpis = MetricAggregator::new(&records).kpis();

        assert_eq!(kpis.total_amount, 210.0);
        assert_eq!(kpis.mean_amount, 42.0);
        assert!((kpis.total_fee - 2.1).abs() < 1e-12);
        assert_eq!(kpis.count, 5);
        assert!(!kpis.is_empty());
    }

    #[test]
    fn test_kpis_over_nothing_has_nan_mean() {
        let kpis = MetricAggregator::new(&[]).kpis();

        assert_eq!(kpis.count, 0);
        assert_eq!(kpis.total_amount, 0.0);
        assert!(kpis.mean_amount.is_nan());
        assert!(kpis.is_empty());
    }

    #[test]
    fn test_yearly_totals_ascending_and_sum_to_total() {
        let records = sample();
        let agg = MetricAggregator::new(&records);
        let yearly = agg.yearly_totals();

        let years: Vec<i32> = yearly.iter().map(|p| p.key).collect();
        assert_eq!(years, vec![2020, 2021, 2022]);
        assert_eq!(yearly[1].amount, 180.0);

        let sum: f64 = yearly.iter().map(|p| p.amount).sum();
        assert_eq!(sum, agg.kpis().total_amount);
    }

    #[test]
    fn test_unresolved_year_left_out_of_yearly() {
        let mut records = sample();
        records.push(record(None, None, None, 1000.0, "Online"));
        let agg = MetricAggregator::new(&records);

        let sum: f64 = agg.yearly_totals().iter().map(|p| p.amount).sum();
        assert_eq!(sum, 210.0);
        assert_eq!(agg.kpis().total_amount, 1210.0);
    }

    #[test]
    fn test_monthly_totals_for_selected_year() {
        let records = sample();
        let monthly = MetricAggregator::new(&records)
            .monthly_totals(2021, MissingYearPolicy::Empty)
            .unwrap();

        assert_eq!(
            monthly,
            vec![
                SeriesPoint { key: 1, amount: 150.0 },
                SeriesPoint { key: 3, amount: 30.0 },
            ]
        );
    }

    #[test]
    fn test_monthly_totals_missing_year_policies() {
        let records = sample();
        let agg = MetricAggregator::new(&records);

        let empty = agg.monthly_totals(1999, MissingYearPolicy::Empty).unwrap();
        assert!(empty.is_empty());

        let err = agg.monthly_totals(1999, MissingYearPolicy::Error).unwrap_err();
        assert!(matches!(err, PipelineError::NoRecordsForYear { year: 1999 }));
    }

    #[test]
    fn test_year_present_without_months_is_not_missing() {
        let records = vec![
            record(Some(2021), None, Some("North"), 100.0, "Online"),
            record(Some(2020), Some(4), Some("North"), 10.0, "Online"),
        ];
        let series = MetricAggregator::new(&records)
            .monthly_totals(2021, MissingYearPolicy::Error)
            .unwrap();
        assert!(series.is_empty());
    }

    #[test]
    fn test_monthly_totals_on_empty_dataset_is_not_an_error() {
        let monthly = MetricAggregator::new(&[])
            .monthly_totals(2021, MissingYearPolicy::Error)
            .unwrap();
        assert!(monthly.is_empty());
    }

    #[test]
    fn test_type_distribution() {
        let records = sample();
        let types = MetricAggregator::new(&records).type_distribution();

        assert_eq!(types.len(), 2);
        assert_eq!(types[0].key, "Offline");
        assert_eq!(types[0].amount, 60.0);
        assert_eq!(types[1].key, "Online");
        assert_eq!(types[1].amount, 150.0);
    }

    #[test]
    fn test_amount_distribution_is_raw() {
        let records = sample();
        assert_eq!(
            MetricAggregator::new(&records).amount_distribution(),
            vec![100.0, 50.0, 30.0, 20.0, 10.0]
        );
    }

    #[test]
    fn test_region_month_totals() {
        let records = sample();
        let totals = MetricAggregator::new(&records).region_month_totals();

        let keys: Vec<(&str, u32, f64)> = totals
            .iter()
            .map(|t| (t.region_name.as_str(), t.month, t.amount))
            .collect();
        assert_eq!(
            keys,
            vec![
                ("North", 1, 150.0),
                ("North", 2, 10.0),
                ("South", 3, 30.0),
                ("South", 12, 20.0),
            ]
        );
    }

    #[test]
    fn test_region_kpis() {
        let mut records = sample();
        records.push(record(Some(2021), Some(1), None, 999.0, "Online"));
        let kpis = MetricAggregator::new(&records).region_kpis();

        assert_eq!(kpis.len(), 2);
        assert_eq!(kpis[0].region_name, "North");
        assert_eq!(kpis[0].sum, 160.0);
        assert_eq!(kpis[0].count, 3);
        assert!((kpis[0].mean - 160.0 / 3.0).abs() < 1e-12);
        assert_eq!(kpis[1].region_name, "South");
        assert_eq!(kpis[1].mean, 25.0);
    }

    #[test]
    fn test_compensated_sum_beats_naive() {
        let values = [1e16, 1.0, -1e16];
        let naive: f64 = values.iter().sum();
        let compensated: CompensatedSum = values.into_iter().collect();

        assert_eq!(naive, 0.0);
        assert_eq!(compensated.value(), 1.0);
    }
}
