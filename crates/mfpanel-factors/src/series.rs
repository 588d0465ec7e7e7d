//! Monthly factor return series.
//!
//! Two delimited files feed the regressions: the five-factor research file
//! (`date,Mkt-RF,SMB,HML,RMW,CMA,RF`) and the momentum file (`date,Mom`),
//! both keyed by an integer `YYYYMM` date and quoted in percent. The
//! risk-free column is not a regressor and is ignored. The two files are
//! inner-joined on date and restricted to a configured range.

use crate::error::{FactorError, Result};
use crate::registry::FACTOR_COUNT;
use csv::{ReaderBuilder, Trim};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::io::Read;
use std::path::Path;
use tracing::info;

/// File name of the five-factor series.
pub const FIVE_FACTOR_FILE: &str = "F-F_Research_Data_5_Factors_2x3.csv";

/// File name of the momentum series.
pub const MOMENTUM_FILE: &str = "F-F_Momentum_Factor.csv";

/// Frame column names of the factor values, in regressor order.
pub const FACTOR_COLUMNS: [&str; FACTOR_COUNT] = ["mkt_rf", "smb", "hml", "mom", "cma", "rmw"];

/// Inclusive range of `YYYYMM` months.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthRange {
    /// First month included.
    pub start: i32,
    /// Last month included.
    pub end: i32,
}

impl MonthRange {
    /// Create a range after validating both bounds.
    pub fn new(start: i32, end: i32) -> Result<Self> {
        validate_month(start)?;
        validate_month(end)?;
        if start > end {
            return Err(FactorError::InvalidRange { start, end });
        }
        Ok(Self { start, end })
    }

    /// Whether a month lies inside the range.
    pub const fn contains(&self, date: i32) -> bool {
        self.start <= date && date <= self.end
    }
}

impl Default for MonthRange {
    fn default() -> Self {
        Self {
            start: 198001,
            end: 201912,
        }
    }
}

fn validate_month(date: i32) -> Result<()> {
    let month = date % 100;
    if date < 10_000 || !(1..=12).contains(&month) {
        return Err(FactorError::InvalidMonth(date));
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
struct FiveFactorRow {
    date: i32,
    #[serde(rename = "Mkt-RF")]
    mkt_rf: f64,
    #[serde(rename = "SMB")]
    smb: f64,
    #[serde(rename = "HML")]
    hml: f64,
    #[serde(rename = "RMW")]
    rmw: f64,
    #[serde(rename = "CMA")]
    cma: f64,
}

#[derive(Debug, Deserialize)]
struct MomentumRow {
    date: i32,
    #[serde(rename = "MOM", alias = "Mom", alias = "mom")]
    mom: f64,
}

/// Factor returns of one month, in percent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FactorObservation {
    /// Month as `YYYYMM`.
    pub date: i32,
    /// Market excess return.
    pub mkt_rf: f64,
    /// Size factor.
    pub smb: f64,
    /// Value factor.
    pub hml: f64,
    /// Momentum factor.
    pub mom: f64,
    /// Investment factor.
    pub cma: f64,
    /// Profitability factor.
    pub rmw: f64,
}

impl FactorObservation {
    /// Factor values in regressor order (flow excluded).
    pub const fn values(&self) -> [f64; FACTOR_COUNT] {
        [self.mkt_rf, self.smb, self.hml, self.mom, self.cma, self.rmw]
    }
}

/// Joined factor series, one observation per month in ascending order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FactorSeries {
    observations: Vec<FactorObservation>,
}

fn read_rows<T, R>(reader: R, file: &str) -> Result<Vec<T>>
where
    T: for<'de> Deserialize<'de> + HasDate,
    R: Read,
{
    let mut rdr = ReaderBuilder::new().trim(Trim::All).from_reader(reader);
    let mut seen = HashSet::new();
    let mut rows = Vec::new();
    for row in rdr.deserialize() {
        let row: T = row?;
        if !seen.insert(row.date()) {
            return Err(FactorError::DuplicateMonth {
                file: file.to_string(),
                date: row.date(),
            });
        }
        rows.push(row);
    }
    Ok(rows)
}

trait HasDate {
    fn date(&self) -> i32;
}

impl HasDate for FiveFactorRow {
    fn date(&self) -> i32 {
        self.date
    }
}

impl HasDate for MomentumRow {
    fn date(&self) -> i32 {
        self.date
    }
}

impl FactorSeries {
    /// Build a series from observations, sorting them by month.
    pub fn new(mut observations: Vec<FactorObservation>) -> Self {
        observations.sort_by_key(|o| o.date);
        Self { observations }
    }

    /// Read and join the two factor files from readers.
    pub fn from_readers<A: Read, B: Read>(
        five_factor: A,
        momentum: B,
        range: MonthRange,
    ) -> Result<Self> {
        let five: Vec<FiveFactorRow> = read_rows(five_factor, FIVE_FACTOR_FILE)?;
        let mom: Vec<MomentumRow> = read_rows(momentum, MOMENTUM_FILE)?;
        let mom_by_date: HashMap<i32, f64> = mom.iter().map(|r| (r.date, r.mom)).collect();

        let observations: Vec<FactorObservation> = five
            .iter()
            .filter(|r| range.contains(r.date))
            .filter_map(|r| {
                mom_by_date.get(&r.date).map(|&mom| FactorObservation {
                    date: r.date,
                    mkt_rf: r.mkt_rf,
                    smb: r.smb,
                    hml: r.hml,
                    mom,
                    cma: r.cma,
                    rmw: r.rmw,
                })
            })
            .collect();

        info!(
            five_factor_rows = five.len(),
            momentum_rows = mom.len(),
            rows_out = observations.len(),
            start = range.start,
            end = range.end,
            "joined factor series"
        );
        Ok(Self::new(observations))
    }

    /// Read and join the two factor files.
    pub fn load(five_factor: &Path, momentum: &Path, range: MonthRange) -> Result<Self> {
        let open = |path: &Path| -> Result<std::fs::File> {
            if !path.exists() {
                return Err(FactorError::MissingFile {
                    path: path.to_path_buf(),
                });
            }
            Ok(std::fs::File::open(path)?)
        };
        Self::from_readers(open(five_factor)?, open(momentum)?, range)
    }

    /// Read both files from a directory using their standard names.
    pub fn load_dir(dir: &Path, range: MonthRange) -> Result<Self> {
        Self::load(&dir.join(FIVE_FACTOR_FILE), &dir.join(MOMENTUM_FILE), range)
    }

    /// Observations in ascending month order.
    pub fn observations(&self) -> &[FactorObservation] {
        &self.observations
    }

    /// Observation of one month.
    pub fn get(&self, date: i32) -> Option<&FactorObservation> {
        self.observations
            .binary_search_by_key(&date, |o| o.date)
            .ok()
            .map(|i| &self.observations[i])
    }

    /// Frame with a `date` column and one column per factor
    /// ([`FACTOR_COLUMNS`]).
    pub fn to_frame(&self) -> PolarsResult<DataFrame> {
        let mut columns: Vec<Column> = vec![
            Series::new(
                "date".into(),
                self.observations.iter().map(|o| o.date).collect::<Vec<_>>(),
            )
            .into(),
        ];
        for (k, name) in FACTOR_COLUMNS.iter().enumerate() {
            let values: Vec<f64> = self.observations.iter().map(|o| o.values()[k]).collect();
            columns.push(Series::new((*name).into(), values).into());
        }
        DataFrame::new(columns)
    }

    /// Number of months.
    pub fn len(&self) -> usize {
        self.observations.len()
    }

    /// Whether the series is empty.
    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const FIVE: &str = "date,Mkt-RF,SMB,HML,RMW,CMA,RF
197912,1.0,0.1,0.2,0.3,0.4,0.5
198001,5.51,1.66,1.86,-1.87,1.89,0.80
198002,-1.22,-1.84,0.59,0.92,-0.96,0.89
198003,-12.90,-6.59,-1.08,1.41,-1.03,1.21
";

    const MOM: &str = "date,Mom
198001,  7.55
198003,-9.73
";

    #[test]
    fn test_inner_join_and_range() {
        let series =
            FactorSeries::from_readers(FIVE.as_bytes(), MOM.as_bytes(), MonthRange::default())
                .unwrap();
        assert_eq!(series.len(), 2);

        let jan = series.get(198001).unwrap();
        assert_eq!(jan.mkt_rf, 5.51);
        assert_eq!(jan.mom, 7.55);
        assert_eq!(jan.rmw, -1.87);
        assert_eq!(jan.values(), [5.51, 1.66, 1.86, 7.55, 1.89, -1.87]);

        assert!(series.get(198002).is_none());
        assert!(series.get(197912).is_none());
    }

    #[test]
    fn test_frame_columns_follow_regressor_order() {
        let series =
            FactorSeries::from_readers(FIVE.as_bytes(), MOM.as_bytes(), MonthRange::default())
                .unwrap();
        let df = series.to_frame().unwrap();
        assert_eq!(df.height(), 2);
        assert_eq!(df.width(), 1 + FACTOR_COUNT);
        let rmw: Vec<Option<f64>> =
            df.column("rmw").unwrap().f64().unwrap().into_iter().collect();
        assert_eq!(rmw, vec![Some(-1.87), Some(1.41)]);
    }

    #[test]
    fn test_duplicate_month_rejected() {
        let mom = "date,Mom\n198001,1.0\n198001,2.0\n";
        let err = FactorSeries::from_readers(FIVE.as_bytes(), mom.as_bytes(), MonthRange::default())
            .unwrap_err();
        assert!(matches!(err, FactorError::DuplicateMonth { date: 198001, .. }));
    }

    #[test]
    fn test_missing_column_is_csv_error() {
        let five = "date,Mkt-RF,SMB\n198001,1.0,2.0\n";
        let err = FactorSeries::from_readers(five.as_bytes(), MOM.as_bytes(), MonthRange::default())
            .unwrap_err();
        assert!(matches!(err, FactorError::Csv(_)));
    }

    #[test]
    fn test_missing_file() {
        let err = FactorSeries::load_dir(Path::new("/nonexistent-factor-dir"), MonthRange::default())
            .unwrap_err();
        assert!(matches!(err, FactorError::MissingFile { .. }));
    }

    #[rstest]
    #[case(198001, 201912, true)]
    #[case(198013, 201912, false)]
    #[case(201912, 198001, false)]
    #[case(1980, 201912, false)]
    fn test_month_range(#[case] start: i32, #[case] end: i32, #[case] valid: bool) {
        assert_eq!(MonthRange::new(start, end).is_ok(), valid);
    }
}
