//! Typed column access on polars frames with schema errors.

use crate::error::{DataError, Result};
use chrono::NaiveDate;
use polars::prelude::*;

/// Days from 0001-01-01 (CE) to 1970-01-01.
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

fn column<'a>(df: &'a DataFrame, dataset: &str, name: &str) -> Result<&'a Column> {
    df.column(name)
        .map_err(|_| DataError::schema(dataset, format!("missing column `{}`", name)))
}

fn cast(df: &DataFrame, dataset: &str, name: &str, dtype: &DataType) -> Result<Column> {
    column(df, dataset, name)?.cast(dtype).map_err(|e| {
        DataError::schema(
            dataset,
            format!("column `{}` cannot be read as {}: {}", name, dtype, e),
        )
    })
}

/// Fail unless every named column is present.
pub fn require_columns(df: &DataFrame, dataset: &str, names: &[&str]) -> Result<()> {
    for name in names {
        column(df, dataset, name)?;
    }
    Ok(())
}

/// Integer column.
pub fn i64_values(df: &DataFrame, dataset: &str, name: &str) -> Result<Vec<Option<i64>>> {
    let values = cast(df, dataset, name, &DataType::Int64)?;
    Ok(values.i64()?.into_iter().collect())
}

/// 32-bit integer column.
pub fn i32_values(df: &DataFrame, dataset: &str, name: &str) -> Result<Vec<Option<i32>>> {
    let values = cast(df, dataset, name, &DataType::Int32)?;
    Ok(values.i32()?.into_iter().collect())
}

/// Float column with `NaN` kept as a value.
pub fn f64_values_with_nan(
    df: &DataFrame,
    dataset: &str,
    name: &str,
) -> Result<Vec<Option<f64>>> {
    let values = cast(df, dataset, name, &DataType::Float64)?;
    Ok(values.f64()?.into_iter().collect())
}

/// Float column, `NaN` read as null.
pub fn f64_values(df: &DataFrame, dataset: &str, name: &str) -> Result<Vec<Option<f64>>> {
    let values = cast(df, dataset, name, &DataType::Float64)?;
    Ok(values
        .f64()?
        .into_iter()
        .map(|v| v.filter(|x| !x.is_nan()))
        .collect())
}

/// Boolean column.
pub fn bool_values(
    df: &DataFrame,
    dataset: &str,
    name: &str,
) -> Result<Vec<Option<bool>>> {
    let values = cast(df, dataset, name, &DataType::Boolean)?;
    Ok(values.bool()?.into_iter().collect())
}

/// String column.
pub fn str_values(
    df: &DataFrame,
    dataset: &str,
    name: &str,
) -> Result<Vec<Option<String>>> {
    let values = cast(df, dataset, name, &DataType::String)?;
    Ok(values
        .str()?
        .into_iter()
        .map(|v| v.map(str::to_string))
        .collect())
}

/// Date column stored as a date, a datetime or an ISO `YYYY-MM-DD` string.
pub fn date_values(
    df: &DataFrame,
    dataset: &str,
    name: &str,
) -> Result<Vec<Option<NaiveDate>>> {
    let raw = column(df, dataset, name)?;
    if matches!(raw.dtype(), DataType::String) {
        return raw
            .str()?
            .into_iter()
            .map(|v| v.map(|s| parse_iso_date(dataset, name, s)).transpose())
            .collect();
    }

    let days = raw
        .cast(&DataType::Date)
        .and_then(|c| c.cast(&DataType::Int32))
        .map_err(|e| {
            DataError::schema(
                dataset,
                format!("column `{}` cannot be read as a date: {}", name, e),
            )
        })?;

    days.i32()?
        .into_iter()
        .map(|v| {
            v.map(|d| {
                NaiveDate::from_num_days_from_ce_opt(d + UNIX_EPOCH_DAYS_FROM_CE).ok_or_else(
                    || DataError::schema(dataset, format!("date out of range in `{}`", name)),
                )
            })
            .transpose()
        })
        .collect()
}

fn parse_iso_date(dataset: &str, name: &str, s: &str) -> Result<NaiveDate> {
    let day = s.get(..10).unwrap_or(s);
    NaiveDate::parse_from_str(day, "%Y-%m-%d").map_err(|e| {
        DataError::schema(
            dataset,
            format!("invalid date `{}` in `{}`: {}", s, name, e),
        )
    })
}

/// Unwrap a key column, failing on the first null.
pub fn required<T>(values: Vec<Option<T>>, dataset: &str, name: &str) -> Result<Vec<T>> {
    values
        .into_iter()
        .enumerate()
        .map(|(row, v)| {
            v.ok_or_else(|| {
                DataError::schema(dataset, format!("null `{}` in row {}", name, row))
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame() -> DataFrame {
        DataFrame::new(vec![
            Series::new("id".into(), vec![Some(1i64), None, Some(3)]).into(),
            Series::new("value".into(), vec![Some(1.5f64), Some(f64::NAN), None]).into(),
            Series::new(
                "date".into(),
                vec!["1999-12-31", "2000-01-31", "2000-02-29"],
            )
            .into(),
        ])
        .unwrap()
    }

    #[test]
    fn test_missing_column_is_schema_error() {
        let df = frame();
        let err = require_columns(&df, "test", &["id", "nope"]).unwrap_err();
        assert!(matches!(err, DataError::Schema { .. }));
        assert!(err.to_string().contains("nope"));
    }

    #[test]
    fn test_typed_values() {
        let df = frame();
        assert_eq!(
            i64_values(&df, "test", "id").unwrap(),
            vec![Some(1), None, Some(3)]
        );
        assert_eq!(
            f64_values(&df, "test", "value").unwrap(),
            vec![Some(1.5), None, None]
        );
        let dates = date_values(&df, "test", "date").unwrap();
        assert_eq!(dates[2], NaiveDate::from_ymd_opt(2000, 2, 29));
        assert_eq!(
            i32_values(&df, "test", "id").unwrap(),
            vec![Some(1), None, Some(3)]
        );
        let raw = f64_values_with_nan(&df, "test", "value").unwrap();
        assert!(raw[1].is_some_and(f64::is_nan));
    }

    #[test]
    fn test_date_column_from_date_dtype() {
        let df = DataFrame::new(vec![
            Series::new("date".into(), vec![1i32, 3682])
                .cast(&DataType::Date)
                .unwrap()
                .into(),
        ])
        .unwrap();
        let dates = date_values(&df, "test", "date").unwrap();
        assert_eq!(dates[0], NaiveDate::from_ymd_opt(1970, 1, 2));
        assert_eq!(dates[1], NaiveDate::from_ymd_opt(1980, 1, 31));
    }

    #[test]
    fn test_required_rejects_null() {
        let err = required(vec![Some(1), None], "test", "id").unwrap_err();
        assert!(err.to_string().contains("row 1"));
        assert_eq!(required(vec![Some(1), Some(2)], "test", "id").unwrap(), vec![1, 2]);
    }
}
