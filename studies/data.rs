//! # Feature Tables and Data Loading
//!
//! A [`FeatureTable`] is a dense matrix of recordings (rows) by named numeric
//! features (columns). The label vector travels next to it as a plain
//! `Array1<f64>` (term = 1, preterm = 0); every operation that reorders or filters
//! rows does the same to the labels, so the two stay aligned.
//!
//! Files are read with the `polars` CSV reader. Tab-separated input is the
//! default; a `.csv` extension switches to commas. Text columns (such as record
//! identifiers) are skipped, every other column must be numeric, complete and
//! finite.

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use polars::prelude::*;
use std::collections::HashSet;
use std::fs::File;
use std::path::Path;
use thiserror::Error;

/// A comprehensive error type for table construction, loading and validation.
#[derive(Error, Debug)]
pub enum DataError {
    #[error("Error from the underlying Polars DataFrame library: {0}")]
    PolarsError(#[from] PolarsError),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error(
        "The required column '{0}' was not found in the feature table. Please check spelling and case."
    )]
    ColumnNotFound(String),
    #[error("The column '{0}' appears more than once in the feature table.")]
    DuplicateColumn(String),
    #[error(
        "The column '{column_name}' could not be converted to the expected type '{expected_type}'. (Found type: {found_type})"
    )]
    ColumnWrongType {
        column_name: String,
        expected_type: &'static str,
        found_type: String,
    },
    #[error(
        "Missing or null values were found in the column '{0}'. This tool requires complete data with no missing values."
    )]
    MissingValuesFound(String),
    #[error(
        "Non-finite values (NaN or Infinity) were found in the column '{0}'. This tool requires all data to be finite."
    )]
    NonFiniteValuesFound(String),
    #[error("Labels must be 0 (preterm) or 1 (term); row {row} has the value {value}.")]
    NonBinaryLabel { row: usize, value: f64 },
    #[error("The feature table has {rows} rows, but the label vector has {labels} entries.")]
    LengthMismatch { rows: usize, labels: usize },
    #[error("{names} column names were given for a matrix with {columns} columns.")]
    NameCountMismatch { names: usize, columns: usize },
    #[error("The input file '{0}' contains no data rows.")]
    EmptyTable(String),
}

/// Named numeric columns over aligned rows.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureTable {
    names: Vec<String>,
    values: Array2<f64>,
}

impl FeatureTable {
    pub fn new(names: Vec<String>, values: Array2<f64>) -> Result<Self, DataError> {
        if names.len() != values.ncols() {
            return Err(DataError::NameCountMismatch {
                names: names.len(),
                columns: values.ncols(),
            });
        }
        let mut seen = HashSet::with_capacity(names.len());
        for name in &names {
            if !seen.insert(name.as_str()) {
                return Err(DataError::DuplicateColumn(name.clone()));
            }
        }
        Ok(Self { names, values })
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn values(&self) -> ArrayView2<'_, f64> {
        self.values.view()
    }

    pub fn n_rows(&self) -> usize {
        self.values.nrows()
    }

    pub fn n_columns(&self) -> usize {
        self.values.ncols()
    }

    pub fn column_index(&self, name: &str) -> Result<usize, DataError> {
        self.names
            .iter()
            .position(|n| n == name)
            .ok_or_else(|| DataError::ColumnNotFound(name.to_string()))
    }

    pub fn column(&self, name: &str) -> Result<ArrayView1<'_, f64>, DataError> {
        Ok(self.values.column(self.column_index(name)?))
    }

    /// Keeps the named columns, in the order given.
    pub fn select_columns<S: AsRef<str>>(&self, names: &[S]) -> Result<Self, DataError> {
        let indices = names
            .iter()
            .map(|n| self.column_index(n.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(
            names.iter().map(|n| n.as_ref().to_string()).collect(),
            self.values.select(Axis(1), &indices),
        )
    }

    /// Keeps the given rows, in the order given. Rows may repeat.
    pub fn select_rows(&self, rows: &[usize]) -> Self {
        Self {
            names: self.names.clone(),
            values: self.values.select(Axis(0), rows),
        }
    }

    pub fn drop_columns(&self, names: &[&str]) -> Result<Self, DataError> {
        for name in names {
            self.column_index(name)?;
        }
        let kept: Vec<&str> = self
            .names
            .iter()
            .map(String::as_str)
            .filter(|n| !names.contains(n))
            .collect();
        self.select_columns(&kept)
    }
}

/// Checks that every label is 0 or 1 and that there is one label per row.
pub fn validate_labels(table: &FeatureTable, labels: ArrayView1<f64>) -> Result<(), DataError> {
    if table.n_rows() != labels.len() {
        return Err(DataError::LengthMismatch {
            rows: table.n_rows(),
            labels: labels.len(),
        });
    }
    for (row, &value) in labels.iter().enumerate() {
        if value != 0.0 && value != 1.0 {
            return Err(DataError::NonBinaryLabel { row, value });
        }
    }
    Ok(())
}

fn extract_numeric_column(df: &DataFrame, column_name: &str) -> Result<Vec<f64>, DataError> {
    let series = df.column(column_name)?;
    if series.null_count() > 0 {
        return Err(DataError::MissingValuesFound(column_name.to_string()));
    }

    let casted = match series.cast(&DataType::Float64) {
        Ok(casted) => casted,
        Err(_) => {
            return Err(DataError::ColumnWrongType {
                column_name: column_name.to_string(),
                expected_type: "f64 (numeric)",
                found_type: format!("{:?}", series.dtype()),
            });
        }
    };
    if casted.null_count() > 0 {
        return Err(DataError::ColumnWrongType {
            column_name: column_name.to_string(),
            expected_type: "f64 (numeric)",
            found_type: format!("{:?}", series.dtype()),
        });
    }

    let values: Vec<f64> = casted.f64()?.rechunk().into_no_null_iter().collect();
    if values.iter().any(|v| !v.is_finite()) {
        return Err(DataError::NonFiniteValuesFound(column_name.to_string()));
    }
    Ok(values)
}

/// Loads a feature file and splits off `label_column` as the label vector.
pub fn load_feature_table(
    path: &Path,
    label_column: &str,
) -> Result<(FeatureTable, Array1<f64>), DataError> {
    let separator = match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("csv") => b',',
        _ => b'\t',
    };
    log::info!("Loading feature table from '{}'", path.display());

    let df = CsvReader::new(File::open(path)?)
        .with_options(
            CsvReadOptions::default()
                .with_has_header(true)
                .with_parse_options(CsvParseOptions::default().with_separator(separator)),
        )
        .finish()?;

    if df.height() == 0 {
        return Err(DataError::EmptyTable(path.display().to_string()));
    }

    let column_names: Vec<String> = df
        .get_column_names()
        .into_iter()
        .map(|s| s.to_string())
        .collect();
    if !column_names.iter().any(|c| c == label_column) {
        return Err(DataError::ColumnNotFound(label_column.to_string()));
    }

    let labels = Array1::from_vec(extract_numeric_column(&df, label_column)?);

    let mut names = Vec::with_capacity(column_names.len());
    let mut columns = Vec::with_capacity(column_names.len());
    for name in column_names.iter().filter(|c| c.as_str() != label_column) {
        if matches!(df.column(name)?.dtype(), DataType::String) {
            log::debug!("Skipping text column '{name}'");
            continue;
        }
        columns.push(extract_numeric_column(&df, name)?);
        names.push(name.clone());
    }

    let mut values = Array2::<f64>::zeros((df.height(), columns.len()));
    for (j, column) in columns.into_iter().enumerate() {
        values.column_mut(j).assign(&Array1::from_vec(column));
    }
    let table = FeatureTable::new(names, values)?;
    validate_labels(&table, labels.view())?;

    log::info!(
        "Loaded {} recordings with {} feature columns ({} term, {} preterm)",
        table.n_rows(),
        table.n_columns(),
        labels.iter().filter(|&&v| v == 1.0).count(),
        labels.iter().filter(|&&v| v == 0.0).count()
    );
    Ok((table, labels))
}
