//! Raw billing rows
//!
//! A [`RawUsageRow`] is a field name → string value map produced by the
//! billing source (CUR query aliases). Typed accessors turn contract
//! violations into [`UsageError`]s for that row only.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::UsageError;
use crate::utils::string::non_empty;
use crate::utils::time::parse_billing_timestamp;

/// Field names of the billing query result
pub mod fields {
    pub const SERVICE_NAME: &str = "serviceName";
    pub const USAGE_TYPE: &str = "usageType";
    pub const USAGE_AMOUNT: &str = "usageAmount";
    pub const USAGE_UNIT: &str = "usageUnit";
    pub const COST: &str = "cost";
    pub const TIMESTAMP: &str = "timestamp";
    pub const REGION: &str = "region";
    pub const ACCOUNT_ID: &str = "accountId";
    /// Alias the CUR query uses for the account id column
    pub const ACCOUNT_NAME: &str = "accountName";
    pub const VCPUS: &str = "vCpus";
}

/// One billing row, immutable once built
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawUsageRow {
    values: HashMap<String, String>,
}

impl RawUsageRow {
    /// Zip a header sequence with one row of values
    ///
    /// `None` values (SQL nulls) are left out of the row.
    pub fn from_columns(columns: &[String], values: &[Option<String>]) -> Result<Self, UsageError> {
        if columns.len() != values.len() {
            return Err(UsageError::ColumnMismatch {
                columns: columns.len(),
                values: values.len(),
            });
        }

        Ok(columns
            .iter()
            .zip(values)
            .filter_map(|(column, value)| value.as_ref().map(|v| (column.clone(), v.clone())))
            .collect())
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.values.get(field).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// String value of a field that must be present
    ///
    /// Present-but-empty is accepted: some services report an empty region.
    pub fn required(&self, field: &'static str) -> Result<&str, UsageError> {
        self.get(field).ok_or(UsageError::MissingField(field))
    }

    /// Numeric value of a field that must be present and parse as a finite number
    pub fn required_number(&self, field: &'static str) -> Result<f64, UsageError> {
        let raw = non_empty(self.required(field)?).ok_or(UsageError::MissingField(field))?;
        raw.parse::<f64>()
            .ok()
            .filter(|n| n.is_finite())
            .ok_or_else(|| UsageError::InvalidNumber {
                field,
                value: raw.to_string(),
            })
    }

    /// vCPU count supplied by the report
    ///
    /// Missing, empty, non-numeric and zero values mean the report did not
    /// supply a count. Negative counts are kept; the estimator clamps them.
    pub fn reported_vcpus(&self) -> Option<f64> {
        self.get(fields::VCPUS)
            .and_then(non_empty)
            .and_then(|raw| raw.parse::<f64>().ok())
            .filter(|n| n.is_finite() && *n != 0.0)
    }

    pub fn timestamp(&self) -> Result<DateTime<Utc>, UsageError> {
        let raw = self.required(fields::TIMESTAMP)?;
        parse_billing_timestamp(raw).ok_or_else(|| UsageError::InvalidTimestamp(raw.to_string()))
    }

    /// Account id, falling back to the `accountName` alias
    pub fn account_id(&self) -> Result<&str, UsageError> {
        self.get(fields::ACCOUNT_ID)
            .or_else(|| self.get(fields::ACCOUNT_NAME))
            .ok_or(UsageError::MissingField(fields::ACCOUNT_ID))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for RawUsageRow {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl From<HashMap<String, String>> for RawUsageRow {
    fn from(values: HashMap<String, String>) -> Self {
        Self { values }
    }
}

/// Billing export shaped like a query result set
#[derive(Debug, Clone, Deserialize)]
pub struct BillingExport {
    pub columns: Vec<String>,
    #[serde(default)]
    pub rows: Vec<Vec<Option<String>>>,
}

impl BillingExport {
    /// Zip every row with the header, keeping per-row failures
    pub fn into_rows(self) -> Vec<Result<RawUsageRow, UsageError>> {
        let columns = self.columns;
        self.rows
            .iter()
            .map(|values| RawUsageRow::from_columns(&columns, values))
            .collect()
    }
}
