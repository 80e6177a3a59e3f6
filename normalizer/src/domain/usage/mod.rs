//! Cloud usage normalization
//!
//! Turns raw billing rows into [`NormalizedUsageRecord`]s:
//! - `instance_type` - usage type correction and instance type extraction
//! - `units` - canonical usage amount and unit
//! - `compute` - vCPU-hour and GPU-hour estimation
//! - `replication` - per-service replication factors
//! - `processors` - CPU/GPU architecture classification
//! - `tables` - the static knowledge base behind all lookups
//! - `row` - raw billing rows and exports
//!
//! Row normalization is synchronous and pure: the same row and knowledge
//! base always yield the same record.

pub mod compute;
pub mod instance_type;
pub mod processors;
pub mod replication;
pub mod row;
pub mod tables;
pub mod units;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

pub use compute::{ComputeEstimator, DEFAULT_REFERENCE_CPU_UTILIZATION, EstimationContext};
pub use processors::ProcessorType;
pub use row::{BillingExport, RawUsageRow, fields};
pub use tables::{KnowledgeBase, TableError, TableSummary};

use instance_type::{correct_usage_type, resolve_instance_type};
use processors::{classify_compute, classify_gpu};
use replication::replication_factor;
use units::normalize_usage;

// ============================================================================
// CONSTANTS
// ============================================================================

/// Provider tag stamped on every record
pub const CLOUD_PROVIDER: &str = "AWS";

// ============================================================================
// ERROR TYPE
// ============================================================================

/// Row-level contract violations; never fatal for a batch
#[derive(Error, Debug, Clone, PartialEq)]
pub enum UsageError {
    #[error("Missing required field: {0}")]
    MissingField(&'static str),
    #[error("Invalid number in field {field}: {value:?}")]
    InvalidNumber { field: &'static str, value: String },
    #[error("Invalid timestamp: {0:?}")]
    InvalidTimestamp(String),
    #[error("Row has {values} values for {columns} columns")]
    ColumnMismatch { columns: usize, values: usize },
}

// ============================================================================
// ACCOUNT DIRECTORY
// ============================================================================

/// Resolves account ids to display names
pub trait AccountDirectory: Send + Sync {
    fn account_name(&self, account_id: &str) -> Option<String>;
}

/// Directory with no entries; every account is shown by id
#[derive(Debug, Clone, Copy, Default)]
pub struct NoAccounts;

impl AccountDirectory for NoAccounts {
    fn account_name(&self, _account_id: &str) -> Option<String> {
        None
    }
}

// ============================================================================
// NORMALIZED RECORD
// ============================================================================

/// Provider-agnostic usage record
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedUsageRecord {
    cloud_provider: &'static str,
    account_id: String,
    account_name: String,
    service_name: String,
    usage_type: String,
    region: String,
    usage_amount: f64,
    usage_unit: String,
    vcpu_hours: f64,
    gpu_hours: f64,
    instance_type: String,
    replication_factor: f64,
    cost: f64,
    timestamp: DateTime<Utc>,
    compute_processors: Vec<ProcessorType>,
    gpu_processors: Vec<ProcessorType>,
}

impl NormalizedUsageRecord {
    pub fn cloud_provider(&self) -> &str {
        self.cloud_provider
    }

    pub fn account_id(&self) -> &str {
        &self.account_id
    }

    pub fn account_name(&self) -> &str {
        &self.account_name
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    /// Usage type after suffix correction
    pub fn usage_type(&self) -> &str {
        &self.usage_type
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn usage_amount(&self) -> f64 {
        self.usage_amount
    }

    pub fn usage_unit(&self) -> &str {
        &self.usage_unit
    }

    pub fn vcpu_hours(&self) -> f64 {
        self.vcpu_hours
    }

    pub fn gpu_hours(&self) -> f64 {
        self.gpu_hours
    }

    pub fn instance_type(&self) -> &str {
        &self.instance_type
    }

    pub fn replication_factor(&self) -> f64 {
        self.replication_factor
    }

    pub fn cost(&self) -> f64 {
        self.cost
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn compute_processors(&self) -> &[ProcessorType] {
        &self.compute_processors
    }

    pub fn gpu_processors(&self) -> &[ProcessorType] {
        &self.gpu_processors
    }
}

// ============================================================================
// NORMALIZER
// ============================================================================

/// Builds normalized records from raw rows
///
/// Cheap to clone; the knowledge base and account directory are shared.
#[derive(Clone)]
pub struct UsageNormalizer {
    tables: Arc<KnowledgeBase>,
    estimator: ComputeEstimator,
    accounts: Arc<dyn AccountDirectory>,
}

impl UsageNormalizer {
    pub fn new(tables: Arc<KnowledgeBase>, reference_cpu_utilization: f64) -> Self {
        Self {
            estimator: ComputeEstimator::new(Arc::clone(&tables), reference_cpu_utilization),
            tables,
            accounts: Arc::new(NoAccounts),
        }
    }

    /// Use `accounts` to resolve display names
    pub fn with_accounts(mut self, accounts: Arc<dyn AccountDirectory>) -> Self {
        self.accounts = accounts;
        self
    }

    pub fn tables(&self) -> &KnowledgeBase {
        &self.tables
    }

    /// Normalize a single row
    pub fn normalize(&self, row: &RawUsageRow) -> Result<NormalizedUsageRecord, UsageError> {
        let service_name = row.required(fields::SERVICE_NAME)?;
        let raw_usage_type = row.required(fields::USAGE_TYPE)?;
        let raw_unit = row.required(fields::USAGE_UNIT)?;
        let raw_amount = row.required_number(fields::USAGE_AMOUNT)?;
        let cost = row.required_number(fields::COST)?;
        let region = row.required(fields::REGION)?;
        let account_id = row.account_id()?;
        let timestamp = row.timestamp()?;

        // Everything below reads the corrected usage type
        let usage_type = correct_usage_type(raw_usage_type);
        let usage = normalize_usage(service_name, &usage_type, raw_unit, raw_amount);

        let ctx = EstimationContext {
            service_name,
            usage_type: &usage_type,
            usage_amount: usage.amount,
            reported_vcpus: row.reported_vcpus(),
        };
        let vcpu_hours = self.estimator.vcpu_hours(&ctx);
        let gpu_hours = self.estimator.gpu_hours(&ctx);

        let instance_type = resolve_instance_type(&usage_type);
        let compute_processors = classify_compute(&self.tables, service_name, &instance_type);
        let gpu_processors = classify_gpu(&self.tables, service_name, &instance_type);

        let account_name = self
            .accounts
            .account_name(account_id)
            .unwrap_or_else(|| account_id.to_string());

        Ok(NormalizedUsageRecord {
            cloud_provider: CLOUD_PROVIDER,
            account_id: account_id.to_string(),
            account_name,
            service_name: service_name.to_string(),
            replication_factor: replication_factor(service_name, &usage_type, region),
            region: region.to_string(),
            usage_amount: usage.amount,
            usage_unit: usage.unit,
            vcpu_hours,
            gpu_hours,
            instance_type,
            cost,
            timestamp,
            compute_processors,
            gpu_processors,
            usage_type,
        })
    }

    /// Normalize rows in order; one row's failure does not affect the others
    pub fn normalize_batch<'a, I>(&self, rows: I) -> Vec<Result<NormalizedUsageRecord, UsageError>>
    where
        I: IntoIterator<Item = &'a RawUsageRow>,
    {
        rows.into_iter().map(|row| self.normalize(row)).collect()
    }
}

impl std::fmt::Debug for UsageNormalizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UsageNormalizer")
            .field("tables_version", &self.tables.version())
            .field(
                "reference_cpu_utilization",
                &self.estimator.reference_cpu_utilization(),
            )
            .finish()
    }
}

#[cfg(test)]
#[path = "tests.rs"]
mod tests;
