//! Static knowledge base for usage estimation
//!
//! Lookup tables consulted by the estimator and the processor classifier:
//! - vCPU count per EC2 instance family and size
//! - GPU count per instance type
//! - Burstable instance baseline utilization (fraction of one vCPU)
//! - MSK broker vCPU count per broker type
//! - Redshift node vCPU-seconds per node-hour
//! - Compute and GPU processor architectures per instance family
//!
//! The tables ship as a versioned JSON document embedded at compile time.
//! An operator-supplied document with the same shape can replace it. Either
//! way the tables are parsed once at start-up and never mutated.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::processors::ProcessorType;

// ============================================================================
// CONSTANTS
// ============================================================================

/// Embedded knowledge base (compile-time)
const EMBEDDED_TABLES_JSON: &str = include_str!("../../../data/aws_tables.json");

// ============================================================================
// ERROR TYPE
// ============================================================================

#[derive(Error, Debug)]
pub enum TableError {
    #[error("Failed to parse knowledge base: {0}")]
    ParseError(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

// ============================================================================
// DOCUMENT (ON-DISK SHAPE)
// ============================================================================

#[derive(Debug, Deserialize)]
struct TablesDocument {
    version: String,
    #[serde(default)]
    instance_vcpus: HashMap<String, HashMap<String, u32>>,
    #[serde(default)]
    gpu_counts: HashMap<String, u32>,
    #[serde(default)]
    burstable_baseline: HashMap<String, f64>,
    #[serde(default)]
    msk_broker_vcpus: HashMap<String, u32>,
    #[serde(default)]
    redshift_node_vcpu_seconds: HashMap<String, HashMap<String, u32>>,
    /// Keyed by instance family (expanded to every known size) or by a full
    /// instance type
    #[serde(default)]
    compute_processors: HashMap<String, Vec<ProcessorType>>,
    #[serde(default)]
    gpu_processors: HashMap<String, Vec<ProcessorType>>,
}

// ============================================================================
// KNOWLEDGE BASE
// ============================================================================

/// Table sizes, for operator diagnostics
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableSummary {
    pub version: String,
    pub instance_families: usize,
    pub instance_types: usize,
    pub gpu_instance_types: usize,
    pub burstable_instance_types: usize,
    pub msk_broker_types: usize,
    pub redshift_node_types: usize,
    pub compute_processor_mappings: usize,
    pub gpu_processor_mappings: usize,
}

/// Parsed and validated lookup tables
///
/// Counts are stored as `f64` because every consumer multiplies them with a
/// usage amount. Zero and negative entries are rejected at load time so a
/// lookup hit is always a usable, positive number.
#[derive(Debug)]
pub struct KnowledgeBase {
    version: String,
    /// family → size → vCPUs
    instance_vcpus: HashMap<String, HashMap<String, f64>>,
    /// instance type → GPUs
    gpu_counts: HashMap<String, f64>,
    /// instance type → baseline fraction of a vCPU
    burstable_baseline: HashMap<String, f64>,
    /// "Kafka.<type>" → vCPUs
    msk_broker_vcpus: HashMap<String, f64>,
    /// family → size → vCPU-seconds per node-hour
    redshift_node_vcpu_seconds: HashMap<String, HashMap<String, f64>>,
    /// instance type → architectures
    compute_processors: HashMap<String, Vec<ProcessorType>>,
    gpu_processors: HashMap<String, Vec<ProcessorType>>,
}

impl KnowledgeBase {
    /// Parse the knowledge base shipped with the binary
    pub fn embedded() -> Result<Self, TableError> {
        Self::from_json_str(EMBEDDED_TABLES_JSON)
    }

    /// Load a replacement knowledge base from disk
    pub fn from_file(path: &Path) -> Result<Self, TableError> {
        tracing::debug!(path = %path.display(), "Loading knowledge base file");
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Parse a knowledge base document
    pub fn from_json_str(json: &str) -> Result<Self, TableError> {
        let doc: TablesDocument =
            serde_json::from_str(json).map_err(|e| TableError::ParseError(e.to_string()))?;

        if doc.version.trim().is_empty() {
            return Err(TableError::ParseError("Missing knowledge base version".into()));
        }

        let instance_vcpus = nested_counts("instance_vcpus", doc.instance_vcpus);
        let redshift_node_vcpu_seconds =
            nested_counts("redshift_node_vcpu_seconds", doc.redshift_node_vcpu_seconds);
        let gpu_counts = flat_counts("gpu_counts", doc.gpu_counts);
        let msk_broker_vcpus = flat_counts("msk_broker_vcpus", doc.msk_broker_vcpus);

        let burstable_baseline = doc
            .burstable_baseline
            .into_iter()
            .filter(|(key, baseline)| {
                // Baseline is a fraction of one vCPU
                let valid = baseline.is_finite() && *baseline > 0.0 && *baseline <= 1.0;
                if !valid {
                    tracing::warn!(
                        table = "burstable_baseline",
                        key = %key,
                        baseline,
                        "Skipping out-of-range table entry"
                    );
                }
                valid
            })
            .collect();

        let compute_processors =
            expand_processors("compute_processors", doc.compute_processors, &instance_vcpus);
        let gpu_processors =
            expand_processors("gpu_processors", doc.gpu_processors, &instance_vcpus);

        let tables = Self {
            version: doc.version,
            instance_vcpus,
            gpu_counts,
            burstable_baseline,
            msk_broker_vcpus,
            redshift_node_vcpu_seconds,
            compute_processors,
            gpu_processors,
        };

        tracing::debug!(
            version = %tables.version,
            instance_families = tables.instance_vcpus.len(),
            gpu_instance_types = tables.gpu_counts.len(),
            "Knowledge base loaded"
        );

        Ok(tables)
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// vCPUs for an EC2 instance family and size
    pub fn instance_vcpus(&self, family: &str, size: &str) -> Option<f64> {
        self.instance_vcpus.get(family)?.get(size).copied()
    }

    /// Every (family, size, vCPUs) entry of the instance table
    pub fn instance_types(&self) -> impl Iterator<Item = (&str, &str, f64)> + '_ {
        self.instance_vcpus.iter().flat_map(|(family, sizes)| {
            sizes
                .iter()
                .map(move |(size, vcpus)| (family.as_str(), size.as_str(), *vcpus))
        })
    }

    /// GPUs for a full instance type (e.g. "p3.8xlarge")
    pub fn gpu_count(&self, instance_type: &str) -> Option<f64> {
        self.gpu_counts.get(instance_type).copied()
    }

    /// Guaranteed baseline utilization of a burstable instance type
    pub fn burstable_baseline(&self, instance_type: &str) -> Option<f64> {
        self.burstable_baseline.get(instance_type).copied()
    }

    /// True when the usage type mentions any burstable instance type
    pub fn mentions_burstable_instance(&self, usage_type: &str) -> bool {
        self.burstable_baseline
            .keys()
            .any(|instance_type| usage_type.contains(instance_type.as_str()))
    }

    /// vCPUs for an MSK broker type (e.g. "Kafka.m5.large")
    pub fn msk_broker_vcpus(&self, broker_type: &str) -> Option<f64> {
        self.msk_broker_vcpus.get(broker_type).copied()
    }

    /// vCPU-seconds per node-hour for a Redshift node family and size
    pub fn redshift_node_vcpu_seconds(&self, family: &str, size: &str) -> Option<f64> {
        self.redshift_node_vcpu_seconds.get(family)?.get(size).copied()
    }

    pub fn compute_processors(&self, instance_type: &str) -> Option<&[ProcessorType]> {
        self.compute_processors.get(instance_type).map(Vec::as_slice)
    }

    pub fn gpu_processors(&self, instance_type: &str) -> Option<&[ProcessorType]> {
        self.gpu_processors.get(instance_type).map(Vec::as_slice)
    }

    pub fn summary(&self) -> TableSummary {
        TableSummary {
            version: self.version.clone(),
            instance_families: self.instance_vcpus.len(),
            instance_types: self.instance_types().count(),
            gpu_instance_types: self.gpu_counts.len(),
            burstable_instance_types: self.burstable_baseline.len(),
            msk_broker_types: self.msk_broker_vcpus.len(),
            redshift_node_types: self
                .redshift_node_vcpu_seconds
                .values()
                .map(HashMap::len)
                .sum(),
            compute_processor_mappings: self.compute_processors.len(),
            gpu_processor_mappings: self.gpu_processors.len(),
        }
    }
}

// ============================================================================
// LOAD-TIME VALIDATION
// ============================================================================

/// Convert a count, rejecting zero (a zero vCPU/GPU count is never meaningful
/// and would silently zero out estimates)
fn positive_count(table: &'static str, key: &str, count: u32) -> Option<f64> {
    if count == 0 {
        tracing::warn!(table, key, "Skipping zero-valued table entry");
        return None;
    }
    Some(f64::from(count))
}

fn flat_counts(table: &'static str, raw: HashMap<String, u32>) -> HashMap<String, f64> {
    raw.into_iter()
        .filter_map(|(key, count)| positive_count(table, &key, count).map(|c| (key, c)))
        .collect()
}

fn nested_counts(
    table: &'static str,
    raw: HashMap<String, HashMap<String, u32>>,
) -> HashMap<String, HashMap<String, f64>> {
    raw.into_iter()
        .map(|(family, sizes)| {
            let sizes = sizes
                .into_iter()
                .filter_map(|(size, count)| {
                    let key = format!("{family}.{size}");
                    positive_count(table, &key, count).map(|c| (size, c))
                })
                .collect();
            (family, sizes)
        })
        .collect()
}

/// Expand family-level processor mappings to every known size of the family
///
/// Keys containing a '.' are treated as full instance types and kept as-is,
/// and take precedence over the family-level expansion.
fn expand_processors(
    table: &'static str,
    raw: HashMap<String, Vec<ProcessorType>>,
    instance_vcpus: &HashMap<String, HashMap<String, f64>>,
) -> HashMap<String, Vec<ProcessorType>> {
    let mut expanded = HashMap::new();
    let mut exact = Vec::new();

    for (key, processors) in raw {
        if processors.is_empty() {
            tracing::warn!(table, key = %key, "Skipping empty processor mapping");
            continue;
        }
        if key.contains('.') {
            exact.push((key, processors));
            continue;
        }
        let Some(sizes) = instance_vcpus.get(&key) else {
            tracing::warn!(table, family = %key, "Processor mapping for unknown instance family");
            continue;
        };
        for size in sizes.keys() {
            expanded.insert(format!("{key}.{size}"), processors.clone());
        }
    }

    expanded.extend(exact);
    expanded
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_embedded_tables() {
        let tables = KnowledgeBase::embedded().unwrap();
        assert!(!tables.version().is_empty());
        assert!(tables.summary().instance_types > 600, "Should have 600+ instance types");
    }

    #[test]
    fn test_instance_vcpus_lookup() {
        let tables = KnowledgeBase::embedded().unwrap();
        assert_eq!(tables.instance_vcpus("m5", "xlarge"), Some(4.0));
        assert_eq!(tables.instance_vcpus("c5", "9xlarge"), Some(36.0));
        assert_eq!(tables.instance_vcpus("t2", "micro"), Some(1.0));
    }

    #[test]
    fn test_instance_vcpus_miss() {
        let tables = KnowledgeBase::embedded().unwrap();
        assert_eq!(tables.instance_vcpus("m5", "gigantic"), None);
        assert_eq!(tables.instance_vcpus("zz9", "large"), None);
    }

    #[test]
    fn test_gpu_count_lookup() {
        let tables = KnowledgeBase::embedded().unwrap();
        assert_eq!(tables.gpu_count("p3.8xlarge"), Some(4.0));
        assert_eq!(tables.gpu_count("m5.large"), None);
    }

    #[test]
    fn test_burstable_lookup() {
        let tables = KnowledgeBase::embedded().unwrap();
        assert_eq!(tables.burstable_baseline("t3.micro"), Some(0.1));
        assert!(tables.mentions_burstable_instance("USE1-BoxUsage:t3.micro"));
        assert!(!tables.mentions_burstable_instance("USE1-BoxUsage:m5.large"));
    }

    #[test]
    fn test_msk_and_redshift_lookup() {
        let tables = KnowledgeBase::embedded().unwrap();
        assert_eq!(tables.msk_broker_vcpus("Kafka.m5.large"), Some(2.0));
        assert_eq!(tables.redshift_node_vcpu_seconds("dc2", "large"), Some(7200.0));
        assert_eq!(tables.redshift_node_vcpu_seconds("ra3", "xlplus"), Some(14400.0));
    }

    #[test]
    fn test_processor_family_expansion() {
        let tables = KnowledgeBase::embedded().unwrap();
        for size in ["large", "xlarge", "24xlarge", "metal"] {
            let key = format!("m5.{size}");
            assert_eq!(
                tables.compute_processors(&key),
                Some(&[ProcessorType::Skylake, ProcessorType::CascadeLake][..]),
                "{key}"
            );
        }
        assert_eq!(
            tables.gpu_processors("g4dn.xlarge"),
            Some(&[ProcessorType::NvidiaT4][..])
        );
    }

    #[test]
    fn test_every_gpu_instance_has_gpu_processor() {
        let tables = KnowledgeBase::embedded().unwrap();
        for instance_type in tables.gpu_counts.keys() {
            assert!(
                tables.gpu_processors(instance_type).is_some(),
                "{instance_type}"
            );
            assert!(
                tables.compute_processors(instance_type).is_some(),
                "{instance_type}"
            );
        }
    }

    #[test]
    fn test_no_table_stores_zero() {
        let tables = KnowledgeBase::embedded().unwrap();
        assert!(
            tables
                .instance_vcpus
                .values()
                .flat_map(HashMap::values)
                .all(|v| *v > 0.0)
        );
        assert!(tables.gpu_counts.values().all(|v| *v > 0.0));
        assert!(tables.msk_broker_vcpus.values().all(|v| *v > 0.0));
    }

    #[test]
    fn test_zero_entries_skipped() {
        let json = r#"{
            "version": "test",
            "instance_vcpus": { "m5": { "large": 2, "broken": 0 } },
            "gpu_counts": { "p3.2xlarge": 0 },
            "burstable_baseline": { "t3.micro": 0.1, "t3.bogus": 1.5 }
        }"#;
        let tables = KnowledgeBase::from_json_str(json).unwrap();
        assert_eq!(tables.instance_vcpus("m5", "large"), Some(2.0));
        assert_eq!(tables.instance_vcpus("m5", "broken"), None);
        assert_eq!(tables.gpu_count("p3.2xlarge"), None);
        assert_eq!(tables.burstable_baseline("t3.bogus"), None);
    }

    #[test]
    fn test_exact_processor_key_overrides_family() {
        let json = r#"{
            "version": "test",
            "instance_vcpus": { "m5": { "large": 2, "xlarge": 4 } },
            "compute_processors": {
                "m5": ["Skylake"],
                "m5.xlarge": ["Cascade Lake"]
            }
        }"#;
        let tables = KnowledgeBase::from_json_str(json).unwrap();
        assert_eq!(
            tables.compute_processors("m5.large"),
            Some(&[ProcessorType::Skylake][..])
        );
        assert_eq!(
            tables.compute_processors("m5.xlarge"),
            Some(&[ProcessorType::CascadeLake][..])
        );
    }

    #[test]
    fn test_parse_invalid_json() {
        assert!(matches!(
            KnowledgeBase::from_json_str("not json"),
            Err(TableError::ParseError(_))
        ));
    }

    #[test]
    fn test_parse_missing_version() {
        assert!(matches!(
            KnowledgeBase::from_json_str(r#"{ "version": " " }"#),
            Err(TableError::ParseError(_))
        ));
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tables.json");
        std::fs::write(&path, r#"{ "version": "file", "gpu_counts": { "p3.2xlarge": 1 } }"#)
            .unwrap();
        let tables = KnowledgeBase::from_file(&path).unwrap();
        assert_eq!(tables.version(), "file");
        assert_eq!(tables.gpu_count("p3.2xlarge"), Some(1.0));
    }

    #[test]
    fn test_from_missing_file() {
        let result = KnowledgeBase::from_file(Path::new("/nonexistent/tables.json"));
        assert!(matches!(result, Err(TableError::Io(_))));
    }
}
