//! Replication factors per service
//!
//! A replication factor multiplies resource totals to account for redundant
//! copies the usage amount does not show (multi-AZ replicas, erasure-coded
//! storage, snapshot copies). Services without a rule use the default of 1.

/// Factors applied by the per-service rules
pub struct ReplicationFactors;

impl ReplicationFactors {
    pub const DEFAULT: f64 = 1.0;
    pub const S3: f64 = 3.0;
    pub const S3_ONE_ZONE: f64 = 1.0;
    pub const EC2: f64 = 1.0;
    pub const EBS_VOLUME: f64 = 2.0;
    pub const EBS_SNAPSHOT: f64 = 3.0;
    pub const EFS_ONE_ZONE: f64 = 1.0;
    pub const RDS: f64 = 1.0;
    pub const RDS_MULTI_AZ: f64 = 2.0;
    pub const AURORA_STORAGE: f64 = 6.0;
    pub const DOCUMENT_DB_STORAGE: f64 = 6.0;
    pub const DOCUMENT_DB: f64 = 1.0;
    pub const ELASTICACHE: f64 = 2.0;
    pub const REDSHIFT: f64 = 2.0;
    pub const SIMPLE_DB: f64 = 3.0;
    pub const ECR: f64 = 3.0;
    pub const MSK_STORAGE: f64 = 3.0;
    pub const MSK: f64 = 1.0;
    /// Upper bound for services replicating across availability zones
    pub const MAX_ZONE_REPLICAS: f64 = 3.0;
}

/// Availability zones assumed for regions not listed below
const DEFAULT_AVAILABILITY_ZONES: u32 = 3;

type ReplicationRule = fn(&str, &str) -> f64;

/// Per-service rules, keyed by CUR service name. Rules receive
/// `(usage_type, region)`.
static SERVICE_REPLICATION_RULES: &[(&str, ReplicationRule)] = &[
    ("AmazonS3", s3_replication),
    ("AmazonEC2", ec2_replication),
    ("AmazonEFS", efs_replication),
    ("AmazonRDS", rds_replication),
    ("AmazonDocDB", document_db_replication),
    ("AmazonDynamoDB", dynamo_db_replication),
    ("AmazonElastiCache", |_, _| ReplicationFactors::ELASTICACHE),
    ("AmazonRedshift", |_, _| ReplicationFactors::REDSHIFT),
    ("AmazonSimpleDB", |_, _| ReplicationFactors::SIMPLE_DB),
    ("AmazonECR", |_, _| ReplicationFactors::ECR),
    ("AmazonMSK", msk_replication),
];

/// Resolve the replication factor for a row
///
/// Falls back to [`ReplicationFactors::DEFAULT`] when the service has no rule
/// or the rule yields something unusable. Always ≥ 1.
pub fn replication_factor(service_name: &str, usage_type: &str, region: &str) -> f64 {
    let factor = SERVICE_REPLICATION_RULES
        .iter()
        .find(|(name, _)| *name == service_name)
        .map(|(_, rule)| rule(usage_type, region));

    match factor {
        Some(f) if f.is_finite() && f >= 1.0 => f,
        _ => ReplicationFactors::DEFAULT,
    }
}

fn s3_replication(usage_type: &str, _region: &str) -> f64 {
    // One Zone-IA storage classes carry "ZIA"
    if usage_type.contains("ZIA") {
        ReplicationFactors::S3_ONE_ZONE
    } else {
        ReplicationFactors::S3
    }
}

fn ec2_replication(usage_type: &str, _region: &str) -> f64 {
    if usage_type.contains("VolumeUsage") {
        ReplicationFactors::EBS_VOLUME
    } else if usage_type.contains("SnapshotUsage") {
        ReplicationFactors::EBS_SNAPSHOT
    } else {
        ReplicationFactors::EC2
    }
}

fn efs_replication(usage_type: &str, region: &str) -> f64 {
    if usage_type.contains("ZIA") || usage_type.contains("OneZone") {
        ReplicationFactors::EFS_ONE_ZONE
    } else {
        zone_replicas(region)
    }
}

fn rds_replication(usage_type: &str, _region: &str) -> f64 {
    if usage_type.contains("Aurora:StorageUsage") {
        ReplicationFactors::AURORA_STORAGE
    } else if usage_type.contains("Multi-AZ") {
        ReplicationFactors::RDS_MULTI_AZ
    } else {
        ReplicationFactors::RDS
    }
}

fn document_db_replication(usage_type: &str, _region: &str) -> f64 {
    if usage_type.contains("StorageUsage") {
        ReplicationFactors::DOCUMENT_DB_STORAGE
    } else {
        ReplicationFactors::DOCUMENT_DB
    }
}

fn dynamo_db_replication(_usage_type: &str, region: &str) -> f64 {
    zone_replicas(region)
}

fn msk_replication(usage_type: &str, _region: &str) -> f64 {
    if usage_type.contains("Storage") {
        ReplicationFactors::MSK_STORAGE
    } else {
        ReplicationFactors::MSK
    }
}

/// Replicas for a service that spreads copies over up to three zones
fn zone_replicas(region: &str) -> f64 {
    f64::from(availability_zones(region)).min(ReplicationFactors::MAX_ZONE_REPLICAS)
}

/// Usable availability zones per region
fn availability_zones(region: &str) -> u32 {
    match region {
        "us-west-1" => 2,
        _ => DEFAULT_AVAILABILITY_ZONES,
    }
}
