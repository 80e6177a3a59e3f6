//! Tests for record assembly

use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

use super::*;

static TABLES: LazyLock<Arc<KnowledgeBase>> =
    LazyLock::new(|| Arc::new(KnowledgeBase::embedded().expect("embedded tables")));

fn normalizer() -> UsageNormalizer {
    UsageNormalizer::new(Arc::clone(&TABLES), DEFAULT_REFERENCE_CPU_UTILIZATION)
}

fn make_row(pairs: &[(&str, &str)]) -> RawUsageRow {
    let mut values: HashMap<String, String> = [
        (fields::SERVICE_NAME, "AmazonEC2"),
        (fields::USAGE_TYPE, "USE1-BoxUsage:m5.large"),
        (fields::USAGE_AMOUNT, "1"),
        (fields::USAGE_UNIT, "Hrs"),
        (fields::COST, "0.096"),
        (fields::TIMESTAMP, "2024-01-15 00:00:00.000"),
        (fields::REGION, "us-east-1"),
        (fields::ACCOUNT_ID, "123456789012"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();
    for (k, v) in pairs {
        values.insert(k.to_string(), v.to_string());
    }
    RawUsageRow::from(values)
}

struct StaticAccounts;

impl AccountDirectory for StaticAccounts {
    fn account_name(&self, account_id: &str) -> Option<String> {
        (account_id == "123456789012").then(|| "production".to_string())
    }
}

#[test]
fn test_ec2_record() {
    let record = normalizer().normalize(&make_row(&[(fields::USAGE_AMOUNT, "10")])).unwrap();

    assert_eq!(record.cloud_provider(), "AWS");
    assert_eq!(record.account_id(), "123456789012");
    assert_eq!(record.account_name(), "123456789012");
    assert_eq!(record.service_name(), "AmazonEC2");
    assert_eq!(record.usage_type(), "USE1-BoxUsage:m5.large");
    assert_eq!(record.region(), "us-east-1");
    assert_eq!(record.usage_amount(), 10.0);
    assert_eq!(record.usage_unit(), "Hrs");
    assert_eq!(record.vcpu_hours(), 20.0);
    assert_eq!(record.gpu_hours(), 0.0);
    assert_eq!(record.instance_type(), "m5.large");
    assert_eq!(record.replication_factor(), 1.0);
    assert_eq!(record.cost(), 0.096);
    assert_eq!(record.timestamp().to_rfc3339(), "2024-01-15T00:00:00+00:00");
    assert_eq!(
        record.compute_processors(),
        &[ProcessorType::Skylake, ProcessorType::CascadeLake]
    );
    assert_eq!(record.gpu_processors(), &[ProcessorType::Unknown]);
}

#[test]
fn test_account_directory() {
    let normalizer = normalizer().with_accounts(Arc::new(StaticAccounts));
    let record = normalizer.normalize(&make_row(&[])).unwrap();
    assert_eq!(record.account_name(), "production");

    let record = normalizer
        .normalize(&make_row(&[(fields::ACCOUNT_ID, "999")]))
        .unwrap();
    assert_eq!(record.account_name(), "999");
}

#[test]
fn test_account_name_alias() {
    let mut values: HashMap<String, String> = HashMap::new();
    for (k, v) in [
        (fields::SERVICE_NAME, "AmazonS3"),
        (fields::USAGE_TYPE, "USE1-TimedStorage-ByteHrs"),
        (fields::USAGE_AMOUNT, "100"),
        (fields::USAGE_UNIT, "GB-Mo"),
        (fields::COST, "2.3"),
        (fields::TIMESTAMP, "2024-01-15"),
        (fields::REGION, "us-east-1"),
        (fields::ACCOUNT_NAME, "210987654321"),
    ] {
        values.insert(k.to_string(), v.to_string());
    }
    let record = normalizer().normalize(&RawUsageRow::from(values)).unwrap();
    assert_eq!(record.account_id(), "210987654321");
    assert_eq!(record.replication_factor(), 3.0);
    assert_eq!(record.vcpu_hours(), 0.0);
}

#[test]
fn test_truncated_suffix_corrected_before_estimation() {
    let record = normalizer()
        .normalize(&make_row(&[(fields::USAGE_TYPE, "USE1-BoxUsage:m5.xl")]))
        .unwrap();
    assert_eq!(record.usage_type(), "USE1-BoxUsage:m5.xlarge");
    assert_eq!(record.instance_type(), "m5.xlarge");
    assert_eq!(record.vcpu_hours(), 4.0);
}

#[test]
fn test_redshift_seconds() {
    let record = normalizer()
        .normalize(&make_row(&[
            (fields::SERVICE_NAME, "AmazonRedshift"),
            (fields::USAGE_TYPE, "USE1-Node:dc2.large"),
            (fields::USAGE_UNIT, "Seconds"),
            (fields::USAGE_AMOUNT, "7200"),
        ]))
        .unwrap();
    assert_eq!(record.usage_amount(), 2.0);
    assert_eq!(record.usage_unit(), "Hours");
    // Estimation runs on the converted amount: 2 hours × 2 vCPUs
    assert_eq!(record.vcpu_hours(), 4.0);
    assert_eq!(record.replication_factor(), 2.0);
}

#[test]
fn test_fargate_memory_unit() {
    let record = normalizer()
        .normalize(&make_row(&[
            (fields::SERVICE_NAME, "AmazonECS"),
            (fields::USAGE_TYPE, "USE1-Fargate-GB-Hours"),
            (fields::USAGE_UNIT, "hours"),
            (fields::USAGE_AMOUNT, "8"),
        ]))
        .unwrap();
    assert_eq!(record.usage_unit(), "GB-Hours");
    assert_eq!(record.usage_amount(), 8.0);
}

#[test]
fn test_glue_ignores_instance_type() {
    let record = normalizer()
        .normalize(&make_row(&[
            (fields::SERVICE_NAME, "AWSGlue"),
            (fields::USAGE_TYPE, "USE1-BoxUsage:m5.24xlarge"),
            (fields::USAGE_AMOUNT, "10"),
            (fields::VCPUS, "96"),
        ]))
        .unwrap();
    assert_eq!(record.vcpu_hours(), 40.0);
}

#[test]
fn test_reported_vcpus_used_when_no_rule_applies() {
    let record = normalizer()
        .normalize(&make_row(&[(fields::VCPUS, "16"), (fields::USAGE_AMOUNT, "2")]))
        .unwrap();
    assert_eq!(record.vcpu_hours(), 32.0);

    // Zero means "not supplied": fall back to the table
    let record = normalizer()
        .normalize(&make_row(&[(fields::VCPUS, "0"), (fields::USAGE_AMOUNT, "2")]))
        .unwrap();
    assert_eq!(record.vcpu_hours(), 4.0);

    let record = normalizer()
        .normalize(&make_row(&[(fields::VCPUS, "-2"), (fields::USAGE_AMOUNT, "2")]))
        .unwrap();
    assert_eq!(record.vcpu_hours(), 0.0);
}

#[test]
fn test_gpu_record() {
    let record = normalizer()
        .normalize(&make_row(&[
            (fields::USAGE_TYPE, "USE1-BoxUsage:p3.8xlarge"),
            (fields::USAGE_AMOUNT, "3"),
        ]))
        .unwrap();
    assert_eq!(record.gpu_hours(), 12.0);
    assert_eq!(record.gpu_processors(), &[ProcessorType::NvidiaTeslaV100]);
}

#[test]
fn test_managed_database_record() {
    let record = normalizer()
        .normalize(&make_row(&[
            (fields::SERVICE_NAME, "AmazonRDS"),
            (fields::USAGE_TYPE, "USE1-Multi-AZUsage:db.r5.large"),
        ]))
        .unwrap();
    assert_eq!(record.instance_type(), "r5.large");
    assert_eq!(record.vcpu_hours(), 2.0);
    assert_eq!(record.replication_factor(), 2.0);
    assert_eq!(
        record.compute_processors(),
        &[ProcessorType::Skylake, ProcessorType::CascadeLake]
    );
}

#[test]
fn test_current_families_resolve() {
    let normalizer = normalizer();
    let cases = [
        ("AmazonEC2", "USE1-BoxUsage:c5d.large", 2.0),
        ("AmazonEC2", "USE1-BoxUsage:r5n.large", 2.0),
        ("AmazonEC2", "USE1-BoxUsage:m6gd.large", 2.0),
        ("AmazonEC2", "USE1-BoxUsage:c6a.large", 2.0),
        ("AmazonEC2", "USE1-BoxUsage:i4i.large", 2.0),
        ("AmazonEC2", "USE1-BoxUsage:r5b.large", 2.0),
        ("AmazonEC2", "USE1-BoxUsage:m5zn.large", 2.0),
        ("AmazonEC2", "USE1-BoxUsage:m5ad.xlarge", 4.0),
        ("AmazonEC2", "USE1-BoxUsage:m5dn.2xlarge", 8.0),
        ("AmazonEC2", "USE1-BoxUsage:r5dn.large", 2.0),
        ("AmazonEC2", "USE1-BoxUsage:c6gd.medium", 1.0),
        ("AmazonEC2", "USE1-BoxUsage:c6gn.xlarge", 4.0),
        ("AmazonEC2", "USE1-BoxUsage:r7g.large", 2.0),
        ("AmazonEC2", "USE1-BoxUsage:m7i.large", 2.0),
        ("AmazonEC2", "USE1-BoxUsage:c7i.4xlarge", 16.0),
        ("AmazonEC2", "USE1-BoxUsage:x2gd.large", 2.0),
        ("AmazonEC2", "USE1-BoxUsage:d3.xlarge", 4.0),
        ("AmazonEC2", "USE1-BoxUsage:h1.2xlarge", 8.0),
        ("AmazonEC2", "USE1-BoxUsage:inf2.xlarge", 4.0),
        ("AmazonEC2", "USE1-BoxUsage:trn1.2xlarge", 8.0),
        ("AmazonEC2", "USE1-BoxUsage:p4de.24xlarge", 96.0),
        ("AmazonEC2", "USE1-BoxUsage:p5.48xlarge", 192.0),
        ("AmazonEC2", "USE1-BoxUsage:c3.large", 2.0),
        ("AmazonEC2", "USE1-BoxUsage:r3.large", 2.0),
        ("AmazonEC2", "USE1-BoxUsage:i2.xlarge", 4.0),
        ("AmazonRDS", "USE1-InstanceUsage:db.r6gd.large", 2.0),
        ("AmazonRDS", "USE1-InstanceUsage:db.m6gd.large", 2.0),
        ("AmazonRDS", "USE1-InstanceUsage:db.x2g.large", 2.0),
        ("AmazonRDS", "USE1-InstanceUsage:db.r5b.large", 2.0),
        ("AmazonElastiCache", "USE1-NodeUsage:cache.r6gd.large", 2.0),
        ("AmazonElastiCache", "USE1-NodeUsage:cache.m6gd.large", 2.0),
    ];

    for (service, usage_type, vcpus) in cases {
        let record = normalizer
            .normalize(&make_row(&[
                (fields::SERVICE_NAME, service),
                (fields::USAGE_TYPE, usage_type),
            ]))
            .unwrap();
        assert_eq!(record.vcpu_hours(), vcpus, "{usage_type}");
        assert_ne!(
            record.compute_processors(),
            &[ProcessorType::Unknown],
            "{usage_type}"
        );
    }
}

#[test]
fn test_previous_generation_families_resolve() {
    let normalizer = normalizer();
    for (usage_type, vcpus) in [
        ("USE1-BoxUsage:m1.small", 1.0),
        ("USE1-BoxUsage:m2.4xlarge", 8.0),
        ("USE1-BoxUsage:t1.micro", 1.0),
    ] {
        let record = normalizer
            .normalize(&make_row(&[(fields::USAGE_TYPE, usage_type)]))
            .unwrap();
        assert_eq!(record.vcpu_hours(), vcpus, "{usage_type}");
    }
}

#[test]
fn test_current_gpu_families() {
    let normalizer = normalizer();
    for (usage_type, gpu) in [
        ("USE1-BoxUsage:p4de.24xlarge", ProcessorType::NvidiaA100),
        ("USE1-BoxUsage:p5.48xlarge", ProcessorType::NvidiaH100),
    ] {
        let record = normalizer
            .normalize(&make_row(&[(fields::USAGE_TYPE, usage_type)]))
            .unwrap();
        assert_eq!(record.gpu_hours(), 8.0, "{usage_type}");
        assert_eq!(record.gpu_processors(), &[gpu]);
    }
}

#[test]
fn test_lambda_processors() {
    let arm = normalizer()
        .normalize(&make_row(&[
            (fields::SERVICE_NAME, "AWSLambda"),
            (fields::USAGE_TYPE, "USE1-Lambda-GB-Second-ARM"),
        ]))
        .unwrap();
    assert_eq!(arm.compute_processors(), &[ProcessorType::AwsGraviton2]);
    assert_eq!(arm.gpu_processors(), &[ProcessorType::Unknown]);

    let x86 = normalizer()
        .normalize(&make_row(&[
            (fields::SERVICE_NAME, "AWSLambda"),
            (fields::USAGE_TYPE, "USE1-Lambda-GB-Second"),
        ]))
        .unwrap();
    assert_eq!(x86.compute_processors(), &[ProcessorType::Unknown]);
}

#[test]
fn test_unknown_usage_never_nan() {
    let record = normalizer()
        .normalize(&make_row(&[
            (fields::SERVICE_NAME, "AmazonUnknown"),
            (fields::USAGE_TYPE, "garbage"),
        ]))
        .unwrap();
    assert_eq!(record.vcpu_hours(), 0.0);
    assert_eq!(record.gpu_hours(), 0.0);
    assert_eq!(record.replication_factor(), 1.0);
    assert_eq!(record.compute_processors(), &[ProcessorType::Unknown]);
    assert_eq!(record.gpu_processors(), &[ProcessorType::Unknown]);
}

#[test]
fn test_deterministic() {
    let normalizer = normalizer();
    let row = make_row(&[(fields::USAGE_TYPE, "USE1-BoxUsage:t3.micro")]);
    assert_eq!(normalizer.normalize(&row), normalizer.normalize(&row));
}

#[test]
fn test_missing_field() {
    let mut values: HashMap<String, String> = HashMap::new();
    values.insert(fields::SERVICE_NAME.to_string(), "AmazonEC2".to_string());
    let err = normalizer().normalize(&RawUsageRow::from(values)).unwrap_err();
    assert_eq!(err, UsageError::MissingField(fields::USAGE_TYPE));
}

#[test]
fn test_invalid_amount_and_timestamp() {
    let err = normalizer()
        .normalize(&make_row(&[(fields::USAGE_AMOUNT, "lots")]))
        .unwrap_err();
    assert!(matches!(err, UsageError::InvalidNumber { field: "usageAmount", .. }));

    let err = normalizer()
        .normalize(&make_row(&[(fields::TIMESTAMP, "last tuesday")]))
        .unwrap_err();
    assert_eq!(err, UsageError::InvalidTimestamp("last tuesday".to_string()));
}

#[test]
fn test_batch_isolates_failures() {
    let rows = vec![
        make_row(&[]),
        make_row(&[(fields::COST, "free")]),
        make_row(&[(fields::USAGE_TYPE, "USE1-BoxUsage:m5.xlarge")]),
    ];
    let results = normalizer().normalize_batch(&rows);
    assert_eq!(results.len(), 3);
    assert!(results[0].is_ok());
    assert!(results[1].is_err());
    assert_eq!(results[2].as_ref().unwrap().vcpu_hours(), 4.0);
}

#[test]
fn test_record_serialization() {
    let record = normalizer().normalize(&make_row(&[])).unwrap();
    let json = serde_json::to_value(&record).unwrap();
    assert_eq!(json["cloud_provider"], "AWS");
    assert_eq!(json["instance_type"], "m5.large");
    assert_eq!(json["compute_processors"][1], "Cascade Lake");
    assert_eq!(json["gpu_processors"][0], "Unknown");
    assert_eq!(json["timestamp"], "2024-01-15T00:00:00Z");
}
