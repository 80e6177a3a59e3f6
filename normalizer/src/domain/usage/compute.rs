//! vCPU-hour and GPU-hour estimation
//!
//! vCPU rule cascade (first match wins; usage-type substrings can satisfy
//! several patterns, so order matters):
//! 1. Per-service rules (Glue, SimpleDB)
//! 2. Aurora Serverless capacity units → amount / 4
//! 3. Fargate vCPU-hours and CPU credits → amount (already vCPU-hours)
//! 4. Burstable instances → table vCPUs × baseline / reference utilization
//! 5. No vCPU count in the report → table vCPUs
//! 6. Report-supplied vCPU count, clamped at 0
//!
//! Every table miss degrades to 0 hours. Nothing here returns NaN or a
//! negative value.

use std::sync::Arc;

use super::instance_type::{base_instance_type, extract_instance_type, family_and_size};
use super::tables::KnowledgeBase;
use super::units::REDSHIFT_SERVICE;
use crate::utils::string::contains_any;

// ============================================================================
// CONSTANTS
// ============================================================================

pub const GLUE_SERVICE: &str = "AWSGlue";
pub const SIMPLE_DB_SERVICE: &str = "AmazonSimpleDB";

/// One standard Glue DPU provisions 4 vCPUs
pub const GLUE_VCPUS_PER_USAGE: f64 = 4.0;
pub const SIMPLE_DB_VCPUS_PER_USAGE: f64 = 1.0;

/// Aurora Capacity Units per vCPU
pub const AURORA_CAPACITY_UNITS_PER_VCPU: f64 = 4.0;

/// Average CPU utilization across the provider in the 2020 baseline year
pub const DEFAULT_REFERENCE_CPU_UTILIZATION: f64 = 0.5;

const AURORA_SERVERLESS_MARKER: &str = "Aurora:ServerlessUsage";
const VCPU_HOUR_MARKERS: &[&str] = &["Fargate-vCPU-Hours", "CPUCredits"];
const KAFKA_MARKER: &str = "Kafka";

/// Redshift table values are vCPU-seconds per node-hour
const REDSHIFT_SECONDS_PER_HOUR: f64 = 3600.0;

// ============================================================================
// INPUT
// ============================================================================

/// Fields of a (partially normalized) row the estimator reads
#[derive(Debug, Clone, Copy)]
pub struct EstimationContext<'a> {
    pub service_name: &'a str,
    /// Usage type after suffix correction
    pub usage_type: &'a str,
    /// Amount after unit normalization
    pub usage_amount: f64,
    /// vCPU count from the report, `None` when absent or zero
    pub reported_vcpus: Option<f64>,
}

// ============================================================================
// SERVICE RULES
// ============================================================================

type ServiceRule = fn(&EstimationContext<'_>) -> f64;

/// Services whose vCPU-hours do not depend on the usage type
static SERVICE_RULES: &[(&str, ServiceRule)] = &[
    (GLUE_SERVICE, glue_vcpu_hours),
    (SIMPLE_DB_SERVICE, simple_db_vcpu_hours),
];

fn glue_vcpu_hours(ctx: &EstimationContext<'_>) -> f64 {
    GLUE_VCPUS_PER_USAGE * ctx.usage_amount
}

fn simple_db_vcpu_hours(ctx: &EstimationContext<'_>) -> f64 {
    SIMPLE_DB_VCPUS_PER_USAGE * ctx.usage_amount
}

fn service_rule(service_name: &str) -> Option<ServiceRule> {
    SERVICE_RULES
        .iter()
        .find(|(name, _)| *name == service_name)
        .map(|(_, rule)| *rule)
}

// ============================================================================
// ESTIMATOR
// ============================================================================

/// Derives vCPU-hours and GPU-hours from a usage row
#[derive(Debug, Clone)]
pub struct ComputeEstimator {
    tables: Arc<KnowledgeBase>,
    reference_cpu_utilization: f64,
}

impl ComputeEstimator {
    /// Create an estimator
    ///
    /// `reference_cpu_utilization` must lie in (0, 1]; anything else falls
    /// back to [`DEFAULT_REFERENCE_CPU_UTILIZATION`].
    pub fn new(tables: Arc<KnowledgeBase>, reference_cpu_utilization: f64) -> Self {
        let reference_cpu_utilization = if reference_cpu_utilization.is_finite()
            && reference_cpu_utilization > 0.0
            && reference_cpu_utilization <= 1.0
        {
            reference_cpu_utilization
        } else {
            tracing::warn!(
                reference_cpu_utilization,
                fallback = DEFAULT_REFERENCE_CPU_UTILIZATION,
                "Invalid reference CPU utilization, using default"
            );
            DEFAULT_REFERENCE_CPU_UTILIZATION
        };

        Self {
            tables,
            reference_cpu_utilization,
        }
    }

    pub fn reference_cpu_utilization(&self) -> f64 {
        self.reference_cpu_utilization
    }

    /// Estimated vCPU-hours for a row
    pub fn vcpu_hours(&self, ctx: &EstimationContext<'_>) -> f64 {
        non_negative(self.raw_vcpu_hours(ctx))
    }

    /// Estimated GPU-hours for a row (0 for instance types without GPUs)
    pub fn gpu_hours(&self, ctx: &EstimationContext<'_>) -> f64 {
        let instance_type = extract_instance_type(ctx.usage_type);
        let gpus = self.tables.gpu_count(&instance_type).unwrap_or(0.0);
        non_negative(gpus * ctx.usage_amount)
    }

    fn raw_vcpu_hours(&self, ctx: &EstimationContext<'_>) -> f64 {
        if let Some(rule) = service_rule(ctx.service_name) {
            return rule(ctx);
        }

        if ctx.usage_type.contains(AURORA_SERVERLESS_MARKER) {
            return ctx.usage_amount / AURORA_CAPACITY_UNITS_PER_VCPU;
        }

        if contains_any(ctx.usage_type, VCPU_HOUR_MARKERS) {
            return ctx.usage_amount;
        }

        let instance_type = extract_instance_type(ctx.usage_type);

        if self.tables.mentions_burstable_instance(ctx.usage_type) {
            return self.burstable_vcpus(ctx, base_instance_type(&instance_type))
                * ctx.usage_amount;
        }

        match ctx.reported_vcpus {
            Some(reported) => reported.max(0.0) * ctx.usage_amount,
            None => {
                let vcpus = self.vcpus_for_instance(ctx, &instance_type).unwrap_or_else(|| {
                    tracing::trace!(
                        service = ctx.service_name,
                        usage_type = ctx.usage_type,
                        instance_type = %instance_type,
                        "No vCPU count for instance type"
                    );
                    0.0
                });
                vcpus * ctx.usage_amount
            }
        }
    }

    /// Effective vCPUs of a burstable instance at its guaranteed baseline
    fn burstable_vcpus(&self, ctx: &EstimationContext<'_>, instance_type: &str) -> f64 {
        let vcpus = self.vcpus_for_instance(ctx, instance_type).unwrap_or(0.0);
        let baseline = self.tables.burstable_baseline(instance_type).unwrap_or(0.0);
        vcpus * (baseline / self.reference_cpu_utilization)
    }

    /// vCPUs for an instance type; MSK brokers and Redshift nodes use their
    /// own tables
    fn vcpus_for_instance(&self, ctx: &EstimationContext<'_>, instance_type: &str) -> Option<f64> {
        if let Some((_, broker)) = ctx.usage_type.rsplit_once(KAFKA_MARKER) {
            return self
                .tables
                .msk_broker_vcpus(&format!("{KAFKA_MARKER}{broker}"));
        }

        let (family, size) = family_and_size(instance_type);
        let size = size?;

        if ctx.service_name == REDSHIFT_SERVICE {
            return self
                .tables
                .redshift_node_vcpu_seconds(family, size)
                .map(|seconds| seconds / REDSHIFT_SECONDS_PER_HOUR);
        }

        self.tables.instance_vcpus(family, size)
    }
}

/// Clamp to a finite, non-negative quantity
fn non_negative(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        0.0
    }
}

// ============================================================================
// TESTS
// ============================================================================
