//! Usage unit and amount normalization
//!
//! Providers report some services in seconds and others in GB-hours with
//! inconsistent unit labels. Exactly one [`UnitPolicy`] applies per row, and
//! policies never stack.

/// Data warehouse service name
pub const REDSHIFT_SERVICE: &str = "AmazonRedshift";

/// Fargate memory usage types carry this marker
const FARGATE_GB_HOURS_MARKER: &str = "Fargate-GB-Hours";

const SECONDS_PER_HOUR: f64 = 3600.0;

/// Unit tokens the normalizer reacts to or produces
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UsageUnit {
    Seconds,
    Hours,
    GbHours,
}

impl UsageUnit {
    pub fn as_str(self) -> &'static str {
        match self {
            UsageUnit::Seconds => "Seconds",
            UsageUnit::Hours => "Hours",
            UsageUnit::GbHours => "GB-Hours",
        }
    }
}

/// Canonical usage quantity
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedUsage {
    pub amount: f64,
    pub unit: String,
}

/// The single conversion applied to a row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitPolicy {
    /// Redshift compute reported in seconds → hours
    RedshiftSecondsToHours,
    /// Fargate memory rows relabelled as GB-hours
    FargateGbHours,
    PassThrough,
}

impl UnitPolicy {
    /// Pick the policy for a row; first match wins
    pub fn select(service_name: &str, usage_type: &str, usage_unit: &str) -> Self {
        if service_name == REDSHIFT_SERVICE && usage_unit == UsageUnit::Seconds.as_str() {
            UnitPolicy::RedshiftSecondsToHours
        } else if usage_type.contains(FARGATE_GB_HOURS_MARKER) {
            UnitPolicy::FargateGbHours
        } else {
            UnitPolicy::PassThrough
        }
    }

    pub fn apply(self, usage_amount: f64, usage_unit: &str) -> NormalizedUsage {
        match self {
            UnitPolicy::RedshiftSecondsToHours => NormalizedUsage {
                amount: usage_amount / SECONDS_PER_HOUR,
                unit: UsageUnit::Hours.as_str().to_string(),
            },
            UnitPolicy::FargateGbHours => NormalizedUsage {
                amount: usage_amount,
                unit: UsageUnit::GbHours.as_str().to_string(),
            },
            UnitPolicy::PassThrough => NormalizedUsage {
                amount: usage_amount,
                unit: usage_unit.to_string(),
            },
        }
    }
}

/// Convert a row's amount and unit into canonical form
pub fn normalize_usage(
    service_name: &str,
    usage_type: &str,
    usage_unit: &str,
    usage_amount: f64,
) -> NormalizedUsage {
    UnitPolicy::select(service_name, usage_type, usage_unit).apply(usage_amount, usage_unit)
}
