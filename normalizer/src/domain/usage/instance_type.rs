//! Instance type extraction from CUR usage type strings
//!
//! Usage types encode region, usage kind and (for instance-backed services)
//! the instance type, e.g. `USE1-BoxUsage:m5.xlarge`,
//! `USE1-InstanceUsage:db.r5.large`, `USE1-Kafka.m5.large`.
//!
//! Two extraction strategies coexist and are intentionally different:
//! - [`resolve_instance_type`] feeds the record's `instance_type` field and
//!   processor classification. It splits on the first matching marker.
//! - [`extract_instance_type`] feeds vCPU/GPU estimation. It takes the last
//!   `:` segment and strips a wider set of managed-service prefixes.
//!
//! Burstable and MSK broker lookups depend on the second form, so the two
//! must not be merged.

use std::sync::OnceLock;

use regex::Regex;

/// Markers scanned in order by the public resolver; first contained wins
const INSTANCE_TYPE_MARKERS: &[&str] = &["db", "cache", "Kafka"];

/// Some CUR rows truncate "xlarge" to "xl"
const TRUNCATED_XLARGE_SUFFIX: &str = "xl";

/// Restore a truncated "xlarge" size suffix
///
/// Applied once when a record is built, before anything else reads the usage
/// type. Idempotent: a corrected value ends with "xlarge", not "xl".
pub fn correct_usage_type(usage_type: &str) -> String {
    if usage_type.ends_with(TRUNCATED_XLARGE_SUFFIX) {
        format!("{usage_type}arge")
    } else {
        usage_type.to_string()
    }
}

/// Resolve the instance type reported on the normalized record
///
/// Examples:
/// - `USE1-BoxUsage:m5.xlarge` → `m5.xlarge`
/// - `USE1-InstanceUsage:db.r5.large` → `r5.large`
/// - `USE1-NodeUsage:cache.t3.micro` → `t3.micro`
/// - `USE1-Kafka.m5.large` → `m5.large`
/// - `USE1-Lambda-GB-Second` → unchanged
pub fn resolve_instance_type(usage_type: &str) -> String {
    let tail = match INSTANCE_TYPE_MARKERS
        .iter()
        .find(|marker| usage_type.contains(*marker))
    {
        Some(marker) => after_last(usage_type, &format!("{marker}.")),
        None => after_last(usage_type, ":"),
    };
    tail.to_string()
}

/// Extract the instance type used for vCPU and GPU estimation
///
/// Takes the segment after the last `:` and strips one leading
/// managed-service prefix (`db.`, `cache.`, `dax.`, `dms.`, `ml.`, `mq.`,
/// `KernelGateway-ml.` or anything ending in `Kafka.`).
pub fn extract_instance_type(usage_type: &str) -> String {
    let tail = after_last(usage_type, ":");
    managed_prefix_regex().replace(tail, "").into_owned()
}

/// Split an instance type into family and size (`m5.xlarge` → `m5`, `xlarge`)
///
/// Only the first two dot-separated segments are considered; a missing size
/// comes back as `None`.
pub fn family_and_size(instance_type: &str) -> (&str, Option<&str>) {
    let mut parts = instance_type.split('.');
    let family = parts.next().unwrap_or_default();
    (family, parts.next())
}

/// Keep at most the first two dot-separated segments (`t3.micro.x` → `t3.micro`)
pub fn base_instance_type(instance_type: &str) -> &str {
    match instance_type.match_indices('.').nth(1) {
        Some((idx, _)) => &instance_type[..idx],
        None => instance_type,
    }
}

/// Text after the last occurrence of `separator`, or the whole string
fn after_last<'a>(value: &'a str, separator: &str) -> &'a str {
    value
        .rsplit_once(separator)
        .map_or(value, |(_, tail)| tail)
}

fn managed_prefix_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(db|cache|dax|dms|ml|mq|KernelGateway-ml|.+Kafka)\.").expect("Invalid regex")
    })
}
