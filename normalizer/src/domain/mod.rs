//! Domain logic for cloud usage normalization
//!
//! - `usage` - billing row normalization, estimation and classification

pub mod usage;

pub use usage::{
    AccountDirectory, KnowledgeBase, NormalizedUsageRecord, RawUsageRow, UsageError,
    UsageNormalizer,
};
