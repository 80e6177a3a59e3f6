// =============================================================================
// Application Identity
// =============================================================================

/// Application name (binary name and display)
pub const APP_NAME: &str = "usage-normalizer";

/// Crate name as it appears in tracing targets
pub const APP_TARGET: &str = "usage_normalizer";

/// Unix-style dotfile folder name
pub const APP_DOT_FOLDER: &str = ".usage-normalizer";

// =============================================================================
// Configuration Files
// =============================================================================

/// Config file name
pub const CONFIG_FILE_NAME: &str = "usage-normalizer.json";

/// Environment variable for config file path
pub const ENV_CONFIG: &str = "USAGE_NORMALIZER_CONFIG";

// =============================================================================
// Environment Variables - Logging
// =============================================================================

/// Environment variable for log level/filter
pub const ENV_LOG: &str = "USAGE_NORMALIZER_LOG";

// =============================================================================
// Environment Variables - Estimation
// =============================================================================

/// Environment variable for a replacement knowledge-base JSON file
pub const ENV_TABLES: &str = "USAGE_NORMALIZER_TABLES";

/// Environment variable for the reference CPU utilization (0, 1]
pub const ENV_REFERENCE_CPU_UTILIZATION: &str = "USAGE_NORMALIZER_REFERENCE_CPU_UTILIZATION";

// =============================================================================
// Environment Variables - Batch
// =============================================================================

/// Environment variable for rows per normalization chunk
pub const ENV_CHUNK_SIZE: &str = "USAGE_NORMALIZER_CHUNK_SIZE";

/// Default rows per chunk handed to a blocking worker
pub const DEFAULT_CHUNK_SIZE: usize = 1024;
