//! Processor architecture classification
//!
//! Maps a resolved instance type to the CPU and GPU architectures it runs on.
//! Downstream energy models aggregate per architecture, so every lookup
//! yields at least one tag: misses resolve to [`ProcessorType::Unknown`].

use std::fmt;

use serde::{Deserialize, Serialize};

use super::tables::KnowledgeBase;

/// Serverless function service name
pub const LAMBDA_SERVICE: &str = "AWSLambda";

/// Lambda usage types for Arm functions end with this marker
const LAMBDA_ARM_SUFFIX: &str = "-ARM";

/// CPU or GPU architecture family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProcessorType {
    #[serde(rename = "Cascade Lake")]
    CascadeLake,
    #[serde(rename = "Skylake")]
    Skylake,
    #[serde(rename = "Broadwell")]
    Broadwell,
    #[serde(rename = "Haswell")]
    Haswell,
    #[serde(rename = "Ivy Bridge")]
    IvyBridge,
    #[serde(rename = "Sandy Bridge")]
    SandyBridge,
    #[serde(rename = "Ice Lake")]
    IceLake,
    #[serde(rename = "Sapphire Rapids")]
    SapphireRapids,
    #[serde(rename = "AMD EPYC 1st Gen")]
    AmdEpyc1stGen,
    #[serde(rename = "AMD EPYC 2nd Gen")]
    AmdEpyc2ndGen,
    #[serde(rename = "AMD EPYC 3rd Gen")]
    AmdEpyc3rdGen,
    #[serde(rename = "AMD EPYC 4th Gen")]
    AmdEpyc4thGen,
    #[serde(rename = "AWS Graviton")]
    AwsGraviton,
    #[serde(rename = "AWS Graviton2")]
    AwsGraviton2,
    #[serde(rename = "AWS Graviton3")]
    AwsGraviton3,
    #[serde(rename = "NVIDIA K80")]
    NvidiaK80,
    #[serde(rename = "NVIDIA Tesla V100")]
    NvidiaTeslaV100,
    #[serde(rename = "NVIDIA A100")]
    NvidiaA100,
    #[serde(rename = "NVIDIA H100")]
    NvidiaH100,
    #[serde(rename = "NVIDIA Tesla M60")]
    NvidiaTeslaM60,
    #[serde(rename = "NVIDIA T4")]
    NvidiaT4,
    #[serde(rename = "NVIDIA T4G")]
    NvidiaT4G,
    #[serde(rename = "NVIDIA A10G")]
    NvidiaA10G,
    #[serde(rename = "NVIDIA L4")]
    NvidiaL4,
    #[serde(rename = "AMD Radeon Pro V520")]
    AmdRadeonProV520,
    #[serde(rename = "Unknown")]
    Unknown,
}

impl ProcessorType {
    pub fn as_str(self) -> &'static str {
        match self {
            ProcessorType::CascadeLake => "Cascade Lake",
            ProcessorType::Skylake => "Skylake",
            ProcessorType::Broadwell => "Broadwell",
            ProcessorType::Haswell => "Haswell",
            ProcessorType::IvyBridge => "Ivy Bridge",
            ProcessorType::SandyBridge => "Sandy Bridge",
            ProcessorType::IceLake => "Ice Lake",
            ProcessorType::SapphireRapids => "Sapphire Rapids",
            ProcessorType::AmdEpyc1stGen => "AMD EPYC 1st Gen",
            ProcessorType::AmdEpyc2ndGen => "AMD EPYC 2nd Gen",
            ProcessorType::AmdEpyc3rdGen => "AMD EPYC 3rd Gen",
            ProcessorType::AmdEpyc4thGen => "AMD EPYC 4th Gen",
            ProcessorType::AwsGraviton => "AWS Graviton",
            ProcessorType::AwsGraviton2 => "AWS Graviton2",
            ProcessorType::AwsGraviton3 => "AWS Graviton3",
            ProcessorType::NvidiaK80 => "NVIDIA K80",
            ProcessorType::NvidiaTeslaV100 => "NVIDIA Tesla V100",
            ProcessorType::NvidiaA100 => "NVIDIA A100",
            ProcessorType::NvidiaH100 => "NVIDIA H100",
            ProcessorType::NvidiaTeslaM60 => "NVIDIA Tesla M60",
            ProcessorType::NvidiaT4 => "NVIDIA T4",
            ProcessorType::NvidiaT4G => "NVIDIA T4G",
            ProcessorType::NvidiaA10G => "NVIDIA A10G",
            ProcessorType::NvidiaL4 => "NVIDIA L4",
            ProcessorType::AmdRadeonProV520 => "AMD Radeon Pro V520",
            ProcessorType::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for ProcessorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify the CPU architecture(s) behind a usage row
///
/// Lambda has no instance type; Arm functions are tagged by a usage-type
/// suffix, which survives instance-type resolution unchanged.
pub fn classify_compute(
    tables: &KnowledgeBase,
    service_name: &str,
    instance_type: &str,
) -> Vec<ProcessorType> {
    if service_name == LAMBDA_SERVICE {
        return if instance_type.ends_with(LAMBDA_ARM_SUFFIX) {
            vec![ProcessorType::AwsGraviton2]
        } else {
            vec![ProcessorType::Unknown]
        };
    }

    or_unknown(tables.compute_processors(instance_type))
}

/// Classify the GPU architecture(s) behind a usage row
pub fn classify_gpu(
    tables: &KnowledgeBase,
    service_name: &str,
    instance_type: &str,
) -> Vec<ProcessorType> {
    if service_name == LAMBDA_SERVICE {
        return vec![ProcessorType::Unknown];
    }

    or_unknown(tables.gpu_processors(instance_type))
}

fn or_unknown(found: Option<&[ProcessorType]>) -> Vec<ProcessorType> {
    match found {
        Some(processors) if !processors.is_empty() => processors.to_vec(),
        _ => vec![ProcessorType::Unknown],
    }
}
