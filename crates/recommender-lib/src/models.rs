//! Core data models for the resource recommender

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Bytes in one mebibyte
pub const MIB: f64 = 1024.0 * 1024.0;

/// Bytes in one gibibyte
pub const GIB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Resource dimension a histogram, parameter set or sample series belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceDimension {
    Cpu,
    Memory,
}

impl ResourceDimension {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceDimension::Cpu => "cpu",
            ResourceDimension::Memory => "memory",
        }
    }
}

impl fmt::Display for ResourceDimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifies the workload (and optionally one of its containers) being sized
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkloadRef {
    pub namespace: String,
    pub workload: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container: Option<String>,
}

impl WorkloadRef {
    pub fn new(namespace: impl Into<String>, workload: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            workload: workload.into(),
            container: None,
        }
    }

    pub fn with_container(mut self, container: impl Into<String>) -> Self {
        self.container = Some(container.into());
        self
    }
}

impl fmt::Display for WorkloadRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.container {
            Some(container) => write!(f, "{}/{}/{}", self.namespace, self.workload, container),
            None => write!(f, "{}/{}", self.namespace, self.workload),
        }
    }
}

/// One utilization sample: cores for CPU, bytes for memory
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

impl Sample {
    pub fn new(timestamp: DateTime<Utc>, value: f64) -> Self {
        Self { timestamp, value }
    }
}

/// Memory usage observed when a container was OOM-killed
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OomEvent {
    pub timestamp: DateTime<Utc>,
    pub memory_bytes: f64,
}

impl OomEvent {
    pub fn new(timestamp: DateTime<Utc>, memory_bytes: f64) -> Self {
        Self {
            timestamp,
            memory_bytes,
        }
    }
}

/// Sample windows for both dimensions of one workload
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkloadSamples {
    #[serde(default)]
    pub cpu: Vec<Sample>,
    #[serde(default)]
    pub memory: Vec<Sample>,
}

impl WorkloadSamples {
    pub fn series(&self, dimension: ResourceDimension) -> &[Sample] {
        match dimension {
            ResourceDimension::Cpu => &self.cpu,
            ResourceDimension::Memory => &self.memory,
        }
    }
}

/// Serializable resource profile handed to downstream appliers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceProfile {
    pub workload: WorkloadRef,
    pub cpu_request_millicores: u64,
    pub memory_request_bytes: u64,
    /// Kubernetes quantity strings, e.g. `{"cpu": "1725m", "memory": "629145600"}`
    pub cpu_quantity: String,
    pub memory_quantity: String,
    pub oom_floor_applied: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub specification: Option<String>,
    pub exceeds_catalog: bool,
    pub generated_at: i64,
}

/// Convert cores to whole millicores, rounding to nearest
pub fn cores_to_millicores(cores: f64) -> u64 {
    (cores.max(0.0) * 1000.0).round() as u64
}

/// Render millicores as a Kubernetes CPU quantity
pub fn cpu_quantity(millicores: u64) -> String {
    if millicores % 1000 == 0 {
        format!("{}", millicores / 1000)
    } else {
        format!("{}m", millicores)
    }
}

/// Render bytes as a Kubernetes memory quantity, using binary suffixes when exact
pub fn memory_quantity(bytes: u64) -> String {
    const KI: u64 = 1024;
    const MI: u64 = KI * 1024;
    const GI: u64 = MI * 1024;

    if bytes != 0 && bytes % GI == 0 {
        format!("{}Gi", bytes / GI)
    } else if bytes != 0 && bytes % MI == 0 {
        format!("{}Mi", bytes / MI)
    } else if bytes != 0 && bytes % KI == 0 {
        format!("{}Ki", bytes / KI)
    } else {
        format!("{}", bytes)
    }
}
