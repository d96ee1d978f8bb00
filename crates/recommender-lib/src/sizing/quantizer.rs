//! Specification catalog and quantization
//!
//! A catalog is a list of `<cpu>c<memory>g` tiers (cores and GiB), e.g.
//! `1c2g,2c4g,4c8g`. Entries are kept sorted by CPU, then memory.

use crate::error::{CatalogError, ExceedsCatalogWarning};
use crate::models::GIB;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// One (CPU, memory) tier
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Specification {
    pub cpu_cores: f64,
    pub memory_bytes: f64,
}

impl Specification {
    pub fn new(cpu_cores: f64, memory_gib: f64) -> Self {
        Self {
            cpu_cores,
            memory_bytes: memory_gib * GIB,
        }
    }

    pub fn memory_gib(&self) -> f64 {
        self.memory_bytes / GIB
    }

    /// Whether this tier covers the requested pair in both dimensions
    pub fn dominates(&self, cpu_cores: f64, memory_bytes: f64) -> bool {
        self.cpu_cores >= cpu_cores && self.memory_bytes >= memory_bytes
    }
}

impl fmt::Display for Specification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}c{}g", self.cpu_cores, self.memory_gib())
    }
}

impl FromStr for Specification {
    type Err = CatalogError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let entry = input.trim();
        let malformed = |reason: &str| CatalogError::MalformedEntry {
            entry: entry.to_string(),
            reason: reason.to_string(),
        };

        let body = entry
            .strip_suffix('g')
            .ok_or_else(|| malformed("expected a trailing 'g'"))?;
        let (cpu, memory) = body
            .split_once('c')
            .ok_or_else(|| malformed("expected '<cpu>c<memory>g'"))?;
        let cpu: f64 = cpu.parse().map_err(|_| malformed("invalid cpu value"))?;
        let memory: f64 = memory.parse().map_err(|_| malformed("invalid memory value"))?;

        if !(cpu.is_finite() && cpu > 0.0) {
            return Err(malformed("cpu must be a positive number"));
        }
        if !(memory.is_finite() && memory > 0.0) {
            return Err(malformed("memory must be a positive number"));
        }
        Ok(Specification::new(cpu, memory))
    }
}

/// Result of quantizing a (CPU, memory) pair
#[derive(Debug, Clone, PartialEq)]
pub enum Quantization {
    /// Specification mode is off, or an input dimension had no estimate
    NotApplied,
    /// Smallest tier dominating the request
    Matched(Specification),
    /// No tier dominates; the largest tier was used
    ExceedsCatalog(Specification),
}

impl Quantization {
    pub fn specification(&self) -> Option<&Specification> {
        match self {
            Quantization::NotApplied => None,
            Quantization::Matched(spec) | Quantization::ExceedsCatalog(spec) => Some(spec),
        }
    }

    pub fn is_applied(&self) -> bool {
        !matches!(self, Quantization::NotApplied)
    }

    pub fn exceeds_catalog(&self) -> bool {
        matches!(self, Quantization::ExceedsCatalog(_))
    }
}

/// Validated, ordered specification catalog
#[derive(Debug, Clone, PartialEq)]
pub struct SpecificationCatalog {
    entries: Vec<Specification>,
}

impl SpecificationCatalog {
    /// Parse a comma-separated catalog string
    pub fn parse(source: &str) -> Result<Self, CatalogError> {
        let entries = source
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(Specification::from_str)
            .collect::<Result<Vec<_>, _>>()?;
        Self::from_entries(entries)
    }

    /// Validate and sort a list of entries
    pub fn from_entries(mut entries: Vec<Specification>) -> Result<Self, CatalogError> {
        if entries.is_empty() {
            return Err(CatalogError::Empty);
        }
        entries.sort_by(|a, b| {
            a.cpu_cores
                .total_cmp(&b.cpu_cores)
                .then(a.memory_bytes.total_cmp(&b.memory_bytes))
        });
        if let Some(pair) = entries.windows(2).find(|pair| pair[0] == pair[1]) {
            return Err(CatalogError::Duplicate {
                entry: pair[0].to_string(),
            });
        }
        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[Specification] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Largest tier in catalog order
    pub fn largest(&self) -> &Specification {
        // Construction rejects empty catalogs.
        &self.entries[self.entries.len() - 1]
    }

    /// Round a pair up to the first dominating tier in catalog order
    pub fn quantize(&self, cpu_cores: f64, memory_bytes: f64) -> Quantization {
        match self
            .entries
            .iter()
            .find(|spec| spec.dominates(cpu_cores, memory_bytes))
        {
            Some(spec) => Quantization::Matched(*spec),
            None => Quantization::ExceedsCatalog(*self.largest()),
        }
    }

    /// Warning describing a quantization that ran past the catalog
    pub fn warning(
        cpu_cores: f64,
        memory_bytes: f64,
        quantization: &Quantization,
    ) -> Option<ExceedsCatalogWarning> {
        match quantization {
            Quantization::ExceedsCatalog(spec) => Some(ExceedsCatalogWarning {
                cpu_cores,
                memory_bytes,
                entry: spec.to_string(),
            }),
            _ => None,
        }
    }
}
