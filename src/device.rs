//! Compute device selection
//!
//! Device placement is an explicit value passed to every stage. This build
//! only carries a host backend; requesting an accelerator resolves to the
//! host without failing.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Where tensors live during a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Device {
    /// Host memory
    #[default]
    Cpu,
    /// Accelerator by ordinal
    Cuda(usize),
}

impl Device {
    /// Whether an accelerator backend is compiled into this build
    pub fn accelerator_available() -> bool {
        false
    }

    /// Best available device
    pub fn detect() -> Self {
        Self::Cpu.resolve()
    }

    /// Map a requested device onto one that can actually run
    pub fn resolve(self) -> Self {
        match self {
            Self::Cpu => Self::Cpu,
            Self::Cuda(ordinal) if Self::accelerator_available() => Self::Cuda(ordinal),
            Self::Cuda(ordinal) => {
                tracing::debug!(ordinal, "accelerator unavailable, using cpu");
                Self::Cpu
            }
        }
    }

    /// Check if this is the host device
    pub fn is_cpu(self) -> bool {
        matches!(self, Self::Cpu)
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cpu => write!(f, "cpu"),
            Self::Cuda(ordinal) => write!(f, "cuda:{ordinal}"),
        }
    }
}

impl FromStr for Device {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "cpu" => Ok(Self::Cpu),
            "cuda" => Ok(Self::Cuda(0)),
            other => other
                .strip_prefix("cuda:")
                .and_then(|n| n.parse().ok())
                .map(Self::Cuda)
                .ok_or_else(|| {
                    Error::Config(format!("unknown device '{s}', expected cpu or cuda[:N]"))
                }),
        }
    }
}
