use serde::{Deserialize, Serialize};
use std::fmt;

/// CPU backend, always single precision.
pub type CpuBackend = burn::backend::NdArray;

/// GPU backend in single precision.
pub type GpuBackend = burn::backend::Wgpu;

/// GPU backend with half-precision floats.
pub type GpuHalfBackend = burn::backend::Wgpu<burn::tensor::f16>;

/// Device class a run trains on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Accelerator {
    Cpu,
    Gpu,
}

impl fmt::Display for Accelerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Accelerator::Cpu => "cpu",
            Accelerator::Gpu => "gpu",
        })
    }
}

/// Float precision in bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Precision {
    Half,
    Full,
}

impl From<Precision> for u8 {
    fn from(p: Precision) -> u8 {
        match p {
            Precision::Half => 16,
            Precision::Full => 32,
        }
    }
}

impl TryFrom<u8> for Precision {
    type Error = String;

    fn try_from(bits: u8) -> Result<Self, Self::Error> {
        match bits {
            16 => Ok(Precision::Half),
            32 => Ok(Precision::Full),
            other => Err(format!("unsupported precision {other}, expected 16 or 32")),
        }
    }
}

impl fmt::Display for Precision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", u8::from(*self))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precision_serialises_as_bits() {
        assert_eq!(serde_json::to_string(&Precision::Half).unwrap(), "16");
        let p: Precision = serde_json::from_str("32").unwrap();
        assert_eq!(p, Precision::Full);
        assert!(serde_json::from_str::<Precision>("8").is_err());
    }
}
