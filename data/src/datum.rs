use std::fmt;
use std::str::FromStr;

/// Element type of a tensor.
///
/// Storage is always `f32`: an `F16` tensor holds values that have been
/// rounded through half precision.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Ord, PartialOrd, Default)]
pub enum DatumType {
    F16,
    #[default]
    F32,
}

impl DatumType {
    /// Size of one element in the serialized form, in bytes.
    pub fn size_of(&self) -> usize {
        match self {
            DatumType::F16 => 2,
            DatumType::F32 => 4,
        }
    }

    pub fn round(&self, x: f32) -> f32 {
        match self {
            DatumType::F16 => half::f16::from_f32(x).to_f32(),
            DatumType::F32 => x,
        }
    }
}

impl fmt::Display for DatumType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            DatumType::F16 => write!(f, "f16"),
            DatumType::F32 => write!(f, "f32"),
        }
    }
}

impl FromStr for DatumType {
    type Err = anyhow::Error;
    fn from_str(s: &str) -> Result<DatumType, Self::Err> {
        match &*s.to_lowercase() {
            "f16" | "float16" | "half" => Ok(DatumType::F16),
            "f32" | "float32" | "float" => Ok(DatumType::F32),
            _ => anyhow::bail!("Unknown datum type {}", s),
        }
    }
}
