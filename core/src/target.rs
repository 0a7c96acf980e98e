//! Description of the target format input layer and deployment floor.
use std::fmt;
use std::str::FromStr;

use crate::internal::*;

/// A named single-image input with an affine pixel normalization baked in:
/// the model sees `pixel * scale + bias[channel]`.
#[derive(Clone, Debug, PartialEq)]
pub struct ImageInput {
    pub name: String,
    pub shape: [usize; 4],
    pub scale: f32,
    pub bias: [f32; 3],
}

impl ImageInput {
    /// ImageNet mean and standard deviation folded into scale and bias, for
    /// raw 0..255 RGB input.
    pub fn imagenet(name: impl Into<String>, height: usize, width: usize) -> ImageInput {
        ImageInput {
            name: name.into(),
            shape: [1, 3, height, width],
            scale: 1.0 / (255.0 * 0.226),
            bias: [-0.485 / 0.229, -0.456 / 0.224, -0.406 / 0.225],
        }
    }

    /// Applies the normalization to raw pixel values, NCHW.
    pub fn normalize(&self, raw: &Tensor) -> ConvoyResult<Tensor> {
        ensure!(
            raw.shape() == self.shape,
            "Image input {} expects shape {:?}, got {:?}",
            self.name,
            self.shape,
            raw.shape()
        );
        ensure!(
            self.shape[1] == self.bias.len(),
            "Image input {} has {} channels, normalization is defined for {}",
            self.name,
            self.shape[1],
            self.bias.len()
        );
        let mut data = raw.clone().into_array();
        for (c, mut channel) in data.axis_iter_mut(ndarray::Axis(1)).enumerate() {
            channel.mapv_inplace(|x| x * self.scale + self.bias[c]);
        }
        Ok(Tensor::from(data))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Platform {
    Ios,
    Macos,
    Tvos,
    Watchos,
}

/// Minimum platform version the artifact may be deployed on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PlatformVersion {
    pub platform: Platform,
    pub major: u32,
}

impl PlatformVersion {
    pub fn ios(major: u32) -> PlatformVersion {
        PlatformVersion { platform: Platform::Ios, major }
    }
}

impl Default for PlatformVersion {
    fn default() -> PlatformVersion {
        PlatformVersion::ios(16)
    }
}

impl fmt::Display for PlatformVersion {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let platform = match self.platform {
            Platform::Ios => "iOS",
            Platform::Macos => "macOS",
            Platform::Tvos => "tvOS",
            Platform::Watchos => "watchOS",
        };
        write!(f, "{}{}", platform, self.major)
    }
}

impl FromStr for PlatformVersion {
    type Err = ConvoyError;
    fn from_str(s: &str) -> ConvoyResult<PlatformVersion> {
        let lower = s.to_lowercase();
        let split = lower.find(|c: char| c.is_ascii_digit()).ok_or_else(|| {
            format_err!("Platform version expected as platform and major version (like iOS16), got {s:?}")
        })?;
        let (platform, major) = lower.split_at(split);
        let platform = match platform.trim_end_matches(['-', '_', ' ']) {
            "ios" => Platform::Ios,
            "macos" => Platform::Macos,
            "tvos" => Platform::Tvos,
            "watchos" => Platform::Watchos,
            other => bail!("Unknown platform {other:?} in {s:?}"),
        };
        let major = major.parse::<u32>().with_context(|| format!("Parsing major version in {s:?}"))?;
        Ok(PlatformVersion { platform, major })
    }
}

/// What the lowering must produce, besides the graph itself.
#[derive(Clone, Debug, PartialEq)]
pub struct TargetSpec {
    pub input: ImageInput,
    pub minimum_platform: PlatformVersion,
}

impl TargetSpec {
    pub fn new(input: ImageInput, minimum_platform: PlatformVersion) -> TargetSpec {
        TargetSpec { input, minimum_platform }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn platform_versions() {
        assert_eq!("iOS16".parse::<PlatformVersion>().unwrap(), PlatformVersion::ios(16));
        assert_eq!("ios-17".parse::<PlatformVersion>().unwrap(), PlatformVersion::ios(17));
        let mac: PlatformVersion = "macos13".parse().unwrap();
        assert_eq!(mac.to_string(), "macOS13");
        assert!("android14".parse::<PlatformVersion>().is_err());
        assert!("ios".parse::<PlatformVersion>().is_err());
        assert!(PlatformVersion::ios(17) > PlatformVersion::ios(16));
    }

    #[test]
    fn imagenet_normalization() {
        let input = ImageInput::imagenet("image", 1, 1);
        let raw = Tensor::from_shape(&[1, 3, 1, 1], &[0.0, 255.0, 127.5]).unwrap();
        let normalized = input.normalize(&raw).unwrap();
        let values = normalized.as_slice().unwrap();
        assert_abs_diff_eq!(values[0], -0.485 / 0.229, epsilon = 1e-5);
        assert_abs_diff_eq!(values[1], 1.0 / 0.226 - 0.456 / 0.224, epsilon = 1e-5);
        assert_abs_diff_eq!(values[2], 0.5 / 0.226 - 0.406 / 0.225, epsilon = 1e-5);
    }

    #[test]
    fn normalization_needs_one_bias_per_channel() {
        let input = ImageInput { shape: [1, 4, 1, 1], ..ImageInput::imagenet("image", 1, 1) };
        assert!(input.normalize(&Tensor::zero(&[1, 4, 1, 1])).is_err());
    }
}
