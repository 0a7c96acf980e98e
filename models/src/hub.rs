use convoy_core::internal::*;

use crate::depth_anything::{DepthAnything, DepthAnythingConfig};
use crate::weights::WeightSource;

/// Registry identifier of the small Depth Anything V2 model.
pub const DEPTH_ANYTHING_V2_SMALL: &str = "depth-anything/Depth-Anything-V2-Small-hf";

/// Built-in model registry: architectures known by identifier, parameters
/// from a [`WeightSource`].
#[derive(Clone, Debug)]
pub struct Hub {
    weights: WeightSource,
}

impl Hub {
    pub fn new(weights: WeightSource) -> Hub {
        Hub { weights }
    }

    pub fn weights(&self) -> &WeightSource {
        &self.weights
    }

    pub fn known() -> &'static [&'static str] {
        &[DEPTH_ANYTHING_V2_SMALL]
    }
}

impl ModelRegistry for Hub {
    fn fetch(&self, identifier: &str) -> ConvoyResult<Box<dyn RawModel>> {
        match identifier {
            DEPTH_ANYTHING_V2_SMALL => {
                Ok(Box::new(DepthAnything::load(DepthAnythingConfig::small(), &self.weights, identifier)?))
            }
            _ => bail!("Unknown model {identifier:?} (known models: {})", Hub::known().join(", ")),
        }
    }
}

/// Artifact name for a registry identifier: last path segment, without the
/// `-hf` suffix and dashes.
///
/// ```
/// assert_eq!(
///     convoy_models::output_name("depth-anything/Depth-Anything-V2-Small-hf"),
///     "DepthAnythingV2Small"
/// );
/// ```
pub fn output_name(identifier: &str) -> String {
    let last = identifier.rsplit('/').next().unwrap_or(identifier);
    last.strip_suffix("-hf").unwrap_or(last).replace('-', "")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names() {
        assert_eq!(output_name(DEPTH_ANYTHING_V2_SMALL), "DepthAnythingV2Small");
        assert_eq!(output_name("plain"), "plain");
        assert_eq!(output_name("org/my-model"), "mymodel");
    }

    #[test]
    fn unknown_model() {
        let hub = Hub::new(WeightSource::Seeded(0));
        let err = ModelAdapter::load(&hub, "org/unknown").unwrap_err();
        assert!(matches!(err, ExportError::ModelLoad { .. }));
    }

    #[test]
    fn missing_weights_fail_to_load() {
        let dir = temp_dir::TempDir::new().unwrap();
        let hub = Hub::new(WeightSource::Directory(dir.path().to_path_buf()));
        let err = ModelAdapter::load(&hub, DEPTH_ANYTHING_V2_SMALL).unwrap_err();
        assert!(matches!(err, ExportError::ModelLoad { ref identifier, .. } if identifier == DEPTH_ANYTHING_V2_SMALL));
    }
}
