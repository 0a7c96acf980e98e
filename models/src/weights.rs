//! Where model parameters come from.
use std::collections::BTreeMap;
use std::fs::File;
use std::path::{Path, PathBuf};

use convoy_core::internal::*;
use ndarray::{IxDyn, OwnedRepr};
use ndarray_npy::NpzReader;
use rand::SeedableRng;
use rand::rngs::SmallRng;
use rand_distr::{Distribution, Normal};

/// Name of the archive holding a model parameters, inside its directory.
pub const WEIGHTS_FILE: &str = "weights.npz";

/// Source of parameters for registry models.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WeightSource {
    /// `<root>/<identifier>/weights.npz`, one array per parameter.
    Directory(PathBuf),
    /// Deterministic random initialization.
    Seeded(u64),
}

impl WeightSource {
    pub fn archive_path(root: &Path, identifier: &str) -> PathBuf {
        root.join(identifier).join(WEIGHTS_FILE)
    }

    /// Loads the parameters described by `specs` for model `identifier`.
    pub fn load(&self, identifier: &str, specs: &[WeightSpec]) -> ConvoyResult<Weights> {
        match self {
            WeightSource::Directory(root) => {
                let path = Self::archive_path(root, identifier);
                debug!("Reading weights from {path:?}");
                let file = File::open(&path).with_context(|| format!("Opening {path:?}"))?;
                let mut npz = NpzReader::new(file).with_context(|| format!("Reading {path:?}"))?;
                specs
                    .iter()
                    .map(|spec| {
                        let array = npz
                            .by_name::<OwnedRepr<f32>, IxDyn>(&format!("{}.npy", spec.name))
                            .with_context(|| format!("Reading {} from {path:?}", spec.name))?;
                        let tensor = Tensor::from(array);
                        spec.check(&tensor)?;
                        Ok((spec.name.clone(), tensor.into_arc_tensor()))
                    })
                    .collect::<ConvoyResult<_>>()
                    .map(Weights)
            }
            WeightSource::Seeded(seed) => {
                debug!("Initializing weights for {identifier} with seed {seed}");
                let mut rng = SmallRng::seed_from_u64(*seed);
                specs
                    .iter()
                    .map(|spec| Ok((spec.name.clone(), spec.initialize(&mut rng)?.into_arc_tensor())))
                    .collect::<ConvoyResult<_>>()
                    .map(Weights)
            }
        }
    }
}

/// Expected name and shape of one parameter.
#[derive(Clone, Debug, PartialEq, Eq, new)]
pub struct WeightSpec {
    pub name: String,
    pub shape: TVec<usize>,
}

impl WeightSpec {
    fn check(&self, tensor: &Tensor) -> ConvoyResult<()> {
        ensure!(
            tensor.shape() == &*self.shape,
            "Parameter {} expected with shape {:?}, found {:?}",
            self.name,
            self.shape,
            tensor.shape()
        );
        Ok(())
    }

    /// He initialization for kernels, zeros for biases.
    fn initialize(&self, rng: &mut SmallRng) -> ConvoyResult<Tensor> {
        if self.shape.len() < 2 {
            return Ok(Tensor::zero(&self.shape));
        }
        let fan_in = self.shape[1..].iter().product::<usize>();
        let normal = Normal::new(0.0f32, (2.0 / fan_in as f32).sqrt()).map_err(|e| format_err!("{e}"))?;
        let data: Vec<f32> = (0..self.shape.iter().product::<usize>()).map(|_| normal.sample(rng)).collect();
        Tensor::from_shape(&self.shape, &data)
    }
}

/// Named model parameters.
#[derive(Clone, Debug, Default)]
pub struct Weights(BTreeMap<String, Arc<Tensor>>);

impl Weights {
    pub fn get(&self, name: &str) -> ConvoyResult<Arc<Tensor>> {
        self.0.get(name).cloned().ok_or_else(|| format_err!("No parameter named {name}"))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Arc<Tensor>)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }
}
