//! A compact DPT-style monocular depth estimator.
//!
//! Patch embedding, a stack of residual conv blocks, a conv head, bicubic
//! upsampling back to the input resolution and a 1x1 projection to a
//! non-negative depth map.
use convoy_core::internal::*;
use convoy_core::ops::binary::Add;
use convoy_core::ops::change_axes::Squeeze;
use convoy_core::ops::conv::Conv;
use convoy_core::ops::element_wise::Relu;
use convoy_core::ops::resize::{Interpolator, Resize};

use crate::weights::{WeightSource, WeightSpec, Weights};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DepthAnythingConfig {
    pub patch_size: usize,
    pub embed_dim: usize,
    pub blocks: usize,
    pub head_dim: usize,
}

impl DepthAnythingConfig {
    pub fn small() -> DepthAnythingConfig {
        DepthAnythingConfig { patch_size: 14, embed_dim: 32, blocks: 2, head_dim: 16 }
    }

    pub fn weight_specs(&self) -> Vec<WeightSpec> {
        let spec = |name: String, shape: &[usize]| WeightSpec::new(name, shape.into());
        let (p, e, h) = (self.patch_size, self.embed_dim, self.head_dim);
        let mut specs = vec![spec("embed.kernel".into(), &[e, 3, p, p]), spec("embed.bias".into(), &[e])];
        for block in 0..self.blocks {
            for conv in ["conv1", "conv2"] {
                specs.push(spec(format!("blocks.{block}.{conv}.kernel"), &[e, e, 3, 3]));
                specs.push(spec(format!("blocks.{block}.{conv}.bias"), &[e]));
            }
        }
        specs.push(spec("head.kernel".into(), &[h, e, 3, 3]));
        specs.push(spec("head.bias".into(), &[h]));
        specs.push(spec("depth.kernel".into(), &[1, h, 1, 1]));
        specs.push(spec("depth.bias".into(), &[1]));
        specs
    }
}

impl Default for DepthAnythingConfig {
    fn default() -> DepthAnythingConfig {
        DepthAnythingConfig::small()
    }
}

#[derive(Clone, Debug)]
pub struct DepthAnything {
    config: DepthAnythingConfig,
    weights: Weights,
}

impl DepthAnything {
    pub fn load(
        config: DepthAnythingConfig,
        source: &WeightSource,
        identifier: &str,
    ) -> ConvoyResult<DepthAnything> {
        let weights = source.load(identifier, &config.weight_specs())?;
        Ok(DepthAnything { config, weights })
    }

    pub fn config(&self) -> &DepthAnythingConfig {
        &self.config
    }

    fn conv(
        &self,
        session: &mut TracingSession,
        prefix: &str,
        input: OutletId,
        strides: usize,
        padding: usize,
    ) -> ConvoyResult<OutletId> {
        let conv = Conv::new(
            self.weights.get(&format!("{prefix}.kernel"))?,
            Some(self.weights.get(&format!("{prefix}.bias"))?),
            [strides; 2],
            [padding; 2],
        );
        Ok(session.wire_node(prefix, conv, &[input])?[0])
    }
}

impl RawModel for DepthAnything {
    fn forward(&self, session: &mut TracingSession, pixel_values: OutletId) -> ConvoyResult<Prediction> {
        let shape = session.outlet_fact(pixel_values)?.shape.clone();
        let p = self.config.patch_size;
        ensure!(
            shape.len() == 4 && shape[1] == 3 && shape[2] % p == 0 && shape[3] % p == 0,
            "Depth model expects 1x3xHxW pixel values with H and W multiple of {p}, got {shape:?}"
        );
        let (height, width) = (shape[2], shape[3]);

        let mut x = self.conv(session, "embed", pixel_values, p, 0)?;
        for block in 0..self.config.blocks {
            let prefix = format!("blocks.{block}");
            let h = self.conv(session, &format!("{prefix}.conv1"), x, 1, 1)?;
            let h = session.wire_node(format!("{prefix}.relu"), Relu, &[h])?[0];
            let h = self.conv(session, &format!("{prefix}.conv2"), h, 1, 1)?;
            x = session.wire_node(format!("{prefix}.residual"), Add, &[x, h])?[0];
        }
        let hidden_states = x;

        let head = self.conv(session, "head", x, 1, 1)?;
        let head = session.wire_node("head.relu", Relu, &[head])?[0];
        let up = Resize::new(Interpolator::Cubic, [height, width], true, false, None);
        let up = session.wire_node("upsample", up, &[head])?[0];
        let depth = self.conv(session, "depth", up, 1, 0)?;
        let depth = session.wire_node("depth.relu", Relu, &[depth])?[0];
        let depth = session.wire_node("predicted_depth", Squeeze::new(1), &[depth])?[0];

        Ok(Prediction::default()
            .with(ModelAdapter::DEPTH_FIELD, depth)
            .with("hidden_states", hidden_states))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiny() -> DepthAnythingConfig {
        DepthAnythingConfig { patch_size: 2, embed_dim: 4, blocks: 1, head_dim: 3 }
    }

    #[derive(Debug)]
    struct Fields(DepthAnything);

    impl Model for Fields {
        fn forward(&self, session: &mut TracingSession, input: OutletId) -> ConvoyResult<OutletId> {
            let prediction = self.0.forward(session, input)?;
            assert_eq!(prediction.fields().collect::<Vec<_>>(), ["hidden_states", "predicted_depth"]);
            prediction.get("hidden_states").ok_or_else(|| format_err!("no hidden states"))
        }
    }

    #[test]
    fn weight_specs_cover_blocks() {
        let specs = DepthAnythingConfig::small().weight_specs();
        assert_eq!(specs.len(), 2 + 2 * 4 + 4);
        assert_eq!(&*specs[0].shape, &[32, 3, 14, 14]);
    }

    #[test]
    fn hidden_states_are_patch_grid() {
        let model = DepthAnything::load(tiny(), &WeightSource::Seeded(0), "tiny").unwrap();
        let tracer = Tracer::new(&[1, 3, 6, 8]);
        let trace = tracer
            .trace(&Fields(model), &tracer.sample_input(0).unwrap(), &Dispatch::default())
            .unwrap();
        assert_eq!(&*trace.output_fact(0).unwrap().shape, &[1, 4, 3, 4]);
    }

    #[test]
    fn rejects_unaligned_inputs() {
        let model = DepthAnything::load(tiny(), &WeightSource::Seeded(0), "tiny").unwrap();
        let adapter = ModelAdapter::new("tiny", ModelAdapter::DEPTH_FIELD, Box::new(model));
        let tracer = Tracer::new(&[1, 3, 5, 8]);
        assert!(tracer.trace(&adapter, &Tensor::zero(&[1, 3, 5, 8]), &Dispatch::default()).is_err());
    }
}
