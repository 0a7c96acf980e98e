//! Models, as seen by the tracer.
use std::collections::BTreeMap;

use crate::errors::ExportError;
use crate::internal::*;
use crate::tracer::TracingSession;

/// Named outputs of a registry model.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Prediction(BTreeMap<String, OutletId>);

impl Prediction {
    pub fn with(mut self, field: impl Into<String>, outlet: OutletId) -> Prediction {
        self.0.insert(field.into(), outlet);
        self
    }

    pub fn get(&self, field: &str) -> Option<OutletId> {
        self.0.get(field).copied()
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(|k| k.as_str())
    }
}

/// A pretrained network as obtained from a registry: one input, several
/// named outputs.
pub trait RawModel: fmt::Debug + Send + Sync {
    /// Wires the network on `pixel_values` in the session.
    fn forward(
        &self,
        session: &mut TracingSession,
        pixel_values: OutletId,
    ) -> ConvoyResult<Prediction>;
}

/// A single-tensor-in, single-tensor-out network.
pub trait Model: fmt::Debug + Send + Sync {
    fn name(&self) -> Cow<'_, str> {
        "model".into()
    }

    fn forward(&self, session: &mut TracingSession, input: OutletId) -> ConvoyResult<OutletId>;
}

/// Source of pretrained models.
pub trait ModelRegistry {
    fn fetch(&self, identifier: &str) -> ConvoyResult<Box<dyn RawModel>>;
}

/// Projects one field out of a registry model.
#[derive(Debug)]
pub struct ModelAdapter {
    identifier: String,
    field: String,
    model: Box<dyn RawModel>,
}

impl ModelAdapter {
    /// The field depth estimators predict into.
    pub const DEPTH_FIELD: &'static str = "predicted_depth";

    /// Fetches `identifier` from `registry`, projecting its depth prediction.
    pub fn load(registry: &dyn ModelRegistry, identifier: &str) -> Result<ModelAdapter, ExportError> {
        Self::load_field(registry, identifier, Self::DEPTH_FIELD)
    }

    pub fn load_field(
        registry: &dyn ModelRegistry,
        identifier: &str,
        field: &str,
    ) -> Result<ModelAdapter, ExportError> {
        info!("Loading {identifier}...");
        let model = registry
            .fetch(identifier)
            .map_err(|source| ExportError::ModelLoad { identifier: identifier.to_string(), source })?;
        Ok(ModelAdapter::new(identifier, field, model))
    }

    pub fn new(identifier: impl Into<String>, field: impl Into<String>, model: Box<dyn RawModel>) -> ModelAdapter {
        ModelAdapter { identifier: identifier.into(), field: field.into(), model }
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn field(&self) -> &str {
        &self.field
    }
}

impl Model for ModelAdapter {
    fn name(&self) -> Cow<'_, str> {
        self.identifier.as_str().into()
    }

    fn forward(&self, session: &mut TracingSession, input: OutletId) -> ConvoyResult<OutletId> {
        let prediction = self.model.forward(session, input)?;
        prediction.get(&self.field).ok_or_else(|| {
            format_err!(
                "{} has no {} output (found: {})",
                self.identifier,
                self.field,
                prediction.fields().collect::<Vec<_>>().join(", ")
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::element_wise::Relu;
    use crate::tracer::Tracer;

    #[derive(Debug)]
    struct TwoHeads;

    impl RawModel for TwoHeads {
        fn forward(&self, session: &mut TracingSession, pixels: OutletId) -> ConvoyResult<Prediction> {
            let relu = session.wire_node("relu", Relu, &[pixels])?[0];
            Ok(Prediction::default().with("predicted_depth", relu).with("hidden_states", pixels))
        }
    }

    struct Registry;

    impl ModelRegistry for Registry {
        fn fetch(&self, identifier: &str) -> ConvoyResult<Box<dyn RawModel>> {
            match identifier {
                "two-heads" => Ok(Box::new(TwoHeads)),
                _ => bail!("No model named {identifier}"),
            }
        }
    }

    #[test]
    fn projects_depth_field() {
        let adapter = ModelAdapter::load(&Registry, "two-heads").unwrap();
        let tracer = Tracer::new(&[1, 3, 2, 2]);
        let trace = tracer.trace(&adapter, &Tensor::zero(&[1, 3, 2, 2]), &Default::default()).unwrap();
        assert_eq!(trace.output_outlets(), &[OutletId::new(1, 0)]);
        assert_eq!(trace.properties().get("model").map(|s| s.as_str()), Some("two-heads"));
    }

    #[test]
    fn missing_field() {
        let adapter = ModelAdapter::load_field(&Registry, "two-heads", "logits").unwrap();
        let tracer = Tracer::new(&[1, 3, 2, 2]);
        let err = tracer.trace(&adapter, &Tensor::zero(&[1, 3, 2, 2]), &Default::default()).unwrap_err();
        assert!(format!("{err:?}").contains("no logits output"));
    }

    #[test]
    fn unknown_identifier_is_a_load_error() {
        let err = ModelAdapter::load(&Registry, "nope").unwrap_err();
        assert!(matches!(err, ExportError::ModelLoad { ref identifier, .. } if identifier == "nope"));
    }
}
