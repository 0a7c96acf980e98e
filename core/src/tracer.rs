//! Static tracing: running a model once and recording what it did.
use std::collections::HashSet;

use crate::dispatch::Dispatch;
use crate::internal::*;
use crate::model::Trace;
use crate::ops::source::Source;
use rand::SeedableRng;
use rand::rngs::SmallRng;
use rand_distr::{Distribution, StandardNormal};

/// Runs models on a fixed-shape sample input and records their operators.
#[derive(Clone, Debug)]
pub struct Tracer {
    input_name: String,
    input_shape: TVec<usize>,
}

impl Tracer {
    pub fn new(input_shape: &[usize]) -> Tracer {
        Tracer { input_name: "pixel_values".to_string(), input_shape: input_shape.into() }
    }

    pub fn with_input_name(self, input_name: impl Into<String>) -> Tracer {
        Tracer { input_name: input_name.into(), ..self }
    }

    pub fn input_shape(&self) -> &[usize] {
        &self.input_shape
    }

    /// A standard normal sample of the input shape. Same seed, same sample.
    pub fn sample_input(&self, seed: u64) -> ConvoyResult<Tensor> {
        let mut rng = SmallRng::seed_from_u64(seed);
        let volume = self.input_shape.iter().product::<usize>();
        let data: Vec<f32> = (0..volume).map(|_| StandardNormal.sample(&mut rng)).collect();
        Tensor::from_shape(&self.input_shape, &data)
    }

    /// Runs `model` once on `sample`, resolving every op through `dispatch`.
    ///
    /// The trace reflects the operators that actually ran: with an override
    /// active in the dispatch, substituted ops are recorded, not the ones the
    /// model asked for.
    pub fn trace(&self, model: &dyn Model, sample: &Tensor, dispatch: &Dispatch) -> ConvoyResult<Trace> {
        ensure!(
            sample.shape() == &*self.input_shape,
            "Tracer expects a sample of shape {:?}, got {:?}",
            self.input_shape,
            sample.shape()
        );
        let mut session = TracingSession::new(dispatch);
        let input = session.add_source(&self.input_name, sample.clone());
        let output = model
            .forward(&mut session, input)
            .with_context(|| format!("Tracing {}", model.name()))?;
        session.value(output)?;
        let mut trace = session.into_trace(vec![input], vec![output]);
        trace.properties.insert("model".to_string(), model.name().into_owned());
        debug!("Traced {} nodes for {}", trace.nodes().len(), model.name());
        Ok(trace)
    }
}

/// A trace under construction. Models wire their operators in it; each op is
/// evaluated as soon as it is wired.
#[derive(Debug)]
pub struct TracingSession<'d> {
    dispatch: &'d Dispatch,
    trace: Trace,
    values: Vec<TVec<Arc<Tensor>>>,
    names: HashSet<String>,
}

impl<'d> TracingSession<'d> {
    fn new(dispatch: &'d Dispatch) -> TracingSession<'d> {
        TracingSession {
            dispatch,
            trace: Trace { overrides: dispatch.active().cloned(), ..Trace::default() },
            values: vec![],
            names: HashSet::new(),
        }
    }

    fn add_source(&mut self, name: &str, value: Tensor) -> OutletId {
        let fact = OutletFact::for_tensor(&value);
        let name = self.unique_name(name);
        let id = self.push_node(name, Box::new(Source::new(fact.clone())), vec![], tvec!(fact));
        self.values.push(tvec!(value.into_arc_tensor()));
        OutletId::new(id, 0)
    }

    fn push_node(
        &mut self,
        name: String,
        op: Box<dyn Op>,
        inputs: Vec<OutletId>,
        outputs: TVec<OutletFact>,
    ) -> usize {
        let id = self.trace.nodes.len();
        self.names.insert(name.clone());
        self.trace.nodes.push(TraceNode { id, name, inputs, op, outputs });
        id
    }

    /// `name` if unused in the trace, `name.1`, `name.2`... otherwise.
    pub fn unique_name(&self, name: &str) -> String {
        let mut candidate = name.to_string();
        let mut i = 0;
        while self.names.contains(&candidate) {
            i += 1;
            candidate = format!("{name}.{i}");
        }
        candidate
    }

    /// Wires `op` on `inputs`: resolves it through the dispatch, evaluates it
    /// and records it.
    pub fn wire_node(
        &mut self,
        name: impl Into<String>,
        op: impl Into<Box<dyn Op>>,
        inputs: &[OutletId],
    ) -> ConvoyResult<TVec<OutletId>> {
        let name = self.unique_name(&name.into());
        let op = self.dispatch.resolve(op.into())?;
        let values = inputs.iter().map(|&i| self.value(i)).collect::<ConvoyResult<TVec<_>>>()?;
        let outputs = op.eval(values).with_context(|| format!("Evaluating {} ({})", name, op.name()))?;
        let facts: TVec<OutletFact> = outputs.iter().map(|t| OutletFact::for_tensor(t)).collect();
        trace!("Wired {:?} {} {:?}", name, op.name(), facts);
        let slots = outputs.len();
        let id = self.push_node(name, op, inputs.to_vec(), facts);
        self.values.push(outputs);
        Ok((0..slots).map(|slot| OutletId::new(id, slot)).collect())
    }

    /// Value computed for `outlet` while tracing.
    pub fn value(&self, outlet: OutletId) -> ConvoyResult<Arc<Tensor>> {
        self.values
            .get(outlet.node)
            .and_then(|v| v.get(outlet.slot))
            .cloned()
            .ok_or_else(|| format_err!("Invalid outlet reference: {:?}", outlet))
    }

    pub fn outlet_fact(&self, outlet: OutletId) -> ConvoyResult<&OutletFact> {
        self.trace.outlet_fact(outlet)
    }

    fn into_trace(self, inputs: Vec<OutletId>, outputs: Vec<OutletId>) -> Trace {
        Trace { inputs, outputs, ..self.trace }
    }
}
