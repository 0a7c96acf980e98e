//! The trace: an immutable record of the operators a model ran.
use std::collections::BTreeMap;
use std::fmt;

use crate::dispatch::OverrideSet;
use crate::internal::*;
use crate::ops::source::Source;
use itertools::Itertools;

mod node;

pub use node::{OutletFact, OutletId, TraceNode};

/// Immutable snapshot of the operators a model invoked on one sample input.
///
/// Nodes are stored in execution order. A trace only comes out of a
/// [`Tracer`](crate::tracer::Tracer) and is never modified afterwards: a new
/// trace is produced for every conversion attempt.
#[derive(Clone, Debug, Default)]
pub struct Trace {
    pub(crate) nodes: Vec<TraceNode>,
    pub(crate) inputs: Vec<OutletId>,
    pub(crate) outputs: Vec<OutletId>,
    pub(crate) properties: BTreeMap<String, String>,
    pub(crate) overrides: Option<OverrideSet>,
}

impl Trace {
    pub fn nodes(&self) -> &[TraceNode] {
        &self.nodes
    }

    pub fn node(&self, id: usize) -> &TraceNode {
        &self.nodes[id]
    }

    pub fn input_outlets(&self) -> &[OutletId] {
        &self.inputs
    }

    pub fn output_outlets(&self) -> &[OutletId] {
        &self.outputs
    }

    pub fn outlet_fact(&self, outlet: OutletId) -> ConvoyResult<&OutletFact> {
        self.nodes
            .get(outlet.node)
            .and_then(|node| node.outputs.get(outlet.slot))
            .ok_or_else(|| format_err!("Invalid outlet reference: {:?}", outlet))
    }

    pub fn output_fact(&self, ix: usize) -> ConvoyResult<&OutletFact> {
        let outlet = self.outputs.get(ix).ok_or_else(|| format_err!("No output #{}", ix))?;
        self.outlet_fact(*outlet)
    }

    pub fn properties(&self) -> &BTreeMap<String, String> {
        &self.properties
    }

    /// Overrides that were active in the dispatch while this trace was built.
    pub fn applied_overrides(&self) -> Option<&OverrideSet> {
        self.overrides.as_ref()
    }

    /// True if some node runs the `op` primitive.
    pub fn uses(&self, op: &OpId) -> bool {
        self.nodes.iter().any(|n| n.op.name() == op.as_str())
    }

    /// The (operator identifier, parameters) sequence of the trace.
    pub fn signature(&self) -> ConvoyResult<Vec<(OpId, Vec<String>)>> {
        self.nodes.iter().map(|n| Ok((n.op.id(), n.op.info()?))).collect()
    }

    /// Structural comparison: same operators, parameters and wiring.
    pub fn same_as(&self, other: &Trace) -> bool {
        self.inputs == other.inputs
            && self.outputs == other.outputs
            && self.nodes.len() == other.nodes.len()
            && self.nodes.iter().zip(other.nodes.iter()).all(|(a, b)| a.same_as(b))
    }

    /// Replays the recorded computation on new inputs.
    pub fn run(&self, inputs: TVec<Tensor>) -> ConvoyResult<TVec<Arc<Tensor>>> {
        ensure!(
            inputs.len() == self.inputs.len(),
            "Trace expects {} inputs, got {}",
            self.inputs.len(),
            inputs.len()
        );
        let mut values: Vec<Option<TVec<Arc<Tensor>>>> = vec![None; self.nodes.len()];
        for (outlet, input) in self.inputs.iter().zip(inputs) {
            let fact = self.outlet_fact(*outlet)?;
            ensure!(
                &*fact.shape == input.shape(),
                "Input {} expects shape {:?}, got {:?}",
                self.nodes[outlet.node].name,
                fact.shape,
                input.shape()
            );
            values[outlet.node] = Some(tvec!(input.into_arc_tensor()));
        }
        for node in &self.nodes {
            if node.op_is::<Source>() {
                continue;
            }
            let inputs = node
                .inputs
                .iter()
                .map(|i| {
                    values[i.node]
                        .as_ref()
                        .and_then(|v| v.get(i.slot))
                        .cloned()
                        .ok_or_else(|| format_err!("Missing value for {} in {}", i, node))
                })
                .collect::<ConvoyResult<TVec<_>>>()?;
            let outputs = node.op.eval(inputs).with_context(|| format!("Evaluating {node}"))?;
            values[node.id] = Some(outputs);
        }
        self.outputs
            .iter()
            .map(|o| {
                values[o.node]
                    .as_ref()
                    .and_then(|v| v.get(o.slot))
                    .cloned()
                    .ok_or_else(|| format_err!("Missing value for output {}", o))
            })
            .collect()
    }
}

impl fmt::Display for Trace {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        for node in &self.nodes {
            let inputs = node.inputs.iter().map(|i| i.to_string()).join(", ");
            let facts = node.outputs.iter().map(|f| format!("{:?}", f.shape)).join(", ");
            writeln!(fmt, "{node} [{inputs}] -> {facts}")?;
        }
        Ok(())
    }
}
