use crate::internal::*;
use std::fmt;

/// A node of a trace: one recorded operator invocation.
#[derive(Debug, Clone)]
pub struct TraceNode {
    pub id: usize,
    pub name: String,
    pub inputs: Vec<OutletId>,
    pub op: Box<dyn Op>,
    pub outputs: TVec<OutletFact>,
}

impl TraceNode {
    pub fn op(&self) -> &dyn Op {
        &*self.op
    }

    pub fn op_as<O: Op>(&self) -> Option<&O> {
        self.op().downcast_ref::<O>()
    }

    pub fn op_is<O: Op>(&self) -> bool {
        self.op_as::<O>().is_some()
    }

    pub fn same_as(&self, other: &TraceNode) -> bool {
        self.inputs == other.inputs
            && self.outputs == other.outputs
            && self.op.same_as(other.op.as_ref())
    }
}

impl fmt::Display for TraceNode {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        write!(fmt, "#{} \"{}\" {}", self.id, self.name, self.op.name())
    }
}

/// Shape and datum type of a node output, as observed while tracing.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct OutletFact {
    pub datum_type: DatumType,
    pub shape: TVec<usize>,
}

impl OutletFact {
    pub fn new(datum_type: DatumType, shape: &[usize]) -> OutletFact {
        OutletFact { datum_type, shape: shape.into() }
    }

    pub fn for_tensor(t: &Tensor) -> OutletFact {
        OutletFact::new(t.datum_type(), t.shape())
    }

    pub fn rank(&self) -> usize {
        self.shape.len()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OutletId {
    pub node: usize,
    pub slot: usize,
}

impl OutletId {
    pub fn new(node: usize, slot: usize) -> OutletId {
        OutletId { node, slot }
    }
}

impl fmt::Display for OutletId {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        write!(fmt, "{}/{}", self.node, self.slot)
    }
}

impl From<usize> for OutletId {
    fn from(node: usize) -> OutletId {
        OutletId::new(node, 0)
    }
}

impl From<(usize, usize)> for OutletId {
    fn from(pair: (usize, usize)) -> OutletId {
        OutletId::new(pair.0, pair.1)
    }
}
