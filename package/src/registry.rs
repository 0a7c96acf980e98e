use std::any::TypeId;

use crate::internal::*;
use crate::ser::IntoAst;

pub type ToPackage =
    Box<dyn Fn(&mut IntoAst, &TraceNode) -> ConvoyResult<Option<Arc<RValue>>> + Send + Sync>;
pub type ToPackageWithOp<O> =
    fn(&mut IntoAst, node: &TraceNode, op: &O) -> ConvoyResult<Option<Arc<RValue>>>;

/// Serializers for the operators a package can express, keyed by op type.
///
/// A serializer may decline a node it can not express (by returning
/// `Ok(None)`), for instance an op variant the on-device runtime lacks.
pub struct Registry {
    pub id: String,
    pub to_package: HashMap<TypeId, ToPackage>,
}

impl Registry {
    pub fn new(id: impl AsRef<str>) -> Registry {
        Registry { id: id.as_ref().to_string(), to_package: Default::default() }
    }

    pub fn register_dumper<O: Op>(&mut self, dumper: ToPackageWithOp<O>) {
        self.to_package.insert(
            TypeId::of::<O>(),
            Box::new(move |ast: &mut IntoAst, node: &TraceNode| match node.op_as::<O>() {
                Some(op) => dumper(ast, node, op),
                None => Ok(None),
            }),
        );
    }

    pub fn handles<O: Op>(&self) -> bool {
        self.to_package.contains_key(&TypeId::of::<O>())
    }

    pub fn serialize(&self, ast: &mut IntoAst, node: &TraceNode) -> ConvoyResult<Option<Arc<RValue>>> {
        let Some(dumper) = self.to_package.get(&node.op().as_any().type_id()) else {
            debug!("No serializer for {node}");
            return Ok(None);
        };
        let rvalue = dumper(ast, node).with_context(|| format!("Serializing {node}"))?;
        if rvalue.is_none() {
            debug!("Serializer declined {node}");
        }
        Ok(rvalue)
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Registry({}, {} serializers)", self.id, self.to_package.len())
    }
}
