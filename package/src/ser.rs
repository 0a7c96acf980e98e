use std::collections::HashSet;

use crate::ast::*;
use crate::internal::*;
use crate::registry::Registry;
use convoy_core::lowering::LoweringFailure;
use convoy_core::target::TargetSpec;
use itertools::Itertools;

/// Translates `trace` to a package graph.
pub fn to_proto_package(
    registry: &Registry,
    trace: &Trace,
    spec: &TargetSpec,
) -> Result<ProtoPackage, LoweringFailure> {
    let mut into_ast = IntoAst::new(registry, trace, spec);
    into_ast.translate()?;
    Ok(into_ast.into_proto_package())
}

pub struct IntoAst<'a> {
    pub registry: &'a Registry,
    pub trace: &'a Trace,
    pub spec: &'a TargetSpec,
    pub parameters: Vec<String>,
    pub results: Vec<String>,
    pub mapping: HashMap<OutletId, Arc<RValue>>,
    pub tensors: Vec<(String, Arc<Tensor>)>,
    pub body: Vec<Assignment>,
    identifiers: HashSet<String>,
}

impl<'a> IntoAst<'a> {
    pub fn new(registry: &'a Registry, trace: &'a Trace, spec: &'a TargetSpec) -> IntoAst<'a> {
        IntoAst {
            registry,
            trace,
            spec,
            parameters: Default::default(),
            results: Default::default(),
            mapping: Default::default(),
            tensors: Default::default(),
            body: Default::default(),
            identifiers: Default::default(),
        }
    }

    fn translate(&mut self) -> Result<(), LoweringFailure> {
        let trace = self.trace;
        let (&[input], &[output]) = (trace.input_outlets(), trace.output_outlets()) else {
            return Err(format_err!(
                "Package graphs have one image input and one output, trace has {} inputs and {} outputs",
                trace.input_outlets().len(),
                trace.output_outlets().len()
            )
            .into());
        };
        self.input_layer(input)?;
        for node in trace.nodes() {
            if node.id == input.node {
                continue;
            }
            self.node(node)?;
        }
        let output = self.wire(output)?;
        let output = self.force_assign("output", &output);
        if let RValue::Identifier(name) = output.as_ref() {
            self.results.push(name.clone());
        }
        Ok(())
    }

    /// The external image input, followed by the normalization.
    fn input_layer(&mut self, input: OutletId) -> ConvoyResult<()> {
        let (trace, spec) = (self.trace, self.spec);
        let fact = trace.outlet_fact(input)?;
        let image = &spec.input;
        ensure!(
            &*fact.shape == image.shape,
            "Traced input has shape {:?}, target image input {} is {:?}",
            fact.shape,
            image.name,
            image.shape
        );
        let name = self.scoped_id(&image.name);
        self.parameters.push(name.clone());
        self.assignment(&name, invocation("external", &[], &[("shape", ints(&image.shape))]));
        let scaled = invocation("mul", &[ident(&name).into()], &[("y", numeric(image.scale))]);
        let scaled = self.force_assign(format!("{name}_scaled"), &scaled);
        let bias = Tensor::from_shape(&[1, 3, 1, 1], &image.bias)?.into_arc_tensor();
        let bias = self.konst_variable(format!("{name}_bias"), &bias);
        let normalized = invocation("add", &[scaled, bias], &[]);
        let normalized = self.force_assign(format!("{name}_normalized"), &normalized);
        self.mapping.insert(input, normalized);
        Ok(())
    }

    fn node(&mut self, node: &TraceNode) -> Result<(), LoweringFailure> {
        let registry = self.registry;
        let Some(rvalue) = registry.serialize(self, node)? else {
            return Err(LoweringFailure::unsupported(node.op.id(), node.name.clone()));
        };
        let mut names = Vec::with_capacity(node.outputs.len());
        for ix in 0..node.outputs.len() {
            let name = if ix > 0 { format!("{}_{ix}", node.name) } else { node.name.clone() };
            names.push(self.scoped_id(name));
        }
        if names.len() > 1 {
            self.body.push(Assignment {
                left: LValue::Tuple(names.iter().map(|n| LValue::Identifier(n.clone())).collect()),
                right: rvalue.as_ref().clone(),
            });
        } else {
            self.assignment(&names[0], rvalue);
        }
        for (slot, name) in names.into_iter().enumerate() {
            self.mapping.insert(OutletId::new(node.id, slot), ident(name).into());
        }
        Ok(())
    }

    /// Expression for an already translated outlet.
    pub fn wire(&self, outlet: OutletId) -> ConvoyResult<Arc<RValue>> {
        self.mapping
            .get(&outlet)
            .cloned()
            .ok_or_else(|| format_err!("Outlet {} is used before being translated", outlet))
    }

    pub fn into_proto_package(self) -> ProtoPackage {
        let IntoAst { body, tensors, parameters, results, registry, .. } = self;
        let doc = Document {
            version: "1.0".into(),
            extensions: vec![vec!["convoy_registry".to_string(), registry.id.clone()]],
            graph_def: GraphDef { id: "network".into(), parameters, results, body },
        };
        ProtoPackage { doc, tensors }
    }

    /// A fresh identifier for `name`. Distinct trace names may sanitize to
    /// the same identifier (`a.1` and `a_1`), so taken ones get a suffix.
    pub fn scoped_id(&mut self, name: impl Into<String>) -> String {
        let base = Self::sanitize(name);
        let mut candidate = base.clone();
        let mut i = 0;
        while self.identifiers.contains(&candidate) {
            i += 1;
            candidate = format!("{base}_{i}");
        }
        self.identifiers.insert(candidate.clone());
        candidate
    }

    pub fn sanitize(name: impl Into<String>) -> String {
        let mut name = name.into();
        if !name.chars().next().is_some_and(char::is_alphabetic) {
            name = "_".to_string() + &name;
        }
        name.replace(['/', '.', '-', ':'], "_")
    }

    pub fn force_assign(&mut self, name: impl Into<String>, exp: &Arc<RValue>) -> Arc<RValue> {
        if let RValue::Identifier(_) = exp.as_ref() {
            exp.clone()
        } else {
            let name = self.scoped_id(name);
            self.assignment(name.clone(), exp.clone());
            ident(name).into()
        }
    }

    /// Stores `tensor` in the package, and refers to it by label.
    pub fn konst_variable(&mut self, name: impl Into<String>, tensor: &Arc<Tensor>) -> Arc<RValue> {
        let name = name.into();
        let label = self.scoped_id(&name);
        self.tensors.push((label.clone(), tensor.clone()));
        self.assignment(
            &label,
            RValue::Invocation(Invocation {
                id: "variable".to_string(),
                generic_type_name: Some(TypeName::Scalar),
                arguments: vec![
                    named_arg("label", string(&label)),
                    named_arg("shape", ints(tensor.shape())),
                ],
            })
            .into(),
        );
        ident(label).into()
    }

    fn assignment(&mut self, name: impl Into<String>, right: Arc<RValue>) {
        let name = name.into();
        if *right == ident(&name) {
            return;
        }
        self.body.push(assignment(&name, right))
    }

    /// Labels of the stored tensors, sorted.
    pub fn tensor_labels(&self) -> Vec<&str> {
        self.tensors.iter().map(|(label, _)| label.as_str()).sorted().collect()
    }
}

pub fn assignment(name: impl Into<String>, right: Arc<RValue>) -> Assignment {
    Assignment { left: LValue::Identifier(name.into()), right: right.as_ref().to_owned() }
}

pub fn ints(shape: &[usize]) -> RValue {
    RValue::Array(shape.iter().map(|s| RValue::Literal(Literal::Numeric(s.to_string()))).collect())
}

pub fn string(s: impl Into<String>) -> RValue {
    RValue::Literal(Literal::String(s.into()))
}

pub fn logical(b: bool) -> RValue {
    RValue::Literal(Literal::Logical(b))
}

pub fn ident(s: impl Into<String>) -> RValue {
    RValue::Identifier(s.into())
}

pub fn array(items: impl AsRef<[RValue]>) -> RValue {
    RValue::Array(items.as_ref().to_vec())
}

pub fn tuple_2(a: RValue, b: RValue) -> RValue {
    RValue::Tuple(vec![a, b])
}

pub fn numeric<D: std::fmt::Debug>(num: D) -> RValue {
    RValue::Literal(Literal::Numeric(format!("{num:?}")))
}

pub fn named_arg(id: &str, rv: RValue) -> Argument {
    Argument { id: Some(id.into()), rvalue: rv }
}

pub fn invocation(id: &str, positional: &[Arc<RValue>], named: &[(&str, RValue)]) -> Arc<RValue> {
    let arguments = positional
        .iter()
        .map(|rv| Argument { id: None, rvalue: rv.as_ref().clone() })
        .chain(named.iter().map(|(n, v)| named_arg(n, v.clone())))
        .collect();
    RValue::Invocation(Invocation { id: id.to_owned(), generic_type_name: None, arguments }).into()
}
