//! Serializers for the operators packages support.
use crate::internal::*;
use crate::registry::Registry;
use crate::ser::*;
use convoy_core::ops::binary::Add;
use convoy_core::ops::change_axes::Squeeze;
use convoy_core::ops::conv::Conv;
use convoy_core::ops::element_wise::Relu;
use convoy_core::ops::resize::{Interpolator, Resize};

/// Everything the on-device runtime implements. Cubic resampling and grid
/// sampling are not part of it.
pub fn convoy_registry() -> Registry {
    let mut registry = Registry::new("convoy");
    registry.register_dumper(conv);
    registry.register_dumper(relu);
    registry.register_dumper(add);
    registry.register_dumper(squeeze);
    registry.register_dumper(resize);
    registry
}

pub fn conv(ast: &mut IntoAst, node: &TraceNode, op: &Conv) -> ConvoyResult<Option<Arc<RValue>>> {
    let input = ast.wire(node.inputs[0])?;
    let input = ast.force_assign(format!("{}_input", node.name), &input);
    let kernel = ast.konst_variable(format!("{}_kernel", node.name), &op.kernel);
    let mut inputs = tvec![input, kernel];
    if let Some(bias) = &op.bias {
        // bias is broadcast over N, H and W
        let bias = Tensor::from_shape(&[1, bias.len()], bias.as_slice()?)?.into_arc_tensor();
        inputs.push(ast.konst_variable(format!("{}_bias", node.name), &bias));
    }
    let padding = array(
        op.padding.iter().map(|&p| tuple_2(numeric(p), numeric(p))).collect::<Vec<_>>(),
    );
    Ok(Some(invocation(
        "conv",
        &inputs,
        &[
            ("border", string("constant")),
            ("padding", padding),
            ("stride", ints(&op.strides)),
            ("dilation", ints(&[1, 1])),
            ("groups", numeric(1)),
        ],
    )))
}

pub fn relu(ast: &mut IntoAst, node: &TraceNode, _op: &Relu) -> ConvoyResult<Option<Arc<RValue>>> {
    Ok(Some(invocation("relu", &[ast.wire(node.inputs[0])?], &[])))
}

pub fn add(ast: &mut IntoAst, node: &TraceNode, _op: &Add) -> ConvoyResult<Option<Arc<RValue>>> {
    let a = ast.wire(node.inputs[0])?;
    let b = ast.wire(node.inputs[1])?;
    Ok(Some(invocation("add", &[a, b], &[])))
}

pub fn squeeze(ast: &mut IntoAst, node: &TraceNode, op: &Squeeze) -> ConvoyResult<Option<Arc<RValue>>> {
    let wire = ast.wire(node.inputs[0])?;
    Ok(Some(invocation("squeeze", &[wire], &[("axes", ints(&[op.axis]))])))
}

pub fn resize(ast: &mut IntoAst, node: &TraceNode, op: &Resize) -> ConvoyResult<Option<Arc<RValue>>> {
    let method = match op.interpolator {
        Interpolator::Nearest => "nearest",
        Interpolator::Linear => "bilinear",
        Interpolator::Cubic => return Ok(None),
    };
    let wire = ast.wire(node.inputs[0])?;
    let mut named = vec![
        ("size", ints(&op.size)),
        ("method", string(method)),
        ("align_corners", logical(op.align_corners)),
        ("antialias", logical(op.antialias)),
    ];
    if let Some(dt) = op.dtype {
        named.push(("output_type", string(dt.to_string())));
    }
    Ok(Some(invocation("resize", &[wire], &named)))
}
