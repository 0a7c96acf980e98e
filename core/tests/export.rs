use std::cell::{Cell, RefCell};

use convoy_core::internal::*;
use convoy_core::model::Trace;
use convoy_core::ops::element_wise::Relu;
use convoy_core::ops::resize::{Interpolator, Resize};
use proptest::prelude::*;

/// Relu then bicubic upsampling.
#[derive(Debug)]
struct Upsampler {
    size: [usize; 2],
}

impl Model for Upsampler {
    fn name(&self) -> Cow<'_, str> {
        "upsampler".into()
    }

    fn forward(&self, session: &mut TracingSession, input: OutletId) -> ConvoyResult<OutletId> {
        let act = session.wire_node("act", Relu, &[input])?[0];
        let up = Resize::new(Interpolator::Cubic, self.size, true, false, None);
        let up = session.wire_node("up", up, &[act])?[0];
        Ok(up)
    }
}

#[derive(Debug)]
struct Identity;

impl Model for Identity {
    fn forward(&self, _session: &mut TracingSession, input: OutletId) -> ConvoyResult<OutletId> {
        Ok(input)
    }
}

/// Returns its answers in order, recording every trace it is given.
struct Scripted {
    answers: RefCell<Vec<Result<&'static str, LoweringFailure>>>,
    calls: Cell<usize>,
    seen: RefCell<Vec<Trace>>,
}

impl Scripted {
    fn new(answers: Vec<Result<&'static str, LoweringFailure>>) -> Scripted {
        Scripted { answers: RefCell::new(answers), calls: Cell::new(0), seen: RefCell::new(vec![]) }
    }

    fn always_unsupported(operator: &'static str) -> Scripted {
        Scripted::new(
            (0..8).map(|_| Err(LoweringFailure::unsupported(operator, "node"))).collect(),
        )
    }
}

impl Lowering for Scripted {
    type Artifact = &'static str;

    fn lower(&self, trace: &Trace, _spec: &TargetSpec) -> Result<&'static str, LoweringFailure> {
        self.calls.set(self.calls.get() + 1);
        self.seen.borrow_mut().push(trace.clone());
        self.answers.borrow_mut().remove(0)
    }
}

fn spec(size: usize) -> TargetSpec {
    TargetSpec::new(ImageInput::imagenet("image", size, size), PlatformVersion::ios(16))
}

fn exporter(lowering: &Scripted, size: usize) -> Exporter<&Scripted> {
    Exporter::new(Tracer::new(&[1, 3, size, size]), lowering, spec(size))
}

#[test]
fn identity_lowers_first_time() {
    let lowering = Scripted::new(vec![Ok("first")]);
    let exporter = Exporter::new(Tracer::new(&[1, 3, 518, 518]), &lowering, spec(518));
    let mut dispatch = Dispatch::default();
    let exported = exporter.export(&Identity, &mut dispatch).unwrap();
    assert_eq!(exported.artifact, "first");
    assert_eq!(exported.report, ExportReport { traces: 1, lowering_attempts: 1, fallback_applied: false });
    assert_eq!(dispatch.activations(), 0);
    assert!(exported.trace.same_as(&lowering.seen.borrow()[0]));
}

#[test]
fn success_never_activates_overrides() {
    let lowering = Scripted::new(vec![Ok("first")]);
    let mut dispatch = Dispatch::default();
    let exported = exporter(&lowering, 4).export(&Upsampler { size: [8, 8] }, &mut dispatch).unwrap();
    assert_eq!(exported.report.traces, 1);
    assert_eq!(lowering.calls.get(), 1);
    assert_eq!(dispatch.activations(), 0);
    assert!(exported.trace.uses(&"bicubic_resize".into()));
}

#[test]
fn bicubic_rejection_retraces_under_override() {
    let lowering = Scripted::new(vec![
        Err(LoweringFailure::unsupported("bicubic_resize", "up")),
        Ok("second"),
    ]);
    let mut dispatch = Dispatch::default();
    let exported = exporter(&lowering, 4).export(&Upsampler { size: [8, 8] }, &mut dispatch).unwrap();

    assert_eq!(exported.artifact, "second");
    assert_eq!(exported.report, ExportReport { traces: 2, lowering_attempts: 2, fallback_applied: true });
    assert_eq!(dispatch.activations(), 1);
    assert!(!dispatch.is_active());

    let seen = lowering.seen.borrow();
    assert!(seen[0].applied_overrides().is_none());
    assert!(seen[0].uses(&"bicubic_resize".into()));
    assert_eq!(seen[1].applied_overrides(), Some(&OverrideSet::bicubic_to_bilinear()));
    assert!(!seen[1].uses(&"bicubic_resize".into()));
    assert!(seen[1].uses(&"bilinear_resize".into()));
    assert!(exported.trace.same_as(&seen[1]));
}

#[test]
fn fallback_retries_exactly_once() {
    let lowering = Scripted::always_unsupported("bicubic_resize");
    let mut dispatch = Dispatch::default();
    let err = exporter(&lowering, 4).export(&Upsampler { size: [8, 8] }, &mut dispatch).unwrap_err();
    assert_eq!(lowering.calls.get(), 2);
    assert_eq!(dispatch.activations(), 1);
    assert!(!dispatch.is_active());
    assert_eq!(err.unsupported_operator(), Some(&OpId::from("bicubic_resize")));
}

#[test]
fn unrelated_operator_propagates() {
    let lowering = Scripted::always_unsupported("grid_sample");
    let mut dispatch = Dispatch::default();
    let err = exporter(&lowering, 4).export(&Upsampler { size: [8, 8] }, &mut dispatch).unwrap_err();
    assert!(matches!(
        err,
        ExportError::UnsupportedOperator { ref operator, ref node } if operator == "grid_sample" && node == "node"
    ));
    assert_eq!(lowering.calls.get(), 1);
    assert_eq!(lowering.seen.borrow().len(), 1);
    assert_eq!(dispatch.activations(), 0);
}

#[test]
fn conversion_failure_propagates() {
    let lowering = Scripted::new(vec![Err(format_err!("malformed shapes").into())]);
    let mut dispatch = Dispatch::default();
    let err = exporter(&lowering, 4).export(&Upsampler { size: [8, 8] }, &mut dispatch).unwrap_err();
    assert!(matches!(err, ExportError::Conversion(_)));
    assert_eq!(dispatch.activations(), 0);
}

#[test]
fn second_failure_is_final_even_if_different() {
    let lowering = Scripted::new(vec![
        Err(LoweringFailure::unsupported("bicubic_resize", "up")),
        Err(LoweringFailure::unsupported("grid_sample", "warp")),
    ]);
    let mut dispatch = Dispatch::default();
    let err = exporter(&lowering, 4).export(&Upsampler { size: [8, 8] }, &mut dispatch).unwrap_err();
    assert_eq!(err.unsupported_operator(), Some(&OpId::from("grid_sample")));
    assert_eq!(lowering.calls.get(), 2);
}

#[test]
fn trace_failure_is_not_retried() {
    #[derive(Debug)]
    struct Broken;
    impl Model for Broken {
        fn forward(&self, session: &mut TracingSession, input: OutletId) -> ConvoyResult<OutletId> {
            let down = Resize::new(Interpolator::Linear, [1, 1], false, true, None);
            Ok(session.wire_node("down", down, &[input])?[0])
        }
    }
    let lowering = Scripted::new(vec![]);
    let mut dispatch = Dispatch::default();
    let err = exporter(&lowering, 2).export(&Broken, &mut dispatch).unwrap_err();
    assert!(matches!(err, ExportError::Trace(_)));
    assert_eq!(lowering.calls.get(), 0);
}

#[test]
fn tracing_is_deterministic() {
    let tracer = Tracer::new(&[1, 3, 5, 5]);
    let sample = tracer.sample_input(7).unwrap();
    let dispatch = Dispatch::default();
    let model = Upsampler { size: [9, 9] };
    let a = tracer.trace(&model, &sample, &dispatch).unwrap();
    let b = tracer.trace(&model, &sample, &dispatch).unwrap();
    assert!(a.same_as(&b));
    assert_eq!(a.signature().unwrap(), b.signature().unwrap());
    a.run(tvec!(sample.clone())).unwrap()[0]
        .close_enough(&b.run(tvec!(sample)).unwrap()[0], 0.0)
        .unwrap();
}

#[test]
fn override_forwards_parameters() {
    let tracer = Tracer::new(&[1, 3, 5, 5]);
    let sample = tracer.sample_input(0).unwrap();
    let mut dispatch = Dispatch::default();
    let model = Upsampler { size: [11, 7] };
    let original = tracer.trace(&model, &sample, &dispatch).unwrap();
    let substituted = {
        let scoped = dispatch.activate(OverrideSet::bicubic_to_bilinear());
        tracer.trace(&model, &sample, &scoped).unwrap()
    };
    let (original, substituted) = (original.signature().unwrap(), substituted.signature().unwrap());
    assert_eq!(original.len(), substituted.len());
    for ((op_a, params_a), (op_b, params_b)) in original.iter().zip(substituted.iter()) {
        if op_a == "bicubic_resize" {
            assert_eq!(op_b, "bilinear_resize");
        } else {
            assert_eq!(op_a, op_b);
        }
        assert_eq!(params_a, params_b);
    }
}

proptest! {
    #[test]
    fn overrides_never_leak_out_of_scope(scopes in proptest::collection::vec(any::<bool>(), 0..12)) {
        let tracer = Tracer::new(&[1, 1, 2, 2]);
        let sample = tracer.sample_input(1).unwrap();
        let model = Upsampler { size: [3, 3] };
        let mut dispatch = Dispatch::default();
        for &scoped in &scopes {
            if scoped {
                let scoped = dispatch.activate(OverrideSet::bicubic_to_bilinear());
                let trace = tracer.trace(&model, &sample, &scoped).unwrap();
                prop_assert!(trace.uses(&"bilinear_resize".into()));
            }
            prop_assert!(!dispatch.is_active());
            let trace = tracer.trace(&model, &sample, &dispatch).unwrap();
            prop_assert!(trace.uses(&"bicubic_resize".into()));
            prop_assert!(!trace.uses(&"bilinear_resize".into()));
        }
        prop_assert_eq!(dispatch.activations(), scopes.iter().filter(|s| **s).count());
    }
}
