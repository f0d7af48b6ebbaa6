mod common;

use common::{BACKENDS, expect_output, start, v};
use derivo::{
    EvalError, Model, PathError, RuntimeError, Value, arg0, arg1, root, setter, splice,
};
use serde_json::json;

fn tapped_model() -> Model {
    Model::new()
        .with("doubled", root().get("items").map(|n, _| n.mult(2).call("tap")))
        .with("ratio", root().get("a").div(root().get("b")))
        .with("setItem", setter(&["items".into(), arg0()]))
        .with("set", setter(&[arg0()]))
        .with("setIn", setter(&[arg0(), arg1()]))
        .with("spliceItems", splice(&["items".into()]))
}

fn data() -> serde_json::Value {
    json!({"items": [1, 2, 3], "a": 6, "b": 3})
}

#[test]
fn test_batch_defers_recompute() {
    for backend in BACKENDS {
        let (mut inst, taps) = start(&tapped_model(), data(), backend);
        taps.take();

        inst.start_batch().unwrap();
        assert!(inst.is_batching());
        inst.set("setItem", &[Value::Integer(0), Value::Integer(10)]).unwrap();
        inst.set("setItem", &[Value::Integer(0), Value::Integer(20)]).unwrap();
        inst.set("setItem", &[Value::Integer(2), Value::Integer(30)]).unwrap();
        expect_output(&inst, "doubled", json!([2, 4, 6]));
        assert_eq!(inst.model(), &v(json!({"items": [20, 2, 30], "a": 6, "b": 3})));
        taps.expect(0, backend);

        inst.end_batch().unwrap();
        assert!(!inst.is_batching());
        expect_output(&inst, "doubled", json!([40, 4, 60]));
        taps.expect(2, backend);
    }
}

#[test]
fn test_batch_restoring_values_fires_nothing() {
    for backend in BACKENDS {
        let (mut inst, taps) = start(&tapped_model(), data(), backend);
        taps.take();

        inst.batch(|inst| {
            inst.set("setItem", &[Value::Integer(1), Value::Integer(99)])?;
            inst.set("setItem", &[Value::Integer(1), Value::Integer(2)])
        })
        .unwrap();
        expect_output(&inst, "doubled", json!([2, 4, 6]));
        taps.expect(0, backend);
    }
}

#[test]
fn test_nested_batches_are_rejected() {
    for backend in BACKENDS {
        let (mut inst, _) = start(&tapped_model(), data(), backend);
        assert_eq!(inst.end_batch(), Err(RuntimeError::NoBatchInProgress));
        inst.start_batch().unwrap();
        assert_eq!(inst.start_batch(), Err(RuntimeError::BatchInProgress));
        let nested = inst.batch(|_| Ok(()));
        assert_eq!(nested, Err(RuntimeError::BatchInProgress));
        assert!(inst.is_batching());
        inst.end_batch().unwrap();
    }
}

#[test]
fn test_failed_batch_closure_discards_its_mutations() {
    for backend in BACKENDS {
        let (mut inst, _) = start(&tapped_model(), data(), backend);
        let result = inst.batch(|inst| {
            inst.set("setItem", &[Value::Integer(0), Value::Integer(100)])?;
            inst.set("nope", &[Value::Integer(1)])
        });
        assert_eq!(result, Err(RuntimeError::UnknownMutator("nope".to_string())));
        assert!(!inst.is_batching());
        assert_eq!(inst.model(), &v(data()));
        expect_output(&inst, "doubled", json!([2, 4, 6]));
    }
}

#[test]
fn test_evaluation_failure_rolls_back() {
    for backend in BACKENDS {
        let (mut inst, _) = start(&tapped_model(), data(), backend);
        expect_output(&inst, "ratio", json!(2));

        let err = inst.set("set", &[Value::from("b"), Value::Integer(0)]).unwrap_err();
        assert_eq!(err, RuntimeError::Eval(EvalError::DivisionByZero));
        assert_eq!(inst.model(), &v(data()));
        expect_output(&inst, "ratio", json!(2));

        // the instance keeps working after a rollback
        inst.set("set", &[Value::from("b"), Value::Integer(4)]).unwrap();
        expect_output(&inst, "ratio", json!(1.5));
    }
}

#[test]
fn test_failed_batch_rolls_back_to_its_start() {
    for backend in BACKENDS {
        let (mut inst, _) = start(&tapped_model(), data(), backend);
        inst.start_batch().unwrap();
        inst.set("set", &[Value::from("a"), Value::Integer(9)]).unwrap();
        inst.set("set", &[Value::from("b"), Value::Integer(0)]).unwrap();
        let err = inst.end_batch().unwrap_err();
        assert_eq!(err, RuntimeError::Eval(EvalError::DivisionByZero));
        assert!(!inst.is_batching());
        assert_eq!(inst.model(), &v(data()));
        expect_output(&inst, "ratio", json!(2));
    }
}

#[test]
fn test_unresolvable_paths_are_atomic() {
    for backend in BACKENDS {
        let (mut inst, _) = start(&tapped_model(), data(), backend);
        let err = inst
            .set("setIn", &[Value::from("missing"), Value::from("x"), Value::Integer(1)])
            .unwrap_err();
        assert!(matches!(err, RuntimeError::Path(PathError::Missing(_))));

        let err = inst
            .set("setItem", &[Value::Integer(7), Value::Integer(1)])
            .unwrap_err();
        assert!(matches!(
            err,
            RuntimeError::Path(PathError::IndexOutOfBounds { index: 7, len: 3, .. })
        ));

        let err = inst
            .set("setIn", &[Value::from("a"), Value::from("x"), Value::Integer(1)])
            .unwrap_err();
        assert!(matches!(
            err,
            RuntimeError::Path(PathError::NotAContainer { .. })
        ));
        assert_eq!(inst.model(), &v(data()));
    }
}

#[test]
fn test_mutator_argument_checks() {
    for backend in BACKENDS {
        let (mut inst, _) = start(&tapped_model(), data(), backend);
        assert!(matches!(
            inst.set("setItem", &[Value::Integer(0)]),
            Err(RuntimeError::ArgumentCount { found: 1, .. })
        ));
        assert!(matches!(
            inst.set("spliceItems", &[Value::Integer(0)]),
            Err(RuntimeError::InvalidArgument { .. })
        ));
        assert!(matches!(
            inst.splice("setItem", &[], 0, 0, Vec::new()),
            Err(RuntimeError::InvalidArgument { .. })
        ));
        assert!(matches!(
            inst.splice("spliceItems", &[Value::Integer(1)], 0, 0, Vec::new()),
            Err(RuntimeError::ArgumentCount { .. })
        ));
        assert!(matches!(
            inst.invoke("spliceItems", &[Value::from("start")]),
            Err(RuntimeError::InvalidArgument { .. })
        ));
        assert_eq!(
            inst.invoke("unknown", &[]),
            Err(RuntimeError::UnknownMutator("unknown".to_string()))
        );
    }
}

#[test]
fn test_invoke_dispatches_by_kind() {
    for backend in BACKENDS {
        let (mut inst, taps) = start(&tapped_model(), data(), backend);
        taps.take();

        inst.invoke("spliceItems", &[Value::Integer(1), Value::Integer(1), Value::Integer(5), Value::Integer(6)])
            .unwrap();
        expect_output(&inst, "doubled", json!([2, 10, 12, 6]));

        inst.invoke("setItem", &[Value::Integer(0), Value::Integer(0)]).unwrap();
        expect_output(&inst, "doubled", json!([0, 10, 12, 6]));

        inst.invoke("spliceItems", &[Value::Integer(-1)]).unwrap();
        expect_output(&inst, "doubled", json!([0, 10, 12]));

        let names: Vec<&str> = inst.mutator_names().collect();
        assert_eq!(names, vec!["set", "setIn", "setItem", "spliceItems"]);
        let outputs: Vec<&str> = inst.output_names().collect();
        assert_eq!(outputs, vec!["doubled", "ratio"]);
    }
}

#[test]
fn test_single_element_write_touches_one_leaf() {
    let (mut inst, taps) = start(&tapped_model(), data(), derivo::Backend::Optimizing);
    assert_eq!(taps.take(), 3);
    inst.set("setItem", &[Value::Integer(1), Value::Integer(5)]).unwrap();
    assert_eq!(taps.take(), 1);
    assert_eq!(inst.last_refresh().calls, 1);

    // an unrelated write reruns no leaf
    inst.set("set", &[Value::from("a"), Value::Integer(12)]).unwrap();
    assert_eq!(taps.take(), 0);
    expect_output(&inst, "ratio", json!(4));
}
