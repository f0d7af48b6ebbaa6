//! Both backends must agree on every output, model and error for any
//! sequence of mutations.

mod common;

use common::{Taps, v};
use derivo::{
    Backend, CompileOptions, Expr, Instance, Model, RuntimeError, Value, arg0, compile, root,
    setter, splice,
};
use proptest::prelude::*;
use serde_json::json;

#[derive(Debug, Clone)]
enum Op {
    SetItem(i64, i64),
    Splice(i64, usize, Vec<i64>),
    SetThreshold(i64),
    SetTag(&'static str, i64),
    Batch(Vec<Op>),
}

fn leaf() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0i64..6, -3i64..4).prop_map(|(i, n)| Op::SetItem(i, n)),
        (-3i64..6, 0usize..3, prop::collection::vec(-3i64..4, 0..3))
            .prop_map(|(start, count, items)| Op::Splice(start, count, items)),
        (-3i64..4).prop_map(Op::SetThreshold),
        (prop::sample::select(vec!["a", "b", "c"]), -3i64..4)
            .prop_map(|(key, n)| Op::SetTag(key, n)),
    ]
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => leaf(),
        1 => prop::collection::vec(leaf(), 1..4).prop_map(Op::Batch),
    ]
}

fn model() -> Model {
    let items = root().get("items");
    let threshold = root().get("threshold");
    let tags = root().get("tags");
    let inner = items.clone();
    Model::new()
        .with(
            "evens",
            items
                .clone()
                .filter(|n, _| n.modulo(2).eq(0))
                .map(|n, _| n.call("tap")),
        )
        .with(
            "anyAbove",
            items
                .clone()
                .any(|n, _| n.gt(threshold.clone()).call("tap")),
        )
        .with("byParity", items.clone().group_by(|n, _| n.modulo(2)))
        .with(
            "shifted",
            items
                .clone()
                .key_by(|_, k| k)
                .map_values(|n, _| n.plus(threshold.clone()).call("tap")),
        )
        .with("counted", items.clone().size().range(0))
        .with(
            "scaledTags",
            tags.clone().map_values(|n, _| n.mult(threshold.clone())),
        )
        .with("positiveTags", tags.clone().filter_by(|n, _| n.gt(0)).keys())
        .with("ratio", threshold.clone().div(items.clone().get(0)))
        .with(
            "merged",
            Expr::array([tags, Expr::object([("t", threshold)])]).defaults(),
        )
        .with(
            "smaller",
            items.map(|x, _| inner.filter(|y, _| y.lt(x)).size().call("tap")),
        )
        .with("setItem", setter(&["items".into(), arg0()]))
        .with("setThreshold", setter(&["threshold".into()]))
        .with("setTag", setter(&["tags".into(), arg0()]))
        .with("spliceItems", splice(&["items".into()]))
}

fn apply(instance: &mut Instance, op: &Op) -> Result<(), RuntimeError> {
    match op {
        Op::SetItem(i, n) => instance.set("setItem", &[Value::Integer(*i), Value::Integer(*n)]),
        Op::Splice(start, count, items) => instance.splice(
            "spliceItems",
            &[],
            *start,
            *count,
            items.iter().map(|n| Value::Integer(*n)).collect(),
        ),
        Op::SetThreshold(n) => instance.set("setThreshold", &[Value::Integer(*n)]),
        Op::SetTag(key, n) => instance.set("setTag", &[Value::from(*key), Value::Integer(*n)]),
        Op::Batch(ops) => instance.batch(|instance| {
            for op in ops {
                apply(instance, op)?;
            }
            Ok(())
        }),
    }
}

fn instantiate(backend: Backend, data: &Value) -> (Result<Instance, RuntimeError>, Taps) {
    let taps = Taps::new();
    let program = compile(&model(), CompileOptions::new(backend)).unwrap();
    (program.instantiate(data.clone(), taps.library()), taps)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(96))]

    #[test]
    fn backends_agree(
        items in prop::collection::vec(-3i64..4, 0..6),
        threshold in -3i64..4,
        ops in prop::collection::vec(op(), 1..12),
    ) {
        let data = v(json!({"items": items, "threshold": threshold, "tags": {"a": 1, "b": -2}}));
        let (simple, simple_taps) = instantiate(Backend::Simple, &data);
        let (optimizing, optimizing_taps) = instantiate(Backend::Optimizing, &data);
        let (mut simple, mut optimizing) = match (simple, optimizing) {
            (Ok(s), Ok(o)) => (s, o),
            (s, o) => {
                prop_assert_eq!(s.err(), o.err());
                return Ok(());
            }
        };
        prop_assert_eq!(simple.values(), optimizing.values());
        prop_assert!(optimizing_taps.take() <= simple_taps.take());

        for op in &ops {
            let expected = apply(&mut simple, op);
            let found = apply(&mut optimizing, op);
            prop_assert_eq!(&expected, &found, "after {:?}", op);
            prop_assert_eq!(simple.model(), optimizing.model());
            prop_assert_eq!(simple.values(), optimizing.values(), "after {:?}", op);

            let (simple_calls, optimizing_calls) = (simple_taps.take(), optimizing_taps.take());
            if expected.is_ok() {
                prop_assert!(
                    optimizing_calls <= simple_calls,
                    "optimizing made {} calls, simple {}", optimizing_calls, simple_calls
                );
            }
        }
    }
}
