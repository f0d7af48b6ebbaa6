mod common;

use common::{BACKENDS, expect_output, expect_values, start, v};
use derivo::{Expr, Map, Model, Value, arg0, arg1, or, root, setter, splice};
use serde_json::json;

#[test]
fn test_simple_map() {
    for backend in BACKENDS {
        let model = Model::new()
            .with("negated", root().map(|val, _| val.not().call("tap")))
            .with("set", setter(&[arg0()]));
        let (mut inst, taps) = start(&model, json!([true, true, false, false, false]), backend);
        expect_output(&inst, "negated", json!([false, false, true, true, true]));
        taps.expect(5, backend);

        inst.set("set", &[Value::Integer(1), Value::Boolean(false)]).unwrap();
        expect_output(&inst, "negated", json!([false, true, true, true, true]));
        taps.expect(1, backend);
    }
}

#[test]
fn test_map_falls_back_to_empty_object() {
    for backend in BACKENDS {
        let model = Model::new()
            .with(
                "orEmpty",
                root().map(|val, _| or([val, Expr::from(Map::new())]).call("tap")),
            )
            .with("set", setter(&[arg0()]));
        let (mut inst, taps) = start(&model, json!([{"x": 1}, false, {"x": 2}]), backend);
        expect_output(&inst, "orEmpty", json!([{"x": 1}, {}, {"x": 2}]));
        taps.expect(3, backend);

        inst.set("set", &[Value::Integer(2), Value::Boolean(false)]).unwrap();
        expect_output(&inst, "orEmpty", json!([{"x": 1}, {}, {}]));
        taps.expect(1, backend);
    }
}

#[test]
fn test_map_falls_back_to_empty_array() {
    for backend in BACKENDS {
        let model = Model::new()
            .with(
                "orEmpty",
                root().map(|val, _| or([val, Expr::array(Vec::<Expr>::new())]).call("tap")),
            )
            .with("set", setter(&[arg0()]));
        let (mut inst, taps) = start(&model, json!([[1], false, [2]]), backend);
        expect_output(&inst, "orEmpty", json!([[1], [], [2]]));
        taps.expect(3, backend);

        inst.set("set", &[Value::Integer(2), Value::Boolean(false)]).unwrap();
        expect_output(&inst, "orEmpty", json!([[1], [], []]));
        taps.expect(1, backend);
    }
}

#[test]
fn test_simple_any() {
    for backend in BACKENDS {
        let model = Model::new()
            .with("anyTruthy", root().any(|val, _| val.call("tap")))
            .with("set", setter(&[arg0()]));
        let (mut inst, taps) = start(&model, json!([true, false, false, false, false]), backend);
        taps.expect(1, backend);
        expect_output(&inst, "anyTruthy", json!(true));

        let steps = [
            (0, false, 5, false),
            (3, true, 1, true),
            (4, true, 0, true),
            (3, false, 2, true),
            (4, false, 1, false),
        ];
        for (index, value, calls, expected) in steps {
            inst.set("set", &[Value::Integer(index), Value::Boolean(value)])
                .unwrap();
            taps.expect(calls, backend);
            expect_output(&inst, "anyTruthy", json!(expected));
        }
    }
}

#[test]
fn test_simple_key_by() {
    for backend in BACKENDS {
        let model = Model::new()
            .with(
                "itemByIdx",
                root()
                    .key_by(|val, _| val.get("idx"))
                    .map_values(|val, _| val.get("text").call("tap")),
            )
            .with("set", setter(&[arg0()]))
            .with("splice", splice(&[]));
        let data = json!([
            {"idx": 1, "text": "a"},
            {"idx": 2, "text": "b"},
            {"idx": 3, "text": "c"}
        ]);
        let (mut inst, taps) = start(&model, data, backend);
        taps.expect(3, backend);
        expect_output(&inst, "itemByIdx", json!({"1": "a", "2": "b", "3": "c"}));

        inst.set("set", &[Value::Integer(0), v(json!({"idx": 4, "text": "d"}))])
            .unwrap();
        taps.expect(1, backend);
        expect_output(&inst, "itemByIdx", json!({"4": "d", "2": "b", "3": "c"}));

        // two elements collapse onto one key: the later one wins
        inst.splice("splice", &[], 1, 2, vec![v(json!({"idx": 3, "text": "e"}))])
            .unwrap();
        expect_output(&inst, "itemByIdx", json!({"4": "d", "3": "e"}));
        taps.expect(1, backend);

        let mut reversed = inst.model().as_array().unwrap().to_vec();
        reversed.reverse();
        let len = reversed.len();
        inst.splice("splice", &[], 0, len, reversed).unwrap();
        expect_output(&inst, "itemByIdx", json!({"4": "d", "3": "e"}));
        taps.expect(0, backend);
    }
}

#[test]
fn test_key_by_keeps_large_float_keys_apart() {
    for backend in BACKENDS {
        let by_k = root().key_by(|val, _| val.get("k"));
        let model = Model::new()
            .with("count", by_k.clone().size())
            .with("ns", by_k.values().map(|val, _| val.get("n")))
            .with("twice", root().map(|val, _| val.get("k").mult(2)))
            .with("set", setter(&[arg0()]));
        let data = json!([{"k": 1e20, "n": 1}, {"k": 1e21, "n": 2}, {"k": 7.0, "n": 3}]);
        let (mut inst, _) = start(&model, data, backend);
        expect_output(&inst, "count", json!(3));
        expect_output(&inst, "ns", json!([1, 2, 3]));

        inst.set("set", &[Value::Integer(2), v(json!({"k": 1e20, "n": 4}))]).unwrap();
        expect_output(&inst, "count", json!(2));
        expect_output(&inst, "ns", json!([4, 2]));
        expect_output(&inst, "twice", json!([2e20, 2e21, 2e20]));
    }
}

#[test]
fn test_comparison_operations() {
    for backend in BACKENDS {
        let arr = root().get("arr");
        let compare_to = root().get("compareTo");
        let model = Model::new()
            .with(
                "greaterThan",
                arr.clone().map(|val, _| val.gt(compare_to.clone()).call("tap")),
            )
            .with(
                "lessThan",
                arr.clone().map(|val, _| val.lt(compare_to.clone()).call("tap")),
            )
            .with(
                "greaterOrEqual",
                arr.clone().map(|val, _| val.gte(compare_to.clone()).call("tap")),
            )
            .with(
                "lessThanOrEqual",
                arr.map(|val, _| val.lte(compare_to.clone()).call("tap")),
            )
            .with("setArr", setter(&["arr".into(), arg0()]))
            .with("setCompareTo", setter(&["compareTo".into()]));
        let (mut inst, taps) = start(&model, json!({"arr": [0, 1, 2, 3, 4], "compareTo": 2}), backend);
        expect_values(
            &inst,
            json!({
                "greaterThan": [false, false, false, true, true],
                "lessThan": [true, true, false, false, false],
                "greaterOrEqual": [false, false, true, true, true],
                "lessThanOrEqual": [true, true, true, false, false]
            }),
        );
        taps.expect(20, backend);

        inst.set("setArr", &[Value::Integer(4), Value::Integer(0)]).unwrap();
        expect_values(
            &inst,
            json!({
                "greaterThan": [false, false, false, true, false],
                "lessThan": [true, true, false, false, true],
                "greaterOrEqual": [false, false, true, true, false],
                "lessThanOrEqual": [true, true, true, false, true]
            }),
        );
        taps.expect(4, backend);

        inst.set("setCompareTo", &[Value::Integer(100)]).unwrap();
        expect_values(
            &inst,
            json!({
                "greaterThan": [false, false, false, false, false],
                "lessThan": [true, true, true, true, true],
                "greaterOrEqual": [false, false, false, false, false],
                "lessThanOrEqual": [true, true, true, true, true]
            }),
        );
        taps.expect(6, backend);
    }
}

#[test]
fn test_creation_of_arrays() {
    for backend in BACKENDS {
        let sums_tuple =
            root().map(|item, _| Expr::array([item.clone().get(0).plus(item.get(1))]));
        let map_of_sum = sums_tuple.map(|item, _| item.get(0).call("tap"));
        let model = Model::new()
            .with("mapOfSum", map_of_sum)
            .with("set0", setter(&[arg0(), 0usize.into()]))
            .with("set1", setter(&[arg0(), 1usize.into()]));
        let (mut inst, taps) = start(&model, json!([[1, 2], [3, 4], [5, 6]]), backend);
        expect_output(&inst, "mapOfSum", json!([3, 7, 11]));
        taps.expect(3, backend);

        inst.set("set0", &[Value::Integer(0), Value::Integer(7)]).unwrap();
        expect_output(&inst, "mapOfSum", json!([9, 7, 11]));
        taps.expect(1, backend);

        // the sum is unchanged, so nothing downstream reruns
        inst.start_batch().unwrap();
        inst.set("set0", &[Value::Integer(1), Value::Integer(4)]).unwrap();
        inst.set("set1", &[Value::Integer(1), Value::Integer(3)]).unwrap();
        inst.end_batch().unwrap();
        expect_output(&inst, "mapOfSum", json!([9, 7, 11]));
        taps.expect(0, backend);
    }
}

#[test]
fn test_assign_defaults() {
    for backend in BACKENDS {
        let model = Model::new()
            .with("assign", root().assign().map_values(|val, _| val.call("tap")))
            .with("defaults", root().defaults().map_values(|val, _| val.call("tap")))
            .with("set", setter(&[arg0()]))
            .with("setInner", setter(&[arg0(), arg1()]))
            .with("splice", splice(&[]));
        let (mut inst, taps) = start(&model, json!([{"a": 1}, {"b": 2}, {"a": 5}]), backend);
        expect_values(
            &inst,
            json!({"assign": {"a": 5, "b": 2}, "defaults": {"a": 1, "b": 2}}),
        );
        taps.expect(4, backend);

        inst.set("set", &[Value::Integer(0), v(json!({"a": 7}))]).unwrap();
        expect_values(
            &inst,
            json!({"assign": {"a": 5, "b": 2}, "defaults": {"a": 7, "b": 2}}),
        );
        taps.expect(1, backend);

        inst.set(
            "setInner",
            &[Value::Integer(2), Value::from("a"), Value::Integer(9)],
        )
        .unwrap();
        expect_values(
            &inst,
            json!({"assign": {"a": 9, "b": 2}, "defaults": {"a": 7, "b": 2}}),
        );
        taps.expect(1, backend);

        inst.splice("splice", &[], 1, 1, Vec::new()).unwrap();
        expect_values(&inst, json!({"assign": {"a": 9}, "defaults": {"a": 7}}));
        taps.expect(0, backend);
    }
}

#[test]
fn test_range_size() {
    for backend in BACKENDS {
        let matches = root()
            .get("items")
            .filter(|val, _| val.eq(root().get("match")));
        let fizz_buzz = matches
            .size()
            .range(1)
            .map(|val, _| {
                val.clone().modulo(15).eq(0).ternary(
                    "fizzbuzz",
                    val.clone().modulo(3).eq(0).ternary(
                        "fizz",
                        val.clone().modulo(5).eq(0).ternary("buzz", val),
                    ),
                )
            })
            .map(|val, _| val.call("tap"));
        let model = Model::new()
            .with("fizzBuzz", fizz_buzz)
            .with("spliceItems", splice(&["items".into()]))
            .with("setMatch", setter(&["match".into()]));
        let data = json!({
            "items": [0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1, 1, 1, 1, 0, 0, 0, 0, 1, 1, 0, 2, 2, 2, 2],
            "match": 1
        });
        let (mut inst, _taps) = start(&model, data, backend);
        expect_output(&inst, "fizzBuzz", json!([1, 2, "fizz", 4, "buzz"]));

        inst.set("setMatch", &[Value::Integer(0)]).unwrap();
        expect_output(
            &inst,
            "fizzBuzz",
            json!([
                1, 2, "fizz", 4, "buzz", "fizz", 7, 8, "fizz", "buzz", 11, "fizz", 13, 14,
                "fizzbuzz"
            ]),
        );

        inst.set("setMatch", &[Value::Integer(2)]).unwrap();
        expect_output(&inst, "fizzBuzz", json!([1, 2, "fizz"]));

        // drops everything from 22 on, leaving no 2s
        inst.invoke("spliceItems", &[Value::Integer(22)]).unwrap();
        expect_output(&inst, "fizzBuzz", json!([]));
    }
}

#[test]
fn test_branch_soft_tracking() {
    for backend in BACKENDS {
        let values_in_arrays =
            root().map(|item, _| or([item.clone().get("arr"), Expr::array([item.get("val")])]));
        let indexes = root().map(|_, idx| idx);
        let model = Model::new()
            .with(
                "result",
                indexes.map(|idx, _| values_in_arrays.clone().get(idx).get(0)),
            )
            .with("set", setter(&[arg0()]));
        let (mut inst, _taps) = start(&model, json!([{"arr": [1]}, {"val": 2}, {"arr": [3]}]), backend);
        expect_output(&inst, "result", json!([1, 2, 3]));

        inst.set("set", &[Value::Integer(0), v(json!({"val": 4}))]).unwrap();
        expect_output(&inst, "result", json!([4, 2, 3]));

        inst.set("set", &[Value::Integer(1), v(json!({"arr": [5]}))]).unwrap();
        expect_output(&inst, "result", json!([4, 5, 3]));
    }
}
