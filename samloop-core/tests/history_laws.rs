use proptest::prelude::*;
use samloop_core::prelude::*;
use serde_json::{json, Value};

#[derive(Debug, Clone)]
enum Op {
    Increment,
    Add(i64),
    Reset,
    Undo,
    Redo,
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => Just(Op::Increment),
        3 => (-20i64..20).prop_map(Op::Add),
        1 => Just(Op::Reset),
        2 => Just(Op::Undo),
        2 => Just(Op::Redo),
    ]
}

fn arb_dispatch() -> impl Strategy<Value = Op> {
    prop_oneof![
        Just(Op::Increment),
        (-20i64..20).prop_map(Op::Add),
        Just(Op::Reset),
    ]
}

fn counter() -> ManagerHandle {
    ManagerBuilder::new(State::from_fields([("count", json!(0))]))
        .acceptor("increment", |s: &State, _: &Payload| {
            Ok(s.with("count", s.require_i64("count")? + 1))
        })
        .acceptor_with_schema("add", PayloadSchema::Integer, |s: &State, p: &Payload| {
            Ok(s.with("count", s.require_i64("count")? + p.as_i64()?))
        })
        .acceptor("reset", |s: &State, _: &Payload| Ok(s.with("count", 0)))
        .predicate(Predicate::when(
            "auto-reset-at-10",
            |s| s.get_i64("count").unwrap_or(0) >= 10,
            Action::new("reset"),
        ))
        .view("count", |s: &State| json!(s.get_i64("count")))
        .build()
        .unwrap()
}

fn apply(manager: &ManagerHandle, op: &Op) {
    match op {
        Op::Increment => manager.dispatch("increment", Value::Null).unwrap(),
        Op::Add(n) => manager.dispatch("add", json!(n)).unwrap(),
        Op::Reset => manager.dispatch("reset", Value::Null).unwrap(),
        Op::Undo => {
            manager.undo();
        }
        Op::Redo => {
            manager.redo();
        }
    }
}

proptest! {
    #![proptest_config(proptest::test_runner::Config::with_cases(128))]

    #[test]
    fn same_inputs_same_outcome(ops in prop::collection::vec(arb_op(), 0..40)) {
        let a = counter();
        let b = counter();
        for op in &ops {
            apply(&a, op);
            apply(&b, op);
        }

        prop_assert_eq!(a.state(), b.state());
        prop_assert_eq!(a.representation(), b.representation());
        prop_assert_eq!(a.history_cursor(), b.history_cursor());
        let seq_a: Vec<_> = a.history_snapshot().iter().map(|v| v.sequence).collect();
        let seq_b: Vec<_> = b.history_snapshot().iter().map(|v| v.sequence).collect();
        prop_assert_eq!(seq_a, seq_b);
    }

    #[test]
    fn sequences_strictly_increase(ops in prop::collection::vec(arb_op(), 0..60)) {
        let manager = counter();
        for op in &ops {
            apply(&manager, op);
        }

        let snapshot = manager.history_snapshot();
        for pair in snapshot.windows(2) {
            prop_assert!(pair[0].sequence < pair[1].sequence);
        }
        prop_assert_eq!(snapshot.iter().filter(|v| v.current).count(), 1);
    }

    #[test]
    fn undo_then_redo_restores(
        ops in prop::collection::vec(arb_dispatch(), 1..30),
        steps in 0usize..40,
    ) {
        let manager = counter();
        for op in &ops {
            apply(&manager, op);
        }
        let latest = manager.state();
        let latest_view = manager.representation();

        let mut moved = 0;
        for _ in 0..steps {
            if manager.undo() {
                moved += 1;
            }
        }
        prop_assert_eq!(moved, steps.min(ops.len()));

        for _ in 0..moved {
            prop_assert!(manager.redo());
        }
        prop_assert!(!manager.redo());
        prop_assert_eq!(manager.state(), latest);
        prop_assert_eq!(manager.representation(), latest_view);
    }

    #[test]
    fn count_never_reaches_reset_threshold(ops in prop::collection::vec(arb_op(), 0..40)) {
        let manager = counter();
        for op in &ops {
            apply(&manager, op);
            prop_assert!(manager.state().get_i64("count").unwrap() < 10);
        }
    }
}
