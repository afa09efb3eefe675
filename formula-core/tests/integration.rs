//! Integration Tests for the Formula Engine
//!
//! These tests verify that the compiler, registry, lookups and invalidation
//! work together correctly.

use std::sync::Arc;
use std::thread;

use formula_core::{
    compile, CacheState, Compiler, CompilerConfig, FormulaError, Mode, Registry, VariableHandle,
    VariableKind,
};

struct Example {
    registry: Registry,
    a: VariableHandle,
    b: VariableHandle,
    c: VariableHandle,
    d: VariableHandle,
    e: VariableHandle,
    f: VariableHandle,
    g: VariableHandle,
}

/// a = 1; b = a + 2; c = a + b (lazy); d = c (lazy); e = a + b + c (lazy);
/// f = b; g = e.
fn example() -> Example {
    let registry = Registry::new();
    let a = registry.add_constant("a", 1.0).unwrap();
    let b = registry
        .add_delegate("b", compile("a + 2", &registry).unwrap())
        .unwrap();
    let c = registry
        .add_lazy("c", compile("a + b", &registry).unwrap())
        .unwrap();
    let d = registry
        .add_lazy("d", compile("c", &registry).unwrap())
        .unwrap();
    let e = registry
        .add_lazy("e", compile("a + b + c", &registry).unwrap())
        .unwrap();
    let f = registry
        .add_delegate("f", compile("b", &registry).unwrap())
        .unwrap();
    let g = registry
        .add_delegate("g", compile("e", &registry).unwrap())
        .unwrap();
    Example {
        registry,
        a,
        b,
        c,
        d,
        e,
        f,
        g,
    }
}

fn names(registry: &Registry, handles: impl IntoIterator<Item = VariableHandle>) -> Vec<String> {
    registry.lookup().sorted_names(handles).unwrap()
}

/// Test the initial values of the worked example.
#[test]
fn worked_example_values() {
    let ex = example();
    let r = &ex.registry;

    assert_eq!(r.value(ex.a).unwrap(), 1.0);
    assert_eq!(r.value(ex.b).unwrap(), 3.0);
    assert_eq!(r.value(ex.c).unwrap(), 4.0);
    assert_eq!(r.value(ex.d).unwrap(), 4.0);
    assert_eq!(r.value(ex.e).unwrap(), 8.0);
    assert_eq!(r.value(ex.f).unwrap(), 3.0);
    assert_eq!(r.value(ex.g).unwrap(), 8.0);
}

/// Test the four lookup queries on the worked example.
#[test]
fn worked_example_lookups() {
    let ex = example();
    let r = &ex.registry;

    assert_eq!(
        names(r, r.references(ex.e, Mode::Explicit).unwrap()),
        vec!["a", "b", "c"]
    );
    assert_eq!(
        names(r, r.references(ex.e, Mode::All).unwrap()),
        vec!["a", "b", "c"]
    );
    assert_eq!(
        names(r, r.referencing(ex.a, Mode::Explicit).unwrap()),
        vec!["b", "c", "e"]
    );
    assert_eq!(
        names(r, r.referencing(ex.a, Mode::All).unwrap()),
        vec!["b", "c", "d", "e", "f", "g"]
    );

    // g only reads e directly, but transitively everything upstream of e.
    assert_eq!(
        names(r, r.references(ex.g, Mode::Explicit).unwrap()),
        vec!["e"]
    );
    assert_eq!(
        names(r, r.references(ex.g, Mode::All).unwrap()),
        vec!["a", "b", "c", "e"]
    );

    // Leaves and roots.
    assert!(r.references(ex.a, Mode::All).unwrap().is_empty());
    assert!(r.referencing(ex.g, Mode::All).unwrap().is_empty());
    assert!(r.referencing(ex.d, Mode::All).unwrap().is_empty());
}

/// Test that a constant assignment reaches every downstream variable
/// without any refresh call.
#[test]
fn constant_update_propagates() {
    let ex = example();
    let r = &ex.registry;

    // Fill the lazy caches first.
    assert_eq!(r.value(ex.g).unwrap(), 8.0);
    assert_eq!(r.value(ex.d).unwrap(), 4.0);

    r.set_constant_value(ex.a, 10.0).unwrap();

    assert_eq!(r.value(ex.b).unwrap(), 12.0);
    assert_eq!(r.value(ex.c).unwrap(), 22.0);
    assert_eq!(r.value(ex.d).unwrap(), 22.0);
    assert_eq!(r.value(ex.e).unwrap(), 44.0);
    assert_eq!(r.value(ex.f).unwrap(), 12.0);
    assert_eq!(r.value(ex.g).unwrap(), 44.0);
}

/// Test that invalidation only touches lazy variables downstream of the
/// changed constant.
#[test]
fn invalidation_is_limited_to_dependents() {
    let registry = Registry::new();
    let x = registry.add_constant("x", 2.0).unwrap();
    registry.add_constant("y", 3.0).unwrap();
    let from_x = registry.define_lazy("from_x", "x * 10").unwrap();
    let from_y = registry.define_lazy("from_y", "y * 10").unwrap();
    let both = registry.define_lazy("both", "from_x + from_y").unwrap();

    assert_eq!(registry.value(both).unwrap(), 50.0);
    assert!(registry.is_cached(from_x).unwrap());
    assert!(registry.is_cached(from_y).unwrap());

    registry.set_constant_value(x, 4.0).unwrap();

    assert_eq!(registry.cache_state(from_x).unwrap(), Some(CacheState::Stale));
    assert_eq!(registry.cache_state(both).unwrap(), Some(CacheState::Stale));
    assert_eq!(
        registry.cache_state(from_y).unwrap(),
        Some(CacheState::Fresh(30.0))
    );

    assert_eq!(registry.value(both).unwrap(), 70.0);
}

/// Test that a lazy variable behind a delegate is still invalidated.
#[test]
fn invalidation_passes_through_delegates() {
    let registry = Registry::new();
    let a = registry.add_constant("a", 1.0).unwrap();
    registry.define_delegate("twice", "a * 2").unwrap();
    let cached = registry.define_lazy("cached", "twice + 1").unwrap();

    assert_eq!(registry.value(cached).unwrap(), 3.0);
    registry.set_constant_value(a, 5.0).unwrap();
    assert_eq!(registry.value(cached).unwrap(), 11.0);
}

/// Test that repeated reads with no upstream change agree.
#[test]
fn repeated_reads_are_idempotent() {
    let ex = example();
    let r = &ex.registry;

    for handle in [ex.b, ex.c, ex.d, ex.e, ex.f, ex.g] {
        let first = r.value(handle).unwrap();
        let second = r.value(handle).unwrap();
        let third = r.value(handle).unwrap();
        assert_eq!(first, second);
        assert_eq!(second, third);
    }
}

/// Test the chosen division-by-zero policy: IEEE results, no error.
#[test]
fn division_by_zero_yields_ieee_values() {
    let registry = Registry::new();
    let num = registry.add_constant("num", 1.0).unwrap();
    let den = registry.add_constant("den", 0.0).unwrap();
    let ratio = registry.define_lazy("ratio", "num / den").unwrap();
    let scaled = registry.define_delegate("scaled", "ratio * 0").unwrap();

    assert_eq!(registry.value(ratio).unwrap(), f64::INFINITY);
    assert!(registry.value(scaled).unwrap().is_nan());

    registry.set_constant_value(num, -1.0).unwrap();
    assert_eq!(registry.value(ratio).unwrap(), f64::NEG_INFINITY);

    registry.set_constant_value(num, 0.0).unwrap();
    assert!(registry.value(ratio).unwrap().is_nan());

    registry.set_constant_value(den, 4.0).unwrap();
    assert_eq!(registry.value(ratio).unwrap(), 0.0);
    assert_eq!(registry.value(scaled).unwrap(), 0.0);
}

/// Test operator precedence and associativity end to end.
#[test]
fn arithmetic_follows_standard_precedence() {
    let registry = Registry::new();
    registry.add_constant("x", 3.0).unwrap();
    registry.add_constant("y", 2.0).unwrap();

    let cases = [
        ("x + y * 2", 7.0),
        ("(x + y) * 2", 10.0),
        ("x - y - 1", 0.0),
        ("x / y / 2", 0.75),
        ("y ^ x ^ 2", 512.0),
        ("-y ^ 2", -4.0),
        ("(-y) ^ 2", 4.0),
        ("y ^ -1", 0.5),
        ("--x", 3.0),
        ("x × y ÷ 4 − 1", 0.5),
        ("1.5e1 + x", 18.0),
    ];

    for (index, (expression, expected)) in cases.iter().enumerate() {
        let handle = registry
            .define_delegate(&format!("case_{index}"), expression)
            .unwrap();
        assert_eq!(
            registry.value(handle).unwrap(),
            *expected,
            "expression {expression}"
        );
    }
}

/// Test that compile errors leave the registry untouched.
#[test]
fn failed_definitions_do_not_register() {
    let registry = Registry::new();
    registry.add_constant("a", 1.0).unwrap();

    assert_eq!(
        registry.define_delegate("b", "a + missing"),
        Err(FormulaError::UnknownVariable("missing".to_string()))
    );
    assert!(matches!(
        registry.define_lazy("b", "a + "),
        Err(FormulaError::Syntax { .. })
    ));
    assert!(registry.get("b").is_none());
    assert_eq!(registry.len(), 1);
}

/// Test that forward declarations are not supported.
#[test]
fn references_must_exist_before_use() {
    let registry = Registry::new();
    assert_eq!(
        compile("later * 2", &registry).unwrap_err(),
        FormulaError::UnknownVariable("later".to_string())
    );

    registry.add_constant("later", 4.0).unwrap();
    let doubled = registry
        .add_delegate("doubled", compile("later * 2", &registry).unwrap())
        .unwrap();
    assert_eq!(registry.value(doubled).unwrap(), 8.0);
}

/// Test that one evaluator can back several variables.
#[test]
fn evaluator_is_reusable() {
    let registry = Registry::new();
    let a = registry.add_constant("a", 2.0).unwrap();
    let evaluator = compile("a * a", &registry).unwrap();

    let eager = registry.add_delegate("eager", evaluator.clone()).unwrap();
    let lazy = registry.add_lazy("lazy", evaluator).unwrap();

    assert_eq!(registry.value(eager).unwrap(), 4.0);
    assert_eq!(registry.value(lazy).unwrap(), 4.0);

    registry.set_constant_value(a, 3.0).unwrap();
    assert_eq!(registry.value(eager).unwrap(), 9.0);
    assert_eq!(registry.value(lazy).unwrap(), 9.0);
}

/// Test that long chains evaluate without deep recursion.
#[test]
fn long_chains_evaluate_iteratively() {
    let registry = Registry::new();
    let root = registry.add_constant("v0", 0.0).unwrap();

    let mut last = root;
    for i in 1..=20_000 {
        let expression = format!("v{} + 1", i - 1);
        last = if i % 2 == 0 {
            registry.define_lazy(&format!("v{i}"), &expression).unwrap()
        } else {
            registry.define_delegate(&format!("v{i}"), &expression).unwrap()
        };
    }

    assert_eq!(registry.value(last).unwrap(), 20_000.0);
    assert_eq!(registry.referencing(root, Mode::All).unwrap().len(), 20_000);
    assert_eq!(registry.references(last, Mode::All).unwrap().len(), 20_000);

    registry.set_constant_value(root, 100.0).unwrap();
    assert_eq!(registry.value(last).unwrap(), 20_100.0);
}

/// Test that wide diamonds evaluate each delegate correctly.
#[test]
fn diamond_dependencies_evaluate_once_per_path_set() {
    let registry = Registry::new();
    let base = registry.add_constant("base", 1.0).unwrap();
    registry.define_delegate("left", "base + 1").unwrap();
    registry.define_delegate("right", "base * 3").unwrap();
    let join = registry.define_lazy("join", "left * right + left").unwrap();

    assert_eq!(registry.value(join).unwrap(), 8.0);
    registry.set_constant_value(base, 2.0).unwrap();
    assert_eq!(registry.value(join).unwrap(), 21.0);
}

/// Test the snapshot: evaluation order, values, and JSON output.
#[test]
fn snapshot_reports_every_variable() {
    let ex = example();
    let snapshot = ex.registry.snapshot().unwrap();

    assert_eq!(snapshot.len(), 7);
    let position = |name: &str| {
        snapshot
            .variables
            .iter()
            .position(|v| v.name == name)
            .unwrap()
    };
    assert!(position("a") < position("b"));
    assert!(position("b") < position("c"));
    assert!(position("c") < position("e"));
    assert!(position("e") < position("g"));

    let e = snapshot.get("e").unwrap();
    assert_eq!(e.kind, VariableKind::Lazy);
    assert_eq!(e.value, 8.0);
    assert_eq!(e.references, vec!["a", "b", "c"]);

    let json = snapshot.to_json().unwrap();
    assert!(json.contains(r#"{"name":"a","kind":"constant","value":1.0,"references":[]}"#));

    // Taking a snapshot fills lazy caches like any other read.
    assert!(ex.registry.is_cached(ex.d).unwrap());
}

/// Test that a lookup answers several queries against one state.
#[test]
fn lookup_view_is_consistent() {
    let ex = example();
    let lookup = ex.registry.lookup();

    let order = lookup.evaluation_order();
    assert_eq!(order.len(), 7);
    assert_eq!(order[0], ex.a);

    for handle in lookup.handles() {
        let referencing = lookup.referencing(handle, Mode::Explicit).unwrap();
        for user in referencing {
            assert!(lookup
                .references(user, Mode::Explicit)
                .unwrap()
                .contains(&handle));
        }
    }
    assert_eq!(lookup.value(ex.g).unwrap(), 8.0);
    assert_eq!(lookup.kind(ex.f).unwrap(), VariableKind::Delegate);
}

/// Test a compiler with custom limits against a registry.
#[test]
fn configured_compiler_limits_nesting() {
    let registry = Registry::new();
    registry.add_constant("a", 1.0).unwrap();

    let config = CompilerConfig::from_json(r#"{"max_nesting_depth": 3}"#).unwrap();
    let compiler = Compiler::new(config);

    assert!(compiler.compile("(a + 1) * 2", &registry).is_ok());
    assert_eq!(
        compiler.compile("(((a)))", &registry).unwrap_err(),
        FormulaError::NestingTooDeep { limit: 3 }
    );
}

/// Test concurrent readers against a single writer.
///
/// Every read made through one lookup must see a consistent graph: with
/// b = a + 2, c = a + b, e = a + b + c, e is always 4a + 4.
#[test]
fn readers_never_observe_partial_invalidation() {
    let ex = example();
    let registry = Arc::new(ex.registry);
    let (a, e) = (ex.a, ex.e);

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let registry = Arc::clone(&registry);
            thread::spawn(move || {
                for _ in 0..2_000 {
                    let lookup = registry.lookup();
                    let a_value = lookup.value(a).unwrap();
                    let e_value = lookup.value(e).unwrap();
                    assert_eq!(e_value, 4.0 * a_value + 4.0);
                }
            })
        })
        .collect();

    for i in 0..2_000 {
        registry.set_constant_value(a, i as f64).unwrap();
    }

    for reader in readers {
        reader.join().unwrap();
    }
    assert_eq!(registry.value(e).unwrap(), 4.0 * 1_999.0 + 4.0);
}
