//! Dependency walkthrough.
//!
//! Builds a small registry, prints its lookups, then changes a constant and
//! prints every value again.
//!
//! Run with `cargo run -p formula-core --example dependencies`. Set
//! `RUST_LOG=formula_core=debug` to see registration and invalidation.

use formula_core::{compile, FormulaError, Mode, Registry, VariableHandle};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn print_values(registry: &Registry) -> Result<(), FormulaError> {
    let lookup = registry.lookup();
    for handle in lookup.handles() {
        println!(
            "  {:<2} {:<9} = {}",
            lookup.name(handle)?,
            lookup.kind(handle)?.to_string(),
            lookup.value(handle)?
        );
    }
    Ok(())
}

fn print_lookup(
    registry: &Registry,
    handle: VariableHandle,
    label: &str,
    found: impl IntoIterator<Item = VariableHandle>,
) -> Result<(), FormulaError> {
    let lookup = registry.lookup();
    println!(
        "  {label}({}) = {{{}}}",
        lookup.name(handle)?,
        lookup.sorted_names(found)?.join(", ")
    );
    Ok(())
}

fn main() -> Result<(), FormulaError> {
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(EnvFilter::from_default_env())
        .init();

    let registry = Registry::new();
    let a = registry.add_constant("a", 1.0)?;
    registry.add_delegate("b", compile("a + 2", &registry)?)?;
    registry.add_lazy("c", compile("a + b", &registry)?)?;
    registry.define_lazy("d", "c")?;
    let e = registry.define_lazy("e", "a + b + c")?;
    registry.define_delegate("f", "b")?;
    registry.define_delegate("g", "e")?;

    println!("values:");
    print_values(&registry)?;

    println!("lookups:");
    print_lookup(&registry, e, "references/explicit", registry.references(e, Mode::Explicit)?)?;
    print_lookup(&registry, e, "references/all", registry.references(e, Mode::All)?)?;
    print_lookup(&registry, a, "referencing/explicit", registry.referencing(a, Mode::Explicit)?)?;
    print_lookup(&registry, a, "referencing/all", registry.referencing(a, Mode::All)?)?;

    registry.set_constant_value(a, 10.0)?;
    println!("after a = 10:");
    print_values(&registry)?;

    println!("snapshot:");
    let snapshot = registry.snapshot()?;
    match snapshot.to_json_pretty() {
        Ok(json) => println!("{json}"),
        Err(err) => eprintln!("could not serialize snapshot: {err}"),
    }

    Ok(())
}
