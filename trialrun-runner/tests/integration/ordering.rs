// Copyright (c) The trialrun Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::fixtures::*;
use color_eyre::eyre::{Result, ensure};
use pretty_assertions::assert_eq;
use test_case::test_case;
use trialrun_runner::{
    list::{Suite, Unit},
    order::{OrderStrategy, RunSeed},
};

fn unit(name: &str) -> Unit {
    Unit::blocking(name, |_| Ok(()))
}

#[test]
fn alphanumeric_order() -> Result<()> {
    test_init();

    let suite = Suite::new("Sorted")
        .order(OrderStrategy::Alphanumeric)
        .unit(unit("b"))
        .unit(unit("a"))
        .unit(unit("c"));

    let output = run_suites(vec![suite])?;
    assert_eq!(output.started(), vec!["a", "b", "c"]);
    Ok(())
}

#[test]
fn explicit_order_puts_unkeyed_units_last() -> Result<()> {
    test_init();

    let suite = Suite::new("Keyed")
        .order(OrderStrategy::Explicit)
        .unit(unit("B").order_key(2))
        .unit(unit("A").order_key(1))
        .unit(unit("C"));

    let output = run_suites(vec![suite])?;
    assert_eq!(output.started(), vec!["A", "B", "C"]);
    Ok(())
}

#[test]
fn default_order_applies_to_undeclared_suites() -> Result<()> {
    test_init();

    let suite = Suite::new("Undeclared")
        .unit(unit("zeta"))
        .unit(unit("alpha"))
        .child(
            Suite::new("Declared")
                .order(OrderStrategy::Declared)
                .unit(unit("y"))
                .unit(unit("x")),
        );

    let output = run_with(vec![suite], fixed_env(&[]), |builder| {
        builder.set_default_order(OrderStrategy::Alphanumeric);
    })?;
    assert_eq!(output.started(), vec!["alpha", "zeta", "y", "x"]);
    Ok(())
}

#[test]
fn units_run_before_nested_suites() -> Result<()> {
    test_init();

    let suite = Suite::new("Outer")
        .child(Suite::new("Nested").unit(unit("nested")))
        .unit(unit("outer"));

    let output = run_suites(vec![suite])?;
    assert_eq!(output.started(), vec!["outer", "nested"]);
    Ok(())
}

#[test_case(7 ; "seed 7")]
#[test_case(1234567 ; "seed 1234567")]
fn random_order_is_reproducible(seed: u64) -> Result<()> {
    test_init();

    let suite = || {
        let mut suite = Suite::new("Shuffled").order(OrderStrategy::Random);
        for name in ["a", "b", "c", "d", "e", "f", "g", "h"] {
            suite = suite.unit(unit(name));
        }
        suite
    };
    let run = || {
        run_with(vec![suite()], fixed_env(&[]), |builder| {
            builder.set_seed(RunSeed(seed));
        })
    };

    let first = run()?.started();
    let second = run()?.started();
    assert_eq!(first, second, "same seed, same order");

    let mut sorted = first.clone();
    sorted.sort();
    ensure!(
        sorted == ["a", "b", "c", "d", "e", "f", "g", "h"],
        "random order is a permutation: {first:?}"
    );
    Ok(())
}
