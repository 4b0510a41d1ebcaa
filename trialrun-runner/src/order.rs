// Copyright (c) The trialrun Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Ordering sibling units and suites.
//!
//! Within a suite, units run first, followed by child suites. Both lists are ordered with the
//! suite's [`OrderStrategy`].

use crate::{errors::OrderStrategyParseError, list::SuitePath};
use rand::{SeedableRng, rngs::StdRng, seq::SliceRandom};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use xxhash_rust::xxh3::xxh3_64_with_seed;

/// How siblings within a suite are ordered.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum OrderStrategy {
    /// Declaration order.
    ///
    /// This is the default.
    #[default]
    Declared,

    /// Lexical order by name. Ties keep declaration order.
    Alphanumeric,

    /// A shuffle driven by the run seed.
    Random,

    /// Ascending by declared order key. Items without a key come last; ties keep declaration
    /// order.
    Explicit,
}

impl OrderStrategy {
    /// Returns the string values this strategy can be parsed from.
    pub fn variants() -> [&'static str; 4] {
        ["declared", "alphanumeric", "random", "explicit"]
    }
}

impl fmt::Display for OrderStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderStrategy::Declared => write!(f, "declared"),
            OrderStrategy::Alphanumeric => write!(f, "alphanumeric"),
            OrderStrategy::Random => write!(f, "random"),
            OrderStrategy::Explicit => write!(f, "explicit"),
        }
    }
}

impl FromStr for OrderStrategy {
    type Err = OrderStrategyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let val = match s {
            "declared" => OrderStrategy::Declared,
            "alphanumeric" => OrderStrategy::Alphanumeric,
            "random" => OrderStrategy::Random,
            "explicit" => OrderStrategy::Explicit,
            other => return Err(OrderStrategyParseError::new(other)),
        };
        Ok(val)
    }
}

/// Something that can be ordered among its siblings.
pub trait Orderable {
    /// The name used for [`OrderStrategy::Alphanumeric`].
    fn name(&self) -> &str;

    /// The key used for [`OrderStrategy::Explicit`].
    fn order_key(&self) -> Option<i32>;
}

impl<T: Orderable + ?Sized> Orderable for &T {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn order_key(&self) -> Option<i32> {
        (**self).order_key()
    }
}

/// The seed that drives [`OrderStrategy::Random`].
///
/// The same seed produces the same order for every suite.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Deserialize, Serialize)]
#[serde(transparent)]
pub struct RunSeed(pub u64);

impl RunSeed {
    /// Generates a new random seed.
    pub fn generate() -> Self {
        Self(rand::random())
    }

    /// Derives the seed for a specific suite, so that sibling lists in different suites are
    /// shuffled independently.
    pub fn for_scope(self, path: &SuitePath) -> u64 {
        xxh3_64_with_seed(path.to_string().as_bytes(), self.0)
    }
}

impl fmt::Display for RunSeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Orders a list of siblings according to `strategy`.
///
/// `scope_seed` is only consulted for [`OrderStrategy::Random`]; see [`RunSeed::for_scope`].
/// The result is always a permutation of the input.
pub fn order_siblings<T: Orderable>(
    mut items: Vec<T>,
    strategy: OrderStrategy,
    scope_seed: u64,
) -> Vec<T> {
    match strategy {
        OrderStrategy::Declared => {}
        // sort_by is stable, so ties keep declaration order.
        OrderStrategy::Alphanumeric => items.sort_by(|a, b| a.name().cmp(b.name())),
        OrderStrategy::Explicit => {
            items.sort_by_key(|item| match item.order_key() {
                Some(key) => (false, key),
                None => (true, 0),
            });
        }
        OrderStrategy::Random => {
            let mut rng = StdRng::seed_from_u64(scope_seed);
            items.shuffle(&mut rng);
        }
    }
    items
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use test_case::test_case;
    use test_strategy::proptest;

    #[derive(Clone, Debug, Eq, PartialEq)]
    struct Item {
        name: String,
        key: Option<i32>,
    }

    impl Item {
        fn new(name: &str, key: Option<i32>) -> Self {
            Self {
                name: name.to_owned(),
                key,
            }
        }
    }

    impl Orderable for Item {
        fn name(&self) -> &str {
            &self.name
        }

        fn order_key(&self) -> Option<i32> {
            self.key
        }
    }

    fn names(items: &[Item]) -> Vec<&str> {
        items.iter().map(|item| item.name.as_str()).collect()
    }

    #[test]
    fn alphanumeric_sorts_by_name() {
        let items = vec![
            Item::new("b", None),
            Item::new("a", None),
            Item::new("c", None),
        ];
        let ordered = order_siblings(items, OrderStrategy::Alphanumeric, 0);
        assert_eq!(names(&ordered), vec!["a", "b", "c"]);
    }

    #[test]
    fn explicit_puts_unkeyed_last() {
        let items = vec![
            Item::new("B", Some(2)),
            Item::new("A", Some(1)),
            Item::new("C", None),
        ];
        let ordered = order_siblings(items, OrderStrategy::Explicit, 0);
        assert_eq!(names(&ordered), vec!["A", "B", "C"]);
    }

    #[test]
    fn ties_keep_declaration_order() {
        let items = vec![
            Item::new("x", Some(1)),
            Item::new("y", None),
            Item::new("z", Some(1)),
            Item::new("w", None),
        ];
        let ordered = order_siblings(items, OrderStrategy::Explicit, 0);
        assert_eq!(names(&ordered), vec!["x", "z", "y", "w"]);
    }

    #[test]
    fn random_is_deterministic_per_seed() {
        let items: Vec<_> = (0..32).map(|i| Item::new(&i.to_string(), None)).collect();
        let path = SuitePath::root("SampleTests");
        let seed = RunSeed(42).for_scope(&path);

        let first = order_siblings(items.clone(), OrderStrategy::Random, seed);
        let second = order_siblings(items.clone(), OrderStrategy::Random, seed);
        assert_eq!(first, second);

        let other_scope = RunSeed(42).for_scope(&path.join("nestedTest"));
        assert_ne!(seed, other_scope);
    }

    #[test_case("declared", OrderStrategy::Declared)]
    #[test_case("alphanumeric", OrderStrategy::Alphanumeric)]
    #[test_case("random", OrderStrategy::Random)]
    #[test_case("explicit", OrderStrategy::Explicit)]
    fn strategy_round_trips_through_strings(input: &str, expected: OrderStrategy) {
        let parsed: OrderStrategy = input.parse().unwrap();
        assert_eq!(parsed, expected);
        assert_eq!(parsed.to_string(), input);
    }

    #[test]
    fn unknown_strategy_lists_variants() {
        let err = "method-name".parse::<OrderStrategy>().unwrap_err();
        assert_eq!(
            err.to_string(),
            "unrecognized value for order: method-name\n\
             (known values: declared, alphanumeric, random, explicit)"
        );
    }

    #[proptest]
    fn ordering_is_a_permutation(
        #[strategy(proptest::collection::vec(("[a-z]{1,4}", proptest::option::of(-5i32..5)), 0..16))]
        input: Vec<(String, Option<i32>)>,
        strategy_index: u8,
        seed: u64,
    ) {
        let strategy = match strategy_index % 4 {
            0 => OrderStrategy::Declared,
            1 => OrderStrategy::Alphanumeric,
            2 => OrderStrategy::Random,
            _ => OrderStrategy::Explicit,
        };
        let items: Vec<_> = input
            .iter()
            .map(|(name, key)| Item::new(name, *key))
            .collect();
        let mut ordered = order_siblings(items.clone(), strategy, seed);

        let mut expected = items;
        expected.sort_by(|a, b| (&a.name, a.key).cmp(&(&b.name, b.key)));
        ordered.sort_by(|a, b| (&a.name, a.key).cmp(&(&b.name, b.key)));
        proptest::prop_assert_eq!(ordered, expected);
    }
}
