// Copyright (c) The trialrun Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::{Suite, SuiteHooks, SuitePath, Unit, UnitId};
use crate::{
    condition::{self, Eligibility, EnvSnapshot},
    errors::{DiscoveryError, DisplayErrorChain},
    expand,
    helpers::plural,
    order::{OrderStrategy, Orderable},
    test_filter::{FilterMatch, TestFilter},
};
use owo_colors::{OwoColorize, Style};
use std::{
    collections::{BTreeSet, HashSet},
    io::{self, Write},
    sync::Arc,
};
use tracing::debug;

/// The result of discovery: every suite and unit reachable from a set of root suites.
///
/// Roots are stored behind an [`Arc`] so that independent roots can be executed in parallel.
#[derive(Clone, Debug)]
pub struct TestList {
    roots: Vec<Arc<SuiteInstance>>,
    unit_count: usize,
    matching_count: usize,
    execution_count: usize,
}

impl TestList {
    /// Walks the given root suites and produces a test list.
    ///
    /// Per-unit definition errors are attached to the unit (see
    /// [`TestInstance::definition_error`]). A suite whose name repeats an earlier sibling's is
    /// still discovered, but every unit beneath it carries [`DiscoveryError::DuplicateSuite`].
    /// Returns [`DiscoveryError::SuiteCycle`] if a suite path is otherwise reached more than once.
    pub fn discover(
        roots: impl IntoIterator<Item = Suite>,
        filter: &TestFilter,
    ) -> Result<Self, DiscoveryError> {
        let mut visited = HashSet::new();
        let mut root_names = HashSet::new();
        let no_tags = BTreeSet::new();
        let mut out = Vec::new();
        for root in roots {
            let path = SuitePath::root(root.name());
            let duplicate = (!root_names.insert(root.name().to_owned())).then(|| path.clone());
            let cx = DiscoverContext {
                inherited_tags: &no_tags,
                filter,
                duplicate: duplicate.as_ref(),
            };
            let instance = SuiteInstance::discover(&root, path, cx, &mut visited)?;
            out.push(Arc::new(instance));
        }

        let mut unit_count = 0;
        let mut matching_count = 0;
        let mut execution_count = 0;
        for root in &out {
            for test in root.iter_tests() {
                unit_count += 1;
                if test.is_runnable() {
                    matching_count += 1;
                    execution_count += expand::execution_count(&test.unit);
                }
            }
        }
        debug!(
            unit_count,
            matching_count, execution_count, "discovered {} root suites", out.len()
        );

        Ok(Self {
            roots: out,
            unit_count,
            matching_count,
            execution_count,
        })
    }

    /// Returns the root suites, in declaration order.
    pub fn roots(&self) -> &[Arc<SuiteInstance>] {
        &self.roots
    }

    /// Iterates over every unit in declaration order: for each suite, its own units and then
    /// its nested suites, recursively.
    pub fn iter_tests(&self) -> impl Iterator<Item = &TestInstance> + '_ {
        self.roots.iter().flat_map(|root| root.iter_tests())
    }

    /// The total number of units discovered.
    pub fn unit_count(&self) -> usize {
        self.unit_count
    }

    /// The number of units that match the filter and have no definition errors.
    pub fn matching_count(&self) -> usize {
        self.matching_count
    }

    /// The number of concrete executions the matching units expand to.
    ///
    /// This does not account for enablement predicates, which are evaluated at run time.
    pub fn execution_count(&self) -> usize {
        self.execution_count
    }

    /// Writes the list in a human-readable format, evaluating enablement predicates against
    /// `env`.
    ///
    /// Units that don't match the filter are only shown in verbose mode.
    pub fn write_human(
        &self,
        mut writer: impl Write,
        env: &EnvSnapshot,
        verbose: bool,
        colorize: bool,
    ) -> io::Result<()> {
        let mut styles = Styles::default();
        if colorize {
            styles.colorize();
        }

        for root in &self.roots {
            root.write_human(&mut writer, env, verbose, &styles)?;
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
struct Styles {
    suite: Style,
    unit: Style,
    field: Style,
    skip: Style,
    error: Style,
}

impl Styles {
    fn colorize(&mut self) {
        self.suite = Style::new().magenta().bold();
        self.unit = Style::new().blue().bold();
        self.field = Style::new().yellow().bold();
        self.skip = Style::new().yellow();
        self.error = Style::new().red().bold();
    }
}

/// A discovered suite.
#[derive(Clone, Debug)]
pub struct SuiteInstance {
    /// The path to this suite.
    pub path: SuitePath,

    /// The display name of this suite.
    pub display_name: String,

    /// The effective tags of this suite: its own tags plus those of every enclosing suite.
    pub tags: BTreeSet<String>,

    /// The declared ordering strategy, if any.
    pub order: Option<OrderStrategy>,

    /// The declared order key, if any.
    pub order_key: Option<i32>,

    /// The lifecycle hooks declared on this suite.
    pub hooks: SuiteHooks,

    /// The units in this suite, in declaration order.
    pub units: Vec<TestInstance>,

    /// The nested suites, in declaration order.
    pub children: Vec<SuiteInstance>,
}

impl SuiteInstance {
    fn discover(
        suite: &Suite,
        path: SuitePath,
        cx: DiscoverContext<'_>,
        visited: &mut HashSet<SuitePath>,
    ) -> Result<Self, DiscoveryError> {
        // Paths under a duplicated suite repeat those of the first declaration.
        if cx.duplicate.is_none() && !visited.insert(path.clone()) {
            return Err(DiscoveryError::SuiteCycle { path });
        }

        let tags: BTreeSet<String> = cx.inherited_tags.union(suite.tags()).cloned().collect();

        let mut seen_names = HashSet::new();
        let units = suite
            .units()
            .iter()
            .map(|unit| {
                let first_declaration = seen_names.insert(unit.name());
                TestInstance::new(&path, unit, &tags, &cx, first_declaration)
            })
            .collect();

        let mut seen_children = HashSet::new();
        let children = suite
            .children()
            .iter()
            .map(|child| {
                let child_path = path.join(child.name());
                let duplicate = match cx.duplicate {
                    Some(duplicate) => Some(duplicate.clone()),
                    None => (!seen_children.insert(child.name())).then(|| child_path.clone()),
                };
                let child_cx = DiscoverContext {
                    inherited_tags: &tags,
                    filter: cx.filter,
                    duplicate: duplicate.as_ref(),
                };
                Self::discover(child, child_path, child_cx, visited)
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            display_name: suite.get_display_name().to_owned(),
            tags,
            order: suite.get_order(),
            order_key: suite.get_order_key(),
            hooks: suite.hooks().clone(),
            units,
            children,
            path,
        })
    }

    /// Iterates over the units of this suite and its nested suites, in declaration order.
    pub fn iter_tests(&self) -> Box<dyn Iterator<Item = &TestInstance> + '_> {
        Box::new(
            self.units
                .iter()
                .chain(self.children.iter().flat_map(|child| child.iter_tests())),
        )
    }

    /// Returns true if any unit in this suite or its nested suites matches the filter and has no
    /// definition errors.
    pub fn has_runnable_tests(&self) -> bool {
        self.iter_tests().any(TestInstance::is_runnable)
    }

    fn write_human(
        &self,
        writer: &mut dyn Write,
        env: &EnvSnapshot,
        verbose: bool,
        styles: &Styles,
    ) -> io::Result<()> {
        // Suites without anything to show are left out entirely, but their children may still
        // have matching units.
        if verbose || self.units.iter().any(|test| test.filter_match.is_match()) {
            writeln!(writer, "{}:", self.path.style(styles.suite))?;
            if verbose {
                if self.display_name != self.path.name() {
                    let field = "display name:".style(styles.field);
                    writeln!(writer, "  {field} {}", self.display_name)?;
                }
                if !self.tags.is_empty() {
                    let tags: Vec<_> = self.tags.iter().map(String::as_str).collect();
                    let field = "tags:".style(styles.field);
                    writeln!(writer, "  {field} {}", tags.join(", "))?;
                }
            }

            if self.units.is_empty() {
                writeln!(writer, "    (no units)")?;
            }
            for test in &self.units {
                test.write_human(writer, env, verbose, styles)?;
            }
        }

        for child in &self.children {
            child.write_human(writer, env, verbose, styles)?;
        }
        Ok(())
    }
}

impl Orderable for SuiteInstance {
    fn name(&self) -> &str {
        self.path.name()
    }

    fn order_key(&self) -> Option<i32> {
        self.order_key
    }
}

#[derive(Clone, Copy, Debug)]
struct DiscoverContext<'a> {
    inherited_tags: &'a BTreeSet<String>,
    filter: &'a TestFilter,
    /// Set beneath a suite whose name repeats an earlier sibling's: the duplicated path.
    duplicate: Option<&'a SuitePath>,
}

/// A discovered unit, along with everything discovery determined about it.
#[derive(Clone, Debug)]
pub struct TestInstance {
    /// The identity of the unit.
    pub id: UnitId,

    /// The effective tags: the unit's own tags plus those of every enclosing suite.
    pub tags: BTreeSet<String>,

    /// Whether the unit matches the test filter.
    pub filter_match: FilterMatch,

    /// A problem with the unit's definition, if any. Units with definition errors are reported
    /// as failed without running.
    pub definition_error: Option<DiscoveryError>,

    /// The unit definition.
    pub unit: Unit,
}

impl TestInstance {
    fn new(
        suite_path: &SuitePath,
        unit: &Unit,
        suite_tags: &BTreeSet<String>,
        cx: &DiscoverContext<'_>,
        first_declaration: bool,
    ) -> Self {
        let id = UnitId::new(suite_path.clone(), unit.name());
        let tags: BTreeSet<String> = suite_tags.union(unit.tags()).cloned().collect();
        let filter_match = cx.filter.filter_match(&id, &tags);

        let definition_error = if let Some(duplicate) = cx.duplicate {
            Some(DiscoveryError::DuplicateSuite {
                path: duplicate.clone(),
            })
        } else if unit.name().is_empty() {
            Some(DiscoveryError::EmptyName {
                suite: suite_path.clone(),
            })
        } else if !first_declaration {
            Some(DiscoveryError::DuplicateUnit { id: id.clone() })
        } else if unit.get_repetitions() == Some(0) {
            Some(DiscoveryError::ZeroRepetitions { id: id.clone() })
        } else if unit.get_parameters().is_some_and(|params| params.is_empty()) {
            Some(DiscoveryError::EmptyParameterSource { id: id.clone() })
        } else {
            None
        };

        Self {
            id,
            tags,
            filter_match,
            definition_error,
            unit: unit.clone(),
        }
    }

    /// Returns true if this unit matches the filter and has no definition errors.
    pub fn is_runnable(&self) -> bool {
        self.filter_match.is_match() && self.definition_error.is_none()
    }

    fn write_human(
        &self,
        writer: &mut dyn Write,
        env: &EnvSnapshot,
        verbose: bool,
        styles: &Styles,
    ) -> io::Result<()> {
        if let FilterMatch::Mismatch { reason } = self.filter_match {
            if verbose {
                write!(writer, "    {}", self.id.name.style(styles.unit))?;
                writeln!(writer, " {}", format!("(filtered: {reason})").style(styles.skip))?;
            }
            return Ok(());
        }

        write!(writer, "    {}", self.id.name.style(styles.unit))?;
        if let Some(error) = &self.definition_error {
            return writeln!(writer, " {}", format!("(error: {error})").style(styles.error));
        }

        let executions = expand::execution_count(&self.unit);
        if executions > 1 {
            write!(writer, " ({executions} {})", plural(executions, "execution", "executions"))?;
        }
        match condition::evaluate(&self.unit, env) {
            Ok(Eligibility::Eligible) => {}
            Ok(Eligibility::Skipped(skip)) => {
                write!(writer, " {}", format!("(skipped: {skip})").style(styles.skip))?;
            }
            Err(error) => {
                let message = format!("(error: {})", DisplayErrorChain::new(&error));
                write!(writer, " {}", message.style(styles.error))?;
            }
        }
        writeln!(writer)?;

        if verbose {
            if self.unit.get_display_name() != self.id.name {
                writeln!(
                    writer,
                    "        {} {}",
                    "display name:".style(styles.field),
                    self.unit.get_display_name(),
                )?;
            }
            if !self.tags.is_empty() {
                let tags: Vec<_> = self.tags.iter().map(String::as_str).collect();
                let field = "tags:".style(styles.field);
                writeln!(writer, "        {field} {}", tags.join(", "))?;
            }
        }
        Ok(())
    }
}

impl Orderable for TestInstance {
    fn name(&self) -> &str {
        &self.id.name
    }

    fn order_key(&self) -> Option<i32> {
        self.unit.get_order_key()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        condition::{OsKind, Predicate},
        test_filter::{MismatchReason, TestFilterBuilder},
    };
    use pretty_assertions::assert_eq;

    fn noop(name: &str) -> Unit {
        Unit::blocking(name, |_| Ok(()))
    }

    fn sample_tree() -> Suite {
        Suite::new("Outer")
            .tag("sample")
            .unit(noop("first"))
            .child(
                Suite::new("Inner")
                    .tag("inner")
                    .unit(noop("nested").tag("deep"))
                    .child(Suite::new("Innermost").unit(noop("leaf"))),
            )
            .unit(noop("second").parameters(["a", "b"]).repetitions(3))
    }

    #[test]
    fn discovery_is_in_declaration_order() {
        let list = TestList::discover([sample_tree()], &TestFilter::all()).unwrap();
        let ids: Vec<_> = list.iter_tests().map(|t| t.id.to_string()).collect();
        assert_eq!(
            ids,
            vec![
                "Outer::first",
                "Outer::second",
                "Outer::Inner::nested",
                "Outer::Inner::Innermost::leaf",
            ]
        );
        assert_eq!(list.unit_count(), 4);
        assert_eq!(list.matching_count(), 4);
        // first + second (2 params * 3 reps) + nested + leaf
        assert_eq!(list.execution_count(), 1 + 6 + 1 + 1);
    }

    #[test]
    fn tags_are_inherited() {
        let list = TestList::discover([sample_tree()], &TestFilter::all()).unwrap();
        let nested = list
            .iter_tests()
            .find(|t| t.id.name == "nested")
            .expect("nested unit discovered");
        let tags: Vec<_> = nested.tags.iter().map(String::as_str).collect();
        assert_eq!(tags, vec!["deep", "inner", "sample"]);
    }

    #[test]
    fn filter_is_applied_during_discovery() {
        let mut builder = TestFilterBuilder::default();
        builder.add_tag("inner");
        let list = TestList::discover([sample_tree()], &builder.build()).unwrap();

        let matches: Vec<_> = list
            .iter_tests()
            .map(|t| (t.id.name.as_str(), t.filter_match))
            .collect();
        assert_eq!(
            matches,
            vec![
                (
                    "first",
                    FilterMatch::Mismatch {
                        reason: MismatchReason::Tag
                    }
                ),
                (
                    "second",
                    FilterMatch::Mismatch {
                        reason: MismatchReason::Tag
                    }
                ),
                ("nested", FilterMatch::Matches),
                ("leaf", FilterMatch::Matches),
            ]
        );
        assert_eq!(list.matching_count(), 2);
    }

    #[test]
    fn duplicate_sibling_suites_fail_only_their_units() {
        let root = Suite::new("Root")
            .unit(noop("innocent"))
            .child(Suite::new("Twin").unit(noop("a")))
            .child(
                Suite::new("Twin")
                    .unit(noop("b"))
                    .child(Suite::new("Inner").unit(noop("c"))),
            );
        let other = Suite::new("OtherRoot").unit(noop("unrelated"));
        let list = TestList::discover([root, other], &TestFilter::all()).unwrap();

        let twin = SuitePath::root("Root").join("Twin");
        let errors: Vec<_> = list
            .iter_tests()
            .map(|test| (test.id.to_string(), test.definition_error.clone()))
            .collect();
        assert_eq!(
            errors,
            vec![
                ("Root::innocent".to_owned(), None),
                ("Root::Twin::a".to_owned(), None),
                (
                    "Root::Twin::b".to_owned(),
                    Some(DiscoveryError::DuplicateSuite { path: twin.clone() })
                ),
                (
                    "Root::Twin::Inner::c".to_owned(),
                    Some(DiscoveryError::DuplicateSuite { path: twin })
                ),
                ("OtherRoot::unrelated".to_owned(), None),
            ]
        );
        assert_eq!(list.matching_count(), 3);
    }

    #[test]
    fn duplicate_root_suites_fail_only_their_units() {
        let list = TestList::discover(
            [
                Suite::new("Root").unit(noop("first")),
                Suite::new("Root").unit(noop("second")),
            ],
            &TestFilter::all(),
        )
        .unwrap();
        let runnable: Vec<_> = list
            .iter_tests()
            .filter(|test| test.is_runnable())
            .map(|test| test.id.name.as_str())
            .collect();
        assert_eq!(runnable, vec!["first"]);
    }

    #[test]
    fn write_human_shows_eligibility() {
        let root = Suite::new("Root")
            .tag("sample")
            .unit(noop("runs").parameters([1, 2]))
            .unit(noop("windows_only").predicate(Predicate::EnabledOnOs(vec![OsKind::Windows])))
            .unit(noop("dup"))
            .unit(noop("dup"))
            .child(Suite::new("Filtered").unit(noop("hidden")));
        let mut builder = TestFilterBuilder::default();
        builder.add_skip_pattern("hidden");
        let list = TestList::discover([root], &builder.build()).unwrap();
        let env = EnvSnapshot::new(
            OsKind::Linux,
            semver::Version::new(1, 0, 0),
            Vec::<(String, String)>::new(),
        );

        let mut out = Vec::new();
        list.write_human(&mut out, &env, false, false).unwrap();
        let out = String::from_utf8(out).unwrap();
        let lines: Vec<_> = out.lines().collect();
        assert_eq!(lines[0], "Root:");
        assert_eq!(lines[1], "    runs (2 executions)");
        assert!(lines[2].starts_with("    windows_only (skipped: "), "{out}");
        assert_eq!(lines[3], "    dup");
        assert!(lines[4].starts_with("    dup (error: "), "{out}");
        assert_eq!(lines.len(), 5, "filtered suite left out: {out}");

        let mut out = Vec::new();
        list.write_human(&mut out, &env, true, false).unwrap();
        let out = String::from_utf8(out).unwrap();
        assert!(out.contains("  tags: sample\n"), "{out}");
        assert!(out.contains("Root::Filtered:\n"), "{out}");
        assert!(out.contains("    hidden (filtered: "), "{out}");
    }

    #[test]
    fn unit_definition_errors_are_attached() {
        let root = Suite::new("Root")
            .unit(noop("dup"))
            .unit(noop("dup"))
            .unit(noop("never").repetitions(0))
            .unit(noop("empty").parameters(Vec::<String>::new()))
            .unit(noop("fine"));
        let list = TestList::discover([root], &TestFilter::all()).unwrap();

        let errors: Vec<_> = list
            .iter_tests()
            .map(|t| t.definition_error.is_some())
            .collect();
        assert_eq!(errors, vec![false, true, true, true, false]);
        assert_eq!(list.matching_count(), 2);
        assert!(matches!(
            list.iter_tests().nth(2).unwrap().definition_error,
            Some(DiscoveryError::ZeroRepetitions { .. })
        ));
    }
}
