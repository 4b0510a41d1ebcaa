// Copyright (c) The trialrun Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{
    condition::Predicate,
    errors::BoxError,
    order::OrderStrategy,
    runner::{ExecutionContext, SuiteContext},
};
use debug_ignore::DebugIgnore;
use futures::future::BoxFuture;
use std::{collections::BTreeSet, fmt, future::Future, sync::Arc, time::Duration};

/// The result returned by unit bodies and hooks.
pub type UnitResult = Result<(), BoxError>;

/// The path from a root suite to a (possibly nested) suite.
#[derive(Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct SuitePath {
    segments: Vec<String>,
}

impl SuitePath {
    /// Creates a path for a root suite.
    pub fn root(name: impl Into<String>) -> Self {
        Self {
            segments: vec![name.into()],
        }
    }

    /// Returns the path of a child suite of this one.
    pub fn join(&self, name: impl Into<String>) -> Self {
        let mut segments = self.segments.clone();
        segments.push(name.into());
        Self { segments }
    }

    /// The name of the innermost suite.
    pub fn name(&self) -> &str {
        self.segments.last().map_or("", String::as_str)
    }

    /// The segments of this path, outermost first.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// The nesting depth of this path: 1 for a root suite.
    pub fn depth(&self) -> usize {
        self.segments.len()
    }
}

impl fmt::Display for SuitePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join("::"))
    }
}

/// The identity of a unit: the path of its suite plus its name.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct UnitId {
    /// The suite that declares the unit.
    pub suite: SuitePath,

    /// The name of the unit.
    pub name: String,
}

impl UnitId {
    /// Creates a new unit identifier.
    pub fn new(suite: SuitePath, name: impl Into<String>) -> Self {
        Self {
            suite,
            name: name.into(),
        }
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.suite, self.name)
    }
}

/// A literal parameter value supplied to a parameterized unit.
#[derive(Clone, Debug, PartialEq)]
pub enum ParamValue {
    /// A string.
    String(String),
    /// A signed integer.
    Int(i64),
    /// A floating-point number.
    Float(f64),
    /// A boolean.
    Bool(bool),
    /// A single character.
    Char(char),
}

impl ParamValue {
    /// Returns the value as a string slice, if it is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the value as an integer, if it is one.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(n) => Some(*n),
            _ => None,
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => write!(f, "{s}"),
            Self::Int(n) => write!(f, "{n}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Char(c) => write!(f, "{c}"),
        }
    }
}

impl From<&str> for ParamValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_owned())
    }
}

impl From<String> for ParamValue {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<i64> for ParamValue {
    fn from(n: i64) -> Self {
        Self::Int(n)
    }
}

impl From<i32> for ParamValue {
    fn from(n: i32) -> Self {
        Self::Int(n.into())
    }
}

impl From<f64> for ParamValue {
    fn from(x: f64) -> Self {
        Self::Float(x)
    }
}

impl From<bool> for ParamValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<char> for ParamValue {
    fn from(c: char) -> Self {
        Self::Char(c)
    }
}

type BlockingFn = dyn Fn(&ExecutionContext) -> UnitResult + Send + Sync;
type AsyncFn = dyn Fn(ExecutionContext) -> BoxFuture<'static, UnitResult> + Send + Sync;

/// The body of a unit.
#[derive(Clone, Debug)]
pub enum UnitBody {
    /// A synchronous body. It runs on a dedicated thread so that a timeout can abandon it.
    Blocking(DebugIgnore<Arc<BlockingFn>>),

    /// An asynchronous body. It runs as a Tokio task, which is aborted on timeout.
    Async(DebugIgnore<Arc<AsyncFn>>),
}

impl UnitBody {
    /// Creates a synchronous body.
    pub fn blocking<F>(f: F) -> Self
    where
        F: Fn(&ExecutionContext) -> UnitResult + Send + Sync + 'static,
    {
        Self::Blocking(DebugIgnore(Arc::new(f)))
    }

    /// Creates an asynchronous body.
    pub fn from_async<F, Fut>(f: F) -> Self
    where
        F: Fn(ExecutionContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = UnitResult> + Send + 'static,
    {
        Self::Async(DebugIgnore(Arc::new(
            move |cx| -> BoxFuture<'static, UnitResult> { Box::pin(f(cx)) },
        )))
    }
}

/// A hook that runs around each concrete execution of a unit.
#[derive(Clone, Debug)]
pub struct UnitHook {
    name: String,
    func: DebugIgnore<Arc<BlockingFn>>,
}

impl UnitHook {
    /// Creates a new hook with the given name.
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&ExecutionContext) -> UnitResult + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            func: DebugIgnore(Arc::new(func)),
        }
    }

    /// The name of the hook, used in failure messages.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn call(&self, cx: &ExecutionContext) -> UnitResult {
        (self.func.0)(cx)
    }
}

type SuiteFn = dyn Fn(&SuiteContext) -> UnitResult + Send + Sync;

/// A hook that runs once per suite, before the first or after the last execution in it.
#[derive(Clone, Debug)]
pub struct SuiteHook {
    name: String,
    func: DebugIgnore<Arc<SuiteFn>>,
}

impl SuiteHook {
    /// Creates a new hook with the given name.
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&SuiteContext) -> UnitResult + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            func: DebugIgnore(Arc::new(func)),
        }
    }

    /// The name of the hook, used in failure messages.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn call(&self, cx: &SuiteContext) -> UnitResult {
        (self.func.0)(cx)
    }
}

/// The lifecycle hooks declared on a suite.
#[derive(Clone, Debug, Default)]
pub struct SuiteHooks {
    /// Runs once before the first eligible execution in the suite (including nested suites).
    pub before_all: Vec<SuiteHook>,

    /// Runs once after the last execution in the suite, if `before_all` succeeded.
    pub after_all: Vec<SuiteHook>,

    /// Runs before every execution in the suite and its nested suites.
    pub before_each: Vec<UnitHook>,

    /// Runs after every execution whose `before_each` hooks succeeded.
    pub after_each: Vec<UnitHook>,
}

/// A single test unit.
///
/// Units are built with a fluent API:
///
/// ```
/// use trialrun_runner::list::Unit;
/// use std::time::Duration;
///
/// let unit = Unit::blocking("parses_header", |_cx| Ok(()))
///     .display_name("parses the header")
///     .tag("parser")
///     .repetitions(3)
///     .timeout(Duration::from_secs(1));
/// assert_eq!(unit.get_repetitions(), Some(3));
/// ```
#[derive(Clone, Debug)]
pub struct Unit {
    name: String,
    display_name: Option<String>,
    tags: BTreeSet<String>,
    parameters: Option<Vec<ParamValue>>,
    repetitions: Option<u32>,
    predicates: Vec<Predicate>,
    order_key: Option<i32>,
    timeout: Option<Duration>,
    temp_dir: bool,
    body: UnitBody,
}

impl Unit {
    /// Creates a new unit with the given body.
    pub fn new(name: impl Into<String>, body: UnitBody) -> Self {
        Self {
            name: name.into(),
            display_name: None,
            tags: BTreeSet::new(),
            parameters: None,
            repetitions: None,
            predicates: Vec::new(),
            order_key: None,
            timeout: None,
            temp_dir: false,
            body,
        }
    }

    /// Creates a new unit with a synchronous body.
    pub fn blocking<F>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&ExecutionContext) -> UnitResult + Send + Sync + 'static,
    {
        Self::new(name, UnitBody::blocking(f))
    }

    /// Creates a new unit with an asynchronous body.
    pub fn from_async<F, Fut>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(ExecutionContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = UnitResult> + Send + 'static,
    {
        Self::new(name, UnitBody::from_async(f))
    }

    /// Sets the display name.
    pub fn display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = Some(display_name.into());
        self
    }

    /// Adds a tag.
    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    /// Sets the parameter source. The unit runs once per value, in order.
    pub fn parameters<I>(mut self, values: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<ParamValue>,
    {
        self.parameters = Some(values.into_iter().map(Into::into).collect());
        self
    }

    /// Sets the repetition count.
    pub fn repetitions(mut self, count: u32) -> Self {
        self.repetitions = Some(count);
        self
    }

    /// Adds an enablement predicate. Predicates are evaluated in the order they're added.
    pub fn predicate(mut self, predicate: Predicate) -> Self {
        self.predicates.push(predicate);
        self
    }

    /// Sets the key used by [`OrderStrategy::Explicit`].
    pub fn order_key(mut self, key: i32) -> Self {
        self.order_key = Some(key);
        self
    }

    /// Bounds the duration of the body.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Requests a scoped temporary directory for every execution of this unit.
    pub fn with_temp_dir(mut self) -> Self {
        self.temp_dir = true;
        self
    }

    // ---
    // Accessors
    // ---

    /// The name of the unit.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The display name, falling back to the name.
    pub fn get_display_name(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.name)
    }

    /// The tags declared directly on this unit.
    pub fn tags(&self) -> &BTreeSet<String> {
        &self.tags
    }

    /// The parameter source, if any.
    pub fn get_parameters(&self) -> Option<&[ParamValue]> {
        self.parameters.as_deref()
    }

    /// The declared repetition count, if any.
    pub fn get_repetitions(&self) -> Option<u32> {
        self.repetitions
    }

    /// The enablement predicates, in evaluation order.
    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    /// The declared order key, if any.
    pub fn get_order_key(&self) -> Option<i32> {
        self.order_key
    }

    /// The timeout for the body, if any.
    pub fn get_timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Whether a scoped temporary directory is requested.
    pub fn uses_temp_dir(&self) -> bool {
        self.temp_dir
    }

    /// The body.
    pub fn body(&self) -> &UnitBody {
        &self.body
    }
}

/// A named group of units and nested suites.
///
/// Child suites are owned by their parent, so a suite tree can't contain cycles.
#[derive(Clone, Debug)]
pub struct Suite {
    name: String,
    display_name: Option<String>,
    tags: BTreeSet<String>,
    order: Option<OrderStrategy>,
    order_key: Option<i32>,
    hooks: SuiteHooks,
    units: Vec<Unit>,
    children: Vec<Suite>,
}

impl Suite {
    /// Creates a new, empty suite.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            display_name: None,
            tags: BTreeSet::new(),
            order: None,
            order_key: None,
            hooks: SuiteHooks::default(),
            units: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Sets the display name.
    pub fn display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = Some(display_name.into());
        self
    }

    /// Adds a tag. Tags are inherited by every unit in this suite and its nested suites.
    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    /// Sets the ordering strategy for the units and child suites of this suite.
    pub fn order(mut self, order: OrderStrategy) -> Self {
        self.order = Some(order);
        self
    }

    /// Sets the key used when the parent suite orders its children with
    /// [`OrderStrategy::Explicit`].
    pub fn order_key(mut self, key: i32) -> Self {
        self.order_key = Some(key);
        self
    }

    /// Adds a hook that runs once before the first execution in this suite.
    pub fn before_all<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&SuiteContext) -> UnitResult + Send + Sync + 'static,
    {
        self.hooks.before_all.push(SuiteHook::new(name, f));
        self
    }

    /// Adds a hook that runs once after the last execution in this suite.
    pub fn after_all<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&SuiteContext) -> UnitResult + Send + Sync + 'static,
    {
        self.hooks.after_all.push(SuiteHook::new(name, f));
        self
    }

    /// Adds a hook that runs before every execution in this suite.
    pub fn before_each<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&ExecutionContext) -> UnitResult + Send + Sync + 'static,
    {
        self.hooks.before_each.push(UnitHook::new(name, f));
        self
    }

    /// Adds a hook that runs after every execution in this suite.
    pub fn after_each<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&ExecutionContext) -> UnitResult + Send + Sync + 'static,
    {
        self.hooks.after_each.push(UnitHook::new(name, f));
        self
    }

    /// Adds a unit.
    pub fn unit(mut self, unit: Unit) -> Self {
        self.units.push(unit);
        self
    }

    /// Adds a nested suite.
    pub fn child(mut self, suite: Suite) -> Self {
        self.children.push(suite);
        self
    }

    // ---
    // Accessors
    // ---

    /// The name of the suite.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The display name, falling back to the name.
    pub fn get_display_name(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.name)
    }

    /// The tags declared directly on this suite.
    pub fn tags(&self) -> &BTreeSet<String> {
        &self.tags
    }

    /// The declared ordering strategy, if any.
    pub fn get_order(&self) -> Option<OrderStrategy> {
        self.order
    }

    /// The declared order key, if any.
    pub fn get_order_key(&self) -> Option<i32> {
        self.order_key
    }

    /// The lifecycle hooks.
    pub fn hooks(&self) -> &SuiteHooks {
        &self.hooks
    }

    /// The units, in declaration order.
    pub fn units(&self) -> &[Unit] {
        &self.units
    }

    /// The nested suites, in declaration order.
    pub fn children(&self) -> &[Suite] {
        &self.children
    }
}
