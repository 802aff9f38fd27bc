//! `for tumbling window` / `for sliding window` partitioning.
//!
//! A [`WindowClause`] is compiled once and shared; [`WindowClause::evaluate`]
//! hands out a fresh [`Windows`] iterator holding all per-evaluation state.
mod eval;

use core::fmt;
use std::sync::Arc;

use smallvec::SmallVec;

use crate::error::{Error, ErrorCode};
use crate::xdm::{ExpandedName, XdmItem, XdmSequence};

pub use eval::{Window, Windows};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WindowKind {
    Tumbling,
    Sliding,
}

impl fmt::Display for WindowKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            WindowKind::Tumbling => "tumbling",
            WindowKind::Sliding => "sliding",
        })
    }
}

/// Variables a start or end condition declares. Undeclared bindings are
/// never computed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WindowVars {
    pub current: Option<ExpandedName>,
    pub position: Option<ExpandedName>,
    pub previous: Option<ExpandedName>,
    pub next: Option<ExpandedName>,
}

impl WindowVars {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_current(mut self, name: impl Into<ExpandedName>) -> Self {
        self.current = Some(name.into());
        self
    }

    pub fn with_position(mut self, name: impl Into<ExpandedName>) -> Self {
        self.position = Some(name.into());
        self
    }

    pub fn with_previous(mut self, name: impl Into<ExpandedName>) -> Self {
        self.previous = Some(name.into());
        self
    }

    pub fn with_next(mut self, name: impl Into<ExpandedName>) -> Self {
        self.next = Some(name.into());
        self
    }

    fn names(&self) -> impl Iterator<Item = &ExpandedName> {
        [&self.current, &self.position, &self.previous, &self.next]
            .into_iter()
            .flatten()
    }

    /// Bind the declared variables for the item at `idx` (0-based).
    fn bind<N: Clone>(&self, input: &[XdmItem<N>], idx: usize, out: &mut WindowBindings<N>) {
        if let Some(name) = &self.current {
            out.push(name.clone(), input.get(idx).cloned().into_iter().collect());
        }
        if let Some(name) = &self.position {
            let pos = i64::try_from(idx + 1).unwrap_or(i64::MAX);
            out.push(name.clone(), vec![XdmItem::Atomic(crate::xdm::XdmAtomicValue::Integer(pos))]);
        }
        if let Some(name) = &self.previous {
            let prev = idx.checked_sub(1).and_then(|p| input.get(p)).cloned();
            out.push(name.clone(), prev.into_iter().collect());
        }
        if let Some(name) = &self.next {
            out.push(name.clone(), input.get(idx + 1).cloned().into_iter().collect());
        }
    }
}

/// Variable bindings visible to a condition, and attached to each emitted
/// window.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowBindings<N> {
    vars: SmallVec<[(ExpandedName, XdmSequence<N>); 8]>,
}

impl<N> Default for WindowBindings<N> {
    fn default() -> Self {
        Self { vars: SmallVec::new() }
    }
}

impl<N> WindowBindings<N> {
    fn push(&mut self, name: ExpandedName, value: XdmSequence<N>) {
        self.vars.push((name, value));
    }

    pub fn get(&self, name: &ExpandedName) -> Option<&[XdmItem<N>]> {
        self.vars
            .iter()
            .rev()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_slice())
    }

    /// Lookup by local name for variables without a namespace.
    pub fn get_local(&self, local: &str) -> Option<&[XdmItem<N>]> {
        self.get(&ExpandedName::local(local))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ExpandedName, &[XdmItem<N>])> {
        self.vars.iter().map(|(n, v)| (n, v.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}

/// Boolean condition evaluated at each candidate boundary.
///
/// Closures `Fn(&WindowBindings<N>) -> Result<bool, Error>` implement this.
pub trait WindowPredicate<N>: Send + Sync {
    fn evaluate(&self, bindings: &WindowBindings<N>) -> Result<bool, Error>;
}

impl<N, F> WindowPredicate<N> for F
where
    F: Fn(&WindowBindings<N>) -> Result<bool, Error> + Send + Sync,
{
    fn evaluate(&self, bindings: &WindowBindings<N>) -> Result<bool, Error> {
        self(bindings)
    }
}

pub struct WindowCondition<N> {
    vars: WindowVars,
    only: bool,
    predicate: Arc<dyn WindowPredicate<N>>,
}

impl<N> Clone for WindowCondition<N> {
    fn clone(&self) -> Self {
        Self {
            vars: self.vars.clone(),
            only: self.only,
            predicate: Arc::clone(&self.predicate),
        }
    }
}

impl<N> fmt::Debug for WindowCondition<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WindowCondition")
            .field("vars", &self.vars)
            .field("only", &self.only)
            .finish_non_exhaustive()
    }
}

impl<N> WindowCondition<N> {
    pub fn start(vars: WindowVars, predicate: impl WindowPredicate<N> + 'static) -> Self {
        Self { vars, only: false, predicate: Arc::new(predicate) }
    }

    pub fn end(vars: WindowVars, predicate: impl WindowPredicate<N> + 'static) -> Self {
        Self::start(vars, predicate)
    }

    /// `only end ...`: the window is discarded if no end is found. A match
    /// at an item that also satisfies the start condition closes the window
    /// one item earlier and leaves that item to open the next window.
    pub fn only_end(vars: WindowVars, predicate: impl WindowPredicate<N> + 'static) -> Self {
        Self { vars, only: true, predicate: Arc::new(predicate) }
    }

    pub fn vars(&self) -> &WindowVars {
        &self.vars
    }

    pub fn is_only(&self) -> bool {
        self.only
    }

    fn test(&self, bindings: &WindowBindings<N>) -> Result<bool, Error> {
        self.predicate.evaluate(bindings)
    }
}

/// A compiled window clause.
#[derive(Debug, Clone)]
pub struct WindowClause<N> {
    kind: WindowKind,
    var: ExpandedName,
    start: WindowCondition<N>,
    end: Option<WindowCondition<N>>,
}

impl<N> WindowClause<N> {
    /// Compile a clause. All variable names, the window variable included,
    /// must be distinct (`XQST0103`).
    pub fn new(
        kind: WindowKind,
        var: impl Into<ExpandedName>,
        start: WindowCondition<N>,
        end: Option<WindowCondition<N>>,
    ) -> Result<Self, Error> {
        let var = var.into();
        if start.only {
            return Err(Error::syntax("'only' applies to end conditions"));
        }
        let mut seen: Vec<&ExpandedName> = vec![&var];
        let names = start
            .vars
            .names()
            .chain(end.iter().flat_map(|e| e.vars.names()));
        for name in names {
            if seen.contains(&name) {
                return Err(Error::from_code(
                    ErrorCode::XQST0103,
                    format!("window variable ${name} is bound more than once"),
                ));
            }
            seen.push(name);
        }
        Ok(Self { kind, var, start, end })
    }

    pub fn tumbling(
        var: impl Into<ExpandedName>,
        start: WindowCondition<N>,
        end: Option<WindowCondition<N>>,
    ) -> Result<Self, Error> {
        Self::new(WindowKind::Tumbling, var, start, end)
    }

    pub fn sliding(
        var: impl Into<ExpandedName>,
        start: WindowCondition<N>,
        end: Option<WindowCondition<N>>,
    ) -> Result<Self, Error> {
        Self::new(WindowKind::Sliding, var, start, end)
    }

    pub fn kind(&self) -> WindowKind {
        self.kind
    }

    pub fn var(&self) -> &ExpandedName {
        &self.var
    }
}

impl<N: Clone> WindowClause<N> {
    /// Start a fresh evaluation over `input`.
    pub fn evaluate<'a>(&'a self, input: &'a [XdmItem<N>]) -> Windows<'a, N> {
        Windows::new(self, input)
    }

    /// Evaluate eagerly, stopping at the first predicate error.
    pub fn evaluate_all(&self, input: &[XdmItem<N>]) -> Result<Vec<Window<N>>, Error> {
        self.evaluate(input).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::simple::SimpleNode;
    use rstest::rstest;

    fn always(_: &WindowBindings<SimpleNode>) -> Result<bool, Error> {
        Ok(true)
    }

    #[rstest]
    fn duplicate_variables_are_rejected() {
        let start = WindowCondition::start(WindowVars::new().with_position("s"), always);
        let end = WindowCondition::end(WindowVars::new().with_position("s"), always);
        let err = WindowClause::tumbling("w", start, Some(end)).unwrap_err();
        assert_eq!(err.code_enum(), ErrorCode::XQST0103);
    }

    #[rstest]
    fn window_variable_clashes_with_condition_variable() {
        let start = WindowCondition::start(WindowVars::new().with_current("w"), always);
        let err = WindowClause::sliding("w", start, None).unwrap_err();
        assert_eq!(err.code_enum(), ErrorCode::XQST0103);
    }

    #[rstest]
    fn only_is_rejected_on_start() {
        let start = WindowCondition::only_end(WindowVars::new(), always);
        assert!(WindowClause::tumbling("w", start, None).is_err());
    }

    #[rstest]
    fn later_bindings_shadow_earlier_ones() {
        let mut b: WindowBindings<SimpleNode> = WindowBindings::default();
        b.push("x".into(), vec![]);
        b.push("x".into(), vec![XdmItem::Atomic(crate::xdm::XdmAtomicValue::Integer(1))]);
        assert_eq!(b.get_local("x").map(<[_]>::len), Some(1));
        assert_eq!(b.len(), 2);
    }
}
