use crate::error::Error;
use crate::xdm::{XdmItem, XdmSequence};

use super::{WindowBindings, WindowClause, WindowCondition, WindowKind};

/// One emitted window.
#[derive(Debug, Clone, PartialEq)]
pub struct Window<N> {
    pub items: XdmSequence<N>,
    /// 1-based position of the first item.
    pub start: usize,
    /// 1-based position of the last item.
    pub end: usize,
    /// Window variable plus every declared start and end variable. End
    /// variables describe the item at `end`, so an `only end` window closed
    /// by a match that opens the next window binds them to the item before
    /// the match.
    pub bindings: WindowBindings<N>,
}

/// Lazy window iterator. Owns the cursor state of a single evaluation and
/// yields `Err` at most once, after which it is exhausted.
pub struct Windows<'a, N> {
    clause: &'a WindowClause<N>,
    input: &'a [XdmItem<N>],
    cursor: usize,
    // start match already established at this index by the previous window
    known_start: Option<usize>,
    done: bool,
}

impl<'a, N: Clone> Windows<'a, N> {
    pub(super) fn new(clause: &'a WindowClause<N>, input: &'a [XdmItem<N>]) -> Self {
        Self { clause, input, cursor: 0, known_start: None, done: false }
    }

    fn bindings_at(&self, cond: &WindowCondition<N>, idx: usize) -> WindowBindings<N> {
        let mut b = WindowBindings::default();
        cond.vars.bind(self.input, idx, &mut b);
        b
    }

    fn start_matches(&self, idx: usize) -> Result<bool, Error> {
        if self.known_start == Some(idx) {
            return Ok(true);
        }
        let start = &self.clause.start;
        start.test(&self.bindings_at(start, idx))
    }

    fn find_start(&self, from: usize) -> Result<Option<usize>, Error> {
        for idx in from..self.input.len() {
            if self.start_matches(idx)? {
                return Ok(Some(idx));
            }
        }
        Ok(None)
    }

    fn emit(&self, s: usize, last: usize) -> Window<N> {
        let mut bindings = WindowBindings::default();
        let items: XdmSequence<N> = self.input[s..=last].to_vec();
        bindings.push(self.clause.var.clone(), items.clone());
        self.clause.start.vars.bind(self.input, s, &mut bindings);
        if let Some(end) = &self.clause.end {
            end.vars.bind(self.input, last, &mut bindings);
        }
        tracing::trace!(kind = %self.clause.kind, start = s + 1, end = last + 1, "window emitted");
        Window { items, start: s + 1, end: last + 1, bindings }
    }

    /// Closing position of the window opened at `s`, or `None` if it is
    /// discarded.
    fn find_end(&mut self, s: usize, end: &WindowCondition<N>) -> Result<Option<usize>, Error> {
        let tumbling = self.clause.kind == WindowKind::Tumbling;
        let start_bindings = self.bindings_at(&self.clause.start, s);
        for e in s..self.input.len() {
            let mut b = start_bindings.clone();
            end.vars.bind(self.input, e, &mut b);
            if !end.test(&b)? {
                continue;
            }
            if end.only && e > s && self.start_matches(e)? {
                // e opens the next window instead of closing this one
                if tumbling {
                    self.cursor = e;
                    self.known_start = Some(e);
                }
                return Ok(Some(e - 1));
            }
            if tumbling {
                self.cursor = e + 1;
            }
            return Ok(Some(e));
        }
        tracing::trace!(start = s + 1, only = end.only, "input exhausted before window end");
        if tumbling {
            self.done = true;
        }
        Ok(if end.only { None } else { Some(self.input.len() - 1) })
    }

    fn step(&mut self) -> Result<Option<Window<N>>, Error> {
        while !self.done {
            let Some(s) = self.find_start(self.cursor)? else {
                self.done = true;
                break;
            };
            let tumbling = self.clause.kind == WindowKind::Tumbling;
            if !tumbling {
                self.cursor = s + 1;
            }
            let clause = self.clause;
            let last = match &clause.end {
                Some(end) => self.find_end(s, end)?,
                None if tumbling => {
                    let last = match self.find_start(s + 1)? {
                        Some(next) => {
                            self.known_start = Some(next);
                            next - 1
                        }
                        None => self.input.len() - 1,
                    };
                    self.cursor = last + 1;
                    Some(last)
                }
                None => Some(self.input.len() - 1),
            };
            if let Some(last) = last {
                return Ok(Some(self.emit(s, last)));
            }
        }
        Ok(None)
    }
}

impl<N: Clone> Iterator for Windows<'_, N> {
    type Item = Result<Window<N>, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.step() {
            Ok(w) => w.map(Ok),
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
