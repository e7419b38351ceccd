//! The signal store: 4-state values, edge classification, and waiter lists.

use std::collections::HashMap;

use kairos_common::{Arena, Ident, Logic, LogicVec};
use serde::{Deserialize, Serialize};

use crate::ids::{ProcessId, SignalId};

/// The transition kinds an edge-triggered wait can select.
///
/// Edges are judged on bit 0 of the signal, except [`AnyEdge`](EdgeKind::AnyEdge),
/// which fires on any change of the whole vector. A move toward 1 through X
/// or Z still counts as a posedge (and symmetrically for negedge), matching
/// hardware simulator convention.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum EdgeKind {
    /// Transition toward 1: `0→1`, `0→X/Z`, or `X/Z→1`.
    Posedge,
    /// Transition toward 0: `1→0`, `1→X/Z`, or `X/Z→0`.
    Negedge,
    /// Any value change.
    AnyEdge,
}

impl EdgeKind {
    /// Returns `true` if the change from `prev` to `curr` is this edge.
    pub fn detect(self, prev: &LogicVec, curr: &LogicVec) -> bool {
        if prev == curr {
            return false;
        }
        match self {
            EdgeKind::AnyEdge => true,
            EdgeKind::Posedge => rising(prev.lsb(), curr.lsb()),
            EdgeKind::Negedge => rising(curr.lsb(), prev.lsb()),
        }
    }
}

fn rising(from: Logic, to: Logic) -> bool {
    match (from, to) {
        (Logic::Zero, Logic::One | Logic::X | Logic::Z) => true,
        (Logic::X | Logic::Z, Logic::One) => true,
        _ => false,
    }
}

/// A process suspended on an edge of one signal.
#[derive(Clone, Copy, Debug)]
pub(crate) struct EdgeWaiter {
    pub process: ProcessId,
    pub edge: EdgeKind,
}

/// Runtime state of one declared signal.
///
/// `value` changes only when an update commits; a nonblocking write is
/// invisible to readers until its NBA-region apply runs. `previous` holds
/// the value before the most recent commit, for edge classification.
#[derive(Debug)]
pub struct SignalState {
    pub(crate) name: Ident,
    pub(crate) value: LogicVec,
    pub(crate) previous: LogicVec,
    /// Dynamic waiters registered by `@`-style suspensions; drained on wake.
    pub(crate) edge_waiters: Vec<EdgeWaiter>,
    /// Statically sensitive processes, fixed at registration.
    pub(crate) sensitive: Vec<ProcessId>,
}

impl SignalState {
    fn new(name: Ident, init: LogicVec) -> Self {
        Self {
            previous: init.clone(),
            value: init,
            name,
            edge_waiters: Vec::new(),
            sensitive: Vec::new(),
        }
    }

    /// The signal's registered name.
    pub fn name(&self) -> Ident {
        self.name
    }

    /// The current committed value.
    pub fn value(&self) -> &LogicVec {
        &self.value
    }

    /// The value before the most recent commit.
    pub fn previous(&self) -> &LogicVec {
        &self.previous
    }

    /// Declared width in bits.
    pub fn width(&self) -> u32 {
        self.value.width()
    }
}

/// All declared signals, with name-based lookup.
///
/// Level-wait predicates receive `&SignalStore` and read values through
/// [`value`](Self::value); they must only touch signals that were declared.
#[derive(Default)]
pub struct SignalStore {
    signals: Arena<SignalId, SignalState>,
    by_name: HashMap<Ident, SignalId>,
}

impl SignalStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a signal initialized to all-X (the uninitialized state).
    ///
    /// Returns `None` if the name is already taken.
    pub fn declare(&mut self, name: Ident, width: u32) -> Option<SignalId> {
        self.declare_init(name, LogicVec::all_x(width))
    }

    /// Declares a signal with an explicit initial value.
    ///
    /// Returns `None` if the name is already taken.
    pub fn declare_init(&mut self, name: Ident, init: LogicVec) -> Option<SignalId> {
        if self.by_name.contains_key(&name) {
            return None;
        }
        let id = self.signals.alloc(SignalState::new(name, init));
        self.by_name.insert(name, id);
        Some(id)
    }

    /// Finds a signal by interned name.
    pub fn lookup(&self, name: Ident) -> Option<SignalId> {
        self.by_name.get(&name).copied()
    }

    /// The current value of a signal.
    ///
    /// # Panics
    ///
    /// Panics if `id` was not issued by this store.
    pub fn value(&self, id: SignalId) -> &LogicVec {
        &self.signals.get(id).value
    }

    /// The full state record of a signal, if the handle is valid.
    pub fn try_state(&self, id: SignalId) -> Option<&SignalState> {
        self.signals.try_get(id)
    }

    pub(crate) fn state_mut(&mut self, id: SignalId) -> &mut SignalState {
        self.signals.get_mut(id)
    }

    /// Whether `id` refers to a declared signal.
    pub fn contains(&self, id: SignalId) -> bool {
        self.signals.try_get(id).is_some()
    }

    /// Number of declared signals.
    pub fn len(&self) -> usize {
        self.signals.len()
    }

    /// Returns `true` if no signal has been declared.
    pub fn is_empty(&self) -> bool {
        self.signals.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kairos_common::Interner;

    fn store_with(names: &[&str]) -> (SignalStore, Vec<SignalId>, Interner) {
        let interner = Interner::new();
        let mut store = SignalStore::new();
        let ids = names
            .iter()
            .map(|n| store.declare(interner.intern(n), 1).unwrap())
            .collect();
        (store, ids, interner)
    }

    #[test]
    fn declare_initializes_to_x() {
        let (store, ids, _) = store_with(&["a"]);
        assert_eq!(store.value(ids[0]).get(0), Logic::X);
    }

    #[test]
    fn declare_init_uses_given_value() {
        let interner = Interner::new();
        let mut store = SignalStore::new();
        let id = store
            .declare_init(interner.intern("b"), LogicVec::from_u64(5, 4))
            .unwrap();
        assert_eq!(store.value(id).to_u64(), Some(5));
        assert_eq!(store.try_state(id).unwrap().width(), 4);
    }

    #[test]
    fn duplicate_name_rejected() {
        let interner = Interner::new();
        let mut store = SignalStore::new();
        let name = interner.intern("clk");
        assert!(store.declare(name, 1).is_some());
        assert!(store.declare(name, 1).is_none());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn lookup_by_name() {
        let (store, ids, interner) = store_with(&["x", "y"]);
        assert_eq!(store.lookup(interner.intern("y")), Some(ids[1]));
        assert_eq!(store.lookup(interner.intern("z")), None);
    }

    #[test]
    fn posedge_plain() {
        let lo = LogicVec::from_bool(false);
        let hi = LogicVec::from_bool(true);
        assert!(EdgeKind::Posedge.detect(&lo, &hi));
        assert!(!EdgeKind::Posedge.detect(&hi, &lo));
        assert!(!EdgeKind::Posedge.detect(&hi, &hi));
    }

    #[test]
    fn posedge_through_unknown() {
        let lo = LogicVec::from_bool(false);
        let hi = LogicVec::from_bool(true);
        let x = LogicVec::all_x(1);
        assert!(EdgeKind::Posedge.detect(&lo, &x));
        assert!(EdgeKind::Posedge.detect(&x, &hi));
        assert!(!EdgeKind::Posedge.detect(&x, &lo));
    }

    #[test]
    fn negedge_mirror() {
        let lo = LogicVec::from_bool(false);
        let hi = LogicVec::from_bool(true);
        let x = LogicVec::all_x(1);
        assert!(EdgeKind::Negedge.detect(&hi, &lo));
        assert!(EdgeKind::Negedge.detect(&hi, &x));
        assert!(EdgeKind::Negedge.detect(&x, &lo));
        assert!(!EdgeKind::Negedge.detect(&lo, &hi));
    }

    #[test]
    fn any_edge_on_high_bit_change() {
        let a = LogicVec::from_u64(0b00, 2);
        let b = LogicVec::from_u64(0b10, 2);
        // Bit 0 unchanged, so pos/neg do not fire, but the vector changed.
        assert!(EdgeKind::AnyEdge.detect(&a, &b));
        assert!(!EdgeKind::Posedge.detect(&a, &b));
        assert!(!EdgeKind::Negedge.detect(&a, &b));
    }

    #[test]
    fn no_edge_without_change() {
        let v = LogicVec::from_u64(1, 1);
        assert!(!EdgeKind::AnyEdge.detect(&v, &v.clone()));
    }
}
