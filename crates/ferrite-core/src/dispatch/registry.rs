//! Per-event-name listener registry.
//!
//! The registry is read-mostly: dispatch takes a snapshot of the entry for
//! one name and runs it without holding any lock. Mutation (register,
//! unregister, filters, middleware) takes the map write lock briefly; no
//! lock is shared across unrelated event names beyond the map itself.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

use super::listener::{
    Handler, ListenerEntry, ListenerId, ListenerOptions, MiddlewareId, Predicate,
};
use super::middleware::{Middleware, MiddlewareEntry, MiddlewarePhase};

/// Registry state for one event name.
#[derive(Default)]
struct NameEntry {
    /// Listeners sorted by (priority, registration sequence).
    listeners: Vec<ListenerEntry>,
    /// Event-level filters, in registration order.
    filters: Vec<Predicate>,
    pre: Vec<MiddlewareEntry>,
    post: Vec<MiddlewareEntry>,
    error: Vec<MiddlewareEntry>,
}

impl NameEntry {
    fn phase_mut(&mut self, phase: MiddlewarePhase) -> &mut Vec<MiddlewareEntry> {
        match phase {
            MiddlewarePhase::Pre => &mut self.pre,
            MiddlewarePhase::Post => &mut self.post,
            MiddlewarePhase::Error => &mut self.error,
        }
    }

    fn is_empty(&self) -> bool {
        self.listeners.is_empty()
            && self.filters.is_empty()
            && self.pre.is_empty()
            && self.post.is_empty()
            && self.error.is_empty()
    }
}

/// A lock-free snapshot of one name's registration state, taken at dispatch
/// time. Cloning the entries clones `Arc`s only.
pub(crate) struct NameSnapshot {
    pub(crate) listeners: Vec<ListenerEntry>,
    pub(crate) filters: Vec<Predicate>,
    pub(crate) pre: Vec<MiddlewareEntry>,
    pub(crate) post: Vec<MiddlewareEntry>,
    pub(crate) error: Vec<MiddlewareEntry>,
}

/// The listener registry owned by one dispatcher instance.
#[derive(Default)]
pub(crate) struct Registry {
    names: RwLock<HashMap<String, NameEntry>>,
    next_listener: AtomicU64,
    next_middleware: AtomicU64,
    next_seq: AtomicU64,
}

impl Registry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Registers a listener, keeping the per-name vector sorted by priority
    /// with registration order breaking ties.
    pub(crate) fn register(
        &self,
        name: &str,
        handler: Handler,
        options: ListenerOptions,
    ) -> ListenerId {
        let id = ListenerId(self.next_listener.fetch_add(1, Ordering::Relaxed));
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        let entry = ListenerEntry {
            id,
            seq,
            priority: options.priority,
            once: options.once,
            timeout: options.timeout,
            filter: options.filter,
            handler,
        };

        let mut names = self.names.write();
        let slot = names.entry(name.to_string()).or_default();
        let pos = slot
            .listeners
            .partition_point(|l| (l.priority, l.seq) <= (entry.priority, entry.seq));
        slot.listeners.insert(pos, entry);
        id
    }

    /// Removes a listener. Idempotent: returns false if absent.
    pub(crate) fn unregister(&self, name: &str, id: ListenerId) -> bool {
        let mut names = self.names.write();
        let Some(slot) = names.get_mut(name) else {
            return false;
        };
        let before = slot.listeners.len();
        slot.listeners.retain(|l| l.id != id);
        let removed = slot.listeners.len() != before;
        if slot.is_empty() {
            names.remove(name);
        }
        removed
    }

    pub(crate) fn add_filter(&self, name: &str, predicate: Predicate) {
        let mut names = self.names.write();
        names
            .entry(name.to_string())
            .or_default()
            .filters
            .push(predicate);
    }

    pub(crate) fn add_middleware(
        &self,
        name: &str,
        middleware: Middleware,
        phase: MiddlewarePhase,
    ) -> MiddlewareId {
        let id = MiddlewareId(self.next_middleware.fetch_add(1, Ordering::Relaxed));
        let mut names = self.names.write();
        names
            .entry(name.to_string())
            .or_default()
            .phase_mut(phase)
            .push(MiddlewareEntry { id, middleware });
        id
    }

    /// Removes a middleware from whichever phase holds it.
    pub(crate) fn remove_middleware(&self, name: &str, id: MiddlewareId) -> bool {
        let mut names = self.names.write();
        let Some(slot) = names.get_mut(name) else {
            return false;
        };
        let mut removed = false;
        for phase in [
            MiddlewarePhase::Pre,
            MiddlewarePhase::Post,
            MiddlewarePhase::Error,
        ] {
            let list = slot.phase_mut(phase);
            let before = list.len();
            list.retain(|m| m.id != id);
            removed |= list.len() != before;
        }
        if slot.is_empty() {
            names.remove(name);
        }
        removed
    }

    /// Takes a dispatch-time snapshot for one name.
    pub(crate) fn snapshot(&self, name: &str) -> Option<NameSnapshot> {
        let names = self.names.read();
        names.get(name).map(|slot| NameSnapshot {
            listeners: slot.listeners.clone(),
            filters: slot.filters.clone(),
            pre: slot.pre.clone(),
            post: slot.post.clone(),
            error: slot.error.clone(),
        })
    }

    /// Returns the number of listeners currently registered for `name`.
    pub(crate) fn listener_count(&self, name: &str) -> usize {
        self.names
            .read()
            .get(name)
            .map_or(0, |slot| slot.listeners.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn noop_handler() -> Handler {
        Arc::new(|_event| Box::pin(async { Ok(()) }))
    }

    #[test]
    fn listeners_sorted_by_priority_then_registration() {
        let registry = Registry::new();
        let b = registry.register("msg", noop_handler(), ListenerOptions::new().priority(5));
        let a = registry.register("msg", noop_handler(), ListenerOptions::new().priority(1));
        let c = registry.register("msg", noop_handler(), ListenerOptions::new().priority(5));

        let snapshot = registry.snapshot("msg").unwrap();
        let order: Vec<ListenerId> = snapshot.listeners.iter().map(|l| l.id).collect();
        assert_eq!(order, vec![a, b, c]);
    }

    #[test]
    fn unregister_is_idempotent() {
        let registry = Registry::new();
        let id = registry.register("msg", noop_handler(), ListenerOptions::new());
        assert!(registry.unregister("msg", id));
        assert!(!registry.unregister("msg", id));
    }

    #[test]
    fn empty_entries_are_dropped() {
        let registry = Registry::new();
        let id = registry.register("msg", noop_handler(), ListenerOptions::new());
        registry.unregister("msg", id);
        assert!(registry.snapshot("msg").is_none());
    }
}
