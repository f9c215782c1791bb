//! Event subscription sets.
//!
//! Maps an event name to the objects registered for it, in registration
//! order. The sets sit behind their own lock so a fan-out can snapshot them
//! without holding anything while handlers run; handlers are then free to
//! register, unregister or destroy objects mid-dispatch.

use crate::handle::Handle;
use crate::logging::targets;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Debug, Default)]
pub struct EventRegistry {
    sets: Mutex<BTreeMap<String, Vec<Handle>>>,
}

impl EventRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn sets(&self) -> MutexGuard<'_, BTreeMap<String, Vec<Handle>>> {
        self.sets.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add `handle` to `event`'s set. Returns false if it was already there.
    pub fn subscribe(&self, handle: Handle, event: &str) -> bool {
        let mut sets = self.sets();
        let set = sets.entry(event.to_string()).or_default();
        if set.contains(&handle) {
            return false;
        }
        set.push(handle);
        tracing::debug!(target: targets::EVENTS, handle = %handle, event, subscribers = set.len(), "event registered");
        true
    }

    /// Remove `handle` from `event`'s set. Returns false if it was not there.
    pub fn unsubscribe(&self, handle: Handle, event: &str) -> bool {
        let mut sets = self.sets();
        let Some(set) = sets.get_mut(event) else {
            return false;
        };
        let before = set.len();
        set.retain(|h| *h != handle);
        let removed = set.len() != before;
        if set.is_empty() {
            sets.remove(event);
        }
        if removed {
            tracing::debug!(target: targets::EVENTS, handle = %handle, event, "event unregistered");
        }
        removed
    }

    /// Remove `handle` from every set; returns how many sets it left.
    pub fn unsubscribe_all(&self, handle: Handle) -> usize {
        let mut sets = self.sets();
        let mut removed = 0;
        sets.retain(|_, set| {
            let before = set.len();
            set.retain(|h| *h != handle);
            removed += before - set.len();
            !set.is_empty()
        });
        if removed > 0 {
            tracing::debug!(target: targets::EVENTS, handle = %handle, removed, "all events unregistered");
        }
        removed
    }

    pub fn is_subscribed(&self, handle: Handle, event: &str) -> bool {
        self.sets()
            .get(event)
            .is_some_and(|set| set.contains(&handle))
    }

    /// Current subscribers of `event` in registration order.
    pub fn subscribers(&self, event: &str) -> Vec<Handle> {
        self.sets().get(event).cloned().unwrap_or_default()
    }

    /// Copy of the subscriber list taken under the lock, for dispatch.
    ///
    /// Later changes to the sets do not affect a snapshot already taken.
    pub fn snapshot(&self, event: &str) -> Vec<Handle> {
        self.subscribers(event)
    }

    /// Events with at least one subscriber.
    pub fn events(&self) -> Vec<String> {
        self.sets().keys().cloned().collect()
    }

    /// Events `handle` is registered for.
    pub fn events_of(&self, handle: Handle) -> Vec<String> {
        self.sets()
            .iter()
            .filter(|(_, set)| set.contains(&handle))
            .map(|(event, _)| event.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn h(n: usize) -> Handle {
        Handle::from_raw(n)
    }

    #[test]
    fn subscribe_preserves_insertion_order() {
        let events = EventRegistry::new();
        assert!(events.subscribe(h(3), "PLAYER_LOGIN"));
        assert!(events.subscribe(h(1), "PLAYER_LOGIN"));
        assert!(events.subscribe(h(2), "PLAYER_LOGIN"));
        assert_eq!(events.subscribers("PLAYER_LOGIN"), vec![h(3), h(1), h(2)]);
    }

    #[test]
    fn duplicate_subscription_is_ignored() {
        let events = EventRegistry::new();
        assert!(events.subscribe(h(1), "ADDON_LOADED"));
        assert!(!events.subscribe(h(1), "ADDON_LOADED"));
        assert_eq!(events.subscribers("ADDON_LOADED"), vec![h(1)]);
    }

    #[test]
    fn emptied_set_is_removed() {
        let events = EventRegistry::new();
        events.subscribe(h(1), "PLAYER_LOGOUT");
        assert!(events.unsubscribe(h(1), "PLAYER_LOGOUT"));
        assert!(!events.unsubscribe(h(1), "PLAYER_LOGOUT"));
        assert!(events.events().is_empty());
    }

    #[test]
    fn unsubscribe_all_leaves_other_objects() {
        let events = EventRegistry::new();
        events.subscribe(h(1), "A");
        events.subscribe(h(2), "A");
        events.subscribe(h(1), "B");
        assert_eq!(events.unsubscribe_all(h(1)), 2);
        assert_eq!(events.subscribers("A"), vec![h(2)]);
        assert_eq!(events.events(), vec!["A".to_string()]);
        assert_eq!(events.unsubscribe_all(h(1)), 0);
    }

    #[test]
    fn snapshot_is_unaffected_by_later_changes() {
        let events = EventRegistry::new();
        events.subscribe(h(1), "E");
        events.subscribe(h(2), "E");
        let snapshot = events.snapshot("E");
        events.unsubscribe(h(2), "E");
        events.subscribe(h(3), "E");
        assert_eq!(snapshot, vec![h(1), h(2)]);
        assert_eq!(events.subscribers("E"), vec![h(1), h(3)]);
    }

    #[test]
    fn events_of_lists_registrations() {
        let events = EventRegistry::new();
        events.subscribe(h(7), "B");
        events.subscribe(h(7), "A");
        events.subscribe(h(8), "C");
        assert_eq!(events.events_of(h(7)), vec!["A".to_string(), "B".to_string()]);
        assert!(events.is_subscribed(h(8), "C"));
        assert!(!events.is_subscribed(h(8), "A"));
    }

    #[derive(Clone, Debug)]
    enum Op {
        Sub(usize, u8),
        Unsub(usize, u8),
        UnsubAll(usize),
    }

    fn ops() -> impl Strategy<Value = Vec<Op>> {
        prop::collection::vec(
            prop_oneof![
                (1_usize..6, 0_u8..3).prop_map(|(h, e)| Op::Sub(h, e)),
                (1_usize..6, 0_u8..3).prop_map(|(h, e)| Op::Unsub(h, e)),
                (1_usize..6).prop_map(Op::UnsubAll),
            ],
            1..80,
        )
    }

    proptest! {
        #[test]
        fn sets_match_ordered_model(ops in ops()) {
            let events = EventRegistry::new();
            let mut model: BTreeMap<String, Vec<Handle>> = BTreeMap::new();

            for op in ops {
                match op {
                    Op::Sub(n, e) => {
                        let name = format!("E{e}");
                        let set = model.entry(name.clone()).or_default();
                        let expected = !set.contains(&h(n));
                        if expected {
                            set.push(h(n));
                        }
                        prop_assert_eq!(events.subscribe(h(n), &name), expected);
                    }
                    Op::Unsub(n, e) => {
                        let name = format!("E{e}");
                        let mut expected = false;
                        if let Some(set) = model.get_mut(&name) {
                            expected = set.contains(&h(n));
                            set.retain(|x| *x != h(n));
                        }
                        model.retain(|_, set| !set.is_empty());
                        prop_assert_eq!(events.unsubscribe(h(n), &name), expected);
                    }
                    Op::UnsubAll(n) => {
                        let mut expected = 0;
                        for set in model.values_mut() {
                            let before = set.len();
                            set.retain(|x| *x != h(n));
                            expected += before - set.len();
                        }
                        model.retain(|_, set| !set.is_empty());
                        prop_assert_eq!(events.unsubscribe_all(h(n)), expected);
                    }
                }
            }

            prop_assert_eq!(events.events(), model.keys().cloned().collect::<Vec<_>>());
            for (event, set) in &model {
                prop_assert_eq!(&events.subscribers(event), set);
            }
        }
    }
}
