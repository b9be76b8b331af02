// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Publishing events down to subscribers.
//!
//! ## Overview
//!
//! Events normally travel up. A [`publisher`] lets an ancestor send events of one type
//! down to the nodes beneath it that [`subscribe`] to that type.
//!
//! - The publisher installs a registrar for its event type in the environment.
//! - Each subscriber registers a container holding its endpoint, then installs its own
//!   registrar so nested subscribers register into it. Containers therefore mirror the
//!   nesting of subscribers, keyed by a stable [`SubscriberId`].
//! - Whenever the containers or the [`Destination`] change, the publisher selects the
//!   receiving endpoints again and hands a fresh [`EventPublisher`] to its callback.
//!
//! ## Misuse
//!
//! A subscriber without a publisher above it, and a publisher nested inside another
//! publisher for the same event type, are reported through the
//! [`SafetyLevel`](crate::safety::SafetyLevel) in effect. A nested publisher still takes
//! over its own subtree.

mod container;
mod publisher;
mod registrar;
mod subscriber;

pub use container::SubscriberId;
pub use publisher::{EventPublisher, Publisher, PublisherId, publisher};
pub use subscriber::subscribe;

/// Which subscribers receive published events.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Destination {
    /// One subscriber among the shallowest; the earliest constructed wins.
    FirstSubscriber,
    /// Every subscriber, each exactly once.
    AllSubscribers,
    /// Every subscriber at the greatest nesting depth.
    #[default]
    LastSubscriber,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{self, ResponderConfig};
    use crate::safety::SafetyLevel;
    use crate::testing::{Recorder, with_logs};
    use crate::value::Event;
    use std::sync::{Arc, Mutex};
    use understory_view_tree::{Environment, Modifier, NodeId, Tree};

    #[derive(Debug, Clone)]
    struct Tick(u32);
    impl Event for Tick {}

    type Slot = Arc<Mutex<Option<EventPublisher<Tick>>>>;

    fn slot() -> Slot {
        Arc::new(Mutex::new(None))
    }

    fn publisher_into(slot: &Slot, destination: Destination) -> Arc<Publisher<Tick>> {
        let slot = slot.clone();
        publisher::<Tick>(destination, move |ready| *slot.lock().unwrap() = ready)
    }

    fn publish(slot: &Slot, tick: u32) -> bool {
        let current = slot.lock().unwrap().clone();
        match current {
            Some(p) => {
                p.publish(Tick(tick));
                true
            }
            None => false,
        }
    }

    fn selected(slot: &Slot) -> Vec<SubscriberId> {
        let mut ids = slot
            .lock()
            .unwrap()
            .as_ref()
            .map(|p| p.subscribers().collect::<Vec<_>>())
            .unwrap_or_default();
        ids.sort();
        ids
    }

    fn listener(rec: &Recorder, name: &'static str) -> Arc<dyn Modifier> {
        let rec = rec.clone();
        subscribe::<Tick>(move |tick| rec.push(format!("{name} {}", tick.0)))
    }

    /// root(publisher) ── a ── shallow(subscriber, depth 2) ── deep(subscriber, depth 3)
    fn nested(pub_: Arc<Publisher<Tick>>, rec: &Recorder) -> (Tree, NodeId, NodeId) {
        let mut tree = Tree::new();
        let root = tree.insert(None, vec![pub_]);
        let a = tree.insert(Some(root), Vec::new());
        let shallow = tree.insert(Some(a), vec![listener(rec, "shallow")]);
        let deep = tree.insert(Some(shallow), vec![listener(rec, "deep")]);
        let _ = tree.commit();
        (tree, shallow, deep)
    }

    #[test]
    fn last_subscriber_receives_only_the_deepest() {
        let rec = Recorder::default();
        let slot = slot();
        let (_tree, _, _) = nested(publisher_into(&slot, Destination::LastSubscriber), &rec);
        assert!(publish(&slot, 1));
        assert_eq!(rec.take(), vec!["deep 1"]);
    }

    #[test]
    fn all_subscribers_receive_once_each() {
        let rec = Recorder::default();
        let slot = slot();
        let (_tree, _, _) = nested(publisher_into(&slot, Destination::AllSubscribers), &rec);
        assert!(publish(&slot, 2));
        let mut got = rec.take();
        got.sort();
        assert_eq!(got, vec!["deep 2", "shallow 2"]);
    }

    #[test]
    fn first_subscriber_receives_the_shallowest() {
        let rec = Recorder::default();
        let slot = slot();
        let (_tree, _, _) = nested(publisher_into(&slot, Destination::FirstSubscriber), &rec);
        assert!(publish(&slot, 3));
        assert_eq!(rec.take(), vec!["shallow 3"]);
    }

    #[test]
    fn destination_change_hands_out_a_new_publisher() {
        let rec = Recorder::default();
        let slot = slot();
        let p = publisher_into(&slot, Destination::LastSubscriber);
        let (_tree, _, _) = nested(p.clone(), &rec);
        let before = slot.lock().unwrap().as_ref().map(EventPublisher::subscriber_count);
        assert_eq!(before, Some(1));

        p.set_destination(Destination::AllSubscribers);
        assert_eq!(p.destination(), Destination::AllSubscribers);
        let after = slot.lock().unwrap().as_ref().map(EventPublisher::subscriber_count);
        assert_eq!(after, Some(2));
    }

    #[test]
    fn unsubscribing_updates_selection_and_silences_endpoint() {
        let rec = Recorder::default();
        let slot = slot();
        let (mut tree, shallow, deep) =
            nested(publisher_into(&slot, Destination::LastSubscriber), &rec);
        let stale = slot.lock().unwrap().clone();

        tree.remove(deep);
        assert!(publish(&slot, 4));
        assert_eq!(rec.take(), vec!["shallow 4"]);

        // A publisher handed out earlier no longer reaches the removed subscriber.
        if let Some(stale) = stale {
            stale.publish(Tick(5));
        }
        assert!(rec.take().is_empty());

        tree.remove(shallow);
        assert!(!publish(&slot, 6), "empty selection delivers no publisher");
    }

    #[test]
    fn publisher_unmount_delivers_none() {
        let rec = Recorder::default();
        let slot = slot();
        let p = publisher_into(&slot, Destination::AllSubscribers);
        let mut tree = Tree::new();
        let root = tree.insert(None, Vec::new());
        let host = tree.insert(Some(root), vec![p.clone()]);
        let _ = tree.insert(Some(host), vec![listener(&rec, "s")]);
        let _ = tree.commit();
        assert!(slot.lock().unwrap().is_some());

        tree.set_modifiers(host, Vec::new());
        assert!(slot.lock().unwrap().is_none());
    }

    #[test]
    fn missing_publisher_warns_when_relaxed() {
        let ((), logs) = with_logs(|| {
            let rec = Recorder::default();
            let mut tree = Tree::new();
            let root = tree.insert(None, Vec::new());
            let _ = tree.insert(Some(root), vec![listener(&rec, "orphan")]);
            let _ = tree.commit();
            // Updates with still no publisher do not report again.
            tree.invalidate(root);
            let _ = tree.commit();
        });
        assert_eq!(logs.matches("missing_publisher").count(), 1, "{logs}");
    }

    #[test]
    #[should_panic(expected = "has no publisher above it")]
    fn missing_publisher_panics_when_strict() {
        let rec = Recorder::default();
        let mut tree = Tree::new();
        let root = tree.insert(None, vec![config::safety_level(SafetyLevel::Strict)]);
        let _ = tree.insert(Some(root), vec![listener(&rec, "orphan")]);
        let _ = tree.commit();
    }

    #[test]
    fn nested_publisher_is_reported_once_and_shadows() {
        let rec = Recorder::default();
        let outer_slot = slot();
        let inner_slot = slot();
        let mut env = Environment::new();
        config::install(&mut env, ResponderConfig::default());
        let ((), logs) = with_logs(|| {
            let mut tree = Tree::with_environment(env);
            let root = tree.insert(
                None,
                vec![
                    publisher_into(&outer_slot, Destination::AllSubscribers),
                    listener(&rec, "outer sub"),
                ],
            );
            let inner = tree.insert(
                Some(root),
                vec![publisher_into(&inner_slot, Destination::AllSubscribers)],
            );
            let _ = tree.insert(Some(inner), vec![listener(&rec, "inner sub")]);
            let _ = tree.commit();
            tree.invalidate(root);
            let _ = tree.commit();
        });
        assert_eq!(logs.matches("duplicate_publisher").count(), 1, "{logs}");

        assert!(publish(&inner_slot, 1));
        assert_eq!(rec.take(), vec!["inner sub 1"]);
        assert!(publish(&outer_slot, 2));
        assert_eq!(rec.take(), vec!["outer sub 2"]);
    }

    #[test]
    fn remounted_publisher_collects_its_subscribers_again() {
        let rec = Recorder::default();
        let slot = slot();
        let p = publisher_into(&slot, Destination::AllSubscribers);
        let mut tree = Tree::new();
        let host = tree.insert(None, vec![p.clone()]);
        let _ = tree.insert(Some(host), vec![listener(&rec, "s")]);
        let _ = tree.commit();
        let before = selected(&slot);
        assert_eq!(before.len(), 1);

        tree.set_modifiers(host, vec![p.clone()]);
        assert!(selected(&slot).is_empty());
        let _ = tree.commit();
        assert_eq!(selected(&slot), before);
        assert!(publish(&slot, 1));
        assert_eq!(rec.take(), vec!["s 1"]);
    }

    #[test]
    fn remounted_parent_subscriber_keeps_nested_ones() {
        let rec = Recorder::default();
        let slot = slot();
        let outer = listener(&rec, "outer");
        let mut tree = Tree::new();
        let root = tree.insert(None, vec![publisher_into(&slot, Destination::LastSubscriber)]);
        let shallow = tree.insert(Some(root), vec![outer.clone()]);
        let _ = tree.insert(Some(shallow), vec![listener(&rec, "inner")]);
        let _ = tree.commit();
        assert!(publish(&slot, 1));
        assert_eq!(rec.take(), vec!["inner 1"]);
        let before = selected(&slot);

        tree.set_modifiers(shallow, vec![outer.clone()]);
        let _ = tree.commit();
        assert_eq!(selected(&slot), before);
        assert!(publish(&slot, 2));
        assert_eq!(rec.take(), vec!["inner 2"]);
    }

    #[test]
    fn reparented_subscriber_moves_between_publishers() {
        let rec = Recorder::default();
        let left = slot();
        let right = slot();
        let mut tree = Tree::new();
        let root = tree.insert(None, Vec::new());
        let a = tree.insert(
            Some(root),
            vec![publisher_into(&left, Destination::AllSubscribers)],
        );
        let b = tree.insert(
            Some(root),
            vec![publisher_into(&right, Destination::AllSubscribers)],
        );
        let s = tree.insert(Some(a), vec![listener(&rec, "s")]);
        let _ = tree.commit();
        let ids = selected(&left);
        assert_eq!(ids.len(), 1);
        assert!(selected(&right).is_empty());

        tree.reparent(s, Some(b));
        let _ = tree.commit();
        assert!(selected(&left).is_empty());
        assert_eq!(selected(&right), ids);
        assert!(!publish(&left, 1));
        assert!(publish(&right, 2));
        assert_eq!(rec.take(), vec!["s 2"]);
    }

    #[test]
    fn subscriber_moved_out_of_a_parent_subscriber_registers_with_the_publisher() {
        let rec = Recorder::default();
        let slot = slot();
        let (mut tree, _, deep) =
            nested(publisher_into(&slot, Destination::LastSubscriber), &rec);
        assert_eq!(selected(&slot).len(), 1);
        let root = tree.path_to_root(deep)[0];

        tree.reparent(deep, Some(root));
        let _ = tree.commit();
        assert_eq!(selected(&slot).len(), 2);
        assert!(publish(&slot, 3));
        let mut got = rec.take();
        got.sort();
        assert_eq!(got, vec!["deep 3", "shallow 3"]);
    }
}
