// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Subscriber containers and destination selection.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::value::AnyEvent;

use super::Destination;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

pub(crate) fn next_id() -> u64 {
    NEXT_ID.fetch_add(1, Ordering::Relaxed)
}

/// Stable identity of a subscriber; allocated once per subscriber modifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriberId(pub(crate) u64);

pub(crate) type Endpoint = Arc<dyn Fn(&AnyEvent) + Send + Sync>;

/// One subscriber and the subscribers nested inside it.
#[derive(Clone)]
pub(crate) struct Container {
    pub(crate) id: SubscriberId,
    pub(crate) endpoint: Endpoint,
    pub(crate) children: BTreeMap<SubscriberId, Container>,
}

impl core::fmt::Debug for Container {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Container")
            .field("id", &self.id)
            .field("children", &self.children)
            .finish_non_exhaustive()
    }
}

/// Pick the endpoints that receive published events.
///
/// - `FirstSubscriber`: the top-level container with the lowest id, which is the
///   earliest constructed among the shallowest subscribers.
/// - `AllSubscribers`: every container, parents before children.
/// - `LastSubscriber`: every container at the greatest nesting depth.
pub(crate) fn select(
    containers: &BTreeMap<SubscriberId, Container>,
    destination: Destination,
) -> Vec<(SubscriberId, Endpoint)> {
    let mut out = Vec::new();
    match destination {
        Destination::FirstSubscriber => {
            if let Some(first) = containers.values().next() {
                out.push((first.id, Arc::clone(&first.endpoint)));
            }
        }
        Destination::AllSubscribers => flatten(containers, &mut out),
        Destination::LastSubscriber => {
            let mut deepest = 0;
            collect_deepest(containers, 1, &mut deepest, &mut out);
        }
    }
    out
}

fn flatten(containers: &BTreeMap<SubscriberId, Container>, out: &mut Vec<(SubscriberId, Endpoint)>) {
    for c in containers.values() {
        out.push((c.id, Arc::clone(&c.endpoint)));
        flatten(&c.children, out);
    }
}

fn collect_deepest(
    containers: &BTreeMap<SubscriberId, Container>,
    depth: usize,
    deepest: &mut usize,
    out: &mut Vec<(SubscriberId, Endpoint)>,
) {
    for c in containers.values() {
        if c.children.is_empty() {
            if depth > *deepest {
                *deepest = depth;
                out.clear();
            }
            if depth == *deepest {
                out.push((c.id, Arc::clone(&c.endpoint)));
            }
        } else {
            collect_deepest(&c.children, depth + 1, deepest, out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(id: u64) -> Container {
        Container {
            id: SubscriberId(id),
            endpoint: Arc::new(|_: &AnyEvent| {}),
            children: BTreeMap::new(),
        }
    }

    fn with(mut c: Container, children: impl IntoIterator<Item = Container>) -> Container {
        c.children = children.into_iter().map(|c| (c.id, c)).collect();
        c
    }

    fn ids(selected: &[(SubscriberId, Endpoint)]) -> Vec<u64> {
        selected.iter().map(|(id, _)| id.0).collect()
    }

    fn forest() -> BTreeMap<SubscriberId, Container> {
        // 1 ─┬─ 2
        //    └─ 3 ── 4
        // 5
        let tree = with(leaf(1), [leaf(2), with(leaf(3), [leaf(4)])]);
        [tree, leaf(5)].into_iter().map(|c| (c.id, c)).collect()
    }

    #[test]
    fn last_selects_only_the_deepest() {
        assert_eq!(ids(&select(&forest(), Destination::LastSubscriber)), vec![4]);
    }

    #[test]
    fn last_fans_out_to_equal_depth_ties() {
        let map: BTreeMap<_, _> = [with(leaf(1), [leaf(2), leaf(3)])]
            .into_iter()
            .map(|c| (c.id, c))
            .collect();
        assert_eq!(ids(&select(&map, Destination::LastSubscriber)), vec![2, 3]);
    }

    #[test]
    fn all_visits_each_container_once() {
        assert_eq!(
            ids(&select(&forest(), Destination::AllSubscribers)),
            vec![1, 2, 3, 4, 5]
        );
    }

    #[test]
    fn first_selects_one_top_level_container() {
        assert_eq!(ids(&select(&forest(), Destination::FirstSubscriber)), vec![1]);
        assert!(select(&BTreeMap::new(), Destination::FirstSubscriber).is_empty());
    }
}
