// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Publishing events down to subscribers.
//!
//! A toolbar publishes `Save` to the editors beneath it. Switching the destination
//! changes which editors receive it.
//!
//! Run:
//! - `cargo run -p understory_hierarchy_demos --example publishing`

use std::sync::{Arc, Mutex};

use understory_hierarchy::Event;
use understory_hierarchy::publishing::{Destination, EventPublisher, publisher, subscribe};
use understory_view_tree::{Modifier, Tree};

#[derive(Debug)]
struct Save;
impl Event for Save {}

fn editor(name: &'static str) -> Arc<dyn Modifier> {
    subscribe::<Save>(move |_| println!("  {name}: saving"))
}

fn main() {
    tracing_subscriber::fmt().init();

    let ready: Arc<Mutex<Option<EventPublisher<Save>>>> = Arc::default();
    let slot = Arc::clone(&ready);
    let toolbar = publisher::<Save>(Destination::LastSubscriber, move |publisher| {
        *slot.lock().unwrap() = publisher;
    });

    let mut tree = Tree::new();
    let window = tree.insert(None, vec![toolbar.clone() as Arc<dyn Modifier>]);
    let document = tree.insert(Some(window), vec![editor("document")]);
    let _outline = tree.insert(Some(document), vec![editor("outline")]);
    let _sidebar = tree.insert(Some(window), vec![editor("sidebar")]);
    let _ = tree.commit();

    for destination in [
        Destination::LastSubscriber,
        Destination::FirstSubscriber,
        Destination::AllSubscribers,
    ] {
        toolbar.set_destination(destination);
        println!("== {destination:?} ==");
        if let Some(publisher) = ready.lock().unwrap().as_ref() {
            publisher.publish(Save);
        }
    }

    tree.remove(document);
    println!("== After removing the document ==");
    if let Some(publisher) = ready.lock().unwrap().as_ref() {
        publisher.publish(Save);
    }
}
