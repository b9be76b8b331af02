// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Events and errors bubbling up a small view tree.
//!
//! A button triggers `Opened`; a loader turns it into `Loaded` or fails with
//! `LoadFailed`. A catch handler recovers the failure as a `Retry` event, and an
//! asynchronous handler at the top finishes the work on a Tokio task.
//!
//! Run:
//! - `RUST_LOG=understory_hierarchy=debug cargo run -p understory_hierarchy_demos --example bubbling`

use std::time::Duration;

use tracing_subscriber::EnvFilter;
use understory_hierarchy::{AnyEvent, Event, TreeExt, errors, events};
use understory_view_tree::Tree;

#[derive(Debug, Clone)]
struct Opened(u32);
impl Event for Opened {}

#[derive(Debug, Clone)]
struct Loaded(u32);
impl Event for Loaded {}

#[derive(Debug, Clone)]
struct Retry(u32);
impl Event for Retry {}

#[derive(Debug, Clone, thiserror::Error)]
#[error("document {0} could not be loaded")]
struct LoadFailed(u32);

#[tokio::main(flavor = "current_thread")]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let mut tree = Tree::new();
    let app = tree.insert(
        None,
        vec![
            events::handle_of_async::<Retry, _, _>(|retry| async move {
                tokio::time::sleep(Duration::from_millis(10)).await;
                println!("app: retried document {}", retry.0);
                Ok(())
            }),
            errors::handle(|error| println!("app: giving up on {error}")),
        ],
    );
    let screen = tree.insert(
        Some(app),
        vec![
            events::handle_of::<Loaded, _>(|loaded| {
                println!("screen: showing document {}", loaded.0);
                Ok(())
            }),
            errors::catch_of::<LoadFailed, _>(|failed| Ok(AnyEvent::new(Retry(failed.0)))),
        ],
    );
    let loader = tree.insert(
        Some(screen),
        vec![events::transform_of::<Opened, _>(|opened| {
            if opened.0 % 2 == 0 {
                Ok(Loaded(opened.0).into())
            } else {
                Err(LoadFailed(opened.0).into())
            }
        })],
    );
    let button = tree.insert(Some(loader), Vec::new());
    let summary = tree.commit();
    println!("== Commit ==\n{} mounted", summary.mounted.len());

    println!("== Trigger Opened(2) ==");
    println!("{:?}", tree.trigger_event(button, Opened(2)));

    println!("== Trigger Opened(3) ==");
    println!("{:?}", tree.trigger_event(button, Opened(3)));
    tokio::time::sleep(Duration::from_millis(50)).await;

    println!("== Report directly ==");
    println!("{:?}", tree.report_error(screen, LoadFailed(7)));
}
