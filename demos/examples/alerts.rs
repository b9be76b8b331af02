// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Presenting alertable errors, with responder declarations checked on mount.
//!
//! Run:
//! - `cargo run -p understory_hierarchy_demos --example alerts`

use understory_hierarchy::alert::handle_alerts;
use understory_hierarchy::safety::reports;
use understory_hierarchy::{Alert, AlertPresenter, AlertableError, TreeExt, TypeKey};
use understory_view_tree::{Modifier, Tree};

#[derive(Debug, thiserror::Error)]
#[error("disk full")]
struct DiskFull;

impl AlertableError for DiskFull {
    fn title(&self) -> Option<String> {
        Some("Storage".into())
    }

    fn message(&self) -> String {
        "There is no space left to save this file.".into()
    }
}

#[derive(Debug)]
struct Console;

impl AlertPresenter for Console {
    fn present(&self, alert: &Alert) {
        println!("[{}] {} ({})", alert.title(), alert.message(), Alert::DISMISS_LABEL);
    }

    fn dismissed(&self) {
        println!("alert dismissed");
    }
}

fn main() {
    tracing_subscriber::fmt().init();

    let alerts = handle_alerts(Console);
    let mut tree = Tree::new();
    let root = tree.insert(None, vec![alerts.clone() as std::sync::Arc<dyn Modifier>]);
    // Nothing above handles `DiskFull` by type, so this declaration logs a warning.
    let form = tree.insert(Some(root), vec![reports([TypeKey::of::<DiskFull>()])]);
    let _ = tree.commit();

    println!("{:?}", tree.report_alertable(form, DiskFull));
    println!("current: {:?}", alerts.current());
    alerts.dismiss();
}
