// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Responder configuration carried in the environment.
//!
//! Configure a whole tree through its root environment with [`install`], or override
//! individual settings for a subtree with the modifiers below.

use std::sync::Arc;

use understory_view_tree::{Environment, EnvironmentKey, Modifier};

use crate::safety::SafetyLevel;

/// Settings that govern the safety checks beneath a node.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ResponderConfig {
    /// How misuse is reported.
    pub safety_level: SafetyLevel,
    /// Whether `triggers` and `reports` require a typed handler above them.
    pub require_explicit_responders: bool,
}

impl Default for ResponderConfig {
    fn default() -> Self {
        Self {
            safety_level: SafetyLevel::default(),
            require_explicit_responders: true,
        }
    }
}

/// Environment key holding the [`ResponderConfig`] at a position.
#[derive(Debug)]
pub struct ConfigKey;

impl EnvironmentKey for ConfigKey {
    type Value = ResponderConfig;
    fn default_value() -> ResponderConfig {
        ResponderConfig::default()
    }
}

/// Set the configuration of a root environment.
pub fn install(env: &mut Environment, config: ResponderConfig) {
    env.set::<ConfigKey>(config);
}

#[derive(Debug)]
enum Setting {
    All(ResponderConfig),
    SafetyLevel(SafetyLevel),
    RequireExplicitResponders(bool),
}

impl Modifier for Setting {
    fn environment(&self, env: &mut Environment) {
        env.update::<ConfigKey>(|config| match *self {
            Self::All(all) => *config = all,
            Self::SafetyLevel(level) => config.safety_level = level,
            Self::RequireExplicitResponders(flag) => config.require_explicit_responders = flag,
        });
    }
}

/// Replace the whole configuration for this subtree.
pub fn configure(config: ResponderConfig) -> Arc<dyn Modifier> {
    Arc::new(Setting::All(config))
}

/// Override the safety level for this subtree.
pub fn safety_level(level: SafetyLevel) -> Arc<dyn Modifier> {
    Arc::new(Setting::SafetyLevel(level))
}

/// Override whether declarations require typed handlers above them.
pub fn require_explicit_responders(flag: bool) -> Arc<dyn Modifier> {
    Arc::new(Setting::RequireExplicitResponders(flag))
}
