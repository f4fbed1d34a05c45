/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Render layer configuration handed to external renderers.
//!
//! Three named layers (static, hologram, AR) are each independently enabled
//! and carry an opaque settings map.  The core never interprets the settings;
//! renderers read them through [`LayerConfig`] and never write back.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Identifier of one of the three render layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayerKind {
    Static,
    Hologram,
    Ar,
}

impl LayerKind {
    pub const ALL: [LayerKind; 3] = [LayerKind::Static, LayerKind::Hologram, LayerKind::Ar];
}

/// Settings for a single layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerSettings {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Renderer-specific key/value settings, passed through untouched.
    #[serde(default)]
    pub settings: BTreeMap<String, serde_yaml::Value>,
}

fn default_enabled() -> bool {
    true
}

impl Default for LayerSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            settings: BTreeMap::new(),
        }
    }
}

/// The full `layers:` section of the configuration file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayerConfig {
    #[serde(rename = "static")]
    pub static_layer: LayerSettings,
    pub hologram: LayerSettings,
    pub ar: LayerSettings,
}

impl LayerConfig {
    pub fn get(&self, kind: LayerKind) -> &LayerSettings {
        match kind {
            LayerKind::Static => &self.static_layer,
            LayerKind::Hologram => &self.hologram,
            LayerKind::Ar => &self.ar,
        }
    }

    /// Layers with `enabled: true`, in fixed static → hologram → AR order.
    pub fn enabled(&self) -> Vec<LayerKind> {
        LayerKind::ALL
            .into_iter()
            .filter(|k| self.get(*k).enabled)
            .collect()
    }
}
