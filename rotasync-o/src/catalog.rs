/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Static per-slot definitions and sponsor assignment.

use std::collections::BTreeMap;

use thiserror::Error;
use tracing::info;

use crate::config::{SlotEntry, SLOTS_PER_BLOCK};
use crate::slot::SlotType;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    #[error("slot {0} is not in the catalog (valid: 1..=24)")]
    UnknownSlot(u32),
}

/// What a slot position carries in every block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotDefinition {
    pub slot_type: SlotType,
    pub sponsor_id: Option<String>,
    pub priority: u8,
}

impl Default for SlotDefinition {
    fn default() -> Self {
        Self {
            slot_type: SlotType::Standard,
            sponsor_id: None,
            priority: SlotType::Standard.default_priority(),
        }
    }
}

/// Definitions for slots `1..=24`, shared by every block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotCatalog {
    /// Index 0 holds slot 1.
    slots: Vec<SlotDefinition>,
}

impl Default for SlotCatalog {
    fn default() -> Self {
        Self {
            slots: vec![SlotDefinition::default(); SLOTS_PER_BLOCK as usize],
        }
    }
}

impl SlotCatalog {
    /// Build from the `slots:` config section.  Entries must already be
    /// range-checked by [`RotationConfig::validate`](crate::config::RotationConfig::validate).
    pub fn from_entries(entries: &BTreeMap<u32, SlotEntry>) -> Result<Self, CatalogError> {
        let mut catalog = Self::default();
        for (&number, entry) in entries {
            let def = catalog.slot_mut(number)?;
            def.slot_type = entry.slot_type;
            def.sponsor_id = entry.sponsor.clone();
            def.priority = entry
                .priority
                .unwrap_or_else(|| entry.slot_type.default_priority());
        }
        Ok(catalog)
    }

    pub fn definition(&self, slot_number: u32) -> Result<&SlotDefinition, CatalogError> {
        slot_number
            .checked_sub(1)
            .and_then(|i| self.slots.get(i as usize))
            .ok_or(CatalogError::UnknownSlot(slot_number))
    }

    fn slot_mut(&mut self, slot_number: u32) -> Result<&mut SlotDefinition, CatalogError> {
        slot_number
            .checked_sub(1)
            .and_then(|i| self.slots.get_mut(i as usize))
            .ok_or(CatalogError::UnknownSlot(slot_number))
    }

    /// Assign `sponsor_id` to a slot, replacing any previous sponsor.
    /// Takes effect from the next snapshot on.
    pub fn assign_sponsor(
        &mut self,
        slot_number: u32,
        sponsor_id: impl Into<String>,
    ) -> Result<(), CatalogError> {
        let def = self.slot_mut(slot_number)?;
        let sponsor_id = sponsor_id.into();
        info!(slot = slot_number, sponsor = %sponsor_id, "sponsor assigned");
        def.sponsor_id = Some(sponsor_id);
        Ok(())
    }

    pub fn clear_sponsor(&mut self, slot_number: u32) -> Result<Option<String>, CatalogError> {
        Ok(self.slot_mut(slot_number)?.sponsor_id.take())
    }

    /// Slot numbers without a sponsor.
    pub fn available(&self) -> Vec<u32> {
        (1..=self.slots.len() as u32)
            .filter(|&n| self.slots[(n - 1) as usize].sponsor_id.is_none())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
