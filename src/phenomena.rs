// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Bazaar Economy Simulation Core - Phenomenon Detector

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::catalog::ItemCatalog;
use crate::types::{AgentHoldings, ManipulationFlag, ManipulationKind, TICKS_PER_HOUR};

// ─── Constants ───────────────────────────────────────────────────────────────

/// Price above this multiple of base cost is a bubble.
const BUBBLE_MULTIPLE: f64 = 2.5;

/// A single holder above this share of circulating supply is cornering.
const CORNERING_SHARE: f64 = 0.3;

/// Shortage: supply below 20% of demand. Surplus: supply above 3x demand.
const SHORTAGE_RATIO: f64 = 0.2;
const SURPLUS_RATIO: f64 = 3.0;

/// Flags auto-expire after one simulated hour.
const FLAG_TTL: u64 = TICKS_PER_HOUR;

// ─── Scarcity Reports (computed on demand, not stored) ───────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ScarcityKind {
    Shortage,
    Surplus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScarcityReport {
    pub item_id: String,
    pub kind: ScarcityKind,
    pub supply: f64,
    pub demand: f64,
}

// ─── Manipulation Detection ──────────────────────────────────────────────────

/// Scan the catalog after a price update: expire stale flags, then raise
/// bubble and cornering flags. Re-detection refreshes an existing flag's
/// severity and expiry. Returns the flags raised this pass.
pub fn detect_manipulation(
    catalog: &mut ItemCatalog,
    agents: &BTreeMap<String, AgentHoldings>,
    tick: u64,
) -> Vec<(String, ManipulationFlag)> {
    let mut raised = Vec::new();

    for item in catalog.iter_mut() {
        item.flags.retain(|f| f.expires_tick > tick);

        // Bubble: price runaway above fundamentals.
        let bubble_threshold = item.base_cost * BUBBLE_MULTIPLE;
        if item.current_price > bubble_threshold {
            let severity =
                ((item.current_price - bubble_threshold) / bubble_threshold).clamp(0.0, 1.0);
            let flag = ManipulationFlag {
                kind: ManipulationKind::Bubble,
                severity,
                agent_id: None,
                detected_tick: tick,
                expires_tick: tick + FLAG_TTL,
            };
            item.flags.retain(|f| f.kind != ManipulationKind::Bubble);
            item.flags.push(flag.clone());
            raised.push((item.id.clone(), flag));
        }

        // Cornering: largest holder's share of circulating supply.
        let mut largest_holder: Option<(&str, u32)> = None;
        let mut held_total = 0u64;
        for (agent_id, holdings) in agents {
            let count = holdings.item_count(&item.id);
            held_total += count as u64;
            if count > 0 && largest_holder.map(|(_, c)| count > c).unwrap_or(true) {
                largest_holder = Some((agent_id, count));
            }
        }
        let circulating = item.supply + held_total as f64;
        if let Some((agent_id, count)) = largest_holder {
            if circulating > 0.0 {
                let share = count as f64 / circulating;
                if share > CORNERING_SHARE {
                    let flag = ManipulationFlag {
                        kind: ManipulationKind::Cornering,
                        severity: share.clamp(0.0, 1.0),
                        agent_id: Some(agent_id.to_string()),
                        detected_tick: tick,
                        expires_tick: tick + FLAG_TTL,
                    };
                    item.flags.retain(|f| f.kind != ManipulationKind::Cornering);
                    item.flags.push(flag.clone());
                    raised.push((item.id.clone(), flag));
                }
            }
        }
    }

    raised
}

// ─── Scarcity Queries ────────────────────────────────────────────────────────

pub fn detect_shortages(catalog: &ItemCatalog) -> Vec<ScarcityReport> {
    catalog
        .iter()
        .filter(|item| item.supply < item.demand * SHORTAGE_RATIO)
        .map(|item| ScarcityReport {
            item_id: item.id.clone(),
            kind: ScarcityKind::Shortage,
            supply: item.supply,
            demand: item.demand,
        })
        .collect()
}

pub fn detect_surpluses(catalog: &ItemCatalog) -> Vec<ScarcityReport> {
    catalog
        .iter()
        .filter(|item| item.supply > item.demand * SURPLUS_RATIO)
        .map(|item| ScarcityReport {
            item_id: item.id.clone(),
            kind: ScarcityKind::Surplus,
            supply: item.supply,
            demand: item.demand,
        })
        .collect()
}

// ─── Tests ───────────────────────────────────────────────────────────────────
