// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Bazaar Economy Simulation Core - Production/Consumption Simulator

use rand::Rng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::catalog::ItemCatalog;

// ─── Constants ───────────────────────────────────────────────────────────────

/// Per-item, per-tick probability of a stochastic market shock.
const SHOCK_PROBABILITY: f64 = 0.05;

/// Negative-feedback demand stabilization.
const DEMAND_DECAY_RATE: f64 = 0.05;
const DEMAND_GROWTH_RATE: f64 = 0.05;
const OVERPRICED_MULTIPLE: f64 = 3.0;
const UNDERPRICED_MULTIPLE: f64 = 1.5;

// Shock magnitudes.
const SHORTAGE_PRODUCTION_FACTOR: f64 = 0.7;
const SHORTAGE_VOLATILITY_FACTOR: f64 = 1.3;
const BOOM_PRODUCTION_FACTOR: f64 = 1.3;
const SURGE_DEMAND_FACTOR: f64 = 1.5;
const SURGE_VOLATILITY_FACTOR: f64 = 1.2;

/// Volatility never amplifies past full scale.
const VOLATILITY_CAP: f64 = 1.0;

// ─── Shocks ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum MarketShock {
    /// Production drops to 70%, volatility climbs 30%.
    ProductionShortage,
    /// Production jumps 30%.
    ProductionBoom,
    /// Demand spikes 50%, volatility climbs 20%.
    DemandSurge,
}

impl MarketShock {
    pub fn label(&self) -> &'static str {
        match self {
            Self::ProductionShortage => "production_shortage",
            Self::ProductionBoom => "production_boom",
            Self::DemandSurge => "demand_surge",
        }
    }
}

/// One shock applied to one item this tick.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShockEvent {
    pub item_id: String,
    pub shock: MarketShock,
    pub tick: u64,
}

// ─── Production Cycle ────────────────────────────────────────────────────────

/// Advance per-item supply and demand one tick.
///
/// Supply grows by the production rate, consumption is drawn from supply
/// (unmet consumption becomes demand), demand self-corrects toward the
/// price band, and each item has a small chance of a stochastic shock.
/// Returns the shocks injected this tick.
pub fn simulate_production_cycle(
    catalog: &mut ItemCatalog,
    tick: u64,
    rng: &mut ChaCha8Rng,
) -> Vec<ShockEvent> {
    let mut shocks = Vec::new();

    for item in catalog.iter_mut() {
        advance_item(item);

        if rng.gen::<f64>() < SHOCK_PROBABILITY {
            let shock = match rng.gen_range(0u8..3) {
                0 => MarketShock::ProductionShortage,
                1 => MarketShock::ProductionBoom,
                _ => MarketShock::DemandSurge,
            };
            apply_shock(item, shock);
            tracing::debug!(item = %item.id, shock = shock.label(), "market shock injected");
            shocks.push(ShockEvent {
                item_id: item.id.clone(),
                shock,
                tick,
            });
        }
    }

    shocks
}

/// Deterministic part of the cycle: production, consumption, and the
/// demand feedback band.
fn advance_item(item: &mut crate::types::MarketItem) {
    item.supply += item.production_rate;

    if item.supply >= item.consumption_rate {
        item.supply -= item.consumption_rate;
    } else {
        let unmet = item.consumption_rate - item.supply;
        item.demand += unmet;
        item.supply = 0.0;
    }

    // Negative feedback: expensive items shed demand, cheap ones gain it.
    if item.current_price > item.base_cost * OVERPRICED_MULTIPLE {
        item.demand *= 1.0 - DEMAND_DECAY_RATE;
    } else if item.current_price < item.base_cost * UNDERPRICED_MULTIPLE {
        item.demand *= 1.0 + DEMAND_GROWTH_RATE;
    }
}

fn apply_shock(item: &mut crate::types::MarketItem, shock: MarketShock) {
    match shock {
        MarketShock::ProductionShortage => {
            item.production_rate *= SHORTAGE_PRODUCTION_FACTOR;
            item.volatility = (item.volatility * SHORTAGE_VOLATILITY_FACTOR).min(VOLATILITY_CAP);
        }
        MarketShock::ProductionBoom => {
            item.production_rate *= BOOM_PRODUCTION_FACTOR;
        }
        MarketShock::DemandSurge => {
            item.demand *= SURGE_DEMAND_FACTOR;
            item.volatility = (item.volatility * SURGE_VOLATILITY_FACTOR).min(VOLATILITY_CAP);
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
