// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Bazaar Economy Simulation Core - Wealth Analysis

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::catalog::ItemCatalog;
use crate::ledger::FlowLedger;
use crate::types::{AgentHoldings, TICKS_PER_HOUR};

// ─── Constants ───────────────────────────────────────────────────────────────

/// Cash-flow lookback: one simulated day.
const FLOW_WINDOW: u64 = 24 * TICKS_PER_HOUR;

// Gini thresholds for the concentration classification.
const GINI_MODERATE: f64 = 0.3;
const GINI_HIGH: f64 = 0.5;
const GINI_EXTREME: f64 = 0.7;

// ─── Economic Entity ─────────────────────────────────────────────────────────

/// One agent's wealth snapshot, ranked within the population.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EconomicEntity {
    pub agent_id: String,
    pub gold: f64,
    /// Inventory priced at current catalog prices.
    pub inventory_value: f64,
    pub total_wealth: f64,
    /// 1 = richest.
    pub rank: usize,
    /// Share of the population this agent is at or above, 0..100.
    pub percentile: f64,
    /// Net gold over the last simulated day.
    pub net_flow_24h: f64,
    /// Gross gold moved per unit of wealth over the last day.
    pub flow_velocity: f64,
}

/// Snapshot every agent, ranked richest first. Ties keep id order.
pub fn economic_entities(
    agents: &BTreeMap<String, AgentHoldings>,
    catalog: &ItemCatalog,
    ledger: &FlowLedger,
    tick: u64,
) -> Vec<EconomicEntity> {
    let since = tick.saturating_sub(FLOW_WINDOW);
    let mut entities: Vec<EconomicEntity> = agents
        .iter()
        .map(|(id, holdings)| {
            let inventory_value = holdings.inventory_value(|item| catalog.price_of(item));
            let total_wealth = holdings.gold + inventory_value;
            let gross = ledger.gross_gold_flow(id, since);
            EconomicEntity {
                agent_id: id.clone(),
                gold: holdings.gold,
                inventory_value,
                total_wealth,
                rank: 0,
                percentile: 0.0,
                net_flow_24h: ledger.net_gold_flow(id, since),
                flow_velocity: if total_wealth > 0.0 {
                    gross / total_wealth
                } else {
                    0.0
                },
            }
        })
        .collect();

    entities.sort_by(|a, b| b.total_wealth.total_cmp(&a.total_wealth));
    let n = entities.len();
    for (i, entity) in entities.iter_mut().enumerate() {
        entity.rank = i + 1;
        entity.percentile = if n > 0 {
            (n - i) as f64 / n as f64 * 100.0
        } else {
            0.0
        };
    }
    entities
}

// ─── Wealth Distribution ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum WealthConcentration {
    Low,
    Moderate,
    High,
    Extreme,
}

impl WealthConcentration {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Moderate => "moderate",
            Self::High => "high",
            Self::Extreme => "extreme",
        }
    }

    fn from_gini(gini: f64) -> Self {
        if gini < GINI_MODERATE {
            Self::Low
        } else if gini < GINI_HIGH {
            Self::Moderate
        } else if gini < GINI_EXTREME {
            Self::High
        } else {
            Self::Extreme
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WealthDistribution {
    pub population: usize,
    pub total_wealth: f64,
    pub mean: f64,
    pub median: f64,
    pub p10: f64,
    pub p25: f64,
    pub p75: f64,
    pub p90: f64,
    pub p99: f64,
    pub gini: f64,
    pub top_10_share: f64,
    pub bottom_50_share: f64,
    pub concentration: WealthConcentration,
}

/// Population-level wealth statistics. An empty or zero-wealth population
/// yields neutral zeros rather than NaN.
pub fn wealth_distribution(
    agents: &BTreeMap<String, AgentHoldings>,
    catalog: &ItemCatalog,
) -> WealthDistribution {
    let mut wealths: Vec<f64> = agents
        .values()
        .map(|h| h.gold + h.inventory_value(|item| catalog.price_of(item)))
        .collect();
    wealths.sort_by(f64::total_cmp);

    let n = wealths.len();
    let total: f64 = wealths.iter().sum();
    let mean = if n > 0 { total / n as f64 } else { 0.0 };

    let gini = gini_coefficient(&wealths, mean);

    // top decile / bottom half shares of total wealth
    let top_10_count = (n / 10).max(usize::from(n > 0));
    let top_10: f64 = wealths.iter().rev().take(top_10_count).sum();
    let bottom_50: f64 = wealths.iter().take(n / 2).sum();
    let share = |part: f64| if total > 0.0 { part / total } else { 0.0 };

    WealthDistribution {
        population: n,
        total_wealth: total,
        mean,
        median: percentile(&wealths, 50.0),
        p10: percentile(&wealths, 10.0),
        p25: percentile(&wealths, 25.0),
        p75: percentile(&wealths, 75.0),
        p90: percentile(&wealths, 90.0),
        p99: percentile(&wealths, 99.0),
        gini,
        top_10_share: share(top_10),
        bottom_50_share: share(bottom_50),
        concentration: WealthConcentration::from_gini(gini),
    }
}

/// Mean absolute pairwise difference over `2 * n^2 * mean`. Zero-mean and
/// tiny populations read as perfectly equal.
fn gini_coefficient(sorted_wealths: &[f64], mean: f64) -> f64 {
    let n = sorted_wealths.len();
    if n < 2 || mean.abs() < 1e-12 {
        return 0.0;
    }
    let mut diff_sum = 0.0;
    for (i, a) in sorted_wealths.iter().enumerate() {
        for b in &sorted_wealths[i + 1..] {
            diff_sum += (b - a).abs();
        }
    }
    // the loop covers each unordered pair once
    (2.0 * diff_sum) / (2.0 * (n * n) as f64 * mean)
}

/// Nearest-rank percentile over an ascending-sorted slice.
fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let idx = ((p / 100.0) * (sorted.len() - 1) as f64).round() as usize;
    sorted[idx.min(sorted.len() - 1)]
}

// ─── Tests ───────────────────────────────────────────────────────────────────
