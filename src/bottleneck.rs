// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Bazaar Economy Simulation Core - Bottleneck Detection

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::catalog::ItemCatalog;
use crate::ledger::FlowLedger;
use crate::types::{AgentHoldings, TICKS_PER_HOUR};

// ─── Constants ───────────────────────────────────────────────────────────────

/// Supply below this fraction of demand chokes the item.
const SUPPLY_SHORTAGE_RATIO: f64 = 0.3;

/// Demand below this fraction of supply (for non-trivial stock) means the
/// item has stopped moving.
const DEMAND_COLLAPSE_RATIO: f64 = 0.2;
const DEMAND_COLLAPSE_MIN_SUPPLY: f64 = 10.0;

/// Agents under this gold level cannot meaningfully participate.
const POVERTY_LINE: f64 = 50.0;
/// Poor-agent share that constitutes a liquidity crisis.
const LIQUIDITY_POOR_SHARE: f64 = 0.3;
/// Mean wealth above which poverty indicates distribution, not scarcity.
const LIQUIDITY_MEAN_WEALTH: f64 = 100.0;

/// A single holder above this share of circulating stock is a monopoly.
const MONOPOLY_SHARE: f64 = 0.5;

/// Healthy economies clear at least this many ledger entries per agent
/// per hour.
const STAGNATION_RATE: f64 = 0.5;

// ─── Bottleneck ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum BottleneckKind {
    SupplyShortage,
    DemandCollapse,
    LiquidityCrisis,
    Monopoly,
    Stagnation,
}

impl BottleneckKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::SupplyShortage => "supply_shortage",
            Self::DemandCollapse => "demand_collapse",
            Self::LiquidityCrisis => "liquidity_crisis",
            Self::Monopoly => "monopoly",
            Self::Stagnation => "stagnation",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bottleneck {
    pub kind: BottleneckKind,
    /// 0..1; 1 is a fully seized-up market.
    pub severity: f64,
    pub affected_items: Vec<String>,
    pub affected_agents: Vec<String>,
    /// Rough gold value trapped or at stake.
    pub gold_impact: f64,
    pub recommendation: String,
    pub detected_tick: u64,
}

/// Run all five detectors over the current economy state. Detectors are
/// independent; one item can surface in several bottlenecks at once.
pub fn detect_bottlenecks(
    catalog: &ItemCatalog,
    agents: &BTreeMap<String, AgentHoldings>,
    ledger: &FlowLedger,
    tick: u64,
) -> Vec<Bottleneck> {
    let mut found = Vec::new();

    for item in catalog.iter() {
        // Supply shortage: demand going unmet.
        let shortage_bar = item.demand * SUPPLY_SHORTAGE_RATIO;
        if item.demand > 0.0 && item.supply < shortage_bar {
            // severity is the unmet-demand fraction, not distance to the bar
            let severity = (1.0 - item.supply / item.demand).clamp(0.0, 1.0);
            found.push(Bottleneck {
                kind: BottleneckKind::SupplyShortage,
                severity,
                affected_items: vec![item.id.clone()],
                affected_agents: Vec::new(),
                gold_impact: (item.demand - item.supply) * item.current_price,
                recommendation: format!("increase production of {}", item.id),
                detected_tick: tick,
            });
        }

        // Demand collapse: stock piling up with no buyers.
        let collapse_bar = item.supply * DEMAND_COLLAPSE_RATIO;
        if item.supply > DEMAND_COLLAPSE_MIN_SUPPLY && item.demand < collapse_bar {
            let severity = (1.0 - item.demand / collapse_bar).clamp(0.0, 1.0);
            found.push(Bottleneck {
                kind: BottleneckKind::DemandCollapse,
                severity,
                affected_items: vec![item.id.clone()],
                affected_agents: Vec::new(),
                gold_impact: (item.supply - item.demand) * item.current_price,
                recommendation: format!("add sinks or uses for {}", item.id),
                detected_tick: tick,
            });
        }

        // Monopoly: one holder controls circulating stock.
        let mut held_total = 0u64;
        let mut largest: Option<(&str, u32)> = None;
        for (agent_id, holdings) in agents {
            let count = holdings.item_count(&item.id);
            held_total += count as u64;
            if count > 0 && largest.map(|(_, c)| count > c).unwrap_or(true) {
                largest = Some((agent_id, count));
            }
        }
        let circulating = item.supply + held_total as f64;
        if let Some((agent_id, count)) = largest {
            let share = count as f64 / circulating.max(1.0);
            if share > MONOPOLY_SHARE {
                found.push(Bottleneck {
                    kind: BottleneckKind::Monopoly,
                    severity: share.clamp(0.0, 1.0),
                    affected_items: vec![item.id.clone()],
                    affected_agents: vec![agent_id.to_string()],
                    gold_impact: count as f64 * item.current_price,
                    recommendation: format!(
                        "inject {} supply or redistribute holdings",
                        item.id
                    ),
                    detected_tick: tick,
                });
            }
        }
    }

    // Liquidity crisis: wealth exists but most agents cannot spend.
    if !agents.is_empty() {
        let n = agents.len() as f64;
        let total_wealth: f64 = agents
            .values()
            .map(|h| h.gold + h.inventory_value(|id| catalog.price_of(id)))
            .sum();
        let poor: Vec<&String> = agents
            .iter()
            .filter(|(_, h)| h.gold < POVERTY_LINE)
            .map(|(id, _)| id)
            .collect();
        let poor_share = poor.len() as f64 / n;
        // the wealth bar is mean wealth per agent, not a population total
        if poor_share > LIQUIDITY_POOR_SHARE && total_wealth / n > LIQUIDITY_MEAN_WEALTH {
            let shortfall: f64 = agents
                .values()
                .filter(|h| h.gold < POVERTY_LINE)
                .map(|h| POVERTY_LINE - h.gold)
                .sum();
            found.push(Bottleneck {
                kind: BottleneckKind::LiquidityCrisis,
                severity: poor_share.clamp(0.0, 1.0),
                affected_items: Vec::new(),
                affected_agents: poor.into_iter().cloned().collect(),
                gold_impact: shortfall,
                recommendation: "inject gold via job rewards or loot".to_string(),
                detected_tick: tick,
            });
        }

        // Stagnation: too few transactions per agent in the last hour.
        let recent = ledger.count_since(tick.saturating_sub(TICKS_PER_HOUR)) as f64;
        let rate = recent / n;
        if rate < STAGNATION_RATE {
            found.push(Bottleneck {
                kind: BottleneckKind::Stagnation,
                severity: (1.0 - rate / STAGNATION_RATE).clamp(0.0, 1.0),
                affected_items: Vec::new(),
                affected_agents: Vec::new(),
                gold_impact: 0.0,
                recommendation: "stimulate trading with demand events".to_string(),
                detected_tick: tick,
            });
        }
    }

    found
}

// ─── Tests ───────────────────────────────────────────────────────────────────
