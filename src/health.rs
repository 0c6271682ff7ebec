// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Bazaar Economy Simulation Core - Economy Health Assessment

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::bottleneck::{detect_bottlenecks, BottleneckKind};
use crate::catalog::ItemCatalog;
use crate::ledger::FlowLedger;
use crate::types::{AgentHoldings, TICKS_PER_HOUR};
use crate::wealth::wealth_distribution;

// ─── Constants ───────────────────────────────────────────────────────────────

// Component weights; must sum to 1.
const W_LIQUIDITY: f64 = 0.15;
const W_TRADING: f64 = 0.20;
const W_EQUALITY: f64 = 0.15;
const W_STABILITY: f64 = 0.20;
const W_AVAILABILITY: f64 = 0.15;
const W_GROWTH: f64 = 0.15;

/// Hourly ledger entries per agent that score full trading marks.
const TARGET_TRADING_RATE: f64 = 2.0;

/// Gold level below which an agent counts as illiquid.
const POVERTY_LINE: f64 = 50.0;

/// Wealth slope beyond which the economy counts as growing/declining.
const GROWTH_THRESHOLD: f64 = 0.02;

/// Components below this are issues; above, strengths.
const ISSUE_BAR: f64 = 50.0;
const STRENGTH_BAR: f64 = 80.0;

// ─── Report Types ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum HealthGrade {
    A,
    B,
    C,
    D,
    F,
}

impl HealthGrade {
    fn from_score(score: f64) -> Self {
        if score >= 90.0 {
            Self::A
        } else if score >= 80.0 {
            Self::B
        } else if score >= 70.0 {
            Self::C
        } else if score >= 60.0 {
            Self::D
        } else {
            Self::F
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::A => "A",
            Self::B => "B",
            Self::C => "C",
            Self::D => "D",
            Self::F => "F",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum EconomicTrend {
    Growing,
    Stable,
    Declining,
}

/// Per-component scores, each 0..100.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct HealthComponents {
    pub liquidity: f64,
    pub trading_activity: f64,
    pub wealth_equality: f64,
    pub price_stability: f64,
    pub resource_availability: f64,
    pub growth: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    /// Weighted composite, 0..100.
    pub score: f64,
    pub grade: HealthGrade,
    pub components: HealthComponents,
    pub trend: EconomicTrend,
    pub issues: Vec<String>,
    pub strengths: Vec<String>,
    pub tick: u64,
}

// ─── Assessment ──────────────────────────────────────────────────────────────

/// Score the whole economy. `wealth_history` is a series of total-wealth
/// snapshots, oldest first; the last three drive the growth component.
pub fn assess_health(
    catalog: &ItemCatalog,
    agents: &BTreeMap<String, AgentHoldings>,
    ledger: &FlowLedger,
    wealth_history: &[f64],
    tick: u64,
) -> HealthReport {
    let components = HealthComponents {
        liquidity: liquidity_score(agents),
        trading_activity: trading_score(agents, ledger, tick),
        wealth_equality: equality_score(agents, catalog),
        price_stability: stability_score(catalog),
        resource_availability: availability_score(catalog, agents, ledger, tick),
        growth: growth_score(wealth_history),
    };

    let score = components.liquidity * W_LIQUIDITY
        + components.trading_activity * W_TRADING
        + components.wealth_equality * W_EQUALITY
        + components.price_stability * W_STABILITY
        + components.resource_availability * W_AVAILABILITY
        + components.growth * W_GROWTH;

    let mut issues = Vec::new();
    let mut strengths = Vec::new();
    for (name, value) in [
        ("liquidity", components.liquidity),
        ("trading activity", components.trading_activity),
        ("wealth equality", components.wealth_equality),
        ("price stability", components.price_stability),
        ("resource availability", components.resource_availability),
        ("growth", components.growth),
    ] {
        if value < ISSUE_BAR {
            issues.push(format!("weak {} ({:.0})", name, value));
        } else if value >= STRENGTH_BAR {
            strengths.push(format!("strong {} ({:.0})", name, value));
        }
    }

    HealthReport {
        score,
        grade: HealthGrade::from_score(score),
        components,
        trend: wealth_trend(wealth_history),
        issues,
        strengths,
        tick,
    }
}

/// Share of agents with spendable gold.
fn liquidity_score(agents: &BTreeMap<String, AgentHoldings>) -> f64 {
    if agents.is_empty() {
        return 0.0;
    }
    let liquid = agents.values().filter(|h| h.gold >= POVERTY_LINE).count();
    liquid as f64 / agents.len() as f64 * 100.0
}

/// Hourly ledger throughput per agent against the target rate.
fn trading_score(
    agents: &BTreeMap<String, AgentHoldings>,
    ledger: &FlowLedger,
    tick: u64,
) -> f64 {
    if agents.is_empty() {
        return 0.0;
    }
    let recent = ledger.count_since(tick.saturating_sub(TICKS_PER_HOUR)) as f64;
    let rate = recent / agents.len() as f64;
    (rate / TARGET_TRADING_RATE).clamp(0.0, 1.0) * 100.0
}

fn equality_score(agents: &BTreeMap<String, AgentHoldings>, catalog: &ItemCatalog) -> f64 {
    (1.0 - wealth_distribution(agents, catalog).gini) * 100.0
}

/// Mean deviation of prices from base cost; calm markets score high.
fn stability_score(catalog: &ItemCatalog) -> f64 {
    if catalog.is_empty() {
        return 0.0;
    }
    let mean_deviation: f64 = catalog
        .iter()
        .map(|item| ((item.current_price - item.base_cost).abs() / item.base_cost).min(1.0))
        .sum::<f64>()
        / catalog.len() as f64;
    (1.0 - mean_deviation) * 100.0
}

/// Share of items free of supply or monopoly bottlenecks.
fn availability_score(
    catalog: &ItemCatalog,
    agents: &BTreeMap<String, AgentHoldings>,
    ledger: &FlowLedger,
    tick: u64,
) -> f64 {
    if catalog.is_empty() {
        return 0.0;
    }
    let constrained: std::collections::BTreeSet<String> =
        detect_bottlenecks(catalog, agents, ledger, tick)
            .into_iter()
            .filter(|b| {
                matches!(
                    b.kind,
                    BottleneckKind::SupplyShortage | BottleneckKind::Monopoly
                )
            })
            .flat_map(|b| b.affected_items)
            .collect();
    (1.0 - constrained.len() as f64 / catalog.len() as f64) * 100.0
}

/// Slope over the last three wealth snapshots mapped onto 0..100, with 50
/// as flat. Too little history reads as flat.
fn growth_score(wealth_history: &[f64]) -> f64 {
    let Some(slope) = wealth_slope(wealth_history) else {
        return 50.0;
    };
    (50.0 + slope * 500.0).clamp(0.0, 100.0)
}

fn wealth_trend(wealth_history: &[f64]) -> EconomicTrend {
    match wealth_slope(wealth_history) {
        Some(slope) if slope > GROWTH_THRESHOLD => EconomicTrend::Growing,
        Some(slope) if slope < -GROWTH_THRESHOLD => EconomicTrend::Declining,
        _ => EconomicTrend::Stable,
    }
}

fn wealth_slope(wealth_history: &[f64]) -> Option<f64> {
    if wealth_history.len() < 3 {
        return None;
    }
    let window = &wealth_history[wealth_history.len() - 3..];
    let first = window[0];
    if first.abs() < 1e-12 {
        return None;
    }
    Some((window[2] - first) / first)
}

// ─── Tests ───────────────────────────────────────────────────────────────────
