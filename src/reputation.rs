// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Bazaar Economy Simulation Core - Reputation & Trade Routes

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::archetype::{derive_archetype, EconomicArchetype, PersonalityTraits};
use crate::types::ItemCategory;

// ─── Constants ───────────────────────────────────────────────────────────────

/// Route frequency exponential moving average weights.
const ROUTE_EMA_KEEP: f64 = 0.9;
const ROUTE_EMA_NEW: f64 = 0.1;

/// Route strength gain per trade, capped at 1.0.
const ROUTE_STRENGTH_STEP: f64 = 0.05;

/// Reliability assumed for agents with no trade history.
const NEUTRAL_RELIABILITY: f64 = 0.5;

/// Fairness score rolling weight.
const FAIRNESS_EMA_NEW: f64 = 0.2;

// ─── Trading Reputation ──────────────────────────────────────────────────────

/// Rolling per-agent trading stats, keyed by foreign-key agent id. Agent
/// identity itself is owned by the game layer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TradingReputation {
    pub total_trades: u32,
    pub successful_trades: u32,
    pub fairness_score: f64,
    pub trading_partners: BTreeSet<String>,
    pub blacklist: BTreeSet<String>,
}

impl TradingReputation {
    /// `successes / total`; neutral for agents with no history.
    pub fn reliability_score(&self) -> f64 {
        if self.total_trades == 0 {
            NEUTRAL_RELIABILITY
        } else {
            self.successful_trades as f64 / self.total_trades as f64
        }
    }

    pub fn is_blacklisted(&self, agent_id: &str) -> bool {
        self.blacklist.contains(agent_id)
    }
}

// ─── Trade Route ─────────────────────────────────────────────────────────────

/// Aggregated relationship between two agents, keyed by the sorted pair of
/// ids. Created on first trade, updated incrementally, never deleted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TradeRoute {
    pub categories: BTreeSet<ItemCategory>,
    /// EMA of trades per tick along this route.
    pub frequency: f64,
    pub total_volume: f64,
    pub route_strength: f64,
    pub trade_count: u32,
    pub last_trade_tick: u64,
}

pub fn route_key(a: &str, b: &str) -> (String, String) {
    if a <= b {
        (a.to_string(), b.to_string())
    } else {
        (b.to_string(), a.to_string())
    }
}

// ─── Trading Network ─────────────────────────────────────────────────────────

/// Owns derived archetypes, reputations, and routes for all registered
/// agents. Personality and trust inputs come from external providers;
/// only their derived consequences live here.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TradingNetwork {
    archetypes: BTreeMap<String, EconomicArchetype>,
    reputations: BTreeMap<String, TradingReputation>,
    routes: BTreeMap<(String, String), TradeRoute>,
    pub(crate) next_offer_id: u64,
}

impl TradingNetwork {
    /// Derive (or re-derive, if the personality changed) an agent's
    /// economic archetype.
    pub fn register_agent(&mut self, agent_id: &str, traits: &PersonalityTraits) {
        self.archetypes
            .insert(agent_id.to_string(), derive_archetype(traits));
        self.reputations.entry(agent_id.to_string()).or_default();
    }

    pub fn archetype(&self, agent_id: &str) -> Option<&EconomicArchetype> {
        self.archetypes.get(agent_id)
    }

    pub fn archetype_label(&self, agent_id: &str) -> String {
        self.archetypes
            .get(agent_id)
            .map(|a| a.kind.label().to_string())
            .unwrap_or_else(|| "unregistered".to_string())
    }

    pub fn reputation(&self, agent_id: &str) -> Option<&TradingReputation> {
        self.reputations.get(agent_id)
    }

    pub fn blacklist(&mut self, agent_id: &str, offender: &str) {
        self.reputations
            .entry(agent_id.to_string())
            .or_default()
            .blacklist
            .insert(offender.to_string());
    }

    pub fn route(&self, a: &str, b: &str) -> Option<&TradeRoute> {
        self.routes.get(&route_key(a, b))
    }

    pub fn route_count(&self) -> usize {
        self.routes.len()
    }

    /// Update both parties' reputations and the pair's route after a
    /// completed trade.
    pub fn record_trade(
        &mut self,
        buyer_id: &str,
        seller_id: &str,
        category: Option<ItemCategory>,
        value: f64,
        fairness: f64,
        tick: u64,
    ) {
        for (id, partner) in [(buyer_id, seller_id), (seller_id, buyer_id)] {
            let rep = self.reputations.entry(id.to_string()).or_default();
            rep.total_trades += 1;
            rep.successful_trades += 1;
            rep.trading_partners.insert(partner.to_string());
            rep.fairness_score =
                rep.fairness_score * (1.0 - FAIRNESS_EMA_NEW) + fairness * FAIRNESS_EMA_NEW;
        }

        let route = self.routes.entry(route_key(buyer_id, seller_id)).or_default();
        // pure-gold exchanges carry no category
        if let Some(category) = category {
            route.categories.insert(category);
        }
        route.frequency = route.frequency * ROUTE_EMA_KEEP + ROUTE_EMA_NEW;
        route.total_volume += value;
        route.route_strength = (route.route_strength + ROUTE_STRENGTH_STEP).min(1.0);
        route.trade_count += 1;
        route.last_trade_tick = tick;
    }

    /// A trade that was agreed but fell through (e.g. holdings drifted)
    /// still counts against reliability.
    pub fn record_failed_trade(&mut self, agent_id: &str) {
        let rep = self.reputations.entry(agent_id.to_string()).or_default();
        rep.total_trades += 1;
    }

    pub fn agent_ids(&self) -> impl Iterator<Item = &String> {
        self.archetypes.keys()
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
