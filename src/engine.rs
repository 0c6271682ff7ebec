// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Bazaar Economy Simulation Core - Simulation Engine

use std::collections::{BTreeMap, VecDeque};

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::archetype::PersonalityTraits;
use crate::bottleneck::{detect_bottlenecks, Bottleneck};
use crate::catalog::{CatalogError, ItemCatalog, ItemDef};
use crate::health::{assess_health, HealthReport};
use crate::ledger::FlowLedger;
use crate::matching::MatchingEngine;
use crate::negotiation::{negotiate, trade_fairness, NegotiationState};
use crate::offers::{generate_trade_offer, OfferStatus, SocialContext, TradeMotivation, TradeOffer};
use crate::phenomena::detect_manipulation;
use crate::production::{simulate_production_cycle, ShockEvent};
use crate::reputation::TradingNetwork;
use crate::types::{
    AgentHoldings, FlowType, ItemQuantity, ManipulationFlag, OrderSide, Trade,
};
use crate::wealth::{economic_entities, wealth_distribution, EconomicEntity, WealthDistribution};

// ─── Constants ───────────────────────────────────────────────────────────────

/// Retained wealth snapshots and completed trades (FIFO eviction).
const WEALTH_HISTORY_CAP: usize = 100;
const TRADE_LOG_CAP: usize = 10_000;

/// Absolute gold drift tolerated per conservation check.
const GOLD_TOLERANCE: f64 = 1e-6;

// ─── Conservation Audit ──────────────────────────────────────────────────────

/// Tracks the gold the economy should contain. Trades move gold between
/// agents and leave the total untouched; only registration, faucets, and
/// sinks adjust the expectation. A check outside tolerance trips the
/// audit permanently; tripped runs are not trustworthy.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConservationAudit {
    expected_gold: f64,
    pub cumulative_error: f64,
    pub checks: u64,
    pub tripped: bool,
}

impl ConservationAudit {
    fn credit(&mut self, gold: f64) {
        self.expected_gold += gold;
    }

    fn debit(&mut self, gold: f64) {
        self.expected_gold -= gold;
    }

    fn verify(&mut self, actual_gold: f64, tick: u64) -> bool {
        self.checks += 1;
        let error = (actual_gold - self.expected_gold).abs();
        self.cumulative_error += error;
        if error > GOLD_TOLERANCE {
            self.tripped = true;
            tracing::warn!(
                tick,
                expected = self.expected_gold,
                actual = actual_gold,
                "gold conservation violated"
            );
            return false;
        }
        true
    }
}

// ─── Tick Report ─────────────────────────────────────────────────────────────

/// Everything that happened in one tick, for drivers and dashboards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TickReport {
    pub tick: u64,
    pub trades: Vec<Trade>,
    pub shocks: Vec<ShockEvent>,
    pub manipulation_flags: Vec<(String, ManipulationFlag)>,
    pub orders_expired: u32,
    pub total_gold: f64,
    pub conservation_ok: bool,
}

// ─── Engine ──────────────────────────────────────────────────────────────────

/// Owns all economy state and advances it one tick at a time. Single
/// threaded by contract: every mutation inside a tick goes through this
/// struct, which is what keeps matching and the RNG stream deterministic
/// for a fixed seed and call sequence.
#[derive(Debug, Clone)]
pub struct BazaarEngine {
    catalog: ItemCatalog,
    matching: MatchingEngine,
    agents: BTreeMap<String, AgentHoldings>,
    network: TradingNetwork,
    ledger: FlowLedger,
    trades: VecDeque<Trade>,
    /// Trades executed since the last tick report was cut.
    tick_trades: Vec<Trade>,
    wealth_history: VecDeque<f64>,
    audit: ConservationAudit,
    rng: ChaCha8Rng,
    tick: u64,
}

impl BazaarEngine {
    /// Catalog validation is the only fatal path; everything downstream
    /// assumes a complete catalog.
    pub fn new(seed: u64, defs: Vec<ItemDef>) -> Result<Self, CatalogError> {
        Ok(Self {
            catalog: ItemCatalog::from_defs(defs)?,
            matching: MatchingEngine::default(),
            agents: BTreeMap::new(),
            network: TradingNetwork::default(),
            ledger: FlowLedger::default(),
            trades: VecDeque::new(),
            tick_trades: Vec::new(),
            wealth_history: VecDeque::new(),
            audit: ConservationAudit::default(),
            rng: ChaCha8Rng::seed_from_u64(seed),
            tick: 0,
        })
    }

    pub fn register_agent(&mut self, agent_id: &str, traits: &PersonalityTraits, gold: f64) {
        self.network.register_agent(agent_id, traits);
        let holdings = self
            .agents
            .entry(agent_id.to_string())
            .or_insert_with(|| AgentHoldings::new(0.0));
        // re-registration re-derives the archetype without minting gold
        if holdings.gold == 0.0 && gold > 0.0 {
            holdings.gold = gold;
            self.audit.credit(gold);
        }
    }

    // ─── Tick Loop ───────────────────────────────────────────────────────────

    /// Advance the economy one tick: reprice, produce/consume, detect
    /// manipulation, match every item's book in item-id order, expire old
    /// orders, then book trades into the ledger and reputation network.
    pub fn advance_tick(&mut self) -> TickReport {
        self.tick += 1;
        let tick = self.tick;

        self.catalog.update_prices(tick, &mut self.rng);
        let shocks = simulate_production_cycle(&mut self.catalog, tick, &mut self.rng);
        let manipulation_flags = detect_manipulation(&mut self.catalog, &self.agents, tick);

        for item_id in self.catalog.item_ids() {
            let trades = self.matching.match_orders(
                &item_id,
                &mut self.agents,
                |id| self.network.archetype_label(id),
                tick,
            );
            self.book_trades(trades);
        }
        let orders_expired = self.matching.expire_due(tick);
        self.matching.sweep_terminal();

        // the report covers everything executed since the previous tick,
        // including orders crossed at placement
        let trades = std::mem::take(&mut self.tick_trades);

        self.wealth_history.push_back(self.total_wealth());
        while self.wealth_history.len() > WEALTH_HISTORY_CAP {
            self.wealth_history.pop_front();
        }

        let total_gold = self.total_gold();
        let conservation_ok = self.audit.verify(total_gold, tick);

        tracing::info!(
            tick,
            trades = trades.len(),
            shocks = shocks.len(),
            flags = manipulation_flags.len(),
            orders_expired,
            total_gold,
            "tick complete"
        );

        TickReport {
            tick,
            trades,
            shocks,
            manipulation_flags,
            orders_expired,
            total_gold,
            conservation_ok,
        }
    }

    /// Book executed trades into the ledger, reputation network, and the
    /// bounded trade log; they surface in the next tick report.
    fn book_trades(&mut self, trades: Vec<Trade>) {
        for trade in trades {
            self.ledger.record_trade(&trade);
            let category = self.catalog.get(&trade.item_id).map(|i| i.category);
            // book trades clear at the market price, fair by construction
            self.network.record_trade(
                &trade.buyer_id,
                &trade.seller_id,
                category,
                trade.value(),
                0.0,
                trade.tick,
            );
            self.trades.push_back(trade.clone());
            self.tick_trades.push(trade);
        }
        while self.trades.len() > TRADE_LOG_CAP {
            self.trades.pop_front();
        }
    }

    // ─── Orders ──────────────────────────────────────────────────────────────

    /// Place a limit order at the current tick and cross it against the
    /// book immediately; any remainder rests until matched, cancelled, or
    /// expired. `None` is the normal rejection path (insufficient
    /// funds/stock, unknown item or agent).
    pub fn place_order(
        &mut self,
        owner_id: &str,
        item_id: &str,
        side: OrderSide,
        quantity: u32,
        price_limit: f64,
        ttl: Option<u64>,
    ) -> Option<u64> {
        let order_id = self.matching.place_order(
            &self.agents,
            &self.catalog,
            owner_id,
            item_id,
            side,
            quantity,
            price_limit,
            self.tick,
            ttl,
        )?;
        let trades = self.matching.match_orders(
            item_id,
            &mut self.agents,
            |id| self.network.archetype_label(id),
            self.tick,
        );
        self.book_trades(trades);
        Some(order_id)
    }

    pub fn cancel_order(&mut self, order_id: u64) -> bool {
        self.matching.cancel_order(order_id)
    }

    // ─── Offers ──────────────────────────────────────────────────────────────

    /// Generate an offer from one agent to another given their current
    /// social standing.
    pub fn propose_trade(
        &mut self,
        from_id: &str,
        to_id: &str,
        social: &SocialContext,
    ) -> Option<TradeOffer> {
        let from_holdings = self.agents.get(from_id)?;
        let to_holdings = self.agents.get(to_id)?;
        generate_trade_offer(
            &mut self.network,
            &self.catalog,
            from_id,
            to_id,
            from_holdings,
            to_holdings,
            social,
            self.tick,
        )
    }

    /// Negotiate an offer to completion and settle it if agreed. An agreed
    /// offer whose holdings drifted during negotiation fails and dents the
    /// proposer's reliability.
    pub fn negotiate_offer(
        &mut self,
        offer: TradeOffer,
        trust_in_proposer: f64,
    ) -> (NegotiationState, TradeOffer) {
        let (state, mut settled) = negotiate(
            &self.network,
            &self.catalog,
            offer,
            trust_in_proposer,
            &mut self.rng,
        );
        if state == NegotiationState::Agreed && !self.execute_offer(&settled) {
            settled.status = OfferStatus::Rejected;
            self.network.record_failed_trade(&settled.from);
            return (NegotiationState::Failed, settled);
        }
        (state, settled)
    }

    /// Settle an accepted offer: both legs validated up front, then gold
    /// and items move atomically and every leg lands in the ledger.
    fn execute_offer(&mut self, offer: &TradeOffer) -> bool {
        let (Some(from), Some(to)) = (self.agents.get(&offer.from), self.agents.get(&offer.to))
        else {
            return false;
        };
        if from.gold < offer.offered_gold || to.gold < offer.requested_gold {
            return false;
        }
        if offer
            .offered_items
            .iter()
            .any(|iq| from.item_count(&iq.item_id) < iq.quantity)
            || offer
                .requested_items
                .iter()
                .any(|iq| to.item_count(&iq.item_id) < iq.quantity)
        {
            return false;
        }

        let fairness = trade_fairness(offer, &self.catalog);
        let value = offer
            .offered_value(&self.catalog)
            .max(offer.requested_value(&self.catalog));
        let category = offer
            .offered_items
            .iter()
            .chain(&offer.requested_items)
            .find_map(|iq| self.catalog.get(&iq.item_id).map(|i| i.category));

        if let Some(h) = self.agents.get_mut(&offer.from) {
            h.gold = h.gold - offer.offered_gold + offer.requested_gold;
            for iq in &offer.offered_items {
                h.remove_items(&iq.item_id, iq.quantity);
            }
            for iq in &offer.requested_items {
                h.add_items(&iq.item_id, iq.quantity);
            }
        }
        if let Some(h) = self.agents.get_mut(&offer.to) {
            h.gold = h.gold + offer.offered_gold - offer.requested_gold;
            for iq in &offer.requested_items {
                h.remove_items(&iq.item_id, iq.quantity);
            }
            for iq in &offer.offered_items {
                h.add_items(&iq.item_id, iq.quantity);
            }
        }

        let flow_type = match offer.motivation {
            TradeMotivation::BuildRelationship => FlowType::Gift,
            _ => FlowType::Trade,
        };
        if offer.offered_gold > 0.0 {
            self.ledger.record(
                Some(&offer.from),
                Some(&offer.to),
                flow_type,
                offer.offered_gold,
                None,
                self.tick,
            );
        }
        if offer.requested_gold > 0.0 {
            self.ledger.record(
                Some(&offer.to),
                Some(&offer.from),
                flow_type,
                offer.requested_gold,
                None,
                self.tick,
            );
        }
        for iq in &offer.offered_items {
            self.ledger.record(
                Some(&offer.from),
                Some(&offer.to),
                flow_type,
                0.0,
                Some(iq.clone()),
                self.tick,
            );
        }
        for iq in &offer.requested_items {
            self.ledger.record(
                Some(&offer.to),
                Some(&offer.from),
                flow_type,
                0.0,
                Some(iq.clone()),
                self.tick,
            );
        }

        self.network
            .record_trade(&offer.to, &offer.from, category, value, fairness, self.tick);
        tracing::debug!(
            offer = offer.id,
            from = %offer.from,
            to = %offer.to,
            motivation = offer.motivation.label(),
            "offer settled"
        );
        true
    }

    // ─── External Flows ──────────────────────────────────────────────────────

    /// Book a flow originating outside the market: job rewards, combat
    /// loot, taxes, sinks. `None` endpoints are the system faucet/sink;
    /// those adjust the conservation expectation.
    pub fn record_external_flow(
        &mut self,
        from: Option<&str>,
        to: Option<&str>,
        flow_type: FlowType,
        gold: f64,
        item: Option<ItemQuantity>,
    ) -> Option<u64> {
        if !gold.is_finite() || gold < 0.0 {
            return None;
        }
        if let Some(src) = from {
            let holdings = self.agents.get(src)?;
            if holdings.gold < gold {
                return None;
            }
            if let Some(iq) = &item {
                if holdings.item_count(&iq.item_id) < iq.quantity {
                    return None;
                }
            }
        }
        if let Some(dst) = to {
            self.agents.get(dst)?;
        }

        if let Some(h) = from.and_then(|src| self.agents.get_mut(src)) {
            h.gold -= gold;
            if let Some(iq) = &item {
                h.remove_items(&iq.item_id, iq.quantity);
            }
        }
        if let Some(h) = to.and_then(|dst| self.agents.get_mut(dst)) {
            h.gold += gold;
            if let Some(iq) = &item {
                h.add_items(&iq.item_id, iq.quantity);
            }
        }
        match (from, to) {
            (None, Some(_)) => self.audit.credit(gold),
            (Some(_), None) => self.audit.debit(gold),
            _ => {}
        }
        Some(self.ledger.record(from, to, flow_type, gold, item, self.tick))
    }

    // ─── Analysis ────────────────────────────────────────────────────────────

    pub fn wealth_distribution(&self) -> WealthDistribution {
        wealth_distribution(&self.agents, &self.catalog)
    }

    pub fn economic_entities(&self) -> Vec<EconomicEntity> {
        economic_entities(&self.agents, &self.catalog, &self.ledger, self.tick)
    }

    pub fn bottlenecks(&self) -> Vec<Bottleneck> {
        detect_bottlenecks(&self.catalog, &self.agents, &self.ledger, self.tick)
    }

    pub fn health(&self) -> HealthReport {
        let history: Vec<f64> = self.wealth_history.iter().copied().collect();
        assess_health(&self.catalog, &self.agents, &self.ledger, &history, self.tick)
    }

    // ─── Accessors ───────────────────────────────────────────────────────────

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn catalog(&self) -> &ItemCatalog {
        &self.catalog
    }

    pub fn agent(&self, agent_id: &str) -> Option<&AgentHoldings> {
        self.agents.get(agent_id)
    }

    pub fn agents(&self) -> &BTreeMap<String, AgentHoldings> {
        &self.agents
    }

    pub fn network(&self) -> &TradingNetwork {
        &self.network
    }

    pub fn ledger(&self) -> &FlowLedger {
        &self.ledger
    }

    pub fn trades(&self) -> impl Iterator<Item = &Trade> {
        self.trades.iter()
    }

    pub fn audit(&self) -> &ConservationAudit {
        &self.audit
    }

    pub fn total_gold(&self) -> f64 {
        self.agents.values().map(|h| h.gold).sum()
    }

    pub fn total_wealth(&self) -> f64 {
        self.agents
            .values()
            .map(|h| h.gold + h.inventory_value(|id| self.catalog.price_of(id)))
            .sum()
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
