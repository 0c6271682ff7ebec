// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Bazaar Economy Simulation Core - Resource Flow Ledger

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::types::{FlowType, ItemQuantity, ResourceFlow, Trade};

/// Ledger retention cap (FIFO eviction).
const LEDGER_CAP: usize = 10_000;

// ─── Flow Ledger ─────────────────────────────────────────────────────────────

/// Append-only record of every gold/item transfer in the economy. Source
/// of truth for all downstream wealth and flow analysis. Bounded: the
/// oldest entries are evicted past `LEDGER_CAP`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FlowLedger {
    flows: VecDeque<ResourceFlow>,
    next_flow_id: u64,
}

impl FlowLedger {
    pub fn record(
        &mut self,
        from: Option<&str>,
        to: Option<&str>,
        flow_type: FlowType,
        gold: f64,
        item: Option<ItemQuantity>,
        tick: u64,
    ) -> u64 {
        self.next_flow_id += 1;
        let id = self.next_flow_id;
        self.flows.push_back(ResourceFlow {
            id,
            from: from.map(str::to_string),
            to: to.map(str::to_string),
            flow_type,
            gold,
            item,
            tick,
        });
        while self.flows.len() > LEDGER_CAP {
            self.flows.pop_front();
        }
        id
    }

    /// Record both legs of a completed trade: gold buyer -> seller, items
    /// seller -> buyer.
    pub fn record_trade(&mut self, trade: &Trade) {
        self.record(
            Some(&trade.buyer_id),
            Some(&trade.seller_id),
            FlowType::Trade,
            trade.value(),
            None,
            trade.tick,
        );
        self.record(
            Some(&trade.seller_id),
            Some(&trade.buyer_id),
            FlowType::Trade,
            0.0,
            Some(ItemQuantity {
                item_id: trade.item_id.clone(),
                quantity: trade.quantity,
            }),
            trade.tick,
        );
    }

    pub fn len(&self) -> usize {
        self.flows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flows.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ResourceFlow> {
        self.flows.iter()
    }

    pub fn flows_since(&self, tick: u64) -> impl Iterator<Item = &ResourceFlow> {
        // Entries are appended in tick order; a reverse scan would be
        // cheaper but the ledger is small enough to keep this simple.
        self.flows.iter().filter(move |f| f.tick >= tick)
    }

    pub fn count_since(&self, tick: u64) -> usize {
        self.flows_since(tick).count()
    }

    /// Net gold for one agent (inflow minus outflow) since a tick.
    pub fn net_gold_flow(&self, agent_id: &str, since_tick: u64) -> f64 {
        let mut net = 0.0;
        for flow in self.flows_since(since_tick) {
            if flow.to.as_deref() == Some(agent_id) {
                net += flow.gold;
            }
            if flow.from.as_deref() == Some(agent_id) {
                net -= flow.gold;
            }
        }
        net
    }

    /// Gross gold moved (in + out) for one agent since a tick.
    pub fn gross_gold_flow(&self, agent_id: &str, since_tick: u64) -> f64 {
        let mut gross = 0.0;
        for flow in self.flows_since(since_tick) {
            if flow.to.as_deref() == Some(agent_id) || flow.from.as_deref() == Some(agent_id) {
                gross += flow.gold;
            }
        }
        gross
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ledger_is_bounded() {
        let mut ledger = FlowLedger::default();
        for tick in 0..(LEDGER_CAP as u64 + 500) {
            ledger.record(None, Some("a"), FlowType::JobReward, 1.0, None, tick);
        }
        assert_eq!(ledger.len(), LEDGER_CAP);
        // Oldest evicted: first remaining entry is tick 500
        assert_eq!(ledger.iter().next().unwrap().tick, 500);
    }

    #[test]
    fn trade_records_both_legs() {
        let mut ledger = FlowLedger::default();
        let trade = Trade {
            id: 1,
            buyer_id: "b".into(),
            seller_id: "s".into(),
            item_id: "ore".into(),
            quantity: 5,
            price: 9.0,
            tick: 3,
            buyer_archetype: "merchant".into(),
            seller_archetype: "hoarder".into(),
        };
        ledger.record_trade(&trade);
        assert_eq!(ledger.len(), 2);
        assert!((ledger.net_gold_flow("s", 0) - 45.0).abs() < 1e-9);
        assert!((ledger.net_gold_flow("b", 0) + 45.0).abs() < 1e-9);
        let item_leg = ledger.iter().find(|f| f.item.is_some()).unwrap();
        assert_eq!(item_leg.to.as_deref(), Some("b"));
        assert_eq!(item_leg.item.as_ref().unwrap().quantity, 5);
    }

    #[test]
    fn windowed_queries_respect_tick() {
        let mut ledger = FlowLedger::default();
        ledger.record(Some("a"), Some("b"), FlowType::Gift, 10.0, None, 5);
        ledger.record(Some("a"), Some("b"), FlowType::Gift, 20.0, None, 15);
        assert_eq!(ledger.count_since(10), 1);
        assert!((ledger.net_gold_flow("b", 10) - 20.0).abs() < 1e-9);
        assert!((ledger.gross_gold_flow("a", 0) - 30.0).abs() < 1e-9);
    }

    #[test]
    fn system_flows_have_open_ends() {
        let mut ledger = FlowLedger::default();
        ledger.record(None, Some("a"), FlowType::CombatLoot, 50.0, None, 1);
        ledger.record(Some("a"), None, FlowType::Sink, 10.0, None, 2);
        assert!((ledger.net_gold_flow("a", 0) - 40.0).abs() < 1e-9);
    }
}
