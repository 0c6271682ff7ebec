// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Bazaar Economy Simulation Core - Order Matching Engine

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::catalog::ItemCatalog;
use crate::types::{AgentHoldings, MarketOrder, OrderSide, OrderStatus, Trade};

// ─── Matching Engine ─────────────────────────────────────────────────────────

/// Price-time-priority order matching. Orders live in submission order;
/// stable sorts break price ties FIFO, so execution is fully deterministic
/// for a fixed order list.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MatchingEngine {
    orders: Vec<MarketOrder>,
    next_order_id: u64,
    next_trade_id: u64,
}

impl MatchingEngine {
    /// Place an order into the pending pool.
    ///
    /// Returns `None` — a normal outcome, not a fault — when the buyer lacks
    /// gold for `quantity * price_limit`, the seller lacks inventory, or the
    /// item/agent is unknown.
    #[allow(clippy::too_many_arguments)]
    pub fn place_order(
        &mut self,
        agents: &BTreeMap<String, AgentHoldings>,
        catalog: &ItemCatalog,
        owner_id: &str,
        item_id: &str,
        side: OrderSide,
        quantity: u32,
        price_limit: f64,
        tick: u64,
        ttl: Option<u64>,
    ) -> Option<u64> {
        if quantity == 0 || !price_limit.is_finite() || price_limit <= 0.0 {
            return None;
        }
        catalog.get(item_id)?;
        let holdings = agents.get(owner_id)?;

        match side {
            OrderSide::Buy => {
                if holdings.gold < quantity as f64 * price_limit {
                    return None;
                }
            }
            OrderSide::Sell => {
                if holdings.item_count(item_id) < quantity {
                    return None;
                }
            }
        }

        self.next_order_id += 1;
        let id = self.next_order_id;
        self.orders.push(MarketOrder {
            id,
            owner_id: owner_id.to_string(),
            item_id: item_id.to_string(),
            side,
            quantity,
            price_limit,
            filled: 0,
            status: OrderStatus::Pending,
            submitted_tick: tick,
            expires_tick: ttl.map(|t| tick + t),
        });
        Some(id)
    }

    /// Match all compatible buy/sell pairs for one item.
    ///
    /// Buys sort by limit descending, sells ascending (stable — ties FIFO).
    /// Each compatible pair (`buy_limit >= sell_limit`) trades at the
    /// midpoint price for the overlapping quantity. Settlement moves gold
    /// and items atomically; an order whose owner can no longer cover it is
    /// cancelled rather than halting the pass.
    pub fn match_orders(
        &mut self,
        item_id: &str,
        agents: &mut BTreeMap<String, AgentHoldings>,
        archetype_label: impl Fn(&str) -> String,
        tick: u64,
    ) -> Vec<Trade> {
        let mut buy_idx: Vec<usize> = Vec::new();
        let mut sell_idx: Vec<usize> = Vec::new();
        for (i, order) in self.orders.iter().enumerate() {
            if order.item_id != item_id || !order.status.is_active() {
                continue;
            }
            match order.side {
                OrderSide::Buy => buy_idx.push(i),
                OrderSide::Sell => sell_idx.push(i),
            }
        }
        buy_idx.sort_by(|&a, &b| {
            self.orders[b]
                .price_limit
                .total_cmp(&self.orders[a].price_limit)
        });
        sell_idx.sort_by(|&a, &b| {
            self.orders[a]
                .price_limit
                .total_cmp(&self.orders[b].price_limit)
        });

        let mut trades = Vec::new();
        for &b in &buy_idx {
            for &s in &sell_idx {
                if self.orders[b].remaining() == 0 || !self.orders[b].status.is_active() {
                    break;
                }
                if self.orders[s].remaining() == 0 || !self.orders[s].status.is_active() {
                    continue;
                }
                if self.orders[b].owner_id == self.orders[s].owner_id {
                    continue;
                }
                // Sells are ascending: once the best buy can't cross, stop.
                if self.orders[b].price_limit < self.orders[s].price_limit {
                    break;
                }

                let quantity = self.orders[b].remaining().min(self.orders[s].remaining());
                let price = (self.orders[b].price_limit + self.orders[s].price_limit) / 2.0;
                let cost = quantity as f64 * price;

                let buyer_id = self.orders[b].owner_id.clone();
                let seller_id = self.orders[s].owner_id.clone();

                // Holdings may have drifted since placement.
                let buyer_solvent = agents
                    .get(&buyer_id)
                    .map(|h| h.gold >= cost)
                    .unwrap_or(false);
                if !buyer_solvent {
                    self.orders[b].status = OrderStatus::Cancelled;
                    break;
                }
                let seller_stocked = agents
                    .get(&seller_id)
                    .map(|h| h.item_count(item_id) >= quantity)
                    .unwrap_or(false);
                if !seller_stocked {
                    self.orders[s].status = OrderStatus::Cancelled;
                    continue;
                }

                if let Some(buyer) = agents.get_mut(&buyer_id) {
                    buyer.gold -= cost;
                    buyer.add_items(item_id, quantity);
                }
                if let Some(seller) = agents.get_mut(&seller_id) {
                    seller.gold += cost;
                    seller.remove_items(item_id, quantity);
                }

                for idx in [b, s] {
                    let order = &mut self.orders[idx];
                    order.filled += quantity;
                    order.status = if order.remaining() == 0 {
                        OrderStatus::Filled
                    } else {
                        OrderStatus::Partial
                    };
                }

                self.next_trade_id += 1;
                trades.push(Trade {
                    id: self.next_trade_id,
                    buyer_id: buyer_id.clone(),
                    seller_id: seller_id.clone(),
                    item_id: item_id.to_string(),
                    quantity,
                    price,
                    tick,
                    buyer_archetype: archetype_label(&buyer_id),
                    seller_archetype: archetype_label(&seller_id),
                });
            }
        }
        trades
    }

    /// Mark active orders past their TTL as expired.
    pub fn expire_due(&mut self, tick: u64) -> u32 {
        let mut expired = 0;
        for order in &mut self.orders {
            if order.status.is_active() {
                if let Some(expiry) = order.expires_tick {
                    if tick >= expiry {
                        order.status = OrderStatus::Expired;
                        expired += 1;
                    }
                }
            }
        }
        expired
    }

    /// Garbage-collect terminal orders (filled, cancelled, expired).
    pub fn sweep_terminal(&mut self) -> u32 {
        let before = self.orders.len();
        self.orders.retain(|o| o.status.is_active());
        (before - self.orders.len()) as u32
    }

    pub fn cancel_order(&mut self, order_id: u64) -> bool {
        match self
            .orders
            .iter_mut()
            .find(|o| o.id == order_id && o.status.is_active())
        {
            Some(order) => {
                order.status = OrderStatus::Cancelled;
                true
            }
            None => false,
        }
    }

    pub fn order(&self, order_id: u64) -> Option<&MarketOrder> {
        self.orders.iter().find(|o| o.id == order_id)
    }

    pub fn open_orders<'a>(&'a self, item_id: &'a str) -> impl Iterator<Item = &'a MarketOrder> + 'a {
        self.orders
            .iter()
            .filter(move |o| o.item_id == item_id && o.status.is_active())
    }

    /// (open buy count, open sell count) for one item's book.
    pub fn depth(&self, item_id: &str) -> (u32, u32) {
        let mut buys = 0;
        let mut sells = 0;
        for order in self.open_orders(item_id) {
            match order.side {
                OrderSide::Buy => buys += 1,
                OrderSide::Sell => sells += 1,
            }
        }
        (buys, sells)
    }

    pub fn open_order_count(&self) -> usize {
        self.orders.iter().filter(|o| o.status.is_active()).count()
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{ItemCatalog, ItemDef};
    use crate::types::{ItemCategory, Rarity};

    fn catalog() -> ItemCatalog {
        ItemCatalog::from_defs(vec![ItemDef {
            id: "iron_sword".into(),
            category: ItemCategory::Weapon,
            base_cost: 10.0,
            supply: 100.0,
            demand: 100.0,
            production_rate: 5.0,
            consumption_rate: 5.0,
            rarity: Rarity::Common,
            volatility: 0.1,
        }])
        .unwrap()
    }

    fn agents() -> BTreeMap<String, AgentHoldings> {
        let mut m = BTreeMap::new();
        let mut seller = AgentHoldings::new(0.0);
        seller.add_items("iron_sword", 20);
        m.insert("alice".to_string(), seller);
        m.insert("bob".to_string(), AgentHoldings::new(100.0));
        m
    }

    fn label(_: &str) -> String {
        "unregistered".to_string()
    }

    #[test]
    fn crossing_orders_trade_at_midpoint() {
        // Scenario B: A sells 5 at limit 8, B buys 5 at limit 10 -> price 9
        let cat = catalog();
        let mut agents = agents();
        let mut engine = MatchingEngine::default();
        let sell = engine
            .place_order(&agents, &cat, "alice", "iron_sword", OrderSide::Sell, 5, 8.0, 0, None)
            .unwrap();
        let buy = engine
            .place_order(&agents, &cat, "bob", "iron_sword", OrderSide::Buy, 5, 10.0, 0, None)
            .unwrap();

        let trades = engine.match_orders("iron_sword", &mut agents, label, 0);
        assert_eq!(trades.len(), 1);
        let t = &trades[0];
        assert!((t.price - 9.0).abs() < 1e-9);
        assert_eq!(t.quantity, 5);
        assert!((agents["alice"].gold - 45.0).abs() < 1e-9);
        assert!((agents["bob"].gold - 55.0).abs() < 1e-9);
        assert_eq!(agents["bob"].item_count("iron_sword"), 5);
        assert_eq!(agents["alice"].item_count("iron_sword"), 15);
        assert_eq!(engine.order(sell).unwrap().status, OrderStatus::Filled);
        assert_eq!(engine.order(buy).unwrap().status, OrderStatus::Filled);
    }

    #[test]
    fn insufficient_gold_rejects_buy() {
        let cat = catalog();
        let agents = agents();
        let mut engine = MatchingEngine::default();
        // bob has 100 gold; 20 * 10 = 200 needed
        let rejected = engine.place_order(
            &agents, &cat, "bob", "iron_sword", OrderSide::Buy, 20, 10.0, 0, None,
        );
        assert!(rejected.is_none());
    }

    #[test]
    fn insufficient_inventory_rejects_sell() {
        let cat = catalog();
        let agents = agents();
        let mut engine = MatchingEngine::default();
        let rejected = engine.place_order(
            &agents, &cat, "alice", "iron_sword", OrderSide::Sell, 25, 5.0, 0, None,
        );
        assert!(rejected.is_none());
    }

    #[test]
    fn unknown_item_or_agent_rejected() {
        let cat = catalog();
        let agents = agents();
        let mut engine = MatchingEngine::default();
        assert!(engine
            .place_order(&agents, &cat, "bob", "missing", OrderSide::Buy, 1, 1.0, 0, None)
            .is_none());
        assert!(engine
            .place_order(&agents, &cat, "ghost", "iron_sword", OrderSide::Buy, 1, 1.0, 0, None)
            .is_none());
    }

    #[test]
    fn partial_fill_leaves_remainder_open() {
        let cat = catalog();
        let mut agents = agents();
        let mut engine = MatchingEngine::default();
        engine
            .place_order(&agents, &cat, "alice", "iron_sword", OrderSide::Sell, 3, 8.0, 0, None)
            .unwrap();
        let buy = engine
            .place_order(&agents, &cat, "bob", "iron_sword", OrderSide::Buy, 10, 9.0, 0, None)
            .unwrap();

        let trades = engine.match_orders("iron_sword", &mut agents, label, 0);
        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0].quantity, 3);
        let order = engine.order(buy).unwrap();
        assert_eq!(order.status, OrderStatus::Partial);
        assert_eq!(order.remaining(), 7);
    }

    #[test]
    fn book_views_track_open_orders() {
        let cat = catalog();
        let agents = agents();
        let mut engine = MatchingEngine::default();
        engine
            .place_order(&agents, &cat, "alice", "iron_sword", OrderSide::Sell, 3, 8.0, 0, None)
            .unwrap();
        engine
            .place_order(&agents, &cat, "bob", "iron_sword", OrderSide::Buy, 2, 9.0, 0, None)
            .unwrap();

        // item id borrowed for the lifetime of the view
        let item = String::from("iron_sword");
        let open: Vec<&MarketOrder> = engine.open_orders(&item).collect();
        assert_eq!(open.len(), 2);
        assert_eq!(engine.depth(&item), (1, 1));
        assert_eq!(engine.open_order_count(), 2);
    }

    #[test]
    fn price_priority_then_fifo() {
        let cat = catalog();
        let mut agents = agents();
        agents.insert("carol".to_string(), AgentHoldings::new(100.0));
        let mut engine = MatchingEngine::default();
        engine
            .place_order(&agents, &cat, "alice", "iron_sword", OrderSide::Sell, 2, 8.0, 0, None)
            .unwrap();
        // bob submits first at the same limit as carol: FIFO wins the fill
        engine
            .place_order(&agents, &cat, "bob", "iron_sword", OrderSide::Buy, 2, 9.0, 0, None)
            .unwrap();
        engine
            .place_order(&agents, &cat, "carol", "iron_sword", OrderSide::Buy, 2, 9.0, 1, None)
            .unwrap();

        let trades = engine.match_orders("iron_sword", &mut agents, label, 1);
        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0].buyer_id, "bob");
    }

    #[test]
    fn matching_is_deterministic() {
        let cat = catalog();
        let run = || {
            let mut agents = agents();
            agents.insert("carol".to_string(), AgentHoldings::new(500.0));
            let mut engine = MatchingEngine::default();
            for (qty, limit) in [(4u32, 7.5), (3, 8.0), (6, 7.0)] {
                engine
                    .place_order(
                        &agents, &cat, "alice", "iron_sword", OrderSide::Sell, qty, limit, 0, None,
                    )
                    .unwrap();
            }
            for (owner, qty, limit) in [("bob", 5u32, 9.0), ("carol", 5, 9.0), ("bob", 2, 7.2)] {
                engine
                    .place_order(
                        &agents, &cat, owner, "iron_sword", OrderSide::Buy, qty, limit, 0, None,
                    )
                    .unwrap();
            }
            engine
                .match_orders("iron_sword", &mut agents, label, 0)
                .iter()
                .map(|t| (t.buyer_id.clone(), t.seller_id.clone(), t.quantity, t.price))
                .collect::<Vec<_>>()
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn no_self_trades() {
        let cat = catalog();
        let mut agents = agents();
        // alice holds items and enough gold to buy her own stock
        agents.get_mut("alice").unwrap().gold = 1000.0;
        let mut engine = MatchingEngine::default();
        engine
            .place_order(&agents, &cat, "alice", "iron_sword", OrderSide::Sell, 5, 8.0, 0, None)
            .unwrap();
        engine
            .place_order(&agents, &cat, "alice", "iron_sword", OrderSide::Buy, 5, 10.0, 0, None)
            .unwrap();
        let trades = engine.match_orders("iron_sword", &mut agents, label, 0);
        assert!(trades.is_empty());
    }

    #[test]
    fn ttl_expiry_and_sweep() {
        let cat = catalog();
        let mut agents = agents();
        let mut engine = MatchingEngine::default();
        let id = engine
            .place_order(&agents, &cat, "bob", "iron_sword", OrderSide::Buy, 1, 5.0, 0, Some(10))
            .unwrap();
        assert_eq!(engine.expire_due(5), 0);
        assert_eq!(engine.expire_due(10), 1);
        assert_eq!(engine.order(id).unwrap().status, OrderStatus::Expired);
        assert_eq!(engine.sweep_terminal(), 1);
        assert!(engine.order(id).is_none());

        // matching after expiry finds nothing
        let trades = engine.match_orders("iron_sword", &mut agents, label, 11);
        assert!(trades.is_empty());
    }

    #[test]
    fn conservation_across_many_matches() {
        let cat = catalog();
        let mut agents = agents();
        agents.insert("carol".to_string(), AgentHoldings::new(300.0));
        let gold_before: f64 = agents.values().map(|h| h.gold).sum();
        let items_before: u32 = agents.values().map(|h| h.item_count("iron_sword")).sum();

        let mut engine = MatchingEngine::default();
        for (qty, limit) in [(5u32, 6.0), (5, 7.0), (5, 8.0)] {
            engine
                .place_order(&agents, &cat, "alice", "iron_sword", OrderSide::Sell, qty, limit, 0, None)
                .unwrap();
        }
        for (owner, qty, limit) in [("bob", 6u32, 9.0), ("carol", 8, 8.5)] {
            engine
                .place_order(&agents, &cat, owner, "iron_sword", OrderSide::Buy, qty, limit, 0, None)
                .unwrap();
        }
        engine.match_orders("iron_sword", &mut agents, label, 0);

        let gold_after: f64 = agents.values().map(|h| h.gold).sum();
        let items_after: u32 = agents.values().map(|h| h.item_count("iron_sword")).sum();
        assert!((gold_before - gold_after).abs() < 1e-9, "gold leaked");
        assert_eq!(items_before, items_after, "items leaked");
    }
}
