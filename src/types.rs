// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Bazaar Economy Simulation Core - Type Definitions

use std::collections::BTreeMap;
use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

/// Simulated hour, in ticks. Used for manipulation-flag expiry and the
/// stagnation lookback window.
pub const TICKS_PER_HOUR: u64 = 60;

/// Maximum retained price points per item (FIFO eviction).
pub const PRICE_HISTORY_CAP: usize = 100;

// ─── Item Category ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub enum ItemCategory {
    Weapon = 0,
    Armor = 1,
    Consumable = 2,
    Material = 3,
    Tool = 4,
    Luxury = 5,
}

impl ItemCategory {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Weapon => "weapon",
            Self::Armor => "armor",
            Self::Consumable => "consumable",
            Self::Material => "material",
            Self::Tool => "tool",
            Self::Luxury => "luxury",
        }
    }
}

// ─── Rarity ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub enum Rarity {
    Common = 0,
    Uncommon = 1,
    Rare = 2,
    Epic = 3,
    Legendary = 4,
}

impl Rarity {
    /// Low-rarity items are price-capped at 5x base cost; rare and above
    /// float freely.
    pub fn is_price_capped(&self) -> bool {
        matches!(self, Self::Common | Self::Uncommon)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Common => "common",
            Self::Uncommon => "uncommon",
            Self::Rare => "rare",
            Self::Epic => "epic",
            Self::Legendary => "legendary",
        }
    }
}

// ─── Price History ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PriceDataPoint {
    pub tick: u64,
    pub price: f64,
    pub supply: f64,
    pub demand: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum PriceTrend {
    Rising,
    Falling,
    Stable,
}

// ─── Manipulation Flags ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ManipulationKind {
    /// Price runaway above fundamentals.
    Bubble,
    /// Single holder controls an outsized share of circulating supply.
    Cornering,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManipulationFlag {
    pub kind: ManipulationKind,
    /// 0..1 — excess ratio for bubbles, holder share for cornering.
    pub severity: f64,
    /// Agent responsible, when attributable (cornering only).
    pub agent_id: Option<String>,
    pub detected_tick: u64,
    pub expires_tick: u64,
}

// ─── MarketItem ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketItem {
    pub id: String,
    pub category: ItemCategory,
    pub base_cost: f64,
    pub current_price: f64,
    pub supply: f64,
    pub demand: f64,
    pub production_rate: f64,
    pub consumption_rate: f64,
    pub rarity: Rarity,
    pub volatility: f64,
    #[serde(default)]
    pub price_history: VecDeque<PriceDataPoint>,
    #[serde(default)]
    pub flags: Vec<ManipulationFlag>,
}

impl MarketItem {
    /// Invariant floor: `base_cost * (1 - volatility * 0.5)`.
    pub fn price_floor(&self) -> f64 {
        self.base_cost * (1.0 - self.volatility * 0.5)
    }

    /// Invariant ceiling for low-rarity items: `base_cost * 5`.
    pub fn price_ceiling(&self) -> Option<f64> {
        if self.rarity.is_price_capped() {
            Some(self.base_cost * 5.0)
        } else {
            None
        }
    }

    pub fn supply_demand_ratio(&self) -> f64 {
        self.demand / self.supply.max(1.0)
    }

    /// Append the current price to the bounded history.
    pub fn record_price(&mut self, tick: u64) {
        self.price_history.push_back(PriceDataPoint {
            tick,
            price: self.current_price,
            supply: self.supply,
            demand: self.demand,
        });
        while self.price_history.len() > PRICE_HISTORY_CAP {
            self.price_history.pop_front();
        }
    }

    pub fn has_flag(&self, kind: ManipulationKind) -> bool {
        self.flags.iter().any(|f| f.kind == kind)
    }
}

// ─── Orders ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum OrderSide {
    Buy,
    Sell,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum OrderStatus {
    Pending = 0,
    Partial = 1,
    Filled = 2,    // TERMINAL
    Cancelled = 3, // TERMINAL
    Expired = 4,   // TERMINAL
}

impl OrderStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Filled | Self::Cancelled | Self::Expired)
    }

    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketOrder {
    pub id: u64,
    pub owner_id: String,
    pub item_id: String,
    pub side: OrderSide,
    pub quantity: u32,
    pub price_limit: f64,
    pub filled: u32,
    pub status: OrderStatus,
    pub submitted_tick: u64,
    /// Orders without an expiry never age out.
    pub expires_tick: Option<u64>,
}

impl MarketOrder {
    pub fn remaining(&self) -> u32 {
        self.quantity.saturating_sub(self.filled)
    }
}

// ─── Trade ───────────────────────────────────────────────────────────────────

/// Immutable record of one completed match. Append-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trade {
    pub id: u64,
    pub buyer_id: String,
    pub seller_id: String,
    pub item_id: String,
    pub quantity: u32,
    pub price: f64,
    pub tick: u64,
    pub buyer_archetype: String,
    pub seller_archetype: String,
}

impl Trade {
    pub fn value(&self) -> f64 {
        self.quantity as f64 * self.price
    }
}

// ─── Resource Flows ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum FlowType {
    Trade,
    JobReward,
    CombatLoot,
    Tax,
    Gift,
    Sink,
}

impl FlowType {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Trade => "trade",
            Self::JobReward => "job_reward",
            Self::CombatLoot => "combat_loot",
            Self::Tax => "tax",
            Self::Gift => "gift",
            Self::Sink => "sink",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemQuantity {
    pub item_id: String,
    pub quantity: u32,
}

/// Ledger entry for one gold/item transfer. `from`/`to` are `None` for
/// system faucets and sinks respectively.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceFlow {
    pub id: u64,
    pub from: Option<String>,
    pub to: Option<String>,
    pub flow_type: FlowType,
    pub gold: f64,
    pub item: Option<ItemQuantity>,
    pub tick: u64,
}

// ─── Agent Holdings ──────────────────────────────────────────────────────────

/// Economy-scoped view of one agent's gold and inventory. Agent identity
/// itself belongs to the game layer; this is keyed by foreign-key id only.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentHoldings {
    pub gold: f64,
    pub inventory: BTreeMap<String, u32>,
}

impl AgentHoldings {
    pub fn new(gold: f64) -> Self {
        Self {
            gold,
            inventory: BTreeMap::new(),
        }
    }

    pub fn item_count(&self, item_id: &str) -> u32 {
        self.inventory.get(item_id).copied().unwrap_or(0)
    }

    pub fn add_items(&mut self, item_id: &str, quantity: u32) {
        if quantity == 0 {
            return;
        }
        *self.inventory.entry(item_id.to_string()).or_insert(0) += quantity;
    }

    /// Returns `false` (and leaves the inventory untouched) when the agent
    /// does not hold enough.
    pub fn remove_items(&mut self, item_id: &str, quantity: u32) -> bool {
        match self.inventory.get_mut(item_id) {
            Some(held) if *held >= quantity => {
                *held -= quantity;
                if *held == 0 {
                    self.inventory.remove(item_id);
                }
                true
            }
            _ => false,
        }
    }

    /// Inventory value priced at current catalog prices.
    pub fn inventory_value(&self, price_of: impl Fn(&str) -> Option<f64>) -> f64 {
        self.inventory
            .iter()
            .map(|(id, qty)| price_of(id).unwrap_or(0.0) * *qty as f64)
            .sum()
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn item() -> MarketItem {
        MarketItem {
            id: "iron_ingot".into(),
            category: ItemCategory::Material,
            base_cost: 100.0,
            current_price: 100.0,
            supply: 50.0,
            demand: 50.0,
            production_rate: 5.0,
            consumption_rate: 5.0,
            rarity: Rarity::Common,
            volatility: 0.2,
            price_history: VecDeque::new(),
            flags: Vec::new(),
        }
    }

    #[test]
    fn price_floor_scales_with_volatility() {
        let it = item();
        // 100 * (1 - 0.2*0.5) = 90
        assert!((it.price_floor() - 90.0).abs() < 1e-9);
    }

    #[test]
    fn price_ceiling_only_for_low_rarity() {
        let mut it = item();
        assert_eq!(it.price_ceiling(), Some(500.0));
        it.rarity = Rarity::Epic;
        assert_eq!(it.price_ceiling(), None);
    }

    #[test]
    fn price_history_is_bounded() {
        let mut it = item();
        for tick in 0..250 {
            it.record_price(tick);
        }
        assert_eq!(it.price_history.len(), PRICE_HISTORY_CAP);
        // Oldest entries evicted first
        assert_eq!(it.price_history.front().unwrap().tick, 150);
    }

    #[test]
    fn supply_demand_ratio_guards_zero_supply() {
        let mut it = item();
        it.supply = 0.0;
        it.demand = 20.0;
        assert!((it.supply_demand_ratio() - 20.0).abs() < 1e-9);
    }

    #[test]
    fn order_status_terminality() {
        assert!(OrderStatus::Filled.is_terminal());
        assert!(OrderStatus::Cancelled.is_terminal());
        assert!(OrderStatus::Expired.is_terminal());
        assert!(OrderStatus::Pending.is_active());
        assert!(OrderStatus::Partial.is_active());
    }

    #[test]
    fn holdings_remove_is_atomic() {
        let mut h = AgentHoldings::new(10.0);
        h.add_items("iron_ingot", 3);
        assert!(!h.remove_items("iron_ingot", 5));
        assert_eq!(h.item_count("iron_ingot"), 3);
        assert!(h.remove_items("iron_ingot", 3));
        assert_eq!(h.item_count("iron_ingot"), 0);
    }

    #[test]
    fn trade_value() {
        let t = Trade {
            id: 1,
            buyer_id: "b".into(),
            seller_id: "s".into(),
            item_id: "iron_ingot".into(),
            quantity: 5,
            price: 9.0,
            tick: 1,
            buyer_archetype: "merchant".into(),
            seller_archetype: "hoarder".into(),
        };
        assert!((t.value() - 45.0).abs() < 1e-9);
    }
}
