// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Bazaar Economy Simulation Core - Item Catalog & Pricing Engine

use std::collections::BTreeMap;

use rand::Rng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::types::{ItemCategory, MarketItem, PriceTrend, Rarity};

// ─── Constants ───────────────────────────────────────────────────────────────

/// Price sensitivity to supply/demand imbalance.
const ELASTICITY: f64 = 0.3;

/// Geometric volatility decay per tick; markets stabilize absent new shocks.
const VOLATILITY_DECAY: f64 = 0.95;
const VOLATILITY_FLOOR: f64 = 0.05;

/// Random jitter amplitude: up to `volatility * 10%` of the price.
const JITTER_SCALE: f64 = 0.1;

/// Trend detection: mean of the last window vs the prior window.
const TREND_WINDOW: usize = 10;
const TREND_THRESHOLD: f64 = 0.05;

// Fair-value blend weights: (cost, historical, equilibrium).
const FAIR_WEIGHTS_CAPPED: (f64, f64, f64) = (0.5, 0.3, 0.2);
const FAIR_WEIGHTS_FLOATING: (f64, f64, f64) = (0.2, 0.4, 0.4);

// ─── Catalog Errors (fatal) ──────────────────────────────────────────────────

/// A corrupted or incomplete catalog aborts the whole simulation run;
/// every downstream computation assumes catalog completeness.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("catalog contains no items")]
    Empty,
    #[error("duplicate item id: {0}")]
    DuplicateItem(String),
    #[error("item {0}: base cost must be positive, got {1}")]
    InvalidBaseCost(String, f64),
    #[error("item {0}: volatility must be within [0, 1], got {1}")]
    InvalidVolatility(String, f64),
    #[error("item {0}: {1} must be finite and non-negative")]
    InvalidRate(String, &'static str),
}

// ─── Item Definition ─────────────────────────────────────────────────────────

/// Initialization record for one catalog item. The catalog is a fixed set
/// created once; items are mutated every tick but never destroyed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemDef {
    pub id: String,
    pub category: ItemCategory,
    pub base_cost: f64,
    pub supply: f64,
    pub demand: f64,
    pub production_rate: f64,
    pub consumption_rate: f64,
    pub rarity: Rarity,
    pub volatility: f64,
}

// ─── Item Catalog ────────────────────────────────────────────────────────────

/// Owns all tradeable item records. `BTreeMap` keying keeps per-tick
/// iteration order stable, which keeps RNG draw order reproducible.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ItemCatalog {
    items: BTreeMap<String, MarketItem>,
}

impl ItemCatalog {
    pub fn from_defs(defs: Vec<ItemDef>) -> Result<Self, CatalogError> {
        if defs.is_empty() {
            return Err(CatalogError::Empty);
        }
        let mut items = BTreeMap::new();
        for def in defs {
            if !def.base_cost.is_finite() || def.base_cost <= 0.0 {
                return Err(CatalogError::InvalidBaseCost(def.id, def.base_cost));
            }
            if !def.volatility.is_finite() || !(0.0..=1.0).contains(&def.volatility) {
                return Err(CatalogError::InvalidVolatility(def.id, def.volatility));
            }
            for (value, field) in [
                (def.supply, "supply"),
                (def.demand, "demand"),
                (def.production_rate, "production rate"),
                (def.consumption_rate, "consumption rate"),
            ] {
                if !value.is_finite() || value < 0.0 {
                    return Err(CatalogError::InvalidRate(def.id, field));
                }
            }
            let item = MarketItem {
                id: def.id.clone(),
                category: def.category,
                base_cost: def.base_cost,
                current_price: def.base_cost,
                supply: def.supply,
                demand: def.demand,
                production_rate: def.production_rate,
                consumption_rate: def.consumption_rate,
                rarity: def.rarity,
                volatility: def.volatility,
                price_history: Default::default(),
                flags: Vec::new(),
            };
            if items.insert(def.id.clone(), item).is_some() {
                return Err(CatalogError::DuplicateItem(def.id));
            }
        }
        Ok(Self { items })
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, item_id: &str) -> Option<&MarketItem> {
        self.items.get(item_id)
    }

    pub fn get_mut(&mut self, item_id: &str) -> Option<&mut MarketItem> {
        self.items.get_mut(item_id)
    }

    pub fn price_of(&self, item_id: &str) -> Option<f64> {
        self.items.get(item_id).map(|i| i.current_price)
    }

    pub fn iter(&self) -> impl Iterator<Item = &MarketItem> {
        self.items.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut MarketItem> {
        self.items.values_mut()
    }

    pub fn item_ids(&self) -> Vec<String> {
        self.items.keys().cloned().collect()
    }

    // ─── Price Update ────────────────────────────────────────────────────────

    /// Recompute every item's price once per tick.
    ///
    /// ratio > 1 (demand heavy): multiplier `1 + (ratio - 1) * ELASTICITY`
    /// ratio < 1 (supply heavy): multiplier `1 - (1 - ratio) * ELASTICITY`
    /// then volatility-scaled jitter, geometric volatility decay,
    /// floor/ceiling clamp, and history append.
    pub fn update_prices(&mut self, tick: u64, rng: &mut ChaCha8Rng) {
        for item in self.items.values_mut() {
            let ratio = item.supply_demand_ratio();
            let multiplier = if ratio > 1.0 {
                1.0 + (ratio - 1.0) * ELASTICITY
            } else {
                1.0 - (1.0 - ratio) * ELASTICITY
            };
            let mut price = item.current_price * multiplier;

            let jitter: f64 = rng.gen_range(-1.0..=1.0);
            price += price * item.volatility * JITTER_SCALE * jitter;

            // decay first: the floor is derived from volatility, so the
            // clamp must see the post-decay value
            item.volatility = (item.volatility * VOLATILITY_DECAY).max(VOLATILITY_FLOOR);

            price = price.max(item.price_floor());
            if let Some(ceiling) = item.price_ceiling() {
                price = price.min(ceiling);
            }
            item.current_price = price;
            item.record_price(tick);
        }
    }

    // ─── Fair Value ──────────────────────────────────────────────────────────

    /// Blend cost-based, historical-average, and supply/demand-equilibrium
    /// estimates. Low-rarity items anchor to cost; rare items lean on
    /// observed history and scarcity.
    pub fn calculate_fair_value(&self, item_id: &str) -> Option<f64> {
        let item = self.items.get(item_id)?;

        let cost_estimate = item.base_cost;

        let historical_estimate = if item.price_history.is_empty() {
            item.current_price
        } else {
            let sum: f64 = item.price_history.iter().map(|p| p.price).sum();
            sum / item.price_history.len() as f64
        };

        // Equilibrium: base cost scaled by scarcity, bounded so a single
        // degenerate tick cannot dominate the blend.
        let equilibrium_estimate = item.base_cost * item.supply_demand_ratio().clamp(0.5, 3.0);

        let (wc, wh, we) = if item.rarity.is_price_capped() {
            FAIR_WEIGHTS_CAPPED
        } else {
            FAIR_WEIGHTS_FLOATING
        };
        Some(wc * cost_estimate + wh * historical_estimate + we * equilibrium_estimate)
    }

    // ─── Price Trend ─────────────────────────────────────────────────────────

    /// Compare the mean of the last `TREND_WINDOW` price points to the mean
    /// of the prior window; a >5% delta classifies rising/falling.
    pub fn price_trend(&self, item_id: &str) -> Option<PriceTrend> {
        let item = self.items.get(item_id)?;
        let history = &item.price_history;
        if history.len() < 2 {
            return Some(PriceTrend::Stable);
        }

        let recent_len = TREND_WINDOW.min(history.len() / 2).max(1);
        let prior_len = TREND_WINDOW.min(history.len() - recent_len);
        let recent: f64 = history
            .iter()
            .rev()
            .take(recent_len)
            .map(|p| p.price)
            .sum::<f64>()
            / recent_len as f64;
        let prior: f64 = history
            .iter()
            .rev()
            .skip(recent_len)
            .take(prior_len)
            .map(|p| p.price)
            .sum::<f64>()
            / prior_len as f64;

        if prior.abs() < 1e-12 {
            return Some(PriceTrend::Stable);
        }
        let delta = (recent - prior) / prior;
        Some(if delta > TREND_THRESHOLD {
            PriceTrend::Rising
        } else if delta < -TREND_THRESHOLD {
            PriceTrend::Falling
        } else {
            PriceTrend::Stable
        })
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    pub(crate) fn def(id: &str, base_cost: f64, supply: f64, demand: f64) -> ItemDef {
        ItemDef {
            id: id.into(),
            category: ItemCategory::Material,
            base_cost,
            supply,
            demand,
            production_rate: 5.0,
            consumption_rate: 5.0,
            rarity: Rarity::Common,
            volatility: 0.2,
        }
    }

    fn catalog(defs: Vec<ItemDef>) -> ItemCatalog {
        ItemCatalog::from_defs(defs).expect("valid catalog")
    }

    #[test]
    fn rejects_empty_catalog() {
        assert!(matches!(
            ItemCatalog::from_defs(Vec::new()),
            Err(CatalogError::Empty)
        ));
    }

    #[test]
    fn rejects_duplicate_ids() {
        let result = ItemCatalog::from_defs(vec![
            def("iron", 10.0, 5.0, 5.0),
            def("iron", 12.0, 5.0, 5.0),
        ]);
        assert!(matches!(result, Err(CatalogError::DuplicateItem(_))));
    }

    #[test]
    fn rejects_nonpositive_base_cost() {
        let result = ItemCatalog::from_defs(vec![def("iron", 0.0, 5.0, 5.0)]);
        assert!(matches!(result, Err(CatalogError::InvalidBaseCost(_, _))));
    }

    #[test]
    fn demand_excess_raises_price() {
        // Scenario A: baseCost=100, supply=10, demand=20
        let mut cat = catalog(vec![def("ore", 100.0, 10.0, 20.0)]);
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let before = cat.price_of("ore").unwrap();
        cat.update_prices(1, &mut rng);
        let after = cat.price_of("ore").unwrap();
        // ratio=2 => multiplier 1.3; jitter is at most ±2% here
        assert!(after > before, "price should rise: {} -> {}", before, after);
    }

    #[test]
    fn price_never_below_floor() {
        let mut d = def("glut", 100.0, 1000.0, 1.0);
        d.volatility = 0.8;
        let mut cat = catalog(vec![d]);
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        for tick in 0..200 {
            cat.update_prices(tick, &mut rng);
            let item = cat.get("glut").unwrap();
            assert!(
                item.current_price >= item.price_floor() - 1e-9,
                "tick {}: {} < floor {}",
                tick,
                item.current_price,
                item.price_floor()
            );
        }
    }

    #[test]
    fn low_rarity_price_capped_at_5x() {
        let mut cat = catalog(vec![def("scarce", 10.0, 1.0, 500.0)]);
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        for tick in 0..100 {
            cat.update_prices(tick, &mut rng);
        }
        assert!(cat.price_of("scarce").unwrap() <= 50.0 + 1e-9);
    }

    #[test]
    fn volatility_decays_to_floor() {
        let mut cat = catalog(vec![def("calm", 10.0, 50.0, 50.0)]);
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        for tick in 0..200 {
            cat.update_prices(tick, &mut rng);
        }
        let vol = cat.get("calm").unwrap().volatility;
        assert!((vol - VOLATILITY_FLOOR).abs() < 1e-9);
    }

    #[test]
    fn trend_detects_rising_prices() {
        let mut cat = catalog(vec![def("hot", 100.0, 10.0, 40.0)]);
        let mut rng = ChaCha8Rng::seed_from_u64(13);
        // 12 ticks: the prior window still contains pre-runaway prices
        for tick in 0..12 {
            cat.update_prices(tick, &mut rng);
        }
        assert_eq!(cat.price_trend("hot"), Some(PriceTrend::Rising));
    }

    #[test]
    fn trend_stable_with_short_history() {
        let cat = catalog(vec![def("new", 100.0, 10.0, 10.0)]);
        assert_eq!(cat.price_trend("new"), Some(PriceTrend::Stable));
    }

    #[test]
    fn trend_unknown_item_is_none() {
        let cat = catalog(vec![def("a", 10.0, 1.0, 1.0)]);
        assert_eq!(cat.price_trend("missing"), None);
    }

    #[test]
    fn fair_value_anchors_capped_items_to_cost() {
        let cat = catalog(vec![def("iron", 100.0, 50.0, 50.0)]);
        let fv = cat.calculate_fair_value("iron").unwrap();
        // balanced market, no history beyond spawn: all estimates ≈ 100
        assert!((fv - 100.0).abs() < 1.0, "fair value {}", fv);
    }

    #[test]
    fn fair_value_rises_with_scarcity() {
        let balanced = catalog(vec![def("x", 100.0, 50.0, 50.0)]);
        let scarce = catalog(vec![def("x", 100.0, 10.0, 60.0)]);
        let fv_balanced = balanced.calculate_fair_value("x").unwrap();
        let fv_scarce = scarce.calculate_fair_value("x").unwrap();
        assert!(fv_scarce > fv_balanced);
    }

    #[test]
    fn deterministic_given_seed() {
        let mut a = catalog(vec![def("ore", 100.0, 10.0, 20.0), def("gem", 50.0, 5.0, 9.0)]);
        let mut b = catalog(vec![def("ore", 100.0, 10.0, 20.0), def("gem", 50.0, 5.0, 9.0)]);
        let mut rng_a = ChaCha8Rng::seed_from_u64(99);
        let mut rng_b = ChaCha8Rng::seed_from_u64(99);
        for tick in 0..50 {
            a.update_prices(tick, &mut rng_a);
            b.update_prices(tick, &mut rng_b);
        }
        assert_eq!(a.price_of("ore"), b.price_of("ore"));
        assert_eq!(a.price_of("gem"), b.price_of("gem"));
    }
}
