// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Bazaar Economy Simulation Core - Trade Offer Generation

use serde::{Deserialize, Serialize};

use crate::archetype::{ArchetypeKind, EconomicArchetype};
use crate::catalog::ItemCatalog;
use crate::reputation::TradingNetwork;
use crate::types::{AgentHoldings, ItemCategory, ItemQuantity, PriceTrend};

// ─── Constants ───────────────────────────────────────────────────────────────

/// Stock above this count is considered surplus worth selling down.
const EXCESS_THRESHOLD: u32 = 5;

/// An item priced below this fraction of fair value is a profit target.
const UNDERPRICED_FRACTION: f64 = 0.9;

/// Premium paid over market when chasing a rising trend.
const SPECULATION_PREMIUM: f64 = 1.1;

/// Discount applied when selling to a friend.
const FRIEND_DISCOUNT: f64 = 0.5;

/// Minimum trust before gifting to build a relationship.
const BUILD_RELATIONSHIP_TRUST: f64 = 0.4;

/// Gold attached to a relationship-building gift.
const GIFT_GOLD: f64 = 10.0;

/// Trust demanded of the counterparty for a one-sided offer.
const SKEWED_TRUST_REQUIRED: f64 = 0.8;
const BASE_TRUST_REQUIRED: f64 = 0.1;

// ─── Motivations & Status ────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TradeMotivation {
    /// Sell down surplus stock at a margin.
    ExcessInventory,
    /// Acquire a scarce item at fair value.
    NeedItem,
    /// Buy an item trading below its fair value.
    Profit,
    /// Sell to a friend at a steep discount.
    HelpFriend,
    /// Gift to deepen a budding relationship.
    BuildRelationship,
    /// Pay a premium for an item whose price is rising.
    Speculation,
    /// Deal within the agent's dominant inventory category.
    Specialization,
}

impl TradeMotivation {
    pub fn label(&self) -> &'static str {
        match self {
            Self::ExcessInventory => "excess_inventory",
            Self::NeedItem => "need_item",
            Self::Profit => "profit",
            Self::HelpFriend => "help_friend",
            Self::BuildRelationship => "build_relationship",
            Self::Speculation => "speculation",
            Self::Specialization => "specialization",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum OfferStatus {
    Pending,
    Accepted,
    Rejected,
    Countered,
    Expired,
}

impl OfferStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Accepted | Self::Rejected | Self::Expired)
    }
}

// ─── Social Context ──────────────────────────────────────────────────────────

/// Relationship ladder between two agents, supplied by the social layer.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub enum RelationshipStage {
    Stranger = 0,
    Acquaintance = 1,
    Friend = 2,
    CloseFriend = 3,
}

/// Pairwise social inputs for one proposer/recipient pair. Trust is the
/// proposer's trust as seen by the recipient, in [0, 1].
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SocialContext {
    pub trust: f64,
    pub stage: RelationshipStage,
}

impl Default for SocialContext {
    fn default() -> Self {
        Self {
            trust: 0.0,
            stage: RelationshipStage::Stranger,
        }
    }
}

// ─── Trade Offer ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeOffer {
    pub id: u64,
    pub from: String,
    pub to: String,
    pub offered_items: Vec<ItemQuantity>,
    pub offered_gold: f64,
    pub requested_items: Vec<ItemQuantity>,
    pub requested_gold: f64,
    pub motivation: TradeMotivation,
    /// Minimum trust the recipient must hold in the proposer.
    pub trust_required: f64,
    pub counter_offers: u32,
    pub status: OfferStatus,
    pub created_tick: u64,
}

impl TradeOffer {
    /// Market value of everything the proposer puts on the table.
    pub fn offered_value(&self, catalog: &ItemCatalog) -> f64 {
        self.offered_gold + basket_value(&self.offered_items, catalog)
    }

    /// Market value of everything the proposer asks for.
    pub fn requested_value(&self, catalog: &ItemCatalog) -> f64 {
        self.requested_gold + basket_value(&self.requested_items, catalog)
    }
}

fn basket_value(items: &[ItemQuantity], catalog: &ItemCatalog) -> f64 {
    items
        .iter()
        .map(|iq| catalog.price_of(&iq.item_id).unwrap_or(0.0) * iq.quantity as f64)
        .sum()
}

/// Trust scales with value asymmetry: near-even swaps need almost none,
/// one-sided offers look like scams or favors and need a lot.
pub fn trust_requirement(offered_value: f64, requested_value: f64) -> f64 {
    let max = offered_value.max(requested_value);
    if max <= 0.0 {
        return BASE_TRUST_REQUIRED;
    }
    let min = offered_value.min(requested_value);
    if min <= 0.0 {
        return SKEWED_TRUST_REQUIRED;
    }
    let asymmetry = (max - min) / max;
    (BASE_TRUST_REQUIRED + asymmetry * (SKEWED_TRUST_REQUIRED - BASE_TRUST_REQUIRED))
        .clamp(BASE_TRUST_REQUIRED, SKEWED_TRUST_REQUIRED)
}

// ─── Offer Generation ────────────────────────────────────────────────────────

struct Draft {
    offered_items: Vec<ItemQuantity>,
    offered_gold: f64,
    requested_items: Vec<ItemQuantity>,
    requested_gold: f64,
    motivation: TradeMotivation,
}

/// Propose a trade from one agent to another, or `None` when no strategy
/// produces a viable offer (nothing to sell, nothing wanted, no gold).
///
/// Strategies are tried in archetype-specific priority order; the first
/// that yields a draft wins. Unregistered proposers never offer.
pub fn generate_trade_offer(
    network: &mut TradingNetwork,
    catalog: &ItemCatalog,
    from_id: &str,
    to_id: &str,
    from_holdings: &AgentHoldings,
    to_holdings: &AgentHoldings,
    social: &SocialContext,
    tick: u64,
) -> Option<TradeOffer> {
    if from_id == to_id {
        return None;
    }
    let archetype = network.archetype(from_id)?.clone();

    let draft = strategy_order(archetype.kind).into_iter().find_map(|m| {
        build_draft(
            m,
            catalog,
            &archetype,
            from_holdings,
            to_holdings,
            social,
        )
    })?;

    network.next_offer_id += 1;
    let mut offer = TradeOffer {
        id: network.next_offer_id,
        from: from_id.to_string(),
        to: to_id.to_string(),
        offered_items: draft.offered_items,
        offered_gold: draft.offered_gold,
        requested_items: draft.requested_items,
        requested_gold: draft.requested_gold,
        motivation: draft.motivation,
        trust_required: 0.0,
        counter_offers: 0,
        status: OfferStatus::Pending,
        created_tick: tick,
    };
    offer.trust_required =
        trust_requirement(offer.offered_value(catalog), offer.requested_value(catalog));
    Some(offer)
}

fn strategy_order(kind: ArchetypeKind) -> [TradeMotivation; 7] {
    use TradeMotivation::*;
    match kind {
        ArchetypeKind::Merchant => [
            HelpFriend,
            ExcessInventory,
            Specialization,
            Profit,
            NeedItem,
            BuildRelationship,
            Speculation,
        ],
        ArchetypeKind::Hoarder => [
            NeedItem,
            Profit,
            Speculation,
            HelpFriend,
            ExcessInventory,
            Specialization,
            BuildRelationship,
        ],
        ArchetypeKind::Speculator => [
            Speculation,
            Profit,
            ExcessInventory,
            NeedItem,
            HelpFriend,
            Specialization,
            BuildRelationship,
        ],
        ArchetypeKind::MarketMaker => [
            ExcessInventory,
            Profit,
            NeedItem,
            Specialization,
            BuildRelationship,
            HelpFriend,
            Speculation,
        ],
    }
}

fn build_draft(
    motivation: TradeMotivation,
    catalog: &ItemCatalog,
    archetype: &EconomicArchetype,
    from: &AgentHoldings,
    to: &AgentHoldings,
    social: &SocialContext,
) -> Option<Draft> {
    match motivation {
        TradeMotivation::ExcessInventory => excess_inventory(catalog, archetype, from),
        TradeMotivation::NeedItem => need_item(catalog, from, to),
        TradeMotivation::Profit => profit(catalog, from, to),
        TradeMotivation::HelpFriend => help_friend(catalog, from, to, social),
        TradeMotivation::BuildRelationship => build_relationship(from, social),
        TradeMotivation::Speculation => speculation(catalog, from, to),
        TradeMotivation::Specialization => specialization(catalog, archetype, from),
    }
}

/// Sell surplus stock above market, marked up by the proposer's margin.
fn excess_inventory(
    catalog: &ItemCatalog,
    archetype: &EconomicArchetype,
    from: &AgentHoldings,
) -> Option<Draft> {
    let (item_id, held) = from
        .inventory
        .iter()
        .find(|(id, held)| **held > EXCESS_THRESHOLD && catalog.get(id).is_some())?;
    let quantity = held - EXCESS_THRESHOLD;
    let price = catalog.price_of(item_id)?;
    Some(Draft {
        offered_items: vec![ItemQuantity {
            item_id: item_id.clone(),
            quantity,
        }],
        offered_gold: 0.0,
        requested_items: Vec::new(),
        requested_gold: price * quantity as f64 * (1.0 + archetype.profit_margin),
        motivation: TradeMotivation::ExcessInventory,
    })
}

/// Buy an item the proposer lacks and the market is short of, at fair value.
fn need_item(catalog: &ItemCatalog, from: &AgentHoldings, to: &AgentHoldings) -> Option<Draft> {
    let (item_id, _) = to.inventory.iter().find(|(id, held)| {
        **held > 0
            && from.item_count(id) == 0
            && catalog
                .get(id)
                .map(|item| item.demand > item.supply)
                .unwrap_or(false)
    })?;
    let fair = catalog.calculate_fair_value(item_id)?;
    if from.gold < fair {
        return None;
    }
    Some(Draft {
        offered_items: Vec::new(),
        offered_gold: fair,
        requested_items: vec![ItemQuantity {
            item_id: item_id.clone(),
            quantity: 1,
        }],
        requested_gold: 0.0,
        motivation: TradeMotivation::NeedItem,
    })
}

/// Buy at market an item currently trading below its fair value.
fn profit(catalog: &ItemCatalog, from: &AgentHoldings, to: &AgentHoldings) -> Option<Draft> {
    let (item_id, price) = to.inventory.iter().find_map(|(id, held)| {
        if *held == 0 {
            return None;
        }
        let price = catalog.price_of(id)?;
        let fair = catalog.calculate_fair_value(id)?;
        (price < fair * UNDERPRICED_FRACTION).then(|| (id.clone(), price))
    })?;
    if from.gold < price {
        return None;
    }
    Some(Draft {
        offered_items: Vec::new(),
        offered_gold: price,
        requested_items: vec![ItemQuantity {
            item_id,
            quantity: 1,
        }],
        requested_gold: 0.0,
        motivation: TradeMotivation::Profit,
    })
}

/// Sell a friend an item they lack at half price. Friends and closer only.
fn help_friend(
    catalog: &ItemCatalog,
    from: &AgentHoldings,
    to: &AgentHoldings,
    social: &SocialContext,
) -> Option<Draft> {
    if social.stage < RelationshipStage::Friend {
        return None;
    }
    let (item_id, _) = from
        .inventory
        .iter()
        .find(|(id, held)| **held > 1 && to.item_count(id) == 0 && catalog.get(id).is_some())?;
    let price = catalog.price_of(item_id)?;
    Some(Draft {
        offered_items: vec![ItemQuantity {
            item_id: item_id.clone(),
            quantity: 1,
        }],
        offered_gold: 0.0,
        requested_items: Vec::new(),
        requested_gold: price * FRIEND_DISCOUNT,
        motivation: TradeMotivation::HelpFriend,
    })
}

/// Small no-strings gold gift once trust has started to form.
fn build_relationship(from: &AgentHoldings, social: &SocialContext) -> Option<Draft> {
    if social.trust < BUILD_RELATIONSHIP_TRUST
        || social.stage >= RelationshipStage::Friend
        || from.gold < GIFT_GOLD
    {
        return None;
    }
    Some(Draft {
        offered_items: Vec::new(),
        offered_gold: GIFT_GOLD,
        requested_items: Vec::new(),
        requested_gold: 0.0,
        motivation: TradeMotivation::BuildRelationship,
    })
}

/// Pay a premium for an item whose price trend is rising.
fn speculation(catalog: &ItemCatalog, from: &AgentHoldings, to: &AgentHoldings) -> Option<Draft> {
    let (item_id, price) = to.inventory.iter().find_map(|(id, held)| {
        if *held == 0 || catalog.price_trend(id) != Some(PriceTrend::Rising) {
            return None;
        }
        catalog.price_of(id).map(|p| (id.clone(), p))
    })?;
    let bid = price * SPECULATION_PREMIUM;
    if from.gold < bid {
        return None;
    }
    Some(Draft {
        offered_items: Vec::new(),
        offered_gold: bid,
        requested_items: vec![ItemQuantity {
            item_id,
            quantity: 1,
        }],
        requested_gold: 0.0,
        motivation: TradeMotivation::Speculation,
    })
}

/// Sell stock from the proposer's dominant category at their margin.
fn specialization(
    catalog: &ItemCatalog,
    archetype: &EconomicArchetype,
    from: &AgentHoldings,
) -> Option<Draft> {
    let specialty = dominant_category(catalog, from)?;
    let (item_id, held) = from.inventory.iter().find(|(id, held)| {
        **held > 1
            && catalog
                .get(id)
                .map(|item| item.category == specialty)
                .unwrap_or(false)
    })?;
    let quantity = held / 2;
    let price = catalog.price_of(item_id)?;
    Some(Draft {
        offered_items: vec![ItemQuantity {
            item_id: item_id.clone(),
            quantity,
        }],
        offered_gold: 0.0,
        requested_items: Vec::new(),
        requested_gold: price * quantity as f64 * (1.0 + archetype.profit_margin),
        motivation: TradeMotivation::Specialization,
    })
}

/// Category holding the largest share of the agent's inventory value.
fn dominant_category(catalog: &ItemCatalog, holdings: &AgentHoldings) -> Option<ItemCategory> {
    let mut best: Option<(ItemCategory, f64)> = None;
    let mut totals: std::collections::BTreeMap<ItemCategory, f64> = Default::default();
    for (id, qty) in &holdings.inventory {
        if let Some(item) = catalog.get(id) {
            *totals.entry(item.category).or_insert(0.0) += item.current_price * *qty as f64;
        }
    }
    for (category, value) in totals {
        if best.map(|(_, v)| value > v).unwrap_or(true) {
            best = Some((category, value));
        }
    }
    best.map(|(c, _)| c)
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archetype::PersonalityTraits;
    use crate::catalog::ItemDef;
    use crate::types::Rarity;

    fn catalog() -> ItemCatalog {
        ItemCatalog::from_defs(vec![
            ItemDef {
                id: "ore".into(),
                category: ItemCategory::Material,
                base_cost: 10.0,
                supply: 50.0,
                demand: 50.0,
                production_rate: 5.0,
                consumption_rate: 5.0,
                rarity: Rarity::Common,
                volatility: 0.1,
            },
            ItemDef {
                id: "relic".into(),
                category: ItemCategory::Luxury,
                base_cost: 100.0,
                supply: 5.0,
                demand: 40.0,
                production_rate: 1.0,
                consumption_rate: 1.0,
                rarity: Rarity::Rare,
                volatility: 0.2,
            },
        ])
        .unwrap()
    }

    fn merchant_traits() -> PersonalityTraits {
        PersonalityTraits {
            risk_tolerance: 0.5,
            greed: 0.4,
            patience: 0.8,
            sociability: 0.5,
            aggression: 0.3,
        }
    }

    fn network_with(ids: &[&str]) -> TradingNetwork {
        let mut net = TradingNetwork::default();
        for id in ids {
            net.register_agent(id, &merchant_traits());
        }
        net
    }

    #[test]
    fn unregistered_proposer_offers_nothing() {
        let mut net = TradingNetwork::default();
        let cat = catalog();
        let offer = generate_trade_offer(
            &mut net,
            &cat,
            "ghost",
            "b",
            &AgentHoldings::new(100.0),
            &AgentHoldings::new(100.0),
            &SocialContext::default(),
            1,
        );
        assert!(offer.is_none());
    }

    #[test]
    fn surplus_stock_triggers_excess_inventory() {
        let mut net = network_with(&["a", "b"]);
        let cat = catalog();
        let mut from = AgentHoldings::new(10.0);
        from.add_items("ore", 12);
        let offer = generate_trade_offer(
            &mut net,
            &cat,
            "a",
            "b",
            &from,
            &AgentHoldings::new(100.0),
            &SocialContext::default(),
            1,
        )
        .unwrap();
        assert_eq!(offer.motivation, TradeMotivation::ExcessInventory);
        assert_eq!(offer.offered_items[0].quantity, 7); // 12 - 5 surplus
        // priced above market by the margin
        assert!(offer.requested_gold > 7.0 * 10.0);
        assert_eq!(offer.status, OfferStatus::Pending);
    }

    #[test]
    fn scarce_item_triggers_need_item() {
        // hoarders prioritize acquisition
        let mut net = TradingNetwork::default();
        net.register_agent(
            "a",
            &PersonalityTraits {
                risk_tolerance: 0.3,
                greed: 0.8,
                patience: 0.8,
                sociability: 0.3,
                aggression: 0.3,
            },
        );
        net.register_agent("b", &merchant_traits());
        let cat = catalog();
        let from = AgentHoldings::new(500.0);
        let mut to = AgentHoldings::new(0.0);
        to.add_items("relic", 1); // relic: demand 40 vs supply 5
        let offer = generate_trade_offer(
            &mut net,
            &cat,
            "a",
            "b",
            &from,
            &to,
            &SocialContext::default(),
            1,
        )
        .unwrap();
        assert_eq!(offer.motivation, TradeMotivation::NeedItem);
        assert_eq!(offer.requested_items[0].item_id, "relic");
        assert!(offer.offered_gold > 0.0);
    }

    #[test]
    fn friend_gets_discount() {
        let mut net = network_with(&["a", "b"]);
        let cat = catalog();
        let mut from = AgentHoldings::new(10.0);
        from.add_items("ore", 3);
        let social = SocialContext {
            trust: 0.8,
            stage: RelationshipStage::Friend,
        };
        let offer =
            generate_trade_offer(&mut net, &cat, "a", "b", &from, &AgentHoldings::new(5.0), &social, 1)
                .unwrap();
        assert_eq!(offer.motivation, TradeMotivation::HelpFriend);
        // half of market price
        assert!((offer.requested_gold - 5.0).abs() < 1e-9);
    }

    #[test]
    fn help_friend_requires_friend_stage() {
        let mut net = network_with(&["a", "b"]);
        let cat = catalog();
        let from = AgentHoldings::new(100.0);
        let social = SocialContext {
            trust: 0.8,
            stage: RelationshipStage::Acquaintance,
        };
        let offer =
            generate_trade_offer(&mut net, &cat, "a", "b", &from, &AgentHoldings::new(5.0), &social, 1);
        // falls through to the gift strategy instead
        assert_eq!(
            offer.unwrap().motivation,
            TradeMotivation::BuildRelationship
        );
    }

    #[test]
    fn gift_requires_trust() {
        let mut net = network_with(&["a", "b"]);
        let cat = catalog();
        let from = AgentHoldings::new(100.0);
        let social = SocialContext {
            trust: 0.2,
            stage: RelationshipStage::Acquaintance,
        };
        let offer =
            generate_trade_offer(&mut net, &cat, "a", "b", &from, &AgentHoldings::new(5.0), &social, 1);
        assert!(offer.is_none());
    }

    #[test]
    fn gifts_demand_high_counterparty_trust() {
        // one-sided value means the recipient should be suspicious
        assert!((trust_requirement(10.0, 0.0) - 0.8).abs() < 1e-9);
        assert!((trust_requirement(0.0, 10.0) - 0.8).abs() < 1e-9);
    }

    #[test]
    fn near_even_swaps_need_little_trust() {
        let t = trust_requirement(100.0, 98.0);
        assert!(t < 0.15, "trust {}", t);
        assert!((trust_requirement(0.0, 0.0) - 0.1).abs() < 1e-9);
    }

    #[test]
    fn offer_ids_are_sequential() {
        let mut net = network_with(&["a", "b"]);
        let cat = catalog();
        let mut from = AgentHoldings::new(10.0);
        from.add_items("ore", 12);
        let to = AgentHoldings::new(100.0);
        let o1 = generate_trade_offer(
            &mut net, &cat, "a", "b", &from, &to, &SocialContext::default(), 1,
        )
        .unwrap();
        let o2 = generate_trade_offer(
            &mut net, &cat, "a", "b", &from, &to, &SocialContext::default(), 2,
        )
        .unwrap();
        assert_eq!(o2.id, o1.id + 1);
    }
}
