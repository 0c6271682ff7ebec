// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Bazaar Economy Simulation Core - Offer Evaluation & Negotiation

use rand::Rng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::archetype::ArchetypeKind;
use crate::catalog::ItemCatalog;
use crate::offers::{OfferStatus, TradeOffer};
use crate::reputation::TradingNetwork;
use crate::types::PriceTrend;

// ─── Constants ───────────────────────────────────────────────────────────────

/// Market makers accept anything within this fairness band of parity.
pub const FAIR_TRADE_TOLERANCE: f64 = 0.15;

/// Hard cap on counter-offer exchanges before a negotiation fails.
pub const MAX_NEGOTIATION_ROUNDS: u32 = 5;

/// Proposers below this reliability are not worth dealing with.
const MIN_RELIABILITY: f64 = 0.3;

/// Merchants tolerate a slight loss to keep goods moving.
const MERCHANT_FLOOR: f64 = -0.1;

/// Hoarders only part with anything for a clear gain.
const HOARDER_FLOOR: f64 = 0.2;

// ─── Fairness ────────────────────────────────────────────────────────────────

/// Offer fairness from the recipient's perspective, in [-1, 1].
///
/// `(receiving - giving) / giving`: 0 at parity, positive in the
/// recipient's favor. Degenerate cases pin to the extremes: receiving
/// something for nothing is +1, giving something for nothing is -1.
pub fn trade_fairness(offer: &TradeOffer, catalog: &ItemCatalog) -> f64 {
    let receiving = offer.offered_value(catalog);
    let giving = offer.requested_value(catalog);
    if giving <= 0.0 {
        return if receiving > 0.0 { 1.0 } else { 0.0 };
    }
    if receiving <= 0.0 {
        return -1.0;
    }
    ((receiving - giving) / giving).clamp(-1.0, 1.0)
}

// ─── Evaluation ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum OfferResponse {
    Accept,
    Counter,
    Reject,
}

/// Decide how the recipient responds to an offer.
///
/// Hard gates first (trust, blacklist, proposer reliability), then the
/// recipient's archetype sets the acceptance bar. Anything not accepted
/// outright is countered while rounds remain, otherwise rejected.
pub fn evaluate_offer(
    network: &TradingNetwork,
    catalog: &ItemCatalog,
    offer: &TradeOffer,
    trust_in_proposer: f64,
    rng: &mut ChaCha8Rng,
) -> OfferResponse {
    if trust_in_proposer < offer.trust_required {
        return OfferResponse::Reject;
    }
    if let Some(rep) = network.reputation(&offer.to) {
        if rep.is_blacklisted(&offer.from) {
            return OfferResponse::Reject;
        }
    }
    let proposer_reliability = network
        .reputation(&offer.from)
        .map(|r| r.reliability_score())
        .unwrap_or(0.5);
    if proposer_reliability < MIN_RELIABILITY {
        return OfferResponse::Reject;
    }

    let Some(archetype) = network.archetype(&offer.to) else {
        return OfferResponse::Reject;
    };
    let fairness = trade_fairness(offer, catalog);

    let accepts = match archetype.kind {
        ArchetypeKind::Merchant => fairness >= MERCHANT_FLOOR,
        ArchetypeKind::Hoarder => {
            let gain_ok = fairness > HOARDER_FLOOR;
            if offer.requested_items.is_empty() {
                gain_ok
            } else {
                // parting with stock takes both a clear gain and a mood
                gain_ok && rng.gen::<f64>() > archetype.holding_propensity
            }
        }
        ArchetypeKind::Speculator => {
            fairness >= 0.0
                || offer
                    .offered_items
                    .iter()
                    .any(|iq| catalog.price_trend(&iq.item_id) == Some(PriceTrend::Rising))
        }
        ArchetypeKind::MarketMaker => fairness.abs() <= FAIR_TRADE_TOLERANCE,
    };

    if accepts {
        OfferResponse::Accept
    } else if offer.counter_offers < MAX_NEGOTIATION_ROUNDS {
        OfferResponse::Counter
    } else {
        OfferResponse::Reject
    }
}

// ─── Counter Offers ──────────────────────────────────────────────────────────

/// Produce a counter moving the gold legs halfway toward parity. `None`
/// when the offer already sits inside the fairness tolerance or rounds
/// are exhausted; the caller treats that as a failed negotiation.
pub fn generate_counter_offer(offer: &TradeOffer, catalog: &ItemCatalog) -> Option<TradeOffer> {
    if offer.counter_offers >= MAX_NEGOTIATION_ROUNDS {
        return None;
    }
    if trade_fairness(offer, catalog).abs() < FAIR_TRADE_TOLERANCE {
        return None;
    }
    let receiving = offer.offered_value(catalog);
    let giving = offer.requested_value(catalog);
    let gap = giving - receiving;

    let mut counter = offer.clone();
    counter.counter_offers += 1;
    counter.status = OfferStatus::Pending;
    // Prefer shrinking an existing gold leg over inventing a new one, so a
    // haggled seller lowers their asking price rather than paying to sell.
    if gap > 0.0 {
        // recipient is shortchanged
        let cut = (gap / 2.0).min(counter.requested_gold);
        if cut > 0.0 {
            counter.requested_gold -= cut;
        } else {
            counter.offered_gold += gap / 2.0;
        }
    } else {
        // recipient is overpaid
        let cut = (-gap / 2.0).min(counter.offered_gold);
        if cut > 0.0 {
            counter.offered_gold -= cut;
        } else {
            counter.requested_gold += -gap / 2.0;
        }
    }
    Some(counter)
}

// ─── Negotiation Loop ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum NegotiationState {
    Ongoing,
    Agreed,
    /// Terminal; failed negotiations are never retried.
    Failed,
}

/// Run an offer to agreement or failure within the round cap. Returns the
/// terminal state and the final form of the offer.
pub fn negotiate(
    network: &TradingNetwork,
    catalog: &ItemCatalog,
    mut offer: TradeOffer,
    trust_in_proposer: f64,
    rng: &mut ChaCha8Rng,
) -> (NegotiationState, TradeOffer) {
    loop {
        match evaluate_offer(network, catalog, &offer, trust_in_proposer, rng) {
            OfferResponse::Accept => {
                offer.status = OfferStatus::Accepted;
                return (NegotiationState::Agreed, offer);
            }
            OfferResponse::Reject => {
                offer.status = OfferStatus::Rejected;
                return (NegotiationState::Failed, offer);
            }
            OfferResponse::Counter => match generate_counter_offer(&offer, catalog) {
                Some(counter) => {
                    offer.status = OfferStatus::Countered;
                    tracing::trace!(
                        offer = offer.id,
                        round = counter.counter_offers,
                        "counter offer"
                    );
                    offer = counter;
                }
                None => {
                    offer.status = OfferStatus::Rejected;
                    return (NegotiationState::Failed, offer);
                }
            },
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
