// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Bazaar Economy Simulation Core - Economic Archetypes

use serde::{Deserialize, Serialize};

// ─── Personality Input ───────────────────────────────────────────────────────

/// Trait vector supplied by the external personality provider. All fields
/// are expected in [0, 1]; values outside are clamped at derivation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PersonalityTraits {
    pub risk_tolerance: f64,
    pub greed: f64,
    pub patience: f64,
    pub sociability: f64,
    pub aggression: f64,
}

// ─── Archetype Kind ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ArchetypeKind {
    /// Buys low, sells at a margin, trades often.
    Merchant = 0,
    /// Accumulates and rarely parts with stock.
    Hoarder = 1,
    /// Chases rising prices, tolerates losses.
    Speculator = 2,
    /// Trades frequently near fair value to provide liquidity.
    MarketMaker = 3,
}

impl ArchetypeKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Merchant => "merchant",
            Self::Hoarder => "hoarder",
            Self::Speculator => "speculator",
            Self::MarketMaker => "market_maker",
        }
    }
}

// ─── Economic Archetype ──────────────────────────────────────────────────────

/// Per-agent behavioral profile, derived once from personality traits and
/// re-derived only if the personality changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EconomicArchetype {
    pub kind: ArchetypeKind,
    pub risk_tolerance: f64,
    /// Reluctance to part with inventory, 0..1.
    pub holding_propensity: f64,
    /// Markup applied when selling above market, as a fraction.
    pub profit_margin: f64,
    /// Appetite for initiating trades per unit time, 0..1.
    pub trading_frequency: f64,
    /// Weight placed on price deviation when evaluating offers, 0..1.
    pub price_sensitivity: f64,
}

// Derivation thresholds.
const HIGH_GREED: f64 = 0.7;
const HIGH_PATIENCE: f64 = 0.6;
const HIGH_RISK: f64 = 0.7;
const MODERATE_RISK_LO: f64 = 0.3;

/// Fixed mapping from personality to archetype. Checked in specificity
/// order so every variant is reachable:
/// greed+patience -> hoarder, raw risk appetite -> speculator,
/// patience with moderate risk -> merchant, everyone else -> market maker.
pub fn derive_archetype(traits: &PersonalityTraits) -> EconomicArchetype {
    let risk = traits.risk_tolerance.clamp(0.0, 1.0);
    let greed = traits.greed.clamp(0.0, 1.0);
    let patience = traits.patience.clamp(0.0, 1.0);
    let sociability = traits.sociability.clamp(0.0, 1.0);
    let aggression = traits.aggression.clamp(0.0, 1.0);

    let kind = if greed >= HIGH_GREED && patience >= HIGH_PATIENCE {
        ArchetypeKind::Hoarder
    } else if risk >= HIGH_RISK {
        ArchetypeKind::Speculator
    } else if patience >= HIGH_PATIENCE && risk >= MODERATE_RISK_LO {
        ArchetypeKind::Merchant
    } else {
        ArchetypeKind::MarketMaker
    };

    EconomicArchetype {
        kind,
        risk_tolerance: risk,
        holding_propensity: (patience * 0.6 + greed * 0.4).clamp(0.0, 1.0),
        profit_margin: 0.1 + greed * 0.3,
        trading_frequency: (0.2 + sociability * 0.4 + aggression * 0.2 + (1.0 - patience) * 0.2)
            .clamp(0.0, 1.0),
        price_sensitivity: (0.3 + (1.0 - risk) * 0.5).clamp(0.0, 1.0),
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn traits(risk: f64, greed: f64, patience: f64) -> PersonalityTraits {
        PersonalityTraits {
            risk_tolerance: risk,
            greed,
            patience,
            sociability: 0.5,
            aggression: 0.5,
        }
    }

    #[test]
    fn greedy_patient_becomes_hoarder() {
        let a = derive_archetype(&traits(0.5, 0.9, 0.8));
        assert_eq!(a.kind, ArchetypeKind::Hoarder);
        assert!(a.holding_propensity > 0.7);
    }

    #[test]
    fn risk_taker_becomes_speculator() {
        let a = derive_archetype(&traits(0.9, 0.3, 0.4));
        assert_eq!(a.kind, ArchetypeKind::Speculator);
    }

    #[test]
    fn patient_moderate_risk_becomes_merchant() {
        let a = derive_archetype(&traits(0.5, 0.4, 0.8));
        assert_eq!(a.kind, ArchetypeKind::Merchant);
    }

    #[test]
    fn default_is_market_maker() {
        let a = derive_archetype(&traits(0.2, 0.2, 0.2));
        assert_eq!(a.kind, ArchetypeKind::MarketMaker);
    }

    #[test]
    fn profit_margin_tracks_greed() {
        let modest = derive_archetype(&traits(0.5, 0.0, 0.5));
        let rapacious = derive_archetype(&traits(0.5, 1.0, 0.5));
        assert!((modest.profit_margin - 0.1).abs() < 1e-9);
        assert!((rapacious.profit_margin - 0.4).abs() < 1e-9);
    }

    #[test]
    fn out_of_range_traits_are_clamped() {
        let a = derive_archetype(&PersonalityTraits {
            risk_tolerance: 3.0,
            greed: -1.0,
            patience: 2.0,
            sociability: 9.0,
            aggression: -5.0,
        });
        assert!(a.risk_tolerance <= 1.0);
        assert!(a.holding_propensity <= 1.0);
        assert!(a.trading_frequency <= 1.0);
        assert!((0.0..=1.0).contains(&a.price_sensitivity));
    }
}
