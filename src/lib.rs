// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Bazaar Economy Simulation Core ("The Bazaar")

pub mod types;
pub mod catalog;
pub mod matching;
pub mod production;
pub mod phenomena;

// Trading network: archetypes, offers, negotiation, reputation
pub mod archetype;
pub mod offers;
pub mod negotiation;
pub mod reputation;

// Flow and wealth analysis
pub mod ledger;
pub mod wealth;
pub mod bottleneck;
pub mod health;

pub mod engine;

pub use engine::{BazaarEngine, ConservationAudit, TickReport};
pub use types::*;
