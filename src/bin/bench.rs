// Bazaar Benchmark Runner — seeded scenario validation suite
// Writes results to benchmark-results/bench-{timestamp}.json

use std::time::{Instant, SystemTime, UNIX_EPOCH};

use bazaar_engine::archetype::PersonalityTraits;
use bazaar_engine::catalog::ItemDef;
use bazaar_engine::engine::BazaarEngine;
use bazaar_engine::types::{FlowType, ItemCategory, OrderSide, Rarity};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::Serialize;

// ─── Scenario Configuration ──────────────────────────────────────────────────

struct Scenario {
    name: &'static str,
    label: &'static str,
    category: &'static str,
    agents: u32,
    ticks: u64,
    seed: u64,
    starting_gold: f64,
    starting_stock: u32,
    /// Chance an agent acts on the market each tick.
    activity: f64,
    /// Gold faucet per agent per hour (job rewards), drained by a matching tax.
    faucet: f64,
    traits: fn(u32) -> PersonalityTraits,
    criteria: PassCriteria,
}

struct PassCriteria {
    max_conservation_error: f64,
    min_trades: Option<u64>,
    max_gini: Option<f64>,
    min_health: Option<f64>,
    require_price_bounds: bool,
}

impl Default for PassCriteria {
    fn default() -> Self {
        Self {
            max_conservation_error: 1e-6,
            min_trades: None,
            max_gini: None,
            min_health: None,
            require_price_bounds: true,
        }
    }
}

// ─── Trait Mixes ─────────────────────────────────────────────────────────────

fn mixed_traits(i: u32) -> PersonalityTraits {
    match i % 4 {
        0 => PersonalityTraits {
            risk_tolerance: 0.4,
            greed: 0.4,
            patience: 0.8,
            sociability: 0.6,
            aggression: 0.3,
        },
        1 => PersonalityTraits {
            risk_tolerance: 0.2,
            greed: 0.9,
            patience: 0.9,
            sociability: 0.2,
            aggression: 0.2,
        },
        2 => PersonalityTraits {
            risk_tolerance: 0.9,
            greed: 0.5,
            patience: 0.2,
            sociability: 0.5,
            aggression: 0.7,
        },
        _ => PersonalityTraits {
            risk_tolerance: 0.5,
            greed: 0.2,
            patience: 0.4,
            sociability: 0.8,
            aggression: 0.4,
        },
    }
}

fn hoarder_traits(_: u32) -> PersonalityTraits {
    PersonalityTraits {
        risk_tolerance: 0.2,
        greed: 0.9,
        patience: 0.9,
        sociability: 0.2,
        aggression: 0.2,
    }
}

fn speculator_traits(_: u32) -> PersonalityTraits {
    PersonalityTraits {
        risk_tolerance: 0.9,
        greed: 0.6,
        patience: 0.2,
        sociability: 0.5,
        aggression: 0.8,
    }
}

// ─── Catalog ─────────────────────────────────────────────────────────────────

fn catalog_defs() -> Vec<ItemDef> {
    let mut defs = Vec::new();
    let specs: [(&str, ItemCategory, f64, Rarity, f64); 6] = [
        ("iron_sword", ItemCategory::Weapon, 50.0, Rarity::Common, 0.1),
        ("leather_armor", ItemCategory::Armor, 40.0, Rarity::Common, 0.1),
        ("health_potion", ItemCategory::Consumable, 8.0, Rarity::Common, 0.2),
        ("iron_ore", ItemCategory::Material, 10.0, Rarity::Common, 0.15),
        ("smithing_hammer", ItemCategory::Tool, 25.0, Rarity::Uncommon, 0.1),
        ("ruby_ring", ItemCategory::Luxury, 200.0, Rarity::Rare, 0.3),
    ];
    for (id, category, base_cost, rarity, volatility) in specs {
        defs.push(ItemDef {
            id: id.to_string(),
            category,
            base_cost,
            supply: 100.0,
            demand: 100.0,
            production_rate: 5.0,
            consumption_rate: 5.0,
            rarity,
            volatility,
        });
    }
    defs
}

// ─── Scenario Definitions ────────────────────────────────────────────────────

fn scenarios() -> Vec<Scenario> {
    vec![
        // ─── Market Conditions ──────────────────────────────────────────
        Scenario { name: "CALM_MARKET", label: "Calm Market", category: "market",
            agents: 24, ticks: 600, seed: 1001, starting_gold: 500.0, starting_stock: 10,
            activity: 0.2, faucet: 20.0, traits: mixed_traits,
            criteria: PassCriteria { min_trades: Some(100), min_health: Some(40.0), ..Default::default() } },
        Scenario { name: "BUSY_BAZAAR", label: "Busy Bazaar", category: "market",
            agents: 50, ticks: 600, seed: 1002, starting_gold: 300.0, starting_stock: 8,
            activity: 0.6, faucet: 30.0, traits: mixed_traits,
            criteria: PassCriteria { min_trades: Some(500), ..Default::default() } },
        Scenario { name: "POOR_ECONOMY", label: "Poor Economy", category: "market",
            agents: 24, ticks: 400, seed: 1003, starting_gold: 30.0, starting_stock: 3,
            activity: 0.3, faucet: 5.0, traits: mixed_traits,
            criteria: PassCriteria::default() },

        // ─── Behavior Mixes ─────────────────────────────────────────────
        Scenario { name: "HOARDER_ECONOMY", label: "Hoarder Economy", category: "behavior",
            agents: 24, ticks: 600, seed: 2001, starting_gold: 500.0, starting_stock: 10,
            activity: 0.2, faucet: 20.0, traits: hoarder_traits,
            criteria: PassCriteria { max_gini: Some(0.9), ..Default::default() } },
        Scenario { name: "SPECULATOR_FRENZY", label: "Speculator Frenzy", category: "behavior",
            agents: 24, ticks: 600, seed: 2002, starting_gold: 800.0, starting_stock: 10,
            activity: 0.7, faucet: 20.0, traits: speculator_traits,
            criteria: PassCriteria { min_trades: Some(200), ..Default::default() } },

        // ─── Stress ─────────────────────────────────────────────────────
        Scenario { name: "SCALE_200", label: "Scale 200", category: "stress",
            agents: 200, ticks: 300, seed: 3001, starting_gold: 400.0, starting_stock: 6,
            activity: 0.4, faucet: 20.0, traits: mixed_traits,
            criteria: PassCriteria { min_trades: Some(500), ..Default::default() } },
        Scenario { name: "SCALE_500", label: "Scale 500", category: "stress",
            agents: 500, ticks: 200, seed: 3002, starting_gold: 400.0, starting_stock: 6,
            activity: 0.4, faucet: 20.0, traits: mixed_traits,
            criteria: PassCriteria::default() },
        Scenario { name: "LONG_RUN", label: "Long Run 10K Ticks", category: "stress",
            agents: 24, ticks: 10_000, seed: 3003, starting_gold: 500.0, starting_stock: 10,
            activity: 0.2, faucet: 20.0, traits: mixed_traits,
            criteria: PassCriteria::default() },

        // ─── Determinism ────────────────────────────────────────────────
        Scenario { name: "REPLAY_A", label: "Replay Twin A", category: "determinism",
            agents: 24, ticks: 400, seed: 4001, starting_gold: 500.0, starting_stock: 10,
            activity: 0.3, faucet: 20.0, traits: mixed_traits,
            criteria: PassCriteria::default() },
        Scenario { name: "REPLAY_B", label: "Replay Twin B", category: "determinism",
            agents: 24, ticks: 400, seed: 4001, starting_gold: 500.0, starting_stock: 10,
            activity: 0.3, faucet: 20.0, traits: mixed_traits,
            criteria: PassCriteria::default() },
    ]
}

// ─── Result Types ────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct BenchReport {
    timestamp: String,
    version: &'static str,
    summary: Summary,
    benchmarks: Vec<BenchResult>,
}

#[derive(Serialize)]
struct Summary {
    total: usize,
    passed: usize,
    failed: usize,
}

#[derive(Serialize)]
struct BenchResult {
    scenario: String,
    name: String,
    category: String,
    pass: bool,
    trades: u64,
    shocks: u64,
    manipulation_flags: u64,
    conservation_error: f64,
    conservation_holds: bool,
    price_bounds_held: bool,
    gini: f64,
    health_score: f64,
    health_grade: String,
    bottlenecks: usize,
    total_gold: f64,
    ticks: u64,
    elapsed_ms: u128,
    ticks_per_sec: f64,
    /// Fingerprint of the trade stream, for replay comparison.
    trade_digest: u64,
}

// ─── Runner ──────────────────────────────────────────────────────────────────

fn run_scenario(scenario: &Scenario) -> BenchResult {
    let start = Instant::now();
    let mut engine = BazaarEngine::new(scenario.seed, catalog_defs()).expect("valid catalog");
    // driver-side randomness is seeded separately so the engine stream
    // only sees its own draws
    let mut driver_rng = ChaCha8Rng::seed_from_u64(scenario.seed ^ 0xB1A5);

    let agent_ids: Vec<String> = (0..scenario.agents).map(|i| format!("bot_{:04}", i)).collect();
    let item_ids: Vec<String> = catalog_defs().iter().map(|d| d.id.clone()).collect();
    for (i, id) in agent_ids.iter().enumerate() {
        engine.register_agent(id, &(scenario.traits)(i as u32), scenario.starting_gold);
        for item_id in &item_ids {
            engine.record_external_flow(
                None,
                Some(id),
                FlowType::CombatLoot,
                0.0,
                Some(bazaar_engine::types::ItemQuantity {
                    item_id: item_id.clone(),
                    quantity: scenario.starting_stock,
                }),
            );
        }
    }

    let mut trades: u64 = 0;
    let mut shocks: u64 = 0;
    let mut flags: u64 = 0;
    let mut price_bounds_held = true;
    let mut trade_digest: u64 = 0;

    for tick in 0..scenario.ticks {
        // hourly faucet and a smaller tax drain keep gold circulating
        if tick > 0 && tick % 60 == 0 {
            for id in &agent_ids {
                engine.record_external_flow(None, Some(id), FlowType::JobReward, scenario.faucet, None);
                let tax = scenario.faucet * 0.25;
                engine.record_external_flow(Some(id), None, FlowType::Tax, tax, None);
            }
        }

        for id in &agent_ids {
            if driver_rng.gen::<f64>() >= scenario.activity {
                continue;
            }
            let item = &item_ids[driver_rng.gen_range(0..item_ids.len())];
            let price = engine.catalog().price_of(item).unwrap_or(1.0);
            let qty = driver_rng.gen_range(1..=3u32);
            if driver_rng.gen::<bool>() {
                engine.place_order(id, item, OrderSide::Buy, qty, price * 1.05, Some(30));
            } else {
                engine.place_order(id, item, OrderSide::Sell, qty, price * 0.95, Some(30));
            }
        }

        let report = engine.advance_tick();
        trades += report.trades.len() as u64;
        shocks += report.shocks.len() as u64;
        flags += report.manipulation_flags.len() as u64;
        for trade in &report.trades {
            trade_digest = trade_digest
                .wrapping_mul(31)
                .wrapping_add(trade.quantity as u64)
                .wrapping_add((trade.price * 100.0) as u64);
        }

        for item in engine.catalog().iter() {
            if item.current_price < item.price_floor() - 1e-9 {
                price_bounds_held = false;
            }
            if let Some(ceiling) = item.price_ceiling() {
                if item.current_price > ceiling + 1e-9 {
                    price_bounds_held = false;
                }
            }
        }
    }

    let elapsed = start.elapsed();
    let elapsed_secs = elapsed.as_secs_f64().max(0.001);

    let dist = engine.wealth_distribution();
    let health = engine.health();
    let bottlenecks = engine.bottlenecks().len();
    let conservation_error = engine.audit().cumulative_error;
    let conservation_holds = !engine.audit().tripped;

    let criteria = &scenario.criteria;
    let mut pass = conservation_error <= criteria.max_conservation_error && conservation_holds;
    if criteria.require_price_bounds && !price_bounds_held {
        pass = false;
    }
    if let Some(min_trades) = criteria.min_trades {
        if trades < min_trades {
            pass = false;
        }
    }
    if let Some(max_gini) = criteria.max_gini {
        if dist.gini > max_gini {
            pass = false;
        }
    }
    if let Some(min_health) = criteria.min_health {
        if health.score < min_health {
            pass = false;
        }
    }

    BenchResult {
        scenario: scenario.label.to_string(),
        name: scenario.name.to_string(),
        category: scenario.category.to_string(),
        pass,
        trades,
        shocks,
        manipulation_flags: flags,
        conservation_error,
        conservation_holds,
        price_bounds_held,
        gini: dist.gini,
        health_score: health.score,
        health_grade: health.grade.label().to_string(),
        bottlenecks,
        total_gold: engine.total_gold(),
        ticks: scenario.ticks,
        elapsed_ms: elapsed.as_millis(),
        ticks_per_sec: scenario.ticks as f64 / elapsed_secs,
        trade_digest,
    }
}

// ─── Main ────────────────────────────────────────────────────────────────────

fn main() {
    let filter: Option<String> = std::env::args().nth(1);
    let all_scenarios = scenarios();

    let to_run: Vec<&Scenario> = match &filter {
        Some(f) => {
            let f_lower = f.to_lowercase();
            all_scenarios.iter()
                .filter(|s| s.name.to_lowercase().contains(&f_lower)
                          || s.label.to_lowercase().contains(&f_lower))
                .collect()
        }
        None => all_scenarios.iter().collect(),
    };

    if to_run.is_empty() {
        eprintln!("No scenarios match filter: {:?}", filter);
        std::process::exit(1);
    }

    println!("\n  Bazaar Benchmark Runner v0.2.0");
    println!("  Running {} scenario(s)...\n", to_run.len());
    println!("  {:<26} {:>6} {:>8} {:>10} {:>6} {:>7} {:>6} {:>8}",
        "Scenario", "Pass", "Trades", "Conserv", "Gini", "Health", "Grade", "Time");
    println!("  {}", "-".repeat(84));

    let mut results = Vec::new();
    for scenario in &to_run {
        let result = run_scenario(scenario);
        let status = if result.pass { " PASS" } else { " FAIL" };
        println!("  {:<26} {:>6} {:>8} {:>10.2e} {:>6.3} {:>7.1} {:>6} {:>5}ms",
            result.scenario, status, result.trades, result.conservation_error,
            result.gini, result.health_score, result.health_grade, result.elapsed_ms);
        results.push(result);
    }

    // replay twins share a seed and must produce identical trade streams
    let replay: Vec<&BenchResult> = results.iter().filter(|r| r.category == "determinism").collect();
    if replay.len() == 2 && replay[0].trade_digest != replay[1].trade_digest {
        println!("\n  REPLAY MISMATCH: {:x} vs {:x}", replay[0].trade_digest, replay[1].trade_digest);
        for result in &mut results {
            if result.category == "determinism" {
                result.pass = false;
            }
        }
    }

    let passed = results.iter().filter(|r| r.pass).count();
    let failed = results.len() - passed;
    println!("  {}", "-".repeat(84));
    println!("  Total: {}  Passed: {}  Failed: {}\n", results.len(), passed, failed);

    let ts = SystemTime::now().duration_since(UNIX_EPOCH).expect("clock").as_millis();
    let timestamp = format!("{}", ts);
    let report = BenchReport {
        timestamp: timestamp.clone(),
        version: "0.2.0",
        summary: Summary { total: results.len(), passed, failed },
        benchmarks: results,
    };

    let dir = std::path::Path::new("benchmark-results");
    if !dir.exists() {
        std::fs::create_dir_all(dir).expect("Failed to create benchmark-results/");
    }
    let path = dir.join(format!("bench-{}.json", timestamp));
    let json = serde_json::to_string_pretty(&report).expect("Failed to serialize");
    std::fs::write(&path, &json).expect("Failed to write benchmark file");
    println!("  Results saved to: {}\n", path.display());

    if failed > 0 {
        std::process::exit(1);
    }
}
