//! P2P Overlay - Binary Entry Point
//!
//! Runs a short deterministic simulation against a `SimulatedPool`: one
//! market, a handful of suppliers and borrowers, a matching pass and a few
//! blocks of accrual. Set `RUST_LOG=debug` to follow every ranking refresh.

use alloy_primitives::{Address, U256};
use tracing::info;

use p2p_overlay::engine::{LendingOverlay, RecordingAccrual, SimulatedPool};
use p2p_overlay::types::math::{from_ray, to_ray, to_wad, RAY};
use p2p_overlay::types::{Book, Position, Side};
use p2p_overlay::{EngineConfig, Result};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing_subscriber::filter::LevelFilter::INFO.into()),
        )
        .init();

    let config = match EngineConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("configuration error: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = run(config) {
        eprintln!("simulation failed: {}", e);
        std::process::exit(1);
    }
}

fn run(config: EngineConfig) -> Result<()> {
    let market = Address::repeat_byte(0xDA);
    let per_block_supply = to_ray("1.0001").unwrap_or(RAY);
    let per_block_borrow = to_ray("1.0003").unwrap_or(RAY);

    let mut pool = SimulatedPool::new();
    pool.list_reserve(market, per_block_supply, per_block_borrow);

    let mut overlay = LendingOverlay::new(config, pool, RecordingAccrual::default());
    overlay.create_market(market)?;
    overlay.set_weights(market, 2, 1)?;

    let wad = |s: &str| to_wad(s).unwrap_or(U256::ZERO);
    let suppliers = [(1u8, "250"), (2, "1000"), (3, "75.5"), (4, "400")];
    let borrowers = [(5u8, "300"), (6, "120")];

    for (byte, amount) in suppliers {
        let account = Address::with_last_byte(byte);
        overlay.set_position(market, account, Position::new(U256::ZERO, wad(amount), U256::ZERO, U256::ZERO))?;
        overlay.update_supplier_ranking(market, account)?;
    }
    for (byte, amount) in borrowers {
        let account = Address::with_last_byte(byte);
        overlay.set_position(market, account, Position::new(U256::ZERO, U256::ZERO, U256::ZERO, wad(amount)))?;
        overlay.update_borrower_ranking(market, account)?;
    }

    let outcome = overlay.match_suppliers(market, wad("420"), 0)?;
    info!(
        processed = %outcome.processed,
        iterations = outcome.iterations(),
        "matched suppliers"
    );

    for block in [10u64, 20, 30] {
        overlay.pool_mut().advance_to(block)?;
        let rates = overlay.update_p2p_exchange_rates(market, block)?;
        info!(
            block,
            supply_p2p_rate = %from_ray(rates.supply_rate).unwrap_or_default(),
            borrow_p2p_rate = %from_ray(rates.borrow_rate).unwrap_or_default(),
            "accrued"
        );
    }

    for side in [Side::Supply, Side::Borrow] {
        for book in [Book::OnPool, Book::InP2P] {
            let set = overlay.ranking(market, side, book)?;
            println!(
                "{:>6} {:>7}  ranked={} buffered={} root={}",
                side.as_str(),
                book.as_str(),
                set.ranked_len(),
                set.buffered_len(),
                set.state_root_hex()
            );
        }
    }
    println!("stake notifications: {}", overlay.rewards().updates.len());

    Ok(())
}
