//! End-to-end tests of the overlay entry points against a simulated pool.

use std::num::NonZeroUsize;

use alloy_primitives::{Address, U256};

use p2p_overlay::engine::{LendingOverlay, RecordingAccrual, SimulatedPool, StakedAsset};
use p2p_overlay::types::math::{average, ray_pow, to_ray, RAY};
use p2p_overlay::types::{Book, P2PRates, Position, Side};
use p2p_overlay::{CoreError, EngineConfig};

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

type Overlay = LendingOverlay<SimulatedPool, RecordingAccrual>;

fn ray(s: &str) -> U256 {
    to_ray(s).unwrap()
}

fn units(v: u64) -> U256 {
    U256::from(v)
}

fn usdc() -> Address {
    Address::repeat_byte(0xA0)
}

fn dai() -> Address {
    Address::repeat_byte(0xB0)
}

fn user(byte: u8) -> Address {
    Address::with_last_byte(byte)
}

fn supplier(on_pool: u64) -> Position {
    Position::new(U256::ZERO, units(on_pool), U256::ZERO, U256::ZERO)
}

fn borrower(on_pool: u64) -> Position {
    Position::new(U256::ZERO, U256::ZERO, U256::ZERO, units(on_pool))
}

fn setup(max_sorted_users: usize, max_matching_iterations: usize) -> Overlay {
    let mut pool = SimulatedPool::new();
    pool.list_reserve(usdc(), ray("1.001"), ray("1.002"));
    pool.list_reserve(dai(), RAY, RAY);

    let config = EngineConfig {
        max_sorted_users: NonZeroUsize::new(max_sorted_users).unwrap(),
        max_matching_iterations,
        default_reserve_factor: 0,
    };
    let mut overlay = LendingOverlay::new(config, pool, RecordingAccrual::default());
    overlay.create_market(usdc()).unwrap();
    overlay.create_market(dai()).unwrap();
    overlay
}

fn deposit(overlay: &mut Overlay, market: Address, account: Address, position: Position) {
    overlay.set_position(market, account, position).unwrap();
    overlay.update_supplier_ranking(market, account).unwrap();
    overlay.update_borrower_ranking(market, account).unwrap();
}

fn ranked(overlay: &Overlay, market: Address, side: Side, book: Book) -> Vec<(Address, U256)> {
    overlay
        .ranking(market, side, book)
        .unwrap()
        .iter_ranked()
        .collect()
}

// ============================================================================
// RANKING THROUGH THE OVERLAY
// ============================================================================

#[test]
fn test_eviction_and_promotion_through_overlay() {
    let mut overlay = setup(3, 16);
    let (a, b, c, d) = (user(0xA), user(0xB), user(0xC), user(0xD));

    deposit(&mut overlay, usdc(), a, supplier(10));
    deposit(&mut overlay, usdc(), b, supplier(20));
    deposit(&mut overlay, usdc(), c, supplier(30));
    deposit(&mut overlay, usdc(), d, supplier(25));

    assert_eq!(
        ranked(&overlay, usdc(), Side::Supply, Book::OnPool),
        vec![(c, units(30)), (d, units(25)), (b, units(20))]
    );
    assert!(overlay.ranking(usdc(), Side::Supply, Book::OnPool).unwrap().is_buffered(a));

    deposit(&mut overlay, usdc(), d, Position::default());

    assert_eq!(
        ranked(&overlay, usdc(), Side::Supply, Book::OnPool),
        vec![(c, units(30)), (b, units(20)), (a, units(10))]
    );
}

#[test]
fn test_markets_are_isolated() {
    let mut overlay = setup(3, 16);

    deposit(&mut overlay, usdc(), user(1), supplier(100));

    assert!(overlay.ranking(dai(), Side::Supply, Book::OnPool).unwrap().is_empty());
    assert_eq!(
        overlay
            .ranking(usdc(), Side::Supply, Book::OnPool)
            .unwrap()
            .value_of(user(1)),
        units(100)
    );
}

#[test]
fn test_stake_notification_uses_prior_amount() {
    let mut overlay = setup(3, 16);
    overlay.pool_mut().set_total_staked(usdc(), Side::Borrow, units(9_999));

    deposit(&mut overlay, usdc(), user(1), borrower(40));
    deposit(&mut overlay, usdc(), user(1), borrower(15));
    deposit(&mut overlay, usdc(), user(1), borrower(15));

    // Supply side never changed, so only the two borrow changes notify
    let updates = &overlay.rewards().updates;
    assert_eq!(updates.len(), 2);
    assert_eq!(
        updates[0].asset,
        StakedAsset {
            market: usdc(),
            side: Side::Borrow
        }
    );
    assert_eq!(updates[0].amount_before, U256::ZERO);
    assert_eq!(updates[1].amount_before, units(40));
    assert_eq!(updates[1].total_staked, units(9_999));
}

#[test]
fn test_ranking_unknown_market() {
    let mut overlay = setup(3, 16);
    let unknown = Address::repeat_byte(0xEE);

    assert_eq!(
        overlay.update_supplier_ranking(unknown, user(1)),
        Err(CoreError::MarketNotCreated(unknown))
    );
    assert_eq!(
        overlay.ranking(unknown, Side::Supply, Book::OnPool).err(),
        Some(CoreError::MarketNotCreated(unknown))
    );
}

// ============================================================================
// MATCHING PASSES
// ============================================================================

#[test]
fn test_match_then_unmatch_suppliers() {
    let mut overlay = setup(5, 16);

    deposit(&mut overlay, dai(), user(1), supplier(300));
    deposit(&mut overlay, dai(), user(2), supplier(100));

    let outcome = overlay.match_suppliers(dai(), units(350), 1).unwrap();
    assert!(outcome.is_complete());
    assert_eq!(outcome.accounts, vec![user(1), user(2)]);

    let market = overlay.market(dai()).unwrap();
    assert_eq!(market.supply_delta.p2p_amount, units(350));

    assert_eq!(
        ranked(&overlay, dai(), Side::Supply, Book::InP2P),
        vec![(user(1), units(300)), (user(2), units(50))]
    );
    assert_eq!(
        ranked(&overlay, dai(), Side::Supply, Book::OnPool),
        vec![(user(2), units(50))]
    );

    let outcome = overlay.unmatch_suppliers(dai(), units(320), 1).unwrap();
    assert_eq!(outcome.processed, units(320));
    assert_eq!(overlay.positions().read(dai(), user(1)), Position::new(U256::ZERO, units(300), U256::ZERO, U256::ZERO));
    assert_eq!(overlay.positions().read(dai(), user(2)), Position::new(units(30), units(70), U256::ZERO, U256::ZERO));
    assert_eq!(overlay.market(dai()).unwrap().supply_delta.p2p_amount, units(30));
}

#[test]
fn test_unmatch_beyond_recorded_p2p_amount_clamps() {
    let mut overlay = setup(5, 16);

    // Written straight into P2P: the market never recorded this volume
    let in_p2p = Position::new(units(50), U256::ZERO, U256::ZERO, U256::ZERO);
    deposit(&mut overlay, dai(), user(1), in_p2p);
    assert!(overlay.market(dai()).unwrap().supply_delta.p2p_amount.is_zero());

    let outcome = overlay.unmatch_suppliers(dai(), units(50), 1).unwrap();

    assert_eq!(outcome.processed, units(50));
    assert_eq!(overlay.positions().read(dai(), user(1)), supplier(50));
    assert!(overlay.market(dai()).unwrap().supply_delta.p2p_amount.is_zero());
}

#[test]
fn test_reserve_factor_limit() {
    let mut overlay = setup(3, 16);

    for rejected in [5000, 6000] {
        assert!(matches!(
            overlay.set_reserve_factor(usdc(), rejected),
            Err(CoreError::InvalidParameter { name: "reserve_factor", .. })
        ));
    }
    assert_eq!(overlay.market(usdc()).unwrap().reserve_factor, 0);

    // The market still accrues to a positive rate
    overlay.pool_mut().advance_to(1).unwrap();
    let rates = overlay.update_p2p_exchange_rates(usdc(), 1).unwrap();
    assert_eq!(rates.supply_rate, ray("1.0015"));
}

#[test]
fn test_match_borrowers_bounded_by_iterations() {
    let mut overlay = setup(10, 2);

    for byte in 1..=4u8 {
        deposit(&mut overlay, dai(), user(byte), borrower(10 * byte as u64));
    }

    let outcome = overlay.match_borrowers(dai(), units(1_000), 1).unwrap();

    assert_eq!(outcome.iterations(), 2);
    assert_eq!(outcome.accounts, vec![user(4), user(3)]);
    assert_eq!(outcome.processed, units(70));
    assert_eq!(outcome.remaining(), units(930));
    assert_eq!(overlay.market(dai()).unwrap().borrow_delta.p2p_amount, units(70));
}

#[test]
fn test_match_on_empty_book_is_noop() {
    let mut overlay = setup(3, 16);

    let outcome = overlay.match_suppliers(dai(), units(10), 1).unwrap();

    assert!(outcome.is_empty());
    assert_eq!(outcome.remaining(), units(10));
}

// ============================================================================
// ACCRUAL
// ============================================================================

#[test]
fn test_rates_follow_pool_growth() {
    let mut overlay = setup(3, 16);

    overlay.pool_mut().advance_to(1).unwrap();
    let rates = overlay.update_p2p_exchange_rates(usdc(), 1).unwrap();

    // (1.001 + 1.002) / 2
    assert_eq!(rates.supply_rate, ray("1.0015"));
    assert_eq!(rates.borrow_rate, ray("1.0015"));

    let market = overlay.market(usdc()).unwrap();
    assert_eq!(market.last_pool_supply_rate, ray("1.001"));
    assert_eq!(market.last_pool_borrow_rate, ray("1.002"));
    assert_eq!(market.last_update_block, Some(1));
}

#[test]
fn test_rates_never_decrease_over_blocks() {
    let mut overlay = setup(3, 16);
    overlay.increase_delta(usdc(), Side::Borrow, units(1_000), 0).unwrap();

    let mut previous = overlay.market(usdc()).unwrap().p2p_rates();
    for block in 1..=20u64 {
        overlay.pool_mut().advance_to(block).unwrap();
        let rates = overlay.update_p2p_exchange_rates(usdc(), block).unwrap();

        assert!(rates.supply_rate >= previous.supply_rate);
        assert!(rates.borrow_rate >= previous.borrow_rate);
        previous = rates;
    }
}

#[test]
fn test_delta_share_blends_pool_growth() {
    let mut overlay = setup(5, 16);

    deposit(&mut overlay, usdc(), user(1), borrower(1_000_000));
    overlay.match_borrowers(usdc(), units(1_000_000), 0).unwrap();

    // Park the whole matched borrow volume at the pool
    overlay.increase_delta(usdc(), Side::Borrow, units(1_000_000), 0).unwrap();

    overlay.pool_mut().advance_to(1).unwrap();
    let rates = overlay.update_p2p_exchange_rates(usdc(), 1).unwrap();

    // Borrow side grows like the pool, supply side like the P2P blend
    assert_eq!(rates.borrow_rate, ray("1.002"));
    assert_eq!(rates.supply_rate, ray("1.0015"));
}

#[test]
fn test_view_matches_persisted_update() {
    let mut overlay = setup(3, 16);
    overlay.pool_mut().advance_to(7).unwrap();

    let view = overlay.compute_p2p_exchange_rates(usdc()).unwrap();
    let persisted = overlay.update_p2p_exchange_rates(usdc(), 7).unwrap();

    assert_eq!(view, persisted);

    // Flat weights, no spread: both sides grow by the mean of the compounded pool indexes
    let expected = average(
        ray_pow(ray("1.001"), 7).unwrap(),
        ray_pow(ray("1.002"), 7).unwrap(),
    );
    assert_eq!(persisted, P2PRates::new(expected, expected));
    assert_eq!(overlay.market(usdc()).unwrap().p2p_rates(), persisted);
}

#[test]
fn test_market_parameters() {
    let mut overlay = setup(3, 16);

    overlay.set_weights(usdc(), 1, 3).unwrap();
    overlay.set_reserve_factor(usdc(), 500).unwrap();
    overlay.set_threshold(usdc(), units(10)).unwrap();
    overlay.set_cap(usdc(), units(1_000_000)).unwrap();

    let market = overlay.market(usdc()).unwrap();
    assert_eq!((market.supply_weight, market.borrow_weight), (1, 3));
    assert_eq!(market.reserve_factor, 500);
    assert_eq!(market.threshold, units(10));
    assert_eq!(market.cap, units(1_000_000));

    assert!(matches!(
        overlay.set_weights(usdc(), 1, 0),
        Err(CoreError::InvalidParameter { .. })
    ));
}
