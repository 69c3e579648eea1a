//! Interest accrual: pool index growth to P2P exchange rate growth.
//!
//! ## Growth factors
//!
//! Over one interval the pool indexes grow by `current / last`. The P2P
//! growth of each side is derived from a weighted blend of both pool growths,
//! minus the protocol spread (`reserve_factor`, in basis points):
//!
//! ```text
//! blended           = ((10000 - rf) * (ws * psg + wb * pbg)) / (ws + wb) / 10000
//! supply_p2p_growth = blended - rf * psg / 10000
//! borrow_p2p_growth = blended + rf * pbg / 10000
//! ```
//!
//! ## Delta blending
//!
//! When part of a side's matched volume is parked at the pool (its delta),
//! that share grows at the pool rate and the rest at the P2P rate:
//!
//! ```text
//! share    = min(1, p2p_delta * last_pool_rate / p2p_rate / p2p_amount)
//! new_rate = rate * ((1 - share) * p2p_growth + share * pool_growth)
//! ```

use alloy_primitives::U256;
use tracing::warn;

use crate::error::{CoreError, Result};
use crate::types::math::{add, div, mul, ray_div, ray_mul, sub, MAX_BASIS_POINTS, RAY};
use crate::types::{Delta, GrowthFactors, Market, P2PRates, PoolRates, Side};

/// Compute pool and P2P growth factors since the market's last accrual.
///
/// # Errors
///
/// * [`CoreError::DivisionByZero`](crate::CoreError::DivisionByZero) if a
///   last pool rate is zero
/// * [`CoreError::InvalidParameter`] for `reserve_factor` if the supplier
///   spread swallows the whole blended growth (a zero or negative supply
///   P2P growth would zero the exchange rate)
pub fn compute_growth_factors(market: &Market, pool_rates: PoolRates) -> Result<GrowthFactors> {
    let pool_supply_growth = ray_div(pool_rates.supply_rate, market.last_pool_supply_rate)?;
    let pool_borrow_growth = ray_div(pool_rates.borrow_rate, market.last_pool_borrow_rate)?;

    let supply_weight = U256::from(market.supply_weight);
    let borrow_weight = U256::from(market.borrow_weight);
    let total_weight = add(supply_weight, borrow_weight)?;

    let bps = U256::from(MAX_BASIS_POINTS);
    let reserve_factor = U256::from(market.reserve_factor);

    let weighted_growth = add(
        mul(supply_weight, pool_supply_growth)?,
        mul(borrow_weight, pool_borrow_growth)?,
    )?;
    let blended = div(
        div(mul(sub(bps, reserve_factor)?, weighted_growth)?, total_weight)?,
        bps,
    )?;

    let supply_spread = div(mul(reserve_factor, pool_supply_growth)?, bps)?;
    if supply_spread >= blended {
        return Err(CoreError::invalid(
            "reserve_factor",
            format!("{} bps leaves no supply P2P growth", market.reserve_factor),
        ));
    }

    let supply_p2p_growth = sub(blended, supply_spread)?;
    let borrow_p2p_growth = add(blended, div(mul(reserve_factor, pool_borrow_growth)?, bps)?)?;

    Ok(GrowthFactors {
        pool_supply_growth,
        pool_borrow_growth,
        supply_p2p_growth,
        borrow_p2p_growth,
    })
}

/// Compute the market's next P2P exchange rates from the pool's current rates.
///
/// Pure: the market is not modified.
pub fn compute_p2p_exchange_rates(market: &Market, pool_rates: PoolRates) -> Result<P2PRates> {
    let growth = compute_growth_factors(market, pool_rates)?;

    Ok(P2PRates {
        supply_rate: next_p2p_rate(market, Side::Supply, &growth)?,
        borrow_rate: next_p2p_rate(market, Side::Borrow, &growth)?,
    })
}

fn next_p2p_rate(market: &Market, side: Side, growth: &GrowthFactors) -> Result<U256> {
    let current = market.p2p_rate(side);
    let delta = market.delta(side);

    if delta.is_inactive() {
        return ray_mul(current, growth.p2p(side));
    }

    let share = share_of_delta(delta, market.last_pool_rate(side), current)?;
    let blended_growth = add(
        ray_mul(sub(RAY, share)?, growth.p2p(side))?,
        ray_mul(share, growth.pool(side))?,
    )?;

    ray_mul(current, blended_growth)
}

/// Fraction (ray) of a side's matched volume that is parked at the pool.
///
/// Clamped to 1 ray; a clamp means rounding drift and is logged.
pub fn share_of_delta(delta: &Delta, pool_rate: U256, p2p_rate: U256) -> Result<U256> {
    let parked = ray_div(ray_mul(delta.p2p_delta, pool_rate)?, p2p_rate)?;
    let share = ray_div(parked, delta.p2p_amount)?;

    if share > RAY {
        warn!(
            share = %share,
            p2p_delta = %delta.p2p_delta,
            p2p_amount = %delta.p2p_amount,
            "delta share above one, clamping"
        );
        return Ok(RAY);
    }

    Ok(share)
}

// ============================================================================
// Unit Tests
// ============================================================================
