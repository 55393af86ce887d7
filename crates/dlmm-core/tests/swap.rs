//! Swap walk through the engine facade

mod common;

use common::*;
use dlmm_core::state::{derive_bin_array_key, RecordKey};
use dlmm_core::{Address, DlmmError, EngineConfig, ErrorKind, SwapParams};

/// Y liquidity at bins 0, -1 and -2 (3333, 3333, 3334)
fn y_ladder() -> TestContext {
    let mut ctx = TestContext::new();
    ctx.add(
        alice(),
        0,
        10_000,
        vec![dist(0, 0, 3_333), dist(-1, 0, 3_333), dist(-2, 0, 3_334)],
    )
    .unwrap();
    ctx
}

fn params(trader: Address, amount_in: u64, swap_for_y: bool, max_bins: Option<u32>) -> SwapParams {
    SwapParams {
        trader,
        amount_in,
        min_amount_out: 0,
        swap_for_y,
        max_bins,
    }
}

#[test]
fn test_swap_x_for_y_in_active_bin() {
    let mut ctx = TestContext::new();
    ctx.add(alice(), 1_000_000, 1_000_000, vec![dist(0, 5_000, 5_000)])
        .unwrap();
    let before = ctx.bin(0);

    let result = ctx.swap(bob(), 100_000, 65_000, true).unwrap();

    let after = ctx.bin(0);
    assert!(after.reserve_x > before.reserve_x);
    assert!(after.reserve_y < before.reserve_y);
    assert_eq!(result.amount_in, 100_000);
    assert_eq!(result.amount_out, 99_700);
    assert_eq!(result.fee, 300);
    assert_eq!(result.end_bin_id, 0);
    assert_eq!(ctx.pool_state().active_bin_id, 0);
    assert_eq!(ctx.balance_y(&bob()), test_constants::STARTING_BALANCE + 99_700);
    ctx.assert_conservation(-1..=1);
    ctx.assert_share_accounting(-1..=1);
}

#[test]
fn test_swap_walks_down_and_moves_active_bin() {
    let mut ctx = y_ladder();

    let result = ctx.swap(bob(), 8_000, 0, true).unwrap();

    assert_eq!(result.start_bin_id, 0);
    assert_eq!(result.end_bin_id, -2);
    assert_eq!(result.bins_visited, 3);
    assert_eq!(result.amount_in, 8_000);
    assert_eq!(ctx.bin(0).reserve_y, 0);
    assert_eq!(ctx.bin(-1).reserve_y, 0);
    assert!(ctx.bin(-2).reserve_y > 0);
    assert!(ctx.bin(-2).reserve_y < 3_334);
    assert_eq!(ctx.pool_state().active_bin_id, -2);
    ctx.assert_conservation(-1..=1);
}

#[test]
fn test_exact_drain_leaves_active_on_drained_bin() {
    let mut ctx = y_ladder();

    // Gross input that buys all 3333 Y of bin 0 at 30 bps
    let result = ctx.swap(bob(), 3_344, 0, true).unwrap();
    assert_eq!(result.amount_out, 3_333);
    assert_eq!(result.bins_visited, 1);
    assert_eq!(ctx.bin(0).reserve_y, 0);
    assert_eq!(ctx.pool_state().active_bin_id, 0);

    // The next swap passes over the drained bin
    let next = ctx.swap(bob(), 100, 0, true).unwrap();
    assert_eq!(next.start_bin_id, 0);
    assert_eq!(next.end_bin_id, -1);
    assert_eq!(next.bins_visited, 2);
    ctx.assert_conservation(-1..=1);
}

#[test]
fn test_swap_y_for_x_walks_up() {
    let mut ctx = TestContext::new();
    ctx.add(alice(), 5_000, 0, vec![dist(2, 10_000, 0)]).unwrap();

    let result = ctx.swap(bob(), 1_000, 0, false).unwrap();

    assert_eq!(result.end_bin_id, 2);
    assert_eq!(result.bins_visited, 3);
    assert_eq!(ctx.pool_state().active_bin_id, 2);
    assert!(ctx.bin(2).reserve_y >= 1_000);
    // Buying X above price 1 yields less X than Y paid
    assert!(result.amount_out < 1_000);
    ctx.assert_conservation(-1..=1);
}

#[test]
fn test_slippage_rejects_without_mutation() {
    let mut ctx = TestContext::new();
    ctx.add(alice(), 1_000_000, 1_000_000, vec![dist(0, 5_000, 5_000)])
        .unwrap();
    let snapshot = ctx.store_snapshot();

    let err = ctx.swap(bob(), 100_000, 99_701, true).unwrap_err();

    assert_eq!(
        err,
        DlmmError::SlippageExceeded {
            min_amount_out: 99_701,
            amount_out: 99_700,
        }
    );
    assert_eq!(err.kind(), ErrorKind::SlippageExceeded);
    assert_eq!(ctx.store, snapshot);
    assert_eq!(ctx.balance_x(&bob()), test_constants::STARTING_BALANCE);

    // Exactly the minimum is accepted
    let ok = ctx.swap(bob(), 100_000, 99_700, true).unwrap();
    assert_eq!(ok.amount_out, 99_700);
}

#[test]
fn test_insufficient_liquidity_reports_fill() {
    let config = EngineConfig {
        max_bin_walk: 512,
        ..EngineConfig::default()
    };
    let mut ctx = TestContext::with_pool(100, 30, config);
    ctx.add(
        alice(),
        0,
        10_000,
        vec![dist(0, 0, 3_333), dist(-1, 0, 3_333), dist(-2, 0, 3_334)],
    )
    .unwrap();
    let snapshot = ctx.store_snapshot();

    // Nothing below array -1 was ever created
    let err = ctx.swap(bob(), 1_000_000, 0, true).unwrap_err();

    match err {
        DlmmError::InsufficientLiquidity { requested, filled } => {
            assert_eq!(requested, 1_000_000);
            assert!(filled > 10_000 && filled < 1_000_000);
        }
        other => panic!("unexpected error {:?}", other),
    }
    assert_eq!(ctx.store, snapshot);
}

#[test]
fn test_walk_reaches_liquidity_beyond_a_missing_array() {
    let config = EngineConfig {
        max_bin_walk: 512,
        ..EngineConfig::default()
    };
    let mut ctx = TestContext::with_pool(100, 30, config);
    // Array 2 is created by the deposit; array 1 never is
    ctx.add(alice(), 1_000, 0, vec![dist(0, 5_000, 0), dist(150, 5_000, 0)])
        .unwrap();
    assert_eq!(ctx.bin(150).reserve_x, 500);

    let result = ctx.swap(bob(), 1_000, 0, false).unwrap();

    assert_eq!(result.amount_in, 1_000);
    assert_eq!(result.end_bin_id, 150);
    // Bins 0..=69, then 140..=150
    assert_eq!(result.bins_visited, 81);
    assert!(result.amount_out > 500);
    assert_eq!(ctx.bin(150).reserve_x, 1_000 - result.amount_out);
    assert_eq!(ctx.pool_state().active_bin_id, 150);
    ctx.assert_conservation(-1..=3);
    ctx.assert_share_accounting(-1..=3);
}

#[test]
fn test_bin_limit_bounds_the_walk() {
    let mut ctx = y_ladder();
    let snapshot = ctx.store_snapshot();

    let err = ctx
        .engine
        .swap(
            &mut ctx.store,
            &mut ctx.ledger,
            &ctx.pool,
            &params(bob(), 8_000, true, Some(2)),
        )
        .unwrap_err();
    assert_eq!(err, DlmmError::BinLimitExceeded { limit: 2 });
    assert_eq!(err.kind(), ErrorKind::BinLimitExceeded);
    assert_eq!(ctx.store, snapshot);

    // The default walk of 64 bins runs out before array -2
    let err = ctx.swap(bob(), 1_000_000, 0, true).unwrap_err();
    assert_eq!(err, DlmmError::BinLimitExceeded { limit: 64 });

    // A caller limit above the engine cap is clamped
    let err = ctx
        .engine
        .swap(
            &mut ctx.store,
            &mut ctx.ledger,
            &ctx.pool,
            &params(bob(), 1_000_000, true, Some(10_000)),
        )
        .unwrap_err();
    assert_eq!(err, DlmmError::BinLimitExceeded { limit: 64 });
}

#[test]
fn test_zero_and_dust_swaps() {
    let mut ctx = y_ladder();
    assert_eq!(ctx.swap(bob(), 0, 0, true).unwrap_err(), DlmmError::ZeroAmount);
    // One unit pays one unit of fee and buys nothing
    assert_eq!(ctx.swap(bob(), 1, 0, true).unwrap_err(), DlmmError::ZeroAmount);
    assert_eq!(ctx.swap(bob(), 1, 0, true).unwrap_err().kind(), ErrorKind::ZeroAmount);
}

#[test]
fn test_unknown_pool() {
    let mut ctx = TestContext::new();
    let unknown = ctx
        .engine
        .pool_key(&Address::from_label("A"), &Address::from_label("B"));
    let err = ctx
        .engine
        .swap(
            &mut ctx.store,
            &mut ctx.ledger,
            &unknown,
            &params(bob(), 10, true, None),
        )
        .unwrap_err();
    assert_eq!(err, DlmmError::PoolNotFound);
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn test_quote_matches_swap_and_writes_nothing() {
    let mut ctx = y_ladder();
    let snapshot = ctx.store_snapshot();

    let quote = ctx
        .engine
        .quote_swap(&ctx.store, &ctx.pool, 8_000, true, None)
        .unwrap();
    assert_eq!(ctx.store, snapshot);

    let result = ctx.swap(bob(), 8_000, 0, true).unwrap();
    assert_eq!(quote.amount_out, result.amount_out);
    assert_eq!(quote.fee, result.fee);
    assert_eq!(quote.end_bin_id, result.end_bin_id);
}

#[test]
fn test_rejected_transfer_rolls_back() {
    let mut ctx = y_ladder();
    let snapshot = ctx.store_snapshot();

    let err = ctx
        .engine
        .swap(
            &mut ctx.store,
            &mut RejectingTransfer,
            &ctx.pool,
            &params(bob(), 500, true, None),
        )
        .unwrap_err();
    assert!(matches!(err, DlmmError::TransferFailed(_)));
    assert_eq!(err.kind(), ErrorKind::Storage);
    assert_eq!(ctx.store, snapshot);

    // An unfunded trader is refused by the ledger the same way
    let err = ctx.swap(Address::from_label("dave"), 500, 0, true).unwrap_err();
    assert!(matches!(err, DlmmError::TransferFailed(_)));
    assert_eq!(ctx.store, snapshot);
}

#[test]
fn test_fee_grows_bin_value_per_share() {
    let mut ctx = TestContext::new();
    ctx.add(alice(), 50_000, 50_000, vec![dist(0, 10_000, 10_000)])
        .unwrap();
    let before = ctx.bin(0);

    ctx.swap(bob(), 20_000, 0, true).unwrap();
    ctx.swap(bob(), 20_000, 0, false).unwrap();

    // Price of bin 0 is 1, so value is the plain sum
    let after = ctx.bin(0);
    assert_eq!(after.total_shares, before.total_shares);
    assert!(after.reserve_x + after.reserve_y > before.reserve_x + before.reserve_y);
}

#[test]
fn test_corrupt_bin_array_aborts_swap() {
    let mut ctx = y_ladder();
    let key = RecordKey::BinArray(derive_bin_array_key(&ctx.pool, 0));
    let raw = ctx.store.raw_mut(&key).unwrap();
    let half = raw.len() / 2;
    raw.truncate(half);
    let snapshot = ctx.store_snapshot();
    let balance_x = ctx.balance_x(&bob());

    let err = ctx.swap(bob(), 500, 0, true).unwrap_err();
    assert!(matches!(err, DlmmError::CorruptRecord(_)));
    assert_eq!(err.kind(), ErrorKind::Storage);
    assert_eq!(ctx.store, snapshot);
    assert_eq!(ctx.balance_x(&bob()), balance_x);
}
