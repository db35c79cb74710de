//! Concurrent callers against one shared ledger.

use futures::future::join_all;
use parimutuel::engine::{Engine, PredictionMarket};
use parimutuel::types::{Side, WagerError};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;

use crate::active_market;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_racing_claims_pay_exactly_once() {
    let engine = Arc::new(Engine::in_memory());
    engine.register_user("alice", dec!(1000)).await.unwrap();
    engine.register_user("bob", dec!(1000)).await.unwrap();
    let m = active_market(&engine, Decimal::ZERO, Decimal::ZERO).await;

    engine.place_bet(&m.id, "alice", Side::Yes, dec!(200)).await.unwrap();
    engine.place_bet(&m.id, "bob", Side::No, dec!(300)).await.unwrap();
    engine.resolve(&m.id, Side::Yes).await.unwrap();

    let handles = (0..32).map(|_| {
        let engine = engine.clone();
        let id = m.id.clone();
        tokio::spawn(async move { engine.claim(&id, "alice").await })
    });
    let results: Vec<_> = join_all(handles).await.into_iter().map(|r| r.unwrap()).collect();

    let wins: Vec<_> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
    assert_eq!(wins, vec![&dec!(500)]);
    assert!(results
        .iter()
        .filter(|r| r.is_err())
        .all(|r| r == &Err(WagerError::NoWinningBet)));
    assert_eq!(engine.get_user("alice").await.unwrap().balance, dec!(1300));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_overdraw_is_refused() {
    let engine = Arc::new(Engine::in_memory());
    engine.register_user("alice", dec!(100)).await.unwrap();
    let m = active_market(&engine, Decimal::ZERO, Decimal::ZERO).await;

    let handles = (0..10).map(|i| {
        let engine = engine.clone();
        let id = m.id.clone();
        let side = if i % 2 == 0 { Side::Yes } else { Side::No };
        tokio::spawn(async move { engine.place_bet(&id, "alice", side, dec!(30)).await })
    });
    let results: Vec<_> = join_all(handles).await.into_iter().map(|r| r.unwrap()).collect();

    let accepted = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(accepted, 3);
    assert!(results
        .iter()
        .filter_map(|r| r.as_ref().err())
        .all(|e| matches!(e, WagerError::InsufficientBalance { .. })));

    let market = engine.get_market(&m.id).await.unwrap();
    assert_eq!(market.total_pool(), dec!(90));
    assert_eq!(engine.get_user("alice").await.unwrap().balance, dec!(10));
    assert_eq!(engine.list_bets("alice").await.unwrap().len(), 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_money_conserved_across_markets_and_snapshots() {
    let engine = Arc::new(Engine::in_memory());
    let users: Vec<String> = (0..8).map(|i| format!("user-{i}")).collect();
    for u in &users {
        engine.register_user(u, dec!(500)).await.unwrap();
    }
    let a = active_market(&engine, Decimal::ZERO, Decimal::ZERO).await;
    let b = active_market(&engine, Decimal::ZERO, Decimal::ZERO).await;
    let initial = dec!(500) * Decimal::from(users.len());

    let mut handles = Vec::new();
    for (i, user) in users.iter().enumerate() {
        for round in 0..20u32 {
            let engine = engine.clone();
            let user = user.clone();
            let id = if (i + round as usize) % 2 == 0 { a.id.clone() } else { b.id.clone() };
            let side = if round % 3 == 0 { Side::No } else { Side::Yes };
            let amount = Decimal::from(round % 7 + 1);
            handles.push(tokio::spawn(async move {
                let _ = engine.place_bet(&id, &user, side, amount).await;
            }));
        }
    }

    let snapshots = {
        let engine = engine.clone();
        tokio::spawn(async move {
            let mut taken = Vec::new();
            for _ in 0..10 {
                taken.push(engine.ledger().snapshot().await);
                tokio::task::yield_now().await;
            }
            taken
        })
    };

    for h in join_all(handles).await {
        h.unwrap();
    }

    for snap in snapshots.await.unwrap() {
        let pools: Decimal = snap.markets.iter().map(|m| m.total_pool()).sum();
        let balances: Decimal = snap.accounts.iter().map(|a| a.user.balance).sum();
        let staked: Decimal = snap.accounts.iter().flat_map(|a| &a.open_bets).map(|b| b.amount).sum();
        assert_eq!(pools + balances, initial);
        assert_eq!(pools, staked);
    }

    let final_snap = engine.ledger().snapshot().await;
    let pools: Decimal = final_snap.markets.iter().map(|m| m.total_pool()).sum();
    let balances: Decimal = final_snap.accounts.iter().map(|a| a.user.balance).sum();
    assert_eq!(pools + balances, initial);
    assert!(balances >= Decimal::ZERO);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_wagers_racing_resolution() {
    let engine = Arc::new(Engine::in_memory());
    engine.register_user("alice", dec!(10000)).await.unwrap();
    let m = active_market(&engine, Decimal::ZERO, Decimal::ZERO).await;

    let mut handles = Vec::new();
    for i in 0..50 {
        {
            let engine = engine.clone();
            let id = m.id.clone();
            handles.push(tokio::spawn(async move {
                engine.place_bet(&id, "alice", Side::Yes, dec!(10)).await.map(|_| ())
            }));
        }
        if i == 25 {
            let engine = engine.clone();
            let id = m.id.clone();
            handles.push(tokio::spawn(async move {
                engine.resolve(&id, Side::Yes).await.map(|_| ())
            }));
        }
    }

    let results: Vec<_> = join_all(handles).await.into_iter().map(|r| r.unwrap()).collect();
    assert!(results
        .iter()
        .filter_map(|r| r.as_ref().err())
        .all(|e| matches!(e, WagerError::MarketNotActive { .. })));

    let market = engine.get_market(&m.id).await.unwrap();
    let bets = engine.list_bets("alice").await.unwrap();
    let staked: Decimal = bets.iter().map(|b| b.amount).sum();
    assert_eq!(market.yes_pool, staked);
    assert_eq!(engine.get_user("alice").await.unwrap().balance + staked, dec!(10000));

    // Every accepted stake was placed before the pools froze, so the
    // winners split exactly what was staked.
    if staked.is_zero() {
        assert_eq!(engine.claim(&m.id, "alice").await, Err(WagerError::NoWinningBet));
    } else {
        assert_eq!(engine.claim(&m.id, "alice").await, Ok(staked));
    }
}
