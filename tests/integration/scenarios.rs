//! Behavioural scenarios for wagering, resolution, and claims.

use parimutuel::engine::odds::Quote;
use parimutuel::engine::{Engine, PredictionMarket};
use parimutuel::types::{MarketStatus, NewMarket, Side, WagerError};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tokio_test::{assert_err, assert_ok};

use crate::active_market;

#[tokio::test]
async fn test_odds_move_with_wager() {
    let engine = Engine::in_memory();
    engine.register_user("alice", dec!(1000)).await.unwrap();
    let m = active_market(&engine, dec!(300), dec!(700)).await;

    let odds = engine.compute_odds(&m.id).await.unwrap();
    assert_eq!(odds.yes.multiplier().unwrap().round_dp(2), dec!(3.33));
    assert_eq!(odds.no.multiplier().unwrap().round_dp(2), dec!(1.43));

    engine.place_bet(&m.id, "alice", Side::Yes, dec!(100)).await.unwrap();

    let m = engine.get_market(&m.id).await.unwrap();
    assert_eq!(m.yes_pool, dec!(400));
    let odds = engine.compute_odds(&m.id).await.unwrap();
    assert_eq!(odds.yes, Quote::Finite(dec!(2.75)));
    assert_eq!(odds.no.multiplier().unwrap().round_dp(2), dec!(1.57));
}

#[tokio::test]
async fn test_empty_market_quotes_break_even() {
    let engine = Engine::in_memory();
    let m = active_market(&engine, Decimal::ZERO, Decimal::ZERO).await;
    let odds = engine.compute_odds(&m.id).await.unwrap();
    assert_eq!(odds.yes, Quote::Finite(dec!(1)));
    assert_eq!(odds.no, Quote::Finite(dec!(1)));
}

#[tokio::test]
async fn test_bet_and_claim_balance_flow() {
    let engine = Engine::in_memory();
    for (who, balance) in [("alice", dec!(1000)), ("bob", dec!(1000)), ("carol", dec!(1000))] {
        engine.register_user(who, balance).await.unwrap();
    }
    let m = active_market(&engine, Decimal::ZERO, Decimal::ZERO).await;

    engine.place_bet(&m.id, "alice", Side::Yes, dec!(200)).await.unwrap();
    assert_eq!(engine.get_user("alice").await.unwrap().balance, dec!(800));
    engine.place_bet(&m.id, "bob", Side::Yes, dec!(200)).await.unwrap();
    engine.place_bet(&m.id, "carol", Side::No, dec!(600)).await.unwrap();

    let resolved = engine.resolve(&m.id, Side::Yes).await.unwrap();
    assert_eq!(resolved.winning_pool(), Some(dec!(400)));
    assert_eq!(resolved.total_pool(), dec!(1000));

    assert_eq!(engine.pending_reward(&m.id, "alice").await, Ok(dec!(500)));
    assert_eq!(engine.claim(&m.id, "alice").await, Ok(dec!(500)));
    assert_eq!(engine.get_user("alice").await.unwrap().balance, dec!(1300));
    assert_eq!(engine.pending_reward(&m.id, "alice").await, Ok(Decimal::ZERO));

    assert_eq!(engine.claim(&m.id, "alice").await, Err(WagerError::NoWinningBet));
    assert_eq!(engine.claim(&m.id, "carol").await, Err(WagerError::NoWinningBet));
    assert_eq!(engine.get_user("carol").await.unwrap().balance, dec!(400));
}

#[tokio::test]
async fn test_wagers_rejected_outside_active() {
    let engine = Engine::in_memory();
    engine.register_user("alice", dec!(500)).await.unwrap();

    let pending = engine
        .create_market(NewMarket::new("Pending", "", chrono::Utc::now()).with_pools(dec!(10), dec!(10)))
        .await
        .unwrap();
    let err = engine.place_bet(&pending.id, "alice", Side::Yes, dec!(50)).await.unwrap_err();
    assert_eq!(err, WagerError::MarketNotActive { status: MarketStatus::Pending });

    let resolved = active_market(&engine, dec!(10), dec!(10)).await;
    engine.resolve(&resolved.id, Side::No).await.unwrap();
    let err = engine.place_bet(&resolved.id, "alice", Side::No, dec!(50)).await.unwrap_err();
    assert_eq!(err, WagerError::MarketNotActive { status: MarketStatus::Resolved });

    for id in [&pending.id, &resolved.id] {
        assert_eq!(engine.get_market(id).await.unwrap().total_pool(), dec!(20));
    }
    assert_eq!(engine.get_user("alice").await.unwrap().balance, dec!(500));
    assert!(engine.list_bets("alice").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_resolve_rules() {
    let engine = Engine::in_memory();
    let pending = engine
        .create_market(NewMarket::new("Pending", "", chrono::Utc::now()))
        .await
        .unwrap();
    assert_eq!(
        engine.resolve(&pending.id, Side::Yes).await,
        Err(WagerError::MarketNotActive { status: MarketStatus::Pending })
    );

    let m = active_market(&engine, dec!(5), dec!(7)).await;
    assert_ok!(engine.resolve(&m.id, Side::Yes).await);
    assert_eq!(engine.resolve(&m.id, Side::No).await, Err(WagerError::AlreadyResolved));

    let after = engine.get_market(&m.id).await.unwrap();
    assert_eq!(after.result, Some(Side::Yes));
    assert_eq!((after.yes_pool, after.no_pool), (dec!(5), dec!(7)));

    assert_err!(engine.activate(&m.id).await);
}

#[tokio::test]
async fn test_unknown_identifiers() {
    let engine = Engine::in_memory();
    let m = active_market(&engine, Decimal::ZERO, Decimal::ZERO).await;
    let ghost = parimutuel::types::MarketId::from("ghost");

    assert_eq!(engine.get_market(&ghost).await.unwrap_err().kind(), "NotFound");
    assert_eq!(engine.get_user("nobody").await.unwrap_err().kind(), "NotFound");
    assert_eq!(
        engine.place_bet(&m.id, "nobody", Side::Yes, dec!(1)).await.unwrap_err().kind(),
        "NotFound"
    );
    assert_eq!(engine.resolve(&ghost, Side::Yes).await.unwrap_err().kind(), "NotFound");
    assert_eq!(engine.claim(&ghost, "nobody").await.unwrap_err().kind(), "NotFound");
}

#[tokio::test]
async fn test_rewards_conserve_total_pool() {
    let engine = Engine::in_memory();
    let m = active_market(&engine, Decimal::ZERO, Decimal::ZERO).await;

    let stakes = [
        ("u1", Side::Yes, dec!(13.37)),
        ("u2", Side::No, dec!(250)),
        ("u3", Side::Yes, dec!(99.99)),
        ("u4", Side::Yes, dec!(7)),
        ("u5", Side::No, dec!(41.5)),
        ("u6", Side::Yes, dec!(333.33)),
    ];
    for (who, side, amount) in stakes {
        engine.register_user(who, dec!(1000)).await.unwrap();
        engine.place_bet(&m.id, who, side, amount).await.unwrap();
    }

    let resolved = engine.resolve(&m.id, Side::Yes).await.unwrap();
    let winning_stake: Decimal = stakes.iter().filter(|s| s.1 == Side::Yes).map(|s| s.2).sum();
    assert_eq!(resolved.winning_pool(), Some(winning_stake));

    let mut paid = Decimal::ZERO;
    for (who, side, _) in stakes {
        match side {
            Side::Yes => paid += engine.claim(&m.id, who).await.unwrap(),
            Side::No => {
                assert_err!(engine.claim(&m.id, who).await);
            }
        }
    }
    assert!((paid - resolved.total_pool()).abs() < dec!(0.000001));
}

#[tokio::test]
async fn test_multiple_bets_claimable_individually() {
    let engine = Engine::in_memory();
    engine.register_user("alice", dec!(1000)).await.unwrap();
    engine.register_user("bob", dec!(1000)).await.unwrap();
    let m = active_market(&engine, Decimal::ZERO, Decimal::ZERO).await;

    let first = engine.place_bet(&m.id, "alice", Side::No, dec!(100)).await.unwrap();
    let second = engine.place_bet(&m.id, "alice", Side::No, dec!(300)).await.unwrap();
    engine.place_bet(&m.id, "bob", Side::Yes, dec!(400)).await.unwrap();
    assert_eq!(engine.list_bets("alice").await.unwrap().len(), 2);

    engine.resolve(&m.id, Side::No).await.unwrap();

    assert_eq!(engine.claim_bet("alice", second.id).await, Ok(dec!(600)));
    assert_eq!(engine.list_bets("alice").await.unwrap(), vec![first.clone()]);
    assert_eq!(engine.claim(&m.id, "alice").await, Ok(dec!(200)));
    assert_eq!(engine.get_user("alice").await.unwrap().balance, dec!(1400));
    assert_err!(engine.claim_bet("alice", first.id).await);
}
