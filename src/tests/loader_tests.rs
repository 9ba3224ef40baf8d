use crate::models::{
    Game, Pagination, Sort, TransactionFilters, TransactionKind, Wallet,
};
use crate::store::{keys, Store};
use crate::tests::{realm, sample_tx, seed_realms, seed_transactions, test_state};

#[tokio::test]
async fn unknown_user_gets_an_empty_wallet_materialized() {
    let state = test_state();

    let loaded = state.loader.load_user_wallet("u1").await.unwrap();
    assert!(!loaded.from_cache);
    assert_eq!(loaded.data.usd, 0.0);
    assert_eq!(loaded.data.toman, 0.0);
    assert!(loaded.data.gold_wallets.is_empty());

    // The zero wallet was persisted, not just returned.
    let stored: Option<Wallet> = state.store.get_doc(&keys::wallet_key("u1")).await.unwrap();
    assert!(stored.is_some());

    let again = state.loader.load_user_wallet("u1").await.unwrap();
    assert!(again.from_cache);
}

#[tokio::test]
async fn batch_load_mixes_cache_and_store() {
    let state = test_state();
    // Warm one of the three wallets.
    state.loader.load_user_wallet("u1").await.unwrap();

    let users = vec!["u1".to_string(), "u2".to_string(), "u3".to_string()];
    let wallets = state.loader.load_multiple_wallets(&users).await.unwrap();
    assert_eq!(wallets.len(), 3);
    for user in &users {
        assert_eq!(wallets[user].user_id, *user);
    }

    // Everything loaded fresh was cached on the way out.
    let again = state.loader.load_user_wallet("u3").await.unwrap();
    assert!(again.from_cache);
}

#[tokio::test]
async fn active_realms_exclude_inactive_ones() {
    let state = test_state();
    seed_realms(
        &state,
        vec![
            realm("r1", "g1", true),
            realm("r2", "g1", false),
            realm("r3", "g2", true),
        ],
    )
    .await;

    let loaded = state.loader.load_active_realms().await.unwrap();
    assert!(!loaded.from_cache);
    let ids: Vec<&str> = loaded.data.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["r1", "r3"]);

    let again = state.loader.load_active_realms().await.unwrap();
    assert!(again.from_cache);
}

#[tokio::test]
async fn game_realms_filter_by_game_and_activity() {
    let state = test_state();
    seed_realms(
        &state,
        vec![
            realm("r1", "g1", true),
            realm("r2", "g1", false),
            realm("r3", "g2", true),
        ],
    )
    .await;

    let loaded = state.loader.load_game_realms("g1").await.unwrap();
    assert_eq!(loaded.data.len(), 1);
    assert_eq!(loaded.data[0].id, "r1");
}

#[tokio::test]
async fn active_games_are_read_through_cached() {
    let state = test_state();
    let games = vec![
        Game {
            id: "g1".to_string(),
            name: "Game One".to_string(),
            active: true,
        },
        Game {
            id: "g2".to_string(),
            name: "Game Two".to_string(),
            active: false,
        },
    ];
    state.store.set_doc(keys::GAMES_KEY, &games).await.unwrap();

    let loaded = state.loader.load_active_games().await.unwrap();
    assert_eq!(loaded.data.len(), 1);
    assert_eq!(loaded.data[0].id, "g1");
    assert!(state.loader.load_active_games().await.unwrap().from_cache);
}

#[tokio::test]
async fn user_transactions_are_filtered_paginated_and_cached() {
    let state = test_state();
    let mut txs: Vec<_> = (0..25).map(|i| sample_tx("u1", i)).collect();
    for tx in txs.iter_mut().take(5) {
        tx.kind = TransactionKind::Purchase;
    }
    seed_transactions(&state, &txs).await;

    let filters = TransactionFilters {
        kind: Some(TransactionKind::Deposit),
        ..Default::default()
    };
    let pagination = Pagination { offset: 0, limit: 10 };
    let loaded = state
        .loader
        .load_user_transactions("u1", &filters, pagination, Sort::default())
        .await
        .unwrap();
    assert!(!loaded.from_cache);
    assert_eq!(loaded.data.total, 20);
    assert_eq!(loaded.data.transactions.len(), 10);
    assert!(loaded.data.has_more);

    // Same query parameters hit the cached page.
    let again = state
        .loader
        .load_user_transactions("u1", &filters, pagination, Sort::default())
        .await
        .unwrap();
    assert!(again.from_cache);

    // Different pagination is a different cache entry.
    let tail = state
        .loader
        .load_user_transactions(
            "u1",
            &filters,
            Pagination { offset: 10, limit: 10 },
            Sort::default(),
        )
        .await
        .unwrap();
    assert!(!tail.from_cache);
    assert!(!tail.data.has_more);
}

#[tokio::test]
async fn recent_transactions_return_newest_first() {
    let state = test_state();
    let txs: Vec<_> = (0..5).map(|i| sample_tx("u1", i)).collect();
    seed_transactions(&state, &txs).await;

    let loaded = state.loader.load_recent_transactions("u1", 3).await.unwrap();
    assert_eq!(loaded.data.len(), 3);
    // sample_tx makes higher sequence numbers newer.
    assert_eq!(loaded.data[0].id, txs[4].id);
    assert_eq!(loaded.data[2].id, txs[2].id);
}

#[tokio::test]
async fn preload_dashboard_warms_the_cache() {
    let state = test_state();
    seed_realms(&state, vec![realm("r1", "g1", true)]).await;
    seed_transactions(&state, &[sample_tx("u1", 0)]).await;

    state.loader.preload_dashboard_data("u1").await.unwrap();

    assert!(state.loader.load_user_wallet("u1").await.unwrap().from_cache);
    assert!(state.loader.load_active_realms().await.unwrap().from_cache);
    assert!(state
        .loader
        .load_recent_transactions("u1", 10)
        .await
        .unwrap()
        .from_cache);
}

#[tokio::test]
async fn invalidating_a_user_only_touches_their_views() {
    let state = test_state();
    seed_transactions(&state, &[sample_tx("u1", 0), sample_tx("u2", 1)]).await;
    state.loader.load_user_wallet("u1").await.unwrap();
    state.loader.load_user_wallet("u2").await.unwrap();
    state.loader.load_recent_transactions("u1", 5).await.unwrap();

    state.loader.invalidate_user_cache("u1");

    assert!(!state.loader.load_user_wallet("u1").await.unwrap().from_cache);
    assert!(!state
        .loader
        .load_recent_transactions("u1", 5)
        .await
        .unwrap()
        .from_cache);
    assert!(state.loader.load_user_wallet("u2").await.unwrap().from_cache);
}

#[tokio::test]
async fn invalidating_the_catalog_drops_realm_and_game_views() {
    let state = test_state();
    seed_realms(&state, vec![realm("r1", "g1", true)]).await;
    state.loader.load_active_realms().await.unwrap();
    state.loader.load_game_realms("g1").await.unwrap();

    state.loader.invalidate_game_cache();

    assert!(!state.loader.load_active_realms().await.unwrap().from_cache);
    assert!(!state.loader.load_game_realms("g1").await.unwrap().from_cache);
}
