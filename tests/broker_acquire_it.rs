// self
use site_token_broker::{
	_preludet::*,
	auth::{AccountId, Permission, Token, TokenId, TokenRole, TokenStatus},
	broker::{SiteTokenBroker, acquire_site_token},
	config::BrokerConfig,
	store::{MemoryStore, TokenStore},
};

async fn account_tokens(store: &MemoryStore, account: AccountId) -> Vec<Token> {
	store.list_for_account(account).await.expect("Listing account tokens should succeed.")
}

fn sorted_ids(tokens: &[Token]) -> Vec<i64> {
	let mut ids: Vec<_> = tokens.iter().filter_map(Token::id).map(TokenId::get).collect();

	ids.sort_unstable();

	ids
}

fn id_of(token: &Token) -> i64 {
	token.id().map(TokenId::get).expect("Stored tokens should carry an identifier.")
}

#[tokio::test]
async fn fresh_account_gets_a_new_site_token() {
	let (broker, store) = build_test_broker(BrokerConfig::default());
	let account = seed_account(&store, "fresh@example.com").await;
	let account_id = account.id().expect("Seeded account should have an id.");
	let before = unix_now();
	let token = broker
		.acquire(&CancellationToken::new(), &account)
		.await
		.expect("Acquisition for a fresh account should succeed.");

	assert_eq!(token.role(), TokenRole::Site);
	assert_eq!(token.status(), TokenStatus::Enabled);
	assert_eq!(token.permissions(), Permission::Write);
	assert_eq!(token.account_id(), Some(account_id));
	assert_eq!(token.expires(), token.created() + 3_600);
	assert!(token.created() >= before);
	assert!(id_of(&token) > ALLOCATED_ID_FLOOR);
	assert_eq!(token.access_token().expose().len(), 64);
	assert_eq!(broker.metrics.issued(), 1);

	let stored = account_tokens(&store, account_id).await;

	assert_eq!(sorted_ids(&stored), vec![id_of(&token)]);
}

#[tokio::test]
async fn repeated_acquisitions_leave_one_active_token() {
	let (broker, store) = build_test_broker(BrokerConfig::default());
	let account = seed_account(&store, "converge@example.com").await;
	let account_id = account.id().expect("Seeded account should have an id.");
	let cancel = CancellationToken::new();
	let mut last = None;

	for _ in 0..5 {
		let token =
			broker.acquire(&cancel, &account).await.expect("Each acquisition should succeed.");

		last = Some(id_of(&token));
	}

	broker.cleanup().drain().await;

	let remaining = account_tokens(&store, account_id).await;

	assert_eq!(remaining.len(), 1);
	assert!(remaining[0].is_active());
	assert_eq!(remaining[0].id().map(TokenId::get), last);
	assert_eq!(broker.metrics.issued(), 1);
	assert_eq!(broker.metrics.attempts(), 5);
}

#[tokio::test]
async fn highest_identifier_wins_and_duplicates_are_removed() {
	let (broker, store) = build_test_broker(BrokerConfig::default());
	let account = seed_account(&store, "dupes@example.com").await;
	let account_id = account.id().expect("Seeded account should have an id.");
	let expires = unix_now() + 1_800;

	for id in [9, 12, 5] {
		seed_site_token(&store, account_id, id, TokenStatus::Enabled, expires).await;
	}

	let token = broker
		.acquire(&CancellationToken::new(), &account)
		.await
		.expect("Acquisition with duplicates should succeed.");

	assert_eq!(id_of(&token), 12);
	assert_eq!(token.expires(), expires);

	broker.cleanup().drain().await;

	assert_eq!(sorted_ids(&account_tokens(&store, account_id).await), vec![12]);
	assert_eq!(broker.metrics.superseded(), 2);
	assert_eq!(broker.metrics.reused(), 1);
	assert_eq!(broker.cleanup().stats().removed(), 2);
	assert_eq!(broker.cleanup().stats().failed(), 0);
}

#[tokio::test]
async fn repeated_acquisition_returns_the_same_token() {
	let (broker, store) = build_test_broker(BrokerConfig::default());
	let account = seed_account(&store, "steady@example.com").await;
	let account_id = account.id().expect("Seeded account should have an id.");
	let expires = unix_now() + 1_800;

	seed_site_token(&store, account_id, 3, TokenStatus::Enabled, expires).await;
	seed_site_token(&store, account_id, 7, TokenStatus::Enabled, expires).await;

	let cancel = CancellationToken::new();
	let first = broker.acquire(&cancel, &account).await.expect("First acquisition should succeed.");

	broker.cleanup().drain().await;

	let second =
		broker.acquire(&cancel, &account).await.expect("Second acquisition should succeed.");

	broker.cleanup().drain().await;

	assert_eq!(id_of(&first), 7);
	assert_eq!(id_of(&second), 7);
	assert_eq!(first.access_token(), second.access_token());
	assert_eq!(sorted_ids(&account_tokens(&store, account_id).await), vec![7]);
	assert_eq!(broker.metrics.issued(), 0);
}

#[tokio::test]
async fn expired_token_is_replaced_with_a_fresh_one() {
	let (broker, store) = build_test_broker(BrokerConfig::default());
	let account = seed_account(&store, "expired@example.com").await;
	let account_id = account.id().expect("Seeded account should have an id.");
	let now = unix_now();

	seed_site_token(&store, account_id, 7, TokenStatus::Enabled, now - 10).await;

	let token = broker
		.acquire(&CancellationToken::new(), &account)
		.await
		.expect("Acquisition over an expired token should succeed.");

	assert_ne!(id_of(&token), 7);
	assert!(token.is_active());
	assert!((token.expires() - (now + 3_600)).abs() <= 5);

	broker.cleanup().drain().await;

	assert_eq!(sorted_ids(&account_tokens(&store, account_id).await), vec![id_of(&token)]);
}

#[tokio::test]
async fn disabled_token_is_removed_and_replaced() {
	let (broker, store) = build_test_broker(BrokerConfig::default());
	let account = seed_account(&store, "disabled@example.com").await;
	let account_id = account.id().expect("Seeded account should have an id.");

	seed_site_token(&store, account_id, 4, TokenStatus::Disabled, unix_now() + 1_800).await;

	let token = broker
		.acquire(&CancellationToken::new(), &account)
		.await
		.expect("Acquisition over a disabled token should succeed.");

	assert_ne!(id_of(&token), 4);
	assert_eq!(token.status(), TokenStatus::Enabled);

	broker.cleanup().drain().await;

	assert_eq!(sorted_ids(&account_tokens(&store, account_id).await), vec![id_of(&token)]);
	assert_eq!(broker.cleanup().stats().removed(), 1);
}

#[tokio::test]
async fn non_site_tokens_are_left_alone() {
	let (broker, store) = build_test_broker(BrokerConfig::default());
	let account = seed_account(&store, "mixed@example.com").await;
	let account_id = account.id().expect("Seeded account should have an id.");
	let mut durable = Token::for_account(account_id, Permission::Delete)
		.expect("Account token fixture should build.");

	durable
		.assign_id(TokenId::new(50).expect("Token id fixture should be valid."))
		.expect("Fresh token fixture should accept an id.");
	store.update(durable).await.expect("Seeding account token should succeed.");

	let token = broker
		.acquire(&CancellationToken::new(), &account)
		.await
		.expect("Acquisition next to an account token should succeed.");

	broker.cleanup().drain().await;

	let remaining = account_tokens(&store, account_id).await;

	assert_eq!(sorted_ids(&remaining), vec![50, id_of(&token)]);
	assert!(remaining.iter().any(|t| t.is_account_token()));
}

#[tokio::test]
async fn tokens_of_other_accounts_are_not_considered() {
	let (broker, store) = build_test_broker(BrokerConfig::default());
	let alice = seed_account(&store, "alice@example.com").await;
	let bob = seed_account(&store, "bob@example.com").await;
	let bob_id = bob.id().expect("Seeded account should have an id.");

	seed_site_token(&store, bob_id, 20, TokenStatus::Enabled, unix_now() + 1_800).await;

	let token = broker
		.acquire(&CancellationToken::new(), &alice)
		.await
		.expect("Acquisition for another account should succeed.");

	broker.cleanup().drain().await;

	assert_eq!(token.account_id(), alice.id());
	assert_eq!(sorted_ids(&account_tokens(&store, bob_id).await), vec![20]);
}

#[tokio::test]
async fn unpersisted_account_is_rejected() {
	let (broker, _store) = build_test_broker(BrokerConfig::default());
	let account = site_token_broker::auth::Account::new("ghost@example.com", "ghost")
		.expect("Account fixture should be valid.");
	let err = broker
		.acquire(&CancellationToken::new(), &account)
		.await
		.expect_err("Accounts without an id should be rejected.");

	assert!(matches!(err, Error::UnassignedAccount));
	assert_eq!(broker.metrics.failures(), 1);
}

#[tokio::test]
async fn configured_ttl_and_permission_apply_to_new_tokens() {
	let config = BrokerConfig::default()
		.with_site_token_ttl(Duration::minutes(5))
		.with_site_permission(Permission::Read);
	let (broker, store) = build_test_broker(config);
	let account = seed_account(&store, "custom@example.com").await;
	let token = broker
		.acquire(&CancellationToken::new(), &account)
		.await
		.expect("Acquisition with a custom config should succeed.");

	assert_eq!(token.expires(), token.created() + 300);
	assert_eq!(token.permissions(), Permission::Read);
}

#[tokio::test]
async fn free_function_uses_default_configuration() {
	let store = Arc::new(test_store());
	let account = seed_account(&store, "free@example.com").await;
	let dyn_store: Arc<dyn TokenStore> = store.clone();
	let token = acquire_site_token(&CancellationToken::new(), dyn_store, &account)
		.await
		.expect("Free-function acquisition should succeed.");

	assert_eq!(token.expires(), token.created() + 3_600);
	assert_eq!(store.token_count(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn serialized_acquisitions_share_one_token() {
	let (broker, store) =
		build_test_broker(BrokerConfig::default().with_serialize_per_account(true));
	let account = seed_account(&store, "serial@example.com").await;
	let account_id = account.id().expect("Seeded account should have an id.");
	let mut handles = Vec::new();

	for _ in 0..8 {
		let broker = broker.clone();
		let account = account.clone();

		handles.push(tokio::spawn(async move {
			broker.acquire(&CancellationToken::new(), &account).await
		}));
	}

	let mut ids = Vec::new();

	for handle in handles {
		let token = handle
			.await
			.expect("Acquisition task should not panic.")
			.expect("Serialized acquisition should succeed.");

		ids.push(id_of(&token));
	}

	ids.dedup();

	assert_eq!(ids.len(), 1);
	assert_eq!(broker.metrics.issued(), 1);
	assert_eq!(account_tokens(&store, account_id).await.len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_acquisitions_converge_on_the_next_pass() {
	let (broker, store) = build_test_broker(BrokerConfig::default());
	let account = seed_account(&store, "race@example.com").await;
	let account_id = account.id().expect("Seeded account should have an id.");
	let mut handles = Vec::new();

	for _ in 0..8 {
		let broker = broker.clone();
		let account = account.clone();

		handles.push(tokio::spawn(async move {
			broker.acquire(&CancellationToken::new(), &account).await
		}));
	}

	for handle in handles {
		handle
			.await
			.expect("Acquisition task should not panic.")
			.expect("Racing acquisition should succeed.");
	}

	broker.cleanup().drain().await;

	let settled = broker
		.acquire(&CancellationToken::new(), &account)
		.await
		.expect("Follow-up acquisition should succeed.");

	broker.cleanup().drain().await;

	assert_eq!(sorted_ids(&account_tokens(&store, account_id).await), vec![id_of(&settled)]);
}

#[tokio::test]
async fn brokers_sharing_a_store_agree_on_the_token() {
	let (first, store) = build_test_broker(BrokerConfig::default());
	let dyn_store: Arc<dyn TokenStore> = store.clone();
	let second = SiteTokenBroker::new(dyn_store);
	let account = seed_account(&store, "shared@example.com").await;
	let cancel = CancellationToken::new();
	let issued = first.acquire(&cancel, &account).await.expect("First broker should succeed.");
	let reused = second.acquire(&cancel, &account).await.expect("Second broker should succeed.");

	assert_eq!(issued.id(), reused.id());
	assert_eq!(second.metrics.reused(), 1);
}

#[tokio::test]
async fn unfloored_store_issues_past_ids_written_by_update() {
	let store = Arc::new(MemoryStore::default());
	let account = seed_account(&store, "unfloored@example.com").await;
	let account_id = account.id().expect("Seeded account should have an id.");
	let next = account_id.get() + 1;

	seed_site_token(&store, account_id, next, TokenStatus::Disabled, unix_now() + 1_800).await;

	let dyn_store: Arc<dyn TokenStore> = store.clone();
	let broker = SiteTokenBroker::new(dyn_store);
	let token = broker
		.acquire(&CancellationToken::new(), &account)
		.await
		.expect("Acquisition should not collide with ids written through update.");

	assert!(id_of(&token) > next);

	broker.cleanup().drain().await;

	assert_eq!(sorted_ids(&account_tokens(&store, account_id).await), vec![id_of(&token)]);
}
