// std
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
// self
use site_token_broker::{
	_preludet::*,
	auth::{AccountId, Token, TokenId, TokenStatus},
	broker::SiteTokenBroker,
	config::BrokerConfig,
	store::{MemoryStore, StoreError, StoreFuture, TokenStore},
};

/// Delegates to a [`MemoryStore`] and fails selected calls on demand.
#[derive(Debug, Default)]
struct FlakyStore {
	inner: MemoryStore,
	fail_list: AtomicBool,
	fail_create: AtomicBool,
	fail_remove: AtomicBool,
	hang_list: AtomicBool,
	list_calls: AtomicUsize,
}
impl FlakyStore {
	fn new() -> Self {
		Self { inner: test_store(), ..Default::default() }
	}

	fn unavailable(op: &str) -> StoreError {
		StoreError::Unavailable { message: format!("{op} is down") }
	}
}
impl TokenStore for FlakyStore {
	fn list(&self) -> StoreFuture<'_, Vec<Token>> {
		self.inner.list()
	}

	fn list_for_account(&self, account: AccountId) -> StoreFuture<'_, Vec<Token>> {
		self.list_calls.fetch_add(1, Ordering::SeqCst);

		if self.hang_list.load(Ordering::SeqCst) {
			return Box::pin(std::future::pending::<Result<Vec<Token>, StoreError>>());
		}
		if self.fail_list.load(Ordering::SeqCst) {
			return Box::pin(async { Err::<Vec<Token>, _>(Self::unavailable("list")) });
		}

		self.inner.list_for_account(account)
	}

	fn get_by_id(&self, id: TokenId) -> StoreFuture<'_, Token> {
		self.inner.get_by_id(id)
	}

	fn get_by_access_token<'a>(&'a self, access_token: &'a str) -> StoreFuture<'a, Token> {
		self.inner.get_by_access_token(access_token)
	}

	fn create(&self, token: Token) -> StoreFuture<'_, Token> {
		if self.fail_create.load(Ordering::SeqCst) {
			return Box::pin(async { Err::<Token, _>(Self::unavailable("create")) });
		}

		self.inner.create(token)
	}

	fn update(&self, token: Token) -> StoreFuture<'_, Token> {
		self.inner.update(token)
	}

	fn remove(&self, id: TokenId) -> StoreFuture<'_, ()> {
		if self.fail_remove.load(Ordering::SeqCst) {
			return Box::pin(async { Err::<(), _>(Self::unavailable("remove")) });
		}

		self.inner.remove(id)
	}
}

fn broker_over(store: &Arc<FlakyStore>) -> SiteTokenBroker {
	let dyn_store: Arc<dyn TokenStore> = store.clone();

	SiteTokenBroker::with_config(dyn_store, BrokerConfig::default())
		.expect("Default broker configuration should be valid.")
}

#[tokio::test]
async fn listing_failure_propagates_unchanged() {
	let store = Arc::new(FlakyStore::new());
	let broker = broker_over(&store);
	let account = seed_account(&store.inner, "list@example.com").await;

	store.fail_list.store(true, Ordering::SeqCst);

	let err = broker
		.acquire(&CancellationToken::new(), &account)
		.await
		.expect_err("Listing failures should surface to the caller.");

	assert!(matches!(err, Error::Storage(StoreError::Unavailable { .. })));
	assert!(err.to_string().contains("list is down"));
	assert_eq!(store.inner.token_count(), 0);
	assert_eq!(broker.metrics.failures(), 1);
}

#[tokio::test]
async fn creation_failure_propagates_unchanged() {
	let store = Arc::new(FlakyStore::new());
	let broker = broker_over(&store);
	let account = seed_account(&store.inner, "create@example.com").await;

	store.fail_create.store(true, Ordering::SeqCst);

	let err = broker
		.acquire(&CancellationToken::new(), &account)
		.await
		.expect_err("Creation failures should surface to the caller.");

	assert!(matches!(err, Error::Storage(StoreError::Unavailable { .. })));
	assert_eq!(broker.metrics.issued(), 0);
}

#[tokio::test]
async fn cleanup_failures_never_reach_the_caller() {
	let store = Arc::new(FlakyStore::new());
	let broker = broker_over(&store);
	let account = seed_account(&store.inner, "cleanup@example.com").await;
	let account_id = account.id().expect("Seeded account should have an id.");
	let expires = unix_now() + 1_800;

	for id in [5, 9, 12] {
		seed_site_token(&store.inner, account_id, id, TokenStatus::Enabled, expires).await;
	}

	store.fail_remove.store(true, Ordering::SeqCst);

	let token = broker
		.acquire(&CancellationToken::new(), &account)
		.await
		.expect("Acquisition should succeed even when cleanup fails.");

	broker.cleanup().drain().await;

	assert_eq!(token.id().map(TokenId::get), Some(12));
	assert_eq!(broker.cleanup().stats().scheduled(), 2);
	assert_eq!(broker.cleanup().stats().failed(), 2);
	assert_eq!(broker.cleanup().stats().removed(), 0);
	assert_eq!(store.inner.token_count(), 3);
}

#[tokio::test]
async fn pre_cancelled_call_touches_nothing() {
	let store = Arc::new(FlakyStore::new());
	let broker = broker_over(&store);
	let account = seed_account(&store.inner, "early@example.com").await;
	let cancel = CancellationToken::new();

	cancel.cancel();

	let err = broker
		.acquire(&cancel, &account)
		.await
		.expect_err("Cancelled acquisitions should fail.");

	assert!(matches!(err, Error::Cancelled));
	assert_eq!(store.inner.token_count(), 0);
}

#[tokio::test]
async fn cancellation_interrupts_a_pending_store_call() {
	let store = Arc::new(FlakyStore::new());
	let broker = broker_over(&store);
	let account = seed_account(&store.inner, "slow@example.com").await;
	let cancel = CancellationToken::new();

	store.hang_list.store(true, Ordering::SeqCst);

	let trigger = cancel.clone();

	tokio::spawn(async move {
		tokio::time::sleep(std::time::Duration::from_millis(20)).await;
		trigger.cancel();
	});

	let err = tokio::time::timeout(
		std::time::Duration::from_secs(5),
		broker.acquire(&cancel, &account),
	)
	.await
	.expect("Cancellation should stop the acquisition before the timeout.")
	.expect_err("Cancelled acquisitions should fail.");

	assert!(matches!(err, Error::Cancelled));
	assert_eq!(store.list_calls.load(Ordering::SeqCst), 1);
	assert_eq!(store.inner.token_count(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn cancellation_releases_the_account_guard() {
	let store = Arc::new(FlakyStore::new());
	let dyn_store: Arc<dyn TokenStore> = store.clone();
	let broker = SiteTokenBroker::with_config(
		dyn_store,
		BrokerConfig::default().with_serialize_per_account(true),
	)
	.expect("Serialized broker configuration should be valid.");
	let account = seed_account(&store.inner, "guard@example.com").await;
	let cancel = CancellationToken::new();

	store.hang_list.store(true, Ordering::SeqCst);

	let stuck = {
		let broker = broker.clone();
		let account = account.clone();
		let cancel = cancel.clone();

		tokio::spawn(async move { broker.acquire(&cancel, &account).await })
	};

	tokio::time::sleep(std::time::Duration::from_millis(20)).await;
	cancel.cancel();

	let err = stuck
		.await
		.expect("Acquisition task should not panic.")
		.expect_err("Cancelled acquisitions should fail.");

	assert!(matches!(err, Error::Cancelled));

	store.hang_list.store(false, Ordering::SeqCst);

	let token = broker
		.acquire(&CancellationToken::new(), &account)
		.await
		.expect("A later acquisition should take the released guard.");

	assert!(token.is_active());
}

#[tokio::test]
async fn cleanup_outlives_caller_cancellation() {
	let store = Arc::new(FlakyStore::new());
	let broker = broker_over(&store);
	let account = seed_account(&store.inner, "detached@example.com").await;
	let account_id = account.id().expect("Seeded account should have an id.");
	let cancel = CancellationToken::new();
	let expires = unix_now() + 1_800;

	seed_site_token(&store.inner, account_id, 3, TokenStatus::Enabled, expires).await;
	seed_site_token(&store.inner, account_id, 7, TokenStatus::Enabled, expires).await;

	let token = broker.acquire(&cancel, &account).await.expect("Acquisition should succeed.");

	cancel.cancel();
	broker.cleanup().drain().await;

	let mut remaining: Vec<_> = store
		.inner
		.list_for_account(account_id)
		.await
		.expect("Listing account tokens should succeed.")
		.iter()
		.filter_map(Token::id)
		.map(TokenId::get)
		.collect();

	remaining.sort_unstable();

	assert_eq!(token.id().map(TokenId::get), Some(7));
	assert_eq!(remaining, vec![7]);
	assert_eq!(broker.cleanup().stats().removed(), 1);
}
