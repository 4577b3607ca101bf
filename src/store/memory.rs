//! Thread-safe in-memory store for local development and tests.

// self
use crate::{
	_prelude::*,
	auth::{Account, AccountId, Token, TokenId},
	store::{
		AccountStore, IdAllocator, SequentialIds, StoreFuture, TokenStore, tables::Tables,
	},
};

type SharedTables = Arc<RwLock<Tables>>;

/// Thread-safe storage backend that keeps tokens and accounts in-process.
#[derive(Clone, Debug)]
pub struct MemoryStore {
	tables: SharedTables,
	ids: Arc<dyn IdAllocator>,
}
impl MemoryStore {
	/// Creates an empty store that draws identifiers from `ids`.
	pub fn with_ids(ids: Arc<dyn IdAllocator>) -> Self {
		Self { tables: Default::default(), ids }
	}

	/// Number of stored tokens.
	pub fn token_count(&self) -> usize {
		self.tables.read().token_count()
	}

	fn now() -> i64 {
		OffsetDateTime::now_utc().unix_timestamp()
	}
}
impl Default for MemoryStore {
	fn default() -> Self {
		Self::with_ids(Arc::new(SequentialIds::default()))
	}
}
impl TokenStore for MemoryStore {
	fn list(&self) -> StoreFuture<'_, Vec<Token>> {
		let tables = self.tables.clone();

		Box::pin(async move { Ok(tables.read().tokens()) })
	}

	fn list_for_account(&self, account: AccountId) -> StoreFuture<'_, Vec<Token>> {
		let tables = self.tables.clone();

		Box::pin(async move { Ok(tables.read().tokens_for_account(account)) })
	}

	fn get_by_id(&self, id: TokenId) -> StoreFuture<'_, Token> {
		let tables = self.tables.clone();

		Box::pin(async move { tables.read().token(id) })
	}

	fn get_by_access_token<'a>(&'a self, access_token: &'a str) -> StoreFuture<'a, Token> {
		let tables = self.tables.clone();

		Box::pin(async move { tables.read().token_by_secret(access_token) })
	}

	fn create(&self, token: Token) -> StoreFuture<'_, Token> {
		let tables = self.tables.clone();
		let ids = self.ids.clone();

		Box::pin(async move { tables.write().insert_token(token, ids.as_ref()) })
	}

	fn update(&self, token: Token) -> StoreFuture<'_, Token> {
		let tables = self.tables.clone();

		Box::pin(async move { tables.write().put_token(token, Self::now()) })
	}

	fn remove(&self, id: TokenId) -> StoreFuture<'_, ()> {
		let tables = self.tables.clone();

		Box::pin(async move {
			tables.write().remove_token(id);

			Ok(())
		})
	}
}
impl AccountStore for MemoryStore {
	fn get_account(&self, id: AccountId) -> StoreFuture<'_, Account> {
		let tables = self.tables.clone();

		Box::pin(async move { tables.read().account(id) })
	}

	fn get_account_by_email<'a>(&'a self, email: &'a str) -> StoreFuture<'a, Account> {
		let tables = self.tables.clone();

		Box::pin(async move { tables.read().account_by_email(email) })
	}

	fn create_account(&self, account: Account) -> StoreFuture<'_, Account> {
		let tables = self.tables.clone();
		let ids = self.ids.clone();

		Box::pin(async move { tables.write().insert_account(account, ids.as_ref()) })
	}

	fn update_account(&self, account: Account) -> StoreFuture<'_, Account> {
		let tables = self.tables.clone();

		Box::pin(async move { tables.write().put_account(account, Self::now()) })
	}

	fn remove_account(&self, id: AccountId) -> StoreFuture<'_, ()> {
		let tables = self.tables.clone();

		Box::pin(async move {
			tables.write().remove_account(id);

			Ok(())
		})
	}
}
