//! Storage contracts and built-in store implementations for tokens and accounts.

pub mod file;
pub mod ids;
pub mod memory;

mod tables;

pub use file::FileStore;
pub use ids::{IdAllocator, SequentialIds};
pub use memory::MemoryStore;

// self
use crate::{
	_prelude::*,
	auth::{Account, AccountId, Token, TokenId},
};

/// Boxed future returned by every store operation.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Access token persistence contract consumed by the broker.
pub trait TokenStore
where
	Self: Send + Sync,
{
	/// Lists every stored token. Order is unspecified.
	fn list(&self) -> StoreFuture<'_, Vec<Token>>;

	/// Lists every token bound to the account, regardless of role or status. Order is
	/// unspecified.
	fn list_for_account(&self, account: AccountId) -> StoreFuture<'_, Vec<Token>>;

	/// Fetches a token by identifier; [`StoreError::NoTokenFound`] when absent.
	fn get_by_id(&self, id: TokenId) -> StoreFuture<'_, Token>;

	/// Fetches a token by its secret; [`StoreError::NoTokenFound`] when absent.
	fn get_by_access_token<'a>(&'a self, access_token: &'a str) -> StoreFuture<'a, Token>;

	/// Assigns an identifier, persists the token, and returns the stored copy.
	fn create(&self, token: Token) -> StoreFuture<'_, Token>;

	/// Replaces the stored token with the same identifier, stamping `last_modified`.
	fn update(&self, token: Token) -> StoreFuture<'_, Token>;

	/// Removes a token. Removing an absent identifier succeeds.
	fn remove(&self, id: TokenId) -> StoreFuture<'_, ()>;
}

/// Account persistence contract.
pub trait AccountStore
where
	Self: Send + Sync,
{
	/// Fetches an account by identifier; [`StoreError::NoAccountFound`] when absent.
	fn get_account(&self, id: AccountId) -> StoreFuture<'_, Account>;

	/// Fetches an account by email address (case-insensitive).
	fn get_account_by_email<'a>(&'a self, email: &'a str) -> StoreFuture<'a, Account>;

	/// Assigns an identifier, persists the account, and returns the stored copy.
	fn create_account(&self, account: Account) -> StoreFuture<'_, Account>;

	/// Replaces the stored account with the same identifier, stamping `last_modified`.
	fn update_account(&self, account: Account) -> StoreFuture<'_, Account>;

	/// Removes an account. Removing an absent identifier succeeds.
	fn remove_account(&self, id: AccountId) -> StoreFuture<'_, ()>;
}

/// Error type produced by [`TokenStore`] and [`AccountStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Backend could not be read or written.
	#[error("Store unavailable: {message}.")]
	Unavailable {
		/// Human-readable error payload.
		message: String,
	},
	/// Serialization failures surfaced by the backend.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Lookup matched no token.
	#[error("Token does not exist.")]
	NoTokenFound,
	/// Lookup matched no account.
	#[error("Account does not exist.")]
	NoAccountFound,
	/// Identifier allocator could not produce a new identifier.
	#[error("Identifier allocation failed: {message}.")]
	IdAllocation {
		/// Human-readable error payload.
		message: String,
	},
	/// Write would violate a uniqueness constraint.
	#[error("Store conflict: {message}.")]
	Conflict {
		/// Human-readable error payload.
		message: String,
	},
}
impl StoreError {
	/// Returns `true` for lookups that matched nothing.
	pub fn is_not_found(&self) -> bool {
		matches!(self, Self::NoTokenFound | Self::NoAccountFound)
	}
}
