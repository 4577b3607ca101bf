//! Keyed token/account tables shared by the in-process store backends.

// self
use crate::{
	_prelude::*,
	auth::{Account, AccountId, Token, TokenId},
	store::{IdAllocator, StoreError},
};

/// Serialized form of [`Tables`] written by the file store.
#[derive(Debug, Default, Serialize, Deserialize)]
pub(crate) struct Snapshot {
	#[serde(default)]
	accounts: Vec<Account>,
	#[serde(default)]
	tokens: Vec<Token>,
}

#[derive(Clone, Debug, Default)]
pub(crate) struct Tables {
	accounts: BTreeMap<AccountId, Account>,
	tokens: BTreeMap<TokenId, Token>,
}
impl Tables {
	pub(crate) fn from_snapshot(snapshot: Snapshot) -> Result<Self, StoreError> {
		let mut tables = Self::default();

		for account in snapshot.accounts {
			let id = account.id().ok_or_else(|| StoreError::Serialization {
				message: "snapshot contains an account without an id".into(),
			})?;

			tables.accounts.insert(id, account);
		}
		for token in snapshot.tokens {
			let id = token.id().ok_or_else(|| StoreError::Serialization {
				message: "snapshot contains a token without an id".into(),
			})?;

			tables.tokens.insert(id, token);
		}

		Ok(tables)
	}

	pub(crate) fn to_snapshot(&self) -> Snapshot {
		Snapshot {
			accounts: self.accounts.values().cloned().collect(),
			tokens: self.tokens.values().cloned().collect(),
		}
	}

	/// Largest identifier in either table, used to seed allocators after a reload.
	pub(crate) fn max_id(&self) -> i64 {
		let account = self.accounts.keys().next_back().map_or(0, |id| id.get());
		let token = self.tokens.keys().next_back().map_or(0, |id| id.get());

		account.max(token)
	}

	pub(crate) fn token_count(&self) -> usize {
		self.tokens.len()
	}

	pub(crate) fn tokens(&self) -> Vec<Token> {
		self.tokens.values().cloned().collect()
	}

	pub(crate) fn tokens_for_account(&self, account: AccountId) -> Vec<Token> {
		self.tokens.values().filter(|t| t.account_id() == Some(account)).cloned().collect()
	}

	pub(crate) fn token(&self, id: TokenId) -> Result<Token, StoreError> {
		self.tokens.get(&id).cloned().ok_or(StoreError::NoTokenFound)
	}

	pub(crate) fn token_by_secret(&self, access_token: &str) -> Result<Token, StoreError> {
		self.tokens
			.values()
			.find(|t| t.access_token().expose() == access_token)
			.cloned()
			.ok_or(StoreError::NoTokenFound)
	}

	pub(crate) fn insert_token(
		&mut self,
		mut token: Token,
		ids: &dyn IdAllocator,
	) -> Result<Token, StoreError> {
		if let Some(id) = token.id() {
			return Err(StoreError::Conflict { message: format!("token already stored as {id}") });
		}

		self.ensure_unique_secret(&token, None)?;

		let id = Self::allocate(ids, TokenId::new, |id| self.tokens.contains_key(id))?;

		token
			.assign_id(id)
			.map_err(|e| StoreError::Conflict { message: e.to_string() })?;
		self.tokens.insert(id, token.clone());

		Ok(token)
	}

	pub(crate) fn put_token(&mut self, mut token: Token, now: i64) -> Result<Token, StoreError> {
		let id = token.id().ok_or_else(|| StoreError::Conflict {
			message: "cannot update a token that was never stored".into(),
		})?;

		self.ensure_unique_secret(&token, Some(id))?;
		token.touch(now);
		self.tokens.insert(id, token.clone());

		Ok(token)
	}

	pub(crate) fn remove_token(&mut self, id: TokenId) -> bool {
		self.tokens.remove(&id).is_some()
	}

	pub(crate) fn account(&self, id: AccountId) -> Result<Account, StoreError> {
		self.accounts.get(&id).cloned().ok_or(StoreError::NoAccountFound)
	}

	pub(crate) fn account_by_email(&self, email: &str) -> Result<Account, StoreError> {
		let needle = email.trim().to_lowercase();

		self.accounts
			.values()
			.find(|a| a.email() == needle)
			.cloned()
			.ok_or(StoreError::NoAccountFound)
	}

	pub(crate) fn insert_account(
		&mut self,
		mut account: Account,
		ids: &dyn IdAllocator,
	) -> Result<Account, StoreError> {
		if let Some(id) = account.id() {
			return Err(StoreError::Conflict {
				message: format!("account already stored as {id}"),
			});
		}
		if self.accounts.values().any(|a| a.email() == account.email()) {
			return Err(StoreError::Conflict {
				message: format!("email {} is already registered", account.email()),
			});
		}

		let id = Self::allocate(ids, AccountId::new, |id| self.accounts.contains_key(id))?;

		account
			.assign_id(id)
			.map_err(|e| StoreError::Conflict { message: e.to_string() })?;
		self.accounts.insert(id, account.clone());

		Ok(account)
	}

	pub(crate) fn put_account(
		&mut self,
		mut account: Account,
		now: i64,
	) -> Result<Account, StoreError> {
		let id = account.id().ok_or_else(|| StoreError::Conflict {
			message: "cannot update an account that was never stored".into(),
		})?;

		account.touch(now);
		self.accounts.insert(id, account.clone());

		Ok(account)
	}

	pub(crate) fn remove_account(&mut self, id: AccountId) -> bool {
		self.accounts.remove(&id).is_some()
	}

	/// Draws identifiers until one is free; ids written through `put_*` never reach the
	/// allocator.
	fn allocate<Id, E>(
		ids: &dyn IdAllocator,
		make: impl Fn(i64) -> Result<Id, E>,
		taken: impl Fn(&Id) -> bool,
	) -> Result<Id, StoreError>
	where
		E: Display,
	{
		loop {
			let id = make(ids.next_id()?)
				.map_err(|e| StoreError::IdAllocation { message: e.to_string() })?;

			if !taken(&id) {
				return Ok(id);
			}
		}
	}

	fn ensure_unique_secret(&self, token: &Token, owner: Option<TokenId>) -> Result<(), StoreError> {
		let clash = self.tokens.iter().any(|(id, existing)| {
			Some(*id) != owner && existing.access_token() == token.access_token()
		});

		if clash {
			return Err(StoreError::Conflict { message: "access token value already in use".into() });
		}

		Ok(())
	}
}
