//! Simple file-backed store for lightweight deployments and command-line tools.

// std
use std::{
	fs::{self, File},
	io::Write,
	path::{Path, PathBuf},
};
// self
use crate::{
	_prelude::*,
	auth::{Account, AccountId, Token, TokenId},
	store::{
		AccountStore, IdAllocator, SequentialIds, StoreError, StoreFuture, TokenStore,
		tables::{Snapshot, Tables},
	},
};

/// Persists tokens and accounts to a JSON file after each mutation.
#[derive(Clone, Debug)]
pub struct FileStore {
	path: PathBuf,
	inner: Arc<RwLock<Tables>>,
	ids: Arc<dyn IdAllocator>,
}
impl FileStore {
	/// Opens (or creates) a store at the provided path, eagerly loading existing data.
	///
	/// Identifiers continue after the largest one found in the snapshot.
	pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
		let path = path.into();

		Self::ensure_parent_exists(&path)?;

		let tables = Self::load_tables(&path)?;
		let ids = Arc::new(SequentialIds::starting_after(tables.max_id()));

		Ok(Self { path, inner: Arc::new(RwLock::new(tables)), ids })
	}

	/// Opens the store with a caller-provided identifier allocator.
	pub fn open_with_ids(
		path: impl Into<PathBuf>,
		ids: Arc<dyn IdAllocator>,
	) -> Result<Self, StoreError> {
		let path = path.into();

		Self::ensure_parent_exists(&path)?;

		let tables = Self::load_tables(&path)?;

		Ok(Self { path, inner: Arc::new(RwLock::new(tables)), ids })
	}

	/// Location of the JSON snapshot.
	pub fn path(&self) -> &Path {
		&self.path
	}

	fn load_tables(path: &Path) -> Result<Tables, StoreError> {
		if !path.exists() {
			return Ok(Tables::default());
		}

		let metadata = path.metadata().map_err(|e| StoreError::Unavailable {
			message: format!("Failed to inspect {}: {e}", path.display()),
		})?;

		if metadata.len() == 0 {
			return Ok(Tables::default());
		}

		let bytes = fs::read(path).map_err(|e| StoreError::Unavailable {
			message: format!("Failed to read {}: {e}", path.display()),
		})?;
		let snapshot: Snapshot =
			serde_json::from_slice(&bytes).map_err(|e| StoreError::Serialization {
				message: format!("Failed to parse {}: {e}", path.display()),
			})?;

		Tables::from_snapshot(snapshot)
	}

	fn ensure_parent_exists(path: &Path) -> Result<(), StoreError> {
		if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
			fs::create_dir_all(parent).map_err(|e| StoreError::Unavailable {
				message: format!("Failed to create store directory {}: {e}", parent.display()),
			})?;
		}
		Ok(())
	}

	fn persist_locked(&self, contents: &Tables) -> Result<(), StoreError> {
		Self::ensure_parent_exists(&self.path)?;

		let serialized = serde_json::to_vec_pretty(&contents.to_snapshot()).map_err(|e| {
			StoreError::Serialization { message: format!("Failed to serialize store snapshot: {e}") }
		})?;
		let mut tmp_path = self.path.clone();

		tmp_path.set_extension("tmp");

		{
			let mut file = File::create(&tmp_path).map_err(|e| StoreError::Unavailable {
				message: format!("Failed to create {}: {e}", tmp_path.display()),
			})?;

			file.write_all(&serialized).map_err(|e| StoreError::Unavailable {
				message: format!("Failed to write {}: {e}", tmp_path.display()),
			})?;
			file.sync_all().map_err(|e| StoreError::Unavailable {
				message: format!("Failed to sync {}: {e}", tmp_path.display()),
			})?;
		}

		fs::rename(&tmp_path, &self.path).map_err(|e| StoreError::Unavailable {
			message: format!("Failed to replace {}: {e}", self.path.display()),
		})
	}

	/// Applies `mutate` under the write lock and persists the result; the in-memory tables are
	/// left untouched when the mutation fails.
	fn mutate<T>(
		&self,
		mutate: impl FnOnce(&mut Tables) -> Result<T, StoreError>,
	) -> Result<T, StoreError> {
		let mut guard = self.inner.write();
		let mut staged = guard.clone();
		let value = mutate(&mut staged)?;

		self.persist_locked(&staged)?;
		*guard = staged;

		Ok(value)
	}

	fn now() -> i64 {
		OffsetDateTime::now_utc().unix_timestamp()
	}
}
impl TokenStore for FileStore {
	fn list(&self) -> StoreFuture<'_, Vec<Token>> {
		Box::pin(async move { Ok(self.inner.read().tokens()) })
	}

	fn list_for_account(&self, account: AccountId) -> StoreFuture<'_, Vec<Token>> {
		Box::pin(async move { Ok(self.inner.read().tokens_for_account(account)) })
	}

	fn get_by_id(&self, id: TokenId) -> StoreFuture<'_, Token> {
		Box::pin(async move { self.inner.read().token(id) })
	}

	fn get_by_access_token<'a>(&'a self, access_token: &'a str) -> StoreFuture<'a, Token> {
		Box::pin(async move { self.inner.read().token_by_secret(access_token) })
	}

	fn create(&self, token: Token) -> StoreFuture<'_, Token> {
		Box::pin(async move { self.mutate(|tables| tables.insert_token(token, self.ids.as_ref())) })
	}

	fn update(&self, token: Token) -> StoreFuture<'_, Token> {
		Box::pin(async move { self.mutate(|tables| tables.put_token(token, Self::now())) })
	}

	fn remove(&self, id: TokenId) -> StoreFuture<'_, ()> {
		Box::pin(async move {
			if self.inner.read().token(id).is_err() {
				return Ok(());
			}

			self.mutate(|tables| {
				tables.remove_token(id);

				Ok(())
			})
		})
	}
}
impl AccountStore for FileStore {
	fn get_account(&self, id: AccountId) -> StoreFuture<'_, Account> {
		Box::pin(async move { self.inner.read().account(id) })
	}

	fn get_account_by_email<'a>(&'a self, email: &'a str) -> StoreFuture<'a, Account> {
		Box::pin(async move { self.inner.read().account_by_email(email) })
	}

	fn create_account(&self, account: Account) -> StoreFuture<'_, Account> {
		Box::pin(
			async move { self.mutate(|tables| tables.insert_account(account, self.ids.as_ref())) },
		)
	}

	fn update_account(&self, account: Account) -> StoreFuture<'_, Account> {
		Box::pin(async move { self.mutate(|tables| tables.put_account(account, Self::now())) })
	}

	fn remove_account(&self, id: AccountId) -> StoreFuture<'_, ()> {
		Box::pin(async move {
			self.mutate(|tables| {
				tables.remove_account(id);

				Ok(())
			})
		})
	}
}
