//! Issues (or reuses) the site token for an account kept in a JSON file store and prints the
//! client-facing payload.
//!
//! Usage: `cargo run --example site_token -- [store.json] [email]`

// std
use std::{env, sync::Arc};
// crates.io
use color_eyre::Result;
use time::OffsetDateTime;
use tokio_util::sync::CancellationToken;
// self
use site_token_broker::{
	auth::Account,
	broker::{SiteTokenBroker, SiteTokenResponse},
	config::BrokerConfig,
	store::{AccountStore, FileStore, TokenStore},
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let mut args = env::args().skip(1);
	let path = args.next().unwrap_or_else(|| "target/site-token-demo.json".into());
	let email = args.next().unwrap_or_else(|| "demo@example.com".into());
	let store = Arc::new(FileStore::open(&path)?);
	let account = match store.get_account_by_email(&email).await {
		Ok(account) => account,
		Err(e) if e.is_not_found() => {
			let username = email.split('@').next().unwrap_or("demo");
			let mut account = store.create_account(Account::new(&email, username)?).await?;

			account.enable(OffsetDateTime::now_utc().unix_timestamp())?;
			store.update_account(account).await?
		},
		Err(e) => return Err(e.into()),
	};
	let token_store: Arc<dyn TokenStore> = store.clone();
	let broker = SiteTokenBroker::with_config(token_store, BrokerConfig::default())?;
	let token = broker.acquire(&CancellationToken::new(), &account).await?;

	println!("{}", serde_json::to_string_pretty(&SiteTokenResponse::from(&token))?);

	broker.cleanup().drain().await;
	println!(
		"Store {} holds {} token(s); cleanup removed {}.",
		store.path().display(),
		store.list().await?.len(),
		broker.cleanup().stats().removed()
	);

	Ok(())
}
