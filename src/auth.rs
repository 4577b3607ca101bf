//! Auth-domain identifiers, accounts, and token models.

pub mod account;
pub mod id;
pub mod token;

pub use account::*;
pub use id::*;
pub use token::{kind::*, record::*, secret::*};
