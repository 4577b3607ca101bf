//! Access token record, secret, and classification types.

pub mod kind;
pub mod record;
pub mod secret;
