//! sea-orm entities for the auth service tables.

pub mod ip_bans;
pub mod login_codes;
pub mod users;
