// ============================
// crates/backend-lib/src/metrics.rs
// ============================
//! Central place for metric keys
pub const SESSION_ISSUED: &str = "session.issued";
pub const SESSION_ROTATED: &str = "session.rotated";
pub const SESSION_REVOKED: &str = "session.revoked";
pub const QUOTA_DENIED: &str = "quota.denied";
pub const QUOTA_INDETERMINATE: &str = "quota.indeterminate";
pub const REWARD_GRANTED: &str = "reward.granted";
pub const SUBSCRIPTION_DEACTIVATED: &str = "subscription.deactivated";
