//! Which players we care about, and when we last reported each one.

pub mod cooldown;
pub mod watchlist;

pub use cooldown::CooldownTracker;
pub use watchlist::WatchListCache;
