pub mod bidding;
pub mod notifications;
pub mod sweeper;
