pub mod customers;
pub mod notifications;
pub mod orders;
pub mod pieces;
pub mod profiles;
pub mod subscriptions;
