pub mod notification_types;
pub mod order_statuses;
pub mod subscription_statuses;
