pub mod enums;
pub mod webhook;
