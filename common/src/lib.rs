pub mod message;
pub mod order;
pub mod phone;
pub mod schedule;
pub mod support;
