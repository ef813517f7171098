pub mod error;
pub mod hub;
pub mod link;
