pub mod access;
pub mod messages;
pub mod pool;
pub mod schema;
