pub mod db;
pub mod memory;
pub mod redis_store;

pub use db::DbAdapter;
pub use memory::{MemoryCache, MemoryDb, MemorySessionStore};
pub use redis_store::RedisAdapter;
