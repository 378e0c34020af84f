pub mod memory;
pub mod ratelimit;
pub mod redis_backend;
pub mod session;
pub mod state_store;

pub use memory::InMemoryStateStore;
pub use ratelimit::RateLimitStore;
pub use redis_backend::RedisStateStore;
pub use session::{SessionData, SessionStore};
pub use state_store::{BucketState, StateStore, StoreError};
