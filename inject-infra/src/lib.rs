pub mod cache;
pub mod security;
pub mod storage;
pub mod store;

pub use cache::{Cache, MemoryCache, RedisCache};
pub use security::{Acquire, CooldownRateLimiter, IpAllowList, IpAllowListError, RateLimiter};
pub use storage::{LocalScriptStorage, ScriptStorage};
pub use store::{JsonFileOptionStore, MemoryOptionStore, NetworkOptionStore};
