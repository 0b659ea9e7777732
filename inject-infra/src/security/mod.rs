pub mod ip_allow;
pub mod rate_limit;

pub use ip_allow::{IpAllowList, IpAllowListError};
pub use rate_limit::{Acquire, CooldownRateLimiter, RateLimiter};
