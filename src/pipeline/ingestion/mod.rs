// Pipeline ingestion: registry pagination and rate limiting

pub mod fetcher;
pub mod rate_limiter;

pub use fetcher::{FetchOutcome, Interrupt, PaginatedFetcher};
pub use rate_limiter::RateLimiter;
