//! API Module
//!
//! HTTP handlers and routing over the query core.
//!
//! # Endpoints
//! - `POST /animals/page` - Keyset-paginated rows
//! - `POST /animals/count` - Matching row count
//! - `POST|PATCH|DELETE /animals` - Mutations, each followed by a cache invalidation
//! - `POST /metrics/top-breeds` - Cached breed ranking
//! - `POST /metrics/age-histogram` - Cached age histogram
//! - `POST /cache/invalidate` - Manual invalidation
//! - `GET /stats` - Result cache statistics
//! - `GET /health` - Health check endpoint

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
