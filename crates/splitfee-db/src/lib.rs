//! Splitfee DB - Database abstractions
//!
//! SQLx-based persistence for plans, subscriptions, commission snapshots
//! and payouts. Services depend on the repository traits in [`repo`]; the
//! PostgreSQL implementations live in [`pg`].
//!
//! # Example
//!
//! ```rust,ignore
//! use splitfee_db::{create_pool, Repositories};
//!
//! let pool = create_pool("postgres://localhost/splitfee").await?;
//! let repos = Repositories::new(pool);
//!
//! let plans = repos.plans.list_all().await?;
//! ```

pub mod error;
pub mod models;
pub mod pg;
pub mod pool;
pub mod repo;

pub use error::{DbError, DbResult};
pub use models::*;
pub use pg::Repositories;
pub use pool::{create_pool, DbPool, MIGRATOR};
pub use repo::*;
