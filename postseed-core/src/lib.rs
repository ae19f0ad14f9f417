//! postseed-core: named SQL query registry plus a seed/list workflow
//!
//! Queries live as `*.sql` resources and are loaded once into a
//! [`QueryStore`]. The [`Workflow`] runs them against any [`Database`],
//! normally PostgreSQL through sqlx.

pub mod db;
pub mod error;
pub mod models;
pub mod queries;
pub mod resources;
pub mod workflow;

pub use db::{Database, MockDatabase, Param, PgDatabase};
pub use error::{Error, LoadError, Result};
pub use models::{NewPost, PostId, SeedOutcome, UserId, UserPost};
pub use queries::QueryStore;
pub use resources::{DirResources, EmbeddedResources, MemoryResources, ResourceSet};
pub use workflow::{write_posts, Workflow};
