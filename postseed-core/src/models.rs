//! Domain records for users and posts.

use std::fmt;

/// Database-assigned user identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UserId(pub i64);

/// Database-assigned post identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PostId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for PostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A post about to be inserted for a user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPost {
    pub title: String,
    pub markdown: String,
}

/// Body every seeded post starts with.
pub const PLACEHOLDER_MARKDOWN: &str = "#WIP\n\nTODO: Write this post!";

/// Number of posts created for a seeded user.
pub const SEED_POST_COUNT: usize = 10;

impl NewPost {
    /// The `n`th seeded post (1-based).
    pub fn seeded(n: usize) -> Self {
        Self {
            title: format!("Awesome Post #{n}"),
            markdown: PLACEHOLDER_MARKDOWN.to_string(),
        }
    }
}

/// One row of the user posts listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserPost {
    pub email: String,
    pub post_id: PostId,
    pub title: String,
}

impl fmt::Display for UserPost {
    /// `<email> wrote "<title>" (id:<post_id>)`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} wrote {:?} (id:{})", self.email, self.title, self.post_id)
    }
}

/// Result of a seeding run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedOutcome {
    pub user_id: UserId,
    /// Posts inserted by this run, in insertion order
    pub post_ids: Vec<PostId>,
    /// Posts that already existed (idempotent seeding only)
    pub skipped: usize,
}
