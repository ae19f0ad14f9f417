//! Seed and list workflow over a [`QueryStore`] and a [`Database`].

use std::io::Write;

use futures::future;
use futures::{Stream, StreamExt};
use tracing::{debug, info, instrument};

use crate::db::{Database, DecodeUserPost, Param};
use crate::error::{Error, Result};
use crate::models::{NewPost, PostId, SeedOutcome, UserId, UserPost, SEED_POST_COUNT};
use crate::queries::QueryStore;

pub const INSERT_USER: &str = "insert_user";
pub const INSERT_POST: &str = "insert_post";
pub const USER_POSTS: &str = "user_posts";
pub const UPSERT_USER: &str = "upsert_user";
pub const UPSERT_POST: &str = "upsert_post";

/// Queries a [`Workflow`] cannot run without.
pub const REQUIRED_QUERIES: [&str; 3] = [INSERT_USER, INSERT_POST, USER_POSTS];

/// Queries used by [`Workflow::seed_idempotent`].
pub const UPSERT_QUERIES: [&str; 2] = [UPSERT_USER, UPSERT_POST];

/// Seeds users with posts and lists them back.
pub struct Workflow<'a, D> {
    queries: &'a QueryStore,
    db: &'a D,
    insert_user: &'a str,
    insert_post: &'a str,
    user_posts: &'a str,
}

impl<'a, D: Database> Workflow<'a, D> {
    /// Resolve the required queries up front so a missing one fails here
    /// instead of at the database.
    pub fn new(queries: &'a QueryStore, db: &'a D) -> Result<Self> {
        queries.validate(&REQUIRED_QUERIES)?;
        Ok(Self {
            queries,
            db,
            insert_user: queries.require(INSERT_USER)?,
            insert_post: queries.require(INSERT_POST)?,
            user_posts: queries.require(USER_POSTS)?,
        })
    }

    /// Insert a user and ten placeholder posts.
    ///
    /// Stops at the first failed insert. Rows inserted before the failure
    /// stay in place.
    #[instrument(skip(self))]
    pub async fn seed(&self, email: &str) -> Result<SeedOutcome> {
        self.seed_with(self.insert_user, self.insert_post, email).await
    }

    /// Like [`Workflow::seed`], but safe to re-run: the user is upserted by
    /// email and posts the user already has (by title) are skipped.
    #[instrument(skip(self))]
    pub async fn seed_idempotent(&self, email: &str) -> Result<SeedOutcome> {
        self.queries.validate(&UPSERT_QUERIES)?;
        let upsert_user = self.queries.require(UPSERT_USER)?;
        let upsert_post = self.queries.require(UPSERT_POST)?;
        self.seed_with(upsert_user, upsert_post, email).await
    }

    async fn seed_with(&self, user_sql: &str, post_sql: &str, email: &str) -> Result<SeedOutcome> {
        let user_id = match self.db.fetch_id(user_sql, &[Param::Text(email)]).await {
            Ok(Some(id)) => UserId(id),
            Ok(None) => return Err(Error::seed("inserting user", sqlx::Error::RowNotFound)),
            Err(source) => return Err(Error::seed("inserting user", source)),
        };
        debug!(%user_id, "inserted user");

        let mut post_ids = Vec::with_capacity(SEED_POST_COUNT);
        let mut skipped = 0;
        for n in 1..=SEED_POST_COUNT {
            let post = NewPost::seeded(n);
            let params = [
                Param::Int(user_id.0),
                Param::Text(&post.title),
                Param::Text(&post.markdown),
            ];
            match self.db.fetch_id(post_sql, &params).await {
                Ok(Some(id)) => {
                    debug!(%user_id, post_id = id, title = %post.title, "inserted post");
                    post_ids.push(PostId(id));
                }
                Ok(None) => {
                    debug!(%user_id, title = %post.title, "post already present");
                    skipped += 1;
                }
                Err(source) => return Err(Error::seed(format!("inserting post #{n}"), source)),
            }
        }

        info!(
            "seeded user {} ({} posts created, {} skipped)",
            user_id,
            post_ids.len(),
            skipped
        );
        Ok(SeedOutcome {
            user_id,
            post_ids,
            skipped,
        })
    }

    /// Stream the posts of `user_id` as `(email, post_id, title)` rows.
    ///
    /// The stream is forward-only and ends after the first error: a failed
    /// query yields [`Error::Query`], an undecodable row [`Error::Scan`].
    pub fn list_posts(&self, user_id: UserId) -> impl Stream<Item = Result<UserPost>> + Send + 'a {
        debug!(%user_id, "listing posts");
        self.db
            .fetch_rows(self.user_posts, &[Param::Int(user_id.0)])
            .map(|row| match row {
                Ok(row) => row
                    .decode_user_post()
                    .map_err(|source| Error::Scan { source }),
                Err(source) => Err(Error::Query { source }),
            })
            .scan(false, |failed, item| {
                if *failed {
                    return future::ready(None);
                }
                *failed = item.is_err();
                future::ready(Some(item))
            })
    }
}

/// Write one `<email> wrote "<title>" (id:<post_id>)` line per row.
///
/// Returns the number of lines written. Stops at the first error.
pub async fn write_posts<S, W>(rows: S, out: &mut W) -> Result<usize>
where
    S: Stream<Item = Result<UserPost>>,
    W: Write,
{
    futures::pin_mut!(rows);
    let mut written = 0;
    while let Some(row) = rows.next().await {
        writeln!(out, "{}", row?)?;
        written += 1;
    }
    out.flush()?;
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{MockDatabase, MockRow, OwnedParam};
    use crate::models::PLACEHOLDER_MARKDOWN;
    use crate::resources::MemoryResources;
    use futures::TryStreamExt;

    fn store() -> QueryStore {
        let resources: MemoryResources = [
            ("sql/insert_user.sql", "INSERT USER"),
            ("sql/insert_post.sql", "INSERT POST"),
            ("sql/user_posts.sql", "USER POSTS"),
            ("sql/upsert_user.sql", "UPSERT USER"),
            ("sql/upsert_post.sql", "UPSERT POST"),
        ]
        .into_iter()
        .collect();
        QueryStore::load(&resources, "sql").unwrap()
    }

    fn row(id: i64, title: &str) -> MockRow {
        MockRow(Ok(UserPost {
            email: "jon@calhoun.io".to_string(),
            post_id: PostId(id),
            title: title.to_string(),
        }))
    }

    #[test]
    fn new_fails_on_missing_query() {
        let resources: MemoryResources = [("sql/insert_user.sql", "INSERT USER")].into_iter().collect();
        let queries = QueryStore::load(&resources, "sql").unwrap();
        let db = MockDatabase::new();

        let err = Workflow::new(&queries, &db).err().unwrap();
        assert!(matches!(err, Error::MissingQuery { ref name } if name == INSERT_POST));
    }

    #[tokio::test]
    async fn seed_creates_user_and_ten_posts() {
        let queries = store();
        let db = MockDatabase::new();
        let workflow = Workflow::new(&queries, &db).unwrap();

        let outcome = workflow.seed("jon@calhoun.io").await.unwrap();

        assert_eq!(outcome.user_id, UserId(1));
        assert_eq!(outcome.post_ids.len(), 10);
        assert_eq!(outcome.skipped, 0);

        let calls = db.calls();
        assert_eq!(calls.len(), 11);
        assert_eq!(calls[0].sql, "INSERT USER");
        assert_eq!(calls[0].params, vec![OwnedParam::Text("jon@calhoun.io".to_string())]);
        for (i, call) in calls[1..].iter().enumerate() {
            assert_eq!(call.sql, "INSERT POST");
            assert_eq!(
                call.params,
                vec![
                    OwnedParam::Int(1),
                    OwnedParam::Text(format!("Awesome Post #{}", i + 1)),
                    OwnedParam::Text(PLACEHOLDER_MARKDOWN.to_string()),
                ]
            );
        }
    }

    #[tokio::test]
    async fn seed_aborts_on_fifth_post_failure() {
        let queries = store();
        let db = MockDatabase::new();
        db.push_id(Some(7));
        for id in 100..104 {
            db.push_id(Some(id));
        }
        db.push_id_error("connection reset");
        let workflow = Workflow::new(&queries, &db).unwrap();

        let err = workflow.seed("jon@calhoun.io").await.unwrap_err();

        assert!(matches!(err, Error::Seed { ref context, .. } if context == "inserting post #5"));
        // user + 5 post attempts, nothing after the failure
        assert_eq!(db.calls().len(), 6);
    }

    #[tokio::test]
    async fn seed_user_failure_stops_before_posts() {
        let queries = store();
        let db = MockDatabase::new();
        db.push_id_error("duplicate key value violates unique constraint");
        let workflow = Workflow::new(&queries, &db).unwrap();

        let err = workflow.seed("jon@calhoun.io").await.unwrap_err();

        assert!(matches!(err, Error::Seed { ref context, .. } if context == "inserting user"));
        assert_eq!(err.to_string(), "inserting user");
        assert_eq!(db.calls().len(), 1);
    }

    #[tokio::test]
    async fn seed_user_without_returned_id_fails() {
        let queries = store();
        let db = MockDatabase::new();
        db.push_id(None);
        let workflow = Workflow::new(&queries, &db).unwrap();

        let err = workflow.seed("jon@calhoun.io").await.unwrap_err();
        assert!(matches!(err, Error::Seed { .. }));
    }

    #[tokio::test]
    async fn seed_idempotent_uses_upserts_and_counts_skips() {
        let queries = store();
        let db = MockDatabase::new();
        db.push_id(Some(3));
        for n in 0..10 {
            db.push_id(if n < 4 { None } else { Some(50 + n) });
        }
        let workflow = Workflow::new(&queries, &db).unwrap();

        let outcome = workflow.seed_idempotent("jon@calhoun.io").await.unwrap();

        assert_eq!(outcome.user_id, UserId(3));
        assert_eq!(outcome.skipped, 4);
        assert_eq!(outcome.post_ids.first(), Some(&PostId(54)));
        let calls = db.calls();
        assert_eq!(calls[0].sql, "UPSERT USER");
        assert!(calls[1..].iter().all(|c| c.sql == "UPSERT POST"));
    }

    #[tokio::test]
    async fn seed_idempotent_requires_upsert_queries() {
        let resources: MemoryResources = [
            ("sql/insert_user.sql", "INSERT USER"),
            ("sql/insert_post.sql", "INSERT POST"),
            ("sql/user_posts.sql", "USER POSTS"),
        ]
        .into_iter()
        .collect();
        let queries = QueryStore::load(&resources, "sql").unwrap();
        let db = MockDatabase::new();
        let workflow = Workflow::new(&queries, &db).unwrap();

        let err = workflow.seed_idempotent("jon@calhoun.io").await.unwrap_err();
        assert!(matches!(err, Error::MissingQuery { .. }));
        assert!(db.calls().is_empty());
    }

    #[tokio::test]
    async fn list_posts_decodes_rows_in_order() {
        let queries = store();
        let db = MockDatabase::new();
        db.push_rows(vec![row(1, "Awesome Post #1"), row(2, "Awesome Post #2")]);
        let workflow = Workflow::new(&queries, &db).unwrap();

        let posts: Vec<UserPost> = workflow.list_posts(UserId(1)).try_collect().await.unwrap();

        assert_eq!(posts.len(), 2);
        assert_eq!(posts[1].title, "Awesome Post #2");
        assert_eq!(db.calls()[0].params, vec![OwnedParam::Int(1)]);
    }

    #[tokio::test]
    async fn list_posts_without_posts_is_empty() {
        let queries = store();
        let db = MockDatabase::new();
        db.push_rows(Vec::new());
        let workflow = Workflow::new(&queries, &db).unwrap();

        let posts: Vec<UserPost> = workflow.list_posts(UserId(9)).try_collect().await.unwrap();
        assert!(posts.is_empty());
    }

    #[tokio::test]
    async fn list_posts_query_failure() {
        let queries = store();
        let db = MockDatabase::new();
        db.push_rows_error("relation \"posts\" does not exist");
        let workflow = Workflow::new(&queries, &db).unwrap();

        let items: Vec<Result<UserPost>> = workflow.list_posts(UserId(1)).collect().await;
        assert_eq!(items.len(), 1);
        assert!(matches!(items[0], Err(Error::Query { .. })));
    }

    #[tokio::test]
    async fn list_posts_stops_after_scan_error() {
        let queries = store();
        let db = MockDatabase::new();
        db.push_rows(vec![
            row(1, "Awesome Post #1"),
            MockRow(Err("mismatched types".to_string())),
            row(3, "Awesome Post #3"),
        ]);
        let workflow = Workflow::new(&queries, &db).unwrap();

        let items: Vec<Result<UserPost>> = workflow.list_posts(UserId(1)).collect().await;

        assert_eq!(items.len(), 2);
        assert!(items[0].is_ok());
        assert!(matches!(items[1], Err(Error::Scan { .. })));
    }

    #[tokio::test]
    async fn write_posts_formats_lines() {
        let queries = store();
        let db = MockDatabase::new();
        db.push_rows(vec![row(11, "Awesome Post #1"), row(12, "Awesome Post #2")]);
        let workflow = Workflow::new(&queries, &db).unwrap();

        let mut out = Vec::new();
        let written = write_posts(workflow.list_posts(UserId(1)), &mut out).await.unwrap();

        assert_eq!(written, 2);
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "jon@calhoun.io wrote \"Awesome Post #1\" (id:11)\n\
             jon@calhoun.io wrote \"Awesome Post #2\" (id:12)\n"
        );
    }

    #[tokio::test]
    async fn write_posts_keeps_lines_before_error() {
        let queries = store();
        let db = MockDatabase::new();
        db.push_rows(vec![row(11, "Awesome Post #1"), MockRow(Err("bad".to_string()))]);
        let workflow = Workflow::new(&queries, &db).unwrap();

        let mut out = Vec::new();
        let err = write_posts(workflow.list_posts(UserId(1)), &mut out).await.unwrap_err();

        assert!(matches!(err, Error::Scan { .. }));
        assert_eq!(err.to_string(), "scan");
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "jon@calhoun.io wrote \"Awesome Post #1\" (id:11)\n"
        );
    }
}
