//! Database boundary - connection and the two execution shapes the
//! workflow needs
//!
//! Provides a trait for running registered queries, with:
//! - Real implementation over a sqlx `PgPool`
//! - Mock implementation for testing

use std::sync::Mutex;

use async_trait::async_trait;
use futures::stream::{self, BoxStream};
use futures::StreamExt;
use sqlx::postgres::{PgArguments, PgPoolOptions, PgRow};
use sqlx::query::Query;
use sqlx::{PgPool, Postgres, Row};

use crate::error::{Error, Result};
use crate::models::{PostId, UserPost};

/// One connection for the whole run; the workflow never runs queries
/// concurrently.
const MAX_CONNECTIONS: u32 = 1;

/// Positional query parameter (`$1`, `$2`, ...)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Param<'a> {
    Int(i64),
    Text(&'a str),
}

/// Decode a listing row as `(email, post_id, title)`.
pub trait DecodeUserPost {
    fn decode_user_post(&self) -> std::result::Result<UserPost, sqlx::Error>;
}

impl DecodeUserPost for PgRow {
    fn decode_user_post(&self) -> std::result::Result<UserPost, sqlx::Error> {
        Ok(UserPost {
            email: self.try_get(0)?,
            post_id: PostId(self.try_get(1)?),
            title: self.try_get(2)?,
        })
    }
}

/// Trait for executing registered queries (testable)
#[async_trait]
pub trait Database: Send + Sync {
    type Row: DecodeUserPost + Send;

    /// Run a statement that returns a single id column.
    ///
    /// `Ok(None)` when the statement produced no row.
    async fn fetch_id(&self, sql: &str, params: &[Param<'_>])
        -> std::result::Result<Option<i64>, sqlx::Error>;

    /// Run a query and stream its rows, forward-only.
    fn fetch_rows<'a>(
        &'a self,
        sql: &'a str,
        params: &[Param<'a>],
    ) -> BoxStream<'a, std::result::Result<Self::Row, sqlx::Error>>;
}

fn bind_params<'q>(sql: &'q str, params: &[Param<'q>]) -> Query<'q, Postgres, PgArguments> {
    params
        .iter()
        .fold(sqlx::query(sql), |query, param| match *param {
            Param::Int(value) => query.bind(value),
            Param::Text(value) => query.bind(value),
        })
}

/// Create the PostgreSQL pool backing a run.
///
/// # Errors
///
/// Returns an error if the connection fails.
pub async fn create_pool(database_url: &str) -> std::result::Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(MAX_CONNECTIONS)
        .connect(database_url)
        .await
}

/// PostgreSQL-backed [`Database`]
#[derive(Debug, Clone)]
pub struct PgDatabase {
    pool: PgPool,
}

impl PgDatabase {
    /// Connect to `database_url`.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = create_pool(database_url)
            .await
            .map_err(|source| Error::Connect { source })?;
        tracing::debug!("database connection established");
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl Database for PgDatabase {
    type Row = PgRow;

    async fn fetch_id(
        &self,
        sql: &str,
        params: &[Param<'_>],
    ) -> std::result::Result<Option<i64>, sqlx::Error> {
        let row = bind_params(sql, params).fetch_optional(&self.pool).await?;
        row.map(|row| row.try_get::<i64, _>(0)).transpose()
    }

    fn fetch_rows<'a>(
        &'a self,
        sql: &'a str,
        params: &[Param<'a>],
    ) -> BoxStream<'a, std::result::Result<PgRow, sqlx::Error>> {
        bind_params(sql, params).fetch(&self.pool)
    }
}

/// A statement the mock received
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub sql: String,
    pub params: Vec<OwnedParam>,
}

/// Owned copy of a [`Param`], for recording calls
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OwnedParam {
    Int(i64),
    Text(String),
}

impl From<&Param<'_>> for OwnedParam {
    fn from(param: &Param<'_>) -> Self {
        match *param {
            Param::Int(value) => Self::Int(value),
            Param::Text(value) => Self::Text(value.to_string()),
        }
    }
}

/// Row handed out by [`MockDatabase`]; `Err` rows fail to decode.
#[derive(Debug, Clone)]
pub struct MockRow(pub std::result::Result<UserPost, String>);

impl DecodeUserPost for MockRow {
    fn decode_user_post(&self) -> std::result::Result<UserPost, sqlx::Error> {
        self.0.clone().map_err(|msg| sqlx::Error::Decode(msg.into()))
    }
}

/// Scripted responses for one statement
#[derive(Debug)]
enum Response {
    Id(std::result::Result<Option<i64>, String>),
    Rows(std::result::Result<Vec<MockRow>, String>),
}

/// Mock database for testing
///
/// Responses are consumed in order; an unscripted `fetch_id` returns the
/// next id from a counter starting at 1 and an unscripted `fetch_rows`
/// returns no rows.
#[derive(Debug, Default)]
pub struct MockDatabase {
    responses: Mutex<Vec<Response>>,
    calls: Mutex<Vec<Call>>,
    next_id: Mutex<i64>,
}

impl MockDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the result of the next `fetch_id`.
    pub fn push_id(&self, id: Option<i64>) {
        self.push(Response::Id(Ok(id)));
    }

    /// Queue a failure for the next `fetch_id`.
    pub fn push_id_error(&self, msg: impl Into<String>) {
        self.push(Response::Id(Err(msg.into())));
    }

    /// Queue the rows of the next `fetch_rows`.
    pub fn push_rows(&self, rows: Vec<MockRow>) {
        self.push(Response::Rows(Ok(rows)));
    }

    /// Queue an execution failure for the next `fetch_rows`.
    pub fn push_rows_error(&self, msg: impl Into<String>) {
        self.push(Response::Rows(Err(msg.into())));
    }

    /// Every statement executed so far, in order.
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn push(&self, response: Response) {
        self.responses.lock().unwrap().push(response);
    }

    fn record(&self, sql: &str, params: &[Param<'_>]) {
        self.calls.lock().unwrap().push(Call {
            sql: sql.to_string(),
            params: params.iter().map(OwnedParam::from).collect(),
        });
    }

    fn next_response(&self) -> Option<Response> {
        let mut responses = self.responses.lock().unwrap();
        (!responses.is_empty()).then(|| responses.remove(0))
    }
}

#[async_trait]
impl Database for MockDatabase {
    type Row = MockRow;

    async fn fetch_id(
        &self,
        sql: &str,
        params: &[Param<'_>],
    ) -> std::result::Result<Option<i64>, sqlx::Error> {
        self.record(sql, params);
        match self.next_response() {
            Some(Response::Id(Ok(id))) => Ok(id),
            Some(Response::Id(Err(msg))) => Err(sqlx::Error::Protocol(msg)),
            Some(Response::Rows(_)) => Err(sqlx::Error::Protocol(
                "mock: rows were scripted but fetch_id was called".to_string(),
            )),
            None => {
                let mut next_id = self.next_id.lock().unwrap();
                *next_id += 1;
                Ok(Some(*next_id))
            }
        }
    }

    fn fetch_rows<'a>(
        &'a self,
        sql: &'a str,
        params: &[Param<'a>],
    ) -> BoxStream<'a, std::result::Result<MockRow, sqlx::Error>> {
        self.record(sql, params);
        match self.next_response() {
            Some(Response::Rows(Ok(rows))) => stream::iter(rows.into_iter().map(Ok)).boxed(),
            Some(Response::Rows(Err(msg))) => {
                stream::once(async move { Err::<MockRow, _>(sqlx::Error::Protocol(msg)) }).boxed()
            }
            Some(Response::Id(_)) => stream::once(async {
                Err::<MockRow, _>(sqlx::Error::Protocol(
                    "mock: an id was scripted but fetch_rows was called".to_string(),
                ))
            })
            .boxed(),
            None => stream::empty().boxed(),
        }
    }
}
