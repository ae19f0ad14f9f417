//! Structured error types for postseed-core.
//!
//! Uses `thiserror` so the binary can attach its own context with `anyhow`
//! while library callers still match on the failing step. Messages name only
//! their own step; the cause is reachable through `source()`, so a `{:#}`
//! report prints each level once.

use std::io;
use thiserror::Error;

/// Failure while building a [`crate::QueryStore`].
#[derive(Error, Debug)]
pub enum LoadError {
    /// Resources under the directory could not be enumerated
    #[error("listing queries in {dir:?}")]
    List {
        dir: String,
        #[source]
        source: io::Error,
    },

    /// A matched query resource could not be read
    #[error("reading query {name}")]
    Read {
        name: String,
        #[source]
        source: io::Error,
    },

    /// Two resources resolved to the same query name
    #[error("duplicate query name '{name}' ({path})")]
    Duplicate { name: String, path: String },
}

/// Main error type for postseed-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Query registry could not be built
    #[error("loading queries")]
    Load(#[from] LoadError),

    /// Establishing the database session failed
    #[error("connecting to db")]
    Connect {
        #[source]
        source: sqlx::Error,
    },

    /// An insert failed while seeding
    #[error("{context}")]
    Seed {
        context: String,
        #[source]
        source: sqlx::Error,
    },

    /// The listing query could not be executed
    #[error("querying posts")]
    Query {
        #[source]
        source: sqlx::Error,
    },

    /// A result row could not be decoded
    #[error("scan")]
    Scan {
        #[source]
        source: sqlx::Error,
    },

    /// A query name was used that the registry does not hold
    #[error("query '{name}' is not registered")]
    MissingQuery { name: String },

    /// Writing output failed
    #[error("I/O error")]
    Io {
        #[from]
        source: io::Error,
    },
}

/// Result type alias for postseed-core operations
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create a seed error with the step that failed
    pub fn seed(context: impl Into<String>, source: sqlx::Error) -> Self {
        Self::Seed {
            context: context.into(),
            source,
        }
    }

    /// Create a missing query error
    pub fn missing_query(name: impl Into<String>) -> Self {
        Self::MissingQuery { name: name.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as StdError;

    #[test]
    fn test_error_display() {
        let err = Error::missing_query("user_post");
        assert_eq!(err.to_string(), "query 'user_post' is not registered");

        let err = Error::seed("inserting post #5", sqlx::Error::RowNotFound);
        assert_eq!(err.to_string(), "inserting post #5");
        assert!(err.source().is_some());
    }

    #[test]
    fn test_load_error_conversion() {
        let load = LoadError::Read {
            name: "sql/insert_user.sql".to_string(),
            source: io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        };
        let err: Error = load.into();

        assert!(matches!(err, Error::Load(LoadError::Read { .. })));
        assert_eq!(err.to_string(), "loading queries");
        let read = err.source().unwrap();
        assert_eq!(read.to_string(), "reading query sql/insert_user.sql");
        assert_eq!(read.source().unwrap().to_string(), "denied");
    }

    /// Every message in the chain, outermost first.
    fn chain(err: &(dyn StdError + 'static)) -> Vec<String> {
        let mut messages = vec![err.to_string()];
        let mut next = err.source();
        while let Some(cause) = next {
            messages.push(cause.to_string());
            next = cause.source();
        }
        messages
    }

    #[test]
    fn test_chain_has_no_repeated_messages() {
        let io_cause = || io::Error::new(io::ErrorKind::PermissionDenied, "denied");
        let errors = [
            Error::from(LoadError::List {
                dir: "sql".to_string(),
                source: io_cause(),
            }),
            Error::from(LoadError::Read {
                name: "sql/a.sql".to_string(),
                source: io_cause(),
            }),
            Error::Connect {
                source: sqlx::Error::PoolTimedOut,
            },
            Error::seed("inserting user", sqlx::Error::RowNotFound),
            Error::Query {
                source: sqlx::Error::RowNotFound,
            },
            Error::Scan {
                source: sqlx::Error::ColumnNotFound("email".to_string()),
            },
            Error::from(io_cause()),
        ];

        for err in &errors {
            let messages = chain(err);
            for pair in messages.windows(2) {
                assert!(
                    !pair[0].contains(&pair[1]),
                    "{:?} repeats its cause {:?}",
                    pair[0],
                    pair[1]
                );
            }
        }
    }
}
