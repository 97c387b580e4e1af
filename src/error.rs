//! Error types for registry and agent operations.

use std::fmt;

use thiserror::Error;

/// Result alias used throughout the library.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// Listing the registry (or agents) failed: the command exited non-zero.
    #[error("`{command}` failed with exit code {code}: {stderr}")]
    Query {
        command: String,
        code: i32,
        stderr: String,
    },

    /// Adding or removing a repository failed.
    #[error("`{command}` failed with exit code {code}: {stderr}")]
    Mutation {
        command: String,
        code: i32,
        stderr: String,
    },

    /// The external program could not be started at all.
    #[error("failed to spawn `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// Output of a listing command was not the JSON we expect.
    #[error("malformed output from `{command}`: {message}")]
    Parse { command: String, message: String },

    /// The external program could not be located or configured.
    #[error("configuration error: {0}")]
    Config(String),

    /// Setup failed; the registrations that did succeed were already rolled back.
    #[error("repository registration failed: {source}")]
    Registration {
        #[source]
        source: Box<Error>,
        rollback: ReleaseFailures,
    },

    /// One or more removals failed while releasing a registration set.
    #[error("failed to remove {0}")]
    Release(ReleaseFailures),

    /// One or more agents could not be cleaned.
    #[error("framework cleanup failed on {0} agent(s)")]
    AgentCleanup(usize),
}

impl Error {
    pub fn is_query(&self) -> bool {
        matches!(self, Error::Query { .. } | Error::Parse { .. })
    }

    pub fn is_mutation(&self) -> bool {
        matches!(self, Error::Mutation { .. })
    }
}

/// Per-name removal failures collected during a release.
#[derive(Debug, Default)]
pub struct ReleaseFailures(pub Vec<(String, Error)>);

impl ReleaseFailures {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(name, _)| name.as_str())
    }
}

impl fmt::Display for ReleaseFailures {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = self.names().collect::<Vec<_>>();
        if names.is_empty() {
            return f.write_str("no repositories");
        }
        write!(f, "repositories {}", names.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registration_error_mentions_setup_failure() {
        let err = Error::Registration {
            source: Box::new(Error::Mutation {
                command: "dcos package repo add".into(),
                code: 1,
                stderr: "boom".into(),
            }),
            rollback: ReleaseFailures::default(),
        };
        let text = err.to_string();
        assert!(text.starts_with("repository registration failed"));
        assert!(text.contains("boom"));
    }

    #[test]
    fn release_error_lists_names() {
        let failures = ReleaseFailures(vec![
            ("testpkg-aaaaaaaa".into(), Error::Config("x".into())),
            ("testpkg-bbbbbbbb".into(), Error::Config("y".into())),
        ]);
        assert_eq!(
            Error::Release(failures).to_string(),
            "failed to remove repositories testpkg-aaaaaaaa, testpkg-bbbbbbbb"
        );
    }

    #[test]
    fn classifies_query_and_mutation() {
        let parse = Error::Parse {
            command: "dcos package repo list --json".into(),
            message: "eof".into(),
        };
        assert!(parse.is_query());
        assert!(!parse.is_mutation());
    }
}
