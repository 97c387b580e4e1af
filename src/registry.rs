//! Typed view of the cluster package-repository registry.
//!
//! [`RegistryClient`] is the seam between the registrar and whatever actually
//! owns the registry. [`crate::dcos::DcosCli`] drives the real CLI; with the
//! `testkit` feature, `memory::MemoryRegistry` keeps everything in-process.

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// One entry of the registry's ordered resolution list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
    pub name: String,
    pub uri: String,
}

/// Shape of `package repo list --json`.
#[derive(Debug, Deserialize)]
pub(crate) struct RepositoryListing {
    pub repositories: Vec<Repository>,
}

pub trait RegistryClient {
    /// Current registry contents, highest precedence first.
    fn list_repositories(&self) -> Result<Vec<Repository>>;

    /// Insert `name -> uri` at priority position `index`.
    fn add_repository(&self, name: &str, uri: &str, index: usize) -> Result<()>;

    fn remove_repository(&self, name: &str) -> Result<()>;
}

impl<T: RegistryClient + ?Sized> RegistryClient for &T {
    fn list_repositories(&self) -> Result<Vec<Repository>> {
        (**self).list_repositories()
    }

    fn add_repository(&self, name: &str, uri: &str, index: usize) -> Result<()> {
        (**self).add_repository(name, uri, index)
    }

    fn remove_repository(&self, name: &str) -> Result<()> {
        (**self).remove_repository(name)
    }
}

#[cfg(any(test, feature = "testkit"))]
pub mod memory {
    //! In-process registry with failure injection.
    //!
    //! Enabled by the `testkit` feature for suites that exercise code built on
    //! [`RegistryClient`] without a cluster.

    use std::collections::HashSet;
    use std::sync::{Mutex, MutexGuard};

    use super::{RegistryClient, Repository};
    use crate::error::{Error, Result};

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum Call {
        List,
        Add {
            name: String,
            uri: String,
            index: usize,
        },
        Remove {
            name: String,
        },
    }

    #[derive(Default)]
    struct State {
        repositories: Vec<Repository>,
        calls: Vec<Call>,
        fail_list: bool,
        fail_add_uris: HashSet<String>,
        fail_remove_names: HashSet<String>,
        fail_remove_uris: HashSet<String>,
    }

    #[derive(Default)]
    pub struct MemoryRegistry {
        state: Mutex<State>,
    }

    impl MemoryRegistry {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_repositories<I, N, U>(entries: I) -> Self
        where
            I: IntoIterator<Item = (N, U)>,
            N: Into<String>,
            U: Into<String>,
        {
            let registry = Self::new();
            registry.lock().repositories = entries
                .into_iter()
                .map(|(name, uri)| Repository {
                    name: name.into(),
                    uri: uri.into(),
                })
                .collect();
            registry
        }

        /// Make every listing fail as if the CLI printed garbage.
        pub fn fail_list(&self) {
            self.lock().fail_list = true;
        }

        pub fn fail_add_for(&self, uri: impl Into<String>) {
            self.lock().fail_add_uris.insert(uri.into());
        }

        pub fn fail_remove_for(&self, name: impl Into<String>) {
            self.lock().fail_remove_names.insert(name.into());
        }

        /// Fail removal of whichever entry points at `uri`, whatever its name.
        pub fn fail_remove_for_uri(&self, uri: impl Into<String>) {
            self.lock().fail_remove_uris.insert(uri.into());
        }

        pub fn clear_failures(&self) {
            let mut state = self.lock();
            state.fail_list = false;
            state.fail_add_uris.clear();
            state.fail_remove_names.clear();
            state.fail_remove_uris.clear();
        }

        pub fn repositories(&self) -> Vec<Repository> {
            self.lock().repositories.clone()
        }

        pub fn calls(&self) -> Vec<Call> {
            self.lock().calls.clone()
        }

        /// Number of add/remove calls issued, successful or not.
        pub fn mutation_count(&self) -> usize {
            self.lock()
                .calls
                .iter()
                .filter(|call| !matches!(call, Call::List))
                .count()
        }

        fn lock(&self) -> MutexGuard<'_, State> {
            // A panicking test workload must not poison cleanup.
            self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
        }
    }

    impl RegistryClient for MemoryRegistry {
        fn list_repositories(&self) -> Result<Vec<Repository>> {
            let mut state = self.lock();
            state.calls.push(Call::List);
            if state.fail_list {
                return Err(Error::Parse {
                    command: "package repo list --json".into(),
                    message: "injected listing failure".into(),
                });
            }
            Ok(state.repositories.clone())
        }

        fn add_repository(&self, name: &str, uri: &str, index: usize) -> Result<()> {
            let mut state = self.lock();
            state.calls.push(Call::Add {
                name: name.to_string(),
                uri: uri.to_string(),
                index,
            });
            if state.fail_add_uris.contains(uri) {
                return Err(mutation_error("add", name, "injected add failure"));
            }
            if state.repositories.iter().any(|repo| repo.name == name) {
                return Err(mutation_error("add", name, "repository name already exists"));
            }
            let at = index.min(state.repositories.len());
            state.repositories.insert(
                at,
                Repository {
                    name: name.to_string(),
                    uri: uri.to_string(),
                },
            );
            Ok(())
        }

        fn remove_repository(&self, name: &str) -> Result<()> {
            let mut state = self.lock();
            state.calls.push(Call::Remove {
                name: name.to_string(),
            });
            let position = state.repositories.iter().position(|repo| repo.name == name);
            let blocked = state.fail_remove_names.contains(name)
                || position.is_some_and(|at| {
                    state.fail_remove_uris.contains(&state.repositories[at].uri)
                });
            if blocked {
                return Err(mutation_error("remove", name, "injected remove failure"));
            }
            match position {
                Some(at) => {
                    state.repositories.remove(at);
                    Ok(())
                }
                None => Err(mutation_error("remove", name, "repository not found")),
            }
        }
    }

    fn mutation_error(verb: &str, name: &str, stderr: &str) -> Error {
        Error::Mutation {
            command: format!("package repo {verb} {name}"),
            code: 1,
            stderr: stderr.to_string(),
        }
    }

}
