//! Session-scoped registration of stub package repositories.
//!
//! A [`Registrar`] gives each supplied URL a fresh random name, clears out
//! any existing registry entries that already point at one of those URLs,
//! and inserts the new entries ahead of everything else. Whatever it added
//! is removed again when the scope ends: [`RegistrationGuard`] releases on
//! drop, [`Registrar::with_registrations`] wraps a workload in that guard.
//!
//! ```no_run
//! use universe_fixture::config;
//! use universe_fixture::dcos::DcosCli;
//! use universe_fixture::registrar::{Registrar, parse_url_list};
//!
//! # fn main() -> anyhow::Result<()> {
//! let config = config::load()?;
//! let client = DcosCli::from_config(&config)?;
//! let registrar = Registrar::new(&client, config.registrar_options());
//! let urls = parse_url_list(std::env::var("STUB_UNIVERSE_URL").ok().as_deref());
//! let (outcome, report) = registrar.with_registrations(&urls, |set| set.len())?;
//! # let _ = (outcome, report);
//! # Ok(())
//! # }
//! ```

use std::collections::HashSet;

use rand::Rng;
use tracing::{debug, info, warn};

use crate::error::{Error, ReleaseFailures, Result};
use crate::registry::RegistryClient;

pub const DEFAULT_PREFIX: &str = "testpkg-";
pub const DEFAULT_SUFFIX_LEN: usize = 8;
/// Longest random suffix a name may carry; longer requests are clamped.
pub const MAX_SUFFIX_LEN: usize = 64;
const SUFFIX_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrarOptions {
    pub prefix: String,
    pub suffix_len: usize,
    /// Priority index for new entries; 0 shadows everything already present.
    pub index: usize,
}

impl Default for RegistrarOptions {
    fn default() -> Self {
        Self {
            prefix: DEFAULT_PREFIX.to_string(),
            suffix_len: DEFAULT_SUFFIX_LEN,
            index: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    pub name: String,
    pub url: String,
}

/// Registrations that were confirmed by the registry, in the order they were added.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistrationSet {
    entries: Vec<Registration>,
}

impl RegistrationSet {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Registration> {
        self.entries.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|entry| entry.name.as_str())
    }

    pub fn name_for(&self, url: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|entry| entry.url == url)
            .map(|entry| entry.name.as_str())
    }

    fn push(&mut self, registration: Registration) {
        self.entries.push(registration);
    }
}

impl<'a> IntoIterator for &'a RegistrationSet {
    type Item = &'a Registration;
    type IntoIter = std::slice::Iter<'a, Registration>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

#[derive(Debug, Default)]
pub struct ReleaseReport {
    pub removed: Vec<String>,
    pub failed: ReleaseFailures,
}

impl ReleaseReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn into_result(self) -> Result<()> {
        if self.failed.is_empty() {
            Ok(())
        } else {
            Err(Error::Release(self.failed))
        }
    }
}

/// Split a whitespace-delimited URL list.
///
/// Blank input yields an empty list. Repeated URLs keep their first position.
pub fn parse_url_list(raw: Option<&str>) -> Vec<String> {
    let mut seen = HashSet::new();
    raw.unwrap_or_default()
        .split_whitespace()
        .filter(|url| seen.insert(*url))
        .map(str::to_string)
        .collect()
}

pub fn generate_name<R: Rng + ?Sized>(prefix: &str, suffix_len: usize, rng: &mut R) -> String {
    let suffix_len = suffix_len.min(MAX_SUFFIX_LEN);
    let mut name = String::with_capacity(prefix.len().saturating_add(suffix_len));
    name.push_str(prefix);
    name.extend(
        (0..suffix_len).map(|_| SUFFIX_ALPHABET[rng.random_range(0..SUFFIX_ALPHABET.len())] as char),
    );
    name
}

pub struct Registrar<'c, C: RegistryClient + ?Sized> {
    client: &'c C,
    options: RegistrarOptions,
}

impl<'c, C: RegistryClient + ?Sized> Registrar<'c, C> {
    pub fn new(client: &'c C, options: RegistrarOptions) -> Self {
        Self { client, options }
    }

    pub fn options(&self) -> &RegistrarOptions {
        &self.options
    }

    /// Register every URL under a fresh name.
    ///
    /// An empty list touches nothing. On failure, registrations made so far
    /// are released before the error is returned.
    pub fn register_all(&self, urls: &[String]) -> Result<RegistrationSet> {
        let urls = dedup(urls);
        if urls.is_empty() {
            debug!("no stub universe URLs configured; leaving registry untouched");
            return Ok(RegistrationSet::default());
        }

        let mut rng = rand::rng();
        let planned = urls
            .iter()
            .map(|url| Registration {
                name: generate_name(&self.options.prefix, self.options.suffix_len, &mut rng),
                url: (*url).to_string(),
            })
            .collect::<Vec<_>>();

        if let Err(source) = self.remove_duplicates(&urls) {
            return Err(Error::Registration {
                source: Box::new(source),
                rollback: ReleaseFailures::default(),
            });
        }

        let mut added = RegistrationSet::default();
        for registration in planned {
            match self.client.add_repository(
                &registration.name,
                &registration.url,
                self.options.index,
            ) {
                Ok(()) => {
                    info!(
                        name = %registration.name,
                        url = %registration.url,
                        index = self.options.index,
                        "added stub universe"
                    );
                    added.push(registration);
                }
                Err(source) => {
                    warn!(url = %registration.url, error = %source, "failed to add stub universe");
                    let rollback = self.release_all(added);
                    return Err(Error::Registration {
                        source: Box::new(source),
                        rollback: rollback.failed,
                    });
                }
            }
        }
        Ok(added)
    }

    /// Remove every registration in `set`, each independently of the others.
    pub fn release_all(&self, set: RegistrationSet) -> ReleaseReport {
        release_set(self.client, set)
    }

    /// Acquire registrations that are released when the guard goes away.
    pub fn scope(&self, urls: &[String]) -> Result<RegistrationGuard<'c, C>> {
        let set = self.register_all(urls)?;
        Ok(RegistrationGuard {
            client: self.client,
            set: Some(set),
        })
    }

    /// Run `workload` with the registrations active and release afterwards.
    ///
    /// Setup failures are returned before the workload runs. A panicking
    /// workload still releases through the guard's drop.
    pub fn with_registrations<T, F>(&self, urls: &[String], workload: F) -> Result<(T, ReleaseReport)>
    where
        F: FnOnce(&RegistrationSet) -> T,
    {
        let guard = self.scope(urls)?;
        let outcome = workload(guard.registrations());
        Ok((outcome, guard.release()))
    }

    /// Drop existing entries that point at any of `urls`, whatever their name.
    fn remove_duplicates(&self, urls: &[&str]) -> Result<usize> {
        let snapshot = self.client.list_repositories()?;
        let mut removed = 0;
        for repo in snapshot
            .iter()
            .filter(|repo| urls.contains(&repo.uri.as_str()))
        {
            info!(name = %repo.name, url = %repo.uri, "removing duplicate repository");
            self.client.remove_repository(&repo.name)?;
            removed += 1;
        }
        Ok(removed)
    }
}

/// Live registrations; released exactly once, on `release` or on drop.
pub struct RegistrationGuard<'c, C: RegistryClient + ?Sized> {
    client: &'c C,
    set: Option<RegistrationSet>,
}

impl<C: RegistryClient + ?Sized> RegistrationGuard<'_, C> {
    pub fn registrations(&self) -> &RegistrationSet {
        static EMPTY: RegistrationSet = RegistrationSet {
            entries: Vec::new(),
        };
        self.set.as_ref().unwrap_or(&EMPTY)
    }

    pub fn release(mut self) -> ReleaseReport {
        match self.set.take() {
            Some(set) => release_set(self.client, set),
            None => ReleaseReport::default(),
        }
    }
}

impl<C: RegistryClient + ?Sized> Drop for RegistrationGuard<'_, C> {
    fn drop(&mut self) {
        if let Some(set) = self.set.take() {
            let report = release_set(self.client, set);
            if !report.is_clean() {
                warn!(
                    leaked = %report.failed,
                    "stub universes left behind while unwinding"
                );
            }
        }
    }
}

fn release_set<C: RegistryClient + ?Sized>(client: &C, set: RegistrationSet) -> ReleaseReport {
    let mut report = ReleaseReport::default();
    for registration in set.entries {
        match client.remove_repository(&registration.name) {
            Ok(()) => {
                info!(name = %registration.name, "removed stub universe");
                report.removed.push(registration.name);
            }
            Err(err) => {
                warn!(name = %registration.name, error = %err, "failed to remove stub universe");
                report.failed.0.push((registration.name, err));
            }
        }
    }
    report
}

fn dedup(urls: &[String]) -> Vec<&str> {
    let mut seen = HashSet::new();
    urls.iter()
        .map(String::as_str)
        .filter(|url| !url.is_empty() && seen.insert(*url))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::memory::{Call, MemoryRegistry};
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn urls(raw: &str) -> Vec<String> {
        parse_url_list(Some(raw))
    }

    #[test]
    fn generated_names_use_prefix_and_lowercase_alphanumerics() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..64 {
            let name = generate_name("testpkg-", 8, &mut rng);
            let suffix = name.strip_prefix("testpkg-").unwrap();
            assert_eq!(suffix.len(), 8);
            assert!(
                suffix
                    .bytes()
                    .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit())
            );
        }
    }

    #[test]
    fn parse_url_list_splits_and_collapses_repeats() {
        assert!(parse_url_list(None).is_empty());
        assert!(parse_url_list(Some("   ")).is_empty());
        assert_eq!(
            urls("http://a  http://b http://a"),
            vec!["http://a".to_string(), "http://b".to_string()]
        );
    }

    #[test]
    fn empty_list_is_a_no_op() {
        let registry = MemoryRegistry::with_repositories([("Universe", "https://universe")]);
        let registrar = Registrar::new(&registry, RegistrarOptions::default());
        let set = registrar.register_all(&[]).unwrap();
        assert!(set.is_empty());
        assert!(registry.calls().is_empty());
    }

    #[test]
    fn adds_one_entry_per_url_at_index_zero() {
        let registry = MemoryRegistry::with_repositories([("Universe", "https://universe")]);
        let registrar = Registrar::new(&registry, RegistrarOptions::default());
        let set = registrar
            .register_all(&urls("http://a.example/repo http://b.example/repo"))
            .unwrap();

        assert_eq!(set.len(), 2);
        let repos = registry.repositories();
        assert_eq!(repos.len(), 3);
        assert_eq!(repos.last().unwrap().name, "Universe");
        for call in registry.calls() {
            if let Call::Add { index, .. } = call {
                assert_eq!(index, 0);
            }
        }
    }

    #[test]
    fn duplicate_scan_failure_aborts_before_any_add() {
        let registry = MemoryRegistry::new();
        registry.fail_list();
        let registrar = Registrar::new(&registry, RegistrarOptions::default());
        let err = registrar.register_all(&urls("http://a")).unwrap_err();
        match err {
            Error::Registration { source, rollback } => {
                assert!(source.is_query());
                assert!(rollback.is_empty());
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(registry.mutation_count(), 0);
    }

    #[test]
    fn duplicate_removal_failure_propagates() {
        let registry = MemoryRegistry::with_repositories([("stale", "http://a")]);
        registry.fail_remove_for("stale");
        let registrar = Registrar::new(&registry, RegistrarOptions::default());
        let err = registrar.register_all(&urls("http://a")).unwrap_err();
        assert!(matches!(err, Error::Registration { .. }));
        assert_eq!(registry.repositories().len(), 1);
    }

    #[test]
    fn guard_releases_on_drop() {
        let registry = MemoryRegistry::new();
        let registrar = Registrar::new(&registry, RegistrarOptions::default());
        {
            let guard = registrar.scope(&urls("http://a http://b")).unwrap();
            assert_eq!(guard.registrations().len(), 2);
            assert_eq!(registry.repositories().len(), 2);
        }
        assert!(registry.repositories().is_empty());
    }

    #[test]
    fn explicit_release_runs_once() {
        let registry = MemoryRegistry::new();
        let registrar = Registrar::new(&registry, RegistrarOptions::default());
        let guard = registrar.scope(&urls("http://a")).unwrap();
        let report = guard.release();
        assert_eq!(report.removed.len(), 1);
        let removes = registry
            .calls()
            .into_iter()
            .filter(|call| matches!(call, Call::Remove { .. }))
            .count();
        assert_eq!(removes, 1);
    }

    #[test]
    fn release_failure_does_not_block_remaining_entries() {
        let registry = MemoryRegistry::new();
        let registrar = Registrar::new(&registry, RegistrarOptions::default());
        let set = registrar.register_all(&urls("http://a http://b http://c")).unwrap();
        let stuck = set.name_for("http://a").unwrap().to_string();
        registry.fail_remove_for(stuck.clone());

        let report = registrar.release_all(set);
        assert_eq!(report.removed.len(), 2);
        assert_eq!(report.failed.names().collect::<Vec<_>>(), [stuck.as_str()]);
        assert_eq!(registry.repositories().len(), 1);
        assert!(report.into_result().is_err());
    }

    #[test]
    fn custom_prefix_and_suffix_len_are_honoured() {
        let registry = MemoryRegistry::new();
        let options = RegistrarOptions {
            prefix: "ci-".into(),
            suffix_len: 4,
            index: 0,
        };
        let registrar = Registrar::new(&registry, options);
        let set = registrar.register_all(&urls("http://a")).unwrap();
        let name = set.names().next().unwrap();
        assert!(name.starts_with("ci-"));
        assert_eq!(name.len(), 7);
    }

    #[test]
    fn oversized_suffix_len_is_clamped() {
        let name = generate_name("ci-", usize::MAX, &mut rand::rng());
        assert_eq!(name.len(), "ci-".len() + MAX_SUFFIX_LEN);
    }
}
