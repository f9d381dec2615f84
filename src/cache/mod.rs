//! Description cache manager.
//!
//! Mediates between the store and the LLM so that each unique
//! `(path, README hash)` pair costs at most one LLM call across every run
//! sharing the database. The lookup protocol:
//!
//! 1. empty README → empty description, no store or LLM interaction;
//! 2. cache enabled and not force-refreshing → query by path + hash, a hit
//!    is returned as-is;
//! 3. no generator configured → empty description;
//! 4. otherwise call the generator, persist on success, and bubble the
//!    error on failure so the caller can pick a fallback.

pub mod metadata;
pub mod store;

pub use store::{CacheEntry, CacheStats, Store};

use anyhow::Result;
use log::debug;
use std::path::Path;

use crate::llm::DescriptionGenerator;
use crate::readme;

pub struct Manager {
    store: Option<Store>,
    generator: Option<Box<dyn DescriptionGenerator>>,
    language: String,
    force_refresh: bool,
}

impl Manager {
    pub fn new(
        store: Option<Store>,
        generator: Option<Box<dyn DescriptionGenerator>>,
        language: &str,
        force_refresh: bool,
    ) -> Self {
        Self {
            store,
            generator,
            language: language.to_string(),
            force_refresh,
        }
    }

    pub fn store(&self) -> Option<&Store> {
        self.store.as_ref()
    }

    /// Produce the description for one repository given its normalized
    /// README content. Errors mean the LLM call failed; cache hits and the
    /// degenerate paths never error.
    pub fn describe(&self, repo_path: &Path, repo_name: &str, readme_content: &str) -> Result<String> {
        if readme_content.is_empty() {
            return Ok(String::new());
        }

        let path_str = repo_path.to_string_lossy();
        let hash = readme::sha256_hex(readme_content);

        if !self.force_refresh {
            if let Some(store) = &self.store {
                if let Some(entry) = store.lookup_description(&path_str, &hash)? {
                    return Ok(entry.description);
                }
            }
        }

        let Some(generator) = &self.generator else {
            return Ok(String::new());
        };

        debug!("generating description for {repo_name}");
        let description =
            generator.generate_description(&readme::for_llm(readme_content), &self.language)?;

        if let Some(store) = &self.store {
            store.save_description(
                &path_str,
                repo_name,
                &hash,
                &description,
                generator.provider_name(),
                generator.model_name(),
                &self.language,
            )?;
        }

        Ok(description)
    }

    pub fn stats(&self) -> Result<CacheStats> {
        match &self.store {
            Some(store) => store.stats(),
            None => Ok(CacheStats::default()),
        }
    }

    pub fn clear(&self) -> Result<()> {
        match &self.store {
            Some(store) => store.clear(),
            None => anyhow::bail!("cache is not enabled"),
        }
    }

    pub fn refresh(&self, repo_path: &str) -> Result<bool> {
        match &self.store {
            Some(store) => store.remove(repo_path),
            None => anyhow::bail!("cache is not enabled"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Generator double that counts invocations.
    struct FakeGenerator {
        response: Result<String, String>,
        calls: Arc<AtomicUsize>,
    }

    impl FakeGenerator {
        fn ok(description: &str) -> (Box<dyn DescriptionGenerator>, Arc<AtomicUsize>) {
            let calls = Arc::new(AtomicUsize::new(0));
            (
                Box::new(Self {
                    response: Ok(description.to_string()),
                    calls: Arc::clone(&calls),
                }),
                calls,
            )
        }

        fn failing() -> (Box<dyn DescriptionGenerator>, Arc<AtomicUsize>) {
            let calls = Arc::new(AtomicUsize::new(0));
            (
                Box::new(Self {
                    response: Err("boom".to_string()),
                    calls: Arc::clone(&calls),
                }),
                calls,
            )
        }
    }

    impl DescriptionGenerator for FakeGenerator {
        fn generate_description(&self, _readme: &str, _language: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.response {
                Ok(s) => Ok(s.clone()),
                Err(e) => anyhow::bail!("{e}"),
            }
        }

        fn provider_name(&self) -> &str {
            "fake"
        }

        fn model_name(&self) -> &str {
            "fake-1"
        }
    }

    fn repo() -> PathBuf {
        PathBuf::from("/r1")
    }

    #[test]
    fn test_empty_readme_short_circuits() {
        let store = Store::open_in_memory().unwrap();
        let (generator, calls) = FakeGenerator::ok("never used");
        let manager = Manager::new(Some(store.clone()), Some(generator), "en", false);

        let description = manager.describe(&repo(), "r1", "").unwrap();
        assert_eq!(description, "");
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        // No row, no counter movement.
        let stats = store.stats().unwrap();
        assert_eq!(stats.total_repositories, 0);
        assert_eq!(stats.cache_misses, 0);
    }

    #[test]
    fn test_miss_generates_and_caches_then_hits() {
        let store = Store::open_in_memory().unwrap();
        let (generator, calls) = FakeGenerator::ok("A hello project");
        let manager = Manager::new(Some(store.clone()), Some(generator), "en", false);

        let first = manager.describe(&repo(), "r1", "# project\nhello").unwrap();
        assert_eq!(first, "A hello project");
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let stats = store.stats().unwrap();
        assert_eq!(stats.cache_misses, 1);
        assert_eq!(stats.llm_api_calls, 1);

        let second = manager.describe(&repo(), "r1", "# project\nhello").unwrap();
        assert_eq!(second, "A hello project");
        assert_eq!(calls.load(Ordering::SeqCst), 1, "hit must not call the LLM");

        let stats = store.stats().unwrap();
        assert_eq!(stats.cache_hits, 1);
        assert_eq!(stats.llm_api_calls, 1);
    }

    #[test]
    fn test_readme_change_invalidates() {
        let store = Store::open_in_memory().unwrap();
        let (generator, calls) = FakeGenerator::ok("desc");
        let manager = Manager::new(Some(store.clone()), Some(generator), "en", false);

        manager.describe(&repo(), "r1", "# project\nhello").unwrap();
        manager.describe(&repo(), "r1", "# project\nhello world").unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        let stats = store.stats().unwrap();
        assert_eq!(stats.total_repositories, 1, "row is replaced, not duplicated");
        assert_eq!(stats.cache_misses, 2);
    }

    #[test]
    fn test_force_refresh_skips_lookup() {
        let store = Store::open_in_memory().unwrap();
        let (generator, _) = FakeGenerator::ok("first");
        let manager = Manager::new(Some(store.clone()), Some(generator), "en", false);
        manager.describe(&repo(), "r1", "# project").unwrap();

        let (generator, calls) = FakeGenerator::ok("regenerated");
        let forced = Manager::new(Some(store.clone()), Some(generator), "en", true);
        let description = forced.describe(&repo(), "r1", "# project").unwrap();

        assert_eq!(description, "regenerated");
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // Forced refresh never consults the row, so neither counter moved.
        let stats = store.stats().unwrap();
        assert_eq!(stats.cache_hits, 0);
        assert_eq!(stats.cache_misses, 1);
    }

    #[test]
    fn test_no_generator_returns_empty_without_row() {
        let store = Store::open_in_memory().unwrap();
        let manager = Manager::new(Some(store.clone()), None, "en", false);

        let description = manager.describe(&repo(), "r1", "# project").unwrap();
        assert_eq!(description, "");

        let stats = store.stats().unwrap();
        assert_eq!(stats.total_repositories, 0);
        assert_eq!(stats.cache_misses, 1);
    }

    #[test]
    fn test_generator_failure_surfaces_and_stores_nothing() {
        let store = Store::open_in_memory().unwrap();
        let (generator, _) = FakeGenerator::failing();
        let manager = Manager::new(Some(store.clone()), Some(generator), "en", false);

        assert!(manager.describe(&repo(), "r1", "# project").is_err());

        let stats = store.stats().unwrap();
        assert_eq!(stats.total_repositories, 0);
        assert_eq!(stats.llm_api_calls, 0);
    }

    #[test]
    fn test_disabled_cache_still_generates() {
        let (generator, calls) = FakeGenerator::ok("fresh");
        let manager = Manager::new(None, Some(generator), "en", false);

        let a = manager.describe(&repo(), "r1", "# project").unwrap();
        let b = manager.describe(&repo(), "r1", "# project").unwrap();
        assert_eq!(a, "fresh");
        assert_eq!(b, "fresh");
        assert_eq!(calls.load(Ordering::SeqCst), 2, "no store, no dedup");
    }
}
