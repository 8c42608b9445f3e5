use std::num::NonZeroUsize;

use lru::LruCache;
use parking_lot::Mutex;

use crate::registry::SurfaceId;
use crate::shell::Shell;
use crate::util::default_favicon_url;

/// Encoded favicons keyed by icon URL.
///
/// Tab lists are recomputed on nearly every content event, so without this
/// every title change would refetch every icon in the window.
pub struct FaviconCache {
    entries: Mutex<LruCache<String, String>>,
}

impl FaviconCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn get(&self, favicon_url: &str) -> Option<String> {
        self.entries.lock().get(favicon_url).cloned()
    }

    pub fn insert(&self, favicon_url: String, data: String) {
        self.entries.lock().put(favicon_url, data);
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Shell {
    /// Icon URL the page in `surface` declares, if any. Failures count as none.
    pub(crate) async fn probe_favicon_url(&self, surface: SurfaceId) -> Option<String> {
        match self.services.favicons.probe(surface).await {
            Ok(url) => url,
            Err(e) => {
                log::debug!("Favicon probe failed for {}: {}", surface, e);
                None
            }
        }
    }

    /// Encoded favicon for a tab. An explicit icon URL wins over whatever
    /// the page declares, and a page declaring nothing falls back to its
    /// site's `/favicon.ico`.
    pub(crate) async fn resolve_favicon(
        &self,
        surface: SurfaceId,
        page_url: &str,
        favicon_override: Option<&str>,
    ) -> Option<String> {
        let favicon_url = match favicon_override {
            Some(url) => Some(url.to_string()),
            None => self.probe_favicon_url(surface).await,
        };
        let favicon_url = favicon_url.or_else(|| default_favicon_url(page_url))?;

        if let Some(data) = self.favicon_cache.get(&favicon_url) {
            return Some(data);
        }

        match self.services.favicons.fetch(page_url, &favicon_url).await {
            Ok(Some(data)) => {
                self.favicon_cache.insert(favicon_url, data.clone());
                Some(data)
            }
            Ok(None) => None,
            Err(e) => {
                log::debug!("Favicon fetch failed for {}: {}", favicon_url, e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_evicts_least_recent() {
        let cache = FaviconCache::new(2);
        cache.insert("a".into(), "A".into());
        cache.insert("b".into(), "B".into());
        assert_eq!(cache.get("a").as_deref(), Some("A"));
        cache.insert("c".into(), "C".into());
        assert_eq!(cache.get("b"), None);
        assert_eq!(cache.get("a").as_deref(), Some("A"));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn zero_capacity_still_holds_one() {
        let cache = FaviconCache::new(0);
        assert!(cache.is_empty());
        cache.insert("a".into(), "A".into());
        assert_eq!(cache.get("a").as_deref(), Some("A"));
    }
}
