//! Metric entries and the cache records derived from them.

/// A single label set plus the latest-version verdict for one container.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Entry {
    pub namespace: String,
    pub pod: String,
    pub container: String,
    pub image_url: String,
    pub is_latest: bool,
    pub current_version: String,
    pub latest_version: String,
    pub os: String,
    pub arch: String,
}

impl Entry {
    pub(crate) fn key(&self) -> ContainerKey {
        ContainerKey {
            namespace: self.namespace.clone(),
            pod: self.pod.clone(),
            container: self.container.clone(),
        }
    }

    pub(crate) fn cache_item(&self) -> CacheItem {
        CacheItem {
            image: self.image_url.clone(),
            current_version: self.current_version.clone(),
            latest_version: self.latest_version.clone(),
            os: self.os.clone(),
            arch: self.arch.clone(),
        }
    }
}

/// Identity of a monitored container.
///
/// Hashed as a tuple so that `("ab", "c")` and `("a", "bc")` never collide.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct ContainerKey {
    pub namespace: String,
    pub pod: String,
    pub container: String,
}

impl ContainerKey {
    pub fn new(namespace: &str, pod: &str, container: &str) -> Self {
        Self {
            namespace: namespace.to_string(),
            pod: pod.to_string(),
            container: container.to_string(),
        }
    }
}

/// The labels of a published series beyond its identity, kept so the exact
/// series can be deleted later.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct CacheItem {
    pub image: String,
    pub current_version: String,
    pub latest_version: String,
    pub os: String,
    pub arch: String,
}

/// Label values in the order of [`crate::LABELS`].
pub(crate) fn label_values<'a>(key: &'a ContainerKey, item: &'a CacheItem) -> [&'a str; 8] {
    [
        key.namespace.as_str(),
        key.pod.as_str(),
        key.container.as_str(),
        item.image.as_str(),
        item.current_version.as_str(),
        item.latest_version.as_str(),
        item.arch.as_str(),
        item.os.as_str(),
    ]
}
