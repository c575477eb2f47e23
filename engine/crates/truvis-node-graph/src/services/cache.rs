use std::collections::HashMap;
use std::hash::Hash;

/// 以键查找、缺失时创建的缓存
///
/// 图只依赖 `get_or_create` 这一契约，不关心缓存的持久化
#[derive(Debug)]
pub struct KeyedCache<K, V> {
    entries: HashMap<K, V>,
    hits: u64,
    misses: u64,
}

impl<K, V> Default for KeyedCache<K, V> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
            hits: 0,
            misses: 0,
        }
    }
}

// new & init
impl<K: Eq + Hash, V: Clone> KeyedCache<K, V> {
    pub fn new() -> Self {
        Self::default()
    }
}

// lookup
impl<K: Eq + Hash, V: Clone> KeyedCache<K, V> {
    /// 命中时返回缓存值；未命中时调用 `create`，成功才写入缓存
    pub fn get_or_create<E>(&mut self, key: K, create: impl FnOnce() -> Result<V, E>) -> Result<V, E> {
        if let Some(value) = self.entries.get(&key) {
            self.hits += 1;
            return Ok(value.clone());
        }
        self.misses += 1;
        let value = create()?;
        self.entries.insert(key, value.clone());
        Ok(value)
    }

    #[inline]
    pub fn get(&self, key: &K) -> Option<&V> {
        self.entries.get(key)
    }

    pub fn invalidate(&mut self, key: &K) -> Option<V> {
        self.entries.remove(key)
    }

    /// 取出全部缓存值，由调用者负责销毁
    pub fn drain(&mut self) -> Vec<V> {
        self.entries.drain().map(|(_, value)| value).collect()
    }
}

// getters
impl<K, V> KeyedCache<K, V> {
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
    #[inline]
    pub fn hits(&self) -> u64 {
        self.hits
    }
    #[inline]
    pub fn misses(&self) -> u64 {
        self.misses
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_or_create() {
        let mut cache: KeyedCache<u64, u32> = KeyedCache::new();
        let mut created = 0;

        for _ in 0..3 {
            let value = cache
                .get_or_create(7, || {
                    created += 1;
                    Ok::<_, ()>(42)
                })
                .unwrap();
            assert_eq!(value, 42);
        }
        assert_eq!(created, 1);
        assert_eq!(cache.hits(), 2);
        assert_eq!(cache.misses(), 1);
    }

    #[test]
    fn test_failed_create_is_not_cached() {
        let mut cache: KeyedCache<&str, u32> = KeyedCache::new();
        assert_eq!(cache.get_or_create("pipeline", || Err("compile failed")), Err("compile failed"));
        assert!(cache.get(&"pipeline").is_none());

        cache.get_or_create("pipeline", || Ok::<_, &str>(1)).unwrap();
        assert_eq!(cache.invalidate(&"pipeline"), Some(1));
        assert!(cache.is_empty());
    }
}
