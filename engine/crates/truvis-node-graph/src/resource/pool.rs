use crate::error::NativeError;

/// 容量在 Compile 中确定的环形池
///
/// Execute 只能从这里取用和归还槽位，不能分配新的原生资源
#[derive(Debug, Clone, Default)]
pub struct FixedPool {
    in_use: Vec<bool>,
    cursor: usize,
}

// new & init
impl FixedPool {
    pub fn new(capacity: usize) -> Self {
        Self {
            in_use: vec![false; capacity],
            cursor: 0,
        }
    }
}

// acquire & release
impl FixedPool {
    /// 从游标开始找下一个空闲槽位
    pub fn acquire(&mut self) -> Result<usize, NativeError> {
        let capacity = self.in_use.len();
        for offset in 0..capacity {
            let index = (self.cursor + offset) % capacity;
            if !self.in_use[index] {
                self.in_use[index] = true;
                self.cursor = (index + 1) % capacity;
                return Ok(index);
            }
        }
        Err(NativeError::PoolExhausted { capacity })
    }

    /// 归还槽位，越界或重复归还返回 false
    pub fn release(&mut self, index: usize) -> bool {
        match self.in_use.get_mut(index) {
            Some(slot) if *slot => {
                *slot = false;
                true
            }
            _ => false,
        }
    }

    pub fn reset(&mut self) {
        self.in_use.iter_mut().for_each(|slot| *slot = false);
        self.cursor = 0;
    }
}

// getters
impl FixedPool {
    #[inline]
    pub fn capacity(&self) -> usize {
        self.in_use.len()
    }
    #[inline]
    pub fn in_use_count(&self) -> usize {
        self.in_use.iter().filter(|used| **used).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acquire_ring() {
        let mut pool = FixedPool::new(2);
        assert_eq!(pool.acquire(), Ok(0));
        assert_eq!(pool.acquire(), Ok(1));
        assert_eq!(pool.acquire(), Err(NativeError::PoolExhausted { capacity: 2 }));

        assert!(pool.release(0));
        assert!(!pool.release(0));
        assert_eq!(pool.acquire(), Ok(0));
        assert_eq!(pool.in_use_count(), 2);

        pool.reset();
        assert_eq!(pool.in_use_count(), 0);
    }

    #[test]
    fn test_empty_pool_is_exhausted() {
        let mut pool = FixedPool::default();
        assert_eq!(pool.acquire(), Err(NativeError::PoolExhausted { capacity: 0 }));
        assert!(!pool.release(3));
    }
}
