use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::resource::types::ResourceType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BudgetResourceType {
    HostMemory,
    DeviceMemory,
}

impl BudgetResourceType {
    /// 图像、缓冲、交换链计入显存，其余计入主机内存
    pub fn for_resource(resource_type: ResourceType) -> Self {
        match resource_type {
            ResourceType::Image
            | ResourceType::Image3D
            | ResourceType::CubeMap
            | ResourceType::Buffer
            | ResourceType::Swapchain => BudgetResourceType::DeviceMemory,
            _ => BudgetResourceType::HostMemory,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            BudgetResourceType::HostMemory => "host_memory",
            BudgetResourceType::DeviceMemory => "device_memory",
        }
    }
}

/// 一项预算
///
/// `max_bytes == 0` 表示不限；只有 `strict` 时超出 `max_bytes` 才会拒绝分配
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceBudget {
    pub max_bytes: u64,
    /// 软阈值，0 表示不提示
    pub warning_threshold: u64,
    pub strict: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BudgetUsage {
    pub current_bytes: u64,
    pub peak_bytes: u64,
    pub allocation_count: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum BudgetKey {
    Builtin(BudgetResourceType),
    Custom(String),
}

/// 软/硬内存预算
///
/// 节点在 Compile 中通过 [`crate::services::GraphServices`] 访问，不是全局单例
#[derive(Debug, Default)]
pub struct ResourceBudgetManager {
    budgets: HashMap<BudgetKey, ResourceBudget>,
    usage: HashMap<BudgetKey, BudgetUsage>,
}

// new & init
impl ResourceBudgetManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_budget(&mut self, resource_type: BudgetResourceType, budget: ResourceBudget) {
        self.budgets.insert(BudgetKey::Builtin(resource_type), budget);
    }

    pub fn set_custom_budget(&mut self, name: impl Into<String>, budget: ResourceBudget) {
        self.budgets.insert(BudgetKey::Custom(name.into()), budget);
    }
}

// allocation
impl ResourceBudgetManager {
    /// 只判断能否分配，不记账
    pub fn try_allocate(&mut self, resource_type: BudgetResourceType, bytes: u64) -> bool {
        self.try_allocate_key(BudgetKey::Builtin(resource_type), bytes)
    }

    pub fn try_allocate_custom(&mut self, name: &str, bytes: u64) -> bool {
        self.try_allocate_key(BudgetKey::Custom(name.to_string()), bytes)
    }

    fn try_allocate_key(&mut self, key: BudgetKey, bytes: u64) -> bool {
        let Some(budget) = self.budgets.get(&key).copied() else {
            return true;
        };
        if budget.max_bytes == 0 {
            return true;
        }
        let current = self.usage.entry(key).or_default().current_bytes;
        let new_total = current.saturating_add(bytes);
        if budget.strict && new_total > budget.max_bytes {
            return false;
        }
        if new_total > budget.max_bytes {
            log::warn!("budget exceeded: {} > {} bytes (non-strict, allowed)", new_total, budget.max_bytes);
        }
        true
    }

    pub fn record_allocation(&mut self, resource_type: BudgetResourceType, bytes: u64) {
        self.record_allocation_key(BudgetKey::Builtin(resource_type), bytes);
    }

    pub fn record_custom_allocation(&mut self, name: &str, bytes: u64) {
        self.record_allocation_key(BudgetKey::Custom(name.to_string()), bytes);
    }

    fn record_allocation_key(&mut self, key: BudgetKey, bytes: u64) {
        let threshold = self.budgets.get(&key).map(|b| b.warning_threshold).unwrap_or(0);
        let usage = self.usage.entry(key).or_default();
        let before = usage.current_bytes;
        usage.current_bytes = usage.current_bytes.saturating_add(bytes);
        usage.peak_bytes = usage.peak_bytes.max(usage.current_bytes);
        usage.allocation_count += 1;

        if threshold != 0 && before < threshold && usage.current_bytes >= threshold {
            log::warn!("budget warning threshold crossed: {} >= {} bytes", usage.current_bytes, threshold);
        }
    }

    pub fn record_deallocation(&mut self, resource_type: BudgetResourceType, bytes: u64) {
        self.record_deallocation_key(&BudgetKey::Builtin(resource_type), bytes);
    }

    pub fn record_custom_deallocation(&mut self, name: &str, bytes: u64) {
        self.record_deallocation_key(&BudgetKey::Custom(name.to_string()), bytes);
    }

    fn record_deallocation_key(&mut self, key: &BudgetKey, bytes: u64) {
        if let Some(usage) = self.usage.get_mut(key) {
            usage.current_bytes = usage.current_bytes.saturating_sub(bytes);
            usage.allocation_count = usage.allocation_count.saturating_sub(1);
        }
    }
}

// getters
impl ResourceBudgetManager {
    pub fn budget(&self, resource_type: BudgetResourceType) -> Option<ResourceBudget> {
        self.budgets.get(&BudgetKey::Builtin(resource_type)).copied()
    }

    pub fn usage(&self, resource_type: BudgetResourceType) -> BudgetUsage {
        self.usage.get(&BudgetKey::Builtin(resource_type)).copied().unwrap_or_default()
    }

    pub fn custom_usage(&self, name: &str) -> BudgetUsage {
        self.usage.get(&BudgetKey::Custom(name.to_string())).copied().unwrap_or_default()
    }

    /// 没有预算或不限时返回 u64::MAX
    pub fn available_bytes(&self, resource_type: BudgetResourceType) -> u64 {
        let key = BudgetKey::Builtin(resource_type);
        match self.budgets.get(&key) {
            Some(budget) if budget.max_bytes != 0 => {
                let current = self.usage.get(&key).map(|u| u.current_bytes).unwrap_or(0);
                budget.max_bytes.saturating_sub(current)
            }
            _ => u64::MAX,
        }
    }

    #[inline]
    pub fn is_over_budget(&self, resource_type: BudgetResourceType) -> bool {
        self.available_bytes(resource_type) == 0
    }

    pub fn is_near_warning_threshold(&self, resource_type: BudgetResourceType) -> bool {
        let key = BudgetKey::Builtin(resource_type);
        match self.budgets.get(&key) {
            Some(budget) if budget.warning_threshold != 0 => {
                self.usage.get(&key).map(|u| u.current_bytes).unwrap_or(0) >= budget.warning_threshold
            }
            _ => false,
        }
    }

    pub fn reset_usage(&mut self, resource_type: BudgetResourceType) {
        if let Some(usage) = self.usage.get_mut(&BudgetKey::Builtin(resource_type)) {
            *usage = BudgetUsage::default();
        }
    }

    pub fn reset(&mut self) {
        self.budgets.clear();
        self.usage.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unlimited_by_default() {
        let mut budget = ResourceBudgetManager::new();
        assert!(budget.try_allocate(BudgetResourceType::DeviceMemory, u64::MAX));
        assert_eq!(budget.available_bytes(BudgetResourceType::DeviceMemory), u64::MAX);
    }

    #[test]
    fn test_strict_budget_rejects() {
        let mut budget = ResourceBudgetManager::new();
        budget.set_budget(
            BudgetResourceType::DeviceMemory,
            ResourceBudget {
                max_bytes: 1000,
                warning_threshold: 800,
                strict: true,
            },
        );

        assert!(budget.try_allocate(BudgetResourceType::DeviceMemory, 900));
        budget.record_allocation(BudgetResourceType::DeviceMemory, 900);
        assert!(budget.is_near_warning_threshold(BudgetResourceType::DeviceMemory));
        assert!(!budget.try_allocate(BudgetResourceType::DeviceMemory, 200));
        assert_eq!(budget.available_bytes(BudgetResourceType::DeviceMemory), 100);

        budget.record_deallocation(BudgetResourceType::DeviceMemory, 900);
        assert!(budget.try_allocate(BudgetResourceType::DeviceMemory, 200));
        let usage = budget.usage(BudgetResourceType::DeviceMemory);
        assert_eq!(usage.current_bytes, 0);
        assert_eq!(usage.peak_bytes, 900);
        assert_eq!(usage.allocation_count, 0);
    }

    #[test]
    fn test_soft_budget_allows_overflow() {
        let mut budget = ResourceBudgetManager::new();
        budget.set_budget(
            BudgetResourceType::HostMemory,
            ResourceBudget {
                max_bytes: 10,
                warning_threshold: 0,
                strict: false,
            },
        );
        assert!(budget.try_allocate(BudgetResourceType::HostMemory, 100));
        budget.record_allocation(BudgetResourceType::HostMemory, 100);
        assert!(budget.is_over_budget(BudgetResourceType::HostMemory));
    }

    #[test]
    fn test_custom_budget() {
        let mut budget = ResourceBudgetManager::new();
        budget.set_custom_budget(
            "staging",
            ResourceBudget {
                max_bytes: 64,
                warning_threshold: 0,
                strict: true,
            },
        );
        assert!(budget.try_allocate_custom("staging", 64));
        budget.record_custom_allocation("staging", 64);
        assert!(!budget.try_allocate_custom("staging", 1));
        // 其他键不受影响
        assert!(budget.try_allocate_custom("readback", 1 << 20));
    }

    #[test]
    fn test_deallocation_saturates() {
        let mut budget = ResourceBudgetManager::new();
        budget.record_custom_allocation("staging", 10);
        budget.record_custom_deallocation("staging", 50);
        assert_eq!(budget.custom_usage("staging").current_bytes, 0);
    }
}
