//! 节点图的配置
//!
//! ```toml
//! log_level = "info"
//! frames_in_flight = 3
//! print_execution_plan = true
//!
//! [budget.device_memory]
//! max_bytes = 268435456
//! warning_threshold = 201326592
//! strict = true
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use truvis_crate_tools::init_log::parse_level_filter;
use truvis_crate_tools::toml_config::{load_toml, save_toml};

use crate::services::budget::ResourceBudget;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BudgetConfig {
    pub host_memory: ResourceBudget,
    pub device_memory: ResourceBudget,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    pub log_level: String,
    pub frames_in_flight: usize,
    /// 编译完成后打印执行计划
    pub print_execution_plan: bool,
    pub budget: BudgetConfig,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            frames_in_flight: 3,
            print_execution_plan: false,
            budget: BudgetConfig::default(),
        }
    }
}

impl GraphConfig {
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        load_toml(path)
    }

    pub fn save_to_file(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        save_toml(self, path)
    }

    #[inline]
    pub fn log_filter(&self) -> log::LevelFilter {
        parse_level_filter(&self.log_level)
    }
}
