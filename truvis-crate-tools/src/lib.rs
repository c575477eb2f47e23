//! Truvis 工具集
//!
//! 提供日志初始化、工作区路径管理、TOML 配置读写等通用工具。
//!
//! # TruvisPath
//! 基于工作区根目录的统一路径管理，避免硬编码相对路径。
//!
//! # TOML 配置
//! 任意 `serde` 结构体都可以通过 [`toml_config::load_toml`] / [`toml_config::save_toml`] 读写，
//! 错误统一带上文件路径。

pub mod init_log;
pub mod resource;
pub mod toml_config;
