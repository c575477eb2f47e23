use std::path::{Path, PathBuf};

/// 统一路径管理
///
/// 所有路径基于工作区根目录（通过 `CARGO_MANIFEST_DIR` 推导）。
///
/// # 使用示例
/// ```ignore
/// let config = TruvisPath::config_path("node_graph.toml"); // config/node_graph.toml
/// ```
pub struct TruvisPath {}

impl TruvisPath {
    /// 获取工作区根目录
    pub fn workspace_path() -> PathBuf {
        // truvis-crate-tools 位于工作区根目录下
        let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));
        manifest_dir.parent().unwrap_or(manifest_dir).to_path_buf()
    }

    /// 获取 `config/` 目录下的文件路径
    pub fn config_path(filename: &str) -> PathBuf {
        Self::workspace_path().join("config").join(filename)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_path_under_workspace() {
        let path = TruvisPath::config_path("node_graph.toml");
        assert!(path.starts_with(TruvisPath::workspace_path()));
        assert!(path.ends_with("config/node_graph.toml"));
    }
}
