//! TOML 配置文件读写
//!
//! 所有错误都带上文件路径，方便定位是哪个配置出了问题。

use anyhow::Context;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs;
use std::path::Path;

/// 从 TOML 文件加载配置
pub fn load_toml<T: DeserializeOwned, P: AsRef<Path>>(path: P) -> anyhow::Result<T> {
    let content =
        fs::read_to_string(path.as_ref()).with_context(|| format!("读取配置文件失败: {:?}", path.as_ref()))?;

    toml::from_str(&content).with_context(|| format!("解析 TOML 配置失败: {:?}", path.as_ref()))
}

/// 保存配置到 TOML 文件，父目录不存在时自动创建
pub fn save_toml<T: Serialize, P: AsRef<Path>>(value: &T, path: P) -> anyhow::Result<()> {
    let content = toml::to_string_pretty(value).context("序列化配置失败")?;

    if let Some(parent) = path.as_ref().parent() {
        fs::create_dir_all(parent).with_context(|| format!("创建目录失败: {:?}", parent))?;
    }
    fs::write(path.as_ref(), content).with_context(|| format!("写入配置文件失败: {:?}", path.as_ref()))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Sample {
        name: String,
        count: u32,
    }

    #[test]
    fn test_save_then_load() {
        let path = std::env::temp_dir().join("truvis-toml-config-test").join("sample.toml");
        let sample = Sample {
            name: "graph".to_string(),
            count: 3,
        };
        save_toml(&sample, &path).unwrap();
        let loaded: Sample = load_toml(&path).unwrap();
        assert_eq!(loaded, sample);
    }

    #[test]
    fn test_missing_file_mentions_path() {
        let err = load_toml::<Sample, _>("/definitely/not/here.toml").unwrap_err();
        assert!(format!("{err:#}").contains("not/here.toml"));
    }
}
