//! 节点参数：字符串键、动态类型的参数包
//!
//! 参数定义在 NodeType 上声明，实际值保存在每个 NodeInstance 的 [`ParameterSet`] 中。
//! 修改任何参数都会让节点的 cache key 失效。

use std::hash::{Hash, Hasher};

use ash::vk;
use indexmap::IndexMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamKind {
    Bool,
    Int,
    UInt,
    Float,
    String,
    Extent2D,
    Format,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    String(String),
    Extent2D(vk::Extent2D),
    Format(vk::Format),
}

impl ParamValue {
    pub fn kind(&self) -> ParamKind {
        match self {
            ParamValue::Bool(_) => ParamKind::Bool,
            ParamValue::Int(_) => ParamKind::Int,
            ParamValue::UInt(_) => ParamKind::UInt,
            ParamValue::Float(_) => ParamKind::Float,
            ParamValue::String(_) => ParamKind::String,
            ParamValue::Extent2D(_) => ParamKind::Extent2D,
            ParamValue::Format(_) => ParamKind::Format,
        }
    }

    /// f64 不实现 Hash，按位参与哈希
    pub fn hash_into<H: Hasher>(&self, state: &mut H) {
        self.kind().hash(state);
        match self {
            ParamValue::Bool(v) => v.hash(state),
            ParamValue::Int(v) => v.hash(state),
            ParamValue::UInt(v) => v.hash(state),
            ParamValue::Float(v) => v.to_bits().hash(state),
            ParamValue::String(v) => v.hash(state),
            ParamValue::Extent2D(v) => {
                v.width.hash(state);
                v.height.hash(state);
            }
            ParamValue::Format(v) => v.as_raw().hash(state),
        }
    }
}

macro_rules! impl_param_from {
    ($($ty:ty => $variant:ident $(as $cast:ty)?),* $(,)?) => {
        $(
            impl From<$ty> for ParamValue {
                fn from(value: $ty) -> Self {
                    ParamValue::$variant(value $(as $cast)?)
                }
            }
        )*
    };
}

impl_param_from!(
    bool => Bool,
    i32 => Int as i64,
    i64 => Int,
    u32 => UInt as u64,
    u64 => UInt,
    f32 => Float as f64,
    f64 => Float,
    String => String,
    vk::Extent2D => Extent2D,
    vk::Format => Format,
);

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::String(value.to_string())
    }
}

/// 从 [`ParamValue`] 中取出具体类型
pub trait FromParamValue: Sized {
    const KIND: ParamKind;
    fn from_param(value: &ParamValue) -> Option<Self>;
}

macro_rules! impl_from_param {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl FromParamValue for $ty {
                const KIND: ParamKind = ParamKind::$variant;
                fn from_param(value: &ParamValue) -> Option<Self> {
                    match value {
                        ParamValue::$variant(v) => (*v).try_into().ok(),
                        _ => None,
                    }
                }
            }
        )*
    };
}

impl_from_param!(
    bool => Bool,
    i64 => Int,
    i32 => Int,
    u64 => UInt,
    u32 => UInt,
    usize => UInt,
    vk::Extent2D => Extent2D,
    vk::Format => Format,
);

impl FromParamValue for f64 {
    const KIND: ParamKind = ParamKind::Float;
    fn from_param(value: &ParamValue) -> Option<Self> {
        match value {
            ParamValue::Float(v) => Some(*v),
            _ => None,
        }
    }
}

impl FromParamValue for f32 {
    const KIND: ParamKind = ParamKind::Float;
    fn from_param(value: &ParamValue) -> Option<Self> {
        match value {
            ParamValue::Float(v) => Some(*v as f32),
            _ => None,
        }
    }
}

impl FromParamValue for String {
    const KIND: ParamKind = ParamKind::String;
    fn from_param(value: &ParamValue) -> Option<Self> {
        match value {
            ParamValue::String(v) => Some(v.clone()),
            _ => None,
        }
    }
}

/// 参数定义
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterDefinition {
    pub name: String,
    pub kind: ParamKind,
    pub required: bool,
    pub default: Option<ParamValue>,
    pub description: String,
}

impl ParameterDefinition {
    pub fn required(name: impl Into<String>, kind: ParamKind) -> Self {
        Self {
            name: name.into(),
            kind,
            required: true,
            default: None,
            description: String::new(),
        }
    }

    pub fn optional(name: impl Into<String>, default: impl Into<ParamValue>) -> Self {
        let default = default.into();
        Self {
            name: name.into(),
            kind: default.kind(),
            required: false,
            default: Some(default),
            description: String::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// 节点实例上的参数值，保持设置顺序
#[derive(Debug, Clone, Default)]
pub struct ParameterSet {
    values: IndexMap<String, ParamValue>,
}

impl ParameterSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// 返回被覆盖的旧值
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<ParamValue>) -> Option<ParamValue> {
        self.values.insert(name.into(), value.into())
    }

    #[inline]
    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.values.get(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<ParamValue> {
        self.values.shift_remove(name)
    }

    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversions() {
        assert_eq!(ParamValue::from(3u32), ParamValue::UInt(3));
        assert_eq!(ParamValue::from(-2i32), ParamValue::Int(-2));
        assert_eq!(ParamValue::from("bgra"), ParamValue::String("bgra".to_string()));

        assert_eq!(u32::from_param(&ParamValue::UInt(5)), Some(5));
        assert_eq!(u32::from_param(&ParamValue::UInt(u64::MAX)), None);
        assert_eq!(u32::from_param(&ParamValue::Int(5)), None);
        assert_eq!(f32::from_param(&ParamValue::Float(0.5)), Some(0.5));

        let extent = vk::Extent2D { width: 8, height: 4 };
        assert_eq!(vk::Extent2D::from_param(&ParamValue::from(extent)), Some(extent));
    }

    #[test]
    fn test_set_keeps_order() {
        let mut params = ParameterSet::new();
        assert!(params.set("width", 800u32).is_none());
        params.set("height", 600u32);
        assert_eq!(params.set("width", 1024u32), Some(ParamValue::UInt(800)));

        let names: Vec<_> = params.iter().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["width", "height"]);
    }

    #[test]
    fn test_definition_kind_from_default() {
        let def = ParameterDefinition::optional("vsync", true);
        assert_eq!(def.kind, ParamKind::Bool);
        assert!(!def.required);
    }
}
