use ash::vk;

use crate::handles::NodeHandle;
use crate::resource::description::ResourceDescription;
use crate::resource::native::NativeHandle;
use crate::resource::types::{ResourceLifetime, ResourceType};

/// 一个原生句柄的容器
///
/// - 任何时刻最多只持有一个存活的句柄
/// - 只由生产节点的输出槽拥有，消费节点通过 [`crate::handles::ResourceHandle`] 只读访问
/// - 句柄为空即"已销毁"，[`Resource::release`] 只会交出一次存活句柄
#[derive(Debug)]
pub struct Resource {
    resource_type: ResourceType,
    lifetime: ResourceLifetime,
    description: ResourceDescription,
    handle: NativeHandle,
    current_layout: vk::ImageLayout,

    /// 拥有者，不持有所有权
    owner: Option<NodeHandle>,
    /// 每次填充新句柄时递增
    generation: u32,
}

// new & init
impl Resource {
    /// 槽位第一次分配大小时创建的空 Resource
    pub fn empty(resource_type: ResourceType, lifetime: ResourceLifetime, owner: Option<NodeHandle>) -> Self {
        Self {
            resource_type,
            lifetime,
            description: ResourceDescription::None,
            handle: NativeHandle::Null,
            current_layout: vk::ImageLayout::UNDEFINED,
            owner,
            generation: 0,
        }
    }
}

// getters
impl Resource {
    #[inline]
    pub fn resource_type(&self) -> ResourceType {
        self.resource_type
    }
    #[inline]
    pub fn lifetime(&self) -> ResourceLifetime {
        self.lifetime
    }
    #[inline]
    pub fn description(&self) -> &ResourceDescription {
        &self.description
    }
    #[inline]
    pub fn handle(&self) -> NativeHandle {
        self.handle
    }
    #[inline]
    pub fn current_layout(&self) -> vk::ImageLayout {
        self.current_layout
    }
    #[inline]
    pub fn owner(&self) -> Option<NodeHandle> {
        self.owner
    }
    #[inline]
    pub fn generation(&self) -> u32 {
        self.generation
    }
    #[inline]
    pub fn is_live(&self) -> bool {
        !self.handle.is_null()
    }
}

// handle transitions
impl Resource {
    /// 填充句柄；已经持有存活句柄时拒绝，并把新句柄原样退回
    pub fn set_handle(&mut self, handle: NativeHandle, description: ResourceDescription) -> Result<(), NativeHandle> {
        if self.is_live() {
            return Err(handle);
        }
        debug_assert!(handle.fits(self.resource_type));
        debug_assert!(description.accepts(self.resource_type));

        self.handle = handle;
        self.description = description;
        self.current_layout = vk::ImageLayout::UNDEFINED;
        self.generation = self.generation.wrapping_add(1);
        Ok(())
    }

    /// 先通过 `destroy` 释放旧句柄，再换上新句柄
    pub fn replace_handle(
        &mut self,
        handle: NativeHandle,
        description: ResourceDescription,
        destroy: impl FnOnce(NativeHandle),
    ) {
        if let Some(old) = self.release() {
            destroy(old);
        }
        // release 之后一定为空
        let _ = self.set_handle(handle, description);
    }

    /// 交出存活句柄并置空，第二次调用返回 None
    pub fn release(&mut self) -> Option<NativeHandle> {
        if !self.is_live() {
            return None;
        }
        let handle = std::mem::take(&mut self.handle);
        self.current_layout = vk::ImageLayout::UNDEFINED;
        Some(handle)
    }

    #[inline]
    pub fn set_current_layout(&mut self, layout: vk::ImageLayout) {
        self.current_layout = layout;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::description::BufferDescription;
    use ash::vk::Handle;

    fn buffer_desc() -> ResourceDescription {
        ResourceDescription::Buffer(BufferDescription {
            size: 64,
            usage: vk::BufferUsageFlags::UNIFORM_BUFFER,
        })
    }

    #[test]
    fn test_single_live_handle() {
        let mut res = Resource::empty(ResourceType::Buffer, ResourceLifetime::Persistent, None);
        assert!(!res.is_live());

        let first = NativeHandle::Buffer(vk::Buffer::from_raw(1));
        res.set_handle(first, buffer_desc()).unwrap();
        assert!(res.is_live());

        let second = NativeHandle::Buffer(vk::Buffer::from_raw(2));
        assert_eq!(res.set_handle(second, buffer_desc()), Err(second));
        assert_eq!(res.handle(), first);
    }

    #[test]
    fn test_release_once() {
        let mut res = Resource::empty(ResourceType::Buffer, ResourceLifetime::Transient, None);
        let handle = NativeHandle::Buffer(vk::Buffer::from_raw(9));
        res.set_handle(handle, buffer_desc()).unwrap();

        assert_eq!(res.release(), Some(handle));
        assert_eq!(res.release(), None);
        assert!(res.handle().is_null());
    }

    #[test]
    fn test_replace_destroys_old_first() {
        let mut res = Resource::empty(ResourceType::Buffer, ResourceLifetime::Persistent, None);
        let old = NativeHandle::Buffer(vk::Buffer::from_raw(3));
        let new = NativeHandle::Buffer(vk::Buffer::from_raw(4));
        res.set_handle(old, buffer_desc()).unwrap();

        let mut destroyed = Vec::new();
        res.replace_handle(new, buffer_desc(), |h| destroyed.push(h));
        assert_eq!(destroyed, vec![old]);
        assert_eq!(res.handle(), new);
        assert_eq!(res.generation(), 2);

        // 空 Resource 替换时不触发销毁
        let mut empty = Resource::empty(ResourceType::Buffer, ResourceLifetime::Persistent, None);
        empty.replace_handle(new, buffer_desc(), |_| panic!("nothing to destroy"));
        assert_eq!(empty.handle(), new);
    }
}
