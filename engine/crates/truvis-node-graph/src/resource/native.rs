use ash::vk::{self, Handle};

use crate::resource::types::ResourceType;

/// 原生句柄
///
/// 图不调用任何原生 API，句柄只有"已创建"和"已销毁"两种状态；
/// [`NativeHandle::Null`] 以及 raw 值为 0 的句柄都视为已销毁
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum NativeHandle {
    #[default]
    Null,
    Image(vk::Image),
    Buffer(vk::Buffer),
    CommandPool(vk::CommandPool),
    Device(vk::Device),
    Swapchain(vk::SwapchainKHR),
    Pipeline(vk::Pipeline),
    DescriptorSet(vk::DescriptorSet),
    RenderPass(vk::RenderPass),
    Framebuffer(vk::Framebuffer),
    Semaphore(vk::Semaphore),
    Fence(vk::Fence),
    ShaderModule(vk::ShaderModule),
    Opaque(u64),
}

// getters
impl NativeHandle {
    #[inline]
    pub fn as_raw(&self) -> u64 {
        match self {
            NativeHandle::Null => 0,
            NativeHandle::Image(h) => h.as_raw(),
            NativeHandle::Buffer(h) => h.as_raw(),
            NativeHandle::CommandPool(h) => h.as_raw(),
            NativeHandle::Device(h) => h.as_raw(),
            NativeHandle::Swapchain(h) => h.as_raw(),
            NativeHandle::Pipeline(h) => h.as_raw(),
            NativeHandle::DescriptorSet(h) => h.as_raw(),
            NativeHandle::RenderPass(h) => h.as_raw(),
            NativeHandle::Framebuffer(h) => h.as_raw(),
            NativeHandle::Semaphore(h) => h.as_raw(),
            NativeHandle::Fence(h) => h.as_raw(),
            NativeHandle::ShaderModule(h) => h.as_raw(),
            NativeHandle::Opaque(raw) => *raw,
        }
    }

    #[inline]
    pub fn is_null(&self) -> bool {
        self.as_raw() == 0
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            NativeHandle::Null => "Null",
            NativeHandle::Image(_) => "Image",
            NativeHandle::Buffer(_) => "Buffer",
            NativeHandle::CommandPool(_) => "CommandPool",
            NativeHandle::Device(_) => "Device",
            NativeHandle::Swapchain(_) => "Swapchain",
            NativeHandle::Pipeline(_) => "Pipeline",
            NativeHandle::DescriptorSet(_) => "DescriptorSet",
            NativeHandle::RenderPass(_) => "RenderPass",
            NativeHandle::Framebuffer(_) => "Framebuffer",
            NativeHandle::Semaphore(_) => "Semaphore",
            NativeHandle::Fence(_) => "Fence",
            NativeHandle::ShaderModule(_) => "ShaderModule",
            NativeHandle::Opaque(_) => "Opaque",
        }
    }

    /// 句柄的种类能否放进 `resource_type` 类型的 Resource
    pub fn fits(&self, resource_type: ResourceType) -> bool {
        match self {
            NativeHandle::Null => true,
            NativeHandle::Image(_) => resource_type.is_image(),
            NativeHandle::Buffer(_) => resource_type == ResourceType::Buffer,
            NativeHandle::CommandPool(_) => resource_type == ResourceType::CommandPool,
            NativeHandle::Device(_) => resource_type == ResourceType::Device,
            NativeHandle::Swapchain(_) => resource_type == ResourceType::Swapchain,
            NativeHandle::Pipeline(_) => resource_type == ResourceType::Pipeline,
            NativeHandle::DescriptorSet(_) => resource_type == ResourceType::DescriptorSet,
            NativeHandle::RenderPass(_) => resource_type == ResourceType::RenderPass,
            NativeHandle::Framebuffer(_) => resource_type == ResourceType::Framebuffer,
            NativeHandle::Semaphore(_) => resource_type == ResourceType::Semaphore,
            NativeHandle::Fence(_) => resource_type == ResourceType::Fence,
            NativeHandle::ShaderModule(_) => resource_type == ResourceType::ShaderModule,
            NativeHandle::Opaque(_) => resource_type == ResourceType::Opaque,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_sentinel() {
        assert!(NativeHandle::Null.is_null());
        assert!(NativeHandle::default().is_null());
        assert!(NativeHandle::Buffer(vk::Buffer::null()).is_null());
        assert!(!NativeHandle::Buffer(vk::Buffer::from_raw(7)).is_null());
    }

    #[test]
    fn test_fits() {
        let image = NativeHandle::Image(vk::Image::from_raw(1));
        assert!(image.fits(ResourceType::Image));
        assert!(image.fits(ResourceType::CubeMap));
        assert!(!image.fits(ResourceType::Buffer));
        assert!(NativeHandle::Device(vk::Device::from_raw(2)).fits(ResourceType::Device));
    }
}
