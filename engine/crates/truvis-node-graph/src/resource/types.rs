use serde::{Deserialize, Serialize};

/// 资源的语义类型，连线时输入输出两端必须一致
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceType {
    Image,
    Image3D,
    CubeMap,
    Buffer,
    CommandPool,
    Device,
    Swapchain,
    Pipeline,
    DescriptorSet,
    RenderPass,
    Framebuffer,
    Semaphore,
    Fence,
    ShaderModule,
    /// 图不理解的外部对象
    Opaque,
}

impl ResourceType {
    /// Image/Image3D/CubeMap 底层都是 vk::Image
    #[inline]
    pub fn is_image(self) -> bool {
        matches!(self, ResourceType::Image | ResourceType::Image3D | ResourceType::CubeMap)
    }
}

/// 资源的复用窗口
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceLifetime {
    /// 在一帧或一次编译内可能被回收复用
    Transient,
    /// 一直存活到显式销毁
    Persistent,
    /// 和图的生命周期绑定
    GraphLocal,
}

impl ResourceLifetime {
    /// 生产端的资源能否喂给消费端
    ///
    /// 只禁止 Transient -> Persistent：临时资源可能在持久消费者再次读取前就被回收
    #[inline]
    pub const fn can_feed(self, input: ResourceLifetime) -> bool {
        !matches!((self, input), (ResourceLifetime::Transient, ResourceLifetime::Persistent))
    }
}
