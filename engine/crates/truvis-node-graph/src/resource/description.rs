use ash::vk;

use crate::resource::types::ResourceType;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageDescription {
    pub width: u32,
    pub height: u32,
    pub depth: u32,
    pub mip_levels: u32,
    pub array_layers: u32,
    pub format: vk::Format,
    pub usage: vk::ImageUsageFlags,
    pub samples: vk::SampleCountFlags,
}

impl Default for ImageDescription {
    fn default() -> Self {
        Self {
            width: 0,
            height: 0,
            depth: 1,
            mip_levels: 1,
            array_layers: 1,
            format: vk::Format::UNDEFINED,
            usage: vk::ImageUsageFlags::empty(),
            samples: vk::SampleCountFlags::TYPE_1,
        }
    }
}

impl ImageDescription {
    pub fn new_2d(extent: vk::Extent2D, format: vk::Format, usage: vk::ImageUsageFlags) -> Self {
        Self {
            width: extent.width,
            height: extent.height,
            format,
            usage,
            ..Default::default()
        }
    }

    /// 按每像素 4 字节估算所有 mip 的大小
    pub fn footprint(&self) -> u64 {
        (0..self.mip_levels.max(1))
            .map(|mip| {
                let w = (self.width >> mip).max(1) as u64;
                let h = (self.height >> mip).max(1) as u64;
                w * h * self.depth.max(1) as u64
            })
            .sum::<u64>()
            * self.array_layers.max(1) as u64
            * 4
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BufferDescription {
    pub size: vk::DeviceSize,
    pub usage: vk::BufferUsageFlags,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CommandPoolDescription {
    pub queue_family_index: u32,
    pub flags: vk::CommandPoolCreateFlags,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DeviceDescription {
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SwapchainDescription {
    pub extent: vk::Extent2D,
    pub image_count: u32,
    pub format: vk::Format,
}

/// 以资源类型为键的描述
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ResourceDescription {
    /// 还没有被填充
    #[default]
    None,
    Image(ImageDescription),
    Buffer(BufferDescription),
    CommandPool(CommandPoolDescription),
    Device(DeviceDescription),
    Swapchain(SwapchainDescription),
    Opaque(String),
}

impl ResourceDescription {
    pub fn kind_name(&self) -> &'static str {
        match self {
            ResourceDescription::None => "None",
            ResourceDescription::Image(_) => "Image",
            ResourceDescription::Buffer(_) => "Buffer",
            ResourceDescription::CommandPool(_) => "CommandPool",
            ResourceDescription::Device(_) => "Device",
            ResourceDescription::Swapchain(_) => "Swapchain",
            ResourceDescription::Opaque(_) => "Opaque",
        }
    }

    /// 描述能否用于 `resource_type` 类型的 Resource
    ///
    /// 没有专门描述的类型（Pipeline、Semaphore 等）接受 None 和 Opaque
    pub fn accepts(&self, resource_type: ResourceType) -> bool {
        match self {
            ResourceDescription::None => true,
            ResourceDescription::Image(_) => resource_type.is_image(),
            ResourceDescription::Buffer(_) => resource_type == ResourceType::Buffer,
            ResourceDescription::CommandPool(_) => resource_type == ResourceType::CommandPool,
            ResourceDescription::Device(_) => resource_type == ResourceType::Device,
            ResourceDescription::Swapchain(_) => resource_type == ResourceType::Swapchain,
            ResourceDescription::Opaque(_) => !matches!(
                resource_type,
                ResourceType::Image
                    | ResourceType::Image3D
                    | ResourceType::CubeMap
                    | ResourceType::Buffer
                    | ResourceType::CommandPool
                    | ResourceType::Device
                    | ResourceType::Swapchain
            ),
        }
    }

    /// 用于预算统计的显存估算
    pub fn memory_footprint(&self) -> u64 {
        match self {
            ResourceDescription::Image(image) => image.footprint(),
            ResourceDescription::Buffer(buffer) => buffer.size,
            ResourceDescription::Swapchain(swapchain) => {
                swapchain.extent.width as u64 * swapchain.extent.height as u64 * 4 * swapchain.image_count as u64
            }
            _ => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_footprint_with_mips() {
        let desc = ImageDescription {
            width: 4,
            height: 4,
            mip_levels: 3,
            ..Default::default()
        };
        // 16 + 4 + 1 个像素
        assert_eq!(desc.footprint(), 21 * 4);
    }

    #[test]
    fn test_accepts() {
        let buffer = ResourceDescription::Buffer(BufferDescription {
            size: 256,
            usage: vk::BufferUsageFlags::VERTEX_BUFFER,
        });
        assert!(buffer.accepts(ResourceType::Buffer));
        assert!(!buffer.accepts(ResourceType::Image));
        assert_eq!(buffer.memory_footprint(), 256);
        assert!(ResourceDescription::None.accepts(ResourceType::Device));
        assert!(ResourceDescription::Opaque("layout".into()).accepts(ResourceType::Pipeline));
        assert!(!ResourceDescription::Opaque("layout".into()).accepts(ResourceType::Buffer));
    }
}
