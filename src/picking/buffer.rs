//! GPU picking render target with single-pixel readback.

use super::{PickId, PickingTarget, clamp_to_target};

/// Color format of the id attachment. Not sRGB: ids must round-trip exactly.
pub const PICKING_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;
/// Depth format of the picking pass.
pub const PICKING_DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

/// Readback rows must be aligned to 256 bytes even for a single texel.
const STAGING_SIZE: u64 = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT as u64;

/// GPU resources owned by a live picking buffer.
struct Attachments {
    color: wgpu::Texture,
    color_view: wgpu::TextureView,
    depth: wgpu::Texture,
    depth_view: wgpu::TextureView,
    staging: wgpu::Buffer,
}

impl Attachments {
    fn new(device: &wgpu::Device, width: u32, height: u32) -> Self {
        let size = wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        };

        let color = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Picking Color Texture"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: PICKING_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let color_view = color.create_view(&wgpu::TextureViewDescriptor::default());

        let depth = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Picking Depth Texture"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: PICKING_DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let depth_view = depth.create_view(&wgpu::TextureViewDescriptor::default());

        let staging = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Picking Staging Buffer"),
            size: STAGING_SIZE,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        Self {
            color,
            color_view,
            depth,
            depth_view,
            staging,
        }
    }

    fn destroy(self) {
        self.color.destroy();
        self.depth.destroy();
        self.staging.destroy();
    }
}

/// Offscreen render target that stores one [`PickId`] color per pixel.
///
/// The buffer owns an `Rgba8Unorm` color texture (no filtering is ever applied
/// to it, ids are copied out texel by texel), a `Depth32Float` depth texture
/// and a small staging buffer for readback. It keeps clones of the device and
/// queue so [`PickingTarget::pick`] can run from an input handler.
///
/// # Lifecycle
///
/// 1. [`PickingBuffer::new`] allocates attachments at the viewport size
/// 2. Each frame, [`PickingBuffer::begin_pass`] clears it and the picking
///    pipeline draws every pickable object
/// 3. [`PickingTarget::pick`] reads back whatever was last rendered
/// 4. [`PickingTarget::resize`] follows surface resizes
/// 5. [`PickingTarget::finalize`] destroys the GPU resources (idempotent)
pub struct PickingBuffer {
    device: wgpu::Device,
    queue: wgpu::Queue,
    attachments: Option<Attachments>,
    width: u32,
    height: u32,
}

impl PickingBuffer {
    /// Allocates a picking target of the given size. Zero dimensions are raised to 1.
    pub fn new(device: &wgpu::Device, queue: &wgpu::Queue, width: u32, height: u32) -> Self {
        let width = width.max(1);
        let height = height.max(1);
        log::debug!("picking buffer initialized at {}x{}", width, height);
        Self {
            device: device.clone(),
            queue: queue.clone(),
            attachments: Some(Attachments::new(device, width, height)),
            width,
            height,
        }
    }

    /// Color attachment view, or `None` once finalized.
    pub fn color_view(&self) -> Option<&wgpu::TextureView> {
        self.attachments.as_ref().map(|a| &a.color_view)
    }

    /// Depth attachment view, or `None` once finalized.
    pub fn depth_view(&self) -> Option<&wgpu::TextureView> {
        self.attachments.as_ref().map(|a| &a.depth_view)
    }

    /// Begins a render pass that clears ids to 0 and depth to 1.0.
    ///
    /// Returns `None` once the buffer has been finalized.
    pub fn begin_pass<'e>(
        &self,
        encoder: &'e mut wgpu::CommandEncoder,
    ) -> Option<wgpu::RenderPass<'e>> {
        let attachments = self.attachments.as_ref()?;
        Some(encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Picking Render Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &attachments.color_view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &attachments.depth_view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        }))
    }

    /// Copies one texel to the staging buffer and blocks until it is mapped.
    fn read_texel(&self, attachments: &Attachments, x: u32, row: u32) -> Option<[u8; 4]> {
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Picking Readback Encoder"),
            });

        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: &attachments.color,
                mip_level: 0,
                origin: wgpu::Origin3d { x, y: row, z: 0 },
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &attachments.staging,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(STAGING_SIZE as u32),
                    rows_per_image: Some(1),
                },
            },
            wgpu::Extent3d {
                width: 1,
                height: 1,
                depth_or_array_layers: 1,
            },
        );
        self.queue.submit(std::iter::once(encoder.finish()));

        let slice = attachments.staging.slice(..4);
        let (sender, receiver) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });

        let mapped = match self.device.poll(wgpu::PollType::wait_indefinitely()) {
            Ok(_) => match receiver.recv() {
                Ok(Ok(())) => true,
                Ok(Err(e)) => {
                    log::warn!("picking readback map failed: {}", e);
                    false
                }
                Err(_) => false,
            },
            Err(e) => {
                log::warn!("picking readback poll failed: {}", e);
                false
            }
        };
        if !mapped {
            cancel_readback(&attachments.staging);
            return None;
        }

        let texel = {
            let data = slice.get_mapped_range();
            [data[0], data[1], data[2], data[3]]
        };
        attachments.staging.unmap();
        Some(texel)
    }
}

/// Drops a pending or failed map so the next readback can map the buffer again.
fn cancel_readback(staging: &wgpu::Buffer) {
    staging.unmap();
}

impl PickingTarget for PickingBuffer {
    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Recreates the attachments when the size changes. A finalized buffer is
    /// re-initialized.
    fn resize(&mut self, width: u32, height: u32) {
        let width = width.max(1);
        let height = height.max(1);
        if self.attachments.is_some() && (width, height) == (self.width, self.height) {
            return;
        }
        if let Some(old) = self.attachments.take() {
            old.destroy();
        }
        self.attachments = Some(Attachments::new(&self.device, width, height));
        self.width = width;
        self.height = height;
        log::debug!("picking buffer resized to {}x{}", width, height);
    }

    /// Reads the id at `(x, y)`, bottom-left origin.
    ///
    /// Texture rows run top-down, so the row read is `height - 1 - y`.
    fn pick(&self, x: u32, y: u32) -> Option<PickId> {
        let attachments = self.attachments.as_ref()?;
        let (x, y) = clamp_to_target(x, y, self.width, self.height)?;
        let row = self.height - 1 - y;
        let texel = self.read_texel(attachments, x, row)?;
        PickId::from_rgba8(texel)
    }

    fn finalize(&mut self) {
        if let Some(attachments) = self.attachments.take() {
            attachments.destroy();
            log::debug!("picking buffer finalized");
        }
    }

    fn is_finalized(&self) -> bool {
        self.attachments.is_none()
    }
}
