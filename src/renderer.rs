//! Lit and picking passes over a [`Scene`].
//!
//! [`SceneRenderer`] owns two pipelines that share vertex layout and bind
//! group layouts:
//!
//! - **lit**: Blinn-Phong over the scene's enabled lights, drawn to the
//!   surface with its own depth buffer
//! - **picking**: flat [`PickId`](crate::PickId) colors into a
//!   [`PickingBuffer`], no blending, depth-tested with `LessEqual`
//!
//! # Bind Groups
//!
//! - **Group 0**: [`SceneUniforms`] (view-projection, camera position, lights)
//! - **Group 1**: [`ObjectUniforms`], one slot per object in a single buffer,
//!   selected with a dynamic offset
//!
//! Each pass has its own uniform buffers, so recording both passes into one
//! encoder never lets one pass observe the other's writes.

use std::num::NonZeroU64;

use bytemuck::Zeroable;

use crate::color::Color;
use crate::light::{LightItem, LightKind, MAX_LIGHTS};
use crate::mesh::{Mesh, Vertex3d};
use crate::picking::{PICKING_DEPTH_FORMAT, PICKING_FORMAT, PickingBuffer, PickingTarget};
use crate::scene::{DrawItem, Scene};

const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;
const INITIAL_OBJECT_CAPACITY: usize = 16;

/// One light as the lit shader sees it.
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct LightUniforms {
    pub position: [f32; 3],
    pub kind: u32,
    /// Direction the light travels.
    pub direction: [f32; 3],
    pub illuminance: f32,
    pub color: [f32; 3],
    /// Cosine of the spot cone's half-angle.
    pub cos_angle: f32,
    pub smoothness: f32,
    pub _pad: [f32; 3],
}

impl LightUniforms {
    fn from_item(item: &LightItem) -> Self {
        let (cos_angle, smoothness) = match item.light.kind {
            LightKind::Spot { angle, smoothness } => (angle.cos(), smoothness),
            _ => (-1.0, 0.0),
        };
        let color = item.light.color;
        Self {
            position: item.position.to_array(),
            kind: item.light.kind.tag(),
            direction: item.direction.to_array(),
            illuminance: item.light.illuminance,
            color: [color.r, color.g, color.b],
            cos_angle,
            smoothness,
            _pad: [0.0; 3],
        }
    }
}

/// Per-pass uniforms shared by every object.
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct SceneUniforms {
    pub view_proj: [[f32; 4]; 4],
    pub camera_pos: [f32; 3],
    pub light_count: u32,
    pub lights: [LightUniforms; MAX_LIGHTS],
}

/// Per-object uniforms, one dynamic-offset slot each.
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ObjectUniforms {
    pub model: [[f32; 4]; 4],
    /// Inverse transpose of `model`, for non-uniform scaling.
    pub normal_matrix: [[f32; 4]; 4],
    pub color: [f32; 4],
    /// Encoded pick id; zero for objects that are not pickable.
    pub pick_color: [f32; 4],
}

impl ObjectUniforms {
    fn from_item(item: &DrawItem) -> Self {
        Self {
            model: item.model.to_cols_array_2d(),
            normal_matrix: item.model.inverse().transpose().to_cols_array_2d(),
            color: item.color.to_array(),
            pick_color: item.id.map(|id| id.to_color()).unwrap_or([0.0; 4]),
        }
    }
}

struct Layouts {
    scene: wgpu::BindGroupLayout,
    object: wgpu::BindGroupLayout,
}

impl Layouts {
    fn new(device: &wgpu::Device) -> Self {
        let scene = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Scene Bind Group Layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        let object = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Object Bind Group Layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: true,
                    min_binding_size: NonZeroU64::new(size_of::<ObjectUniforms>() as u64),
                },
                count: None,
            }],
        });

        Self { scene, object }
    }
}

/// Uniform buffers and bind groups for one pass.
struct PassUniforms {
    label: &'static str,
    scene_buffer: wgpu::Buffer,
    scene_bind_group: wgpu::BindGroup,
    object_buffer: wgpu::Buffer,
    object_bind_group: wgpu::BindGroup,
    stride: u64,
    capacity: usize,
}

impl PassUniforms {
    fn new(device: &wgpu::Device, layouts: &Layouts, label: &'static str) -> Self {
        let scene_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size: size_of::<SceneUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let scene_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(label),
            layout: &layouts.scene,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: scene_buffer.as_entire_binding(),
            }],
        });

        let alignment = device.limits().min_uniform_buffer_offset_alignment as u64;
        let stride = object_stride(alignment);
        let (object_buffer, object_bind_group) =
            Self::create_objects(device, layouts, label, stride, INITIAL_OBJECT_CAPACITY);

        Self {
            label,
            scene_buffer,
            scene_bind_group,
            object_buffer,
            object_bind_group,
            stride,
            capacity: INITIAL_OBJECT_CAPACITY,
        }
    }

    fn create_objects(
        device: &wgpu::Device,
        layouts: &Layouts,
        label: &str,
        stride: u64,
        capacity: usize,
    ) -> (wgpu::Buffer, wgpu::BindGroup) {
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size: stride * capacity as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(label),
            layout: &layouts.object,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                    buffer: &buffer,
                    offset: 0,
                    size: NonZeroU64::new(size_of::<ObjectUniforms>() as u64),
                }),
            }],
        });
        (buffer, bind_group)
    }

    /// Writes the scene block and one slot per object, growing the object
    /// buffer when needed.
    fn upload(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        layouts: &Layouts,
        scene: &SceneUniforms,
        objects: &[ObjectUniforms],
    ) {
        queue.write_buffer(&self.scene_buffer, 0, bytemuck::bytes_of(scene));
        if objects.is_empty() {
            return;
        }

        if objects.len() > self.capacity {
            self.capacity = objects.len().next_power_of_two();
            let (buffer, bind_group) =
                Self::create_objects(device, layouts, self.label, self.stride, self.capacity);
            self.object_buffer = buffer;
            self.object_bind_group = bind_group;
            log::debug!("{} grown to {} objects", self.label, self.capacity);
        }

        queue.write_buffer(&self.object_buffer, 0, &pack_slots(objects, self.stride));
    }

    fn offset(&self, slot: usize) -> wgpu::DynamicOffset {
        (slot as u64 * self.stride) as wgpu::DynamicOffset
    }
}

/// Size of one object slot: the uniform block rounded up to the device's
/// dynamic offset alignment.
fn object_stride(alignment: u64) -> u64 {
    (size_of::<ObjectUniforms>() as u64).next_multiple_of(alignment.max(1))
}

fn pack_slots(objects: &[ObjectUniforms], stride: u64) -> Vec<u8> {
    let stride = stride as usize;
    let mut bytes = vec![0u8; stride * objects.len()];
    for (slot, chunk) in objects.iter().zip(bytes.chunks_exact_mut(stride)) {
        let data = bytemuck::bytes_of(slot);
        chunk[..data.len()].copy_from_slice(data);
    }
    bytes
}

#[allow(clippy::too_many_arguments)]
fn create_pipeline(
    device: &wgpu::Device,
    layout: &wgpu::PipelineLayout,
    label: &str,
    source: &str,
    format: wgpu::TextureFormat,
    blend: Option<wgpu::BlendState>,
    depth_format: wgpu::TextureFormat,
    depth_compare: wgpu::CompareFunction,
) -> wgpu::RenderPipeline {
    let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(label),
        source: wgpu::ShaderSource::Wgsl(source.into()),
    });

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(label),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module: &shader,
            entry_point: Some("vs"),
            buffers: &[Vertex3d::LAYOUT],
            compilation_options: Default::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: &shader,
            entry_point: Some("fs"),
            targets: &[Some(wgpu::ColorTargetState {
                format,
                blend,
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: Default::default(),
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            cull_mode: Some(wgpu::Face::Back),
            front_face: wgpu::FrontFace::Ccw,
            ..Default::default()
        },
        depth_stencil: Some(wgpu::DepthStencilState {
            format: depth_format,
            depth_write_enabled: true,
            depth_compare,
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        }),
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
        cache: None,
    })
}

/// Draws a [`Scene`] through the lit and picking pipelines.
///
/// GPU meshes are uploaded lazily from [`Scene::meshes`]; meshes are
/// immutable, so the renderer only ever appends.
pub struct SceneRenderer {
    layouts: Layouts,
    lit_pipeline: wgpu::RenderPipeline,
    picking_pipeline: wgpu::RenderPipeline,
    lit_uniforms: PassUniforms,
    picking_uniforms: PassUniforms,
    meshes: Vec<Mesh>,
    depth: Option<(wgpu::Texture, wgpu::TextureView)>,
    depth_size: (u32, u32),
    /// Background of the lit pass.
    pub clear_color: Color,
}

impl SceneRenderer {
    /// Creates both pipelines. `surface_format` is the lit pass target format.
    pub fn new(device: &wgpu::Device, surface_format: wgpu::TextureFormat) -> Self {
        let layouts = Layouts::new(device);
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Scene Pipeline Layout"),
            bind_group_layouts: &[&layouts.scene, &layouts.object],
            push_constant_ranges: &[],
        });

        let lit_pipeline = create_pipeline(
            device,
            &pipeline_layout,
            "Lit Pipeline",
            include_str!("shaders/mesh.wgsl"),
            surface_format,
            Some(wgpu::BlendState::ALPHA_BLENDING),
            DEPTH_FORMAT,
            wgpu::CompareFunction::Less,
        );
        let picking_pipeline = create_pipeline(
            device,
            &pipeline_layout,
            "Picking Pipeline",
            include_str!("shaders/picking.wgsl"),
            PICKING_FORMAT,
            None,
            PICKING_DEPTH_FORMAT,
            wgpu::CompareFunction::LessEqual,
        );

        let lit_uniforms = PassUniforms::new(device, &layouts, "Lit Uniforms");
        let picking_uniforms = PassUniforms::new(device, &layouts, "Picking Uniforms");

        Self {
            layouts,
            lit_pipeline,
            picking_pipeline,
            lit_uniforms,
            picking_uniforms,
            meshes: Vec::new(),
            depth: None,
            depth_size: (0, 0),
            clear_color: Color::BLACK,
        }
    }

    /// Uploads meshes added to `scene` since the last call.
    fn sync_meshes(&mut self, device: &wgpu::Device, scene: &Scene) {
        let known = self.meshes.len().min(scene.meshes().len());
        for geometry in &scene.meshes()[known..] {
            self.meshes.push(Mesh::from_geometry(device, geometry));
        }
        if known < self.meshes.len() {
            log::debug!("uploaded {} meshes", self.meshes.len() - known);
        }
    }

    /// Ensures the lit depth buffer matches the target size.
    fn ensure_depth_size(&mut self, device: &wgpu::Device, width: u32, height: u32) {
        if self.depth.is_some() && self.depth_size == (width, height) {
            return;
        }
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Lit Depth Texture"),
            size: wgpu::Extent3d {
                width: width.max(1),
                height: height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        self.depth = Some((texture, view));
        self.depth_size = (width, height);
    }

    /// Scene block for the current camera, or `None` when the camera node
    /// cannot be resolved.
    fn scene_uniforms(scene: &Scene, aspect: f32) -> Option<SceneUniforms> {
        let camera = scene.camera();
        let resolved = camera
            .view_projection(scene.graph(), aspect)
            .and_then(|vp| Ok((vp, camera.position(scene.graph())?)));
        let (view_proj, camera_pos) = match resolved {
            Ok(v) => v,
            Err(e) => {
                log::warn!("camera unavailable, drawing nothing: {e}");
                return None;
            }
        };

        let items = scene.light_items();
        let mut lights = [LightUniforms::zeroed(); MAX_LIGHTS];
        for (slot, item) in lights.iter_mut().zip(&items) {
            *slot = LightUniforms::from_item(item);
        }
        Some(SceneUniforms {
            view_proj: view_proj.to_cols_array_2d(),
            camera_pos: camera_pos.to_array(),
            light_count: items.len().min(MAX_LIGHTS) as u32,
            lights,
        })
    }

    /// Records the picking pass: clears `target`, then draws every pickable
    /// object with its id color.
    ///
    /// Nothing is recorded once `target` has been finalized.
    pub fn render_picking(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        scene: &Scene,
        target: &PickingBuffer,
    ) {
        if target.is_finalized() {
            return;
        }
        self.sync_meshes(device, scene);

        let (width, height) = target.size();
        let items: Vec<DrawItem> = scene
            .draw_items()
            .into_iter()
            .filter(|item| item.id.is_some())
            .collect();
        let uniforms = Self::scene_uniforms(scene, width as f32 / height as f32);
        if let Some(uniforms) = &uniforms {
            let objects: Vec<_> = items.iter().map(ObjectUniforms::from_item).collect();
            self.picking_uniforms
                .upload(device, queue, &self.layouts, uniforms, &objects);
        }

        let Some(mut pass) = target.begin_pass(encoder) else {
            return;
        };
        if uniforms.is_some() {
            self.draw(&mut pass, &self.picking_pipeline, &self.picking_uniforms, &items);
        }
    }

    /// Records the lit pass into `target` (a surface view of `size`).
    pub fn render_lit(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        target: &wgpu::TextureView,
        size: (u32, u32),
        scene: &Scene,
    ) {
        self.sync_meshes(device, scene);
        self.ensure_depth_size(device, size.0, size.1);

        let items = scene.draw_items();
        let aspect = size.0.max(1) as f32 / size.1.max(1) as f32;
        let uniforms = Self::scene_uniforms(scene, aspect);
        if let Some(uniforms) = &uniforms {
            let objects: Vec<_> = items.iter().map(ObjectUniforms::from_item).collect();
            self.lit_uniforms
                .upload(device, queue, &self.layouts, uniforms, &objects);
        }

        let Some((_, depth_view)) = &self.depth else {
            return;
        };
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Lit Render Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(self.clear_color.into()),
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: depth_view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        if uniforms.is_some() {
            self.draw(&mut pass, &self.lit_pipeline, &self.lit_uniforms, &items);
        }
    }

    fn draw(
        &self,
        pass: &mut wgpu::RenderPass<'_>,
        pipeline: &wgpu::RenderPipeline,
        uniforms: &PassUniforms,
        items: &[DrawItem],
    ) {
        pass.set_pipeline(pipeline);
        pass.set_bind_group(0, &uniforms.scene_bind_group, &[]);

        for (slot, item) in items.iter().enumerate() {
            let Some(mesh) = self.meshes.get(item.mesh.index()) else {
                continue;
            };
            if mesh.is_empty() {
                continue;
            }
            pass.set_bind_group(1, &uniforms.object_bind_group, &[uniforms.offset(slot)]);
            pass.set_vertex_buffer(0, mesh.vertex_buffer.slice(..));
            pass.set_index_buffer(mesh.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
            pass.draw_indexed(0..mesh.index_count, 0, 0..1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem::offset_of;

    #[test]
    fn scene_uniforms_match_wgsl_layout() {
        assert_eq!(offset_of!(SceneUniforms, camera_pos), 64);
        assert_eq!(offset_of!(SceneUniforms, light_count), 76);
        assert_eq!(offset_of!(SceneUniforms, lights), 80);
        assert_eq!(size_of::<SceneUniforms>(), 80 + 64 * MAX_LIGHTS);

        assert_eq!(offset_of!(LightUniforms, kind), 12);
        assert_eq!(offset_of!(LightUniforms, direction), 16);
        assert_eq!(offset_of!(LightUniforms, color), 32);
        assert_eq!(offset_of!(LightUniforms, cos_angle), 44);
        assert_eq!(offset_of!(LightUniforms, smoothness), 48);
        assert_eq!(size_of::<LightUniforms>(), 64);
    }

    #[test]
    fn spot_lights_upload_their_cone() {
        let item = LightItem {
            light: crate::light::Light::spot(0.3, std::f32::consts::FRAC_PI_3, 100.0),
            position: glam::Vec3::Y,
            direction: glam::Vec3::NEG_Y,
        };
        let uniforms = LightUniforms::from_item(&item);
        assert_eq!(uniforms.kind, 3);
        assert!((uniforms.cos_angle - 0.5).abs() < 1e-6);
        assert_eq!(uniforms.smoothness, 100.0);
        assert_eq!(uniforms.direction, [0.0, -1.0, 0.0]);
    }

    #[test]
    fn object_uniforms_match_wgsl_layout() {
        assert_eq!(offset_of!(ObjectUniforms, color), 128);
        assert_eq!(offset_of!(ObjectUniforms, pick_color), 144);
        assert_eq!(size_of::<ObjectUniforms>(), 160);
    }

    #[test]
    fn slots_are_aligned_and_keep_their_own_data() {
        assert_eq!(object_stride(256), 256);
        assert_eq!(object_stride(64), 192);

        let mut a = ObjectUniforms::zeroed();
        a.color = [1.0, 0.0, 0.0, 1.0];
        let mut b = ObjectUniforms::zeroed();
        b.color = [0.0, 1.0, 0.0, 1.0];

        let bytes = pack_slots(&[a, b], 256);
        assert_eq!(bytes.len(), 512);
        let size = size_of::<ObjectUniforms>();
        let second: ObjectUniforms = bytemuck::pod_read_unaligned(&bytes[256..256 + size]);
        assert_eq!(second.color, b.color);
        let first: ObjectUniforms = bytemuck::pod_read_unaligned(&bytes[..size]);
        assert_eq!(first.color, a.color);
    }

    #[test]
    fn non_pickable_objects_write_no_id() {
        let item = DrawItem {
            mesh: crate::ecs::MeshId(0),
            model: glam::Mat4::IDENTITY,
            color: Color::WHITE,
            id: None,
        };
        assert_eq!(ObjectUniforms::from_item(&item).pick_color, [0.0; 4]);
    }
}
