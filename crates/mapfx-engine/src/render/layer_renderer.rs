use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, anyhow, bail};
use image::RgbaImage;
use wgpu::util::DeviceExt;

use crate::attribute::AttributeBuffer;
use crate::layer::{DrawCall, DrawSink, LayerId, TextureSource};
use crate::render::{RenderCtx, RenderTarget};
use crate::shader::{CompiledProgram, FRAGMENT_ENTRY, ProgramFingerprint, VERTEX_ENTRY};

use super::common::{QUAD_INDICES, QUAD_VERTICES, QuadVertex, instance_attributes, straight_alpha_blend};

/// GPU backend for [`LayerStack`](crate::layer::LayerStack) draw calls.
///
/// Resources are cached across frames:
/// - one render pipeline per program fingerprint
/// - one vertex buffer per layer attribute, re-uploaded when its generation moves
/// - one texture per bitmap source, keyed by pixel identity, in [`BITMAP_TEXTURE_FORMAT`]
///
/// Uniform buffers are created per draw. Draws are collected through
/// [`LayerRenderer::sink`] and recorded into a single pass by
/// [`LayerRenderer::encode`]; caches not touched during the frame are dropped there.
#[derive(Default)]
pub struct LayerRenderer {
    surface_format: Option<wgpu::TextureFormat>,

    quad_vbo: Option<wgpu::Buffer>,
    quad_ibo: Option<wgpu::Buffer>,
    sampler: Option<wgpu::Sampler>,

    programs: HashMap<ProgramFingerprint, GpuProgram>,
    textures: HashMap<usize, GpuTexture>,
    instances: HashMap<LayerId, InstanceBuffers>,

    pending: Vec<PreparedDraw>,
    frame: u64,
}

struct GpuProgram {
    pipeline: wgpu::RenderPipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    textured: bool,
}

struct GpuTexture {
    // Keeps the pixel address (the cache key) from being reused while cached.
    _image: Arc<RgbaImage>,
    view: wgpu::TextureView,
    last_used: u64,
}

struct InstanceBuffers {
    signature: Vec<BufferSignature>,
    buffers: Vec<wgpu::Buffer>,
    last_used: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct BufferSignature {
    generation: u64,
    data: usize,
    len: usize,
}

impl BufferSignature {
    fn of(buffer: &AttributeBuffer) -> Self {
        Self {
            generation: buffer.generation(),
            data: buffer.data().as_ptr() as usize,
            len: buffer.data().len(),
        }
    }
}

struct PreparedDraw {
    layer: LayerId,
    program: ProgramFingerprint,
    bind_group: wgpu::BindGroup,
    instance_count: u32,
}

impl LayerRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a frame and returns the sink the layer stack submits into.
    pub fn sink<'r, 'c>(&'r mut self, ctx: &'r RenderCtx<'c>) -> FrameSink<'r, 'c> {
        if self.surface_format != Some(ctx.surface_format) {
            self.programs.clear();
            self.surface_format = Some(ctx.surface_format);
        }
        self.frame += 1;
        self.pending.clear();
        FrameSink { renderer: self, ctx }
    }

    /// Draws queued this frame.
    pub fn pending_draws(&self) -> usize {
        self.pending.len()
    }

    /// Records every draw submitted since [`sink`](Self::sink) into one pass.
    ///
    /// `clear = None` loads the existing target contents.
    pub fn encode(&mut self, ctx: &RenderCtx<'_>, target: &mut RenderTarget<'_>, clear: Option<wgpu::Color>) {
        self.ensure_static_buffers(ctx);
        let load = clear.map_or(wgpu::LoadOp::Load, wgpu::LoadOp::Clear);

        {
            let mut rpass = target.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("mapfx layer pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: target.color_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load,
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });

            if let (Some(quad_vbo), Some(quad_ibo)) = (self.quad_vbo.as_ref(), self.quad_ibo.as_ref()) {
                rpass.set_vertex_buffer(0, quad_vbo.slice(..));
                rpass.set_index_buffer(quad_ibo.slice(..), wgpu::IndexFormat::Uint16);

                for draw in &self.pending {
                    let Some(program) = self.programs.get(&draw.program) else { continue };
                    let Some(instances) = self.instances.get(&draw.layer) else { continue };

                    rpass.set_pipeline(&program.pipeline);
                    rpass.set_bind_group(0, &draw.bind_group, &[]);
                    for (i, buffer) in instances.buffers.iter().enumerate() {
                        rpass.set_vertex_buffer(i as u32 + 1, buffer.slice(..));
                    }
                    rpass.draw_indexed(0..QUAD_INDICES.len() as u32, 0, 0..draw.instance_count);
                }
            }
        }

        self.pending.clear();
        self.collect_garbage();
    }

    // ── private helpers ────────────────────────────────────────────────────

    fn prepare(&mut self, ctx: &RenderCtx<'_>, call: DrawCall<'_>) -> anyhow::Result<()> {
        check_uniform_block(call.block.len())?;
        self.ensure_static_buffers(ctx);
        self.ensure_program(ctx, call.program, call.attributes)?;
        self.ensure_instances(ctx, call.layer, call.attributes);

        let program = self
            .programs
            .get(&call.program.fingerprint())
            .ok_or_else(|| anyhow!("pipeline for {} missing", call.program.fingerprint()))?;

        let ubo = ctx.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("mapfx layer ubo"),
            contents: call.block.as_bytes(),
            usage: wgpu::BufferUsages::UNIFORM,
        });

        let bind_group = if program.textured {
            let texture = call
                .texture
                .ok_or_else(|| anyhow!("textured program without a texture"))?;
            let view = texture_view(&mut self.textures, ctx, texture, self.frame);
            let sampler = self.sampler.as_ref().context("sampler not created")?;
            ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("mapfx layer bind group"),
                layout: &program.bind_group_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: ubo.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: wgpu::BindingResource::TextureView(view),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: wgpu::BindingResource::Sampler(sampler),
                    },
                ],
            })
        } else {
            ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("mapfx layer bind group"),
                layout: &program.bind_group_layout,
                entries: &[wgpu::BindGroupEntry {
                    binding: 0,
                    resource: ubo.as_entire_binding(),
                }],
            })
        };

        self.pending.push(PreparedDraw {
            layer: call.layer.clone(),
            program: call.program.fingerprint(),
            bind_group,
            instance_count: call.instance_count,
        });
        Ok(())
    }

    fn ensure_program(
        &mut self,
        ctx: &RenderCtx<'_>,
        program: &CompiledProgram,
        attributes: &[AttributeBuffer],
    ) -> anyhow::Result<()> {
        let fingerprint = program.fingerprint();
        if self.programs.contains_key(&fingerprint) {
            return Ok(());
        }

        let widths: Vec<u8> = attributes.iter().map(AttributeBuffer::width).collect();
        let attrs = instance_attributes(&widths).context("attribute width has no vertex format")?;

        let mut buffers = vec![QuadVertex::layout()];
        buffers.extend(attrs.iter().zip(attributes).map(|(attr, buffer)| wgpu::VertexBufferLayout {
            array_stride: buffer.stride_bytes(),
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: attr,
        }));

        let shader = ctx.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("mapfx layer shader"),
            source: wgpu::ShaderSource::Wgsl(program.source().into()),
        });

        let textured = program.is_textured();
        let mut entries = vec![wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        }];
        if textured {
            entries.push(wgpu::BindGroupLayoutEntry {
                binding: 1,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    view_dimension: wgpu::TextureViewDimension::D2,
                    multisampled: false,
                },
                count: None,
            });
            entries.push(wgpu::BindGroupLayoutEntry {
                binding: 2,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            });
        }

        let bind_group_layout = ctx.device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("mapfx layer bgl"),
            entries: &entries,
        });

        let pipeline_layout = ctx.device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("mapfx layer pipeline layout"),
            bind_group_layouts: &[&bind_group_layout],
            immediate_size: 0,
        });

        let pipeline = ctx.device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("mapfx layer pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some(VERTEX_ENTRY),
                compilation_options: Default::default(),
                buffers: &buffers,
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some(FRAGMENT_ENTRY),
                compilation_options: Default::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format: ctx.surface_format,
                    blend: Some(straight_alpha_blend()),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview_mask: None,
            cache: None,
        });

        log::debug!("pipeline {fingerprint} created (textured: {textured})");
        self.programs.insert(
            fingerprint,
            GpuProgram {
                pipeline,
                bind_group_layout,
                textured,
            },
        );
        Ok(())
    }

    fn ensure_instances(&mut self, ctx: &RenderCtx<'_>, layer: &LayerId, attributes: &[AttributeBuffer]) {
        let signature: Vec<BufferSignature> = attributes.iter().map(BufferSignature::of).collect();
        let frame = self.frame;

        if let Some(entry) = self.instances.get_mut(layer) {
            entry.last_used = frame;
            if entry.signature == signature {
                return;
            }
        }

        let buffers = attributes
            .iter()
            .map(|buffer| {
                ctx.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("mapfx attribute vbo"),
                    contents: buffer.as_bytes(),
                    usage: wgpu::BufferUsages::VERTEX,
                })
            })
            .collect();

        self.instances.insert(
            layer.clone(),
            InstanceBuffers {
                signature,
                buffers,
                last_used: frame,
            },
        );
    }

    fn ensure_static_buffers(&mut self, ctx: &RenderCtx<'_>) {
        if self.quad_vbo.is_none() {
            self.quad_vbo = Some(ctx.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("mapfx quad vbo"),
                contents: bytemuck::cast_slice(&QUAD_VERTICES),
                usage: wgpu::BufferUsages::VERTEX,
            }));
        }
        if self.quad_ibo.is_none() {
            self.quad_ibo = Some(ctx.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("mapfx quad ibo"),
                contents: bytemuck::cast_slice(&QUAD_INDICES),
                usage: wgpu::BufferUsages::INDEX,
            }));
        }
        if self.sampler.is_none() {
            self.sampler = Some(ctx.device.create_sampler(&wgpu::SamplerDescriptor {
                label: Some("mapfx bitmap sampler"),
                mag_filter: wgpu::FilterMode::Linear,
                min_filter: wgpu::FilterMode::Linear,
                ..Default::default()
            }));
        }
    }

    fn collect_garbage(&mut self) {
        let frame = self.frame;
        self.instances.retain(|_, e| e.last_used == frame);
        self.textures.retain(|_, t| t.last_used == frame);
    }
}

/// Bitmap texels are sampled as stored, without sRGB decoding, so bitmap
/// effects see the same 0..1 values the CPU transforms work on.
pub const BITMAP_TEXTURE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

fn texture_view<'t>(
    textures: &'t mut HashMap<usize, GpuTexture>,
    ctx: &RenderCtx<'_>,
    source: &TextureSource,
    frame: u64,
) -> &'t wgpu::TextureView {
    let entry = textures
        .entry(source.id())
        .or_insert_with(|| upload_texture(ctx, Arc::clone(source.image())));
    entry.last_used = frame;
    &entry.view
}

fn upload_texture(ctx: &RenderCtx<'_>, image: Arc<RgbaImage>) -> GpuTexture {
    let size = wgpu::Extent3d {
        width: image.width().max(1),
        height: image.height().max(1),
        depth_or_array_layers: 1,
    };
    let texture = ctx.device.create_texture(&wgpu::TextureDescriptor {
        label: Some("mapfx bitmap"),
        size,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: BITMAP_TEXTURE_FORMAT,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });

    if image.width() > 0 && image.height() > 0 {
        ctx.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            image.as_raw(),
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4 * image.width()),
                rows_per_image: Some(image.height()),
            },
            size,
        );
    }

    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    GpuTexture {
        _image: image,
        view,
        last_used: 0,
    }
}

/// Per-frame [`DrawSink`] handing draw calls to a [`LayerRenderer`].
pub struct FrameSink<'r, 'c> {
    renderer: &'r mut LayerRenderer,
    ctx: &'r RenderCtx<'c>,
}

impl DrawSink for FrameSink<'_, '_> {
    fn submit(&mut self, call: DrawCall<'_>) {
        let layer = call.layer.clone();
        if let Err(e) = self.renderer.prepare(self.ctx, call) {
            log::warn!("layer `{layer}` not drawn: {e:#}");
        }
    }
}

/// Rejects uniform blocks whose size cannot back a WGSL uniform struct.
pub fn check_uniform_block(len: usize) -> anyhow::Result<()> {
    if len == 0 || len % 16 != 0 {
        bail!("uniform block of {len} bytes is not a multiple of 16");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_blocks_are_16_byte_multiples() {
        assert!(check_uniform_block(48).is_ok());
        assert!(check_uniform_block(0).is_err());
        assert!(check_uniform_block(20).is_err());
    }

    #[test]
    fn bitmaps_are_sampled_without_srgb_decoding() {
        assert_eq!(BITMAP_TEXTURE_FORMAT, wgpu::TextureFormat::Rgba8Unorm);
        assert!(!BITMAP_TEXTURE_FORMAT.is_srgb());
    }

    #[test]
    fn signature_tracks_generation() {
        let a = BufferSignature {
            generation: 1,
            data: 0x1000,
            len: 8,
        };
        assert_ne!(a, BufferSignature { generation: 2, ..a });
        assert_eq!(a, BufferSignature { ..a });
    }
}
