//! Full-screen edge outline pass for Bevy's 3D render graph.
//!
//! 1. Extract: snapshot each camera's [`EdgeOutline`] into an [`OutlineUniform`],
//!    only for cameras whose effect is active this frame
//! 2. Prepare: create or refresh the per-view uniform buffer
//! 3. Node: run `edge_outline.wgsl` over the view target, reading the depth and
//!    normal prepass textures

use bevy::{
    core_pipeline::{
        core_3d::graph::{Core3d, Node3d},
        prepass::ViewPrepassTextures,
    },
    log::{debug, error_once, warn_once},
    prelude::*,
    render::{
        render_graph::{
            NodeRunError, RenderGraphContext, RenderGraphExt, RenderLabel, ViewNode, ViewNodeRunner,
        },
        render_resource::{
            binding_types::{
                sampler as sampler_layout, texture_2d, texture_depth_2d, uniform_buffer,
            },
            BindGroupEntries, BindGroupLayout, BindGroupLayoutDescriptor, BindGroupLayoutEntries,
            Buffer, BufferInitDescriptor, BufferUsages, CachedPipelineState, CachedRenderPipelineId,
            ColorTargetState, ColorWrites, FragmentState, MultisampleState, Operations,
            PipelineCache, PrimitiveState, RenderPassColorAttachment, RenderPassDescriptor,
            RenderPipelineDescriptor, Sampler, SamplerBindingType, SamplerDescriptor,
            ShaderStages, TextureFormat, TextureSampleType, VertexState,
        },
        renderer::{RenderContext, RenderDevice, RenderQueue},
        sync_world::RenderEntity,
        view::ViewTarget,
        Extract, ExtractSchedule, Render, RenderApp, RenderSystems,
    },
};

use crate::components::{EdgeOutline, OutlinePreview};
use crate::frame::{DepthEncoding, FrameContext};
use crate::kernel::OutlineUniform;

pub const EDGE_OUTLINE_SHADER: &str = "embedded://bevy_edge_outline/shaders/edge_outline.wgsl";

/// Per-view outline parameters for this frame. Absent when the pass should not run.
#[derive(Component, Clone, Copy)]
pub struct ExtractedEdgeOutline {
    pub uniform: OutlineUniform,
}

/// Cached GPU resources for one view, reused across frames.
#[derive(Component)]
pub struct OutlineViewResources {
    pub uniform_buffer: Buffer,
    /// Last uploaded value, to skip redundant buffer writes
    pub cached_uniform: OutlineUniform,
}

/// Render label for the edge outline node
#[derive(Debug, Hash, PartialEq, Eq, Clone, RenderLabel)]
pub struct EdgeOutlineLabel;

/// Frame gate for one camera. A camera that is switched off counts as having
/// post-processing disabled, and a zero-sized viewport is not a valid target.
pub fn camera_frame_context(
    camera_active: bool,
    preview: bool,
    viewport: Option<UVec2>,
) -> FrameContext {
    FrameContext {
        post_processing_enabled: camera_active,
        preview_camera: preview,
        target_valid: viewport.is_some_and(|size| size.x > 0 && size.y > 0),
    }
}

/// Uniform block a camera renders with this frame, or `None` when the pass is skipped.
///
/// `encoding` is `None` for projections whose depth layout cannot be decoded.
pub fn extraction_uniform(
    context: &FrameContext,
    outline: &EdgeOutline,
    encoding: Option<DepthEncoding>,
) -> Option<OutlineUniform> {
    if !outline.is_active() || !context.allows_post_processing() {
        return None;
    }
    let Some(encoding) = encoding else {
        warn_once!("edge outline skipped: custom camera projections are not supported");
        return None;
    };
    Some(OutlineUniform::from_config(outline, encoding))
}

/// Replaces last frame's snapshots with `snapshots`, one entry per view.
pub fn apply_extraction(
    commands: &mut Commands,
    stale: &Query<Entity, With<ExtractedEdgeOutline>>,
    snapshots: impl IntoIterator<Item = (Entity, Option<OutlineUniform>)>,
) {
    // Render entities outlive frames; start every frame from a clean slate.
    for entity in stale.iter() {
        commands.entity(entity).remove::<ExtractedEdgeOutline>();
    }

    for (entity, uniform) in snapshots {
        if let Some(uniform) = uniform {
            commands
                .entity(entity)
                .insert(ExtractedEdgeOutline { uniform });
        }
    }
}

/// Snapshot active outline configurations into the render world.
pub fn extract_edge_outlines(
    mut commands: Commands,
    cameras: Extract<
        Query<(
            &RenderEntity,
            &Camera,
            Ref<EdgeOutline>,
            &Projection,
            Has<OutlinePreview>,
        )>,
    >,
    stale: Query<Entity, With<ExtractedEdgeOutline>>,
) {
    let snapshots = cameras.iter().map(|(render_entity, camera, outline, projection, preview)| {
        let viewport = camera.physical_viewport_size();
        let context = camera_frame_context(camera.is_active, preview, viewport);
        if outline.is_changed() {
            debug!(
                "edge outline on {:?} is {}",
                render_entity.id(),
                if outline.is_active() { "active" } else { "inactive" }
            );
        }
        let encoding = DepthEncoding::from_projection(projection);
        (
            render_entity.id(),
            extraction_uniform(&context, &outline, encoding),
        )
    });
    apply_extraction(&mut commands, &stale, snapshots);
}

/// Creates the per-view uniform buffer, or rewrites it when the snapshot changed.
pub fn prepare_edge_outline_resources(
    mut commands: Commands,
    render_device: Res<RenderDevice>,
    render_queue: Res<RenderQueue>,
    mut views: Query<(
        Entity,
        &ExtractedEdgeOutline,
        Option<&mut OutlineViewResources>,
    )>,
) {
    for (entity, outline, existing) in views.iter_mut() {
        if let Some(mut existing) = existing {
            if existing.cached_uniform != outline.uniform {
                render_queue.write_buffer(
                    &existing.uniform_buffer,
                    0,
                    bytemuck::bytes_of(&outline.uniform),
                );
                existing.cached_uniform = outline.uniform;
            }
            continue;
        }

        let uniform_buffer = render_device.create_buffer_with_data(&BufferInitDescriptor {
            label: Some("edge_outline_uniform_buffer"),
            contents: bytemuck::bytes_of(&outline.uniform),
            usage: BufferUsages::UNIFORM | BufferUsages::COPY_DST,
        });

        commands.entity(entity).insert(OutlineViewResources {
            uniform_buffer,
            cached_uniform: outline.uniform,
        });
    }
}

/// Pipeline resource for the edge outline pass
#[derive(Resource)]
pub struct EdgeOutlinePipeline {
    pub layout: BindGroupLayout,
    pub pipeline_id: CachedRenderPipelineId,
    pub pipeline_id_hdr: CachedRenderPipelineId,
    pub sampler: Sampler,
}

impl FromWorld for EdgeOutlinePipeline {
    fn from_world(world: &mut World) -> Self {
        let render_device = world.resource::<RenderDevice>();
        let asset_server = world.resource::<AssetServer>();
        let pipeline_cache = world.resource::<PipelineCache>();

        let sampler = render_device.create_sampler(&SamplerDescriptor::default());

        let vertex_shader = asset_server
            .load("embedded://bevy_core_pipeline/fullscreen_vertex_shader/fullscreen.wgsl");
        let outline_shader = asset_server.load(EDGE_OUTLINE_SHADER);

        let layout_entries = BindGroupLayoutEntries::sequential(
            ShaderStages::FRAGMENT,
            (
                // Scene texture
                texture_2d(TextureSampleType::Float { filterable: true }),
                // Scene sampler
                sampler_layout(SamplerBindingType::Filtering),
                // Depth prepass
                texture_depth_2d(),
                // Normal prepass
                texture_2d(TextureSampleType::Float { filterable: false }),
                // Outline uniform
                uniform_buffer::<OutlineUniform>(false),
            ),
        );

        let layout = render_device
            .create_bind_group_layout(Some("edge_outline_bind_group_layout"), &layout_entries);
        let layout_desc =
            BindGroupLayoutDescriptor::new("edge_outline_bind_group_layout", &layout_entries);

        let queue_pipeline = |label: &'static str, format: TextureFormat| {
            pipeline_cache.queue_render_pipeline(RenderPipelineDescriptor {
                label: Some(label.into()),
                layout: vec![layout_desc.clone()],
                vertex: VertexState {
                    shader: vertex_shader.clone(),
                    shader_defs: vec![],
                    entry_point: Some("fullscreen_vertex_shader".into()),
                    buffers: vec![],
                },
                fragment: Some(FragmentState {
                    shader: outline_shader.clone(),
                    shader_defs: vec![],
                    entry_point: Some("fragment".into()),
                    targets: vec![Some(ColorTargetState {
                        format,
                        blend: None,
                        write_mask: ColorWrites::ALL,
                    })],
                }),
                primitive: PrimitiveState::default(),
                depth_stencil: None,
                multisample: MultisampleState::default(),
                push_constant_ranges: vec![],
                zero_initialize_workgroup_memory: false,
            })
        };

        let pipeline_id = queue_pipeline("edge_outline_pipeline", TextureFormat::bevy_default());
        let pipeline_id_hdr =
            queue_pipeline("edge_outline_pipeline_hdr", ViewTarget::TEXTURE_FORMAT_HDR);

        Self {
            layout,
            pipeline_id,
            pipeline_id_hdr,
            sampler,
        }
    }
}

/// Composites the outline over the view target.
#[derive(Default)]
pub struct EdgeOutlineNode;

impl ViewNode for EdgeOutlineNode {
    type ViewQuery = (
        &'static ViewTarget,
        Option<&'static ViewPrepassTextures>,
        Option<&'static Msaa>,
        Option<&'static ExtractedEdgeOutline>,
        Option<&'static OutlineViewResources>,
    );

    fn run<'w>(
        &self,
        _graph: &mut RenderGraphContext,
        render_context: &mut RenderContext<'w>,
        (view_target, prepass_textures, msaa, outline, resources): bevy::ecs::query::QueryItem<
            'w,
            '_,
            Self::ViewQuery,
        >,
        world: &'w World,
    ) -> Result<(), NodeRunError> {
        if outline.is_none() {
            return Ok(());
        }
        let Some(resources) = resources else {
            // Resources not yet prepared, skip this frame
            return Ok(());
        };

        let Some((depth_view, normal_view)) = prepass_textures
            .and_then(|textures| Some((textures.depth_view()?, textures.normal_view()?)))
        else {
            warn_once!("edge outline skipped: camera has no depth or normal prepass texture");
            return Ok(());
        };

        if msaa.is_some_and(|msaa| msaa.samples() > 1) {
            // Only reachable when MSAA is edited after `force_msaa_off` ran this frame
            warn_once!(
                "edge outline skipped: multisampled prepass textures are not supported, \
                 use Msaa::Off"
            );
            return Ok(());
        }

        let outline_pipeline = world.resource::<EdgeOutlinePipeline>();
        let pipeline_cache = world.resource::<PipelineCache>();

        let pipeline_id = if view_target.is_hdr() {
            outline_pipeline.pipeline_id_hdr
        } else {
            outline_pipeline.pipeline_id
        };

        if let CachedPipelineState::Err(err) = pipeline_cache.get_render_pipeline_state(pipeline_id)
        {
            error_once!("edge outline disabled, pipeline failed to build: {err}");
            return Ok(());
        }
        let Some(render_pipeline) = pipeline_cache.get_render_pipeline(pipeline_id) else {
            return Ok(());
        };

        // Rebuilt every frame since post_process.source alternates
        let post_process = view_target.post_process_write();

        let bind_group = render_context.render_device().create_bind_group(
            "edge_outline_bind_group",
            &outline_pipeline.layout,
            &BindGroupEntries::sequential((
                post_process.source,
                &outline_pipeline.sampler,
                depth_view,
                normal_view,
                resources.uniform_buffer.as_entire_binding(),
            )),
        );

        let mut render_pass = render_context.begin_tracked_render_pass(RenderPassDescriptor {
            label: Some("edge_outline_pass"),
            color_attachments: &[Some(RenderPassColorAttachment {
                view: post_process.destination,
                resolve_target: None,
                ops: Operations::default(),
                depth_slice: None,
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        render_pass.set_render_pipeline(render_pipeline);
        render_pass.set_bind_group(0, &bind_group, &[]);
        render_pass.draw(0..3, 0..1);

        Ok(())
    }
}

/// Plugin that sets up the edge outline render node
pub struct OutlineRenderPlugin;

impl Plugin for OutlineRenderPlugin {
    fn build(&self, app: &mut App) {
        let Some(render_app) = app.get_sub_app_mut(RenderApp) else {
            return;
        };

        render_app
            .add_systems(ExtractSchedule, extract_edge_outlines)
            .add_systems(
                Render,
                prepare_edge_outline_resources.in_set(RenderSystems::PrepareResources),
            )
            .add_render_graph_node::<ViewNodeRunner<EdgeOutlineNode>>(Core3d, EdgeOutlineLabel)
            .add_render_graph_edges(
                Core3d,
                (Node3d::EndMainPass, EdgeOutlineLabel, Node3d::Tonemapping),
            );
    }

    fn finish(&self, app: &mut App) {
        let Some(render_app) = app.get_sub_app_mut(RenderApp) else {
            return;
        };

        render_app.init_resource::<EdgeOutlinePipeline>();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VIEWPORT: Option<UVec2> = Some(UVec2::new(640, 480));
    const PERSPECTIVE: Option<DepthEncoding> =
        Some(DepthEncoding::ReverseZPerspective { near: 0.1 });

    #[test]
    fn camera_gate_follows_camera_state() {
        assert!(camera_frame_context(true, false, VIEWPORT).allows_post_processing());
        assert!(!camera_frame_context(false, false, VIEWPORT).allows_post_processing());
        assert!(!camera_frame_context(true, true, VIEWPORT).allows_post_processing());
        assert!(!camera_frame_context(true, false, None).allows_post_processing());
        assert!(!camera_frame_context(true, false, Some(UVec2::new(0, 480)))
            .allows_post_processing());
    }

    #[test]
    fn active_camera_gets_a_uniform() {
        let context = camera_frame_context(true, false, VIEWPORT);
        let outline = EdgeOutline::default();

        let uniform = extraction_uniform(&context, &outline, PERSPECTIVE);
        assert_eq!(
            uniform,
            Some(OutlineUniform::from_config(
                &outline,
                DepthEncoding::ReverseZPerspective { near: 0.1 }
            ))
        );
    }

    #[test]
    fn skipped_cameras_get_no_uniform() {
        let active = camera_frame_context(true, false, VIEWPORT);
        let outline = EdgeOutline::default();

        let preview = camera_frame_context(true, true, VIEWPORT);
        assert_eq!(extraction_uniform(&preview, &outline, PERSPECTIVE), None);

        let inactive = camera_frame_context(false, false, VIEWPORT);
        assert_eq!(extraction_uniform(&inactive, &outline, PERSPECTIVE), None);

        let disabled = EdgeOutline {
            enabled: false,
            ..default()
        };
        assert_eq!(extraction_uniform(&active, &disabled, PERSPECTIVE), None);

        assert_eq!(extraction_uniform(&active, &outline, None), None);
    }

    fn extract_in_place(
        mut commands: Commands,
        outlines: Query<(Entity, &EdgeOutline)>,
        stale: Query<Entity, With<ExtractedEdgeOutline>>,
    ) {
        let context = FrameContext::default();
        let snapshots = outlines.iter().map(|(entity, outline)| {
            let encoding = Some(DepthEncoding::Linear);
            (entity, extraction_uniform(&context, outline, encoding))
        });
        apply_extraction(&mut commands, &stale, snapshots);
    }

    #[test]
    fn disabling_removes_the_snapshot() {
        let mut app = App::new();
        app.add_systems(Update, extract_in_place);
        let camera = app.world_mut().spawn(EdgeOutline::default()).id();

        app.update();
        assert!(app.world().get::<ExtractedEdgeOutline>(camera).is_some());

        app.world_mut()
            .get_mut::<EdgeOutline>(camera)
            .unwrap()
            .enabled = false;
        app.update();
        assert!(app.world().get::<ExtractedEdgeOutline>(camera).is_none());

        app.world_mut()
            .get_mut::<EdgeOutline>(camera)
            .unwrap()
            .enabled = true;
        app.update();
        assert!(app.world().get::<ExtractedEdgeOutline>(camera).is_some());
    }
}
