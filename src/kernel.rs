//! The per-pixel edge outline program.
//!
//! For each pixel:
//! 1. Depth edge: largest relative view-distance jump across a cross of samples
//! 2. Normal edge: largest `1 - dot(n0, n)` across a cross of samples
//! 3. Fade the stronger of the two by view distance (near and far windows)
//! 4. Blend the outline color over the scene, then the fill color over everything
//!
//! `shaders/edge_outline.wgsl` runs the same program on the GPU; keep the two in
//! step. The CPU version here is used for software rendering and for tests.

use bevy::{
    color::Mix,
    log::{debug, trace},
    prelude::*,
    render::render_resource::ShaderType,
};
use rayon::prelude::*;

use crate::components::{EdgeOutline, MAX_OUTLINE_WIDTH, MIN_OUTLINE_WIDTH};
use crate::error::OutlineResult;
use crate::frame::{decode_depth, decode_normal, DepthEncoding, FrameBuffers, FrameContext};

/// Distances below this are treated as this when normalizing depth differences.
pub const MIN_DISTANCE: f32 = 1.0e-4;

/// Unit steps of the cross sampling pattern, scaled by `1..=width`.
const CROSS: [IVec2; 4] = [IVec2::X, IVec2::NEG_X, IVec2::Y, IVec2::NEG_Y];

/// Uniform parameter block shared by the CPU kernel and the outline shader.
#[derive(Clone, Copy, Debug, Default, PartialEq, ShaderType, bytemuck::Pod, bytemuck::Zeroable)]
#[repr(C)]
pub struct OutlineUniform {
    pub outline_color: [f32; 4],
    pub fill_color: [f32; 4],
    pub near_fade_start: f32,
    pub near_fade_end: f32,
    pub far_fade_start: f32,
    pub far_fade_end: f32,
    pub outline_strength: f32,
    pub outline_cutoff: f32,
    pub normal_outline_strength: f32,
    pub normal_outline_cutoff: f32,
    pub fill_strength: f32,
    pub outline_width: u32,
    pub normal_outline_width: u32,
    /// [`DepthEncoding::kind`]
    pub depth_encoding: u32,
    pub camera_near: f32,
    pub camera_far: f32,
    pub _padding: [f32; 2],
}

impl OutlineUniform {
    /// Snapshot of a configuration for one frame. Values are clamped to their ranges.
    pub fn from_config(config: &EdgeOutline, depth_encoding: DepthEncoding) -> Self {
        let config = config.sanitized();
        let (camera_near, camera_far) = depth_encoding.planes();
        Self {
            outline_color: rgba(config.outline_color),
            fill_color: rgba(config.fill_color),
            near_fade_start: config.near_fade_out_limits.start,
            near_fade_end: config.near_fade_out_limits.end,
            far_fade_start: config.far_fade_out_limits.start,
            far_fade_end: config.far_fade_out_limits.end,
            outline_strength: config.outline_strength,
            outline_cutoff: config.outline_cutoff,
            normal_outline_strength: config.normal_outline_strength,
            normal_outline_cutoff: config.normal_outline_cutoff,
            fill_strength: config.fill_strength,
            outline_width: config.outline_width,
            normal_outline_width: config.normal_outline_width,
            depth_encoding: depth_encoding.kind(),
            camera_near,
            camera_far,
            _padding: [0.0; 2],
        }
    }

    pub fn outline_color(&self) -> LinearRgba {
        from_rgba(self.outline_color)
    }

    pub fn fill_color(&self) -> LinearRgba {
        from_rgba(self.fill_color)
    }
}

fn rgba(color: LinearRgba) -> [f32; 4] {
    [color.red, color.green, color.blue, color.alpha]
}

fn from_rgba(c: [f32; 4]) -> LinearRgba {
    LinearRgba::new(c[0], c[1], c[2], c[3])
}

/// Decoded depth and normal neighborhoods for one frame.
pub struct EdgeSource<'a> {
    pub width: u32,
    pub height: u32,
    /// Linear view distance per pixel.
    pub distances: &'a [f32],
    /// Unit normal per pixel.
    pub normals: &'a [Vec3],
}

impl EdgeSource<'_> {
    fn clamped_index(&self, p: IVec2) -> usize {
        let x = p.x.clamp(0, self.width as i32 - 1) as usize;
        let y = p.y.clamp(0, self.height as i32 - 1) as usize;
        y * self.width as usize + x
    }

    pub fn distance(&self, p: IVec2) -> f32 {
        self.distances[self.clamped_index(p)]
    }

    pub fn normal(&self, p: IVec2) -> Vec3 {
        self.normals[self.clamped_index(p)]
    }
}

/// 0 to 1 ramp across `[start, end]`. An empty near window hides everything up
/// to and including `start`.
fn fade_in(start: f32, end: f32, x: f32) -> f32 {
    if end > start {
        ((x - start) / (end - start)).clamp(0.0, 1.0)
    } else if x <= start {
        0.0
    } else {
        1.0
    }
}

/// 1 to 0 ramp across `[start, end]`. An empty far window hides everything from
/// `start` on.
fn fade_out(start: f32, end: f32, x: f32) -> f32 {
    if end > start {
        1.0 - ((x - start) / (end - start)).clamp(0.0, 1.0)
    } else if x < start {
        1.0
    } else {
        0.0
    }
}

fn sample_width(width: u32) -> i32 {
    width.clamp(MIN_OUTLINE_WIDTH, MAX_OUTLINE_WIDTH) as i32
}

/// Visibility of the outline at a view distance.
pub fn distance_fade(uniform: &OutlineUniform, distance: f32) -> f32 {
    fade_in(uniform.near_fade_start, uniform.near_fade_end, distance)
        * fade_out(uniform.far_fade_start, uniform.far_fade_end, distance)
}

/// Depth edge intensity at `p`, either 0 or `outline_strength`.
pub fn depth_edge(uniform: &OutlineUniform, source: &EdgeSource, p: IVec2) -> f32 {
    let d0 = source.distance(p);
    let mut max_diff = 0.0f32;
    for k in 1..=sample_width(uniform.outline_width) {
        for step in CROSS {
            let d = source.distance(p + step * k);
            max_diff = max_diff.max((d - d0).abs());
        }
    }

    if max_diff / d0.max(MIN_DISTANCE) > uniform.outline_cutoff {
        uniform.outline_strength
    } else {
        0.0
    }
}

/// Normal edge intensity at `p`, either 0 or `normal_outline_strength`.
pub fn normal_edge(uniform: &OutlineUniform, source: &EdgeSource, p: IVec2) -> f32 {
    let n0 = source.normal(p);
    let mut max_diff = 0.0f32;
    for k in 1..=sample_width(uniform.normal_outline_width) {
        for step in CROSS {
            let n = source.normal(p + step * k);
            max_diff = max_diff.max(1.0 - n0.dot(n));
        }
    }

    if max_diff > uniform.normal_outline_cutoff {
        uniform.normal_outline_strength
    } else {
        0.0
    }
}

/// Combined, distance-faded outline intensity at `p`.
pub fn outline_intensity(uniform: &OutlineUniform, source: &EdgeSource, p: IVec2) -> f32 {
    let edge = depth_edge(uniform, source, p).max(normal_edge(uniform, source, p));
    if edge <= 0.0 {
        return 0.0;
    }
    edge * distance_fade(uniform, source.distance(p))
}

/// Final color of one pixel.
pub fn shade_pixel(
    uniform: &OutlineUniform,
    source: &EdgeSource,
    p: IVec2,
    scene: LinearRgba,
) -> LinearRgba {
    let intensity = outline_intensity(uniform, source, p);
    // Mix is `a * (1 - t) + b * t`, so t = 0 and t = 1 are exact
    let outlined = scene.mix(&uniform.outline_color(), intensity);
    outlined.mix(&uniform.fill_color(), uniform.fill_strength)
}

/// Runs the kernel over a whole frame with an already prepared uniform block.
///
/// Returns `Ok(None)` when the frame is missing its depth or normal buffer.
/// Sampling widths are clamped to `[MIN_OUTLINE_WIDTH, MAX_OUTLINE_WIDTH]`.
pub fn composite_with_uniform(
    uniform: &OutlineUniform,
    frame: &FrameBuffers,
) -> OutlineResult<Option<Vec<LinearRgba>>> {
    frame.validate()?;

    let (Some(depth), Some(normals)) = (&frame.depth, &frame.normals) else {
        debug!("outline skipped: depth or normal buffer unavailable");
        return Ok(None);
    };

    let distances: Vec<f32> = depth
        .par_iter()
        .map(|&raw| {
            decode_depth(
                uniform.depth_encoding,
                uniform.camera_near,
                uniform.camera_far,
                raw,
            )
        })
        .collect();
    let normals: Vec<Vec3> = normals.par_iter().map(|&n| decode_normal(n)).collect();

    let source = EdgeSource {
        width: frame.width,
        height: frame.height,
        distances: &distances,
        normals: &normals,
    };

    let width = frame.width as usize;
    let mut output = vec![LinearRgba::NONE; frame.pixel_count()];
    output
        .par_chunks_mut(width)
        .zip(frame.color.par_chunks(width))
        .enumerate()
        .for_each(|(y, (out_row, scene_row))| {
            for (x, (out, &scene)) in out_row.iter_mut().zip(scene_row).enumerate() {
                let p = IVec2::new(x as i32, y as i32);
                *out = shade_pixel(uniform, &source, p, scene);
            }
        });

    Ok(Some(output))
}

/// Composites one frame on the CPU.
///
/// `Ok(None)` means the pass was skipped for this frame: post-processing is
/// off, the camera is a preview camera, the target is unusable, the
/// configuration is inactive, or an input buffer is missing.
pub fn composite(
    frame: &FrameBuffers,
    context: &FrameContext,
    config: &EdgeOutline,
) -> OutlineResult<Option<Vec<LinearRgba>>> {
    if !context.allows_post_processing() || frame.width == 0 || frame.height == 0 {
        trace!("outline skipped: post-processing unavailable for this frame");
        return Ok(None);
    }

    if !config.is_active() {
        trace!("outline skipped: configuration inactive");
        return Ok(None);
    }

    let uniform = OutlineUniform::from_config(config, frame.depth_encoding);
    trace!(
        width = frame.width,
        height = frame.height,
        "compositing edge outline"
    );
    composite_with_uniform(&uniform, frame)
}
