//! Per-frame inputs for the outline compositor.
//!
//! All buffers are plain row-major data owned by the caller for one frame.

use bevy::prelude::*;

use crate::error::OutlineError;

/// Distance used for depth samples that hit nothing (cleared reverse-Z depth).
pub const BACKGROUND_DISTANCE: f32 = 1.0e6;

/// How the depth buffer maps to view distance.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum DepthEncoding {
    /// Samples already hold linear view distance.
    #[default]
    Linear,
    /// Bevy's infinite reverse-Z perspective: `depth = near / distance`.
    ReverseZPerspective { near: f32 },
    /// Bevy's reverse-Z orthographic: `depth = (far - distance) / (far - near)`.
    ReverseZOrthographic { near: f32, far: f32 },
}

impl DepthEncoding {
    /// Shader-side tag for [`DepthEncoding`], see `edge_outline.wgsl`.
    pub fn kind(&self) -> u32 {
        match self {
            Self::Linear => 0,
            Self::ReverseZPerspective { .. } => 1,
            Self::ReverseZOrthographic { .. } => 2,
        }
    }

    /// `(near, far)` clip planes, zero where the encoding does not use them.
    pub fn planes(&self) -> (f32, f32) {
        match *self {
            Self::Linear => (0.0, 0.0),
            Self::ReverseZPerspective { near } => (near, 0.0),
            Self::ReverseZOrthographic { near, far } => (near, far),
        }
    }

    /// Encoding matching a Bevy camera projection.
    ///
    /// Returns `None` for custom projections, whose depth layout is unknown.
    pub fn from_projection(projection: &Projection) -> Option<Self> {
        match projection {
            Projection::Orthographic(ortho) => Some(Self::ReverseZOrthographic {
                near: ortho.near,
                far: ortho.far,
            }),
            Projection::Perspective(perspective) => Some(Self::ReverseZPerspective {
                near: perspective.near,
            }),
            Projection::Custom(_) => None,
        }
    }
}

/// Decodes a raw depth sample to view distance, following [`DepthEncoding::kind`].
///
/// Shared by the CPU kernel and mirrored in the WGSL shader.
pub fn decode_depth(kind: u32, near: f32, far: f32, raw: f32) -> f32 {
    match kind {
        1 => {
            if raw <= 0.0 {
                BACKGROUND_DISTANCE
            } else {
                (near / raw).min(BACKGROUND_DISTANCE)
            }
        }
        2 => far - raw * (far - near),
        _ => raw,
    }
}

/// Encodes a unit normal the way it is stored in the normal buffer.
pub fn encode_normal(normal: Vec3) -> [f32; 3] {
    let n = normal.normalize_or_zero() * 0.5 + Vec3::splat(0.5);
    n.to_array()
}

/// Decodes a stored normal back to a unit vector.
pub fn decode_normal(encoded: [f32; 3]) -> Vec3 {
    (Vec3::from_array(encoded) * 2.0 - Vec3::ONE).normalize_or_zero()
}

/// The host's buffers for one frame, all at the same resolution.
#[derive(Clone, Debug)]
pub struct FrameBuffers {
    pub width: u32,
    pub height: u32,
    pub color: Vec<LinearRgba>,
    /// `None` when the host did not produce a depth buffer this frame.
    pub depth: Option<Vec<f32>>,
    pub depth_encoding: DepthEncoding,
    /// Encoded normals, `None` when the host did not produce them.
    pub normals: Option<Vec<[f32; 3]>>,
}

impl FrameBuffers {
    /// Buffers of the given size filled with a single color, depth and normal.
    pub fn uniform(width: u32, height: u32, color: LinearRgba, depth: f32, normal: Vec3) -> Self {
        let len = (width as usize) * (height as usize);
        Self {
            width,
            height,
            color: vec![color; len],
            depth: Some(vec![depth; len]),
            depth_encoding: DepthEncoding::Linear,
            normals: Some(vec![encode_normal(normal); len]),
        }
    }

    pub fn pixel_count(&self) -> usize {
        (self.width as usize) * (self.height as usize)
    }

    pub fn index(&self, x: u32, y: u32) -> usize {
        (y as usize) * (self.width as usize) + x as usize
    }

    /// Checks that every present buffer matches the frame size.
    pub fn validate(&self) -> Result<(), OutlineError> {
        if self.width == 0 || self.height == 0 {
            return Err(OutlineError::EmptyTarget {
                width: self.width,
                height: self.height,
            });
        }

        let expected = self.pixel_count();
        check_len("color", expected, self.color.len())?;
        if let Some(depth) = &self.depth {
            check_len("depth", expected, depth.len())?;
        }
        if let Some(normals) = &self.normals {
            check_len("normal", expected, normals.len())?;
        }
        Ok(())
    }
}

fn check_len(buffer: &'static str, expected: usize, actual: usize) -> Result<(), OutlineError> {
    if expected != actual {
        return Err(OutlineError::BufferSizeMismatch {
            buffer,
            expected,
            actual,
        });
    }
    Ok(())
}

/// Host state that decides whether the pass may run this frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameContext {
    pub post_processing_enabled: bool,
    /// Preview, thumbnail and other non-game cameras.
    pub preview_camera: bool,
    /// Whether the render target is usable (e.g. not a zero-sized preview target).
    pub target_valid: bool,
}

impl Default for FrameContext {
    fn default() -> Self {
        Self {
            post_processing_enabled: true,
            preview_camera: false,
            target_valid: true,
        }
    }
}

impl FrameContext {
    pub fn allows_post_processing(&self) -> bool {
        self.post_processing_enabled && !self.preview_camera && self.target_valid
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn projections_pick_their_depth_encoding() {
        let perspective = Projection::Perspective(PerspectiveProjection {
            near: 0.5,
            ..default()
        });
        assert_eq!(
            DepthEncoding::from_projection(&perspective),
            Some(DepthEncoding::ReverseZPerspective { near: 0.5 })
        );

        let ortho = OrthographicProjection {
            near: 2.0,
            far: 40.0,
            ..OrthographicProjection::default_3d()
        };
        assert_eq!(
            DepthEncoding::from_projection(&Projection::Orthographic(ortho)),
            Some(DepthEncoding::ReverseZOrthographic {
                near: 2.0,
                far: 40.0
            })
        );
    }

    #[test]
    fn perspective_depth_decodes_to_distance() {
        let near = 0.1;
        assert!((decode_depth(1, near, 0.0, 0.01) - 10.0).abs() < 1e-4);
        assert_eq!(decode_depth(1, near, 0.0, 0.0), BACKGROUND_DISTANCE);
    }

    #[test]
    fn orthographic_depth_decodes_to_distance() {
        assert_eq!(decode_depth(2, 1.0, 11.0, 1.0), 1.0);
        assert_eq!(decode_depth(2, 1.0, 11.0, 0.0), 11.0);
        assert_eq!(decode_depth(2, 1.0, 11.0, 0.5), 6.0);
    }

    #[test]
    fn normals_survive_encoding() {
        let n = Vec3::new(0.0, 0.6, 0.8);
        let decoded = decode_normal(encode_normal(n));
        assert!(decoded.abs_diff_eq(n, 1e-6));
    }

    #[test]
    fn validate_reports_mismatched_buffers() {
        let mut frame = FrameBuffers::uniform(4, 4, LinearRgba::BLACK, 1.0, Vec3::Z);
        assert!(frame.validate().is_ok());

        frame.normals = Some(vec![[0.5, 0.5, 1.0]; 3]);
        assert_eq!(
            frame.validate(),
            Err(OutlineError::BufferSizeMismatch {
                buffer: "normal",
                expected: 16,
                actual: 3,
            })
        );
    }

    #[test]
    fn zero_sized_target_is_rejected() {
        let frame = FrameBuffers::uniform(0, 8, LinearRgba::BLACK, 1.0, Vec3::Z);
        assert!(matches!(
            frame.validate(),
            Err(OutlineError::EmptyTarget { width: 0, height: 8 })
        ));
    }

    #[test]
    fn preview_cameras_never_post_process() {
        let ctx = FrameContext {
            preview_camera: true,
            ..Default::default()
        };
        assert!(!ctx.allows_post_processing());
        assert!(FrameContext::default().allows_post_processing());
    }
}
