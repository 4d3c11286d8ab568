//! # Bevy Edge Outline
//!
//! A screen-space outline post-process for Bevy 0.18.
//!
//! Edges are found where the depth or the normal of neighboring pixels changes
//! sharply, faded by view distance, and blended over the scene together with an
//! optional flat fill color. Add [`EdgeOutline`] to a 3D camera to enable it.
//!
//! The same per-pixel program is available on the CPU through
//! [`kernel::composite`], working on plain buffers.
//!
//! ## Quick Start
//!
//! ```no_run
//! use bevy::prelude::*;
//! use bevy_edge_outline::prelude::*;
//!
//! fn main() {
//!     App::new()
//!         .add_plugins((DefaultPlugins, EdgeOutlinePlugin))
//!         .add_systems(Startup, setup)
//!         .run();
//! }
//!
//! fn setup(
//!     mut commands: Commands,
//!     mut meshes: ResMut<Assets<Mesh>>,
//!     mut materials: ResMut<Assets<StandardMaterial>>,
//! ) {
//!     commands.spawn((
//!         Mesh3d(meshes.add(Cuboid::default())),
//!         MeshMaterial3d(materials.add(Color::srgb(0.8, 0.2, 0.2))),
//!     ));
//!
//!     // The plugin switches outlined cameras to `Msaa::Off`
//!     commands.spawn((
//!         Camera3d::default(),
//!         Transform::from_xyz(0.0, 2.0, 5.0).looking_at(Vec3::ZERO, Vec3::Y),
//!         EdgeOutline::default(),
//!     ));
//! }
//! ```

mod components;
mod error;
pub mod frame;
pub mod kernel;
mod render;

pub mod prelude {
    pub use crate::components::{EdgeOutline, FadeLimits, OutlinePreview};
    pub use crate::EdgeOutlinePlugin;
}

pub use components::*;
pub use error::{OutlineError, OutlineResult};
pub use render::{EdgeOutlineLabel, EDGE_OUTLINE_SHADER};

use bevy::{asset::embedded_asset, prelude::*};

use render::OutlineRenderPlugin;

/// Plugin that enables the screen-space edge outline.
pub struct EdgeOutlinePlugin;

impl Plugin for EdgeOutlinePlugin {
    fn build(&self, app: &mut App) {
        embedded_asset!(app, "shaders/edge_outline.wgsl");

        app.register_type::<EdgeOutline>()
            .register_type::<OutlinePreview>()
            .add_plugins(OutlineRenderPlugin)
            .add_systems(PostUpdate, (clamp_fade_limit_edits, force_msaa_off));
    }
}
