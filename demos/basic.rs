//! Basic example showing how to use bevy_edge_outline.
//!
//! Run with: cargo run --example basic

use bevy::prelude::*;
use bevy_edge_outline::prelude::*;

fn main() {
    App::new()
        .add_plugins((DefaultPlugins, EdgeOutlinePlugin))
        .add_systems(Startup, setup)
        .add_systems(Update, rotate_shapes)
        .run();
}

#[derive(Component)]
struct Rotates;

fn setup(
    mut commands: Commands,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
) {
    commands.spawn((
        Mesh3d(meshes.add(Cuboid::new(1.0, 1.0, 1.0))),
        MeshMaterial3d(materials.add(Color::srgb(0.8, 0.2, 0.2))),
        Transform::from_xyz(-2.0, 0.5, 0.0),
        Rotates,
    ));

    commands.spawn((
        Mesh3d(meshes.add(Sphere::new(0.6))),
        MeshMaterial3d(materials.add(Color::srgb(0.2, 0.8, 0.2))),
        Transform::from_xyz(0.0, 0.6, 0.0),
    ));

    commands.spawn((
        Mesh3d(meshes.add(Torus::new(0.3, 0.6))),
        MeshMaterial3d(materials.add(Color::srgb(0.2, 0.2, 0.8))),
        Transform::from_xyz(2.0, 0.6, 0.0),
        Rotates,
    ));

    // Ground plane
    commands.spawn((
        Mesh3d(meshes.add(Plane3d::default().mesh().size(10.0, 10.0))),
        MeshMaterial3d(materials.add(Color::srgb(0.3, 0.3, 0.3))),
    ));

    commands.spawn((
        DirectionalLight {
            illuminance: 10000.0,
            shadows_enabled: true,
            ..default()
        },
        Transform::from_xyz(4.0, 8.0, 4.0).looking_at(Vec3::ZERO, Vec3::Y),
    ));

    // Camera with the outline effect; MSAA is switched off by the plugin
    commands.spawn((
        Camera3d::default(),
        Transform::from_xyz(0.0, 4.0, 7.0).looking_at(Vec3::ZERO, Vec3::Y),
        EdgeOutline::default()
            .with_outline(LinearRgba::BLACK, 1.0, 2, 0.05)
            .with_normal_outline(0.8, 1, 0.3),
    ));
}

fn rotate_shapes(time: Res<Time>, mut query: Query<&mut Transform, With<Rotates>>) {
    for mut transform in query.iter_mut() {
        transform.rotate_y(time.delta_secs() * 0.5);
    }
}
