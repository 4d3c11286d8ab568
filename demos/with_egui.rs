//! Example with an egui panel editing every outline parameter.
//!
//! Run with: cargo run --example with_egui

use bevy::prelude::*;
use bevy_edge_outline::prelude::*;
use bevy_egui::{egui, EguiContexts, EguiPlugin, EguiPrimaryContextPass};

fn main() {
    App::new()
        .add_plugins((DefaultPlugins, EguiPlugin::default(), EdgeOutlinePlugin))
        .add_systems(Startup, setup)
        .add_systems(EguiPrimaryContextPass, ui_system)
        .add_systems(Update, rotate_cube)
        .run();
}

#[derive(Component)]
struct OutlinedCube;

fn setup(
    mut commands: Commands,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
) {
    commands.spawn((
        Mesh3d(meshes.add(Cuboid::new(2.0, 2.0, 2.0))),
        MeshMaterial3d(materials.add(Color::srgb(0.8, 0.2, 0.2))),
        Transform::from_xyz(0.0, 1.0, 0.0),
        OutlinedCube,
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

    commands.spawn((
        Camera3d::default(),
        Transform::from_xyz(0.0, 5.0, 8.0).looking_at(Vec3::ZERO, Vec3::Y),
        EdgeOutline::default(),
    ));
}

fn rgba_edit(ui: &mut egui::Ui, label: &str, color: &mut LinearRgba) {
    let mut rgba = [color.red, color.green, color.blue, color.alpha];
    ui.horizontal(|ui| {
        ui.label(label);
        ui.color_edit_button_rgba_unmultiplied(&mut rgba);
    });
    *color = LinearRgba::new(rgba[0], rgba[1], rgba[2], rgba[3]);
}

fn fade_edit(ui: &mut egui::Ui, label: &str, limits: &mut FadeLimits) {
    ui.horizontal(|ui| {
        ui.label(label);
        ui.add(egui::DragValue::new(&mut limits.start).speed(0.1));
        ui.add(egui::DragValue::new(&mut limits.end).speed(0.1));
    });
}

fn ui_system(mut contexts: EguiContexts, mut outlines: Query<&mut EdgeOutline>) -> Result {
    let Ok(mut outline) = outlines.single_mut() else {
        return Ok(());
    };

    // Edit a copy so the component is only marked changed on real edits
    let mut edited = *outline;
    egui::Window::new("Edge Outline").show(contexts.ctx_mut()?, |ui| {
        ui.label("General");
        ui.checkbox(&mut edited.enabled, "Enable");

        ui.separator();
        ui.label("Outline");
        rgba_edit(ui, "Color", &mut edited.outline_color);
        ui.add(egui::Slider::new(&mut edited.outline_strength, 0.0..=1.0).text("Strength"));
        ui.add(egui::Slider::new(&mut edited.outline_width, 1..=20).text("Width"));
        ui.add(egui::Slider::new(&mut edited.outline_cutoff, 0.0..=1.0).text("Cutoff"));
        ui.add(
            egui::Slider::new(&mut edited.normal_outline_strength, 0.0..=1.0)
                .text("Normal Strength"),
        );
        ui.add(egui::Slider::new(&mut edited.normal_outline_width, 1..=20).text("Normal Width"));
        ui.add(
            egui::Slider::new(&mut edited.normal_outline_cutoff, 0.0..=1.0).text("Normal Cutoff"),
        );
        fade_edit(ui, "Near Fade Out Limits", &mut edited.near_fade_out_limits);
        fade_edit(ui, "Far Fade Out Limits", &mut edited.far_fade_out_limits);

        ui.separator();
        ui.label("Fill");
        ui.add(egui::Slider::new(&mut edited.fill_strength, 0.0..=1.0).text("Strength"));
        rgba_edit(ui, "Color", &mut edited.fill_color);

        if !edited.is_active() {
            ui.colored_label(egui::Color32::YELLOW, "Effect inactive with these settings");
        }
    });

    if edited != *outline {
        // Fade limits are clamped to >= 0 by the plugin after the edit lands
        *outline = edited;
    }
    Ok(())
}

fn rotate_cube(time: Res<Time>, mut query: Query<&mut Transform, With<OutlinedCube>>) {
    for mut transform in query.iter_mut() {
        transform.rotate_y(time.delta_secs() * 0.5);
    }
}
