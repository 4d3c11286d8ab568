use bevy::{
    core_pipeline::prepass::{DepthPrepass, NormalPrepass},
    log::warn_once,
    prelude::*,
};

/// Smallest sampling radius, in pixels, for either edge detector.
pub const MIN_OUTLINE_WIDTH: u32 = 1;
/// Largest sampling radius, in pixels, for either edge detector.
pub const MAX_OUTLINE_WIDTH: u32 = 20;

/// A `[start, end]` view-distance window over which the outline fades.
#[derive(Clone, Copy, Debug, Default, PartialEq, Reflect)]
pub struct FadeLimits {
    pub start: f32,
    pub end: f32,
}

impl FadeLimits {
    pub const fn new(start: f32, end: f32) -> Self {
        Self { start, end }
    }

    /// Both components clamped to `>= 0`.
    pub fn non_negative(self) -> Self {
        Self {
            start: self.start.max(0.0),
            end: self.end.max(0.0),
        }
    }

    /// Non-negative, with `end` pulled up to `start` when the window is inverted.
    pub fn sanitized(self) -> Self {
        let limits = self.non_negative();
        Self {
            start: limits.start,
            end: limits.end.max(limits.start),
        }
    }
}

/// Camera component that enables and configures the screen-space edge outline.
///
/// The effect detects depth and normal discontinuities in the camera's prepass
/// textures, so adding this component also requests the depth and normal
/// prepasses for the camera.
#[derive(Component, Clone, Copy, Debug, PartialEq, Reflect)]
#[reflect(Component, Default)]
#[require(DepthPrepass, NormalPrepass)]
pub struct EdgeOutline {
    /// Master switch.
    pub enabled: bool,
    /// Color drawn on detected edges.
    pub outline_color: LinearRgba,
    /// Intensity of depth edges, `[0, 1]`.
    pub outline_strength: f32,
    /// Depth edge sampling radius in pixels, `[1, 20]`.
    pub outline_width: u32,
    /// Relative depth difference above which a pixel is a depth edge.
    /// Must be below 1 for the effect to run.
    pub outline_cutoff: f32,
    /// Intensity of normal edges, `[0, 1]`.
    pub normal_outline_strength: f32,
    /// Normal edge sampling radius in pixels, `[1, 20]`.
    pub normal_outline_width: u32,
    /// `1 - dot(n0, n)` above which a pixel is a normal edge.
    /// Must be below 1 for the effect to run.
    pub normal_outline_cutoff: f32,
    /// Outlines closer than `start` are hidden and fade in until `end`.
    pub near_fade_out_limits: FadeLimits,
    /// Outlines fade out from `start` and are hidden past `end`.
    pub far_fade_out_limits: FadeLimits,
    /// How much of `fill_color` is laid over the whole frame, `[0, 1]`.
    pub fill_strength: f32,
    pub fill_color: LinearRgba,
}

impl Default for EdgeOutline {
    fn default() -> Self {
        Self {
            enabled: true,
            outline_color: LinearRgba::BLACK,
            outline_strength: 1.0,
            outline_width: 1,
            outline_cutoff: 0.1,
            normal_outline_strength: 1.0,
            normal_outline_width: 1,
            normal_outline_cutoff: 0.4,
            near_fade_out_limits: FadeLimits::new(0.0, 0.5),
            far_fade_out_limits: FadeLimits::new(50.0, 100.0),
            fill_strength: 0.0,
            fill_color: LinearRgba::new(0.9, 0.9, 0.84, 1.0),
        }
    }
}

impl EdgeOutline {
    /// Whether the effect has anything to draw this frame.
    ///
    /// Misconfiguration (a cutoff of 1 or more, or a near fade window that ends
    /// after the far one starts) is reported as inactive rather than as an error.
    pub fn is_active(&self) -> bool {
        let visible = self.outline_strength > 0.0
            || self.fill_strength > 0.0
            || self.normal_outline_strength > 0.0;

        self.enabled
            && visible
            && self.outline_cutoff < 1.0
            && self.normal_outline_cutoff < 1.0
            && self.near_fade_out_limits.end <= self.far_fade_out_limits.start
    }

    /// Copy with every field clamped to its documented range.
    pub fn sanitized(&self) -> Self {
        Self {
            enabled: self.enabled,
            outline_color: self.outline_color,
            outline_strength: self.outline_strength.clamp(0.0, 1.0),
            outline_width: self
                .outline_width
                .clamp(MIN_OUTLINE_WIDTH, MAX_OUTLINE_WIDTH),
            outline_cutoff: self.outline_cutoff.clamp(0.0, 1.0),
            normal_outline_strength: self.normal_outline_strength.clamp(0.0, 1.0),
            normal_outline_width: self
                .normal_outline_width
                .clamp(MIN_OUTLINE_WIDTH, MAX_OUTLINE_WIDTH),
            normal_outline_cutoff: self.normal_outline_cutoff.clamp(0.0, 1.0),
            near_fade_out_limits: self.near_fade_out_limits.sanitized(),
            far_fade_out_limits: self.far_fade_out_limits.sanitized(),
            fill_strength: self.fill_strength.clamp(0.0, 1.0),
            fill_color: self.fill_color,
        }
    }

    /// Configure the depth edge detector.
    pub fn with_outline(
        mut self,
        color: impl Into<LinearRgba>,
        strength: f32,
        width: u32,
        cutoff: f32,
    ) -> Self {
        self.outline_color = color.into();
        self.outline_strength = strength.clamp(0.0, 1.0);
        self.outline_width = width.clamp(MIN_OUTLINE_WIDTH, MAX_OUTLINE_WIDTH);
        self.outline_cutoff = cutoff.clamp(0.0, 1.0);
        self
    }

    /// Configure the normal edge detector.
    pub fn with_normal_outline(mut self, strength: f32, width: u32, cutoff: f32) -> Self {
        self.normal_outline_strength = strength.clamp(0.0, 1.0);
        self.normal_outline_width = width.clamp(MIN_OUTLINE_WIDTH, MAX_OUTLINE_WIDTH);
        self.normal_outline_cutoff = cutoff.clamp(0.0, 1.0);
        self
    }

    pub fn with_fill(mut self, color: impl Into<LinearRgba>, strength: f32) -> Self {
        self.fill_color = color.into();
        self.fill_strength = strength.clamp(0.0, 1.0);
        self
    }

    pub fn with_near_fade(mut self, start: f32, end: f32) -> Self {
        self.near_fade_out_limits = FadeLimits::new(start, end).non_negative();
        self
    }

    pub fn with_far_fade(mut self, start: f32, end: f32) -> Self {
        self.far_fade_out_limits = FadeLimits::new(start, end).non_negative();
        self
    }

    pub fn set_near_fade_start(&mut self, value: f32) {
        self.near_fade_out_limits.start = value.max(0.0);
    }

    pub fn set_near_fade_end(&mut self, value: f32) {
        self.near_fade_out_limits.end = value.max(0.0);
    }

    pub fn set_far_fade_start(&mut self, value: f32) {
        self.far_fade_out_limits.start = value.max(0.0);
    }

    pub fn set_far_fade_end(&mut self, value: f32) {
        self.far_fade_out_limits.end = value.max(0.0);
    }
}

/// Marks a camera that renders previews or thumbnails.
///
/// The outline pass never runs for these cameras.
#[derive(Component, Clone, Copy, Debug, Default, Reflect)]
#[reflect(Component, Default)]
pub struct OutlinePreview;

/// Clamps fade limit components to `>= 0` after every edit, however the edit
/// was made (code, reflection, inspector UI).
pub fn clamp_fade_limit_edits(mut outlines: Query<&mut EdgeOutline, Changed<EdgeOutline>>) {
    for mut outline in outlines.iter_mut() {
        let near = outline.near_fade_out_limits.non_negative();
        let far = outline.far_fade_out_limits.non_negative();

        // Only write when something moved so change detection settles.
        if near != outline.near_fade_out_limits || far != outline.far_fade_out_limits {
            outline.near_fade_out_limits = near;
            outline.far_fade_out_limits = far;
        }
    }
}

/// Keeps outlined cameras single-sampled. The outline pass reads the prepass
/// textures directly and cannot resolve multisampled ones.
pub fn force_msaa_off(
    mut commands: Commands,
    mut cameras: Query<
        (Entity, Option<&mut Msaa>),
        (With<EdgeOutline>, Or<(Added<EdgeOutline>, Changed<Msaa>)>),
    >,
) {
    for (entity, msaa) in cameras.iter_mut() {
        match msaa {
            Some(mut msaa) if msaa.samples() > 1 => {
                warn_once!("edge outline requires Msaa::Off, overriding the camera's MSAA setting");
                *msaa = Msaa::Off;
            }
            Some(_) => {}
            None => {
                commands.entity(entity).insert(Msaa::Off);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_active() {
        assert!(EdgeOutline::default().is_active());
    }

    #[test]
    fn disabled_is_inactive_regardless_of_other_fields() {
        let outline = EdgeOutline {
            enabled: false,
            ..default()
        }
        .with_fill(LinearRgba::WHITE, 1.0);
        assert!(!outline.is_active());
    }

    #[test]
    fn cutoff_of_one_or_more_is_inactive() {
        let both = EdgeOutline {
            outline_cutoff: 1.0,
            normal_outline_cutoff: 1.5,
            ..default()
        };
        assert!(!both.is_active());

        let depth_only = EdgeOutline {
            outline_cutoff: 1.0,
            ..default()
        };
        assert!(!depth_only.is_active());

        let normal_only = EdgeOutline {
            normal_outline_cutoff: 1.0,
            ..default()
        };
        assert!(!normal_only.is_active());
    }

    #[test]
    fn nothing_visible_is_inactive() {
        let outline = EdgeOutline {
            outline_strength: 0.0,
            normal_outline_strength: 0.0,
            fill_strength: 0.0,
            ..default()
        };
        assert!(!outline.is_active());

        let fill_only = EdgeOutline { fill_strength: 0.2, ..outline };
        assert!(fill_only.is_active());
    }

    #[test]
    fn overlapping_fade_windows_are_inactive() {
        let outline = EdgeOutline::default()
            .with_near_fade(1.0, 5.0)
            .with_far_fade(3.0, 10.0);
        assert!(!outline.is_active());

        let touching = EdgeOutline::default()
            .with_near_fade(1.0, 5.0)
            .with_far_fade(5.0, 10.0);
        assert!(touching.is_active());
    }

    #[test]
    fn fade_setters_clamp_to_zero() {
        let mut outline = EdgeOutline::default();
        outline.set_near_fade_start(-2.0);
        outline.set_far_fade_end(-0.5);
        assert_eq!(outline.near_fade_out_limits.start, 0.0);
        assert_eq!(outline.far_fade_out_limits.end, 0.0);

        let built = EdgeOutline::default().with_near_fade(-1.0, -3.0);
        assert_eq!(built.near_fade_out_limits, FadeLimits::new(0.0, 0.0));
    }

    #[test]
    fn sanitized_clamps_every_range() {
        let outline = EdgeOutline {
            outline_strength: 3.0,
            outline_width: 0,
            outline_cutoff: -1.0,
            normal_outline_strength: -1.0,
            normal_outline_width: 99,
            normal_outline_cutoff: 2.0,
            near_fade_out_limits: FadeLimits::new(-4.0, -5.0),
            far_fade_out_limits: FadeLimits::new(20.0, 10.0),
            fill_strength: 1.5,
            ..default()
        }
        .sanitized();

        assert_eq!(outline.outline_strength, 1.0);
        assert_eq!(outline.outline_width, MIN_OUTLINE_WIDTH);
        assert_eq!(outline.outline_cutoff, 0.0);
        assert_eq!(outline.normal_outline_strength, 0.0);
        assert_eq!(outline.normal_outline_width, MAX_OUTLINE_WIDTH);
        assert_eq!(outline.normal_outline_cutoff, 1.0);
        assert_eq!(outline.near_fade_out_limits, FadeLimits::new(0.0, 0.0));
        assert_eq!(outline.far_fade_out_limits, FadeLimits::new(20.0, 20.0));
        assert_eq!(outline.fill_strength, 1.0);
    }

    #[test]
    fn clamp_system_fixes_negative_fade_edits() {
        let mut app = App::new();
        app.add_systems(Update, clamp_fade_limit_edits);

        let camera = app.world_mut().spawn(EdgeOutline::default()).id();
        app.update();

        app.world_mut()
            .get_mut::<EdgeOutline>(camera)
            .unwrap()
            .near_fade_out_limits
            .start = -2.0;
        app.update();

        let outline = app.world().get::<EdgeOutline>(camera).unwrap();
        assert_eq!(outline.near_fade_out_limits.start, 0.0);
        assert_eq!(outline.near_fade_out_limits.end, 0.5);
    }

    #[test]
    fn outlined_cameras_are_single_sampled() {
        let mut app = App::new();
        app.add_systems(PostUpdate, force_msaa_off);

        let multisampled = app
            .world_mut()
            .spawn((Msaa::Sample4, EdgeOutline::default()))
            .id();
        let bare = app.world_mut().spawn(EdgeOutline::default()).id();
        let plain = app.world_mut().spawn(Msaa::Sample4).id();
        app.update();

        assert_eq!(app.world().get::<Msaa>(multisampled), Some(&Msaa::Off));
        assert_eq!(app.world().get::<Msaa>(bare), Some(&Msaa::Off));
        assert_eq!(app.world().get::<Msaa>(plain), Some(&Msaa::Sample4));

        // Later edits are reverted too
        *app.world_mut().get_mut::<Msaa>(multisampled).unwrap() = Msaa::Sample8;
        app.update();
        assert_eq!(app.world().get::<Msaa>(multisampled), Some(&Msaa::Off));
    }
}
