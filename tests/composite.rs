use bevy::prelude::*;
use bevy_edge_outline::frame::{encode_normal, DepthEncoding, FrameBuffers, FrameContext};
use bevy_edge_outline::kernel::composite;
use bevy_edge_outline::EdgeOutline;

const GRAY: LinearRgba = LinearRgba::rgb(0.5, 0.5, 0.5);

#[test]
fn full_fill_flattens_uniform_scene() {
    let fill = LinearRgba::new(0.9, 0.9, 0.84, 1.0);
    let config = EdgeOutline::default().with_fill(fill, 1.0);
    let frame = FrameBuffers::uniform(32, 24, GRAY, 8.0, Vec3::Z);

    let out = composite(&frame, &FrameContext::default(), &config)
        .unwrap()
        .expect("pass should run");

    assert_eq!(out.len(), 32 * 24);
    assert!(out.iter().all(|&px| px == fill));
}

#[test]
fn box_on_background_is_outlined_only_at_its_border() {
    // A 6x6 box at distance 4 in front of an empty reverse-Z background.
    let (w, h) = (16u32, 16u32);
    let near = 0.1;
    let mut frame = FrameBuffers::uniform(w, h, GRAY, 0.0, Vec3::Z);
    frame.depth_encoding = DepthEncoding::ReverseZPerspective { near };

    let inside = |x: u32, y: u32| (5..11).contains(&x) && (5..11).contains(&y);
    for y in 0..h {
        for x in 0..w {
            if inside(x, y) {
                let i = frame.index(x, y);
                frame.depth.as_mut().unwrap()[i] = near / 4.0;
                frame.normals.as_mut().unwrap()[i] = encode_normal(Vec3::Z);
            }
        }
    }

    let white = LinearRgba::WHITE;
    let config = EdgeOutline::default().with_outline(white, 1.0, 1, 0.1);
    let out = composite(&frame, &FrameContext::default(), &config)
        .unwrap()
        .unwrap();

    // Border of the box carries the outline, its interior and the background do not.
    assert_eq!(out[frame.index(5, 7)], white);
    assert_eq!(out[frame.index(10, 7)], white);
    assert_eq!(out[frame.index(7, 5)], white);
    assert_eq!(out[frame.index(7, 7)], GRAY);
    assert_eq!(out[frame.index(0, 0)], GRAY);
    // Background side of the edge is far beyond the far fade window.
    assert_eq!(out[frame.index(4, 7)], GRAY);
}

#[test]
fn far_fade_hides_distant_edges() {
    let (w, h) = (8u32, 8u32);
    let mut frame = FrameBuffers::uniform(w, h, GRAY, 60.0, Vec3::Z);
    for y in 0..h {
        for x in 4..w {
            let i = frame.index(x, y);
            frame.depth.as_mut().unwrap()[i] = 200.0;
        }
    }

    let config = EdgeOutline::default().with_far_fade(20.0, 40.0);
    let out = composite(&frame, &FrameContext::default(), &config)
        .unwrap()
        .unwrap();
    assert!(out.iter().all(|&px| px == GRAY));

    let config = EdgeOutline::default().with_far_fade(100.0, 300.0);
    let out = composite(&frame, &FrameContext::default(), &config)
        .unwrap()
        .unwrap();
    assert_eq!(out[frame.index(3, 3)], LinearRgba::BLACK);
}

#[test]
fn misconfigured_effect_is_skipped() {
    let frame = FrameBuffers::uniform(4, 4, GRAY, 5.0, Vec3::Z);
    let config = EdgeOutline::default()
        .with_near_fade(0.0, 5.0)
        .with_far_fade(3.0, 10.0);

    assert!(!config.is_active());
    assert_eq!(
        composite(&frame, &FrameContext::default(), &config),
        Ok(None)
    );
}
