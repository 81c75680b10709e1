//! Selection sessions driven through surfaces, the way the CLI drives them

use faceblur::{
    config::{BlurConfig, TogglePolicy},
    display::{HeadlessSurface, ScriptedSurface, SelectionSurface, SELECTION_TITLE},
    error::Result,
    selection::{DrawSession, DrawState, PointerButton, PointerEvent, SelectionSession, ToggleSession},
    types::{FaceRegion, PixelPoint},
};
use image::{Rgb, RgbImage};

fn canvas() -> RgbImage {
    RgbImage::from_pixel(120, 100, Rgb([40, 40, 40]))
}

fn click(x: u32, y: u32) -> PointerEvent {
    PointerEvent::Pressed {
        button: PointerButton::Primary,
        at: PixelPoint::new(x, y),
    }
}

fn right_click(x: u32, y: u32) -> PointerEvent {
    PointerEvent::Pressed {
        button: PointerButton::Secondary,
        at: PixelPoint::new(x, y),
    }
}

fn drag(from: (u32, u32), to: (u32, u32)) -> Vec<PointerEvent> {
    vec![
        click(from.0, from.1),
        PointerEvent::Moved {
            at: PixelPoint::new((from.0 + to.0) / 2, (from.1 + to.1) / 2),
        },
        PointerEvent::Moved {
            at: PixelPoint::new(to.0, to.1),
        },
        PointerEvent::Released {
            button: PointerButton::Primary,
            at: PixelPoint::new(to.0, to.1),
        },
    ]
}

fn candidates() -> Vec<FaceRegion> {
    vec![
        FaceRegion::new(5, 5, 30, 30),
        FaceRegion::new(20, 20, 30, 30),
        FaceRegion::new(70, 10, 40, 40),
        FaceRegion::new(60, 60, 20, 20),
    ]
}

#[test]
fn backwards_drag_is_normalized() -> Result<()> {
    let mut surface = ScriptedSurface::new(drag((50, 50), (10, 10)));
    let session = DrawSession::new(canvas(), &BlurConfig::default());

    let regions = surface.select(SELECTION_TITLE, Box::new(session))?;
    assert_eq!(regions, vec![FaceRegion::new(10, 10, 40, 40)]);
    Ok(())
}

#[test]
fn right_click_deletes_only_the_first_containing_region() -> Result<()> {
    let mut events = drag((10, 10), (60, 60));
    events.extend(drag((30, 30), (90, 90)));
    events.extend(drag((95, 5), (115, 25)));
    // (40, 40) lies in both of the first two regions
    events.push(right_click(40, 40));

    let mut surface = ScriptedSurface::new(events);
    let regions = surface.select(SELECTION_TITLE, Box::new(DrawSession::new(canvas(), &BlurConfig::default())))?;

    assert_eq!(
        regions,
        vec![FaceRegion::new(30, 30, 60, 60), FaceRegion::new(95, 5, 20, 20)]
    );
    Ok(())
}

#[test]
fn right_click_outside_every_region_is_ignored() {
    let mut session = DrawSession::new(canvas(), &BlurConfig::default());
    for event in drag((10, 10), (30, 30)) {
        session.handle(event);
    }
    assert!(!session.handle(right_click(100, 90)));
    assert_eq!(session.regions().len(), 1);
}

#[test]
fn deleting_restores_pristine_pixels() {
    let source = canvas();
    let mut session = DrawSession::new(source.clone(), &BlurConfig::default());
    for event in drag((10, 10), (50, 40)) {
        session.handle(event);
    }
    assert_ne!(session.working_image(), &source);

    assert!(session.handle(right_click(30, 25)));
    assert_eq!(session.working_image(), &source);
    assert!(session.regions().is_empty());
}

#[test]
fn drag_preview_is_not_persisted() {
    let source = canvas();
    let mut session = DrawSession::new(source.clone(), &BlurConfig::default());
    session.handle(click(10, 10));
    session.handle(PointerEvent::Moved {
        at: PixelPoint::new(60, 60),
    });

    assert!(matches!(session.state(), DrawState::Dragging { .. }));
    assert_ne!(session.overlay(), source);
    assert_eq!(session.working_image(), &source);
    assert!(session.regions().is_empty());
}

#[test]
fn plain_click_creates_no_region() {
    let mut session = DrawSession::new(canvas(), &BlurConfig::default());
    session.handle(click(10, 10));
    session.handle(PointerEvent::Released {
        button: PointerButton::Primary,
        at: PixelPoint::new(10, 10),
    });
    assert!(session.regions().is_empty());
    assert_eq!(session.state(), DrawState::Idle);
}

#[test]
fn toggling_twice_restores_inclusion() {
    let mut session = ToggleSession::new(canvas(), candidates(), &BlurConfig::default());
    let before = session.included().to_vec();

    session.handle(click(90, 30));
    assert_ne!(session.included(), before.as_slice());
    session.handle(click(90, 30));
    assert_eq!(session.included(), before.as_slice());
}

#[test]
fn toggle_result_is_an_ordered_subsequence() -> Result<()> {
    let all = candidates();
    let clicks = [
        vec![],
        vec![click(90, 30)],
        vec![click(25, 25)],
        vec![click(25, 25), click(70, 70), click(25, 25)],
        vec![click(0, 0), click(119, 99)],
    ];

    for events in clicks {
        let mut surface = ScriptedSurface::new(events);
        let session = ToggleSession::new(canvas(), all.clone(), &BlurConfig::default());
        let selected = surface.select(SELECTION_TITLE, Box::new(session))?;

        let mut remaining = all.iter();
        for region in &selected {
            assert!(
                remaining.any(|candidate| candidate == region),
                "{selected:?} is not an ordered subsequence of the candidates"
            );
        }
    }
    Ok(())
}

#[test]
fn overlap_policy_controls_how_many_regions_flip() -> Result<()> {
    // (25, 25) lies in the first two candidates
    let mut surface = ScriptedSurface::new(vec![click(25, 25)]);
    let all_policy = ToggleSession::new(canvas(), candidates(), &BlurConfig::default());
    let selected = surface.select(SELECTION_TITLE, Box::new(all_policy))?;
    assert_eq!(selected, candidates()[2..].to_vec());

    let first_config = BlurConfig::builder().toggle_policy(TogglePolicy::First).build()?;
    let mut surface = ScriptedSurface::new(vec![click(25, 25)]);
    let first_policy = ToggleSession::new(canvas(), candidates(), &first_config);
    let selected = surface.select(SELECTION_TITLE, Box::new(first_policy))?;
    assert_eq!(selected, candidates()[1..].to_vec());
    Ok(())
}

#[test]
fn headless_surface_keeps_the_initial_result() -> Result<()> {
    let mut surface = HeadlessSurface;
    let toggle = ToggleSession::new(canvas(), candidates(), &BlurConfig::default());
    assert_eq!(surface.select(SELECTION_TITLE, Box::new(toggle))?, candidates());

    let draw = DrawSession::new(canvas(), &BlurConfig::default());
    assert!(surface.select(SELECTION_TITLE, Box::new(draw))?.is_empty());
    Ok(())
}

#[test]
fn excluded_candidates_are_outlined_differently() {
    let config = BlurConfig::default();
    let region = FaceRegion::new(20, 20, 40, 40);
    let mut session = ToggleSession::new(canvas(), vec![region], &config);

    let included = session.overlay();
    assert!(included.pixels().any(|p| p.0 == config.overlay.included_color));

    session.handle(click(40, 40));
    let excluded = session.overlay();
    assert!(excluded.pixels().any(|p| p.0 == config.overlay.excluded_color));
    assert!(!excluded.pixels().any(|p| p.0 == config.overlay.included_color));
}
