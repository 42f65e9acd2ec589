//! Headless viewer session
//!
//! Builds a small scene (reference grid, a cube casting onto a ground
//! plane, one shadow light), then replays a scripted stream of input
//! events through the software backend and logs what the viewer reports.

use std::sync::Arc;
use std::time::Instant;

use scene_view::foundation::logging;
use scene_view::foundation::time::RedrawTimer;
use scene_view::prelude::*;

const DEFAULT_CONFIG_PATH: &str = "viewer_demo/viewer.toml";

/// World up is -Z; the sun and the cube sit on that side of the ground
fn build_scene(viewer: &mut Viewer<SoftwareBackend>) -> Result<NodeId, ViewerError> {
    viewer.add_child_to_root(SceneNode::grid("grid", GridSpec::default()).with_selectable(false))?;

    // plane normal is +Z, roll it over to face up
    let ground = viewer.add_child_to_root(
        SceneNode::from_mesh("ground", Arc::new(Mesh::plane(10.0, 10.0)))
            .with_transform(Transform::from_cartesian(0.0, 0.0, 0.0, std::f32::consts::PI, 0.0, 0.0))
            .with_color(Vec3::new(0.6, 0.6, 0.6)),
    )?;
    let cube = viewer.add_child_to_root(
        SceneNode::from_mesh("cube", Arc::new(Mesh::cube(1.0)))
            .at(Vec3::new(0.0, 0.0, -0.5))
            .with_color(Vec3::new(0.2, 0.5, 0.9)),
    )?;

    let mut sun = ShadowLight::new("sun", Vec3::new(5.0, 0.0, -10.0), viewer.config().shadow);
    sun.add_shadow_caster(cube);
    sun.add_shadow_receiver(ground);
    viewer.add_light(sun)?;

    Ok(cube)
}

/// Input the session replays, in order
fn scripted_events(width: u32, height: u32) -> Vec<InputEvent> {
    let (cx, cy) = (f64::from(width) / 2.0, f64::from(height) / 2.0);
    vec![
        InputEvent::MouseMove { x: cx, y: cy },
        InputEvent::MousePress { button: MouseButton::Left, x: cx, y: cy },
        InputEvent::MouseRelease { button: MouseButton::Left, x: cx, y: cy },
        InputEvent::MousePress { button: MouseButton::Left, x: cx, y: cy },
        InputEvent::MouseMove { x: cx + 40.0, y: cy + 10.0 },
        InputEvent::MouseRelease { button: MouseButton::Left, x: cx + 40.0, y: cy + 10.0 },
        InputEvent::Scroll { delta: 1.0 },
        InputEvent::KeyPress(KeyCode::W),
        InputEvent::KeyPress(KeyCode::R),
        InputEvent::KeyPress(KeyCode::Tab),
        InputEvent::MousePress { button: MouseButton::Left, x: 5.0, y: 5.0 },
        InputEvent::MouseRelease { button: MouseButton::Left, x: 5.0, y: 5.0 },
        InputEvent::Resize { width: width * 2, height: height * 2 },
        InputEvent::KeyPress(KeyCode::Escape),
    ]
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let path = std::env::args().nth(1).unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let (config, load_error) = match ViewerConfig::load_from_file(&path) {
        Ok(config) => (config, None),
        Err(e) => (ViewerConfig::default(), Some(e)),
    };

    logging::init_with_level(&config.log_level);
    match load_error {
        Some(e) => log::warn!("could not load {}: {}; using defaults", path, e),
        None => log::info!("loaded configuration from {}", path),
    }

    let (width, height) = (config.viewport.width, config.viewport.height);
    let backend = SoftwareBackend::new(width, height);
    let mut viewer = Viewer::new(backend, config)?;

    let cube = build_scene(&mut viewer)?;
    log::info!(
        "scene ready: {} nodes, cube has selection id {:?}",
        viewer.scene().tree().node_count(),
        viewer.scene().node(cube).and_then(SceneNode::selection_id)
    );

    let start = Instant::now();
    let period = RedrawTimer::from_hz(viewer.config().redraw_hz).period();
    let mut now = start;
    for event in scripted_events(width, height) {
        let label = format!("{event:?}");
        let changed = viewer.handle(event);
        now += period;
        let drew = viewer.tick(now);
        log::info!(
            "{label}: changed={changed} drew={drew} mode={:?} selected={:?} cursor={:?}",
            viewer.gui_mode(),
            viewer.selected_id(),
            viewer.cursor_world()
        );
    }

    if let Some(light) = viewer.scene().lights().find_map(|(_, light)| light.as_shadow()) {
        match light.frustum() {
            Some(frustum) => log::info!(
                "shadow frustum for {}: distance {:.2}, near {:.2}, far {:.2}",
                light.name(),
                frustum.distance,
                frustum.near,
                frustum.far
            ),
            None => log::info!("shadow light {} had nothing to fit", light.name()),
        }
    }

    let timer = viewer.frame_timer();
    log::info!("{} frames, {:.1} fps average", timer.frame_count(), timer.average_fps());
    Ok(())
}
