//! Whole-frame scenarios through the viewer and the software backend

use std::sync::Arc;

use crate::config::{ShadowConfig, ViewerConfig};
use crate::foundation::math::Vec3;
use crate::lighting::{PointLight, ShadowLight, ShadowStage};
use crate::picking::SelectionId;
use crate::render::software::SoftwareBackend;
use crate::render::{RenderBackend, Viewport};
use crate::scene::{Mesh, SceneNode};
use crate::Viewer;

fn top_down_viewer(size: u32) -> Viewer<SoftwareBackend> {
    let mut config = ViewerConfig::default();
    config.viewport.width = size;
    config.viewport.height = size;
    config.camera.position = [0.0, 0.0, 10.0];
    config.camera.target = [0.0, 0.0, 0.0];
    config.camera.up = [0.0, 1.0, 0.0];
    Viewer::new(SoftwareBackend::new(size, size), config).unwrap()
}

fn hook_markers(viewer: &Viewer<SoftwareBackend>) -> Vec<String> {
    viewer
        .backend()
        .markers()
        .iter()
        .filter(|m| m.ends_with("_render") || m.as_str() == "geometry")
        .cloned()
        .collect()
}

#[test]
fn test_hooks_run_in_registration_order() {
    let mut viewer = top_down_viewer(64);
    let cube = viewer
        .add_child_to_root(SceneNode::from_mesh("cube", Arc::new(Mesh::cube(1.0))))
        .unwrap();

    viewer.add_light(PointLight::new("L1", Vec3::new(0.0, 5.0, 5.0))).unwrap();
    let mut shadow = ShadowLight::new("L2", Vec3::new(5.0, 0.0, 10.0), ShadowConfig::with_resolution(64, 64));
    shadow.add_shadow_caster_and_receiver(cube);
    viewer.add_light(shadow).unwrap();

    viewer.backend_mut().clear_markers();
    viewer.draw();

    assert_eq!(
        hook_markers(&viewer),
        vec!["L1.pre_render", "L2.pre_render", "geometry", "L1.post_render", "L2.post_render"]
    );
}

#[test]
fn test_shadow_cycle_restores_stacks_and_framebuffer() {
    let mut viewer = top_down_viewer(64);
    let cube = viewer
        .add_child_to_root(SceneNode::from_mesh("cube", Arc::new(Mesh::cube(1.0))).at(Vec3::new(0.0, 0.0, 0.5)))
        .unwrap();
    let ground = viewer
        .add_child_to_root(SceneNode::from_mesh("ground", Arc::new(Mesh::plane(10.0, 10.0))))
        .unwrap();
    let mut sun = ShadowLight::new("sun", Vec3::new(5.0, 0.0, 10.0), ShadowConfig::with_resolution(128, 128));
    sun.add_shadow_caster(cube);
    sun.add_shadow_receiver(ground);
    let sun = viewer.add_light(sun).unwrap();

    let before = viewer.backend().state_snapshot();
    viewer.draw();
    let after = viewer.backend().state_snapshot();

    assert_eq!(after.matrix_depths, before.matrix_depths);
    assert_eq!(after.attrib_depth, before.attrib_depth);
    assert_eq!(after.state.framebuffer, before.state.framebuffer);
    assert_eq!(after.state.viewport, before.state.viewport);
    assert!(after.state.color_write);

    let light = viewer.scene().light(sun).unwrap().as_shadow().unwrap();
    assert_eq!(light.stage(), ShadowStage::Idle);
    assert!(light.frustum().is_some());
}

#[test]
fn test_empty_casters_skip_shadow_pass() {
    let mut viewer = top_down_viewer(32);
    viewer
        .add_child_to_root(SceneNode::from_mesh("ground", Arc::new(Mesh::plane(4.0, 4.0))))
        .unwrap();
    let lonely = viewer
        .add_light(ShadowLight::new("lonely", Vec3::new(0.0, 0.0, 5.0), ShadowConfig::with_resolution(16, 16)))
        .unwrap();

    let before = viewer.backend().state_snapshot();
    viewer.draw();
    let after = viewer.backend().state_snapshot();

    assert_eq!(after.matrix_depths, before.matrix_depths);
    assert_eq!(after.state.framebuffer, None);
    let light = viewer.scene().light(lonely).unwrap().as_shadow().unwrap();
    assert!(light.frustum().is_none());
    assert_eq!(light.stage(), ShadowStage::Idle);
}

#[test]
fn test_pick_round_trip() {
    let mut viewer = top_down_viewer(200);
    let cube = viewer
        .add_child_to_root(SceneNode::from_mesh("cube", Arc::new(Mesh::cube(2.0))))
        .unwrap();
    let id = viewer.scene().node(cube).unwrap().selection_id().unwrap();

    assert_eq!(viewer.pick(100.0, 100.0), Some(id));
    assert_eq!(viewer.selected_object(), Some(cube));
    assert!(viewer.is_selected(id));

    assert_eq!(viewer.pick(5.0, 5.0), None);
    assert_eq!(viewer.selected_id(), None);
}

#[test]
fn test_pick_ignores_unselectable_and_hidden_nodes() {
    let mut viewer = top_down_viewer(100);
    viewer
        .add_child_to_root(SceneNode::from_mesh("wall", Arc::new(Mesh::cube(2.0))).with_selectable(false))
        .unwrap();
    let hidden = viewer
        .add_child_to_root(SceneNode::from_mesh("ghost", Arc::new(Mesh::cube(2.0))).with_visible(false))
        .unwrap();

    assert_eq!(viewer.pick(50.0, 50.0), None);
    assert!(viewer.scene().node(hidden).unwrap().selection_id().is_some());
}

#[test]
fn test_shadowed_ground_is_darker_than_lit_ground() {
    let mut viewer = top_down_viewer(200);
    let cube = viewer
        .add_child_to_root(SceneNode::from_mesh("cube", Arc::new(Mesh::cube(1.0))).at(Vec3::new(0.0, 0.0, 0.5)))
        .unwrap();
    let ground = viewer
        .add_child_to_root(SceneNode::from_mesh("ground", Arc::new(Mesh::plane(10.0, 10.0))))
        .unwrap();
    let mut sun = ShadowLight::new("sun", Vec3::new(5.0, 0.0, 10.0), ShadowConfig::with_resolution(256, 256));
    sun.add_shadow_caster(cube);
    sun.add_shadow_receiver(ground);
    viewer.add_light(sun).unwrap();

    viewer.draw();

    let view = viewer.camera().view_state();
    let viewport = Viewport::new(200, 200);
    let color_at = |world: Vec3| {
        let p = view.project(world, &viewport).unwrap();
        viewer.backend().read_color(p.x as u32, p.y as u32).unwrap()
    };
    let shadowed = color_at(Vec3::new(-0.8, 0.0, 0.0));
    let lit = color_at(Vec3::new(-3.0, 0.0, 0.0));

    assert!(lit.x > 0.1, "lit ground should be visibly lit, got {lit:?}");
    assert!(shadowed.x < 0.5 * lit.x, "shadowed {shadowed:?} vs lit {lit:?}");
}

#[test]
fn test_chain_world_position_after_frame() {
    let mut viewer = top_down_viewer(32);
    let a = viewer.add_child_to_root(SceneNode::new("a").at(Vec3::new(1.0, 0.0, 0.0))).unwrap();
    let b = viewer.add_child(a, SceneNode::new("b").at(Vec3::new(0.0, 2.0, 0.0))).unwrap();
    let c = viewer.add_child(b, SceneNode::new("c").at(Vec3::new(0.0, 0.0, 3.0))).unwrap();

    viewer.draw();

    let world = viewer.scene().world_pose(c).unwrap();
    let position = Vec3::new(world[(0, 3)], world[(1, 3)], world[(2, 3)]);
    assert!((position - Vec3::new(1.0, 2.0, 3.0)).norm() < 1e-6);
}

#[test]
fn test_selection_ids_not_reused_after_removal() {
    let mut viewer = top_down_viewer(32);
    let nodes: Vec<_> = (0..3)
        .map(|i| {
            viewer
                .add_child_to_root(SceneNode::from_mesh(format!("n{i}"), Arc::new(Mesh::cube(1.0))))
                .unwrap()
        })
        .collect();
    let ids: Vec<SelectionId> = nodes
        .iter()
        .map(|n| viewer.scene().node(*n).unwrap().selection_id().unwrap())
        .collect();
    assert_eq!(ids, vec![SelectionId(1), SelectionId(2), SelectionId(3)]);

    viewer.set_selected(ids[1]);
    assert_eq!(viewer.remove_node(nodes[1]).unwrap(), 1);
    assert_eq!(viewer.get_object(ids[1]), None);
    assert_eq!(viewer.selected_object(), None);

    let fresh = viewer
        .add_child_to_root(SceneNode::from_mesh("fresh", Arc::new(Mesh::cube(1.0))))
        .unwrap();
    assert_eq!(viewer.scene().node(fresh).unwrap().selection_id(), Some(SelectionId(4)));
}

#[test]
fn test_stale_casters_and_receivers_are_skipped() {
    let mut viewer = top_down_viewer(64);
    let cube = viewer
        .add_child_to_root(SceneNode::from_mesh("cube", Arc::new(Mesh::cube(1.0))))
        .unwrap();
    let ground = viewer
        .add_child_to_root(SceneNode::from_mesh("ground", Arc::new(Mesh::plane(6.0, 6.0))))
        .unwrap();
    let mut sun = ShadowLight::new("sun", Vec3::new(3.0, 0.0, 8.0), ShadowConfig::with_resolution(64, 64));
    sun.add_shadow_caster(cube);
    sun.add_shadow_receiver(ground);
    let sun = viewer.add_light(sun).unwrap();

    viewer.remove_node(cube).unwrap();
    viewer.remove_node(ground).unwrap();
    viewer.draw();

    assert!(viewer.backend_mut().take_error().is_none());
    let light = viewer.scene().light(sun).unwrap().as_shadow().unwrap();
    assert!(light.frustum().is_none());
    assert_eq!(light.casters().len(), 1);
}
