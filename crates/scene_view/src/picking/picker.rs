//! Selection render pass and hit decoding

use super::{SelectionId, SelectionState};
use crate::render::{DrawMode, HitRecord, PickRegion, RenderContext, ViewState};
use crate::scene::NodeTree;

/// Nearest hit whose id still belongs to a live node
pub fn decode_hits(hits: &[HitRecord], selection: &SelectionState, tree: &NodeTree) -> Option<SelectionId> {
    hits.iter()
        .filter(|hit| {
            let live = selection.live_object(SelectionId(hit.name), tree).is_some();
            if !live {
                log::trace!("discarding hit on stale id {}", hit.name);
            }
            live
        })
        .min_by(|a, b| a.min_depth.total_cmp(&b.min_depth))
        .map(|hit| SelectionId(hit.name))
}

/// Render `tree` in selection mode over `region` and decode the result
///
/// `region` is in window pixels with a bottom-left origin. The caller's
/// matrices are restored afterwards; `None` means nothing selectable covers
/// the region.
pub fn pick(
    tree: &NodeTree,
    ctx: &mut RenderContext<'_>,
    view: &ViewState,
    region: PickRegion,
    selection: &SelectionState,
) -> Option<SelectionId> {
    let hits = ctx.with_saved_matrices(|ctx| {
        view.apply(ctx);
        ctx.begin_selection(region);
        tree.draw_subtree(ctx, tree.root(), DrawMode::Selection);
        ctx.end_selection()
    });
    ctx.check_errors("selection pass");

    let result = decode_hits(&hits, selection, tree);
    log::debug!("pick over {:?}: {} hit(s), result {:?}", region, hits.len(), result);
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::software::SoftwareBackend;
    use crate::render::Camera;
    use crate::foundation::math::Vec3;
    use crate::scene::{Mesh, SceneNode};
    use std::sync::Arc;

    fn hit(name: u32, min_depth: f32) -> HitRecord {
        HitRecord { name, min_depth, max_depth: min_depth }
    }

    #[test]
    fn test_decode_prefers_nearest_live_hit() {
        let mut tree = NodeTree::new();
        let a = tree.add_child(tree.root(), SceneNode::new("a")).unwrap();
        let b = tree.add_child(tree.root(), SceneNode::new("b")).unwrap();
        let c = tree.add_child(tree.root(), SceneNode::new("c")).unwrap();
        let mut selection = SelectionState::default();
        let (ia, ib, ic) = (
            selection.alloc(a).unwrap(),
            selection.alloc(b).unwrap(),
            selection.alloc(c).unwrap(),
        );
        tree.remove(c).unwrap();

        let hits = [hit(ia.0, 0.6), hit(ic.0, 0.1), hit(ib.0, 0.4), hit(99, 0.0)];
        assert_eq!(decode_hits(&hits, &selection, &tree), Some(ib));
        assert_eq!(decode_hits(&[], &selection, &tree), None);
    }

    #[test]
    fn test_pick_hits_cube_and_misses_background() {
        let mut tree = NodeTree::new();
        let mut selection = SelectionState::default();
        let cube = tree.add_child(tree.root(), SceneNode::from_mesh("cube", Arc::new(Mesh::cube(2.0)))).unwrap();
        let id = selection.alloc(cube).unwrap();
        tree.node_mut(cube).unwrap().assign_selection_id(id);
        tree.update_world_poses();

        let mut backend = SoftwareBackend::new(50, 50);
        let camera = Camera::perspective(Vec3::new(0.0, 0.0, 10.0), 60.0, 1.0, 0.1, 100.0);
        let view = camera.view_state();
        let before = backend.matrix_stack_depths();
        let mut ctx = RenderContext::new(&mut backend);

        assert_eq!(pick(&tree, &mut ctx, &view, PickRegion::centered(25, 25, 1), &selection), Some(id));
        assert_eq!(pick(&tree, &mut ctx, &view, PickRegion::centered(2, 2, 1), &selection), None);
        assert_eq!(backend.matrix_stack_depths(), before);
    }
}
