//! Scan conversion and per-fragment operations of the software backend

use std::collections::HashMap;

use super::SoftwareState;
use crate::foundation::math::{Vec3, Vec4};
use crate::render::backend::{
    Capabilities, CompareFunc, HitRecord, PickRegion, MAX_TEXTURE_UNITS,
};

/// Texture units as an array length
pub(super) const UNITS: usize = MAX_TEXTURE_UNITS as usize;

/// Smallest resolvable depth difference of a 24-bit depth buffer
const DEPTH_UNIT: f32 = 1.0 / 16_777_216.0;

/// Upper bound on steps of a single line segment
const MAX_LINE_STEPS: i32 = 1 << 16;

/// Colour and depth storage of one render target, rows bottom to top
#[derive(Debug, Clone)]
pub(super) struct Target {
    pub width: u32,
    pub height: u32,
    pub color: Vec<Vec3>,
    pub depth: Vec<f32>,
}

impl Target {
    pub fn new(width: u32, height: u32) -> Self {
        let len = width as usize * height as usize;
        Self {
            width,
            height,
            color: vec![Vec3::zeros(); len],
            depth: vec![1.0; len],
        }
    }

    pub fn index(&self, x: i64, y: i64) -> Option<usize> {
        if x < 0 || y < 0 || x >= i64::from(self.width) || y >= i64::from(self.height) {
            return None;
        }
        Some(y as usize * self.width as usize + x as usize)
    }
}

/// Depth texture with optional comparison
#[derive(Debug, Clone)]
pub(super) struct DepthTexture {
    pub width: u32,
    pub height: u32,
    pub data: Vec<f32>,
    pub border_depth: f32,
    pub compare: Option<CompareFunc>,
}

impl DepthTexture {
    pub fn new(width: u32, height: u32, border_depth: f32) -> Self {
        Self {
            width,
            height,
            data: vec![1.0; width as usize * height as usize],
            border_depth,
            compare: None,
        }
    }

    /// Nearest-texel lookup; coordinates outside [0, 1) read the border depth
    fn fetch(&self, s: f32, t: f32) -> f32 {
        if !(0.0..1.0).contains(&s) || !(0.0..1.0).contains(&t) {
            return self.border_depth;
        }
        let x = ((s * self.width as f32) as usize).min(self.width as usize - 1);
        let y = ((t * self.height as f32) as usize).min(self.height as usize - 1);
        self.data[y * self.width as usize + x]
    }

    /// Intensity for texture coordinate `(s, t, r)`
    ///
    /// With comparison enabled the result is 1 when `r` passes against the
    /// stored depth and 0 otherwise; without it the raw depth is returned.
    pub fn sample(&self, s: f32, t: f32, r: f32) -> f32 {
        let stored = self.fetch(s, t);
        match self.compare {
            Some(func) => {
                if func.test(r.clamp(0.0, 1.0), stored) { 1.0 } else { 0.0 }
            }
            None => stored,
        }
    }
}

/// Hits collected while the backend is in selection mode
#[derive(Debug, Clone)]
pub(super) struct SelectionPass {
    pub region: PickRegion,
    pub name: Option<u32>,
    pub hits: Vec<HitRecord>,
}

impl SelectionPass {
    pub fn new(region: PickRegion) -> Self {
        Self { region, name: None, hits: Vec::new() }
    }

    fn record(&mut self, depth: f32) {
        let Some(name) = self.name else { return };
        match self.hits.iter_mut().find(|h| h.name == name) {
            Some(hit) => {
                hit.min_depth = hit.min_depth.min(depth);
                hit.max_depth = hit.max_depth.max(depth);
            }
            None => self.hits.push(HitRecord { name, min_depth: depth, max_depth: depth }),
        }
    }
}

/// Post-projection vertex with the attributes interpolated across primitives
#[derive(Debug, Clone, Copy)]
pub(super) struct ClipVertex {
    pub clip: Vec4,
    pub color: Vec4,
    pub tex: [Vec4; UNITS],
}

impl ClipVertex {
    fn lerp(&self, other: &ClipVertex, t: f32) -> ClipVertex {
        let mut tex = self.tex;
        for (dst, src) in tex.iter_mut().zip(other.tex.iter()) {
            *dst += (src - *dst) * t;
        }
        ClipVertex {
            clip: self.clip + (other.clip - self.clip) * t,
            color: self.color + (other.color - self.color) * t,
            tex,
        }
    }

    /// Signed distance to the near clip plane, `z >= -w` inside
    fn near_distance(&self) -> f32 {
        self.clip.z + self.clip.w
    }
}

/// Clip a convex polygon against the near plane
pub(super) fn clip_polygon_near(polygon: &[ClipVertex]) -> Vec<ClipVertex> {
    let mut out = Vec::with_capacity(polygon.len() + 1);
    for (i, current) in polygon.iter().enumerate() {
        let next = &polygon[(i + 1) % polygon.len()];
        let (dc, dn) = (current.near_distance(), next.near_distance());
        if dc >= 0.0 {
            out.push(*current);
        }
        if (dc >= 0.0) != (dn >= 0.0) {
            out.push(current.lerp(next, dc / (dc - dn)));
        }
    }
    out
}

/// Clip a segment against the near plane
pub(super) fn clip_segment_near(a: &ClipVertex, b: &ClipVertex) -> Option<(ClipVertex, ClipVertex)> {
    let (da, db) = (a.near_distance(), b.near_distance());
    match (da >= 0.0, db >= 0.0) {
        (true, true) => Some((*a, *b)),
        (false, false) => None,
        (true, false) => Some((*a, a.lerp(b, da / (da - db)))),
        (false, true) => Some((b.lerp(a, db / (db - da)), *b)),
    }
}

#[derive(Debug, Clone, Copy)]
struct WindowVertex {
    x: f32,
    y: f32,
    z: f32,
    inv_w: f32,
}

/// Twice the signed area of `(a, b, (px, py))`
fn edge(a: &WindowVertex, b: &WindowVertex, px: f32, py: f32) -> f32 {
    (b.x - a.x) * (py - a.y) - (b.y - a.y) * (px - a.x)
}

/// Pixel rectangle `[x0, x1) x [y0, y1)`
#[derive(Debug, Clone, Copy)]
struct PixelRect {
    x0: i64,
    y0: i64,
    x1: i64,
    y1: i64,
}

impl PixelRect {
    fn intersect(self, other: PixelRect) -> PixelRect {
        PixelRect {
            x0: self.x0.max(other.x0),
            y0: self.y0.max(other.y0),
            x1: self.x1.min(other.x1),
            y1: self.y1.min(other.y1),
        }
    }

    fn contains(&self, x: i64, y: i64) -> bool {
        x >= self.x0 && y >= self.y0 && x < self.x1 && y < self.y1
    }
}

/// Everything a primitive writes to, borrowed for one draw call
pub(super) struct Rasterizer<'a> {
    pub state: &'a SoftwareState,
    pub textures: &'a HashMap<u64, DepthTexture>,
    pub target: &'a mut Target,
    pub selection: Option<&'a mut SelectionPass>,
}

impl Rasterizer<'_> {
    fn to_window(&self, v: &ClipVertex) -> Option<WindowVertex> {
        if v.clip.w <= f32::EPSILON || !v.clip.iter().all(|c| c.is_finite()) {
            return None;
        }
        let vp = self.state.viewport;
        let inv_w = 1.0 / v.clip.w;
        Some(WindowVertex {
            x: vp.x as f32 + (v.clip.x * inv_w + 1.0) * 0.5 * vp.width as f32,
            y: vp.y as f32 + (v.clip.y * inv_w + 1.0) * 0.5 * vp.height as f32,
            z: (v.clip.z * inv_w + 1.0) * 0.5,
            inv_w,
        })
    }

    /// Pixels a primitive may touch: viewport, target and pick region
    fn clip_rect(&self) -> PixelRect {
        let vp = self.state.viewport;
        let mut rect = PixelRect {
            x0: i64::from(vp.x),
            y0: i64::from(vp.y),
            x1: i64::from(vp.x) + i64::from(vp.width),
            y1: i64::from(vp.y) + i64::from(vp.height),
        }
        .intersect(PixelRect {
            x0: 0,
            y0: 0,
            x1: i64::from(self.target.width),
            y1: i64::from(self.target.height),
        });
        if let Some(selection) = self.selection.as_deref() {
            let r = selection.region;
            rect = rect.intersect(PixelRect {
                x0: i64::from(r.x),
                y0: i64::from(r.y),
                x1: i64::from(r.x) + i64::from(r.width),
                y1: i64::from(r.y) + i64::from(r.height),
            });
        }
        rect
    }

    /// Scan-convert one triangle, both windings
    pub fn triangle(&mut self, tri: [&ClipVertex; 3]) {
        let (Some(w0), Some(w1), Some(w2)) = (self.to_window(tri[0]), self.to_window(tri[1]), self.to_window(tri[2])) else {
            return;
        };
        let area = edge(&w0, &w1, w2.x, w2.y);
        if !area.is_finite() || area.abs() < 1e-12 {
            return;
        }

        let offset = if self.state.caps.contains(Capabilities::POLYGON_OFFSET_FILL) {
            let dzdx = ((w1.z - w0.z) * (w2.y - w0.y) - (w2.z - w0.z) * (w1.y - w0.y)) / area;
            let dzdy = ((w2.z - w0.z) * (w1.x - w0.x) - (w1.z - w0.z) * (w2.x - w0.x)) / area;
            let (factor, units) = self.state.polygon_offset;
            factor * dzdx.abs().max(dzdy.abs()) + units * DEPTH_UNIT
        } else {
            0.0
        };

        let bounds = PixelRect {
            x0: w0.x.min(w1.x).min(w2.x).floor() as i64,
            y0: w0.y.min(w1.y).min(w2.y).floor() as i64,
            x1: w0.x.max(w1.x).max(w2.x).ceil() as i64 + 1,
            y1: w0.y.max(w1.y).max(w2.y).ceil() as i64 + 1,
        }
        .intersect(self.clip_rect());

        for py in bounds.y0..bounds.y1 {
            for px in bounds.x0..bounds.x1 {
                let (cx, cy) = (px as f32 + 0.5, py as f32 + 0.5);
                let b0 = edge(&w1, &w2, cx, cy) / area;
                let b1 = edge(&w2, &w0, cx, cy) / area;
                let b2 = edge(&w0, &w1, cx, cy) / area;
                if b0 < 0.0 || b1 < 0.0 || b2 < 0.0 {
                    continue;
                }

                let z = b0 * w0.z + b1 * w1.z + b2 * w2.z;

                // perspective-correct weights
                let p = [b0 * w0.inv_w, b1 * w1.inv_w, b2 * w2.inv_w];
                let sum = p[0] + p[1] + p[2];
                if sum <= 0.0 {
                    continue;
                }
                let weights = [p[0] / sum, p[1] / sum, p[2] / sum];

                let color = tri[0].color * weights[0] + tri[1].color * weights[1] + tri[2].color * weights[2];
                let mut tex = [Vec4::zeros(); UNITS];
                for (u, t) in tex.iter_mut().enumerate() {
                    *t = tri[0].tex[u] * weights[0] + tri[1].tex[u] * weights[1] + tri[2].tex[u] * weights[2];
                }

                self.fragment(px, py, z, offset, color, &tex);
            }
        }
    }

    /// Draw one segment with a constant colour
    pub fn line(&mut self, a: &ClipVertex, b: &ClipVertex) {
        let Some((a, b)) = clip_segment_near(a, b) else { return };
        let (Some(wa), Some(wb)) = (self.to_window(&a), self.to_window(&b)) else { return };

        let rect = self.clip_rect();
        let span = (wb.x - wa.x).abs().max((wb.y - wa.y).abs()).ceil();
        let steps = if span.is_finite() { (span as i32).clamp(1, MAX_LINE_STEPS) } else { return };
        let tex = [Vec4::zeros(); UNITS];

        for i in 0..=steps {
            let t = i as f32 / steps as f32;
            let x = wa.x + (wb.x - wa.x) * t;
            let y = wa.y + (wb.y - wa.y) * t;
            let z = wa.z + (wb.z - wa.z) * t;
            let (px, py) = (x.floor() as i64, y.floor() as i64);
            if rect.contains(px, py) {
                self.fragment(px, py, z, 0.0, a.color, &tex);
            }
        }
    }

    fn fragment(&mut self, px: i64, py: i64, z: f32, offset: f32, color: Vec4, tex: &[Vec4; UNITS]) {
        if !(0.0..=1.0).contains(&z) {
            return;
        }
        let z = (z + offset).clamp(0.0, 1.0);

        if let Some(selection) = self.selection.as_deref_mut() {
            selection.record(z);
            return;
        }

        let state = self.state;
        let mut color = color;
        for (unit, coords) in state.units.iter().zip(tex.iter()) {
            if !(unit.texture_2d && unit.texture_gen) {
                continue;
            }
            let Some(texture) = unit.bound.and_then(|h| self.textures.get(&h.0)) else {
                continue;
            };
            let value = if coords.w > f32::EPSILON {
                texture.sample(coords.x / coords.w, coords.y / coords.w, coords.z / coords.w)
            } else {
                texture.sample(-1.0, -1.0, 1.0)
            };
            color *= value;
        }

        if state.caps.contains(Capabilities::ALPHA_TEST) {
            let (func, reference) = state.alpha_func;
            if !func.test(color.w, reference) {
                return;
            }
        }

        let Some(index) = self.target.index(px, py) else { return };
        if state.caps.contains(Capabilities::DEPTH_TEST) {
            if !state.depth_func.test(z, self.target.depth[index]) {
                return;
            }
            self.target.depth[index] = z;
        }
        if state.color_write {
            self.target.color[index] = color.xyz().map(|c| c.clamp(0.0, 1.0));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vertex(x: f32, y: f32, z: f32, w: f32) -> ClipVertex {
        ClipVertex {
            clip: Vec4::new(x, y, z, w),
            color: Vec4::new(1.0, 1.0, 1.0, 1.0),
            tex: [Vec4::zeros(); UNITS],
        }
    }

    #[test]
    fn test_clip_polygon_fully_inside() {
        let tri = [vertex(0.0, 0.0, 0.0, 1.0), vertex(1.0, 0.0, 0.0, 1.0), vertex(0.0, 1.0, 0.0, 1.0)];
        assert_eq!(clip_polygon_near(&tri).len(), 3);
    }

    #[test]
    fn test_clip_polygon_one_vertex_behind() {
        let tri = [vertex(0.0, 0.0, 0.0, 1.0), vertex(1.0, 0.0, 0.0, 1.0), vertex(0.0, 1.0, -3.0, 1.0)];
        let clipped = clip_polygon_near(&tri);
        assert_eq!(clipped.len(), 4);
        assert!(clipped.iter().all(|v| v.near_distance() >= -1e-6));
    }

    #[test]
    fn test_clip_segment_behind_is_dropped() {
        assert!(clip_segment_near(&vertex(0.0, 0.0, -2.0, 1.0), &vertex(1.0, 0.0, -3.0, 1.0)).is_none());
    }

    #[test]
    fn test_depth_texture_border_and_compare() {
        let mut texture = DepthTexture::new(2, 2, 1.0);
        texture.data = vec![0.3, 0.3, 0.3, 0.3];
        texture.compare = Some(CompareFunc::GEqual);

        assert_eq!(texture.sample(0.25, 0.25, 0.5), 1.0);
        assert_eq!(texture.sample(0.25, 0.25, 0.2), 0.0);
        // outside the map the border depth 1.0 is compared
        assert_eq!(texture.sample(1.5, 0.25, 0.5), 0.0);

        texture.compare = None;
        assert_eq!(texture.sample(0.75, 0.75, 0.0), 0.3);
    }

    #[test]
    fn test_selection_pass_merges_by_name() {
        let mut pass = SelectionPass::new(PickRegion::centered(0, 0, 1));
        pass.record(0.5);
        assert!(pass.hits.is_empty());

        pass.name = Some(7);
        pass.record(0.5);
        pass.record(0.2);
        pass.name = Some(9);
        pass.record(0.9);

        assert_eq!(pass.hits.len(), 2);
        assert_eq!(pass.hits[0], HitRecord { name: 7, min_depth: 0.2, max_depth: 0.5 });
    }
}
