use glam::{Mat2, Vec2};
use pet_panda_core::{Leaf, LeafSide, Rect};
use pet_panda_rendering::{Color, SegmentPresentation, ShootPresentation};

use crate::{to_macroquad_color, to_macroquad_vec, SceneMetrics};

pub(crate) const GROUND_COLOR: Color = Color::from_rgb_u8(120, 96, 64);
const STEM_COLOR: Color = Color::from_rgb_u8(92, 150, 66);
const NODE_COLOR: Color = Color::from_rgb_u8(60, 110, 44);
const LEAF_COLOR: Color = Color::from_rgb_u8(70, 128, 52);

const LEAF_LENGTH: f32 = 16.0;
const LEAF_WIDTH: f32 = 5.0;
const NODE_THICKNESS: f32 = 2.0;

/// Triangles making up one tilted segment, in scene coordinates.
#[derive(Clone, Debug, PartialEq)]
struct SegmentShape {
    quad: [Vec2; 4],
    node: [Vec2; 4],
    leaves: Vec<([Vec2; 3], bool)>,
}

pub(crate) fn draw_shoot(shoot: &ShootPresentation, scale: f32, metrics: &SceneMetrics) {
    let pivot = Vec2::new(
        shoot.bounds.left + shoot.bounds.width / 2.0,
        shoot.bounds.bottom(),
    );
    let rotation = Mat2::from_angle(shoot.tilt_degrees.to_radians());

    for segment in &shoot.segments {
        let shape = segment_shape(segment, pivot, rotation, scale);
        let stem = STEM_COLOR
            .brighten(segment.brightness)
            .fade(segment.opacity);
        let node = NODE_COLOR
            .brighten(segment.brightness)
            .fade(segment.opacity);

        for (leaf, light) in &shape.leaves {
            let base = if *light {
                LEAF_COLOR.lighten(0.35)
            } else {
                LEAF_COLOR
            };
            let color = base.brighten(segment.brightness).fade(segment.opacity);
            draw_triangle(*leaf, metrics, color);
        }
        draw_quad(shape.quad, metrics, stem);
        draw_quad(shape.node, metrics, node);
    }
}

fn segment_shape(
    segment: &SegmentPresentation,
    pivot: Vec2,
    rotation: Mat2,
    scale: f32,
) -> SegmentShape {
    let bounds = segment.bounds;
    let node_height = (NODE_THICKNESS * scale).min(bounds.height);
    let node_bounds = Rect::new(bounds.left, bounds.top, bounds.width, node_height);

    let leaves = segment
        .leaves
        .iter()
        .map(|leaf| {
            let points =
                leaf_points(leaf, bounds, scale).map(|point| rotate(point, pivot, rotation));
            (points, leaf.light)
        })
        .collect();

    SegmentShape {
        quad: corners(bounds).map(|point| rotate(point, pivot, rotation)),
        node: corners(node_bounds).map(|point| rotate(point, pivot, rotation)),
        leaves,
    }
}

/// Leaf growing from the top corner of `bounds` on the leaf's side, angled
/// away from the stem.
fn leaf_points(leaf: &Leaf, bounds: Rect, scale: f32) -> [Vec2; 3] {
    let (anchor_x, outward) = match leaf.side {
        LeafSide::Left => (bounds.left, -1.0),
        LeafSide::Right => (bounds.right(), 1.0),
    };
    let anchor = Vec2::new(anchor_x, bounds.top);
    let angle = leaf.angle_degrees.to_radians();
    let direction = Vec2::new(outward * angle.sin(), -angle.cos());
    let across = direction.perp() * (LEAF_WIDTH * scale / 2.0);

    [
        anchor + across,
        anchor - across,
        anchor + direction * (LEAF_LENGTH * scale),
    ]
}

fn corners(rect: Rect) -> [Vec2; 4] {
    [
        Vec2::new(rect.left, rect.top),
        Vec2::new(rect.right(), rect.top),
        Vec2::new(rect.right(), rect.bottom()),
        Vec2::new(rect.left, rect.bottom()),
    ]
}

fn rotate(point: Vec2, pivot: Vec2, rotation: Mat2) -> Vec2 {
    pivot + rotation * (point - pivot)
}

fn draw_quad(quad: [Vec2; 4], metrics: &SceneMetrics, color: Color) {
    draw_triangle([quad[0], quad[1], quad[2]], metrics, color);
    draw_triangle([quad[0], quad[2], quad[3]], metrics, color);
}

fn draw_triangle(points: [Vec2; 3], metrics: &SceneMetrics, color: Color) {
    let [a, b, c] = points.map(|point| to_macroquad_vec(metrics.to_screen(point)));
    macroquad::shapes::draw_triangle(a, b, c, to_macroquad_color(color));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: Vec2, b: Vec2) -> bool {
        (a - b).length() < 1e-4
    }

    fn segment(leaves: Vec<Leaf>) -> SegmentPresentation {
        SegmentPresentation {
            bounds: Rect::new(95.0, 60.0, 10.0, 40.0),
            opacity: 1.0,
            brightness: 1.0,
            leaves,
        }
    }

    #[test]
    fn upright_segment_keeps_its_box() {
        let shape = segment_shape(
            &segment(Vec::new()),
            Vec2::new(100.0, 100.0),
            Mat2::IDENTITY,
            1.0,
        );

        assert_eq!(shape.quad, corners(Rect::new(95.0, 60.0, 10.0, 40.0)));
        assert_eq!(shape.node[0], Vec2::new(95.0, 60.0));
        assert_eq!(shape.node[3], Vec2::new(95.0, 62.0));
        assert!(shape.leaves.is_empty());
    }

    #[test]
    fn tilt_pivots_around_the_bottom_centre() {
        let pivot = Vec2::new(100.0, 100.0);
        let rotation = Mat2::from_angle(90f32.to_radians());

        let shape = segment_shape(&segment(Vec::new()), pivot, rotation, 1.0);

        // bottom corners sit five pixels either side of the pivot
        assert!(close(shape.quad[3], Vec2::new(100.0, 95.0)));
        assert!(close(shape.quad[2], Vec2::new(100.0, 105.0)));
        // positive tilt leans the top to the right
        assert!(close(shape.quad[0], Vec2::new(140.0, 95.0)));
    }

    #[test]
    fn leaves_point_away_from_the_stem() {
        let bounds = Rect::new(95.0, 60.0, 10.0, 40.0);
        let leaf = |side| Leaf {
            side,
            angle_degrees: 30.0,
            light: false,
        };

        let left = leaf_points(&leaf(LeafSide::Left), bounds, 1.0);
        let right = leaf_points(&leaf(LeafSide::Right), bounds, 2.0);

        assert!(left[2].x < bounds.left);
        assert!(left[2].y < bounds.top);
        assert!(right[2].x > bounds.right());
        assert!(close(right[2], Vec2::new(105.0 + 16.0, 60.0 - 32.0 * 0.75f32.sqrt())));
    }
}
