use glam::Vec2;
use pet_panda_core::{Facing, Pose, Rect};
use pet_panda_rendering::{Color, PandaPresentation};

use crate::{to_macroquad_color, SceneMetrics};

const FUR: Color = Color::from_rgb_u8(244, 244, 236);
const PATCH: Color = Color::from_rgb_u8(34, 34, 38);
const BAMBOO: Color = Color::from_rgb_u8(92, 150, 66);

/// One primitive of the panda figure, in scene coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
enum Part {
    Circle {
        centre: Vec2,
        radius: f32,
        color: Color,
    },
    Bar {
        rect: Rect,
        color: Color,
    },
}

pub(crate) fn draw_panda(panda: &PandaPresentation, metrics: &SceneMetrics) {
    for part in figure(panda.pose, panda.bounds) {
        match part {
            Part::Circle {
                centre,
                radius,
                color,
            } => {
                let centre = metrics.to_screen(centre);
                macroquad::shapes::draw_circle(
                    centre.x,
                    centre.y,
                    radius * metrics.scale,
                    to_macroquad_color(color),
                );
            }
            Part::Bar { rect, color } => {
                let rect = metrics.rect_to_screen(rect);
                macroquad::shapes::draw_rectangle(
                    rect.left,
                    rect.top,
                    rect.width,
                    rect.height,
                    to_macroquad_color(color),
                );
            }
        }
    }
}

/// Lays out the panda inside `bounds`, back to front.
fn figure(pose: Pose, bounds: Rect) -> Vec<Part> {
    let width = bounds.width;
    let height = bounds.height;
    let floor = bounds.bottom();
    let centre_x = bounds.left + width / 2.0;

    let (facing, sitting) = match pose {
        Pose::Standing => (1.0, false),
        Pose::Walking(Facing::Left) => (-1.0, false),
        Pose::Walking(Facing::Right) => (1.0, false),
        Pose::Sitting | Pose::Eating => (0.0, true),
    };

    let mut parts = Vec::new();
    let (body, head) = if sitting {
        let body = Vec2::new(centre_x, floor - height * 0.3);
        let head = Vec2::new(centre_x, floor - height * 0.55);
        parts.push(Part::Circle {
            centre: Vec2::new(centre_x - width * 0.22, floor - height * 0.1),
            radius: height * 0.1,
            color: PATCH,
        });
        parts.push(Part::Circle {
            centre: Vec2::new(centre_x + width * 0.22, floor - height * 0.1),
            radius: height * 0.1,
            color: PATCH,
        });
        (body, head)
    } else {
        let leg_width = width * 0.14;
        let leg_height = height * 0.3;
        for offset in [-0.3, 0.16] {
            parts.push(Part::Bar {
                rect: Rect::new(
                    centre_x + width * offset,
                    floor - leg_height,
                    leg_width,
                    leg_height,
                ),
                color: PATCH,
            });
        }
        let body = Vec2::new(centre_x - facing * width * 0.06, floor - height * 0.45);
        let head = Vec2::new(centre_x + facing * width * 0.32, floor - height * 0.62);
        (body, head)
    };

    parts.push(Part::Circle {
        centre: body,
        radius: height * 0.3,
        color: FUR,
    });
    for side in [-1.0, 1.0] {
        parts.push(Part::Circle {
            centre: head + Vec2::new(side * height * 0.17, -height * 0.17),
            radius: height * 0.08,
            color: PATCH,
        });
    }
    parts.push(Part::Circle {
        centre: head,
        radius: height * 0.22,
        color: FUR,
    });
    for side in [-1.0, 1.0] {
        parts.push(Part::Circle {
            centre: head + Vec2::new(side * height * 0.08 + facing * height * 0.04, 0.0),
            radius: height * 0.05,
            color: PATCH,
        });
    }

    if pose == Pose::Eating {
        parts.push(Part::Bar {
            rect: Rect::new(
                head.x - width * 0.04,
                head.y + height * 0.05,
                width * 0.08,
                height * 0.4,
            ),
            color: BAMBOO,
        });
    }

    parts
}

#[cfg(test)]
mod tests {
    use super::*;

    const BOUNDS: Rect = Rect::new(0.0, 64.0, 48.0, 36.0);

    fn head(parts: &[Part]) -> Vec2 {
        parts
            .iter()
            .filter_map(|part| match part {
                Part::Circle {
                    centre,
                    radius,
                    color,
                } if *color == FUR && *radius < BOUNDS.height * 0.25 => Some(*centre),
                _ => None,
            })
            .next()
            .expect("figure has a head")
    }

    #[test]
    fn walking_panda_faces_its_heading() {
        let left = head(&figure(Pose::Walking(Facing::Left), BOUNDS));
        let right = head(&figure(Pose::Walking(Facing::Right), BOUNDS));

        assert!(left.x < 24.0);
        assert!(right.x > 24.0);
    }

    #[test]
    fn sitting_panda_is_lower_than_standing() {
        let sitting = head(&figure(Pose::Sitting, BOUNDS));
        let standing = head(&figure(Pose::Standing, BOUNDS));

        assert_eq!(sitting.x, 24.0);
        assert!(sitting.y > standing.y);
    }

    #[test]
    fn only_eating_panda_holds_bamboo() {
        let holds_bamboo = |pose| {
            figure(pose, BOUNDS)
                .iter()
                .any(|part| matches!(part, Part::Bar { color, .. } if *color == BAMBOO))
        };

        assert!(holds_bamboo(Pose::Eating));
        assert!(!holds_bamboo(Pose::Sitting));
        assert!(!holds_bamboo(Pose::Walking(Facing::Right)));
    }

    #[test]
    fn figure_stays_on_the_floor() {
        for pose in [
            Pose::Standing,
            Pose::Sitting,
            Pose::Eating,
            Pose::Walking(Facing::Left),
        ] {
            let lowest = figure(pose, BOUNDS)
                .iter()
                .map(|part| match part {
                    Part::Circle { centre, radius, .. } => centre.y + radius,
                    Part::Bar { rect, .. } => rect.bottom(),
                })
                .fold(f32::MIN, f32::max);
            assert!(lowest <= BOUNDS.bottom() + 1e-3, "{pose:?} sinks to {lowest}");
        }
    }
}
