//! Retained element tree behind [`SceneStage`](crate::SceneStage).

use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};

use parking_lot::Mutex;
use pet_panda_core::{Element, ElementId, Pose, Rect, StageError, Style, Timing};

use crate::{
    PandaPresentation, RenderingError, Scene, SegmentPresentation, SharedGraph,
    ShootPresentation, WorldPresentation,
};

/// Width of a bamboo shoot before scaling.
pub const SHOOT_WIDTH: f32 = 10.0;
/// Width of the panda before scaling.
pub const PANDA_WIDTH: f32 = 48.0;
/// Height of the panda before scaling.
pub const PANDA_HEIGHT: f32 = 36.0;

/// Dimensions every world is laid out in.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Layout {
    world_width: f32,
    world_height: f32,
    scale: f32,
}

impl Default for Layout {
    fn default() -> Self {
        Self {
            world_width: 360.0,
            world_height: 160.0,
            scale: 1.0,
        }
    }
}

impl Layout {
    /// Creates a layout, rejecting non-positive dimensions.
    pub fn new(world_width: f32, world_height: f32, scale: f32) -> Result<Self, RenderingError> {
        for (name, value) in [
            ("world_width", world_width),
            ("world_height", world_height),
            ("world_scale", scale),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(RenderingError::InvalidLayout { name, value });
            }
        }

        Ok(Self {
            world_width,
            world_height,
            scale,
        })
    }

    /// Width of a world box.
    #[must_use]
    pub const fn world_width(&self) -> f32 {
        self.world_width
    }

    /// Height of a world box.
    #[must_use]
    pub const fn world_height(&self) -> f32 {
        self.world_height
    }

    /// Multiplier applied to element sizes; positions are left untouched.
    #[must_use]
    pub const fn scale(&self) -> f32 {
        self.scale
    }
}

/// A property that moves linearly from one value to another over time.
#[derive(Clone, Copy, Debug)]
struct Animated {
    from: f32,
    to: f32,
    start: Instant,
    duration: Duration,
}

impl Animated {
    fn settled(value: f32, now: Instant) -> Self {
        Self {
            from: value,
            to: value,
            start: now,
            duration: Duration::ZERO,
        }
    }

    fn value_at(&self, now: Instant) -> f32 {
        let elapsed = now.saturating_duration_since(self.start);
        if self.duration.is_zero() || elapsed >= self.duration {
            return self.to;
        }
        let progress = elapsed.as_secs_f32() / self.duration.as_secs_f32();
        self.from + (self.to - self.from) * progress
    }

    fn retarget(&mut self, to: f32, duration: Duration, now: Instant) {
        *self = Self {
            from: self.value_at(now),
            to,
            start: now,
            duration,
        };
    }
}

#[derive(Clone, Debug)]
struct Node {
    element: Element,
    parent: Option<ElementId>,
    children: Vec<ElementId>,
    opacity: Animated,
    brightness: Animated,
    left: Animated,
    tilt_degrees: f32,
    timing: Timing,
    pose: Pose,
}

impl Node {
    fn new(element: Element, parent: Option<ElementId>, style: Style, now: Instant) -> Self {
        Self {
            element,
            parent,
            children: Vec::new(),
            opacity: Animated::settled(style.opacity.unwrap_or(1.0), now),
            brightness: Animated::settled(style.brightness.unwrap_or(1.0), now),
            left: Animated::settled(style.left.unwrap_or(0.0), now),
            tilt_degrees: style.tilt_degrees.unwrap_or(0.0),
            timing: Timing::NONE,
            pose: Pose::default(),
        }
    }

    fn segment_height(&self) -> f32 {
        match &self.element {
            Element::Segment(segment) => segment.height as f32,
            _ => 0.0,
        }
    }
}

/// Retained tree of every element mounted through a stage.
///
/// Shoots are spread evenly across their world in mount order and stand on
/// its floor; segments stack upwards in mount order; a panda stands on the
/// floor at its `left` offset. Worlds are stacked vertically.
#[derive(Clone, Debug)]
pub struct SceneGraph {
    layout: Layout,
    nodes: HashMap<ElementId, Node>,
    roots: Vec<ElementId>,
    next_id: u64,
}

impl SceneGraph {
    /// Creates an empty graph.
    #[must_use]
    pub fn new(layout: Layout) -> Self {
        Self {
            layout,
            nodes: HashMap::new(),
            roots: Vec::new(),
            next_id: 1,
        }
    }

    /// Creates an empty graph ready to be shared with a renderer.
    #[must_use]
    pub fn shared(layout: Layout) -> SharedGraph {
        Arc::new(Mutex::new(Self::new(layout)))
    }

    /// Dimensions used for layout.
    #[must_use]
    pub const fn layout(&self) -> &Layout {
        &self.layout
    }

    /// Number of mounted elements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns `true` when nothing is mounted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Whether `id` is currently mounted.
    #[must_use]
    pub fn contains(&self, id: ElementId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// Creates `element` as the last child of `parent`, or as a new root.
    pub fn mount(
        &mut self,
        parent: Option<ElementId>,
        element: Element,
        style: Style,
        now: Instant,
    ) -> Result<ElementId, StageError> {
        let id = ElementId::new(self.next_id);
        match parent {
            Some(parent) => self
                .nodes
                .get_mut(&parent)
                .ok_or(StageError::MissingParent(parent))?
                .children
                .push(id),
            None => self.roots.push(id),
        }
        self.next_id += 1;
        let _previous = self
            .nodes
            .insert(id, Node::new(element, parent, style, now));
        Ok(id)
    }

    /// Removes `id` and all of its descendants.
    pub fn detach(&mut self, id: ElementId) -> Result<(), StageError> {
        let node = self
            .nodes
            .remove(&id)
            .ok_or(StageError::MissingElement(id))?;

        match node.parent.and_then(|parent| self.nodes.get_mut(&parent)) {
            Some(parent) => parent.children.retain(|child| *child != id),
            None => self.roots.retain(|root| *root != id),
        }

        let mut pending = node.children;
        while let Some(child) = pending.pop() {
            if let Some(removed) = self.nodes.remove(&child) {
                pending.extend(removed.children);
            }
        }
        Ok(())
    }

    /// Moves properties towards `style`, animating them per the element's timing.
    pub fn apply_style(
        &mut self,
        id: ElementId,
        style: Style,
        now: Instant,
    ) -> Result<(), StageError> {
        let node = self.node_mut(id)?;
        let timing = node.timing;
        if let Some(opacity) = style.opacity {
            node.opacity.retarget(opacity, timing.opacity, now);
        }
        if let Some(brightness) = style.brightness {
            node.brightness.retarget(brightness, timing.brightness, now);
        }
        if let Some(left) = style.left {
            node.left.retarget(left, timing.left, now);
        }
        if let Some(tilt) = style.tilt_degrees {
            node.tilt_degrees = tilt;
        }
        Ok(())
    }

    /// Replaces the timing used by later style changes.
    ///
    /// Animations already running keep their original duration.
    pub fn set_timing(&mut self, id: ElementId, timing: Timing) -> Result<(), StageError> {
        self.node_mut(id)?.timing = timing;
        Ok(())
    }

    /// Changes the pose of an element.
    pub fn set_pose(&mut self, id: ElementId, pose: Pose) -> Result<(), StageError> {
        self.node_mut(id)?.pose = pose;
        Ok(())
    }

    /// Current pose of an element.
    pub fn pose(&self, id: ElementId) -> Result<Pose, StageError> {
        Ok(self.node(id)?.pose)
    }

    /// Current opacity of an element, mid-animation values included.
    pub fn opacity(&self, id: ElementId, now: Instant) -> Result<f32, StageError> {
        Ok(self.node(id)?.opacity.value_at(now))
    }

    /// Current brightness of an element, mid-animation values included.
    pub fn brightness(&self, id: ElementId, now: Instant) -> Result<f32, StageError> {
        Ok(self.node(id)?.brightness.value_at(now))
    }

    /// On-screen box of an element at `now`.
    pub fn bounds(&self, id: ElementId, now: Instant) -> Result<Rect, StageError> {
        let node = self.node(id)?;
        let scale = self.layout.scale;

        let Some(parent_id) = node.parent else {
            let index = self.roots.iter().position(|root| *root == id).unwrap_or(0);
            return Ok(Rect::new(
                0.0,
                index as f32 * self.layout.world_height,
                self.layout.world_width,
                self.layout.world_height,
            ));
        };
        let parent = self.bounds(parent_id, now)?;
        let siblings = &self.node(parent_id)?.children;

        let rect = match node.element {
            Element::World => parent,
            Element::Shoot => {
                let shoots: Vec<ElementId> = siblings
                    .iter()
                    .copied()
                    .filter(|sibling| {
                        self.nodes
                            .get(sibling)
                            .is_some_and(|node| matches!(node.element, Element::Shoot))
                    })
                    .collect();
                let index = shoots.iter().position(|shoot| *shoot == id).unwrap_or(0);
                let spacing = parent.width / shoots.len().max(1) as f32;
                let centre = parent.left + spacing * (index as f32 + 0.5);
                let width = SHOOT_WIDTH * scale;
                let height = self.stack_height(&node.children) * scale;
                Rect::new(centre - width / 2.0, parent.bottom() - height, width, height)
            }
            Element::Segment(_) => {
                let below: Vec<ElementId> = siblings
                    .iter()
                    .copied()
                    .take_while(|sibling| *sibling != id)
                    .collect();
                let offset = self.stack_height(&below) * scale;
                let height = node.segment_height() * scale;
                Rect::new(
                    parent.left,
                    parent.bottom() - offset - height,
                    parent.width,
                    height,
                )
            }
            Element::Panda => {
                let width = PANDA_WIDTH * scale;
                let height = PANDA_HEIGHT * scale;
                Rect::new(
                    parent.left + node.left.value_at(now),
                    parent.bottom() - height,
                    width,
                    height,
                )
            }
        };
        Ok(rect)
    }

    /// Builds a presentation snapshot of every world at `now`.
    #[must_use]
    pub fn scene(&self, now: Instant) -> Scene {
        let worlds = self
            .roots
            .iter()
            .filter_map(|root| self.world_presentation(*root, now).ok())
            .collect();
        Scene::new(self.layout.scale, worlds)
    }

    fn world_presentation(
        &self,
        world: ElementId,
        now: Instant,
    ) -> Result<WorldPresentation, StageError> {
        let mut presentation = WorldPresentation {
            bounds: self.bounds(world, now)?,
            shoots: Vec::new(),
            pandas: Vec::new(),
        };

        for child in &self.node(world)?.children {
            let node = self.node(*child)?;
            match node.element {
                Element::Shoot => {
                    let segments = node
                        .children
                        .iter()
                        .map(|segment| self.segment_presentation(*segment, now))
                        .collect::<Result<_, _>>()?;
                    presentation.shoots.push(ShootPresentation {
                        bounds: self.bounds(*child, now)?,
                        tilt_degrees: node.tilt_degrees,
                        segments,
                    });
                }
                Element::Panda => presentation.pandas.push(PandaPresentation {
                    bounds: self.bounds(*child, now)?,
                    pose: node.pose,
                }),
                Element::World | Element::Segment(_) => {}
            }
        }
        Ok(presentation)
    }

    fn segment_presentation(
        &self,
        id: ElementId,
        now: Instant,
    ) -> Result<SegmentPresentation, StageError> {
        let node = self.node(id)?;
        let leaves = match &node.element {
            Element::Segment(segment) => segment.leaves.clone(),
            _ => Vec::new(),
        };
        Ok(SegmentPresentation {
            bounds: self.bounds(id, now)?,
            opacity: node.opacity.value_at(now),
            brightness: node.brightness.value_at(now),
            leaves,
        })
    }

    fn stack_height(&self, ids: &[ElementId]) -> f32 {
        ids.iter()
            .filter_map(|id| self.nodes.get(id))
            .map(Node::segment_height)
            .sum()
    }

    fn node(&self, id: ElementId) -> Result<&Node, StageError> {
        self.nodes.get(&id).ok_or(StageError::MissingElement(id))
    }

    fn node_mut(&mut self, id: ElementId) -> Result<&mut Node, StageError> {
        self.nodes.get_mut(&id).ok_or(StageError::MissingElement(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pet_panda_core::Segment;

    fn segment(height: u32) -> Element {
        Element::Segment(Segment {
            height,
            leaves: Vec::new(),
        })
    }

    #[test]
    fn animated_values_interpolate_linearly() {
        let start = Instant::now();
        let mut value = Animated::settled(0.0, start);

        value.retarget(10.0, Duration::from_millis(100), start);

        assert_eq!(value.value_at(start), 0.0);
        assert!((value.value_at(start + Duration::from_millis(50)) - 5.0).abs() < 1e-4);
        assert_eq!(value.value_at(start + Duration::from_millis(150)), 10.0);
    }

    #[test]
    fn retargeting_mid_flight_starts_from_the_current_value() {
        let start = Instant::now();
        let mut value = Animated::settled(0.0, start);
        value.retarget(10.0, Duration::from_millis(100), start);

        let midway = start + Duration::from_millis(50);
        value.retarget(0.0, Duration::from_millis(100), midway);

        assert!((value.value_at(midway) - 5.0).abs() < 1e-4);
    }

    #[test]
    fn segments_stack_upwards_in_mount_order() {
        let now = Instant::now();
        let mut graph = SceneGraph::new(Layout::default());
        let world = graph
            .mount(None, Element::World, Style::EMPTY, now)
            .expect("root mounts");
        let shoot = graph
            .mount(Some(world), Element::Shoot, Style::EMPTY, now)
            .expect("shoot mounts");
        let lower = graph
            .mount(Some(shoot), segment(20), Style::SETTLED, now)
            .expect("segment mounts");
        let upper = graph
            .mount(Some(shoot), segment(30), Style::SETTLED, now)
            .expect("segment mounts");

        let lower = graph.bounds(lower, now).expect("lower bounds");
        let upper = graph.bounds(upper, now).expect("upper bounds");
        let shoot = graph.bounds(shoot, now).expect("shoot bounds");

        assert_eq!(lower.bottom(), 160.0);
        assert_eq!(upper.bottom(), lower.top);
        assert_eq!(shoot.height, 50.0);
        assert_eq!(shoot.top, upper.top);
    }

    #[test]
    fn detaching_removes_descendants() {
        let now = Instant::now();
        let mut graph = SceneGraph::new(Layout::default());
        let world = graph
            .mount(None, Element::World, Style::EMPTY, now)
            .expect("root mounts");
        let shoot = graph
            .mount(Some(world), Element::Shoot, Style::EMPTY, now)
            .expect("shoot mounts");
        let _segment = graph
            .mount(Some(shoot), segment(10), Style::SETTLED, now)
            .expect("segment mounts");

        graph.detach(shoot).expect("shoot detaches");

        assert_eq!(graph.len(), 1);
        assert_eq!(
            graph.detach(shoot),
            Err(StageError::MissingElement(shoot))
        );
    }
}
