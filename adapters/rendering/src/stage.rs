use std::{sync::Arc, time::Duration};

use parking_lot::Mutex;
use pet_panda_core::{Element, ElementId, Pose, Rect, Stage, StageError, Style, Timing};
use tokio::{
    sync::watch,
    time::{self, Instant, MissedTickBehavior},
};
use tracing::trace;

use crate::SceneGraph;

/// Scene graph shared between the simulation and the renderer.
pub type SharedGraph = Arc<Mutex<SceneGraph>>;

/// Marks frame boundaries for every stage subscribed to it.
#[derive(Debug)]
pub struct FrameSignal {
    sender: watch::Sender<u64>,
}

impl Default for FrameSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameSignal {
    /// Creates a signal that has presented no frame yet.
    #[must_use]
    pub fn new() -> Self {
        let (sender, _receiver) = watch::channel(0);
        Self { sender }
    }

    /// Receiver stages wait on.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.sender.subscribe()
    }

    /// Announces that a frame has been presented; returns its number.
    pub fn present(&self) -> u64 {
        let mut presented = 0;
        self.sender.send_modify(|frame| {
            *frame = frame.wrapping_add(1);
            presented = *frame;
        });
        presented
    }
}

/// Presents frames on a fixed period when no window does.
#[derive(Debug)]
pub struct FrameClock {
    signal: FrameSignal,
    period: Duration,
}

impl FrameClock {
    /// Roughly sixty frames per second.
    pub const DEFAULT_PERIOD: Duration = Duration::from_millis(16);

    /// Creates a clock driving `signal` every `period`.
    #[must_use]
    pub fn new(signal: FrameSignal, period: Duration) -> Self {
        Self {
            signal,
            period: period.max(Duration::from_millis(1)),
        }
    }

    /// Presents frames forever.
    pub async fn run(self) {
        let mut frames = time::interval(self.period);
        frames.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            let _instant = frames.tick().await;
            let _frame = self.signal.present();
        }
    }
}

/// [`Stage`] implementation backed by a [`SceneGraph`].
///
/// Cheap to clone; clones drive the same graph and wait on the same frames.
#[derive(Clone, Debug)]
pub struct SceneStage {
    graph: SharedGraph,
    frames: watch::Receiver<u64>,
}

impl SceneStage {
    /// Creates a stage over `graph` whose frame boundaries come from `frames`.
    #[must_use]
    pub fn new(graph: SharedGraph, frames: watch::Receiver<u64>) -> Self {
        Self { graph, frames }
    }

    /// The graph this stage mutates.
    #[must_use]
    pub fn graph(&self) -> &SharedGraph {
        &self.graph
    }

    async fn next_frame(&self) -> Result<u64, StageError> {
        let mut frames = self.frames.clone();
        let _seen = *frames.borrow_and_update();
        frames
            .changed()
            .await
            .map_err(|_| StageError::FramesClosed)?;
        let frame = *frames.borrow();
        Ok(frame)
    }
}

fn now() -> std::time::Instant {
    Instant::now().into_std()
}

impl Stage for SceneStage {
    fn mount(
        &self,
        parent: Option<ElementId>,
        element: Element,
        style: Style,
    ) -> Result<ElementId, StageError> {
        let id = self.graph.lock().mount(parent, element, style, now())?;
        trace!(element = %id, "mounted");
        Ok(id)
    }

    fn detach(&self, element: ElementId) -> Result<(), StageError> {
        self.graph.lock().detach(element)?;
        trace!(%element, "detached");
        Ok(())
    }

    fn apply_style(&self, element: ElementId, style: Style) -> Result<(), StageError> {
        self.graph.lock().apply_style(element, style, now())
    }

    fn set_timing(&self, element: ElementId, timing: Timing) -> Result<(), StageError> {
        self.graph.lock().set_timing(element, timing)
    }

    fn set_pose(&self, element: ElementId, pose: Pose) -> Result<(), StageError> {
        self.graph.lock().set_pose(element, pose)
    }

    fn bounds(&self, element: ElementId) -> Result<Rect, StageError> {
        self.graph.lock().bounds(element, now())
    }

    async fn visible_transition(
        &self,
        element: ElementId,
        before: Style,
        after: Style,
        timing: Timing,
    ) -> Result<(), StageError> {
        {
            let mut graph = self.graph.lock();
            graph.set_timing(element, Timing::NONE)?;
            graph.apply_style(element, before, now())?;
            graph.set_timing(element, timing)?;
        }

        let first = self.next_frame().await?;
        let second = self.next_frame().await?;
        trace!(%element, first, second, "starting visible transition");

        self.graph.lock().apply_style(element, after, now())
    }
}
