use std::time::{Duration, Instant};

/// High-level behaviour requested by the caller.
///
/// The render policy decides whether frames animate continuously or are
/// evaluated once at a fixed timestamp.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderPolicy {
    /// Run the render loop continuously, optionally clamping the frame rate.
    Animate {
        /// Optional requested frames-per-second cap.
        target_fps: Option<f32>,
    },
    /// Render a single still frame at a fixed timestamp (seconds).
    Still { time: f32 },
}

impl Default for RenderPolicy {
    fn default() -> Self {
        Self::Animate { target_fps: None }
    }
}

/// Abstraction over where frame timestamps come from.
pub trait TimeSource: Send {
    /// Seconds to feed the field for the next frame.
    fn sample(&mut self) -> f32;
}

/// Time source backed by the system monotonic clock.
#[derive(Debug, Clone, Copy)]
pub struct SystemTimeSource {
    origin: Instant,
}

impl SystemTimeSource {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Default for SystemTimeSource {
    fn default() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl TimeSource for SystemTimeSource {
    fn sample(&mut self) -> f32 {
        self.origin.elapsed().as_secs_f32()
    }
}

/// Time source that always reports a fixed timestamp.
#[derive(Debug, Clone, Copy)]
pub struct FixedTimeSource {
    time: f32,
}

impl FixedTimeSource {
    pub fn new(time: f32) -> Self {
        Self { time }
    }
}

impl TimeSource for FixedTimeSource {
    fn sample(&mut self) -> f32 {
        self.time
    }
}

pub type BoxedTimeSource = Box<dyn TimeSource + Send>;

/// Builds a time source suited to the requested render policy.
pub fn time_source_for_policy(policy: &RenderPolicy) -> BoxedTimeSource {
    match policy {
        RenderPolicy::Animate { .. } => Box::new(SystemTimeSource::new()),
        RenderPolicy::Still { time } => Box::new(FixedTimeSource::new(*time)),
    }
}

/// Decides when the next redraw should be requested.
///
/// Uncapped animation redraws whenever the event loop is about to wait and
/// lets FIFO presentation pace it to the display. A cap spaces frames by
/// `1 / fps`. Still frames draw once and then only after [`invalidate`].
///
/// [`invalidate`]: FrameScheduler::invalidate
#[derive(Debug, Clone)]
pub struct FrameScheduler {
    policy: RenderPolicy,
    frame_interval: Option<Duration>,
    last_frame: Option<Instant>,
    stale: bool,
}

impl FrameScheduler {
    pub fn new(policy: RenderPolicy) -> Self {
        let frame_interval = match &policy {
            RenderPolicy::Animate {
                target_fps: Some(fps),
            } if fps.is_finite() && *fps > 0.0 => {
                Some(Duration::from_secs_f64(1.0 / f64::from(*fps)))
            }
            _ => None,
        };
        Self {
            policy,
            frame_interval,
            last_frame: None,
            stale: true,
        }
    }

    pub fn frame_interval(&self) -> Option<Duration> {
        self.frame_interval
    }

    pub fn ready_for_frame(&self, now: Instant) -> bool {
        match self.policy {
            RenderPolicy::Still { .. } => self.stale,
            RenderPolicy::Animate { .. } => match (self.frame_interval, self.last_frame) {
                (Some(interval), Some(last)) => now >= last + interval,
                _ => true,
            },
        }
    }

    pub fn mark_rendered(&mut self, now: Instant) {
        self.last_frame = Some(now);
        self.stale = false;
    }

    /// Instant at which a capped animation wants its next frame.
    pub fn next_deadline(&self) -> Option<Instant> {
        match self.policy {
            RenderPolicy::Still { .. } => None,
            RenderPolicy::Animate { .. } => {
                let interval = self.frame_interval?;
                self.last_frame.map(|last| last + interval)
            }
        }
    }

    /// Forces a repaint, e.g. after a resize exposed new pixels of a still frame.
    pub fn invalidate(&mut self) {
        self.stale = true;
    }
}

/// Frame-rate cap applied to software rasterizers when the caller set none.
pub(crate) const SOFTWARE_FPS_CAP: f32 = 15.0;

/// Applies the software-rasterizer cap unless the caller already chose a rate.
pub(crate) fn effective_policy(
    policy: &RenderPolicy,
    software: bool,
) -> (RenderPolicy, Option<f32>) {
    match policy {
        RenderPolicy::Animate { target_fps: None } if software => (
            RenderPolicy::Animate {
                target_fps: Some(SOFTWARE_FPS_CAP),
            },
            Some(SOFTWARE_FPS_CAP),
        ),
        other => (other.clone(), None),
    }
}

/// Couples the frame scheduler with the time source selected for a policy.
pub(crate) struct RenderPolicyDriver {
    scheduler: FrameScheduler,
    time_source: BoxedTimeSource,
}

impl RenderPolicyDriver {
    pub(crate) fn new(policy: RenderPolicy) -> Self {
        let time_source = time_source_for_policy(&policy);
        Self {
            scheduler: FrameScheduler::new(policy),
            time_source,
        }
    }

    pub(crate) fn ready_for_frame(&self, now: Instant) -> bool {
        self.scheduler.ready_for_frame(now)
    }

    pub(crate) fn next_deadline(&self) -> Option<Instant> {
        self.scheduler.next_deadline()
    }

    /// True when no further frame is due until [`invalidate`](Self::invalidate).
    pub(crate) fn is_idle(&self) -> bool {
        !self.scheduler.ready_for_frame(Instant::now()) && self.next_deadline().is_none()
    }

    pub(crate) fn sample(&mut self) -> f32 {
        self.time_source.sample()
    }

    pub(crate) fn mark_rendered(&mut self) {
        self.scheduler.mark_rendered(Instant::now());
    }

    pub(crate) fn invalidate(&mut self) {
        self.scheduler.invalidate();
    }
}
