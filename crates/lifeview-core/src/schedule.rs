//! Play/pause frame loop with explicit, cancellable callback handles.
//!
//! The host owns the actual timing source (vsync, terminal poll loop,
//! requestAnimationFrame). It hands out handles through [`FramePump`]
//! and calls [`FrameScheduler::on_wake`] when a scheduled wake fires.
//! The scheduler holds at most one live handle, acquired on play and
//! released on pause, so a duplicate render loop cannot leak.

use std::collections::VecDeque;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use slotmap::{SlotMap, new_key_type};
use tracing::debug;

/// Samples kept in the rolling frame-rate window.
pub const FRAME_STATS_WINDOW: usize = 100;

/// Floor for the measured inter-frame delta in milliseconds, so a
/// zero-delta wake cannot record an infinite rate.
const MIN_FRAME_DELTA_MS: f64 = 1.0e-3;

/// Target rates outside this range are clamped when pacing is updated.
const MIN_TARGET_FPS: f64 = 0.25;
const MAX_TARGET_FPS: f64 = 240.0;

new_key_type! {
    /// Handle to one outstanding scheduled frame callback.
    pub struct FrameHandle;
}

/// Host-side scheduling primitive. `request_frame` arms a wake on the
/// next vsync-equivalent tick, `request_delay` arms one after a fixed
/// delay, and `cancel` revokes an armed wake before it fires.
pub trait FramePump {
    fn request_frame(&mut self) -> FrameHandle;
    fn request_delay(&mut self, delay: Duration) -> FrameHandle;
    fn cancel(&mut self, handle: FrameHandle);
}

/// Work performed inside one admitted frame, in tick-then-draw order.
///
/// `draw` handles its own failures; a bad frame must log and move on
/// rather than stop the loop, which reschedules unconditionally.
pub trait FrameBody {
    fn tick(&mut self);
    fn draw(&mut self);
}

/// How the next frame is scheduled after an admitted one.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum Pacing {
    /// Run on every vsync-equivalent tick the pump offers.
    EveryFrame,
    /// Defer each frame by `1000 / fps` milliseconds instead.
    TargetRate { fps: f64 },
}

impl Default for Pacing {
    fn default() -> Self {
        Self::EveryFrame
    }
}

/// Playback state. The pending handle lives inside `Running`, which
/// makes "a callback handle exists iff playback is running" structural.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum PlaybackState {
    Paused,
    Running { pending: FrameHandle },
}

impl PlaybackState {
    #[inline]
    fn is_running(&self) -> bool {
        matches!(self, Self::Running { .. })
    }
}

/// Whether a wake actually ran its frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameVerdict {
    Admitted,
    Skipped,
}

/// Rolling window of instantaneous frame rates.
///
/// Derived figures are recomputed from the whole window on demand, the
/// window itself is a fixed-capacity FIFO.
#[derive(Clone, Debug)]
pub struct FrameStats {
    samples: VecDeque<f64>,
    last_mark_ms: f64,
}

/// Window figures rounded to whole frames per second for display.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RateReport {
    pub latest: u32,
    pub mean: u32,
    pub min: u32,
    pub max: u32,
}

impl FrameStats {
    /// `start_ms` anchors the first sample: the first admitted frame
    /// measures its delta against scheduler start, not against nothing.
    pub fn new(start_ms: f64) -> Self {
        Self {
            samples: VecDeque::with_capacity(FRAME_STATS_WINDOW),
            last_mark_ms: start_ms,
        }
    }

    /// Record one frame boundary and return the instantaneous rate.
    pub fn record(&mut self, now_ms: f64) -> f64 {
        let delta = (now_ms - self.last_mark_ms).max(MIN_FRAME_DELTA_MS);
        self.last_mark_ms = now_ms;
        let rate = 1000.0 / delta;

        self.samples.push_back(rate);
        if self.samples.len() > FRAME_STATS_WINDOW {
            self.samples.pop_front();
        }
        rate
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Latest, mean, min, and max over the current window, or `None`
    /// before the first sample.
    pub fn report(&self) -> Option<RateReport> {
        let latest = *self.samples.back()?;
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        let mut sum = 0.0;
        for &rate in &self.samples {
            sum += rate;
            min = min.min(rate);
            max = max.max(rate);
        }
        let mean = sum / self.samples.len() as f64;
        Some(RateReport {
            latest: latest.round() as u32,
            mean: mean.round() as u32,
            min: min.round() as u32,
            max: max.round() as u32,
        })
    }
}

/// Drives the tick/draw loop: owns playback state, pacing, and the
/// frame statistics. Playback starts running.
pub struct FrameScheduler {
    playback: PlaybackState,
    pacing: Pacing,
    stats: FrameStats,
}

impl FrameScheduler {
    /// Build the scheduler and immediately arm the first wake.
    pub fn start<P: FramePump>(pump: &mut P, pacing: Pacing, now_ms: f64) -> Self {
        let pacing = Self::sanitize(pacing);
        let pending = Self::arm(pump, pacing);
        Self {
            playback: PlaybackState::Running { pending },
            pacing,
            stats: FrameStats::new(now_ms),
        }
    }

    #[inline]
    pub fn is_running(&self) -> bool {
        self.playback.is_running()
    }

    #[inline]
    pub fn pacing(&self) -> Pacing {
        self.pacing
    }

    #[inline]
    pub fn stats(&self) -> &FrameStats {
        &self.stats
    }

    /// Glyph for the play/pause control: the control shows the action
    /// it would trigger, as the reference UI did.
    pub fn playback_glyph(&self) -> &'static str {
        if self.is_running() { "⏸" } else { "▶" }
    }

    /// Cancel the pending wake and stop. Returns whether anything
    /// changed.
    pub fn pause<P: FramePump>(&mut self, pump: &mut P) -> bool {
        match self.playback {
            PlaybackState::Running { pending } => {
                pump.cancel(pending);
                self.playback = PlaybackState::Paused;
                debug!("playback paused");
                true
            }
            PlaybackState::Paused => false,
        }
    }

    /// Arm the next wake and resume. Returns whether anything changed.
    pub fn play<P: FramePump>(&mut self, pump: &mut P) -> bool {
        match self.playback {
            PlaybackState::Paused => {
                let pending = Self::arm(pump, self.pacing);
                self.playback = PlaybackState::Running { pending };
                debug!("playback resumed");
                true
            }
            PlaybackState::Running { .. } => false,
        }
    }

    /// Single control-event toggle between running and paused.
    pub fn toggle<P: FramePump>(&mut self, pump: &mut P) {
        if self.is_running() {
            self.pause(pump);
        } else {
            self.play(pump);
        }
    }

    /// Change pacing. While running, the pending wake is swapped for
    /// one armed under the new pacing, keeping exactly one live handle.
    pub fn set_pacing<P: FramePump>(&mut self, pump: &mut P, pacing: Pacing) {
        self.pacing = Self::sanitize(pacing);
        if let PlaybackState::Running { pending } = self.playback {
            pump.cancel(pending);
            let pending = Self::arm(pump, self.pacing);
            self.playback = PlaybackState::Running { pending };
        }
    }

    /// Run one wake delivered by the host.
    ///
    /// A pause requested while the wake was in flight is honored here,
    /// at expiry: the frame is skipped outright, with no sample, no
    /// tick, and no draw. An admitted frame records its rate sample,
    /// ticks the automaton, draws, and re-arms the next wake, in that
    /// order.
    pub fn on_wake<P: FramePump, B: FrameBody>(
        &mut self,
        pump: &mut P,
        now_ms: f64,
        body: &mut B,
    ) -> FrameVerdict {
        if !self.playback.is_running() {
            return FrameVerdict::Skipped;
        }

        self.stats.record(now_ms);
        body.tick();
        body.draw();

        let pending = Self::arm(pump, self.pacing);
        self.playback = PlaybackState::Running { pending };
        FrameVerdict::Admitted
    }

    /// Inter-frame delay for target-rate pacing: `1000 / fps` ms.
    /// A non-finite rate yields no delay.
    pub fn delay_for(fps: f64) -> Duration {
        if !fps.is_finite() {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(1.0 / fps.clamp(MIN_TARGET_FPS, MAX_TARGET_FPS))
    }

    /// Clamp a target rate into range. `clamp` keeps NaN, so non-finite
    /// rates fall back to every-frame pacing here.
    fn sanitize(pacing: Pacing) -> Pacing {
        match pacing {
            Pacing::TargetRate { fps } if fps.is_finite() => Pacing::TargetRate {
                fps: fps.clamp(MIN_TARGET_FPS, MAX_TARGET_FPS),
            },
            Pacing::TargetRate { .. } | Pacing::EveryFrame => Pacing::EveryFrame,
        }
    }

    fn arm<P: FramePump>(pump: &mut P, pacing: Pacing) -> FrameHandle {
        match pacing {
            Pacing::EveryFrame => pump.request_frame(),
            Pacing::TargetRate { fps } => pump.request_delay(Self::delay_for(fps)),
        }
    }
}

/// Deterministic pump for tests and headless hosts. Wakes are held
/// until the caller pops them, nothing fires on its own.
#[derive(Default)]
pub struct ManualPump {
    wakes: SlotMap<FrameHandle, WakeKind>,
}

/// What a pending wake is waiting for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WakeKind {
    NextFrame,
    After(Duration),
}

impl ManualPump {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of armed wakes. The scheduler keeps this at exactly one
    /// while running and zero while paused.
    pub fn outstanding(&self) -> usize {
        self.wakes.len()
    }

    pub fn contains(&self, handle: FrameHandle) -> bool {
        self.wakes.contains_key(handle)
    }

    pub fn wake_kind(&self, handle: FrameHandle) -> Option<WakeKind> {
        self.wakes.get(handle).copied()
    }

    /// Remove and return an armed wake, as if its moment arrived.
    pub fn pop(&mut self) -> Option<(FrameHandle, WakeKind)> {
        let handle = self.wakes.keys().next()?;
        let kind = self.wakes.remove(handle)?;
        Some((handle, kind))
    }
}

impl FramePump for ManualPump {
    fn request_frame(&mut self) -> FrameHandle {
        self.wakes.insert(WakeKind::NextFrame)
    }

    fn request_delay(&mut self, delay: Duration) -> FrameHandle {
        self.wakes.insert(WakeKind::After(delay))
    }

    fn cancel(&mut self, handle: FrameHandle) {
        self.wakes.remove(handle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct CountingBody {
        ticks: usize,
        draws: usize,
        order: Vec<&'static str>,
    }

    impl FrameBody for CountingBody {
        fn tick(&mut self) {
            self.ticks += 1;
            self.order.push("tick");
        }
        fn draw(&mut self) {
            self.draws += 1;
            self.order.push("draw");
        }
    }

    fn running_fixture() -> (FrameScheduler, ManualPump, CountingBody) {
        let mut pump = ManualPump::new();
        let scheduler = FrameScheduler::start(&mut pump, Pacing::EveryFrame, 0.0);
        (scheduler, pump, CountingBody::default())
    }

    #[test]
    fn starts_running_with_one_armed_wake() {
        let (scheduler, pump, _) = running_fixture();
        assert!(scheduler.is_running());
        assert_eq!(pump.outstanding(), 1);
        let PlaybackState::Running { pending } = scheduler.playback else {
            panic!("expected running playback");
        };
        assert!(pump.contains(pending));
    }

    #[test]
    fn admitted_frame_ticks_draws_and_rearms() {
        let (mut scheduler, mut pump, mut body) = running_fixture();
        let (_, _) = pump.pop().unwrap();

        let verdict = scheduler.on_wake(&mut pump, 16.0, &mut body);

        assert_eq!(verdict, FrameVerdict::Admitted);
        assert_eq!(body.ticks, 1);
        assert_eq!(body.draws, 1);
        assert_eq!(body.order, vec!["tick", "draw"]);
        assert_eq!(scheduler.stats().len(), 1);
        // A fresh wake replaced the one that fired.
        assert_eq!(pump.outstanding(), 1);
    }

    #[test]
    fn pause_cancels_the_only_outstanding_wake() {
        let (mut scheduler, mut pump, _) = running_fixture();
        assert!(scheduler.pause(&mut pump));
        assert_eq!(pump.outstanding(), 0);
        assert!(!scheduler.is_running());
        // Pausing again is a no-op.
        assert!(!scheduler.pause(&mut pump));
    }

    #[test]
    fn no_ticks_between_pause_and_play() {
        let (mut scheduler, mut pump, mut body) = running_fixture();
        let _ = pump.pop().unwrap();
        let _ = scheduler.on_wake(&mut pump, 10.0, &mut body);
        assert_eq!(body.ticks, 1);

        scheduler.pause(&mut pump);
        assert_eq!(pump.outstanding(), 0);

        // Even a wake that slips through after pause is skipped at
        // expiry and runs nothing.
        let verdict = scheduler.on_wake(&mut pump, 20.0, &mut body);
        assert_eq!(verdict, FrameVerdict::Skipped);
        assert_eq!(body.ticks, 1);
        assert_eq!(body.draws, 1);
        assert_eq!(scheduler.stats().len(), 1);
        assert_eq!(pump.outstanding(), 0);

        assert!(scheduler.play(&mut pump));
        assert_eq!(pump.outstanding(), 1);
        let _ = pump.pop().unwrap();
        let verdict = scheduler.on_wake(&mut pump, 30.0, &mut body);
        assert_eq!(verdict, FrameVerdict::Admitted);
        assert_eq!(body.ticks, 2);
    }

    #[test]
    fn toggle_flips_between_states() {
        let (mut scheduler, mut pump, _) = running_fixture();
        scheduler.toggle(&mut pump);
        assert!(!scheduler.is_running());
        assert_eq!(scheduler.playback_glyph(), "▶");
        scheduler.toggle(&mut pump);
        assert!(scheduler.is_running());
        assert_eq!(scheduler.playback_glyph(), "⏸");
        assert_eq!(pump.outstanding(), 1);
    }

    #[test]
    fn target_rate_arms_delay_wakes() {
        let mut pump = ManualPump::new();
        let scheduler =
            FrameScheduler::start(&mut pump, Pacing::TargetRate { fps: 4.0 }, 0.0);
        assert!(scheduler.is_running());

        let (_, kind) = pump.pop().unwrap();
        assert_eq!(kind, WakeKind::After(Duration::from_millis(250)));
    }

    #[test]
    fn pacing_change_swaps_the_pending_handle() {
        let (mut scheduler, mut pump, _) = running_fixture();
        let before = match scheduler.playback {
            PlaybackState::Running { pending } => pending,
            PlaybackState::Paused => panic!("expected running playback"),
        };

        scheduler.set_pacing(&mut pump, Pacing::TargetRate { fps: 10.0 });

        assert_eq!(pump.outstanding(), 1);
        assert!(!pump.contains(before));
        let (handle, kind) = pump.pop().unwrap();
        assert_eq!(kind, WakeKind::After(Duration::from_millis(100)));
        match scheduler.playback {
            PlaybackState::Running { pending } => assert_eq!(pending, handle),
            PlaybackState::Paused => panic!("expected running playback"),
        }
    }

    #[test]
    fn target_rate_is_clamped_to_sane_bounds() {
        let (mut scheduler, mut pump, _) = running_fixture();
        scheduler.set_pacing(&mut pump, Pacing::TargetRate { fps: 100_000.0 });
        assert_eq!(
            scheduler.pacing(),
            Pacing::TargetRate {
                fps: MAX_TARGET_FPS
            }
        );
        scheduler.set_pacing(&mut pump, Pacing::TargetRate { fps: 0.0 });
        assert_eq!(
            scheduler.pacing(),
            Pacing::TargetRate {
                fps: MIN_TARGET_FPS
            }
        );
    }

    #[test]
    fn non_finite_target_rate_falls_back_to_every_frame() {
        let (mut scheduler, mut pump, mut body) = running_fixture();

        scheduler.set_pacing(&mut pump, Pacing::TargetRate { fps: f64::NAN });
        assert_eq!(scheduler.pacing(), Pacing::EveryFrame);
        assert_eq!(pump.outstanding(), 1);
        let (_, kind) = pump.pop().unwrap();
        assert_eq!(kind, WakeKind::NextFrame);

        // The loop keeps scheduling right through the bad request.
        let verdict = scheduler.on_wake(&mut pump, 16.0, &mut body);
        assert_eq!(verdict, FrameVerdict::Admitted);
        assert_eq!(pump.outstanding(), 1);

        scheduler.set_pacing(&mut pump, Pacing::TargetRate { fps: f64::INFINITY });
        assert_eq!(scheduler.pacing(), Pacing::EveryFrame);
    }

    #[test]
    fn starting_with_a_non_finite_rate_still_arms_a_wake() {
        let mut pump = ManualPump::new();
        let scheduler =
            FrameScheduler::start(&mut pump, Pacing::TargetRate { fps: f64::NAN }, 0.0);
        assert!(scheduler.is_running());
        assert_eq!(scheduler.pacing(), Pacing::EveryFrame);
        let (_, kind) = pump.pop().unwrap();
        assert_eq!(kind, WakeKind::NextFrame);
    }

    #[test]
    fn delay_for_survives_degenerate_rates() {
        assert_eq!(FrameScheduler::delay_for(f64::NAN), Duration::ZERO);
        assert_eq!(FrameScheduler::delay_for(f64::INFINITY), Duration::ZERO);
        assert_eq!(FrameScheduler::delay_for(f64::NEG_INFINITY), Duration::ZERO);
        // Finite garbage still lands on the clamped range.
        assert_eq!(FrameScheduler::delay_for(0.0), Duration::from_secs(4));
        assert_eq!(FrameScheduler::delay_for(-5.0), Duration::from_secs(4));
    }

    #[test]
    fn stats_window_caps_at_one_hundred() {
        let mut stats = FrameStats::new(0.0);
        let mut now = 0.0;
        for _ in 0..150 {
            now += 10.0;
            stats.record(now);
        }
        assert_eq!(stats.len(), FRAME_STATS_WINDOW);

        let report = stats.report().unwrap();
        assert_eq!(report.latest, 100);
        assert_eq!(report.mean, 100);
        assert_eq!(report.min, 100);
        assert_eq!(report.max, 100);
    }

    #[test]
    fn report_mean_stays_within_min_and_max() {
        let mut stats = FrameStats::new(0.0);
        let mut now = 0.0;
        // Alternate 5ms and 25ms frames: rates of 200 and 40.
        for i in 0..40 {
            now += if i % 2 == 0 { 5.0 } else { 25.0 };
            stats.record(now);
        }
        let report = stats.report().unwrap();
        assert!(report.min <= report.mean && report.mean <= report.max);
        assert_eq!(report.min, 40);
        assert_eq!(report.max, 200);
    }

    #[test]
    fn first_sample_measures_against_start_time() {
        let mut stats = FrameStats::new(1_000.0);
        let rate = stats.record(1_016.0);
        assert!((rate - 62.5).abs() < 1e-9);
        assert_eq!(stats.report().unwrap().latest, 63);
    }

    #[test]
    fn zero_delta_wake_stays_finite() {
        let mut stats = FrameStats::new(50.0);
        let rate = stats.record(50.0);
        assert!(rate.is_finite());
        let report = stats.report().unwrap();
        assert!(report.max >= report.latest);
    }

    #[test]
    fn empty_stats_report_nothing() {
        let stats = FrameStats::new(0.0);
        assert!(stats.is_empty());
        assert!(stats.report().is_none());
    }
}
