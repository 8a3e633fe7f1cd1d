//! Sustain gate: did the singer hold a target pitch long enough?
//!
//! Each attempt moves `Waiting -> Holding -> {Passed | Failed}`. In-tolerance
//! time only accumulates over an unbroken run of good samples; any miss sets
//! it back to zero. The retry deadline is checked on every tick against the
//! attempt's own start time, so delayed ticks cannot skip it.

use serde::{Deserialize, Serialize};

use crate::pitch::units::cents_between;
use crate::pitch::LivePitch;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GateState {
    Waiting,
    Holding,
    Passed,
    Failed,
}

impl GateState {
    pub fn is_latched(&self) -> bool {
        matches!(self, GateState::Passed | GateState::Failed)
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct GateConfig {
    pub conf_min: f64,
    pub cents_tol: f64,
    pub hold_sec: f64,
    pub retry_after_sec: f64,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            conf_min: 0.6,
            cents_tol: 50.0,
            hold_sec: 0.375,
            retry_after_sec: 6.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SustainGate {
    config: GateConfig,
    state: GateState,
    started_ms: Option<f64>,
    hold_since_ms: Option<f64>,
    held_sec: f64,
}

impl SustainGate {
    pub fn new(config: GateConfig) -> Self {
        Self {
            config,
            state: GateState::Waiting,
            started_ms: None,
            hold_since_ms: None,
            held_sec: 0.0,
        }
    }

    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    pub fn state(&self) -> GateState {
        self.state
    }

    pub fn passed(&self) -> bool {
        self.state == GateState::Passed
    }

    pub fn failed(&self) -> bool {
        self.state == GateState::Failed
    }

    /// Seconds of unbroken in-tolerance singing in the current run.
    pub fn held_sec(&self) -> f64 {
        self.held_sec
    }

    /// Start a new attempt.
    pub fn reset(&mut self) {
        self.state = GateState::Waiting;
        self.started_ms = None;
        self.hold_since_ms = None;
        self.held_sec = 0.0;
    }

    /// Feed one reading. The first tick of an attempt marks its start.
    pub fn tick(&mut self, now_ms: f64, target_hz: f64, live: LivePitch) -> GateState {
        if self.state.is_latched() {
            return self.state;
        }
        let started = *self.started_ms.get_or_insert(now_ms);

        let in_tolerance = live
            .confident_hz(self.config.conf_min)
            .and_then(|hz| cents_between(hz, target_hz))
            .map(|cents| cents.abs() <= self.config.cents_tol)
            .unwrap_or(false);

        if in_tolerance {
            let since = *self.hold_since_ms.get_or_insert(now_ms);
            self.held_sec = (now_ms - since) / 1000.0;
            self.state = GateState::Holding;
            if self.held_sec >= self.config.hold_sec {
                self.state = GateState::Passed;
                return self.state;
            }
        } else {
            self.hold_since_ms = None;
            self.held_sec = 0.0;
            self.state = GateState::Waiting;
        }

        if (now_ms - started) / 1000.0 >= self.config.retry_after_sec {
            self.state = GateState::Failed;
        }
        self.state
    }
}

/// "Any confident pitch held for `min_hold_sec`", used to end timing-free takes.
#[derive(Debug, Clone)]
pub struct ConfidentHold {
    conf_min: f64,
    min_hold_sec: f64,
    since_ms: Option<f64>,
}

impl ConfidentHold {
    pub fn new(conf_min: f64, min_hold_sec: f64) -> Self {
        Self {
            conf_min,
            min_hold_sec,
            since_ms: None,
        }
    }

    pub fn reset(&mut self) {
        self.since_ms = None;
    }

    /// Returns true once a confident run has lasted `min_hold_sec`.
    pub fn observe(&mut self, now_ms: f64, live: LivePitch) -> bool {
        if live.confident_hz(self.conf_min).is_none() {
            self.since_ms = None;
            return false;
        }
        let since = *self.since_ms.get_or_insert(now_ms);
        (now_ms - since) / 1000.0 >= self.min_hold_sec
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gate(cents_tol: f64) -> SustainGate {
        SustainGate::new(GateConfig {
            conf_min: 0.6,
            cents_tol,
            hold_sec: 0.375,
            retry_after_sec: 6.0,
        })
    }

    fn frame_ms(i: u32) -> f64 {
        i as f64 * 1000.0 / 60.0
    }

    #[test]
    fn passes_within_point_four_seconds_at_60hz() {
        let mut g = gate(35.0);
        let live = LivePitch::new(Some(440.0), 0.9);
        let mut passed_at = None;
        for i in 0..=24 {
            let now = frame_ms(i);
            if g.tick(now, 440.0, live) == GateState::Passed && passed_at.is_none() {
                passed_at = Some(now);
            }
        }
        let at = passed_at.expect("gate should pass");
        assert!(at < 400.0, "passed at {at} ms");
        // Latched: silence afterwards changes nothing.
        assert_eq!(g.tick(5000.0, 440.0, LivePitch::silence()), GateState::Passed);
        assert!(g.passed() && !g.failed());
    }

    #[test]
    fn gap_resets_hold() {
        let mut g = gate(35.0);
        let good = LivePitch::new(Some(440.0), 0.9);
        for i in 0..20 {
            g.tick(frame_ms(i), 440.0, good);
        }
        assert_eq!(g.state(), GateState::Holding);
        g.tick(frame_ms(20), 440.0, LivePitch::new(Some(440.0), 0.2));
        assert_eq!(g.state(), GateState::Waiting);
        assert_eq!(g.held_sec(), 0.0);
        // 20 more frames is only ~0.32 s of fresh hold.
        for i in 21..41 {
            g.tick(frame_ms(i), 440.0, good);
        }
        assert_eq!(g.state(), GateState::Holding);
    }

    #[test]
    fn out_of_tolerance_never_holds() {
        let mut g = gate(35.0);
        // ~40 cents sharp
        let live = LivePitch::new(Some(450.3), 0.95);
        for i in 0..60 {
            assert_eq!(g.tick(frame_ms(i), 440.0, live), GateState::Waiting);
        }
    }

    #[test]
    fn fails_after_retry_deadline_and_latches() {
        let mut g = gate(35.0);
        let mut state = GateState::Waiting;
        for i in 0..=370 {
            state = g.tick(frame_ms(i), 440.0, LivePitch::silence());
            if state == GateState::Failed {
                break;
            }
        }
        assert_eq!(state, GateState::Failed);
        // A perfect sample after the latch does not flip to passed.
        assert_eq!(
            g.tick(7000.0, 440.0, LivePitch::new(Some(440.0), 1.0)),
            GateState::Failed
        );
        assert!(!g.passed());
    }

    #[test]
    fn delayed_tick_still_times_out() {
        let mut g = gate(35.0);
        g.tick(0.0, 440.0, LivePitch::silence());
        assert_eq!(g.tick(10_000.0, 440.0, LivePitch::silence()), GateState::Failed);
    }

    #[test]
    fn reset_starts_new_attempt() {
        let mut g = gate(35.0);
        g.tick(0.0, 440.0, LivePitch::silence());
        g.tick(7000.0, 440.0, LivePitch::silence());
        assert!(g.failed());
        g.reset();
        assert_eq!(g.state(), GateState::Waiting);
        assert_eq!(g.tick(8000.0, 440.0, LivePitch::silence()), GateState::Waiting);
    }

    #[test]
    fn states_are_exclusive() {
        let mut g = gate(60.0);
        let live = LivePitch::new(Some(441.0), 0.9);
        for i in 0..100 {
            g.tick(frame_ms(i), 440.0, live);
            assert!(!(g.passed() && g.failed()));
        }
    }

    #[test]
    fn confident_hold_requires_continuous_run() {
        let mut h = ConfidentHold::new(0.6, 0.5);
        let sung = LivePitch::new(Some(200.0), 0.8);
        assert!(!h.observe(0.0, sung));
        assert!(!h.observe(300.0, sung));
        assert!(!h.observe(400.0, LivePitch::silence()));
        assert!(!h.observe(500.0, sung));
        assert!(h.observe(1000.0, sung));
    }
}
