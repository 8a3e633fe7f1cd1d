use wasm_bindgen::prelude::*;

pub mod config;
pub mod error;
pub mod exercises;
pub mod pitch;
pub mod rng;
pub mod scoring;
pub mod session;
pub mod transport;

use chrono::{TimeZone, Utc};
use crossbeam_channel::{unbounded, Sender};
use serde::Serialize;

use config::PracticeConfig;
use error::HostError;
use exercises::generators::{PhraseParams, PhraseStrategy, RhythmParams};
use pitch::gate::{GateConfig, SustainGate};
use pitch::LivePitch;
use scoring::types::{PitchSample, ScoringConfig, ScoringTarget};
use session::host::{CallTicket, CountInCue, HostUpdate, PracticeHost, VocalRange};
use session::packager::{SessionIds, TakeRecord};
use session::practice::{PracticeLoop, TakeContent};
use transport::{LeadIn, TimeSignature, Transport};

/// Generate a range-bounded target phrase. Empty when the range is unknown or too narrow.
#[wasm_bindgen]
pub fn generate_phrase(
    low_hz: Option<f64>,
    high_hz: Option<f64>,
    note_dur_sec: f64,
    seed: u32,
    strategy: Option<String>,
    a4_hz: Option<f64>,
    target_sec: Option<f64>,
) -> Result<JsValue, JsValue> {
    let strategy = match strategy.as_deref() {
        Some(name) => PhraseStrategy::parse(name).map_err(|e| JsValue::from_str(&e))?,
        None => PhraseStrategy::default(),
    };
    let defaults = PhraseParams::new(low_hz, high_hz, note_dur_sec, seed);
    let params = PhraseParams {
        a4_hz: a4_hz.unwrap_or(defaults.a4_hz),
        target_sec: target_sec.unwrap_or(defaults.target_sec),
        strategy,
        ..defaults
    };
    let phrase = exercises::generators::generate_phrase(&params);
    serde_wasm_bindgen::to_value(&phrase).map_err(|e| JsValue::from_str(&e.to_string()))
}

/// Generate a rhythm fabric of whole bars.
#[wasm_bindgen]
pub fn generate_rhythm(
    bars: u32,
    time_signature: &str,
    seed: u32,
    rest_probability: Option<f64>,
) -> Result<JsValue, JsValue> {
    let defaults = RhythmParams::default();
    let params = RhythmParams {
        bars,
        ts: TimeSignature::parse(time_signature),
        seed,
        rest_probability: rest_probability.unwrap_or(defaults.rest_probability),
        ..defaults
    };
    let events = exercises::generators::generate_rhythm(&params);
    serde_wasm_bindgen::to_value(&events).map_err(|e| JsValue::from_str(&e.to_string()))
}

#[derive(Serialize)]
struct TransportWindows {
    seconds_per_beat: f64,
    lead_sec: f64,
    record_sec: f64,
    rest_sec: f64,
    count_in_beats: usize,
}

/// Lead-in, record and rest lengths for a transport. Lead-in is in beats when
/// `lead_beats` is given, otherwise in bars.
#[wasm_bindgen]
pub fn transport_windows(
    bpm: f64,
    time_signature: &str,
    lead_bars: Option<f64>,
    lead_beats: Option<f64>,
    rest_bars: f64,
    content_sec: f64,
) -> Result<JsValue, JsValue> {
    let lead_in = match (lead_beats, lead_bars) {
        (Some(beats), _) => LeadIn::Beats(beats),
        (None, Some(bars)) => LeadIn::Bars(bars),
        (None, None) => LeadIn::default(),
    };
    let transport = Transport {
        bpm,
        ts: TimeSignature::parse(time_signature),
        lead_in,
        rest_bars,
    };
    let windows = TransportWindows {
        seconds_per_beat: transport.seconds_per_beat(),
        lead_sec: transport.lead_seconds(),
        record_sec: transport.record_seconds(content_sec),
        rest_sec: transport.rest_seconds(),
        count_in_beats: transport.count_in_beats_ms(0.0).len(),
    };
    serde_wasm_bindgen::to_value(&windows).map_err(|e| JsValue::from_str(&e.to_string()))
}

/// Score a pitch trace against a target. `config_json` may be partial.
#[wasm_bindgen]
pub fn score_take(
    trace_js: JsValue,
    target_js: JsValue,
    config_json: Option<String>,
) -> Result<JsValue, JsValue> {
    let trace: Vec<PitchSample> =
        serde_wasm_bindgen::from_value(trace_js).map_err(|e| JsValue::from_str(&e.to_string()))?;
    let target: ScoringTarget =
        serde_wasm_bindgen::from_value(target_js).map_err(|e| JsValue::from_str(&e.to_string()))?;
    let config: ScoringConfig = match config_json {
        Some(json) => serde_json::from_str(&json).map_err(|e| JsValue::from_str(&e.to_string()))?,
        None => ScoringConfig::default(),
    };

    let score = scoring::analyzer::score_take(&trace, &target, &config);
    serde_wasm_bindgen::to_value(&score).map_err(|e| JsValue::from_str(&e.to_string()))
}

/// Fold take records into a session manifest. Mismatched counts are
/// truncated and reported in `diagnostics`, never rejected.
#[wasm_bindgen]
pub fn build_session_manifest(
    ids_js: JsValue,
    created_at_ms: f64,
    sample_rate_hz: u32,
    takes_js: JsValue,
    take_sample_lengths: &[f64],
) -> Result<JsValue, JsValue> {
    let ids: SessionIds =
        serde_wasm_bindgen::from_value(ids_js).map_err(|e| JsValue::from_str(&e.to_string()))?;
    let takes: Vec<TakeRecord> =
        serde_wasm_bindgen::from_value(takes_js).map_err(|e| JsValue::from_str(&e.to_string()))?;
    let created_at = Utc
        .timestamp_millis_opt(created_at_ms as i64)
        .single()
        .ok_or_else(|| JsValue::from_str("created_at_ms is out of range"))?;
    let lengths: Vec<u64> = take_sample_lengths
        .iter()
        .map(|len| len.max(0.0) as u64)
        .collect();

    let manifest = session::packager::build_session_manifest(
        ids,
        created_at,
        sample_rate_hz,
        takes,
        &lengths,
    );
    serde_wasm_bindgen::to_value(&manifest).map_err(|e| JsValue::from_str(&e.to_string()))
}

/// Get the staged exercise catalog.
#[wasm_bindgen]
pub fn get_exercise_catalog() -> Result<JsValue, JsValue> {
    let catalog = exercises::catalog::get_catalog();
    serde_wasm_bindgen::to_value(&catalog).map_err(|e| JsValue::from_str(&e.to_string()))
}

/// Standalone sustain gate for hold-a-note drills.
#[wasm_bindgen]
pub struct PitchGate {
    gate: SustainGate,
}

#[wasm_bindgen]
impl PitchGate {
    #[wasm_bindgen(constructor)]
    pub fn new(config_json: Option<String>) -> Result<PitchGate, JsValue> {
        let config: GateConfig = match config_json {
            Some(json) => serde_json::from_str(&json).map_err(|e| JsValue::from_str(&e.to_string()))?,
            None => GateConfig::default(),
        };
        Ok(PitchGate {
            gate: SustainGate::new(config),
        })
    }

    /// Feed one reading; returns "waiting", "holding", "passed" or "failed".
    pub fn tick(&mut self, now_ms: f64, target_hz: f64, hz: Option<f64>, confidence: f64) -> String {
        let state = self.gate.tick(now_ms, target_hz, LivePitch::new(hz, confidence));
        serde_json::to_value(state)
            .ok()
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_default()
    }

    pub fn held_sec(&self) -> f64 {
        self.gate.held_sec()
    }

    pub fn reset(&mut self) {
        self.gate.reset();
    }
}

/// Collaborators implemented in JS. Playback and capture are callbacks; the
/// live pitch is pushed in by the page before each tick.
struct JsHost {
    play_call: js_sys::Function,
    start_capture: js_sys::Function,
    stop_capture: js_sys::Function,
    schedule_count_in: Option<js_sys::Function>,
    live: LivePitch,
}

fn js_error(e: JsValue) -> String {
    e.as_string().unwrap_or_else(|| format!("{:?}", e))
}

impl PracticeHost for JsHost {
    fn play_call(&mut self, ticket: CallTicket, take: &TakeContent) -> Result<(), HostError> {
        let ticket_js = serde_wasm_bindgen::to_value(&ticket)
            .map_err(|e| HostError::Callback(e.to_string()))?;
        let take_js =
            serde_wasm_bindgen::to_value(take).map_err(|e| HostError::Callback(e.to_string()))?;
        self.play_call
            .call2(&JsValue::NULL, &ticket_js, &take_js)
            .map(|_| ())
            .map_err(|e| HostError::Playback(js_error(e)))
    }

    fn start_capture(&mut self) -> Result<(), HostError> {
        self.start_capture
            .call0(&JsValue::NULL)
            .map(|_| ())
            .map_err(|e| HostError::Capture(js_error(e)))
    }

    fn stop_capture(&mut self) -> Result<(), HostError> {
        self.stop_capture
            .call0(&JsValue::NULL)
            .map(|_| ())
            .map_err(|e| HostError::Capture(js_error(e)))
    }

    fn live_pitch(&self) -> LivePitch {
        self.live
    }

    /// Range arrives through `set_vocal_range` on the update channel.
    fn vocal_range(&self) -> VocalRange {
        VocalRange::default()
    }

    fn schedule_count_in(&mut self, cue: &CountInCue) {
        let Some(callback) = &self.schedule_count_in else {
            return;
        };
        match serde_wasm_bindgen::to_value(cue) {
            Ok(cue_js) => {
                if let Err(e) = callback.call1(&JsValue::NULL, &cue_js) {
                    log::warn!("schedule_count_in callback failed: {}", js_error(e));
                }
            }
            Err(e) => log::warn!("Could not serialize count-in cue: {}", e),
        }
    }
}

/// The practice loop, driven from JS.
#[wasm_bindgen]
pub struct PracticeEngine {
    inner: PracticeLoop<JsHost>,
    updates: Sender<HostUpdate>,
}

#[wasm_bindgen]
impl PracticeEngine {
    /// The callbacks must return without calling back into this engine.
    /// Report call completion later (from a promise or an `ended` event) via
    /// `call_finished`; a re-entrant call while the engine is borrowed traps.
    #[wasm_bindgen(constructor)]
    pub fn new(
        config_json: &str,
        play_call: js_sys::Function,
        start_capture: js_sys::Function,
        stop_capture: js_sys::Function,
        schedule_count_in: Option<js_sys::Function>,
    ) -> Result<PracticeEngine, JsValue> {
        let config = if config_json.trim().is_empty() {
            PracticeConfig::default()
        } else {
            PracticeConfig::from_json(config_json).map_err(|e| JsValue::from_str(&e.to_string()))?
        };
        let host = JsHost {
            play_call,
            start_capture,
            stop_capture,
            schedule_count_in,
            live: LivePitch::silence(),
        };
        let mut inner =
            PracticeLoop::new(config, host).map_err(|e| JsValue::from_str(&e.to_string()))?;
        let (updates, receiver) = unbounded();
        inner.subscribe_updates(receiver);
        Ok(PracticeEngine { inner, updates })
    }

    pub fn start(&mut self, now_ms: f64) -> Result<(), JsValue> {
        self.inner
            .start(now_ms)
            .map_err(|e| JsValue::from_str(&e.to_string()))
    }

    pub fn restart(&mut self, now_ms: f64) -> Result<(), JsValue> {
        self.inner
            .restart(now_ms)
            .map_err(|e| JsValue::from_str(&e.to_string()))
    }

    pub fn reset(&mut self) {
        self.inner.reset();
    }

    pub fn tick(&mut self, now_ms: f64) {
        self.inner.tick(now_ms);
    }

    pub fn set_live_pitch(&mut self, hz: Option<f64>, confidence: f64) {
        self.inner.host_mut().live = LivePitch::new(hz, confidence);
    }

    pub fn set_vocal_range(&self, low_hz: Option<f64>, high_hz: Option<f64>) {
        let range = VocalRange { low_hz, high_hz };
        if self.updates.send(HostUpdate::RangeChanged { range }).is_err() {
            log::warn!("Practice loop is no longer listening for range updates");
        }
    }

    pub fn set_latency(&self, latency_ms: Option<f64>) {
        if self.updates.send(HostUpdate::LatencyChanged { latency_ms }).is_err() {
            log::warn!("Practice loop is no longer listening for latency updates");
        }
    }

    /// Report the end of call playback. `error` set means playback failed.
    pub fn call_finished(
        &mut self,
        ticket_js: JsValue,
        error: Option<String>,
        now_ms: f64,
    ) -> Result<(), JsValue> {
        let ticket: CallTicket = serde_wasm_bindgen::from_value(ticket_js)
            .map_err(|e| JsValue::from_str(&e.to_string()))?;
        let result = match error {
            Some(message) => Err(HostError::Playback(message)),
            None => Ok(()),
        };
        self.inner.call_finished(ticket, result, now_ms);
        Ok(())
    }

    pub fn confirm_range_low(&mut self) -> bool {
        self.inner.confirm_range_low()
    }

    pub fn confirm_range_high(&mut self) -> bool {
        self.inner.confirm_range_high()
    }

    pub fn snapshot(&self) -> Result<JsValue, JsValue> {
        serde_wasm_bindgen::to_value(&self.inner.snapshot())
            .map_err(|e| JsValue::from_str(&e.to_string()))
    }

    /// Take records for the session so far. `sample_counts` are the captured
    /// take lengths in order; takes without one get an estimate from their
    /// record window. Take ids are drawn from `id_seed`.
    pub fn take_records(
        &self,
        sample_rate_hz: u32,
        id_seed: u32,
        sample_counts: &[f64],
    ) -> Result<JsValue, JsValue> {
        let counts: Vec<u64> = sample_counts.iter().map(|n| n.max(0.0) as u64).collect();
        let records = session::packager::package_takes(
            self.inner.history(),
            sample_rate_hz,
            &counts,
            self.inner.config().a4_hz,
            id_seed,
        );
        serde_wasm_bindgen::to_value(&records).map_err(|e| JsValue::from_str(&e.to_string()))
    }
}
