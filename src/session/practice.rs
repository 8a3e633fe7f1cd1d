//! The practice loop: call, lead-in, record, evaluate, rest, repeat.
//!
//! The loop is driven entirely by its owner. `tick(now_ms)` fires due timers
//! and polls the pitch sampler; `call_finished` reports the end of call
//! playback. All timers live in one `TimerArena`, so `reset()` cancels them
//! as a set and nothing scheduled before a reset can fire after it.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashSet;
use std::hash::{Hash, Hasher};

use crossbeam_channel::Receiver;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::config::{ExerciseContent, LyricMode, PracticeConfig, RecordEndPolicy};
use crate::error::{HostError, PracticeError, PracticeResult};
use crate::exercises::generators::{generate_phrase, generate_rhythm, PhraseParams, RhythmParams};
use crate::exercises::lyrics::{assign_lyrics, LyricBook};
use crate::pitch::gate::ConfidentHold;
use crate::pitch::sampler::PitchSampler;
use crate::rng::advance_seed;
use crate::scoring::analyzer::score_take;
use crate::scoring::types::{
    rhythm_duration_sec, rhythm_onsets, Phrase, PitchSample, RhythmEvent, ScoringTarget, TakeScore,
};
use crate::session::host::{CallTicket, CountInCue, HostUpdate, PracticeHost, VocalRange};
use crate::session::scheduler::{TimerArena, TimerKey};

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Idle,
    Call,
    LeadIn,
    Record,
    Evaluate,
    Rest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoopEvent {
    LeadInDone,
    RecordDone,
    RestDone,
}

/// Everything generated for one take. Owned by the loop until the take is scored.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct TakeContent {
    pub take_index: u32,
    pub seed: u32,
    pub lyric_seed: u32,
    pub phrase: Phrase,
    pub rhythm: Vec<RhythmEvent>,
    pub lyrics: Vec<String>,
    pub range: VocalRange,
    pub scale: Option<String>,
    pub bpm: f64,
}

impl TakeContent {
    /// Length of the material the singer has to reproduce.
    pub fn duration_sec(&self, transport: &crate::transport::Transport) -> f64 {
        if self.rhythm.is_empty() {
            self.phrase.duration_sec
        } else {
            rhythm_duration_sec(&self.rhythm, transport.bpm, transport.ts.den)
        }
    }

    fn fingerprint(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.seed.hash(&mut hasher);
        for note in &self.phrase.notes {
            note.midi.hash(&mut hasher);
            note.start_sec.to_bits().hash(&mut hasher);
            note.dur_sec.to_bits().hash(&mut hasher);
        }
        self.rhythm.hash(&mut hasher);
        hasher.finish()
    }
}

/// One scored take, kept in the session history.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct CompletedTake {
    pub content: TakeContent,
    pub trace: Vec<PitchSample>,
    pub score: TakeScore,
    pub passed: bool,
    pub call_started_ms: Option<f64>,
    pub record_started_ms: f64,
    pub record_ended_ms: f64,
    pub lead_in_sec: f64,
    pub latency_ms: Option<f64>,
}

/// Lowest and highest confident pitch sung so far. A confirmed bound is
/// frozen until `clear`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
pub struct RangeCapture {
    pub low_hz: Option<f64>,
    pub high_hz: Option<f64>,
    pub low_confirmed: bool,
    pub high_confirmed: bool,
}

impl RangeCapture {
    pub fn observe(&mut self, trace: &[PitchSample], conf_min: f64) {
        for hz in trace.iter().filter_map(|s| s.confident_hz(conf_min)) {
            if !self.low_confirmed && self.low_hz.map_or(true, |low| hz < low) {
                self.low_hz = Some(hz);
            }
            if !self.high_confirmed && self.high_hz.map_or(true, |high| hz > high) {
                self.high_hz = Some(hz);
            }
        }
    }

    /// Latches the low bound. False if nothing has been captured yet.
    pub fn confirm_low(&mut self) -> bool {
        self.low_confirmed = self.low_hz.is_some();
        self.low_confirmed
    }

    pub fn confirm_high(&mut self) -> bool {
        self.high_confirmed = self.high_hz.is_some();
        self.high_confirmed
    }

    pub fn is_complete(&self) -> bool {
        self.low_confirmed && self.high_confirmed
    }

    /// Only the latched bounds; unconfirmed ones stay `None`.
    pub fn confirmed_range(&self) -> VocalRange {
        VocalRange {
            low_hz: self.low_hz.filter(|_| self.low_confirmed),
            high_hz: self.high_hz.filter(|_| self.high_confirmed),
        }
    }

    pub fn clear(&mut self) {
        *self = RangeCapture::default();
    }
}

/// Read-only view for rendering.
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct LoopSnapshot {
    pub phase: Phase,
    pub status_text: String,
    pub is_recording: bool,
    pub started_at_ms: Option<f64>,
    pub score: Option<TakeScore>,
    pub session_scores: Vec<TakeScore>,
    pub passed: Option<bool>,
    pub take_index: u32,
    pub session_complete: bool,
    pub mount_generation: u64,
    pub range_capture: RangeCapture,
}

type CueKey = (u64, u64, u64);

/// C3 to C5. Range-capture takes use it for any bound not known yet.
pub const CAPTURE_FALLBACK_LOW_HZ: f64 = 130.81;
pub const CAPTURE_FALLBACK_HIGH_HZ: f64 = 523.25;

pub struct PracticeLoop<H: PracticeHost> {
    config: PracticeConfig,
    host: H,
    timers: TimerArena<LoopEvent>,
    record_timer: Option<TimerKey>,
    sampler: PitchSampler,
    early_stop: Option<ConfidentHold>,
    phase: Phase,
    status: String,
    epoch: u64,
    mount_generation: u64,
    seed: u32,
    lyric_seed: u32,
    lyric_book: LyricBook,
    current: Option<TakeContent>,
    call_started_ms: Option<f64>,
    lead_in_sec: f64,
    started_at_ms: Option<f64>,
    is_recording: bool,
    score: Option<TakeScore>,
    passed: Option<bool>,
    history: Vec<CompletedTake>,
    session_started_ms: Option<f64>,
    session_complete: bool,
    range_capture: RangeCapture,
    range_override: Option<VocalRange>,
    latency_override: Option<Option<f64>>,
    updates: Option<Receiver<HostUpdate>>,
    cues_sent: HashSet<CueKey>,
}

impl<H: PracticeHost> PracticeLoop<H> {
    pub fn new(config: PracticeConfig, host: H) -> PracticeResult<Self> {
        config.validate()?;
        Ok(Self {
            sampler: PitchSampler::new(&config.sampler),
            seed: config.initial_seed,
            lyric_seed: config.initial_lyric_seed,
            config,
            host,
            timers: TimerArena::new(),
            record_timer: None,
            early_stop: None,
            phase: Phase::Idle,
            status: "Ready".to_string(),
            epoch: 0,
            mount_generation: 0,
            lyric_book: LyricBook::new(),
            current: None,
            call_started_ms: None,
            lead_in_sec: 0.0,
            started_at_ms: None,
            is_recording: false,
            score: None,
            passed: None,
            history: Vec::new(),
            session_started_ms: None,
            session_complete: false,
            range_capture: RangeCapture::default(),
            range_override: None,
            latency_override: None,
            updates: None,
            cues_sent: HashSet::new(),
        })
    }

    pub fn config(&self) -> &PracticeConfig {
        &self.config
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn is_recording(&self) -> bool {
        self.is_recording
    }

    pub fn pending_timers(&self) -> usize {
        self.timers.pending()
    }

    pub fn history(&self) -> &[CompletedTake] {
        &self.history
    }

    pub fn current_take(&self) -> Option<&TakeContent> {
        self.current.as_ref()
    }

    pub fn range_capture(&self) -> &RangeCapture {
        &self.range_capture
    }

    pub fn confirm_range_low(&mut self) -> bool {
        self.range_capture.confirm_low()
    }

    pub fn confirm_range_high(&mut self) -> bool {
        self.range_capture.confirm_high()
    }

    pub fn mount_generation(&self) -> u64 {
        self.mount_generation
    }

    pub fn session_complete(&self) -> bool {
        self.session_complete
    }

    /// Range and latency pushes are read from `updates` on every tick.
    pub fn subscribe_updates(&mut self, updates: Receiver<HostUpdate>) {
        self.updates = Some(updates);
    }

    pub fn snapshot(&self) -> LoopSnapshot {
        LoopSnapshot {
            phase: self.phase,
            status_text: self.status.clone(),
            is_recording: self.is_recording,
            started_at_ms: self.started_at_ms,
            score: self.score.clone(),
            session_scores: self.history.iter().map(|t| t.score.clone()).collect(),
            passed: self.passed,
            take_index: self.history.len() as u32,
            session_complete: self.session_complete,
            mount_generation: self.mount_generation,
            range_capture: self.range_capture.clone(),
        }
    }

    /// Starts the next take of the current session, or a new session if none
    /// is in progress.
    pub fn start(&mut self, now_ms: f64) -> PracticeResult<()> {
        if self.phase != Phase::Idle {
            return Err(PracticeError::AlreadyRunning(self.phase));
        }
        if self.session_complete || self.session_started_ms.is_none() {
            self.history.clear();
            self.lyric_book.clear();
            self.cues_sent.clear();
            self.session_complete = false;
            self.session_started_ms = Some(now_ms);
            info!("Practice session started (seed {}, lyric seed {})", self.seed, self.lyric_seed);
        }
        self.begin_take(now_ms)
    }

    /// Cancels every pending timer, ends the session and returns to idle.
    /// Safe to call from any phase, any number of times. Seeds keep advancing
    /// and range capture is kept; `restart` clears those.
    pub fn reset(&mut self) {
        let cancelled = self.timers.cancel_all();
        self.record_timer = None;
        self.epoch += 1;
        if self.is_recording {
            if let Err(e) = self.host.stop_capture() {
                warn!("stop_capture failed during reset: {}", e);
            }
        }
        self.sampler.reset();
        self.early_stop = None;
        self.is_recording = false;
        self.started_at_ms = None;
        self.call_started_ms = None;
        self.score = None;
        self.passed = None;
        self.current = None;
        self.history.clear();
        self.session_started_ms = None;
        self.session_complete = false;
        self.phase = Phase::Idle;
        self.status = "Ready".to_string();
        if cancelled > 0 {
            info!("Practice loop reset ({} timers cancelled)", cancelled);
        }
    }

    /// Full restart: a new session from the initial seeds with cleared range
    /// capture and a new mount generation.
    pub fn restart(&mut self, now_ms: f64) -> PracticeResult<()> {
        self.reset();
        self.range_capture.clear();
        self.seed = self.config.initial_seed;
        self.lyric_seed = self.config.initial_lyric_seed;
        self.mount_generation += 1;
        self.start(now_ms)
    }

    /// Completion of a `play_call` request. Stale tickets are ignored.
    pub fn call_finished(&mut self, ticket: CallTicket, result: Result<(), HostError>, now_ms: f64) {
        if ticket.epoch != self.epoch || self.phase != Phase::Call {
            warn!("Ignoring stale call completion for take {}", ticket.take_index);
            return;
        }
        match result {
            Ok(()) => self.enter_lead_in(now_ms),
            Err(e) => {
                warn!("Call playback failed: {}", e);
                self.fail_to_idle(format!("Call playback failed: {}", e));
            }
        }
    }

    /// Advances the loop to `now_ms`: applies pushed updates, fires due
    /// timers, and samples pitch while recording.
    pub fn tick(&mut self, now_ms: f64) {
        self.drain_updates();

        while let Some((_, event)) = self.timers.pop_due(now_ms) {
            debug!("Timer fired: {:?} in {:?}", event, self.phase);
            self.handle(event, now_ms);
        }

        if self.phase == Phase::Record {
            let live = self.host.live_pitch();
            self.sampler.poll(now_ms, live);
            let stop_early = self
                .early_stop
                .as_mut()
                .map_or(false, |hold| hold.observe(now_ms, live));
            if stop_early {
                if let Some(key) = self.record_timer.take() {
                    self.timers.cancel(key);
                }
                debug!("Confident hold reached, ending take early");
                self.finish_recording(now_ms);
            }
        }
    }

    fn handle(&mut self, event: LoopEvent, now_ms: f64) {
        match (event, self.phase) {
            (LoopEvent::LeadInDone, Phase::LeadIn) => self.start_recording(now_ms),
            (LoopEvent::RecordDone, Phase::Record) => {
                self.record_timer = None;
                self.finish_recording(now_ms);
            }
            (LoopEvent::RestDone, Phase::Rest) => {
                if let Err(e) = self.begin_take(now_ms) {
                    warn!("Could not begin next take: {}", e);
                }
            }
            (event, phase) => debug!("Dropping {:?} in {:?}", event, phase),
        }
    }

    fn drain_updates(&mut self) {
        let Some(updates) = &self.updates else {
            return;
        };
        for update in updates.try_iter() {
            match update {
                HostUpdate::RangeChanged { range } => {
                    debug!("Vocal range updated: {:?}", range);
                    self.range_override = Some(range);
                }
                HostUpdate::LatencyChanged { latency_ms } => {
                    debug!("Calibrated latency updated: {:?}", latency_ms);
                    self.latency_override = Some(latency_ms);
                }
            }
        }
    }

    /// Pushed or host range, with confirmed capture bounds taking priority.
    /// While capturing, a missing bound falls back to C3-C5.
    fn vocal_range(&self) -> VocalRange {
        let mut range = self.range_override.unwrap_or_else(|| self.host.vocal_range());
        let confirmed = self.range_capture.confirmed_range();
        range.low_hz = confirmed.low_hz.or(range.low_hz);
        range.high_hz = confirmed.high_hz.or(range.high_hz);
        if self.config.capture_range {
            range.low_hz = range.low_hz.or(Some(CAPTURE_FALLBACK_LOW_HZ));
            range.high_hz = range.high_hz.or(Some(CAPTURE_FALLBACK_HIGH_HZ));
        }
        range
    }

    fn latency_ms(&self) -> Option<f64> {
        self.latency_override
            .unwrap_or_else(|| self.host.calibrated_latency_ms())
            .filter(|ms| ms.is_finite() && *ms >= 0.0)
    }

    fn caps_reached(&self, now_ms: f64) -> bool {
        let elapsed_sec = self
            .session_started_ms
            .map_or(0.0, |started| (now_ms - started) / 1000.0);
        self.history.len() as u32 >= self.config.max_takes || elapsed_sec >= self.config.max_session_sec
    }

    fn build_content(&mut self) -> PracticeResult<TakeContent> {
        let range = self.vocal_range();
        let transport = &self.config.transport;
        let (phrase, rhythm, scale) = match &self.config.content {
            ExerciseContent::Melody { strategy } => {
                let params = PhraseParams {
                    a4_hz: self.config.a4_hz,
                    target_sec: self.config.phrase_target_sec,
                    strategy: *strategy,
                    ..PhraseParams::new(range.low_hz, range.high_hz, self.config.note_dur_sec, self.seed)
                };
                let phrase = generate_phrase(&params);
                if phrase.is_empty() {
                    return Err(PracticeError::NoExerciseContent(
                        "set a vocal range with some width".to_string(),
                    ));
                }
                (phrase, Vec::new(), strategy.scale_name().map(str::to_string))
            }
            ExerciseContent::Rhythm {
                bars,
                rest_probability,
                palette,
            } => {
                let rhythm = generate_rhythm(&RhythmParams {
                    bars: *bars,
                    ts: transport.ts,
                    seed: self.seed,
                    rest_probability: *rest_probability,
                    palette: palette.clone(),
                });
                if rhythm.iter().all(|e| e.is_rest()) {
                    return Err(PracticeError::NoExerciseContent(
                        "rhythm has no notes".to_string(),
                    ));
                }
                (Phrase::empty(), rhythm, None)
            }
        };

        let word_count = if rhythm.is_empty() {
            phrase.notes.len()
        } else {
            rhythm.iter().filter(|e| !e.is_rest()).count()
        };
        let lyrics = match self.config.lyrics {
            LyricMode::Off => Vec::new(),
            LyricMode::Free => assign_lyrics(word_count, self.lyric_seed),
            LyricMode::NoRepeat => self.lyric_book.assign_unique(word_count, self.lyric_seed),
        };

        Ok(TakeContent {
            take_index: self.history.len() as u32,
            seed: self.seed,
            lyric_seed: self.lyric_seed,
            phrase,
            rhythm,
            lyrics,
            range,
            scale,
            bpm: transport.bpm,
        })
    }

    /// Top of a take: caps, content, then the call.
    fn begin_take(&mut self, now_ms: f64) -> PracticeResult<()> {
        self.drain_updates();

        if self.caps_reached(now_ms) {
            self.finish_session();
            return Ok(());
        }

        let content = match self.build_content() {
            Ok(content) => content,
            Err(e) => {
                warn!("{}", e);
                self.fail_to_idle(e.to_string());
                return Err(e);
            }
        };

        self.score = None;
        self.passed = None;
        self.started_at_ms = None;
        self.phase = Phase::Call;
        self.status = "Listen...".to_string();
        self.call_started_ms = Some(now_ms);
        let ticket = CallTicket {
            epoch: self.epoch,
            take_index: content.take_index,
        };
        info!(
            "Take {} begins (seed {}, {} notes, {} rhythm events)",
            content.take_index,
            content.seed,
            content.phrase.notes.len(),
            content.rhythm.len()
        );
        let played = self.host.play_call(ticket, &content);
        self.current = Some(content);

        if let Err(e) = played {
            warn!("play_call failed: {}", e);
            self.fail_to_idle(format!("Call playback failed: {}", e));
            return Err(e.into());
        }
        Ok(())
    }

    fn enter_lead_in(&mut self, now_ms: f64) {
        self.phase = Phase::LeadIn;
        self.status = "Get ready...".to_string();
        self.lead_in_sec = self.config.transport.lead_seconds();
        if self.config.count_in {
            self.emit_count_in(now_ms);
        }
        self.timers
            .schedule(now_ms + self.lead_in_sec * 1000.0, LoopEvent::LeadInDone);
    }

    /// Schedules the count-in for `anchor_ms` unless this anchor, content and
    /// tempo already had one.
    fn emit_count_in(&mut self, anchor_ms: f64) {
        let Some(content) = &self.current else {
            return;
        };
        let transport = &self.config.transport;
        let key = (anchor_ms.to_bits(), content.fingerprint(), transport.bpm.to_bits());
        if !self.cues_sent.insert(key) {
            debug!("Count-in for anchor {} already scheduled", anchor_ms);
            return;
        }

        let shift = if self.config.beat_sync {
            self.latency_ms()
        } else {
            None
        };
        let beat_times_ms = transport
            .count_in_beats_ms(anchor_ms)
            .into_iter()
            .map(|t| t - shift.unwrap_or(0.0))
            .collect();
        let cue = CountInCue {
            anchor_ms,
            beat_times_ms,
            bpm: transport.bpm,
            beats_per_bar: transport.ts.num,
            latency_shift_ms: shift,
        };
        debug!("Scheduling count-in: {} beats", cue.beat_times_ms.len());
        self.host.schedule_count_in(&cue);
    }

    fn start_recording(&mut self, now_ms: f64) {
        self.started_at_ms = Some(now_ms);
        self.sampler.arm(Some(now_ms));

        if let Err(e) = self.host.start_capture() {
            warn!("start_capture failed: {}", e);
            self.sampler.reset();
            self.fail_to_idle(format!("Capture failed: {}", e));
            return;
        }
        self.is_recording = true;
        self.phase = Phase::Record;
        self.status = "Sing!".to_string();

        let window_sec = match self.config.record_end {
            RecordEndPolicy::MusicalWindow => {
                self.early_stop = None;
                let content_sec = self
                    .current
                    .as_ref()
                    .map_or(0.0, |c| c.duration_sec(&self.config.transport));
                self.config.transport.record_seconds(content_sec)
            }
            RecordEndPolicy::TimingFree {
                min_hold_sec,
                max_window_sec,
            } => {
                self.early_stop = Some(ConfidentHold::new(self.config.scoring.conf_min, min_hold_sec));
                max_window_sec
            }
        };
        info!("Recording armed at {} ms ({:.2}s window)", now_ms, window_sec);
        self.record_timer = Some(
            self.timers
                .schedule(now_ms + window_sec * 1000.0, LoopEvent::RecordDone),
        );
    }

    fn finish_recording(&mut self, now_ms: f64) {
        if let Err(e) = self.host.stop_capture() {
            warn!("stop_capture failed: {}", e);
        }
        self.sampler.stop();
        self.is_recording = false;
        self.early_stop = None;
        let trace = self.sampler.snapshot();
        info!("Recording closed with {} samples", trace.len());

        self.phase = Phase::Evaluate;
        self.status = "Scoring...".to_string();
        self.evaluate(trace, now_ms);
    }

    fn evaluate(&mut self, trace: Vec<PitchSample>, now_ms: f64) {
        let Some(content) = self.current.take() else {
            warn!("Evaluate reached without take content");
            self.fail_to_idle("Ready".to_string());
            return;
        };
        let transport = &self.config.transport;
        let target = ScoringTarget {
            phrase: content.phrase.clone(),
            rhythm_onsets: rhythm_onsets(&content.rhythm, transport.bpm, transport.ts.den),
            seconds_per_beat: transport.seconds_per_beat(),
            a4_hz: self.config.a4_hz,
        };
        let score = score_take(&trace, &target, &self.config.scoring);
        let passed = score.passed(self.config.scoring.pass_percent);
        info!(
            "Take {} scored {:.1}% ({})",
            content.take_index,
            score.percent(),
            if passed { "passed" } else { "not passed" }
        );

        if self.config.capture_range {
            self.range_capture.observe(&trace, self.config.scoring.conf_min);
        }

        self.status = if passed {
            format!("Scored {:.0}%, passed", score.percent())
        } else {
            format!("Scored {:.0}%, try again", score.percent())
        };
        self.score = Some(score.clone());
        self.passed = Some(passed);
        let latency_ms = self.latency_ms();
        self.history.push(CompletedTake {
            content,
            trace,
            score,
            passed,
            call_started_ms: self.call_started_ms,
            record_started_ms: self.started_at_ms.unwrap_or(now_ms),
            record_ended_ms: now_ms,
            lead_in_sec: self.lead_in_sec,
            latency_ms,
        });

        self.seed = advance_seed(self.seed);
        self.lyric_seed = advance_seed(self.lyric_seed);

        self.phase = Phase::Rest;
        let rest_sec = self.config.transport.rest_seconds();
        self.timers.schedule(now_ms + rest_sec * 1000.0, LoopEvent::RestDone);
    }

    fn finish_session(&mut self) {
        self.timers.cancel_all();
        self.record_timer = None;
        self.current = None;
        self.phase = Phase::Idle;
        self.session_complete = true;
        self.status = "Session complete".to_string();
        info!("Practice session complete after {} takes", self.history.len());
    }

    /// Recovered failure: back to idle with a status, session kept.
    fn fail_to_idle(&mut self, status: String) {
        self.timers.cancel_all();
        self.record_timer = None;
        self.epoch += 1;
        self.is_recording = false;
        self.early_stop = None;
        self.current = None;
        self.phase = Phase::Idle;
        self.status = status;
    }
}
