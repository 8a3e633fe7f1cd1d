//! Take and session artifacts.
//!
//! A `TakeRecord` is one scored take with everything needed to re-derive its
//! target (seeds, range, tempo). A `SessionManifest` lays the takes out on
//! one concatenated audio timeline. Both carry a `version`; fields added
//! after version 1 are `#[serde(default)]` so older documents still load.

use std::io::Cursor;

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::PracticeResult;
use crate::rng::SeededRng;
use crate::scoring::types::TakeScore;
use crate::session::practice::CompletedTake;

pub const TAKE_RECORD_VERSION: u32 = 2;
pub const SESSION_MANIFEST_VERSION: u32 = 2;

/// Session audio is stored as mono 16-bit PCM.
pub const PCM_BITS_PER_SAMPLE: u16 = 16;
const PCM_BYTES_PER_SAMPLE: u64 = (PCM_BITS_PER_SAMPLE / 8) as u64;

fn default_bits_per_sample() -> u16 {
    PCM_BITS_PER_SAMPLE
}

/// Random-looking but reproducible id drawn from a seeded stream.
pub fn seeded_uuid(rng: &mut SeededRng) -> Uuid {
    uuid::Builder::from_random_bytes(rng.next_128_bits()).into_uuid()
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct GenerationMeta {
    pub seed: u32,
    pub lyric_seed: u32,
    pub scale: Option<String>,
    pub a4_hz: f64,
    pub low_hz: Option<f64>,
    pub high_hz: Option<f64>,
    pub lead_in_sec: f64,
    #[serde(default)]
    pub bpm: Option<f64>,
    #[serde(default)]
    pub lyrics: Vec<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct AudioMeta {
    pub sample_rate_hz: u32,
    pub sample_count: u64,
    pub device_latency_ms: Option<f64>,
    pub resample_method: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct TimingAnchors {
    pub play_start_ms: Option<f64>,
    pub record_start_ms: f64,
    #[serde(default)]
    pub record_end_ms: Option<f64>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct TakeRecord {
    pub version: u32,
    pub take_id: Uuid,
    pub generation: GenerationMeta,
    pub audio: AudioMeta,
    pub timing: TimingAnchors,
    pub score: TakeScore,
    #[serde(default)]
    pub passed: Option<bool>,
    /// Where the encoded take audio lives; storage is the host's business.
    #[serde(default)]
    pub audio_ref: Option<String>,
}

/// Folds a completed take into a versioned record. The audio itself is
/// referenced, never encoded here.
pub fn package_take(
    take_id: Uuid,
    take: &CompletedTake,
    audio: AudioMeta,
    a4_hz: f64,
    audio_ref: Option<String>,
) -> TakeRecord {
    let content = &take.content;
    TakeRecord {
        version: TAKE_RECORD_VERSION,
        take_id,
        generation: GenerationMeta {
            seed: content.seed,
            lyric_seed: content.lyric_seed,
            scale: content.scale.clone(),
            a4_hz,
            low_hz: content.range.low_hz,
            high_hz: content.range.high_hz,
            lead_in_sec: take.lead_in_sec,
            bpm: Some(content.bpm),
            lyrics: content.lyrics.clone(),
        },
        audio: AudioMeta {
            device_latency_ms: audio.device_latency_ms.or(take.latency_ms),
            ..audio
        },
        timing: TimingAnchors {
            play_start_ms: take.call_started_ms,
            record_start_ms: take.record_started_ms,
            record_end_ms: Some(take.record_ended_ms),
        },
        score: take.score.clone(),
        passed: Some(take.passed),
        audio_ref,
    }
}

/// Samples a take's record window would hold at `sample_rate_hz`.
pub fn estimated_sample_count(take: &CompletedTake, sample_rate_hz: u32) -> u64 {
    let window_sec = (take.record_ended_ms - take.record_started_ms).max(0.0) / 1000.0;
    (window_sec * sample_rate_hz as f64).round() as u64
}

/// Packages a session's takes with ids drawn from `id_seed`. `sample_counts`
/// holds the captured length of each take by position; takes past its end
/// fall back to `estimated_sample_count`.
pub fn package_takes(
    takes: &[CompletedTake],
    sample_rate_hz: u32,
    sample_counts: &[u64],
    a4_hz: f64,
    id_seed: u32,
) -> Vec<TakeRecord> {
    let mut rng = SeededRng::new(id_seed);
    takes
        .iter()
        .enumerate()
        .map(|(i, take)| {
            let sample_count = match sample_counts.get(i) {
                Some(&count) => count,
                None => {
                    let estimate = estimated_sample_count(take, sample_rate_hz);
                    debug!("No captured length for take {}, estimating {} samples", i, estimate);
                    estimate
                }
            };
            let audio = AudioMeta {
                sample_rate_hz,
                sample_count,
                device_latency_ms: None,
                resample_method: None,
            };
            package_take(seeded_uuid(&mut rng), take, audio, a4_hz, None)
        })
        .collect()
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct SessionIds {
    pub session_id: Uuid,
    #[serde(default)]
    pub student_id: Option<String>,
    #[serde(default)]
    pub exercise_id: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct SessionAudio {
    pub sample_rate_hz: u32,
    pub total_samples: u64,
    #[serde(default = "default_bits_per_sample")]
    pub bits_per_sample: u16,
    #[serde(default)]
    pub total_bytes: u64,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct SessionTake {
    #[serde(flatten)]
    pub take: TakeRecord,
    pub session_offset_samples: u64,
    #[serde(default)]
    pub session_offset_bytes: u64,
    pub take_index: u32,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct SessionCounts {
    pub takes: u32,
    #[serde(default)]
    pub dropped: u32,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct SessionManifest {
    pub version: u32,
    pub created_at: DateTime<Utc>,
    pub ids: SessionIds,
    pub audio: SessionAudio,
    pub takes: Vec<SessionTake>,
    pub counts: SessionCounts,
    #[serde(default)]
    pub diagnostics: Vec<String>,
}

impl SessionManifest {
    pub fn to_json(&self) -> PracticeResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> PracticeResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Lays takes out back to back. Take records and sample lengths are paired
/// by position; if the counts differ, the extra entries on the longer side
/// are dropped and noted in `diagnostics`.
pub fn build_session_manifest(
    ids: SessionIds,
    created_at: DateTime<Utc>,
    sample_rate_hz: u32,
    takes: Vec<TakeRecord>,
    take_sample_lengths: &[u64],
) -> SessionManifest {
    let kept = takes.len().min(take_sample_lengths.len());
    let dropped = takes.len().max(take_sample_lengths.len()) - kept;

    let mut diagnostics = Vec::new();
    if dropped > 0 {
        let note = format!(
            "{} take records but {} sample lengths; kept {}, dropped {}",
            takes.len(),
            take_sample_lengths.len(),
            kept,
            dropped
        );
        warn!("Session manifest truncated: {}", note);
        diagnostics.push(note);
    }

    let mut offset = 0u64;
    let mut saturated = false;
    let entries: Vec<SessionTake> = takes
        .into_iter()
        .zip(take_sample_lengths.iter())
        .enumerate()
        .map(|(i, (take, &len))| {
            let entry = SessionTake {
                take,
                session_offset_samples: offset,
                session_offset_bytes: offset.saturating_mul(PCM_BYTES_PER_SAMPLE),
                take_index: i as u32,
            };
            offset = offset.checked_add(len).unwrap_or_else(|| {
                saturated = true;
                u64::MAX
            });
            entry
        })
        .collect();

    if saturated {
        let note = "sample lengths overflow the session offset; offsets saturated".to_string();
        warn!("Session manifest: {}", note);
        diagnostics.push(note);
    }

    SessionManifest {
        version: SESSION_MANIFEST_VERSION,
        created_at,
        ids,
        audio: SessionAudio {
            sample_rate_hz,
            total_samples: offset,
            bits_per_sample: PCM_BITS_PER_SAMPLE,
            total_bytes: offset.saturating_mul(PCM_BYTES_PER_SAMPLE),
        },
        counts: SessionCounts {
            takes: entries.len() as u32,
            dropped: dropped as u32,
        },
        takes: entries,
        diagnostics,
    }
}

pub struct SessionArtifacts {
    pub manifest: SessionManifest,
    /// Mono 16-bit WAV of every kept take, in take order.
    pub wav: Vec<u8>,
}

/// Concatenates per-take PCM (f32, -1..1) and encodes the session WAV.
pub fn build_session_artifacts(
    ids: SessionIds,
    created_at: DateTime<Utc>,
    sample_rate_hz: u32,
    takes: Vec<TakeRecord>,
    take_pcm: &[Vec<f32>],
) -> PracticeResult<SessionArtifacts> {
    let lengths: Vec<u64> = take_pcm.iter().map(|pcm| pcm.len() as u64).collect();
    let manifest = build_session_manifest(ids, created_at, sample_rate_hz, takes, &lengths);
    let kept = manifest.takes.len();

    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: sample_rate_hz,
        bits_per_sample: PCM_BITS_PER_SAMPLE,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)?;
        for &sample in take_pcm.iter().take(kept).flatten() {
            writer.write_sample((sample.clamp(-1.0, 1.0) * 32767.0) as i16)?;
        }
        writer.finalize()?;
    }

    info!(
        "Session artifacts built: {} takes, {} samples",
        manifest.counts.takes, manifest.audio.total_samples
    );
    Ok(SessionArtifacts {
        manifest,
        wav: cursor.into_inner(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::types::FinalScore;
    use crate::session::host::VocalRange;
    use crate::session::practice::TakeContent;
    use chrono::TimeZone;

    fn ids() -> SessionIds {
        SessionIds {
            session_id: seeded_uuid(&mut SeededRng::new(9)),
            student_id: Some("student-1".to_string()),
            exercise_id: None,
        }
    }

    fn created_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    fn score(percent: f64) -> TakeScore {
        TakeScore {
            final_score: FinalScore { percent },
            pitch: None,
            melody: None,
            rhythm: None,
            intervals: None,
            feedback: vec![],
        }
    }

    fn record(i: u32) -> TakeRecord {
        TakeRecord {
            version: TAKE_RECORD_VERSION,
            take_id: seeded_uuid(&mut SeededRng::new(i)),
            generation: GenerationMeta {
                seed: i,
                lyric_seed: i,
                scale: None,
                a4_hz: 440.0,
                low_hz: Some(130.8),
                high_hz: Some(523.25),
                lead_in_sec: 3.0,
                bpm: Some(80.0),
                lyrics: vec![],
            },
            audio: AudioMeta {
                sample_rate_hz: 48_000,
                sample_count: 1000,
                device_latency_ms: None,
                resample_method: None,
            },
            timing: TimingAnchors {
                play_start_ms: Some(0.0),
                record_start_ms: 3000.0,
                record_end_ms: None,
            },
            score: score(50.0 + i as f64),
            passed: Some(false),
            audio_ref: None,
        }
    }

    #[test]
    fn test_offsets_are_cumulative() {
        let takes = vec![record(0), record(1), record(2)];
        let manifest = build_session_manifest(ids(), created_at(), 48_000, takes, &[100, 250, 50]);

        let offsets: Vec<u64> = manifest.takes.iter().map(|t| t.session_offset_samples).collect();
        assert_eq!(offsets, vec![0, 100, 350]);
        let byte_offsets: Vec<u64> = manifest.takes.iter().map(|t| t.session_offset_bytes).collect();
        assert_eq!(byte_offsets, vec![0, 200, 700]);
        let indices: Vec<u32> = manifest.takes.iter().map(|t| t.take_index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
        assert_eq!(manifest.audio.total_samples, 400);
        assert_eq!(manifest.audio.total_bytes, 800);
        assert_eq!(manifest.counts.takes, 3);
        assert_eq!(manifest.counts.dropped, 0);
        assert!(manifest.diagnostics.is_empty());
    }

    #[test]
    fn test_more_takes_than_lengths_truncates() {
        let takes: Vec<TakeRecord> = (0..5).map(record).collect();
        let manifest = build_session_manifest(ids(), created_at(), 48_000, takes, &[10, 20, 30]);
        assert_eq!(manifest.takes.len(), 3);
        assert_eq!(manifest.counts.takes, 3);
        assert_eq!(manifest.counts.dropped, 2);
        assert_eq!(manifest.diagnostics.len(), 1);
        assert!(manifest.diagnostics[0].contains("dropped 2"));
        assert_eq!(manifest.audio.total_samples, 60);
        assert_eq!(manifest.takes[2].take.generation.seed, 2);
    }

    #[test]
    fn test_more_lengths_than_takes_truncates() {
        let manifest =
            build_session_manifest(ids(), created_at(), 48_000, vec![record(0)], &[10, 20, 30, 40]);
        assert_eq!(manifest.counts.takes, 1);
        assert_eq!(manifest.counts.dropped, 3);
        assert_eq!(manifest.audio.total_samples, 10);
    }

    #[test]
    fn test_huge_lengths_saturate_offsets() {
        let takes = vec![record(0), record(1), record(2)];
        let manifest =
            build_session_manifest(ids(), created_at(), 48_000, takes, &[u64::MAX, 10, 10]);

        let offsets: Vec<u64> = manifest.takes.iter().map(|t| t.session_offset_samples).collect();
        assert_eq!(offsets, vec![0, u64::MAX, u64::MAX]);
        assert_eq!(manifest.takes[1].session_offset_bytes, u64::MAX);
        assert_eq!(manifest.audio.total_samples, u64::MAX);
        assert_eq!(manifest.audio.total_bytes, u64::MAX);
        assert_eq!(manifest.counts.takes, 3);
        assert_eq!(manifest.diagnostics.len(), 1);
        assert!(manifest.diagnostics[0].contains("saturated"));
    }

    #[test]
    fn test_session_wav_matches_manifest() {
        let pcm = vec![vec![0.5f32; 480], vec![-0.25f32; 960], vec![0.0f32; 100]];
        let artifacts =
            build_session_artifacts(ids(), created_at(), 48_000, vec![record(0), record(1)], &pcm)
                .unwrap();
        assert_eq!(artifacts.manifest.counts.takes, 2);
        assert_eq!(artifacts.manifest.audio.total_samples, 1440);

        let reader = hound::WavReader::new(Cursor::new(artifacts.wav)).unwrap();
        assert_eq!(reader.spec().sample_rate, 48_000);
        assert_eq!(reader.spec().channels, 1);
        assert_eq!(reader.len(), 1440);
        let samples: Vec<i16> = reader.into_samples::<i16>().map(|s| s.unwrap()).collect();
        assert_eq!(samples[0], 16383);
        assert_eq!(samples[480], -8191);
    }

    #[test]
    fn test_manifest_json_round_trip_keeps_shape() {
        let manifest = build_session_manifest(ids(), created_at(), 48_000, vec![record(0)], &[10]);
        let json = manifest.to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["version"], SESSION_MANIFEST_VERSION);
        assert_eq!(value["counts"]["takes"], 1);
        assert_eq!(value["takes"][0]["session_offset_samples"], 0);
        assert_eq!(value["takes"][0]["score"]["final"]["percent"], 50.0);
        assert_eq!(SessionManifest::from_json(&json).unwrap(), manifest);
    }

    #[test]
    fn test_reads_version_one_documents() {
        let v1 = r#"{
            "version": 1,
            "created_at": "2024-03-01T12:00:00Z",
            "ids": { "session_id": "6f1c2a3b-4d5e-4f60-8a7b-9c0d1e2f3a4b" },
            "audio": { "sample_rate_hz": 44100, "total_samples": 300 },
            "takes": [{
                "version": 1,
                "take_id": "0b7f3c2d-1e4a-4b5c-9d6e-7f8091a2b3c4",
                "generation": {
                    "seed": 42, "lyric_seed": 7, "scale": "major", "a4_hz": 440.0,
                    "low_hz": 130.8, "high_hz": 523.25, "lead_in_sec": 3.0
                },
                "audio": {
                    "sample_rate_hz": 44100, "sample_count": 300,
                    "device_latency_ms": null, "resample_method": null
                },
                "timing": { "play_start_ms": 0.0, "record_start_ms": 3000.0 },
                "score": { "final": { "percent": 81.0 }, "pitch": null, "melody": null,
                           "rhythm": null, "intervals": null },
                "session_offset_samples": 0,
                "take_index": 0
            }],
            "counts": { "takes": 1 }
        }"#;
        let manifest = SessionManifest::from_json(v1).unwrap();
        assert_eq!(manifest.version, 1);
        assert_eq!(manifest.audio.bits_per_sample, 16);
        assert_eq!(manifest.counts.dropped, 0);
        let take = &manifest.takes[0].take;
        assert_eq!(take.generation.seed, 42);
        assert!(take.generation.lyrics.is_empty());
        assert!(take.passed.is_none());
        assert!(take.score.feedback.is_empty());
        assert_eq!(take.score.percent(), 81.0);
    }

    #[test]
    fn test_seeded_uuids_are_reproducible_v4() {
        let a = seeded_uuid(&mut SeededRng::new(5));
        let b = seeded_uuid(&mut SeededRng::new(5));
        let c = seeded_uuid(&mut SeededRng::new(6));
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.get_version_num(), 4);
    }

    fn completed_take() -> CompletedTake {
        CompletedTake {
            content: TakeContent {
                take_index: 0,
                seed: 42,
                lyric_seed: 7,
                phrase: Default::default(),
                rhythm: vec![],
                lyrics: vec!["moon".to_string()],
                range: VocalRange::new(130.8, 523.25),
                scale: Some("major".to_string()),
                bpm: 80.0,
            },
            trace: vec![],
            score: score(75.0),
            passed: true,
            call_started_ms: Some(100.0),
            record_started_ms: 3_400.0,
            record_ended_ms: 9_400.0,
            lead_in_sec: 3.0,
            latency_ms: Some(35.0),
        }
    }

    #[test]
    fn test_package_take_copies_generation() {
        let take = completed_take();
        let audio = AudioMeta {
            sample_rate_hz: 48_000,
            sample_count: 288_000,
            device_latency_ms: None,
            resample_method: Some("linear".to_string()),
        };
        let id = seeded_uuid(&mut SeededRng::new(1));
        let rec = package_take(id, &take, audio, 440.0, Some("takes/0.wav".to_string()));

        assert_eq!(rec.version, TAKE_RECORD_VERSION);
        assert_eq!(rec.take_id, id);
        assert_eq!(rec.generation.seed, 42);
        assert_eq!(rec.generation.scale.as_deref(), Some("major"));
        assert_eq!(rec.generation.low_hz, Some(130.8));
        assert_eq!(rec.audio.device_latency_ms, Some(35.0));
        assert_eq!(rec.timing.play_start_ms, Some(100.0));
        assert_eq!(rec.timing.record_start_ms, 3_400.0);
        assert_eq!(rec.passed, Some(true));
        assert_eq!(rec.score.percent(), 75.0);
    }

    #[test]
    fn test_package_takes_prefers_captured_lengths() {
        let takes = vec![completed_take(), completed_take()];
        let records = package_takes(&takes, 48_000, &[290_000], 440.0, 5);

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].audio.sample_count, 290_000);
        // The 6 s record window at 48 kHz.
        assert_eq!(records[1].audio.sample_count, 288_000);
        assert_eq!(estimated_sample_count(&takes[1], 48_000), 288_000);
        assert_ne!(records[0].take_id, records[1].take_id);

        let again = package_takes(&takes, 48_000, &[290_000], 440.0, 5);
        assert_eq!(records, again);
    }
}
