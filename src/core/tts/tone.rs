//! Built-in tonal speech model
//!
//! A dependency-free stand-in for a neural model: each word becomes a short
//! tone whose pitch is derived from the speaker and the word, separated by
//! short gaps and longer pauses after punctuation. Output is deterministic for
//! a given text, speaker, and sample rate.

use std::f32::consts::TAU;

use super::{ModelInfo, SpeechModel, TTSError, TTSResult};

const AMPLITUDE: f32 = 0.4;
const BASE_WORD_SECS: f32 = 0.12;
const PER_CHAR_SECS: f32 = 0.035;
const MAX_WORD_SECS: f32 = 0.6;
const WORD_GAP_SECS: f32 = 0.04;
const PUNCTUATION_PAUSE_SECS: f32 = 0.18;
const RAMP_SECS: f32 = 0.01;

/// Per-speaker fundamental is chosen from this range in Hz
const SPEAKER_PITCH_RANGE: (f32, f32) = (110.0, 260.0);
const WORD_PITCH_SPREAD: f32 = 0.25;

pub struct ToneModel {
    info: ModelInfo,
}

impl ToneModel {
    pub fn new(info: ModelInfo) -> TTSResult<Self> {
        if info.sample_rate == 0 {
            return Err(TTSError::InvalidConfiguration(
                "sample_rate must be non-zero".to_string(),
            ));
        }
        Ok(Self { info })
    }

    fn speaker_pitch(speaker: &str) -> f32 {
        let (low, high) = SPEAKER_PITCH_RANGE;
        low + unit_interval(fnv1a(speaker.as_bytes())) * (high - low)
    }

    fn word_pitch(speaker_pitch: f32, word: &str) -> f32 {
        let offset = unit_interval(fnv1a(word.as_bytes())) * 2.0 - 1.0;
        speaker_pitch * (1.0 + offset * WORD_PITCH_SPREAD)
    }

    fn render_word(&self, out: &mut Vec<f32>, word: &str, pitch: f32) {
        let rate = self.info.sample_rate as f32;
        let letters = word.chars().filter(|c| c.is_alphanumeric()).count() as f32;
        let secs = (BASE_WORD_SECS + letters * PER_CHAR_SECS).min(MAX_WORD_SECS);
        let len = (secs * rate) as usize;
        let ramp = ((RAMP_SECS * rate) as usize).max(1);

        out.reserve(len);
        for n in 0..len {
            let t = n as f32 / rate;
            let envelope = (n.min(len - 1 - n) as f32 / ramp as f32).min(1.0);
            // Fundamental plus a quieter second harmonic
            let wave = (TAU * pitch * t).sin() * 0.8 + (TAU * pitch * 2.0 * t).sin() * 0.2;
            out.push(wave * envelope * AMPLITUDE);
        }
    }

    fn push_silence(&self, out: &mut Vec<f32>, secs: f32) {
        let len = (secs * self.info.sample_rate as f32) as usize;
        out.resize(out.len() + len, 0.0);
    }
}

impl SpeechModel for ToneModel {
    fn info(&self) -> &ModelInfo {
        &self.info
    }

    fn synthesize(&self, text: &str, speaker: &str) -> TTSResult<Vec<f32>> {
        let words: Vec<&str> = text.split_whitespace().collect();
        if words.is_empty() {
            return Err(TTSError::Synthesis("no words to synthesize".to_string()));
        }

        let speaker_pitch = Self::speaker_pitch(speaker);
        let mut samples = Vec::new();

        for word in words {
            self.render_word(&mut samples, word, Self::word_pitch(speaker_pitch, word));

            let pause = if word.ends_with(|c: char| matches!(c, '.' | '!' | '?' | ',' | ';' | ':'))
            {
                PUNCTUATION_PAUSE_SECS
            } else {
                WORD_GAP_SECS
            };
            self.push_silence(&mut samples, pause);
        }

        Ok(samples)
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0xcbf2_9ce4_8422_2325, |hash, b| {
        (hash ^ u64::from(*b)).wrapping_mul(0x0000_0100_0000_01b3)
    })
}

fn unit_interval(hash: u64) -> f32 {
    (hash % 10_000) as f32 / 10_000.0
}
