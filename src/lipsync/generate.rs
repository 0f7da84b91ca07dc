use crate::lipsync::frame::{LipSyncFrame, MouthShape};
use crate::lipsync::phonetics::{ConsonantClass, classify};
use crate::lipsync::query::{Mora, SynthesisQuery};

/// Vowels shorter than this never visibly open the mouth.
pub const MIN_OPEN_VOWEL_SECS: f64 = 0.05;

/// Upper bound for the closed part of an affricate.
pub const AFFRICATE_CLOSURE_MAX_SECS: f64 = 0.02;

/// Convert a synthesizer timing document into a gapless, time-ordered lip-sync track.
///
/// Zero-length parts are skipped, so an all-silent document produces an empty track.
#[tracing::instrument(level = "debug", skip(query), fields(phrases = query.accent_phrases.len()))]
pub fn generate_frames(query: &SynthesisQuery) -> Vec<LipSyncFrame> {
    let scale = query.effective_speed_scale();
    let mut track = Track::default();

    track.push(query.pre_phoneme_length / scale, MouthShape::Closed);

    for phrase in &query.accent_phrases {
        for mora in &phrase.moras {
            push_mora(&mut track, mora, scale);
        }
        if let Some(pause) = &phrase.pause_mora {
            track.push(pause.vowel_secs() / scale, MouthShape::Closed);
        }
    }

    track.push(query.post_phoneme_length / scale, MouthShape::Closed);

    tracing::debug!(frames = track.frames.len(), total = track.cursor, "generated lip-sync track");
    track.frames
}

#[derive(Default)]
struct Track {
    frames: Vec<LipSyncFrame>,
    cursor: f64,
}

impl Track {
    fn push(&mut self, duration: f64, mouth: MouthShape) {
        if !(duration.is_finite() && duration > 0.0) {
            return;
        }
        self.frames.push(LipSyncFrame {
            time: self.cursor,
            duration,
            mouth,
        });
        self.cursor += duration;
    }
}

fn push_mora(track: &mut Track, mora: &Mora, scale: f64) {
    let vowel_shape = MouthShape::from_vowel(mora.vowel.as_deref());

    // A length without a consonant symbol carries no articulation and is dropped with it.
    let consonant = mora.consonant.as_deref().filter(|c| !c.is_empty());
    if let Some(consonant) = consonant {
        let len = mora.consonant_secs() / scale;
        if len > 0.0 {
            match classify(consonant) {
                ConsonantClass::Plosive | ConsonantClass::Stop => {
                    track.push(len, MouthShape::Closed);
                }
                ConsonantClass::Affricate => {
                    let closure = (len * 0.5).min(AFFRICATE_CLOSURE_MAX_SECS);
                    track.push(closure, MouthShape::Closed);
                    track.push(len - closure, vowel_shape);
                }
                ConsonantClass::Fricative
                | ConsonantClass::Nasal
                | ConsonantClass::Liquid
                | ConsonantClass::Glide
                | ConsonantClass::Other => {
                    track.push(len, vowel_shape);
                }
            }
        }
    }

    let vowel_len = mora.vowel_secs() / scale;
    if vowel_len < MIN_OPEN_VOWEL_SECS {
        track.push(vowel_len, MouthShape::Closed);
    } else {
        track.push(vowel_len, vowel_shape);
    }
}
