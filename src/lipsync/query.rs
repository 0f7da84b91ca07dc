use std::path::Path;

use anyhow::Context as _;

use crate::foundation::error::VoisyncResult;

/// Phoneme timing document produced by the speech synthesizer.
///
/// Only the timing fields are read; every other field of the synthesizer schema is ignored.
/// Missing numbers default to `0` (and `speedScale` to `1.0`).
#[derive(Clone, Debug, Default, serde::Serialize, serde::Deserialize)]
pub struct SynthesisQuery {
    #[serde(default)]
    pub accent_phrases: Vec<AccentPhrase>,
    #[serde(rename = "speedScale", default = "default_speed_scale")]
    pub speed_scale: f64,
    #[serde(rename = "prePhonemeLength", default)]
    pub pre_phoneme_length: f64,
    #[serde(rename = "postPhonemeLength", default)]
    pub post_phoneme_length: f64,
}

fn default_speed_scale() -> f64 {
    1.0
}

/// One prosodic unit: ordered morae, optionally followed by a pause.
#[derive(Clone, Debug, Default, serde::Serialize, serde::Deserialize)]
pub struct AccentPhrase {
    #[serde(default)]
    pub moras: Vec<Mora>,
    #[serde(default)]
    pub pause_mora: Option<Mora>,
}

/// Consonant + vowel timing unit. Lengths are seconds.
#[derive(Clone, Debug, Default, serde::Serialize, serde::Deserialize)]
pub struct Mora {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub consonant: Option<String>,
    #[serde(default)]
    pub consonant_length: Option<f64>,
    #[serde(default)]
    pub vowel: Option<String>,
    #[serde(default)]
    pub vowel_length: f64,
}

impl Mora {
    /// Consonant length clamped to `>= 0`.
    pub fn consonant_secs(&self) -> f64 {
        non_negative(self.consonant_length.unwrap_or(0.0))
    }

    /// Vowel length clamped to `>= 0`.
    pub fn vowel_secs(&self) -> f64 {
        non_negative(self.vowel_length)
    }
}

impl SynthesisQuery {
    pub fn from_json(s: &str) -> VoisyncResult<Self> {
        Ok(serde_json::from_str(s)?)
    }

    pub fn from_path(path: &Path) -> VoisyncResult<Self> {
        let s = std::fs::read_to_string(path)
            .with_context(|| format!("read synthesis query '{}'", path.display()))?;
        Self::from_json(&s)
    }

    /// Divisor applied to every duration; unusable values fall back to `1.0`.
    pub fn effective_speed_scale(&self) -> f64 {
        if self.speed_scale.is_finite() && self.speed_scale > 0.0 {
            self.speed_scale
        } else {
            1.0
        }
    }
}

fn non_negative(v: f64) -> f64 {
    if v.is_finite() { v.max(0.0) } else { 0.0 }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_synthesizer_document_with_extra_fields() {
        let q = SynthesisQuery::from_json(
            r#"{
                "accent_phrases": [{
                    "moras": [
                        {"text": "コ", "consonant": "k", "consonant_length": 0.05,
                         "vowel": "o", "vowel_length": 0.1, "pitch": 5.5}
                    ],
                    "accent": 1,
                    "pause_mora": {"text": "、", "vowel": "pau", "vowel_length": 0.3, "pitch": 0},
                    "is_interrogative": false
                }],
                "speedScale": 1.25,
                "pitchScale": 0.0,
                "prePhonemeLength": 0.1,
                "postPhonemeLength": 0.2,
                "outputSamplingRate": 24000
            }"#,
        )
        .unwrap();

        assert_eq!(q.accent_phrases.len(), 1);
        let phrase = &q.accent_phrases[0];
        assert_eq!(phrase.moras[0].consonant.as_deref(), Some("k"));
        assert_eq!(phrase.pause_mora.as_ref().unwrap().vowel_length, 0.3);
        assert_eq!(q.speed_scale, 1.25);
        assert_eq!(q.pre_phoneme_length, 0.1);
        assert_eq!(q.post_phoneme_length, 0.2);
    }

    #[test]
    fn missing_fields_take_defaults() {
        let q = SynthesisQuery::from_json(r#"{"accent_phrases": [{"moras": [{}]}]}"#).unwrap();
        assert_eq!(q.speed_scale, 1.0);
        assert_eq!(q.pre_phoneme_length, 0.0);
        let m = &q.accent_phrases[0].moras[0];
        assert_eq!(m.consonant_secs(), 0.0);
        assert_eq!(m.vowel_secs(), 0.0);
        assert!(m.vowel.is_none());
    }

    #[test]
    fn negative_lengths_clamp_to_zero() {
        let m = Mora {
            consonant_length: Some(-0.2),
            vowel_length: -1.0,
            ..Mora::default()
        };
        assert_eq!(m.consonant_secs(), 0.0);
        assert_eq!(m.vowel_secs(), 0.0);
    }

    #[test]
    fn bad_speed_scale_falls_back() {
        let mut q = SynthesisQuery {
            speed_scale: 0.0,
            ..SynthesisQuery::default()
        };
        assert_eq!(q.effective_speed_scale(), 1.0);
        q.speed_scale = f64::NAN;
        assert_eq!(q.effective_speed_scale(), 1.0);
        q.speed_scale = 2.0;
        assert_eq!(q.effective_speed_scale(), 2.0);
    }
}
