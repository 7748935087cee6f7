//! Phonetic input normalization for word-reading drills.

use wana_kana::{ConvertJapanese, Options};

/// Converts raw keystrokes into the text compared against accepted readings.
///
/// Implementations must be pure: the same input always yields the same output.
pub trait InputNormalizer: Send + Sync {
    /// Full conversion applied to a submitted answer.
    fn normalize(&self, raw: &str) -> String;

    /// Conversion applied while the user is still typing. Defaults to [`normalize`].
    ///
    /// [`normalize`]: InputNormalizer::normalize
    fn normalize_partial(&self, raw: &str) -> String {
        self.normalize(raw)
    }
}

/// Romaji to hiragana via `wana_kana`.
#[derive(Debug, Default, Clone, Copy)]
pub struct WanaKanaNormalizer;

impl InputNormalizer for WanaKanaNormalizer {
    fn normalize(&self, raw: &str) -> String {
        raw.to_lowercase().to_hiragana()
    }

    /// IME mode: a trailing "n" or "ny" stays romaji until the next keystroke
    /// decides between ん and な/にゃ.
    fn normalize_partial(&self, raw: &str) -> String {
        raw.to_lowercase().to_hiragana_with_opt(Options {
            imemode: true,
            ..Options::default()
        })
    }
}

/// Leaves input untouched. Useful for backends that drill romanized readings.
#[derive(Debug, Default, Clone, Copy)]
pub struct PassthroughNormalizer;

impl InputNormalizer for PassthroughNormalizer {
    fn normalize(&self, raw: &str) -> String {
        raw.to_string()
    }
}
