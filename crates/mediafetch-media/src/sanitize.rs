//! Filesystem-safe names from titles and other remote text.

use std::sync::LazyLock;

use regex::Regex;

/// Default maximum length of a sanitized name, in characters.
pub const DEFAULT_MAX_LENGTH: usize = 150;

/// Characters rejected by common filesystems.
static DISALLOWED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"[<>:"/\\|?*]"#).expect("disallowed pattern is valid"));

/// Everything outside word characters, Kana, CJK ideographs, `-`, `.` and space.
static OUTSIDE_ALLOW_LIST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[^\w\x{3040}-\x{30FF}\x{3400}-\x{4DBF}\x{4E00}-\x{9FFF}\-. ]")
        .expect("allow-list pattern is valid")
});

/// Converts non-Latin script to an ASCII approximation.
pub trait Transliterator: Send + Sync {
    fn transliterate(&self, text: &str) -> String;
}

/// Japanese to romaji via kakasi.
#[cfg(feature = "transliterate")]
#[derive(Debug, Clone, Copy, Default)]
pub struct KakasiTransliterator;

#[cfg(feature = "transliterate")]
impl Transliterator for KakasiTransliterator {
    fn transliterate(&self, text: &str) -> String {
        kakasi::convert(text).romaji
    }
}

/// The transliterator compiled into this build, if any.
pub fn default_transliterator() -> Option<Box<dyn Transliterator>> {
    #[cfg(feature = "transliterate")]
    {
        Some(Box::new(KakasiTransliterator))
    }
    #[cfg(not(feature = "transliterate"))]
    {
        None
    }
}

/// Produces filesystem-safe names. Never fails; may return an empty string,
/// which callers must replace with a fallback name.
pub struct Sanitizer {
    transliterator: Option<Box<dyn Transliterator>>,
    max_length: usize,
}

impl std::fmt::Debug for Sanitizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sanitizer")
            .field("transliterate", &self.transliterator.is_some())
            .field("max_length", &self.max_length)
            .finish()
    }
}

impl Default for Sanitizer {
    fn default() -> Self {
        Self::new(default_transliterator())
    }
}

impl Sanitizer {
    pub fn new(transliterator: Option<Box<dyn Transliterator>>) -> Self {
        Self {
            transliterator,
            max_length: DEFAULT_MAX_LENGTH,
        }
    }

    /// A sanitizer that never transliterates.
    pub fn plain() -> Self {
        Self::new(None)
    }

    pub fn with_max_length(mut self, max_length: usize) -> Self {
        self.max_length = max_length;
        self
    }

    pub fn max_length(&self) -> usize {
        self.max_length
    }

    pub fn sanitize(&self, text: &str) -> String {
        self.sanitize_with_limit(text, self.max_length)
    }

    pub fn sanitize_with_limit(&self, text: &str, max_length: usize) -> String {
        let text = match &self.transliterator {
            Some(t) if !text.is_ascii() => t.transliterate(text),
            _ => text.to_string(),
        };

        let replaced = DISALLOWED.replace_all(&text, "_");
        let allowed = OUTSIDE_ALLOW_LIST.replace_all(&replaced, "");

        // Trim again after truncation so a cut never leaves a trailing space.
        let truncated: String = allowed.trim().chars().take(max_length).collect();
        truncated.trim_end().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Upper;

    impl Transliterator for Upper {
        fn transliterate(&self, text: &str) -> String {
            text.replace('é', "e").to_uppercase()
        }
    }

    #[test]
    fn test_replaces_disallowed_characters() {
        let s = Sanitizer::plain();
        assert_eq!(s.sanitize(r#"a<b>c:d"e/f\g|h?i*j"#), "a_b_c_d_e_f_g_h_i_j");
    }

    #[test]
    fn test_removes_outside_allow_list() {
        let s = Sanitizer::plain();
        assert_eq!(s.sanitize("Hello, World! (Official) #1"), "Hello World Official 1");
        assert_eq!(s.sanitize("  spaced out  "), "spaced out");
        assert_eq!(s.sanitize("tab\there\nnewline"), "tabherenewline");
        assert_eq!(s.sanitize("v1.2-final_cut"), "v1.2-final_cut");
    }

    #[test]
    fn test_keeps_kana_and_cjk_without_transliterator() {
        let s = Sanitizer::plain();
        assert_eq!(s.sanitize("日本語のタイトル！"), "日本語のタイトル");
    }

    #[test]
    fn test_uses_transliterator_for_non_ascii() {
        let s = Sanitizer::new(Some(Box::new(Upper)));
        assert_eq!(s.sanitize("café"), "CAFE");
        // ASCII input is left to the regex passes only
        assert_eq!(s.sanitize("plain"), "plain");
    }

    #[test]
    fn test_truncates_to_max_length() {
        let s = Sanitizer::plain();
        let long = "a".repeat(400);
        assert_eq!(s.sanitize(&long).chars().count(), DEFAULT_MAX_LENGTH);
        assert_eq!(s.sanitize_with_limit("abc def", 4), "abc");
        assert_eq!(s.sanitize_with_limit("日本語のタイトル", 3), "日本語");
    }

    #[test]
    fn test_empty_results() {
        let s = Sanitizer::plain();
        assert_eq!(s.sanitize(""), "");
        assert_eq!(s.sanitize("!!!???"), "___");
        assert_eq!(s.sanitize("#$%^&"), "");
    }

    #[test]
    fn test_idempotent_and_bounded() {
        let s = Sanitizer::plain().with_max_length(20);
        let inputs = [
            "Rick Astley - Never Gonna Give You Up (Official Music Video)",
            "  a/b\\c  ",
            "日本語 タイトル / テスト",
            "emoji 🎵 title",
            "ends with space before cut xxxxxxxxx",
            "",
        ];
        for input in inputs {
            let once = s.sanitize(input);
            assert_eq!(s.sanitize(&once), once, "not idempotent for {:?}", input);
            assert!(once.chars().count() <= 20);
            assert!(!once.chars().any(|c| r#"<>:"/\|?*"#.contains(c)));
        }
    }
}
