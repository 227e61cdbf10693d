//! Path-segment sanitization.
//!
//! Destination names must be safe on every filesystem the library may
//! live on, so the rules follow the strictest common denominator
//! (Windows): no `< > : " / \ | ? *` or control characters, no trailing
//! dots or spaces, and no bare reserved device names. Extensions are
//! preserved verbatim; a too-long path is a preflight failure elsewhere,
//! never a silent truncation here.

use std::collections::HashSet;

use once_cell::sync::Lazy;

/// Characters invalid in Windows path segments (and worth avoiding
/// everywhere else).
pub const INVALID_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

const RESERVED_DEVICE_NAMES: &[&str] = &[
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7",
    "COM8", "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

static DEFAULT_RESERVED: Lazy<HashSet<String>> =
    Lazy::new(|| RESERVED_DEVICE_NAMES.iter().map(|s| s.to_string()).collect());

/// Injected sanitization rules.
#[derive(Debug, Clone)]
pub struct NamingRules {
    /// Replacement for invalid and control characters. Empty removes them.
    pub substitute: String,
    /// Uppercased reserved device names, renamed with a suffix before the
    /// extension.
    pub reserved_names: HashSet<String>,
}

impl Default for NamingRules {
    fn default() -> Self {
        Self {
            substitute: String::new(),
            reserved_names: DEFAULT_RESERVED.clone(),
        }
    }
}

/// Suffix appended to a reserved stem (`CON.mkv` becomes `CON_media.mkv`).
const RESERVED_SUFFIX: &str = "_media";

/// Sanitize one path segment (a folder name or a filename).
pub fn sanitize_segment(name: &str, rules: &NamingRules) -> String {
    let mut out = String::with_capacity(name.len());
    for ch in name.chars() {
        if INVALID_CHARS.contains(&ch) || ch.is_control() {
            out.push_str(&rules.substitute);
        } else {
            out.push(ch);
        }
    }

    // Collapse whitespace runs, then strip what Windows strips anyway.
    let collapsed = out.split_whitespace().collect::<Vec<_>>().join(" ");
    let mut name = collapsed.trim_matches([' ', '.']).to_string();

    // Device names are reserved regardless of extension: CON.mkv is CON.
    let stem_end = name.find('.').unwrap_or(name.len());
    if rules.reserved_names.contains(&name[..stem_end].to_uppercase()) {
        name.insert_str(stem_end, RESERVED_SUFFIX);
    }

    if name.is_empty() {
        name = "unknown".to_string();
    }
    name
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sanitize(name: &str) -> String {
        sanitize_segment(name, &NamingRules::default())
    }

    #[test]
    fn removes_invalid_characters() {
        assert_eq!(sanitize(r#"Mission: Impossible"#), "Mission Impossible");
        assert_eq!(sanitize(r#"a<b>c:d"e/f\g|h?i*j"#), "abcdefghij");
    }

    #[test]
    fn substitute_character_is_used() {
        let rules = NamingRules {
            substitute: "_".to_string(),
            ..NamingRules::default()
        };
        assert_eq!(sanitize_segment("a:b", &rules), "a_b");
    }

    #[test]
    fn collapses_whitespace_and_trims() {
        assert_eq!(sanitize("  The   Matrix  "), "The Matrix");
        assert_eq!(sanitize("Name."), "Name");
        assert_eq!(sanitize("Name . . "), "Name");
    }

    #[test]
    fn strips_control_characters() {
        assert_eq!(sanitize("Na\u{0}me\t"), "Name");
    }

    #[test]
    fn renames_reserved_device_names() {
        assert_eq!(sanitize("CON"), "CON_media");
        assert_eq!(sanitize("con.mkv"), "con_media.mkv");
        assert_eq!(sanitize("COM1.srt"), "COM1_media.srt");
        assert_eq!(sanitize("Console"), "Console");
        assert_eq!(sanitize("CONAN.mkv"), "CONAN.mkv");
    }

    #[test]
    fn empty_results_become_unknown() {
        assert_eq!(sanitize(""), "unknown");
        assert_eq!(sanitize("???"), "unknown");
        assert_eq!(sanitize(". ."), "unknown");
    }

    #[test]
    fn sanitized_output_is_always_safe() {
        let nasty = [
            "a:b/c\\d",
            "  lots   of   space  ",
            "dots...",
            "NUL",
            "prn.txt",
            "tab\there",
        ];
        for input in nasty {
            let out = sanitize(input);
            assert!(!out.contains(INVALID_CHARS), "{out:?} contains invalid chars");
            assert!(!out.ends_with([' ', '.']), "{out:?} has trailing dot/space");
            let stem = out.split('.').next().unwrap_or(&out);
            assert!(
                !DEFAULT_RESERVED.contains(&stem.to_uppercase()),
                "{out:?} is reserved"
            );
        }
    }
}
