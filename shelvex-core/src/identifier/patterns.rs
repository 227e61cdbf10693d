//! Filename and folder-name matchers for media identification.
//!
//! Matchers run in a fixed order; earlier matches consume their tokens so
//! later matchers (and title cleaning) never re-interpret them. The planner
//! emits names that re-parse through these same matchers, which keeps
//! identification and naming round-trippable.

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;

/// Episode pattern match: season plus one or more episode numbers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EpisodeMatch {
    pub season: u16,
    /// Expanded range for `S01E01-E03`; two entries for `S01E01E02`.
    pub episodes: Vec<u16>,
    /// Episode title found after the marker, if any.
    pub title: Option<String>,
}

static EPISODE_SXXEYY: Lazy<Regex> = Lazy::new(|| {
    // S01E02, S01.E02, s01 e02, with an optional range tail (-E03 / E03).
    // Up to four episode digits for long-running shows.
    Regex::new(r"(?i)S(?P<season>\d{1,2})[ ._-]*E(?P<ep1>\d{1,4})(?:[ ._-]*-?[ ._-]*E(?P<ep2>\d{1,4}))?")
        .expect("SxxEyy regex should compile")
});

static EPISODE_NXM: Lazy<Regex> = Lazy::new(|| {
    // 1x02, 1x02-03; the range requires a dash so codec tokens like
    // 265x10 never read as ranges.
    Regex::new(r"(?i)(?:^|[ ._(-])(?P<season>\d{1,2})x(?P<ep1>\d{1,4})(?:[ ._-]*-[ ._-]*(?P<ep2>\d{1,4}))?")
        .expect("NxM regex should compile")
});

static DATE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?P<year>\d{4})[-.](?P<month>\d{2})[-.](?P<day>\d{2})")
        .expect("date regex should compile")
});

static PART_PATTERN: Lazy<Regex> = Lazy::new(|| {
    // Part 1, pt2, Part III, Part Two. Word boundary up front so words
    // like "caption" never match.
    Regex::new(r"(?i)\bp(?:ar)?t[. ]*(?P<part>\d{1,2}|[IVX]{1,4}\b|one\b|two\b|three\b|four\b|five\b|six\b|seven\b|eight\b|nine\b|ten\b)")
        .expect("part regex should compile")
});

static SEASON_FOLDER_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:season[. ]*(?P<season>\d{1,2})|(?:^|[. _-])s(?P<season2>\d{1,2})(?:[. _-]|$))")
        .expect("season folder regex should compile")
});

static PAREN_YEAR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\((?P<year>\d{4})\)").expect("paren year regex should compile"));

static STANDALONE_YEAR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:^|[._ \-])(?P<year>19\d{2}|20\d{2})(?:[._ \-]|$)")
        .expect("standalone year regex should compile")
});

/// Years accepted as plausible release years. The lower bound is the first
/// year commercial film exists.
const YEAR_MIN: u16 = 1895;
const YEAR_MAX: u16 = 2100;

/// Extract season/episode information from a filename stem.
pub fn extract_episode_info(stem: &str) -> Option<EpisodeMatch> {
    for pattern in [&*EPISODE_SXXEYY, &*EPISODE_NXM] {
        let Some(caps) = pattern.captures(stem) else {
            continue;
        };
        let season: u16 = caps.name("season")?.as_str().parse().ok()?;
        let ep1: u16 = caps.name("ep1")?.as_str().parse().ok()?;
        let mut episodes = vec![ep1];

        if let Some(ep2) = caps.name("ep2").and_then(|m| m.as_str().parse::<u16>().ok()) {
            if ep2 > ep1 {
                episodes = (ep1..=ep2).collect();
            } else {
                episodes.push(ep2);
            }
        }

        let whole = caps.get(0)?;
        let title = extract_episode_title(&stem[whole.end()..]);
        return Some(EpisodeMatch {
            season,
            episodes,
            title,
        });
    }
    None
}

/// Pull an episode title out of the text following an episode marker:
/// ` - Title`, ` (Title)`, or a bare trailing title.
fn extract_episode_title(remainder: &str) -> Option<String> {
    static DASH_TITLE: Lazy<Regex> = Lazy::new(|| {
        Regex::new(r"^\s*[-\u{2013}]\s*(?P<title>.+)$").expect("dash title regex should compile")
    });
    static PAREN_TITLE: Lazy<Regex> = Lazy::new(|| {
        Regex::new(r"^\s*\((?P<title>[^)]+)\)").expect("paren title regex should compile")
    });
    static QUALITY_NOISE: Lazy<Regex> = Lazy::new(|| {
        Regex::new(r"(?i)\[[^\]]*\]|\b\d{3,4}p\b|\b(?:web-?dl|hdtv|bluray|x264|x265|hevc|10bit)\b")
            .expect("quality noise regex should compile")
    });

    let remainder = remainder.trim_end();
    if remainder.is_empty() {
        return None;
    }

    let raw = if let Some(caps) = DASH_TITLE.captures(remainder) {
        caps["title"].to_string()
    } else if let Some(caps) = PAREN_TITLE.captures(remainder) {
        caps["title"].to_string()
    } else if remainder.starts_with(char::is_whitespace)
        || remainder.starts_with(char::is_alphabetic)
    {
        remainder.to_string()
    } else {
        return None;
    };

    let cleaned = QUALITY_NOISE.replace_all(&raw, "");
    let cleaned = cleaned
        .replace(['_', '.'], " ")
        .trim_matches([' ', '-', '_'])
        .to_string();
    (!cleaned.is_empty()).then_some(cleaned)
}

/// Extract an air date (`YYYY-MM-DD` / `YYYY.MM.DD`) and validate it is a
/// real calendar date.
pub fn extract_date(stem: &str) -> Option<NaiveDate> {
    let caps = DATE_PATTERN.captures(stem)?;
    let year: i32 = caps["year"].parse().ok()?;
    let month: u32 = caps["month"].parse().ok()?;
    let day: u32 = caps["day"].parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

/// Extract a release year, preferring parenthesized years and skipping
/// tokens that belong to dates or trail an episode marker.
pub fn extract_year(text: &str) -> Option<u16> {
    if let Some(caps) = PAREN_YEAR.captures(text) {
        let year: u16 = caps["year"].parse().ok()?;
        if (YEAR_MIN..=YEAR_MAX).contains(&year) && !is_date_component(text, caps.get(0)?.start()) {
            return Some(year);
        }
    }

    for caps in STANDALONE_YEAR.captures_iter(text) {
        let Some(m) = caps.name("year") else {
            continue;
        };
        if is_date_component(text, m.start()) || follows_episode_marker(text, m.start()) {
            continue;
        }
        if let Ok(year) = m.as_str().parse::<u16>()
            && (YEAR_MIN..=YEAR_MAX).contains(&year)
        {
            return Some(year);
        }
    }
    None
}

/// Whether the 4-digit token at `pos` is part of a `YYYY-MM-DD` date.
fn is_date_component(text: &str, pos: usize) -> bool {
    let start = pos.saturating_sub(2);
    let end = (pos + 15).min(text.len());
    // Clamp to char boundaries for non-ASCII titles.
    let start = (0..=start).rev().find(|i| text.is_char_boundary(*i)).unwrap_or(0);
    let end = (end..=text.len()).find(|i| text.is_char_boundary(*i)).unwrap_or(text.len());
    DATE_PATTERN.is_match(&text[start..end])
}

/// Whether the token at `pos` directly follows `SxxEyy-` or `NxM-`,
/// i.e. it is an episode id component rather than a year.
fn follows_episode_marker(text: &str, pos: usize) -> bool {
    static MARKER_TAIL: Lazy<Regex> = Lazy::new(|| {
        Regex::new(r"(?i)(?:s\d{1,2}e\d{1,4}|\d{1,2}x\d{1,4})[-_]$")
            .expect("marker tail regex should compile")
    });
    let start = pos.saturating_sub(10);
    let start = (0..=start).rev().find(|i| text.is_char_boundary(*i)).unwrap_or(0);
    MARKER_TAIL.is_match(&text[start..pos])
}

/// Extract a part number for multipart releases: digits, Roman numerals,
/// or spelled-out one..ten.
pub fn extract_part(stem: &str) -> Option<u8> {
    let caps = PART_PATTERN.captures(stem)?;
    let token = &caps["part"];
    if let Ok(n) = token.parse::<u8>() {
        return (n > 0).then_some(n);
    }
    let upper = token.to_ascii_uppercase();
    if upper.chars().all(|c| matches!(c, 'I' | 'V' | 'X')) {
        return roman_to_int(&upper);
    }
    match token.to_ascii_lowercase().as_str() {
        "one" => Some(1),
        "two" => Some(2),
        "three" => Some(3),
        "four" => Some(4),
        "five" => Some(5),
        "six" => Some(6),
        "seven" => Some(7),
        "eight" => Some(8),
        "nine" => Some(9),
        "ten" => Some(10),
        _ => None,
    }
}

fn roman_to_int(s: &str) -> Option<u8> {
    let value = |c: char| match c {
        'I' => Some(1i16),
        'V' => Some(5),
        'X' => Some(10),
        _ => None,
    };
    let mut total = 0i16;
    let mut prev = 0i16;
    for c in s.chars().rev() {
        let v = value(c)?;
        if v < prev {
            total -= v;
        } else {
            total += v;
        }
        prev = v;
    }
    (total > 0 && total <= u8::MAX as i16).then_some(total as u8)
}

/// Extract a season number from a folder name (`Season 01`, `S03`,
/// `Specials`), or `None` when the folder is not season-like.
pub fn extract_season_from_folder(folder_name: &str) -> Option<u16> {
    let lowered = folder_name.to_ascii_lowercase();
    if lowered == "specials" || lowered == "special" {
        return Some(0);
    }
    let caps = SEASON_FOLDER_PATTERN.captures(folder_name)?;
    caps.name("season")
        .or_else(|| caps.name("season2"))
        .and_then(|m| m.as_str().parse().ok())
}

/// The filename portion before the first episode or date marker; used to
/// derive show titles without swallowing episode titles.
pub fn title_before_marker(stem: &str) -> &str {
    for pattern in [&*EPISODE_SXXEYY, &*EPISODE_NXM, &*DATE_PATTERN] {
        if let Some(m) = pattern.find(stem) {
            return stem[..m.start()].trim_end_matches([' ', '-', '\u{2013}', '\u{2014}']);
        }
    }
    stem
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_sxxeyy() {
        let m = extract_episode_info("Show.S01E05.1080p").unwrap();
        assert_eq!(m.season, 1);
        assert_eq!(m.episodes, vec![5]);
    }

    #[test]
    fn parses_episode_range() {
        let m = extract_episode_info("Show.S01E01-E03").unwrap();
        assert_eq!(m.season, 1);
        assert_eq!(m.episodes, vec![1, 2, 3]);
    }

    #[test]
    fn parses_nxm_format() {
        let m = extract_episode_info("Show 2x07").unwrap();
        assert_eq!(m.season, 2);
        assert_eq!(m.episodes, vec![7]);

        let ranged = extract_episode_info("Show 1x01-02").unwrap();
        assert_eq!(ranged.episodes, vec![1, 2]);
    }

    #[test]
    fn resolution_is_not_an_episode() {
        // 1920x1080 has a 4-digit season-side token, so NxM must not bite.
        assert_eq!(extract_episode_info("Concert 1920x1080"), None);
    }

    #[test]
    fn extracts_episode_title_after_marker() {
        let m = extract_episode_info("Show - S01E01 - Pilot").unwrap();
        assert_eq!(m.title.as_deref(), Some("Pilot"));

        let noisy = extract_episode_info("Show.S02E03.The.Heist.720p.WEB-DL").unwrap();
        assert_eq!(noisy.title.as_deref(), Some("The Heist"));
    }

    #[test]
    fn parses_dates_and_rejects_impossible_ones() {
        assert_eq!(
            extract_date("Daily Show 2024-01-15"),
            NaiveDate::from_ymd_opt(2024, 1, 15)
        );
        assert_eq!(
            extract_date("Daily.Show.2024.01.15"),
            NaiveDate::from_ymd_opt(2024, 1, 15)
        );
        assert_eq!(extract_date("Show 2024-13-45"), None);
    }

    #[test]
    fn year_prefers_parenthesized() {
        assert_eq!(extract_year("The Matrix (1999)"), Some(1999));
        assert_eq!(extract_year("the.matrix.1999.1080p"), Some(1999));
    }

    #[test]
    fn year_skips_dates_and_episode_ids() {
        assert_eq!(extract_year("Show 2024-01-15"), None);
        assert_eq!(extract_year("Show.S05E06-1976.mkv"), None);
    }

    #[test]
    fn year_ignores_resolution_tokens() {
        assert_eq!(extract_year("Concert 1080p 2160p"), None);
    }

    #[test]
    fn parses_parts() {
        assert_eq!(extract_part("Movie Part 2"), Some(2));
        assert_eq!(extract_part("Movie pt3"), Some(3));
        assert_eq!(extract_part("Movie Part III"), Some(3));
        assert_eq!(extract_part("Movie Part Two"), Some(2));
        assert_eq!(extract_part("Captions included"), None);
    }

    #[test]
    fn parses_season_folders() {
        assert_eq!(extract_season_from_folder("Season 1"), Some(1));
        assert_eq!(extract_season_from_folder("Season 01"), Some(1));
        assert_eq!(extract_season_from_folder("S03"), Some(3));
        assert_eq!(extract_season_from_folder("Specials"), Some(0));
        assert_eq!(extract_season_from_folder("Random Folder"), None);
    }

    #[test]
    fn title_before_marker_strips_separators() {
        assert_eq!(title_before_marker("Breaking Bad - S01E01 - Pilot"), "Breaking Bad");
        assert_eq!(title_before_marker("Daily Show 2024-01-15"), "Daily Show");
        assert_eq!(title_before_marker("Just A Movie"), "Just A Movie");
    }
}
