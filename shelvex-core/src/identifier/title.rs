//! Title cleaning: strip release noise from filename-derived titles.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

/// Vocabulary used when cleaning titles. Injected rather than global so
/// tests (and exotic libraries) can substitute their own lists.
#[derive(Debug, Clone)]
pub struct TitleRules {
    /// Lowercased tokens dropped wherever they appear: rip sources,
    /// codecs, edition markers, release group names.
    pub release_tags: HashSet<String>,
    /// Lowercased words kept lowercase when title-casing (except at the
    /// start of the title).
    pub lowercase_words: HashSet<String>,
}

const DEFAULT_RELEASE_TAGS: &[&str] = &[
    // Sources (compounds like WEB-DL arrive as separate tokens after
    // separator conversion, so both halves are listed)
    "webrip", "webdl", "web", "dl", "tvrip", "bluray", "bdrip",
    "dvdrip", "hdrip", "hdtv", "uhd", "4k", "amzn", "nf", "hulu", "dv", "hdr", "remux",
    // Codecs / containers
    "x264", "x265", "h264", "h265", "hevc", "avc", "xvid", "divx",
    "mp4", "mkv", "10bit", "8bit",
    // Audio
    "aac", "ac3", "ddp", "dts", "truehd", "atmos", "flac", "opus",
    // Release flags / editions
    "proper", "repack", "internal", "unrated", "remastered", "extended", "edition",
    "directors", "cut", "dubbed", "subbed", "multi", "complete",
    // Format
    "3d", "imax", "hc",
    // Known release groups
    "group", "rarbg", "yify", "yts", "ettv", "eztv", "ntb", "kogi", "avs", "ggez",
    "bae", "rbb", "ion10", "memento", "killers", "rovers", "sparks", "flux",
    "successfulcrab",
];

const DEFAULT_LOWERCASE_WORDS: &[&str] = &[
    "a", "an", "and", "as", "at", "but", "by", "for", "if", "in", "nor", "of", "on",
    "or", "so", "the", "to", "up", "yet",
];

impl Default for TitleRules {
    fn default() -> Self {
        Self {
            release_tags: DEFAULT_RELEASE_TAGS.iter().map(|t| t.to_string()).collect(),
            lowercase_words: DEFAULT_LOWERCASE_WORDS.iter().map(|t| t.to_string()).collect(),
        }
    }
}

static BRACKET_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[[^\]]*\]").expect("bracket tag regex should compile"));
static PAREN_GROUP: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\(([^)]*)\)").expect("paren group regex should compile"));
static SEASON_TOKENS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bseasons?[. ]*\d{1,2}(?:[. ]*(?:to|-)[. ]*\d{1,2})?\b|\bs\d{1,2}\b")
        .expect("season tokens regex should compile")
});
static STRAY_EPISODE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\be\d{1,4}\b").expect("stray episode regex should compile"));
static QUALITY_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\d{3,4}[pi]$").expect("quality token regex should compile"));
// Numbered audio/codec tags are removed before separator conversion so
// their digits never survive as stray tokens (DDP5.1 -> "ddp5 1").
static AUDIO_TAG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:aac|dd|ddp|ac3|dts|truehd|atmos)[.\s]?\d(?:[.\s]?[01])?\b")
        .expect("audio tag regex should compile")
});
static DOTTED_CODEC: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b[hx][.\s]?26[45]\b").expect("dotted codec regex should compile")
});

/// Clean a raw filename- or folder-derived title.
///
/// Markers already consumed by other matchers (episode ids, dates, part
/// numbers, the extracted year) are removed, release vocabulary is
/// dropped, separators collapse to spaces, and the rest is title-cased.
/// Parenthesized content other than the year survives (country markers,
/// alternate titles).
pub fn clean_title(raw: &str, extracted_year: Option<u16>, rules: &TitleRules) -> String {
    use super::patterns;

    let mut text = BRACKET_TAG.replace_all(raw, " ").into_owned();

    // Keep non-year parentheticals aside so separator conversion does not
    // shred them; years in parens are dropped with the other year tokens.
    let mut preserved: Vec<String> = Vec::new();
    text = PAREN_GROUP
        .replace_all(&text, |caps: &regex::Captures<'_>| {
            let inner = caps[1].trim().to_string();
            if inner.is_empty() || inner.chars().all(|c| c.is_ascii_digit()) {
                String::from(" ")
            } else {
                preserved.push(inner);
                String::from(" ")
            }
        })
        .into_owned();

    // Strip markers other matchers own.
    text = text[..patterns::title_before_marker(&text).len()].to_string();
    text = SEASON_TOKENS.replace_all(&text, " ").into_owned();
    text = STRAY_EPISODE.replace_all(&text, " ").into_owned();
    text = AUDIO_TAG.replace_all(&text, " ").into_owned();
    text = DOTTED_CODEC.replace_all(&text, " ").into_owned();

    // Separators to spaces, then token-level filtering.
    let text = text.replace(['.', '_', '-', '\u{2013}', '\u{2014}'], " ");
    let mut kept: Vec<&str> = Vec::new();
    let tokens: Vec<&str> = text.split_whitespace().collect();
    for (idx, token) in tokens.iter().enumerate() {
        let lowered = token.to_lowercase();
        if rules.release_tags.contains(lowered.trim_matches(',')) {
            continue;
        }
        if QUALITY_TOKEN.is_match(token) {
            continue;
        }
        if is_part_marker(&tokens, idx) {
            continue;
        }
        if let Ok(year) = token.parse::<u16>() {
            let matches_extracted = extracted_year == Some(year);
            let is_loose_year = extracted_year.is_none() && (1895..=2100).contains(&year) && idx > 0;
            // Never drop the year when it is all the title we have.
            if (matches_extracted || is_loose_year) && tokens.len() > 1 {
                continue;
            }
        }
        kept.push(token);
    }

    let mut title = title_case(&kept.join(" "), rules);
    for paren in preserved {
        title.push_str(&format!(" ({paren})"));
    }
    title.trim().to_string()
}

/// Whether the token at `idx` is part of a `Part N` marker (either the
/// word or the number following it).
fn is_part_marker(tokens: &[&str], idx: usize) -> bool {
    let is_part_word = |t: &str| {
        let l = t.to_lowercase();
        l == "part" || l == "pt"
    };
    let is_part_number = |t: &str| {
        t.parse::<u8>().is_ok()
            || t.chars().all(|c| matches!(c, 'I' | 'V' | 'X'))
            || matches!(
                t.to_lowercase().as_str(),
                "one" | "two" | "three" | "four" | "five" | "six" | "seven" | "eight" | "nine"
                    | "ten"
            )
    };
    if is_part_word(tokens[idx]) {
        return tokens.get(idx + 1).is_some_and(|next| is_part_number(next));
    }
    idx > 0 && is_part_word(tokens[idx - 1]) && is_part_number(tokens[idx])
}

/// Title-case a string, keeping articles and short prepositions lowercase
/// except at the start.
pub fn title_case(text: &str, rules: &TitleRules) -> String {
    let mut result: Vec<String> = Vec::new();
    for (idx, word) in text.split_whitespace().enumerate() {
        let lowered = word.to_lowercase();
        if idx > 0 && rules.lowercase_words.contains(&lowered) {
            result.push(lowered);
        } else if word.chars().next().is_some_and(|c| c.is_lowercase()) {
            let mut chars = word.chars();
            let first = chars.next().map(|c| c.to_uppercase().to_string()).unwrap_or_default();
            result.push(format!("{first}{}", chars.as_str()));
        } else {
            result.push(word.to_string());
        }
    }
    result.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clean(raw: &str, year: Option<u16>) -> String {
        clean_title(raw, year, &TitleRules::default())
    }

    #[test]
    fn cleans_release_noise() {
        assert_eq!(clean("the.matrix.1999.1080p.BluRay.x264-GROUP", Some(1999)), "The Matrix");
    }

    #[test]
    fn removes_numbered_audio_tags() {
        assert_eq!(clean("Dune.2021.DDP5.1.H.264", Some(2021)), "Dune");
    }

    #[test]
    fn number_titles_survive_audio_cleanup() {
        assert_eq!(clean("Area.51.2015", Some(2015)), "Area 51");
    }

    #[test]
    fn cleans_scene_style_movie_name() {
        assert_eq!(clean("Inception.2010.720p.BluRay.x264.YIFY", Some(2010)), "Inception");
    }

    #[test]
    fn keeps_year_when_it_is_the_title() {
        assert_eq!(clean("2012", None), "2012");
    }

    #[test]
    fn keeps_leading_number_titles() {
        assert_eq!(clean("1917.2019.2160p", Some(2019)), "1917");
    }

    #[test]
    fn strips_episode_markers() {
        assert_eq!(clean("Breaking.Bad.S01E01.Pilot", None), "Breaking Bad");
    }

    #[test]
    fn preserves_country_parentheticals() {
        assert_eq!(clean("The Office (US) S01E01", None), "The Office (US)");
    }

    #[test]
    fn drops_part_markers() {
        assert_eq!(clean("Harry Potter Part 2", None), "Harry Potter");
        assert_eq!(clean("It Part Two", None), "It");
    }

    #[test]
    fn title_cases_lowercase_words() {
        let rules = TitleRules::default();
        assert_eq!(title_case("the lord of the rings", &rules), "The Lord of the Rings");
    }

    #[test]
    fn injected_vocabulary_is_respected() {
        let mut rules = TitleRules::default();
        rules.release_tags.insert("customtag".into());
        assert_eq!(clean_title("My Movie CUSTOMTAG", None, &rules), "My Movie");
    }
}
