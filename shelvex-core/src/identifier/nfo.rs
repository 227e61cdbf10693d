//! Tolerant NFO sidecar parsing.
//!
//! NFO files are Kodi/Jellyfin-style XML documents carrying curated
//! metadata next to the video. Parsing is best-effort: a malformed file
//! yields `None` and the caller records a unit warning; identification
//! then falls back to filename signals. Unknown elements are ignored here
//! at the parse boundary rather than carried through the model.

use std::path::Path;

use shelvex_model::{ExternalIds, MediaSignals, SignalSource};
use tracing::{debug, warn};

/// Fields recognized from an NFO document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NfoData {
    pub title: Option<String>,
    pub year: Option<u16>,
    pub season: Option<u16>,
    pub episode: Option<u16>,
    pub episode_title: Option<String>,
    pub ids: ExternalIds,
}

impl NfoData {
    pub fn is_empty(&self) -> bool {
        self == &NfoData::default()
    }

    /// Fold sidecar data into a signal set. Sidecar fields win over
    /// whatever was parsed from the filename.
    pub fn apply_to(&self, signals: &mut MediaSignals) {
        if let Some(title) = &self.title {
            signals.title = Some(title.clone());
            signals.title_source = Some(SignalSource::Sidecar);
        }
        if let Some(year) = self.year {
            signals.year = Some(year);
        }
        if let Some(season) = self.season {
            signals.season = Some(season);
        }
        if let Some(episode) = self.episode {
            signals.episodes = vec![episode];
        }
        if let Some(episode_title) = &self.episode_title {
            signals.episode_title = Some(episode_title.clone());
            signals.episode_title_source = Some(SignalSource::Sidecar);
        }
        signals.ids.merge_missing(&self.ids);
    }
}

/// Parse an NFO file from disk. Returns `None` on read or parse failure.
pub fn parse_nfo_file(path: &Path) -> Option<NfoData> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) => {
            warn!("failed to read NFO {}: {err}", path.display());
            return None;
        }
    };
    match parse_nfo(&content) {
        Some(data) => {
            debug!("parsed NFO {}", path.display());
            Some(data)
        }
        None => {
            warn!("malformed NFO {}", path.display());
            None
        }
    }
}

/// Parse NFO XML content.
pub fn parse_nfo(xml: &str) -> Option<NfoData> {
    // Some taggers append a plain-text URL after the XML document; keep
    // only the document itself so the parser does not trip over it.
    let xml = trim_trailing_junk(xml);
    let doc = roxmltree::Document::parse(xml).ok()?;
    let root = doc.root_element();

    // In an <episodedetails> document the <title> element names the
    // episode, not the work (Kodi convention).
    let episode_doc = root.tag_name().name() == "episodedetails";

    let mut data = NfoData::default();

    for node in root.children().filter(|n| n.is_element()) {
        let text = node.text().map(str::trim).filter(|t| !t.is_empty());
        match node.tag_name().name() {
            "title" if episode_doc => {
                if data.episode_title.is_none() {
                    data.episode_title = text.map(str::to_string);
                }
            }
            "title" => data.title = text.map(str::to_string),
            "showtitle" => {
                if data.title.is_none() {
                    data.title = text.map(str::to_string);
                }
            }
            "year" => data.year = text.and_then(|t| t.parse().ok()),
            "season" => data.season = text.and_then(|t| t.parse().ok()),
            "episode" => data.episode = text.and_then(|t| t.parse().ok()),
            "episodetitle" | "episode_title" => {
                data.episode_title = text.map(str::to_string);
            }
            _ => {}
        }
    }

    // Ids may appear anywhere: direct tags or Kodi <uniqueid type="...">.
    for node in root.descendants().filter(|n| n.is_element()) {
        let text = node.text().map(str::trim).filter(|t| !t.is_empty());
        match node.tag_name().name() {
            "imdbid" | "imdb_id" => {
                if data.ids.imdb.is_none() {
                    data.ids.imdb = text.map(normalize_imdb_id);
                }
            }
            "tmdbid" | "tmdb_id" => {
                if data.ids.tmdb.is_none() {
                    data.ids.tmdb = text.map(str::to_string);
                }
            }
            "tvdbid" | "tvdb_id" => {
                if data.ids.tvdb.is_none() {
                    data.ids.tvdb = text.map(str::to_string);
                }
            }
            "uniqueid" => {
                let Some(value) = text else { continue };
                match node.attribute("type").unwrap_or_default().to_ascii_lowercase().as_str() {
                    "imdb" if data.ids.imdb.is_none() => {
                        data.ids.imdb = Some(normalize_imdb_id(value));
                    }
                    "tmdb" if data.ids.tmdb.is_none() => {
                        data.ids.tmdb = Some(value.to_string());
                    }
                    "tvdb" if data.ids.tvdb.is_none() => {
                        data.ids.tvdb = Some(value.to_string());
                    }
                    _ => {}
                }
            }
            _ => {}
        }
    }

    Some(data)
}

fn trim_trailing_junk(xml: &str) -> &str {
    let trimmed = xml.trim_start();
    match trimmed.rfind('>') {
        Some(pos) => &trimmed[..=pos],
        None => trimmed,
    }
}

/// Normalize an IMDB id to the `tt1234567` form, accepting bare numbers
/// and full imdb.com URLs.
pub fn normalize_imdb_id(raw: &str) -> String {
    let mut id = raw.trim().to_string();
    if id.contains("imdb.com") {
        if let Some(part) = id.split('/').find(|part| part.starts_with("tt")) {
            id = part.to_string();
        }
    }
    if !id.starts_with("tt") {
        id = format!("tt{id}");
    }
    id
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_movie_nfo() {
        let xml = r#"<?xml version="1.0"?>
            <movie>
              <title>The Matrix</title>
              <year>1999</year>
              <imdbid>0133093</imdbid>
              <tmdbid>603</tmdbid>
            </movie>"#;
        let data = parse_nfo(xml).unwrap();
        assert_eq!(data.title.as_deref(), Some("The Matrix"));
        assert_eq!(data.year, Some(1999));
        assert_eq!(data.ids.imdb.as_deref(), Some("tt0133093"));
        assert_eq!(data.ids.tmdb.as_deref(), Some("603"));
    }

    #[test]
    fn parses_episode_nfo_with_uniqueid() {
        let xml = r#"<episodedetails>
              <title>Pilot</title>
              <season>1</season>
              <episode>1</episode>
              <uniqueid type="tvdb">349232</uniqueid>
              <uniqueid type="imdb">tt0959621</uniqueid>
            </episodedetails>"#;
        let data = parse_nfo(xml).unwrap();
        assert_eq!(data.season, Some(1));
        assert_eq!(data.episode, Some(1));
        // <title> inside <episodedetails> names the episode.
        assert_eq!(data.episode_title.as_deref(), Some("Pilot"));
        assert_eq!(data.title, None);
        assert_eq!(data.ids.tvdb.as_deref(), Some("349232"));
        assert_eq!(data.ids.imdb.as_deref(), Some("tt0959621"));
    }

    #[test]
    fn show_title_comes_from_showtitle_in_episode_docs() {
        let xml = r#"<episodedetails>
              <title>Pilot</title>
              <showtitle>Breaking Bad</showtitle>
              <season>1</season>
              <episode>1</episode>
            </episodedetails>"#;
        let data = parse_nfo(xml).unwrap();
        assert_eq!(data.title.as_deref(), Some("Breaking Bad"));
        assert_eq!(data.episode_title.as_deref(), Some("Pilot"));
    }

    #[test]
    fn malformed_xml_is_none() {
        assert_eq!(parse_nfo("<movie><title>Broken"), None);
        assert_eq!(parse_nfo("not xml at all"), None);
    }

    #[test]
    fn tolerates_trailing_url_junk() {
        let xml = "<movie><title>Heat</title></movie>\nhttps://www.imdb.com/title/tt0113277/";
        let data = parse_nfo(xml).unwrap();
        assert_eq!(data.title.as_deref(), Some("Heat"));
    }

    #[test]
    fn normalizes_imdb_ids() {
        assert_eq!(normalize_imdb_id("0133093"), "tt0133093");
        assert_eq!(normalize_imdb_id("tt0133093"), "tt0133093");
        assert_eq!(
            normalize_imdb_id("https://www.imdb.com/title/tt0133093/"),
            "tt0133093"
        );
    }

    #[test]
    fn sidecar_fields_override_filename_signals() {
        let mut signals = MediaSignals {
            title: Some("the matrix reloaded".into()),
            title_source: Some(SignalSource::Filename),
            ..MediaSignals::default()
        };
        let data = NfoData {
            title: Some("The Matrix".into()),
            year: Some(1999),
            ..NfoData::default()
        };
        data.apply_to(&mut signals);
        assert_eq!(signals.title.as_deref(), Some("The Matrix"));
        assert_eq!(signals.title_source, Some(SignalSource::Sidecar));
        assert_eq!(signals.year, Some(1999));
    }
}
