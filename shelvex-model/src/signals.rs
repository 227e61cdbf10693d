use chrono::NaiveDate;

/// Where a signal value was extracted from. Sidecar beats filename; an
/// accepted provider match beats both for canonical naming.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalSource {
    Filename,
    Folder,
    Sidecar,
    Provider,
}

/// External catalog identifiers, normalized (IMDB ids carry the `tt` prefix).
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ExternalIds {
    pub imdb: Option<String>,
    pub tmdb: Option<String>,
    pub tvdb: Option<String>,
}

impl ExternalIds {
    pub fn is_empty(&self) -> bool {
        self.imdb.is_none() && self.tmdb.is_none() && self.tvdb.is_none()
    }

    /// Merge ids from `other` without overwriting ones already present.
    pub fn merge_missing(&mut self, other: &ExternalIds) {
        if self.imdb.is_none() {
            self.imdb = other.imdb.clone();
        }
        if self.tmdb.is_none() {
            self.tmdb = other.tmdb.clone();
        }
        if self.tvdb.is_none() {
            self.tvdb = other.tvdb.clone();
        }
    }
}

/// Corroboration obtained from an online metadata provider. Recorded as
/// booleans so scoring stays a pure function of the signal set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ProviderCorroboration {
    /// The provider confirmed an id we already had from a sidecar.
    pub id_match: bool,
    /// The provider's best match agreed on title and year.
    pub title_year_match: bool,
}

/// Signals extracted for one file or one unit. Every field is explicit;
/// unrecognized sidecar fields are dropped at the parse boundary rather
/// than carried in an open map.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct MediaSignals {
    pub title: Option<String>,
    pub title_source: Option<SignalSource>,
    pub year: Option<u16>,
    pub season: Option<u16>,
    /// Episode numbers covered by the file; more than one for ranges
    /// like `S01E01-E02`.
    pub episodes: Vec<u16>,
    /// Part number for multipart releases of the same movie or episode.
    pub part: Option<u8>,
    /// Air date for daily shows (`YYYY-MM-DD` releases).
    pub date: Option<NaiveDate>,
    pub episode_title: Option<String>,
    pub episode_title_source: Option<SignalSource>,
    pub ids: ExternalIds,
    pub provider: Option<ProviderCorroboration>,
}

impl MediaSignals {
    pub fn has_episode_info(&self) -> bool {
        (self.season.is_some() && !self.episodes.is_empty()) || self.date.is_some()
    }

    /// Fill unset fields from `other`, keeping existing values. Used to
    /// layer unit-level sidecar data under per-file filename signals.
    pub fn merge_missing(&mut self, other: &MediaSignals) {
        if self.title.is_none() {
            self.title = other.title.clone();
            self.title_source = other.title_source;
        }
        if self.year.is_none() {
            self.year = other.year;
        }
        if self.season.is_none() {
            self.season = other.season;
        }
        if self.episodes.is_empty() {
            self.episodes = other.episodes.clone();
        }
        if self.part.is_none() {
            self.part = other.part;
        }
        if self.date.is_none() {
            self.date = other.date;
        }
        if self.episode_title.is_none() {
            self.episode_title = other.episode_title.clone();
            self.episode_title_source = other.episode_title_source;
        }
        self.ids.merge_missing(&other.ids);
        if self.provider.is_none() {
            self.provider = other.provider;
        }
    }
}
