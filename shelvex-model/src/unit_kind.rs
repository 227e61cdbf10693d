use std::fmt::Display;
use std::fmt::Formatter;

/// Classification of a media unit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum UnitKind {
    /// A single feature film (one primary video, possibly multipart)
    Movie,
    /// A television show: episodes, season folders, or date-based releases
    Show,
    /// Could not be classified; excluded from default planning
    #[default]
    Unknown,
}

impl Display for UnitKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            UnitKind::Movie => write!(f, "Movie"),
            UnitKind::Show => write!(f, "Show"),
            UnitKind::Unknown => write!(f, "Unknown"),
        }
    }
}

impl UnitKind {
    /// Whether this unit participates in default planning.
    pub fn is_plannable(&self) -> bool {
        !matches!(self, UnitKind::Unknown)
    }
}
