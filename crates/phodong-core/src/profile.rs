//! Child profile: who the story is for and what kind of story it should be.
//! Fixed once the wizard leaves the config step.

/// Ages the language guides are written for.
pub const SUPPORTED_AGES: [u8; 4] = [5, 6, 7, 8];

/// Preselected age on the config screen; also the fallback language band.
pub const DEFAULT_AGE: u8 = 7;

/// Companion name used when the field is left blank.
pub const DEFAULT_COMPANION: &str = "friend";

/// Story genre. The first entry is the default selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Genre {
    #[default]
    Fantasy,
    Folktale,
    Everyday,
    Adventure,
    SciFi,
    Nature,
    Friendship,
    Family,
}

impl Genre {
    pub const ALL: [Genre; 8] = [
        Genre::Fantasy,
        Genre::Folktale,
        Genre::Everyday,
        Genre::Adventure,
        Genre::SciFi,
        Genre::Nature,
        Genre::Friendship,
        Genre::Family,
    ];

    /// Display label (also used inside prompts).
    pub fn label(self) -> &'static str {
        match self {
            Genre::Fantasy => "Fantasy",
            Genre::Folktale => "Folktale",
            Genre::Everyday => "Everyday",
            Genre::Adventure => "Adventure",
            Genre::SciFi => "Sci-Fi",
            Genre::Nature => "Nature",
            Genre::Friendship => "Friendship",
            Genre::Family => "Family",
        }
    }

    /// Form value for the genre buttons.
    pub fn slug(self) -> &'static str {
        match self {
            Genre::Fantasy => "fantasy",
            Genre::Folktale => "folktale",
            Genre::Everyday => "everyday",
            Genre::Adventure => "adventure",
            Genre::SciFi => "sci_fi",
            Genre::Nature => "nature",
            Genre::Friendship => "friendship",
            Genre::Family => "family",
        }
    }

    pub fn from_slug(s: &str) -> Option<Self> {
        let s = s.trim();
        Self::ALL.into_iter().find(|g| g.slug().eq_ignore_ascii_case(s))
    }
}

/// What the story should teach. The first entry is the default selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Purpose {
    #[default]
    Confidence,
    Safety,
    EmotionRegulation,
    Cooperation,
    Creativity,
    Kindness,
    Challenge,
    Curiosity,
}

impl Purpose {
    pub const ALL: [Purpose; 8] = [
        Purpose::Confidence,
        Purpose::Safety,
        Purpose::EmotionRegulation,
        Purpose::Cooperation,
        Purpose::Creativity,
        Purpose::Kindness,
        Purpose::Challenge,
        Purpose::Curiosity,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Purpose::Confidence => "Confidence",
            Purpose::Safety => "Safety",
            Purpose::EmotionRegulation => "Emotion regulation",
            Purpose::Cooperation => "Cooperation",
            Purpose::Creativity => "Creativity",
            Purpose::Kindness => "Kindness",
            Purpose::Challenge => "Challenge",
            Purpose::Curiosity => "Curiosity",
        }
    }

    pub fn slug(self) -> &'static str {
        match self {
            Purpose::Confidence => "confidence",
            Purpose::Safety => "safety",
            Purpose::EmotionRegulation => "emotion_regulation",
            Purpose::Cooperation => "cooperation",
            Purpose::Creativity => "creativity",
            Purpose::Kindness => "kindness",
            Purpose::Challenge => "challenge",
            Purpose::Curiosity => "curiosity",
        }
    }

    pub fn from_slug(s: &str) -> Option<Self> {
        let s = s.trim();
        Self::ALL.into_iter().find(|p| p.slug().eq_ignore_ascii_case(s))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProfileError {
    #[error("child name must not be empty")]
    EmptyChildName,
    #[error("unsupported age: {0}")]
    UnsupportedAge(u8),
}

/// A validated child profile. Construct with [`Profile::new`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    child_name: String,
    companion_name: String,
    age: u8,
    genre: Genre,
    purpose: Purpose,
}

impl Profile {
    /// Names are trimmed; a blank companion becomes [`DEFAULT_COMPANION`].
    pub fn new(
        child_name: &str,
        companion_name: &str,
        age: u8,
        genre: Genre,
        purpose: Purpose,
    ) -> Result<Self, ProfileError> {
        let child_name = child_name.trim();
        if child_name.is_empty() {
            return Err(ProfileError::EmptyChildName);
        }
        if !SUPPORTED_AGES.contains(&age) {
            return Err(ProfileError::UnsupportedAge(age));
        }
        let companion_name = match companion_name.trim() {
            "" => DEFAULT_COMPANION,
            name => name,
        };
        Ok(Self {
            child_name: child_name.to_string(),
            companion_name: companion_name.to_string(),
            age,
            genre,
            purpose,
        })
    }

    pub fn child_name(&self) -> &str {
        &self.child_name
    }

    pub fn companion_name(&self) -> &str {
        &self.companion_name
    }

    pub fn age(&self) -> u8 {
        self.age
    }

    pub fn genre(&self) -> Genre {
        self.genre
    }

    pub fn purpose(&self) -> Purpose {
        self.purpose
    }
}
