//! Per-session state for one child's run through the wizard.
//!
//! Fields are only mutated through [`crate::wizard::Wizard`]; everything here is read-only
//! from the outside so the scene/seen-type invariants cannot be broken by a handler.

use crate::photo::Photo;
use crate::profile::{Genre, Profile, Purpose, DEFAULT_AGE};

/// Wizard step. Only moves forward, except for restart/reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Step {
    #[default]
    Config,
    Camera,
    Story,
}

/// How a step is drawn in the progress bar relative to the current step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepMark {
    Done,
    Active,
    Pending,
}

impl Step {
    pub const ALL: [Step; 3] = [Step::Config, Step::Camera, Step::Story];

    pub fn label(self) -> &'static str {
        match self {
            Step::Config => "Setup",
            Step::Camera => "Photos",
            Step::Story => "Story",
        }
    }

    fn index(self) -> usize {
        match self {
            Step::Config => 0,
            Step::Camera => 1,
            Step::Story => 2,
        }
    }

    /// Every step paired with its mark as seen from `self`.
    pub fn marks(self) -> [(Step, StepMark); 3] {
        Self::ALL.map(|step| {
            let mark = match step.index().cmp(&self.index()) {
                std::cmp::Ordering::Less => StepMark::Done,
                std::cmp::Ordering::Equal => StepMark::Active,
                std::cmp::Ordering::Greater => StepMark::Pending,
            };
            (step, mark)
        })
    }
}

/// One-shot banner shown on the next render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Warning(String),
    Error(String),
}

/// Values typed into the config form so far.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigDraft {
    pub child_name: String,
    pub companion_name: String,
    pub age: u8,
}

impl Default for ConfigDraft {
    fn default() -> Self {
        Self {
            child_name: String::new(),
            companion_name: String::new(),
            age: DEFAULT_AGE,
        }
    }
}

/// A recognised object turned into a story character.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SceneCard {
    pub character_name: String,
    /// Label of the original object; doubles as the duplicate-suppression key.
    pub character_type: String,
    pub personality: String,
    pub magic_power: String,
    pub dialogue: String,
    pub story_narration: String,
    pub photo: Photo,
}

#[derive(Debug, Clone, Default)]
pub struct Session {
    pub(crate) step: Step,
    pub(crate) profile: Option<Profile>,
    pub(crate) cards: Vec<SceneCard>,
    pub(crate) seen_types: Vec<String>,
    pub(crate) story_text: Option<String>,
    pub(crate) in_flight: bool,
    pub(crate) selected_genre: Genre,
    pub(crate) selected_purpose: Purpose,
    pub(crate) draft: ConfigDraft,
    pub(crate) notice: Option<Notice>,
    /// Bumped on every start/restart/reset so late model replies from an abandoned run are dropped.
    pub(crate) run: u64,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn step(&self) -> Step {
        self.step
    }

    pub fn profile(&self) -> Option<&Profile> {
        self.profile.as_ref()
    }

    pub fn cards(&self) -> &[SceneCard] {
        &self.cards
    }

    pub fn seen_types(&self) -> &[String] {
        &self.seen_types
    }

    pub fn story_text(&self) -> Option<&str> {
        self.story_text.as_deref()
    }

    pub fn in_flight(&self) -> bool {
        self.in_flight
    }

    pub fn selected_genre(&self) -> Genre {
        self.selected_genre
    }

    pub fn selected_purpose(&self) -> Purpose {
        self.selected_purpose
    }

    pub fn draft(&self) -> &ConfigDraft {
        &self.draft
    }

    pub fn notice(&self) -> Option<&Notice> {
        self.notice.as_ref()
    }

    pub(crate) fn push_card(&mut self, card: SceneCard) {
        self.seen_types.push(card.character_type.clone());
        self.cards.push(card);
    }
}
