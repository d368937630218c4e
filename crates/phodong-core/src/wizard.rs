//! Wizard controller: the config → camera → story flow as explicit transitions over a [`Session`].
//!
//! Model calls happen outside the session. A handler asks for a request snapshot
//! (`begin_recognition` / `begin_story`), runs the model without holding the session, then hands
//! the outcome back (`finish_recognition` / `complete_story`). The in-flight flag set in between
//! keeps a duplicate submit from issuing a second call.

use crate::gemini_bridge::ModelError;
use crate::profile::{Genre, Profile, ProfileError, Purpose, DEFAULT_AGE, SUPPORTED_AGES};
use crate::session::{ConfigDraft, Notice, SceneCard, Session, Step, StepMark};
use crate::storybook::{download_contents, download_file_name, split_story, StoryParts};

pub const DEFAULT_MAX_SCENES: usize = 4;

pub const NAME_REQUIRED: &str = "Please enter the hero's name.";
pub const RETRY_PHOTO: &str = "We couldn't recognise an object. Please take the photo again!";
pub const MISSING_CREDENTIAL: &str =
    "The API key is not configured. Set GOOGLE_API_KEY in the secrets file or the environment.";

/// Snapshot handed to the recognition call.
#[derive(Debug, Clone)]
pub struct RecognitionRequest {
    pub profile: Profile,
    pub seen_types: Vec<String>,
    run: u64,
}

/// Snapshot handed to the story call.
#[derive(Debug, Clone)]
pub struct StoryRequest {
    pub profile: Profile,
    pub cards: Vec<SceneCard>,
    run: u64,
}

/// Everything the renderer needs for one screen.
#[derive(Debug)]
pub struct Page<'a> {
    pub step: Step,
    pub marks: [(Step, StepMark); 3],
    pub notice: Option<Notice>,
    pub view: View<'a>,
}

#[derive(Debug)]
pub enum View<'a> {
    Config(ConfigView<'a>),
    Camera(CameraView<'a>),
    Story(StoryView<'a>),
}

#[derive(Debug)]
pub struct ConfigView<'a> {
    pub draft: &'a ConfigDraft,
    pub ages: &'static [u8],
    pub selected_genre: Genre,
    pub selected_purpose: Purpose,
}

#[derive(Debug)]
pub struct CameraView<'a> {
    pub profile: &'a Profile,
    pub cards: &'a [SceneCard],
    pub max_scenes: usize,
    pub in_flight: bool,
}

#[derive(Debug)]
pub struct StoryView<'a> {
    pub profile: &'a Profile,
    pub story: StoryParts,
    pub cards: &'a [SceneCard],
}

#[derive(Debug, Clone, Copy)]
pub struct Wizard {
    max_scenes: usize,
}

impl Default for Wizard {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_SCENES)
    }
}

impl Wizard {
    /// `max_scenes` is clamped to at least one.
    pub fn new(max_scenes: usize) -> Self {
        Self {
            max_scenes: max_scenes.max(1),
        }
    }

    pub fn max_scenes(&self) -> usize {
        self.max_scenes
    }

    /// Keep what was typed into the config form. Unsupported ages fall back to the default.
    pub fn update_draft(&self, session: &mut Session, mut draft: ConfigDraft) {
        if session.step != Step::Config {
            return;
        }
        if !SUPPORTED_AGES.contains(&draft.age) {
            draft.age = DEFAULT_AGE;
        }
        session.draft = draft;
    }

    pub fn select_genre(&self, session: &mut Session, genre: Genre) {
        if session.step == Step::Config {
            session.selected_genre = genre;
        }
    }

    pub fn select_purpose(&self, session: &mut Session, purpose: Purpose) {
        if session.step == Step::Config {
            session.selected_purpose = purpose;
        }
    }

    /// config → camera. Fixes the profile from the draft and current selections.
    /// An empty child name leaves the session on the config step with a warning.
    pub fn start(&self, session: &mut Session) -> Result<(), ProfileError> {
        if session.step != Step::Config {
            return Ok(());
        }
        let draft = &session.draft;
        let profile = match Profile::new(
            &draft.child_name,
            &draft.companion_name,
            draft.age,
            session.selected_genre,
            session.selected_purpose,
        ) {
            Ok(profile) => profile,
            Err(e) => {
                session.notice = Some(Notice::Warning(NAME_REQUIRED.to_string()));
                return Err(e);
            }
        };

        tracing::info!(child = %profile.child_name(), age = profile.age(), "Wizard started");
        session.profile = Some(profile);
        session.cards.clear();
        session.seen_types.clear();
        session.story_text = None;
        session.in_flight = false;
        session.run += 1;
        session.step = Step::Camera;
        Ok(())
    }

    /// Claim the session for one recognition call. `None` when not on the camera step, when a
    /// call is already in flight, or when the scene list is already full.
    pub fn begin_recognition(&self, session: &mut Session) -> Option<RecognitionRequest> {
        if session.step != Step::Camera || session.in_flight {
            return None;
        }
        if session.cards.len() >= self.max_scenes {
            return None;
        }
        let profile = session.profile.clone()?;
        session.in_flight = true;
        Some(RecognitionRequest {
            profile,
            seen_types: session.seen_types.clone(),
            run: session.run,
        })
    }

    /// Apply a recognition outcome and release the in-flight flag. Outcomes from an abandoned
    /// run are dropped.
    pub fn finish_recognition(
        &self,
        session: &mut Session,
        request: &RecognitionRequest,
        outcome: Result<Option<SceneCard>, ModelError>,
    ) {
        if request.run != session.run || session.step != Step::Camera {
            tracing::info!("Discarding recognition result from an abandoned run");
            return;
        }
        session.in_flight = false;
        match outcome {
            Ok(Some(card)) if session.cards.len() < self.max_scenes => {
                session.push_card(card);
                tracing::info!(scenes = session.cards.len(), max = self.max_scenes, "Scene added");
            }
            Ok(Some(_)) => {}
            Ok(None) => session.notice = Some(Notice::Warning(RETRY_PHOTO.to_string())),
            Err(ModelError::MissingCredential) => {
                session.notice = Some(Notice::Error(MISSING_CREDENTIAL.to_string()))
            }
            Err(e) => {
                tracing::warn!("Recognition failed: {}", e);
                session.notice = Some(Notice::Warning(RETRY_PHOTO.to_string()));
            }
        }
    }

    /// True once the scene list is full and the story has not been written yet.
    pub fn story_due(&self, session: &Session) -> bool {
        session.step == Step::Camera
            && session.cards.len() >= self.max_scenes
            && session.story_text.is_none()
    }

    /// Claim the session for the single story call of this run.
    pub fn begin_story(&self, session: &mut Session) -> Option<StoryRequest> {
        if !self.story_due(session) || session.in_flight {
            return None;
        }
        let profile = session.profile.clone()?;
        session.in_flight = true;
        Some(StoryRequest {
            profile,
            cards: session.cards.clone(),
            run: session.run,
        })
    }

    /// camera → story with the composed text.
    pub fn complete_story(&self, session: &mut Session, request: &StoryRequest, text: String) {
        if request.run != session.run || session.step != Step::Camera {
            tracing::info!("Discarding story from an abandoned run");
            return;
        }
        session.in_flight = false;
        session.story_text = Some(text);
        session.step = Step::Story;
        tracing::info!("Story ready");
    }

    /// camera → config. Drops the profile and every scene; genre/purpose selection is kept.
    pub fn restart(&self, session: &mut Session) {
        if session.step != Step::Camera {
            return;
        }
        session.profile = None;
        session.cards.clear();
        session.seen_types.clear();
        session.story_text = None;
        session.in_flight = false;
        session.run += 1;
        session.step = Step::Config;
    }

    /// story → config. Every field back to its default.
    pub fn reset(&self, session: &mut Session) {
        if session.step != Step::Story {
            return;
        }
        let run = session.run + 1;
        *session = Session {
            run,
            ..Session::default()
        };
    }

    /// Download file name and contents once the story exists.
    pub fn download(&self, session: &Session) -> Option<(String, String)> {
        if session.step != Step::Story {
            return None;
        }
        let profile = session.profile.as_ref()?;
        let text = session.story_text.as_deref()?;
        let parts = split_story(text);
        Some((
            download_file_name(profile.child_name()),
            download_contents(&parts),
        ))
    }

    /// View descriptor for the current step. Consumes the pending notice.
    pub fn view<'a>(&self, session: &'a mut Session) -> Page<'a> {
        let notice = session.notice.take();
        let session: &'a Session = session;
        let view = match (session.step, session.profile.as_ref()) {
            (Step::Camera, Some(profile)) => View::Camera(CameraView {
                profile,
                cards: &session.cards,
                max_scenes: self.max_scenes,
                in_flight: session.in_flight,
            }),
            (Step::Story, Some(profile)) => View::Story(StoryView {
                profile,
                story: split_story(session.story_text.as_deref().unwrap_or_default()),
                cards: &session.cards,
            }),
            _ => View::Config(ConfigView {
                draft: &session.draft,
                ages: &SUPPORTED_AGES,
                selected_genre: session.selected_genre,
                selected_purpose: session.selected_purpose,
            }),
        };
        Page {
            step: session.step,
            marks: session.step.marks(),
            notice,
            view,
        }
    }
}
