//! PHODONG core library.
//! Profile, scene cards and per-session state for the photo-to-storybook wizard,
//! plus the prompt templates and the Gemini bridge that turn photos into characters.

pub mod gemini_bridge;
pub mod photo;
pub mod profile;
pub mod prompts;
pub mod session;
pub mod storybook;
pub mod wizard;

pub use gemini_bridge::{
    compose_story, parse_character_reply, recognize_object, strip_code_fence, CharacterReply,
    GeminiClient, ModelError, VisionModel, DEFAULT_API_BASE, DEFAULT_MODEL,
};
pub use photo::{Photo, PhotoError};
pub use profile::{
    Genre, Profile, ProfileError, Purpose, DEFAULT_AGE, DEFAULT_COMPANION, SUPPORTED_AGES,
};
pub use prompts::{age_language_guide, build_character_prompt, build_story_prompt};
pub use session::{ConfigDraft, Notice, SceneCard, Session, Step, StepMark};
pub use storybook::{download_contents, download_file_name, split_story, StoryParts};
pub use wizard::{
    CameraView, ConfigView, Page, RecognitionRequest, StoryRequest, StoryView, View, Wizard,
    DEFAULT_MAX_SCENES,
};

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
