//! Prompt templates for character recognition and story composition.

pub mod character;
pub mod story;

pub use character::{build_character_prompt, CHARACTER_PROMPT_TEMPLATE};
pub use story::{build_story_prompt, STORY_PROMPT_TEMPLATE};

const GUIDE_AGE_5: &str = "Use familiar, everyday words. Keep sentences natural but short. \
Use plenty of sound and motion words (for example: twinkle-twinkle, tiptoe-tiptoe) and avoid difficult or abstract words. \
Keep the story flow (setting, event, resolution) and describe each scene in 2-3 sentences.";

const GUIDE_AGE_6: &str = "Use familiar vocabulary and short compound sentences (for example: \"...and so...\"). \
Use feeling words (happy, scared) and sound words, and describe each scene in 3-4 sentences.";

const GUIDE_AGE_7: &str = "Use cause-and-effect words (because, so, but). \
Describe the characters' feelings and intentions concretely and tell each scene richly in 4-5 sentences.";

const GUIDE_AGE_8: &str = "Use similes (\"just like...\") and a varied vocabulary. \
Describe the characters' inner thoughts and the causes of events in detail to build a rich story.";

/// Language-style directive for the reader's age. Ages without their own guide
/// get the age-7 guide.
pub fn age_language_guide(age: u8) -> &'static str {
    match age {
        5 => GUIDE_AGE_5,
        6 => GUIDE_AGE_6,
        7 => GUIDE_AGE_7,
        8 => GUIDE_AGE_8,
        _ => GUIDE_AGE_7,
    }
}
