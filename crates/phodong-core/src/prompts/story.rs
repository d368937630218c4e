//! Story prompt: stitch every scene card into one read-aloud story.

use crate::profile::Profile;
use crate::prompts::age_language_guide;
use crate::session::SceneCard;

pub const STORY_PROMPT_TEMPLATE: &str = r#"As a professional children's author, write a story starring '{child_name}' and '{companion_name}'.

[Reader]
- Age: {age}
- Genre: {genre}
- Purpose: {purpose}

[Language level - follow strictly]
{age_guide}

[Rules]
1. The first line is the story title only.
2. Use a warm, gentle tone for reading aloud to a child.
3. Include every scene below and connect them naturally.
4. Weave the purpose ({purpose}) into the story without preaching.
5. Write the whole story in English, including the title.
6. End the story with the line "The End."

[Scenes]
{scenes}"#;

/// One line per card: `- name(type): "dialogue" / narration`.
fn scene_lines(cards: &[SceneCard]) -> String {
    cards
        .iter()
        .map(|c| {
            format!(
                "- {}({}): \"{}\" / {}",
                c.character_name, c.character_type, c.dialogue, c.story_narration
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn build_story_prompt(profile: &Profile, cards: &[SceneCard]) -> String {
    STORY_PROMPT_TEMPLATE
        .replace("{age_guide}", age_language_guide(profile.age()))
        .replace("{age}", &profile.age().to_string())
        .replace("{genre}", profile.genre().label())
        .replace("{purpose}", profile.purpose().label())
        .replace("{scenes}", &scene_lines(cards))
        .replace("{companion_name}", profile.companion_name())
        .replace("{child_name}", profile.child_name())
}
