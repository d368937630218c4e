//! Character prompt: turn the object in the photo into a living story character.
//!
//! The model is asked to answer with one JSON object; `has_interesting_object` doubles as the
//! duplicate check against the object types already in the story.

use crate::profile::Profile;
use crate::prompts::age_language_guide;

pub const CHARACTER_PROMPT_TEMPLATE: &str = r#"You are a creative picture-book author writing for a {age}-year-old child.
Turn the object in the camera photo into a 'living character' that talks to the hero ({child_name}).

[Language level for the age - follow strictly]
{age_guide}

[Character]
1. Name: a clever, funny name that suits the {genre} genre
2. Power: a special magic power or ability this object has
3. Personality: a personality that matches the object's look or use

[Dialogue]
Something the character says to the hero ({child_name}) or the companion ({companion_name}). Include advice related to {purpose}.

[Careful]
Objects already in the story: {seen_types}
If the object is the same as or very similar to one of these, set "has_interesting_object": false.

Write every text value in English, whatever the hero's name looks like.
Reply ONLY with JSON in exactly this shape:
{
    "has_interesting_object": true,
    "character_name": "character name",
    "character_type": "original object name",
    "magic_power": "magic power",
    "personality": "personality",
    "dialogue": "what the character says to the hero",
    "story_narration": "description of the situation"
}
If there is no object or it is a duplicate, set "has_interesting_object": false."#;

/// Build the recognition prompt for one photo. `seen_types` lists the object labels
/// already turned into characters, in discovery order.
pub fn build_character_prompt(profile: &Profile, seen_types: &[String]) -> String {
    let seen = if seen_types.is_empty() {
        "none".to_string()
    } else {
        seen_types.join(", ")
    };
    CHARACTER_PROMPT_TEMPLATE
        .replace("{age_guide}", age_language_guide(profile.age()))
        .replace("{age}", &profile.age().to_string())
        .replace("{genre}", profile.genre().label())
        .replace("{purpose}", profile.purpose().label())
        .replace("{seen_types}", &seen)
        .replace("{companion_name}", profile.companion_name())
        .replace("{child_name}", profile.child_name())
}
