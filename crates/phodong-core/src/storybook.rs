//! Finished story: title/body split and the plain-text download.

/// Title used when the story text has no usable first line.
pub const FALLBACK_TITLE: &str = "My Own Story";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoryParts {
    pub title: String,
    pub body: String,
}

/// First line is the title, the rest is the body. A one-line story keeps its whole text as body.
pub fn split_story(text: &str) -> StoryParts {
    let trimmed = text.trim();
    let mut lines = trimmed.split('\n');
    let first = lines.next().unwrap_or_default().trim();
    let rest: Vec<&str> = lines.collect();

    let title = if first.is_empty() {
        FALLBACK_TITLE.to_string()
    } else {
        first.to_string()
    };
    let body = if rest.is_empty() {
        text.to_string()
    } else {
        rest.join("\n").trim().to_string()
    };
    StoryParts { title, body }
}

/// Download payload: title, blank line, body.
pub fn download_contents(parts: &StoryParts) -> String {
    format!("{}\n\n{}", parts.title, parts.body)
}

/// `phodong_{child}_story.txt`, keeping only characters that are safe in a
/// `Content-Disposition` filename.
pub fn download_file_name(child_name: &str) -> String {
    let safe: String = child_name
        .trim()
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    format!("phodong_{}_story.txt", safe)
}
