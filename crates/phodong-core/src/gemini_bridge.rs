//! Gemini Bridge: photo → character card, scene cards → story.
//!
//! One `generateContent` round trip per call; no retries, no timeout beyond reqwest's defaults.
//! Recognition failures collapse to "no card" so the child simply takes another photo; story
//! failures become placeholder text so the story screen always has something to show.

use crate::photo::Photo;
use crate::profile::Profile;
use crate::prompts::{build_character_prompt, build_story_prompt};
use crate::session::SceneCard;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("GOOGLE_API_KEY is not configured")]
    MissingCredential,
    #[error("Gemini request: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Gemini {status}: {body}")]
    Api { status: u16, body: String },
    #[error("Gemini response parse: {0}")]
    Decode(String),
    #[error("Gemini returned no text")]
    EmptyReply,
}

/// A hosted model that answers a text prompt, optionally looking at one photo.
#[async_trait]
pub trait VisionModel: Send + Sync {
    async fn generate(&self, prompt: &str, photo: Option<&Photo>) -> Result<String, ModelError>;
}

// generateContent request/response (camelCase on the wire)
#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum Part<'a> {
    Text {
        text: &'a str,
    },
    Inline {
        #[serde(rename = "inlineData")]
        inline_data: InlineData<'a>,
    },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData<'a> {
    mime_type: &'a str,
    data: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    candidates: Option<Vec<Candidate>>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    parts: Option<Vec<ReplyPart>>,
}

#[derive(Debug, Deserialize)]
struct ReplyPart {
    text: Option<String>,
}

/// Gemini `generateContent` client. Holds the process-wide credential; `None` means the key was
/// never configured and every call fails with [`ModelError::MissingCredential`].
pub struct GeminiClient {
    api_key: Option<String>,
    model: String,
    api_base: String,
    client: reqwest::Client,
}

impl GeminiClient {
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            api_key: api_key
                .map(|k| k.trim().to_string())
                .filter(|k| !k.is_empty()),
            model: DEFAULT_MODEL.to_string(),
            api_base: DEFAULT_API_BASE.to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// Model id, with or without the `models/` prefix.
    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.trim().to_string();
        self
    }

    pub fn with_api_base(mut self, api_base: &str) -> Self {
        self.api_base = api_base.trim().trim_end_matches('/').to_string();
        self
    }

    pub fn has_credential(&self) -> bool {
        self.api_key.is_some()
    }

    fn endpoint(&self) -> String {
        let model_path = if self.model.starts_with("models/") {
            self.model.clone()
        } else {
            format!("models/{}", self.model)
        };
        format!("{}/{}:generateContent", self.api_base, model_path)
    }
}

#[async_trait]
impl VisionModel for GeminiClient {
    async fn generate(&self, prompt: &str, photo: Option<&Photo>) -> Result<String, ModelError> {
        let api_key = self.api_key.as_deref().ok_or(ModelError::MissingCredential)?;

        let mut parts = vec![Part::Text { text: prompt }];
        if let Some(photo) = photo {
            parts.push(Part::Inline {
                inline_data: InlineData {
                    mime_type: photo.mime_type(),
                    data: photo.data_b64(),
                },
            });
        }
        let body = GenerateRequest {
            contents: vec![Content { role: "user", parts }],
        };

        tracing::info!(model = %self.model, with_photo = photo.is_some(), "Gemini request");
        let res = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", api_key)
            .json(&body)
            .send()
            .await?;

        let status = res.status();
        let text = res.text().await?;
        if !status.is_success() {
            return Err(ModelError::Api {
                status: status.as_u16(),
                body: text,
            });
        }

        let parsed: GenerateResponse =
            serde_json::from_str(&text).map_err(|e| ModelError::Decode(e.to_string()))?;
        let reply: String = parsed
            .candidates
            .and_then(|c| c.into_iter().next())
            .and_then(|c| c.content)
            .and_then(|c| c.parts)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|p| p.text)
            .collect();

        if reply.trim().is_empty() {
            return Err(ModelError::EmptyReply);
        }
        Ok(reply)
    }
}

/// Recognition reply. Missing or `null` fields fall back to `false` / empty strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CharacterReply {
    #[serde(deserialize_with = "null_as_default")]
    pub has_interesting_object: bool,
    #[serde(deserialize_with = "null_as_default")]
    pub character_name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub character_type: String,
    #[serde(deserialize_with = "null_as_default")]
    pub magic_power: String,
    #[serde(deserialize_with = "null_as_default")]
    pub personality: String,
    #[serde(deserialize_with = "null_as_default")]
    pub dialogue: String,
    #[serde(deserialize_with = "null_as_default")]
    pub story_narration: String,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Drop a surrounding markdown code fence (```` ```json ```` or ```` ``` ````) and whitespace.
pub fn strip_code_fence(text: &str) -> String {
    text.trim()
        .replace("```json", "")
        .replace("```", "")
        .trim()
        .to_string()
}

/// Parse a recognition reply. `None` when the text is not a JSON object of the expected shape.
pub fn parse_character_reply(text: &str) -> Option<CharacterReply> {
    match serde_json::from_str::<CharacterReply>(&strip_code_fence(text)) {
        Ok(reply) => Some(reply),
        Err(e) => {
            tracing::warn!("Character reply is not valid JSON: {}", e);
            None
        }
    }
}

/// Ask the model to turn the object in `photo` into a character.
///
/// `Ok(None)` covers "no interesting object / duplicate", an unparseable reply and a failed call
/// alike. Only a missing credential is an error, since retrying the photo cannot fix it.
pub async fn recognize_object<M>(
    model: &M,
    photo: &Photo,
    profile: &Profile,
    seen_types: &[String],
) -> Result<Option<SceneCard>, ModelError>
where
    M: VisionModel + ?Sized,
{
    let prompt = build_character_prompt(profile, seen_types);
    let raw = match model.generate(&prompt, Some(photo)).await {
        Ok(raw) => raw,
        Err(ModelError::MissingCredential) => return Err(ModelError::MissingCredential),
        Err(e) => {
            tracing::error!("Character generation failed: {}", e);
            return Ok(None);
        }
    };

    let Some(reply) = parse_character_reply(&raw) else {
        return Ok(None);
    };
    if !reply.has_interesting_object {
        tracing::info!("No new object recognised");
        return Ok(None);
    }

    tracing::info!(character = %reply.character_name, object = %reply.character_type, "Character created");
    Ok(Some(SceneCard {
        character_name: reply.character_name,
        character_type: reply.character_type,
        personality: reply.personality,
        magic_power: reply.magic_power,
        dialogue: reply.dialogue,
        story_narration: reply.story_narration,
        photo: photo.clone(),
    }))
}

/// Compose the final story. Never fails: errors come back as placeholder text.
pub async fn compose_story<M>(model: &M, cards: &[SceneCard], profile: &Profile) -> String
where
    M: VisionModel + ?Sized,
{
    let prompt = build_story_prompt(profile, cards);
    match model.generate(&prompt, None).await {
        Ok(text) => text.trim().to_string(),
        Err(e) => {
            tracing::error!("Story generation failed: {}", e);
            format!("Story generation error: {}", e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::{Genre, Purpose};
    use std::sync::Mutex;

    /// Replays canned replies and records every prompt it was given.
    struct Scripted {
        replies: Mutex<Vec<Result<String, ModelError>>>,
        prompts: Mutex<Vec<(String, bool)>>,
    }

    impl Scripted {
        fn new(replies: Vec<Result<String, ModelError>>) -> Self {
            Self {
                replies: Mutex::new(replies.into_iter().rev().collect()),
                prompts: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl VisionModel for Scripted {
        async fn generate(&self, prompt: &str, photo: Option<&Photo>) -> Result<String, ModelError> {
            self.prompts
                .lock()
                .unwrap()
                .push((prompt.to_string(), photo.is_some()));
            self.replies.lock().unwrap().pop().unwrap_or(Err(ModelError::EmptyReply))
        }
    }

    fn profile() -> Profile {
        Profile::new("Minjun", "friend", 7, Genre::Fantasy, Purpose::Confidence).unwrap()
    }

    fn photo() -> Photo {
        Photo::from_base64("image/jpeg", "QUJD")
    }

    const CUP_REPLY: &str = r#"```json
{
  "has_interesting_object": true,
  "character_name": "Captain Cuppy",
  "character_type": "cup",
  "magic_power": "fills itself with cocoa",
  "personality": "brave",
  "dialogue": "Minjun, you can do it!",
  "story_narration": "A cup wakes up on the table."
}
```"#;

    #[test]
    fn strips_fences_and_whitespace() {
        assert_eq!(strip_code_fence("  ```json\n{\"a\":1}\n```  "), "{\"a\":1}");
        assert_eq!(strip_code_fence("```\n{}\n```"), "{}");
        assert_eq!(strip_code_fence("\n {} \n"), "{}");
    }

    #[test]
    fn parses_fenced_reply_and_defaults_missing_fields() {
        let reply = parse_character_reply(CUP_REPLY).unwrap();
        assert!(reply.has_interesting_object);
        assert_eq!(reply.character_type, "cup");

        let sparse = parse_character_reply(r#"{"has_interesting_object": true, "character_name": "Zip"}"#)
            .unwrap();
        assert_eq!(sparse.character_name, "Zip");
        assert_eq!(sparse.dialogue, "");
    }

    #[test]
    fn null_fields_read_as_empty() {
        let reply = parse_character_reply(
            r#"{"has_interesting_object": true, "character_name": "Cuppy", "character_type": "cup", "magic_power": null, "dialogue": null}"#,
        )
        .unwrap();
        assert!(reply.has_interesting_object);
        assert_eq!(reply.character_name, "Cuppy");
        assert_eq!(reply.magic_power, "");
        assert_eq!(reply.dialogue, "");

        let unsure = parse_character_reply(r#"{"has_interesting_object": null}"#).unwrap();
        assert!(!unsure.has_interesting_object);
    }

    #[tokio::test]
    async fn null_magic_power_still_makes_a_card() {
        let model = Scripted::new(vec![Ok(
            r#"{"has_interesting_object": true, "character_name": "Cuppy", "character_type": "cup", "magic_power": null}"#
                .to_string(),
        )]);
        let card = recognize_object(&model, &photo(), &profile(), &[])
            .await
            .unwrap()
            .expect("a card despite the null field");
        assert_eq!(card.character_type, "cup");
        assert_eq!(card.magic_power, "");
    }

    #[test]
    fn rejects_non_json_replies() {
        assert!(parse_character_reply("I see a cup!").is_none());
        assert!(parse_character_reply("[1, 2, 3]").is_none());
        assert!(parse_character_reply("").is_none());
    }

    #[tokio::test]
    async fn recognized_object_becomes_card_with_photo() {
        let model = Scripted::new(vec![Ok(CUP_REPLY.to_string())]);
        let card = recognize_object(&model, &photo(), &profile(), &[])
            .await
            .unwrap()
            .unwrap();
        assert_eq!(card.character_name, "Captain Cuppy");
        assert_eq!(card.photo, photo());

        let prompts = model.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].1, "recognition sends the photo");
    }

    #[tokio::test]
    async fn negative_garbage_and_failed_calls_give_no_card() {
        let model = Scripted::new(vec![
            Ok(r#"{"has_interesting_object": false}"#.to_string()),
            Ok("not json at all".to_string()),
            Err(ModelError::Api { status: 500, body: "boom".into() }),
        ]);
        for _ in 0..3 {
            let out = recognize_object(&model, &photo(), &profile(), &[]).await.unwrap();
            assert!(out.is_none());
        }
    }

    #[tokio::test]
    async fn missing_credential_surfaces_as_error() {
        let model = Scripted::new(vec![Err(ModelError::MissingCredential)]);
        let out = recognize_object(&model, &photo(), &profile(), &[]).await;
        assert!(matches!(out, Err(ModelError::MissingCredential)));
    }

    #[tokio::test]
    async fn story_is_trimmed_and_text_only() {
        let model = Scripted::new(vec![Ok("\n  The Brave Cup\nOnce upon a time...\nThe End.  \n".into())]);
        let story = compose_story(&model, &[], &profile()).await;
        assert_eq!(story, "The Brave Cup\nOnce upon a time...\nThe End.");
        assert!(!model.prompts.lock().unwrap()[0].1, "story prompt carries no photo");
    }

    #[tokio::test]
    async fn story_failure_becomes_placeholder() {
        let model = Scripted::new(vec![Err(ModelError::MissingCredential)]);
        let story = compose_story(&model, &[], &profile()).await;
        assert_eq!(story, "Story generation error: GOOGLE_API_KEY is not configured");
    }

    #[tokio::test]
    async fn client_without_key_fails_before_any_request() {
        let client = GeminiClient::new(Some("   ".to_string()));
        assert!(!client.has_credential());
        let err = client.generate("hi", None).await.unwrap_err();
        assert!(matches!(err, ModelError::MissingCredential));
    }

    #[test]
    fn endpoint_accepts_bare_and_prefixed_model_ids() {
        let c = GeminiClient::new(None).with_api_base("http://localhost:9/v1beta/");
        assert_eq!(
            c.endpoint(),
            "http://localhost:9/v1beta/models/gemini-2.5-flash:generateContent"
        );
        let c = c.with_model("models/gemini-pro");
        assert_eq!(c.endpoint(), "http://localhost:9/v1beta/models/gemini-pro:generateContent");
    }

    #[test]
    fn request_body_uses_inline_data_shape() {
        let photo = photo();
        let body = GenerateRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![
                    Part::Text { text: "look" },
                    Part::Inline {
                        inline_data: InlineData {
                            mime_type: photo.mime_type(),
                            data: photo.data_b64(),
                        },
                    },
                ],
            }],
        };
        let v = serde_json::to_value(&body).unwrap();
        assert_eq!(v["contents"][0]["parts"][0]["text"], "look");
        assert_eq!(v["contents"][0]["parts"][1]["inlineData"]["mimeType"], "image/jpeg");
        assert_eq!(v["contents"][0]["parts"][1]["inlineData"]["data"], "QUJD");
    }
}
