use async_trait::async_trait;

use crate::error::{StudioError, is_invalid_key};
use crate::{logi, logok, logw};

pub const MIN_SCENES: usize = 1;
pub const MAX_SCENES: usize = 10;

pub const VISUAL_STYLES: &[&str] = &[
    "Cinematic Realistic",
    "Anime",
    "3D Cartoon",
    "Watercolor Painting",
    "Pixel Art",
    "Cyberpunk Neon",
];

const GEMINI_KEY_INVALID: &str =
    "The provided Gemini API Key is not valid. Please check it in the Setup tab.";

/// A text model that writes one scene as JSON.
#[async_trait]
pub trait SceneBackend: Send + Sync {
    async fn generate_scene(
        &self,
        model: &str,
        prompt: &str,
        api_key: &str,
    ) -> Result<String, StudioError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub main_idea: String,
    pub num_scenes: usize,
    pub include_dialogue: bool,
    pub visual_style: String,
}

impl Default for GenerationRequest {
    fn default() -> Self {
        Self {
            main_idea: "A brave cloud bear goes on an adventure to find a fallen star."
                .to_string(),
            num_scenes: 3,
            include_dialogue: true,
            visual_style: "3D Cartoon".to_string(),
        }
    }
}

pub struct ScriptGenerator<B> {
    backend: B,
    models: Vec<String>,
    dialogue_language: String,
}

impl<B: SceneBackend> ScriptGenerator<B> {
    pub fn new(backend: B, models: Vec<String>, dialogue_language: impl Into<String>) -> Self {
        Self {
            backend,
            models,
            dialogue_language: dialogue_language.into(),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Writes `num_scenes` scenes in order. Each scene after the first is
    /// conditioned on the previous scene's JSON, so the loop is strictly
    /// sequential.
    pub async fn generate(
        &self,
        request: &GenerationRequest,
        api_key: &str,
    ) -> Result<Vec<String>, StudioError> {
        if api_key.trim().is_empty() {
            return Err(StudioError::Validation(
                "Gemini API Key is not configured in the Setup tab.".into(),
            ));
        }
        if request.main_idea.trim().is_empty() {
            return Err(StudioError::Validation("Main Idea cannot be empty.".into()));
        }
        if !(MIN_SCENES..=MAX_SCENES).contains(&request.num_scenes) {
            return Err(StudioError::Validation(format!(
                "Number of scenes must be between {MIN_SCENES} and {MAX_SCENES}."
            )));
        }

        let mut scenes: Vec<String> = Vec::with_capacity(request.num_scenes);
        for index in 1..=request.num_scenes {
            let prompt = build_scene_prompt(
                request,
                &self.dialogue_language,
                index,
                scenes.last().map(String::as_str),
            );
            logi(format!("Writing scene {}/{}...", index, request.num_scenes));
            let text = self.generate_one(index, &prompt, api_key).await?;
            logok(format!("Scene {} ready ({} bytes)", index, text.len()));
            scenes.push(text);
        }

        Ok(scenes)
    }

    async fn generate_one(
        &self,
        index: usize,
        prompt: &str,
        api_key: &str,
    ) -> Result<String, StudioError> {
        let mut last_error = StudioError::Remote("no text models configured".into());

        for model in &self.models {
            let outcome = self
                .backend
                .generate_scene(model, prompt, api_key)
                .await
                .and_then(|text| match serde_json::from_str::<serde_json::Value>(&text) {
                    Ok(_) => Ok(text),
                    Err(e) => Err(StudioError::Remote(format!(
                        "model returned malformed JSON: {e}"
                    ))),
                });

            match outcome {
                Ok(text) => return Ok(text),
                Err(err) => {
                    logw(format!("Model {} failed for scene {}: {}", model, index, err));
                    match err {
                        StudioError::Auth(_) => {
                            return Err(StudioError::Auth(GEMINI_KEY_INVALID.into()));
                        }
                        StudioError::Remote(ref message) if is_invalid_key(message) => {
                            return Err(StudioError::Auth(GEMINI_KEY_INVALID.into()));
                        }
                        other => last_error = other,
                    }
                }
            }
        }

        Err(StudioError::SceneFailed {
            scene: index,
            source: Box::new(last_error),
        })
    }
}

/// Builds the user prompt for scene `index` (1-based).
pub fn build_scene_prompt(
    request: &GenerationRequest,
    dialogue_language: &str,
    index: usize,
    previous_scene: Option<&str>,
) -> String {
    let mut prompt = format!(
        "Main Idea: \"{}\"\nVisual Style: \"{}\"\nScene Number: {} of {}\nInclude Dialogue in {}: {}\n",
        request.main_idea,
        request.visual_style,
        index,
        request.num_scenes,
        dialogue_language,
        if request.include_dialogue { "Yes" } else { "No" },
    );

    match previous_scene {
        Some(previous) if index > 1 => {
            prompt.push_str(
                "This is a subsequent scene. Continue the story from the previous scene's JSON.\n\
                 Maintain character consistency using the details from the previous scene's JSON.\n\
                 Create a natural story progression.\n",
            );
            prompt.push_str("Previous Scene JSON for context: ");
            prompt.push_str(previous);
            prompt.push('\n');
        }
        _ => {
            prompt.push_str(
                "This is the first scene. Based on the Main Idea, create a compelling character.\n\
                 Establish the setting and the initial action.\n\
                 Ensure the character's description and consistent features are well-defined.\n",
            );
        }
    }

    prompt
}
