use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::error::StudioError;

/// Top-level object the text model is asked to return.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SceneDocument {
    #[serde(default)]
    pub scene: SceneRecord,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneRecord {
    pub id: f64,
    pub setting: String,
    pub action: String,
    pub character: Character,
    pub style: SceneStyle,
    pub dialogue: String,
    pub transition_to_next_scene: String,
    pub constraints: SceneConstraints,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Character {
    pub name: String,
    pub description: String,
    pub outfit: String,
    pub consistent_features: Vec<String>,
    pub personality: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneStyle {
    pub visual: String,
    pub camera: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConstraints {
    pub keep_character_consistent: bool,
    pub avoid_changes: Vec<String>,
}

impl SceneDocument {
    pub fn from_json(text: &str) -> Result<Self, StudioError> {
        serde_json::from_str(text)
            .map_err(|e| StudioError::Validation(format!("Invalid scene JSON: {e}")))
    }
}

/// Checks that a prompt is well-formed JSON. The render backend only needs
/// the text, so the scene shape itself is not enforced.
pub fn validate_prompt(text: &str) -> Result<Value, StudioError> {
    serde_json::from_str(text).map_err(|_| StudioError::Validation("Invalid JSON format.".into()))
}

/// Pretty-prints a JSON prompt, or returns it unchanged when it does not parse.
pub fn format_prompt(text: &str) -> String {
    serde_json::from_str::<Value>(text)
        .ok()
        .and_then(|v| serde_json::to_string_pretty(&v).ok())
        .unwrap_or_else(|| text.to_string())
}

pub fn system_instruction(dialogue_language: &str) -> String {
    format!(
        "You are an expert screenwriter for an AI video generator. Your task is to create a detailed JSON prompt for a single scene.
- Based on the user's main idea, you must invent and create a consistent character (name, description, outfit, personality, consistent_features). This character must be maintained across all scenes.
- The 'consistent_features' and 'avoid_changes' arrays are crucial for character consistency. Populate them with key visual traits.
- Creatively determine the 'camera' style (angles, movement) and add descriptive details to the visual style.
- If dialogue is requested, make it short, natural, and in {dialogue_language}.
- The 'transition_to_next_scene' should be a brief, creative description of how this scene ends and the next begins.
- Only output the raw JSON object, without any markdown formatting like ```json."
    )
}

/// Structured-output schema constraining replies to [`SceneDocument`].
pub fn response_schema() -> Value {
    let string = json!({ "type": "STRING" });
    let string_list = json!({ "type": "ARRAY", "items": { "type": "STRING" } });

    json!({
        "type": "OBJECT",
        "properties": {
            "scene": {
                "type": "OBJECT",
                "properties": {
                    "id": { "type": "NUMBER" },
                    "setting": string,
                    "action": string,
                    "character": {
                        "type": "OBJECT",
                        "properties": {
                            "name": string,
                            "description": string,
                            "outfit": string,
                            "consistent_features": string_list,
                            "personality": string
                        }
                    },
                    "style": {
                        "type": "OBJECT",
                        "properties": {
                            "visual": string,
                            "camera": string
                        }
                    },
                    "dialogue": string,
                    "transition_to_next_scene": string,
                    "constraints": {
                        "type": "OBJECT",
                        "properties": {
                            "keep_character_consistent": { "type": "BOOLEAN" },
                            "avoid_changes": string_list
                        }
                    }
                }
            }
        }
    })
}
