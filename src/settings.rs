use crate::error::{DeskError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct ModelInfo {
    pub id: &'static str,
    pub name: &'static str,
    pub provider: &'static str,
    pub status: &'static str,
}

#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct VectorStoreInfo {
    pub id: &'static str,
    pub name: &'static str,
    pub status: &'static str,
}

pub const MODELS: &[ModelInfo] = &[
    ModelInfo { id: "gpt-4", name: "GPT-4", provider: "OpenAI", status: "active" },
    ModelInfo { id: "gpt-3.5-turbo", name: "GPT-3.5 Turbo", provider: "OpenAI", status: "active" },
    ModelInfo { id: "claude-3", name: "Claude 3", provider: "Anthropic", status: "active" },
    ModelInfo { id: "gemini-pro", name: "Gemini Pro", provider: "Google", status: "beta" },
];

pub const VECTOR_STORES: &[VectorStoreInfo] = &[
    VectorStoreInfo { id: "pinecone", name: "Pinecone", status: "Connected" },
    VectorStoreInfo { id: "weaviate", name: "Weaviate", status: "Available" },
    VectorStoreInfo { id: "chroma", name: "ChromaDB", status: "Available" },
    VectorStoreInfo { id: "qdrant", name: "Qdrant", status: "Available" },
];

pub const SETTING_KEYS: &[&str] = &[
    "llm_model",
    "vector_store",
    "auto_response",
    "log_retention_days",
    "max_tokens",
    "api_key",
];

/// Values behind the settings screen.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Settings {
    pub llm_model: String,
    pub vector_store: String,
    pub auto_response: bool,
    pub log_retention_days: u32,
    pub max_tokens: u32,
    pub api_key: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            llm_model: "gpt-4".to_string(),
            vector_store: "pinecone".to_string(),
            auto_response: true,
            log_retention_days: 30,
            max_tokens: 4000,
            api_key: None,
        }
    }
}

fn parse<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| DeskError::InvalidInput(format!("Invalid value for {}: {}", key, value)))
}

impl Settings {
    /// Set one value by key, validating both the key and the value.
    pub fn apply(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "llm_model" => {
                if !MODELS.iter().any(|m| m.id == value) {
                    return Err(DeskError::InvalidInput(format!("Unknown model: {}", value)));
                }
                self.llm_model = value.to_string();
            }
            "vector_store" => {
                if !VECTOR_STORES.iter().any(|v| v.id == value) {
                    return Err(DeskError::InvalidInput(format!(
                        "Unknown vector store: {}",
                        value
                    )));
                }
                self.vector_store = value.to_string();
            }
            "auto_response" => self.auto_response = parse(key, value)?,
            "log_retention_days" => {
                let days: u32 = parse(key, value)?;
                if days == 0 {
                    return Err(DeskError::InvalidInput(
                        "log_retention_days must be at least 1".to_string(),
                    ));
                }
                self.log_retention_days = days;
            }
            "max_tokens" => self.max_tokens = parse(key, value)?,
            "api_key" => {
                let value = value.trim();
                self.api_key = (!value.is_empty()).then(|| value.to_string());
            }
            _ => return Err(DeskError::InvalidInput(format!("Unknown setting key: {}", key))),
        }
        Ok(())
    }

    /// All values as strings for display, with API keys masked.
    pub fn masked(&self) -> BTreeMap<String, String> {
        let mut map = BTreeMap::new();
        map.insert("llm_model".to_string(), self.llm_model.clone());
        map.insert("vector_store".to_string(), self.vector_store.clone());
        map.insert("auto_response".to_string(), self.auto_response.to_string());
        map.insert(
            "log_retention_days".to_string(),
            self.log_retention_days.to_string(),
        );
        map.insert("max_tokens".to_string(), self.max_tokens.to_string());
        if let Some(value) = &self.api_key {
            map.insert("api_key".to_string(), mask(value));
        }
        map
    }

    pub fn model(&self) -> Option<&'static ModelInfo> {
        MODELS.iter().find(|m| m.id == self.llm_model)
    }
}

fn mask(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    if chars.len() > 8 {
        let head: String = chars[..4].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{}...{}", head, tail)
    } else {
        "********".to_string()
    }
}
