//! Caption request records written to request-batch files.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::config::{
    Settings, DEFAULT_MAX_TOKENS, DEFAULT_MODEL, DEFAULT_SYSTEM_PROMPT, DEFAULT_USER_PROMPT,
};

/// Endpoint every batched request targets
pub const CHAT_COMPLETIONS_URL: &str = "/v1/chat/completions";

/// Extensions accepted as images (compared lowercased)
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp"];

/// An image file discovered during a directory scan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageItem {
    pub path: PathBuf,
    /// Lowercased extension, one of `IMAGE_EXTENSIONS`
    pub extension: String,
}

impl ImageItem {
    /// Returns `Some` if the path carries an allowed image extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_str()?;
        let (_, ext) = name.rsplit_once('.')?;
        let extension = ext.to_ascii_lowercase();
        IMAGE_EXTENSIONS
            .contains(&extension.as_str())
            .then(|| Self {
                path: path.to_path_buf(),
                extension,
            })
    }

    /// Base file name, including the extension
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Correlation key for the request built from this image
    pub fn custom_id(&self) -> String {
        format!("request-{}", self.file_name())
    }

    pub fn mime_type(&self) -> &'static str {
        match self.extension.as_str() {
            "png" => "image/png",
            "gif" => "image/gif",
            "webp" => "image/webp",
            _ => "image/jpeg",
        }
    }
}

/// Fixed prompt and model parameters shared by every request
#[derive(Debug, Clone, PartialEq)]
pub struct RequestTemplate {
    pub model: String,
    pub system_prompt: String,
    pub user_prompt: String,
    pub max_tokens: u32,
}

impl Default for RequestTemplate {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            user_prompt: DEFAULT_USER_PROMPT.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }
}

impl From<&Settings> for RequestTemplate {
    fn from(settings: &Settings) -> Self {
        Self {
            model: settings.model.clone(),
            system_prompt: settings.system_prompt.clone(),
            user_prompt: settings.user_prompt.clone(),
            max_tokens: settings.max_tokens,
        }
    }
}

impl RequestTemplate {
    /// Build the request for one image whose bytes are already base64 encoded.
    pub fn request_for(&self, image: &ImageItem, base64_data: &str) -> CaptionRequest {
        let data_url = format!("data:{};base64,{}", image.mime_type(), base64_data);

        CaptionRequest {
            custom_id: image.custom_id(),
            method: "POST".to_string(),
            url: CHAT_COMPLETIONS_URL.to_string(),
            body: ChatCompletionBody {
                model: self.model.clone(),
                messages: vec![
                    ChatMessage {
                        role: ChatRole::System,
                        content: MessageContent::Text(self.system_prompt.clone()),
                    },
                    ChatMessage {
                        role: ChatRole::User,
                        content: MessageContent::Parts(vec![
                            ContentPart::Text {
                                text: self.user_prompt.clone(),
                            },
                            ContentPart::ImageUrl {
                                image_url: ImageUrl { url: data_url },
                            },
                        ]),
                    },
                ],
                max_tokens: self.max_tokens,
            },
        }
    }
}

/// One line of a request-batch file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptionRequest {
    pub custom_id: String,
    pub method: String,
    pub url: String,
    pub body: ChatCompletionBody,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatCompletionBody {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: MessageContent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageUrl {
    pub url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_filter() {
        let png = ImageItem::from_path(Path::new("/photos/photo.PNG")).unwrap();
        assert_eq!(png.extension, "png");
        assert_eq!(png.mime_type(), "image/png");

        assert!(ImageItem::from_path(Path::new("/docs/document.pdf")).is_none());
        assert!(ImageItem::from_path(Path::new("/photos/noext")).is_none());
        assert!(ImageItem::from_path(Path::new("/photos/archive.jpg.zip")).is_none());
        assert!(ImageItem::from_path(Path::new("/photos/a.b.JpEg")).is_some());
    }

    #[test]
    fn test_custom_id_uses_basename() {
        let image = ImageItem::from_path(Path::new("/photos/2024/cat.webp")).unwrap();
        assert_eq!(image.custom_id(), "request-cat.webp");
    }

    #[test]
    fn test_request_shape() {
        let image = ImageItem::from_path(Path::new("dog.jpg")).unwrap();
        let request = RequestTemplate::default().request_for(&image, "QUJD");

        let value = serde_json::to_value(&request).unwrap();

        assert_eq!(value["custom_id"], "request-dog.jpg");
        assert_eq!(value["method"], "POST");
        assert_eq!(value["url"], "/v1/chat/completions");
        assert_eq!(value["body"]["model"], "gpt-4o");
        assert_eq!(value["body"]["max_tokens"], 600);

        let messages = value["body"]["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0]["role"], "system");
        assert!(messages[0]["content"].is_string());
        assert_eq!(messages[1]["role"], "user");
        assert_eq!(messages[1]["content"][0]["type"], "text");
        assert_eq!(messages[1]["content"][1]["type"], "image_url");
        assert_eq!(
            messages[1]["content"][1]["image_url"]["url"],
            "data:image/jpeg;base64,QUJD"
        );
    }

    #[test]
    fn test_request_parses_back() {
        let image = ImageItem::from_path(Path::new("dog.gif")).unwrap();
        let request = RequestTemplate::default().request_for(&image, "R0lG");

        let line = serde_json::to_string(&request).unwrap();
        let parsed: CaptionRequest = serde_json::from_str(&line).unwrap();

        assert_eq!(parsed, request);
    }
}
