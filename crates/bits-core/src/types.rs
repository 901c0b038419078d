use std::fmt;
use std::str::FromStr;

use chrono::Local;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::BitsError;

/// Timestamp format stamped on every ingested chunk.
pub const INGEST_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// =============================================================================
// Enums
// =============================================================================

/// Response mode of a chat session.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Plain chat against the base model.
    #[default]
    Normal,
    /// Tool-augmented chat.
    Tools,
    /// Retrieval-augmented chat over the knowledge base.
    Rag,
}

impl Mode {
    /// Apply a toggle action for `requested` to the `current` mode.
    ///
    /// Toggling the active mode switches back to `Normal`; toggling any other
    /// mode activates it. Toggling `Normal` always yields `Normal`.
    pub fn toggle(current: Mode, requested: Mode) -> Mode {
        if current == requested {
            Mode::Normal
        } else {
            requested
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Normal => "normal",
            Mode::Tools => "tools",
            Mode::Rag => "rag",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = BitsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "normal" => Ok(Mode::Normal),
            "tools" | "tool" => Ok(Mode::Tools),
            "rag" => Ok(Mode::Rag),
            other => Err(BitsError::Config(format!("unknown mode: {other}"))),
        }
    }
}

/// Speaker of a buffered conversation turn.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    /// Label used when rendering turns into summarization input.
    pub fn transcript_label(&self) -> &'static str {
        match self {
            Role::User => "User",
            Role::Assistant => "AI",
        }
    }
}

/// Role of a message on the language model wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

impl From<Role> for MessageRole {
    fn from(role: Role) -> Self {
        match role {
            Role::User => MessageRole::User,
            Role::Assistant => MessageRole::Assistant,
        }
    }
}

/// Document category stored in chunk metadata and used as the filter key.
///
/// Deserialization goes through [`DocType::from_label`], so stored labels
/// outside the known set read back as `Other`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", from = "String")]
pub enum DocType {
    People,
    Paper,
    #[default]
    Other,
}

impl DocType {
    /// Map a free-form label to a category. Unknown labels become `Other`.
    pub fn from_label(label: &str) -> DocType {
        match label.trim().to_ascii_lowercase().as_str() {
            "people" => DocType::People,
            "paper" => DocType::Paper,
            _ => DocType::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DocType::People => "people",
            DocType::Paper => "paper",
            DocType::Other => "other",
        }
    }
}

impl From<String> for DocType {
    fn from(label: String) -> Self {
        DocType::from_label(&label)
    }
}

impl fmt::Display for DocType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Conversation
// =============================================================================

/// One buffered message of the conversation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub text: String,
}

impl Turn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            text: text.into(),
        }
    }

    /// `User: ...` / `AI: ...` transcript line.
    pub fn transcript_line(&self) -> String {
        format!("{}: {}", self.role.transcript_label(), self.text)
    }
}

/// A message sent to or received from the language model.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }
}

impl From<&Turn> for ChatMessage {
    fn from(turn: &Turn) -> Self {
        Self {
            role: turn.role.into(),
            content: turn.text.clone(),
        }
    }
}

/// A tool invocation proposed by the model.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub name: String,
    #[serde(default)]
    pub arguments: serde_json::Value,
}

// =============================================================================
// Documents
// =============================================================================

/// Metadata attached to every stored chunk.
///
/// Every field has a default so hand-edited payloads still decode.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkMetadata {
    pub title: String,
    pub source: String,
    #[serde(rename = "type")]
    pub doc_type: DocType,
    pub subtype: String,
    pub chunk_id: usize,
    pub content_hash: String,
    pub timestamp: String,
}

/// A unit of retrievable knowledge.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentChunk {
    pub content: String,
    pub metadata: ChunkMetadata,
}

impl DocumentChunk {
    /// Build a chunk, deriving its content hash and stamping the current time.
    pub fn new(
        content: impl Into<String>,
        title: impl Into<String>,
        source: impl Into<String>,
        doc_type: DocType,
        subtype: impl Into<String>,
        chunk_id: usize,
    ) -> Self {
        let content = content.into();
        let content_hash = content_hash(&content);
        Self {
            metadata: ChunkMetadata {
                title: title.into(),
                source: source.into(),
                doc_type,
                subtype: subtype.into(),
                chunk_id,
                content_hash,
                timestamp: Local::now().format(INGEST_TIMESTAMP_FORMAT).to_string(),
            },
            content,
        }
    }

    pub fn content_hash(&self) -> &str {
        &self.metadata.content_hash
    }
}

/// Metadata predicate applied to a vector query.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StructuredFilter {
    #[serde(rename = "type")]
    pub doc_type: DocType,
}

impl StructuredFilter {
    pub fn by_type(doc_type: DocType) -> Self {
        Self { doc_type }
    }

    pub fn matches(&self, metadata: &ChunkMetadata) -> bool {
        metadata.doc_type == self.doc_type
    }
}

/// Deterministic content-derived identifier: UUIDv5 in the DNS namespace.
pub fn content_hash(text: &str) -> String {
    Uuid::new_v5(&Uuid::NAMESPACE_DNS, text.as_bytes()).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_toggle_activates_requested() {
        assert_eq!(Mode::toggle(Mode::Normal, Mode::Rag), Mode::Rag);
        assert_eq!(Mode::toggle(Mode::Rag, Mode::Tools), Mode::Tools);
    }

    #[test]
    fn test_mode_toggle_twice_returns_to_normal() {
        let once = Mode::toggle(Mode::Normal, Mode::Tools);
        let twice = Mode::toggle(once, Mode::Tools);
        assert_eq!(twice, Mode::Normal);
        assert_eq!(Mode::toggle(Mode::Normal, Mode::Normal), Mode::Normal);
    }

    #[test]
    fn test_mode_serde_and_parse() {
        assert_eq!(serde_json::to_string(&Mode::Rag).unwrap(), "\"rag\"");
        let mode: Mode = serde_json::from_str("\"tools\"").unwrap();
        assert_eq!(mode, Mode::Tools);
        assert_eq!("RAG".parse::<Mode>().unwrap(), Mode::Rag);
        assert!("party".parse::<Mode>().is_err());
        assert_eq!(Mode::Normal.to_string(), "normal");
    }

    #[test]
    fn test_doc_type_from_label() {
        assert_eq!(DocType::from_label(" People "), DocType::People);
        assert_eq!(DocType::from_label("paper"), DocType::Paper);
        assert_eq!(DocType::from_label("meeting notes"), DocType::Other);
    }

    #[test]
    fn test_doc_type_deserializes_unknown_label_as_other() {
        let parsed: DocType = serde_json::from_str("\"meeting\"").unwrap();
        assert_eq!(parsed, DocType::Other);
        let parsed: DocType = serde_json::from_str("\" Paper \"").unwrap();
        assert_eq!(parsed, DocType::Paper);
        assert_eq!(serde_json::to_string(&DocType::People).unwrap(), "\"people\"");
    }

    #[test]
    fn test_chunk_metadata_tolerates_missing_fields() {
        let metadata: ChunkMetadata =
            serde_json::from_value(serde_json::json!({"source": "team.md", "type": "staff"}))
                .unwrap();
        assert_eq!(metadata.source, "team.md");
        assert_eq!(metadata.doc_type, DocType::Other);
        assert!(metadata.content_hash.is_empty());
        assert_eq!(metadata.chunk_id, 0);
    }

    #[test]
    fn test_content_hash_deterministic() {
        let a = content_hash("Dr. Smith runs the optics lab.");
        let b = content_hash("Dr. Smith runs the optics lab.");
        let c = content_hash("Dr. Smith runs the laser lab.");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(Uuid::parse_str(&a).is_ok());
    }

    #[test]
    fn test_document_chunk_new_fills_metadata() {
        let chunk = DocumentChunk::new("body", "Title", "notes.md", DocType::Paper, "notes", 2);
        assert_eq!(chunk.content_hash(), content_hash("body"));
        assert_eq!(chunk.metadata.chunk_id, 2);
        assert_eq!(chunk.metadata.timestamp.len(), 19);
    }

    #[test]
    fn test_chunk_metadata_serializes_type_key() {
        let chunk = DocumentChunk::new("x", "t", "s", DocType::People, "", 0);
        let json = serde_json::to_value(&chunk.metadata).unwrap();
        assert_eq!(json["type"], "people");
    }

    #[test]
    fn test_filter_matches_type() {
        let chunk = DocumentChunk::new("x", "t", "s", DocType::People, "", 0);
        assert!(StructuredFilter::by_type(DocType::People).matches(&chunk.metadata));
        assert!(!StructuredFilter::by_type(DocType::Paper).matches(&chunk.metadata));
    }

    #[test]
    fn test_turn_transcript_line() {
        assert_eq!(Turn::user("hi").transcript_line(), "User: hi");
        assert_eq!(Turn::assistant("hello").transcript_line(), "AI: hello");
        let msg = ChatMessage::from(&Turn::assistant("ok"));
        assert_eq!(msg.role, MessageRole::Assistant);
    }
}
