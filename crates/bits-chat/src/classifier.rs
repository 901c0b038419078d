//! Metadata filter classifier.
//!
//! Asks the model to label a question with a document type and turns the
//! answer into an optional [`StructuredFilter`]. Any failure degrades to an
//! unfiltered search.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use bits_core::types::{ChatMessage, DocType, StructuredFilter};
use bits_llm::{ChatRequest, LanguageModel};

use crate::error::bounded;
use crate::prompts;

/// What the classifier decided, kept for debugging and display.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifierDebug {
    #[serde(rename = "type")]
    pub doc_type: String,
    pub subtype: String,
}

/// LLM-backed classifier producing a type filter for retrieval.
pub struct MetadataClassifier {
    model: Arc<dyn LanguageModel>,
    temperature: f32,
    timeout: Duration,
}

impl MetadataClassifier {
    pub fn new(model: Arc<dyn LanguageModel>, temperature: f32, timeout: Duration) -> Self {
        Self {
            model,
            temperature,
            timeout,
        }
    }

    pub async fn classify(&self, question: &str) -> (Option<StructuredFilter>, ClassifierDebug) {
        let request = ChatRequest::new(vec![ChatMessage::user(prompts::classifier_prompt(
            question,
        ))])
        .with_temperature(self.temperature);

        let raw = match bounded("classification", self.timeout, self.model.chat(request)).await {
            Ok(reply) => reply.content,
            Err(e) => {
                warn!(error = %e, "Classifier call failed; searching without filter");
                return (None, ClassifierDebug::default());
            }
        };

        match parse_classification(&raw) {
            Some(decision) => {
                debug!(doc_type = %decision.1.doc_type, subtype = %decision.1.subtype, "Classified question");
                decision
            }
            None => {
                warn!(raw = %raw, "Classifier reply was not valid JSON; searching without filter");
                (None, ClassifierDebug::default())
            }
        }
    }
}

/// Decode a classifier reply. Returns `None` when no JSON object can be read.
///
/// The span between the first `{` and the last `}` is parsed when both exist
/// in order; otherwise the whole reply is. A type outside the known labels
/// becomes `other`; an empty or `any` type yields no filter.
pub fn parse_classification(raw: &str) -> Option<(Option<StructuredFilter>, ClassifierDebug)> {
    let candidate = match (raw.find('{'), raw.rfind('}')) {
        (Some(start), Some(end)) if end > start => &raw[start..=end],
        _ => raw,
    };

    let value: serde_json::Value = serde_json::from_str(candidate).ok()?;
    let object = value.as_object()?;

    let field = |key: &str| {
        object
            .get(key)
            .and_then(serde_json::Value::as_str)
            .unwrap_or_default()
            .trim()
            .to_string()
    };
    let mut doc_type = field("type").to_lowercase();
    let subtype = field("subtype");

    let filter = if doc_type.is_empty() || doc_type == "any" {
        None
    } else {
        let normalized = DocType::from_label(&doc_type);
        doc_type = normalized.as_str().to_string();
        Some(StructuredFilter::by_type(normalized))
    };

    Some((filter, ClassifierDebug { doc_type, subtype }))
}
