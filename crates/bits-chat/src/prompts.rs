//! Fixed instruction templates sent to the language model.

/// System instruction for Normal mode.
pub const NORMAL_INSTRUCTION: &str = "You are a helpful AI assistant.";

/// System instruction for the follow-up call after a tool ran.
pub const TOOL_FOLLOWUP_INSTRUCTION: &str = "You are a helpful assistant with tool access.";

/// System instruction for RAG mode when retrieval found nothing.
pub const NO_DOCUMENTS_INSTRUCTION: &str = "No relevant documents found. Answer based on your knowledge, but mention you couldn't find specific docs.";

/// Stand-in for an empty summary inside the summarization prompt.
pub const NO_PREVIOUS_SUMMARY: &str = "No previous summary.";

/// Answer when the tool agent produced neither a call nor text.
pub const EMPTY_TOOL_REPLY: &str = "(The tool agent returned no response.)";

pub const SUMMARY_HEADER: &str = "[Previous Conversation Summary]:";

pub fn rag_instruction(context: &str) -> String {
    format!(
        "Below is some context information from the knowledge base (in Markdown format).\n\
         Instructions:\n\
         1. Answer the question using ONLY the context if possible.\n\
         2. If the answer is not in the context, say 'I don't know' or answer generally.\n\n\
         Context:\n{}",
        context
    )
}

pub fn classifier_prompt(question: &str) -> String {
    format!(
        "You are a classifier deciding filters.\n\
         Output **only one JSON object**.\n\n\
         Fields:\n\
         - \"type\": \"people\" / \"paper\" / \"other\"\n\
         - \"subtype\": string or \"\"\n\n\
         Question:\n{}\n\n\
         JSON:",
        question
    )
}

pub fn summary_prompt(summary: &str, new_lines: &str) -> String {
    let summary = if summary.trim().is_empty() {
        NO_PREVIOUS_SUMMARY
    } else {
        summary
    };
    format!(
        "You are a helpful assistant encapsulating conversation history.\n\
         Current summary:\n{}\n\n\
         New lines of conversation:\n{}\n\n\
         Update the summary to include the new interaction, keeping it concise but informative.",
        summary, new_lines
    )
}

/// Tools-mode request, prefixed with the running summary when one exists.
pub fn tools_request(summary: &str, message: &str) -> String {
    if summary.is_empty() {
        message.to_string()
    } else {
        format!("Context: {}\nUser Request: {}", summary, message)
    }
}

pub fn tool_followup(name: &str, output: &str, message: &str) -> String {
    format!(
        "Tool '{}' output: {}. Now answer the user: {}",
        name, output, message
    )
}

pub fn tool_not_found(name: &str) -> String {
    format!("Warning: tool not found: {}", name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rag_instruction_embeds_context() {
        let prompt = rag_instruction("Document 1 (Source: a.md)\nhello");
        assert!(prompt.starts_with("Below is some context information"));
        assert!(prompt.ends_with("Context:\nDocument 1 (Source: a.md)\nhello"));
    }

    #[test]
    fn test_summary_prompt_placeholder() {
        let prompt = summary_prompt("", "User: hi\nAI: hello");
        assert!(prompt.contains("Current summary:\nNo previous summary.\n"));
        assert!(prompt.contains("New lines of conversation:\nUser: hi\nAI: hello"));

        let prompt = summary_prompt("We greeted.", "User: bye");
        assert!(prompt.contains("Current summary:\nWe greeted.\n"));
    }

    #[test]
    fn test_tools_request() {
        assert_eq!(tools_request("", "what time is it"), "what time is it");
        assert_eq!(
            tools_request("User asked about GPUs.", "what time is it"),
            "Context: User asked about GPUs.\nUser Request: what time is it"
        );
    }

    #[test]
    fn test_tool_followup_and_not_found() {
        assert_eq!(
            tool_followup("get_time", "2026-01-01", "time?"),
            "Tool 'get_time' output: 2026-01-01. Now answer the user: time?"
        );
        assert_eq!(tool_not_found("gpu_info"), "Warning: tool not found: gpu_info");
    }

    #[test]
    fn test_classifier_prompt_contains_question() {
        let prompt = classifier_prompt("Who is Dr. Kim?");
        assert!(prompt.contains("Question:\nWho is Dr. Kim?\n\nJSON:"));
    }
}
