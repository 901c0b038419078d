//! End-to-end session flows over real tools and a persisted in-memory index.

use std::sync::Arc;

use serde_json::json;

use bits_chat::{ChatSettings, ModelSet, ResponseOrchestrator, SessionHandle};
use bits_core::types::{DocType, Mode, Role};
use bits_llm::{ChatReply, ScriptedModel};
use bits_tools::ToolRegistry;
use bits_vector::{
    HashEmbedding, IngestOptions, IngestPipeline, MemoryIndex, TextSplitter, VectorBackend,
};

fn spawn(models: ModelSet, backend: Arc<dyn VectorBackend>, registry: ToolRegistry) -> SessionHandle {
    let orchestrator = ResponseOrchestrator::new(models, backend, registry, ChatSettings::default());
    SessionHandle::spawn(orchestrator, 4)
}

fn empty_backend() -> Arc<dyn VectorBackend> {
    Arc::new(MemoryIndex::new(Arc::new(HashEmbedding::new(32))))
}

#[tokio::test]
async fn test_tools_mode_lists_storage_directory() {
    let storage = tempfile::tempdir().unwrap();
    std::fs::write(storage.path().join("notes.txt"), "beam alignment log").unwrap();

    let mut registry = ToolRegistry::new();
    registry.register_defaults(storage.path());

    let tool_model = Arc::new(ScriptedModel::new().then_reply(
        ChatReply::text("").with_tool_call("list_storage_files", json!({})),
    ));
    let answer_model = Arc::new(ScriptedModel::always("You have notes.txt."));
    let models = ModelSet {
        chat: answer_model.clone(),
        summarizer: Arc::new(ScriptedModel::always("summary")),
        tool: tool_model.clone(),
    };
    let session = spawn(models, empty_backend(), registry);

    assert_eq!(session.toggle_mode(Mode::Tools).await.unwrap(), Mode::Tools);
    let outcome = session.respond("which files do I have?").await.unwrap();
    assert_eq!(outcome.reply, "You have notes.txt.");
    assert_eq!(outcome.mode, Mode::Tools);

    let advertised: Vec<_> = tool_model.requests()[0]
        .tools
        .iter()
        .map(|t| t.name.clone())
        .collect();
    assert_eq!(
        advertised,
        vec![
            "disk_info",
            "get_time",
            "gpu_info",
            "list_storage_files",
            "system_info"
        ]
    );

    let followup = answer_model.requests()[0].messages.last().unwrap().content.clone();
    assert!(followup.starts_with("Tool 'list_storage_files' output: Files in "));
    assert!(followup.contains("- notes.txt ("));
    assert!(followup.ends_with("Now answer the user: which files do I have?"));
}

#[tokio::test]
async fn test_rag_over_reopened_snapshot() {
    let data = tempfile::tempdir().unwrap();
    let path = data.path().join("lab_knowledge.json");

    {
        let index = MemoryIndex::open(Arc::new(HashEmbedding::new(32)), &path).unwrap();
        let pipeline = IngestPipeline::new(Arc::new(index), TextSplitter::default());
        let report = pipeline
            .ingest_text(
                "Our GNN survey was accepted at the graph learning workshop.",
                &IngestOptions::new("papers.md", DocType::Paper),
            )
            .await
            .unwrap();
        assert_eq!(report.chunks_stored, 1);
    }

    let reopened = MemoryIndex::open(Arc::new(HashEmbedding::new(32)), &path).unwrap();
    assert_eq!(reopened.len(), 1);

    let chat = Arc::new(
        ScriptedModel::new()
            .then_text(r#"{"type": "paper", "subtype": "gnn"}"#)
            .then_text("The GNN survey was accepted."),
    );
    let models = ModelSet {
        chat: chat.clone(),
        summarizer: Arc::new(ScriptedModel::always("summary")),
        tool: Arc::new(ScriptedModel::new()),
    };
    let session = spawn(models, Arc::new(reopened), ToolRegistry::new());

    let outcome = session
        .respond_in("what happened with the GNN paper?", Mode::Rag)
        .await
        .unwrap();
    assert_eq!(outcome.reply, "The GNN survey was accepted.");

    let system = chat.requests()[1].messages[0].content.clone();
    assert!(system.contains("Document 1 (Source: papers.md)"));
    assert!(system.contains("GNN survey was accepted"));
}

#[tokio::test]
async fn test_long_conversation_summarizes_oldest_rounds() {
    let models = ModelSet {
        chat: Arc::new(ScriptedModel::always("noted")),
        summarizer: Arc::new(ScriptedModel::always("User listed lab equipment.")),
        tool: Arc::new(ScriptedModel::new()),
    };
    let session = spawn(models, empty_backend(), ToolRegistry::new());

    for i in 0..5 {
        let outcome = session.respond(format!("item {}", i)).await.unwrap();
        assert!(!outcome.failed);
        let snapshot = session.snapshot().await.unwrap();
        assert!(snapshot.turns.len() <= 6);
    }

    let snapshot = session.snapshot().await.unwrap();
    assert_eq!(snapshot.summary, "User listed lab equipment.");
    assert_eq!(snapshot.turns.len(), 6);
    assert_eq!(snapshot.turns[0].role, Role::User);
    assert_eq!(snapshot.turns[0].text, "item 2");
}
