use std::sync::{Arc, Mutex};

use rmcp::{
    ServerHandler,
    ServiceExt,
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{
        CallToolResult,
        Content,
        Implementation,
        ServerCapabilities,
        ServerInfo,
    },
    tool,
    tool_handler,
    tool_router,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::{
    embedding::Embedder,
    error,
    model_manager::ModelManager,
    note_store::{NoteKey, NoteStore},
    recall::{self, MIN_NOTE_CHARS, Recall, RecallOptions},
    text_util::{DEFAULT_PREVIEW_CHARS, preview},
};

struct NotebertState {
    store: NoteStore,
    embedder: Mutex<Box<dyn Embedder + Send>>,
}

#[derive(Clone)]
pub struct NotebertMcpServer {
    state: Arc<NotebertState>,
    tool_router: ToolRouter<Self>,
}

impl NotebertMcpServer {
    fn new(state: NotebertState) -> Self {
        Self {
            state: Arc::new(state),
            tool_router: Self::tool_router(),
        }
    }
}

#[tool_router(router = tool_router)]
impl NotebertMcpServer {
    /// Store a note.
    #[tool(
        name = "notebert_add_note",
        description = "Store a note. Notes are append-only and keyed by insertion order."
    )]
    pub async fn notebert_add_note(
        &self,
        params: Parameters<AddNoteParams>,
    ) -> Result<CallToolResult, rmcp::ErrorData> {
        let text = params.0.text;
        let key = recall::add_note(&self.state.store, &text)
            .map_err(|e| mcp_error("failed to store note", e))?;

        let summary = match key {
            Some(key) => format!("Stored note {key}"),
            None => format!(
                "Nothing stored: notes need at least {MIN_NOTE_CHARS} characters"
            ),
        };
        let structured = json!({ "stored": key.is_some(), "key": key });

        Ok(CallToolResult {
            content: vec![Content::text(summary)],
            structured_content: Some(structured),
            is_error: Some(false),
            meta: None,
        })
    }

    /// Find the stored note closest in meaning to a query.
    #[tool(
        name = "notebert_recall",
        description = "Return the single stored note closest in meaning to the query. The note is reflowed unless raw is true."
    )]
    pub async fn notebert_recall(
        &self,
        params: Parameters<RecallParams>,
    ) -> Result<CallToolResult, rmcp::ErrorData> {
        let params = params.0;
        let options = RecallOptions {
            reflow: !params.raw.unwrap_or(false),
        };

        let mut embedder = self.state.embedder.lock().map_err(|_| {
            rmcp::ErrorData::internal_error("model lock poisoned", None)
        })?;

        let outcome = recall::recall(
            &self.state.store,
            &mut **embedder,
            &params.query,
            options,
        )
        .map_err(|e| mcp_error("recall failed", e))?;

        let (summary, structured) = match outcome {
            Recall::NoNotes => (
                "No notes stored yet. Add one with notebert_add_note."
                    .to_string(),
                json!({ "query": params.query, "found": false }),
            ),
            Recall::Found(hit) => {
                let structured = serde_json::to_value(RecallResponse {
                    query: params.query,
                    found: true,
                    key: hit.key,
                    distance: hit.distance,
                    text: hit.text.clone(),
                })
                .map_err(|e| mcp_error("failed to serialize recall result", e))?;
                (hit.text, structured)
            }
        };

        Ok(CallToolResult {
            content: vec![Content::text(summary)],
            structured_content: Some(structured),
            is_error: Some(false),
            meta: None,
        })
    }

    /// List stored notes.
    #[tool(
        name = "notebert_list_notes",
        description = "List stored notes in insertion order, as one-line previews unless full is true."
    )]
    pub async fn notebert_list_notes(
        &self,
        params: Parameters<ListNotesParams>,
    ) -> Result<CallToolResult, rmcp::ErrorData> {
        let params = params.0;
        let full = params.full.unwrap_or(false);
        let notes = self
            .state
            .store
            .load_all()
            .map_err(|e| mcp_error("failed to read notes", e))?
            .unwrap_or_default();

        let total = notes.len();
        let items: Vec<NoteItem> = notes
            .into_iter()
            .take(params.limit.unwrap_or(usize::MAX))
            .map(|(key, text)| NoteItem {
                key,
                text: if full {
                    text
                } else {
                    preview(&text, DEFAULT_PREVIEW_CHARS)
                },
            })
            .collect();

        let summary = format_list_summary(&items, total);
        let structured = serde_json::to_value(ListNotesResponse {
            total,
            notes: items,
        })
        .map_err(|e| mcp_error("failed to serialize notes", e))?;

        Ok(CallToolResult {
            content: vec![Content::text(summary)],
            structured_content: Some(structured),
            is_error: Some(false),
            meta: None,
        })
    }
}

#[tool_handler(router = self.tool_router)]
impl ServerHandler for NotebertMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "notebert".to_string(),
                title: Some("notebert MCP".to_string()),
                version: env!("CARGO_PKG_VERSION").to_string(),
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "Use notebert_add_note to remember something and notebert_recall to get back the closest note."
                    .to_string(),
            ),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AddNoteParams {
    /// Note text.
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RecallParams {
    /// What to look for.
    pub query: String,
    /// Return the note as stored, without reflowing it (default: false).
    pub raw: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ListNotesParams {
    /// Maximum number of notes to return.
    pub limit: Option<usize>,
    /// Return full note text instead of previews (default: false).
    pub full: Option<bool>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RecallResponse {
    query: String,
    found: bool,
    key: NoteKey,
    distance: f32,
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ListNotesResponse {
    total: usize,
    notes: Vec<NoteItem>,
}

#[derive(Debug, Serialize)]
struct NoteItem {
    key: NoteKey,
    text: String,
}

fn format_list_summary(items: &[NoteItem], total: usize) -> String {
    if items.is_empty() {
        return "No notes stored yet.".to_string();
    }

    let mut lines = Vec::with_capacity(items.len() + 1);
    let suffix = if total == 1 { "" } else { "s" };
    lines.push(format!("Showing {} of {total} note{suffix}:", items.len()));
    for item in items {
        lines.push(format!("{}\t{}", item.key, item.text));
    }
    lines.join("\n")
}

fn mcp_error(message: &str, error: impl std::fmt::Display) -> rmcp::ErrorData {
    rmcp::ErrorData::internal_error(
        message.to_string(),
        Some(json!({ "error": error.to_string() })),
    )
}

pub fn run_mcp(store: NoteStore, model: ModelManager) -> error::Result<()> {
    tracing::info!(store = %store.describe(), model = model.model_id(), "starting MCP server");

    let server = NotebertMcpServer::new(NotebertState {
        store,
        embedder: Mutex::new(Box::new(model)),
    });

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| {
            error::Error::Config(format!("failed to start tokio runtime: {e}"))
        })?;

    runtime.block_on(async move {
        let transport = rmcp::transport::stdio();
        let running = server.serve(transport).await.map_err(|e| {
            error::Error::Config(format!(
                "MCP server initialization failed: {e}"
            ))
        })?;
        running.waiting().await.map_err(|e| {
            error::Error::Config(format!("MCP server error: {e}"))
        })?;
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::testing::TableEmbedder;

    fn server_with(embedder: TableEmbedder) -> NotebertMcpServer {
        NotebertMcpServer::new(NotebertState {
            store: NoteStore::in_memory(),
            embedder: Mutex::new(Box::new(embedder)),
        })
    }

    fn summary(result: &CallToolResult) -> String {
        result
            .content
            .first()
            .and_then(|c| c.as_text())
            .map(|t| t.text.clone())
            .unwrap_or_default()
    }

    #[tokio::test]
    async fn add_then_list_notes() {
        let server = server_with(TableEmbedder::new(vec![1.0]));

        let added = server
            .notebert_add_note(Parameters(AddNoteParams {
                text: "remember the milk".to_string(),
            }))
            .await
            .unwrap();
        let structured = added.structured_content.expect("structured");
        assert_eq!(structured.get("key").and_then(|v| v.as_u64()), Some(0));

        server
            .notebert_add_note(Parameters(AddNoteParams {
                text: "call the plumber\nabout the sink".to_string(),
            }))
            .await
            .unwrap();

        let listed = server
            .notebert_list_notes(Parameters(ListNotesParams {
                limit: None,
                full: None,
            }))
            .await
            .unwrap();
        let structured = listed.structured_content.clone().expect("structured");
        assert_eq!(structured.get("total").and_then(|v| v.as_u64()), Some(2));
        let notes = structured
            .get("notes")
            .and_then(|v| v.as_array())
            .expect("notes array");
        assert_eq!(
            notes[1].get("text").and_then(|v| v.as_str()),
            Some("call the plumber...")
        );
        assert!(summary(&listed).contains("Showing 2 of 2 notes"));
    }

    #[tokio::test]
    async fn short_note_is_not_stored() {
        let server = server_with(TableEmbedder::new(vec![1.0]));
        let result = server
            .notebert_add_note(Parameters(AddNoteParams {
                text: "x".to_string(),
            }))
            .await
            .unwrap();

        let structured = result.structured_content.expect("structured");
        assert_eq!(
            structured.get("stored").and_then(|v| v.as_bool()),
            Some(false)
        );
        assert!(server.state.store.is_empty().unwrap());
    }

    #[tokio::test]
    async fn recall_on_empty_store_reports_no_notes() {
        let server = server_with(TableEmbedder::new(vec![1.0]));
        let result = server
            .notebert_recall(Parameters(RecallParams {
                query: "anything".to_string(),
                raw: None,
            }))
            .await
            .unwrap();

        assert_eq!(result.is_error, Some(false));
        assert!(summary(&result).contains("No notes stored yet"));
        let structured = result.structured_content.expect("structured");
        assert_eq!(
            structured.get("found").and_then(|v| v.as_bool()),
            Some(false)
        );
    }

    #[tokio::test]
    async fn recall_returns_reflowed_nearest_note() {
        let embedder = TableEmbedder::new(vec![0.0, 0.0])
            .with("groceries", vec![1.0, 0.0])
            .with("setup### install", vec![0.0, 1.0])
            .with("how to install", vec![0.0, 1.0]);
        let server = server_with(embedder);
        for text in ["groceries", "setup### install"] {
            server
                .notebert_add_note(Parameters(AddNoteParams {
                    text: text.to_string(),
                }))
                .await
                .unwrap();
        }

        let result = server
            .notebert_recall(Parameters(RecallParams {
                query: "how to install".to_string(),
                raw: None,
            }))
            .await
            .unwrap();
        assert_eq!(summary(&result), "setup\n### install");

        let structured = result.structured_content.expect("structured");
        assert_eq!(structured.get("key").and_then(|v| v.as_u64()), Some(1));

        let raw = server
            .notebert_recall(Parameters(RecallParams {
                query: "how to install".to_string(),
                raw: Some(true),
            }))
            .await
            .unwrap();
        assert_eq!(summary(&raw), "setup### install");
    }
}
