use std::sync::Arc;

use rmcp::handler::server::router::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::*;
use rmcp::{ErrorData as McpError, ServerHandler, tool, tool_handler, tool_router};
use schemars::JsonSchema;
use serde::Deserialize;
use tokio::sync::Mutex;

use twin_core::{
    ArchiveOutcome, DisplayPolicy, PolicyError, RecordId, TokenRecord, Verdict, extract,
    looks_like_report,
};
use twin_store::{Role, Store, StoreError, TwinConfig};

use crate::render::{render_emission, render_suppression};

/// MCP host for the twin finder. Every tool call takes the one state lock,
/// so events are handled strictly one at a time.
#[derive(Clone)]
pub struct TwinServer {
    state: Arc<Mutex<ServerState>>,
    tool_router: ToolRouter<Self>,
}

struct ServerState {
    policy: DisplayPolicy<Store>,
    config: TwinConfig,
}

impl TwinServer {
    pub fn new(store: Store, config: TwinConfig) -> Self {
        let policy = DisplayPolicy::new(store, config.policy_config());
        Self {
            state: Arc::new(Mutex::new(ServerState { policy, config })),
            tool_router: Self::tool_router(),
        }
    }

    /// Fold the WAL into the database file before exit.
    pub async fn checkpoint_wal(&self) {
        let state = self.state.lock().await;
        if let Err(e) = state.policy.repository().checkpoint() {
            tracing::warn!("WAL checkpoint failed: {e}");
        }
    }

    /// Run `f` against the state on the blocking pool while holding the lock.
    /// The corpus scan must not stall the stdio event loop.
    async fn with_state<T, F>(&self, f: F) -> Result<T, McpError>
    where
        T: Send + 'static,
        F: FnOnce(&ServerState) -> Result<T, McpError> + Send + 'static,
    {
        let guard = self.state.clone().lock_owned().await;
        tokio::task::spawn_blocking(move || f(&guard))
            .await
            .map_err(|e| McpError::internal_error(format!("worker task failed: {e}"), None))?
    }
}

fn policy_error(e: PolicyError<StoreError>) -> McpError {
    match e {
        PolicyError::ThresholdOutOfRange(_) => McpError::invalid_params(e.to_string(), None),
        _ => McpError::internal_error(e.to_string(), None),
    }
}

fn json_result(value: serde_json::Value) -> Result<CallToolResult, McpError> {
    Ok(CallToolResult::success(vec![Content::text(
        serde_json::to_string_pretty(&value).unwrap_or_default(),
    )]))
}

fn not_a_report() -> serde_json::Value {
    serde_json::json!({ "skipped": true, "reason": "text is not a token report" })
}

fn archive_json(state: &ServerState, record: &TokenRecord) -> Result<serde_json::Value, McpError> {
    let outcome = state.policy.archive(record).map_err(policy_error)?;
    let mut json = serde_json::to_value(&outcome)
        .map_err(|e| McpError::internal_error(e.to_string(), None))?;
    json["token"] = record.name.clone().into();
    json["contract_address"] = record.contract_address.clone().into();
    if let ArchiveOutcome::Duplicate { existing } = &outcome {
        json["existing"] = serde_json::json!({
            "id": existing.id.to_string(),
            "name": existing.record.name,
            "created_at": existing.created_at,
        });
    }
    Ok(json)
}

fn compare_json(state: &ServerState, record: &TokenRecord) -> Result<serde_json::Value, McpError> {
    let verdict = state.policy.evaluate(record).map_err(policy_error)?;
    let report = match &verdict {
        Verdict::Emit(emission) => render_emission(record, emission),
        Verdict::Suppress(reason) => render_suppression(record, reason),
    };
    let mut json = serde_json::to_value(&verdict)
        .map_err(|e| McpError::internal_error(e.to_string(), None))?;
    json["token"] = record.name.clone().into();
    json["report"] = report.into();
    Ok(json)
}

// --- Tool parameter types ---

#[derive(Debug, Deserialize, JsonSchema)]
struct SubmitRequest {
    /// Raw report text as received
    text: String,
    /// Id of the channel the report arrived on; routes it via config.toml
    channel: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct ReportRequest {
    /// Raw report text
    text: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct ThresholdRequest {
    /// New threshold between 0 and 100. Omit to read the current one.
    value: Option<f64>,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct DeleteRequest {
    /// Delete every report with this contract address
    contract: Option<String>,
    /// Delete the report with this record id
    id: Option<String>,
    /// Delete every report with exactly this token name
    name: Option<String>,
    /// Delete the most recently archived report
    #[serde(default)]
    last: bool,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct ClearRequest {
    /// Must be true; the whole archive is deleted
    confirm: bool,
}

fn store_error(e: StoreError) -> McpError {
    McpError::internal_error(e.to_string(), None)
}

fn delete_json(store: &Store, req: DeleteRequest) -> Result<serde_json::Value, McpError> {
    let selectors = [req.contract.is_some(), req.id.is_some(), req.name.is_some(), req.last];
    if selectors.iter().filter(|&&s| s).count() != 1 {
        return Err(McpError::invalid_params(
            "give exactly one of contract, id, name or last",
            None,
        ));
    }

    let names: Vec<String> = if let Some(contract) = &req.contract {
        store.delete_by_contract(contract).map_err(store_error)?.1
    } else if let Some(id) = &req.id {
        let id: RecordId = id
            .parse()
            .map_err(|e| McpError::invalid_params(format!("invalid record id: {e}"), None))?;
        store.delete_by_id(&id).map_err(store_error)?.into_iter().collect()
    } else if let Some(name) = &req.name {
        let deleted = store.delete_by_name(name).map_err(store_error)?;
        vec![name.clone(); deleted]
    } else {
        store.delete_last().map_err(store_error)?.into_iter().collect()
    };
    Ok(serde_json::json!({ "deleted": names.len(), "names": names }))
}

#[tool_router]
impl TwinServer {
    #[tool(
        description = "Submit a report received on a channel. Reports on the database channel are archived; reports on the comparison channel are compared against the archive and surfaced when they cross the threshold. Other channels are ignored."
    )]
    async fn twin_submit(
        &self,
        Parameters(req): Parameters<SubmitRequest>,
    ) -> Result<CallToolResult, McpError> {
        self.with_state(move |state| {
            let role = state.config.role_for(&req.channel);
            let json = match role {
                Some(Role::Archive | Role::Compare) if !looks_like_report(&req.text) => {
                    not_a_report()
                }
                Some(Role::Archive) => archive_json(state, &extract(&req.text))?,
                Some(Role::Compare) => compare_json(state, &extract(&req.text))?,
                Some(Role::Notification) | None => {
                    serde_json::json!({ "ignored": true, "channel": req.channel })
                }
            };
            Ok(json)
        })
        .await
        .and_then(json_result)
    }

    #[tool(description = "Extract a report and add it to the archive. Reports whose contract address is already archived are not stored twice.")]
    async fn twin_archive(
        &self,
        Parameters(req): Parameters<ReportRequest>,
    ) -> Result<CallToolResult, McpError> {
        self.with_state(move |state| {
            if !looks_like_report(&req.text) {
                return Ok(not_a_report());
            }
            archive_json(state, &extract(&req.text))
        })
        .await
        .and_then(json_result)
    }

    #[tool(description = "Extract a report, find its most similar archived report, and decide whether to surface it. A contract is surfaced at most once until the displayed set is reset.")]
    async fn twin_compare(
        &self,
        Parameters(req): Parameters<ReportRequest>,
    ) -> Result<CallToolResult, McpError> {
        self.with_state(move |state| {
            if !looks_like_report(&req.text) {
                return Ok(not_a_report());
            }
            compare_json(state, &extract(&req.text))
        })
        .await
        .and_then(json_result)
    }

    #[tool(description = "Read the similarity threshold, or set it when a value is given.")]
    async fn twin_threshold(
        &self,
        Parameters(req): Parameters<ThresholdRequest>,
    ) -> Result<CallToolResult, McpError> {
        self.with_state(move |state| {
            let json = match req.value {
                Some(value) => {
                    let previous = state.policy.set_threshold(value).map_err(policy_error)?;
                    serde_json::json!({ "threshold": value, "previous": previous })
                }
                None => {
                    let threshold = state.policy.threshold().map_err(policy_error)?;
                    serde_json::json!({ "threshold": threshold })
                }
            };
            Ok(json)
        })
        .await
        .and_then(json_result)
    }

    #[tool(description = "Clear the set of already-surfaced contracts so they can be surfaced again.")]
    async fn twin_reset(&self) -> Result<CallToolResult, McpError> {
        self.with_state(|state| {
            let cleared = state.policy.reset_displayed().map_err(policy_error)?;
            Ok(serde_json::json!({ "cleared": cleared }))
        })
        .await
        .and_then(json_result)
    }

    #[tool(description = "List every archived contract address with its token name, sorted by name.")]
    async fn twin_contracts(&self) -> Result<CallToolResult, McpError> {
        self.with_state(|state| {
            let contracts = state.policy.repository().list_contracts().map_err(store_error)?;
            let list: Vec<_> = contracts
                .into_iter()
                .map(|(name, contract)| {
                    serde_json::json!({ "name": name, "contract_address": contract })
                })
                .collect();
            Ok(serde_json::json!({ "count": list.len(), "contracts": list }))
        })
        .await
        .and_then(json_result)
    }

    #[tool(description = "Delete archived reports selected by exactly one of: contract address, record id, exact token name, or last (the most recently archived report).")]
    async fn twin_delete(
        &self,
        Parameters(req): Parameters<DeleteRequest>,
    ) -> Result<CallToolResult, McpError> {
        self.with_state(move |state| delete_json(state.policy.repository(), req))
            .await
            .and_then(json_result)
    }

    #[tool(description = "Delete every archived report. Requires confirm=true. The threshold and the surfaced set are kept.")]
    async fn twin_clear(
        &self,
        Parameters(req): Parameters<ClearRequest>,
    ) -> Result<CallToolResult, McpError> {
        if !req.confirm {
            return Err(McpError::invalid_params("confirm must be true", None));
        }
        self.with_state(|state| {
            let deleted = state.policy.repository().clear_all().map_err(store_error)?;
            Ok(serde_json::json!({ "cleared": deleted }))
        })
        .await
        .and_then(json_result)
    }

    #[tool(description = "Archive size, number of surfaced contracts, and the current threshold.")]
    async fn twin_stats(&self) -> Result<CallToolResult, McpError> {
        self.with_state(|state| {
            let store = state.policy.repository();
            Ok(serde_json::json!({
                "tokens": store.count().map_err(store_error)?,
                "displayed": store.displayed_count().map_err(store_error)?,
                "threshold": state.policy.threshold().map_err(policy_error)?,
            }))
        })
        .await
        .and_then(json_result)
    }
}

#[tool_handler]
impl ServerHandler for TwinServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "Token twin finder. Archive token reports with twin_archive (or twin_submit on \
                 the database channel). Compare new reports with twin_compare (or twin_submit on \
                 the comparison channel): the most similar archived report is surfaced once per \
                 contract when its overall similarity reaches the threshold. Use twin_threshold \
                 to inspect or change the threshold and twin_reset to allow contracts to be \
                 surfaced again. twin_contracts, twin_delete and twin_clear administer the \
                 archive."
                    .into(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}
