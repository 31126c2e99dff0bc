//! The PREAUTH tool registry.
//!
//! `ToolRegistry` implements the `ToolInvoker` trait from `preauth-core`.
//! A call goes through three gates in order:
//!
//! 1. **Lookup**: unknown names fail with `ToolNotFound`, listing what is
//!    registered.
//! 2. **Required parameters**: each name in the tool's
//!    `inputSchema.required` must be present and non-null, else
//!    `Validation`. Only presence is checked, never types.
//! 3. **Execution**: the tool runs, the call is timed and logged, and its
//!    result or error is returned unchanged.
//!
//! Calls rejected at gates 1 or 2 never reach the call log.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::Instant;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use tracing::{debug, info, warn};
use uuid::Uuid;

use preauth_contracts::{
    error::{PreauthError, PreauthResult},
    tool::{CallLogEntry, RegistryStats, ToolSchema},
};
use preauth_core::traits::{Tool, ToolInvoker};

use crate::call_log::{sanitize_params, CallLog};

/// Call-log sizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistryConfig {
    /// Entries retained before bulk eviction to `call_log_cap / 2`.
    pub call_log_cap: usize,
    /// Top-level string parameters longer than this are truncated in the log.
    pub param_truncate_len: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            call_log_cap: 1000,
            param_truncate_len: 200,
        }
    }
}

struct Registered {
    tool: Arc<dyn Tool>,
    schema: ToolSchema,
    required: Vec<String>,
}

/// Named tools plus a bounded log of their invocations.
///
/// Build one registry at startup and share it behind an `Arc`.
pub struct ToolRegistry {
    tools: RwLock<HashMap<String, Registered>>,
    call_log: Mutex<CallLog>,
    config: RegistryConfig,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    pub fn with_config(config: RegistryConfig) -> Self {
        Self {
            tools: RwLock::new(HashMap::new()),
            call_log: Mutex::new(CallLog::new(config.call_log_cap)),
            config,
        }
    }

    /// Add `tool` to the registry.
    ///
    /// # Errors
    ///
    /// `Registration` when the name or description is empty, the input schema
    /// is not a compilable JSON Schema object, its `required` entry is not an
    /// array of strings, or the name is already taken.
    pub fn register_tool(&self, tool: Arc<dyn Tool>) -> PreauthResult<()> {
        let name = tool.name().trim().to_string();
        if name.is_empty() {
            return Err(registration("tool name must not be empty"));
        }
        if tool.description().trim().is_empty() {
            return Err(registration(format!("tool '{name}' has no description")));
        }

        let input_schema = tool.input_schema();
        let required = required_fields(&name, &input_schema)?;

        let schema = ToolSchema {
            name: name.clone(),
            description: tool.description().to_string(),
            input_schema,
            output_schema: tool.output_schema(),
            registered_at: Utc::now(),
        };

        let mut tools = self.write_tools();
        if tools.contains_key(&name) {
            return Err(registration(format!("tool '{name}' is already registered")));
        }
        tools.insert(
            name.clone(),
            Registered {
                tool,
                schema,
                required,
            },
        );
        info!(tool = %name, "tool registered");
        Ok(())
    }

    /// Remove `name` if present. Returns whether a tool was removed.
    pub fn unregister_tool(&self, name: &str) -> bool {
        let removed = self.write_tools().remove(name).is_some();
        if removed {
            info!(tool = %name, "tool unregistered");
        }
        removed
    }

    pub fn has_tool(&self, name: &str) -> bool {
        self.read_tools().contains_key(name)
    }

    /// Metadata for every registered tool, sorted by name.
    pub fn list_tools(&self) -> Vec<ToolSchema> {
        let mut schemas: Vec<ToolSchema> =
            self.read_tools().values().map(|r| r.schema.clone()).collect();
        schemas.sort_by(|a, b| a.name.cmp(&b.name));
        schemas
    }

    pub fn get_tool_schema(&self, name: &str) -> Option<ToolSchema> {
        self.read_tools().get(name).map(|r| r.schema.clone())
    }

    /// Invoke `name` with `params` through the three gates.
    pub async fn call_tool(&self, name: &str, params: Value) -> PreauthResult<Value> {
        let (tool, required) = {
            let tools = self.read_tools();
            match tools.get(name) {
                Some(r) => (Arc::clone(&r.tool), r.required.clone()),
                None => {
                    let mut available: Vec<String> = tools.keys().cloned().collect();
                    available.sort();
                    return Err(PreauthError::ToolNotFound {
                        name: name.to_string(),
                        available,
                    });
                }
            }
        };

        if let Some(field) = first_missing(&required, &params) {
            warn!(tool = %name, field = %field, "required parameter missing");
            return Err(PreauthError::Validation {
                tool: name.to_string(),
                field: field.to_string(),
            });
        }

        let logged_params = sanitize_params(&params, self.config.param_truncate_len);
        let started = Instant::now();
        let result = tool.execute(params).await;
        let duration_ms = started.elapsed().as_millis() as u64;

        match &result {
            Ok(_) => debug!(tool = %name, duration_ms, "tool call succeeded"),
            Err(err) => warn!(tool = %name, duration_ms, error = %err, "tool call failed"),
        }

        self.lock_log().push(CallLogEntry {
            call_id: Uuid::new_v4(),
            tool_name: name.to_string(),
            params: logged_params,
            duration_ms,
            success: result.is_ok(),
            error: result.as_ref().err().map(|e| e.to_string()),
            timestamp: Utc::now(),
        });

        result
    }

    /// The most recent `limit` calls, oldest first.
    pub fn call_log(&self, limit: usize) -> Vec<CallLogEntry> {
        self.lock_log().recent(limit)
    }

    /// Aggregates over the retained call log.
    pub fn stats(&self) -> RegistryStats {
        let registered_tools = self.read_tools().len();
        let log = self.lock_log();
        let total_calls = log.len();
        let success_rate = (!log.is_empty()).then(|| {
            let pct = log.successes() as f64 / total_calls as f64 * 100.0;
            (pct * 10.0).round() / 10.0
        });
        RegistryStats {
            registered_tools,
            total_calls,
            success_rate,
            calls_by_tool: log.counts_by_tool(),
        }
    }

    // ── Internal helpers ──────────────────────────────────────────────────────

    fn read_tools(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, Registered>> {
        self.tools.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_tools(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, Registered>> {
        self.tools.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_log(&self) -> MutexGuard<'_, CallLog> {
        self.call_log.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ToolInvoker for ToolRegistry {
    async fn call_tool(&self, name: &str, params: Value) -> PreauthResult<Value> {
        ToolRegistry::call_tool(self, name, params).await
    }
}

fn registration(reason: impl Into<String>) -> PreauthError {
    PreauthError::Registration {
        reason: reason.into(),
    }
}

/// Check that `schema` is a usable JSON Schema object and read its
/// `required` list.
fn required_fields(tool: &str, schema: &Value) -> PreauthResult<Vec<String>> {
    if !schema.is_object() {
        return Err(registration(format!(
            "tool '{tool}' input schema must be a JSON object"
        )));
    }
    if let Err(e) = jsonschema::validator_for(schema) {
        return Err(registration(format!(
            "tool '{tool}' input schema is not valid JSON Schema: {e}"
        )));
    }

    match schema.get("required") {
        None => Ok(Vec::new()),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| {
                item.as_str().map(str::to_string).ok_or_else(|| {
                    registration(format!(
                        "tool '{tool}' input schema 'required' must list strings"
                    ))
                })
            })
            .collect(),
        Some(_) => Err(registration(format!(
            "tool '{tool}' input schema 'required' must be an array"
        ))),
    }
}

/// The first required name that is absent or null in `params`.
fn first_missing<'a>(required: &'a [String], params: &Value) -> Option<&'a str> {
    required
        .iter()
        .find(|field| params.get(field.as_str()).map_or(true, Value::is_null))
        .map(String::as_str)
}
