pub use crate::utils::MediaMonkeyWrapper;
use crate::utils::{
    json_to_ini_value, ConfigureSettingArgs, ControlPlaybackArgs, InvokeMenuItemArgs,
    ListNowPlayingArgs, RunJavascriptArgs, SeekArgs, SetVolumeArgs,
};
use mmbridge::menu::DEFAULT_MENU_SCOPE;
use mmbridge::player::{DEFAULT_NOW_PLAYING_LIMIT, MAX_NOW_PLAYING_LIMIT};
use mmbridge::{
    AutomationError, ConfigRequest, ConnectOptions, MediaMonkey, MenuPathRequest, Session,
};
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{
    CallToolResult, Content, Implementation, ProtocolVersion, ServerCapabilities, ServerInfo,
};
use rmcp::{tool, tool_handler, tool_router, ErrorData as McpError, ServerHandler};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Extracts JSON data from a tool result's content.
pub fn extract_content_json(content: &Content) -> Result<serde_json::Value, serde_json::Error> {
    match &content.raw {
        rmcp::model::RawContent::Text(text_content) => {
            if let Ok(parsed_json) = serde_json::from_str::<serde_json::Value>(&text_content.text) {
                Ok(parsed_json)
            } else {
                Ok(json!({"type": "text", "text": text_content.text}))
            }
        }
        other => serde_json::to_value(other),
    }
}

fn error_kind(error: &AutomationError) -> &'static str {
    match error {
        AutomationError::Unavailable(_) => "unavailable",
        AutomationError::InvalidArgument(_) => "invalid_argument",
        AutomationError::ScopeNotFound(_) => "scope_not_found",
        AutomationError::UnsupportedOperation(_) => "unsupported_operation",
        AutomationError::SignatureMismatch(_) => "signature_mismatch",
        AutomationError::PlatformError(_) => "platform_error",
        AutomationError::ScriptError(_) => "script_error",
        AutomationError::Internal(_) => "internal",
    }
}

/// Map a core failure onto the MCP error space.
pub fn to_mcp_error(tool: &str, error: AutomationError) -> McpError {
    let data = Some(json!({"tool": tool, "kind": error_kind(&error)}));
    match error {
        AutomationError::InvalidArgument(message) => McpError::invalid_params(message, data),
        other => McpError::internal_error(other.to_string(), data),
    }
}

fn json_result<T: Serialize>(value: &T) -> Result<CallToolResult, McpError> {
    let value = serde_json::to_value(value).map_err(|e| {
        McpError::internal_error("Failed to serialize tool result", Some(json!(e.to_string())))
    })?;
    Ok(CallToolResult::success(vec![Content::json(value)?]))
}

impl MediaMonkeyWrapper {
    /// Server connecting to MediaMonkey on the first tool call.
    pub fn new(options: ConnectOptions) -> Self {
        Self::with_session(Session::with_options(options))
    }

    pub fn with_session(session: Session) -> Self {
        Self {
            session: Arc::new(session),
            tool_router: Self::tool_router(),
            gate: Arc::new(Mutex::new(())),
        }
    }

    /// Run `op` on a blocking thread against the shared session, one call
    /// at a time.
    ///
    /// The gate guard moves into the blocking task, so a cancelled call keeps
    /// the gate until its host work has actually finished.
    pub(crate) async fn with_session_op<T, F>(
        &self,
        tool: &'static str,
        op: F,
    ) -> Result<T, McpError>
    where
        T: Send + 'static,
        F: FnOnce(&MediaMonkey) -> Result<T, AutomationError> + Send + 'static,
    {
        let guard = self.gate.clone().lock_owned().await;
        let session = self.session.clone();
        let outcome = tokio::task::spawn_blocking(move || {
            let _guard = guard;
            session.run(op)
        })
            .await
            .map_err(|e| {
                McpError::internal_error(
                    format!("{tool} did not complete"),
                    Some(json!({"tool": tool, "reason": e.to_string()})),
                )
            })?;
        outcome.map_err(|e| {
            warn!("{} failed: {}", tool, e);
            to_mcp_error(tool, e)
        })
    }
}

#[tool_router]
impl MediaMonkeyWrapper {
    #[tool(
        description = "Returns the player state: playing/paused flags, shuffle, repeat, stop-after-current, volume (0-100), position and length in milliseconds, Now Playing index and size, and the current track's metadata. Read-only."
    )]
    pub async fn get_playback_state(&self) -> Result<CallToolResult, McpError> {
        let state = self
            .with_session_op("get_playback_state", |mm| mm.playback_state())
            .await?;
        json_result(&state)
    }

    #[tool(
        description = "Controls playback: play, pause, toggle, stop, next, previous, or stop_after_current (flips the stop-after-current flag). Returns the player state afterwards."
    )]
    pub async fn control_playback(
        &self,
        Parameters(args): Parameters<ControlPlaybackArgs>,
    ) -> Result<CallToolResult, McpError> {
        info!("control_playback {:?}", args.action);
        let action = args.action.into();
        let state = self
            .with_session_op("control_playback", move |mm| mm.control_playback(action))
            .await?;
        json_result(&state)
    }

    #[tool(description = "Sets the master volume (0-100, clamped). Returns the player state afterwards.")]
    pub async fn set_volume(
        &self,
        Parameters(args): Parameters<SetVolumeArgs>,
    ) -> Result<CallToolResult, McpError> {
        let level = args.level;
        let state = self
            .with_session_op("set_volume", move |mm| mm.set_volume(level))
            .await?;
        json_result(&state)
    }

    #[tool(
        description = "Seeks within the current track to a position in milliseconds (negative values seek to the start). Returns the player state afterwards."
    )]
    pub async fn seek(&self, Parameters(args): Parameters<SeekArgs>) -> Result<CallToolResult, McpError> {
        let position = args.playback_time_ms;
        let state = self
            .with_session_op("seek", move |mm| mm.seek(position))
            .await?;
        json_result(&state)
    }

    #[tool(
        description = "Lists the first entries of the Now Playing queue with their metadata. Entries that cannot be read are skipped. Read-only."
    )]
    pub async fn list_now_playing(
        &self,
        Parameters(args): Parameters<ListNowPlayingArgs>,
    ) -> Result<CallToolResult, McpError> {
        let limit = args.limit.unwrap_or(DEFAULT_NOW_PLAYING_LIMIT);
        if !(1..=MAX_NOW_PLAYING_LIMIT).contains(&limit) {
            return Err(McpError::invalid_params(
                format!("limit must be between 1 and {MAX_NOW_PLAYING_LIMIT}"),
                Some(json!({"limit": limit})),
            ));
        }
        let tracks = self
            .with_session_op("list_now_playing", move |mm| mm.now_playing(limit))
            .await?;
        json_result(&json!({"count": tracks.len(), "tracks": tracks}))
    }

    #[tool(
        description = "Runs JavaScript inside MediaMonkey through runJSCode and waits for the result. The code runs in an async function: use `return` to hand back a JSON-serializable value. Thrown errors and rejected promises are reported as tool errors."
    )]
    pub async fn run_javascript(
        &self,
        Parameters(args): Parameters<RunJavascriptArgs>,
    ) -> Result<CallToolResult, McpError> {
        let expect_callback = args.expect_callback.unwrap_or(true);
        let code = args.code;
        let output = self
            .with_session_op("run_javascript", move |mm| mm.run_js(&code, expect_callback))
            .await?;
        Ok(CallToolResult::success(vec![Content::text(output)]))
    }

    #[tool(
        description = "Finds a menu or toolbar item by its caption path (e.g. [\"Tools\", \"Options...\"]) and invokes it. Captions are matched ignoring '&' accelerators, a trailing ellipsis and case. Reports the captions actually matched, whether the item was enabled, and whether it executed; a path that does not fully resolve is reported, not raised."
    )]
    pub async fn invoke_menu_item(
        &self,
        Parameters(args): Parameters<InvokeMenuItemArgs>,
    ) -> Result<CallToolResult, McpError> {
        let scope = args
            .scope
            .filter(|scope| !scope.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_MENU_SCOPE.to_string());
        let request = MenuPathRequest::new(scope, args.path)
            .with_strategy(args.match_strategy.unwrap_or_default().into())
            .allow_disabled(args.allow_disabled.unwrap_or(false));
        info!("invoke_menu_item {:?} in {}", request.path, request.scope);

        let result = self
            .with_session_op("invoke_menu_item", move |mm| mm.invoke_menu_item(&request))
            .await?;
        json_result(&result)
    }

    #[tool(
        description = "Reads or writes a MediaMonkey INI setting. Without `value` the current value is returned. With `value` the setting is written, optionally persisted (flush or apply), and read back; the previous value is included. Booleans accept 1/true/yes/on/y/t. An entry that cannot be read as `value_type` (e.g. non-numeric text read as int) comes back as null."
    )]
    pub async fn configure_setting(
        &self,
        Parameters(args): Parameters<ConfigureSettingArgs>,
    ) -> Result<CallToolResult, McpError> {
        let value = match args.value.as_ref() {
            None | Some(serde_json::Value::Null) => None,
            Some(raw) => Some(json_to_ini_value(raw).ok_or_else(|| {
                McpError::invalid_params(
                    "value must be a string, number or boolean",
                    Some(json!({"value": raw})),
                )
            })?),
        };
        let request = ConfigRequest {
            section: args.section,
            key: args.key,
            value,
            value_type: args.value_type.unwrap_or_default().into(),
            persist: args.persist.unwrap_or_default().into(),
        };
        info!("configure_setting [{}] {}", request.section, request.key);

        let result = self
            .with_session_op("configure_setting", move |mm| mm.configure(&request))
            .await?;
        json_result(&result)
    }
}

#[tool_handler]
impl ServerHandler for MediaMonkeyWrapper {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation::from_build_env(),
            instructions: Some(crate::prompt::get_server_instructions()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mmbridge::platforms::memory::MemoryHost;
    use mmbridge::AutomationHost;
    use std::sync::mpsc;
    use std::time::Duration;

    #[test]
    fn invalid_arguments_map_to_invalid_params() {
        let err = to_mcp_error("x", AutomationError::InvalidArgument("bad".into()));
        assert_eq!(err.code, rmcp::model::ErrorCode::INVALID_PARAMS);
        assert_eq!(err.message, "bad");
    }

    #[test]
    fn other_errors_map_to_internal_error() {
        let err = to_mcp_error("x", AutomationError::Unavailable("gone".into()));
        assert_eq!(err.code, rmcp::model::ErrorCode::INTERNAL_ERROR);
        assert!(err.message.contains("gone"));
        assert_eq!(err.data.unwrap()["kind"], "unavailable");
    }

    #[tokio::test]
    async fn cancelled_call_keeps_gate_until_host_work_ends() {
        let host = Arc::new(MemoryHost::new());
        let wrapper = MediaMonkeyWrapper::with_session(Session::new(move || {
            Ok(host.clone() as Arc<dyn AutomationHost>)
        }));

        let (started_tx, started_rx) = mpsc::channel::<()>();
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let call = {
            let wrapper = wrapper.clone();
            tokio::spawn(async move {
                wrapper
                    .with_session_op("slow", move |_mm| {
                        started_tx.send(()).ok();
                        release_rx.recv().ok();
                        Ok(())
                    })
                    .await
            })
        };

        tokio::task::spawn_blocking(move || started_rx.recv())
            .await
            .unwrap()
            .unwrap();
        call.abort();
        assert!(call.await.unwrap_err().is_cancelled());

        assert!(wrapper.gate.try_lock().is_err());

        release_tx.send(()).unwrap();
        let next = tokio::time::timeout(Duration::from_secs(5), wrapper.gate.lock()).await;
        assert!(next.is_ok());
    }
}
