use anyhow::Result;
use mmbridge::{
    IniValue, IniValueType, MatchStrategy, PersistMode, PlaybackAction, Session,
};
use rmcp::{schemars, schemars::JsonSchema};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{warn, Level};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Directory override for the rolling log files.
pub const LOG_DIR_ENV: &str = "MMBRIDGE_LOG_DIR";

#[derive(Clone)]
pub struct MediaMonkeyWrapper {
    pub session: Arc<Session>,
    pub tool_router: rmcp::handler::server::tool::ToolRouter<Self>,
    /// Held for the duration of a tool call; MediaMonkey is driven by one
    /// call at a time.
    pub(crate) gate: Arc<Mutex<()>>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackActionArg {
    Play,
    Pause,
    Toggle,
    Stop,
    Next,
    Previous,
    StopAfterCurrent,
}

impl From<PlaybackActionArg> for PlaybackAction {
    fn from(arg: PlaybackActionArg) -> Self {
        match arg {
            PlaybackActionArg::Play => PlaybackAction::Play,
            PlaybackActionArg::Pause => PlaybackAction::Pause,
            PlaybackActionArg::Toggle => PlaybackAction::Toggle,
            PlaybackActionArg::Stop => PlaybackAction::Stop,
            PlaybackActionArg::Next => PlaybackAction::Next,
            PlaybackActionArg::Previous => PlaybackAction::Previous,
            PlaybackActionArg::StopAfterCurrent => PlaybackAction::StopAfterCurrent,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum MatchStrategyArg {
    #[default]
    Exact,
    #[serde(alias = "starts_with", alias = "prefix")]
    StartsWith,
    #[serde(alias = "substring")]
    Contains,
}

impl From<MatchStrategyArg> for MatchStrategy {
    fn from(arg: MatchStrategyArg) -> Self {
        match arg {
            MatchStrategyArg::Exact => MatchStrategy::Exact,
            MatchStrategyArg::StartsWith => MatchStrategy::StartsWith,
            MatchStrategyArg::Contains => MatchStrategy::Contains,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ValueTypeArg {
    #[default]
    String,
    Int,
    Bool,
}

impl From<ValueTypeArg> for IniValueType {
    fn from(arg: ValueTypeArg) -> Self {
        match arg {
            ValueTypeArg::String => IniValueType::String,
            ValueTypeArg::Int => IniValueType::Int,
            ValueTypeArg::Bool => IniValueType::Bool,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum PersistArg {
    #[default]
    None,
    Flush,
    Apply,
}

impl From<PersistArg> for PersistMode {
    fn from(arg: PersistArg) -> Self {
        match arg {
            PersistArg::None => PersistMode::None,
            PersistArg::Flush => PersistMode::Flush,
            PersistArg::Apply => PersistMode::Apply,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, JsonSchema)]
pub struct ControlPlaybackArgs {
    #[schemars(
        description = "One of: play, pause, toggle, stop, next, previous, stop_after_current."
    )]
    pub action: PlaybackActionArg,
}

#[derive(Debug, Deserialize, Serialize, JsonSchema)]
pub struct SetVolumeArgs {
    #[schemars(description = "Master volume from 0 to 100. Values outside the range are clamped.")]
    pub level: i64,
}

#[derive(Debug, Deserialize, Serialize, JsonSchema)]
pub struct SeekArgs {
    #[schemars(description = "Position within the current track, in milliseconds.")]
    pub playback_time_ms: i64,
}

#[derive(Debug, Deserialize, Serialize, JsonSchema, Default)]
pub struct ListNowPlayingArgs {
    #[schemars(description = "Maximum number of entries to return (1-100). Defaults to 25.")]
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize, Serialize, JsonSchema)]
pub struct RunJavascriptArgs {
    #[schemars(description = "JavaScript to run inside MediaMonkey. The value of a `return` statement (or a resolved promise) is returned as JSON.")]
    pub code: String,
    #[schemars(
        description = "Wrap the code so its result is reported through runJSCode_callback. Defaults to true. Set false to return MediaMonkey's raw reply."
    )]
    pub expect_callback: Option<bool>,
}

#[derive(Debug, Deserialize, Serialize, JsonSchema)]
pub struct InvokeMenuItemArgs {
    #[schemars(
        description = "Root collection under SDB.UI, e.g. 'MainMenu' or a toolbar name. Defaults to 'MainMenu'."
    )]
    pub scope: Option<String>,
    #[schemars(
        description = "Captions from the root to the item, e.g. [\"Tools\", \"Options...\"]. Accelerator markers, trailing ellipses and case are ignored. 1 to 8 entries."
    )]
    pub path: Vec<String>,
    #[schemars(description = "How captions are compared: exact (default), startswith or contains.")]
    pub match_strategy: Option<MatchStrategyArg>,
    #[schemars(description = "Invoke the item even when it reports itself disabled. Defaults to false.")]
    pub allow_disabled: Option<bool>,
}

#[derive(Debug, Deserialize, Serialize, JsonSchema)]
pub struct ConfigureSettingArgs {
    #[schemars(description = "INI section name.")]
    pub section: String,
    #[schemars(description = "INI key name.")]
    pub key: String,
    #[schemars(description = "New value (string, integer or boolean). Omit to read the current value.")]
    pub value: Option<serde_json::Value>,
    #[schemars(description = "Storage type of the entry: string (default), int or bool.")]
    pub value_type: Option<ValueTypeArg>,
    #[schemars(
        description = "Persistence after a write: none (default), flush, or apply (Apply then Flush where available)."
    )]
    pub persist: Option<PersistArg>,
}

/// Convert a JSON tool argument into an INI value. Only scalars are accepted.
pub fn json_to_ini_value(value: &serde_json::Value) -> Option<IniValue> {
    match value {
        serde_json::Value::Bool(b) => Some(IniValue::Bool(*b)),
        serde_json::Value::Number(n) => match n.as_i64() {
            Some(i) => Some(IniValue::Int(i)),
            None => Some(IniValue::Str(n.to_string())),
        },
        serde_json::Value::String(s) => Some(IniValue::Str(s.clone())),
        _ => None,
    }
}

fn log_directory() -> PathBuf {
    if let Ok(custom_dir) = env::var(LOG_DIR_ENV) {
        PathBuf::from(custom_dir)
    } else {
        dirs::data_local_dir()
            .unwrap_or_else(env::temp_dir)
            .join("mmbridge")
            .join("logs")
    }
}

fn log_filter(level: Level) -> Result<EnvFilter> {
    Ok(EnvFilter::from_default_env()
        .add_directive(level.into())
        .add_directive("axum::serve=error".parse()?)
        .add_directive("h2::proto=error".parse()?)
        .add_directive("h2::codec=error".parse()?)
        .add_directive("rmcp::transport=warn".parse()?)
        .add_directive("rmcp::transport::streamable_http_server=error".parse()?)
        .add_directive("rmcp::service=error".parse()?)
        .add_directive("hyper::proto=error".parse()?))
}

/// Log to stderr and to a daily rolling file. Nothing is ever written to
/// stdout, which carries the JSON-RPC stream in stdio mode.
pub fn init_logging() -> Result<()> {
    use tracing_appender::rolling;

    let log_level = env::var("LOG_LEVEL")
        .map(|level| match level.to_lowercase().as_str() {
            "error" => Level::ERROR,
            "warn" => Level::WARN,
            "info" => Level::INFO,
            "debug" => Level::DEBUG,
            _ => Level::INFO,
        })
        .unwrap_or(Level::INFO);

    let log_dir = log_directory();
    let dir_error = std::fs::create_dir_all(&log_dir).err();
    let file_appender = rolling::daily(&log_dir, "mmbridge-mcp-agent.log");

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(false)
                .with_filter(log_filter(log_level)?),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(file_appender)
                .with_ansi(false)
                .with_target(true)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true)
                .with_filter(log_filter(log_level)?),
        )
        .try_init()?;

    if let Some(e) = dir_error {
        warn!("Failed to create log directory {}: {}", log_dir.display(), e);
    }
    Ok(())
}
