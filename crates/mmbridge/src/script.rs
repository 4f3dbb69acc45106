//! Bridge to MediaMonkey's embedded JavaScript runtime (`runJSCode`)

use crate::host::AutomationHost;
use crate::AutomationError;
use serde::Deserialize;
use serde_json::Value;
use tracing::{instrument, warn};

/// Global installed by MediaMonkey that hands a string back to the caller.
pub const CALLBACK_NAME: &str = "runJSCode_callback";

#[derive(Debug, Deserialize)]
struct CallbackEnvelope {
    #[serde(default)]
    ok: bool,
    #[serde(default)]
    data: Value,
    error: Option<String>,
}

/// Wrap `code` so its result (or thrown error, or rejected promise) is
/// reported through [`CALLBACK_NAME`] as `{ok, data}` / `{ok: false, error}`.
pub fn wrap_with_callback(code: &str) -> String {
    const REPORT_ERROR: &str =
        "JSON.stringify({ok: false, error: err && err.message ? err.message : String(err)})";
    format!(
        "(() => {{ try {{ const result = (async () => {{ {code} }})(); \
         if (result && typeof result.then === 'function') {{ \
         result.then(value => {cb}(JSON.stringify({{ok: true, data: value}})), \
         err => {cb}({err_json})); \
         }} else {{ {cb}(JSON.stringify({{ok: true, data: result}})); }} \
         }} catch (err) {{ {cb}({err_json}); }} }})();",
        code = code,
        cb = CALLBACK_NAME,
        err_json = REPORT_ERROR,
    )
}

/// Run `code` inside MediaMonkey and wait for its result.
///
/// With `expect_callback`, code that does not call [`CALLBACK_NAME`] itself
/// is wrapped by [`wrap_with_callback`] and the reply is unpacked: the JSON
/// text of `data` on success, [`AutomationError::ScriptError`] on failure.
/// A reply that is not an envelope is returned verbatim. Without
/// `expect_callback` the raw reply is returned untouched.
#[instrument(skip(host, code), fields(len = code.len()))]
pub fn run_js(
    host: &dyn AutomationHost,
    code: &str,
    expect_callback: bool,
) -> Result<String, AutomationError> {
    if code.trim().is_empty() {
        return Err(AutomationError::InvalidArgument(
            "JavaScript payload cannot be empty".to_string(),
        ));
    }

    let wrapped = if expect_callback && !code.contains(CALLBACK_NAME) {
        wrap_with_callback(code)
    } else {
        code.to_string()
    };

    let reply = host.run_js_code(&wrapped, true)?;
    if !expect_callback {
        return Ok(reply);
    }

    let envelope: CallbackEnvelope = match serde_json::from_str(&reply) {
        Ok(envelope) => envelope,
        Err(e) => {
            warn!("runJSCode returned non-JSON data ({}): {}", e, reply);
            return Ok(reply);
        }
    };

    if !envelope.ok {
        return Err(AutomationError::ScriptError(
            envelope
                .error
                .unwrap_or_else(|| "Unknown MediaMonkey JS error".to_string()),
        ));
    }
    serde_json::to_string(&envelope.data).map_err(|e| AutomationError::Internal(e.to_string()))
}
