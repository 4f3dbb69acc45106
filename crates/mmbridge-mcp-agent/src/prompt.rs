use chrono::Local;
use std::env;

pub fn get_server_instructions() -> String {
    let current_date_time = Local::now().to_string();
    let current_os = env::consts::OS;

    format!(
        "
You control a running MediaMonkey 5/2024 instance through its COM automation surface. Translate the user's request into tool calls.

**Playback**
*   `get_playback_state` first when you need to know what is playing. Every playback tool returns the state after the action.
*   `control_playback` actions: play, pause, toggle, stop, next, previous, stop_after_current.
*   `set_volume` takes 0-100. `seek` takes milliseconds from the start of the track.
*   `list_now_playing` returns the queue (default 25 entries, at most 100).

**Menus**
*   `invoke_menu_item` takes the captions shown in the UI, root first, e.g. `[\"Tools\", \"Options...\"]`. Do not worry about `&` accelerators, a trailing `...` or case.
*   Check `executed` in the result. A `null` in `matched_path` shows where the path stopped matching; retry with `match_strategy: \"startswith\"` or `\"contains\"` if the caption differs slightly.
*   Disabled items are not invoked unless `allow_disabled` is true.

**Settings**
*   `configure_setting` reads a value when `value` is omitted. Pass `value_type` (string, int, bool) matching the setting. Use `persist: \"apply\"` when MediaMonkey must pick up the change immediately.

**Scripting**
*   `run_javascript` runs code inside MediaMonkey. Use `return` to hand back data; errors come back as tool errors.

**Errors**
*   An error mentioning that MediaMonkey is unavailable means it is not running or not installed. The next call reconnects automatically.

Contextual information:
- The current date and time is {current_date_time}.
- Current operating system: {current_os}.
"
    )
}
