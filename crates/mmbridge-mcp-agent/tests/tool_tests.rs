use mmbridge::host::{SongField, TriggerMechanism};
use mmbridge::platforms::memory::{MemoryHost, MemoryIniStore, MemoryMenuNode, MemorySong};
use mmbridge::{AutomationHost, HostValue, Session};
use mmbridge_mcp_agent::extract_content_json;
use mmbridge_mcp_agent::utils::{
    ConfigureSettingArgs, ControlPlaybackArgs, InvokeMenuItemArgs, ListNowPlayingArgs,
    MatchStrategyArg, PersistArg, PlaybackActionArg, RunJavascriptArgs, SetVolumeArgs,
    ValueTypeArg,
};
use mmbridge_mcp_agent::MediaMonkeyWrapper;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::CallToolResult;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn server_for(host: Arc<MemoryHost>) -> (MediaMonkeyWrapper, Arc<AtomicUsize>) {
    let connects = Arc::new(AtomicUsize::new(0));
    let counter = connects.clone();
    let session = Session::new(move || {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(host.clone() as Arc<dyn AutomationHost>)
    });
    (MediaMonkeyWrapper::with_session(session), connects)
}

fn first_json(result: CallToolResult) -> serde_json::Value {
    let content = result.content;
    assert_eq!(content.len(), 1);
    extract_content_json(&content[0]).unwrap()
}

fn menu_host() -> (Arc<MemoryHost>, Arc<MemoryMenuNode>) {
    let options = MemoryMenuNode::new("&Options...").into_arc();
    let main_menu = MemoryMenuNode::new("MainMenu").with_child(
        MemoryMenuNode::new("&Tools")
            .with_child(MemoryMenuNode::new("&Scan folders...").disabled())
            .with_child_ref(options.clone()),
    );
    let host = Arc::new(
        MemoryHost::new()
            .with_scope("MainMenu", main_menu)
            .with_ini(MemoryIniStore::new().with_entry("Options", "Volume", 40i64)),
    );
    (host, options)
}

fn invoke_args(path: &[&str]) -> InvokeMenuItemArgs {
    InvokeMenuItemArgs {
        scope: None,
        path: path.iter().map(|s| s.to_string()).collect(),
        match_strategy: None,
        allow_disabled: None,
    }
}

#[tokio::test]
async fn invoke_menu_item_executes_tools_options() {
    let (host, options) = menu_host();
    let (server, _) = server_for(host);

    let result = server
        .invoke_menu_item(Parameters(invoke_args(&["Tools", "Options..."])))
        .await
        .unwrap();
    let body = first_json(result);

    assert_eq!(body["scope"], "MainMenu");
    assert_eq!(body["matched_path"], json!(["&Tools", "&Options..."]));
    assert_eq!(body["executed"], true);
    assert_eq!(options.fired(), vec![TriggerMechanism::Execute]);
}

#[tokio::test]
async fn invoke_menu_item_reports_partial_match() {
    let (host, _) = menu_host();
    let (server, _) = server_for(host);

    let mut args = invoke_args(&["Tools", "Preferences"]);
    args.match_strategy = Some(MatchStrategyArg::StartsWith);
    let body = first_json(server.invoke_menu_item(Parameters(args)).await.unwrap());

    assert_eq!(body["matched_path"], json!(["&Tools", null]));
    assert_eq!(body["executed"], false);
    assert_eq!(body["caption"], serde_json::Value::Null);
}

#[tokio::test]
async fn invoke_menu_item_leaves_disabled_items_alone() {
    let (host, _) = menu_host();
    let (server, _) = server_for(host);

    let body = first_json(
        server
            .invoke_menu_item(Parameters(invoke_args(&["Tools", "Scan folders"])))
            .await
            .unwrap(),
    );
    assert_eq!(body["enabled"], false);
    assert_eq!(body["executed"], false);

    let mut forced = invoke_args(&["Tools", "Scan folders"]);
    forced.allow_disabled = Some(true);
    let body = first_json(server.invoke_menu_item(Parameters(forced)).await.unwrap());
    assert_eq!(body["executed"], true);
}

#[tokio::test]
async fn invoke_menu_item_rejects_empty_path() {
    let (host, _) = menu_host();
    let (server, _) = server_for(host);

    let err = server
        .invoke_menu_item(Parameters(invoke_args(&[])))
        .await
        .unwrap_err();
    assert_eq!(err.code, rmcp::model::ErrorCode::INVALID_PARAMS);
}

#[tokio::test]
async fn configure_setting_writes_and_reads_back() {
    let (host, _) = menu_host();
    let (server, _) = server_for(host.clone());

    let args = ConfigureSettingArgs {
        section: "Options".to_string(),
        key: "Volume".to_string(),
        value: Some(json!("75")),
        value_type: Some(ValueTypeArg::Int),
        persist: Some(PersistArg::Apply),
    };
    let body = first_json(server.configure_setting(Parameters(args)).await.unwrap());

    assert_eq!(body["value"], 75);
    assert_eq!(body["previous_value"], 40);
    assert_eq!(body["applied"], true);
    assert_eq!(host.ini().raw("Options", "Volume"), Some(HostValue::Int(75)));
}

#[tokio::test]
async fn configure_setting_reads_without_value() {
    let (host, _) = menu_host();
    let (server, _) = server_for(host.clone());

    let args = ConfigureSettingArgs {
        section: "Options".to_string(),
        key: "Volume".to_string(),
        value: None,
        value_type: Some(ValueTypeArg::Int),
        persist: None,
    };
    let body = first_json(server.configure_setting(Parameters(args)).await.unwrap());

    assert_eq!(body["value"], 40);
    assert_eq!(body["applied"], false);
    assert_eq!(host.ini().write_attempts(), 0);
}

#[tokio::test]
async fn configure_setting_reports_unparseable_int_as_null() {
    let host = Arc::new(
        MemoryHost::new().with_ini(MemoryIniStore::new().with_entry("Options", "Crossfade", "abc")),
    );
    let (server, _) = server_for(host.clone());

    let args = ConfigureSettingArgs {
        section: "Options".to_string(),
        key: "Crossfade".to_string(),
        value: None,
        value_type: Some(ValueTypeArg::Int),
        persist: None,
    };
    let body = first_json(server.configure_setting(Parameters(args)).await.unwrap());

    assert_eq!(body["value"], serde_json::Value::Null);
    assert_eq!(body["previous_value"], serde_json::Value::Null);
    assert_eq!(body["value_type"], "int");
    assert_eq!(host.ini().write_attempts(), 0);
}

#[tokio::test]
async fn configure_setting_rejects_structured_values() {
    let (host, _) = menu_host();
    let (server, _) = server_for(host.clone());

    let args = ConfigureSettingArgs {
        section: "Options".to_string(),
        key: "Volume".to_string(),
        value: Some(json!({"nested": true})),
        value_type: None,
        persist: None,
    };
    let err = server.configure_setting(Parameters(args)).await.unwrap_err();
    assert_eq!(err.code, rmcp::model::ErrorCode::INVALID_PARAMS);
    assert_eq!(host.ini().write_attempts(), 0);
}

#[tokio::test]
async fn playback_tools_drive_the_player() {
    let host = Arc::new(MemoryHost::new());
    host.player_state().queue(vec![
        MemorySong::new().with(SongField::Title, "One"),
        MemorySong::new().with(SongField::Title, "Two"),
    ]);
    host.player_state().current(0);
    let (server, _) = server_for(host);

    let body = first_json(
        server
            .control_playback(Parameters(ControlPlaybackArgs {
                action: PlaybackActionArg::Play,
            }))
            .await
            .unwrap(),
    );
    assert_eq!(body["is_playing"], true);

    let body = first_json(
        server
            .set_volume(Parameters(SetVolumeArgs { level: 250 }))
            .await
            .unwrap(),
    );
    assert_eq!(body["volume"], 100);

    let body = first_json(server.get_playback_state().await.unwrap());
    assert_eq!(body["track"]["title"], "One");
}

#[tokio::test]
async fn list_now_playing_validates_limit() {
    let host = Arc::new(MemoryHost::new());
    host.player_state().queue(vec![
        MemorySong::new().with(SongField::Title, "One"),
        MemorySong::new().with(SongField::Title, "Two"),
    ]);
    let (server, connects) = server_for(host);

    let err = server
        .list_now_playing(Parameters(ListNowPlayingArgs { limit: Some(0) }))
        .await
        .unwrap_err();
    assert_eq!(err.code, rmcp::model::ErrorCode::INVALID_PARAMS);
    assert_eq!(connects.load(Ordering::SeqCst), 0);

    let body = first_json(
        server
            .list_now_playing(Parameters(ListNowPlayingArgs::default()))
            .await
            .unwrap(),
    );
    assert_eq!(body["count"], 2);
    assert_eq!(body["tracks"][1]["title"], "Two");
}

#[tokio::test]
async fn run_javascript_returns_callback_data() {
    let host = Arc::new(MemoryHost::new());
    host.push_js_reply(Ok(r#"{"ok":true,"data":{"tracks":3}}"#.to_string()));
    let (server, _) = server_for(host.clone());

    let body = first_json(
        server
            .run_javascript(Parameters(RunJavascriptArgs {
                code: "return {tracks: 3};".to_string(),
                expect_callback: None,
            }))
            .await
            .unwrap(),
    );
    assert_eq!(body, json!({"tracks": 3}));
    assert!(host.scripts()[0].contains("runJSCode_callback"));
}

#[tokio::test]
async fn run_javascript_surfaces_script_errors() {
    let host = Arc::new(MemoryHost::new());
    host.push_js_reply(Ok(r#"{"ok":false,"error":"boom"}"#.to_string()));
    let (server, _) = server_for(host);

    let err = server
        .run_javascript(Parameters(RunJavascriptArgs {
            code: "throw new Error('boom')".to_string(),
            expect_callback: None,
        }))
        .await
        .unwrap_err();
    assert_eq!(err.code, rmcp::model::ErrorCode::INTERNAL_ERROR);
    assert!(err.message.contains("boom"));
}

#[tokio::test]
async fn unavailable_host_resets_session_and_reconnects() {
    let (host, _) = menu_host();
    let (server, connects) = server_for(host.clone());

    server.get_playback_state().await.unwrap();
    assert_eq!(connects.load(Ordering::SeqCst), 1);
    assert!(server.session.is_connected());

    host.set_unavailable(true);
    let err = server.get_playback_state().await.unwrap_err();
    assert_eq!(err.code, rmcp::model::ErrorCode::INTERNAL_ERROR);
    assert!(!server.session.is_connected());

    host.set_unavailable(false);
    server.get_playback_state().await.unwrap();
    assert_eq!(connects.load(Ordering::SeqCst), 2);
}
