use anyhow::Result;
use axum::middleware::Next;
use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use clap::{Parser, ValueEnum};
use mmbridge::platforms::{DEFAULT_PROG_ID, PROG_ID_ENV};
use mmbridge::ConnectOptions;
use mmbridge_mcp_agent::server::MediaMonkeyWrapper;
use mmbridge_mcp_agent::utils::init_logging;
use rmcp::{
    transport::stdio,
    transport::streamable_http_server::{
        session::local::LocalSessionManager, StreamableHttpService,
    },
    ServiceExt,
};
use std::net::SocketAddr;
use tower_http::cors::CorsLayer;
use tracing::{debug, error, info};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "MediaMonkey MCP Server - menu, settings and playback automation via Model Context Protocol"
)]
struct Args {
    /// Transport mode to use
    #[arg(short, long, value_enum, default_value = "stdio")]
    transport: TransportMode,

    /// Port to listen on (only used for the HTTP transport)
    #[arg(short, long, default_value = "3000")]
    port: u16,

    /// Host to bind to (only used for the HTTP transport)
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Enable CORS for the HTTP transport
    #[arg(long)]
    cors: bool,

    /// Bearer token required by the HTTP transport (can also use MCP_AUTH_TOKEN env var)
    #[arg(long, env = "MCP_AUTH_TOKEN")]
    auth_token: Option<String>,

    /// COM ProgID of the MediaMonkey application object
    #[arg(long, env = PROG_ID_ENV, default_value = DEFAULT_PROG_ID)]
    prog_id: String,

    /// Let MediaMonkey shut down when the server disconnects
    #[arg(long)]
    no_keep_alive: bool,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
enum TransportMode {
    /// Standard I/O transport (default)
    Stdio,
    /// Streamable HTTP transport
    Http,
}

#[derive(Clone)]
struct AppState {
    auth_token: Option<String>,
    wrapper: MediaMonkeyWrapper,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // stdout carries the JSON-RPC stream; panics go to stderr only.
    std::panic::set_hook(Box::new(|panic_info| {
        if let Some(s) = panic_info.payload().downcast_ref::<&str>() {
            eprintln!("MCP Server Panic: {s}");
        } else if let Some(s) = panic_info.payload().downcast_ref::<String>() {
            eprintln!("MCP Server Panic: {s}");
        } else {
            eprintln!("MCP Server Panic occurred");
        }
        if let Some(location) = panic_info.location() {
            eprintln!("Panic location: {}:{}", location.file(), location.line());
        }
    }));

    init_logging()?;

    let options = ConnectOptions {
        prog_id: args.prog_id.clone(),
        keep_alive: !args.no_keep_alive,
    };
    info!(
        "Initializing MediaMonkey MCP server (ProgID {}, keep-alive {})",
        options.prog_id, options.keep_alive
    );
    let wrapper = MediaMonkeyWrapper::new(options);

    match args.transport {
        TransportMode::Stdio => {
            info!("Starting stdio transport...");
            let service = wrapper.serve(stdio()).await.inspect_err(|e| {
                error!("Serving error: {:?}", e);
                eprintln!("Fatal: stdio communication error: {e}");
            })?;
            service.waiting().await?;
        }
        TransportMode::Http => {
            let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
            info!("Starting streamable HTTP server on http://{}", addr);

            let service = StreamableHttpService::new(
                {
                    let wrapper = wrapper.clone();
                    move || Ok(wrapper.clone())
                },
                LocalSessionManager::default().into(),
                Default::default(),
            );

            let app_state = AppState {
                auth_token: args.auth_token.clone(),
                wrapper,
            };

            let mcp_router = Router::new()
                .fallback_service(service)
                .layer(axum::middleware::from_fn_with_state(
                    app_state.clone(),
                    auth_middleware,
                ));

            let mut router: Router = Router::new()
                .route("/", get(root_handler))
                .route("/health", get(health_check))
                .route("/status", get(status_handler))
                .nest("/mcp", mcp_router)
                .with_state(app_state);

            if args.cors {
                router = router.layer(CorsLayer::permissive());
            }

            let tcp_listener = tokio::net::TcpListener::bind(addr).await?;

            info!("Streamable HTTP server running on http://{addr}");
            if args.cors {
                info!("CORS enabled - accessible from web browsers");
            }
            if args.auth_token.is_some() {
                info!("Bearer token authentication enabled for /mcp");
            }
            info!("  MCP client endpoint: http://{addr}/mcp");
            info!("  Health check: http://{addr}/health");
            info!("Press Ctrl+C to stop");

            axum::serve(tcp_listener, router)
                .with_graceful_shutdown(async {
                    tokio::signal::ctrl_c().await.ok();
                    info!("Received shutdown signal");
                })
                .await?;

            info!("Shutting down HTTP server");
        }
    }

    Ok(())
}

async fn auth_middleware(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> impl IntoResponse {
    let Some(expected) = state.auth_token.as_deref() else {
        return next.run(req).await;
    };

    let token = req
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));
    if token == Some(expected) {
        return next.run(req).await;
    }

    debug!("Authentication failed - invalid or missing Bearer token");
    let body = serde_json::json!({
        "error": {
            "code": -32001,
            "message": "Unauthorized - invalid or missing Bearer token"
        }
    });
    (StatusCode::UNAUTHORIZED, Json(body)).into_response()
}

async fn root_handler() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(serde_json::json!({
            "name": "MediaMonkey MCP Server",
            "description": "MediaMonkey automation via Model Context Protocol",
            "version": env!("CARGO_PKG_VERSION"),
            "endpoints": {
                "/": "This endpoint - lists available endpoints",
                "/mcp": "MCP protocol endpoint - connect your MCP client here",
                "/health": "Liveness check",
                "/status": "Whether a MediaMonkey session is currently held"
            },
            "timestamp": chrono::Utc::now().to_rfc3339()
        })),
    )
}

async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({"status": "ok"})))
}

async fn status_handler(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(serde_json::json!({
            "connected": state.wrapper.session.is_connected(),
            "timestamp": chrono::Utc::now().to_rfc3339()
        })),
    )
}
