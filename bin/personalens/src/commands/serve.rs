use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message as WsMessage, WebSocket, WebSocketUpgrade},
        Path as AxumPath, State,
    },
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use futures::{SinkExt, StreamExt};
use personalens_browser::{Automation, ChromeAutomation};
use personalens_classifier::suggestions_for;
use personalens_core::config::{default_config_path, Config};
use personalens_core::persona::{builtin_objectives, builtin_personas, find_objective};
use personalens_core::types::{Goal, PageType};
use personalens_gateway::create_service;
use personalens_session::{CommandOutcome, SessionCommand, SessionMachine, StartOptions};
use serde::Deserialize;
use tokio::sync::mpsc;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

#[derive(Clone)]
struct ServerState {
    config: Config,
}

pub async fn run(host: Option<String>, port: Option<u16>) -> anyhow::Result<()> {
    let config = Config::load_or_default(&default_config_path())?;
    let host = host.unwrap_or_else(|| config.transport.host.clone());
    let port = port.unwrap_or(config.transport.port);

    let state = ServerState { config };

    let app = Router::new()
        .route("/api/personas", get(handle_personas))
        .route("/api/objectives", get(handle_objectives))
        .route("/api/suggestions/:page_type", get(handle_suggestions))
        .route("/ws", get(handle_ws_upgrade))
        .layer(CorsLayer::permissive())
        .with_state(state);

    let addr = format!("{host}:{port}");
    info!(%addr, "session server listening");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn handle_personas() -> impl IntoResponse {
    Json(builtin_personas())
}

async fn handle_objectives() -> impl IntoResponse {
    Json(builtin_objectives())
}

/// Unknown page type strings fall back to the generic suggestion set.
async fn handle_suggestions(AxumPath(page_type): AxumPath<String>) -> impl IntoResponse {
    let page_type: PageType =
        serde_json::from_value(serde_json::Value::String(page_type)).unwrap_or_default();
    Json(serde_json::json!({ "suggestions": suggestions_for(page_type) }))
}

// ---------------------------------------------------------------------------
// WebSocket session protocol
// ---------------------------------------------------------------------------
//
// The first text frame must be a start message; every later frame is a
// session command. Outbound frames are tagged "transcript", "event",
// "ack", "export" or "error".

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StartMessage {
    persona_id: String,
    #[serde(default)]
    custom_profile: Option<String>,
    start_url: String,
    /// Objective id. Present iff the session should run autonomously.
    #[serde(default)]
    objective: Option<String>,
    #[serde(default)]
    max_steps: Option<u32>,
}

async fn handle_ws_upgrade(
    ws: WebSocketUpgrade,
    State(state): State<ServerState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_ws_connection(socket, state))
}

async fn handle_ws_connection(socket: WebSocket, state: ServerState) {
    info!("client connected");

    let (mut ws_sender, mut ws_receiver) = socket.split();

    // Single writer task; both the event forwarder and the command loop
    // push frames through this channel.
    let (out_tx, mut out_rx) = mpsc::channel::<String>(64);
    let send_task = tokio::spawn(async move {
        while let Some(frame) = out_rx.recv().await {
            if ws_sender.send(WsMessage::Text(frame)).await.is_err() {
                break;
            }
        }
    });

    // First frame: the start message.
    let start = loop {
        match ws_receiver.next().await {
            Some(Ok(WsMessage::Text(text))) => {
                match serde_json::from_str::<StartMessage>(&text) {
                    Ok(start) => break Some(start),
                    Err(e) => {
                        let _ = out_tx.send(error_frame(&format!("invalid start message: {e}"))).await;
                        break None;
                    }
                }
            }
            Some(Ok(WsMessage::Close(_))) | None => break None,
            Some(Ok(_)) => continue,
            Some(Err(e)) => {
                warn!(error = %e, "websocket receive error");
                break None;
            }
        }
    };
    let Some(start) = start else {
        send_task.abort();
        return;
    };

    let goal = start
        .objective
        .as_deref()
        .map(|id| goal_for(id, start.max_steps, state.config.session.max_steps));

    let automation = match ChromeAutomation::launch(&state.config.browser).await {
        Ok(automation) => Arc::new(automation),
        Err(e) => {
            let _ = out_tx.send(error_frame(&format!("browser launch failed: {e}"))).await;
            send_task.abort();
            return;
        }
    };
    let service = match create_service(&state.config) {
        Ok(service) => service,
        Err(e) => {
            let _ = out_tx.send(error_frame(&e.to_string())).await;
            automation.close().await;
            send_task.abort();
            return;
        }
    };

    let opts = StartOptions {
        persona_id: start.persona_id,
        custom_profile: start.custom_profile,
        start_url: start.start_url,
        goal,
    };
    let machine = match SessionMachine::start(&state.config, automation, service, opts).await {
        Ok(machine) => machine,
        Err(e) => {
            let _ = out_tx.send(error_frame(&e.to_string())).await;
            send_task.abort();
            return;
        }
    };

    // Subscribe before replaying the snapshot so no event is lost in
    // between; start() appends nothing after it returns.
    let mut events = machine.subscribe();
    let _ = out_tx.send(transcript_frame(&machine).await).await;

    let forward_tx = out_tx.clone();
    let forward_task = tokio::spawn(async move {
        while let Ok(item) = events.recv().await {
            let frame = serde_json::json!({
                "type": "event",
                "status": item.status,
                "event": item.event,
            });
            if forward_tx.send(frame.to_string()).await.is_err() {
                break;
            }
        }
    });

    let mut ended = false;
    while let Some(msg) = ws_receiver.next().await {
        let msg = match msg {
            Ok(m) => m,
            Err(e) => {
                warn!(error = %e, "websocket receive error");
                break;
            }
        };
        let text = match msg {
            WsMessage::Text(text) => text,
            WsMessage::Close(_) => break,
            _ => continue,
        };

        // Snapshot replay is a transport concern, not a session command.
        if let Ok(value) = serde_json::from_str::<serde_json::Value>(&text) {
            if value.get("type").and_then(|v| v.as_str()) == Some("transcript") {
                let _ = out_tx.send(transcript_frame(&machine).await).await;
                continue;
            }
        }

        let command = match serde_json::from_str::<SessionCommand>(&text) {
            Ok(command) => command,
            Err(e) => {
                let _ = out_tx.send(error_frame(&format!("invalid command: {e}"))).await;
                continue;
            }
        };
        let is_end = matches!(command, SessionCommand::End);

        match machine.handle(command).await {
            Ok(CommandOutcome::Export(markdown)) => {
                let frame = serde_json::json!({ "type": "export", "markdown": markdown });
                let _ = out_tx.send(frame.to_string()).await;
            }
            Ok(CommandOutcome::Accepted) => {
                let frame = serde_json::json!({
                    "type": "ack",
                    "status": machine.status().await,
                    "suggestions": machine.current_suggestions().await,
                });
                let _ = out_tx.send(frame.to_string()).await;
            }
            Err(e) => {
                let _ = out_tx.send(error_frame(&e.to_string())).await;
            }
        }

        if is_end {
            ended = true;
            break;
        }
    }

    // A dropped connection must not leave a Chrome process behind.
    if !ended {
        let _ = machine.handle(SessionCommand::End).await;
    }
    forward_task.abort();
    send_task.abort();
    info!("client disconnected");
}

async fn transcript_frame(machine: &SessionMachine) -> String {
    serde_json::json!({
        "type": "transcript",
        "sessionId": machine.session_id().await,
        "status": machine.status().await,
        "suggestions": machine.current_suggestions().await,
        "events": machine.transcript_snapshot().await,
    })
    .to_string()
}

/// A step budget of 0 would finish the run before the first observation;
/// one step is the floor.
fn goal_for(objective_id: &str, max_steps: Option<u32>, default_max_steps: u32) -> Goal {
    let objective = find_objective(objective_id);
    Goal {
        objective: objective.prompt.clone(),
        max_steps: max_steps.unwrap_or(default_max_steps).max(1),
    }
}

fn error_frame(message: &str) -> String {
    serde_json::json!({ "type": "error", "message": message }).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_message_minimal() {
        let msg: StartMessage = serde_json::from_str(
            r#"{"personaId":"marco","startUrl":"https://trattoria.example"}"#,
        )
        .unwrap();
        assert_eq!(msg.persona_id, "marco");
        assert!(msg.objective.is_none());
        assert!(msg.custom_profile.is_none());
    }

    #[test]
    fn start_message_autonomous() {
        let msg: StartMessage = serde_json::from_str(
            r#"{"personaId":"giulia","startUrl":"https://a.example","objective":"explore_content","maxSteps":8}"#,
        )
        .unwrap();
        assert_eq!(msg.objective.as_deref(), Some("explore_content"));
        assert_eq!(msg.max_steps, Some(8));
    }

    #[test]
    fn zero_step_budget_is_clamped() {
        assert_eq!(goal_for("explore_content", Some(0), 5).max_steps, 1);
        assert_eq!(goal_for("explore_content", Some(8), 5).max_steps, 8);
        assert_eq!(goal_for("explore_content", None, 5).max_steps, 5);
    }

    #[test]
    fn unknown_page_type_falls_back_to_defaults() {
        let parsed: PageType =
            serde_json::from_value(serde_json::Value::String("blog".to_string()))
                .unwrap_or_default();
        assert_eq!(parsed, PageType::Unknown);
    }
}
