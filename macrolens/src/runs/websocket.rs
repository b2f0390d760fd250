use rocket::futures::SinkExt;
use rocket::{get, State};
use rocket_ws::stream::DuplexStream;
use rocket_ws::{Channel, Message, WebSocket};
use serde_json::json;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use super::BUSY_MESSAGE;
use crate::error::GENERIC_FAILURE;

/// WebSocket analysis endpoint.
///
/// Connecting starts one run. The server streams `progress` frames while the
/// pipeline works, then a single `result` or `error` frame. A connection made
/// while another run is loading gets one `busy` frame instead.
#[get("/analysis")]
pub fn analysis_websocket(ws: WebSocket, state: &State<crate::server::AppState>) -> Channel<'static> {
    let runs = state.runs.clone();
    let orchestrator = state.orchestrator.clone();

    ws.channel(move |mut stream| {
        Box::pin(async move {
            let guard = match runs.try_begin() {
                Some(guard) => guard,
                None => {
                    warn!("websocket: run requested while another is loading");
                    send_frame(&mut stream, json!({ "type": "busy", "message": BUSY_MESSAGE })).await?;
                    return Ok(());
                }
            };
            let run_id = guard.run_id();
            info!(%run_id, "websocket: analysis run started");

            let (tx, mut rx) = mpsc::unbounded_channel::<String>();
            let task = tokio::spawn(async move {
                let on_status = move |message: &str| {
                    let _ = tx.send(message.to_string());
                };
                guard.execute(&orchestrator, &on_status).await
            });

            // The sender lives inside the task, so this ends when the run does
            while let Some(message) = rx.recv().await {
                send_frame(&mut stream, json!({ "type": "progress", "message": message })).await?;
            }

            let frame = match task.await {
                Ok(Ok(result)) => json!({ "type": "result", "run_id": run_id, "data": result }),
                Ok(Err(e)) => json!({
                    "type": "error",
                    "run_id": run_id,
                    "kind": e.kind(),
                    "message": e.to_string(),
                }),
                Err(join_err) => {
                    error!(%run_id, %join_err, "websocket: analysis task panicked");
                    json!({ "type": "error", "run_id": run_id, "kind": "unknown", "message": GENERIC_FAILURE })
                }
            };
            send_frame(&mut stream, frame).await?;
            info!(%run_id, "websocket: run delivered");

            Ok(())
        })
    })
}

async fn send_frame(stream: &mut DuplexStream, frame: serde_json::Value) -> rocket_ws::result::Result<()> {
    stream.send(Message::Text(frame.to_string())).await
}
