//! WebSocket endpoint with heartbeat supervision

use std::time::{Duration, Instant};

use actix_web::{HttpRequest, HttpResponse, get, web};
use actix_ws::{CloseCode, CloseReason, Message, MessageStream, Session};
use tracing::{debug, info, warn};

use crate::model::app_state::AppState;

use super::protocol::ServerEvent;
use super::session::RelaySession;

#[get("/ws")]
pub async fn ws_index(
    req: HttpRequest,
    body: web::Payload,
    data: web::Data<AppState>,
) -> Result<HttpResponse, actix_web::Error> {
    let (response, session, stream) = actix_ws::handle(&req, body)?;

    let heartbeat = data.configuration.ws_heartbeat_interval();
    let timeout = data.configuration.ws_client_timeout();
    let relay = RelaySession::new(data.into_inner());

    debug!(connection_id = relay.connection_id(), "WebSocket connection opened");
    actix_web::rt::spawn(run_session(relay, session, stream, heartbeat, timeout));

    Ok(response)
}

async fn send_events(session: &mut Session, events: Vec<ServerEvent>) -> bool {
    for event in events {
        if session.text(event.to_json()).await.is_err() {
            return false;
        }
    }
    true
}

async fn run_session(
    mut relay: RelaySession,
    mut session: Session,
    mut stream: MessageStream,
    heartbeat: Duration,
    client_timeout: Duration,
) {
    let mut last_heartbeat = Instant::now();
    let mut interval = tokio::time::interval(heartbeat);

    let reason = loop {
        tokio::select! {
            message = stream.recv() => {
                match message {
                    Some(Ok(Message::Text(text))) => {
                        last_heartbeat = Instant::now();
                        let replies = relay.handle_text(&text).await;
                        if !send_events(&mut session, replies).await {
                            break None;
                        }
                    }
                    Some(Ok(Message::Binary(_))) => {
                        last_heartbeat = Instant::now();
                        let reply = vec![ServerEvent::error("binary frames are not supported")];
                        if !send_events(&mut session, reply).await {
                            break None;
                        }
                    }
                    Some(Ok(Message::Ping(bytes))) => {
                        last_heartbeat = Instant::now();
                        if session.pong(&bytes).await.is_err() {
                            break None;
                        }
                    }
                    Some(Ok(Message::Pong(_))) => {
                        last_heartbeat = Instant::now();
                    }
                    Some(Ok(Message::Close(reason))) => {
                        break reason;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!(connection_id = relay.connection_id(), "WebSocket protocol error: {}", e);
                        break None;
                    }
                    None => break None,
                }
            }
            event = relay.next_outbound() => {
                match event {
                    Some(event) => {
                        if session.text(event.to_json()).await.is_err() {
                            break None;
                        }
                    }
                    None => {
                        info!(
                            connection_id = relay.connection_id(),
                            user_id = relay.user_id().unwrap_or_default(),
                            "Connection replaced by a newer one"
                        );
                        break Some(CloseReason {
                            code: CloseCode::Policy,
                            description: Some("replaced by a newer connection".to_string()),
                        });
                    }
                }
            }
            _ = interval.tick() => {
                if Instant::now().duration_since(last_heartbeat) > client_timeout {
                    info!(connection_id = relay.connection_id(), "Client heartbeat timed out");
                    break Some(CloseReason {
                        code: CloseCode::Away,
                        description: Some("heartbeat timeout".to_string()),
                    });
                }
                if session.ping(b"").await.is_err() {
                    break None;
                }
            }
        }
    };

    debug!(connection_id = relay.connection_id(), "WebSocket connection closed");
    relay.close();
    let _ = session.close(reason).await;
}
