//! Manages the WebSocket connection lifecycle for a tutorial session.

use super::{
    protocol::{ClientMessage, ServerMessage},
    turn,
};
use crate::{
    db::UserScopedStore,
    models,
    state::AppState,
};
use anyhow::{Context, Result, anyhow};
use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use futures_util::{
    SinkExt, StreamExt,
    stream::{SplitSink, SplitStream},
};
use sahay_core::{
    capture::verify_upi_payload,
    language::{Language, LanguagePreference},
    narrator::Narrator,
    registry::{ComponentRegistry, TutorialId},
};
use std::sync::Arc;
use tokio::{
    sync::Mutex,
    task::JoinHandle,
};
use tracing::{Instrument, error, info, instrument, warn};

/// Axum handler to upgrade an HTTP connection to a WebSocket.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

/// Entry point for a new connection: performs the `init` handshake and then
/// spawns the session loop.
#[instrument(name = "ws_session", skip_all, fields(session_id))]
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let temp_id: u32 = rand::random();
    tracing::Span::current().record("session_id", &temp_id.to_string());
    info!("New WebSocket connection. Awaiting initialization...");

    let (socket_tx, mut socket_rx) = socket.split();
    let socket_tx = Arc::new(Mutex::new(socket_tx));

    // The first message from the client must be an `init` message.
    let init_result = match socket_rx.next().await {
        Some(Ok(Message::Text(text))) => attach_session(&text, &state).await,
        Some(Ok(_)) => Err(anyhow!("First message was not a text `init` message.")),
        _ => {
            info!("Client disconnected before sending init message.");
            return;
        }
    };

    let (session, tutorial, language, history) = match init_result {
        Ok(parts) => parts,
        Err(e) => {
            error!("Session initialization failed: {:?}", e);
            let _ = send_msg(
                &mut *socket_tx.lock().await,
                ServerMessage::Error {
                    message: e.to_string(),
                },
            )
            .await;
            return;
        }
    };

    if send_msg(
        &mut *socket_tx.lock().await,
        ServerMessage::Initialized {
            session_id: session.id,
            tutorial: session.tutorial.clone(),
            language: session.language.clone(),
            history: history.clone(),
        },
    )
    .await
    .is_err()
    {
        error!("Failed to send Initialized message to client.");
        return;
    }

    let session_span = tracing::info_span!("tutorial_session", session_id = %session.id, %tutorial);
    async move {
        if let Err(e) =
            run_tutorial_session(state, socket_tx, socket_rx, session, tutorial, language, history)
                .await
        {
            error!(error = ?e, "Tutorial session terminated with error.");
        }
        info!("Tutorial session finished.");
    }
    .instrument(session_span)
    .await;
}

/// Parses the `init` message and loads the corresponding session from the database.
async fn attach_session(
    init_text: &str,
    state: &Arc<AppState>,
) -> Result<(models::Session, TutorialId, Language, Vec<models::Message>)> {
    let init_msg: ClientMessage = serde_json::from_str(init_text)?;
    let ClientMessage::Init { session_id } = init_msg else {
        return Err(anyhow!("First message must be `init`"));
    };

    tracing::Span::current().record("session_id", &session_id.to_string());

    let session = state
        .db
        .get_session_by_id(session_id)
        .await?
        .context("Session not found")?;
    let tutorial = session
        .tutorial
        .parse::<TutorialId>()
        .context("Session references an unknown tutorial")?;
    let language = session
        .language
        .parse::<Language>()
        .context("Session references an unknown language")?;
    let history = state.db.get_session_messages(session_id).await?;
    Ok((session, tutorial, language, history))
}

/// The main event loop for an attached WebSocket session.
///
/// Exactly one narrator turn may be in flight at a time: a new `ask` aborts
/// the pending turn's task and supersedes it, so replies never interleave.
async fn run_tutorial_session(
    state: Arc<AppState>,
    socket_tx: Arc<Mutex<SplitSink<WebSocket, Message>>>,
    mut socket_rx: SplitStream<WebSocket>,
    session: models::Session,
    tutorial: TutorialId,
    language: Language,
    history: Vec<models::Message>,
) -> Result<()> {
    let narrator = Arc::new(Mutex::new(Narrator::new(
        state.assistant_client.clone(),
        tutorial,
        language,
    )));
    let registry = Arc::new(Mutex::new(ComponentRegistry::new()));
    let history = Arc::new(Mutex::new(history));
    let mut turn_slot = TurnSlot::new();

    while let Some(msg_result) = socket_rx.next().await {
        let ws_msg = match msg_result {
            Ok(msg) => msg,
            Err(e) => {
                error!("Error receiving from client WebSocket: {:?}", e);
                break;
            }
        };
        match ws_msg {
            Message::Text(text) => {
                let msg = match serde_json::from_str::<ClientMessage>(&text) {
                    Ok(msg) => msg,
                    Err(e) => {
                        warn!(error = %e, "Ignoring unparseable client message.");
                        continue;
                    }
                };
                match msg {
                    ClientMessage::Ask { text } => {
                        turn_slot.replace(spawn_turn(
                            state.clone(),
                            session.id,
                            history.clone(),
                            narrator.clone(),
                            registry.clone(),
                            socket_tx.clone(),
                            text,
                        ));
                    }
                    ClientMessage::SyncMounted { components } => {
                        registry.lock().await.sync(components);
                    }
                    ClientMessage::SetLanguage { language } => {
                        let persisted = persist_language(&state, &session, language).await;
                        let reply = language_switch_reply(persisted, language);
                        if matches!(reply, ServerMessage::LanguageChanged { .. }) {
                            narrator.lock().await.set_language(language);
                            info!(language = %language, "Display language switched.");
                        }
                        send_msg(&mut *socket_tx.lock().await, reply).await?;
                    }
                    ClientMessage::QrResult { payload } => {
                        let accepted = verify_upi_payload(&payload);
                        send_msg(
                            &mut *socket_tx.lock().await,
                            ServerMessage::PracticeResult { accepted },
                        )
                        .await?;
                    }
                    ClientMessage::Init { .. } => {
                        warn!("Ignoring duplicate init message.");
                    }
                }
            }
            Message::Binary(_) => {
                warn!("Ignoring unexpected binary message.");
            }
            Message::Close(_) => {
                info!("Client sent close frame. Shutting down session.");
                break;
            }
            Message::Ping(_) | Message::Pong(_) => {}
        }
    }

    // Drop any turn still in flight on exit.
    turn_slot.clear();
    info!("WebSocket connection closed.");
    Ok(())
}

/// Holds the at-most-one in-flight narrator turn for a session.
struct TurnSlot(Option<JoinHandle<()>>);

impl TurnSlot {
    fn new() -> Self {
        Self(None)
    }

    /// Installs a new turn, aborting any unfinished predecessor so a
    /// superseded reply is never delivered.
    fn replace(&mut self, handle: JoinHandle<()>) {
        if let Some(previous) = self.0.take() {
            if !previous.is_finished() {
                info!("New question supersedes in-flight turn.");
                previous.abort();
            }
        }
        self.0 = Some(handle);
    }

    fn clear(&mut self) {
        if let Some(handle) = self.0.take() {
            handle.abort();
        }
    }
}

/// Persists a language switch to the session row and the user's saved
/// preference.
async fn persist_language(
    state: &Arc<AppState>,
    session: &models::Session,
    language: Language,
) -> Result<()> {
    state.db.update_session_language(session.id, language).await?;
    let store = UserScopedStore::new(state.db.clone(), session.user_id.clone());
    LanguagePreference::save(&store, language).await?;
    Ok(())
}

/// Maps a language-switch persistence result to the message sent back to the
/// client. A failure is reported as an `error` message; the session loop
/// keeps running either way.
fn language_switch_reply(persisted: Result<()>, language: Language) -> ServerMessage {
    match persisted {
        Ok(()) => ServerMessage::LanguageChanged {
            language: language.as_str().to_string(),
        },
        Err(e) => {
            error!(error = ?e, "Failed to persist language switch.");
            ServerMessage::Error {
                message: "Could not switch the language. Please try again.".to_string(),
            }
        }
    }
}

/// Spawns one narrator turn. Turn failures are reported to the client but do
/// not tear down the session.
fn spawn_turn(
    state: Arc<AppState>,
    session_id: uuid::Uuid,
    history: Arc<Mutex<Vec<models::Message>>>,
    narrator: Arc<Mutex<Narrator>>,
    registry: Arc<Mutex<ComponentRegistry>>,
    socket_tx: Arc<Mutex<SplitSink<WebSocket, Message>>>,
    question: String,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        if let Err(e) = turn::handle_question(
            &state,
            session_id,
            &history,
            &narrator,
            &registry,
            &question,
            &socket_tx,
        )
        .await
        {
            error!(error = ?e, "Narrator turn failed.");
            let _ = send_msg(
                &mut *socket_tx.lock().await,
                ServerMessage::Error {
                    message: "The assistant is unavailable right now. Please try again.".to_string(),
                },
            )
            .await;
        }
    })
}

/// A helper function to serialize and send a `ServerMessage` to the client.
pub(crate) async fn send_msg(
    socket_tx: &mut SplitSink<WebSocket, Message>,
    msg: ServerMessage,
) -> Result<()> {
    let serialized = serde_json::to_string(&msg)?;
    socket_tx.send(Message::Text(serialized.into())).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::{mpsc, oneshot};
    use tokio::time::{Duration, sleep};

    #[tokio::test]
    async fn superseded_turn_never_delivers_its_reply() {
        let (reply_tx, mut reply_rx) = mpsc::unbounded_channel::<&'static str>();
        let (started_tx, started_rx) = oneshot::channel::<()>();
        let mut slot = TurnSlot::new();

        // A turn whose backend call hangs well past the test's lifetime.
        let slow_tx = reply_tx.clone();
        slot.replace(tokio::spawn(async move {
            let _ = started_tx.send(());
            sleep(Duration::from_secs(60)).await;
            let _ = slow_tx.send("slow reply");
        }));
        started_rx.await.unwrap();

        // The user asks again before the first turn finishes.
        let fast_tx = reply_tx.clone();
        slot.replace(tokio::spawn(async move {
            let _ = fast_tx.send("fast reply");
        }));

        assert_eq!(reply_rx.recv().await, Some("fast reply"));
        // The superseded turn was aborted, so its reply never arrives.
        sleep(Duration::from_millis(50)).await;
        assert!(reply_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn sequential_turns_each_deliver_their_reply() {
        let (reply_tx, mut reply_rx) = mpsc::unbounded_channel::<&'static str>();
        let mut slot = TurnSlot::new();

        let first_tx = reply_tx.clone();
        slot.replace(tokio::spawn(async move {
            let _ = first_tx.send("first reply");
        }));
        // The first turn completes before the next question arrives.
        assert_eq!(reply_rx.recv().await, Some("first reply"));

        let second_tx = reply_tx.clone();
        slot.replace(tokio::spawn(async move {
            let _ = second_tx.send("second reply");
        }));
        assert_eq!(reply_rx.recv().await, Some("second reply"));
    }

    #[tokio::test]
    async fn clear_aborts_the_pending_turn() {
        let (reply_tx, mut reply_rx) = mpsc::unbounded_channel::<&'static str>();
        let (started_tx, started_rx) = oneshot::channel::<()>();
        let mut slot = TurnSlot::new();

        slot.replace(tokio::spawn(async move {
            let _ = started_tx.send(());
            sleep(Duration::from_secs(60)).await;
            let _ = reply_tx.send("late reply");
        }));
        started_rx.await.unwrap();

        slot.clear();
        sleep(Duration::from_millis(50)).await;
        assert!(reply_rx.try_recv().is_err());
    }

    #[test]
    fn language_switch_failure_is_reported_not_fatal() {
        let reply = language_switch_reply(Err(anyhow!("connection refused")), Language::Hindi);
        assert!(matches!(reply, ServerMessage::Error { .. }));
    }

    #[test]
    fn language_switch_success_echoes_the_language() {
        let reply = language_switch_reply(Ok(()), Language::Tamil);
        match reply {
            ServerMessage::LanguageChanged { language } => assert_eq!(language, "tamil"),
            other => panic!("expected LanguageChanged, got {other:?}"),
        }
    }
}
