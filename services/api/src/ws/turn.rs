//! Drives a single narrator turn for the WebSocket channel.

use crate::{
    models::{self, MessageRole},
    state::AppState,
    ws::{protocol::ServerMessage, session::send_msg},
};
use anyhow::Result;
use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::SplitSink;
use sahay_core::{
    Directive,
    assistant::TurnMessage,
    narrator::{Narrator, Outcome},
    registry::ComponentRegistry,
};
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

/// Handles one user question end to end:
///
/// 1. Persist the question and append it to the transcript.
/// 2. Drive the narrator (prompt construction, backend call, strict parse,
///    degradation policy).
/// 3. Persist the narrator's text.
/// 4. Resolve the highlight against the mounted components and send the
///    reply to the client.
pub async fn handle_question(
    state: &AppState,
    session_id: Uuid,
    history: &Mutex<Vec<models::Message>>,
    narrator: &Mutex<Narrator>,
    registry: &Mutex<ComponentRegistry>,
    question: &str,
    socket_tx: &Mutex<SplitSink<WebSocket, Message>>,
) -> Result<()> {
    let user_msg = state
        .db
        .add_message(session_id, MessageRole::User, question)
        .await?;

    let turns: Vec<TurnMessage> = {
        let mut history = history.lock().await;
        history.push(user_msg);
        history.iter().map(to_turn_message).collect()
    };

    // Snapshot the prompt and client, then release the narrator for the
    // duration of the backend call so the session loop stays responsive to
    // language switches and registry updates.
    let pending = narrator.lock().await.begin_turn();
    let raw = pending.narrate(&turns).await?;
    let outcome = narrator.lock().await.conclude(&raw);
    if let Outcome::Reprompt { .. } = outcome {
        debug!("Repeated contract violations; asking the user to rephrase.");
    }

    let assistant_msg = state
        .db
        .add_message(session_id, MessageRole::Assistant, outcome.text())
        .await?;
    history.lock().await.push(assistant_msg);

    let directives = {
        let registry = registry.lock().await;
        outcome.directives(&registry)
    };

    let mut text = String::new();
    let mut highlight = None;
    for directive in directives {
        match directive {
            Directive::SpeakText(t) => text = t,
            Directive::Highlight(id) => highlight = Some(id),
            Directive::ClearHighlight => highlight = None,
        }
    }

    send_msg(
        &mut *socket_tx.lock().await,
        ServerMessage::Reply { text, highlight },
    )
    .await?;

    Ok(())
}

fn to_turn_message(msg: &models::Message) -> TurnMessage {
    match msg.role {
        MessageRole::User => TurnMessage::user(msg.content.clone()),
        MessageRole::Assistant => TurnMessage::assistant(msg.content.clone()),
    }
}
