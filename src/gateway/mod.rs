//! WebSocket transport in front of the vote engine. One spawned task per
//! connection; the live-connection count is an atomic owned here, not by
//! the engine.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use futures_util::{SinkExt, StreamExt};
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tokio_tungstenite::{WebSocketStream, accept_async, tungstenite::Message};

use crate::engine::results::{
    PollPayload, QuestionPayload, QuestionStandings, poll_payload, question_payload,
    question_standings,
};
use crate::engine::{EngineError, VoteEngine};
use crate::models::Choice;
use crate::store::PollStore;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    GetRandomPoll {
        #[serde(default)]
        category: Option<String>,
    },
    GetRandomQuestion,
    VotePoll {
        poll_id: String,
        option_index: usize,
    },
    VoteQuestion {
        question_id: String,
        choice: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    PollData { poll: Option<PollPayload> },
    QuestionData { question: Option<QuestionPayload> },
    VoteResult { result: VotePayload },
    Error { message: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VotePayload {
    Poll(PollPayload),
    Question(QuestionStandings),
    Error { error: String },
}

pub struct Gateway<S: PollStore + 'static> {
    engine: VoteEngine<S>,
    connections: AtomicUsize,
}

impl<S: PollStore + 'static> Gateway<S> {
    pub fn new(engine: VoteEngine<S>) -> Arc<Self> {
        Arc::new(Self {
            engine,
            connections: AtomicUsize::new(0),
        })
    }

    pub fn connection_count(&self) -> usize {
        self.connections.load(Ordering::Relaxed)
    }

    pub async fn run(self: Arc<Self>, bind_addr: &str) -> std::io::Result<()> {
        let listener = TcpListener::bind(bind_addr).await?;
        info!("Gateway listening on {}", bind_addr);

        loop {
            let (stream, peer_addr) = match listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    error!("Accept failed: {}", e);
                    continue;
                }
            };

            let gateway = Arc::clone(&self);
            tokio::spawn(async move {
                if let Err(e) = gateway.handle_connection(stream, peer_addr).await {
                    warn!("Connection error for {}: {}", peer_addr, e);
                }
            });
        }
    }

    async fn handle_connection<T>(
        &self,
        stream: T,
        peer_addr: SocketAddr,
    ) -> Result<(), tokio_tungstenite::tungstenite::Error>
    where
        T: AsyncRead + AsyncWrite + Unpin,
    {
        let ws_stream = accept_async(stream).await?;

        let active = self.connections.fetch_add(1, Ordering::Relaxed) + 1;
        info!("Client connected: {} ({} active)", peer_addr, active);

        // The serve loop can exit with an error (e.g. a reply sent into a
        // dropped connection); the decrement must run either way.
        let result = self.serve(ws_stream, peer_addr).await;

        let active = self.connections.fetch_sub(1, Ordering::Relaxed) - 1;
        info!("Client disconnected: {} ({} active)", peer_addr, active);
        result
    }

    async fn serve<T>(
        &self,
        ws_stream: WebSocketStream<T>,
        peer_addr: SocketAddr,
    ) -> Result<(), tokio_tungstenite::tungstenite::Error>
    where
        T: AsyncRead + AsyncWrite + Unpin,
    {
        let (mut ws_sender, mut ws_receiver) = ws_stream.split();

        while let Some(msg) = ws_receiver.next().await {
            match msg {
                Ok(Message::Text(text)) => {
                    let reply = match serde_json::from_str::<ClientMessage>(&text) {
                        Ok(client_msg) => self.dispatch(client_msg).await,
                        Err(e) => ServerMessage::Error {
                            message: format!("Invalid message format: {}", e),
                        },
                    };

                    let json = match serde_json::to_string(&reply) {
                        Ok(json) => json,
                        Err(e) => {
                            error!("Failed to serialize reply: {}", e);
                            continue;
                        }
                    };
                    ws_sender.send(Message::Text(json)).await?;
                }
                Ok(Message::Ping(data)) => {
                    ws_sender.send(Message::Pong(data)).await?;
                }
                Ok(Message::Close(_)) => break,
                Ok(_) => {}
                Err(e) => {
                    warn!("Receive error from {}: {}", peer_addr, e);
                    break;
                }
            }
        }

        Ok(())
    }

    /// Map one client event to one reply. A selection that finds nothing
    /// emits a null payload and is not treated as a failure; every other
    /// engine error is logged here and sent back as `{error}`.
    async fn dispatch(&self, msg: ClientMessage) -> ServerMessage {
        match msg {
            ClientMessage::GetRandomPoll { category } => {
                match self.engine.random_poll(category.as_deref()).await {
                    Ok(poll) => ServerMessage::PollData {
                        poll: poll.map(poll_payload),
                    },
                    Err(e) => {
                        error!("Failed to fetch random poll: {}", e);
                        ServerMessage::Error {
                            message: e.to_string(),
                        }
                    }
                }
            }
            ClientMessage::GetRandomQuestion => match self.engine.random_question().await {
                Ok(question) => ServerMessage::QuestionData {
                    question: question.map(question_payload),
                },
                Err(e) => {
                    error!("Failed to fetch random question: {}", e);
                    ServerMessage::Error {
                        message: e.to_string(),
                    }
                }
            },
            ClientMessage::VotePoll {
                poll_id,
                option_index,
            } => match self.engine.vote_poll(&poll_id, option_index).await {
                Ok(poll) => ServerMessage::VoteResult {
                    result: VotePayload::Poll(poll_payload(poll)),
                },
                Err(e) => vote_failure(&poll_id, e),
            },
            ClientMessage::VoteQuestion {
                question_id,
                choice,
            } => {
                let Ok(choice) = choice.parse::<Choice>() else {
                    warn!("Unrecognized choice {:?} for question {}", choice, question_id);
                    return ServerMessage::VoteResult {
                        result: VotePayload::Error {
                            error: EngineError::InvalidOption.to_string(),
                        },
                    };
                };

                match self.engine.vote_question(&question_id, choice).await {
                    Ok((question, tally)) => ServerMessage::VoteResult {
                        result: VotePayload::Question(question_standings(&question, &tally)),
                    },
                    Err(e) => vote_failure(&question_id, e),
                }
            }
        }
    }
}

fn vote_failure(id: &str, e: EngineError) -> ServerMessage {
    match e {
        EngineError::NotFound | EngineError::InvalidOption => {
            warn!("Vote rejected for {}: {}", id, e)
        }
        _ => error!("Vote failed for {}: {}", id, e),
    }
    ServerMessage::VoteResult {
        result: VotePayload::Error {
            error: e.to_string(),
        },
    }
}
