//! Show name resolution against the title-voting service
//!
//! Opens one WebSocket session per query, reads the single REFRESH message
//! the service pushes, acknowledges with a normal-closure frame, and picks
//! the most-voted title. Ties keep the original relative order, so the first
//! title to reach the winning vote count wins.

use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

type WsSession = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Show name resolution errors
#[derive(Debug, Error)]
pub enum ResolveError {
    /// Session could not be opened or cleanly shut down
    #[error("Error establishing session with {endpoint}: {cause}")]
    Connection { endpoint: String, cause: String },

    /// A blocking step exceeded the configured deadline
    #[error("Voting service deadline exceeded during {step}")]
    Timeout { step: &'static str },

    /// No message arrived, or the message could not be parsed
    #[error("Error reading voting message: {0}")]
    Protocol(String),

    /// The message carried an operation other than REFRESH
    #[error("Voting message was not a refresh: {0}")]
    UnexpectedOperation(String),

    /// The refresh carried no titles to choose from
    #[error("Voting service had no titles")]
    EmptyResult,
}

/// Structured message pushed by the voting service once per session
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VotingMessage {
    #[serde(alias = "Operation")]
    pub operation: String,
    #[serde(alias = "Titles")]
    pub titles: Vec<TitleEntry>,
    #[serde(alias = "Links")]
    pub links: Vec<LinkEntry>,
}

/// One proposed title with its vote count
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TitleEntry {
    #[serde(alias = "ID")]
    pub id: i64,
    #[serde(alias = "Author")]
    pub author: String,
    #[serde(alias = "Title")]
    pub title: String,
    #[serde(alias = "Votes")]
    pub votes: i64,
    #[serde(alias = "Voted")]
    pub voted: bool,
    #[serde(alias = "Time")]
    pub time: String,
}

/// One proposed link; carried by the protocol but unused here
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkEntry {
    #[serde(alias = "ID")]
    pub id: i64,
    #[serde(alias = "Author")]
    pub author: String,
    #[serde(alias = "Link")]
    pub link: String,
    #[serde(alias = "Time")]
    pub time: String,
}

/// Source of the current show name
///
/// Seam for the normalizer: production uses [`ShowNameResolver`], tests use
/// [`StaticShowNames`].
#[async_trait]
pub trait ShowNameSource: Send + Sync {
    async fn resolve_show_name(&self) -> Result<String, ResolveError>;
}

/// WebSocket client for the title-voting service
pub struct ShowNameResolver {
    endpoint: String,
    deadline: Duration,
}

impl ShowNameResolver {
    pub fn new(endpoint: impl Into<String>, deadline: Duration) -> Self {
        Self {
            endpoint: endpoint.into(),
            deadline,
        }
    }

    async fn open_session(&self) -> Result<WsSession, ResolveError> {
        let (session, _response) = timeout(self.deadline, connect_async(self.endpoint.as_str()))
            .await
            .map_err(|_| ResolveError::Timeout { step: "connect" })?
            .map_err(|e| ResolveError::Connection {
                endpoint: self.endpoint.clone(),
                cause: e.to_string(),
            })?;
        debug!(endpoint = %self.endpoint, "voting service session opened");
        Ok(session)
    }

    /// Read frames until the one structured message arrives
    async fn read_message(&self, session: &mut WsSession) -> Result<VotingMessage, ResolveError> {
        loop {
            let frame = timeout(self.deadline, session.next())
                .await
                .map_err(|_| ResolveError::Timeout { step: "read" })?;
            match frame {
                None => {
                    return Err(ResolveError::Protocol(
                        "session ended before a message arrived".to_string(),
                    ))
                }
                Some(Err(e)) => return Err(ResolveError::Protocol(e.to_string())),
                Some(Ok(Message::Text(text))) => {
                    return serde_json::from_str(&text)
                        .map_err(|e| ResolveError::Protocol(format!("malformed message: {e}")))
                }
                Some(Ok(Message::Binary(bytes))) => {
                    return serde_json::from_slice(&bytes)
                        .map_err(|e| ResolveError::Protocol(format!("malformed message: {e}")))
                }
                Some(Ok(Message::Close(_))) => {
                    return Err(ResolveError::Protocol(
                        "session closed before a message arrived".to_string(),
                    ))
                }
                // Control frames (ping/pong) ahead of the payload
                Some(Ok(_)) => continue,
            }
        }
    }

    /// Send the normal-closure acknowledgment the service expects
    async fn close_session(&self, session: &mut WsSession) -> Result<(), ResolveError> {
        let close = Message::Close(Some(CloseFrame {
            code: CloseCode::Normal,
            reason: "".into(),
        }));
        timeout(self.deadline, session.send(close))
            .await
            .map_err(|_| ResolveError::Timeout { step: "close" })?
            .map_err(|e| ResolveError::Connection {
                endpoint: self.endpoint.clone(),
                cause: format!("failed to close session: {e}"),
            })
    }
}

#[async_trait]
impl ShowNameSource for ShowNameResolver {
    async fn resolve_show_name(&self) -> Result<String, ResolveError> {
        let mut session = self.open_session().await?;

        let message = self.read_message(&mut session).await;
        // Normal closure is owed on every exit path, including after a
        // failed read; a close failure only surfaces if the read succeeded.
        let closed = self.close_session(&mut session).await;
        if let Err(close_err) = &closed {
            warn!(error = %close_err, "voting service session close failed");
        }
        let message = message?;
        closed?;

        let winner = select_title(message)?;
        info!(title = %winner, "most voted title selected");
        Ok(winner)
    }
}

/// Validate a voting message and extract the winning title
fn select_title(message: VotingMessage) -> Result<String, ResolveError> {
    if message.operation != "REFRESH" {
        return Err(ResolveError::UnexpectedOperation(message.operation));
    }
    most_voted(message.titles)
        .map(|entry| entry.title)
        .ok_or(ResolveError::EmptyResult)
}

/// Highest vote count wins; stable descending sort keeps the first of ties
fn most_voted(mut titles: Vec<TitleEntry>) -> Option<TitleEntry> {
    titles.sort_by(|a, b| b.votes.cmp(&a.votes));
    titles.into_iter().next()
}

/// Fixed [`ShowNameSource`] for tests and degraded-path exercises
pub struct StaticShowNames {
    title: Option<String>,
}

impl StaticShowNames {
    /// Always resolves to the given title
    pub fn with_title(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
        }
    }

    /// Always fails, as if the voting service had no titles
    pub fn unavailable() -> Self {
        Self { title: None }
    }
}

#[async_trait]
impl ShowNameSource for StaticShowNames {
    async fn resolve_show_name(&self) -> Result<String, ResolveError> {
        match &self.title {
            Some(title) => Ok(title.clone()),
            None => Err(ResolveError::EmptyResult),
        }
    }
}
