//! WebSocket dispatch client.
//!
//! One connection per session. The client decodes each inbound frame into a
//! `PushMessage`, applies it to the session cache, and publishes the
//! resulting `Update` on an mpsc channel. A frame that fails to decode is
//! logged and dropped; the loop keeps running. There is no automatic
//! reconnection: when the socket closes the session is cleared and the user
//! has to reconnect explicitly.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::config::Config;
use crate::dispatch::envelope::PushMessage;
use crate::dispatch::registry::{Session, Update};
use crate::logging::{log, log_push, log_push_dropped, obj, v_str, Domain, Level};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Open,
    Closed,
}

/// Frame transport behind the client, so tests can script the socket.
#[async_trait]
pub trait Transport: Send {
    async fn send(&mut self, text: String) -> Result<()>;
    /// Next text frame, `None` once the peer closed.
    async fn recv(&mut self) -> Option<Result<String>>;
    async fn close(&mut self) -> Result<()>;
}

pub struct WsTransport {
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl WsTransport {
    pub async fn connect(url: &str) -> Result<Self> {
        let (ws, _) = connect_async(url)
            .await
            .with_context(|| format!("connecting to {}", url))?;
        Ok(Self { ws })
    }
}

#[async_trait]
impl Transport for WsTransport {
    async fn send(&mut self, text: String) -> Result<()> {
        self.ws
            .send(Message::Text(text))
            .await
            .context("sending frame")
    }

    async fn recv(&mut self) -> Option<Result<String>> {
        while let Some(msg) = self.ws.next().await {
            match msg {
                Ok(Message::Text(text)) => return Some(Ok(text)),
                Ok(Message::Close(_)) => return None,
                // Pings are answered by the protocol layer on the next flush.
                Ok(_) => continue,
                Err(err) => return Some(Err(err.into())),
            }
        }
        None
    }

    async fn close(&mut self) -> Result<()> {
        self.ws.close(None).await.context("closing socket")
    }
}

pub struct DispatchClient<T: Transport> {
    config: Config,
    state: ConnectionState,
    transport: Option<T>,
    session: Session,
    updates: mpsc::Sender<Update>,
}

impl DispatchClient<WsTransport> {
    /// Connect and send the identity handshake.
    pub async fn connect(config: Config) -> Result<(Self, mpsc::Receiver<Update>)> {
        let transport = WsTransport::connect(&config.ws_url).await?;
        let (mut client, updates) = Self::with_transport(config, transport);
        client.state = ConnectionState::Connecting;
        client.handshake().await?;
        Ok((client, updates))
    }
}

impl<T: Transport> DispatchClient<T> {
    pub fn with_transport(config: Config, transport: T) -> (Self, mpsc::Receiver<Update>) {
        let (tx, rx) = mpsc::channel(config.update_channel_capacity);
        (
            Self {
                config,
                state: ConnectionState::Disconnected,
                transport: Some(transport),
                session: Session::new(),
                updates: tx,
            },
            rx,
        )
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Send the login payload and mark the connection open.
    pub async fn handshake(&mut self) -> Result<()> {
        let payload = json!({
            "type": "login",
            "userName": self.config.username,
            "password": self.config.password,
        });
        let transport = match self.transport.as_mut() {
            Some(t) => t,
            None => bail!("handshake on a closed connection"),
        };
        transport.send(payload.to_string()).await?;
        self.state = ConnectionState::Open;
        log(
            Level::Info,
            Domain::System,
            "connection_open",
            obj(&[("user", v_str(&self.config.username))]),
        );
        Ok(())
    }

    /// Send one outbound frame. Rejected without side effects when the
    /// connection is not open.
    pub async fn send(&mut self, payload: &serde_json::Value) -> Result<()> {
        if self.state != ConnectionState::Open {
            log(
                Level::Warn,
                Domain::Push,
                "send_rejected",
                obj(&[("state", v_str(&format!("{:?}", self.state)))]),
            );
            bail!("send on a connection that is not open");
        }
        let transport = match self.transport.as_mut() {
            Some(t) => t,
            None => bail!("send on a closed connection"),
        };
        transport.send(payload.to_string()).await
    }

    /// Read loop: decode, apply, publish. Returns when the socket closes,
    /// after clearing the session and publishing `Disconnected`.
    pub async fn run(&mut self) -> Result<()> {
        loop {
            let frame = match self.transport.as_mut() {
                Some(t) => t.recv().await,
                None => break,
            };
            match frame {
                Some(Ok(text)) => self.dispatch(&text).await,
                Some(Err(err)) => {
                    log(
                        Level::Error,
                        Domain::Push,
                        "read_failed",
                        obj(&[("error", v_str(&err.to_string()))]),
                    );
                    break;
                }
                None => break,
            }
        }
        self.shutdown().await;
        Ok(())
    }

    async fn dispatch(&mut self, text: &str) {
        let msg = match PushMessage::decode(text) {
            Ok(msg) => msg,
            Err(err) => {
                log_push_dropped(&err.to_string(), text);
                return;
            }
        };
        log_push(message_name(&msg), msg.workflow_id());
        if let Some(update) = self.session.apply(msg) {
            // A lagging consumer drops updates rather than stalling reads.
            let _ = self.updates.try_send(update);
        }
    }

    async fn shutdown(&mut self) {
        if self.state == ConnectionState::Closed {
            return;
        }
        self.state = ConnectionState::Closed;
        self.session.clear();
        let _ = self.updates.try_send(Update::Disconnected);
        log(Level::Info, Domain::System, "connection_closed", obj(&[]));
    }

    /// Close the connection. Safe to call more than once.
    pub async fn close(&mut self) -> Result<()> {
        if let Some(mut transport) = self.transport.take() {
            let _ = transport.close().await;
        }
        self.shutdown().await;
        Ok(())
    }
}

fn message_name(msg: &PushMessage) -> &'static str {
    match msg {
        PushMessage::Status { .. } => "status",
        PushMessage::Connection { .. } => "connection",
        PushMessage::Running { .. } => "running",
        PushMessage::WcaRunning { .. } => "wcaRunning",
        PushMessage::WorkStatus { .. } => "workStatus",
        PushMessage::StatesWithActionsSynthesis { .. } => "statesWithActionsSyntesis",
        PushMessage::StatesWithIndexesSynthesis { .. } => "statesWithIndexesSyntesis",
        PushMessage::StatesWithSecurityRulesSynthesis { .. } => {
            "statesWithSecurityRulesResultSyntesis"
        }
        PushMessage::BusyCores(_) => "busyCores",
        PushMessage::Workflows { .. } => "workflows",
        PushMessage::SelectedWorkflowInfo { .. } => "selectedWorkFlowInfo",
        PushMessage::WcaContingencies { .. } => "wcaContingencies",
        PushMessage::WorkflowStatus(_) => "workflowStatus",
        PushMessage::WorkflowList { .. } => "workflowList",
        PushMessage::SamplesSynthesis { .. } => "samplesSynthesis",
        PushMessage::WorkflowCreation { .. } => "workflowCreation",
        PushMessage::WorkflowRemoval { .. } => "workflowRemoval",
        PushMessage::SecurityRuleComputation { .. } => "securityRuleComputation",
        PushMessage::SecurityRulesChange { .. } => "securityRulesChange",
        PushMessage::SecurityRulesProgress { .. } => "securityRulesProgress",
        PushMessage::Login { .. } => "login",
    }
}
