use std::sync::Arc;

use actix::{Actor, ActorContext, AsyncContext, Handler, Message, Running, StreamHandler};
use actix_web::{web, Error, HttpRequest, HttpResponse};
use actix_web_actors::ws;
use actix_web_actors::ws::{CloseCode, CloseReason};

use analysis::{ConnectionId, SessionId};

use crate::frame::RawFrame;
use crate::server::{ServerCommand, ServerTx};

/// Latest-wins slot carrying the newest serialized update for one observer.
/// A saturated observer skips intermediate updates instead of backing up
/// the hub; gaps are acceptable, head-of-line blocking is not.
pub type UpdateTx = tokio::sync::watch::Sender<Option<Arc<String>>>;
pub type UpdateRx = tokio::sync::watch::Receiver<Option<Arc<String>>>;

pub fn update_slot() -> (UpdateTx, UpdateRx) {
    tokio::sync::watch::channel(None)
}

#[derive(Debug)]
pub enum ConnectionEvent {
    Connected { connection_id: ConnectionId },
    Rejected { reason: String },
    SessionEnded,
    /// Serialized session update. Reaches observers through their update
    /// slot rather than the control channel.
    Update(Arc<String>),
}

#[derive(Message)]
#[rtype(result = "()")]
struct ConnectionActorMessage(ConnectionEvent);

#[derive(Debug, Clone, Copy, PartialEq)]
enum Role {
    Producer,
    Observer,
}

enum ConnectionState {
    Idle,
    Connected(ConnectionId),
}

struct ConnectionActor {
    role: Role,
    session_id: SessionId,
    srv_tx: ServerTx,
    state: ConnectionState,
}

impl Actor for ConnectionActor {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        let (ctrl_tx, mut ctrl_rx) = tokio::sync::mpsc::channel::<ConnectionEvent>(8);
        let addr = ctx.address().recipient();

        match self.role {
            Role::Producer => {
                let connect = ServerCommand::ConnectProducer {
                    session_id: self.session_id.clone(),
                    tx: ctrl_tx,
                };
                if self.srv_tx.try_send(connect).is_err() {
                    log::error!("server loop unavailable, closing producer connection");
                    ctx.stop();
                    return;
                }
                tokio::spawn(async move {
                    while let Some(event) = ctrl_rx.recv().await {
                        if addr.try_send(ConnectionActorMessage(event)).is_err() {
                            break;
                        }
                    }
                });
            }
            Role::Observer => {
                let (update_tx, mut update_rx) = update_slot();
                let connect = ServerCommand::ConnectObserver {
                    session_id: self.session_id.clone(),
                    tx: ctrl_tx,
                    update_tx,
                };
                if self.srv_tx.try_send(connect).is_err() {
                    log::error!("server loop unavailable, closing observer connection");
                    ctx.stop();
                    return;
                }
                tokio::spawn(async move {
                    loop {
                        tokio::select! {
                            control = ctrl_rx.recv() => match control {
                                Some(event) => {
                                    if addr.try_send(ConnectionActorMessage(event)).is_err() {
                                        break;
                                    }
                                }
                                None => break,
                            },
                            update = update_rx.recv() => match update {
                                Some(Some(json)) => {
                                    let event = ConnectionEvent::Update(json);
                                    if addr.try_send(ConnectionActorMessage(event)).is_err() {
                                        break;
                                    }
                                }
                                // The slot starts out empty.
                                Some(None) => {}
                                None => {
                                    // The hub dropped this observer's slot.
                                    // A session-end event may still be in
                                    // flight on the control channel; drain
                                    // it before giving up.
                                    while let Some(event) = ctrl_rx.recv().await {
                                        if addr.try_send(ConnectionActorMessage(event)).is_err() {
                                            break;
                                        }
                                    }
                                    break;
                                }
                            },
                        }
                    }
                });
            }
        }
    }

    fn stopping(&mut self, _: &mut Self::Context) -> Running {
        if let ConnectionState::Connected(id) = self.state {
            let disconnect = ServerCommand::Disconnect { from: id };
            if self.srv_tx.try_send(disconnect).is_err() {
                log::debug!("server loop already gone during disconnect of {}", id);
            }
        }
        Running::Stop
    }
}

/// Ingress
impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for ConnectionActor {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Ping(msg)) => ctx.pong(&msg),
            Ok(ws::Message::Text(text)) => match self.role {
                Role::Producer => self.forward_frame(RawFrame::DataUri(text)),
                // Observers only ever send keepalives; whatever the content,
                // it never touches session state.
                Role::Observer => log::trace!("observer keepalive"),
            },
            Ok(ws::Message::Binary(bin)) => match self.role {
                Role::Producer => self.forward_frame(RawFrame::Jpeg(bin.to_vec())),
                Role::Observer => log::trace!("ignoring binary message from observer"),
            },
            Ok(ws::Message::Close(_)) => {
                ctx.stop();
            }
            _ => (),
        }
    }
}

impl ConnectionActor {
    fn forward_frame(&mut self, frame: RawFrame) {
        match self.state {
            ConnectionState::Connected(from) => {
                if self
                    .srv_tx
                    .try_send(ServerCommand::FrameReceived { from, frame })
                    .is_err()
                {
                    log::debug!("hub busy, dropping frame from connection {}", from);
                }
            }
            ConnectionState::Idle => {
                log::debug!("frame arrived before registration completed, dropping");
            }
        }
    }
}

/// Egress
impl Handler<ConnectionActorMessage> for ConnectionActor {
    type Result = ();

    fn handle(&mut self, msg: ConnectionActorMessage, ctx: &mut ws::WebsocketContext<Self>) {
        match msg.0 {
            ConnectionEvent::Connected { connection_id } => {
                self.state = ConnectionState::Connected(connection_id);
            }
            ConnectionEvent::Rejected { reason } => {
                ctx.close(Some(CloseReason {
                    code: CloseCode::Policy,
                    description: Some(reason),
                }));
                ctx.stop();
            }
            ConnectionEvent::SessionEnded => {
                // The hub already forgot this connection; no disconnect
                // command needed on the way out.
                self.state = ConnectionState::Idle;
                ctx.close(Some(CloseReason {
                    code: CloseCode::Normal,
                    description: Some("session ended".to_string()),
                }));
                ctx.stop();
            }
            ConnectionEvent::Update(json) => ctx.text(json.as_str()),
        }
    }
}

pub async fn student_ws(
    req: HttpRequest,
    stream: web::Payload,
    srv_tx: web::Data<ServerTx>,
) -> Result<HttpResponse, Error> {
    start_connection(Role::Producer, req, stream, srv_tx)
}

pub async fn observer_ws(
    req: HttpRequest,
    stream: web::Payload,
    srv_tx: web::Data<ServerTx>,
) -> Result<HttpResponse, Error> {
    start_connection(Role::Observer, req, stream, srv_tx)
}

fn start_connection(
    role: Role,
    req: HttpRequest,
    stream: web::Payload,
    srv_tx: web::Data<ServerTx>,
) -> Result<HttpResponse, Error> {
    let session_id: SessionId = match req.match_info().get("session_id") {
        Some(id) if !id.is_empty() => id.to_owned(),
        _ => return Err(actix_web::error::ErrorBadRequest("missing session id")),
    };
    ws::start(
        ConnectionActor {
            role,
            session_id,
            srv_tx: srv_tx.get_ref().clone(),
            state: ConnectionState::Idle,
        },
        &req,
        stream,
    )
}
