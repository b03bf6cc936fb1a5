//! Per-server connection lifecycle.
//!
//! Each configured server runs [`run`] in its own task: connect, register,
//! feed events through a fresh [`Router`], and reconnect after a delay when
//! the connection drops. All per-connection state is rebuilt on reconnect.

use super::stream;
use crate::config::{Config, ServerConfig};
use crate::error::ConnectionError;
use crate::extensions::BuiltinLoader;
use crate::protocol::{Event, Message, Outbound};
use crate::router::{Router, RouterSettings};
use crate::telemetry::spans;
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::broadcast;
use tokio_util::codec::{Framed, LinesCodec};
use tracing::{Instrument, debug, info, warn};

/// Maximum accepted line length, tags included.
pub const MAX_LINE_LENGTH: usize = 8192;

/// How often pending invocations are checked for expiry.
const EXPIRY_SWEEP: Duration = Duration::from_secs(5);

type Transport<S> = Framed<S, LinesCodec>;

/// Why a session ended without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionEnd {
    Lost,
    Shutdown,
}

/// Drive one server until shutdown is signalled.
pub async fn run(
    config: Arc<Config>,
    server: ServerConfig,
    loader: Arc<BuiltinLoader>,
    mut shutdown: broadcast::Receiver<()>,
) {
    let label = server.label();
    loop {
        let span = spans::connection(&label, &server.address());
        let outcome = session(&config, &server, &loader, &mut shutdown)
            .instrument(span)
            .await;
        match outcome {
            Ok(SessionEnd::Shutdown) => break,
            Ok(SessionEnd::Lost) => info!(server = %label, "Connection lost"),
            Err(e) => warn!(server = %label, error = %e, code = e.error_code(), "Connection failed"),
        }

        let delay = server.reconnect_delay();
        info!(server = %label, delay_secs = delay.as_secs(), "Reconnecting after delay");
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = shutdown.recv() => break,
        }
    }
    info!(server = %label, "Server task finished");
}

async fn session(
    config: &Config,
    server: &ServerConfig,
    loader: &BuiltinLoader,
    shutdown: &mut broadcast::Receiver<()>,
) -> Result<SessionEnd, ConnectionError> {
    let stream = stream::connect(server).await?;
    info!(tls = stream.is_tls(), "Connected");
    let mut transport = Framed::new(stream, LinesCodec::new_with_max_length(MAX_LINE_LENGTH));
    let mut router = Router::new(RouterSettings::from_config(config, server), loader.load(server));
    serve(&mut transport, &mut router, server, shutdown).await
}

/// Run the event loop, then fan out the disconnect whatever ended it.
async fn serve<S>(
    transport: &mut Transport<S>,
    router: &mut Router,
    server: &ServerConfig,
    shutdown: &mut broadcast::Receiver<()>,
) -> Result<SessionEnd, ConnectionError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let outcome = event_loop(transport, router, server, shutdown).await;
    let reason = match &outcome {
        Ok(SessionEnd::Lost) => "closed by server".to_string(),
        Ok(SessionEnd::Shutdown) => "shutdown".to_string(),
        Err(e) => e.to_string(),
    };
    // Nobody is left to receive denials.
    router.handle(Event::Disconnected { reason });
    outcome
}

async fn event_loop<S>(
    transport: &mut Transport<S>,
    router: &mut Router,
    server: &ServerConfig,
    shutdown: &mut broadcast::Receiver<()>,
) -> Result<SessionEnd, ConnectionError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut nick = server.nick.clone();

    let mut handshake = Vec::new();
    if let Some(password) = &server.password {
        handshake.push(Outbound::Pass(password.clone()));
    }
    handshake.push(Outbound::Nick(nick.clone()));
    handshake.push(Outbound::User {
        username: server.username().to_string(),
        realname: server.realname().to_string(),
    });
    send_all(transport, handshake).await?;

    let mut registered = false;
    let deadline = tokio::time::sleep(server.registration_timeout());
    tokio::pin!(deadline);
    let mut sweep = tokio::time::interval(EXPIRY_SWEEP);

    loop {
        tokio::select! {
            line = transport.next() => {
                let line = match line {
                    Some(Ok(line)) => line,
                    Some(Err(e)) => return Err(e.into()),
                    None => return Ok(SessionEnd::Lost),
                };
                let message = match line.parse::<Message>() {
                    Ok(message) => message,
                    Err(e) => {
                        debug!(error = %e, "Ignoring malformed line");
                        continue;
                    }
                };

                match message.command.as_str() {
                    "433" if !registered => {
                        nick.push('_');
                        info!(nick = %nick, "Nick in use, retrying");
                        router.set_nick(&nick);
                        send_all(transport, vec![Outbound::Nick(nick.clone())]).await?;
                        continue;
                    }
                    "001" => {
                        registered = true;
                        if let Some(confirmed) = message.params.first() {
                            nick = confirmed.clone();
                        }
                        router.set_nick(&nick);
                        info!(nick = %nick, "Registered");
                    }
                    _ => {}
                }

                let event = Event::from(message);
                if let Event::Ping(token) = &event {
                    send_all(transport, vec![Outbound::Pong(token.clone())]).await?;
                }
                let connected = event == Event::Connected;
                let out = router.handle(event);
                send_all(transport, out).await?;
                if connected {
                    let joins = server
                        .channels
                        .iter()
                        .map(|channel| Outbound::Join { channel: channel.clone(), key: None })
                        .collect();
                    send_all(transport, joins).await?;
                }
            }
            _ = &mut deadline, if !registered => {
                return Err(ConnectionError::RegistrationTimeout);
            }
            _ = sweep.tick() => {
                let out = router.expire(Instant::now());
                send_all(transport, out).await?;
            }
            _ = shutdown.recv() => {
                let mut out = router.shutdown();
                out.push(Outbound::Quit(Some("Shutting down".into())));
                // The socket may already be gone; shutdown proceeds regardless.
                if let Err(e) = send_all(transport, out).await {
                    debug!(error = %e, "Failed to send QUIT");
                }
                return Ok(SessionEnd::Shutdown);
            }
        }
    }
}

async fn send_all<S>(transport: &mut Transport<S>, ops: Vec<Outbound>) -> Result<(), ConnectionError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    for op in ops {
        for line in op.to_lines() {
            debug!(line = %line, "Sending");
            transport.feed(line).await?;
        }
    }
    SinkExt::<String>::flush(transport).await?;
    Ok(())
}
