//! TCP accept loop and per-connection tasks.
//!
//! Each connection gets a reader loop and a writer task joined by a
//! bounded queue. The reader decodes messages, runs them through the
//! [`Dispatcher`] and executes the resulting actions; stage-binary waits
//! run as their own tasks so one waiting request never stalls the session.
//! When the reader stops for any reason the session is disconnected from
//! every sync table before its id is dropped.

use std::{net::SocketAddr, sync::Arc};

use frontier_core::{Environment, SessionId, SyncHub};
use frontier_proto::Frame;
use tokio::{
    io::{AsyncRead, AsyncWrite},
    net::{TcpListener, TcpStream},
    sync::mpsc,
    task::JoinSet,
};
use tracing::{debug, info, warn};

use crate::{
    config::ServerConfig,
    dispatch::{Dispatcher, ServerAction},
    error::ServerError,
    registry::{Outbox, SessionRegistry},
    transport::{read_message, write_message},
};

/// Channel server bound to a listen address.
pub struct Server<E: Environment> {
    listener: TcpListener,
    config: ServerConfig,
    dispatcher: Dispatcher<E>,
    registry: Arc<SessionRegistry>,
}

impl<E: Environment> Server<E> {
    /// Bind the configured listen address.
    pub async fn bind(config: ServerConfig, env: E) -> Result<Self, ServerError> {
        config.validate()?;
        let listener = TcpListener::bind(config.bind_addr).await?;
        let hub = Arc::new(SyncHub::new(config.sync.clone(), env));
        Ok(Self { listener, config, dispatcher: Dispatcher::new(hub), registry: Arc::new(SessionRegistry::new()) })
    }

    /// Address actually bound (resolves port `0`).
    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.listener.local_addr()?)
    }

    /// Shared sync state.
    pub fn hub(&self) -> &SyncHub<E> {
        self.dispatcher.hub()
    }

    /// Connected sessions.
    pub fn registry(&self) -> Arc<SessionRegistry> {
        Arc::clone(&self.registry)
    }

    /// Accept connections until the listener fails.
    pub async fn run(self) -> Result<(), ServerError> {
        info!(addr = %self.local_addr()?, "listening");
        loop {
            let (stream, peer) = self.listener.accept().await?;
            if let Err(e) = stream.set_nodelay(true) {
                warn!(%peer, error = %e, "unable to disable Nagle");
            }
            let connection = Connection {
                dispatcher: self.dispatcher.clone(),
                registry: Arc::clone(&self.registry),
                max_frame_bytes: self.config.max_frame_bytes,
                send_queue_depth: self.config.send_queue_depth,
            };
            tokio::spawn(connection.serve(stream, peer));
        }
    }
}

/// Everything one connection task needs.
struct Connection<E: Environment> {
    dispatcher: Dispatcher<E>,
    registry: Arc<SessionRegistry>,
    max_frame_bytes: usize,
    send_queue_depth: usize,
}

impl<E: Environment> Connection<E> {
    async fn serve(self, stream: TcpStream, peer: SocketAddr) {
        let (reader, writer) = stream.into_split();
        let (outbox, inbox) = mpsc::channel(self.send_queue_depth);
        let session = self.registry.register(outbox.clone());
        info!(%session, %peer, "session connected");

        let writer_task = tokio::spawn(write_loop(writer, inbox, session));
        let mut waiters = JoinSet::new();

        match self.read_loop(reader, session, &outbox, &mut waiters).await {
            Ok(reason) => info!(%session, %reason, "session closed"),
            Err(e) => warn!(%session, error = %e, "session closed with error"),
        }

        // Dropping pending waiters releases their outbox clones.
        waiters.shutdown().await;
        self.dispatcher.disconnect(session);
        self.registry.unregister(session);
        drop(outbox);
        if let Err(e) = writer_task.await {
            warn!(%session, error = %e, "writer task failed");
        }
    }

    async fn read_loop<R>(
        &self,
        mut reader: R,
        session: SessionId,
        outbox: &Outbox,
        waiters: &mut JoinSet<()>,
    ) -> Result<String, ServerError>
    where
        R: AsyncRead + Unpin,
    {
        while let Some(message) = read_message(&mut reader, self.max_frame_bytes).await? {
            for action in self.dispatcher.handle_message(session, &message)? {
                match action {
                    ServerAction::Reply(frame) => {
                        if outbox.send(frame).await.is_err() {
                            return Ok("writer stopped".to_owned());
                        }
                    },
                    ServerAction::SendTo { session: recipient, frame } => {
                        self.registry.send(recipient, frame);
                    },
                    ServerAction::AwaitStageBinary { ack_handle, stage_id, key } => {
                        let dispatcher = self.dispatcher.clone();
                        let outbox = outbox.clone();
                        waiters.spawn(async move {
                            match dispatcher.await_stage_binary(ack_handle, &stage_id, key).await {
                                Ok(frame) => {
                                    let _ = outbox.send(frame).await;
                                },
                                Err(e) => warn!(%session, error = %e, "stage binary reply failed"),
                            }
                        });
                    },
                    ServerAction::Close { reason } => return Ok(reason),
                }
            }
            // Reap finished waiters so the set does not grow unbounded.
            while waiters.try_join_next().is_some() {}
        }
        Ok("peer closed".to_owned())
    }
}

async fn write_loop<W>(mut writer: W, mut inbox: mpsc::Receiver<Frame>, session: SessionId)
where
    W: AsyncWrite + Unpin,
{
    while let Some(frame) = inbox.recv().await {
        if let Err(e) = write_message(&mut writer, &frame.encode()).await {
            debug!(%session, error = %e, "write failed");
            break;
        }
    }
}
