//! Connection worker
//!
//! One worker per accepted connection reads frames strictly in order: the
//! handshake line first, then header lines, each fully handled (including
//! any binary body) before the next is read.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{AsyncRead, BufReader};
use tokio::sync::watch;

use crate::error::{ProtocolError, RegistryError, Result};
use crate::protocol::codec;
use crate::protocol::ClientFrame;
use crate::registry::ConnectionId;
use crate::session::SessionContext;

use super::dispatch::Dispatcher;
use super::listener::Shared;
use super::transfer::{self, TransferRequest};

/// Reading side of one client connection
pub(crate) struct Connection<R> {
    ctx: SessionContext,
    reader: BufReader<R>,
    shared: Arc<Shared>,
}

impl<R> Connection<R>
where
    R: AsyncRead + Unpin,
{
    pub(crate) fn new(
        session_id: ConnectionId,
        peer_addr: SocketAddr,
        reader: R,
        shared: Arc<Shared>,
    ) -> Self {
        let reader = BufReader::with_capacity(shared.config.read_buffer_size, reader);
        Self {
            ctx: SessionContext::new(session_id, peer_addr),
            reader,
            shared,
        }
    }

    /// Serve frames until the peer goes away or shutdown fires
    pub(crate) async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        if *shutdown.borrow() {
            return Ok(());
        }

        let result = tokio::select! {
            _ = shutdown.changed() => Ok(()),
            result = self.serve() => result,
        };

        self.ctx.close();
        tracing::debug!(
            session_id = self.ctx.session_id,
            name = self.ctx.display_name(),
            duration = ?self.ctx.duration(),
            "Session closed"
        );
        result
    }

    async fn serve(&mut self) -> Result<()> {
        if !self.handshake().await? {
            return Ok(());
        }

        while let Some(line) = self.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }

            self.shared.metrics.frame_received();
            match ClientFrame::parse(&line) {
                Ok(frame) => self.dispatch(frame).await?,
                Err(e) => {
                    self.shared.metrics.malformed_frame();
                    tracing::warn!(
                        session_id = self.ctx.session_id,
                        peer = %self.ctx.peer_addr,
                        name = self.ctx.display_name(),
                        error = %e,
                        "Malformed frame discarded"
                    );
                    self.shared.events.warn(
                        Some(self.ctx.session_id),
                        format!("{} from {}", e, self.ctx.display_name()),
                    );
                }
            }
        }

        Ok(())
    }

    /// Read the display name and register it
    ///
    /// Returns false if the peer closed before sending anything.
    async fn handshake(&mut self) -> Result<bool> {
        let Some(line) = self.next_line().await? else {
            return Ok(false);
        };

        let name = line.trim();
        if name.is_empty() {
            return Err(ProtocolError::EmptyName.into());
        }

        let change = match self
            .shared
            .directory
            .register(self.ctx.session_id, name, self.shared.config.unique_names)
            .await
        {
            Ok(change) => change,
            Err(RegistryError::NameTaken(name)) => {
                return Err(ProtocolError::NameTaken(name).into());
            }
            Err(e) => return Err(e.into()),
        };

        self.ctx.complete_handshake(name.to_string());
        tracing::info!(
            session_id = self.ctx.session_id,
            peer = %self.ctx.peer_addr,
            name = %name,
            clients = change.names.len(),
            "Client registered"
        );
        self.shared.events.info(
            Some(self.ctx.session_id),
            format!("Client connected: {}", name),
        );
        self.shared.events.client_list(&change.names);

        let dispatcher = Dispatcher::new(&self.shared, self.ctx.session_id, name);
        dispatcher.report(&change.delivery);

        Ok(true)
    }

    async fn dispatch(&mut self, frame: ClientFrame) -> Result<()> {
        let dispatcher = Dispatcher::new(
            &self.shared,
            self.ctx.session_id,
            self.ctx.display_name(),
        );

        match frame {
            ClientFrame::Chat(text) => dispatcher.chat(&text).await,
            ClientFrame::Private { target, text } => dispatcher.private(&target, &text).await,
            ClientFrame::Group { group, text } => dispatcher.group(&group, &text).await,
            ClientFrame::CreateGroup { group, members } => {
                dispatcher.create_group(&group, &members).await
            }
            ClientFrame::Transfer {
                kind,
                target,
                filename,
                length,
            } => {
                let request = TransferRequest {
                    kind,
                    target,
                    filename,
                    length,
                };
                return transfer::relay(&mut self.reader, &dispatcher, request).await;
            }
        }

        Ok(())
    }

    async fn next_line(&mut self) -> Result<Option<String>> {
        codec::read_line(&mut self.reader, self.shared.config.max_header_len).await
    }
}
