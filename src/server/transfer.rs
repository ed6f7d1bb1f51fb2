//! Binary transfer handler
//!
//! Runs on the sender's connection right after a `FILE`/`IMAGE` header,
//! before the next header is read. The body is accumulated in full first;
//! only then is the target resolved and a re-tagged frame queued:
//!
//! ```text
//! in:  FILE|Bob|report.pdf|2048\n <2048 bytes>
//! out: FILE|Alice|report.pdf|2048\n <same 2048 bytes>   (to Bob)
//! ```
//!
//! A stream that ends mid-body forwards nothing and the error propagates so
//! the connection is torn down.

use tokio::io::AsyncRead;

use crate::error::Result;
use crate::fanout;
use crate::protocol::codec;
use crate::protocol::{ServerMessage, TransferKind};
use crate::registry::Recipient;

use super::dispatch::Dispatcher;

/// A transfer header as received
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct TransferRequest {
    pub kind: TransferKind,
    pub target: String,
    pub filename: String,
    pub length: u64,
}

/// Where a transfer goes
enum TransferTarget {
    Group(Vec<Recipient>),
    Client(Recipient),
}

/// Receive the body from `reader` and relay it
///
/// Returns an error only when the body could not be read; every other
/// failure is logged and the connection stays usable.
pub(crate) async fn relay<R>(
    reader: &mut R,
    dispatcher: &Dispatcher<'_>,
    request: TransferRequest,
) -> Result<()>
where
    R: AsyncRead + Unpin,
{
    let shared = dispatcher.shared();
    let session_id = Some(dispatcher.session_id());
    let TransferRequest {
        kind,
        target,
        filename,
        length,
    } = request;

    if length > shared.config.max_transfer_size {
        shared.metrics.transfer_failed();
        tracing::warn!(
            session_id = dispatcher.session_id(),
            name = dispatcher.sender(),
            kind = kind.prefix(),
            filename = %filename,
            length,
            limit = shared.config.max_transfer_size,
            "Oversized transfer discarded"
        );
        shared.events.warn(
            session_id,
            format!(
                "{} '{}' from {} is {} bytes (limit {}), discarded",
                kind.prefix(),
                filename,
                dispatcher.sender(),
                length,
                shared.config.max_transfer_size
            ),
        );
        return codec::discard_body(reader, length).await;
    }

    let body = match codec::read_body(reader, length).await {
        Ok(body) => body,
        Err(e) => {
            shared.metrics.transfer_failed();
            tracing::error!(
                session_id = dispatcher.session_id(),
                name = dispatcher.sender(),
                kind = kind.prefix(),
                filename = %filename,
                error = %e,
                "Transfer body not received"
            );
            shared.events.error(
                session_id,
                format!("Error handling {} '{}': {}", kind.prefix(), filename, e),
            );
            return Err(e);
        }
    };

    let Some(resolved) = resolve_target(dispatcher, kind, &target).await else {
        shared.metrics.transfer_failed();
        tracing::warn!(
            session_id = dispatcher.session_id(),
            name = dispatcher.sender(),
            kind = kind.prefix(),
            target = %target,
            "Transfer target not found"
        );
        let what = if kind.allows_group() {
            "Group or client"
        } else {
            "Client"
        };
        shared.events.error(
            session_id,
            format!("Error: {} '{}' not found.", what, target),
        );
        return Ok(());
    };

    let frame = ServerMessage::TransferHeader {
        kind,
        sender: dispatcher.sender().to_string(),
        filename: filename.clone(),
        length,
    }
    .encode_with_body(&body);

    match resolved {
        TransferTarget::Group(members) => {
            let delivery = fanout::send_to_many(
                members.iter().map(|m| &m.outbound),
                &frame,
                Some(dispatcher.session_id()),
                &shared.metrics,
            );
            tracing::info!(
                session_id = dispatcher.session_id(),
                name = dispatcher.sender(),
                kind = kind.prefix(),
                group = %target,
                filename = %filename,
                length,
                recipients = delivery.delivered,
                "Transfer relayed to group"
            );
            shared.events.info(
                session_id,
                format!(
                    "{} '{}' sent from {} to group {}",
                    kind.prefix(),
                    filename,
                    dispatcher.sender(),
                    target
                ),
            );
            dispatcher.report(&delivery);
        }
        TransferTarget::Client(recipient) => {
            match fanout::send_to(&recipient.outbound, frame, &shared.metrics) {
                Ok(()) => {
                    tracing::info!(
                        session_id = dispatcher.session_id(),
                        name = dispatcher.sender(),
                        kind = kind.prefix(),
                        target = %target,
                        filename = %filename,
                        length,
                        "Transfer relayed"
                    );
                    shared.events.info(
                        session_id,
                        format!(
                            "{} sent from {} to {}: {}",
                            kind.prefix(),
                            dispatcher.sender(),
                            target,
                            filename
                        ),
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        session_id = dispatcher.session_id(),
                        kind = kind.prefix(),
                        target = %target,
                        error = %e,
                        "Transfer not delivered"
                    );
                    shared.events.warn(
                        session_id,
                        format!("Failed to send {} to {}: {}", kind.prefix(), target, e),
                    );
                }
            }
        }
    }

    shared.metrics.transfer_completed();
    Ok(())
}

/// Groups take precedence over client names for `FILE`
async fn resolve_target(
    dispatcher: &Dispatcher<'_>,
    kind: TransferKind,
    target: &str,
) -> Option<TransferTarget> {
    let directory = &dispatcher.shared().directory;

    if kind.allows_group() {
        if let Some(members) = directory.group_recipients(target).await {
            return Some(TransferTarget::Group(members));
        }
    }

    directory.resolve(target).await.map(TransferTarget::Client)
}
