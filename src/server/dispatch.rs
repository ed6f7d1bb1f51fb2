//! Protocol dispatcher
//!
//! Routes parsed text frames from one connection to broadcast, private,
//! group and group-creation handling. Unresolved targets and rejected
//! requests are logged; the sender never gets a reply.

use crate::fanout::{self, Delivery};
use crate::protocol::ServerMessage;
use crate::registry::{ConnectionId, RegistryError};
use crate::session::EnqueueError;

use super::listener::Shared;

/// Per-frame dispatch context for one sender
pub(crate) struct Dispatcher<'a> {
    shared: &'a Shared,
    session_id: ConnectionId,
    sender: &'a str,
}

impl<'a> Dispatcher<'a> {
    pub(crate) fn new(shared: &'a Shared, session_id: ConnectionId, sender: &'a str) -> Self {
        Self {
            shared,
            session_id,
            sender,
        }
    }

    pub(crate) fn shared(&self) -> &Shared {
        self.shared
    }

    pub(crate) fn session_id(&self) -> ConnectionId {
        self.session_id
    }

    pub(crate) fn sender(&self) -> &str {
        self.sender
    }

    /// Plain text: everyone but the sender gets `<sender>: <text>`
    pub(crate) async fn chat(&self, text: &str) {
        let frame = ServerMessage::Chat {
            sender: self.sender.to_string(),
            text: text.to_string(),
        }
        .encode();

        let delivery = self
            .shared
            .directory
            .broadcast(&frame, Some(self.session_id))
            .await;

        tracing::info!(
            session_id = self.session_id,
            name = self.sender,
            recipients = delivery.delivered,
            "Chat broadcast"
        );
        self.shared
            .events
            .info(Some(self.session_id), format!("{}: {}", self.sender, text));
        self.report(&delivery);
    }

    /// `PRIVATE|<target>|<text>`
    pub(crate) async fn private(&self, target: &str, text: &str) {
        let Some(recipient) = self.shared.directory.resolve(target).await else {
            tracing::warn!(
                session_id = self.session_id,
                name = self.sender,
                target = %target,
                "Private message target not found"
            );
            self.shared.events.warn(
                Some(self.session_id),
                format!("Target client {} not found.", target),
            );
            return;
        };

        let frame = ServerMessage::Private {
            sender: self.sender.to_string(),
            text: text.to_string(),
        }
        .encode();

        match fanout::send_to(&recipient.outbound, frame, &self.shared.metrics) {
            Ok(()) => {
                tracing::info!(
                    session_id = self.session_id,
                    name = self.sender,
                    target = %target,
                    target_id = recipient.id,
                    "Private message relayed"
                );
                self.shared.events.info(
                    Some(self.session_id),
                    format!(
                        "Private message sent from {} to {}: {}",
                        self.sender, target, text
                    ),
                );
            }
            Err(e) => {
                tracing::warn!(
                    session_id = self.session_id,
                    target = %target,
                    error = %e,
                    "Private message not delivered"
                );
                self.shared.events.warn(
                    Some(self.session_id),
                    format!("Failed to send private message to {}: {}", target, e),
                );
            }
        }
    }

    /// `GROUP|<group>|<text>`: every member except the sender
    pub(crate) async fn group(&self, group: &str, text: &str) {
        let Some(recipients) = self.shared.directory.group_recipients(group).await else {
            tracing::warn!(
                session_id = self.session_id,
                name = self.sender,
                group = %group,
                "Group not found"
            );
            self.shared
                .events
                .warn(Some(self.session_id), format!("Group {} not found.", group));
            return;
        };

        let frame = ServerMessage::Group {
            group: group.to_string(),
            sender: self.sender.to_string(),
            text: text.to_string(),
        }
        .encode();

        let delivery = fanout::send_to_many(
            recipients.iter().map(|r| &r.outbound),
            &frame,
            Some(self.session_id),
            &self.shared.metrics,
        );

        tracing::info!(
            session_id = self.session_id,
            name = self.sender,
            group = %group,
            recipients = delivery.delivered,
            "Group message relayed"
        );
        self.shared.events.info(
            Some(self.session_id),
            format!("Group message sent to {}: {}", group, text),
        );
        self.report(&delivery);
    }

    /// `CREATEGROUP|<group>|<names>`: create, then tell every final member
    pub(crate) async fn create_group(&self, group: &str, members: &[String]) {
        let created = match self
            .shared
            .directory
            .create_group(group, self.session_id, members)
            .await
        {
            Ok(created) => created,
            Err(RegistryError::GroupAlreadyExists(name)) => {
                tracing::warn!(session_id = self.session_id, group = %name, "Group already exists");
                self.shared
                    .events
                    .warn(Some(self.session_id), format!("Group {} already exists.", name));
                return;
            }
            Err(e) => {
                tracing::warn!(
                    session_id = self.session_id,
                    group = %group,
                    error = %e,
                    "Group creation failed"
                );
                self.shared.events.warn(
                    Some(self.session_id),
                    format!("Failed to create group {}: {}", group, e),
                );
                return;
            }
        };

        for name in &created.unresolved {
            tracing::warn!(
                session_id = self.session_id,
                group = %group,
                member = %name,
                "Group member not found"
            );
            self.shared.events.warn(
                Some(self.session_id),
                format!("Warning: Member {} not found.", name),
            );
        }

        let names = created.member_names();
        let frame = ServerMessage::GroupAdded {
            group: group.to_string(),
            members: names.clone(),
        }
        .encode();

        let delivery = fanout::send_to_many(
            created.members.iter().map(|m| &m.outbound),
            &frame,
            None,
            &self.shared.metrics,
        );

        tracing::info!(
            session_id = self.session_id,
            name = self.sender,
            group = %group,
            members = ?names,
            "Group created"
        );
        self.shared.events.info(
            Some(self.session_id),
            format!(
                "Group {} created successfully with members: {}.",
                group,
                names.join(", ")
            ),
        );
        self.report(&delivery);

        if self.shared.config.announce_groups {
            let groups = self.shared.directory.group_names().await;
            tracing::debug!(groups = groups.len(), "Announcing group list");
            let frame = ServerMessage::GroupList(groups).encode();
            let delivery = self.shared.directory.broadcast(&frame, None).await;
            self.report(&delivery);
        }
    }

    /// Tell the observer about each recipient a fan-out could not reach
    ///
    /// The drop itself is traced by the fan-out.
    pub(crate) fn report(&self, delivery: &Delivery) {
        if delivery.is_complete() {
            return;
        }

        for (target, error) in &delivery.failed {
            let message = format!("Error sending message to client {}: {}", target, error);
            match error {
                EnqueueError::Full => self.shared.events.warn(Some(*target), message),
                EnqueueError::Closed => self.shared.events.debug(Some(*target), message),
            }
        }
    }
}
