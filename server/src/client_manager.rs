//! Registry of connected players' message channels.
//!
//! Broadcasting goes through here. Sends only queue frames, so one slow or
//! dead client never holds up the others; a channel that refuses a send is
//! reported back so the caller can drop that player.

use log::{debug, info, warn};
use shared::{Message, MessageChannel, PlayerId};
use std::collections::BTreeMap;
use std::sync::Arc;

/// A connected client's outbound side.
pub struct Client {
    /// Player id assigned by the server
    pub id: PlayerId,
    /// Framed connection to the client
    pub channel: Arc<MessageChannel>,
}

impl Client {
    pub fn new(id: PlayerId, channel: Arc<MessageChannel>) -> Self {
        Self { id, channel }
    }

    /// Queues `message`, returning false if the channel is closed.
    pub fn send(&self, message: &Message) -> bool {
        match self.channel.send(message) {
            Ok(()) => true,
            Err(e) => {
                debug!("Send to player {} failed: {}", self.id, e);
                false
            }
        }
    }
}

pub struct ClientManager {
    /// Connected clients indexed by player id
    clients: BTreeMap<PlayerId, Client>,
    /// Next id handed to a new connection
    next_client_id: PlayerId,
}

impl Default for ClientManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientManager {
    pub fn new() -> Self {
        Self {
            clients: BTreeMap::new(),
            next_client_id: 1,
        }
    }

    /// Hands out the id the next connection will use. Ids are never reused.
    pub fn allocate_id(&mut self) -> PlayerId {
        let id = self.next_client_id;
        self.next_client_id += 1;
        id
    }

    pub fn add_client(&mut self, id: PlayerId, channel: Arc<MessageChannel>) {
        info!("Client {} connected from {}", id, channel.peer());
        self.clients.insert(id, Client::new(id, channel));
    }

    /// Removes the client and closes its channel. Queued frames still flush.
    pub fn remove_client(&mut self, id: PlayerId) -> Option<Arc<MessageChannel>> {
        let client = self.clients.remove(&id)?;
        client.channel.close();
        info!("Client {} disconnected", id);
        Some(client.channel)
    }

    /// Sends to one client. Returns false if it is unknown or its channel is closed.
    pub fn send_to(&self, id: PlayerId, message: &Message) -> bool {
        self.clients
            .get(&id)
            .map(|client| client.send(message))
            .unwrap_or(false)
    }

    /// Sends `message` to every client except `exclude` and returns the ids
    /// whose channels refused it.
    pub fn broadcast(&self, message: &Message, exclude: Option<PlayerId>) -> Vec<PlayerId> {
        let failed: Vec<PlayerId> = self
            .clients
            .values()
            .filter(|client| Some(client.id) != exclude)
            .filter(|client| !client.send(message))
            .map(|client| client.id)
            .collect();

        if !failed.is_empty() {
            warn!(
                "Broadcast of {} failed for players {:?}",
                message.action(),
                failed
            );
        }
        failed
    }

    /// Takes every channel out of the registry, e.g. for a final flush.
    pub fn drain(&mut self) -> Vec<Arc<MessageChannel>> {
        std::mem::take(&mut self.clients)
            .into_values()
            .map(|client| client.channel)
            .collect()
    }

    pub fn contains(&self, id: PlayerId) -> bool {
        self.clients.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}
