//! The hub task: sole owner of the shared document.
//!
//! Connections talk to the coordinator only through [`HubHandle`]. Commands
//! are processed one at a time, so every log mutation and the broadcast it
//! produces happen before the next command is looked at.

use inkshare_core::{
    ClientMessage, CoordinatorStats, Outbox, ParticipantId, SessionHandler, SyncCoordinator,
};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};

#[derive(Debug, Error)]
#[error("sync hub has shut down")]
pub struct HubClosed;

/// Commands accepted by the hub.
#[derive(Debug)]
pub enum HubCommand {
    Connect {
        id: ParticipantId,
        outbox: Outbox,
    },
    Inbound {
        from: ParticipantId,
        msg: ClientMessage,
    },
    Disconnect {
        id: ParticipantId,
    },
    Stats {
        reply: oneshot::Sender<CoordinatorStats>,
    },
}

/// Cloneable sender side of the hub.
#[derive(Debug, Clone)]
pub struct HubHandle {
    tx: mpsc::Sender<HubCommand>,
}

impl HubHandle {
    /// Start a hub task with an empty document.
    pub fn spawn(capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        tokio::spawn(run(SyncCoordinator::new(), rx));
        Self { tx }
    }

    async fn submit(&self, cmd: HubCommand) -> Result<(), HubClosed> {
        self.tx.send(cmd).await.map_err(|_| HubClosed)
    }

    pub async fn connect(&self, id: ParticipantId, outbox: Outbox) -> Result<(), HubClosed> {
        self.submit(HubCommand::Connect { id, outbox }).await
    }

    pub async fn inbound(&self, from: ParticipantId, msg: ClientMessage) -> Result<(), HubClosed> {
        self.submit(HubCommand::Inbound { from, msg }).await
    }

    pub async fn disconnect(&self, id: ParticipantId) -> Result<(), HubClosed> {
        self.submit(HubCommand::Disconnect { id }).await
    }

    pub async fn stats(&self) -> Result<CoordinatorStats, HubClosed> {
        let (reply, rx) = oneshot::channel();
        self.submit(HubCommand::Stats { reply }).await?;
        rx.await.map_err(|_| HubClosed)
    }
}

async fn run(mut coordinator: SyncCoordinator, mut rx: mpsc::Receiver<HubCommand>) {
    info!("Sync hub started");
    while let Some(cmd) = rx.recv().await {
        match cmd {
            HubCommand::Connect { id, outbox } => {
                coordinator.on_connect(id, outbox);
            }
            HubCommand::Inbound { from, msg } => {
                debug!("{} from {}", msg.kind(), from);
                coordinator.dispatch(from, msg);
            }
            HubCommand::Disconnect { id } => coordinator.on_disconnect(id),
            HubCommand::Stats { reply } => {
                let _ = reply.send(coordinator.stats());
            }
        }
    }
    info!("Sync hub stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use inkshare_core::{OutboxReceiver, Point, ServerMessage, Stroke, outbox};
    use std::time::Duration;
    use tokio::time::timeout;
    use uuid::Uuid;

    async fn recv(rx: &mut OutboxReceiver) -> ServerMessage {
        let msg = timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("timed out waiting for message")
            .expect("outbox closed");
        (*msg).clone()
    }

    async fn join(hub: &HubHandle) -> (ParticipantId, OutboxReceiver) {
        let id = Uuid::new_v4();
        let (tx, rx) = outbox(64);
        hub.connect(id, tx).await.unwrap();
        (id, rx)
    }

    fn stroke() -> Stroke {
        Stroke::from_points(vec![
            Point::new(0.0, 0.0, "#000000", 2.0),
            Point::new(4.0, 4.0, "#000000", 2.0),
        ])
    }

    #[tokio::test]
    async fn test_commit_relayed_through_hub() {
        let hub = HubHandle::spawn(16);
        let (a, mut rx_a) = join(&hub).await;
        let (_b, mut rx_b) = join(&hub).await;

        assert_eq!(recv(&mut rx_b).await.kind(), "init_state");
        assert_eq!(recv(&mut rx_b).await.kind(), "user_list");

        hub.inbound(a, ClientMessage::EndStroke { stroke: stroke() })
            .await
            .unwrap();
        match recv(&mut rx_b).await {
            ServerMessage::RemoteStrokeEnd { id, user_id, .. } => {
                assert_eq!(id, 0);
                assert_eq!(user_id, a);
            }
            other => panic!("unexpected {}", other.kind()),
        }

        // a: init_state, user_list, user_list, user_joined; nothing for its own stroke.
        for expected in ["init_state", "user_list", "user_list", "user_joined"] {
            assert_eq!(recv(&mut rx_a).await.kind(), expected);
        }
        let stats = hub.stats().await.unwrap();
        assert_eq!(stats.operations, 1);
        assert!(rx_a.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_concurrent_commits_get_distinct_consecutive_ids() {
        let hub = HubHandle::spawn(64);
        let (a, _rx_a) = join(&hub).await;
        let (b, _rx_b) = join(&hub).await;
        let (_observer, mut rx_obs) = join(&hub).await;
        recv(&mut rx_obs).await;
        recv(&mut rx_obs).await;

        let (hub_a, hub_b) = (hub.clone(), hub.clone());
        let send_a = tokio::spawn(async move {
            hub_a
                .inbound(a, ClientMessage::EndStroke { stroke: stroke() })
                .await
        });
        let send_b = tokio::spawn(async move {
            hub_b
                .inbound(b, ClientMessage::EndStroke { stroke: stroke() })
                .await
        });
        send_a.await.unwrap().unwrap();
        send_b.await.unwrap().unwrap();

        let mut ids = Vec::new();
        let mut authors = Vec::new();
        for _ in 0..2 {
            match recv(&mut rx_obs).await {
                ServerMessage::RemoteStrokeEnd { id, user_id, .. } => {
                    ids.push(id);
                    authors.push(user_id);
                }
                other => panic!("unexpected {}", other.kind()),
            }
        }
        assert_eq!(ids, vec![0, 1]);
        authors.sort();
        let mut expected = vec![a, b];
        expected.sort();
        assert_eq!(authors, expected);
    }

    #[tokio::test]
    async fn test_disconnect_updates_roster() {
        let hub = HubHandle::spawn(16);
        let (_a, mut rx_a) = join(&hub).await;
        let (b, _rx_b) = join(&hub).await;
        hub.disconnect(b).await.unwrap();

        let mut kinds = Vec::new();
        for _ in 0..6 {
            kinds.push(recv(&mut rx_a).await.kind());
        }
        assert_eq!(
            kinds,
            vec!["init_state", "user_list", "user_list", "user_joined", "user_list", "user_left"]
        );
        assert_eq!(hub.stats().await.unwrap().participants, 1);
    }

    #[tokio::test]
    async fn test_stalled_reader_is_closed_not_diverged() {
        let hub = HubHandle::spawn(64);
        let (a, _rx_a) = join(&hub).await;
        let slow = Uuid::new_v4();
        let (tx, mut rx_slow) = outbox(4);
        hub.connect(slow, tx).await.unwrap();

        for _ in 0..6 {
            hub.inbound(a, ClientMessage::EndStroke { stroke: stroke() })
                .await
                .unwrap();
        }
        assert_eq!(hub.stats().await.unwrap().participants, 1);

        // What was queued is delivered, then the outbox closes.
        let mut seen = 0;
        while timeout(Duration::from_secs(2), rx_slow.recv())
            .await
            .expect("timed out waiting for outbox to close")
            .is_some()
        {
            seen += 1;
        }
        assert_eq!(seen, 4);

        // The socket task's own disconnect afterwards is harmless.
        hub.disconnect(slow).await.unwrap();
        let stats = hub.stats().await.unwrap();
        assert_eq!(stats.participants, 1);
        assert_eq!(stats.operations, 6);
    }
}
