//! Read-side message feed projection.
//!
//! A [`MessageFeed`] subscribes to one conversation's message stream and
//! keeps the latest decoded, ordered list in a watch channel. An empty
//! delivery never clears a populated feed: the store briefly reports an
//! empty subtree while the first append is in flight, and the original
//! client ignored empty results for the same reason.

use tokio::sync::watch;

use causerie_shared::ConversationId;
use causerie_store::TreeStore;

use crate::engine::SyncEngine;
use crate::error::Result;
use crate::records::MessageRecord;

pub struct MessageFeed {
    rx: watch::Receiver<Vec<MessageRecord>>,
}

impl MessageFeed {
    /// Open a live feed over `conversation`. The background task ends
    /// when the feed (or the store subscription) is dropped.
    pub async fn open<S: TreeStore>(
        engine: &SyncEngine<S>,
        conversation: &ConversationId,
    ) -> Result<Self> {
        let mut source = engine.messages(conversation).await?;
        let (tx, rx) = watch::channel(Vec::new());

        tokio::spawn(async move {
            while let Some(list) = source.recv().await {
                if list.is_empty() && !tx.borrow().is_empty() {
                    continue;
                }
                if tx.send(list).is_err() {
                    break;
                }
            }
        });

        Ok(Self { rx })
    }

    /// Current ordered snapshot.
    pub fn snapshot(&self) -> Vec<MessageRecord> {
        self.rx.borrow().clone()
    }

    /// The most recent message, if any.
    pub fn latest(&self) -> Option<MessageRecord> {
        self.rx.borrow().last().cloned()
    }

    /// Wait for the feed content to change. Returns `false` once the
    /// producing side is gone.
    pub async fn changed(&mut self) -> bool {
        self.rx.changed().await.is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::{Directory, NewUser};
    use crate::engine::OutgoingMessage;
    use causerie_shared::{MessageBody, MessageId, Session, UserKey};
    use causerie_store::{MemoryTreeStore, TreePath, TreeStore};
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;

    async fn seeded() -> (
        SyncEngine<MemoryTreeStore>,
        ConversationId,
        UserKey,
        Arc<MemoryTreeStore>,
    ) {
        let store = Arc::new(MemoryTreeStore::new());
        let dir = Directory::new(store.clone());
        for (first, last, email) in [("A", "B", "a-b@example-com"), ("X", "Y", "x-y@example-com")] {
            dir.register(&NewUser {
                first_name: first.to_string(),
                last_name: last.to_string(),
                email: email.to_string(),
            })
            .await
            .unwrap();
        }

        let engine =
            SyncEngine::new(store.clone(), Some(Session::new("a-b@example-com", "A B"))).unwrap();
        let other = UserKey::derive("x-y@example-com");
        let first = OutgoingMessage {
            id: MessageId::from_stored("m1"),
            sent_at: chrono::Utc::now(),
            body: MessageBody::Text("hi".to_string()),
        };
        let id = engine
            .create_conversation(&other, "X Y", &first)
            .await
            .unwrap();
        (engine, id, other, store)
    }

    #[tokio::test]
    async fn feed_tracks_appends() {
        let (engine, id, other, _store) = seeded().await;
        let mut feed = MessageFeed::open(&engine, &id).await.unwrap();

        // Initial snapshot arrives with the seeded message.
        while feed.snapshot().is_empty() {
            assert!(feed.changed().await);
        }
        assert_eq!(feed.snapshot().len(), 1);

        let reply = OutgoingMessage::compose(
            engine.session(),
            &other,
            MessageBody::Text("encore là ?".to_string()),
        );
        engine.send_message(&id, &other, "X Y", &reply).await.unwrap();

        while feed.snapshot().len() < 2 {
            assert!(feed.changed().await);
        }
        assert_eq!(
            feed.latest().unwrap().body,
            MessageBody::Text("encore là ?".to_string())
        );
    }

    #[tokio::test]
    async fn empty_delivery_does_not_clear_a_populated_feed() {
        let (engine, id, _other, store) = seeded().await;
        let mut feed = MessageFeed::open(&engine, &id).await.unwrap();
        while feed.snapshot().is_empty() {
            assert!(feed.changed().await);
        }

        // Simulate the store reporting an empty subtree.
        let path = TreePath::new([id.as_str(), "messages"]).unwrap();
        store.write(&path, json!([])).await.unwrap();

        // Long enough for the delivery to cross both background tasks.
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(feed.snapshot().len(), 1);
    }
}
