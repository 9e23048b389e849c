//! The conversation sync engine.
//!
//! Owns the mapping between domain entities and tree paths, and the rules
//! that keep a two-party conversation's message log and the two
//! denormalized summaries consistent:
//!
//! - `<userKey>` holds `{first_name, last_name, conversations: [...]}`
//! - `<conversationId>/messages` holds the ordered message log
//!
//! Every list mutation is a read-modify-write against the shared store.
//! Under [`WritePolicy::Serialized`] (the default) each cycle runs as a
//! compare-and-swap retry loop, so concurrent appends all land. The blind
//! read-then-overwrite the mobile client shipped with is kept as
//! [`WritePolicy::LastWriteWins`] for behavioral parity with existing
//! deployments; under it, a concurrent append between the read and the
//! write is lost.
//!
//! Calls return only after every write they issued has been acknowledged.
//! There is no rollback: if a summary propagation fails after the log
//! append landed, the error is reported and the log keeps the message.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tracing::{debug, info};

use causerie_shared::{ConversationId, MessageBody, MessageId, Session, UserKey};
use causerie_store::{TreePath, TreeStore};

use crate::error::{Result, SyncError};
use crate::records::{
    self, ConversationSummary, LatestMessage, MessageRecord,
};

/// How list read-modify-write cycles are coordinated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WritePolicy {
    /// Compare-and-swap with retries; concurrent appends all land.
    #[default]
    Serialized,
    /// Plain read-then-overwrite, faithful to the original client.
    LastWriteWins,
}

/// Upper bound on compare-and-swap retries before reporting a conflict.
pub(crate) const MAX_CAS_RETRIES: usize = 16;

/// A message composed locally and not yet written to the store.
#[derive(Debug, Clone)]
pub struct OutgoingMessage {
    pub id: MessageId,
    pub sent_at: DateTime<Utc>,
    pub body: MessageBody,
}

impl OutgoingMessage {
    /// Compose a message from `session` to `other`, stamped now.
    pub fn compose(session: &Session, other: &UserKey, body: MessageBody) -> Self {
        let sent_at = Utc::now();
        Self {
            id: MessageId::compose(other, &session.user_key, sent_at),
            sent_at,
            body,
        }
    }
}

pub struct SyncEngine<S> {
    store: Arc<S>,
    session: Session,
    policy: WritePolicy,
}

impl<S: TreeStore> SyncEngine<S> {
    /// Build an engine for an authenticated session.
    pub fn new(store: Arc<S>, session: Option<Session>) -> Result<Self> {
        let session = session.ok_or(SyncError::NotAuthenticated)?;
        Ok(Self {
            store,
            session,
            policy: WritePolicy::default(),
        })
    }

    pub fn with_policy(mut self, policy: WritePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    // ------------------------------------------------------------------
    // Write path
    // ------------------------------------------------------------------

    /// Create a conversation with `other` seeded by `first`.
    ///
    /// Appends a summary to both participants' conversation lists, then
    /// initializes the message log with the first record. The three
    /// writes are independent; there is no cross-step isolation beyond
    /// the per-list policy.
    pub async fn create_conversation(
        &self,
        other: &UserKey,
        display_name: &str,
        first: &OutgoingMessage,
    ) -> Result<ConversationId> {
        let me = &self.session.user_key;

        // The caller must already have a record in the store.
        if self.store.read_once(&user_path(me)?).await?.is_none() {
            return Err(SyncError::UserNotFound(me.clone()));
        }

        let conversation_id = ConversationId::for_first_message(&first.id);
        let latest = LatestMessage {
            date: first.sent_at,
            preview: first.body.content(),
            is_read: false,
        };

        let theirs = ConversationSummary {
            id: conversation_id.clone(),
            other_user: me.clone(),
            display_name: self.session.display_name.clone(),
            latest: latest.clone(),
        };
        let mine = ConversationSummary {
            id: conversation_id.clone(),
            other_user: other.clone(),
            display_name: display_name.to_string(),
            latest,
        };

        self.append_summary(other, &theirs).await?;
        self.append_summary(me, &mine).await?;

        let record = MessageRecord {
            id: first.id.clone(),
            sender: me.clone(),
            display_name: display_name.to_string(),
            sent_at: first.sent_at,
            is_read: false,
            body: first.body.clone(),
        };
        let encoded = records::encode_message(&record)?;
        self.store
            .write(&messages_path(&conversation_id)?, json!([encoded]))
            .await?;

        info!(conversation = %conversation_id, other = %other, "conversation created");
        Ok(conversation_id)
    }

    /// Append `message` to an existing conversation, then refresh both
    /// participants' latest-message summaries.
    pub async fn send_message(
        &self,
        conversation: &ConversationId,
        other: &UserKey,
        display_name: &str,
        message: &OutgoingMessage,
    ) -> Result<()> {
        let me = &self.session.user_key;

        let record = MessageRecord {
            id: message.id.clone(),
            sender: me.clone(),
            display_name: display_name.to_string(),
            sent_at: message.sent_at,
            is_read: false,
            body: message.body.clone(),
        };
        let encoded = records::encode_message(&record)?;

        let log_conversation = conversation.clone();
        self.mutate_list(&messages_path(conversation)?, move |list| {
            let mut list = list
                .ok_or_else(|| SyncError::ConversationNotFound(log_conversation.clone()))?;
            list.push(encoded.clone());
            Ok(list)
        })
        .await?;

        let latest = records::encode_latest(&LatestMessage {
            date: message.sent_at,
            preview: message.body.content(),
            is_read: false,
        })?;

        self.update_latest(me, conversation, &latest).await?;
        self.update_latest(other, conversation, &latest).await?;

        debug!(conversation = %conversation, "message appended, summaries propagated");
        Ok(())
    }

    /// Append-or-initialize one participant's summary list.
    async fn append_summary(&self, user: &UserKey, summary: &ConversationSummary) -> Result<()> {
        let entry = records::encode_summary(summary)?;
        self.mutate_list(&conversations_path(user)?, move |list| {
            let mut list = list.unwrap_or_default();
            list.push(entry.clone());
            Ok(list)
        })
        .await
    }

    /// Replace the `latest_message` of the entry matching `conversation`
    /// in `user`'s summary list.
    async fn update_latest(
        &self,
        user: &UserKey,
        conversation: &ConversationId,
        latest: &Value,
    ) -> Result<()> {
        let conversation = conversation.clone();
        let latest = latest.clone();
        self.mutate_list(&conversations_path(user)?, move |list| {
            let mut list =
                list.ok_or_else(|| SyncError::ConversationNotFound(conversation.clone()))?;
            let entry = list
                .iter_mut()
                .find(|e| e.get("id").and_then(Value::as_str) == Some(conversation.as_str()))
                .ok_or_else(|| SyncError::ConversationNotFound(conversation.clone()))?;
            if let Some(map) = entry.as_object_mut() {
                map.insert("latest_message".to_string(), latest.clone());
            }
            Ok(list)
        })
        .await
    }

    /// One read-modify-write cycle over the JSON list at `path`, under the
    /// configured policy. The closure sees `None` when the node is absent
    /// or not a list, and may reject the state with an error.
    async fn mutate_list<F>(&self, path: &TreePath, mutate: F) -> Result<()>
    where
        F: Fn(Option<Vec<Value>>) -> Result<Vec<Value>>,
    {
        match self.policy {
            WritePolicy::LastWriteWins => {
                let current = self.store.read_once(path).await?;
                let next = mutate(as_list(current.as_ref()))?;
                self.store.write(path, Value::Array(next)).await?;
                Ok(())
            }
            WritePolicy::Serialized => {
                for attempt in 0..MAX_CAS_RETRIES {
                    let current = self.store.read_once(path).await?;
                    let next = mutate(as_list(current.as_ref()))?;
                    if self
                        .store
                        .compare_and_swap(path, current.as_ref(), Value::Array(next))
                        .await?
                    {
                        return Ok(());
                    }
                    debug!(path = %path, attempt, "list mutation conflicted, retrying");
                }
                Err(SyncError::Conflict(path.to_string()))
            }
        }
    }

    // ------------------------------------------------------------------
    // Read path
    // ------------------------------------------------------------------

    /// Continuous stream of `user`'s conversation list. Every store
    /// mutation re-delivers the full decoded list; undecodable entries
    /// are dropped, not fatal.
    pub async fn conversations(
        &self,
        user: &UserKey,
    ) -> Result<mpsc::Receiver<Vec<ConversationSummary>>> {
        let source = self.store.observe(&conversations_path(user)?).await?;
        Ok(decode_stream(source, records::decode_summaries))
    }

    /// Continuous stream of a conversation's decoded message log.
    pub async fn messages(
        &self,
        conversation: &ConversationId,
    ) -> Result<mpsc::Receiver<Vec<MessageRecord>>> {
        let source = self.store.observe(&messages_path(conversation)?).await?;
        Ok(decode_stream(source, records::decode_messages))
    }

    /// One-shot read of `user`'s conversation list.
    pub async fn conversations_once(&self, user: &UserKey) -> Result<Vec<ConversationSummary>> {
        let value = self.store.read_once(&conversations_path(user)?).await?;
        Ok(value.as_ref().map(records::decode_summaries).unwrap_or_default())
    }

    /// One-shot read of a conversation's message log.
    pub async fn messages_once(&self, conversation: &ConversationId) -> Result<Vec<MessageRecord>> {
        let value = self.store.read_once(&messages_path(conversation)?).await?;
        Ok(value.as_ref().map(records::decode_messages).unwrap_or_default())
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

pub(crate) fn user_path(user: &UserKey) -> Result<TreePath> {
    Ok(TreePath::new([user.as_str()])?)
}

fn conversations_path(user: &UserKey) -> Result<TreePath> {
    Ok(TreePath::new([user.as_str(), "conversations"])?)
}

fn messages_path(conversation: &ConversationId) -> Result<TreePath> {
    Ok(TreePath::new([conversation.as_str(), "messages"])?)
}

fn as_list(value: Option<&Value>) -> Option<Vec<Value>> {
    value.and_then(Value::as_array).cloned()
}

/// Map a raw observation stream through a list decoder on a background
/// task. The task ends when either side hangs up.
fn decode_stream<T: Send + 'static>(
    mut source: mpsc::Receiver<Value>,
    decode: fn(&Value) -> Vec<T>,
) -> mpsc::Receiver<Vec<T>> {
    let (tx, rx) = mpsc::channel(16);
    tokio::spawn(async move {
        while let Some(value) = source.recv().await {
            if tx.send(decode(&value)).await.is_err() {
                break;
            }
        }
    });
    rx
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::{Directory, NewUser};
    use async_trait::async_trait;
    use causerie_store::{MemoryTreeStore, StoreError};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Barrier;

    async fn registered(store: &Arc<MemoryTreeStore>, first: &str, last: &str, email: &str) {
        Directory::new(store.clone())
            .register(&NewUser {
                first_name: first.to_string(),
                last_name: last.to_string(),
                email: email.to_string(),
            })
            .await
            .unwrap();
    }

    fn engine(store: Arc<MemoryTreeStore>, email: &str, name: &str) -> SyncEngine<MemoryTreeStore> {
        SyncEngine::new(store, Some(Session::new(email, name))).unwrap()
    }

    fn first_message(text: &str) -> OutgoingMessage {
        OutgoingMessage {
            id: MessageId::from_stored("m1"),
            sent_at: Utc::now(),
            body: MessageBody::Text(text.to_string()),
        }
    }

    #[tokio::test]
    async fn missing_session_is_not_authenticated() {
        let store = Arc::new(MemoryTreeStore::new());
        assert!(matches!(
            SyncEngine::new(store, None).err(),
            Some(SyncError::NotAuthenticated)
        ));
    }

    #[tokio::test]
    async fn create_requires_registered_user() {
        let store = Arc::new(MemoryTreeStore::new());
        let engine = engine(store, "a.b@example.com", "A B");
        let err = engine
            .create_conversation(
                &UserKey::derive("x.y@example.com"),
                "X Y",
                &first_message("hi"),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::UserNotFound(_)));
    }

    #[tokio::test]
    async fn create_registers_summary_for_both_participants() {
        let store = Arc::new(MemoryTreeStore::new());
        registered(&store, "A", "B", "a-b@example-com").await;
        registered(&store, "X", "Y", "x-y@example-com").await;

        let engine = engine(store.clone(), "a-b@example-com", "A B");
        let other = UserKey::derive("x-y@example-com");

        let id = engine
            .create_conversation(&other, "X Y", &first_message("hi"))
            .await
            .unwrap();
        assert_eq!(id.as_str(), "conversation_m1");

        let me = engine.session().user_key.clone();
        let mine = engine.conversations_once(&me).await.unwrap();
        let theirs = engine.conversations_once(&other).await.unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(theirs.len(), 1);
        assert_eq!(mine[0].id, theirs[0].id);
        assert_eq!(mine[0].latest, theirs[0].latest);
        assert_eq!(mine[0].latest.preview, "hi");
        assert_eq!(mine[0].other_user, other);
        assert_eq!(theirs[0].other_user, engine.session().user_key);

        let log = engine.messages_once(&id).await.unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].body, MessageBody::Text("hi".to_string()));
    }

    #[tokio::test]
    async fn append_grows_log_by_one_and_keeps_prior_entries() {
        let store = Arc::new(MemoryTreeStore::new());
        registered(&store, "A", "B", "a-b@example-com").await;
        registered(&store, "X", "Y", "x-y@example-com").await;

        let engine = engine(store, "a-b@example-com", "A B");
        let other = UserKey::derive("x-y@example-com");
        let id = engine
            .create_conversation(&other, "X Y", &first_message("hi"))
            .await
            .unwrap();

        let reply = OutgoingMessage::compose(
            engine.session(),
            &other,
            MessageBody::Text("et toi ?".to_string()),
        );
        engine.send_message(&id, &other, "X Y", &reply).await.unwrap();

        let log = engine.messages_once(&id).await.unwrap();
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].body, MessageBody::Text("hi".to_string()));
        assert_eq!(log[1].body, MessageBody::Text("et toi ?".to_string()));
    }

    #[tokio::test]
    async fn send_refreshes_both_summaries() {
        let store = Arc::new(MemoryTreeStore::new());
        registered(&store, "A", "B", "a-b@example-com").await;
        registered(&store, "X", "Y", "x-y@example-com").await;

        let engine = engine(store, "a-b@example-com", "A B");
        let me = engine.session().user_key.clone();
        let other = UserKey::derive("x-y@example-com");
        let id = engine
            .create_conversation(&other, "X Y", &first_message("hi"))
            .await
            .unwrap();

        let reply = OutgoingMessage::compose(
            engine.session(),
            &other,
            MessageBody::Text("des nouvelles ?".to_string()),
        );
        engine.send_message(&id, &other, "X Y", &reply).await.unwrap();

        let mine = engine.conversations_once(&me).await.unwrap();
        let theirs = engine.conversations_once(&other).await.unwrap();
        assert_eq!(mine[0].latest.preview, "des nouvelles ?");
        assert_eq!(mine[0].latest, theirs[0].latest);
    }

    #[tokio::test]
    async fn send_into_missing_conversation_fails() {
        let store = Arc::new(MemoryTreeStore::new());
        registered(&store, "A", "B", "a-b@example-com").await;

        let engine = engine(store, "a-b@example-com", "A B");
        let other = UserKey::derive("x-y@example-com");
        let err = engine
            .send_message(
                &ConversationId::from_stored("conversation_nope"),
                &other,
                "X Y",
                &first_message("hi"),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::ConversationNotFound(_)));
    }

    #[tokio::test]
    async fn photo_messages_decode_with_their_url() {
        let store = Arc::new(MemoryTreeStore::new());
        registered(&store, "A", "B", "a-b@example-com").await;
        registered(&store, "X", "Y", "x-y@example-com").await;

        let engine = engine(store, "a-b@example-com", "A B");
        let other = UserKey::derive("x-y@example-com");
        let id = engine
            .create_conversation(&other, "X Y", &first_message("hi"))
            .await
            .unwrap();

        let photo = OutgoingMessage::compose(
            engine.session(),
            &other,
            MessageBody::Photo {
                url: "https://x/y.png".to_string(),
            },
        );
        engine.send_message(&id, &other, "X Y", &photo).await.unwrap();

        let log = engine.messages_once(&id).await.unwrap();
        assert_eq!(
            log.last().unwrap().body,
            MessageBody::Photo {
                url: "https://x/y.png".to_string()
            }
        );
    }

    // -- Concurrency ----------------------------------------------------

    /// Store wrapper that forces two concurrent read-modify-write cycles
    /// to read the same base value: the first two reads of `race_path`
    /// rendezvous at a barrier before returning.
    struct RacingStore {
        inner: MemoryTreeStore,
        race_path: TreePath,
        gate: Barrier,
        gated_reads: AtomicUsize,
    }

    impl RacingStore {
        fn new(inner: MemoryTreeStore, race_path: TreePath) -> Self {
            Self {
                inner,
                race_path,
                gate: Barrier::new(2),
                gated_reads: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl TreeStore for RacingStore {
        async fn read_once(&self, path: &TreePath) -> std::result::Result<Option<Value>, StoreError> {
            let value = self.inner.read_once(path).await?;
            if path == &self.race_path && self.gated_reads.fetch_add(1, Ordering::SeqCst) < 2 {
                self.gate.wait().await;
            }
            Ok(value)
        }

        async fn write(&self, path: &TreePath, value: Value) -> std::result::Result<(), StoreError> {
            self.inner.write(path, value).await
        }

        async fn observe(
            &self,
            path: &TreePath,
        ) -> std::result::Result<mpsc::Receiver<Value>, StoreError> {
            self.inner.observe(path).await
        }

        async fn compare_and_swap(
            &self,
            path: &TreePath,
            expected: Option<&Value>,
            new: Value,
        ) -> std::result::Result<bool, StoreError> {
            self.inner.compare_and_swap(path, expected, new).await
        }
    }

    async fn race_two_appends(policy: WritePolicy) -> usize {
        let store = Arc::new(MemoryTreeStore::new());
        // Seed users and the conversation through a plain engine first.
        registered(&store, "A", "B", "a-b@example-com").await;
        registered(&store, "X", "Y", "x-y@example-com").await;
        let seed = engine(store.clone(), "a-b@example-com", "A B");
        let other = UserKey::derive("x-y@example-com");
        let id = seed
            .create_conversation(&other, "X Y", &first_message("hi"))
            .await
            .unwrap();

        let race_path = TreePath::new([id.as_str(), "messages"]).unwrap();
        let racing = Arc::new(RacingStore::new(store.as_ref().clone(), race_path));

        let left = Arc::new(
            SyncEngine::new(racing.clone(), Some(Session::new("a-b@example-com", "A B")))
                .unwrap()
                .with_policy(policy),
        );
        let right = Arc::new(
            SyncEngine::new(racing, Some(Session::new("x-y@example-com", "X Y")))
                .unwrap()
                .with_policy(policy),
        );

        let me = UserKey::derive("a-b@example-com");
        let msg_left = OutgoingMessage {
            id: MessageId::from_stored("race-left"),
            sent_at: Utc::now(),
            body: MessageBody::Text("left".to_string()),
        };
        let msg_right = OutgoingMessage {
            id: MessageId::from_stored("race-right"),
            sent_at: Utc::now(),
            body: MessageBody::Text("right".to_string()),
        };

        let (id_l, id_r) = (id.clone(), id.clone());
        let (other_l, me_r) = (other.clone(), me.clone());
        let l = tokio::spawn(async move {
            left.send_message(&id_l, &other_l, "X Y", &msg_left).await
        });
        let r = tokio::spawn(async move {
            right.send_message(&id_r, &me_r, "A B", &msg_right).await
        });
        l.await.unwrap().unwrap();
        r.await.unwrap().unwrap();

        seed.messages_once(&id).await.unwrap().len()
    }

    #[tokio::test]
    async fn serialized_policy_keeps_both_concurrent_appends() {
        // One seeded message plus both racing appends.
        assert_eq!(race_two_appends(WritePolicy::Serialized).await, 3);
    }

    #[tokio::test]
    async fn last_write_wins_policy_loses_a_concurrent_append() {
        // Both appenders read the same base list; the second overwrite
        // clobbers the first's addition.
        assert_eq!(race_two_appends(WritePolicy::LastWriteWins).await, 2);
    }
}
