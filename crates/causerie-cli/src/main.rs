//! # causerie-cli
//!
//! Demo binary for the Causerie conversation sync engine.
//!
//! Runs a scripted two-user exchange against the in-memory tree store:
//! registers both users, uploads a profile picture, creates a
//! conversation, exchanges a few messages, and tails the live feed. A
//! deployment would swap the in-memory backend for an adapter over the
//! hosted database; nothing else changes.

mod config;

use std::sync::Arc;

use bytes::Bytes;
use tracing::info;
use tracing_subscriber::EnvFilter;

use causerie_shared::{MessageBody, UserKey};
use causerie_store::{blobs, BlobStore, MemoryTreeStore};
use causerie_sync::{Directory, MessageFeed, NewUser, OutgoingMessage, SyncEngine};

use crate::config::CliConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,causerie=debug")),
        )
        .init();

    info!("Starting Causerie demo v{}", env!("CARGO_PKG_VERSION"));

    let config = CliConfig::from_env();
    info!(?config, "Loaded configuration");

    let store = Arc::new(MemoryTreeStore::new());
    let directory = Directory::new(store.clone());

    // Two accounts, the way a registration screen would create them.
    directory
        .register(&NewUser {
            first_name: "Amélie".to_string(),
            last_name: "Bernard".to_string(),
            email: "amelie.bernard@example.com".to_string(),
        })
        .await?;
    directory
        .register(&NewUser {
            first_name: "Xavier".to_string(),
            last_name: "Yvon".to_string(),
            email: "xavier.yvon@example.com".to_string(),
        })
        .await?;

    for user in directory.all_users().await? {
        info!(name = %user.name, key = %user.email, "directory entry");
    }

    // Profile picture upload through the blob store.
    let blob_store =
        BlobStore::open(config.blob_storage_path.clone(), blobs::DEFAULT_MAX_BLOB_SIZE).await?;
    let amelie_key = UserKey::derive("amelie.bernard@example.com");
    let picture_url = blob_store
        .upload(
            Bytes::from_static(b"\x89PNG\r\n\x1a\n"),
            &blobs::profile_picture_name(&amelie_key),
        )
        .await?;
    info!(url = %picture_url, "profile picture uploaded");

    // Amélie opens a conversation with Xavier.
    let amelie = SyncEngine::new(
        store.clone(),
        Some(directory.sign_in("amelie.bernard@example.com").await?),
    )?
    .with_policy(config.write_policy);

    let xavier_key = UserKey::derive("xavier.yvon@example.com");
    let first = OutgoingMessage::compose(
        amelie.session(),
        &xavier_key,
        MessageBody::Text("Salut Xavier, tu es là ?".to_string()),
    );
    let conversation = amelie
        .create_conversation(&xavier_key, "Xavier Yvon", &first)
        .await?;

    // Xavier replies through his own engine.
    let xavier = SyncEngine::new(
        store.clone(),
        Some(directory.sign_in("xavier.yvon@example.com").await?),
    )?
    .with_policy(config.write_policy);

    let reply = OutgoingMessage::compose(
        xavier.session(),
        &amelie_key,
        MessageBody::Text("Oui ! On se voit ce soir ?".to_string()),
    );
    xavier
        .send_message(&conversation, &amelie_key, "Amélie Bernard", &reply)
        .await?;

    // Tail the feed until both messages are visible.
    let mut feed = MessageFeed::open(&amelie, &conversation).await?;
    while feed.snapshot().len() < 2 {
        if !feed.changed().await {
            break;
        }
    }
    for message in feed.snapshot() {
        info!(
            from = %message.sender,
            at = %message.sent_at,
            content = %message.body.content(),
            "message"
        );
    }

    // Both participants now see the same latest-message summary.
    for key in [&amelie_key, &xavier_key] {
        for summary in amelie.conversations_once(key).await? {
            info!(
                user = %key,
                conversation = %summary.id,
                with = %summary.other_user,
                latest = %summary.latest.preview,
                "conversation summary"
            );
        }
    }

    Ok(())
}
