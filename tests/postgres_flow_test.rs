//! Postgres adapter flow test. Runs only when TEST_DATABASE_URL points at a
//! scratch database; otherwise every test here is a no-op so the suite stays
//! green without infrastructure.

use messaging_service::db;
use messaging_service::error::AppError;
use messaging_service::notify::NoopPublisher;
use messaging_service::services::{chat_service::SEED_MESSAGE, ChatService};
use messaging_service::store::{ConversationStore, NewConversation, PostgresStore};
use std::sync::Arc;
use uuid::Uuid;

async fn test_store() -> Option<PostgresStore> {
    let url = std::env::var("TEST_DATABASE_URL").ok()?;
    let pool = db::init_pool(&url, 4).expect("pool");
    db::run_migrations(&pool).await.expect("migrations");
    Some(PostgresStore::new(pool))
}

async fn seed_user(store: &PostgresStore, name: &str) -> Uuid {
    // the store has no user write path (identity provider owns users), so
    // tests insert the read model rows directly
    let id = Uuid::new_v4();
    let pool = store.pool();
    let client = pool.get().await.expect("client");
    client
        .execute(
            "INSERT INTO users (id, name) VALUES ($1, $2)",
            &[&id, &name.to_string()],
        )
        .await
        .expect("insert user");
    id
}

#[tokio::test]
async fn full_flow_against_postgres() {
    let Some(store) = test_store().await else {
        return;
    };
    let store = Arc::new(store);
    let service = ChatService::new(
        store.clone(),
        store.clone(),
        store.clone(),
        Arc::new(NoopPublisher),
    );

    let alice = seed_user(&store, "Alice").await;
    let bob = seed_user(&store, "Bob").await;

    let conversation = service.create_conversation(alice, bob).await.unwrap();
    let again = service.create_conversation(bob, alice).await.unwrap();
    assert_eq!(conversation.id, again.id);

    service
        .send_message(alice, conversation.id, "  hello  ")
        .await
        .unwrap();

    let participants = store.find_participants(conversation.id).await.unwrap();
    for p in &participants {
        assert_eq!(p.unread, p.user_id == bob);
    }

    let messages = service.list_messages(bob, conversation.id).await.unwrap();
    let contents: Vec<&str> = messages.iter().map(|m| m.content.as_str()).collect();
    // content is persisted trimmed
    assert_eq!(contents, vec![SEED_MESSAGE, "hello"]);

    let participants = store.find_participants(conversation.id).await.unwrap();
    assert!(participants.iter().all(|p| !p.unread));
}

#[tokio::test]
async fn pair_constraint_rejects_duplicate_creates() {
    let Some(store) = test_store().await else {
        return;
    };
    let alice = seed_user(&store, "Alice").await;
    let bob = seed_user(&store, "Bob").await;

    let new = |initiator, receiver| NewConversation {
        name: "Alice and Bob".to_string(),
        initiator,
        receiver,
        seed_content: SEED_MESSAGE.to_string(),
    };

    store.create_direct(new(alice, bob)).await.unwrap();
    let err = store.create_direct(new(bob, alice)).await.unwrap_err();
    assert!(matches!(err, AppError::Conflict));
}
