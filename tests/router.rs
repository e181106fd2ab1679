//! End-to-end command handling against the in-memory store

use dispenser::identity::Handle;
use dispenser::storage::{AllocationStore, MemberStore, MemoryStore};
use dispenser::{Allocator, CommandRouter, Mode, Request};
use std::sync::Arc;

const ADMIN: &str = "xidea404";

async fn setup(mode: Mode, urls: &[&str]) -> (CommandRouter, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    store.seed(urls.iter().copied());
    store.add_member(&Handle::parse(ADMIN).unwrap()).await.unwrap();

    let router = CommandRouter::for_mode(mode, store.clone(), Allocator::new(store.clone()));
    (router, store)
}

async fn send(router: &CommandRouter, from: Option<&str>, command: &str, args: &[&str]) -> String {
    router
        .dispatch(&Request::new(from, command, args))
        .await
        .text
}

#[tokio::test]
async fn test_admin_non_member_is_denied_without_mutation() {
    let (router, store) = setup(Mode::Admin, &["u1", "u2"]).await;

    for (command, args) in [
        ("start", vec![]),
        ("gettoken", vec!["alice"]),
        ("addmember", vec!["@mallory"]),
    ] {
        let reply = send(&router, Some("mallory"), command, &args).await;
        assert_eq!(reply, "You are not authorized to use this bot.");
    }

    assert_eq!(store.pool_stats().await.unwrap().assigned, 0);
    assert_eq!(store.member_count().await.unwrap(), 1);
    assert!(!store.is_member(&Handle::parse("mallory").unwrap()).await.unwrap());
}

#[tokio::test]
async fn test_missing_username() {
    let (router, store) = setup(Mode::Admin, &["u1"]).await;

    let reply = send(&router, None, "gettoken", &["alice"]).await;
    assert_eq!(reply, "You need to set a Telegram username to use this bot.");
    assert_eq!(store.pool_stats().await.unwrap().assigned, 0);
}

#[tokio::test]
async fn test_addmember_normalizes() {
    let (router, store) = setup(Mode::Admin, &[]).await;

    assert_eq!(
        send(&router, Some("Xidea404"), "addmember", &["@Foo"]).await,
        "foo added to members."
    );
    assert!(store.is_member(&Handle::parse("foo").unwrap()).await.unwrap());

    assert_eq!(
        send(&router, Some(ADMIN), "addmember", &["FOO"]).await,
        "foo is already a member."
    );

    // The new member can use privileged commands
    assert!(send(&router, Some("foo"), "start", &[]).await.starts_with("Welcome!"));
}

#[tokio::test]
async fn test_addmember_usage() {
    let (router, _store) = setup(Mode::Admin, &[]).await;

    assert_eq!(
        send(&router, Some(ADMIN), "addmember", &[]).await,
        "Usage: /addmember <tg_handle>"
    );
    assert_eq!(
        send(&router, Some(ADMIN), "addmember", &["a", "b"]).await,
        "Usage: /addmember <tg_handle>"
    );
}

#[tokio::test]
async fn test_admin_scenario() {
    let (router, store) = setup(Mode::Admin, &["u1", "u2"]).await;

    assert_eq!(send(&router, Some(ADMIN), "gettoken", &["alice"]).await, "u1");
    assert_eq!(send(&router, Some(ADMIN), "gettoken", &["@Alice"]).await, "u1");
    assert_eq!(
        send(&router, Some(ADMIN), "gettoken", &["bob@example.com", "@bob"]).await,
        "u2"
    );
    assert_eq!(
        send(&router, Some(ADMIN), "gettoken", &["carol"]).await,
        "No RPC URLs available at the moment. Please try again later."
    );

    // Email holders are served by email as well
    assert_eq!(
        send(&router, Some(ADMIN), "gettoken", &["Bob@Example.com"]).await,
        "u2"
    );

    let tokens = store.tokens();
    let alice = tokens[0].assignment.as_ref().unwrap();
    assert_eq!(alice.handle.as_deref(), Some("alice"));
    assert_eq!(alice.email, None);

    let bob = tokens[1].assignment.as_ref().unwrap();
    assert_eq!(bob.email.as_deref(), Some("bob@example.com"));
    assert_eq!(bob.handle.as_deref(), Some("bob"));
}

#[tokio::test]
async fn test_admin_gettoken_usage() {
    let (router, store) = setup(Mode::Admin, &["u1"]).await;

    for args in [vec![], vec!["a", "b", "c"], vec!["@a", "@b"], vec!["bad handle!"]] {
        let reply = send(&router, Some(ADMIN), "gettoken", &args).await;
        assert!(reply.starts_with("Usage: /gettoken"), "got {:?}", reply);
    }
    assert_eq!(store.pool_stats().await.unwrap().assigned, 0);
}

#[tokio::test]
async fn test_self_service_flow() {
    let (router, store) = setup(Mode::SelfService, &["u1", "u2"]).await;

    assert_eq!(
        send(&router, Some("alice"), "start", &[]).await,
        "Welcome! Use /gettoken to receive your RPC URL."
    );
    assert_eq!(send(&router, Some("Alice"), "gettoken", &[]).await, "u1");
    assert_eq!(send(&router, Some("alice"), "gettoken", &[]).await, "u1");
    assert_eq!(send(&router, Some("bob"), "gettoken", &[]).await, "u2");
    assert_eq!(
        send(&router, Some("carol"), "gettoken", &[]).await,
        "No RPC URLs available at the moment. Please try again later."
    );

    assert_eq!(
        send(&router, Some("dave"), "gettoken", &["alice"]).await,
        "Usage: /gettoken"
    );
    assert_eq!(
        send(&router, None, "gettoken", &[]).await,
        "You need to set a Telegram username to use this bot."
    );
    assert_eq!(store.pool_stats().await.unwrap().assigned, 2);
}

#[tokio::test]
async fn test_self_service_addmember_still_restricted() {
    let (router, store) = setup(Mode::SelfService, &[]).await;

    assert_eq!(
        send(&router, Some("alice"), "addmember", &["bob"]).await,
        "You are not authorized to use this bot."
    );
    assert_eq!(
        send(&router, Some(ADMIN), "addmember", &["bob"]).await,
        "bob added to members."
    );
    assert_eq!(store.member_count().await.unwrap(), 2);
}

#[tokio::test]
async fn test_unknown_command() {
    let (router, _store) = setup(Mode::Admin, &[]).await;

    assert_eq!(
        send(&router, Some(ADMIN), "help", &[]).await,
        "Unknown command /help. Available commands: /addmember, /gettoken, /start"
    );
}
