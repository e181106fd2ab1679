//! In-memory storage backend

use crate::identity::{Handle, RequesterKey};
use crate::storage::{
    AllocationStore, AssignOutcome, Assignment, Claim, MemberAdded, MemberStore, PoolStats,
    StorageError, Token,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::time::SystemTime;

#[derive(Default)]
struct State {
    members: BTreeSet<String>,
    /// Ordered by id; ids are assigned in insertion order
    tokens: Vec<Token>,
    next_id: i64,
}

/// Memory-backed members and URL pool.
///
/// A single mutex guards the whole state, so every trait method is atomic on
/// its own, exactly like a single SQL statement.
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                next_id: 1,
                ..State::default()
            }),
        }
    }

    /// Open an empty store (mirrors [`PostgresStore::open`](crate::storage::PostgresStore::open))
    pub fn open() -> Self {
        Self::new()
    }

    /// Nothing to release
    pub fn close(&self) {}

    /// Append pool entries, returning the number inserted
    pub fn seed<I, S>(&self, values: I) -> u64
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut state = self.state.lock();
        let mut inserted = 0;
        for value in values {
            let id = state.next_id;
            state.next_id += 1;
            state.tokens.push(Token {
                id,
                value: value.into(),
                assignment: None,
            });
            inserted += 1;
        }
        inserted
    }

    /// Snapshot of every token, in id order
    pub fn tokens(&self) -> Vec<Token> {
        self.state.lock().tokens.clone()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn matches_key(assignment: &Assignment, key: &RequesterKey) -> bool {
    match key {
        RequesterKey::Handle(h) => assignment.handle.as_deref() == Some(h.as_str()),
        RequesterKey::Email(e) => assignment.email.as_deref() == Some(e.as_str()),
    }
}

impl State {
    fn held_by(&self, key: &RequesterKey) -> Option<&Token> {
        self.tokens
            .iter()
            .filter(|t| t.assignment.as_ref().is_some_and(|a| matches_key(a, key)))
            .min_by_key(|t| (t.assignment.as_ref().map(|a| a.assigned_at), t.id))
    }
}

#[async_trait]
impl MemberStore for MemoryStore {
    async fn is_member(&self, handle: &Handle) -> Result<bool, StorageError> {
        Ok(self.state.lock().members.contains(handle.as_str()))
    }

    async fn add_member(&self, handle: &Handle) -> Result<MemberAdded, StorageError> {
        if self.state.lock().members.insert(handle.as_str().to_string()) {
            Ok(MemberAdded::Added)
        } else {
            Ok(MemberAdded::AlreadyMember)
        }
    }

    async fn member_count(&self) -> Result<u64, StorageError> {
        Ok(self.state.lock().members.len() as u64)
    }
}

#[async_trait]
impl AllocationStore for MemoryStore {
    async fn find_assigned(&self, key: &RequesterKey) -> Result<Option<Token>, StorageError> {
        Ok(self.state.lock().held_by(key).cloned())
    }

    async fn next_unassigned(&self) -> Result<Option<Token>, StorageError> {
        let state = self.state.lock();
        Ok(state.tokens.iter().find(|t| !t.is_assigned()).cloned())
    }

    async fn assign(&self, token_id: i64, claim: &Claim) -> Result<AssignOutcome, StorageError> {
        let mut state = self.state.lock();
        if let Some(held) = state.held_by(&claim.key) {
            return Ok(AssignOutcome::AlreadyHeld(held.clone()));
        }

        let Some(token) = state.tokens.iter_mut().find(|t| t.id == token_id) else {
            return Ok(AssignOutcome::Conflict);
        };

        if token.is_assigned() {
            return Ok(AssignOutcome::Conflict);
        }

        token.assignment = Some(Assignment {
            handle: claim.handle().map(str::to_string),
            email: claim.email().map(str::to_string),
            assigned_at: SystemTime::now(),
        });
        Ok(AssignOutcome::Assigned(token.clone()))
    }

    async fn pool_stats(&self) -> Result<PoolStats, StorageError> {
        let state = self.state.lock();
        Ok(PoolStats {
            total: state.tokens.len() as u64,
            assigned: state.tokens.iter().filter(|t| t.is_assigned()).count() as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::Email;

    fn handle(s: &str) -> Handle {
        Handle::parse(s).unwrap()
    }

    #[tokio::test]
    async fn test_members() {
        let store = MemoryStore::new();

        assert!(!store.is_member(&handle("foo")).await.unwrap());
        assert_eq!(
            store.add_member(&handle("@Foo")).await.unwrap(),
            MemberAdded::Added
        );
        assert_eq!(
            store.add_member(&handle("foo")).await.unwrap(),
            MemberAdded::AlreadyMember
        );
        assert!(store.is_member(&handle("FOO")).await.unwrap());
        assert_eq!(store.member_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_seed_assigns_increasing_ids() {
        let store = MemoryStore::new();
        assert_eq!(store.seed(["u1", "u2"]), 2);
        assert_eq!(store.seed(["u3"]), 1);

        let ids: Vec<i64> = store.tokens().iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_assign_only_when_unassigned() {
        let store = MemoryStore::new();
        store.seed(["u1"]);

        let alice = Claim::new(handle("alice").into());
        let bob = Claim::new(handle("bob").into());

        let AssignOutcome::Assigned(token) = store.assign(1, &alice).await.unwrap() else {
            panic!("expected the free row to be assigned");
        };
        assert_eq!(token.assignment.unwrap().handle.as_deref(), Some("alice"));
        assert_eq!(store.assign(1, &bob).await.unwrap(), AssignOutcome::Conflict);
        assert_eq!(store.assign(99, &bob).await.unwrap(), AssignOutcome::Conflict);

        let token = store.find_assigned(&handle("alice").into()).await.unwrap().unwrap();
        assert_eq!(token.value, "u1");
        assert!(store.find_assigned(&handle("bob").into()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_assign_refuses_second_token_for_holder() {
        let store = MemoryStore::new();
        store.seed(["u1", "u2"]);

        let alice = Claim::new(handle("alice").into());
        store.assign(1, &alice).await.unwrap();

        match store.assign(2, &alice).await.unwrap() {
            AssignOutcome::AlreadyHeld(token) => assert_eq!(token.value, "u1"),
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert!(!store.tokens()[1].is_assigned());
    }

    #[tokio::test]
    async fn test_next_unassigned_is_lowest_id() {
        let store = MemoryStore::new();
        store.seed(["u1", "u2", "u3"]);

        store.assign(2, &Claim::new(handle("bob").into())).await.unwrap();
        assert_eq!(store.next_unassigned().await.unwrap().unwrap().id, 1);

        store.assign(1, &Claim::new(handle("alice").into())).await.unwrap();
        assert_eq!(store.next_unassigned().await.unwrap().unwrap().id, 3);

        store.assign(3, &Claim::new(handle("carol").into())).await.unwrap();
        assert!(store.next_unassigned().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_find_assigned_by_email() {
        let store = MemoryStore::new();
        store.seed(["u1"]);

        let email = Email::parse("dev@example.com").unwrap();
        let claim = Claim::new(email.clone().into()).with_secondary(handle("dev").into());
        store.assign(1, &claim).await.unwrap();

        assert!(store.find_assigned(&email.into()).await.unwrap().is_some());
        // The secondary handle is recorded too
        assert!(store.find_assigned(&handle("dev").into()).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_pool_stats() {
        let store = MemoryStore::new();
        store.seed(["u1", "u2"]);
        store.assign(1, &Claim::new(handle("alice").into())).await.unwrap();

        let stats = store.pool_stats().await.unwrap();
        assert_eq!(stats, PoolStats { total: 2, assigned: 1 });
    }
}
