//! Mock backend for testing

use async_trait::async_trait;
use regrouper_util::{AgentId, GroupId};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use crate::{Agent, AgentPage, Backend, BackendError, BackendResult, PageCursor};

/// A move request as received by the mock
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveCall {
    pub agents: Vec<AgentId>,
    pub group: GroupId,
}

/// In-memory backend for unit/integration testing.
///
/// Successful moves are applied to the stored inventory, so a second
/// fetch observes the new group assignments.
pub struct MockBackend {
    agents: Mutex<Vec<Agent>>,
    page_size: Option<usize>,
    move_calls: Mutex<Vec<MoveCall>>,
    fetch_calls: AtomicUsize,

    /// Configure fetch to fail
    pub fail_fetch: Mutex<Option<BackendError>>,

    /// Configure moves into specific groups to fail
    pub fail_moves_to: Mutex<HashMap<GroupId, BackendError>>,

    /// Artificial latency for each move call
    pub move_delay: Mutex<Option<Duration>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MockBackend {
    pub fn new(agents: Vec<Agent>) -> Self {
        Self {
            agents: Mutex::new(agents),
            page_size: None,
            move_calls: Mutex::new(Vec::new()),
            fetch_calls: AtomicUsize::new(0),
            fail_fetch: Mutex::new(None),
            fail_moves_to: Mutex::new(HashMap::new()),
            move_delay: Mutex::new(None),
        }
    }

    /// Serve the inventory in pages of `page_size` agents
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = Some(page_size.max(1));
        self
    }

    /// Current inventory snapshot
    pub fn agents(&self) -> Vec<Agent> {
        lock(&self.agents).clone()
    }

    pub fn group_of(&self, agent: &AgentId) -> Option<GroupId> {
        lock(&self.agents)
            .iter()
            .find(|a| &a.id == agent)
            .map(|a| a.group.clone())
    }

    /// Move requests received so far
    pub fn move_calls(&self) -> Vec<MoveCall> {
        lock(&self.move_calls).clone()
    }

    /// Number of page requests served (including failed ones)
    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    pub fn set_fail_fetch(&self, error: Option<BackendError>) {
        *lock(&self.fail_fetch) = error;
    }

    pub fn fail_moves_to(&self, group: GroupId, error: BackendError) {
        lock(&self.fail_moves_to).insert(group, error);
    }

    pub fn set_move_delay(&self, delay: Option<Duration>) {
        *lock(&self.move_delay) = delay;
    }

    fn cursor_offset(cursor: Option<&PageCursor>) -> BackendResult<usize> {
        match cursor {
            None => Ok(0),
            Some(c) => c
                .as_str()
                .parse()
                .map_err(|_| BackendError::Protocol(format!("unknown cursor '{}'", c))),
        }
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

#[async_trait]
impl Backend for MockBackend {
    async fn fetch_agents(&self, cursor: Option<&PageCursor>) -> BackendResult<AgentPage> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);

        if let Some(error) = lock(&self.fail_fetch).clone() {
            return Err(error);
        }

        let agents = lock(&self.agents);
        let offset = Self::cursor_offset(cursor)?;

        let Some(page_size) = self.page_size else {
            return Ok(AgentPage::last(agents.clone()));
        };

        let end = (offset + page_size).min(agents.len());
        let page = agents.get(offset..end).map(<[Agent]>::to_vec).unwrap_or_default();
        let next_cursor = (end < agents.len()).then(|| PageCursor::new(end.to_string()));

        Ok(AgentPage {
            agents: page,
            next_cursor,
        })
    }

    async fn move_agents(&self, agents: &[AgentId], group: &GroupId) -> BackendResult<()> {
        let delay = *lock(&self.move_delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        lock(&self.move_calls).push(MoveCall {
            agents: agents.to_vec(),
            group: group.clone(),
        });

        if let Some(error) = lock(&self.fail_moves_to).get(group).cloned() {
            return Err(error);
        }

        let mut inventory = lock(&self.agents);
        for agent in inventory.iter_mut().filter(|a| agents.contains(&a.id)) {
            agent.group = group.clone();
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inventory() -> Vec<Agent> {
        (0..5)
            .map(|n| Agent::new(format!("a{n}"), format!("host-{n}"), "linux", "z"))
            .collect()
    }

    #[tokio::test]
    async fn mock_pages_inventory() {
        let backend = MockBackend::new(inventory()).with_page_size(2);

        let first = backend.fetch_agents(None).await.unwrap();
        assert_eq!(first.agents.len(), 2);
        let cursor = first.next_cursor.unwrap();

        let second = backend.fetch_agents(Some(&cursor)).await.unwrap();
        assert_eq!(second.agents[0].id, AgentId::new("a2"));

        let third = backend
            .fetch_agents(second.next_cursor.as_ref())
            .await
            .unwrap();
        assert_eq!(third.agents.len(), 1);
        assert!(third.next_cursor.is_none());
        assert_eq!(backend.fetch_calls(), 3);
    }

    #[tokio::test]
    async fn mock_applies_moves() {
        let backend = MockBackend::new(inventory());
        let target = GroupId::new("a");

        backend
            .move_agents(&[AgentId::new("a1"), AgentId::new("a3")], &target)
            .await
            .unwrap();

        assert_eq!(backend.group_of(&AgentId::new("a1")), Some(target.clone()));
        assert_eq!(backend.group_of(&AgentId::new("a2")), Some(GroupId::new("z")));
        assert_eq!(backend.move_calls().len(), 1);
    }

    #[tokio::test]
    async fn mock_failures() {
        let backend = MockBackend::new(inventory());
        backend.set_fail_fetch(Some(BackendError::Auth("expired".into())));
        assert!(matches!(
            backend.fetch_agents(None).await,
            Err(BackendError::Auth(_))
        ));

        let target = GroupId::new("locked");
        backend.fail_moves_to(target.clone(), BackendError::NotFound("group".into()));
        let result = backend.move_agents(&[AgentId::new("a0")], &target).await;
        assert!(result.is_err());
        assert_eq!(backend.group_of(&AgentId::new("a0")), Some(GroupId::new("z")));
    }
}
