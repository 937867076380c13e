//! Full-inventory retrieval across backend pages

use regrouper_backend_api::{Agent, Backend, BackendError, BackendResult, PageCursor};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

/// Upper bound on pages per fetch
pub const MAX_PAGES: usize = 10_000;

/// Walks the backend's paginated inventory into one snapshot
pub struct InventoryClient {
    backend: Arc<dyn Backend>,
    max_pages: usize,
}

impl InventoryClient {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self {
            backend,
            max_pages: MAX_PAGES,
        }
    }

    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = max_pages.max(1);
        self
    }

    /// Fetch every agent. Any page failure fails the whole fetch; a
    /// partial inventory is never returned.
    pub async fn fetch_all(&self) -> BackendResult<Vec<Agent>> {
        let mut agents = Vec::new();
        let mut seen = HashSet::new();
        let mut cursor: Option<PageCursor> = None;

        for page_number in 1..=self.max_pages {
            let page = self.backend.fetch_agents(cursor.as_ref()).await?;
            debug!(
                page = page_number,
                agents = page.agents.len(),
                "Fetched inventory page"
            );
            agents.extend(page.agents);

            match page.next_cursor {
                None => return Ok(agents),
                Some(next) => {
                    if !seen.insert(next.clone()) {
                        return Err(BackendError::Protocol(format!(
                            "pagination cursor '{next}' repeated"
                        )));
                    }
                    cursor = Some(next);
                }
            }
        }

        Err(BackendError::Protocol(format!(
            "inventory exceeds {} pages",
            self.max_pages
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use regrouper_backend_api::{AgentPage, MockBackend};
    use regrouper_util::{AgentId, GroupId};

    fn inventory(count: usize) -> Vec<Agent> {
        (0..count)
            .map(|n| Agent::new(format!("a{n}"), format!("host-{n}"), "linux", "z"))
            .collect()
    }

    /// Always hands back the same cursor
    struct LoopingBackend;

    #[async_trait]
    impl Backend for LoopingBackend {
        async fn fetch_agents(&self, _cursor: Option<&PageCursor>) -> BackendResult<AgentPage> {
            Ok(AgentPage {
                agents: vec![Agent::new("a", "h", "linux", "z")],
                next_cursor: Some(PageCursor::new("same")),
            })
        }

        async fn move_agents(&self, _agents: &[AgentId], _group: &GroupId) -> BackendResult<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn collects_all_pages() {
        let backend = Arc::new(MockBackend::new(inventory(7)).with_page_size(3));
        let client = InventoryClient::new(backend.clone());

        let agents = client.fetch_all().await.unwrap();
        assert_eq!(agents.len(), 7);
        assert_eq!(agents[6].id, AgentId::new("a6"));
        assert_eq!(backend.fetch_calls(), 3);
    }

    #[tokio::test]
    async fn repeated_cursor_is_protocol_error() {
        let client = InventoryClient::new(Arc::new(LoopingBackend));
        let err = client.fetch_all().await.unwrap_err();
        assert!(matches!(err, BackendError::Protocol(_)));
    }

    #[tokio::test]
    async fn page_limit_is_enforced() {
        let backend = Arc::new(MockBackend::new(inventory(10)).with_page_size(1));
        let client = InventoryClient::new(backend).with_max_pages(3);
        assert!(matches!(
            client.fetch_all().await,
            Err(BackendError::Protocol(_))
        ));
    }

    #[tokio::test]
    async fn fetch_failure_is_propagated() {
        let backend = Arc::new(MockBackend::new(inventory(3)));
        backend.set_fail_fetch(Some(BackendError::Transport("connection refused".into())));

        let client = InventoryClient::new(backend);
        let err = client.fetch_all().await.unwrap_err();
        assert!(err.is_retryable());
    }
}
