//! Scoped ownership of remote resources
//!
//! Every agent, thread and active run created during one invocation is
//! recorded in a [`ResourceScope`]. Resources are released newest first,
//! either by `release_all` on a normal return or from `Drop` when the
//! invocation future is dropped by a timeout or cancellation.

use crate::api::AgentsApi;
use std::sync::Arc;
use tracing::{debug, warn};

/// A remote resource owned by one invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resource {
    /// Remote agent
    Agent(String),
    /// Thread
    Thread(String),
    /// Run that has not reached a terminal status
    Run {
        /// Owning thread
        thread_id: String,
        /// Run ID
        run_id: String,
    },
}

/// Remote resources to release when the invocation ends
pub struct ResourceScope {
    api: Arc<dyn AgentsApi>,
    leases: Vec<Resource>,
}

impl ResourceScope {
    /// Create an empty scope
    pub fn new(api: Arc<dyn AgentsApi>) -> Self {
        Self {
            api,
            leases: Vec::new(),
        }
    }

    /// Track a resource
    pub fn track(&mut self, resource: Resource) {
        debug!("Tracking {:?}", resource);
        self.leases.push(resource);
    }

    /// Stop tracking a run once it reached a terminal status
    pub fn run_finished(&mut self, run_id: &str) {
        self.leases
            .retain(|r| !matches!(r, Resource::Run { run_id: id, .. } if id == run_id));
    }

    /// Resources currently held, oldest first
    pub fn leases(&self) -> &[Resource] {
        &self.leases
    }

    /// Number of held resources
    pub fn len(&self) -> usize {
        self.leases.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.leases.is_empty()
    }

    /// Release everything, newest first
    ///
    /// Failures are logged; returns how many resources could not be released.
    /// A resource leaves the scope only once its release call returned, so a
    /// scope dropped halfway through still releases the rest from `Drop`.
    pub async fn release_all(&mut self) -> usize {
        let mut failures = 0;
        while let Some(resource) = self.leases.last().cloned() {
            if !release_one(self.api.as_ref(), &resource).await {
                failures += 1;
            }
            self.leases.pop();
        }
        failures
    }
}

impl Drop for ResourceScope {
    fn drop(&mut self) {
        if self.leases.is_empty() {
            return;
        }
        let leases = std::mem::take(&mut self.leases);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                debug!("Releasing {} resource(s) in the background", leases.len());
                handle.spawn(release(self.api.clone(), leases));
            }
            Err(_) => warn!(
                "No runtime to release {} remote resource(s): {:?}",
                leases.len(),
                leases
            ),
        }
    }
}

async fn release(api: Arc<dyn AgentsApi>, leases: Vec<Resource>) -> usize {
    let mut failures = 0;
    for resource in leases.iter().rev() {
        if !release_one(api.as_ref(), resource).await {
            failures += 1;
        }
    }
    failures
}

async fn release_one(api: &dyn AgentsApi, resource: &Resource) -> bool {
    let result = match resource {
        Resource::Run { thread_id, run_id } => api.cancel_run(thread_id, run_id).await.map(|_| ()),
        Resource::Thread(id) => api.delete_thread(id).await,
        Resource::Agent(id) => api.delete_agent(id).await,
    };
    match result {
        Ok(()) => {
            debug!("Released {:?}", resource);
            true
        }
        Err(e) => {
            warn!("Failed to release {:?}: {}", resource, e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::MockAgentsApi;
    use crate::error::HostedError;
    use crate::types::*;
    use async_trait::async_trait;
    use mockall::Sequence;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Deletes take `delay`; every other call is unused
    struct SlowDeletes {
        delay: Duration,
        deleted: Mutex<Vec<String>>,
    }

    impl SlowDeletes {
        fn new(delay: Duration) -> Self {
            Self {
                delay,
                deleted: Mutex::new(Vec::new()),
            }
        }

        fn deleted(&self) -> Vec<String> {
            self.deleted.lock().unwrap().clone()
        }

        async fn delete(&self, id: &str) -> Result<(), HostedError> {
            tokio::time::sleep(self.delay).await;
            self.deleted.lock().unwrap().push(id.to_string());
            Ok(())
        }
    }

    fn unused<T>() -> Result<T, HostedError> {
        Err(HostedError::Protocol("not used in this test".into()))
    }

    #[async_trait]
    impl AgentsApi for SlowDeletes {
        async fn create_agent(&self, _: &CreateAgentRequest) -> Result<AgentObject, HostedError> {
            unused()
        }
        async fn delete_agent(&self, agent_id: &str) -> Result<(), HostedError> {
            self.delete(agent_id).await
        }
        async fn create_thread(&self) -> Result<ThreadObject, HostedError> {
            unused()
        }
        async fn delete_thread(&self, thread_id: &str) -> Result<(), HostedError> {
            self.delete(thread_id).await
        }
        async fn create_message(
            &self,
            _: &str,
            _: &CreateMessageRequest,
        ) -> Result<ThreadMessage, HostedError> {
            unused()
        }
        async fn create_run(&self, _: &str, _: &CreateRunRequest) -> Result<RunObject, HostedError> {
            unused()
        }
        async fn get_run(&self, _: &str, _: &str) -> Result<RunObject, HostedError> {
            unused()
        }
        async fn cancel_run(&self, _: &str, _: &str) -> Result<RunObject, HostedError> {
            unused()
        }
        async fn submit_tool_outputs(
            &self,
            _: &str,
            _: &str,
            _: &[ToolOutput],
        ) -> Result<RunObject, HostedError> {
            unused()
        }
        async fn submit_tool_approvals(
            &self,
            _: &str,
            _: &str,
            _: &[ToolApproval],
        ) -> Result<RunObject, HostedError> {
            unused()
        }
        async fn list_messages(&self, _: &str) -> Result<Vec<ThreadMessage>, HostedError> {
            unused()
        }
        async fn list_run_steps(&self, _: &str, _: &str) -> Result<Vec<RunStep>, HostedError> {
            unused()
        }
    }

    #[tokio::test]
    async fn test_release_newest_first() {
        let mut api = MockAgentsApi::new();
        let mut seq = Sequence::new();
        api.expect_delete_thread()
            .withf(|id| id == "thread_1")
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        api.expect_delete_agent()
            .withf(|id| id == "asst_root")
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        api.expect_delete_agent()
            .withf(|id| id == "asst_child")
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));

        let mut scope = ResourceScope::new(Arc::new(api));
        scope.track(Resource::Agent("asst_child".into()));
        scope.track(Resource::Agent("asst_root".into()));
        scope.track(Resource::Thread("thread_1".into()));

        assert_eq!(scope.release_all().await, 0);
        assert!(scope.is_empty());
    }

    #[tokio::test]
    async fn test_finished_run_is_not_cancelled() {
        let mut api = MockAgentsApi::new();
        api.expect_cancel_run().times(0);
        api.expect_delete_thread().times(1).returning(|_| Ok(()));

        let mut scope = ResourceScope::new(Arc::new(api));
        scope.track(Resource::Thread("thread_1".into()));
        scope.track(Resource::Run {
            thread_id: "thread_1".into(),
            run_id: "run_1".into(),
        });
        scope.run_finished("run_1");

        assert_eq!(scope.len(), 1);
        assert_eq!(scope.release_all().await, 0);
    }

    #[tokio::test]
    async fn test_release_failures_are_counted() {
        let mut api = MockAgentsApi::new();
        api.expect_delete_agent().times(1).returning(|_| {
            Err(HostedError::Http {
                status: 404,
                body: "not found".into(),
            })
        });

        let mut scope = ResourceScope::new(Arc::new(api));
        scope.track(Resource::Agent("asst_gone".into()));
        assert_eq!(scope.release_all().await, 1);
    }

    #[tokio::test]
    async fn test_drop_releases_in_background() {
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let tx = std::sync::Mutex::new(Some(tx));

        let mut api = MockAgentsApi::new();
        api.expect_delete_agent().times(1).returning(move |_| {
            if let Some(tx) = tx.lock().unwrap().take() {
                let _ = tx.send(());
            }
            Ok(())
        });

        {
            let mut scope = ResourceScope::new(Arc::new(api));
            scope.track(Resource::Agent("asst_dropped".into()));
        }

        tokio::time::timeout(std::time::Duration::from_secs(1), rx)
            .await
            .expect("release task ran")
            .unwrap();
    }

    #[tokio::test]
    async fn test_interrupted_release_finishes_from_drop() {
        let api = Arc::new(SlowDeletes::new(Duration::from_millis(50)));

        {
            let mut scope = ResourceScope::new(api.clone());
            scope.track(Resource::Agent("asst_1".into()));
            scope.track(Resource::Thread("thread_1".into()));

            let interrupted = tokio::time::timeout(Duration::from_millis(20), scope.release_all()).await;
            assert!(interrupted.is_err());
            assert_eq!(scope.len(), 2);
        }

        tokio::time::sleep(Duration::from_millis(300)).await;
        let deleted = api.deleted();
        assert!(deleted.contains(&"asst_1".to_string()));
        assert!(deleted.contains(&"thread_1".to_string()));
    }
}
