use anyhow::Result;
use async_trait::async_trait;

use threadline_api::{
    CreateThreadRequest, Run, RunStreamRequest, Thread, ThreadSearchRequest, ThreadState,
};
use threadline_api_client::{ApiClient, RunStream};

/// The slice of the remote session service the client depends on.
///
/// Every call is network-backed and may fail with a transport error; callers
/// decide whether to propagate or degrade.
#[async_trait]
pub trait SessionBackend: Send + Sync {
    async fn create_thread(&self) -> Result<Thread>;

    async fn get_thread_state(&self, thread_id: &str) -> Result<ThreadState>;

    async fn search_threads(&self, req: &ThreadSearchRequest) -> Result<Vec<Thread>>;

    /// Run history, oldest first.
    async fn list_runs(&self, thread_id: &str) -> Result<Vec<Run>>;

    async fn stream_run(&self, thread_id: &str, req: &RunStreamRequest) -> Result<RunStream>;
}

#[async_trait]
impl SessionBackend for ApiClient {
    async fn create_thread(&self) -> Result<Thread> {
        ApiClient::create_thread(self, &CreateThreadRequest::default()).await
    }

    async fn get_thread_state(&self, thread_id: &str) -> Result<ThreadState> {
        ApiClient::get_thread_state(self, thread_id).await
    }

    async fn search_threads(&self, req: &ThreadSearchRequest) -> Result<Vec<Thread>> {
        ApiClient::search_threads(self, req).await
    }

    async fn list_runs(&self, thread_id: &str) -> Result<Vec<Run>> {
        ApiClient::list_runs(self, thread_id).await
    }

    async fn stream_run(&self, thread_id: &str, req: &RunStreamRequest) -> Result<RunStream> {
        ApiClient::stream_run(self, thread_id, req).await
    }
}
