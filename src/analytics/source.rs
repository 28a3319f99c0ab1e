use async_trait::async_trait;

use crate::model::Session;
use crate::storage::{SessionFilter, StorageResult, Store};

/// Where the analyzer reads sessions from
#[async_trait]
pub trait SessionSource: Send + Sync {
    async fn query_sessions(&self, filter: &SessionFilter) -> StorageResult<Vec<Session>>;
}

#[async_trait]
impl SessionSource for Store {
    async fn query_sessions(&self, filter: &SessionFilter) -> StorageResult<Vec<Session>> {
        Store::query_sessions(self, filter).await
    }
}
