use async_trait::async_trait;
use herald_core::MatchCursor;
use herald_ports::{CursorStore, StoreResult};
use parking_lot::Mutex;
use std::sync::Arc;

/// Matcher high-water mark held in memory
#[derive(Clone, Default)]
pub struct InMemoryCursorStore {
    cursor: Arc<Mutex<MatchCursor>>,
}

impl InMemoryCursorStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CursorStore for InMemoryCursorStore {
    async fn load(&self) -> StoreResult<MatchCursor> {
        Ok(*self.cursor.lock())
    }

    async fn advance(&self, cursor: MatchCursor) -> StoreResult<MatchCursor> {
        let mut current = self.cursor.lock();
        *current = current.max(cursor);
        Ok(*current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    #[tokio::test]
    async fn test_never_moves_backwards() {
        let store = InMemoryCursorStore::new();
        assert_eq!(store.load().await.unwrap(), MatchCursor::default());

        let t = Utc::now();
        store.advance(MatchCursor::at(t)).await.unwrap();
        let after = store
            .advance(MatchCursor::at(t - Duration::minutes(5)))
            .await
            .unwrap();
        assert_eq!(after, MatchCursor::at(t));
        assert_eq!(store.advance(MatchCursor::default()).await.unwrap(), MatchCursor::at(t));
    }
}
