//! Scoped broker session acquisition.
//!
//! The brokerage connection has explicit connect/disconnect phases;
//! running work through [`with_broker_session`] guarantees the disconnect
//! happens on every exit path, including provider errors.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use stocklens_core::traits::BrokerProvider;
use stocklens_core::CoreError;
use tracing::warn;

/// Opens and closes brokerage sessions. Unlock/authentication details
/// live in the implementation, outside the core.
#[async_trait]
pub trait BrokerSessionFactory: Send + Sync {
    async fn connect(&self) -> Result<Arc<dyn BrokerProvider>, CoreError>;

    async fn disconnect(&self, session: Arc<dyn BrokerProvider>) -> Result<(), CoreError>;
}

/// Connects, runs `work` with the live session, and always disconnects.
///
/// # Errors
/// The connect error, or the error produced by `work`. A failed
/// disconnect is logged but does not mask the work's result.
pub async fn with_broker_session<T, F, Fut>(
    factory: &dyn BrokerSessionFactory,
    work: F,
) -> Result<T, CoreError>
where
    F: FnOnce(Arc<dyn BrokerProvider>) -> Fut,
    Fut: Future<Output = Result<T, CoreError>>,
{
    let session = factory.connect().await?;
    let result = work(Arc::clone(&session)).await;
    if let Err(err) = factory.disconnect(session).await {
        warn!(%err, "broker disconnect failed");
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use stocklens_core::traits::{
        BrokerAccount, CashPull, FillPull, PositionPull, WatchlistPull,
    };
    use stocklens_core::CancelToken;

    struct NoopBroker;

    #[async_trait]
    impl BrokerProvider for NoopBroker {
        async fn list_accounts(
            &self,
            _user: &str,
            _cancel: &CancelToken,
        ) -> Result<Vec<BrokerAccount>, CoreError> {
            Ok(Vec::new())
        }

        async fn fetch_positions(
            &self,
            _broker_acc_id: i64,
            _cancel: &CancelToken,
        ) -> Result<Vec<PositionPull>, CoreError> {
            Ok(Vec::new())
        }

        async fn fetch_account_info(
            &self,
            _broker_acc_id: i64,
            _cancel: &CancelToken,
        ) -> Result<CashPull, CoreError> {
            Err(CoreError::NotFound {
                symbol: "account".to_string(),
            })
        }

        async fn fetch_today_deals(
            &self,
            _broker_acc_id: i64,
            _cancel: &CancelToken,
        ) -> Result<Vec<FillPull>, CoreError> {
            Ok(Vec::new())
        }

        async fn fetch_historical_deals(
            &self,
            _broker_acc_id: i64,
            _from: chrono::NaiveDate,
            _to: chrono::NaiveDate,
            _cancel: &CancelToken,
        ) -> Result<Vec<FillPull>, CoreError> {
            Ok(Vec::new())
        }

        async fn fetch_watchlist(
            &self,
            _user: &str,
            _cancel: &CancelToken,
        ) -> Result<Vec<WatchlistPull>, CoreError> {
            Ok(Vec::new())
        }
    }

    struct CountingFactory {
        connects: AtomicU32,
        disconnects: AtomicU32,
    }

    impl CountingFactory {
        fn new() -> Self {
            Self {
                connects: AtomicU32::new(0),
                disconnects: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl BrokerSessionFactory for CountingFactory {
        async fn connect(&self) -> Result<Arc<dyn BrokerProvider>, CoreError> {
            self.connects.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(NoopBroker))
        }

        async fn disconnect(&self, _session: Arc<dyn BrokerProvider>) -> Result<(), CoreError> {
            self.disconnects.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn disconnects_after_successful_work() {
        let factory = CountingFactory::new();
        let result = with_broker_session(&factory, |session| async move {
            session
                .list_accounts("alice", &CancelToken::never())
                .await
                .map(|accounts| accounts.len())
        })
        .await;
        assert_eq!(result.unwrap(), 0);
        assert_eq!(factory.connects.load(Ordering::SeqCst), 1);
        assert_eq!(factory.disconnects.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn disconnects_even_when_work_fails() {
        let factory = CountingFactory::new();
        let result = with_broker_session(&factory, |session| async move {
            session.fetch_account_info(1, &CancelToken::never()).await
        })
        .await;
        assert!(result.is_err());
        assert_eq!(factory.disconnects.load(Ordering::SeqCst), 1);
    }
}
