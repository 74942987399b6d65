//! The sync orchestrator.
//!
//! Coordinates ingest from the quote and broker providers into the
//! stores. Within one sync a symbol is handled by exactly one worker, so
//! persisted rows for that symbol have monotonic effective order; across
//! symbols there is no ordering guarantee. Every operation appends a
//! sync-log row.

use std::collections::BTreeSet;
use std::sync::Arc;

use anyhow::Result;
use chrono::{Duration as ChronoDuration, NaiveDate, Utc};
use stocklens_core::store::{
    AccountStore, BarStore, PositionStore, SnapshotStore, SyncKind, SyncLogRecord, SyncLogStore,
    SyncStatus, TradeStore, WatchlistStore,
};
use stocklens_core::traits::{BrokerProvider, QuoteProvider};
use stocklens_core::{CancelToken, CoreError, SyncConfig, Symbol};
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::retry::with_retry;

/// User identity: `id` addresses the stores, `username` the broker.
#[derive(Debug, Clone)]
pub struct UserRef {
    pub id: i64,
    pub username: String,
}

/// The store bundle the orchestrator writes through.
#[derive(Clone)]
pub struct SyncStores {
    pub bars: Arc<dyn BarStore>,
    pub accounts: Arc<dyn AccountStore>,
    pub positions: Arc<dyn PositionStore>,
    pub trades: Arc<dyn TradeStore>,
    pub snapshots: Arc<dyn SnapshotStore>,
    pub watchlist: Arc<dyn WatchlistStore>,
    pub sync_logs: Arc<dyn SyncLogStore>,
}

impl SyncStores {
    /// Wires every store to its PostgreSQL repository over one shared
    /// pool.
    #[must_use]
    pub fn postgres(db: &stocklens_data::DatabaseClient) -> Self {
        let pool = db.pool().clone();
        Self {
            bars: Arc::new(stocklens_data::KlineRepository::new(pool.clone())),
            accounts: Arc::new(stocklens_data::AccountRepository::new(pool.clone())),
            positions: Arc::new(stocklens_data::PositionRepository::new(pool.clone())),
            trades: Arc::new(stocklens_data::TradeRepository::new(pool.clone())),
            snapshots: Arc::new(stocklens_data::SnapshotRepository::new(pool.clone())),
            watchlist: Arc::new(stocklens_data::WatchlistRepository::new(pool.clone())),
            sync_logs: Arc::new(stocklens_data::SyncLogRepository::new(pool)),
        }
    }
}

/// Result of one sync operation, mirrored into the sync log.
#[derive(Debug, Clone)]
pub struct SyncOutcome {
    pub kind: SyncKind,
    pub status: SyncStatus,
    /// Rows actually written; unchanged upstream rows count zero.
    pub records_count: i64,
    pub errors: Vec<String>,
}

impl SyncOutcome {
    fn from_parts(kind: SyncKind, records_count: i64, errors: Vec<String>) -> Self {
        // A cancelled run keeps its persisted work and closes as partial.
        let cancelled = errors.iter().any(|e| e.contains("cancelled"));
        let status = if errors.is_empty() {
            SyncStatus::Success
        } else if records_count > 0 || cancelled {
            SyncStatus::Partial
        } else {
            SyncStatus::Failed
        };
        Self {
            kind,
            status,
            records_count,
            errors,
        }
    }
}

pub struct SyncOrchestrator {
    quotes: Arc<dyn QuoteProvider>,
    broker: Arc<dyn BrokerProvider>,
    stores: SyncStores,
    config: SyncConfig,
}

impl SyncOrchestrator {
    #[must_use]
    pub fn new(
        quotes: Arc<dyn QuoteProvider>,
        broker: Arc<dyn BrokerProvider>,
        stores: SyncStores,
        config: SyncConfig,
    ) -> Self {
        Self {
            quotes,
            broker,
            stores,
            config,
        }
    }

    /// Pulls current positions for every active account and snapshots the
    /// day's cash alongside.
    ///
    /// # Errors
    /// Store failures outside the per-account loop.
    pub async fn sync_positions(
        &self,
        user: &UserRef,
        cancel: &CancelToken,
    ) -> Result<SyncOutcome> {
        let started_at = Utc::now();
        let today = Utc::now().date_naive();
        let mut records = 0i64;
        let mut errors = Vec::new();

        let accounts = self.stores.accounts.active_accounts(user.id).await?;
        if accounts.is_empty() {
            errors.push(format!("no active accounts for user {}", user.username));
        }

        for account in &accounts {
            if cancel.is_cancelled() {
                errors.push("cancelled".to_string());
                break;
            }

            match self
                .broker_call(cancel, || {
                    self.broker.fetch_positions(account.broker_acc_id, cancel)
                })
                .await
            {
                Ok(positions) => {
                    match self
                        .stores
                        .positions
                        .insert_snapshots(account.id, today, &positions)
                        .await
                    {
                        Ok(inserted) => records += inserted as i64,
                        Err(err) => errors.push(format!(
                            "account {}: position store: {err}",
                            account.broker_acc_id
                        )),
                    }
                }
                Err(err) => {
                    warn!(account = account.broker_acc_id, %err, "position fetch failed");
                    errors.push(format!("account {}: {err}", account.broker_acc_id));
                    continue;
                }
            }

            match self
                .broker_call(cancel, || {
                    self.broker.fetch_account_info(account.broker_acc_id, cancel)
                })
                .await
            {
                Ok(cash) => {
                    match self
                        .stores
                        .snapshots
                        .insert_snapshot(account.id, today, &cash)
                        .await
                    {
                        Ok(inserted) => records += inserted as i64,
                        Err(err) => errors.push(format!(
                            "account {}: snapshot store: {err}",
                            account.broker_acc_id
                        )),
                    }
                }
                Err(err) => {
                    errors.push(format!("account {} cash: {err}", account.broker_acc_id));
                }
            }
        }

        self.finish(user, SyncKind::Positions, started_at, records, errors)
            .await
    }

    /// Pulls today's deals plus history over the range, deduplicated on
    /// deal id.
    ///
    /// # Errors
    /// `InvalidInput` for a reversed range; store failures outside the
    /// per-account loop.
    pub async fn sync_trades(
        &self,
        user: &UserRef,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
        cancel: &CancelToken,
    ) -> Result<SyncOutcome> {
        let started_at = Utc::now();
        let today = Utc::now().date_naive();
        let to = to.unwrap_or(today);
        let from = from.unwrap_or(today - ChronoDuration::days(self.config.trade_days));
        if from > to {
            return Err(CoreError::InvalidInput(format!(
                "reversed date range {from}..{to}"
            ))
            .into());
        }

        let mut records = 0i64;
        let mut errors = Vec::new();
        let accounts = self.stores.accounts.active_accounts(user.id).await?;

        for account in &accounts {
            if cancel.is_cancelled() {
                errors.push("cancelled".to_string());
                break;
            }

            let mut fills = Vec::new();
            match self
                .broker_call(cancel, || {
                    self.broker.fetch_today_deals(account.broker_acc_id, cancel)
                })
                .await
            {
                Ok(batch) => fills.extend(batch),
                Err(err) => errors.push(format!(
                    "account {} today deals: {err}",
                    account.broker_acc_id
                )),
            }
            match self
                .broker_call(cancel, || {
                    self.broker
                        .fetch_historical_deals(account.broker_acc_id, from, to, cancel)
                })
                .await
            {
                Ok(batch) => fills.extend(batch),
                Err(err) => errors.push(format!(
                    "account {} history: {err}",
                    account.broker_acc_id
                )),
            }

            match self.stores.trades.insert_fills(account.id, &fills).await {
                Ok(inserted) => records += inserted as i64,
                Err(err) => errors.push(format!(
                    "account {}: trade store: {err}",
                    account.broker_acc_id
                )),
            }
        }

        self.finish(user, SyncKind::Trades, started_at, records, errors)
            .await
    }

    /// Incrementally pulls daily bars for the symbols on a bounded worker
    /// pool: each symbol fetches from its latest persisted date forward
    /// and upserts inside its own worker.
    ///
    /// # Errors
    /// Log-store failures; per-symbol failures are collected instead.
    pub async fn sync_klines(
        &self,
        user: Option<&UserRef>,
        symbols: &[Symbol],
        days: i64,
        cancel: &CancelToken,
    ) -> Result<SyncOutcome> {
        let started_at = Utc::now();
        let today = Utc::now().date_naive();
        let semaphore = Arc::new(Semaphore::new(self.config.worker_pool_size.max(1)));

        let mut handles: Vec<JoinHandle<(Symbol, Result<u64, CoreError>)>> = Vec::new();
        for symbol in symbols {
            let symbol = symbol.clone();
            let semaphore = Arc::clone(&semaphore);
            let quotes = Arc::clone(&self.quotes);
            let bars = Arc::clone(&self.stores.bars);
            let cancel = cancel.clone();
            let config = self.config.clone();

            handles.push(tokio::spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .expect("semaphore never closed");
                let result =
                    sync_one_symbol(&symbol, days, today, &config, quotes, bars, &cancel).await;
                (symbol, result)
            }));
        }

        let mut records = 0i64;
        let mut errors = Vec::new();
        for handle in handles {
            match handle.await {
                Ok((_, Ok(inserted))) => records += inserted as i64,
                Ok((symbol, Err(err))) => {
                    warn!(%symbol, %err, "kline sync failed");
                    errors.push(format!("{symbol}: {err}"));
                }
                Err(join_err) => errors.push(format!("worker panicked: {join_err}")),
            }
        }

        // An empty symbol set is a successful no-op, not a failure.
        let outcome = if symbols.is_empty() {
            SyncOutcome::from_parts(SyncKind::Klines, 0, Vec::new())
        } else if errors.is_empty() {
            SyncOutcome::from_parts(SyncKind::Klines, records, errors)
        } else {
            SyncOutcome {
                kind: SyncKind::Klines,
                status: SyncStatus::Partial,
                records_count: records,
                errors,
            }
        };
        self.log(user.map(|u| u.id), started_at, &outcome).await?;
        Ok(outcome)
    }

    /// Reconciles the stored watchlist against the broker's.
    ///
    /// # Errors
    /// Store failures outside the provider call.
    pub async fn sync_watchlist(
        &self,
        user: &UserRef,
        cancel: &CancelToken,
    ) -> Result<SyncOutcome> {
        let started_at = Utc::now();
        let mut records = 0i64;
        let mut errors = Vec::new();

        match self
            .broker_call(cancel, || {
                self.broker.fetch_watchlist(&user.username, cancel)
            })
            .await
        {
            Ok(entries) => match self.stores.watchlist.reconcile(user.id, &entries).await {
                Ok(changed) => records = changed as i64,
                Err(err) => errors.push(format!("watchlist store: {err}")),
            },
            Err(err) => errors.push(format!("watchlist fetch: {err}")),
        }

        self.finish(user, SyncKind::Watchlist, started_at, records, errors)
            .await
    }

    /// Runs positions, trades, watchlist, then klines over the union of
    /// held and watched symbols. Any subcomponent failure downgrades the
    /// overall log to partial; the count is the sum of successes.
    ///
    /// # Errors
    /// Store failures that abort an entire subcomponent.
    pub async fn sync_all(&self, user: &UserRef, cancel: &CancelToken) -> Result<Vec<SyncOutcome>> {
        let started_at = Utc::now();
        let today = Utc::now().date_naive();
        let mut outcomes = Vec::new();

        outcomes.push(self.sync_positions(user, cancel).await?);
        outcomes.push(self.sync_trades(user, None, None, cancel).await?);
        outcomes.push(self.sync_watchlist(user, cancel).await?);

        let mut symbols: BTreeSet<Symbol> = BTreeSet::new();
        symbols.extend(self.stores.positions.held_symbols(user.id, today).await?);
        symbols.extend(self.stores.watchlist.active_symbols(user.id).await?);
        let symbols: Vec<Symbol> = symbols.into_iter().collect();
        outcomes.push(
            self.sync_klines(Some(user), &symbols, self.config.kline_days, cancel)
                .await?,
        );

        let records: i64 = outcomes.iter().map(|o| o.records_count).sum();
        let failed: Vec<String> = outcomes
            .iter()
            .filter(|o| o.status != SyncStatus::Success)
            .flat_map(|o| o.errors.iter().cloned())
            .collect();
        let status = if failed.is_empty() {
            SyncStatus::Success
        } else {
            SyncStatus::Partial
        };
        let overall = SyncOutcome {
            kind: SyncKind::All,
            status,
            records_count: records,
            errors: failed,
        };
        self.log(Some(user.id), started_at, &overall).await?;

        info!(
            user = %user.username,
            records,
            status = overall.status.as_str(),
            "full sync finished"
        );
        Ok(outcomes)
    }

    /// Most recent log row for the user and kind.
    ///
    /// # Errors
    /// Log-store failures.
    pub async fn last_sync(
        &self,
        user: &UserRef,
        kind: SyncKind,
    ) -> Result<Option<SyncLogRecord>> {
        self.stores.sync_logs.last(user.id, kind).await
    }

    async fn broker_call<T, F, Fut>(&self, cancel: &CancelToken, op: F) -> Result<T, CoreError>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<T, CoreError>>,
    {
        let deadline = self.config.broker_deadline;
        let op = &op;
        with_retry(
            self.config.retry_attempts,
            self.config.retry_base_delay,
            cancel,
            "broker",
            move || {
                // Build the provider future outside the async block so the
                // retry closure's environment is not borrowed across awaits.
                let call = (!cancel.is_cancelled()).then(op);
                async move {
                    let Some(call) = call else {
                        return Err(CoreError::Transient {
                            symbol: "broker".to_string(),
                            message: "cancelled".to_string(),
                        });
                    };
                    match tokio::time::timeout(deadline, call).await {
                        Ok(result) => result,
                        Err(_) => Err(CoreError::Transient {
                            symbol: "broker".to_string(),
                            message: format!("deadline of {deadline:?} exceeded"),
                        }),
                    }
                }
            },
        )
        .await
    }

    async fn finish(
        &self,
        user: &UserRef,
        kind: SyncKind,
        started_at: chrono::DateTime<Utc>,
        records: i64,
        errors: Vec<String>,
    ) -> Result<SyncOutcome> {
        let outcome = SyncOutcome::from_parts(kind, records, errors);
        self.log(Some(user.id), started_at, &outcome).await?;
        Ok(outcome)
    }

    async fn log(
        &self,
        user_id: Option<i64>,
        started_at: chrono::DateTime<Utc>,
        outcome: &SyncOutcome,
    ) -> Result<()> {
        let record = SyncLogRecord {
            user_id,
            kind: outcome.kind,
            status: outcome.status,
            records_count: outcome.records_count,
            error: if outcome.errors.is_empty() {
                None
            } else {
                Some(outcome.errors.join("; "))
            },
            started_at,
            finished_at: Some(Utc::now()),
        };
        self.stores.sync_logs.append(&record).await
    }
}

/// One symbol's incremental fetch-and-upsert, run inside a pool worker.
async fn sync_one_symbol(
    symbol: &Symbol,
    days: i64,
    today: NaiveDate,
    config: &SyncConfig,
    quotes: Arc<dyn QuoteProvider>,
    bars: Arc<dyn BarStore>,
    cancel: &CancelToken,
) -> Result<u64, CoreError> {
    if cancel.is_cancelled() {
        return Err(CoreError::Transient {
            symbol: symbol.to_string(),
            message: "cancelled".to_string(),
        });
    }

    let latest = bars
        .latest_date(symbol)
        .await
        .map_err(|err| CoreError::Transient {
            symbol: symbol.to_string(),
            message: format!("store read: {err}"),
        })?;
    let from = match latest {
        Some(date) => date + ChronoDuration::days(1),
        None => today - ChronoDuration::days(days),
    };
    if from > today {
        return Ok(0);
    }

    let deadline = config.bar_deadline;
    let quotes = &quotes;
    let fetched = with_retry(
        config.retry_attempts,
        config.retry_base_delay,
        cancel,
        &symbol.to_string(),
        move || {
            let call = quotes.fetch_bars(symbol, from, today, cancel);
            async move {
                match tokio::time::timeout(deadline, call).await {
                    Ok(result) => result,
                    Err(_) => Err(CoreError::Transient {
                        symbol: symbol.to_string(),
                        message: format!("deadline of {deadline:?} exceeded"),
                    }),
                }
            }
        },
    )
    .await?;

    for bar in &fetched {
        bar.validate().map_err(|err| CoreError::ProviderInvalid {
            symbol: symbol.to_string(),
            message: err.to_string(),
        })?;
    }

    // Each worker's upsert is one short transaction; a uniqueness race
    // with a concurrent writer gets a single re-try.
    match bars.upsert_bars(symbol, &fetched).await {
        Ok(inserted) => Ok(inserted),
        Err(first_err) => {
            warn!(%symbol, %first_err, "upsert failed, retrying once");
            bars.upsert_bars(symbol, &fetched)
                .await
                .map_err(|err| CoreError::Transient {
                    symbol: symbol.to_string(),
                    message: format!("store write: {err}"),
                })
        }
    }
}
