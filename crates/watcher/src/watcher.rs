use std::{cmp::min, collections::BTreeMap, fmt, ops::Range, pin::pin};

use futures::stream::{self, StreamExt};
use goliath_chain_client::{ChainClientError, ChainService, ChainSession};
use goliath_common::retry::{policies::ExponentialBackoff, retry_with_backoff};
use goliath_config::ChainConfig;
use goliath_primitives::prelude::*;
use goliath_tasks::Shutdown;
use tracing::*;

use crate::{ConsistencyViolation, WatcherCursor, WatcherError};

/// How many of the latest accepted headers are kept to recognize redelivered
/// ones.
const RECENT_HEADERS: usize = 256;

/// Presents the chain service's transaction log as an append-only, gap-free,
/// duplicate-free sequence of batches.
///
/// The watcher owns its [`WatcherCursor`] exclusively. The cursor only moves
/// once a whole delta has been fetched, so a failed or cancelled
/// [`next_batch`](Self::next_batch) can simply be called again and will
/// refetch the same range.
pub struct ChainWatcher<S: ChainService> {
    service: S,
    config: ChainConfig,
    backoff: ExponentialBackoff,
    shutdown: Shutdown,
    cursor: WatcherCursor,
    session: Option<S::Session>,

    /// Params of the first session. Every later session must match them.
    params: Option<ChainParams>,

    /// Latest tx count reported by the chain, may be ahead of the cursor.
    known_tx_count: u64,

    /// Height of the latest header seen.
    known_height: u64,

    /// Commit hash and tx count of recently accepted headers, by height.
    recent_headers: BTreeMap<u64, (HexBytes, u64)>,

    /// Set once the chain contradicted what we emitted.
    violation: Option<ConsistencyViolation>,
}

impl<S: ChainService> fmt::Debug for ChainWatcher<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChainWatcher")
            .field("endpoint", &self.config.endpoint)
            .field("cursor", &self.cursor)
            .field("connected", &self.session.is_some())
            .field("known_tx_count", &self.known_tx_count)
            .field("known_height", &self.known_height)
            .field("violation", &self.violation)
            .finish_non_exhaustive()
    }
}

impl<S: ChainService> ChainWatcher<S> {
    pub fn new(service: S, config: ChainConfig, shutdown: Shutdown) -> Self {
        let cursor = WatcherCursor::starting_at(config.start_index);
        let backoff = config.reconnect_backoff.to_policy();

        Self {
            service,
            config,
            backoff,
            shutdown,
            cursor,
            session: None,
            params: None,
            known_tx_count: cursor.next_index(),
            known_height: 0,
            recent_headers: BTreeMap::new(),
            violation: None,
        }
    }

    /// Resumes from a previously saved cursor instead of the configured start
    /// index.
    pub fn with_cursor(mut self, cursor: WatcherCursor) -> Self {
        self.cursor = cursor;
        self.known_tx_count = cursor.next_index();
        self.known_height = cursor.last_height();
        self
    }

    pub fn cursor(&self) -> WatcherCursor {
        self.cursor
    }

    pub fn chain_params(&self) -> Option<&ChainParams> {
        self.params.as_ref()
    }

    pub fn is_connected(&self) -> bool {
        self.session.is_some()
    }

    /// Establishes the subscription if there isn't one, retrying with
    /// backoff until it succeeds, the attempt limit is hit or shutdown is
    /// signalled.
    pub async fn connect(&mut self) -> Result<(), WatcherError> {
        self.check_violation()?;
        if self.session.is_some() {
            return Ok(());
        }

        let endpoint = self.config.endpoint.as_str();
        let max_retries = self
            .config
            .max_connect_attempts
            .map(|n| n.saturating_sub(1));
        let service = &self.service;
        let attempt = retry_with_backoff("chain-connect", max_retries, &self.backoff, || {
            open_session(service, endpoint)
        });

        let res = tokio::select! {
            _ = self.shutdown.wait_for_shutdown() => None,
            res = attempt => Some(res),
        };
        let Some(res) = res else {
            return Err(self.close_for_shutdown());
        };
        let (session, params, tx_count, latest) = res.map_err(WatcherError::Connection)?;

        match self.params.clone() {
            Some(expected) if expected != params => {
                return Err(self.fail(ConsistencyViolation::ChainParamsMismatch {
                    expected,
                    actual: params,
                }));
            }
            Some(_) => {}
            None => {
                info!(chain_id = %params.chain_id, genesis = %params.genesis_hash, "following chain");
                self.params = Some(params);
            }
        }

        let emitted = self.cursor.next_index();
        if tx_count < emitted {
            return Err(self.fail(ConsistencyViolation::CountBelowCursor { tx_count, emitted }));
        }

        // Catch-up fetches are stamped with the height seen at connect time.
        if let Some(header) = latest {
            self.observe_header(header)?;
        }

        // Anything between the cursor and this count gets fetched right away,
        // without waiting for the next header.
        self.known_tx_count = tx_count;
        self.session = Some(session);
        info!(endpoint = %self.config.endpoint, %tx_count, height = %self.known_height, cursor = %emitted, "connected to chain service");
        Ok(())
    }

    /// Returns the next batch of transactions, in sequence order, starting at
    /// the cursor.
    ///
    /// Suspends until a header notification arrives if the cursor has caught
    /// up with the chain. A header that brings no new transactions (ie. an
    /// empty block or a redelivered notification) yields an empty batch.
    /// Reconnects transparently when the header stream drops.
    pub async fn next_batch(&mut self) -> Result<Vec<ChainTransaction>, WatcherError> {
        loop {
            self.check_violation()?;
            if self.shutdown.should_shutdown() {
                return Err(self.close_for_shutdown());
            }

            self.connect().await?;
            let Some(session) = self.session.as_mut() else {
                continue;
            };

            let start = self.cursor.next_index();
            if self.known_tx_count > start {
                let limit = self.config.fetch_batch_limit.max(1);
                let end = min(self.known_tx_count, start.saturating_add(limit));
                let height = self.known_height;
                let span = debug_span!("fetch", %start, %end);
                let fetch = fetch_range(&*session, start..end, height, self.config.fetch_concurrency)
                    .instrument(span);

                let res = tokio::select! {
                    _ = self.shutdown.wait_for_shutdown() => None,
                    res = fetch => Some(res),
                };
                let Some(res) = res else {
                    return Err(self.close_for_shutdown());
                };
                return self.finish_fetch(end, height, res);
            }

            let header = tokio::select! {
                _ = self.shutdown.wait_for_shutdown() => None,
                header = session.next_header() => Some(header),
            };
            let Some(header) = header else {
                return Err(self.close_for_shutdown());
            };

            match header {
                Ok(Some(header)) => {
                    if !self.observe_header(header)? {
                        return Ok(Vec::new());
                    }
                }
                Ok(None) => {
                    warn!(cursor = %start, "header stream ended, reconnecting");
                    self.session = None;
                }
                Err(err) => {
                    warn!(%err, cursor = %start, "header stream failed, reconnecting");
                    self.session = None;
                }
            }
        }
    }

    /// Updates what we know about the chain from a header. Returns if there
    /// are transactions past the cursor to fetch.
    ///
    /// A header matching one already accepted is a redelivery and changes
    /// nothing. One contradicting an accepted header is fatal.
    fn observe_header(&mut self, header: BlockHeader) -> Result<bool, WatcherError> {
        let emitted = self.cursor.next_index();
        let tx_count = header.tx_count_at_height;

        let seen = self
            .recent_headers
            .get(&header.height)
            .map(|(commit, count)| (*commit == header.commit_hash, *count));
        if let Some((same_commit, seen_tx_count)) = seen {
            if same_commit && seen_tx_count == tx_count {
                debug!(height = %header.height, %tx_count, "ignoring redelivered header");
                return Ok(false);
            }

            let violation = if tx_count < emitted {
                self.rollback(&header, emitted)
            } else {
                ConsistencyViolation::ConflictingHeader {
                    height: header.height,
                    seen_tx_count,
                    tx_count,
                }
            };
            return Err(self.fail(violation));
        }

        // Older than anything we accepted and not one we remember, so it
        // can't be checked. Its count may well be below the cursor.
        if header.height < self.known_height {
            debug!(height = %header.height, known_height = %self.known_height, "ignoring stale header");
            return Ok(false);
        }

        if tx_count < emitted {
            let violation = self.rollback(&header, emitted);
            return Err(self.fail(violation));
        }

        if tx_count < self.known_tx_count {
            // Nothing past the cursor was emitted, so we can just forget about
            // the txs that disappeared.
            warn!(%tx_count, known = %self.known_tx_count, "chain dropped txs we hadn't fetched yet");
        }

        debug!(height = %header.height, %tx_count, commit = %header.commit_hash, "new header");
        self.known_height = header.height;
        self.known_tx_count = tx_count;
        self.remember(header);

        if tx_count > emitted {
            Ok(true)
        } else {
            self.cursor.observe_height(self.known_height);
            Ok(false)
        }
    }

    fn remember(&mut self, header: BlockHeader) {
        self.recent_headers
            .insert(header.height, (header.commit_hash, header.tx_count_at_height));
        while self.recent_headers.len() > RECENT_HEADERS {
            self.recent_headers.pop_first();
        }
    }

    fn rollback(&self, header: &BlockHeader, emitted: u64) -> ConsistencyViolation {
        ConsistencyViolation::Rollback {
            height: header.height,
            tx_count: header.tx_count_at_height,
            emitted,
            last_height: self.cursor.last_height(),
        }
    }

    fn finish_fetch(
        &mut self,
        end: u64,
        height: u64,
        res: Result<Vec<ChainTransaction>, WatcherError>,
    ) -> Result<Vec<ChainTransaction>, WatcherError> {
        match res {
            Ok(batch) => {
                self.cursor.advance(end, height);
                debug!(count = %batch.len(), cursor = %end, "fetched batch");
                Ok(batch)
            }
            Err(err) => {
                if let WatcherError::Fetch { source, .. } = &err {
                    if source.is_session_lost() {
                        self.session = None;
                    }
                }
                warn!(%err, cursor = %self.cursor.next_index(), "fetch failed, cursor unchanged");
                Err(err)
            }
        }
    }

    fn check_violation(&self) -> Result<(), WatcherError> {
        match &self.violation {
            Some(v) => Err(WatcherError::Consistency(v.clone())),
            None => Ok(()),
        }
    }

    /// Latches a violation so nothing else is ever emitted.
    fn fail(&mut self, violation: ConsistencyViolation) -> WatcherError {
        error!(%violation, cursor = %self.cursor.next_index(), "chain consistency violated, halting");
        self.session = None;
        self.violation = Some(violation.clone());
        WatcherError::Consistency(violation)
    }

    fn close_for_shutdown(&mut self) -> WatcherError {
        if self.session.take().is_some() {
            debug!("closed chain subscription");
        }
        WatcherError::Shutdown
    }
}

type OpenedSession<S> = (S, ChainParams, u64, Option<BlockHeader>);

/// Connects and reads the chain's current state. The latest header is read
/// after the count, so its height is one the counted txs were visible at.
async fn open_session<S: ChainService>(
    service: &S,
    endpoint: &str,
) -> Result<OpenedSession<S::Session>, ChainClientError> {
    let session = service.connect(endpoint).await?;
    let params = session.chain_params().await?;
    let tx_count = session.get_transaction_count().await?;
    let latest = session.latest_header().await?;
    Ok((session, params, tx_count, latest))
}

/// Fetches every transaction in `range`, keeping up to `concurrency` requests
/// in flight but collecting them in index order. Fails on the first missing
/// one.
async fn fetch_range<T: ChainSession>(
    session: &T,
    range: Range<u64>,
    height: u64,
    concurrency: usize,
) -> Result<Vec<ChainTransaction>, WatcherError> {
    let Range { start, end } = range;
    let mut fetches = pin!(stream::iter(range)
        .map(|index| async move { (index, session.get_transaction(index).await) })
        .buffered(concurrency.max(1)));

    let mut batch = Vec::with_capacity((end - start) as usize);
    while let Some((index, res)) = fetches.next().await {
        let mut tx = res.map_err(|source| WatcherError::Fetch {
            index,
            start,
            end,
            source,
        })?;

        if tx.sequence_index != index {
            return Err(WatcherError::Fetch {
                index,
                start,
                end,
                source: ChainClientError::Malformed(format!(
                    "got tx {} for index {index}",
                    tx.sequence_index
                )),
            });
        }

        tx.observed_at_height = height;
        batch.push(tx);
    }

    Ok(batch)
}
