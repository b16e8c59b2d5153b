//! Time-bounded, single-use credential store.
//!
//! Tokens live in one table guarded by a single lock together with an
//! expiry-ordered index, so issuance, verification and the background sweep
//! never observe a half-updated table. The sweep only pops expired entries
//! from the front of the index; verification additionally rejects expired
//! tokens that the sweep has not reached yet.

use std::{
    collections::{BTreeSet, HashMap},
    sync::Arc,
    time::Duration,
};

use tokio::{sync::Mutex, task::JoinHandle, time::Instant};

use crate::{
    common::ShutdownSignal,
    domain::{OneTimeToken, Timestamp, TokenKeyFactory},
};

struct StoredToken {
    token: OneTimeToken,
    expires_at: Instant,
}

#[derive(Default)]
struct TokenTable {
    tokens: HashMap<String, StoredToken>,
    by_expiry: BTreeSet<(Instant, String)>,
}

impl TokenTable {
    fn insert(&mut self, token: OneTimeToken, expires_at: Instant) {
        self.by_expiry.insert((expires_at, token.key.clone()));
        self.tokens
            .insert(token.key.clone(), StoredToken { token, expires_at });
    }

    fn take(&mut self, key: &str) -> Option<StoredToken> {
        let stored = self.tokens.remove(key)?;
        self.by_expiry.remove(&(stored.expires_at, key.to_string()));
        Some(stored)
    }

    fn evict_expired(&mut self, now: Instant) -> usize {
        let mut evicted = 0;
        while let Some((expires_at, _)) = self.by_expiry.first() {
            if *expires_at > now {
                break;
            }
            if let Some((_, key)) = self.by_expiry.pop_first() {
                self.tokens.remove(&key);
                evicted += 1;
            }
        }
        evicted
    }
}

/// Issues and validates one-time tokens
pub struct CredentialStore {
    retention: Duration,
    table: Mutex<TokenTable>,
}

impl CredentialStore {
    pub fn new(retention: Duration) -> Self {
        Self {
            retention,
            table: Mutex::new(TokenTable::default()),
        }
    }

    /// Issue a fresh token valid for the retention window
    pub async fn issue(&self) -> OneTimeToken {
        let token = OneTimeToken::new(TokenKeyFactory::generate(), Timestamp::now());
        let expires_at = Instant::now() + self.retention;

        let mut table = self.table.lock().await;
        table.insert(token.clone(), expires_at);
        tracing::debug!(key = %token.key, "Issued one-time token");

        token
    }

    /// Check and consume `key`.
    ///
    /// Returns `false` for unknown, already used, or expired keys. A
    /// successful call removes the token, so every later call fails.
    pub async fn verify(&self, key: &str) -> bool {
        let mut table = self.table.lock().await;
        match table.take(key) {
            Some(stored) if stored.expires_at > Instant::now() => true,
            Some(stored) => {
                tracing::debug!(key = %stored.token.key, "Rejected expired one-time token");
                false
            }
            None => false,
        }
    }

    /// Evict every token whose retention window has elapsed
    pub async fn sweep(&self) -> usize {
        let mut table = self.table.lock().await;
        table.evict_expired(Instant::now())
    }

    pub async fn len(&self) -> usize {
        self.table.lock().await.tokens.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Run [`sweep`](Self::sweep) every `interval` until shutdown
    pub fn spawn_expiry_sweep(
        self: &Arc<Self>,
        interval: Duration,
        mut shutdown: ShutdownSignal,
    ) -> JoinHandle<()> {
        let store = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let evicted = store.sweep().await;
                        if evicted > 0 {
                            tracing::debug!(evicted, "Evicted expired one-time tokens");
                        }
                    }
                    _ = shutdown.recv() => {
                        tracing::info!("Token expiry sweep stopped");
                        break;
                    }
                }
            }
        })
    }
}
