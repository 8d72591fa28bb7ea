//! Refresh coordination.
//!
//! Decides whether a namespace's cached data must be refreshed before it is
//! served, runs the refresh routine when it must, and records the outcome in
//! the namespace attributes.
//!
//! States (attribute `pending`):
//!
//! - `idle`: the last refresh succeeded at `updated`
//! - `in-progress`: a refresh holds the lease until `lease`
//! - `needs-refresh`: nothing has succeeded yet, or the last attempt failed
//!
//! Reading the state and claiming it happen in one immediate transaction, so
//! two callers observing `needs-refresh` cannot both start a refresh. A
//! claim whose lease has run out is taken over, so a crashed refresh does
//! not wedge the namespace.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio_rusqlite::rusqlite::{TransactionBehavior, params};

use crate::Error;
use crate::namespace::{
    ATTR_LEASE, ATTR_PENDING, ATTR_UPDATED, Namespace, read_attribute, write_attribute,
};
use crate::store::ident::quote;

/// Refresh state of a namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshState {
    Idle,
    InProgress,
    NeedsRefresh,
}

impl RefreshState {
    pub fn as_str(self) -> &'static str {
        match self {
            RefreshState::Idle => "idle",
            RefreshState::InProgress => "in-progress",
            RefreshState::NeedsRefresh => "needs-refresh",
        }
    }

    /// Parse a stored state. Anything unrecognised needs a refresh.
    pub fn parse(value: &str) -> Self {
        match value {
            "idle" => RefreshState::Idle,
            "in-progress" => RefreshState::InProgress,
            _ => RefreshState::NeedsRefresh,
        }
    }
}

/// Timing policy for [`Namespace::maybe_refresh`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshPolicy {
    /// Minimum time since the last success before refreshing again.
    pub stale_after: Duration,
    /// How long a claimed refresh may run before others may take over.
    pub lease: Duration,
}

/// What a [`Namespace::maybe_refresh`] call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// The routine ran and succeeded.
    Refreshed,
    /// Data is within the staleness window; nothing ran.
    Fresh,
    /// Another caller holds a live lease; nothing ran.
    InFlight,
}

/// The fetch-and-replace operation that repopulates a namespace.
#[async_trait]
pub trait RefreshRoutine: Send + Sync {
    async fn refresh(&self, namespace: &Namespace<'_>) -> Result<(), Error>;
}

fn parse_time(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value).ok().map(|t| t.with_timezone(&Utc))
}

fn to_delta(duration: Duration, what: &str) -> Result<chrono::Duration, Error> {
    chrono::Duration::from_std(duration).map_err(|_| Error::Validation(format!("{what} is out of range")))
}

impl Namespace<'_> {
    /// Current refresh state; unset counts as `needs-refresh`.
    pub async fn refresh_state(&self) -> Result<RefreshState, Error> {
        Ok(self
            .attribute(ATTR_PENDING)
            .await?
            .map(|s| RefreshState::parse(&s))
            .unwrap_or(RefreshState::NeedsRefresh))
    }

    /// Refresh the namespace if it needs it, using the current time.
    pub async fn maybe_refresh<R>(&self, policy: &RefreshPolicy, routine: &R) -> Result<RefreshOutcome, Error>
    where
        R: RefreshRoutine + ?Sized,
    {
        self.maybe_refresh_at(Utc::now(), policy, routine).await
    }

    /// Refresh the namespace if it needs it at time `now`.
    ///
    /// On success the state becomes `idle` with `updated = now`. On failure
    /// the state becomes `needs-refresh` and the routine's error is returned
    /// unchanged, so the next call retries regardless of the staleness
    /// window.
    pub async fn maybe_refresh_at<R>(
        &self, now: DateTime<Utc>, policy: &RefreshPolicy, routine: &R,
    ) -> Result<RefreshOutcome, Error>
    where
        R: RefreshRoutine + ?Sized,
    {
        let stale_after = to_delta(policy.stale_after, "staleness window")?;
        let lease_until = now
            .checked_add_signed(to_delta(policy.lease, "refresh lease")?)
            .ok_or_else(|| Error::Validation("refresh lease is out of range".into()))?;
        let table = self.name().to_string();

        let claimed = self
            .session()
            .conn
            .call(move |conn| -> Result<Option<RefreshOutcome>, Error> {
                let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
                let state = read_attribute(&tx, &table, ATTR_PENDING)?
                    .map(|s| RefreshState::parse(&s))
                    .unwrap_or(RefreshState::NeedsRefresh);

                match state {
                    RefreshState::InProgress => {
                        let until = read_attribute(&tx, &table, ATTR_LEASE)?.and_then(|s| parse_time(&s));
                        match until {
                            Some(until) if until > now => return Ok(Some(RefreshOutcome::InFlight)),
                            _ => tracing::warn!(namespace = %table, lease = ?until, "taking over abandoned refresh"),
                        }
                    }
                    RefreshState::Idle => {
                        let updated = read_attribute(&tx, &table, ATTR_UPDATED)?.and_then(|s| parse_time(&s));
                        if updated.is_some_and(|updated| now - updated < stale_after) {
                            return Ok(Some(RefreshOutcome::Fresh));
                        }
                    }
                    RefreshState::NeedsRefresh => {}
                }

                write_attribute(&tx, &table, ATTR_PENDING, RefreshState::InProgress.as_str())?;
                write_attribute(&tx, &table, ATTR_LEASE, &lease_until.to_rfc3339())?;
                tx.commit()?;
                Ok(None)
            })
            .await
            .map_err(Error::from)?;

        if let Some(outcome) = claimed {
            tracing::debug!(namespace = %self.name(), ?outcome, "refresh skipped");
            return Ok(outcome);
        }

        tracing::info!(namespace = %self.name(), "refreshing namespace");
        match routine.refresh(self).await {
            Ok(()) => {
                self.finish(RefreshState::Idle, Some(now)).await?;
                tracing::info!(namespace = %self.name(), "refresh succeeded");
                Ok(RefreshOutcome::Refreshed)
            }
            Err(err) => {
                tracing::warn!(namespace = %self.name(), error = %err, "refresh failed");
                if let Err(record) = self.finish(RefreshState::NeedsRefresh, None).await {
                    tracing::error!(namespace = %self.name(), error = %record, "could not record refresh failure");
                }
                Err(err)
            }
        }
    }

    async fn finish(&self, state: RefreshState, updated: Option<DateTime<Utc>>) -> Result<(), Error> {
        let table = self.name().to_string();
        self.session()
            .conn
            .call(move |conn| -> Result<(), Error> {
                let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
                write_attribute(&tx, &table, ATTR_PENDING, state.as_str())?;
                if let Some(updated) = updated {
                    write_attribute(&tx, &table, ATTR_UPDATED, &updated.to_rfc3339())?;
                }
                tx.execute(&format!("DELETE FROM {} WHERE key = ?1", quote(&table)), params![ATTR_LEASE])?;
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }
}
