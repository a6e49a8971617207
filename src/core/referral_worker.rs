//! Single-writer referral worker.
//!
//! Referral completions for the same referrer must not interleave their read of the completed
//! count with each other's write. The worker owns the only write path for referral bonuses:
//! requests arrive on an mpsc queue, are applied one at a time, and each caller gets its
//! answer back on a oneshot channel.

use crate::{
    config::pricing::PricingConfig,
    core::referral,
    errors::{Error, Result},
};
use sea_orm::DatabaseConnection;
use tokio::sync::{mpsc, oneshot};
use tracing::{info, warn};

const REFERRAL_QUEUE_CAPACITY: usize = 512;

/// A unit of work for the referral worker.
pub(crate) enum ReferralRequest {
    /// Mark a referral completed and recompute the referrer's bonus.
    Complete {
        /// The referring user
        referrer_id: String,
        /// The referred user
        referred_user_id: String,
        /// Receives the new earned credit count
        response: oneshot::Sender<Result<u64>>,
    },
    /// Recompute the referrer's bonus without changing any referral.
    Recompute {
        /// The referring user
        referrer_id: String,
        /// Receives the new earned credit count
        response: oneshot::Sender<Result<u64>>,
    },
}

struct ReferralWorker {
    db: DatabaseConnection,
    rules: PricingConfig,
}

impl ReferralWorker {
    async fn run(self, mut receiver: mpsc::Receiver<ReferralRequest>) {
        while let Some(request) = receiver.recv().await {
            self.handle_request(request).await;
        }
        info!("Referral worker stopped: all handles dropped");
    }

    async fn handle_request(&self, request: ReferralRequest) {
        match request {
            ReferralRequest::Complete {
                referrer_id,
                referred_user_id,
                response,
            } => {
                let result =
                    referral::complete_referral(&self.db, &self.rules, &referrer_id, &referred_user_id)
                        .await;
                if let Err(e) = &result {
                    warn!("Referral completion for {} failed: {}", referrer_id, e);
                }
                let _ = response.send(result);
            }
            ReferralRequest::Recompute {
                referrer_id,
                response,
            } => {
                let result =
                    referral::recompute_referral_bonus(&self.db, &self.rules, &referrer_id).await;
                if let Err(e) = &result {
                    warn!("Referral bonus recompute for {} failed: {}", referrer_id, e);
                }
                let _ = response.send(result);
            }
        }
    }
}

/// Cloneable handle for submitting work to the referral worker.
#[derive(Clone)]
pub struct ReferralWorkerHandle {
    sender: mpsc::Sender<ReferralRequest>,
}

impl ReferralWorkerHandle {
    /// Completes a referral through the worker and returns the referrer's earned credits.
    ///
    /// # Errors
    /// Returns whatever [`referral::complete_referral`] returns, or
    /// `Error::WorkerUnavailable` if the worker has stopped.
    pub async fn complete_referral(&self, referrer_id: &str, referred_user_id: &str) -> Result<u64> {
        let (response, receiver) = oneshot::channel();
        self.submit(
            ReferralRequest::Complete {
                referrer_id: referrer_id.to_string(),
                referred_user_id: referred_user_id.to_string(),
                response,
            },
            receiver,
        )
        .await
    }

    /// Recomputes a referrer's bonus through the worker.
    ///
    /// # Errors
    /// Returns whatever [`referral::recompute_referral_bonus`] returns, or
    /// `Error::WorkerUnavailable` if the worker has stopped.
    pub async fn recompute_referral_bonus(&self, referrer_id: &str) -> Result<u64> {
        let (response, receiver) = oneshot::channel();
        self.submit(
            ReferralRequest::Recompute {
                referrer_id: referrer_id.to_string(),
                response,
            },
            receiver,
        )
        .await
    }

    async fn submit(
        &self,
        request: ReferralRequest,
        receiver: oneshot::Receiver<Result<u64>>,
    ) -> Result<u64> {
        self.sender
            .send(request)
            .await
            .map_err(|_| Error::WorkerUnavailable)?;
        receiver.await.map_err(|_| Error::WorkerUnavailable)?
    }
}

/// Starts the referral worker on the current tokio runtime.
///
/// The worker runs until every [`ReferralWorkerHandle`] has been dropped.
#[must_use]
pub fn spawn_referral_worker(db: DatabaseConnection, rules: PricingConfig) -> ReferralWorkerHandle {
    let (sender, receiver) = mpsc::channel(REFERRAL_QUEUE_CAPACITY);
    tokio::spawn(ReferralWorker { db, rules }.run(receiver));
    info!("Referral worker started");
    ReferralWorkerHandle { sender }
}
