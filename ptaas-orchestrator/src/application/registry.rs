//! Scan registry: the API's view of submitted and finished scans.
//!
//! A single actor task owns the active set and the completed log; callers
//! talk to it through [`ScanRegistryHandle`]. Refreshing the active list
//! reads every tracked job's published state, folds it into the record and
//! moves terminal jobs into the completed log exactly once. A job whose
//! snapshot has disappeared (expired from the job store) for
//! [`MAX_MISSING_READS`] consecutive refreshes is retired as `EXPIRED`.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::domain::entities::{ActiveScanRecord, CompletedLogEntry, ScanRequest};
use crate::domain::state::JobState;
use crate::infrastructure::job_store::JobStore;

const COMMAND_BUFFER: usize = 64;

/// Consecutive refreshes without a snapshot before a job is retired
pub const MAX_MISSING_READS: u32 = 3;

/// State label given to jobs whose snapshot expired before a terminal state was seen
pub const EXPIRED_STATE: &str = "EXPIRED";

enum Observation {
    State(JobState),
    Missing,
    Unavailable,
}

/// Registry communication errors
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Scan registry is not running")]
    Closed,
}

enum RegistryCommand {
    Track {
        request: ScanRequest,
        reply: oneshot::Sender<()>,
    },
    RefreshActive {
        reply: oneshot::Sender<Vec<ActiveScanRecord>>,
    },
    ListCompleted {
        reply: oneshot::Sender<Vec<CompletedLogEntry>>,
    },
    CompletedEntry {
        job_id: Uuid,
        reply: oneshot::Sender<Option<CompletedLogEntry>>,
    },
    LastKnown {
        job_id: Uuid,
        reply: oneshot::Sender<Option<JobState>>,
    },
}

struct TrackedScan {
    record: ActiveScanRecord,
    state: JobState,
    misses: u32,
}

struct CompletedScan {
    entry: CompletedLogEntry,
    state: JobState,
}

/// Actor state; only ever touched from the actor task
struct ScanRegistry {
    job_store: Arc<dyn JobStore>,
    /// Submission order of active job ids
    order: Vec<Uuid>,
    active: HashMap<Uuid, TrackedScan>,
    completed: HashMap<Uuid, CompletedScan>,
}

impl ScanRegistry {
    fn track(&mut self, request: ScanRequest) {
        if self.active.contains_key(&request.job_id) || self.completed.contains_key(&request.job_id) {
            return;
        }

        self.order.push(request.job_id);
        self.active.insert(
            request.job_id,
            TrackedScan {
                record: ActiveScanRecord::queued(&request),
                state: JobState::Queued,
                misses: 0,
            },
        );
    }

    async fn refresh_active(&mut self) -> Vec<ActiveScanRecord> {
        let ids = self.order.clone();
        let mut listing = Vec::with_capacity(ids.len());
        let mut finished = Vec::new();

        for job_id in ids {
            let observed = match self.job_store.get_snapshot(job_id).await {
                Ok(Some(snapshot)) => Observation::State(snapshot.state),
                Ok(None) => Observation::Missing,
                Err(e) => {
                    warn!(job_id = %job_id, error = %e, "Keeping last known state; job store read failed");
                    Observation::Unavailable
                }
            };

            let Some(tracked) = self.active.get_mut(&job_id) else {
                continue;
            };

            let retired = match observed {
                Observation::State(state) => {
                    tracked.misses = 0;
                    tracked.record.observe(&state, Utc::now());
                    let terminal = state.is_terminal();
                    tracked.state = state;
                    terminal
                }
                Observation::Missing => {
                    tracked.misses += 1;
                    if tracked.misses >= MAX_MISSING_READS {
                        warn!(job_id = %job_id, "Job snapshot expired before completion");
                        let state = JobState::Unknown {
                            raw: EXPIRED_STATE.to_string(),
                        };
                        tracked.record.observe(&state, Utc::now());
                        tracked.state = state;
                        true
                    } else {
                        false
                    }
                }
                Observation::Unavailable => false,
            };

            if retired {
                let now = Utc::now();
                let entry = CompletedLogEntry::from_terminal(&tracked.record, &tracked.state, now);
                self.completed.entry(job_id).or_insert(CompletedScan {
                    entry,
                    state: tracked.state.clone(),
                });
                finished.push(job_id);
            }

            listing.push(tracked.record.clone());
        }

        if !finished.is_empty() {
            self.order.retain(|id| !finished.contains(id));
            for job_id in &finished {
                self.active.remove(job_id);
            }
            info!(count = finished.len(), "Moved finished scans to completed log");
        }

        listing
    }

    fn list_completed(&self) -> Vec<CompletedLogEntry> {
        let mut entries: Vec<CompletedLogEntry> =
            self.completed.values().map(|c| c.entry.clone()).collect();
        entries.sort_by(|a, b| b.finished_at.cmp(&a.finished_at));
        entries
    }

    fn last_known(&self, job_id: Uuid) -> Option<JobState> {
        self.completed
            .get(&job_id)
            .map(|c| c.state.clone())
            .or_else(|| self.active.get(&job_id).map(|t| t.state.clone()))
    }

    async fn handle(&mut self, command: RegistryCommand) {
        // A dropped reply receiver only means the caller gave up waiting
        match command {
            RegistryCommand::Track { request, reply } => {
                self.track(request);
                let _ = reply.send(());
            }
            RegistryCommand::RefreshActive { reply } => {
                let listing = self.refresh_active().await;
                let _ = reply.send(listing);
            }
            RegistryCommand::ListCompleted { reply } => {
                let _ = reply.send(self.list_completed());
            }
            RegistryCommand::CompletedEntry { job_id, reply } => {
                let _ = reply.send(self.completed.get(&job_id).map(|c| c.entry.clone()));
            }
            RegistryCommand::LastKnown { job_id, reply } => {
                let _ = reply.send(self.last_known(job_id));
            }
        }
    }
}

/// Cloneable handle to the registry actor
#[derive(Clone)]
pub struct ScanRegistryHandle {
    sender: mpsc::Sender<RegistryCommand>,
}

impl ScanRegistryHandle {
    /// Spawn the registry actor. It stops when `shutdown` is cancelled or
    /// every handle has been dropped.
    pub fn spawn(job_store: Arc<dyn JobStore>, shutdown: CancellationToken) -> Self {
        let (sender, mut receiver) = mpsc::channel(COMMAND_BUFFER);
        let mut registry = ScanRegistry {
            job_store,
            order: Vec::new(),
            active: HashMap::new(),
            completed: HashMap::new(),
        };

        tokio::spawn(async move {
            debug!("Scan registry started");
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    command = receiver.recv() => match command {
                        Some(command) => registry.handle(command).await,
                        None => break,
                    },
                }
            }
            debug!("Scan registry stopped");
        });

        Self { sender }
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> RegistryCommand,
    ) -> Result<T, RegistryError> {
        let (reply, response) = oneshot::channel();
        self.sender
            .send(build(reply))
            .await
            .map_err(|_| RegistryError::Closed)?;
        response.await.map_err(|_| RegistryError::Closed)
    }

    pub async fn track(&self, request: ScanRequest) -> Result<(), RegistryError> {
        self.request(|reply| RegistryCommand::Track { request, reply })
            .await
    }

    /// Refresh and list active scans in submission order.
    ///
    /// A scan that reached a terminal state is listed one last time and then
    /// dropped from the active set.
    pub async fn refresh_active(&self) -> Result<Vec<ActiveScanRecord>, RegistryError> {
        self.request(|reply| RegistryCommand::RefreshActive { reply })
            .await
    }

    /// Completed log, newest first
    pub async fn list_completed(&self) -> Result<Vec<CompletedLogEntry>, RegistryError> {
        self.request(|reply| RegistryCommand::ListCompleted { reply })
            .await
    }

    pub async fn completed_entry(
        &self,
        job_id: Uuid,
    ) -> Result<Option<CompletedLogEntry>, RegistryError> {
        self.request(|reply| RegistryCommand::CompletedEntry { job_id, reply })
            .await
    }

    pub async fn last_known(&self, job_id: Uuid) -> Result<Option<JobState>, RegistryError> {
        self.request(|reply| RegistryCommand::LastKnown { job_id, reply })
            .await
    }
}
