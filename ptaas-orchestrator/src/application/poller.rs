//! Bounded polling of long-running scanner sub-phases
//!
//! Each sub-phase (crawl, active probe) is driven as a small state machine:
//! poll the scanner, publish progress mapped into the phase's band, then wait
//! one tick. A phase that has not reached 100% after `max_polls` polls fails
//! with [`ScanError::Timeout`].

use std::future::Future;
use std::time::Duration;

use tracing::debug;

use super::workflow::JobContext;
use crate::domain::errors::ScanError;

/// Slice of the overall 0–100 progress scale owned by a sub-phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressBand {
    pub start: u8,
    pub span: u8,
}

impl ProgressBand {
    pub const fn new(start: u8, span: u8) -> Self {
        Self { start, span }
    }

    /// Map a phase-local percentage into overall progress.
    pub fn map(&self, percent: u8) -> u8 {
        let percent = u16::from(percent.min(100));
        let mapped = u16::from(self.start) + percent * u16::from(self.span) / 100;
        mapped.min(100) as u8
    }
}

/// Configuration of one polled sub-phase
#[derive(Debug, Clone)]
pub struct PollPhase {
    /// Status prefix, e.g. `Crawl`
    pub label: &'static str,
    pub band: ProgressBand,
    pub interval: Duration,
    pub max_polls: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PollState {
    Polling { attempt: u32 },
    Waiting { attempt: u32 },
    Complete { polls: u32 },
}

/// Drive `poll` until it reports 100%.
///
/// Returns the number of polls performed.
pub async fn poll_until_complete<F, Fut>(
    ctx: &JobContext,
    phase: &PollPhase,
    mut poll: F,
) -> Result<u32, ScanError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<u8, ScanError>>,
{
    let mut state = PollState::Polling { attempt: 1 };

    loop {
        state = match state {
            PollState::Polling { attempt } => {
                let percent = ctx.interruptible(poll()).await?.min(100);
                ctx.checkpoint(
                    phase.band.map(percent),
                    &format!("{}: {}%", phase.label, percent),
                )
                .await?;

                debug!(job_id = %ctx.job_id, phase = phase.label, attempt, percent, "Polled scanner");

                if percent >= 100 {
                    PollState::Complete { polls: attempt }
                } else if attempt >= phase.max_polls {
                    return Err(ScanError::Timeout {
                        phase: phase.label.to_string(),
                        polls: attempt,
                    });
                } else {
                    PollState::Waiting { attempt }
                }
            }
            PollState::Waiting { attempt } => {
                ctx.sleep(phase.interval).await?;
                PollState::Polling {
                    attempt: attempt + 1,
                }
            }
            PollState::Complete { polls } => return Ok(polls),
        };
    }
}
