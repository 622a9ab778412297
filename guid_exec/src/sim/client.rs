//! Background thread running the simulator at the fix rate

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};
use chrono::Utc;
use log::{debug, error, info};
use thiserror::Error;

use super::{SimParams, Simulator};
use crate::fix_handoff::FixSender;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Runs a [`Simulator`] on its own thread, sending one fix per period into the fix channel.
///
/// The thread stops when the client is stopped or dropped, or when the receiver goes away.
pub struct SimClient {
    bg_jh: Option<JoinHandle<()>>,
    bg_run: Arc<AtomicBool>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum SimClientError {
    #[error("The fix rate must be positive, got {0} Hz")]
    InvalidRate(f64),

    #[error("Could not spawn the simulator thread: {0}")]
    SpawnError(std::io::Error),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl SimClient {
    /// Start the simulator thread.
    pub fn new(
        params: SimParams,
        fix_rate_hz: f64,
        sender: FixSender,
    ) -> Result<Self, SimClientError> {
        if !fix_rate_hz.is_finite() || fix_rate_hz <= 0.0 {
            return Err(SimClientError::InvalidRate(fix_rate_hz));
        }

        let bg_run = Arc::new(AtomicBool::new(true));
        let bg_run_clone = bg_run.clone();

        let sim = Simulator::new(params, Utc::now());
        let period = Duration::from_secs_f64(1.0 / fix_rate_hz);

        let bg_jh = thread::Builder::new()
            .name("sim_client".into())
            .spawn(move || bg_thread(sim, period, sender, bg_run_clone))
            .map_err(SimClientError::SpawnError)?;

        info!("Simulator started at {:.1} Hz", fix_rate_hz);

        Ok(Self {
            bg_jh: Some(bg_jh),
            bg_run,
        })
    }

    /// Returns true while the background thread is producing fixes.
    pub fn is_running(&self) -> bool {
        self.bg_run.load(Ordering::Relaxed)
    }

    /// Stop the background thread and wait for it to finish.
    pub fn stop(&mut self) {
        self.bg_run.store(false, Ordering::Relaxed);

        if let Some(jh) = self.bg_jh.take() {
            if jh.join().is_err() {
                error!("The simulator thread panicked");
            }
            debug!("Simulator stopped");
        }
    }
}

impl Drop for SimClient {
    fn drop(&mut self) {
        self.stop();
    }
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

fn bg_thread(mut sim: Simulator, period: Duration, sender: FixSender, run: Arc<AtomicBool>) {
    let dt_s = period.as_secs_f64();

    while run.load(Ordering::Relaxed) {
        let start = Instant::now();

        if sender.send(sim.step(dt_s)).is_err() {
            debug!("Fix receiver dropped, stopping the simulator");
            run.store(false, Ordering::Relaxed);
            break;
        }

        if let Some(d) = period.checked_sub(start.elapsed()) {
            thread::sleep(d);
        }
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::fix_handoff::fix_channel;
    use crate::sim::test::test_params;

    #[test]
    fn test_produces_fixes() {
        let (tx, mut rx) = fix_channel();
        let mut client = SimClient::new(test_params(), 50.0, tx).unwrap();
        assert!(client.is_running());

        thread::sleep(Duration::from_millis(200));
        client.stop();
        assert!(!client.is_running());

        let first = rx.latest().unwrap();
        assert!(first.is_some());
        assert!(rx.num_skipped() > 0);

        // The thread is gone, so the channel reports the disconnect
        assert!(rx.latest().is_err());
    }

    #[test]
    fn test_invalid_rate() {
        let (tx, _rx) = fix_channel();
        assert!(matches!(
            SimClient::new(test_params(), 0.0, tx),
            Err(SimClientError::InvalidRate(_))
        ));
    }

    #[test]
    fn test_stops_when_receiver_dropped() {
        let (tx, rx) = fix_channel();
        let client = SimClient::new(test_params(), 50.0, tx).unwrap();
        drop(rx);

        thread::sleep(Duration::from_millis(100));
        assert!(!client.is_running());
    }
}
