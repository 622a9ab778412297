//! # Fix handoff
//!
//! Single producer, single consumer channel between the positioning parser (or the simulator)
//! and the control loop. The loop only ever wants the newest fix, so the receiver drains the
//! channel and hands back the latest one, counting the fixes it had to skip.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::sync::mpsc::{channel, Receiver, SendError, Sender, TryRecvError};
use log::debug;
use thiserror::Error;

use comms_if::eqpt::gnss::RawFix;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Sending half, owned by the fix source.
pub struct FixSender {
    tx: Sender<RawFix>,
}

/// Receiving half, owned by the control loop.
pub struct FixReceiver {
    rx: Receiver<RawFix>,
    num_skipped: u64,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, Error, PartialEq)]
pub enum HandoffError {
    #[error("The other end of the fix channel has been dropped")]
    Disconnected,
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Create a new fix channel.
pub fn fix_channel() -> (FixSender, FixReceiver) {
    let (tx, rx) = channel();

    (FixSender { tx }, FixReceiver { rx, num_skipped: 0 })
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl FixSender {
    /// Hand a fix to the control loop, never blocks.
    pub fn send(&self, fix: RawFix) -> Result<(), HandoffError> {
        self.tx
            .send(fix)
            .map_err(|_: SendError<RawFix>| HandoffError::Disconnected)
    }
}

impl FixReceiver {
    /// Take the newest fix, discarding any older ones still waiting.
    ///
    /// Returns `Ok(None)` if no fix arrived since the last call, and an error once the sender
    /// has gone and every fix has been read.
    pub fn latest(&mut self) -> Result<Option<RawFix>, HandoffError> {
        let mut latest = None;

        loop {
            match self.rx.try_recv() {
                Ok(fix) => {
                    if latest.replace(fix).is_some() {
                        self.num_skipped += 1;
                    }
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    if latest.is_none() {
                        return Err(HandoffError::Disconnected);
                    }
                    break;
                }
            }
        }

        if latest.is_some() && self.num_skipped > 0 {
            debug!("{} fixes skipped in total", self.num_skipped);
        }

        Ok(latest)
    }

    /// Total number of fixes discarded because a newer one was available.
    pub fn num_skipped(&self) -> u64 {
        self.num_skipped
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn fix(ms: i64) -> RawFix {
        RawFix::local(Utc.timestamp_millis(ms), 0.0, 0.0, None, None)
    }

    #[test]
    fn test_latest_wins() {
        let (tx, mut rx) = fix_channel();
        assert!(rx.latest().unwrap().is_none());

        tx.send(fix(1)).unwrap();
        tx.send(fix(2)).unwrap();
        tx.send(fix(3)).unwrap();

        let latest = rx.latest().unwrap().unwrap();
        assert_eq!(latest.timestamp, Some(Utc.timestamp_millis(3)));
        assert_eq!(rx.num_skipped(), 2);
        assert!(rx.latest().unwrap().is_none());
    }

    #[test]
    fn test_across_threads() {
        let (tx, mut rx) = fix_channel();

        let handle = std::thread::spawn(move || {
            for i in 0..100 {
                tx.send(fix(i)).unwrap();
            }
        });
        handle.join().unwrap();

        let latest = rx.latest().unwrap().unwrap();
        assert_eq!(latest.timestamp, Some(Utc.timestamp_millis(99)));

        // The sender is gone and everything has been read
        assert_eq!(rx.latest().err(), Some(HandoffError::Disconnected));
    }

    #[test]
    fn test_receiver_dropped() {
        let (tx, rx) = fix_channel();
        drop(rx);
        assert_eq!(tx.send(fix(0)), Err(HandoffError::Disconnected));
    }
}
