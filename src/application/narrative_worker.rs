//! Background narrative worker.
//!
//! Runs a (possibly slow, possibly remote) synthesizer on its own thread and
//! waits at most `timeout` for the reply. A late reply is discarded; the
//! thread finishes on its own and its result goes nowhere.

use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::ports::{NarrativeError, NarrativeRequest, NarrativeSynthesizer};

/// Bounded-time wrapper around a [`NarrativeSynthesizer`].
#[derive(Clone)]
pub struct NarrativeWorker {
    synthesizer: Arc<dyn NarrativeSynthesizer>,
    timeout: Duration,
}

impl std::fmt::Debug for NarrativeWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NarrativeWorker")
            .field("synthesizer", &self.synthesizer.name())
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl NarrativeWorker {
    #[must_use]
    pub fn new(synthesizer: Arc<dyn NarrativeSynthesizer>, timeout: Duration) -> Self {
        Self {
            synthesizer,
            timeout,
        }
    }

    /// Run the synthesizer in the background and wait for its reply.
    ///
    /// # Errors
    /// Returns the synthesizer's error, [`NarrativeError::Timeout`] when no
    /// reply arrives in time, or `Http` if the worker thread could not start.
    pub fn run(&self, request: NarrativeRequest) -> Result<String, NarrativeError> {
        let (tx, rx) = mpsc::channel();
        let synthesizer = Arc::clone(&self.synthesizer);

        thread::Builder::new()
            .name("narrative".into())
            .spawn(move || {
                let result = synthesizer.synthesize(&request);
                // Receiver is gone after a timeout.
                let _ = tx.send(result);
            })
            .map_err(|e| NarrativeError::Http(format!("failed to spawn worker: {e}")))?;

        match rx.recv_timeout(self.timeout) {
            Ok(result) => result,
            Err(mpsc::RecvTimeoutError::Timeout) => Err(NarrativeError::Timeout(self.timeout)),
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                Err(NarrativeError::Http("narrative worker exited without a reply".into()))
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::domain::{CanonicalPatientRecord, PredictionResult, PredictionSource};

    /// Synthesizer that sleeps, then answers or fails.
    pub(crate) struct StubNarrative {
        pub delay: Duration,
        pub reply: Option<&'static str>,
    }

    impl NarrativeSynthesizer for StubNarrative {
        fn synthesize(&self, _request: &NarrativeRequest) -> Result<String, NarrativeError> {
            thread::sleep(self.delay);
            self.reply
                .map(str::to_string)
                .ok_or(NarrativeError::Status(503))
        }

        fn name(&self) -> &'static str {
            "stub"
        }
    }

    fn request() -> NarrativeRequest {
        NarrativeRequest {
            record: CanonicalPatientRecord::default(),
            result: PredictionResult::new(10.0, None, Vec::new(), PredictionSource::Fallback),
        }
    }

    #[test]
    fn test_reply_within_timeout() {
        let worker = NarrativeWorker::new(
            Arc::new(StubNarrative {
                delay: Duration::ZERO,
                reply: Some("take care"),
            }),
            Duration::from_secs(5),
        );
        assert_eq!(worker.run(request()).expect("reply"), "take care");
    }

    #[test]
    fn test_slow_reply_times_out() {
        let worker = NarrativeWorker::new(
            Arc::new(StubNarrative {
                delay: Duration::from_millis(500),
                reply: Some("too late"),
            }),
            Duration::from_millis(20),
        );
        let err = worker.run(request()).expect_err("timeout");
        assert!(matches!(err, NarrativeError::Timeout(_)));
    }

    #[test]
    fn test_failure_is_propagated() {
        let worker = NarrativeWorker::new(
            Arc::new(StubNarrative {
                delay: Duration::ZERO,
                reply: None,
            }),
            Duration::from_secs(5),
        );
        assert!(matches!(
            worker.run(request()),
            Err(NarrativeError::Status(503))
        ));
    }
}
