// SDB - Shader Debugger
// Copyright (C) 2024 Zhuo Zhang and Wuqi Zhang
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Replay-side collaborator and background population of debug states.
//!
//! The replay controller produces states in batches until it returns an empty
//! batch. [`Population`] drains it on a blocking worker while the session keeps
//! answering commands. The trace handle is freed exactly once: by the worker if
//! population fails or is cancelled, by whoever ends up owning the states
//! otherwise.

use std::{
    collections::VecDeque,
    fmt,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc,
    },
};

use eyre::Result;
use parking_lot::Mutex;
use sdb_common::types::{ShaderDebugState, TraceHandle};
use serde::Serialize;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::{DebugError, DebugResult};

/// Replay-side source of debug states.
pub trait ReplayController: Send + Sync {
    /// Produce the next batch of states. An empty batch signals completion.
    fn continue_debug(&self, trace: TraceHandle) -> Result<Vec<ShaderDebugState>>;

    /// Release the replay-side resources of a trace.
    fn free_trace(&self, trace: TraceHandle);
}

/// Replay controller serving pre-recorded states in fixed-size batches.
pub struct RecordedReplay {
    batches: Mutex<VecDeque<Vec<ShaderDebugState>>>,
    freed: AtomicUsize,
}

impl RecordedReplay {
    /// Serve `states` in batches of `batch_size` (at least one state per batch).
    pub fn new(states: Vec<ShaderDebugState>, batch_size: usize) -> Self {
        let batch_size = batch_size.max(1);
        let mut batches = VecDeque::new();
        let mut states = states.into_iter().peekable();
        while states.peek().is_some() {
            batches.push_back(states.by_ref().take(batch_size).collect());
        }
        Self { batches: Mutex::new(batches), freed: AtomicUsize::new(0) }
    }

    /// How many times [`ReplayController::free_trace`] was called.
    pub fn freed_count(&self) -> usize {
        self.freed.load(Ordering::SeqCst)
    }
}

impl fmt::Debug for RecordedReplay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordedReplay")
            .field("pending_batches", &self.batches.lock().len())
            .field("freed", &self.freed_count())
            .finish()
    }
}

impl ReplayController for RecordedReplay {
    fn continue_debug(&self, _trace: TraceHandle) -> Result<Vec<ShaderDebugState>> {
        Ok(self.batches.lock().pop_front().unwrap_or_default())
    }

    fn free_trace(&self, trace: TraceHandle) {
        debug!(%trace, "freeing recorded trace");
        self.freed.fetch_add(1, Ordering::SeqCst);
    }
}

/// Progress of a background population.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PopulationProgress {
    /// Non-empty batches received
    pub batches: usize,
    /// States received so far
    pub states: usize,
    /// Whether the worker has stopped
    pub finished: bool,
}

type PopulationResult = DebugResult<Vec<ShaderDebugState>>;

/// A running background population.
pub struct Population {
    controller: Arc<dyn ReplayController>,
    trace: TraceHandle,
    cancel: Arc<AtomicBool>,
    progress: Arc<Mutex<PopulationProgress>>,
    rx: Option<oneshot::Receiver<PopulationResult>>,
}

impl fmt::Debug for Population {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Population")
            .field("trace", &self.trace)
            .field("progress", &self.progress())
            .field("taken", &self.rx.is_none())
            .finish()
    }
}

impl Population {
    /// Start draining `controller` on a blocking worker of the current runtime.
    pub fn start(
        controller: Arc<dyn ReplayController>,
        trace: TraceHandle,
        log_interval: usize,
    ) -> DebugResult<Self> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| DebugError::SessionUnavailable(format!("no async runtime: {e}")))?;

        let cancel = Arc::new(AtomicBool::new(false));
        let progress = Arc::new(Mutex::new(PopulationProgress::default()));
        let (tx, rx) = oneshot::channel();

        let worker = Worker {
            controller: controller.clone(),
            trace,
            cancel: cancel.clone(),
            progress: progress.clone(),
            log_interval: log_interval.max(1),
        };
        runtime.spawn_blocking(move || worker.run(tx));

        info!(%trace, "started populating debug states");
        Ok(Self { controller, trace, cancel, progress, rx: Some(rx) })
    }

    /// Trace being populated.
    pub fn trace(&self) -> TraceHandle {
        self.trace
    }

    /// Snapshot of the progress counters.
    pub fn progress(&self) -> PopulationProgress {
        *self.progress.lock()
    }

    /// Ask the worker to stop at its next iteration.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Release);
    }

    /// Take the result if the worker has finished.
    ///
    /// On `Ok` the caller owns the trace handle and must free it.
    pub fn try_take(&mut self) -> Option<PopulationResult> {
        let rx = self.rx.as_mut()?;
        let result = match rx.try_recv() {
            Ok(result) => result,
            Err(oneshot::error::TryRecvError::Empty) => return None,
            Err(oneshot::error::TryRecvError::Closed) => {
                Err(DebugError::Replay("population worker stopped unexpectedly".to_string()))
            }
        };
        self.rx = None;
        Some(result)
    }

    /// Wait for the worker to finish.
    ///
    /// On `Ok` the caller owns the trace handle and must free it.
    pub async fn wait(&mut self) -> PopulationResult {
        let Some(rx) = self.rx.as_mut() else {
            return Err(DebugError::Replay("population result already taken".to_string()));
        };
        let result = rx.await.unwrap_or_else(|_| {
            Err(DebugError::Replay("population worker stopped unexpectedly".to_string()))
        });
        self.rx = None;
        result
    }
}

impl Drop for Population {
    fn drop(&mut self) {
        let Some(mut rx) = self.rx.take() else {
            return;
        };
        self.cancel();
        rx.close();
        // states delivered before the channel closed are ours to free
        if let Ok(Ok(_)) = rx.try_recv() {
            self.controller.free_trace(self.trace);
        }
    }
}

struct Worker {
    controller: Arc<dyn ReplayController>,
    trace: TraceHandle,
    cancel: Arc<AtomicBool>,
    progress: Arc<Mutex<PopulationProgress>>,
    log_interval: usize,
}

impl Worker {
    fn run(self, tx: oneshot::Sender<PopulationResult>) {
        let result = self.populate();
        match &result {
            Ok(states) => info!(trace = %self.trace, states = states.len(), "debug states populated"),
            Err(err) => {
                warn!(trace = %self.trace, %err, "population stopped, freeing trace");
                self.controller.free_trace(self.trace);
            }
        }

        if let Err(Ok(_)) = tx.send(result) {
            debug!(trace = %self.trace, "population result dropped, freeing trace");
            self.controller.free_trace(self.trace);
        }
        self.progress.lock().finished = true;
    }

    fn populate(&self) -> PopulationResult {
        let mut states = Vec::new();
        loop {
            if self.cancel.load(Ordering::Acquire) {
                return Err(DebugError::Cancelled);
            }
            let batch = self
                .controller
                .continue_debug(self.trace)
                .map_err(|e| DebugError::Replay(format!("{e:#}")))?;
            if batch.is_empty() {
                return Ok(states);
            }
            states.extend(batch);

            let mut progress = self.progress.lock();
            progress.batches += 1;
            progress.states = states.len();
            if progress.batches % self.log_interval == 0 {
                info!(batches = progress.batches, states = progress.states, "populating debug states");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn states(n: u32) -> Vec<ShaderDebugState> {
        (0..n).map(|i| ShaderDebugState { step_index: i, ..Default::default() }).collect()
    }

    /// Never finishes, one state per batch.
    #[derive(Default)]
    struct Endless {
        freed: AtomicUsize,
    }

    impl ReplayController for Endless {
        fn continue_debug(&self, _trace: TraceHandle) -> Result<Vec<ShaderDebugState>> {
            std::thread::sleep(Duration::from_millis(1));
            Ok(states(1))
        }

        fn free_trace(&self, _trace: TraceHandle) {
            self.freed.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct Failing {
        freed: AtomicUsize,
    }

    impl ReplayController for Failing {
        fn continue_debug(&self, _trace: TraceHandle) -> Result<Vec<ShaderDebugState>> {
            eyre::bail!("device lost")
        }

        fn free_trace(&self, _trace: TraceHandle) {
            self.freed.fetch_add(1, Ordering::SeqCst);
        }
    }

    async fn wait_finished(population: &Population) {
        while !population.progress().finished {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    }

    #[test]
    fn test_recorded_batches() {
        let replay = RecordedReplay::new(states(5), 2);
        let sizes: Vec<usize> = std::iter::from_fn(|| {
            let batch = replay.continue_debug(TraceHandle(1)).ok()?;
            (!batch.is_empty()).then_some(batch.len())
        })
        .collect();
        assert_eq!(sizes, vec![2, 2, 1]);
    }

    #[tokio::test]
    async fn test_population_completes_without_freeing() {
        let replay = Arc::new(RecordedReplay::new(states(10), 3));
        let mut population = Population::start(replay.clone(), TraceHandle(1), 1).unwrap();

        let result = population.wait().await.unwrap();
        assert_eq!(result.len(), 10);
        wait_finished(&population).await;
        assert_eq!(population.progress(), PopulationProgress { batches: 4, states: 10, finished: true });

        drop(population);
        assert_eq!(replay.freed_count(), 0);
    }

    #[tokio::test]
    async fn test_cancel_frees_once() {
        let replay = Arc::new(Endless::default());
        let mut population = Population::start(replay.clone(), TraceHandle(2), 64).unwrap();
        while population.progress().states == 0 {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }

        population.cancel();
        assert_eq!(population.wait().await, Err(DebugError::Cancelled));
        drop(population);
        assert_eq!(replay.freed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failure_frees_once() {
        let replay = Arc::new(Failing { freed: AtomicUsize::new(0) });
        let mut population = Population::start(replay.clone(), TraceHandle(3), 64).unwrap();

        let err = population.wait().await.unwrap_err();
        assert!(matches!(err, DebugError::Replay(ref msg) if msg.contains("device lost")));
        assert_eq!(replay.freed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_drop_untaken_result_frees_once() {
        let replay = Arc::new(RecordedReplay::new(states(4), 4));
        let population = Population::start(replay.clone(), TraceHandle(4), 64).unwrap();
        wait_finished(&population).await;

        drop(population);
        assert_eq!(replay.freed_count(), 1);
    }

    #[tokio::test]
    async fn test_try_take() {
        let replay = Arc::new(RecordedReplay::new(states(2), 1));
        let mut population = Population::start(replay.clone(), TraceHandle(5), 64).unwrap();
        wait_finished(&population).await;

        assert_eq!(population.try_take().map(|r| r.map(|s| s.len())), Some(Ok(2)));
        assert!(population.try_take().is_none());
    }

    #[test]
    fn test_start_requires_runtime() {
        let replay = Arc::new(RecordedReplay::new(states(1), 1));
        let err = Population::start(replay, TraceHandle(6), 64).unwrap_err();
        assert!(matches!(err, DebugError::SessionUnavailable(_)));
    }
}
