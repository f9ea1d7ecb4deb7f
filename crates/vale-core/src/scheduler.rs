//! Background generation scheduling.
//!
//! A bounded pool of worker threads consumes generation tasks from a
//! shared queue and posts finished height fields and meshes onto two
//! independent completion channels. The owning streamer calls
//! [`GenScheduler::drain`] once per tick to pull everything that has
//! completed; all chunk state stays on the caller's thread.
//!
//! Failure semantics: a task that panics is caught and logged, and its
//! result is simply never posted. The affected request stalls; there is
//! no retry or timeout. The pool itself survives.

use std::collections::VecDeque;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;

use crate::chunk::ChunkCoord;
use crate::config::GenerationParams;
use crate::heightfield::HeightField;
use crate::mesh::{self, MeshData, MeshParams};
use crate::noise;

/// Shared cancellation flag for one request. Cancelling is advisory: a
/// worker checks the token before starting the task, so a task already
/// running completes and its result is still delivered.
#[derive(Debug, Clone)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

/// A completed height field generation.
pub struct FieldResult {
    pub coord: ChunkCoord,
    pub field: HeightField,
}

/// A completed mesh build.
pub struct MeshResult {
    pub coord: ChunkCoord,
    pub lod: usize,
    pub mesh: MeshData,
}

enum Task {
    Field {
        coord: ChunkCoord,
        width: usize,
        height: usize,
        params: GenerationParams,
        cancel: CancelToken,
    },
    Mesh {
        coord: ChunkCoord,
        lod: usize,
        field: Arc<HeightField>,
        params: Arc<MeshParams>,
        cancel: CancelToken,
    },
}

struct TaskQueue {
    tasks: VecDeque<Task>,
    closed: bool,
}

type SharedQueue = Arc<(Mutex<TaskQueue>, Condvar)>;

fn push_task(queue: &SharedQueue, task: Task) {
    let (lock, cvar) = &**queue;
    let mut state = lock.lock().unwrap();
    state.tasks.push_back(task);
    cvar.notify_one();
}

fn next_task(queue: &SharedQueue) -> Option<Task> {
    let (lock, cvar) = &**queue;
    let mut state = lock.lock().unwrap();
    loop {
        if let Some(task) = state.tasks.pop_front() {
            return Some(task);
        }
        if state.closed {
            return None;
        }
        state = cvar.wait(state).unwrap();
    }
}

/// Cumulative request counters, exposed for harness reporting and for
/// asserting the one-request-per-(chunk, LOD) invariant in tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    pub field_requests: u64,
    pub mesh_requests: u64,
}

/// Bounded worker pool plus the two completion channels.
pub struct GenScheduler {
    queue: SharedQueue,
    workers: Vec<JoinHandle<()>>,
    field_rx: Receiver<FieldResult>,
    mesh_rx: Receiver<MeshResult>,
    stats: SchedulerStats,
}

impl GenScheduler {
    /// Spawn `workers` generation threads. The pool size is fixed for
    /// the scheduler's lifetime.
    pub fn new(workers: usize) -> Self {
        let queue: SharedQueue = Arc::new((
            Mutex::new(TaskQueue { tasks: VecDeque::new(), closed: false }),
            Condvar::new(),
        ));
        let (field_tx, field_rx) = channel();
        let (mesh_tx, mesh_rx) = channel();

        let handles = (0..workers)
            .map(|i| {
                let queue = Arc::clone(&queue);
                let field_tx: Sender<FieldResult> = field_tx.clone();
                let mesh_tx: Sender<MeshResult> = mesh_tx.clone();
                std::thread::Builder::new()
                    .name(format!("vale-gen-{i}"))
                    .spawn(move || worker_loop(queue, field_tx, mesh_tx))
                    .expect("failed to spawn generation worker")
            })
            .collect();

        log::info!("generation pool started with {workers} workers");
        Self {
            queue,
            workers: handles,
            field_rx,
            mesh_rx,
            stats: SchedulerStats::default(),
        }
    }

    /// Queue background generation of a chunk's height field. Returns
    /// immediately; the result arrives through [`drain`](Self::drain).
    pub fn request_height_field(
        &mut self,
        coord: ChunkCoord,
        width: usize,
        height: usize,
        params: GenerationParams,
    ) -> CancelToken {
        let cancel = CancelToken::new();
        log::debug!("requesting height field for chunk ({}, {})", coord.x, coord.z);
        push_task(
            &self.queue,
            Task::Field { coord, width, height, params, cancel: cancel.clone() },
        );
        self.stats.field_requests += 1;
        cancel
    }

    /// Queue background mesh construction for one (chunk, LOD) pair.
    pub fn request_mesh(
        &mut self,
        coord: ChunkCoord,
        lod: usize,
        field: Arc<HeightField>,
        params: Arc<MeshParams>,
    ) -> CancelToken {
        let cancel = CancelToken::new();
        log::debug!("requesting lod {lod} mesh for chunk ({}, {})", coord.x, coord.z);
        push_task(
            &self.queue,
            Task::Mesh { coord, lod, field, params, cancel: cancel.clone() },
        );
        self.stats.mesh_requests += 1;
        cancel
    }

    /// Pull every completed result off both channels, in arrival order.
    /// Called once per streamer tick; the caller applies the results
    /// synchronously on its own thread.
    pub fn drain(&mut self) -> (Vec<FieldResult>, Vec<MeshResult>) {
        let fields: Vec<FieldResult> = self.field_rx.try_iter().collect();
        let meshes: Vec<MeshResult> = self.mesh_rx.try_iter().collect();
        (fields, meshes)
    }

    pub fn stats(&self) -> SchedulerStats {
        self.stats
    }
}

impl Drop for GenScheduler {
    fn drop(&mut self) {
        {
            let (lock, cvar) = &*self.queue;
            let mut state = lock.lock().unwrap();
            state.closed = true;
            state.tasks.clear();
            cvar.notify_all();
        }
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
    }
}

fn worker_loop(
    queue: SharedQueue,
    field_tx: Sender<FieldResult>,
    mesh_tx: Sender<MeshResult>,
) {
    while let Some(task) = next_task(&queue) {
        match task {
            Task::Field { coord, width, height, params, cancel } => {
                if cancel.is_cancelled() {
                    continue;
                }
                let outcome =
                    catch_unwind(AssertUnwindSafe(|| noise::generate(width, height, &params)));
                match outcome {
                    Ok(field) => {
                        // Send only fails when the scheduler is gone.
                        let _ = field_tx.send(FieldResult { coord, field });
                    }
                    Err(_) => log::error!(
                        "height field generation panicked for chunk ({}, {}); request stalls",
                        coord.x,
                        coord.z
                    ),
                }
            }
            Task::Mesh { coord, lod, field, params, cancel } => {
                if cancel.is_cancelled() {
                    continue;
                }
                let outcome =
                    catch_unwind(AssertUnwindSafe(|| mesh::build(&field, &params, lod as u32)));
                match outcome {
                    Ok(mesh) => {
                        let _ = mesh_tx.send(MeshResult { coord, lod, mesh });
                    }
                    Err(_) => log::error!(
                        "mesh build panicked for chunk ({}, {}) lod {lod}; request stalls",
                        coord.x,
                        coord.z
                    ),
                }
            }
        }
    }
}
