//! Tone worker ("tone-player" thread)
//!
//! Second consumer of the playback core: renders queued [`ToneJob`]s and
//! plays them under the same exclusive playback lock as samples.

use super::{ToneJob, ToneSynth};
use crate::error::Result;
use crate::playback::coordinator::{spawn_consumer, PlaybackCore};
use crate::playback::queue::PlaybackQueue;
use crate::playback::request::PlaybackRequest;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use tracing::{debug, error, info};

pub struct ToneWorker {
    queue: Arc<PlaybackQueue<ToneJob>>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl ToneWorker {
    pub const THREAD_NAME: &'static str = "tone-player";

    pub fn start(core: Arc<PlaybackCore>) -> Result<Self> {
        let queue = Arc::new(PlaybackQueue::new());

        let handle = spawn_consumer(Self::THREAD_NAME, Arc::clone(&queue), move |job: ToneJob, queue| {
            let buffer = match ToneSynth::render(&job) {
                Ok(buffer) => buffer,
                Err(e) => {
                    error!("Failed to render {}: {}", job, e);
                    return;
                }
            };

            let request = PlaybackRequest::tone(buffer);
            debug!("Rendered {} as request {}", job, request.id);
            if let Err(e) = core.play(&request, queue) {
                error!("Dropped tone request {} ({}): {}", request.id, job, e);
            }
        })?;

        info!("Tone worker started");
        Ok(Self {
            queue,
            thread: Mutex::new(Some(handle)),
        })
    }

    pub fn enqueue(&self, job: ToneJob) {
        debug!("Enqueued {}", job);
        self.queue.push(job);
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    pub fn shutdown(&self) {
        info!("Shutting down tone worker");
        self.queue.shutdown();

        let handle = self.thread.lock().unwrap_or_else(|p| p.into_inner()).take();
        if let Some(handle) = handle {
            if let Err(e) = handle.join() {
                error!("{} join failed: {:?}", Self::THREAD_NAME, e);
            }
        }
    }
}
