//! Integration tests for the playback coordinator
//!
//! Tests cover:
//! - FIFO order from a single producer
//! - Mutual exclusion between the sample and tone consumers
//! - Decode failures not blocking the queue
//! - Ducking restored once per burst
//! - Sink failures releasing the playback lock

use soundboard::audio::{AudioBuffer, AudioSink, PcmAudio, PcmFormat};
use soundboard::ducking::{BackgroundPlayer, DisabledPlayer, DuckingController, PlayerState, PlayerStatus};
use soundboard::playback::{Coordinator, PlaybackCore, PlaybackQueue, PlaybackRequest};
use soundboard::tones::{ToneJob, ToneWorker, Waveform};
use soundboard::{Error, Result};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

/// In-memory sink recording the first sample of every write
#[derive(Clone, Default)]
struct RecordingSink {
    writes: Arc<Mutex<Vec<i16>>>,
    active: Arc<AtomicUsize>,
    max_active: Arc<AtomicUsize>,
    hold: Duration,
    /// Writes still to be rejected before the sink recovers
    failures: Arc<AtomicUsize>,
}

impl RecordingSink {
    fn holding(hold: Duration) -> Self {
        Self {
            hold,
            ..Self::default()
        }
    }

    fn failing(failures: usize) -> Self {
        Self {
            failures: Arc::new(AtomicUsize::new(failures)),
            ..Self::default()
        }
    }

    fn writes(&self) -> Vec<i16> {
        self.writes.lock().unwrap().clone()
    }
}

impl AudioSink for RecordingSink {
    fn write(&mut self, buffer: &AudioBuffer) -> Result<()> {
        let remaining = self.failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures.store(remaining - 1, Ordering::SeqCst);
            return Err(Error::Sink("device unplugged".to_string()));
        }

        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);
        thread::sleep(self.hold);
        self.writes.lock().unwrap().push(buffer.samples()[0]);
        self.active.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Background player with a settable volume that records every write
struct FakePlayer {
    volume: Mutex<u8>,
    state: Mutex<PlayerState>,
    writes: Mutex<Vec<u8>>,
    toggles: AtomicUsize,
}

impl FakePlayer {
    fn at(volume: u8) -> Arc<Self> {
        Arc::new(Self {
            volume: Mutex::new(volume),
            state: Mutex::new(PlayerState::Play),
            writes: Mutex::new(Vec::new()),
            toggles: AtomicUsize::new(0),
        })
    }
}

impl BackgroundPlayer for FakePlayer {
    fn status(&self) -> Result<PlayerStatus> {
        Ok(PlayerStatus {
            state: *self.state.lock().unwrap(),
            volume: Some(*self.volume.lock().unwrap()),
        })
    }

    fn set_volume(&self, volume: u8) -> Result<()> {
        *self.volume.lock().unwrap() = volume;
        self.writes.lock().unwrap().push(volume);
        Ok(())
    }

    fn toggle_pause(&self) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        *state = match *state {
            PlayerState::Play => PlayerState::Pause,
            _ => PlayerState::Play,
        };
        self.toggles.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

fn marked(value: i16) -> PlaybackRequest {
    PlaybackRequest::pcm(PcmAudio::new(vec![value; 8], PcmFormat::CANONICAL))
}

fn core_with(sink: RecordingSink, player: Arc<dyn BackgroundPlayer>) -> Arc<PlaybackCore> {
    Arc::new(PlaybackCore::new(
        Box::new(sink),
        DuckingController::new(player, 30, 5, Duration::ZERO),
    ))
}

fn wait_for(mut done: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !done() {
        assert!(Instant::now() < deadline, "timed out waiting for playback");
        thread::sleep(Duration::from_millis(5));
    }
}

#[test]
fn test_single_producer_order_is_preserved() {
    let sink = RecordingSink::default();
    let coordinator = Coordinator::start(core_with(sink.clone(), Arc::new(DisabledPlayer))).unwrap();

    for value in 1..=10 {
        coordinator.enqueue(marked(value));
    }

    wait_for(|| sink.writes().len() == 10);
    assert_eq!(sink.writes(), (1..=10).collect::<Vec<i16>>());
    coordinator.shutdown();
}

#[test]
fn test_sample_and_tone_consumers_never_overlap() {
    let sink = RecordingSink::holding(Duration::from_millis(2));
    let core = core_with(sink.clone(), Arc::new(DisabledPlayer));
    let coordinator = Arc::new(Coordinator::start(Arc::clone(&core)).unwrap());
    let tones = Arc::new(ToneWorker::start(core).unwrap());

    let samples_producer = {
        let coordinator = Arc::clone(&coordinator);
        thread::spawn(move || {
            for value in 1..=20 {
                coordinator.enqueue(marked(value));
            }
        })
    };
    let tones_producer = {
        let tones = Arc::clone(&tones);
        thread::spawn(move || {
            for _ in 0..20 {
                tones.enqueue(ToneJob::tone(Waveform::Square, 440.0, 0.01));
            }
        })
    };
    samples_producer.join().unwrap();
    tones_producer.join().unwrap();

    wait_for(|| sink.writes().len() == 40);
    assert_eq!(sink.max_active.load(Ordering::SeqCst), 1);

    coordinator.shutdown();
    tones.shutdown();
}

#[test]
fn test_decode_failure_does_not_block_next_request() {
    let sink = RecordingSink::default();
    let coordinator = Coordinator::start(core_with(sink.clone(), Arc::new(DisabledPlayer))).unwrap();

    coordinator.enqueue(PlaybackRequest::file("/nonexistent/airhorn.wav"));
    coordinator.enqueue(marked(7));

    wait_for(|| !sink.writes().is_empty());
    assert_eq!(sink.writes(), vec![7]);
    coordinator.shutdown();
}

#[test]
fn test_burst_ducks_once_and_restores_once() {
    let sink = RecordingSink::default();
    let player = FakePlayer::at(80);
    let core = core_with(sink.clone(), Arc::clone(&player) as Arc<dyn BackgroundPlayer>);

    let queue = PlaybackQueue::new();
    for value in 1..=3 {
        queue.push(marked(value));
    }

    // Drive the core the way a consumer does: pop, then play
    let first = queue.try_pop().unwrap();
    core.play(&first, &queue).unwrap();
    assert_eq!(*player.writes.lock().unwrap(), vec![70, 60, 50, 40, 30]);

    let second = queue.try_pop().unwrap();
    core.play(&second, &queue).unwrap();
    assert_eq!(player.writes.lock().unwrap().len(), 5, "already ducked, no writes");

    let last = queue.try_pop().unwrap();
    core.play(&last, &queue).unwrap();
    assert_eq!(
        *player.writes.lock().unwrap(),
        vec![70, 60, 50, 40, 30, 40, 50, 60, 70, 80]
    );
    assert_eq!(*player.volume.lock().unwrap(), 80);
    assert_eq!(sink.writes(), vec![1, 2, 3]);
}

#[test]
fn test_restore_runs_after_failed_last_request() {
    let sink = RecordingSink::default();
    let player = FakePlayer::at(50);
    let core = core_with(sink, Arc::clone(&player) as Arc<dyn BackgroundPlayer>);

    let queue = PlaybackQueue::new();
    queue.push(PlaybackRequest::file("/nonexistent/horn.wav"));

    let ok = marked(1);
    core.play(&ok, &queue).unwrap();
    assert_eq!(*player.volume.lock().unwrap(), 30);

    let failing = queue.try_pop().unwrap();
    assert!(core.play(&failing, &queue).is_err());
    assert_eq!(*player.volume.lock().unwrap(), 50);
}

#[test]
fn test_pause_burst_pauses_once_and_resumes_once() {
    let sink = RecordingSink::default();
    let player = FakePlayer::at(60);
    let core = core_with(sink.clone(), Arc::clone(&player) as Arc<dyn BackgroundPlayer>);

    let queue = PlaybackQueue::new();
    queue.push(marked(1).with_pause(true));
    queue.push(marked(2).with_pause(true));

    let first = queue.try_pop().unwrap();
    core.play(&first, &queue).unwrap();
    assert_eq!(player.toggles.load(Ordering::SeqCst), 1);
    assert_eq!(*player.state.lock().unwrap(), PlayerState::Pause);

    let last = queue.try_pop().unwrap();
    core.play(&last, &queue).unwrap();
    assert_eq!(player.toggles.load(Ordering::SeqCst), 2);
    assert_eq!(*player.state.lock().unwrap(), PlayerState::Play);

    // Pausing never touches the volume
    assert!(player.writes.lock().unwrap().is_empty());
    assert_eq!(sink.writes(), vec![1, 2]);
}

#[test]
fn test_sink_failure_releases_lock_and_restores() {
    let sink = RecordingSink::failing(1);
    let player = FakePlayer::at(80);
    let core = core_with(sink.clone(), Arc::clone(&player) as Arc<dyn BackgroundPlayer>);

    let queue = PlaybackQueue::new();
    queue.push(marked(2));

    let first = marked(1);
    assert!(matches!(core.play(&first, &queue), Err(Error::Sink(_))));
    assert_eq!(*player.volume.lock().unwrap(), 30, "burst still in progress");

    let second = queue.try_pop().unwrap();
    core.play(&second, &queue).unwrap();
    assert_eq!(sink.writes(), vec![2]);
    assert_eq!(*player.volume.lock().unwrap(), 80);
}

#[test]
fn test_coordinator_survives_sink_failure() {
    let sink = RecordingSink::failing(1);
    let coordinator = Coordinator::start(core_with(sink.clone(), Arc::new(DisabledPlayer))).unwrap();

    coordinator.enqueue(marked(1));
    coordinator.enqueue(marked(2));

    wait_for(|| !sink.writes().is_empty());
    assert_eq!(sink.writes(), vec![2]);
    coordinator.shutdown();
}
