//! Background music ducking
//!
//! While a sound plays, the background music daemon is either turned down
//! with a short volume ramp or paused, and put back once the burst of
//! playbacks is over. Every failure here is a connectivity problem the
//! playback core logs and ignores: a missing music daemon never stops a
//! sound from playing.

pub mod mpd;

pub use mpd::MpdClient;

use crate::error::{Error, Result};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};

/// Playback state reported by the music daemon
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerState {
    Play,
    Pause,
    Stop,
}

/// Status snapshot of the music daemon
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayerStatus {
    pub state: PlayerState,
    /// None when the daemon has no mixer
    pub volume: Option<u8>,
}

/// The background music player being ducked.
///
/// Calls are synchronous; they run on the playback threads.
pub trait BackgroundPlayer: Send + Sync {
    fn status(&self) -> Result<PlayerStatus>;

    fn set_volume(&self, volume: u8) -> Result<()>;

    /// Flip between playing and paused
    fn toggle_pause(&self) -> Result<()>;
}

/// Stand-in used when ducking is switched off in the configuration
#[derive(Debug, Default)]
pub struct DisabledPlayer;

impl BackgroundPlayer for DisabledPlayer {
    fn status(&self) -> Result<PlayerStatus> {
        Err(Error::Connectivity("background player disabled".to_string()))
    }

    fn set_volume(&self, _volume: u8) -> Result<()> {
        Err(Error::Connectivity("background player disabled".to_string()))
    }

    fn toggle_pause(&self) -> Result<()> {
        Err(Error::Connectivity("background player disabled".to_string()))
    }
}

/// What to do with the background music for one playback
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuckingDecision {
    Ramp { original_volume: u8 },
    PauseResume,
    NoAction,
}

impl DuckingDecision {
    pub fn decide(pause_background_music: bool, status: Option<&PlayerStatus>) -> Self {
        let Some(status) = status else {
            return DuckingDecision::NoAction;
        };

        if pause_background_music {
            return DuckingDecision::PauseResume;
        }

        match status.volume {
            Some(original_volume) => DuckingDecision::Ramp { original_volume },
            None => DuckingDecision::NoAction,
        }
    }
}

/// Undo information for ducking that has been applied
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Restore {
    /// Volume to ramp back to
    pub volume: Option<u8>,
    /// Music was paused by us and must be resumed
    pub resume: bool,
}

impl Restore {
    pub fn is_empty(&self) -> bool {
        self.volume.is_none() && !self.resume
    }

    /// Combine with ducking applied later in the same burst.
    ///
    /// The earliest captured volume wins: later captures see the ducked level.
    pub fn merge(self, later: Restore) -> Restore {
        Restore {
            volume: self.volume.or(later.volume),
            resume: self.resume || later.resume,
        }
    }
}

/// Volume ramps and pause/resume over a [`BackgroundPlayer`]
#[derive(Clone)]
pub struct DuckingController {
    player: Arc<dyn BackgroundPlayer>,
    duck_volume: u8,
    steps: u32,
    step_delay: Duration,
}

impl DuckingController {
    pub fn new(player: Arc<dyn BackgroundPlayer>, duck_volume: u8, steps: u32, step_delay: Duration) -> Self {
        Self {
            player,
            duck_volume,
            steps,
            step_delay,
        }
    }

    pub fn status(&self) -> Result<PlayerStatus> {
        self.player.status()
    }

    /// Move the volume to `target` in `steps` linear writes.
    ///
    /// Returns `(final, original)`. When the volume already equals `target`
    /// nothing is written.
    pub fn ramp_volume(&self, target: u8, steps: u32, step_delay: Duration) -> Result<(u8, u8)> {
        let original = self
            .player
            .status()?
            .volume
            .ok_or_else(|| Error::Connectivity("player reports no volume control".to_string()))?;

        if original == target {
            return Ok((original, original));
        }

        let steps = steps.max(1) as i32;
        let start = original as i32;
        let delta = target as i32 - start;

        for i in 1..=steps {
            let volume = (start + delta * i / steps) as u8;
            debug!("Ramp step {}/{}: volume {}", i, steps, volume);
            self.player.set_volume(volume)?;
            if i < steps && !step_delay.is_zero() {
                thread::sleep(step_delay);
            }
        }

        Ok((target, original))
    }

    /// Pause only when the music is playing; returns whether it toggled
    pub fn pause_if_playing(&self) -> Result<bool> {
        if self.player.status()?.state == PlayerState::Play {
            self.player.toggle_pause()?;
            return Ok(true);
        }
        Ok(false)
    }

    /// Resume only when the music is paused; returns whether it toggled
    pub fn resume_if_paused(&self) -> Result<bool> {
        if self.player.status()?.state == PlayerState::Pause {
            self.player.toggle_pause()?;
            return Ok(true);
        }
        Ok(false)
    }

    /// Carry out a decision. Failures are logged and leave nothing to restore.
    pub fn apply(&self, decision: DuckingDecision) -> Restore {
        match decision {
            DuckingDecision::NoAction => Restore::default(),
            DuckingDecision::Ramp { original_volume } if original_volume <= self.duck_volume => {
                debug!(
                    "Music at {} is already at or below duck volume {}",
                    original_volume, self.duck_volume
                );
                Restore::default()
            }
            DuckingDecision::Ramp { original_volume } => {
                debug!("Ducking music from {} to {}", original_volume, self.duck_volume);
                match self.ramp_volume(self.duck_volume, self.steps, self.step_delay) {
                    Ok((_, original)) => Restore {
                        volume: Some(original),
                        resume: false,
                    },
                    Err(e) => {
                        warn!("Volume ducking failed: {}", e);
                        Restore::default()
                    }
                }
            }
            DuckingDecision::PauseResume => match self.pause_if_playing() {
                Ok(paused) => Restore {
                    volume: None,
                    resume: paused,
                },
                Err(e) => {
                    warn!("Pausing music failed: {}", e);
                    Restore::default()
                }
            },
        }
    }

    /// Put the music back the way [`apply`](Self::apply) found it
    pub fn restore(&self, restore: Restore) {
        if let Some(volume) = restore.volume {
            debug!("Restoring music volume to {}", volume);
            if let Err(e) = self.ramp_volume(volume, self.steps, self.step_delay) {
                warn!("Volume restore failed: {}", e);
            }
        }
        if restore.resume {
            debug!("Resuming music");
            if let Err(e) = self.resume_if_paused() {
                warn!("Resuming music failed: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Records volume writes and pause toggles
    struct FakePlayer {
        state: Mutex<(PlayerState, Option<u8>)>,
        writes: Mutex<Vec<u8>>,
        toggles: Mutex<u32>,
    }

    impl FakePlayer {
        fn new(state: PlayerState, volume: Option<u8>) -> Arc<Self> {
            Arc::new(Self {
                state: Mutex::new((state, volume)),
                writes: Mutex::new(Vec::new()),
                toggles: Mutex::new(0),
            })
        }
    }

    impl BackgroundPlayer for FakePlayer {
        fn status(&self) -> Result<PlayerStatus> {
            let (state, volume) = *self.state.lock().unwrap();
            Ok(PlayerStatus { state, volume })
        }

        fn set_volume(&self, volume: u8) -> Result<()> {
            self.state.lock().unwrap().1 = Some(volume);
            self.writes.lock().unwrap().push(volume);
            Ok(())
        }

        fn toggle_pause(&self) -> Result<()> {
            let mut state = self.state.lock().unwrap();
            state.0 = match state.0 {
                PlayerState::Play => PlayerState::Pause,
                _ => PlayerState::Play,
            };
            *self.toggles.lock().unwrap() += 1;
            Ok(())
        }
    }

    fn controller(player: Arc<FakePlayer>) -> DuckingController {
        DuckingController::new(player, 30, 5, Duration::ZERO)
    }

    #[test]
    fn test_decide() {
        let playing = PlayerStatus { state: PlayerState::Play, volume: Some(80) };
        let no_mixer = PlayerStatus { state: PlayerState::Play, volume: None };

        assert_eq!(DuckingDecision::decide(false, None), DuckingDecision::NoAction);
        assert_eq!(DuckingDecision::decide(true, None), DuckingDecision::NoAction);
        assert_eq!(DuckingDecision::decide(true, Some(&playing)), DuckingDecision::PauseResume);
        assert_eq!(
            DuckingDecision::decide(false, Some(&playing)),
            DuckingDecision::Ramp { original_volume: 80 }
        );
        assert_eq!(DuckingDecision::decide(false, Some(&no_mixer)), DuckingDecision::NoAction);
    }

    #[test]
    fn test_ramp_down_in_five_writes() {
        let player = FakePlayer::new(PlayerState::Play, Some(80));
        let result = controller(Arc::clone(&player)).ramp_volume(30, 5, Duration::ZERO).unwrap();

        assert_eq!(result, (30, 80));
        assert_eq!(*player.writes.lock().unwrap(), vec![70, 60, 50, 40, 30]);
    }

    #[test]
    fn test_ramp_up_is_symmetric() {
        let player = FakePlayer::new(PlayerState::Play, Some(30));
        controller(Arc::clone(&player)).ramp_volume(80, 5, Duration::ZERO).unwrap();
        assert_eq!(*player.writes.lock().unwrap(), vec![40, 50, 60, 70, 80]);
    }

    #[test]
    fn test_ramp_to_current_volume_writes_nothing() {
        let player = FakePlayer::new(PlayerState::Play, Some(45));
        let result = controller(Arc::clone(&player)).ramp_volume(45, 5, Duration::ZERO).unwrap();
        assert_eq!(result, (45, 45));
        assert!(player.writes.lock().unwrap().is_empty());
    }

    #[test]
    fn test_zero_steps_is_a_single_write() {
        let player = FakePlayer::new(PlayerState::Play, Some(80));
        controller(Arc::clone(&player)).ramp_volume(20, 0, Duration::ZERO).unwrap();
        assert_eq!(*player.writes.lock().unwrap(), vec![20]);
    }

    #[test]
    fn test_pause_and_resume_only_toggle_when_needed() {
        let player = FakePlayer::new(PlayerState::Stop, Some(50));
        let ducking = controller(Arc::clone(&player));
        assert!(!ducking.pause_if_playing().unwrap());
        assert!(!ducking.resume_if_paused().unwrap());
        assert_eq!(*player.toggles.lock().unwrap(), 0);

        let player = FakePlayer::new(PlayerState::Play, Some(50));
        let ducking = controller(Arc::clone(&player));
        assert!(ducking.pause_if_playing().unwrap());
        assert!(ducking.resume_if_paused().unwrap());
        assert_eq!(*player.toggles.lock().unwrap(), 2);
    }

    #[test]
    fn test_apply_and_restore_volume() {
        let player = FakePlayer::new(PlayerState::Play, Some(80));
        let ducking = controller(Arc::clone(&player));

        let restore = ducking.apply(DuckingDecision::Ramp { original_volume: 80 });
        assert_eq!(restore, Restore { volume: Some(80), resume: false });
        assert_eq!(player.status().unwrap().volume, Some(30));

        ducking.restore(restore);
        assert_eq!(player.status().unwrap().volume, Some(80));
    }

    #[test]
    fn test_quiet_music_is_never_raised() {
        let player = FakePlayer::new(PlayerState::Play, Some(20));
        let ducking = DuckingController::new(Arc::<FakePlayer>::clone(&player), 70, 5, Duration::ZERO);

        let status = player.status().unwrap();
        let restore = ducking.apply(DuckingDecision::decide(false, Some(&status)));
        assert!(restore.is_empty());
        assert!(player.writes.lock().unwrap().is_empty());

        let at_duck_volume = FakePlayer::new(PlayerState::Play, Some(70));
        let ducking = DuckingController::new(Arc::<FakePlayer>::clone(&at_duck_volume), 70, 5, Duration::ZERO);
        assert!(ducking.apply(DuckingDecision::Ramp { original_volume: 70 }).is_empty());
        assert!(at_duck_volume.writes.lock().unwrap().is_empty());
    }

    #[test]
    fn test_disabled_player_applies_nothing() {
        let ducking = DuckingController::new(Arc::new(DisabledPlayer), 30, 5, Duration::ZERO);
        assert!(matches!(ducking.status(), Err(Error::Connectivity(_))));
        assert!(ducking.apply(DuckingDecision::PauseResume).is_empty());
    }

    #[test]
    fn test_restore_merge_keeps_first_volume() {
        let first = Restore { volume: Some(80), resume: false };
        let later = Restore { volume: Some(30), resume: true };
        assert_eq!(first.merge(later), Restore { volume: Some(80), resume: true });
        assert_eq!(Restore::default().merge(later), later);
    }
}
