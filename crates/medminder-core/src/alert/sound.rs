//! Audible alarm.
//!
//! Plays a fixed sound through the first working external player,
//! repeated per [`AlarmPattern`]. Runs as a tokio task and stops as soon as
//! its [`CancellationToken`] fires, killing any player still running.
//! Every failure is silent; the last resort is the terminal bell.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub const DEFAULT_SOUND: &str = "/usr/share/sounds/freedesktop/stereo/message-new-instant.oga";

pub fn default_players() -> Vec<String> {
    vec!["paplay".to_string(), "aplay".to_string()]
}

/// How many times to play the sound and how long to pause in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlarmPattern {
    pub repetitions: u32,
    pub interval: Duration,
}

impl AlarmPattern {
    pub fn new(repetitions: u32, interval: Duration) -> Self {
        Self {
            repetitions,
            interval,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlarmOutcome {
    /// All repetitions played through `player`.
    Played { player: String, repetitions: u32 },
    /// Stopped early; `repetitions` finished before the stop.
    Cancelled { repetitions: u32 },
    /// No usable player or sound file; rang the terminal bell.
    Bell,
    /// Sound disabled.
    Silent,
}

#[derive(Debug, Clone)]
pub struct AlarmPlayer {
    sound: PathBuf,
    players: Vec<String>,
    enabled: bool,
}

impl Default for AlarmPlayer {
    fn default() -> Self {
        Self::new(DEFAULT_SOUND, default_players())
    }
}

impl AlarmPlayer {
    pub fn new(sound: impl Into<PathBuf>, players: Vec<String>) -> Self {
        Self {
            sound: sound.into(),
            players,
            enabled: true,
        }
    }

    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    /// Start the alarm on `handle` without waiting for it.
    pub fn spawn(
        &self,
        handle: &Handle,
        pattern: AlarmPattern,
        cancel: CancellationToken,
    ) -> JoinHandle<AlarmOutcome> {
        let player = self.clone();
        handle.spawn(async move { player.play(pattern, cancel).await })
    }

    pub async fn play(&self, pattern: AlarmPattern, cancel: CancellationToken) -> AlarmOutcome {
        if !self.enabled {
            return AlarmOutcome::Silent;
        }
        if cancel.is_cancelled() {
            return AlarmOutcome::Cancelled { repetitions: 0 };
        }

        if self.sound.exists() {
            for program in &self.players {
                if let Some(outcome) = self.play_with(program, pattern, &cancel).await {
                    return outcome;
                }
            }
        } else {
            tracing::debug!(sound = %self.sound.display(), "alarm sound file missing");
        }

        if cancel.is_cancelled() {
            return AlarmOutcome::Cancelled { repetitions: 0 };
        }
        let mut stdout = tokio::io::stdout();
        let _ = stdout.write_all(b"\x07").await;
        let _ = stdout.flush().await;
        AlarmOutcome::Bell
    }

    /// `None` if `program` could not be started or failed its first run.
    async fn play_with(
        &self,
        program: &str,
        pattern: AlarmPattern,
        cancel: &CancellationToken,
    ) -> Option<AlarmOutcome> {
        let mut played = 0;
        for i in 0..pattern.repetitions {
            if cancel.is_cancelled() {
                return Some(AlarmOutcome::Cancelled { repetitions: played });
            }

            let mut child = match Command::new(program)
                .arg(&self.sound)
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .kill_on_drop(true)
                .spawn()
            {
                Ok(child) => child,
                Err(e) if played == 0 => {
                    tracing::debug!(program, error = %e, "sound player unavailable");
                    return None;
                }
                Err(_) => break,
            };

            tokio::select! {
                status = child.wait() => match status {
                    Ok(status) if status.success() => {}
                    Ok(status) if played == 0 => {
                        tracing::debug!(program, %status, "sound player failed");
                        return None;
                    }
                    Err(e) if played == 0 => {
                        tracing::debug!(program, error = %e, "sound player failed");
                        return None;
                    }
                    _ => break,
                },
                _ = cancel.cancelled() => {
                    let _ = child.kill().await;
                    return Some(AlarmOutcome::Cancelled { repetitions: played });
                }
            }
            played += 1;

            if i + 1 < pattern.repetitions {
                tokio::select! {
                    _ = tokio::time::sleep(pattern.interval) => {}
                    _ = cancel.cancelled() => {
                        return Some(AlarmOutcome::Cancelled { repetitions: played });
                    }
                }
            }
        }
        Some(AlarmOutcome::Played {
            player: program.to_string(),
            repetitions: played,
        })
    }
}
