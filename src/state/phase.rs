//! Phase machine of a room: which events are legal in which phase.

use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

/// High-level phases a room can be in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RoomPhase {
    /// A reveal window is open and players may guess or skip.
    AwaitingGuesses,
    /// A round just ended; the next window of the same song opens after a short delay.
    Intermission,
    /// The song is over; players vote to start the next game.
    ReadyCheck,
}

/// Events that can be applied to the phase machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomEvent {
    /// The open round ended; `game_over` when the song is finished.
    RoundEnded {
        /// Whether the whole game ended with this round.
        game_over: bool,
    },
    /// The delayed next round of the same song opens.
    NextRound,
    /// Ready votes reached the threshold and a new song starts.
    GameStarted,
}

/// Error returned when attempting to apply an invalid transition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid transition: {event:?} cannot be applied while in {from:?}")]
pub struct InvalidTransition {
    /// The phase the machine was in when the invalid event was received.
    pub from: RoomPhase,
    /// The event that cannot be applied from this phase.
    pub event: RoomEvent,
}

/// Phase machine of one room.
///
/// The version increments on every applied transition; delayed work captures it and
/// only runs if no other transition happened in between.
#[derive(Debug, Clone)]
pub struct PhaseMachine {
    phase: RoomPhase,
    version: u64,
}

impl Default for PhaseMachine {
    fn default() -> Self {
        Self {
            phase: RoomPhase::AwaitingGuesses,
            version: 0,
        }
    }
}

impl PhaseMachine {
    /// Create a machine with the first round of the first game open.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inspect the current phase.
    pub fn phase(&self) -> RoomPhase {
        self.phase
    }

    /// Number of transitions applied so far.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Apply `event`, returning the new phase.
    pub fn apply(&mut self, event: RoomEvent) -> Result<RoomPhase, InvalidTransition> {
        let next = self.compute_transition(event)?;
        self.phase = next;
        self.version += 1;
        Ok(next)
    }

    /// Compute a transition from an event if the transition is valid.
    fn compute_transition(&self, event: RoomEvent) -> Result<RoomPhase, InvalidTransition> {
        let next = match (self.phase, event) {
            (RoomPhase::AwaitingGuesses, RoomEvent::RoundEnded { game_over: false }) => {
                RoomPhase::Intermission
            }
            (RoomPhase::AwaitingGuesses, RoomEvent::RoundEnded { game_over: true }) => {
                RoomPhase::ReadyCheck
            }
            (RoomPhase::Intermission, RoomEvent::NextRound) => RoomPhase::AwaitingGuesses,
            (RoomPhase::ReadyCheck, RoomEvent::GameStarted) => RoomPhase::AwaitingGuesses,
            (from, event) => return Err(InvalidTransition { from, event }),
        };

        Ok(next)
    }
}
