//! Debate phases.
//!
//! Every speaking turn happens in exactly one phase, and the phase alone
//! decides which instruction the speaker is given.

use std::fmt;

/// The phase a speaker is currently speaking in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Each speaker states their position once.
    Opening,
    /// Moderator-driven responses to the opponents.
    Rebuttal,
    /// Each speaker sums up once.
    Closing,
}

impl Phase {
    /// Label used in transcript lines, e.g. `Plato (Opening): ...`.
    pub fn display_name(&self) -> &'static str {
        match self {
            Phase::Opening => "Opening",
            Phase::Rebuttal => "Rebuttal",
            Phase::Closing => "Closing",
        }
    }

    /// Instruction handed to the speaker for this phase.
    pub fn instruction(&self) -> &'static str {
        match self {
            Phase::Opening => "Give your opening statement on the debate topic.",
            Phase::Rebuttal => {
                "Respond directly to your opponents' latest arguments with a rebuttal."
            }
            Phase::Closing => "Provide your closing statement summarizing your stance.",
        }
    }

    /// Response length hint for this phase.
    pub fn max_tokens(&self) -> u32 {
        match self {
            Phase::Opening => 300,
            Phase::Rebuttal => 400,
            Phase::Closing => 250,
        }
    }

    /// Whether the speaker sees what the opponents said last.
    pub fn uses_opponent_context(&self) -> bool {
        !matches!(self, Phase::Opening)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}
