//! The append-only debate transcript.

use std::fmt;

use crate::phase::Phase;
use crate::speaker::SpeakerId;
use crate::text::single_line;

/// One speaker's argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Utterance {
    pub speaker: SpeakerId,
    pub speaker_name: String,
    pub phase: Phase,
    pub text: String,
}

/// What a moderator line is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoteKind {
    Introduction,
    Announcement,
    Summary,
    Commentary,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModeratorNote {
    pub kind: NoteKind,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranscriptEntry {
    Utterance(Utterance),
    Moderator(ModeratorNote),
}

impl TranscriptEntry {
    /// One line: `Name (Phase): text` or `Moderator: text`.
    pub fn render(&self) -> String {
        match self {
            TranscriptEntry::Utterance(u) => {
                format!("{} ({}): {}", u.speaker_name, u.phase, single_line(&u.text))
            }
            TranscriptEntry::Moderator(note) => format!("Moderator: {}", single_line(&note.text)),
        }
    }
}

/// Ordered record of a session. Entries are only ever appended.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transcript {
    entries: Vec<TranscriptEntry>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, entry: TranscriptEntry) {
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[TranscriptEntry] {
        &self.entries
    }

    /// Speaker utterances in speaking order.
    pub fn utterances(&self) -> impl Iterator<Item = &Utterance> {
        self.entries.iter().filter_map(|e| match e {
            TranscriptEntry::Utterance(u) => Some(u),
            TranscriptEntry::Moderator(_) => None,
        })
    }

    /// Moderator notes in order.
    pub fn notes(&self) -> impl Iterator<Item = &ModeratorNote> {
        self.entries.iter().filter_map(|e| match e {
            TranscriptEntry::Moderator(n) => Some(n),
            TranscriptEntry::Utterance(_) => None,
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// One rendered line per entry.
    pub fn lines(&self) -> Vec<String> {
        self.entries.iter().map(TranscriptEntry::render).collect()
    }

    /// The whole transcript as UTF-8 text, one record per line.
    pub fn render(&self) -> String {
        self.lines().join("\n")
    }
}

impl fmt::Display for Transcript {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::speaker::{Roster, SpeakerSpec};

    fn sample() -> Transcript {
        let roster = Roster::new(vec![
            SpeakerSpec::new("Plato", "forms"),
            SpeakerSpec::new("Kant", "duty"),
        ])
        .unwrap();
        let ids = roster.ids();

        let mut transcript = Transcript::new();
        transcript.push(TranscriptEntry::Moderator(ModeratorNote {
            kind: NoteKind::Introduction,
            text: "Welcome!".to_string(),
        }));
        transcript.push(TranscriptEntry::Utterance(Utterance {
            speaker: ids[0],
            speaker_name: "Plato".to_string(),
            phase: Phase::Opening,
            text: "The good is\nreal.".to_string(),
        }));
        transcript.push(TranscriptEntry::Utterance(Utterance {
            speaker: ids[1],
            speaker_name: "Kant".to_string(),
            phase: Phase::Rebuttal,
            text: "Reason decides.".to_string(),
        }));
        transcript
    }

    #[test]
    fn test_render_one_record_per_line() {
        let transcript = sample();
        assert_eq!(
            transcript.render(),
            "Moderator: Welcome!\nPlato (Opening): The good is real.\nKant (Rebuttal): Reason decides."
        );
        assert_eq!(transcript.to_string(), transcript.render());
    }

    #[test]
    fn test_utterances_and_notes_keep_order() {
        let transcript = sample();
        let speakers: Vec<&str> = transcript
            .utterances()
            .map(|u| u.speaker_name.as_str())
            .collect();
        assert_eq!(speakers, vec!["Plato", "Kant"]);
        assert_eq!(transcript.notes().count(), 1);
        assert_eq!(transcript.len(), 3);
    }

    #[test]
    fn test_empty_transcript() {
        let transcript = Transcript::new();
        assert!(transcript.is_empty());
        assert_eq!(transcript.render(), "");
    }
}
