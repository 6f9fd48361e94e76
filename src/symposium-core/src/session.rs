//! Debate session orchestration.
//!
//! A [`DebateSession`] owns the turn loop, the round counter and the
//! transcript, and drives the speakers and the moderator through
//! `Introducing → Opening → MainLoop → Closing → Done`.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::error::DebateError;
use crate::inference::Inference;
use crate::moderator::{Moderator, ModeratorAction};
use crate::phase::Phase;
use crate::retry::RetryPolicy;
use crate::speaker::{Roster, SpeakerId, SpeakerSpec, Turn, TurnContext};
use crate::transcript::{ModeratorNote, NoteKind, Transcript, TranscriptEntry, Utterance};

/// Configuration for running a debate.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// The topic being debated.
    pub topic: String,
    /// Maximum number of moderator-driven turns.
    pub round_budget: u32,
    /// Whether the moderator summarizes each main-loop turn.
    pub analyze_turns: bool,
    /// Retry bound for every inference call.
    pub retry: RetryPolicy,
    /// Model override for the moderator.
    pub moderator_model: Option<String>,
}

impl SessionConfig {
    pub fn new(topic: impl Into<String>, round_budget: u32) -> Self {
        Self {
            topic: topic.into(),
            round_budget,
            analyze_turns: true,
            retry: RetryPolicy::default(),
            moderator_model: None,
        }
    }

    pub fn with_analysis(mut self, analyze_turns: bool) -> Self {
        self.analyze_turns = analyze_turns;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_moderator_model(mut self, model: Option<String>) -> Self {
        self.moderator_model = model;
        self
    }

    pub fn validate(&self) -> Result<(), DebateError> {
        if self.topic.trim().is_empty() {
            return Err(DebateError::EmptyTopic);
        }
        if self.round_budget == 0 {
            return Err(DebateError::InvalidRoundBudget);
        }
        Ok(())
    }
}

/// Where the session is in the debate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Introducing,
    Opening,
    MainLoop,
    Closing,
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Introducing => "Introduction",
            Stage::Opening => "Opening Statements",
            Stage::MainLoop => "Rebuttals",
            Stage::Closing => "Closing Statements",
            Stage::Done => "Done",
        };
        f.write_str(name)
    }
}

/// Mutable state of a session. Only the session itself changes it.
#[derive(Debug, Clone)]
pub struct SessionState {
    topic: String,
    round_budget: u32,
    rounds_completed: u32,
    last_utterances: BTreeMap<SpeakerId, String>,
    last_speaker: Option<SpeakerId>,
    stage: Stage,
    transcript: Transcript,
}

impl SessionState {
    fn new(topic: &str, round_budget: u32) -> Self {
        Self {
            topic: topic.trim().to_string(),
            round_budget,
            rounds_completed: 0,
            last_utterances: BTreeMap::new(),
            last_speaker: None,
            stage: Stage::Introducing,
            transcript: Transcript::new(),
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn round_budget(&self) -> u32 {
        self.round_budget
    }

    /// Main-loop turns taken so far.
    pub fn rounds_completed(&self) -> u32 {
        self.rounds_completed
    }

    /// Most recent text from `id`, empty if they have not spoken.
    pub fn last_utterance(&self, id: SpeakerId) -> &str {
        self.last_utterances
            .get(&id)
            .map(String::as_str)
            .unwrap_or("")
    }

    pub fn last_speaker(&self) -> Option<SpeakerId> {
        self.last_speaker
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    /// `Name: text` for each opponent of `id` who has said something.
    fn opponents_context(&self, roster: &Roster, id: SpeakerId) -> String {
        roster[id]
            .opponents()
            .iter()
            .filter_map(|&op| {
                let text = self.last_utterance(op);
                (!text.is_empty()).then(|| format!("{}: {}", roster[op].name(), text))
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Events emitted during a debate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DebateEvent {
    /// The session moved to a new stage.
    StageChanged { stage: Stage },
    /// The moderator said something.
    ModeratorNote { kind: NoteKind, text: String },
    /// A speaker is about to speak.
    SpeakerStart { name: String, phase: Phase },
    /// A speaker has finished speaking.
    SpeakerMessage {
        name: String,
        phase: Phase,
        content: String,
    },
    /// The debate has concluded.
    DebateEnd { rounds_completed: u32 },
}

/// Callback for debate events.
pub type DebateCallback = Box<dyn Fn(DebateEvent) + Send + Sync>;

/// Drives one debate from introduction to closing statements.
pub struct DebateSession {
    config: SessionConfig,
    roster: Roster,
    moderator: Moderator,
    inference: Arc<dyn Inference>,
    state: SessionState,
    callback: Option<DebateCallback>,
}

impl DebateSession {
    /// Validate the configuration and roster and set up a session. Nothing
    /// is sent to the model until the session is stepped.
    pub fn new(
        config: SessionConfig,
        speakers: Vec<SpeakerSpec>,
        inference: Arc<dyn Inference>,
    ) -> Result<Self, DebateError> {
        config.validate()?;
        let roster = Roster::new(speakers)?;
        let moderator = Moderator::new(&roster).with_model(config.moderator_model.clone());
        let state = SessionState::new(&config.topic, config.round_budget);

        Ok(Self {
            config,
            roster,
            moderator,
            inference,
            state,
            callback: None,
        })
    }

    /// Set a callback for debate events.
    pub fn with_callback(mut self, callback: DebateCallback) -> Self {
        self.callback = Some(callback);
        self
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn stage(&self) -> Stage {
        self.state.stage
    }

    pub fn transcript(&self) -> &Transcript {
        &self.state.transcript
    }

    /// Run the debate to completion and return the transcript.
    pub async fn run(&mut self) -> Transcript {
        tracing::info!(
            topic = %self.state.topic,
            speakers = self.roster.len(),
            round_budget = self.state.round_budget,
            "starting debate"
        );

        while self.state.stage != Stage::Done {
            self.step().await;
        }

        self.state.transcript.clone()
    }

    /// Do one unit of work and return the resulting stage.
    ///
    /// Introducing, Opening and Closing each complete in one step; MainLoop
    /// takes one step per speaker turn plus one to leave. Stepping a finished
    /// session does nothing.
    pub async fn step(&mut self) -> Stage {
        match self.state.stage {
            Stage::Introducing => self.introduce().await,
            Stage::Opening => self.opening().await,
            Stage::MainLoop => self.main_turn().await,
            Stage::Closing => self.closing().await,
            Stage::Done => {}
        }
        self.state.stage
    }

    async fn introduce(&mut self) {
        let intro = self
            .moderator
            .introduce(
                self.inference.as_ref(),
                &self.config.retry,
                &self.state.topic,
            )
            .await;
        self.note(NoteKind::Introduction, intro);
        self.advance(Stage::Opening);
    }

    async fn opening(&mut self) {
        self.note(
            NoteKind::Announcement,
            self.moderator.announce_phase(Phase::Opening),
        );
        for id in self.roster.ids() {
            self.speak(id, Phase::Opening).await;
        }

        self.advance(Stage::MainLoop);
        self.note(
            NoteKind::Announcement,
            self.moderator.announce_phase(Phase::Rebuttal),
        );
    }

    async fn main_turn(&mut self) {
        if self.state.rounds_completed >= self.state.round_budget {
            tracing::info!(
                rounds = self.state.rounds_completed,
                "round budget exhausted, moving to closing"
            );
            self.advance(Stage::Closing);
            return;
        }

        let action = self
            .moderator
            .choose_next(
                self.inference.as_ref(),
                &self.config.retry,
                &self.state.last_utterances,
                self.state.last_speaker,
            )
            .await;

        let id = match action {
            ModeratorAction::CloseDebate => {
                tracing::info!(
                    rounds = self.state.rounds_completed,
                    "moderator closed the debate"
                );
                self.advance(Stage::Closing);
                return;
            }
            ModeratorAction::Speak(id) => id,
        };
        debug_assert_ne!(Some(id), self.state.last_speaker);

        self.note(NoteKind::Announcement, self.moderator.announce_turn(id));
        let turn = self.speak(id, Phase::Rebuttal).await;

        // a passed turn has nothing to analyze
        if self.config.analyze_turns && !turn.passed {
            let analysis = self
                .moderator
                .analyze(
                    self.inference.as_ref(),
                    &self.config.retry,
                    self.roster[id].name(),
                    &turn.text,
                )
                .await;
            if let Some(summary) = analysis.summary {
                self.note(NoteKind::Summary, summary);
            }
            if let Some(commentary) = analysis.commentary {
                self.note(NoteKind::Commentary, commentary);
            }
        }

        self.state.rounds_completed += 1;
    }

    async fn closing(&mut self) {
        self.note(
            NoteKind::Announcement,
            self.moderator.announce_phase(Phase::Closing),
        );
        for id in self.roster.ids() {
            self.speak(id, Phase::Closing).await;
        }

        self.advance(Stage::Done);
        self.emit_event(DebateEvent::DebateEnd {
            rounds_completed: self.state.rounds_completed,
        });
    }

    /// Have `id` speak in `phase` and record the result.
    async fn speak(&mut self, id: SpeakerId, phase: Phase) -> Turn {
        self.roster.set_phase(id, phase);
        let speaker = &self.roster[id];
        let name = speaker.name().to_string();

        self.emit_event(DebateEvent::SpeakerStart {
            name: name.clone(),
            phase,
        });

        let opponent_names = self.roster.opponent_names(id);
        let context = if phase.uses_opponent_context() {
            self.state.opponents_context(&self.roster, id)
        } else {
            String::new()
        };
        let ctx = TurnContext {
            topic: &self.state.topic,
            opponent_names: &opponent_names,
            opponents_context: &context,
        };

        let turn = speaker
            .produce_utterance(self.inference.as_ref(), &self.config.retry, &ctx)
            .await;
        let text = turn.text.clone();

        tracing::debug!(
            speaker = %name,
            %phase,
            passed = turn.passed,
            chars = text.len(),
            "recorded utterance"
        );

        self.state.last_utterances.insert(id, text.clone());
        self.state.last_speaker = Some(id);
        self.state
            .transcript
            .push(TranscriptEntry::Utterance(Utterance {
                speaker: id,
                speaker_name: name.clone(),
                phase,
                text: text.clone(),
            }));

        self.emit_event(DebateEvent::SpeakerMessage {
            name,
            phase,
            content: text,
        });

        turn
    }

    fn note(&mut self, kind: NoteKind, text: String) {
        self.state
            .transcript
            .push(TranscriptEntry::Moderator(ModeratorNote {
                kind,
                text: text.clone(),
            }));
        self.emit_event(DebateEvent::ModeratorNote { kind, text });
    }

    fn advance(&mut self, stage: Stage) {
        tracing::debug!(from = %self.state.stage, to = %stage, "stage transition");
        self.state.stage = stage;
        self.emit_event(DebateEvent::StageChanged { stage });
    }

    /// Emit an event if a callback is registered.
    fn emit_event(&self, event: DebateEvent) {
        if let Some(ref callback) = self.callback {
            callback(event);
        }
    }
}
