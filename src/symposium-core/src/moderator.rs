//! The debate moderator.
//!
//! Picks who speaks next, introduces the debate and comments on arguments.
//! Every model-backed operation has a deterministic fallback, so the
//! moderator never stalls a session.

use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::Deserialize;

use crate::error::InferenceError;
use crate::inference::{Inference, InferenceRequest, infer_structured};
use crate::phase::Phase;
use crate::retry::RetryPolicy;
use crate::speaker::{Roster, SpeakerId, join_names};
use crate::text::sanitize_response;

/// Action value that ends the main loop.
pub const CLOSE_ACTION: &str = "move_to_closing";

/// What happens after a main-loop turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeratorAction {
    /// Give the floor to this speaker.
    Speak(SpeakerId),
    /// Move on to closing statements.
    CloseDebate,
}

/// Turn decision as returned by the model.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ModeratorDecision {
    pub action: String,
}

/// Summary and commentary on one argument. Either part may be missing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, JsonSchema)]
pub struct Analysis {
    pub summary: Option<String>,
    pub commentary: Option<String>,
}

pub struct Moderator {
    roster: Roster,
    model: Option<String>,
}

impl Moderator {
    pub fn new(roster: &Roster) -> Self {
        Self {
            roster: roster.clone(),
            model: None,
        }
    }

    /// Use a specific model for moderator calls.
    pub fn with_model(mut self, model: Option<String>) -> Self {
        self.model = model;
        self
    }

    /// `Plato (idealism and forms) and Kant (duty)`.
    fn panel(&self) -> String {
        let entries: Vec<String> = self
            .roster
            .iter()
            .map(|s| format!("{} ({})", s.name(), s.stance()))
            .collect();
        let refs: Vec<&str> = entries.iter().map(String::as_str).collect();
        join_names(&refs)
    }

    fn request(&self, system: String, prompt: String) -> InferenceRequest {
        InferenceRequest::new(system, prompt).with_model(self.model.clone())
    }

    /// Opening remarks for `topic`. Falls back to
    /// [`Moderator::fallback_introduction`].
    pub async fn introduce(
        &self,
        inference: &dyn Inference,
        retry: &RetryPolicy,
        topic: &str,
    ) -> String {
        let system = format!(
            "You are a debate moderator. Create an engaging and dynamic introduction for a debate. \
             The speakers are {}. The introduction should present the topic in an exciting and \
             thought-provoking way, introduce each speaker with their perspective, and set \
             expectations for the audience. Respond with a single paragraph of plain text.",
            self.panel()
        );
        let prompt = format!(
            "The topic of the debate is: '{}'. Introduce the speakers by name and area of expertise.",
            topic
        );
        let request = self.request(system, prompt);

        retry
            .run_or_else(
                InferenceError::is_malformed,
                move |_| {
                    let request = request.clone();
                    async move {
                        let text = sanitize_response(&inference.complete(request).await?);
                        if text.is_empty() {
                            return Err(InferenceError::Malformed("empty introduction".to_string()));
                        }
                        Ok::<_, InferenceError>(text)
                    }
                },
                |err| {
                    tracing::warn!(error = %err, "using fallback introduction");
                    self.fallback_introduction(topic)
                },
            )
            .await
    }

    /// Templated introduction built from the topic and roster.
    pub fn fallback_introduction(&self, topic: &str) -> String {
        let experts: Vec<String> = self
            .roster
            .iter()
            .map(|s| format!("{}, an expert in {}", s.name(), s.stance()))
            .collect();
        let refs: Vec<&str> = experts.iter().map(String::as_str).collect();

        format!(
            "Welcome to today's debate on '{}'. We have {}. Let the debate begin!",
            topic,
            join_names(&refs)
        )
    }

    /// Decide who speaks after `last_speaker`, or close the debate.
    ///
    /// The result never names `last_speaker`. Replies naming anyone else
    /// outside the roster, or the last speaker, count as malformed; when the
    /// model cannot give a usable answer the next speaker in roster order
    /// gets the floor.
    pub async fn choose_next(
        &self,
        inference: &dyn Inference,
        retry: &RetryPolicy,
        last_utterances: &BTreeMap<SpeakerId, String>,
        last_speaker: Option<SpeakerId>,
    ) -> ModeratorAction {
        let request = self.choose_request(last_utterances, last_speaker);

        retry
            .run_or_else(
                InferenceError::is_malformed,
                move |_| {
                    let request = request.clone();
                    async move {
                        let decision: ModeratorDecision =
                            infer_structured(inference, request).await?;
                        self.resolve(&decision.action, last_speaker)
                    }
                },
                |err| {
                    let next = self.fallback_next(last_speaker);
                    tracing::warn!(
                        error = %err,
                        speaker = self.roster[next].name(),
                        "moderator decision failed, using roster order"
                    );
                    ModeratorAction::Speak(next)
                },
            )
            .await
    }

    fn choose_request(
        &self,
        last_utterances: &BTreeMap<SpeakerId, String>,
        last_speaker: Option<SpeakerId>,
    ) -> InferenceRequest {
        let eligible: Vec<&str> = self
            .roster
            .iter()
            .filter(|s| Some(s.id()) != last_speaker)
            .map(|s| s.name())
            .collect();

        let system = format!(
            "You are a debate moderator managing a debate between {}. \
             You will receive the latest argument from each speaker and who spoke last. \
             Decide the next action. Possible actions: the exact name of one eligible speaker, \
             or '{}' when the debate has run its course. Never give the floor to the speaker \
             who just spoke, and over the course of the debate give every speaker a fair share \
             of turns. Respond ONLY in JSON with one field: 'action'.",
            self.panel(),
            CLOSE_ACTION
        );

        let mut prompt = format!(
            "Speaker who just spoke: {}\nEligible speakers: {}\n\nLatest arguments:\n",
            last_speaker
                .map(|id| self.roster[id].name())
                .unwrap_or("nobody"),
            eligible.join(", ")
        );
        for speaker in self.roster.iter() {
            let latest = last_utterances
                .get(&speaker.id())
                .map(String::as_str)
                .filter(|t| !t.is_empty())
                .unwrap_or("(has not spoken yet)");
            prompt.push_str(&format!("- {}: {}\n", speaker.name(), latest));
        }
        prompt.push_str("\nWhat should be the next action?");

        self.request(system, prompt)
    }

    /// Turn a raw action into a decision, rejecting anything ineligible.
    fn resolve(
        &self,
        action: &str,
        last_speaker: Option<SpeakerId>,
    ) -> Result<ModeratorAction, InferenceError> {
        let action = action.trim().trim_matches(|c| c == '"' || c == '\'').trim();

        if action.eq_ignore_ascii_case(CLOSE_ACTION) {
            return Ok(ModeratorAction::CloseDebate);
        }

        match self.roster.find_by_name(action) {
            Some(id) if Some(id) == last_speaker => Err(InferenceError::Malformed(format!(
                "'{}' just spoke and cannot be chosen again",
                action
            ))),
            Some(id) => Ok(ModeratorAction::Speak(id)),
            None => Err(InferenceError::Malformed(format!(
                "'{}' is neither a speaker nor '{}'",
                action, CLOSE_ACTION
            ))),
        }
    }

    /// Deterministic round-robin choice: the speaker after `last_speaker`.
    pub fn fallback_next(&self, last_speaker: Option<SpeakerId>) -> SpeakerId {
        self.roster.next_after(last_speaker)
    }

    /// Summarize and comment on `utterance`.
    pub async fn analyze(
        &self,
        inference: &dyn Inference,
        retry: &RetryPolicy,
        speaker_name: &str,
        utterance: &str,
    ) -> Analysis {
        let system = format!(
            "You are a debate moderator. Summarize the following argument in one or two \
             sentences for the audience, then provide commentary to make the debate more \
             engaging. The speakers are {}. Respond ONLY in JSON with two fields: \
             'summary' and 'commentary'.",
            self.panel()
        );
        let prompt = format!(
            "Analyze the following argument by {}:\n\n{}",
            speaker_name, utterance
        );
        let request = self.request(system, prompt);

        retry
            .run_or_else(
                InferenceError::is_malformed,
                move |_| {
                    let request = request.clone();
                    async move {
                        let raw: Analysis = infer_structured(inference, request).await?;
                        Ok::<_, InferenceError>(Analysis {
                            summary: clean_optional(raw.summary),
                            commentary: clean_optional(raw.commentary),
                        })
                    }
                },
                |err| {
                    tracing::warn!(error = %err, speaker = speaker_name, "using fallback analysis");
                    Self::fallback_analysis(speaker_name)
                },
            )
            .await
    }

    /// Canned analysis naming the speaker.
    pub fn fallback_analysis(speaker_name: &str) -> Analysis {
        Analysis {
            summary: Some(format!(
                "{}'s argument was insightful but could not be summarized at this time.",
                speaker_name
            )),
            commentary: Some("The debate is heating up! Let's see what happens next.".to_string()),
        }
    }

    /// Announcement made when a phase begins.
    pub fn announce_phase(&self, phase: Phase) -> String {
        match phase {
            Phase::Opening => {
                "Let us begin with opening statements. Each speaker will present their position."
                    .to_string()
            }
            Phase::Rebuttal => {
                "The floor is now open for rebuttals. I will call on each speaker in turn."
                    .to_string()
            }
            Phase::Closing => "We are moving to the closing statements. \
                 Each speaker will summarize their position."
                .to_string(),
        }
    }

    /// Announcement made before a main-loop turn.
    pub fn announce_turn(&self, speaker: SpeakerId) -> String {
        format!(
            "Now, {} will present their argument.",
            self.roster[speaker].name()
        )
    }
}

fn clean_optional(text: Option<String>) -> Option<String> {
    text.map(|t| sanitize_response(&t)).filter(|t| !t.is_empty())
}
