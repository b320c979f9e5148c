use bevy::log::info;

use crate::adapter::{Adapters, EpisodeSignal};
use crate::config::DungeonConfig;
use crate::error::Result;
use crate::event::Event;
use crate::progression::ProgressionState;
use crate::room::RoomRegistry;

/// How an episode ended.
#[derive(Clone, Debug, PartialEq)]
pub struct EpisodeSummary {
    pub episode: u32,
    pub reward: f32,
    pub steps: u32,
    /// Room the agent is in once the episode is over.
    pub room_index: usize,
    pub cleared_dungeon: bool,
    /// Ended by the step budget rather than by the progression rules.
    pub truncated: bool,
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct StepReport {
    pub reward: f32,
    /// Episode total including `reward`.
    pub cumulative: f32,
    pub terminal: bool,
    pub truncated: bool,
}

/// RL-loop wrapper around [`ProgressionState`]: accumulates reward, enforces
/// the step budget and starts the next episode as soon as one ends.
#[derive(Clone, Debug)]
pub struct EpisodeDriver {
    progression: ProgressionState,
    max_steps: u32,
    episode: u32,
    steps: u32,
    cumulative: f64,
    started: bool,
    last_summary: Option<EpisodeSummary>,
}

impl EpisodeDriver {
    pub fn new(progression: ProgressionState) -> Self {
        Self {
            max_steps: progression.config().max_steps,
            progression,
            episode: 0,
            steps: 0,
            cumulative: 0.0,
            started: false,
            last_summary: None,
        }
    }

    pub fn from_config(config: &DungeonConfig) -> Result<Self> {
        let registry = RoomRegistry::from_layout(&config.layout)?;
        let progression = ProgressionState::new(registry, config.progression.clone())?;
        Ok(Self::new(progression))
    }

    pub fn progression(&self) -> &ProgressionState {
        &self.progression
    }

    /// Episodes begun so far, including the one running.
    pub fn episode(&self) -> u32 {
        self.episode
    }

    pub fn steps(&self) -> u32 {
        self.steps
    }

    pub fn cumulative_reward(&self) -> f32 {
        self.cumulative as f32
    }

    pub fn last_summary(&self) -> Option<&EpisodeSummary> {
        self.last_summary.as_ref()
    }

    pub fn begin(&mut self, adapters: &mut Adapters) -> Result<()> {
        self.progression.begin_episode(adapters)?;
        self.episode += 1;
        self.steps = 0;
        self.cumulative = 0.0;
        self.started = true;
        Ok(())
    }

    pub fn handle(
        &mut self,
        event: Event,
        adapters: &mut Adapters,
        signal: &mut dyn EpisodeSignal,
    ) -> Result<StepReport> {
        if !self.started || event == Event::EpisodeReset {
            self.begin(adapters)?;
            if event == Event::EpisodeReset {
                return Ok(StepReport::default());
            }
        }

        let outcome = self.progression.handle(event, adapters)?;
        self.cumulative += outcome.delta as f64;
        if matches!(event, Event::StepTick(_)) {
            self.steps += 1;
        }

        let truncated = !outcome.terminal && self.steps >= self.max_steps;
        let report = StepReport {
            reward: outcome.delta,
            cumulative: self.cumulative as f32,
            terminal: outcome.terminal || truncated,
            truncated,
        };

        if report.terminal {
            let summary = EpisodeSummary {
                episode: self.episode,
                reward: report.cumulative,
                steps: self.steps,
                room_index: self.progression.state().room_index,
                cleared_dungeon: outcome.terminal && event == Event::GoalContact,
                truncated,
            };
            info!(
                "📊 Episode {} ended after {} steps: reward {:.3}, room {}{}",
                summary.episode,
                summary.steps,
                summary.reward,
                summary.room_index,
                if summary.cleared_dungeon {
                    " (dungeon cleared)"
                } else if summary.truncated {
                    " (step budget)"
                } else {
                    ""
                }
            );
            signal.end_episode(&summary);
            self.last_summary = Some(summary);
            self.begin(adapters)?;
        }

        Ok(report)
    }
}
