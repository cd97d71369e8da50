// Bot update scheduling under a per-frame budget.
//
// Every registered bot gets a cheap upkeep call every tick. Full updates
// (path following plus locomotion) are due every `update_interval_ticks`,
// staggered by each bot's registration slot so a population does not update
// all at once. Within a frame, due bots run in order until the summed cost
// of the updates so far exceeds `frame_budget_ms`; the remaining due bots
// "slide" to the next tick. The frame starts at index `tick % len` of the
// bot list and wraps, so the bots that slide change from tick to tick. A bot that has slid `max_update_slides` times
// in a row runs regardless of budget, so no bot starves.
//
// The scheduler never measures time itself: the update closure reports the
// cost of each update, which the sim derives from its config. The same
// inputs therefore always produce the same schedule.
//
// See also: `sim.rs` (drives `run_frame` once per tick), `config.rs`
// (`SchedulerConfig`).

use crate::config::SchedulerConfig;
use crate::types::BotId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

#[derive(Clone, Debug, Serialize, Deserialize)]
struct ScheduleEntry {
    slot: u64,
    /// A full update is due and has not run yet.
    due: bool,
    /// Consecutive frames this bot was deferred.
    slides: u32,
}

/// What happened in one frame.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FrameReport {
    pub updated: Vec<BotId>,
    pub slid: Vec<BotId>,
    /// Bots updated past the budget because they hit the slide limit.
    pub forced: Vec<BotId>,
    pub spent_ms: f32,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BotScheduler {
    config: SchedulerConfig,
    entries: BTreeMap<BotId, ScheduleEntry>,
    next_slot: u64,
}

impl BotScheduler {
    pub fn new(config: SchedulerConfig) -> Self {
        Self {
            config,
            entries: BTreeMap::new(),
            next_slot: 0,
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Consecutive slides recorded for `bot`.
    pub fn slides(&self, bot: BotId) -> Option<u32> {
        self.entries.get(&bot).map(|e| e.slides)
    }

    /// Run one frame over `bots`, starting at `tick % bots.len()` and
    /// wrapping. Bots seen for the first time are registered; bots no longer
    /// present are dropped.
    pub fn run_frame(
        &mut self,
        tick: u64,
        bots: &[BotId],
        mut upkeep: impl FnMut(BotId),
        mut update: impl FnMut(BotId) -> f32,
    ) -> FrameReport {
        self.entries.retain(|id, _| bots.contains(id));
        for &bot in bots {
            if !self.entries.contains_key(&bot) {
                self.entries.insert(
                    bot,
                    ScheduleEntry {
                        slot: self.next_slot,
                        due: false,
                        slides: 0,
                    },
                );
                self.next_slot += 1;
            }
        }

        for &bot in bots {
            upkeep(bot);
        }

        let interval = self.config.update_interval_ticks.max(1);
        for entry in self.entries.values_mut() {
            if (tick + entry.slot) % interval == 0 {
                entry.due = true;
            }
        }

        let start = if bots.is_empty() {
            0
        } else {
            (tick % bots.len() as u64) as usize
        };
        let mut report = FrameReport::default();
        for &bot in bots[start..].iter().chain(&bots[..start]) {
            let Some(entry) = self.entries.get_mut(&bot) else {
                continue;
            };
            if !entry.due {
                continue;
            }
            let over_budget = report.spent_ms > self.config.frame_budget_ms;
            if over_budget && entry.slides < self.config.max_update_slides {
                entry.slides += 1;
                report.slid.push(bot);
                continue;
            }
            if over_budget {
                report.forced.push(bot);
            }
            entry.due = false;
            entry.slides = 0;
            report.spent_ms += update(bot).max(0.0);
            report.updated.push(bot);
        }

        if !report.slid.is_empty() || !report.forced.is_empty() {
            debug!(
                tick,
                slid = report.slid.len(),
                forced = report.forced.len(),
                spent_ms = report.spent_ms,
                "bot updates over frame budget"
            );
        }
        report
    }
}
