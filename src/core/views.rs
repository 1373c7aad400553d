//! Read-only values derived from [`FlowchartState`], recomputed on every call.

use crate::core::state::{FlowchartNode, FlowchartState};
use crate::utils::time::format_time;

/// Revealed-item count at which the feedback prompt appears.
pub const FEEDBACK_PROMPT_THRESHOLD: usize = 64;

/// Keeps the progress bar visible as soon as playback has started.
const MIN_VISIBLE_PROGRESS: f64 = 0.015;

impl FlowchartState {
    /// Fraction of the media played, rounded to three decimals.
    pub fn playback_progress(&self) -> f64 {
        if self.playback_duration != 0.0 && self.playback_position != 0.0 {
            let rounded = (self.playback_position / self.playback_duration * 1000.0).round() / 1000.0;
            rounded.max(MIN_VISIBLE_PROGRESS)
        } else {
            0.0
        }
    }

    pub fn pretty_playback_duration(&self) -> String {
        format_time(self.playback_duration)
    }

    pub fn pretty_playback_position(&self) -> String {
        format_time(self.playback_position)
    }

    pub fn current_node(&self) -> Option<&FlowchartNode> {
        self.flowchart_nodes.get(&self.current_node_id)
    }

    /// Index of the cue playing at the current position.
    pub fn current_narration_node_index(&self) -> usize {
        let next = self
            .narration_timestamps
            .iter()
            .position(|t| t.offset_seconds() > self.playback_position);

        match next {
            Some(index) => index.saturating_sub(1),
            None => self.narration_timestamps.len().saturating_sub(1),
        }
    }

    pub fn current_narration_node_id(&self) -> Option<&str> {
        self.narration_timestamps
            .get(self.current_narration_node_index())
            .map(|t| t.node_id())
    }

    pub fn current_narration_node(&self) -> Option<&FlowchartNode> {
        self.current_narration_node_id()
            .and_then(|id| self.flowchart_nodes.get(id))
    }

    pub fn moved_away_from_narration(&self) -> bool {
        !self.playback_active && self.current_narration_node_id() != Some(self.current_node_id.as_str())
    }

    pub fn jump_action_available(&self) -> bool {
        self.moved_away_from_narration()
            && self
                .narration_timestamps
                .iter()
                .any(|t| t.node_id() == self.current_node_id)
    }

    pub fn feedback_prompt_available(&self) -> bool {
        self.revealed_items.len() >= FEEDBACK_PROMPT_THRESHOLD
    }
}
