use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

pub const INITIAL_NODE_ID: &str = "n-001";

#[derive(Serialize, Deserialize, Default, Clone, Debug, PartialEq)]
pub struct FlowchartNode {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub links: Vec<String>, // ids of follow-up nodes
}

/// One narration cue: offset into the media in seconds, and the node it narrates.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct NarrationTimestamp(pub f64, pub String);

impl NarrationTimestamp {
    pub fn new(offset_seconds: f64, node_id: impl Into<String>) -> Self {
        Self(offset_seconds, node_id.into())
    }

    pub fn offset_seconds(&self) -> f64 {
        self.0
    }

    pub fn node_id(&self) -> &str {
        &self.1
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct FlowchartState {
    pub flowchart_nodes: HashMap<String, FlowchartNode>,
    pub current_node_id: String,
    pub teased_items: Vec<String>,
    pub revealed_items: Vec<String>,

    pub narration_enabled: bool,
    pub narration_timestamps: Vec<NarrationTimestamp>,
    pub listened_timestamp_indexes: BTreeSet<usize>,

    pub playback_duration: f64,
    pub playback_position: f64,
    pub playback_active: bool,
    pub media_buffering: bool,

    pub exploring_during_playback: bool,

    /// Position the media element still has to be moved to.
    pub pending_seek: Option<f64>,

    pub resumed_from_local_storage: bool,
    pub reset_action_available: bool,
}

impl Default for FlowchartState {
    fn default() -> Self {
        Self {
            flowchart_nodes: HashMap::new(),
            current_node_id: INITIAL_NODE_ID.to_string(),
            teased_items: Vec::new(),
            revealed_items: Vec::new(),
            narration_enabled: true,
            narration_timestamps: Vec::new(),
            listened_timestamp_indexes: BTreeSet::new(),
            playback_duration: 0.0,
            playback_position: 0.0,
            playback_active: false,
            media_buffering: false,
            exploring_during_playback: false,
            pending_seek: None,
            resumed_from_local_storage: false,
            reset_action_available: false,
        }
    }
}

impl FlowchartState {
    pub fn new(flowchart_nodes: HashMap<String, FlowchartNode>) -> Self {
        Self {
            flowchart_nodes,
            ..Self::default()
        }
    }

    /// Replaces the node graph from a JSON object keyed by node id.
    pub fn load_nodes_json(&mut self, json: &str) -> Result<()> {
        let nodes: HashMap<String, FlowchartNode> =
            serde_json::from_str(json).context("Failed to parse flowchart nodes")?;
        log::debug!("Loaded {} flowchart nodes", nodes.len());
        self.flowchart_nodes = nodes;
        Ok(())
    }

    /// Back to fresh-session defaults. The node graph is supplied from outside and survives.
    pub fn reset(&mut self) {
        let nodes = std::mem::take(&mut self.flowchart_nodes);
        *self = Self::new(nodes);
    }

    pub fn tease_item(&mut self, item_id: &str) {
        if !self.teased_items.iter().any(|i| i == item_id) {
            self.teased_items.push(item_id.to_string());
        }
    }

    pub fn reveal_item(&mut self, item_id: &str) {
        if !self.revealed_items.iter().any(|i| i == item_id) {
            self.revealed_items.push(item_id.to_string());
        }
    }

    pub fn mark_current_timestamp_listened(&mut self) {
        if !self.narration_timestamps.is_empty() {
            let index = self.current_narration_node_index();
            self.listened_timestamp_indexes.insert(index);
        }
    }

    /// Reported by the media player on each tick.
    pub fn update_playback(&mut self, position: f64, duration: f64) {
        self.playback_position = position;
        self.playback_duration = duration;
    }

    /// Sets the position and asks the media player to follow.
    pub fn seek_to(&mut self, position: f64) {
        self.playback_position = position;
        self.pending_seek = Some(position);
    }

    pub fn take_pending_seek(&mut self) -> Option<f64> {
        self.pending_seek.take()
    }

    /// Time reported by the media element. Ignored while a seek is still pending,
    /// since the element has not caught up with it yet.
    pub fn report_media_time(&mut self, position: f64, duration: f64) {
        self.playback_duration = duration;
        if self.pending_seek.is_none() {
            self.playback_position = position;
        }
    }

    pub fn navigate_to(&mut self, node_id: &str) {
        self.current_node_id = node_id.to_string();
        if self.playback_active {
            self.exploring_during_playback = self.current_narration_node_id() != Some(node_id);
        }
    }

    /// Moves playback to the first cue narrating the current node.
    pub fn jump_narration_to_node(&mut self) -> bool {
        if !self.jump_action_available() {
            return false;
        }
        let target = self
            .narration_timestamps
            .iter()
            .find(|t| t.node_id() == self.current_node_id)
            .map(NarrationTimestamp::offset_seconds);

        match target {
            Some(offset) => {
                log::debug!("Jumping narration to {} at {}s", self.current_node_id, offset);
                self.seek_to(offset);
                self.exploring_during_playback = false;
                true
            }
            None => false,
        }
    }

    pub fn apply_timestamps(&mut self, result: Result<Vec<NarrationTimestamp>>) {
        match result {
            Ok(timestamps) => {
                log::info!("Loaded {} narration timestamps", timestamps.len());
                self.narration_timestamps = timestamps;
            }
            Err(e) => {
                log::error!("Failed to load narration timestamps: {:#}", e);
                self.narration_timestamps = vec![NarrationTimestamp::new(0.0, INITIAL_NODE_ID)];
                self.narration_enabled = false;
            }
        }
    }
}
