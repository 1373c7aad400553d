#[cfg(not(target_arch = "wasm32"))]
use anyhow::{Context, Result};
#[cfg(not(target_arch = "wasm32"))]
use narrated_flowchart::core::config::Config;
#[cfg(not(target_arch = "wasm32"))]
use narrated_flowchart::core::io::NativeStorage;
#[cfg(not(target_arch = "wasm32"))]
use narrated_flowchart::core::state::FlowchartState;
#[cfg(not(target_arch = "wasm32"))]
use narrated_flowchart::services::narration::{fetch_timestamps, timestamps_url, HttpTimestampSource};
#[cfg(not(target_arch = "wasm32"))]
use narrated_flowchart::services::persistence::{resume_from_local_storage, save_to_local_storage};

#[cfg(target_arch = "wasm32")]
fn main() {}

#[cfg(not(target_arch = "wasm32"))]
#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let config = match Config::load() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Error loading config: {:#}", e);
            return Err(e);
        }
    };

    // Optional first argument: playback position in seconds reported by the player.
    let position = std::env::args()
        .nth(1)
        .map(|arg| arg.parse::<f64>().with_context(|| format!("Invalid playback position: {}", arg)))
        .transpose()?;

    let mut state = FlowchartState::default();
    if let Some(nodes_file) = &config.nodes_file {
        let json = std::fs::read_to_string(nodes_file)
            .with_context(|| format!("Failed to read {}", nodes_file))?;
        state.load_nodes_json(&json)?;
    }

    let storage = NativeStorage::open(&config.storage_file)?;
    resume_from_local_storage(&mut state, &storage)?;

    let url = timestamps_url(&config.base_url, &config.timestamps_path)?;
    fetch_timestamps(&mut state, &HttpTimestampSource::new(), &url).await;

    if let Some(position) = position {
        state.playback_position = position;
        state.mark_current_timestamp_listened();
    }
    save_to_local_storage(&state, &storage)?;

    let title = state.current_node().map(|n| n.title.as_str()).unwrap_or("<unknown>");
    println!("Current node:   {} ({})", state.current_node_id, title);
    println!(
        "Narration:      {} ({} cues, at {:?})",
        if state.narration_enabled { "enabled" } else { "disabled" },
        state.narration_timestamps.len(),
        state.current_narration_node_id()
    );
    println!(
        "Playback:       {} / {} ({:.1}%)",
        state.pretty_playback_position(),
        state.pretty_playback_duration(),
        state.playback_progress() * 100.0
    );
    println!("Revealed items: {}", state.revealed_items.len());
    if state.jump_action_available() {
        println!("Jump back to narration is available");
    }
    if state.feedback_prompt_available() {
        println!("Feedback prompt is available");
    }

    Ok(())
}
