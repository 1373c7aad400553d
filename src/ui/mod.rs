use leptos::*;
use crate::core::io::{KeyValueStorage, MemoryStorage, WebLocalStorage};
use crate::core::state::FlowchartState;
use crate::services::narration::{load_timestamps, timestamps_url, HttpTimestampSource};
use crate::services::persistence::{resume_from_local_storage, AutoSave};
use std::rc::Rc;
use wasm_bindgen::JsCast;

const TIMESTAMPS_PATH: &str = "/timestamps.txt";
const NODES_PATH: &str = "/flowchart.json";
const NARRATION_AUDIO: &str = "/narration.mp3";

fn origin() -> String {
    window().location().origin().unwrap_or_default()
}

async fn fetch_nodes(url: String) -> anyhow::Result<String> {
    let resp = reqwest::get(url).await?;
    if !resp.status().is_success() {
        anyhow::bail!("Flowchart request failed with status {}", resp.status().as_u16());
    }
    Ok(resp.text().await?)
}

#[component]
pub fn App() -> impl IntoView {
    let storage: Rc<dyn KeyValueStorage> = match WebLocalStorage::new() {
        Ok(s) => Rc::new(s),
        Err(e) => {
            leptos::logging::error!("Local storage unavailable, progress will not persist: {:?}", e);
            Rc::new(MemoryStorage::new())
        }
    };

    let mut initial = FlowchartState::default();
    if let Err(e) = resume_from_local_storage(&mut initial, storage.as_ref()) {
        leptos::logging::error!("Failed to resume previous session: {:?}", e);
    }
    let state = create_rw_signal(initial);

    create_effect(move |_| {
        spawn_local(async move {
            match timestamps_url(&origin(), TIMESTAMPS_PATH) {
                Ok(url) => {
                    let result = load_timestamps(&HttpTimestampSource::new(), &url).await;
                    state.update(|s| s.apply_timestamps(result));
                }
                Err(e) => state.update(|s| s.apply_timestamps(Err(e))),
            }
        });
    });

    create_effect(move |_| {
        spawn_local(async move {
            let url = format!("{}{}", origin(), NODES_PATH);
            match fetch_nodes(url).await {
                Ok(json) => state.update(|s| {
                    if let Err(e) = s.load_nodes_json(&json) {
                        leptos::logging::error!("{:?}", e);
                    }
                }),
                Err(e) => leptos::logging::error!("Failed to load flowchart: {:?}", e),
            }
        });
    });

    let auto_save = Rc::new(AutoSave::new());
    let storage_for_save = storage.clone();
    let auto_save_for_effect = auto_save.clone();
    create_effect(move |_| {
        state.with(|s| {
            if let Err(e) = auto_save_for_effect.save(s, storage_for_save.as_ref()) {
                leptos::logging::error!("Failed to save state: {:?}", e);
            }
        });
    });

    // The signal is left alone here; the reload brings back fresh defaults.
    let on_reset = move |_| {
        if let Err(e) = auto_save.halt_and_clear(storage.as_ref()) {
            leptos::logging::error!("Failed to clear: {:?}", e);
            return;
        }
        if let Err(e) = window().location().reload() {
            leptos::logging::error!("Failed to reload: {:?}", e);
        }
    };

    view! {
        <div class="flowchart-app">
            <NarrationPlayer state=state/>
            <NodeView state=state/>
            <Show when=move || state.with(|s| s.reset_action_available)>
                <button class="reset" on:click=on_reset.clone()>"Start over"</button>
            </Show>
            <Show when=move || state.with(|s| s.feedback_prompt_available())>
                <p class="feedback-prompt">"You have explored a lot. Tell us what you think!"</p>
            </Show>
        </div>
    }
}

#[component]
pub fn NarrationPlayer(state: RwSignal<FlowchartState>) -> impl IntoView {
    let media = |ev: &web_sys::Event| -> Option<web_sys::HtmlMediaElement> {
        ev.target().and_then(|t| t.dyn_into::<web_sys::HtmlMediaElement>().ok())
    };

    let audio_ref = create_node_ref::<html::Audio>();

    // Moves the element to positions set by a jump or a resumed session.
    create_effect(move |_| {
        let pending = state.with(|s| s.pending_seek);
        if let (Some(position), Some(audio)) = (pending, audio_ref.get()) {
            audio.set_current_time(position);
            state.update(|s| {
                s.take_pending_seek();
            });
        }
    });

    let on_time = move |ev: web_sys::Event| {
        if let Some(el) = media(&ev) {
            state.update(|s| {
                s.report_media_time(el.current_time(), el.duration().max(0.0));
                s.mark_current_timestamp_listened();
            });
        }
    };
    let on_duration = move |ev: web_sys::Event| {
        if let Some(el) = media(&ev) {
            state.update(|s| s.playback_duration = el.duration().max(0.0));
        }
    };

    view! {
        <Show when=move || state.with(|s| s.narration_enabled)>
            <div class="narration">
                <audio
                    node_ref=audio_ref
                    src=NARRATION_AUDIO
                    controls=true
                    on:timeupdate=on_time
                    on:durationchange=on_duration
                    on:play=move |_| state.update(|s| s.playback_active = true)
                    on:pause=move |_| state.update(|s| s.playback_active = false)
                    on:waiting=move |_| state.update(|s| s.media_buffering = true)
                    on:playing=move |_| state.update(|s| s.media_buffering = false)
                ></audio>
                <div class="progress" style:width=move || format!("{}%", state.with(|s| s.playback_progress()) * 100.0)></div>
                <span class="time">
                    {move || state.with(|s| format!("{} / {}", s.pretty_playback_position(), s.pretty_playback_duration()))}
                </span>
                <Show when=move || state.with(|s| s.media_buffering)>
                    <span class="buffering">"Buffering..."</span>
                </Show>
            </div>
        </Show>
    }
}

#[component]
pub fn NodeView(state: RwSignal<FlowchartState>) -> impl IntoView {
    let on_jump = move |_| {
        state.update(|s| {
            s.jump_narration_to_node();
        });
    };

    view! {
        <div class="node">
            {move || state.with(|s| match s.current_node() {
                Some(node) => {
                    let links = node.links.clone();
                    view! {
                        <h2>{node.title.clone()}</h2>
                        <p>{node.body.clone().unwrap_or_default()}</p>
                        <ul>
                            {links.into_iter().map(|id| {
                                let target = id.clone();
                                view! {
                                    <li><button on:click=move |_| state.update(|s| s.navigate_to(&target))>{id}</button></li>
                                }
                            }).collect_view()}
                        </ul>
                    }.into_view()
                }
                None => view! { <p>"Loading..."</p> }.into_view(),
            })}
            <Show when=move || state.with(|s| s.jump_action_available())>
                <button class="jump" on:click=on_jump>"Play narration from here"</button>
            </Show>
        </div>
    }
}
