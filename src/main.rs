//! Main module for the collection similarity app using Yew.
//! Owns the gateway and reference cache, wires inputs to the three operations.

use bgg_similarity::cache::ReferenceCache;
use bgg_similarity::config::GatewayConfig;
use bgg_similarity::controller::{self, CollectionSource, ErrorKind, RequestError};
use bgg_similarity::controller::{SimilarityReport, Top100Response, UserCollectionResponse};
use bgg_similarity::gateway::{BggService, BrowserTransport};
use bgg_similarity::parse::parse_collection_csv;
use bgg_similarity::utils::validate_username;
use log::info;
use std::rc::Rc;
use wasm_bindgen_futures::{spawn_local, JsFuture};
use web_sys::HtmlInputElement;
use yew::prelude::*;

mod components;
mod hooks;

use components::{render_collection, render_error, render_similarity, render_top100, UserField};
use hooks::{use_validated_input, ValidatedInput};

type Service = BggService<BrowserTransport>;

#[derive(Clone, PartialEq)]
enum View {
    Empty,
    Top100(Rc<Top100Response>),
    Collection(Rc<UserCollectionResponse>),
    Similarity(Rc<SimilarityReport>),
}

/// A collection loaded from a CSV export instead of the XML API.
#[derive(Clone, PartialEq)]
struct Imported {
    file_name: String,
    ids: Rc<Vec<String>>,
}

// ──────────────────────────────────────────────────────────────────────────────
// Helper functions

async fn read_csv_file(input: &HtmlInputElement) -> Result<Option<Imported>, String> {
    let Some(file) = input.files().and_then(|files| files.get(0)) else {
        return Ok(None);
    };
    let text = JsFuture::from(file.text())
        .await
        .map_err(|e| e.as_string().unwrap_or_else(|| format!("{:?}", e)))?;
    let ids = parse_collection_csv(&text.as_string().unwrap_or_default()).map_err(|e| e.to_string())?;
    info!("Imported {} owned games from {}", ids.len(), file.name());
    Ok(Some(Imported {
        file_name: file.name(),
        ids: Rc::new(ids),
    }))
}

/// An imported CSV replaces the lookup; the typed name, if any, labels it.
fn collection_source(text: &str, imported: &Option<Imported>) -> CollectionSource {
    match imported {
        Some(file) => CollectionSource::Imported {
            label: if text.trim().is_empty() {
                file.file_name.clone()
            } else {
                text.trim().to_string()
            },
            ids: file.ids.to_vec(),
        },
        None => CollectionSource::Remote(text.to_string()),
    }
}

fn import_callback(
    imported: UseStateHandle<Option<Imported>>,
    error: UseStateHandle<Option<RequestError>>,
) -> Callback<Event> {
    Callback::from(move |e: Event| {
        let input: HtmlInputElement = e.target_unchecked_into();
        let imported = imported.clone();
        let error = error.clone();
        spawn_local(async move {
            match read_csv_file(&input).await {
                Ok(file) => imported.set(file),
                Err(msg) => error.set(Some(
                    RequestError::new(ErrorKind::BadRequest, "Could not read collection CSV")
                        .with_details(msg),
                )),
            }
        });
    })
}

/// Shared handles every operation updates when it starts and finishes.
#[derive(Clone)]
struct Outcome {
    view: UseStateHandle<View>,
    error: UseStateHandle<Option<RequestError>>,
    loading: UseStateHandle<bool>,
    cache_version: UseStateHandle<usize>,
}

impl Outcome {
    fn start(&self) {
        self.loading.set(true);
        self.error.set(None);
    }

    fn finish<T>(&self, result: Result<T, RequestError>, to_view: impl FnOnce(T) -> View) {
        match result {
            Ok(value) => self.view.set(to_view(value)),
            Err(e) => self.error.set(Some(e)),
        }
        self.loading.set(false);
        self.cache_version.set(self.cache_version.wrapping_add(1));
    }
}

fn lookup_callback(service: Rc<Service>, outcome: Outcome, username: String) -> Callback<MouseEvent> {
    Callback::from(move |_| {
        let service = service.clone();
        let outcome = outcome.clone();
        let username = username.clone();
        outcome.start();
        spawn_local(async move {
            let result = controller::get_user_collection(&*service, &username).await;
            outcome.finish(result, |r| View::Collection(Rc::new(r)));
        });
    })
}

// ──────────────────────────────────────────────────────────────────────────────

/// Primary application component wiring state, effects, and UI elements.
#[function_component(Main)]
fn main_component() -> Html {
    let service = use_memo((), |_| {
        Service::new(
            BrowserTransport,
            Rc::new(ReferenceCache::new()),
            GatewayConfig::default(),
        )
    });

    let validator: Rc<dyn Fn(&str) -> Result<String, String>> = Rc::new(validate_username);
    let user_a: ValidatedInput = use_validated_input(validator.clone());
    let user_b: ValidatedInput = use_validated_input(validator);
    let imported_a = use_state(|| None::<Imported>);
    let imported_b = use_state(|| None::<Imported>);

    let view = use_state(|| View::Empty);
    let error = use_state(|| None::<RequestError>);
    let loading = use_state(|| false);
    // Bumped after every operation so the cache indicator re-renders
    let cache_version = use_state(|| 0usize);
    let outcome = Outcome {
        view,
        error,
        loading,
        cache_version,
    };

    let on_top100 = {
        let service = service.clone();
        let outcome = outcome.clone();
        Callback::from(move |_: MouseEvent| {
            let service = service.clone();
            let outcome = outcome.clone();
            outcome.start();
            spawn_local(async move {
                let result = controller::get_top100(&*service).await;
                outcome.finish(result, |r| View::Top100(Rc::new(r)));
            });
        })
    };

    let on_compare = {
        let service = service.clone();
        let outcome = outcome.clone();
        let source_a = collection_source(&user_a.text, &imported_a);
        let source_b = collection_source(&user_b.text, &imported_b);
        Callback::from(move |_: MouseEvent| {
            let service = service.clone();
            let outcome = outcome.clone();
            let (source_a, source_b) = (source_a.clone(), source_b.clone());
            outcome.start();
            spawn_local(async move {
                let result = controller::compare_collections(&*service, source_a, source_b).await;
                outcome.finish(result, |r| View::Similarity(Rc::new(r)));
            });
        })
    };

    let on_swap = {
        let (text_a, text_b) = (user_a.text.clone(), user_b.text.clone());
        let (set_a, set_b) = (user_a.set_text.clone(), user_b.set_text.clone());
        let (imported_a, imported_b) = (imported_a.clone(), imported_b.clone());
        Callback::from(move |_: MouseEvent| {
            set_a.emit(text_b.clone());
            set_b.emit(text_a.clone());
            let previous_a = (*imported_a).clone();
            imported_a.set((*imported_b).clone());
            imported_b.set(previous_a);
        })
    };

    let on_clear_cache = {
        let service = service.clone();
        let cache_version = outcome.cache_version.clone();
        Callback::from(move |_: MouseEvent| {
            service.cache().clear();
            cache_version.set(cache_version.wrapping_add(1));
        })
    };

    let clear_import = |imported: &UseStateHandle<Option<Imported>>| {
        let imported = imported.clone();
        Callback::from(move |_: MouseEvent| imported.set(None))
    };
    let import_summary =
        |imported: &Option<Imported>| imported.as_ref().map(|f| (f.file_name.clone(), f.ids.len()));

    let cached_entries = service.cache().len();

    html! {
        <div class="container">
            <h1>{ "Board Game Collection Similarity" }</h1>

            <div class="form-row">
                <UserField
                    id="user_a"
                    label="User A"
                    text={user_a.text.clone()}
                    error={user_a.error.clone()}
                    imported={import_summary(&*imported_a)}
                    oninput={user_a.on_text_input.clone()}
                    onchange={user_a.on_commit.clone()}
                    onimport={import_callback(imported_a.clone(), outcome.error.clone())}
                    onclearimport={clear_import(&imported_a)}
                    onlookup={lookup_callback(service.clone(), outcome.clone(), user_a.text.clone())}
                />
                <UserField
                    id="user_b"
                    label="User B"
                    text={user_b.text.clone()}
                    error={user_b.error.clone()}
                    imported={import_summary(&*imported_b)}
                    oninput={user_b.on_text_input.clone()}
                    onchange={user_b.on_commit.clone()}
                    onimport={import_callback(imported_b.clone(), outcome.error.clone())}
                    onclearimport={clear_import(&imported_b)}
                    onlookup={lookup_callback(service.clone(), outcome.clone(), user_b.text.clone())}
                />
            </div>

            <div class="actions">
                <button class="btn-primary" disabled={*outcome.loading} onclick={on_compare}>
                    { "Compare" }
                </button>
                <button class="btn-secondary" disabled={*outcome.loading} onclick={on_swap}>
                    { "Swap" }
                </button>
                <button class="btn-secondary" disabled={*outcome.loading} onclick={on_top100}>
                    { "Show Top 100" }
                </button>
            </div>

            <div class="cache-stats">
                <span class="cache-status compact">
                    { format!("Cache entries: {}", cached_entries) }
                </span>
                <button class="btn-secondary small" onclick={on_clear_cache}>
                    { "Clear Cache" }
                </button>
            </div>

            if let Some(err) = &*outcome.error {
                { render_error(err) }
            }

            <div class="results-area">
                if *outcome.loading {
                    <div class="loading">{ "Loading…" }</div>
                } else {
                    { match &*outcome.view {
                        View::Empty => html! {
                            <div class="no-results-message">
                                <p>{ "Enter two usernames and press Compare." }</p>
                            </div>
                        },
                        View::Top100(response) => render_top100(response),
                        View::Collection(response) => render_collection(response),
                        View::Similarity(report) => render_similarity(report),
                    } }
                }
            </div>
        </div>
    }
}

#[function_component]
pub fn App() -> Html {
    html! { <Main /> }
}

/// Entry point: installs the panic hook and mounts the App.
fn main() {
    console_error_panic_hook::set_once();
    yew::Renderer::<App>::new().render();
}
