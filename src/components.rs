//! Stateless Yew views for the similarity UI.
//!
//! Everything here renders from props or plain response records; state and
//! side effects live in `main.rs`.

use bgg_similarity::controller::{
    RequestError, SimilarityReport, Top100Response, UserCollectionResponse,
};
use bgg_similarity::CommonGame;
use yew::prelude::*;

/// Renders the ranked reference list.
pub fn render_top100(response: &Top100Response) -> Html {
    html! {
        <div class="results">
            <h3>{ format!("Top {} ranked games", response.count) }</h3>
            <table class="game-table">
                <thead>
                    <tr>
                        <th>{ "Rank" }</th>
                        <th>{ "ID" }</th>
                        <th>{ "Name" }</th>
                    </tr>
                </thead>
                <tbody>
                    { response.games.iter().enumerate().map(|(rank, game)| html! {
                        <tr>
                            <td>{ rank + 1 }</td>
                            <td>{ &game.id }</td>
                            <td>{ &game.name }</td>
                        </tr>
                    }).collect::<Html>() }
                </tbody>
            </table>
        </div>
    }
}

pub fn render_collection(response: &UserCollectionResponse) -> Html {
    if response.game_ids.is_empty() {
        return html! {
            <div class="results">
                <p class="no-results-message">
                    { format!("{} owns no games, or the collection is not visible.", response.username) }
                </p>
            </div>
        };
    }

    html! {
        <div class="results">
            <h3>{ format!("{} owns {} games", response.username, response.game_count) }</h3>
            <ul class="id-list">
                { response.game_ids.iter().map(|id| html! { <li>{ id }</li> }).collect::<Html>() }
            </ul>
        </div>
    }
}

fn render_common_game(game: &CommonGame) -> Html {
    html! {
        <tr>
            <td>{ &game.id }</td>
            <td>{ game.name.as_deref().unwrap_or("(not ranked)") }</td>
        </tr>
    }
}

/// Renders a comparison report: score, counts and the shared games.
pub fn render_similarity(report: &SimilarityReport) -> Html {
    let stats = &report.similarity;
    html! {
        <div class="results">
            <div class="similarity-status">
                { format!("Jaccard Similarity: {} ({})", stats.jaccard_percent, stats.jaccard_score) }
            </div>
            <div class="similarity-summary">
                <p>{ format!("Reference list: {} games", report.metadata.top100_count) }</p>
                <p>{ format!("{} owns {} of them", report.user_a.username, report.user_a.owned_top100_count) }</p>
                <p>{ format!("{} owns {} of them", report.user_b.username, report.user_b.owned_top100_count) }</p>
                <p>{ format!("Shared: {} of {} distinct games", stats.intersection_count, stats.union_count) }</p>
            </div>
            if stats.common_games.is_empty() {
                <p class="no-results-message">{ "No ranked games in common." }</p>
            } else {
                <table class="game-table">
                    <thead>
                        <tr>
                            <th>{ "ID" }</th>
                            <th>{ "Name" }</th>
                        </tr>
                    </thead>
                    <tbody>
                        { stats.common_games.iter().map(render_common_game).collect::<Html>() }
                    </tbody>
                </table>
            }
        </div>
    }
}

pub fn render_error(error: &RequestError) -> Html {
    html! {
        <div class="current-error">
            <strong>{ format!("{} · {}", error.status_code(), error.error) }</strong>
            if let Some(details) = &error.details {
                <div class="error-details">{ details }</div>
            }
        </div>
    }
}

/// One username field with an optional collection CSV import.
#[derive(Properties, PartialEq)]
pub struct UserFieldProps {
    pub id: AttrValue,
    pub label: AttrValue,
    pub text: String,
    pub error: Option<String>,
    /// Name and id count of an imported CSV, when one replaces the lookup.
    pub imported: Option<(String, usize)>,
    pub oninput: Callback<InputEvent>,
    pub onchange: Callback<Event>,
    pub onimport: Callback<Event>,
    pub onclearimport: Callback<MouseEvent>,
    pub onlookup: Callback<MouseEvent>,
}

#[function_component(UserField)]
pub fn user_field(props: &UserFieldProps) -> Html {
    let file_id = format!("{}_csv", props.id);
    html! {
        <div class="form-group">
            <label for={props.id.clone()}>{ props.label.clone() }</label>
            <div class="input-with-action">
                <input
                    type="text"
                    id={props.id.clone()}
                    value={props.text.clone()}
                    class={if props.error.is_some() { "invalid" } else { "" }}
                    placeholder="BoardGameGeek username"
                    oninput={props.oninput.clone()}
                    onchange={props.onchange.clone()}
                />
                <button class="btn-secondary small" onclick={props.onlookup.clone()}>
                    { "Collection" }
                </button>
            </div>
            if let Some(ref err) = props.error {
                <div class="input-error">{ err }</div>
            }
            <div class="csv-import">
                <label for={file_id.clone()}>{ "or import collection CSV:" }</label>
                <input type="file" id={file_id} accept=".csv,text/csv" onchange={props.onimport.clone()} />
                if let Some((ref name, count)) = props.imported {
                    <span class="import-summary">{ format!("{} ({} games)", name, count) }</span>
                    <button class="btn-secondary small" onclick={props.onclearimport.clone()}>
                        { "Remove" }
                    </button>
                }
            </div>
        </div>
    }
}
