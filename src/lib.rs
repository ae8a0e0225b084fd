use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use wasm_bindgen::prelude::*;

pub mod cache;
pub mod config;
pub mod controller;
pub mod gateway;
pub mod parse;
pub mod utils;

use config::TOP_N;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GameRef {
    pub id: String,
    pub name: String,
}

impl GameRef {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// Ranked reference list: at most `TOP_N` games, unique ids, rank order.
///
/// Construction drops repeated ids (the first occurrence wins) and truncates
/// to `TOP_N`, so every value of this type upholds both invariants.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<GameRef>", into = "Vec<GameRef>")]
pub struct ReferenceSet {
    games: Vec<GameRef>,
}

impl ReferenceSet {
    pub fn new(games: impl IntoIterator<Item = GameRef>) -> Self {
        let mut seen = HashSet::new();
        let mut unique = Vec::new();
        for game in games {
            if unique.len() >= TOP_N {
                break;
            }
            if seen.insert(game.id.clone()) {
                unique.push(game);
            } else {
                debug!("Duplicate reference id '{}' ignored", game.id);
            }
        }
        Self { games: unique }
    }

    pub fn games(&self) -> &[GameRef] {
        &self.games
    }

    pub fn len(&self) -> usize {
        self.games.len()
    }

    pub fn is_empty(&self) -> bool {
        self.games.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.games.iter().any(|g| g.id == id)
    }
}

impl FromIterator<GameRef> for ReferenceSet {
    fn from_iter<I: IntoIterator<Item = GameRef>>(iter: I) -> Self {
        Self::new(iter)
    }
}

impl From<Vec<GameRef>> for ReferenceSet {
    fn from(games: Vec<GameRef>) -> Self {
        Self::new(games)
    }
}

impl From<ReferenceSet> for Vec<GameRef> {
    fn from(reference: ReferenceSet) -> Self {
        reference.games
    }
}

/// Outcome of comparing two owned-id collections.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimilarityResult {
    /// Shared ids in the first collection's first-seen order.
    pub intersection_ids: Vec<String>,
    pub intersection_count: usize,
    pub union_count: usize,
    /// `|A ∩ B| / |A ∪ B|`, or `0.0` when both collections are empty.
    pub jaccard: f64,
}

/// A shared game with its reference name, `None` when the id is unranked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommonGame {
    pub id: String,
    pub name: Option<String>,
}

/// Keep only the owned ids that appear in the reference list.
///
/// Must run before [`compute_jaccard`] when the score is meant to be measured
/// against the ranked list rather than the full catalog.
pub fn restrict_to_reference<S: AsRef<str>>(owned: &[S], reference: &ReferenceSet) -> Vec<String> {
    let ranked: HashSet<&str> = reference.games().iter().map(|g| g.id.as_str()).collect();
    owned
        .iter()
        .map(|id| id.as_ref())
        .filter(|id| ranked.contains(id))
        .map(str::to_string)
        .collect()
}

/// Jaccard similarity of two id collections. Duplicates inside either input collapse.
pub fn compute_jaccard<S: AsRef<str>>(owned_a: &[S], owned_b: &[S]) -> SimilarityResult {
    let mut set_a: HashSet<&str> = HashSet::with_capacity(owned_a.len());
    let ordered_a: Vec<&str> = owned_a
        .iter()
        .map(|id| id.as_ref())
        .filter(|id| set_a.insert(*id))
        .collect();
    let set_b: HashSet<&str> = owned_b.iter().map(|id| id.as_ref()).collect();

    let intersection_ids: Vec<String> = ordered_a
        .iter()
        .filter(|id| set_b.contains(**id))
        .map(|id| id.to_string())
        .collect();
    let union_count = set_a.union(&set_b).count();
    let intersection_count = intersection_ids.len();

    let jaccard = if union_count == 0 {
        0.0
    } else {
        intersection_count as f64 / union_count as f64
    };

    debug!(
        "Jaccard: {} shared of {} distinct ids = {:.4}",
        intersection_count, union_count, jaccard
    );

    SimilarityResult {
        intersection_ids,
        intersection_count,
        union_count,
        jaccard,
    }
}

/// Attach reference names to `ids`, keeping input order and length.
///
/// If `reference` repeats an id, the first occurrence supplies the name.
pub fn map_ids_to_names<S: AsRef<str>>(ids: &[S], reference: &[GameRef]) -> Vec<CommonGame> {
    let mut names: HashMap<&str, &str> = HashMap::with_capacity(reference.len());
    for game in reference {
        names.entry(game.id.as_str()).or_insert(game.name.as_str());
    }

    ids.iter()
        .map(|id| {
            let id = id.as_ref();
            CommonGame {
                id: id.to_string(),
                name: names.get(id).map(|name| name.to_string()),
            }
        })
        .collect()
}

/// JavaScript entry point for scoring two raw collections against a reference list.
///
/// # Arguments
/// * `reference_js` - Array of `{ id, name }` in rank order
/// * `owned_a_js` / `owned_b_js` - Arrays of owned game ids (unfiltered)
///
/// # Returns
/// The `similarity` block of a comparison report, or throws with a message
/// when an argument cannot be deserialized.
#[wasm_bindgen(js_name = computeSimilarity)]
pub fn compute_similarity_js(
    reference_js: JsValue,
    owned_a_js: JsValue,
    owned_b_js: JsValue,
) -> Result<JsValue, JsValue> {
    let reference: ReferenceSet = serde_wasm_bindgen::from_value(reference_js)
        .map_err(|e| JsValue::from_str(&format!("Failed to deserialize reference list: {}", e)))?;
    let owned_a: Vec<String> = serde_wasm_bindgen::from_value(owned_a_js)
        .map_err(|e| JsValue::from_str(&format!("Failed to deserialize first collection: {}", e)))?;
    let owned_b: Vec<String> = serde_wasm_bindgen::from_value(owned_b_js)
        .map_err(|e| JsValue::from_str(&format!("Failed to deserialize second collection: {}", e)))?;

    let stats = controller::score_collections(&reference, &owned_a, &owned_b).similarity;
    serde_wasm_bindgen::to_value(&stats).map_err(|e| JsValue::from_str(&e.to_string()))
}
