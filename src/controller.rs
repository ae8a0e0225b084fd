//! Orchestration of the three user-facing operations.
//!
//! Each operation drives the gateway, runs the similarity engine where needed
//! and returns a serializable response record. Failures come back as a
//! [`RequestError`] carrying a category, a headline and optional details.

use crate::cache::Clock;
use crate::gateway::{BggService, FetchError, Transport};
use crate::utils::{format_percent, round_to, validate_username};
use crate::{compute_jaccard, map_ids_to_names, restrict_to_reference};
use crate::{CommonGame, GameRef, ReferenceSet, SimilarityResult};
use log::{debug, info, warn};
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    BadRequest,
    Forbidden,
    NotFound,
    Internal,
}

impl ErrorKind {
    pub fn status_code(self) -> u16 {
        match self {
            ErrorKind::BadRequest => 400,
            ErrorKind::Forbidden => 403,
            ErrorKind::NotFound => 404,
            ErrorKind::Internal => 500,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequestError {
    #[serde(skip)]
    pub kind: ErrorKind,
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl RequestError {
    pub fn new(kind: ErrorKind, error: impl Into<String>) -> Self {
        Self {
            kind,
            error: error.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl ToString) -> Self {
        self.details = Some(details.to_string());
        self
    }

    pub fn status_code(&self) -> u16 {
        self.kind.status_code()
    }
}

impl fmt::Display for RequestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.details {
            Some(details) => write!(f, "{}: {}", self.error, details),
            None => write!(f, "{}", self.error),
        }
    }
}

impl std::error::Error for RequestError {}

/// Where one side of a comparison gets its owned ids from.
#[derive(Debug, Clone, PartialEq)]
pub enum CollectionSource {
    /// Fetch the collection of this username.
    Remote(String),
    /// Ids already loaded, e.g. from a collection CSV export.
    Imported { label: String, ids: Vec<String> },
}

impl CollectionSource {
    fn validated_label(&self) -> Result<String, String> {
        match self {
            CollectionSource::Remote(username) => validate_username(username),
            CollectionSource::Imported { label, .. } => Ok(label.clone()),
        }
    }

    fn is_blank(&self) -> bool {
        matches!(self, CollectionSource::Remote(username) if username.trim().is_empty())
    }
}

const INVALID_USERNAME: &str = "Invalid username parameter";

/// Headline for a rejected username: `missing` when it is blank.
fn username_rejection(raw_is_blank: bool, missing: &str, details: String) -> RequestError {
    let headline = if raw_is_blank { missing } else { INVALID_USERNAME };
    RequestError::new(ErrorKind::BadRequest, headline).with_details(details)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Top100Response {
    pub count: usize,
    pub games: Vec<GameRef>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserCollectionResponse {
    pub username: String,
    pub game_count: usize,
    pub game_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportMetadata {
    pub top100_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserSummary {
    pub username: String,
    pub owned_top100_count: usize,
}

/// Rendered similarity figures, rounded for display.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimilarityStats {
    pub jaccard_score: f64,
    pub jaccard_percent: String,
    pub intersection_count: usize,
    pub union_count: usize,
    pub common_games: Vec<CommonGame>,
}

impl SimilarityStats {
    pub fn new(result: &SimilarityResult, common_games: Vec<CommonGame>) -> Self {
        Self {
            jaccard_score: round_to(result.jaccard, 4),
            jaccard_percent: format_percent(result.jaccard),
            intersection_count: result.intersection_count,
            union_count: result.union_count,
            common_games,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimilarityReport {
    pub metadata: ReportMetadata,
    #[serde(rename = "userA")]
    pub user_a: UserSummary,
    #[serde(rename = "userB")]
    pub user_b: UserSummary,
    pub similarity: SimilarityStats,
}

/// Both collections restricted to the reference list, and their score.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredCollections {
    pub owned_a: Vec<String>,
    pub owned_b: Vec<String>,
    pub similarity: SimilarityStats,
}

/// Restrict two raw collections to the reference list and score them.
pub fn score_collections<S: AsRef<str>>(
    reference: &ReferenceSet,
    raw_a: &[S],
    raw_b: &[S],
) -> ScoredCollections {
    let owned_a = restrict_to_reference(raw_a, reference);
    let owned_b = restrict_to_reference(raw_b, reference);
    let result = compute_jaccard(&owned_a, &owned_b);
    let common_games = map_ids_to_names(&result.intersection_ids, reference.games());

    ScoredCollections {
        similarity: SimilarityStats::new(&result, common_games),
        owned_a,
        owned_b,
    }
}

pub fn build_similarity_report<S: AsRef<str>>(
    reference: &ReferenceSet,
    user_a: &str,
    raw_a: &[S],
    user_b: &str,
    raw_b: &[S],
) -> SimilarityReport {
    let scored = score_collections(reference, raw_a, raw_b);
    SimilarityReport {
        metadata: ReportMetadata {
            top100_count: reference.len(),
        },
        user_a: UserSummary {
            username: user_a.to_string(),
            owned_top100_count: scored.owned_a.len(),
        },
        user_b: UserSummary {
            username: user_b.to_string(),
            owned_top100_count: scored.owned_b.len(),
        },
        similarity: scored.similarity,
    }
}

pub async fn get_top100<T: Transport, C: Clock>(
    service: &BggService<T, C>,
) -> Result<Top100Response, RequestError> {
    match service.fetch_top100().await {
        Ok(reference) => Ok(Top100Response {
            count: reference.len(),
            games: reference.games().to_vec(),
        }),
        Err(e) => {
            warn!("Error fetching top 100: {}", e);
            Err(RequestError::new(ErrorKind::Internal, "Failed to fetch top 100 games").with_details(e))
        }
    }
}

pub async fn get_user_collection<T: Transport, C: Clock>(
    service: &BggService<T, C>,
    username: &str,
) -> Result<UserCollectionResponse, RequestError> {
    let username = validate_username(username).map_err(|msg| {
        username_rejection(username.trim().is_empty(), "Username parameter is required", msg)
    })?;

    match service.fetch_user_collection(&username).await {
        Ok(game_ids) => Ok(UserCollectionResponse {
            game_count: game_ids.len(),
            username,
            game_ids,
        }),
        Err(e) => {
            warn!("Error fetching collection for {}: {}", username, e);
            let failure = match &e {
                FetchError::UserNotFound { .. } => {
                    RequestError::new(ErrorKind::NotFound, format!("User '{}' not found", username))
                }
                FetchError::PrivateCollection { .. } => RequestError::new(
                    ErrorKind::Forbidden,
                    format!("User '{}' has a private collection", username),
                ),
                _ => RequestError::new(ErrorKind::Internal, "Failed to fetch user collection"),
            };
            Err(failure.with_details(e))
        }
    }
}

pub async fn get_similarity<T: Transport, C: Clock>(
    service: &BggService<T, C>,
    user_a: &str,
    user_b: &str,
) -> Result<SimilarityReport, RequestError> {
    compare_collections(
        service,
        CollectionSource::Remote(user_a.to_string()),
        CollectionSource::Remote(user_b.to_string()),
    )
    .await
}

async fn resolve<T: Transport, C: Clock>(
    service: &BggService<T, C>,
    source: &CollectionSource,
) -> Result<Vec<String>, FetchError> {
    match source {
        CollectionSource::Remote(username) => service.fetch_user_collection(username).await,
        CollectionSource::Imported { ids, .. } => Ok(ids.clone()),
    }
}

/// Compare two collections against the ranked list.
///
/// Both sides are resolved concurrently. The first failing side decides the
/// reported error.
pub async fn compare_collections<T: Transport, C: Clock>(
    service: &BggService<T, C>,
    source_a: CollectionSource,
    source_b: CollectionSource,
) -> Result<SimilarityReport, RequestError> {
    let (label_a, label_b) = match (source_a.validated_label(), source_b.validated_label()) {
        (Ok(a), Ok(b)) => (a, b),
        (Err(msg), _) | (_, Err(msg)) => {
            let blank = source_a.is_blank() || source_b.is_blank();
            return Err(username_rejection(blank, "Both userA and userB are required", msg));
        }
    };

    let reference = service.fetch_top100().await.map_err(|e| {
        warn!("Error in getSimilarity: {}", e);
        RequestError::new(ErrorKind::Internal, "Internal server error")
    })?;
    debug!("Comparing against {} ranked games", reference.len());

    let (raw_a, raw_b) =
        futures::future::join(resolve(service, &source_a), resolve(service, &source_b)).await;
    let to_not_found = |e: FetchError| {
        RequestError::new(ErrorKind::NotFound, "Failed to fetch user collections").with_details(e)
    };
    let raw_a = raw_a.map_err(to_not_found)?;
    let raw_b = raw_b.map_err(to_not_found)?;

    info!("User A has {} games", raw_a.len());
    info!("User B has {} games", raw_b.len());

    Ok(build_similarity_report(&reference, &label_a, &raw_a, &label_b, &raw_b))
}
