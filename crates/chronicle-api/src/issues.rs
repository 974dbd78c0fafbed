//! Handlers for `/issues` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/issues` | Optional `?tracker=&project=&limit=&offset=` |
//! | `GET`  | `/issues/{tracker}/{id}` | 404 if not found |
//! | `GET`  | `/issues/{tracker}/{id}/state` | Optional `?at=<rfc3339>`; current state otherwise |
//! | `GET`  | `/issues/{tracker}/{id}/timeline` | Events and comments merged by time |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, Query, State},
};
use chrono::{DateTime, Utc};
use chronicle_core::{
  assemble::Issue,
  field::IssueState,
  raw::IssueId,
  store::{IssueQuery, IssueStore, IssueSummary},
  tracker::TrackerKind,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ApiError;

// ─── List ────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ListParams {
  pub tracker: Option<String>,
  pub project: Option<String>,
  pub limit:   Option<usize>,
  pub offset:  Option<usize>,
}

/// `GET /issues`
pub async fn list<S>(
  State(store): State<Arc<S>>,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<IssueSummary>>, ApiError>
where
  S: IssueStore,
{
  let query = IssueQuery {
    tracker: params.tracker.as_deref().map(TrackerKind::parse).transpose()?,
    project: params.project,
    limit:   params.limit,
    offset:  params.offset,
  };
  let issues = store.list_issues(&query).await.map_err(ApiError::store)?;
  Ok(Json(issues))
}

// ─── Get one ─────────────────────────────────────────────────────────────────

async fn load<S: IssueStore>(store: &S, tracker: &str, external_id: String) -> Result<Issue, ApiError> {
  let id = IssueId::new(TrackerKind::parse(tracker)?, external_id);
  store
    .get_issue(&id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("issue {id}")))
}

/// `GET /issues/{tracker}/{id}`
pub async fn get_one<S>(
  State(store): State<Arc<S>>,
  Path((tracker, id)): Path<(String, String)>,
) -> Result<Json<Issue>, ApiError>
where
  S: IssueStore,
{
  Ok(Json(load(store.as_ref(), &tracker, id).await?))
}

// ─── State ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct StateParams {
  pub at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct StateResponse {
  pub at:    Option<DateTime<Utc>>,
  pub state: IssueState,
}

/// `GET /issues/{tracker}/{id}/state[?at=<rfc3339>]`
pub async fn state<S>(
  State(store): State<Arc<S>>,
  Path((tracker, id)): Path<(String, String)>,
  Query(params): Query<StateParams>,
) -> Result<Json<StateResponse>, ApiError>
where
  S: IssueStore,
{
  let issue = load(store.as_ref(), &tracker, id).await?;
  let state = match params.at {
    Some(at) => issue.state_at(at),
    None => issue.current_state().clone(),
  };
  Ok(Json(StateResponse {
    at: params.at,
    state,
  }))
}

// ─── Timeline ────────────────────────────────────────────────────────────────

/// `GET /issues/{tracker}/{id}/timeline`
pub async fn timeline<S>(
  State(store): State<Arc<S>>,
  Path((tracker, id)): Path<(String, String)>,
) -> Result<Json<Value>, ApiError>
where
  S: IssueStore,
{
  let issue = load(store.as_ref(), &tracker, id).await?;
  Ok(Json(serde_json::to_value(issue.timeline())?))
}
