use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::resume::{RawCv, ResumeDocument, StructuringResult};
use crate::pipeline::arbitrage_result_from;
use crate::pipeline::extraction::extract_pdf_text;
use crate::state::AppState;
use crate::tailoring::diff::ResumeDiff;
use crate::tailoring::ledger::CostSummary;
use crate::tailoring::session::{
    ArbitrageResult, CostPayload, SessionView, TailoringSession, ToggleOutcome,
};

#[derive(Deserialize)]
pub struct StructureRequest {
    pub text: String,
    /// How the caller obtained the text. Defaults to `client`.
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub images_count: Option<u32>,
}

#[derive(Deserialize)]
pub struct ArbitrageRequest {
    pub jd_text: String,
}

#[derive(Deserialize)]
pub struct ToggleRequest {
    pub accept: bool,
}

#[derive(Serialize)]
pub struct ToggleResponse {
    #[serde(flatten)]
    pub outcome: ToggleOutcome,
    pub document: ResumeDocument,
}

/// POST /api/v1/sessions
pub async fn handle_create_session(
    State(state): State<AppState>,
    body: Option<Json<StructuringResult>>,
) -> (StatusCode, Json<SessionView>) {
    let (_, view) = state
        .sessions
        .create(|session| {
            if let Some(Json(structuring)) = body {
                session.set_clean(structuring);
            }
            session.view()
        })
        .await;
    (StatusCode::CREATED, Json(view))
}

/// GET /api/v1/sessions/:id
pub async fn handle_get_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, AppError> {
    Ok(Json(state.sessions.read(id, |s| s.view()).await?))
}

/// DELETE /api/v1/sessions/:id
pub async fn handle_delete_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.sessions.remove(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// PUT /api/v1/sessions/:id/clean
pub async fn handle_set_clean(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(structuring): Json<StructuringResult>,
) -> Result<Json<SessionView>, AppError> {
    let view = state
        .sessions
        .update(id, |s| {
            s.set_clean(structuring);
            s.view()
        })
        .await?;
    Ok(Json(view))
}

/// POST /api/v1/sessions/:id/structure
pub async fn handle_structure(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<StructureRequest>,
) -> Result<Json<SessionView>, AppError> {
    let raw_cv = RawCv {
        text: req.text,
        method: req.method.unwrap_or_else(|| "client".to_string()),
        images_count: req.images_count,
    };
    structure_into_session(&state, id, raw_cv).await.map(Json)
}

/// POST /api/v1/sessions/:id/upload
/// Multipart form with the PDF in a `file` field.
pub async fn handle_upload(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    mut multipart: Multipart,
) -> Result<Json<SessionView>, AppError> {
    let mut pdf = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Invalid multipart body: {e}")))?
    {
        if field.name() == Some("file") {
            let bytes = field
                .bytes()
                .await
                .map_err(|e| AppError::Validation(format!("Failed to read upload: {e}")))?;
            pdf = Some(bytes);
            break;
        }
    }
    let pdf = pdf.ok_or_else(|| AppError::Validation("Missing 'file' field".to_string()))?;
    info!("Session {id}: received PDF upload ({} bytes)", pdf.len());

    let text = tokio::task::spawn_blocking(move || extract_pdf_text(&pdf))
        .await
        .map_err(|e| AppError::Internal(e.into()))??;

    let raw_cv = RawCv {
        text,
        method: "server".to_string(),
        images_count: None,
    };
    structure_into_session(&state, id, raw_cv).await.map(Json)
}

/// Runs structuring outside the session lock, then stores the result.
async fn structure_into_session(
    state: &AppState,
    id: Uuid,
    raw_cv: RawCv,
) -> Result<SessionView, AppError> {
    if raw_cv.text.trim().is_empty() {
        return Err(AppError::Validation("CV text is empty".to_string()));
    }
    // fail fast on unknown sessions before paying for a model call
    state.sessions.read(id, |_| ()).await?;

    let call = state.model.structure(&raw_cv.text).await?;
    state
        .sessions
        .update(id, |s| {
            s.set_clean(StructuringResult {
                clean_cv: call.payload,
                raw_cv: Some(raw_cv),
            });
            s.cost_mut().append(call.cost);
            s.view()
        })
        .await
}

/// POST /api/v1/sessions/:id/arbitrage
pub async fn handle_run_arbitrage(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<ArbitrageRequest>,
) -> Result<Json<SessionView>, AppError> {
    if req.jd_text.trim().is_empty() {
        return Err(AppError::Validation("Job description is empty".to_string()));
    }
    let (clean, generation) = state
        .sessions
        .read(id, |s| s.clean().cloned().map(|c| (c, s.clean_generation())))
        .await?
        .ok_or_else(|| AppError::UnprocessableEntity("Session has no clean CV yet".to_string()))?;

    let call = state.model.arbitrage(&clean, &req.jd_text).await?;
    let result = arbitrage_result_from(call)?;
    let adapted = state
        .sessions
        .update(id, |s| {
            s.apply_arbitrage_from(generation, result)?;
            Ok::<_, AppError>(s.arbitrage().map(|a| a.working().clone()))
        })
        .await??;

    if state.config.judge_enabled {
        if let Some(adapted) = adapted {
            run_judge(&state, id, &clean, &adapted, &req.jd_text).await;
        }
    }

    Ok(Json(state.sessions.read(id, |s| s.view()).await?))
}

/// Judge runs best-effort: a failure leaves the arbitrage in place.
async fn run_judge(
    state: &AppState,
    id: Uuid,
    clean: &ResumeDocument,
    adapted: &ResumeDocument,
    jd_text: &str,
) {
    let call = match state.model.judge(clean, adapted, jd_text).await {
        Ok(call) => call,
        Err(e) => {
            warn!("Session {id}: judge failed: {e}");
            return;
        }
    };
    let stored = state
        .sessions
        .update(id, |s| {
            s.cost_mut().append(call.cost);
            s.set_judge(call.payload)
        })
        .await;
    match stored {
        Ok(Ok(())) => info!("Session {id}: judge attached"),
        Ok(Err(e)) => warn!("Session {id}: judge result dropped: {e}"),
        Err(e) => warn!("Session {id}: judge result dropped: {e}"),
    }
}

/// PUT /api/v1/sessions/:id/arbitrage
pub async fn handle_apply_arbitrage(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(result): Json<ArbitrageResult>,
) -> Result<Json<SessionView>, AppError> {
    if !result.result.is_object() {
        return Err(AppError::Validation("'result' must be an object".to_string()));
    }
    let view = state
        .sessions
        .update(id, |s| {
            s.apply_arbitrage(result)?;
            Ok::<_, AppError>(s.view())
        })
        .await??;
    Ok(Json(view))
}

/// DELETE /api/v1/sessions/:id/arbitrage
pub async fn handle_reset_arbitrage(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, AppError> {
    let view = state
        .sessions
        .update(id, |s| {
            s.reset_arbitrage();
            s.view()
        })
        .await?;
    Ok(Json(view))
}

/// POST /api/v1/sessions/:id/edits/:index
pub async fn handle_toggle_edit(
    State(state): State<AppState>,
    Path((id, index)): Path<(Uuid, usize)>,
    Json(req): Json<ToggleRequest>,
) -> Result<Json<ToggleResponse>, AppError> {
    let response = state
        .sessions
        .update(id, |s| {
            let outcome = s.toggle_edit(index, req.accept)?;
            Ok::<_, AppError>(toggle_response(s, outcome))
        })
        .await??;
    Ok(Json(response))
}

/// POST /api/v1/sessions/:id/experiences/:index
/// `index` addresses the experience in the clean CV.
pub async fn handle_toggle_experience(
    State(state): State<AppState>,
    Path((id, index)): Path<(Uuid, i64)>,
    Json(req): Json<ToggleRequest>,
) -> Result<Json<ToggleResponse>, AppError> {
    let response = state
        .sessions
        .update(id, |s| {
            let outcome = s.toggle_experience(index, req.accept)?;
            Ok::<_, AppError>(toggle_response(s, outcome))
        })
        .await??;
    Ok(Json(response))
}

fn toggle_response(session: &TailoringSession, outcome: ToggleOutcome) -> ToggleResponse {
    ToggleResponse {
        outcome,
        document: session
            .arbitrage()
            .map(|a| a.working().clone())
            .unwrap_or_default(),
    }
}

/// POST /api/v1/sessions/:id/choices/reset
pub async fn handle_reset_choices(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, AppError> {
    let view = state
        .sessions
        .update(id, |s| {
            s.reset_choices()?;
            Ok::<_, AppError>(s.view())
        })
        .await??;
    Ok(Json(view))
}

/// GET /api/v1/sessions/:id/diff
pub async fn handle_diff(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ResumeDiff>, AppError> {
    let diff = state.sessions.read(id, |s| s.diff()).await??;
    Ok(Json(diff))
}

/// GET /api/v1/sessions/:id/cost
pub async fn handle_get_cost(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<CostSummary>, AppError> {
    let summary = state
        .sessions
        .read(id, |s| CostSummary::from(s.cost()))
        .await?;
    Ok(Json(summary))
}

/// POST /api/v1/sessions/:id/cost
pub async fn handle_record_cost(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<CostPayload>,
) -> Result<Json<CostSummary>, AppError> {
    let summary = state
        .sessions
        .update(id, |s| {
            let ledger = s.cost_mut();
            match payload {
                CostPayload::Event(event) => CostSummary::from(ledger.append(event)),
                CostPayload::Batch(batch) => CostSummary::from(ledger.merge(batch)),
            }
        })
        .await?;
    Ok(Json(summary))
}

/// DELETE /api/v1/sessions/:id/cost
pub async fn handle_reset_cost(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<CostSummary>, AppError> {
    let summary = state
        .sessions
        .update(id, |s| {
            let ledger = s.cost_mut();
            ledger.reset();
            CostSummary::from(&*ledger)
        })
        .await?;
    Ok(Json(summary))
}
