// src/api/handlers.rs

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::Json;

use crate::api::{auth, error_response, types::*, ApiError, ApiState};
use crate::infra::errors::TimeslipError;
use crate::session::{EmailData, SendOutcome, SessionStatus, SessionSummary};

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload.map(|Json(b)| b).map_err(|rejection| {
        (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new(rejection.body_text())),
        )
    })
}

/// POST /email-tracking/start — Open a tracking session for a new draft.
pub async fn start(
    State(state): State<ApiState>,
    headers: HeaderMap,
    payload: Result<Json<StartRequest>, JsonRejection>,
) -> Result<Json<StartResponse>, ApiError> {
    auth::check_auth(&state, &headers)?;
    let req = body(payload)?;

    let created = state
        .registry
        .create_session(&req.to, &req.subject, &req.content, req.matter)
        .map_err(error_response)?;

    Ok(Json(StartResponse {
        success: true,
        session_id: created.session_id,
        start_time: created.start_time,
        status: SessionStatus::Active.to_string(),
    }))
}

/// POST /email-tracking/activity — Heartbeat; resumes a paused session.
pub async fn activity(
    State(state): State<ApiState>,
    headers: HeaderMap,
    payload: Result<Json<SessionRef>, JsonRejection>,
) -> Result<Json<SuccessResponse>, ApiError> {
    auth::check_auth(&state, &headers)?;
    let req = body(payload)?;

    state
        .registry
        .record_activity(&req.session_id)
        .await
        .map_err(error_response)?;
    Ok(Json(SuccessResponse { success: true }))
}

/// POST /email-tracking/pause — Client went idle.
pub async fn pause(
    State(state): State<ApiState>,
    headers: HeaderMap,
    payload: Result<Json<PauseRequest>, JsonRejection>,
) -> Result<Json<SuccessResponse>, ApiError> {
    auth::check_auth(&state, &headers)?;
    let req = body(payload)?;

    state
        .registry
        .pause_session(&req.session_id, req.paused_at)
        .await
        .map_err(error_response)?;
    Ok(Json(SuccessResponse { success: true }))
}

/// POST /email-tracking/stop — Freeze time and generate the billing summary.
pub async fn stop(
    State(state): State<ApiState>,
    headers: HeaderMap,
    payload: Result<Json<StopRequest>, JsonRejection>,
) -> Result<Json<StopResponse>, ApiError> {
    auth::check_auth(&state, &headers)?;
    let req = body(payload)?;

    match state
        .registry
        .stop_session(&req.session_id, &req.final_content, req.tone.as_deref())
        .await
    {
        Ok(outcome) => Ok(Json(StopResponse {
            success: true,
            time_spent: outcome.elapsed_ms,
            billing_summary: outcome.billing_summary,
        })),
        Err(e @ TimeslipError::AlreadyStopped { .. }) => {
            let cached = state.registry.get(&req.session_id).await.ok();
            let (status, Json(mut resp)) = error_response(e);
            if let Some(session) = cached {
                resp.time_spent = Some(session.accumulated_ms);
                resp.billing_summary = session.billing_summary;
            }
            Err((status, Json(resp)))
        }
        Err(e) => Err(error_response(e)),
    }
}

/// POST /email-tracking/send — Send the mail and log the time.
///
/// 200 when both legs succeed. 502 with both leg results otherwise, so
/// the client can tell a sent-but-unlogged email from a total failure.
pub async fn send(
    State(state): State<ApiState>,
    headers: HeaderMap,
    payload: Result<Json<SendRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<SendResponse>), ApiError> {
    auth::check_auth(&state, &headers)?;
    let req = body(payload)?;

    let email = EmailData {
        to: req.email_data.to,
        subject: req.email_data.subject,
        content: req.email_data.content,
        matter: req.email_data.matter,
    };
    let report = state
        .coordinator
        .send_and_log(&req.session_id, &email)
        .await
        .map_err(error_response)?;

    let status = match report.outcome {
        SendOutcome::Complete => StatusCode::OK,
        SendOutcome::Partial | SendOutcome::Failed => StatusCode::BAD_GATEWAY,
    };
    Ok((
        status,
        Json(SendResponse {
            success: report.outcome == SendOutcome::Complete,
            outcome: report.outcome,
            time_spent: report.elapsed_ms,
            billing_summary: report.billing_summary,
            send_result: report.send_result,
            log_result: report.log_result,
        }),
    ))
}

/// GET /email-tracking/sessions — Diagnostic listing.
pub async fn list_sessions(
    State(state): State<ApiState>,
    headers: HeaderMap,
) -> Result<Json<Vec<SessionSummary>>, ApiError> {
    auth::check_auth(&state, &headers)?;
    Ok(Json(state.registry.list_active_sessions().await))
}

/// GET /email-tracking/health
pub async fn health(State(state): State<ApiState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".into(),
        version: env!("CARGO_PKG_VERSION").into(),
        sessions: state.registry.len(),
    })
}
