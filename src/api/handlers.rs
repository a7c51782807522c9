//! Request handlers: the online capture/clarify path and the read
//! endpoints. Side effects that aren't needed for the response (signal
//! boosts, narration, idea expansion) run on spawned tasks with their own
//! deadlines and never surface failures to the client.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};
use chrono::{DateTime, Utc};
use tracing::{error, info, warn};

use crate::api::{middleware::Actor, AppState};
use crate::classifier::{suggest_choices, Classifier, TRANSACTION_CONFIDENCE_FLOOR};
use crate::scheduler::ideas::idea_context;
use crate::signals::decay::boost_signal;
use crate::signals::extractor::extract_terms;
use crate::types::*;
use crate::utils::title_from_text;
use crate::vault::{extract_letter_body, CaptureLogEntry, LedgerTransaction, Note};

const CLASSIFY_TIMEOUT: Duration = Duration::from_secs(30);
const ASYNC_SIDE_EFFECT_TIMEOUT: Duration = Duration::from_secs(120);
const JOURNAL_UPDATE_TIMEOUT: Duration = Duration::from_secs(300);

const CLARIFY_PROMPT: &str = "Where should this go?";

fn err(status: StatusCode, message: &str, code: &str) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: message.to_string(),
            code: Some(code.to_string()),
            details: None,
        }),
    )
        .into_response()
}

fn new_id(prefix: &str) -> String {
    format!("{}_{}", prefix, uuid::Uuid::new_v4().simple())
}

fn parse_ts_local(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

// ---------------------------------------------------------------------
// GET /health (public)
// ---------------------------------------------------------------------

pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let ollama = match tokio::time::timeout(Duration::from_secs(5), state.llm.health_check()).await
    {
        Ok(Ok(())) => "connected".to_string(),
        Ok(Err(e)) => format!("error: {}", e),
        Err(_) => "error: health check timed out".to_string(),
    };

    let vault = match std::fs::metadata(state.vault.base_path()) {
        Ok(meta) if meta.is_dir() => "writable".to_string(),
        Ok(_) => "error: not a directory".to_string(),
        Err(e) => format!("error: {}", e),
    };

    Json(HealthResponse {
        status: "ok".to_string(),
        ollama,
        vault,
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ---------------------------------------------------------------------
// POST /api/v1/capture
// ---------------------------------------------------------------------

pub async fn capture(
    State(state): State<Arc<AppState>>,
    Extension(Actor(actor)): Extension<Actor>,
    payload: Result<Json<CaptureRequest>, JsonRejection>,
) -> Response {
    let Ok(Json(req)) = payload else {
        return err(StatusCode::BAD_REQUEST, "invalid request body", "INVALID_BODY");
    };
    if req.text.is_empty() {
        return err(StatusCode::BAD_REQUEST, "text is required", "MISSING_TEXT");
    }

    let mode = if req.mode.is_empty() {
        "note".to_string()
    } else {
        req.mode.clone()
    };
    let capture_id = new_id("cap");
    let timestamp = if req.ts_local.is_empty() {
        Utc::now()
    } else {
        parse_ts_local(&req.ts_local)
    };

    if mode == "purchase" {
        return handle_purchase(&state, &capture_id, &actor, &req, timestamp).await;
    }

    let classifier = Classifier::new(&state.llm);
    let classified = match tokio::time::timeout(
        CLASSIFY_TIMEOUT,
        classifier.classify(&req.text, &actor, timestamp),
    )
    .await
    {
        Ok(Ok(result)) => result,
        Ok(Err(e)) => {
            warn!(capture_id = %capture_id, "Classification failed: {}", e);
            return classification_failure(&state, &capture_id, &actor, &req, &mode, timestamp)
                .await;
        }
        Err(_) => {
            warn!(capture_id = %capture_id, "Classification timed out");
            return classification_failure(&state, &capture_id, &actor, &req, &mode, timestamp)
                .await;
        }
    };

    let status = if classified.parse_error {
        STATUS_PARSE_ERROR
    } else if classified.needs_review {
        STATUS_NEEDS_REVIEW
    } else {
        STATUS_FILED
    };
    let routed_to = classified.category.map(|c| c.as_str()).unwrap_or("");

    if let Err(e) = state
        .store
        .log_capture(
            &capture_id,
            &actor,
            &mode,
            &req.text,
            routed_to,
            status,
            classified.confidence,
        )
        .await
    {
        error!(capture_id = %capture_id, "Failed to log capture: {}", e);
        return err(StatusCode::INTERNAL_SERVER_ERROR, "database error", "DB_ERROR");
    }
    let log_entry = CaptureLogEntry::new(
        &capture_id,
        &actor,
        &mode,
        &req.text,
        routed_to,
        status,
        &req.device_id,
        classified.confidence,
    );
    if let Err(e) = state.vault.log_capture(&log_entry).await {
        warn!(capture_id = %capture_id, "Failed to log capture to vault: {}", e);
    }

    // Low confidence or unparseable reply: queue for the human.
    if classified.needs_review {
        if let Err(e) = state
            .store
            .add_pending(
                &capture_id,
                &actor,
                &req.text,
                &classified.choices,
                timestamp,
                &req.device_id,
            )
            .await
        {
            error!(capture_id = %capture_id, "Failed to add pending: {}", e);
        }

        return Json(CaptureResponse {
            capture_id,
            status: STATUS_NEEDS_REVIEW.to_string(),
            ui_message: None,
            prompt: Some(CLARIFY_PROMPT.to_string()),
            choices: Some(classified.choices),
            attempts_remaining: Some(1),
        })
        .into_response();
    }

    let category = classified
        .category
        .expect("reviewed-out results always carry a category");
    let content = if classified.cleaned_text.is_empty() {
        req.text.clone()
    } else {
        classified.cleaned_text.clone()
    };
    let note = Note {
        id: capture_id.clone(),
        created: timestamp,
        category,
        confidence: classified.confidence,
        actor: actor.clone(),
        device_id: req.device_id.clone(),
        tags: classified.tags.clone(),
        title: classified.title.clone(),
        content,
    };

    let write_result = if category == Category::Journal {
        state.vault.write_raw_journal_capture(&note)
    } else {
        state.vault.write_note(&note)
    };
    if let Err(e) = write_result {
        error!(capture_id = %capture_id, "Failed to write note: {}", e);
        return err(
            StatusCode::INTERNAL_SERVER_ERROR,
            "failed to write note",
            "WRITE_ERROR",
        );
    }

    spawn_signal_boost(&state, &req.text, category);
    if category == Category::Journal {
        spawn_narration(&state);
    }
    if category == Category::Ideas {
        spawn_idea_expansion(&state, &capture_id, &note.title, &note.content, &note.tags);
    }

    Json(CaptureResponse {
        capture_id,
        status: STATUS_RECEIVED.to_string(),
        ui_message: Some("Got it".to_string()),
        prompt: None,
        choices: None,
        attempts_remaining: None,
    })
    .into_response()
}

/// LLM transport failure or timeout: the capture parks in the queue with
/// the default choice list until a human routes it.
async fn classification_failure(
    state: &Arc<AppState>,
    capture_id: &str,
    actor: &str,
    req: &CaptureRequest,
    mode: &str,
    timestamp: DateTime<Utc>,
) -> Response {
    if let Err(e) = state
        .store
        .log_capture(
            capture_id,
            actor,
            mode,
            &req.text,
            "",
            STATUS_PENDING_CLASSIFICATION,
            0.0,
        )
        .await
    {
        error!(capture_id = %capture_id, "Failed to log capture: {}", e);
        return err(StatusCode::INTERNAL_SERVER_ERROR, "database error", "DB_ERROR");
    }
    let log_entry = CaptureLogEntry::new(
        capture_id,
        actor,
        mode,
        &req.text,
        "",
        STATUS_PENDING_CLASSIFICATION,
        &req.device_id,
        0.0,
    );
    if let Err(e) = state.vault.log_capture(&log_entry).await {
        warn!(capture_id = %capture_id, "Failed to log capture to vault: {}", e);
    }

    let choices = suggest_choices(None);
    if let Err(e) = state
        .store
        .add_pending(capture_id, actor, &req.text, &choices, timestamp, &req.device_id)
        .await
    {
        error!(capture_id = %capture_id, "Failed to add pending: {}", e);
    }

    Json(CaptureResponse {
        capture_id: capture_id.to_string(),
        status: STATUS_NEEDS_REVIEW.to_string(),
        ui_message: None,
        prompt: Some(CLARIFY_PROMPT.to_string()),
        choices: Some(choices),
        attempts_remaining: Some(1),
    })
    .into_response()
}

async fn handle_purchase(
    state: &Arc<AppState>,
    capture_id: &str,
    actor: &str,
    req: &CaptureRequest,
    timestamp: DateTime<Utc>,
) -> Response {
    let classifier = Classifier::new(&state.llm);
    let parsed = tokio::time::timeout(
        CLASSIFY_TIMEOUT,
        classifier.parse_transaction(&req.text, actor),
    )
    .await
    .map_err(|_| anyhow::anyhow!("transaction parse timed out"))
    .and_then(|r| r);

    let parsed = match parsed {
        Ok(p) if p.confidence >= TRANSACTION_CONFIDENCE_FLOOR => p,
        other => {
            if let Err(e) = &other {
                warn!(capture_id = %capture_id, "Transaction parse failed: {}", e);
            } else {
                warn!(capture_id = %capture_id, "Transaction parse below confidence floor");
            }

            if let Err(e) = state
                .store
                .log_capture(
                    capture_id,
                    actor,
                    &req.mode,
                    &req.text,
                    Category::Financial.as_str(),
                    STATUS_NEEDS_REVIEW,
                    0.0,
                )
                .await
            {
                error!(capture_id = %capture_id, "Failed to log capture: {}", e);
                return err(StatusCode::INTERNAL_SERVER_ERROR, "database error", "DB_ERROR");
            }
            let log_entry = CaptureLogEntry::new(
                capture_id,
                actor,
                &req.mode,
                &req.text,
                Category::Financial.as_str(),
                STATUS_NEEDS_REVIEW,
                &req.device_id,
                0.0,
            );
            if let Err(e) = state.vault.log_capture(&log_entry).await {
                warn!(capture_id = %capture_id, "Failed to log capture to vault: {}", e);
            }

            let choices = vec![
                "Confirm transaction".to_string(),
                "Not a transaction".to_string(),
                "Rephrase".to_string(),
            ];
            if let Err(e) = state
                .store
                .add_pending(capture_id, actor, &req.text, &choices, timestamp, &req.device_id)
                .await
            {
                error!(capture_id = %capture_id, "Failed to add pending: {}", e);
            }

            return Json(CaptureResponse {
                capture_id: capture_id.to_string(),
                status: STATUS_NEEDS_REVIEW.to_string(),
                ui_message: None,
                prompt: Some("Couldn't parse this transaction. Is this correct?".to_string()),
                choices: Some(choices),
                attempts_remaining: Some(1),
            })
            .into_response();
        }
    };

    let txn_id = new_id("txn");
    let txn = LedgerTransaction::new(
        &txn_id,
        actor,
        &req.device_id,
        &req.text,
        parsed.amount,
        &parsed.currency,
        &parsed.merchant,
        &parsed.label,
        &parsed.notes,
        parsed.confidence,
    );
    if let Err(e) = state.vault.write_transaction(&txn).await {
        warn!(txn_id = %txn_id, "Failed to write ledger line: {}", e);
    }
    if let Err(e) = state
        .store
        .log_transaction(
            &txn_id,
            capture_id,
            actor,
            parsed.amount,
            &parsed.currency,
            &parsed.merchant,
            &parsed.label,
            &parsed.notes,
            parsed.confidence,
            &req.text,
            &req.device_id,
        )
        .await
    {
        warn!(txn_id = %txn_id, "Failed to log transaction: {}", e);
    }

    if let Err(e) = state
        .store
        .log_capture(
            capture_id,
            actor,
            &req.mode,
            &req.text,
            Category::Financial.as_str(),
            STATUS_FILED,
            parsed.confidence,
        )
        .await
    {
        error!(capture_id = %capture_id, "Failed to log capture: {}", e);
    }
    let log_entry = CaptureLogEntry::new(
        capture_id,
        actor,
        &req.mode,
        &req.text,
        Category::Financial.as_str(),
        STATUS_FILED,
        &req.device_id,
        parsed.confidence,
    );
    if let Err(e) = state.vault.log_capture(&log_entry).await {
        warn!(capture_id = %capture_id, "Failed to log capture to vault: {}", e);
    }

    Json(CaptureResponse {
        capture_id: capture_id.to_string(),
        status: STATUS_RECEIVED.to_string(),
        ui_message: Some("Got it".to_string()),
        prompt: None,
        choices: None,
        attempts_remaining: None,
    })
    .into_response()
}

// ---------------------------------------------------------------------
// POST /api/v1/clarify
// ---------------------------------------------------------------------

pub async fn clarify(
    State(state): State<Arc<AppState>>,
    Extension(Actor(_actor)): Extension<Actor>,
    payload: Result<Json<ClarifyRequest>, JsonRejection>,
) -> Response {
    let Ok(Json(req)) = payload else {
        return err(StatusCode::BAD_REQUEST, "invalid request body", "INVALID_BODY");
    };

    let pending = match state.store.get_pending_by_id(&req.capture_id).await {
        Ok(pending) => pending,
        Err(e) => {
            error!(capture_id = %req.capture_id, "Database error: {}", e);
            return err(StatusCode::INTERNAL_SERVER_ERROR, "database error", "DB_ERROR");
        }
    };

    let Some(pending) = pending else {
        return (
            StatusCode::NOT_FOUND,
            Json(ClarifyResponse {
                capture_id: req.capture_id,
                status: STATUS_NOT_FOUND.to_string(),
                ui_message: "Not found or expired".to_string(),
            }),
        )
            .into_response();
    };

    let resolved = match state
        .store
        .resolve_pending(&req.capture_id, &req.destination)
        .await
    {
        Ok(resolved) => resolved,
        Err(e) => {
            error!(capture_id = %req.capture_id, "Failed to resolve: {}", e);
            return err(
                StatusCode::INTERNAL_SERVER_ERROR,
                "failed to resolve",
                "RESOLVE_ERROR",
            );
        }
    };

    // The row exists but the conditional update touched nothing: it ran
    // past its expiry before the sweep job got to it.
    if !resolved {
        return (
            StatusCode::GONE,
            Json(ClarifyResponse {
                capture_id: req.capture_id,
                status: STATUS_EXPIRED.to_string(),
                ui_message: "Expired".to_string(),
            }),
        )
            .into_response();
    }

    // Destinations that name a category become notes, filed with the
    // capture's original timestamp and device. Purchase-review choices
    // ("Not a transaction", ...) only resolve the queue row.
    if let Some(category) = Category::parse(&req.destination) {
        let note = Note {
            id: pending.capture_id.clone(),
            created: pending.original_ts.unwrap_or_else(Utc::now),
            category,
            confidence: 1.0, // human-classified
            actor: pending.actor.clone(),
            device_id: pending.device_id.clone(),
            tags: Vec::new(),
            title: title_from_text(&pending.raw_text),
            content: pending.raw_text.clone(),
        };

        let write_result = if category == Category::Journal {
            state.vault.write_raw_journal_capture(&note)
        } else {
            state.vault.write_note(&note)
        };
        if let Err(e) = write_result {
            error!(capture_id = %req.capture_id, "Failed to write note: {}", e);
            return err(
                StatusCode::INTERNAL_SERVER_ERROR,
                "failed to write note",
                "WRITE_ERROR",
            );
        }

        spawn_signal_boost(&state, &pending.raw_text, category);
        if category == Category::Journal {
            spawn_narration(&state);
        }
    }

    Json(ClarifyResponse {
        capture_id: req.capture_id,
        status: STATUS_FILED.to_string(),
        ui_message: format!("Filed to {}", req.destination),
    })
    .into_response()
}

// ---------------------------------------------------------------------
// GET /api/v1/pending
// ---------------------------------------------------------------------

pub async fn pending(
    State(state): State<Arc<AppState>>,
    Extension(Actor(actor)): Extension<Actor>,
) -> Response {
    let rows = match state.store.get_pending(&actor).await {
        Ok(rows) => rows,
        Err(e) => {
            error!(actor = %actor, "Database error: {}", e);
            return err(StatusCode::INTERNAL_SERVER_ERROR, "database error", "DB_ERROR");
        }
    };

    let pending: Vec<PendingItem> = rows
        .into_iter()
        .map(|p| {
            let preview = if p.raw_text.chars().count() > 50 {
                format!("{}…", p.raw_text.chars().take(50).collect::<String>())
            } else {
                p.raw_text.clone()
            };
            PendingItem {
                capture_id: p.capture_id,
                prompt: CLARIFY_PROMPT.to_string(),
                choices: p.choices,
                preview,
                expires_at: p.expires_at,
            }
        })
        .collect();

    Json(PendingResponse { pending }).into_response()
}

// ---------------------------------------------------------------------
// GET /api/v1/letters
// ---------------------------------------------------------------------

pub async fn letters(
    State(state): State<Arc<AppState>>,
    Extension(Actor(actor)): Extension<Actor>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let letter_type = params.get("type").cloned().unwrap_or_default();

    let since = match params.get("since").filter(|s| !s.is_empty()) {
        None => None,
        Some(raw) => match DateTime::parse_from_rfc3339(raw)
            .map(|dt| dt.with_timezone(&Utc))
            .or_else(|_| {
                chrono::NaiveDate::parse_from_str(raw, "%Y-%m-%d").map(|d| {
                    d.and_hms_opt(0, 0, 0)
                        .expect("midnight is always valid")
                        .and_utc()
                })
            }) {
            Ok(parsed) => Some(parsed),
            Err(_) => {
                return err(
                    StatusCode::BAD_REQUEST,
                    "invalid since format, use RFC3339 or YYYY-MM-DD",
                    "INVALID_DATE",
                )
            }
        },
    };

    let records = match state.store.get_letters(&actor, &letter_type, since).await {
        Ok(records) => records,
        Err(e) => {
            error!(actor = %actor, "Database error: {}", e);
            return err(StatusCode::INTERNAL_SERVER_ERROR, "database error", "DB_ERROR");
        }
    };

    let letters: Vec<LetterPayload> = records
        .into_iter()
        .map(|rec| {
            let text = match state.vault.read_letter(&rec.letter_type, &rec.for_date) {
                Ok(content) => extract_letter_body(&content).to_string(),
                Err(e) => {
                    warn!(letter_id = %rec.letter_id, "Failed to read letter: {}", e);
                    String::new()
                }
            };
            LetterPayload {
                letter_id: rec.letter_id,
                letter_type: rec.letter_type,
                for_date: rec.for_date,
                text,
                created_ts: rec.created_at,
                version: "1".to_string(),
            }
        })
        .collect();

    Json(LettersResponse { letters }).into_response()
}

// ---------------------------------------------------------------------
// Journal endpoints
// ---------------------------------------------------------------------

pub async fn journal_update(State(state): State<Arc<AppState>>) -> Response {
    match tokio::time::timeout(JOURNAL_UPDATE_TIMEOUT, state.narrator.update()).await {
        Ok(Ok(result)) => Json(result).into_response(),
        Ok(Err(e)) => err(
            StatusCode::INTERNAL_SERVER_ERROR,
            &e.to_string(),
            "UPDATE_FAILED",
        ),
        Err(_) => err(
            StatusCode::INTERNAL_SERVER_ERROR,
            "journal update timed out",
            "UPDATE_FAILED",
        ),
    }
}

pub async fn journal_status(State(state): State<Arc<AppState>>) -> Response {
    match state.narrator.status() {
        Ok(status) => Json(status).into_response(),
        Err(e) => err(
            StatusCode::INTERNAL_SERVER_ERROR,
            &e.to_string(),
            "STATUS_FAILED",
        ),
    }
}

// ---------------------------------------------------------------------
// Manual letter triggers
// ---------------------------------------------------------------------

pub async fn test_daily(
    State(state): State<Arc<AppState>>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    trigger_letter(state, params, "daily").await
}

pub async fn test_weekly(
    State(state): State<Arc<AppState>>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    trigger_letter(state, params, "weekly").await
}

async fn trigger_letter(
    state: Arc<AppState>,
    params: HashMap<String, String>,
    letter_type: &str,
) -> Response {
    let Some(scheduler) = state.scheduler.get().cloned() else {
        return err(
            StatusCode::SERVICE_UNAVAILABLE,
            "letter generator not configured",
            "NOT_CONFIGURED",
        );
    };

    let actor = params
        .get("actor")
        .cloned()
        .or_else(|| state.config.actors().first().cloned())
        .unwrap_or_default();

    info!(actor = %actor, letter_type = %letter_type, "Manual letter trigger");
    let result = if letter_type == "daily" {
        scheduler.generate_daily_now(&actor).await
    } else {
        scheduler.generate_weekly_now(&actor).await
    };

    match result {
        Ok(()) => Json(serde_json::json!({
            "status": "ok",
            "actor": actor,
            "type": letter_type,
        }))
        .into_response(),
        Err(e) => err(
            StatusCode::INTERNAL_SERVER_ERROR,
            &e.to_string(),
            "GENERATION_FAILED",
        ),
    }
}

// ---------------------------------------------------------------------
// Fire-and-forget side effects
// ---------------------------------------------------------------------

/// Boosts up to 5 term signals and the category signal. Failures are
/// logged and swallowed.
fn spawn_signal_boost(state: &Arc<AppState>, text: &str, category: Category) {
    let state = state.clone();
    let text = text.to_string();
    tokio::spawn(async move {
        for term in extract_terms(&text, 5) {
            let key = format!("term:{}", term);
            if let Err(e) = boost_signal(&state.store, &key, "term").await {
                warn!(key = %key, "Failed to boost term signal: {}", e);
            }
        }
        let key = format!("cat:{}", category.as_str());
        if let Err(e) = boost_signal(&state.store, &key, "category").await {
            warn!(key = %key, "Failed to boost category signal: {}", e);
        }
    });
}

/// Kicks the narrator off the request path with its own deadline.
fn spawn_narration(state: &Arc<AppState>) {
    let state = state.clone();
    tokio::spawn(async move {
        match tokio::time::timeout(ASYNC_SIDE_EFFECT_TIMEOUT, state.narrator.update()).await {
            Ok(Ok(result)) if result.processed > 0 => {
                info!(processed = result.processed, "Journal narration complete");
            }
            Ok(Ok(_)) => {}
            Ok(Err(e)) => warn!("Journal narration failed: {}", e),
            Err(_) => warn!("Journal narration timed out"),
        }
    });
}

/// Expands an idea into a research file, off the request path.
fn spawn_idea_expansion(
    state: &Arc<AppState>,
    idea_id: &str,
    title: &str,
    content: &str,
    tags: &[String],
) {
    let state = state.clone();
    let idea_id = idea_id.to_string();
    let title = title.to_string();
    let content = content.to_string();
    let context = idea_context(tags);
    tokio::spawn(async move {
        let expanded = match tokio::time::timeout(
            ASYNC_SIDE_EFFECT_TIMEOUT,
            state.idea_expander.expand_idea(&content, &context),
        )
        .await
        {
            Ok(Ok(text)) => text,
            Ok(Err(e)) => {
                warn!(idea_id = %idea_id, "Failed to expand idea: {}", e);
                return;
            }
            Err(_) => {
                warn!(idea_id = %idea_id, "Idea expansion timed out");
                return;
            }
        };

        match state
            .idea_expander
            .write_research_file(&idea_id, &title, &expanded)
        {
            Ok(path) => info!(idea_id = %idea_id, path = %path, "Generated idea research"),
            Err(e) => warn!(idea_id = %idea_id, "Failed to write research: {}", e),
        }
    });
}
