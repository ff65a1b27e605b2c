//! Multi-step wizard orchestration.
//!
//! Each tool is a short sequence of numbered steps. Submitting a step
//! validates its fields, upserts the draft row for (actor, tool, step) and
//! records the step in request-scoped carry-over so the next step is gated
//! on it. The terminal step runs the scoring engine and persists a new
//! result row inside the same transaction as the draft write.

pub mod fields;
pub mod tools;

use crate::error::AppError;
use crate::identity::Actor;
use crate::scoring::{self, ScoreError};
use crate::storage::{Storage, ToolResultRow};
use fields::Fields;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tools::Tool;

// ─── Carry-over ───────────────────────────────────────────────────────────────

#[derive(Debug)]
struct CarriedSteps {
    touched: Instant,
    steps: BTreeMap<u32, Fields>,
}

/// Short-lived per-actor step carry-over. Holds validated fields for steps an
/// actor has passed this run, keyed by actor and tool. This is what gates
/// step ordering; the persisted draft rows are the durable record and are
/// deliberately not consulted for gating.
///
/// Entries expire `ttl` after their last write: every access sweeps stale
/// entries first, so abandoned wizards do not pin memory for the process
/// lifetime.
#[derive(Debug)]
pub struct CarryOver {
    ttl: Duration,
    inner: Mutex<HashMap<String, CarriedSteps>>,
}

impl Default for CarryOver {
    fn default() -> Self {
        Self::new(Duration::from_secs(30 * 24 * 60 * 60))
    }
}

impl CarryOver {
    pub fn new(ttl: Duration) -> Self {
        CarryOver { ttl, inner: Mutex::new(HashMap::new()) }
    }

    fn key(actor_key: &str, tool: Tool) -> String {
        format!("{actor_key}|{tool}")
    }

    fn lock_swept(&self) -> MutexGuard<'_, HashMap<String, CarriedSteps>> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let now = Instant::now();
        inner.retain(|_, entry| now.duration_since(entry.touched) < self.ttl);
        inner
    }

    pub fn put(&self, actor_key: &str, tool: Tool, step: u32, fields: Fields) {
        let mut inner = self.lock_swept();
        let entry = inner
            .entry(Self::key(actor_key, tool))
            .or_insert_with(|| CarriedSteps { touched: Instant::now(), steps: BTreeMap::new() });
        entry.touched = Instant::now();
        entry.steps.insert(step, fields);
    }

    pub fn has(&self, actor_key: &str, tool: Tool, step: u32) -> bool {
        let inner = self.lock_swept();
        inner
            .get(&Self::key(actor_key, tool))
            .is_some_and(|entry| entry.steps.contains_key(&step))
    }

    /// Union of all carried steps in step order, so later steps win on
    /// overlapping field names.
    pub fn merged(&self, actor_key: &str, tool: Tool) -> Fields {
        let inner = self.lock_swept();
        let mut merged = Fields::default();
        if let Some(entry) = inner.get(&Self::key(actor_key, tool)) {
            for step_fields in entry.steps.values() {
                merged.merge(step_fields);
            }
        }
        merged
    }

    pub fn clear(&self, actor_key: &str, tool: Tool) {
        let mut inner = self.lock_swept();
        inner.remove(&Self::key(actor_key, tool));
    }

    /// First step in `1..step` with no carry-over, if any. That is where an
    /// out-of-order submission gets redirected.
    pub fn first_missing_before(&self, actor_key: &str, tool: Tool, step: u32) -> Option<u32> {
        (1..step).find(|k| !self.has(actor_key, tool, *k))
    }
}

// ─── Outcomes ─────────────────────────────────────────────────────────────────

#[derive(Debug)]
pub enum StepOutcome {
    /// Field errors keyed by field name; nothing was written.
    ValidationFailed { errors: BTreeMap<String, String> },
    /// Draft stored; the caller should redirect to `next_step`.
    Advanced { next_step: u32 },
    /// Terminal step scored and persisted.
    Completed { result: ToolResultRow },
    /// An earlier step has no carry-over; redirect there instead.
    OutOfOrder { redirect_to: u32 },
}

// ─── Submission ───────────────────────────────────────────────────────────────

/// Handle one step submission end to end: gate, validate, upsert the draft,
/// and on the terminal step score and persist the result.
pub async fn upsert_step(
    storage: &Storage,
    carry: &CarryOver,
    actor: &Actor,
    tool: Tool,
    step: u32,
    raw: &serde_json::Map<String, serde_json::Value>,
) -> Result<StepOutcome, AppError> {
    let spec = tool.wizard();
    let step_spec = spec.step(step).ok_or(AppError::NotFound)?;
    let actor_key = actor.key();

    if let Some(missing) = carry.first_missing_before(&actor_key, tool, step) {
        return Ok(StepOutcome::OutOfOrder { redirect_to: missing });
    }

    let validated = match fields::validate_step(step_spec, raw) {
        Ok(fields) => fields,
        Err(errors) => return Ok(StepOutcome::ValidationFailed { errors }),
    };
    let fields_json = serde_json::to_string(&validated)
        .map_err(|e| AppError::Internal(e.into()))?;

    if step < spec.last_step() {
        storage
            .upsert_draft(
                &actor_key,
                actor.account_id(),
                actor.session_token(),
                tool.as_str(),
                step as i64,
                &fields_json,
            )
            .await?;
        carry.put(&actor_key, tool, step, validated);
        return Ok(StepOutcome::Advanced { next_step: step + 1 });
    }

    // Terminal step: score over the union of all carried steps plus this one.
    let mut merged = carry.merged(&actor_key, tool);
    merged.merge(&validated);
    let computed = scoring::compute(tool, &merged).map_err(|e| match e {
        ScoreError::Precondition { field, message } => AppError::Precondition {
            field: field.to_string(),
            message: message.to_string(),
        },
    })?;
    let payload_json = serde_json::to_string(&computed.payload)
        .map_err(|e| AppError::Internal(e.into()))?;

    let result = storage
        .finalize_wizard(
            &actor_key,
            actor.account_id(),
            actor.session_token(),
            tool.as_str(),
            step as i64,
            &fields_json,
            &payload_json,
            computed.score,
        )
        .await?;
    carry.clear(&actor_key, tool);
    Ok(StepOutcome::Completed { result })
}
