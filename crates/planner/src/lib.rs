pub mod generator;
pub mod prompt;
pub mod retry;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use anyhow::anyhow;
use parking_lot::Mutex;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::OwnedMutexGuard;
use tracing::{info, instrument, warn};
use tripsmith_core::{
    canonicalize, ensure_evening_anchors, loose_parse_json, normalize_plan, reconcile_day_count,
    Plan, PlanError, SavedItinerary, TripContext,
};
use tripsmith_observability::AppMetrics;
use tripsmith_storage::ItineraryRepository;

pub use generator::{
    FixedGenerator, GeminiGenerator, Generator, PlanGenerator, DEFAULT_GEMINI_BASE_URL,
    DEFAULT_GEMINI_MODEL,
};
pub use prompt::build_day_plan_prompt;
pub use retry::RetryPolicy;

#[derive(Debug, Error)]
pub enum PlannerError {
    /// Every attempt failed, or the model answered without a JSON object.
    #[error("upstream generation failed: {0:#}")]
    UpstreamGeneration(anyhow::Error),

    #[error(transparent)]
    Plan(#[from] PlanError),

    #[error("storage failure: {0:#}")]
    Storage(anyhow::Error),

    #[error("no saved itinerary named {0:?}")]
    ItineraryNotFound(String),
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PlannerOptions {
    pub retry: RetryPolicy,
    pub evening_anchors: bool,
}

#[derive(Clone)]
pub struct TripPlanner<S, G>
where
    S: ItineraryRepository,
    G: PlanGenerator,
{
    store: Arc<S>,
    generator: Arc<G>,
    metrics: Arc<AppMetrics>,
    options: PlannerOptions,
    key_locks: Arc<Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>>,
}

impl<S, G> TripPlanner<S, G>
where
    S: ItineraryRepository,
    G: PlanGenerator,
{
    pub fn new(
        store: Arc<S>,
        generator: Arc<G>,
        metrics: Arc<AppMetrics>,
        options: PlannerOptions,
    ) -> Self {
        Self {
            store,
            generator,
            metrics,
            options,
            key_locks: Arc::default(),
        }
    }

    pub fn generator_name(&self) -> &'static str {
        self.generator.name()
    }

    pub fn metrics(&self) -> &AppMetrics {
        &self.metrics
    }

    /// Asks the generator for a day plan and returns it in canonical form with
    /// exactly the requested number of days.
    #[instrument(skip(self, trip), fields(destination = %trip.destination))]
    pub async fn generate_day_plan(&self, trip: &TripContext) -> Result<Plan, PlannerError> {
        let started = Instant::now();
        self.metrics.inc_request();

        let outcome = self.generate_canonical(trip).await;
        self.metrics.observe_latency(started.elapsed());

        let plan = outcome?;
        info!(
            days = plan.plan.len(),
            slots = plan.slot_count(),
            total_min_cost = plan.total_min_cost,
            generator = self.generator.name(),
            "day plan generated"
        );
        Ok(plan)
    }

    async fn generate_canonical(&self, trip: &TripContext) -> Result<Plan, PlannerError> {
        let expected_days = trip.expected_days()?;
        let prompt = build_day_plan_prompt(trip, expected_days);

        let generator = &self.generator;
        let metrics = &self.metrics;
        let prompt = prompt.as_str();
        let text = self
            .options
            .retry
            .run(move |_attempt| {
                metrics.inc_generation_attempt();
                generator.generate(prompt)
            })
            .await
            .map_err(|error| {
                self.metrics.inc_upstream_failure();
                PlannerError::UpstreamGeneration(error)
            })?;

        let Some(raw) = loose_parse_json(&text) else {
            self.metrics.inc_plan_rejected();
            warn!(chars = text.len(), "generator answered without a JSON object");
            return Err(PlannerError::UpstreamGeneration(anyhow!(
                "generator answered without a JSON object"
            )));
        };

        let mut plan = normalize_plan(&raw).inspect_err(|_| self.metrics.inc_plan_rejected())?;

        if let Some(expected) = expected_days {
            if plan.plan.len() != expected.get() {
                info!(
                    generated = plan.plan.len(),
                    expected = expected.get(),
                    "reconciling day count"
                );
                self.metrics.inc_plan_reconciled();
                plan = reconcile_day_count(&plan, expected, trip);
            }
        }

        if self.options.evening_anchors {
            plan = ensure_evening_anchors(&plan, trip);
        }

        Ok(plan)
    }

    /// Canonical form of an already generated payload. No generator call.
    pub fn normalize_raw(
        &self,
        raw: &Value,
        trip: Option<&TripContext>,
    ) -> Result<Plan, PlannerError> {
        let context = trip.cloned().unwrap_or_default();
        let expected_days = context.expected_days()?;
        Ok(canonicalize(raw, expected_days, &context)?)
    }

    pub async fn list_itineraries(&self, key: &str) -> Result<Vec<SavedItinerary>, PlannerError> {
        self.store
            .load_itineraries(key)
            .await
            .map_err(PlannerError::Storage)
    }

    pub async fn save_itineraries(
        &self,
        key: &str,
        itineraries: &[SavedItinerary],
    ) -> Result<(), PlannerError> {
        let _guard = self.lock_key(key).await;
        self.write_itineraries(key, itineraries).await
    }

    async fn write_itineraries(
        &self,
        key: &str,
        itineraries: &[SavedItinerary],
    ) -> Result<(), PlannerError> {
        self.store
            .save_itineraries(key, itineraries)
            .await
            .map_err(PlannerError::Storage)?;
        info!(key, count = itineraries.len(), "itineraries saved");
        Ok(())
    }

    /// Generates a day plan for the saved itinerary `name` and stores it on
    /// that itinerary.
    ///
    /// Generation runs without holding the key lock; the list is reloaded
    /// afterwards so writes made in the meantime are kept.
    #[instrument(skip(self))]
    pub async fn generate_for_saved(
        &self,
        key: &str,
        name: &str,
    ) -> Result<SavedItinerary, PlannerError> {
        let trip = {
            let itineraries = self.list_itineraries(key).await?;
            itineraries[find_itinerary(&itineraries, name)?].trip_context()
        };

        let plan = self.generate_day_plan(&trip).await?;

        let _guard = self.lock_key(key).await;
        let mut itineraries = self.list_itineraries(key).await?;
        let index = find_itinerary(&itineraries, name)?;
        itineraries[index].day_plan = Some(plan);

        self.write_itineraries(key, &itineraries).await?;
        Ok(itineraries.swap_remove(index))
    }

    /// Fills one slot of a saved itinerary's plan with a picked alternative
    /// and persists the result.
    #[instrument(skip(self, option))]
    pub async fn apply_choice(
        &self,
        key: &str,
        name: &str,
        day_index: usize,
        slot_index: usize,
        option: &Value,
    ) -> Result<Plan, PlannerError> {
        let _guard = self.lock_key(key).await;
        let mut itineraries = self.list_itineraries(key).await?;
        let index = find_itinerary(&itineraries, name)?;

        let current = itineraries[index]
            .day_plan
            .as_ref()
            .ok_or(PlanError::SlotOutOfRange {
                day: day_index,
                slot: slot_index,
            })?;
        let updated = tripsmith_core::apply_choice(current, day_index, slot_index, option)?;

        itineraries[index].day_plan = Some(updated.clone());
        self.write_itineraries(key, &itineraries).await?;
        Ok(updated)
    }

    /// Serializes read-modify-write cycles on one store key.
    async fn lock_key(&self, key: &str) -> OwnedMutexGuard<()> {
        let lock = self
            .key_locks
            .lock()
            .entry(key.to_string())
            .or_default()
            .clone();
        lock.lock_owned().await
    }
}

fn find_itinerary(itineraries: &[SavedItinerary], name: &str) -> Result<usize, PlannerError> {
    itineraries
        .iter()
        .position(|itinerary| itinerary.name == name)
        .ok_or_else(|| PlannerError::ItineraryNotFound(name.to_string()))
}
