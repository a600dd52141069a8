//! Session orchestration.
//!
//! A [`Session`] runs the draw/respond cycle over the phases of its
//! [`SessionPlan`]. Each cycle completes fully before the next one starts:
//! draw, asset checks, presentation, ability update, time check, skip check
//! and record. Any termination path goes through the shared [`EndLatch`],
//! so the session ends exactly once.

pub mod plan;
pub mod record;
pub mod renderer;

pub use plan::{Phase, SessionPlan};
pub use record::{InMemoryTrialSink, SessionSummary, TrialRecord, TrialSink, TrialStatus};
pub use renderer::{ScriptedRenderer, TrialRenderer, TrialRequest, TrialResponse};

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rand::rngs::StdRng;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::assets::{AssetKind, AssetPreloader, AssetResolver, PreloadPipeline};
use crate::choices::{ChoicePreparer, ChoiceSet};
use crate::config::{EmptyCorpusPolicy, SessionConfig};
use crate::corpus::PoolName;
use crate::error::{Result, TrialkitError};
use crate::item::Item;
use crate::selector::{AdaptiveSelector, IrtEngine, StoppingRule};
use crate::skipper::FailureSkipper;
use crate::timer::{EndLatch, EndReason, SessionTimer};

/// External collaborators of a session.
#[derive(Clone)]
pub struct Collaborators {
    pub resolver: Arc<dyn AssetResolver>,
    pub preloader: Arc<dyn AssetPreloader>,
    pub renderer: Arc<dyn TrialRenderer>,
    pub sink: Arc<dyn TrialSink>,
}

/// Mutable per-session state. Nothing here outlives the session.
pub struct SessionContext {
    pub id: Uuid,
    pub selector: AdaptiveSelector,
    pub skipper: FailureSkipper,
    pub choices: ChoicePreparer,
    pub rng: StdRng,
    trial_index: usize,
    presented: usize,
    correct: usize,
    skipped_missing_audio: usize,
    discarded_by_skips: usize,
}

impl SessionContext {
    pub fn new(config: &SessionConfig, engine: Box<dyn IrtEngine>, rng: StdRng) -> Self {
        Self {
            id: Uuid::now_v7(),
            selector: AdaptiveSelector::new(engine, StoppingRule::from_config(&config.stopping)),
            skipper: FailureSkipper::new(config.max_incorrect),
            choices: ChoicePreparer::new(config.choice_order),
            rng,
            trial_index: 0,
            presented: 0,
            correct: 0,
            skipped_missing_audio: 0,
            discarded_by_skips: 0,
        }
    }

    fn next_trial_index(&mut self) -> usize {
        let index = self.trial_index;
        self.trial_index += 1;
        index
    }
}

pub struct Session {
    config: SessionConfig,
    plan: SessionPlan,
    ctx: SessionContext,
    collaborators: Collaborators,
    latch: EndLatch,
}

impl Session {
    /// Validate the configuration and plan a session over `items`.
    pub fn new(
        config: SessionConfig,
        items: Vec<Item>,
        engine: Box<dyn IrtEngine>,
        collaborators: Collaborators,
        mut rng: StdRng,
    ) -> Result<Self> {
        config.validate()?;

        let plan = SessionPlan::build(items, &config, &mut rng);
        if plan.is_empty() {
            match config.empty_corpus {
                EmptyCorpusPolicy::Fail => return Err(TrialkitError::EmptyCorpus),
                EmptyCorpusPolicy::Proceed => warn!("Session has no items to present"),
            }
        }

        let ctx = SessionContext::new(&config, engine, rng);
        Ok(Self {
            config,
            plan,
            ctx,
            collaborators,
            latch: EndLatch::new(),
        })
    }

    pub fn id(&self) -> Uuid {
        self.ctx.id
    }

    pub fn plan(&self) -> &SessionPlan {
        &self.plan
    }

    /// Handle for ending the session from outside, e.g. on user abort.
    pub fn end_latch(&self) -> EndLatch {
        self.latch.clone()
    }

    /// Run the session to completion and send the summary to the sink.
    pub async fn run(mut self) -> Result<SessionSummary> {
        let started_at = Utc::now();
        let mut timer = SessionTimer::start(
            self.config.max_time_minutes,
            &self.config.timer,
            self.latch.clone(),
        );
        let mut preload = PreloadPipeline::new(
            Arc::clone(&self.collaborators.preloader),
            self.plan.assets.batches().to_vec(),
        );

        info!(
            session_id = %self.ctx.id,
            items = self.plan.item_count(),
            phases = self.plan.phases.len(),
            batches = self.plan.assets.len(),
            "Session started"
        );

        let outcome = self.run_phases(&mut timer, &mut preload).await;
        match &outcome {
            Ok(()) => {
                self.latch.finish(EndReason::Exhausted);
            }
            Err(e) => {
                warn!(session_id = %self.ctx.id, error = %e, "Session aborted");
                self.latch.finish(EndReason::Aborted);
            }
        }
        timer.cancel();
        preload.shutdown();

        let summary = SessionSummary {
            session_id: self.ctx.id,
            end_reason: self.latch.reason().unwrap_or(EndReason::Aborted),
            presented: self.ctx.presented,
            correct: self.ctx.correct,
            skipped_missing_audio: self.ctx.skipped_missing_audio,
            discarded_by_skips: self.ctx.discarded_by_skips,
            theta: self.ctx.selector.theta(),
            started_at,
            finished_at: Utc::now(),
            elapsed_ms: timer.elapsed().as_millis() as u64,
        };

        info!(
            session_id = %summary.session_id,
            reason = %summary.end_reason,
            presented = summary.presented,
            theta = summary.theta,
            "Session finished"
        );

        let finished = self.collaborators.sink.finish(&summary).await;
        outcome?;
        finished?;
        Ok(summary)
    }

    async fn run_phases(
        &mut self,
        timer: &mut SessionTimer,
        preload: &mut PreloadPipeline,
    ) -> Result<()> {
        if !self.plan.assets.is_empty() {
            preload.prefetch(0);
        }

        let phases = self.plan.phases.clone();
        for phase in phases {
            debug!(
                pool = %phase.pool,
                block = phase.block,
                budget = ?phase.budget,
                "Entering phase"
            );

            let mut drawn = 0;
            while phase.budget.is_none_or(|budget| drawn < budget) {
                if self.latch.is_finished() {
                    return Ok(());
                }
                let Some(item) = self.draw(phase.pool) else {
                    break;
                };
                drawn += 1;
                self.run_trial(item, phase, timer, preload).await?;
            }
        }
        Ok(())
    }

    /// Select and remove the next item of a pool in one step.
    fn draw(&mut self, name: PoolName) -> Option<Item> {
        let pool = self.plan.corpus.pool_mut(name)?;
        if name.is_adaptive() {
            self.ctx.selector.draw(pool)
        } else {
            pool.draw_front()
        }
    }

    /// Total stimulus audio of an item, or `None` if any audio asset is
    /// missing.
    fn audio_requirement(&self, item: &Item) -> Option<Duration> {
        let resolver = &self.collaborators.resolver;
        item.assets
            .collect(&self.config.assets.audio_fields)
            .try_fold(Duration::ZERO, |total, key| {
                resolver.resolve(AssetKind::Audio, key)?;
                Some(total + resolver.audio_duration(key).unwrap_or_default())
            })
    }

    async fn run_trial(
        &mut self,
        item: Item,
        phase: Phase,
        timer: &mut SessionTimer,
        preload: &mut PreloadPipeline,
    ) -> Result<()> {
        let trial_index = self.ctx.next_trial_index();

        let Some(audio) = self.audio_requirement(&item) else {
            warn!(
                item_id = %item.id,
                trial_type = %item.trial_type,
                "Missing audio asset, skipping trial"
            );
            self.ctx.skipped_missing_audio += 1;
            let record = self.skipped_record(&item, phase, trial_index, timer);
            return self.collaborators.sink.record(record).await;
        };

        if timer.end_if_insufficient(audio) {
            return Ok(());
        }

        if let Some(batch) = self.plan.assets.batch_of(&item.id) {
            preload.ensure_loaded(batch).await?;
        }

        let target = item.answer.as_ref().map(ToString::to_string);
        let choices =
            self.ctx
                .choices
                .prepare(target.as_deref(), &item.distractors, &mut self.ctx.rng);
        let request = TrialRequest {
            item,
            choices,
            pool: phase.pool,
            block: phase.block,
        };

        let response = tokio::select! {
            biased;
            reason = self.latch.wait() => {
                debug!(item_id = %request.item.id, reason = %reason, "Session ended during trial");
                return Ok(());
            }
            response = self.collaborators.renderer.present(&request) => response?,
        };

        let TrialRequest { item, choices, .. } = request;
        let correct = response.is_correct;

        let update = self.ctx.selector.record(&item, correct);
        let skip = self
            .ctx
            .skipper
            .observe(&item, correct, self.plan.corpus.pool_mut(phase.pool));
        let discarded = skip.map_or(0, |s| s.discarded);

        self.ctx.presented += 1;
        self.ctx.correct += usize::from(correct);
        self.ctx.discarded_by_skips += discarded;

        let ChoiceSet {
            choices,
            correct_index,
            ..
        } = choices;
        let record = TrialRecord {
            session_id: self.ctx.id,
            trial_index,
            item_id: item.id.to_string(),
            task: item.task.clone(),
            trial_type: item.trial_type.clone(),
            stage: item.stage,
            pool: phase.pool,
            block: phase.block,
            status: TrialStatus::Presented,
            difficulty: item.difficulty(),
            choices,
            correct_index,
            correct: Some(correct),
            latency_ms: Some(response.latency_ms),
            response_source: Some(response.response_source),
            theta: update.theta,
            discarded,
            elapsed_ms: timer.elapsed().as_millis() as u64,
            recorded_at: Utc::now(),
        };
        self.collaborators.sink.record(record).await?;

        if update.stop {
            self.latch.finish(EndReason::StoppingRule);
        }
        Ok(())
    }

    fn skipped_record(
        &self,
        item: &Item,
        phase: Phase,
        trial_index: usize,
        timer: &SessionTimer,
    ) -> TrialRecord {
        TrialRecord {
            session_id: self.ctx.id,
            trial_index,
            item_id: item.id.to_string(),
            task: item.task.clone(),
            trial_type: item.trial_type.clone(),
            stage: item.stage,
            pool: phase.pool,
            block: phase.block,
            status: TrialStatus::SkippedMissingAudio,
            difficulty: item.difficulty(),
            choices: Vec::new(),
            correct_index: None,
            correct: None,
            latency_ms: None,
            response_source: None,
            theta: self.ctx.selector.theta(),
            discarded: 0,
            elapsed_ms: timer.elapsed().as_millis() as u64,
            recorded_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use rand::SeedableRng;

    use super::*;
    use crate::assets::{AssetCatalog, ItemField, PermissiveResolver, RecordingPreloader};
    use crate::item::fixtures::test_item;
    use crate::selector::SequentialEngine;

    fn config() -> SessionConfig {
        let mut config = SessionConfig::default();
        config.start_items.enabled = false;
        config.batch_size = 5;
        config
    }

    fn collaborators(
        resolver: Arc<dyn AssetResolver>,
        renderer: Arc<dyn TrialRenderer>,
        sink: Arc<InMemoryTrialSink>,
    ) -> Collaborators {
        Collaborators {
            resolver,
            preloader: Arc::new(RecordingPreloader::new()),
            renderer,
            sink,
        }
    }

    fn session(
        config: SessionConfig,
        items: Vec<Item>,
        collaborators: Collaborators,
    ) -> Result<Session> {
        Session::new(
            config,
            items,
            Box::new(SequentialEngine::new()),
            collaborators,
            StdRng::seed_from_u64(9),
        )
    }

    /// Items of distinct trial types, so failure skipping never triggers.
    fn distinct_items(count: u32) -> Vec<Item> {
        (0..count)
            .map(|n| test_item(n, &format!("type-{}", n), 0.0))
            .collect()
    }

    fn with_audio(mut item: Item, reference: &str) -> Item {
        item.audio_file = Some(reference.to_string());
        item.assets.insert(ItemField::AudioFile, [reference]);
        item
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausts_all_items() {
        let sink = Arc::new(InMemoryTrialSink::new());
        let renderer = Arc::new(ScriptedRenderer::new(true));
        let session = session(
            config(),
            distinct_items(6),
            collaborators(Arc::new(PermissiveResolver), renderer, sink.clone()),
        )
        .unwrap();

        let summary = session.run().await.unwrap();
        assert_eq!(summary.end_reason, EndReason::Exhausted);
        assert_eq!(summary.presented, 6);
        assert_eq!(summary.correct, 6);
        assert!(summary.theta > 0.0);
        assert_eq!(sink.records().await.len(), 6);
        assert_eq!(sink.summary().await, Some(summary));
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_audio_skips_trial() {
        let items = vec![
            with_audio(test_item(1, "A", 0.0), "hello"),
            with_audio(test_item(2, "B", 0.0), "missing-clip"),
            with_audio(test_item(3, "C", 0.0), "hello"),
        ];
        let catalog =
            AssetCatalog::new().with_audio("hello", "a/hello.mp3", Duration::from_secs(1));
        let sink = Arc::new(InMemoryTrialSink::new());
        let renderer = Arc::new(ScriptedRenderer::new(true));
        let session = session(
            config(),
            items,
            collaborators(Arc::new(catalog), renderer.clone(), sink.clone()),
        )
        .unwrap();

        let summary = session.run().await.unwrap();
        assert_eq!(summary.presented, 2);
        assert_eq!(summary.skipped_missing_audio, 1);

        let presented: Vec<u32> = renderer
            .presented()
            .await
            .iter()
            .map(|r| r.item.id.number)
            .collect();
        assert_eq!(presented, vec![1, 3]);

        let records = sink.records().await;
        assert_eq!(records[1].status, TrialStatus::SkippedMissingAudio);
        assert_eq!(records[1].item_id, "bank-2");
        assert!(records[1].correct.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stopping_rule_ends_session() {
        let sink = Arc::new(InMemoryTrialSink::new());
        let renderer = Arc::new(ScriptedRenderer::new(false));
        let session = session(
            config(),
            distinct_items(15),
            collaborators(Arc::new(PermissiveResolver), renderer, sink.clone()),
        )
        .unwrap();

        let summary = session.run().await.unwrap();
        assert_eq!(summary.end_reason, EndReason::StoppingRule);
        assert_eq!(summary.presented, 10);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_interrupts_trial() {
        let mut config = config();
        config.max_time_minutes = 1.0;
        let sink = Arc::new(InMemoryTrialSink::new());
        let renderer = Arc::new(ScriptedRenderer::new(true).with_latency(25_000));
        let session = session(
            config,
            distinct_items(10),
            collaborators(Arc::new(PermissiveResolver), renderer, sink.clone()),
        )
        .unwrap();

        let summary = session.run().await.unwrap();
        assert_eq!(summary.end_reason, EndReason::Deadline);
        assert_eq!(summary.presented, 2);
        assert_eq!(sink.records().await.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_insufficient_time_ends_early() {
        let mut config = config();
        config.max_time_minutes = 1.0;
        let items: Vec<Item> = distinct_items(20)
            .into_iter()
            .map(|item| with_audio(item, "long-story"))
            .collect();
        let catalog =
            AssetCatalog::new().with_audio("long-story", "a/story.mp3", Duration::from_secs(50));
        let sink = Arc::new(InMemoryTrialSink::new());
        let renderer = Arc::new(ScriptedRenderer::new(true).with_latency(1_000));
        let session = session(
            config,
            items,
            collaborators(Arc::new(catalog), renderer, sink.clone()),
        )
        .unwrap();

        let summary = session.run().await.unwrap();
        assert_eq!(summary.end_reason, EndReason::InsufficientTime);
        assert_eq!(summary.presented, 9);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_corpus_policy() {
        let sink = Arc::new(InMemoryTrialSink::new());
        let renderer = Arc::new(ScriptedRenderer::new(true));
        let collab = collaborators(Arc::new(PermissiveResolver), renderer, sink.clone());

        let mut failing = config();
        failing.empty_corpus = EmptyCorpusPolicy::Fail;
        assert!(matches!(
            session(failing, Vec::new(), collab.clone()),
            Err(TrialkitError::EmptyCorpus)
        ));

        let summary = session(config(), Vec::new(), collab)
            .unwrap()
            .run()
            .await
            .unwrap();
        assert_eq!(summary.end_reason, EndReason::Exhausted);
        assert_eq!(summary.presented, 0);
    }

    struct BrokenRenderer;

    #[async_trait]
    impl TrialRenderer for BrokenRenderer {
        async fn present(&self, _request: &TrialRequest) -> Result<TrialResponse> {
            Err(TrialkitError::Renderer("display lost".into()))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_renderer_failure_aborts_and_finishes_sink() {
        let sink = Arc::new(InMemoryTrialSink::new());
        let session = session(
            config(),
            distinct_items(3),
            collaborators(Arc::new(PermissiveResolver), Arc::new(BrokenRenderer), sink.clone()),
        )
        .unwrap();

        let err = session.run().await.unwrap_err();
        assert!(matches!(err, TrialkitError::Renderer(_)));
        assert_eq!(
            sink.summary().await.map(|s| s.end_reason),
            Some(EndReason::Aborted)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_external_end() {
        let sink = Arc::new(InMemoryTrialSink::new());
        let renderer = Arc::new(ScriptedRenderer::new(true));
        let session = session(
            config(),
            distinct_items(5),
            collaborators(Arc::new(PermissiveResolver), renderer, sink.clone()),
        )
        .unwrap();

        let latch = session.end_latch();
        assert!(latch.finish(EndReason::Aborted));
        let summary = session.run().await.unwrap();
        assert_eq!(summary.end_reason, EndReason::Aborted);
        assert_eq!(summary.presented, 0);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = config();
        config.batch_size = 0;
        let sink = Arc::new(InMemoryTrialSink::new());
        let collab = collaborators(
            Arc::new(PermissiveResolver),
            Arc::new(ScriptedRenderer::new(true)),
            sink,
        );
        assert!(matches!(
            session(config, distinct_items(2), collab),
            Err(TrialkitError::InvalidConfig(_))
        ));
    }
}
