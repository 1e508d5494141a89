//! Orchestration service.
//!
//! Composes the pipeline into two operations:
//! - `deduplicate_and_index`: filter a batch against the session index
//! - `cluster_and_label`: vectorize and cluster on a blocking worker, then
//!   fan out label synthesis and per-document enrichment to the remote text
//!   service with bounded concurrency
//!
//! Remote failures never abort a run. Each one is converted to its fallback
//! (keyword label, empty extraction) and recorded in the [`RunReport`].
//! Invariant violations are returned as errors immediately.

use std::collections::{BTreeSet, HashSet};
use std::future::Future;
use std::sync::{Arc, Mutex};

use futures::future::{Either, FutureExt};
use futures::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use sieve_dedup::{DedupStats, Deduplicator};
use sieve_text::{
    CacheStore, CachedTextService, Extraction, LanguageGuess, Operation, TextService,
    TextServiceError, TextServiceMetricsSnapshot,
};
use sieve_topics::{
    candidate_strings, truncate_at_word, ClusterConfig, ClusterDocument, DensityClusterer,
    FeatureVectorizer, KeywordLabeler, StopWords, TopicLabel, TopicsConfig,
};
use sieve_types::{ClusterId, Document, DocumentId, DocumentStatus, LabelSource, TopicCluster};

use crate::error::ServiceError;
use crate::report::{DegradedTarget, LabeledRun, RunReport};
use crate::settings::Settings;

/// Deduplication and topic clustering over one session.
///
/// The near-duplicate index lives for the lifetime of the service and is
/// guarded by a mutex: concurrent `deduplicate_and_index` callers are
/// serialized, and the first to take the lock wins ties.
pub struct SieveService {
    pub(crate) settings: Settings,
    pub(crate) deduplicator: Mutex<Deduplicator>,
    text: CachedTextService<Arc<dyn TextService>>,
    stop_words: StopWords,
}

impl SieveService {
    /// Create a service. Fails fast on invalid configuration.
    pub fn new(
        settings: Settings,
        text_service: Arc<dyn TextService>,
        cache: Arc<dyn CacheStore>,
    ) -> Result<Self, ServiceError> {
        settings.validate()?;
        let deduplicator = Deduplicator::new(settings.dedup.clone())?;
        let text = CachedTextService::new(text_service, cache, settings.text.clone())?;
        Ok(Self {
            settings,
            deduplicator: Mutex::new(deduplicator),
            text,
            stop_words: StopWords::builtin(),
        })
    }

    /// Replace the built-in stop word lists.
    pub fn with_stop_words(mut self, stop_words: StopWords) -> Self {
        self.stop_words = stop_words;
        self
    }

    /// Settings in use.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Remote text service counters.
    pub fn text_metrics(&self) -> TextServiceMetricsSnapshot {
        self.text.metrics().snapshot()
    }

    /// Number of fingerprinted documents in the session index.
    pub fn indexed_documents(&self) -> Result<usize, ServiceError> {
        Ok(self.lock_deduplicator()?.index().len())
    }

    pub(crate) fn lock_deduplicator(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, Deduplicator>, ServiceError> {
        self.deduplicator
            .lock()
            .map_err(|_| ServiceError::Invariant("deduplicator lock poisoned".to_string()))
    }

    /// Filter `documents` to those not seen before in this session.
    #[instrument(skip(self, documents), fields(count = documents.len()))]
    pub fn deduplicate_and_index(
        &self,
        documents: Vec<Document>,
    ) -> Result<(Vec<Document>, DedupStats), ServiceError> {
        let mut deduplicator = self.lock_deduplicator()?;
        Ok(deduplicator.deduplicate(documents))
    }

    /// Group `documents` into unlabeled topic clusters.
    ///
    /// Real clusters come first in discovery order, followed by the noise
    /// pseudo-cluster when any document is noise.
    #[instrument(skip(self, documents), fields(count = documents.len()))]
    pub fn cluster(
        &self,
        documents: &[Document],
        config: &ClusterConfig,
    ) -> Result<Vec<TopicCluster>, ServiceError> {
        let topics = self.topics_with(config)?;
        let inputs = analysis_inputs(documents);
        Ok(analyze(&inputs, &topics, &self.stop_words)?.clusters)
    }

    /// Cluster `documents`, then label clusters and enrich documents.
    ///
    /// Cancelling `cancel` stops new remote calls from being issued; calls
    /// already in flight finish or time out on their own. Clusters whose
    /// label call was skipped get the keyword fallback and the report is
    /// marked partial.
    #[instrument(skip(self, documents, cancel), fields(count = documents.len()))]
    pub async fn cluster_and_label(
        &self,
        mut documents: Vec<Document>,
        config: &ClusterConfig,
        cancel: &CancellationToken,
    ) -> Result<LabeledRun, ServiceError> {
        let topics = self.topics_with(config)?;
        let inputs = analysis_inputs(&documents);
        let stop_words = self.stop_words.clone();
        let analysis =
            tokio::task::spawn_blocking(move || analyze(&inputs, &topics, &stop_words)).await??;

        let Analysis {
            mut clusters,
            plans,
            unfiltered_languages,
            cluster_count,
            noise_count,
        } = analysis;

        let mut report = RunReport {
            cluster_count,
            clustered_documents: documents.len() - noise_count,
            noise_count,
            unfiltered_languages,
            ..Default::default()
        };

        let concurrency = self.settings.text.max_concurrent_calls;
        let tasks = plans
            .iter()
            .map(|plan| Either::Left(self.synthesize_label(plan, cancel).map(Outcome::Label)))
            .chain(documents.iter().enumerate().map(|(index, doc)| {
                Either::Right(self.enrich_document(index, doc, cancel).map(Outcome::Document))
            }));
        let outcomes: Vec<Outcome> = stream::iter(tasks)
            .buffer_unordered(concurrency)
            .collect()
            .await;

        for outcome in outcomes {
            match outcome {
                Outcome::Label(label) => {
                    let plan = plans
                        .iter()
                        .find(|p| p.cluster_id == label.cluster_id)
                        .ok_or_else(|| {
                            ServiceError::Invariant(format!(
                                "label result for unknown cluster {}",
                                label.cluster_id
                            ))
                        })?;
                    let cluster = clusters
                        .iter_mut()
                        .find(|c| c.cluster_id == label.cluster_id)
                        .ok_or_else(|| {
                            ServiceError::Invariant(format!(
                                "cluster {} missing from result set",
                                label.cluster_id
                            ))
                        })?;
                    self.apply_label(cluster, plan, label.outcome, &mut report);
                }
                Outcome::Document(enriched) => {
                    let doc = documents.get_mut(enriched.index).ok_or_else(|| {
                        ServiceError::Invariant(format!(
                            "enrichment result for position {} outside the batch",
                            enriched.index
                        ))
                    })?;
                    apply_enrichment(doc, enriched, &mut report);
                }
            }
        }

        for doc in &mut documents {
            doc.status = DocumentStatus::Processed;
        }
        report.degraded.sort_by(|a, b| {
            a.target
                .cmp(&b.target)
                .then_with(|| a.operation.as_str().cmp(b.operation.as_str()))
        });

        if report.partial {
            warn!(
                skipped = report.skipped_calls,
                "Run cancelled, results are partial"
            );
        }
        info!(
            clusters = report.cluster_count,
            noise = report.noise_count,
            attempted = report.attempted_calls,
            failed = report.failed_calls,
            remote_labels = report.remote_labels,
            fallback_labels = report.fallback_labels,
            "Cluster-and-label run complete"
        );

        Ok(LabeledRun {
            clusters,
            documents,
            report,
        })
    }

    fn topics_with(&self, cluster: &ClusterConfig) -> Result<TopicsConfig, ServiceError> {
        let topics = TopicsConfig {
            cluster: cluster.clone(),
            ..self.settings.topics.clone()
        };
        topics.validate()?;
        Ok(topics)
    }

    async fn synthesize_label(&self, plan: &ClusterPlan, cancel: &CancellationToken) -> LabelOutcome {
        let outcome = if plan.candidates.is_empty() {
            None
        } else {
            Some(
                issue(cancel, || {
                    self.text.synthesize_label_with(&plan.candidates, cancel)
                })
                .await,
            )
        };
        LabelOutcome {
            cluster_id: plan.cluster_id,
            outcome,
        }
    }

    async fn enrich_document(
        &self,
        index: usize,
        doc: &Document,
        cancel: &CancellationToken,
    ) -> DocumentOutcome {
        if doc.content.trim().is_empty() {
            return DocumentOutcome {
                index,
                detected: None,
                extraction: None,
            };
        }

        let mut language = doc.language.clone();
        let detected = if language.is_none() {
            let outcome = issue(cancel, || {
                self.text.detect_language_with(&doc.content, cancel)
            })
            .await;
            if let CallOutcome::Done(guess) = &outcome {
                language = Some(guess.code.clone());
            }
            Some(outcome)
        } else {
            None
        };

        let extraction = issue(cancel, || {
            self.text
                .extract_entities_with(&doc.content, language.as_deref(), cancel)
        })
        .await;

        DocumentOutcome {
            index,
            detected,
            extraction: Some(extraction),
        }
    }

    fn apply_label(
        &self,
        cluster: &mut TopicCluster,
        plan: &ClusterPlan,
        outcome: Option<CallOutcome<String>>,
        report: &mut RunReport,
    ) {
        let target = DegradedTarget::Cluster(cluster.cluster_id);
        let operation = Operation::SynthesizeLabel;
        let reason = match outcome {
            Some(CallOutcome::Done(label)) => {
                report.attempted_calls += 1;
                let label =
                    truncate_at_word(label.trim(), self.settings.topics.labeling.max_label_length);
                if !label.is_empty() {
                    debug!(cluster = %cluster.cluster_id, label = %label, "Remote label");
                    cluster.set_label(label, LabelSource::Remote);
                    report.remote_labels += 1;
                    return;
                }
                report.record_failure(target, operation, "empty label".to_string());
                "empty label"
            }
            Some(CallOutcome::Failed(e)) => {
                report.attempted_calls += 1;
                report.record_failure(target, operation, e.to_string());
                "remote call failed"
            }
            Some(CallOutcome::Skipped) => {
                report.record_skip(target, operation);
                "cancelled"
            }
            None => "no candidate text",
        };

        warn!(
            cluster = %cluster.cluster_id,
            reason,
            label = %plan.fallback.label,
            "Using fallback label"
        );
        cluster.set_label(plan.fallback.label.clone(), LabelSource::Fallback);
        report.fallback_labels += 1;
    }
}

/// Merge remote enrichment into a document. Failures leave empty sets.
fn apply_enrichment(doc: &mut Document, enriched: DocumentOutcome, report: &mut RunReport) {
    let id = doc.id.clone();
    let target = || DegradedTarget::Document(id.clone());

    match enriched.detected {
        Some(CallOutcome::Done(guess)) => {
            report.attempted_calls += 1;
            debug!(doc_id = %doc.id, language = %guess.code, confidence = guess.confidence, "Detected language");
            doc.language = Some(guess.code);
        }
        Some(CallOutcome::Failed(e)) => {
            report.attempted_calls += 1;
            warn!(doc_id = %doc.id, error = %e, "Language detection failed");
            report.record_failure(target(), Operation::DetectLanguage, e.to_string());
        }
        Some(CallOutcome::Skipped) => report.record_skip(target(), Operation::DetectLanguage),
        None => {}
    }

    match enriched.extraction {
        Some(CallOutcome::Done(extraction)) => {
            report.attempted_calls += 1;
            doc.entities = extraction.entities;
            doc.keywords = extraction.keywords;
        }
        Some(CallOutcome::Failed(e)) => {
            report.attempted_calls += 1;
            warn!(doc_id = %doc.id, error = %e, "Extraction failed, leaving entities empty");
            report.record_failure(target(), Operation::ExtractEntities, e.to_string());
            let empty = Extraction::default();
            doc.entities = empty.entities;
            doc.keywords = empty.keywords;
        }
        Some(CallOutcome::Skipped) => report.record_skip(target(), Operation::ExtractEntities),
        None => {}
    }
}

/// Issue a remote call unless the run has been cancelled.
async fn issue<T, F, Fut>(cancel: &CancellationToken, call: F) -> CallOutcome<T>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, TextServiceError>>,
{
    if cancel.is_cancelled() {
        return CallOutcome::Skipped;
    }
    match call().await {
        Ok(value) => CallOutcome::Done(value),
        Err(e) => CallOutcome::Failed(e),
    }
}

enum CallOutcome<T> {
    Done(T),
    Failed(TextServiceError),
    Skipped,
}

struct LabelOutcome {
    cluster_id: ClusterId,
    /// `None` when there was nothing to send
    outcome: Option<CallOutcome<String>>,
}

struct DocumentOutcome {
    index: usize,
    detected: Option<CallOutcome<LanguageGuess>>,
    extraction: Option<CallOutcome<Extraction>>,
}

enum Outcome {
    Label(LabelOutcome),
    Document(DocumentOutcome),
}

/// Owned copy of what the CPU-bound step needs from a document.
struct AnalysisInput {
    id: DocumentId,
    text: String,
    language: Option<String>,
}

fn analysis_inputs(documents: &[Document]) -> Vec<AnalysisInput> {
    documents
        .iter()
        .map(|doc| AnalysisInput {
            id: doc.id.clone(),
            text: doc.content.clone(),
            language: doc.language.clone(),
        })
        .collect()
}

/// Per-cluster labeling inputs prepared during analysis.
struct ClusterPlan {
    cluster_id: ClusterId,
    fallback: TopicLabel,
    candidates: Vec<String>,
}

struct Analysis {
    clusters: Vec<TopicCluster>,
    plans: Vec<ClusterPlan>,
    unfiltered_languages: BTreeSet<String>,
    cluster_count: usize,
    noise_count: usize,
}

/// Vectorize, cluster and prepare fallback labels. Synchronous.
fn analyze(
    inputs: &[AnalysisInput],
    topics: &TopicsConfig,
    stop_words: &StopWords,
) -> Result<Analysis, ServiceError> {
    let known: HashSet<&str> = inputs.iter().map(|d| d.id.as_str()).collect();
    if known.len() != inputs.len() {
        return Err(ServiceError::InvalidInput(
            "document ids must be unique within a batch".to_string(),
        ));
    }

    let vectorizer = FeatureVectorizer::new(topics.vectorizer.clone(), stop_words.clone())?;
    let clusterer = DensityClusterer::new(topics.cluster.clone())?;
    let labeler = KeywordLabeler::new(topics.labeling.clone(), stop_words.clone());

    let texts: Vec<&str> = inputs.iter().map(|d| d.text.as_str()).collect();
    let languages: Vec<Option<&str>> = inputs.iter().map(|d| d.language.as_deref()).collect();
    let vectorized = vectorizer.fit_transform(&texts, &languages)?;
    let result = clusterer.cluster(&vectorized.vectors);
    if result.assignments.len() != inputs.len() {
        return Err(ServiceError::Invariant(format!(
            "{} assignments for {} documents",
            result.assignments.len(),
            inputs.len()
        )));
    }

    let mut clusters = Vec::with_capacity(result.cluster_count + 1);
    let mut plans = Vec::with_capacity(result.cluster_count);
    for index in 0..result.cluster_count {
        let cluster_id = ClusterId::topic(index);
        let members = result.members(index);
        let docs: Vec<ClusterDocument> = members
            .iter()
            .map(|&i| {
                ClusterDocument::new(
                    inputs[i].id.clone(),
                    inputs[i].text.clone(),
                    inputs[i].language.clone(),
                )
            })
            .collect();

        let fallback = labeler.label_cluster(&docs)?;
        let candidates = candidate_strings(
            &docs,
            topics.labeling.max_candidates,
            topics.labeling.max_candidate_chars,
        );

        let mut cluster = TopicCluster::new(
            cluster_id,
            docs.into_iter().map(|d| d.doc_id).collect(),
        );
        cluster.keywords = fallback.keywords.clone();
        clusters.push(cluster);
        plans.push(ClusterPlan {
            cluster_id,
            fallback,
            candidates,
        });
    }

    let noise = result.noise();
    if !noise.is_empty() {
        clusters.push(TopicCluster::noise(
            noise.iter().map(|&i| inputs[i].id.clone()).collect(),
        ));
    }

    let mut covered = 0;
    for cluster in &clusters {
        cluster.ensure_members_within(&known)?;
        covered += cluster.size;
    }
    if covered != inputs.len() {
        return Err(ServiceError::Invariant(format!(
            "clusters cover {} of {} documents",
            covered,
            inputs.len()
        )));
    }

    Ok(Analysis {
        clusters,
        plans,
        unfiltered_languages: vectorized.unfiltered_languages,
        cluster_count: result.cluster_count,
        noise_count: result.noise_count,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use sieve_text::{DisabledTextService, MemoryCache, MockTextService};

    fn service(text: Arc<dyn TextService>) -> SieveService {
        SieveService::new(Settings::default(), text, Arc::new(MemoryCache::new())).unwrap()
    }

    fn doc(id: &str, content: &str) -> Document {
        Document::with_id(id, None, content.to_string(), Some("en".to_string()))
    }

    #[test]
    fn test_invalid_settings_fail_fast() {
        let mut settings = Settings::default();
        settings.dedup.similarity_threshold = 1.5;
        let result = SieveService::new(
            settings,
            Arc::new(DisabledTextService),
            Arc::new(MemoryCache::new()),
        );
        assert!(matches!(result, Err(ServiceError::Dedup(_))));
    }

    #[test]
    fn test_cluster_rejects_invalid_config() {
        let service = service(Arc::new(DisabledTextService));
        let config = ClusterConfig {
            min_cluster_size: 1,
            ..Default::default()
        };
        assert!(matches!(
            service.cluster(&[], &config),
            Err(ServiceError::Topics(_))
        ));
    }

    #[test]
    fn test_cluster_empty_input() {
        let service = service(Arc::new(DisabledTextService));
        let clusters = service.cluster(&[], &ClusterConfig::default()).unwrap();
        assert!(clusters.is_empty());
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let service = service(Arc::new(DisabledTextService));
        let docs = vec![doc("a", "alpha beta"), doc("a", "gamma delta")];
        assert!(matches!(
            service.cluster(&docs, &ClusterConfig::default()),
            Err(ServiceError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_deduplicate_and_index_grows_index() {
        let service = service(Arc::new(DisabledTextService));
        let docs = vec![
            doc("a", "the quick brown fox jumps over the lazy dog"),
            doc("b", "completely different words about compilers and parsers"),
        ];
        let (unique, stats) = service.deduplicate_and_index(docs).unwrap();
        assert_eq!(unique.len(), 2);
        assert_eq!(stats.duplicates_removed(), 0);
        assert_eq!(service.indexed_documents().unwrap(), 2);
    }

    #[tokio::test]
    async fn test_small_batch_is_noise_and_skips_labels() {
        let mock = Arc::new(MockTextService::new());
        let service = service(mock.clone());
        let docs = vec![doc("a", "Ferris likes Rust"), doc("b", "Tokio runs tasks")];

        let run = service
            .cluster_and_label(docs, &ClusterConfig::default(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(run.report.cluster_count, 0);
        assert_eq!(run.report.noise_count, 2);
        assert_eq!(run.clusters.len(), 1);
        assert!(run.clusters[0].is_noise());
        assert!(run.clusters[0].label.is_none());
        // Extraction only; no label calls for noise
        assert_eq!(run.report.attempted_calls, 2);
        assert_eq!(mock.calls(), 2);
        assert!(run
            .documents
            .iter()
            .all(|d| d.status == DocumentStatus::Processed));
    }

    #[tokio::test]
    async fn test_missing_language_is_detected() {
        let mock = Arc::new(MockTextService::with_language("de"));
        let service = service(mock.clone());
        let docs = vec![Document::with_id(
            "a",
            None,
            "Guten Tag aus Berlin".to_string(),
            None,
        )];

        let run = service
            .cluster_and_label(docs, &ClusterConfig::default(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(run.documents[0].language.as_deref(), Some("de"));
        assert!(run.documents[0].entities.contains("Berlin"));
        assert_eq!(run.report.attempted_calls, 2);
    }

    #[tokio::test]
    async fn test_blank_documents_make_no_calls() {
        let mock = Arc::new(MockTextService::new());
        let service = service(mock.clone());
        let run = service
            .cluster_and_label(
                vec![doc("a", "   ")],
                &ClusterConfig::default(),
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(run.report.attempted_calls, 0);
        assert_eq!(mock.calls(), 0);
        assert!(run.report.degraded.is_empty());
    }
}
