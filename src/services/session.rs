// src/services/session.rs

//! Runtime state of a single exam attempt.
//!
//! A session lives only in memory. It answers and navigates locally and touches the
//! store exactly once, when it is finalized.

use std::{
    collections::HashMap,
    sync::{Arc, PoisonError, RwLock},
    time::{Duration, Instant},
};

use chrono::{DateTime, Utc};
use tokio::{sync::Mutex, task::JoinHandle};
use uuid::Uuid;

use crate::{
    models::{
        history::{NewHistoryRecord, NewOutcome, OutcomeDraft},
        question::DeliveredQuestion,
        session::{AttemptSummary, SessionQuestionView, SessionView},
    },
    services::{catalog::ExamCatalog, error::ServiceError, history::HistoryStore},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Active { current_index: usize },
    /// The completion flag is set and the record write runs in its own task. A caller
    /// that stopped waiting leaves the write running; the next finalize picks it up.
    Finalizing { resume_at: usize },
    Completed { record_id: i64 },
}

impl SessionState {
    pub fn label(&self) -> &'static str {
        match self {
            SessionState::Active { .. } => "active",
            SessionState::Finalizing { .. } => "finalizing",
            SessionState::Completed { .. } => "completed",
        }
    }
}

/// Answer state of one question.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AnswerSlot {
    pub selected_index: Option<usize>,
    pub is_correct: Option<bool>,
    pub locked: bool,
}

/// Result of `advance`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Advance {
    Moved { current_index: usize },
    Completed(AttemptSummary),
}

type PendingWrite = JoinHandle<Result<AttemptSummary, ServiceError>>;

#[derive(Debug)]
pub struct ExamSession {
    exam_id: i64,
    user_id: i64,
    exam_label: String,
    questions: Vec<DeliveredQuestion>,
    slots: Vec<AnswerSlot>,
    state: SessionState,
    pending: Option<PendingWrite>,
    score: usize,
    started: Instant,
    started_at: DateTime<Utc>,
    last_activity: Instant,
    completed: Option<Instant>,
}

impl ExamSession {
    pub fn new(
        exam_id: i64,
        user_id: i64,
        exam_label: impl Into<String>,
        questions: Vec<DeliveredQuestion>,
    ) -> Result<Self, ServiceError> {
        if questions.is_empty() {
            return Err(ServiceError::validation(format!(
                "exam {} has no questions",
                exam_id
            )));
        }
        if let Some(bad) = questions.iter().find(|q| q.answer_index > 3) {
            return Err(ServiceError::validation(format!(
                "question {} has answer index {}",
                bad.id, bad.answer_index
            )));
        }

        Ok(Self {
            exam_id,
            user_id,
            exam_label: exam_label.into(),
            slots: vec![AnswerSlot::default(); questions.len()],
            questions,
            state: SessionState::Active { current_index: 0 },
            pending: None,
            score: 0,
            started: Instant::now(),
            started_at: Utc::now(),
            last_activity: Instant::now(),
            completed: None,
        })
    }

    /// Starts an attempt on an active exam, labelled with the exam title.
    pub async fn start(
        catalog: &ExamCatalog,
        exam_id: i64,
        user_id: i64,
    ) -> Result<Self, ServiceError> {
        if user_id <= 0 {
            return Err(ServiceError::validation("user_id is required"));
        }
        let (exam, questions) = catalog.get_deliverable(exam_id).await?;
        Self::new(exam.id, user_id, exam.title, questions)
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_completed(&self) -> bool {
        matches!(self.state, SessionState::Completed { .. })
    }

    pub fn current_index(&self) -> Option<usize> {
        match self.state {
            SessionState::Active { current_index } => Some(current_index),
            _ => None,
        }
    }

    pub fn current_question(&self) -> Option<&DeliveredQuestion> {
        self.current_index().map(|i| &self.questions[i])
    }

    /// Running score: correct answers locked so far.
    pub fn score(&self) -> usize {
        self.score
    }

    pub fn slots(&self) -> &[AnswerSlot] {
        &self.slots
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    pub fn user_id(&self) -> i64 {
        self.user_id
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Locks `choice` as the answer of question `index`.
    ///
    /// Only legal while active and while the slot is still open. Does not move the cursor.
    pub fn select_answer(&mut self, index: usize, choice: usize) -> Result<bool, ServiceError> {
        if !matches!(self.state, SessionState::Active { .. }) {
            return Err(ServiceError::invalid_state(format!(
                "session is {}",
                self.state.label()
            )));
        }
        if index >= self.questions.len() {
            return Err(ServiceError::invalid_state(format!(
                "question index {} is out of bounds (0..{})",
                index,
                self.questions.len()
            )));
        }
        if choice > 3 {
            return Err(ServiceError::validation(format!(
                "choice {} is not an option index (0..=3)",
                choice
            )));
        }

        let slot = &mut self.slots[index];
        if slot.locked {
            return Err(ServiceError::invalid_state(format!(
                "question {} is already answered",
                index
            )));
        }

        let is_correct = choice == self.questions[index].answer_index;
        self.last_activity = Instant::now();
        *slot = AnswerSlot {
            selected_index: Some(choice),
            is_correct: Some(is_correct),
            locked: true,
        };
        if is_correct {
            self.score += 1;
        }
        Ok(is_correct)
    }

    /// Moves to the next question; at the last one, completes and finalizes the attempt.
    ///
    /// Retrying after an interrupted completion resumes the pending write.
    pub async fn advance(&mut self, store: &HistoryStore) -> Result<Advance, ServiceError> {
        let current_index = match self.state {
            SessionState::Active { current_index } => current_index,
            SessionState::Finalizing { .. } => {
                return self.finalize(store).await.map(Advance::Completed);
            }
            other => {
                return Err(ServiceError::invalid_state(format!(
                    "session is {}",
                    other.label()
                )));
            }
        };

        if current_index + 1 < self.questions.len() {
            let next = current_index + 1;
            self.last_activity = Instant::now();
            self.state = SessionState::Active {
                current_index: next,
            };
            return Ok(Advance::Moved {
                current_index: next,
            });
        }

        self.finalize(store).await.map(Advance::Completed)
    }

    /// Steps back one question. At the first question this is a no-op.
    pub fn retreat(&mut self) -> Result<usize, ServiceError> {
        match self.state {
            SessionState::Active { current_index } => {
                let previous = current_index.saturating_sub(1);
                self.last_activity = Instant::now();
                self.state = SessionState::Active {
                    current_index: previous,
                };
                Ok(previous)
            }
            other => Err(ServiceError::invalid_state(format!(
                "session is {}",
                other.label()
            ))),
        }
    }

    /// Scores the attempt and writes it to the history store. Runs at most once.
    ///
    /// The write runs in a spawned task whose handle stays on the session, so dropping
    /// this future does not cancel it: the next call awaits the same write instead of
    /// starting another. A failed record write puts the session back to `Active` so the
    /// attempt can be submitted again. Once completed, every call fails with
    /// `InvalidState` and writes nothing. Unanswered questions count as incorrect.
    pub async fn finalize(&mut self, store: &HistoryStore) -> Result<AttemptSummary, ServiceError> {
        match self.state {
            SessionState::Active { current_index } => {
                let record = self.scored_record();
                let drafts = self
                    .outcome_snapshots()
                    .into_iter()
                    .map(OutcomeDraft::snapshot)
                    .collect();

                self.state = SessionState::Finalizing {
                    resume_at: current_index,
                };
                self.last_activity = Instant::now();
                self.pending = Some(tokio::spawn(persist_attempt(
                    store.clone(),
                    record,
                    drafts,
                )));
            }
            SessionState::Finalizing { .. } => {
                tracing::info!(
                    "Resuming interrupted finalize on exam {} for user {}",
                    self.exam_id,
                    self.user_id
                );
            }
            SessionState::Completed { record_id } => {
                return Err(ServiceError::invalid_state(format!(
                    "attempt already saved as history record {}",
                    record_id
                )));
            }
        }

        let resume_at = match self.state {
            SessionState::Finalizing { resume_at } => resume_at,
            _ => 0,
        };
        let Some(pending) = self.pending.as_mut() else {
            self.state = SessionState::Active {
                current_index: resume_at,
            };
            return Err(ServiceError::invalid_state(
                "finalize lost track of its write, submit again",
            ));
        };

        let joined = pending.await;
        self.pending = None;
        let outcome = joined.unwrap_or_else(|e| Err(ServiceError::from(e)));

        match outcome {
            Ok(summary) => {
                self.state = SessionState::Completed {
                    record_id: summary.record_id,
                };
                self.completed = Some(Instant::now());
                tracing::info!(
                    "Attempt on exam {} by user {} finalized as record {} ({}/{})",
                    self.exam_id,
                    self.user_id,
                    summary.record_id,
                    summary.score,
                    summary.total_questions
                );
                Ok(summary)
            }
            Err(e) => {
                tracing::warn!(
                    "Finalizing attempt on exam {} for user {} failed: {}",
                    self.exam_id,
                    self.user_id,
                    e
                );
                self.state = SessionState::Active {
                    current_index: resume_at,
                };
                Err(e)
            }
        }
    }

    fn scored_record(&self) -> NewHistoryRecord {
        let score = self
            .slots
            .iter()
            .filter(|slot| slot.is_correct == Some(true))
            .count() as i64;

        NewHistoryRecord {
            user_id: self.user_id,
            exam_type: self.exam_label.clone(),
            score,
            total_questions: self.questions.len() as i64,
            time_spent: self.started.elapsed().as_secs() as i64,
        }
    }

    /// Whether the sweeper may drop this session: completed longer than `retention`
    /// ago, or untouched for `idle_ttl` while still open.
    pub fn is_expired(&self, now: Instant, idle_ttl: Duration, retention: Duration) -> bool {
        if self.pending.as_ref().is_some_and(|write| !write.is_finished()) {
            return false;
        }
        match self.completed {
            Some(at) => now.saturating_duration_since(at) >= retention,
            None => now.saturating_duration_since(self.last_activity) >= idle_ttl,
        }
    }

    /// Per-question snapshots in question order. Answers are stored as option indices.
    pub fn outcome_snapshots(&self) -> Vec<NewOutcome> {
        self.questions
            .iter()
            .zip(&self.slots)
            .map(|(question, slot)| NewOutcome {
                question_text: question.text.clone(),
                user_answer: slot.selected_index.map(|i| i.to_string()),
                correct_answer: question.answer_index.to_string(),
                is_correct: slot.is_correct.unwrap_or(false),
                explanation: question.explanation.clone(),
                topic: question.topic.clone(),
                difficulty: question.difficulty.clone(),
            })
            .collect()
    }

    pub fn question_view(&self, index: usize) -> Option<SessionQuestionView> {
        let question = self.questions.get(index)?;
        let slot = self.slots[index];
        Some(SessionQuestionView {
            id: question.id,
            text: question.text.clone(),
            options: question.options.clone(),
            topic: question.topic.clone(),
            difficulty: question.difficulty.clone(),
            selected_index: slot.selected_index,
            is_correct: slot.is_correct,
            locked: slot.locked,
            answer_index: slot.locked.then_some(question.answer_index),
            explanation: if slot.locked {
                question.explanation.clone()
            } else {
                None
            },
        })
    }

    pub fn view(&self, session_id: Uuid) -> SessionView {
        let current_index = self.current_index();
        SessionView {
            session_id,
            exam_id: self.exam_id,
            exam_type: self.exam_label.clone(),
            user_id: self.user_id,
            state: self.state.label(),
            current_index,
            total_questions: self.questions.len(),
            answered: self.slots.iter().filter(|slot| slot.locked).count(),
            score: self.score,
            record_id: match self.state {
                SessionState::Completed { record_id } => Some(record_id),
                _ => None,
            },
            current_question: current_index.and_then(|i| self.question_view(i)),
        }
    }
}

/// Record first, then outcomes. Runs detached from the request that started it.
async fn persist_attempt(
    store: HistoryStore,
    record: NewHistoryRecord,
    drafts: Vec<OutcomeDraft>,
) -> Result<AttemptSummary, ServiceError> {
    let record_id = store.save(&record).await?;
    let report = store.add_outcomes(record_id, drafts).await;

    Ok(AttemptSummary {
        record_id,
        score: record.score,
        total_questions: record.total_questions,
        time_spent: record.time_spent,
        outcomes_saved: report.inserted,
        outcomes_skipped: report.skipped,
    })
}

pub type SharedSession = Arc<Mutex<ExamSession>>;

/// In-memory table of running and finished attempts.
///
/// Each session sits behind its own async mutex, held across the finalize write, so a
/// retried completion waits for the first one and then sees the completed state.
/// Finished and abandoned sessions are dropped by [`SessionRegistry::sweep`].
#[derive(Clone, Debug, Default)]
pub struct SessionRegistry {
    sessions: Arc<RwLock<HashMap<Uuid, SharedSession>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, session: ExamSession) -> (Uuid, SharedSession) {
        let id = Uuid::new_v4();
        let shared = Arc::new(Mutex::new(session));
        self.sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, shared.clone());
        (id, shared)
    }

    pub fn get(&self, id: Uuid) -> Result<SharedSession, ServiceError> {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .cloned()
            .ok_or_else(|| ServiceError::not_found(format!("Session {} not found", id)))
    }

    pub fn remove(&self, id: Uuid) -> Result<(), ServiceError> {
        self.sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| ServiceError::not_found(format!("Session {} not found", id)))
    }

    pub fn len(&self) -> usize {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops completed sessions older than `retention` and open ones idle for `idle_ttl`.
    ///
    /// Sessions locked by a request are skipped until the next pass.
    pub fn sweep(&self, idle_ttl: Duration, retention: Duration) -> usize {
        let now = Instant::now();
        let expired: Vec<Uuid> = self
            .sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|(_, shared)| {
                shared
                    .try_lock()
                    .map(|session| session.is_expired(now, idle_ttl, retention))
                    .unwrap_or(false)
            })
            .map(|(id, _)| *id)
            .collect();

        if expired.is_empty() {
            return 0;
        }

        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        for id in &expired {
            sessions.remove(id);
        }
        tracing::debug!("Swept {} expired sessions, {} left", expired.len(), sessions.len());
        expired.len()
    }

    /// Runs `sweep` every `every` until the runtime shuts down.
    pub fn spawn_sweeper(
        &self,
        every: Duration,
        idle_ttl: Duration,
        retention: Duration,
    ) -> JoinHandle<()> {
        let registry = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            loop {
                ticker.tick().await;
                registry.sweep(idle_ttl, retention);
            }
        })
    }
}
