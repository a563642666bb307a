use log::{info, warn};
use serde::Deserialize;
use thiserror::Error;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::analysis::{AnalysisError, AnalysisInvoker};
use crate::database::{
    Assessment, AssessmentResponses, ConversationResponse, DatabaseError, DatabaseManager,
};
use crate::questions::{self, kind_for_id, QuestionSet};

#[derive(Error, Debug)]
pub enum AssessmentError {
    #[error("Validation failed: {0}")]
    Validation(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error(transparent)]
    Database(#[from] DatabaseError),
    #[error(transparent)]
    Analysis(#[from] AnalysisError),
}

pub type Result<T> = std::result::Result<T, AssessmentError>;

/// A parent's full answer set for one child, partitioned into short/long in
/// question order.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ParentSubmission {
    #[validate(custom = "all_answers_non_blank")]
    pub short: Vec<String>,
    #[validate(custom = "all_answers_non_blank")]
    pub long: Vec<String>,
}

fn all_answers_non_blank(answers: &[String]) -> std::result::Result<(), ValidationError> {
    if answers.iter().any(|answer| answer.trim().is_empty()) {
        return Err(ValidationError::new("blank_answer"));
    }
    Ok(())
}

/// What happened to the AI analysis during an aggregator operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnalysisOutcome {
    /// Completeness rule not met, or a result is already stored.
    NotTriggered,
    /// New analysis stored on this call.
    Stored,
    /// Analysis ran but another caller stored a result first; this one was
    /// discarded, never overwriting.
    Discarded,
    /// Retries exhausted. Nothing persisted, so a later call can succeed.
    Failed(String),
}

#[derive(Debug)]
pub struct AssessmentOutcome {
    pub assessment: Assessment,
    pub analysis: AnalysisOutcome,
}

/// Presentation-facing status of an assessment's insight report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisStatus {
    Pending,
    Ready,
    Failed,
}

/// Status from the stored row plus the most recent analysis outcome.
/// Failures are never persisted, so `Failed` can only come from the
/// outcome of the triggering call; a stored result always wins.
pub fn analysis_status(
    assessment: &Assessment,
    last_outcome: Option<&AnalysisOutcome>,
) -> AnalysisStatus {
    if assessment.ai_analysis.is_some() {
        return AnalysisStatus::Ready;
    }
    match last_outcome {
        Some(AnalysisOutcome::Failed(_)) => AnalysisStatus::Failed,
        _ => AnalysisStatus::Pending,
    }
}

/// Project stored rows into an `AssessmentResponses`, but only when the
/// respondent has answered every question in the set. A partial set must
/// never be projected.
pub fn project_complete_responses(
    rows: &[ConversationResponse],
    set: QuestionSet,
) -> Option<AssessmentResponses> {
    let expected: Vec<i32> = questions::all_questions(set).iter().map(|q| q.id).collect();

    for question_id in &expected {
        let answered = rows
            .iter()
            .any(|row| row.question_id == *question_id && !row.response.trim().is_empty());
        if !answered {
            return None;
        }
    }

    let relevant: Vec<ConversationResponse> = rows
        .iter()
        .filter(|row| expected.contains(&row.question_id))
        .cloned()
        .collect();

    Some(AssessmentResponses::from_rows(&relevant))
}

/// Validate a parent submission against the parent question set and
/// normalize it into trimmed `AssessmentResponses`.
pub fn validate_parent_submission(
    submission: &ParentSubmission,
) -> Result<AssessmentResponses> {
    submission
        .validate()
        .map_err(|_| AssessmentError::Validation("Every answer must be non-empty".to_string()))?;

    let expected_short = questions::short_questions(QuestionSet::Parent).len();
    let expected_long = questions::long_questions(QuestionSet::Parent).len();

    if submission.short.len() != expected_short {
        return Err(AssessmentError::Validation(format!(
            "Expected {} short answers, got {}",
            expected_short,
            submission.short.len()
        )));
    }
    if submission.long.len() != expected_long {
        return Err(AssessmentError::Validation(format!(
            "Expected {} long answers, got {}",
            expected_long,
            submission.long.len()
        )));
    }

    Ok(AssessmentResponses {
        short: submission.short.iter().map(|s| s.trim().to_string()).collect(),
        long: submission.long.iter().map(|s| s.trim().to_string()).collect(),
    })
}

/// The aggregator: single source of truth for merging a (family, parent,
/// child) triple's responses and deciding when analysis fires.
pub struct AssessmentService<'a> {
    db: &'a DatabaseManager,
    invoker: &'a AnalysisInvoker,
}

impl<'a> AssessmentService<'a> {
    pub fn new(db: &'a DatabaseManager, invoker: &'a AnalysisInvoker) -> Self {
        Self { db, invoker }
    }

    /// Store one answer as a respondent works through their questionnaire.
    /// Created on first answer, updated on edit.
    pub async fn record_response(
        &self,
        user_id: &Uuid,
        family_id: &Uuid,
        question_id: i32,
        answer: &str,
    ) -> Result<()> {
        let trimmed = answer.trim();
        if trimmed.is_empty() {
            return Err(AssessmentError::Validation(
                "Answer must not be empty".to_string(),
            ));
        }

        self.db
            .upsert_response(user_id, family_id, question_id, kind_for_id(question_id), trimmed)
            .await?;
        Ok(())
    }

    /// Mark a respondent's questionnaire finished once every question in
    /// their set has a stored answer.
    pub async fn complete_questionnaire(
        &self,
        user_id: &Uuid,
        family_id: &Uuid,
        set: QuestionSet,
    ) -> Result<()> {
        let rows = self.db.get_responses(user_id, family_id).await?;
        if project_complete_responses(&rows, set).is_none() {
            return Err(AssessmentError::Validation(
                "Questionnaire is not fully answered".to_string(),
            ));
        }

        self.db
            .mark_conversation_completed(user_id, family_id, questions::question_count(set) as i32)
            .await?;
        Ok(())
    }

    /// Parent entry point. Validates the submission, merges in the child's
    /// stored responses when they are complete, upserts the assessment row
    /// and triggers analysis when both sides are done.
    pub async fn submit_parent_responses(
        &self,
        family_id: &Uuid,
        parent_id: &Uuid,
        child_id: &Uuid,
        submission: &ParentSubmission,
    ) -> Result<AssessmentOutcome> {
        let parent_responses = validate_parent_submission(submission)?;

        let child_rows = self.db.get_responses(child_id, family_id).await?;
        let child_projection = project_complete_responses(&child_rows, QuestionSet::Child);

        let mut assessment = match self.db.get_assessment(parent_id, child_id).await? {
            Some(existing) => {
                self.db
                    .update_parent_responses(&existing.id, &parent_responses)
                    .await?;
                Assessment {
                    parent_responses: parent_responses.clone(),
                    ..existing
                }
            }
            None => {
                info!(
                    "First parent submission for child {}, creating assessment",
                    child_id
                );
                self.db
                    .create_assessment(family_id, parent_id, child_id, &parent_responses)
                    .await?
            }
        };

        // A complete child side replaces whatever projection was stored
        // before; an incomplete one leaves the stored side untouched.
        if let Some(child_responses) = child_projection {
            self.db
                .update_child_responses(&assessment.id, &child_responses)
                .await?;
            assessment.child_responses = child_responses;
        }

        let analysis = self.maybe_run_analysis(&mut assessment).await?;
        Ok(AssessmentOutcome { assessment, analysis })
    }

    /// Child entry point, called after the child finishes their own
    /// questionnaire. The parent must have submitted first: their
    /// submission is what creates the assessment row.
    pub async fn link_child_responses(
        &self,
        child_id: &Uuid,
        family_id: &Uuid,
    ) -> Result<AssessmentOutcome> {
        let rows = self.db.get_responses(child_id, family_id).await?;
        let child_responses = project_complete_responses(&rows, QuestionSet::Child)
            .ok_or_else(|| {
                AssessmentError::Validation(
                    "Child has not answered every question yet".to_string(),
                )
            })?;

        let mut assessment = self
            .db
            .get_assessment_for_child(family_id, child_id)
            .await?
            .ok_or_else(|| {
                AssessmentError::NotFound(
                    "No assessment exists yet; the parent must submit first".to_string(),
                )
            })?;

        self.db
            .update_child_responses(&assessment.id, &child_responses)
            .await?;
        assessment.child_responses = child_responses;

        let analysis = self.maybe_run_analysis(&mut assessment).await?;
        Ok(AssessmentOutcome { assessment, analysis })
    }

    /// Explicit re-analysis. Unlike the implicit trigger this overwrites a
    /// stored result, but only once the new one is in hand.
    pub async fn re_analyze(&self, assessment_id: &Uuid) -> Result<AssessmentOutcome> {
        let mut assessment = self.db.get_assessment_by_id(assessment_id).await?;

        if !assessment.parent_responses.is_complete() || !assessment.child_responses.is_complete() {
            return Err(AssessmentError::Validation(
                "Both sides must complete their assessments before analysis".to_string(),
            ));
        }

        let result = self
            .invoker
            .analyze_with_retry(&assessment.parent_responses, &assessment.child_responses)
            .await?;

        if let Some(message) = result.error.clone() {
            warn!("Re-analysis of assessment {} failed: {}", assessment_id, message);
            return Ok(AssessmentOutcome {
                assessment,
                analysis: AnalysisOutcome::Failed(message),
            });
        }

        self.db.replace_analysis(assessment_id, &result).await?;
        assessment.ai_analysis = Some(result);

        Ok(AssessmentOutcome {
            assessment,
            analysis: AnalysisOutcome::Stored,
        })
    }

    pub async fn get_assessment(
        &self,
        parent_id: &Uuid,
        child_id: &Uuid,
    ) -> Result<Option<Assessment>> {
        Ok(self.db.get_assessment(parent_id, child_id).await?)
    }

    pub async fn get_assessments_for_family(&self, family_id: &Uuid) -> Result<Vec<Assessment>> {
        Ok(self.db.get_assessments_for_family(family_id).await?)
    }

    /// The completeness rule, identical for both entry points: analysis
    /// fires iff both sides are complete and nothing is stored yet. A
    /// failed run (error marker) is reported but never persisted.
    async fn maybe_run_analysis(&self, assessment: &mut Assessment) -> Result<AnalysisOutcome> {
        if !assessment.ready_for_analysis() {
            return Ok(AnalysisOutcome::NotTriggered);
        }

        info!("Both sides complete for assessment {}, invoking analysis", assessment.id);

        let result = self
            .invoker
            .analyze_with_retry(&assessment.parent_responses, &assessment.child_responses)
            .await?;

        if let Some(message) = result.error.clone() {
            warn!("Analysis for assessment {} failed: {}", assessment.id, message);
            return Ok(AnalysisOutcome::Failed(message));
        }

        if self.db.store_analysis_if_absent(&assessment.id, &result).await? {
            assessment.ai_analysis = Some(result);
            Ok(AnalysisOutcome::Stored)
        } else {
            // Lost the trigger race; the stored result wins.
            warn!(
                "Discarding duplicate analysis for assessment {}",
                assessment.id
            );
            assessment.ai_analysis = self.db.get_assessment_by_id(&assessment.id).await?.ai_analysis;
            Ok(AnalysisOutcome::Discarded)
        }
    }
}
