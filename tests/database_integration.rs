//! End-to-end tests against a live Postgres instance with the app schema
//! loaded. Opt in by setting `FAMILYCONNECT_TEST_DB=1`; connection details
//! come from the usual `DB_*` variables. Without the opt-in every test is a
//! no-op, so the suite still runs on machines with no database.
//!
//! The analysis client points at a dead endpoint, so every triggered
//! analysis exhausts its retries quickly. That is deliberate: these tests
//! pin down what the aggregator persists (and refuses to persist) around a
//! failing model, not the model call itself.

use familyconnect::analysis::AnalysisInvoker;
use familyconnect::assessment::{
    analysis_status, AnalysisOutcome, AnalysisStatus, AssessmentError, AssessmentService,
    ParentSubmission,
};
use familyconnect::config::Settings;
use familyconnect::database::{AnalysisResult, DatabaseError, DatabaseManager};
use familyconnect::family::FamilyService;
use familyconnect::questions::{self, QuestionKind, QuestionSet};

use uuid::Uuid;

async fn connect() -> Option<DatabaseManager> {
    if std::env::var("FAMILYCONNECT_TEST_DB").is_err() {
        return None;
    }
    match DatabaseManager::new().await {
        Ok(db) => Some(db),
        Err(e) => panic!("FAMILYCONNECT_TEST_DB is set but the connection failed: {}", e),
    }
}

fn dead_invoker() -> AnalysisInvoker {
    let mut settings = Settings::from_env();
    settings.analysis_base_url = "http://127.0.0.1:9/v1".to_string();
    AnalysisInvoker::new(&settings)
}

/// A code no family can have: the year segment predates the app.
fn unknown_code() -> String {
    let suffix: String = Uuid::new_v4().simple().to_string()[..8].to_uppercase();
    format!("FAM-1999-{}", suffix)
}

fn parent_submission() -> ParentSubmission {
    ParentSubmission {
        short: questions::short_questions(QuestionSet::Parent)
            .iter()
            .map(|_| "Agree".to_string())
            .collect(),
        long: vec![
            "I hope we find more unhurried time together.".to_string(),
            "I want our evenings to feel less rushed.".to_string(),
            "I will ask questions before giving advice.".to_string(),
        ],
    }
}

async fn answer_child_questionnaire(
    service: &AssessmentService<'_>,
    child_id: &Uuid,
    family_id: &Uuid,
) {
    for question in questions::all_questions(QuestionSet::Child) {
        let answer = match question.kind {
            QuestionKind::Short => "agree".to_string(),
            QuestionKind::Long => format!("My honest answer to question {}.", question.id),
        };
        service
            .record_response(child_id, family_id, question.id, &answer)
            .await
            .unwrap();
    }
}

#[tokio::test]
async fn joining_with_unknown_code_writes_no_membership() {
    let Some(db) = connect().await else { return };
    let service = FamilyService::new(&db);
    let user_id = Uuid::new_v4();

    let result = service.join_family(&user_id, &unknown_code()).await;
    assert!(matches!(result, Err(DatabaseError::FamilyNotFound(_))));

    // The failed join must leave no trace: the user belongs to nothing.
    let family = db.get_family_for_member(&user_id).await.unwrap();
    assert!(family.is_none());
}

#[tokio::test]
async fn rejoining_own_family_is_idempotent() {
    let Some(db) = connect().await else { return };
    let service = FamilyService::new(&db);
    let parent_id = Uuid::new_v4();

    let family = service.create_family(&parent_id).await.unwrap();
    assert!(db.is_family_member(&family.id, &parent_id).await.unwrap());

    let rejoined = service
        .join_family(&parent_id, &family.family_code)
        .await
        .unwrap();
    assert_eq!(rejoined.id, family.id);
}

#[tokio::test]
async fn parent_submission_alone_does_not_trigger_analysis() {
    let Some(db) = connect().await else { return };
    let invoker = dead_invoker();
    let families = FamilyService::new(&db);
    let assessments = AssessmentService::new(&db, &invoker);

    let parent_id = Uuid::new_v4();
    let child_id = Uuid::new_v4();
    let family = families.create_family(&parent_id).await.unwrap();

    let outcome = assessments
        .submit_parent_responses(&family.id, &parent_id, &child_id, &parent_submission())
        .await
        .unwrap();

    assert_eq!(outcome.analysis, AnalysisOutcome::NotTriggered);
    assert!(outcome.assessment.child_responses.is_empty());
    assert!(outcome.assessment.ai_analysis.is_none());
}

#[tokio::test]
async fn failed_analysis_is_reported_but_not_persisted() {
    let Some(db) = connect().await else { return };
    let invoker = dead_invoker();
    let families = FamilyService::new(&db);
    let assessments = AssessmentService::new(&db, &invoker);

    let parent_id = Uuid::new_v4();
    let child_id = Uuid::new_v4();
    let family = families.create_family(&parent_id).await.unwrap();

    answer_child_questionnaire(&assessments, &child_id, &family.id).await;

    // Both sides complete, so the submission triggers analysis; the dead
    // endpoint makes every attempt fail.
    let outcome = assessments
        .submit_parent_responses(&family.id, &parent_id, &child_id, &parent_submission())
        .await
        .unwrap();

    assert!(matches!(outcome.analysis, AnalysisOutcome::Failed(_)));
    assert_eq!(
        analysis_status(&outcome.assessment, Some(&outcome.analysis)),
        AnalysisStatus::Failed
    );

    // Nothing persisted, so a later attempt can still succeed.
    let stored = assessments
        .get_assessment(&parent_id, &child_id)
        .await
        .unwrap()
        .unwrap();
    assert!(stored.ai_analysis.is_none());
    assert_eq!(analysis_status(&stored, None), AnalysisStatus::Pending);
}

#[tokio::test]
async fn linking_child_responses_requires_parent_submission() {
    let Some(db) = connect().await else { return };
    let invoker = dead_invoker();
    let families = FamilyService::new(&db);
    let assessments = AssessmentService::new(&db, &invoker);

    let parent_id = Uuid::new_v4();
    let child_id = Uuid::new_v4();
    let family = families.create_family(&parent_id).await.unwrap();

    answer_child_questionnaire(&assessments, &child_id, &family.id).await;

    let result = assessments.link_child_responses(&child_id, &family.id).await;
    assert!(matches!(result, Err(AssessmentError::NotFound(_))));
}

#[tokio::test]
async fn analysis_is_stored_at_most_once() {
    let Some(db) = connect().await else { return };
    let invoker = dead_invoker();
    let families = FamilyService::new(&db);
    let assessments = AssessmentService::new(&db, &invoker);

    let parent_id = Uuid::new_v4();
    let child_id = Uuid::new_v4();
    let family = families.create_family(&parent_id).await.unwrap();

    answer_child_questionnaire(&assessments, &child_id, &family.id).await;
    let outcome = assessments
        .submit_parent_responses(&family.id, &parent_id, &child_id, &parent_submission())
        .await
        .unwrap();
    let assessment_id = outcome.assessment.id;

    let first = AnalysisResult {
        child_profile: Some("curious and watchful".to_string()),
        parent_profile: Some("warm but stretched thin".to_string()),
        ..Default::default()
    };
    let second = AnalysisResult {
        child_profile: Some("a different reading entirely".to_string()),
        parent_profile: Some("should never be stored".to_string()),
        ..Default::default()
    };

    assert!(db.store_analysis_if_absent(&assessment_id, &first).await.unwrap());
    assert!(!db.store_analysis_if_absent(&assessment_id, &second).await.unwrap());

    let stored = db.get_assessment_by_id(&assessment_id).await.unwrap();
    assert_eq!(stored.ai_analysis, Some(first));
}
