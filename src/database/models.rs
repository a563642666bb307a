use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::questions::QuestionKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserType {
    Parent,
    Child,
}

impl UserType {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserType::Parent => "parent",
            UserType::Child => "child",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "parent" => Some(UserType::Parent),
            "child" => Some(UserType::Child),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub id: Uuid,
    pub full_name: String,
    pub user_type: UserType,
    pub age: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Family {
    pub id: Uuid,
    pub family_code: String,
    pub parent_id: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FamilyMember {
    pub id: Uuid,
    pub family_id: Uuid,
    pub user_id: Uuid,
    pub joined_at: DateTime<Utc>,
}

/// One stored answer, keyed by (user, family, question).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationResponse {
    pub user_id: Uuid,
    pub family_id: Uuid,
    pub question_id: i32,
    pub question_type: QuestionKind,
    pub response: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationCompletion {
    pub id: Uuid,
    pub user_id: Uuid,
    pub family_id: Uuid,
    pub completed_at: DateTime<Utc>,
    pub total_questions: i32,
}

/// Denormalized projection of one respondent's answers, ordered by
/// ascending question id within each kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssessmentResponses {
    pub short: Vec<String>,
    pub long: Vec<String>,
}

impl AssessmentResponses {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Both answer kinds present. This is the per-side half of the
    /// analysis completeness rule.
    pub fn is_complete(&self) -> bool {
        !self.short.is_empty() && !self.long.is_empty()
    }

    pub fn is_empty(&self) -> bool {
        self.short.is_empty() && self.long.is_empty()
    }

    /// Rebuild the projection from stored rows. Rows are sorted by
    /// question id so the result reproduces the original question order
    /// regardless of how the rows come back.
    pub fn from_rows(rows: &[ConversationResponse]) -> Self {
        let mut sorted: Vec<&ConversationResponse> = rows.iter().collect();
        sorted.sort_by_key(|row| row.question_id);

        let mut responses = AssessmentResponses::default();
        for row in sorted {
            match row.question_type {
                QuestionKind::Short => responses.short.push(row.response.clone()),
                QuestionKind::Long => responses.long.push(row.response.clone()),
            }
        }
        responses
    }
}

/// Parsed AI analysis. Every insight field is optional: the parser keeps
/// whatever it could extract. A populated `error` marks a failed run and is
/// what the UI shows instead of insights.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub child_profile: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_profile: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub child_question: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_question: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub child_conclusion: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_conclusion: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AnalysisResult {
    pub fn error(message: impl Into<String>) -> Self {
        AnalysisResult {
            error: Some(message.into()),
            ..Default::default()
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// At least one insight field was extracted.
    pub fn has_content(&self) -> bool {
        self.child_profile.is_some()
            || self.parent_profile.is_some()
            || self.child_question.is_some()
            || self.parent_question.is_some()
            || self.child_conclusion.is_some()
            || self.parent_conclusion.is_some()
    }
}

/// One assessment per (family, parent, child) triple. Created on the first
/// parent submission, updated in place after that; the family owns its
/// lifetime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assessment {
    pub id: Uuid,
    pub family_id: Uuid,
    pub parent_id: Uuid,
    pub child_id: Uuid,
    pub parent_responses: AssessmentResponses,
    pub child_responses: AssessmentResponses,
    pub ai_analysis: Option<AnalysisResult>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Assessment {
    /// Analysis may fire only when both sides are complete and nothing is
    /// stored yet. Both aggregator entry points use this same check.
    pub fn ready_for_analysis(&self) -> bool {
        self.parent_responses.is_complete()
            && self.child_responses.is_complete()
            && self.ai_analysis.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn row(question_id: i32, kind: QuestionKind, response: &str) -> ConversationResponse {
        let now = Utc::now();
        ConversationResponse {
            user_id: Uuid::new_v4(),
            family_id: Uuid::new_v4(),
            question_id,
            question_type: kind,
            response: response.to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn projection_restores_question_order() {
        // Rows deliberately out of order.
        let rows = vec![
            row(11, QuestionKind::Long, "first long"),
            row(2, QuestionKind::Short, "second short"),
            row(13, QuestionKind::Long, "third long"),
            row(1, QuestionKind::Short, "first short"),
            row(12, QuestionKind::Long, "second long"),
        ];

        let projected = AssessmentResponses::from_rows(&rows);
        assert_eq!(projected.short, vec!["first short", "second short"]);
        assert_eq!(projected.long, vec!["first long", "second long", "third long"]);
    }

    #[test]
    fn completeness_needs_both_kinds() {
        let mut responses = AssessmentResponses::empty();
        assert!(!responses.is_complete());

        responses.short.push("agree".to_string());
        assert!(!responses.is_complete());

        responses.long.push("I wish we talked more.".to_string());
        assert!(responses.is_complete());
    }

    #[test]
    fn analysis_result_serializes_camel_case() {
        let result = AnalysisResult {
            child_profile: Some("X".to_string()),
            ..Default::default()
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json, serde_json::json!({ "childProfile": "X" }));
    }
}
