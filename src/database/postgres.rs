use chrono::Utc;
use deadpool_postgres::{Config, Pool, Runtime};
use log::{error, info};
use tokio_postgres::NoTls;
use uuid::Uuid;

use super::models::*;
use super::{DatabaseError, Result};
use crate::config::Settings;
use crate::questions::QuestionKind;

#[derive(Debug)]
pub struct DatabaseManager {
    pool: Pool,
}

impl DatabaseManager {
    pub async fn new() -> Result<Self> {
        Self::with_settings(&Settings::from_env()).await
    }

    pub async fn with_settings(settings: &Settings) -> Result<Self> {
        info!(
            "Connecting to database: {}@{}:{}/{}",
            settings.db_user, settings.db_host, settings.db_port, settings.db_name
        );

        let mut cfg = Config::new();
        cfg.url = Some(settings.database_url());
        cfg.manager = Some(deadpool_postgres::ManagerConfig {
            recycling_method: deadpool_postgres::RecyclingMethod::Fast,
        });

        let pool = cfg
            .create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(|e| DatabaseError::ConnectionFailed(format!("Pool creation failed: {}", e)))?;

        // Test connection
        let _client = pool
            .get()
            .await
            .map_err(|e| DatabaseError::ConnectionFailed(format!("Connection test failed: {}", e)))?;

        info!("Database connection established successfully");

        Ok(DatabaseManager { pool })
    }

    // --- conversation_responses -------------------------------------------

    /// Insert or update one answer, keyed on (user, family, question).
    /// Edits before completion land as updates; `updated_at` tracks them.
    pub async fn upsert_response(
        &self,
        user_id: &Uuid,
        family_id: &Uuid,
        question_id: i32,
        question_type: QuestionKind,
        response: &str,
    ) -> Result<()> {
        let client = self
            .pool
            .get()
            .await
            .map_err(|e| DatabaseError::ConnectionFailed(e.to_string()))?;

        let now = Utc::now();

        client
            .execute(
                r#"
                INSERT INTO conversation_responses
                (user_id, family_id, question_id, question_type, response, created_at, updated_at)
                VALUES ($1, $2, $3, $4, $5, $6, $6)
                ON CONFLICT (user_id, family_id, question_id)
                DO UPDATE SET response = EXCLUDED.response, updated_at = EXCLUDED.updated_at
                "#,
                &[
                    user_id,
                    family_id,
                    &question_id,
                    &question_type.as_str(),
                    &response,
                    &now,
                ],
            )
            .await
            .map_err(|e| {
                error!("Failed to upsert response for user {}: {}", user_id, e);
                DatabaseError::QueryFailed(format!("Failed to store response: {}", e))
            })?;

        Ok(())
    }

    pub async fn get_responses(
        &self,
        user_id: &Uuid,
        family_id: &Uuid,
    ) -> Result<Vec<ConversationResponse>> {
        let client = self
            .pool
            .get()
            .await
            .map_err(|e| DatabaseError::ConnectionFailed(e.to_string()))?;

        let rows = client
            .query(
                r#"
                SELECT user_id, family_id, question_id, question_type, response, created_at, updated_at
                FROM conversation_responses
                WHERE user_id = $1 AND family_id = $2
                ORDER BY question_id ASC
                "#,
                &[user_id, family_id],
            )
            .await
            .map_err(|e| {
                error!("Failed to fetch responses for user {}: {}", user_id, e);
                DatabaseError::QueryFailed(format!("Failed to fetch responses: {}", e))
            })?;

        let mut responses = Vec::with_capacity(rows.len());
        for row in rows {
            let question_type: String = row.get(3);
            responses.push(ConversationResponse {
                user_id: row.get(0),
                family_id: row.get(1),
                question_id: row.get(2),
                question_type: if question_type == "short" {
                    QuestionKind::Short
                } else {
                    QuestionKind::Long
                },
                response: row.get(4),
                created_at: row.get(5),
                updated_at: row.get(6),
            });
        }

        Ok(responses)
    }

    pub async fn mark_conversation_completed(
        &self,
        user_id: &Uuid,
        family_id: &Uuid,
        total_questions: i32,
    ) -> Result<()> {
        let client = self
            .pool
            .get()
            .await
            .map_err(|e| DatabaseError::ConnectionFailed(e.to_string()))?;

        let now = Utc::now();

        client
            .execute(
                r#"
                INSERT INTO conversation_completions
                (id, user_id, family_id, completed_at, total_questions)
                VALUES ($1, $2, $3, $4, $5)
                ON CONFLICT (user_id, family_id)
                DO UPDATE SET completed_at = EXCLUDED.completed_at,
                              total_questions = EXCLUDED.total_questions
                "#,
                &[&Uuid::new_v4(), user_id, family_id, &now, &total_questions],
            )
            .await
            .map_err(|e| {
                error!("Failed to mark conversation completed: {}", e);
                DatabaseError::QueryFailed(format!("Failed to mark conversation completed: {}", e))
            })?;

        info!("Conversation marked completed for user {}", user_id);
        Ok(())
    }

    pub async fn is_conversation_completed(&self, user_id: &Uuid, family_id: &Uuid) -> Result<bool> {
        let client = self
            .pool
            .get()
            .await
            .map_err(|e| DatabaseError::ConnectionFailed(e.to_string()))?;

        let row = client
            .query_one(
                r#"
                SELECT COUNT(*) FROM conversation_completions
                WHERE user_id = $1 AND family_id = $2
                "#,
                &[user_id, family_id],
            )
            .await
            .map_err(|e| DatabaseError::QueryFailed(format!("Completion lookup failed: {}", e)))?;

        let count: i64 = row.get(0);
        Ok(count > 0)
    }

    // --- families / family_members ----------------------------------------

    pub async fn create_family(&self, family_code: &str, parent_id: &Uuid) -> Result<Family> {
        let client = self
            .pool
            .get()
            .await
            .map_err(|e| DatabaseError::ConnectionFailed(e.to_string()))?;

        let family_id = Uuid::new_v4();
        let now = Utc::now();

        client
            .execute(
                r#"
                INSERT INTO families (id, family_code, parent_id, created_at)
                VALUES ($1, $2, $3, $4)
                "#,
                &[&family_id, &family_code, parent_id, &now],
            )
            .await
            .map_err(|e| {
                error!("Failed to create family: {}", e);
                DatabaseError::QueryFailed(format!("Failed to create family: {}", e))
            })?;

        info!("Created family {} with code {}", family_id, family_code);

        Ok(Family {
            id: family_id,
            family_code: family_code.to_string(),
            parent_id: *parent_id,
            created_at: now,
        })
    }

    /// Lookup by code. A miss is a clean `FamilyNotFound` with no side
    /// effects, so a bad join attempt never creates membership rows.
    pub async fn find_family_by_code(&self, family_code: &str) -> Result<Family> {
        let client = self
            .pool
            .get()
            .await
            .map_err(|e| DatabaseError::ConnectionFailed(e.to_string()))?;

        let row = client
            .query_opt(
                r#"
                SELECT id, family_code, parent_id, created_at
                FROM families
                WHERE family_code = $1
                "#,
                &[&family_code],
            )
            .await
            .map_err(|e| {
                error!("Family lookup failed for code {}: {}", family_code, e);
                DatabaseError::QueryFailed(format!("Family lookup failed: {}", e))
            })?
            .ok_or_else(|| {
                DatabaseError::FamilyNotFound(format!("No family with code {}", family_code))
            })?;

        Ok(Family {
            id: row.get(0),
            family_code: row.get(1),
            parent_id: row.get(2),
            created_at: row.get(3),
        })
    }

    pub async fn add_family_member(&self, family_id: &Uuid, user_id: &Uuid) -> Result<FamilyMember> {
        let client = self
            .pool
            .get()
            .await
            .map_err(|e| DatabaseError::ConnectionFailed(e.to_string()))?;

        let member_id = Uuid::new_v4();
        let now = Utc::now();

        client
            .execute(
                r#"
                INSERT INTO family_members (id, family_id, user_id, joined_at)
                VALUES ($1, $2, $3, $4)
                "#,
                &[&member_id, family_id, user_id, &now],
            )
            .await
            .map_err(|e| {
                error!("Failed to add member {} to family {}: {}", user_id, family_id, e);
                DatabaseError::QueryFailed(format!("Failed to join family: {}", e))
            })?;

        info!("User {} joined family {}", user_id, family_id);

        Ok(FamilyMember {
            id: member_id,
            family_id: *family_id,
            user_id: *user_id,
            joined_at: now,
        })
    }

    pub async fn is_family_member(&self, family_id: &Uuid, user_id: &Uuid) -> Result<bool> {
        let client = self
            .pool
            .get()
            .await
            .map_err(|e| DatabaseError::ConnectionFailed(e.to_string()))?;

        let row = client
            .query_one(
                r#"
                SELECT COUNT(*) FROM family_members
                WHERE family_id = $1 AND user_id = $2
                "#,
                &[family_id, user_id],
            )
            .await
            .map_err(|e| DatabaseError::QueryFailed(format!("Membership check failed: {}", e)))?;

        let count: i64 = row.get(0);
        Ok(count > 0)
    }

    /// Members with their profiles, in join order. Skips members whose
    /// profile row is missing rather than failing the whole fetch.
    pub async fn get_family_members(
        &self,
        family_id: &Uuid,
    ) -> Result<Vec<(FamilyMember, Profile)>> {
        let client = self
            .pool
            .get()
            .await
            .map_err(|e| DatabaseError::ConnectionFailed(e.to_string()))?;

        let rows = client
            .query(
                r#"
                SELECT m.id, m.family_id, m.user_id, m.joined_at,
                       p.id, p.full_name, p.user_type, p.age, p.created_at, p.updated_at
                FROM family_members m
                JOIN profiles p ON p.id = m.user_id
                WHERE m.family_id = $1
                ORDER BY m.joined_at ASC
                "#,
                &[family_id],
            )
            .await
            .map_err(|e| {
                error!("Failed to fetch members for family {}: {}", family_id, e);
                DatabaseError::QueryFailed(format!("Failed to fetch family members: {}", e))
            })?;

        let mut members = Vec::with_capacity(rows.len());
        for row in rows {
            let user_type: String = row.get(6);
            let Some(user_type) = UserType::from_str(&user_type) else {
                log::warn!("Skipping member with unknown user_type: {}", user_type);
                continue;
            };

            members.push((
                FamilyMember {
                    id: row.get(0),
                    family_id: row.get(1),
                    user_id: row.get(2),
                    joined_at: row.get(3),
                },
                Profile {
                    id: row.get(4),
                    full_name: row.get(5),
                    user_type,
                    age: row.get(7),
                    created_at: row.get(8),
                    updated_at: row.get(9),
                },
            ));
        }

        Ok(members)
    }

    pub async fn get_family_for_member(&self, user_id: &Uuid) -> Result<Option<Family>> {
        let client = self
            .pool
            .get()
            .await
            .map_err(|e| DatabaseError::ConnectionFailed(e.to_string()))?;

        let row = client
            .query_opt(
                r#"
                SELECT f.id, f.family_code, f.parent_id, f.created_at
                FROM families f
                JOIN family_members m ON m.family_id = f.id
                WHERE m.user_id = $1
                ORDER BY m.joined_at ASC
                LIMIT 1
                "#,
                &[user_id],
            )
            .await
            .map_err(|e| {
                error!("Family lookup for member {} failed: {}", user_id, e);
                DatabaseError::QueryFailed(format!("Family lookup failed: {}", e))
            })?;

        Ok(row.map(|row| Family {
            id: row.get(0),
            family_code: row.get(1),
            parent_id: row.get(2),
            created_at: row.get(3),
        }))
    }

    pub async fn get_profile(&self, user_id: &Uuid) -> Result<Profile> {
        let client = self
            .pool
            .get()
            .await
            .map_err(|e| DatabaseError::ConnectionFailed(e.to_string()))?;

        let row = client
            .query_opt(
                r#"
                SELECT id, full_name, user_type, age, created_at, updated_at
                FROM profiles
                WHERE id = $1
                "#,
                &[user_id],
            )
            .await
            .map_err(|e| DatabaseError::QueryFailed(format!("Profile lookup failed: {}", e)))?
            .ok_or_else(|| DatabaseError::ProfileNotFound(format!("No profile for {}", user_id)))?;

        let user_type: String = row.get(2);
        let user_type = UserType::from_str(&user_type)
            .ok_or_else(|| DatabaseError::ProfileNotFound(format!("Unknown user_type {}", user_type)))?;

        Ok(Profile {
            id: row.get(0),
            full_name: row.get(1),
            user_type,
            age: row.get(3),
            created_at: row.get(4),
            updated_at: row.get(5),
        })
    }

    // --- parent_child_assessments -----------------------------------------

    fn assessment_from_row(row: &tokio_postgres::Row) -> Result<Assessment> {
        let parent_responses: serde_json::Value = row.get(4);
        let child_responses: serde_json::Value = row.get(5);
        let ai_analysis: Option<serde_json::Value> = row.get(6);

        let parent_responses = serde_json::from_value(parent_responses)
            .map_err(|e| DatabaseError::QueryFailed(format!("Bad parent_responses JSON: {}", e)))?;
        let child_responses = serde_json::from_value(child_responses)
            .map_err(|e| DatabaseError::QueryFailed(format!("Bad child_responses JSON: {}", e)))?;
        let ai_analysis = match ai_analysis {
            Some(value) => Some(
                serde_json::from_value(value)
                    .map_err(|e| DatabaseError::QueryFailed(format!("Bad ai_analysis JSON: {}", e)))?,
            ),
            None => None,
        };

        Ok(Assessment {
            id: row.get(0),
            family_id: row.get(1),
            parent_id: row.get(2),
            child_id: row.get(3),
            parent_responses,
            child_responses,
            ai_analysis,
            created_at: row.get(7),
            updated_at: row.get(8),
        })
    }

    const ASSESSMENT_COLUMNS: &'static str = "id, family_id, parent_id, child_id, \
        parent_responses, child_responses, ai_analysis, created_at, updated_at";

    pub async fn get_assessment(
        &self,
        parent_id: &Uuid,
        child_id: &Uuid,
    ) -> Result<Option<Assessment>> {
        let client = self
            .pool
            .get()
            .await
            .map_err(|e| DatabaseError::ConnectionFailed(e.to_string()))?;

        let sql = format!(
            "SELECT {} FROM parent_child_assessments WHERE parent_id = $1 AND child_id = $2",
            Self::ASSESSMENT_COLUMNS
        );
        let row = client
            .query_opt(sql.as_str(), &[parent_id, child_id])
            .await
            .map_err(|e| {
                error!("Failed to fetch assessment for parent {}: {}", parent_id, e);
                DatabaseError::QueryFailed(format!("Failed to fetch assessment: {}", e))
            })?;

        row.map(|row| Self::assessment_from_row(&row)).transpose()
    }

    /// The assessment a child's responses should merge into. One row per
    /// (family, parent, child) triple; a child has at most one per family.
    pub async fn get_assessment_for_child(
        &self,
        family_id: &Uuid,
        child_id: &Uuid,
    ) -> Result<Option<Assessment>> {
        let client = self
            .pool
            .get()
            .await
            .map_err(|e| DatabaseError::ConnectionFailed(e.to_string()))?;

        let sql = format!(
            "SELECT {} FROM parent_child_assessments WHERE family_id = $1 AND child_id = $2",
            Self::ASSESSMENT_COLUMNS
        );
        let row = client
            .query_opt(sql.as_str(), &[family_id, child_id])
            .await
            .map_err(|e| {
                error!("Failed to fetch assessment for child {}: {}", child_id, e);
                DatabaseError::QueryFailed(format!("Failed to fetch assessment: {}", e))
            })?;

        row.map(|row| Self::assessment_from_row(&row)).transpose()
    }

    pub async fn get_assessment_by_id(&self, assessment_id: &Uuid) -> Result<Assessment> {
        let client = self
            .pool
            .get()
            .await
            .map_err(|e| DatabaseError::ConnectionFailed(e.to_string()))?;

        let sql = format!(
            "SELECT {} FROM parent_child_assessments WHERE id = $1",
            Self::ASSESSMENT_COLUMNS
        );
        let row = client
            .query_opt(sql.as_str(), &[assessment_id])
            .await
            .map_err(|e| DatabaseError::QueryFailed(format!("Failed to fetch assessment: {}", e)))?
            .ok_or_else(|| {
                DatabaseError::AssessmentNotFound(format!("No assessment {}", assessment_id))
            })?;

        Self::assessment_from_row(&row)
    }

    pub async fn get_assessments_for_family(&self, family_id: &Uuid) -> Result<Vec<Assessment>> {
        let client = self
            .pool
            .get()
            .await
            .map_err(|e| DatabaseError::ConnectionFailed(e.to_string()))?;

        let sql = format!(
            "SELECT {} FROM parent_child_assessments WHERE family_id = $1 ORDER BY created_at ASC",
            Self::ASSESSMENT_COLUMNS
        );
        let rows = client
            .query(sql.as_str(), &[family_id])
            .await
            .map_err(|e| {
                error!("Failed to fetch assessments for family {}: {}", family_id, e);
                DatabaseError::QueryFailed(format!("Failed to fetch assessments: {}", e))
            })?;

        rows.iter().map(Self::assessment_from_row).collect()
    }

    /// First parent submission for this child creates the row; the child
    /// side starts empty until `link_child_responses` fills it in.
    pub async fn create_assessment(
        &self,
        family_id: &Uuid,
        parent_id: &Uuid,
        child_id: &Uuid,
        parent_responses: &AssessmentResponses,
    ) -> Result<Assessment> {
        let client = self
            .pool
            .get()
            .await
            .map_err(|e| DatabaseError::ConnectionFailed(e.to_string()))?;

        let assessment_id = Uuid::new_v4();
        let now = Utc::now();
        let parent_json = serde_json::to_value(parent_responses)
            .map_err(|e| DatabaseError::QueryFailed(format!("Failed to encode responses: {}", e)))?;
        let child_json = serde_json::to_value(AssessmentResponses::empty())
            .map_err(|e| DatabaseError::QueryFailed(format!("Failed to encode responses: {}", e)))?;

        client
            .execute(
                r#"
                INSERT INTO parent_child_assessments
                (id, family_id, parent_id, child_id, parent_responses, child_responses, created_at, updated_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $7)
                "#,
                &[
                    &assessment_id,
                    family_id,
                    parent_id,
                    child_id,
                    &parent_json,
                    &child_json,
                    &now,
                ],
            )
            .await
            .map_err(|e| {
                error!("Failed to create assessment: {}", e);
                DatabaseError::QueryFailed(format!("Failed to create assessment: {}", e))
            })?;

        info!(
            "Created assessment {} for parent {} / child {}",
            assessment_id, parent_id, child_id
        );

        Ok(Assessment {
            id: assessment_id,
            family_id: *family_id,
            parent_id: *parent_id,
            child_id: *child_id,
            parent_responses: parent_responses.clone(),
            child_responses: AssessmentResponses::empty(),
            ai_analysis: None,
            created_at: now,
            updated_at: now,
        })
    }

    pub async fn update_parent_responses(
        &self,
        assessment_id: &Uuid,
        responses: &AssessmentResponses,
    ) -> Result<()> {
        self.update_responses_column(assessment_id, "parent_responses", responses)
            .await
    }

    pub async fn update_child_responses(
        &self,
        assessment_id: &Uuid,
        responses: &AssessmentResponses,
    ) -> Result<()> {
        self.update_responses_column(assessment_id, "child_responses", responses)
            .await
    }

    async fn update_responses_column(
        &self,
        assessment_id: &Uuid,
        column: &str,
        responses: &AssessmentResponses,
    ) -> Result<()> {
        let client = self
            .pool
            .get()
            .await
            .map_err(|e| DatabaseError::ConnectionFailed(e.to_string()))?;

        let json = serde_json::to_value(responses)
            .map_err(|e| DatabaseError::QueryFailed(format!("Failed to encode responses: {}", e)))?;
        let now = Utc::now();

        let sql = format!(
            "UPDATE parent_child_assessments SET {} = $1, updated_at = $2 WHERE id = $3",
            column
        );
        let rows_affected = client
            .execute(sql.as_str(), &[&json, &now, assessment_id])
            .await
            .map_err(|e| {
                error!("Failed to update {} for assessment {}: {}", column, assessment_id, e);
                DatabaseError::QueryFailed(format!("Failed to update assessment: {}", e))
            })?;

        if rows_affected == 0 {
            return Err(DatabaseError::AssessmentNotFound(format!(
                "No assessment {} to update",
                assessment_id
            )));
        }

        Ok(())
    }

    /// Store the analysis only if none exists yet. A single conditional
    /// statement, so two racing triggers cannot both win: the loser sees
    /// `false` and discards its result.
    pub async fn store_analysis_if_absent(
        &self,
        assessment_id: &Uuid,
        analysis: &AnalysisResult,
    ) -> Result<bool> {
        let client = self
            .pool
            .get()
            .await
            .map_err(|e| DatabaseError::ConnectionFailed(e.to_string()))?;

        let json = serde_json::to_value(analysis)
            .map_err(|e| DatabaseError::QueryFailed(format!("Failed to encode analysis: {}", e)))?;
        let now = Utc::now();

        let rows_affected = client
            .execute(
                r#"
                UPDATE parent_child_assessments
                SET ai_analysis = $1, updated_at = $2
                WHERE id = $3 AND ai_analysis IS NULL
                "#,
                &[&json, &now, assessment_id],
            )
            .await
            .map_err(|e| {
                error!("Failed to store analysis for assessment {}: {}", assessment_id, e);
                DatabaseError::QueryFailed(format!("Failed to store analysis: {}", e))
            })?;

        if rows_affected == 0 {
            info!(
                "Analysis for assessment {} already present, keeping stored result",
                assessment_id
            );
            return Ok(false);
        }

        info!("Stored analysis for assessment {}", assessment_id);
        Ok(true)
    }

    /// Explicit re-analysis overwrite. Never called on the implicit path.
    pub async fn replace_analysis(
        &self,
        assessment_id: &Uuid,
        analysis: &AnalysisResult,
    ) -> Result<()> {
        let client = self
            .pool
            .get()
            .await
            .map_err(|e| DatabaseError::ConnectionFailed(e.to_string()))?;

        let json = serde_json::to_value(analysis)
            .map_err(|e| DatabaseError::QueryFailed(format!("Failed to encode analysis: {}", e)))?;
        let now = Utc::now();

        let rows_affected = client
            .execute(
                r#"
                UPDATE parent_child_assessments
                SET ai_analysis = $1, updated_at = $2
                WHERE id = $3
                "#,
                &[&json, &now, assessment_id],
            )
            .await
            .map_err(|e| {
                error!("Failed to replace analysis for assessment {}: {}", assessment_id, e);
                DatabaseError::QueryFailed(format!("Failed to replace analysis: {}", e))
            })?;

        if rows_affected == 0 {
            return Err(DatabaseError::AssessmentNotFound(format!(
                "No assessment {} to update",
                assessment_id
            )));
        }

        info!("Replaced analysis for assessment {}", assessment_id);
        Ok(())
    }

    pub async fn test_connection(&self) -> Result<String> {
        let client = self
            .pool
            .get()
            .await
            .map_err(|e| DatabaseError::ConnectionFailed(e.to_string()))?;

        let row = client
            .query_one("SELECT version()", &[])
            .await
            .map_err(|e| DatabaseError::QueryFailed(format!("Test query failed: {}", e)))?;

        let version: String = row.get(0);
        info!("Database connection test successful: {}", version);
        Ok(format!("Database connection successful. {}", version))
    }
}
