pub mod models;
pub mod postgres;

pub use models::{
    AnalysisResult, Assessment, AssessmentResponses, ConversationCompletion,
    ConversationResponse, Family, FamilyMember, Profile, UserType,
};
pub use postgres::DatabaseManager;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),
    #[error("Query failed: {0}")]
    QueryFailed(String),
    #[error("Family not found: {0}")]
    FamilyNotFound(String),
    #[error("Profile not found: {0}")]
    ProfileNotFound(String),
    #[error("Assessment not found: {0}")]
    AssessmentNotFound(String),
}

pub type Result<T> = std::result::Result<T, DatabaseError>;
