pub mod analysis;
pub mod assessment;
pub mod config;
pub mod database;
pub mod family;
pub mod flow;
pub mod questions;

pub use analysis::{AnalysisError, AnalysisInvoker};
pub use assessment::{
    AnalysisOutcome, AssessmentError, AssessmentOutcome, AssessmentService, ParentSubmission,
};
pub use config::Settings;
pub use database::{DatabaseError, DatabaseManager};
pub use family::{FamilyService, FamilySnapshot, MembershipLookup};
pub use flow::{FlowError, FlowState, QuestionnaireFlow};
