use chrono::{Datelike, Utc};
use log::{error, info, warn};
use rand::Rng;
use uuid::Uuid;

use crate::database::{DatabaseError, DatabaseManager, Family, FamilyMember, Profile};

/// One fetched view of a user's family for the lifetime of a session.
/// Callers pass this down instead of re-fetching per widget, which is what
/// kept the old per-hook caches from drifting apart.
#[derive(Debug, Clone)]
pub struct FamilySnapshot {
    pub family: Family,
    pub members: Vec<(FamilyMember, Profile)>,
}

impl FamilySnapshot {
    pub fn children(&self) -> Vec<&Profile> {
        self.members
            .iter()
            .map(|(_, profile)| profile)
            .filter(|profile| profile.user_type == crate::database::UserType::Child)
            .collect()
    }
}

/// Explicit outcome of a membership lookup, replacing the old
/// try-query-then-fallback-then-null chains.
#[derive(Debug)]
pub enum MembershipLookup {
    Found(FamilySnapshot),
    NotAMember,
    LookupFailed(DatabaseError),
}

pub struct FamilyService<'a> {
    db: &'a DatabaseManager,
}

impl<'a> FamilyService<'a> {
    pub fn new(db: &'a DatabaseManager) -> Self {
        Self { db }
    }

    /// Creates a family with a fresh code and enrolls the creating parent
    /// as its first member.
    pub async fn create_family(&self, parent_id: &Uuid) -> Result<Family, DatabaseError> {
        let code = generate_family_code();
        info!("Creating family with code {} for parent {}", code, parent_id);

        let family = self.db.create_family(&code, parent_id).await?;
        self.db.add_family_member(&family.id, parent_id).await?;

        Ok(family)
    }

    /// Joins by code. An unknown code is a clean not-found with no
    /// membership row written; a repeat join is idempotent.
    pub async fn join_family(&self, user_id: &Uuid, family_code: &str) -> Result<Family, DatabaseError> {
        let code = family_code.trim();
        info!("User {} joining family with code {}", user_id, code);

        let family = self.db.find_family_by_code(code).await?;

        if self.db.is_family_member(&family.id, user_id).await? {
            info!("User {} is already a member of family {}", user_id, family.id);
            return Ok(family);
        }

        self.db.add_family_member(&family.id, user_id).await?;
        Ok(family)
    }

    /// Fetch the caller's family and member roster in one pass. The three
    /// possible outcomes are spelled out rather than signalled through
    /// nulls and side effects.
    pub async fn membership(&self, user_id: &Uuid) -> MembershipLookup {
        let family = match self.db.get_family_for_member(user_id).await {
            Ok(Some(family)) => family,
            Ok(None) => {
                warn!("User {} is not a member of any family", user_id);
                return MembershipLookup::NotAMember;
            }
            Err(e) => {
                error!("Family lookup failed for user {}: {}", user_id, e);
                return MembershipLookup::LookupFailed(e);
            }
        };

        match self.db.get_family_members(&family.id).await {
            Ok(members) => MembershipLookup::Found(FamilySnapshot { family, members }),
            Err(e) => {
                error!("Member fetch failed for family {}: {}", family.id, e);
                MembershipLookup::LookupFailed(e)
            }
        }
    }
}

const CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const CODE_SUFFIX_LEN: usize = 8;

/// Shareable family code, e.g. `FAM-2024-ABC12345`.
pub fn generate_family_code() -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..CODE_SUFFIX_LEN)
        .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
        .collect();

    format!("FAM-{}-{}", Utc::now().year(), suffix)
}
