use chrono::{DateTime, Utc};
use diesel::prelude::*;

use crate::db::schema::conversations;

/// A two-party conversation between a job seeker and a recruiter.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = conversations)]
pub struct Conversation {
    pub id: i64,
    pub job_id: i64,
    pub jobseeker_id: i64,
    pub recruiter_id: i64,
    pub created_at: DateTime<Utc>,
}

impl Conversation {
    /// Whether `user_id` is one of the two parties.
    pub fn has_party(&self, user_id: i64) -> bool {
        user_id == self.jobseeker_id || user_id == self.recruiter_id
    }
}
