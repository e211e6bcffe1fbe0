//! Database entity definitions.
//!
//! Entities are direct mappings to database rows.

pub mod event;
pub mod organization;
pub mod user;

pub use event::{AttendeeEntity, AttendeeStatusDb, EventEntity, EventSummaryEntity};
pub use organization::{MembershipEntity, OrgRoleDb, OrganizationEntity};
pub use user::UserEntity;
