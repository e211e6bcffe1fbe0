//! Domain models for Atelier events.

pub mod attendance;
pub mod event;
pub mod organization;
pub mod user;

pub use attendance::{Attendance, AttendeeStatus, Change};
pub use event::{CreateEventRequest, Event, EventId, EventSummary, NewEvent};
pub use organization::{
    require_role, GuardError, Membership, OrgRole, Organization, OrganizationId, RoleGuard,
    SetMemberRoleRequest,
};
pub use user::{BookByEmailRequest, NewUser, User, UserId};
