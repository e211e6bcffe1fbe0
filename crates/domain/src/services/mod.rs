//! Domain services for Atelier events.
//!
//! Services contain business logic that operates on domain models.

pub mod attendance;
pub mod messages;
pub mod notification;

pub use attendance::{
    AttendanceAction, AttendanceError, AttendanceService, FlashLevel, FlashMessage, OutcomeKind,
    RouteResolver, TransitionOutcome, EVENT_LIST_PATH,
};
pub use notification::{EmailMessage, Mailer, MockMailer, NotificationError};
