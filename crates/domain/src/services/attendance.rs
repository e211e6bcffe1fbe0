//! Attendance transitions driven by signed action links.
//!
//! Every link carries a token minted for one purpose (`book`, `cancel`,
//! `present`, `absent`). [`AttendanceService::apply`] verifies the token,
//! mutates the event's attendance through the [`EventRepository`], sends the
//! follow-up email and always answers with a flash message and a redirect
//! target; failures never surface as errors to the caller.

use std::sync::Arc;

use shared::signing::{TokenError, TokenPayload, TokenPurpose, TokenSigner};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::models::event::detail_path;
use crate::models::{Change, Event, EventId, NewUser, User, UserId};
use crate::repositories::{EventRepository, StoreError, UserRepository};
use crate::services::messages::{self, MessageLinks};
use crate::services::notification::Mailer;

/// Public listing, the fallback target when a link cannot be honored.
pub const EVENT_LIST_PATH: &str = "/events";

/// A state change a token link can request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttendanceAction {
    Book,
    Cancel,
    Present,
    Absent,
}

impl AttendanceAction {
    pub const ALL: [AttendanceAction; 4] = [
        AttendanceAction::Book,
        AttendanceAction::Cancel,
        AttendanceAction::Present,
        AttendanceAction::Absent,
    ];

    /// Token purpose required by this action.
    pub fn purpose(&self) -> TokenPurpose {
        match self {
            AttendanceAction::Book => TokenPurpose::Book,
            AttendanceAction::Cancel => TokenPurpose::Cancel,
            AttendanceAction::Present => TokenPurpose::Present,
            AttendanceAction::Absent => TokenPurpose::Absent,
        }
    }

    pub fn as_str(&self) -> &'static str {
        self.purpose().as_str()
    }
}

impl std::fmt::Display for AttendanceAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Checks redirect targets against the application's page routes.
pub trait RouteResolver: Send + Sync {
    fn is_valid_path(&self, path: &str) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlashLevel {
    Success,
    Info,
    Warning,
    Error,
}

/// One-shot message shown on the next page.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct FlashMessage {
    pub level: FlashLevel,
    pub text: String,
}

impl FlashMessage {
    pub fn new(level: FlashLevel, text: impl Into<String>) -> Self {
        Self {
            level,
            text: text.into(),
        }
    }
}

/// How a transition ended, used for logging and metrics labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeKind {
    Applied,
    Unchanged,
    Rejected,
}

impl OutcomeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutcomeKind::Applied => "applied",
            OutcomeKind::Unchanged => "unchanged",
            OutcomeKind::Rejected => "rejected",
        }
    }
}

/// Where to send the user and what to tell them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionOutcome {
    pub kind: OutcomeKind,
    pub redirect_to: String,
    pub flash: FlashMessage,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AttendanceError {
    #[error("Invalid or tampered token")]
    InvalidToken,

    #[error("Event not found")]
    EventNotFound,

    #[error("User not found")]
    UserNotFound,

    #[error("Event {event_id} has no remaining seats")]
    CapacityExceeded { event_id: EventId },

    #[error(transparent)]
    Store(StoreError),
}

impl From<TokenError> for AttendanceError {
    fn from(_: TokenError) -> Self {
        AttendanceError::InvalidToken
    }
}

impl From<StoreError> for AttendanceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::CapacityExceeded(event_id) => AttendanceError::CapacityExceeded { event_id },
            other => AttendanceError::Store(other),
        }
    }
}

/// Result of a successful mutation, before it is turned into an outcome.
struct Applied {
    event: Event,
    user: User,
    change: Change,
}

/// Applies attendance transitions and dispatches their notifications.
#[derive(Clone)]
pub struct AttendanceService {
    events: Arc<dyn EventRepository>,
    users: Arc<dyn UserRepository>,
    mailer: Arc<dyn Mailer>,
    resolver: Arc<dyn RouteResolver>,
    signer: TokenSigner,
    base_url: String,
}

impl AttendanceService {
    pub fn new(
        events: Arc<dyn EventRepository>,
        users: Arc<dyn UserRepository>,
        mailer: Arc<dyn Mailer>,
        resolver: Arc<dyn RouteResolver>,
        signer: TokenSigner,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            events,
            users,
            mailer,
            resolver,
            signer,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn signer(&self) -> &TokenSigner {
        &self.signer
    }

    /// Verifies `token` for `action`, applies the transition and decides
    /// where to send the user.
    pub async fn apply(
        &self,
        action: AttendanceAction,
        token: &str,
        redirect: Option<&str>,
    ) -> TransitionOutcome {
        match self.try_apply(action, token).await {
            Ok(applied) => {
                let kind = if applied.change.is_applied() {
                    OutcomeKind::Applied
                } else {
                    OutcomeKind::Unchanged
                };
                info!(
                    action = %action,
                    event_id = applied.event.id,
                    user_id = applied.user.id,
                    outcome = kind.as_str(),
                    "Attendance transition"
                );
                TransitionOutcome {
                    kind,
                    redirect_to: self.resolve_redirect(applied.event.id, redirect),
                    flash: success_flash(action, &applied),
                }
            }
            Err(AttendanceError::CapacityExceeded { event_id }) => {
                warn!(action = %action, event_id, "Booking refused, event is full");
                TransitionOutcome {
                    kind: OutcomeKind::Rejected,
                    redirect_to: detail_path(event_id),
                    flash: FlashMessage::new(
                        FlashLevel::Warning,
                        "Sorry, there are no seats left for this event.",
                    ),
                }
            }
            Err(AttendanceError::Store(err)) => {
                warn!(action = %action, error = %err, "Attendance transition failed");
                TransitionOutcome {
                    kind: OutcomeKind::Rejected,
                    redirect_to: EVENT_LIST_PATH.to_string(),
                    flash: FlashMessage::new(
                        FlashLevel::Error,
                        "Something went wrong, please try again later.",
                    ),
                }
            }
            Err(err) => {
                warn!(action = %action, error = %err, "Rejected attendance link");
                TransitionOutcome {
                    kind: OutcomeKind::Rejected,
                    redirect_to: EVENT_LIST_PATH.to_string(),
                    flash: FlashMessage::new(FlashLevel::Error, "This link is invalid."),
                }
            }
        }
    }

    async fn try_apply(
        &self,
        action: AttendanceAction,
        token: &str,
    ) -> Result<Applied, AttendanceError> {
        let payload = self.signer.verify(token, action.purpose())?;
        let (event, user) = self.load(&payload).await?;

        let update = match action {
            AttendanceAction::Book => self.events.add_registered(event.id, user.id).await,
            AttendanceAction::Cancel => self.events.remove_registered(event.id, user.id).await,
            AttendanceAction::Present => self.events.add_present(event.id, user.id).await,
            AttendanceAction::Absent => self.events.remove_present(event.id, user.id).await,
        }
        .map_err(|err| match err {
            StoreError::NotFound => AttendanceError::EventNotFound,
            other => AttendanceError::from(other),
        })?;

        match action {
            AttendanceAction::Book if update.change.is_applied() => {
                self.notify(&user, &event, AttendanceAction::Cancel).await;
            }
            AttendanceAction::Cancel => {
                // Guests are dropped once their last booking is gone.
                if user.is_temporary() && self.users.delete_if_unattached(user.id).await? {
                    debug!(user_id = user.id, "Deleted temporary user after cancellation");
                } else if update.change.is_applied() {
                    self.notify(&user, &event, AttendanceAction::Book).await;
                }
            }
            _ => {}
        }

        Ok(Applied {
            event,
            user,
            change: update.change,
        })
    }

    async fn load(&self, payload: &TokenPayload) -> Result<(Event, User), AttendanceError> {
        let event = self
            .events
            .find_by_id(payload.event_id)
            .await?
            .ok_or(AttendanceError::EventNotFound)?;
        let user = self
            .users
            .find_by_id(payload.user_id)
            .await?
            .ok_or(AttendanceError::UserNotFound)?;
        Ok((event, user))
    }

    /// Emails `user` about `event` with a link for the reciprocal `link_action`.
    /// Delivery failures are logged and do not undo the transition.
    async fn notify(&self, user: &User, event: &Event, link_action: AttendanceAction) {
        let action_url = match self.action_link(link_action, user.id, event.id) {
            Ok(url) => url,
            Err(err) => {
                warn!(error = %err, "Could not mint action link");
                return;
            }
        };
        let links = MessageLinks {
            event_url: self.absolute_url(&event.detail_path()),
            action_url,
        };
        let message = match link_action {
            AttendanceAction::Cancel => messages::booking_confirmation(user, event, &links),
            _ => messages::cancellation_confirmation(user, event, &links),
        };

        if let Err(err) = self.mailer.send(message).await {
            warn!(
                user_id = user.id,
                event_id = event.id,
                error = %err,
                "Failed to send attendance email"
            );
        }
    }

    /// Sends the day-before reminder to every registered user of `event`.
    /// Returns the number of reminders handed to the mailer.
    pub async fn send_reminders(&self, event: &Event) -> Result<usize, AttendanceError> {
        let attendance = self
            .events
            .attendance(event.id)
            .await?
            .ok_or(AttendanceError::EventNotFound)?;
        let ids: Vec<UserId> = attendance.registered.iter().copied().collect();
        let users = self.users.find_many(&ids).await?;

        let mut sent = 0;
        for user in users {
            let links = MessageLinks {
                event_url: self.absolute_url(&event.detail_path()),
                action_url: self.action_link(AttendanceAction::Cancel, user.id, event.id)?,
            };
            match self
                .mailer
                .send(messages::event_reminder(&user, event, &links))
                .await
            {
                Ok(()) => sent += 1,
                Err(err) => warn!(
                    user_id = user.id,
                    event_id = event.id,
                    error = %err,
                    "Failed to send reminder"
                ),
            }
        }
        Ok(sent)
    }

    /// Books by email address alone, creating a temporary user for unknown
    /// addresses. Returns the book link path to redirect to, so the booking
    /// itself goes through the token endpoint.
    pub async fn book_by_email(
        &self,
        event_id: EventId,
        email: &str,
        redirect: Option<&str>,
    ) -> Result<String, AttendanceError> {
        let event = self
            .events
            .find_by_id(event_id)
            .await?
            .ok_or(AttendanceError::EventNotFound)?;

        let user = match self.users.find_by_email(email).await? {
            Some(user) => user,
            None => {
                let user = self.users.create(NewUser::temporary(email)).await?;
                info!(user_id = user.id, "Created temporary user for booking");
                user
            }
        };

        let mut path = self.action_path(AttendanceAction::Book, user.id, event.id)?;
        if let Some(target) = redirect.filter(|target| self.resolver.is_valid_path(target)) {
            match serde_urlencoded::to_string([("redirect", target)]) {
                Ok(query) => {
                    path.push('?');
                    path.push_str(&query);
                }
                Err(err) => warn!(error = %err, "Dropped unencodable redirect target"),
            }
        }
        Ok(path)
    }

    /// Relative path of an action link, e.g. `/attendance/cancel/{token}`.
    pub fn action_path(
        &self,
        action: AttendanceAction,
        user_id: UserId,
        event_id: EventId,
    ) -> Result<String, TokenError> {
        let token = self.signer.mint(user_id, event_id, action.purpose())?;
        Ok(format!("/attendance/{}/{}", action, token))
    }

    /// Absolute action link for emails and rosters.
    pub fn action_link(
        &self,
        action: AttendanceAction,
        user_id: UserId,
        event_id: EventId,
    ) -> Result<String, TokenError> {
        Ok(self.absolute_url(&self.action_path(action, user_id, event_id)?))
    }

    /// The caller's redirect when it names a known page, the event page otherwise.
    pub fn resolve_redirect(&self, event_id: EventId, redirect: Option<&str>) -> String {
        match redirect {
            Some(target) if self.resolver.is_valid_path(target) => target.to_string(),
            _ => detail_path(event_id),
        }
    }

    fn absolute_url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

fn success_flash(action: AttendanceAction, applied: &Applied) -> FlashMessage {
    let name = applied
        .user
        .display_name()
        .unwrap_or_else(|| applied.user.email.clone());
    let unchanged = !applied.change.is_applied();

    match action {
        AttendanceAction::Book if unchanged => FlashMessage::new(
            FlashLevel::Info,
            "You are already registered for this event.",
        ),
        AttendanceAction::Book => FlashMessage::new(
            FlashLevel::Success,
            format!("Your seat for \"{}\" is booked.", applied.event.title),
        ),
        AttendanceAction::Cancel if unchanged => FlashMessage::new(
            FlashLevel::Info,
            "There was no booking to cancel for this event.",
        ),
        AttendanceAction::Cancel => FlashMessage::new(
            FlashLevel::Success,
            format!("Your booking for \"{}\" has been cancelled.", applied.event.title),
        ),
        AttendanceAction::Present => FlashMessage::new(
            FlashLevel::Success,
            format!("{} is marked as present.", name),
        ),
        AttendanceAction::Absent => FlashMessage::new(
            FlashLevel::Success,
            format!("{} is marked as absent.", name),
        ),
    }
}
