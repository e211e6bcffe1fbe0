//! Per-event attendance sets and seat accounting.
//!
//! An event tracks three sets of users: `registered` (booked a seat),
//! `presents` (confirmed on site) and `organizers`. A user is never in both
//! `registered` and `presents`; moving to one removes from the other.
//! `organizers` is independent of the other two.
//!
//! Remaining seats are always derived from the set sizes:
//! `capacity - |registered| - |presents|`, saturating at zero.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::user::UserId;

/// Status of a user within an event's attendance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttendeeStatus {
    Registered,
    Present,
}

impl std::fmt::Display for AttendeeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AttendeeStatus::Registered => write!(f, "registered"),
            AttendeeStatus::Present => write!(f, "present"),
        }
    }
}

/// Whether a mutation changed the attendance sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Change {
    Applied,
    Unchanged,
}

impl Change {
    pub fn is_applied(&self) -> bool {
        matches!(self, Change::Applied)
    }
}

/// Booking refused because no seat is left.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapacityExceeded;

/// Attendance sets of a single event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attendance {
    pub capacity: i32,
    pub registered: BTreeSet<UserId>,
    pub presents: BTreeSet<UserId>,
    pub organizers: BTreeSet<UserId>,
}

impl Attendance {
    pub fn new(capacity: i32) -> Self {
        Self {
            capacity,
            ..Self::default()
        }
    }

    /// Seats still available. Never negative.
    pub fn remaining_seats(&self) -> i32 {
        remaining_seats(
            self.capacity,
            self.registered.len() as i64,
            self.presents.len() as i64,
        )
    }

    pub fn status_of(&self, user_id: UserId) -> Option<AttendeeStatus> {
        if self.presents.contains(&user_id) {
            Some(AttendeeStatus::Present)
        } else if self.registered.contains(&user_id) {
            Some(AttendeeStatus::Registered)
        } else {
            None
        }
    }

    pub fn is_organizer(&self, user_id: UserId) -> bool {
        self.organizers.contains(&user_id)
    }

    /// Books a seat.
    ///
    /// Already registered or already present users are left untouched.
    pub fn add_registered(&mut self, user_id: UserId) -> Result<Change, CapacityExceeded> {
        if self.status_of(user_id).is_some() {
            return Ok(Change::Unchanged);
        }
        if self.remaining_seats() <= 0 {
            return Err(CapacityExceeded);
        }
        self.registered.insert(user_id);
        Ok(Change::Applied)
    }

    /// Confirms presence. A registered user keeps their seat; a walk-in is
    /// admitted even when the event is full.
    pub fn add_present(&mut self, user_id: UserId) -> Change {
        let was_registered = self.registered.remove(&user_id);
        let inserted = self.presents.insert(user_id);
        if was_registered || inserted {
            Change::Applied
        } else {
            Change::Unchanged
        }
    }

    /// Reverts a presence back to a registration.
    pub fn remove_present(&mut self, user_id: UserId) -> Change {
        if self.presents.remove(&user_id) {
            self.registered.insert(user_id);
            Change::Applied
        } else {
            Change::Unchanged
        }
    }

    /// Cancels a registration. Presence is not touched.
    pub fn remove_registered(&mut self, user_id: UserId) -> Change {
        if self.registered.remove(&user_id) {
            Change::Applied
        } else {
            Change::Unchanged
        }
    }

    pub fn add_organizer(&mut self, user_id: UserId) -> Change {
        if self.organizers.insert(user_id) {
            Change::Applied
        } else {
            Change::Unchanged
        }
    }
}

/// Derived seat count shared by in-memory and database-backed callers.
pub fn remaining_seats(capacity: i32, registered: i64, presents: i64) -> i32 {
    let remaining = capacity as i64 - registered - presents;
    remaining.clamp(0, i32::MAX as i64) as i32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_book_registers_user() {
        let mut attendance = Attendance::new(5);
        assert_eq!(attendance.add_registered(1), Ok(Change::Applied));
        assert!(attendance.registered.contains(&1));
        assert!(!attendance.presents.contains(&1));
        assert_eq!(attendance.remaining_seats(), 4);
    }

    #[test]
    fn test_book_twice_is_unchanged() {
        let mut attendance = Attendance::new(5);
        attendance.add_registered(1).unwrap();
        assert_eq!(attendance.add_registered(1), Ok(Change::Unchanged));
        assert_eq!(attendance.remaining_seats(), 4);
    }

    #[test]
    fn test_book_when_present_is_unchanged() {
        let mut attendance = Attendance::new(5);
        attendance.add_present(1);
        assert_eq!(attendance.add_registered(1), Ok(Change::Unchanged));
        assert!(!attendance.registered.contains(&1));
        assert!(attendance.presents.contains(&1));
    }

    #[test]
    fn test_book_full_event_is_rejected() {
        let mut attendance = Attendance::new(2);
        attendance.add_registered(1).unwrap();
        attendance.add_present(2);
        assert_eq!(attendance.add_registered(3), Err(CapacityExceeded));
        assert!(!attendance.registered.contains(&3));
        assert_eq!(attendance.remaining_seats(), 0);
    }

    #[test]
    fn test_zero_capacity_rejects_everyone() {
        let mut attendance = Attendance::new(0);
        assert_eq!(attendance.add_registered(1), Err(CapacityExceeded));
    }

    #[test]
    fn test_present_moves_out_of_registered() {
        let mut attendance = Attendance::new(5);
        attendance.add_registered(1).unwrap();
        assert_eq!(attendance.add_present(1), Change::Applied);
        assert!(attendance.presents.contains(&1));
        assert!(!attendance.registered.contains(&1));
        assert_eq!(attendance.remaining_seats(), 4);
    }

    #[test]
    fn test_present_twice_is_unchanged() {
        let mut attendance = Attendance::new(5);
        attendance.add_present(1);
        assert_eq!(attendance.add_present(1), Change::Unchanged);
        assert_eq!(attendance.presents.len(), 1);
    }

    #[test]
    fn test_walk_in_admitted_on_full_event() {
        let mut attendance = Attendance::new(1);
        attendance.add_registered(1).unwrap();
        assert_eq!(attendance.add_present(2), Change::Applied);
        assert_eq!(attendance.remaining_seats(), 0);
    }

    #[test]
    fn test_absent_moves_back_to_registered() {
        let mut attendance = Attendance::new(5);
        attendance.add_present(1);
        assert_eq!(attendance.remove_present(1), Change::Applied);
        assert!(attendance.registered.contains(&1));
        assert!(!attendance.presents.contains(&1));
    }

    #[test]
    fn test_absent_when_not_present_is_unchanged() {
        let mut attendance = Attendance::new(5);
        assert_eq!(attendance.remove_present(1), Change::Unchanged);
        assert!(attendance.registered.is_empty());
    }

    #[test]
    fn test_cancel_leaves_presence_alone() {
        let mut attendance = Attendance::new(5);
        attendance.add_present(1);
        assert_eq!(attendance.remove_registered(1), Change::Unchanged);
        assert!(attendance.presents.contains(&1));
    }

    #[test]
    fn test_cancel_frees_seat() {
        let mut attendance = Attendance::new(5);
        attendance.add_registered(1).unwrap();
        assert_eq!(attendance.remove_registered(1), Change::Applied);
        assert_eq!(attendance.remaining_seats(), 5);
    }

    #[test]
    fn test_organizers_are_independent() {
        let mut attendance = Attendance::new(1);
        assert_eq!(attendance.add_organizer(9), Change::Applied);
        assert_eq!(attendance.add_organizer(9), Change::Unchanged);
        assert_eq!(attendance.add_registered(9), Ok(Change::Applied));
        assert!(attendance.is_organizer(9));
        assert_eq!(attendance.status_of(9), Some(AttendeeStatus::Registered));
    }

    #[test]
    fn test_remaining_seats_never_negative() {
        assert_eq!(remaining_seats(2, 3, 1), 0);
        assert_eq!(remaining_seats(10, 3, 1), 6);
    }

    #[test]
    fn test_attendee_status_display() {
        assert_eq!(AttendeeStatus::Registered.to_string(), "registered");
        assert_eq!(AttendeeStatus::Present.to_string(), "present");
    }
}
