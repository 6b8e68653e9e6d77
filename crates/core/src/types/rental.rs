//! Rental records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{BookId, RentalId, RentalStatus, UserId};

const SECONDS_PER_DAY: u64 = 86_400;

/// A time-boxed borrowing of one book by one user.
///
/// Rentals are owned by the server; the client only lists them, creates
/// them through checkout and asks for returns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rental {
    #[serde(alias = "_id")]
    pub id: RentalId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<UserId>,
    pub book_id: BookId,
    /// Title, when the server populates the book.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub start_date: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    #[serde(default)]
    pub is_returned: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_date: Option<DateTime<Utc>>,
}

impl Rental {
    /// Status of the rental at `now`.
    #[must_use]
    pub fn status_at(&self, now: DateTime<Utc>) -> RentalStatus {
        RentalStatus::derive(self.is_returned, self.due_date, now)
    }

    /// Whole days left before the due date (negative once overdue).
    #[must_use]
    pub fn days_remaining(&self, now: DateTime<Utc>) -> i64 {
        (self.due_date - now).num_days()
    }

    /// Days past the due date, counting a partial day as a whole one
    /// (0 when not yet due).
    #[must_use]
    pub fn days_overdue(&self, now: DateTime<Utc>) -> u64 {
        u64::try_from((now - self.due_date).num_seconds())
            .map_or(0, |late| late.div_ceil(SECONDS_PER_DAY))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn rental_json(due: &str, returned: bool) -> String {
        format!(
            r#"{{"_id":"r1","userId":"u1","bookId":"b1","startDate":"2026-01-01T00:00:00Z","dueDate":"{due}","isReturned":{returned}}}"#
        )
    }

    #[test]
    fn test_deserialize_rental() {
        let rental: Rental = serde_json::from_str(&rental_json("2026-01-15T00:00:00Z", false)).unwrap();
        assert_eq!(rental.id.as_str(), "r1");
        assert_eq!(rental.book_id.as_str(), "b1");
        assert!(rental.return_date.is_none());
    }

    #[test]
    fn test_status_and_days_remaining() {
        let rental: Rental = serde_json::from_str(&rental_json("2026-01-15T00:00:00Z", false)).unwrap();
        let before = rental.due_date - Duration::days(3);
        let after = rental.due_date + Duration::days(2);

        assert_eq!(rental.status_at(before), RentalStatus::Active);
        assert_eq!(rental.days_remaining(before), 3);
        assert_eq!(rental.status_at(after), RentalStatus::Overdue);
        assert_eq!(rental.days_remaining(after), -2);
    }

    #[test]
    fn test_days_overdue_rounds_up() {
        let rental: Rental = serde_json::from_str(&rental_json("2026-01-15T00:00:00Z", false)).unwrap();

        assert_eq!(rental.days_overdue(rental.due_date - Duration::hours(5)), 0);
        assert_eq!(rental.days_overdue(rental.due_date), 0);
        assert_eq!(rental.days_overdue(rental.due_date + Duration::hours(12)), 1);
        assert_eq!(rental.days_overdue(rental.due_date + Duration::days(1)), 1);
        assert_eq!(rental.days_overdue(rental.due_date + Duration::hours(36)), 2);
    }

    #[test]
    fn test_returned_is_never_overdue() {
        let rental: Rental = serde_json::from_str(&rental_json("2020-01-15T00:00:00Z", true)).unwrap();
        assert_eq!(rental.status_at(Utc::now()), RentalStatus::Returned);
    }
}
