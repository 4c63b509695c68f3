// Entity Models
//
// One record struct per table plus its status vocabulary. Statuses are stored
// as lowercase strings in SQLite and round-trip through `as_str` / `parse`.

pub mod citizen;
pub mod district;
pub mod payment;
pub mod penalty;
pub mod reminder;
pub mod tax_record;

pub use citizen::Citizen;
pub use district::District;
pub use payment::{Payment, PaymentMethod, PaymentStatus};
pub use penalty::{Penalty, PenaltyStatus};
pub use reminder::{Reminder, ReminderKind, ReminderStatus};
pub use tax_record::{TaxRecord, TaxStatus};
