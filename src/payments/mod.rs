pub mod scheduled_payment;

pub use scheduled_payment::{PaymentId, PaymentStatus};
