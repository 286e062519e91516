pub mod appointment;
pub mod business_hours;
pub mod catalog;
pub mod contact;
pub mod conversation;
pub mod customer_context;
pub mod intent;
pub mod message;
pub mod pending;
pub mod tenant;

pub use appointment::{Appointment, AppointmentStatus};
pub use business_hours::{BusinessHours, HoursSlot};
pub use catalog::{Product, Professional};
pub use contact::{Contact, ContactStatus};
pub use conversation::Conversation;
pub use customer_context::{CommunicationStyle, CustomerContext};
pub use intent::{ExtractedInfo, IntentAnalysis, Intention};
pub use message::{Message, SenderType};
pub use pending::{
    OptionDescriptor, PendingData, PendingInteraction, PendingKind, SelectionOutcome,
    PENDING_PRIORITY, PENDING_TTL_MINUTES,
};
pub use tenant::Tenant;
