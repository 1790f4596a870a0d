//! Receiving domain module.
//!
//! - [`record`]: the receiving record aggregate (physical count of a delivery,
//!   linked to one purchase plan and one invoice, append-only item history and
//!   the one-time link to its quality inspection).
//! - [`reconciliation`]: pure comparison of expected, billed and counted
//!   quantities into a divergence report.

pub mod reconciliation;
pub mod record;

pub use reconciliation::{
    DivergenceEntry, DivergenceReport, DivergenceTag, classify, reconcile, reconcile_record,
};
pub use record::{
    AddReceivedItem, InspectionStarted, OpenReceiving, ReceivedItem, ReceivedItemAdded,
    ReceivingCommand, ReceivingEvent, ReceivingOpened, ReceivingRecord, ReceivingRecordId,
    StartInspection,
};
