//! Invoicing domain module (supplier invoices, event-sourced).
//!
//! An invoice states what the supplier billed: per material, the quantity and
//! unit value. Billed quantities are the second quantity source reconciled
//! against a receiving record.

pub mod invoice;

pub use invoice::{
    AddInvoiceItem, Invoice, InvoiceCommand, InvoiceEvent, InvoiceId, InvoiceItem,
    InvoiceItemAdded, InvoiceLockedForReceiving, InvoiceRegistered, LockInvoiceForReceiving,
    RegisterInvoice,
};
