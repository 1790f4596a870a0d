//! Quality control: inspections over received goods and their defect ledger.
//!
//! An inspection is opened once per receiving record from a value copy of the
//! record's items. Defects are then registered per inspected item; the sum of
//! defective quantities on an item never exceeds its counted quantity.

pub mod inspection;

pub use inspection::{
    DefectRecord, DefectRegistered, InspectionCommand, InspectionEvent, InspectionItem,
    InspectionOpened, OpenInspection, QualityInspection, QualityInspectionId, RegisterDefect,
};
