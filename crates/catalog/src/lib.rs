//! Reference catalog: materials, defect types and suppliers.
//!
//! All are registered once and then only referenced by identifier from plans,
//! invoices, receiving records and inspections. A supplier's id is derived from
//! its CNPJ, so registering the same company twice collides on one stream.

pub mod defect;
pub mod material;
pub mod supplier;

pub use defect::{CreateDefect, Defect, DefectCommand, DefectCreated, DefectEvent, DefectId};
pub use material::{
    CreateMaterial, Material, MaterialCommand, MaterialCreated, MaterialEvent, MaterialId,
    UnitOfMeasure,
};
pub use supplier::{
    Cnpj, CreateSupplier, Supplier, SupplierCommand, SupplierCreated, SupplierEvent, SupplierId,
};
