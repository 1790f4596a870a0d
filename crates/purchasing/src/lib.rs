//! Purchasing domain module (Purchase Plans, event-sourced).
//!
//! A purchase plan declares which materials, in which quantities, are expected
//! from a supplier. It is one of the three quantity sources reconciled against a
//! receiving record. Pure domain logic: no IO, no HTTP, no storage.

pub mod plan;

pub use plan::{
    AddPlanItem, ChangePlanStatus, CreatePurchasePlan, LockPlanForReceiving, PlanItem,
    PlanItemAdded, PlanLockedForReceiving, PlanStatusChanged, PurchasePlan, PurchasePlanCommand,
    PurchasePlanCreated, PurchasePlanEvent, PurchasePlanId, PurchasePlanStatus,
};
