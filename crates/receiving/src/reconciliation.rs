//! Divergence report: expected (plan) vs. billed (invoice) vs. counted (receiving).
//!
//! Pure computation. Nothing here reads storage or mutates state, so callers may
//! run it as often and as concurrently as they like over a consistent read.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use goodsin_catalog::MaterialId;
use goodsin_core::{DomainError, Quantity};
use goodsin_invoicing::InvoiceItem;
use goodsin_purchasing::PlanItem;

use crate::record::ReceivingRecord;

/// Divergence kind. Declaration order is the order tags appear in a report.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DivergenceTag {
    /// Counted less than planned.
    #[serde(rename = "FALTA")]
    Shortfall,
    /// Counted more than planned.
    #[serde(rename = "EXCESSO")]
    Excess,
    /// Counted differs from billed.
    #[serde(rename = "DIVERGENCIA_NF")]
    InvoiceMismatch,
}

impl DivergenceTag {
    pub fn as_str(self) -> &'static str {
        match self {
            DivergenceTag::Shortfall => "FALTA",
            DivergenceTag::Excess => "EXCESSO",
            DivergenceTag::InvoiceMismatch => "DIVERGENCIA_NF",
        }
    }
}

impl core::fmt::Display for DivergenceTag {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One material line of a divergence report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DivergenceEntry {
    #[serde(rename = "materialId")]
    pub material_id: MaterialId,
    #[serde(rename = "materialCode")]
    pub material_code: String,
    #[serde(rename = "qtdPlano")]
    pub expected_qty: Quantity,
    #[serde(rename = "qtdNf")]
    pub invoiced_qty: Quantity,
    #[serde(rename = "qtdRecebida")]
    pub received_qty: Quantity,
    #[serde(rename = "tipoDivergencia")]
    pub tags: BTreeSet<DivergenceTag>,
}

/// Entries ordered by material code; materials without divergence are absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DivergenceReport(pub Vec<DivergenceEntry>);

impl DivergenceReport {
    pub fn entries(&self) -> &[DivergenceEntry] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn get(&self, material_id: MaterialId) -> Option<&DivergenceEntry> {
        self.0.iter().find(|e| e.material_id == material_id)
    }
}

/// Tags for one material. `Shortfall` and `Excess` never co-occur.
pub fn classify(
    expected: Quantity,
    invoiced: Quantity,
    received: Quantity,
) -> BTreeSet<DivergenceTag> {
    let mut tags = BTreeSet::new();
    if received < expected {
        tags.insert(DivergenceTag::Shortfall);
    } else if received > expected {
        tags.insert(DivergenceTag::Excess);
    }
    if received != invoiced {
        tags.insert(DivergenceTag::InvoiceMismatch);
    }
    tags
}

#[derive(Default)]
struct Totals {
    expected: Quantity,
    invoiced: Quantity,
    received: Quantity,
}

fn accumulate(
    total: &mut Quantity,
    qty: Quantity,
    source: &str,
    material_id: MaterialId,
) -> Result<(), DomainError> {
    *total = total.checked_add(qty).ok_or_else(|| {
        DomainError::invariant(format!("{source} total for material {material_id} is out of range"))
    })?;
    Ok(())
}

/// Builds a report from the three quantity sources.
///
/// Several entries for the same material in one source are summed. `code_of`
/// resolves display codes; an unresolved material is reported under its id.
/// Fails only when a per-material total overflows.
pub fn reconcile<P, I, R, F>(
    expected: P,
    invoiced: I,
    received: R,
    code_of: F,
) -> Result<DivergenceReport, DomainError>
where
    P: IntoIterator<Item = (MaterialId, Quantity)>,
    I: IntoIterator<Item = (MaterialId, Quantity)>,
    R: IntoIterator<Item = (MaterialId, Quantity)>,
    F: Fn(&MaterialId) -> Option<String>,
{
    let mut totals: BTreeMap<MaterialId, Totals> = BTreeMap::new();

    for (material_id, qty) in expected {
        let t = totals.entry(material_id).or_default();
        accumulate(&mut t.expected, qty, "planned", material_id)?;
    }
    for (material_id, qty) in invoiced {
        let t = totals.entry(material_id).or_default();
        accumulate(&mut t.invoiced, qty, "invoiced", material_id)?;
    }
    for (material_id, qty) in received {
        let t = totals.entry(material_id).or_default();
        accumulate(&mut t.received, qty, "counted", material_id)?;
    }

    let mut entries: Vec<DivergenceEntry> = totals
        .into_iter()
        .filter_map(|(material_id, t)| {
            let tags = classify(t.expected, t.invoiced, t.received);
            if tags.is_empty() {
                return None;
            }
            Some(DivergenceEntry {
                material_id,
                material_code: code_of(&material_id).unwrap_or_else(|| material_id.to_string()),
                expected_qty: t.expected,
                invoiced_qty: t.invoiced,
                received_qty: t.received,
                tags,
            })
        })
        .collect();

    entries.sort_by(|a, b| {
        a.material_code
            .cmp(&b.material_code)
            .then_with(|| a.material_id.cmp(&b.material_id))
    });

    Ok(DivergenceReport(entries))
}

/// Convenience over [`reconcile`] for already loaded aggregates.
pub fn reconcile_record<F>(
    record: &ReceivingRecord,
    plan_items: &[PlanItem],
    invoice_items: &[InvoiceItem],
    code_of: F,
) -> Result<DivergenceReport, DomainError>
where
    F: Fn(&MaterialId) -> Option<String>,
{
    reconcile(
        plan_items.iter().map(|i| (i.material_id, i.expected_quantity)),
        invoice_items.iter().map(|i| (i.material_id, i.quantity)),
        record.items().iter().map(|i| (i.material_id, i.counted_quantity)),
        code_of,
    )
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use proptest::prelude::*;

    use super::*;

    fn single(code: &str, plan: i64, nf: i64, counted: i64) -> DivergenceReport {
        let m = MaterialId::generate();
        let codes: HashMap<MaterialId, String> = [(m, code.to_string())].into_iter().collect();
        reconcile(
            [(m, Quantity::from(plan))],
            [(m, Quantity::from(nf))],
            [(m, Quantity::from(counted))],
            |id| codes.get(id).cloned(),
        )
        .unwrap()
    }

    fn tags(list: &[DivergenceTag]) -> BTreeSet<DivergenceTag> {
        list.iter().copied().collect()
    }

    #[test]
    fn shortfall_only() {
        let report = single("M1", 100, 100, 90);
        assert_eq!(report.len(), 1);
        let e = &report.entries()[0];
        assert_eq!(e.material_code, "M1");
        assert_eq!(
            (e.expected_qty, e.invoiced_qty, e.received_qty),
            (Quantity::from(100), Quantity::from(100), Quantity::from(90))
        );
        assert_eq!(e.tags, tags(&[DivergenceTag::Shortfall]));
    }

    #[test]
    fn excess_matching_invoice() {
        let report = single("M2", 50, 55, 55);
        assert_eq!(report.entries()[0].tags, tags(&[DivergenceTag::Excess]));
    }

    #[test]
    fn invoice_mismatch_only() {
        let report = single("M3", 100, 95, 100);
        assert_eq!(report.entries()[0].tags, tags(&[DivergenceTag::InvoiceMismatch]));
    }

    #[test]
    fn all_equal_is_omitted() {
        assert!(single("M4", 10, 10, 10).is_empty());
    }

    #[test]
    fn missing_sources_count_as_zero() {
        let planned_only = MaterialId::generate();
        let received_only = MaterialId::generate();

        let report = reconcile(
            [(planned_only, Quantity::from(5))],
            [],
            [(received_only, Quantity::from(3))],
            |_| None,
        )
        .unwrap();

        let p = report.get(planned_only).unwrap();
        assert_eq!(p.received_qty, Quantity::ZERO);
        assert_eq!(p.tags, tags(&[DivergenceTag::Shortfall]));
        assert_eq!(p.material_code, planned_only.to_string());

        let r = report.get(received_only).unwrap();
        assert_eq!(
            r.tags,
            tags(&[DivergenceTag::Excess, DivergenceTag::InvoiceMismatch])
        );
    }

    #[test]
    fn repeated_counts_are_summed() {
        let m = MaterialId::generate();
        let report = reconcile(
            [(m, Quantity::from(100))],
            [(m, Quantity::from(100))],
            [(m, Quantity::from(60)), (m, Quantity::from(40))],
            |_| Some("COU-1".to_string()),
        )
        .unwrap();
        assert!(report.is_empty());
    }

    #[test]
    fn overflowing_totals_are_an_error() {
        let m = MaterialId::generate();
        let huge: Quantity = "79228162514264337593543950335".parse().unwrap();
        let err = reconcile(
            [(m, Quantity::from(1))],
            [(m, Quantity::from(1))],
            [(m, huge), (m, huge)],
            |_| None,
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)), "{err:?}");
    }

    #[test]
    fn entries_are_ordered_by_code() {
        let a = MaterialId::generate();
        let b = MaterialId::generate();
        let codes: HashMap<MaterialId, String> =
            [(a, "ZZ-9".to_string()), (b, "AA-1".to_string())].into_iter().collect();

        let report = reconcile(
            [(a, Quantity::from(1)), (b, Quantity::from(1))],
            [],
            [],
            |id| codes.get(id).cloned(),
        )
        .unwrap();

        let order: Vec<&str> = report.entries().iter().map(|e| e.material_code.as_str()).collect();
        assert_eq!(order, vec!["AA-1", "ZZ-9"]);
    }

    #[test]
    fn report_serializes_with_wire_names() {
        let report = single("M1", 100, 100, 90);
        let json = serde_json::to_value(&report).unwrap();
        let entry = &json[0];
        assert_eq!(entry["materialCode"], "M1");
        assert_eq!(entry["qtdPlano"], "100");
        assert_eq!(entry["qtdNf"], "100");
        assert_eq!(entry["qtdRecebida"], "90");
        assert_eq!(entry["tipoDivergencia"], serde_json::json!(["FALTA"]));
    }

    proptest! {
        #[test]
        fn tags_follow_the_comparison_rules(
            expected in 0i64..500,
            invoiced in 0i64..500,
            received in 0i64..500,
        ) {
            let (e, i, r) = (Quantity::from(expected), Quantity::from(invoiced), Quantity::from(received));
            let t = classify(e, i, r);

            prop_assert_eq!(t.contains(&DivergenceTag::Shortfall), received < expected);
            prop_assert_eq!(t.contains(&DivergenceTag::Excess), received > expected);
            prop_assert_eq!(t.contains(&DivergenceTag::InvoiceMismatch), received != invoiced);

            let report = single("X", expected, invoiced, received);
            prop_assert_eq!(report.is_empty(), t.is_empty());
        }

        #[test]
        fn reconcile_is_idempotent(
            counts in proptest::collection::vec(0i64..50, 0..8),
        ) {
            let m = MaterialId::generate();
            let received: Vec<(MaterialId, Quantity)> =
                counts.iter().map(|c| (m, Quantity::from(*c))).collect();
            let run = || reconcile(
                [(m, Quantity::from(100))],
                [(m, Quantity::from(100))],
                received.clone(),
                |_| Some("M".to_string()),
            ).unwrap();
            prop_assert_eq!(run(), run());
        }
    }
}
