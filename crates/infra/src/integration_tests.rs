//! End-to-end tests through the application services.
//!
//! Command → CommandDispatcher → EventStore → EventBus, with reads rehydrated
//! from the store. Concurrency tests race real threads on one stream.

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Barrier};
    use std::thread;

    use rust_decimal::Decimal;
    use serde_json::Value as JsonValue;

    use goodsin_catalog::{DefectId, MaterialId, SupplierId, UnitOfMeasure};
    use goodsin_core::{Quantity, TenantId, UserId};
    use goodsin_events::{EventBus, EventEnvelope, InMemoryEventBus};
    use goodsin_purchasing::{PurchasePlanId, PurchasePlanStatus};
    use goodsin_receiving::{DivergenceTag, ReceivingRecordId};

    use crate::command_dispatcher::{CommandDispatcher, DispatchError};
    use crate::event_store::{EventStore, InMemoryEventStore};
    use crate::services::{
        GoodsInService, NewDefectType, NewInvoice, NewInvoiceItem, NewMaterial, NewPlan,
        NewPlanItem, NewSupplier, OpenReceivingRequest, RegisterDefectRequest,
    };

    type Bus = Arc<InMemoryEventBus<EventEnvelope<JsonValue>>>;
    type Service = GoodsInService<Arc<InMemoryEventStore>, Bus>;

    struct Fixture {
        service: Arc<Service>,
        store: Arc<InMemoryEventStore>,
        bus: Bus,
        tenant_id: TenantId,
        user: UserId,
        supplier: SupplierId,
    }

    impl Fixture {
        fn new() -> Self {
            let store = Arc::new(InMemoryEventStore::new());
            let bus: Bus = Arc::new(InMemoryEventBus::new());
            let dispatcher =
                CommandDispatcher::new(store.clone(), bus.clone()).with_max_retries(64);
            let service = Arc::new(GoodsInService::new(dispatcher));
            let tenant_id = TenantId::new();
            let supplier = service
                .register_supplier(tenant_id, new_supplier("12.345.678/0001-90"))
                .unwrap()
                .id_typed();
            Self {
                service,
                store,
                bus,
                tenant_id,
                user: UserId::new(),
                supplier,
            }
        }

        fn supplier(&self, cnpj: &str) -> SupplierId {
            self.service
                .register_supplier(self.tenant_id, new_supplier(cnpj))
                .unwrap()
                .id_typed()
        }

        fn defect_type(&self, name: &str) -> DefectId {
            self.service
                .register_defect_type(
                    self.tenant_id,
                    NewDefectType {
                        name: name.to_string(),
                        description: None,
                    },
                )
                .unwrap()
                .id_typed()
        }

        fn plan(&self, supplier_id: SupplierId, lines: &[(MaterialId, i64)]) -> PurchasePlanId {
            self.service
                .create_plan(
                    self.tenant_id,
                    self.user,
                    NewPlan {
                        code: "PC-2024-001".to_string(),
                        supplier_id,
                        expected_delivery: None,
                        items: lines
                            .iter()
                            .map(|(m, planned)| NewPlanItem {
                                material_id: *m,
                                expected_quantity: Quantity::from(*planned),
                                color: None,
                            })
                            .collect(),
                    },
                )
                .unwrap()
                .id_typed()
        }

        fn invoice(
            &self,
            supplier_id: SupplierId,
            number: &str,
            lines: &[(MaterialId, i64)],
        ) -> Result<goodsin_invoicing::Invoice, DispatchError> {
            self.service.register_invoice(
                self.tenant_id,
                NewInvoice {
                    supplier_id,
                    number: number.to_string(),
                    issued_on: None,
                    total_value: Decimal::new(1_000, 0),
                    items: lines
                        .iter()
                        .map(|(m, billed)| NewInvoiceItem {
                            material_id: *m,
                            quantity: Quantity::from(*billed),
                            unit_value: Decimal::new(10, 0),
                        })
                        .collect(),
                },
            )
        }

        fn material(&self, code: &str) -> MaterialId {
            self.service
                .register_material(
                    self.tenant_id,
                    NewMaterial {
                        code: code.to_string(),
                        description: format!("material {code}"),
                        unit: UnitOfMeasure::M2,
                    },
                )
                .unwrap()
                .id_typed()
        }

        /// Open a record over a plan and invoice built from `(material, planned, billed)`.
        fn receiving(&self, lines: &[(MaterialId, i64, i64)]) -> ReceivingRecordId {
            let planned: Vec<(MaterialId, i64)> = lines.iter().map(|(m, p, _)| (*m, *p)).collect();
            let billed: Vec<(MaterialId, i64)> = lines.iter().map(|(m, _, b)| (*m, *b)).collect();

            let plan_id = self.plan(self.supplier, &planned);
            let invoice = self
                .invoice(self.supplier, &format!("NF-{plan_id}"), &billed)
                .unwrap();

            self.service
                .open_receiving(
                    self.tenant_id,
                    self.user,
                    OpenReceivingRequest {
                        plan_id,
                        invoice_id: invoice.id_typed(),
                        notes: None,
                    },
                )
                .unwrap()
                .id_typed()
        }

        fn count(&self, record_id: ReceivingRecordId, material_id: MaterialId, qty: i64) {
            self.service
                .add_received_item(self.tenant_id, record_id, material_id, Quantity::from(qty))
                .unwrap();
        }
    }

    fn new_supplier(cnpj: &str) -> NewSupplier {
        NewSupplier {
            legal_name: "Curtume Vale Ltda".to_string(),
            trade_name: Some("Curtume Vale".to_string()),
            cnpj: cnpj.to_string(),
        }
    }

    fn field_of(err: &DispatchError) -> Option<&str> {
        match err {
            DispatchError::Validation { field, .. } => field.as_deref(),
            _ => None,
        }
    }

    #[test]
    fn reconcile_reports_each_divergence_kind() {
        let f = Fixture::new();
        let m1 = f.material("M1");
        let m2 = f.material("M2");
        let m3 = f.material("M3");
        let ok = f.material("M4");

        let record_id = f.receiving(&[(m1, 100, 100), (m2, 50, 55), (m3, 100, 95), (ok, 10, 10)]);
        f.count(record_id, m1, 90);
        f.count(record_id, m2, 55);
        f.count(record_id, m3, 60);
        f.count(record_id, m3, 40);
        f.count(record_id, ok, 10);

        let report = f.service.reconcile(f.tenant_id, record_id).unwrap();
        let summary: Vec<(&str, Vec<DivergenceTag>)> = report
            .entries()
            .iter()
            .map(|e| (e.material_code.as_str(), e.tags.iter().copied().collect()))
            .collect();

        assert_eq!(
            summary,
            vec![
                ("M1", vec![DivergenceTag::Shortfall]),
                ("M2", vec![DivergenceTag::Excess]),
                ("M3", vec![DivergenceTag::InvoiceMismatch]),
            ]
        );
        assert_eq!(report.entries()[2].received_qty, Quantity::from(100));
    }

    #[test]
    fn reconcile_is_read_only_and_repeatable() {
        let f = Fixture::new();
        let m1 = f.material("M1");
        let record_id = f.receiving(&[(m1, 100, 100)]);
        f.count(record_id, m1, 90);

        let before = f.store.load_stream(f.tenant_id, record_id.aggregate_id()).unwrap().len();
        let sub = f.bus.subscribe();

        let first = f.service.reconcile(f.tenant_id, record_id).unwrap();
        let second = f.service.reconcile(f.tenant_id, record_id).unwrap();

        assert_eq!(first, second);
        assert_eq!(
            f.store.load_stream(f.tenant_id, record_id.aggregate_id()).unwrap().len(),
            before
        );
        assert!(sub.try_recv().is_err());
    }

    #[test]
    fn reconcile_unknown_record_is_not_found() {
        let f = Fixture::new();
        let err = f
            .service
            .reconcile(f.tenant_id, ReceivingRecordId::generate())
            .unwrap_err();
        assert!(matches!(err, DispatchError::NotFound(_)));
    }

    #[test]
    fn records_are_invisible_to_other_tenants() {
        let f = Fixture::new();
        let m1 = f.material("M1");
        let record_id = f.receiving(&[(m1, 1, 1)]);

        let err = f.service.get_receiving(TenantId::new(), record_id).unwrap_err();
        assert!(matches!(err, DispatchError::NotFound(_)));
    }

    #[test]
    fn cancelled_plan_cannot_be_received() {
        let f = Fixture::new();
        let m1 = f.material("M1");
        let plan = f
            .service
            .create_plan(
                f.tenant_id,
                f.user,
                NewPlan {
                    code: "PC-9".to_string(),
                    supplier_id: f.supplier,
                    expected_delivery: None,
                    items: vec![NewPlanItem {
                        material_id: m1,
                        expected_quantity: Quantity::from(5),
                        color: Some("preto".to_string()),
                    }],
                },
            )
            .unwrap();
        f.service
            .change_plan_status(f.tenant_id, plan.id_typed(), PurchasePlanStatus::Cancelled)
            .unwrap();
        let invoice = f.invoice(f.supplier, "NF-1", &[]).unwrap();

        let err = f
            .service
            .open_receiving(
                f.tenant_id,
                f.user,
                OpenReceivingRequest {
                    plan_id: plan.id_typed(),
                    invoice_id: invoice.id_typed(),
                    notes: None,
                },
            )
            .unwrap_err();

        match err {
            DispatchError::Validation { field, .. } => assert_eq!(field.as_deref(), Some("plan_id")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn negative_count_and_unknown_material_are_validation_errors() {
        let f = Fixture::new();
        let m1 = f.material("M1");
        let record_id = f.receiving(&[(m1, 1, 1)]);

        let negative = f
            .service
            .add_received_item(f.tenant_id, record_id, m1, Quantity::from(-1))
            .unwrap_err();
        assert!(matches!(negative, DispatchError::Validation { .. }));

        let unknown = f
            .service
            .add_received_item(f.tenant_id, record_id, MaterialId::generate(), Quantity::from(1))
            .unwrap_err();
        assert!(matches!(unknown, DispatchError::Validation { .. }));
    }

    #[test]
    fn inspection_snapshot_ignores_later_counts() {
        let f = Fixture::new();
        let m1 = f.material("M1");
        let record_id = f.receiving(&[(m1, 30, 30)]);
        f.count(record_id, m1, 20);

        let inspection = f
            .service
            .start_inspection(f.tenant_id, f.user, record_id)
            .unwrap();
        f.count(record_id, m1, 10);

        let reloaded = f.service.get_inspection(f.tenant_id, inspection.id_typed()).unwrap();
        assert_eq!(reloaded.items().len(), 1);
        assert_eq!(reloaded.items()[0].counted_quantity, Quantity::from(20));
        assert_eq!(f.service.get_receiving(f.tenant_id, record_id).unwrap().items().len(), 2);
        assert_eq!(
            f.service.inspection_of(f.tenant_id, record_id).unwrap(),
            Some(inspection.id_typed())
        );
    }

    #[test]
    fn second_inspection_conflicts() {
        let f = Fixture::new();
        let m1 = f.material("M1");
        let record_id = f.receiving(&[(m1, 1, 1)]);

        f.service.start_inspection(f.tenant_id, f.user, record_id).unwrap();
        let err = f
            .service
            .start_inspection(f.tenant_id, f.user, record_id)
            .unwrap_err();
        assert!(matches!(err, DispatchError::Conflict(_)));
    }

    #[test]
    fn concurrent_start_inspection_has_exactly_one_winner() {
        let f = Fixture::new();
        let m1 = f.material("M1");
        let record_id = f.receiving(&[(m1, 5, 5)]);
        f.count(record_id, m1, 5);

        let racers = 8;
        let barrier = Arc::new(Barrier::new(racers));
        let handles: Vec<_> = (0..racers)
            .map(|_| {
                let service = f.service.clone();
                let barrier = barrier.clone();
                let (tenant_id, user) = (f.tenant_id, f.user);
                thread::spawn(move || {
                    barrier.wait();
                    service.start_inspection(tenant_id, user, record_id)
                })
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let winners: Vec<_> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
        assert_eq!(winners.len(), 1);
        assert!(
            results
                .iter()
                .filter_map(|r| r.as_ref().err())
                .all(|e| matches!(e, DispatchError::Conflict(_)))
        );

        let linked = f.service.inspection_of(f.tenant_id, record_id).unwrap();
        assert_eq!(linked, Some(winners[0].id_typed()));
    }

    #[test]
    fn defect_ledger_rejects_overflow() {
        let f = Fixture::new();
        let m1 = f.material("M1");
        let scratch = f
            .service
            .register_defect_type(
                f.tenant_id,
                NewDefectType {
                    name: "Risco".to_string(),
                    description: None,
                },
            )
            .unwrap()
            .id_typed();
        let record_id = f.receiving(&[(m1, 20, 20)]);
        f.count(record_id, m1, 20);
        let inspection = f.service.start_inspection(f.tenant_id, f.user, record_id).unwrap();

        let register = |qty: i64| {
            f.service.register_defect(
                f.tenant_id,
                f.user,
                inspection.id_typed(),
                RegisterDefectRequest {
                    item_no: 1,
                    defect_id: scratch,
                    quantity: Quantity::from(qty),
                },
            )
        };

        register(15).unwrap();
        assert!(matches!(register(6), Err(DispatchError::Validation { .. })));
        let item = register(5).unwrap();
        assert_eq!(item.defective_quantity(), Quantity::from(20));
        assert_eq!(item.defects.len(), 2);
    }

    #[test]
    fn unknown_defect_type_and_item_are_rejected() {
        let f = Fixture::new();
        let m1 = f.material("M1");
        let record_id = f.receiving(&[(m1, 2, 2)]);
        f.count(record_id, m1, 2);
        let inspection = f.service.start_inspection(f.tenant_id, f.user, record_id).unwrap();
        let defect = f
            .service
            .register_defect_type(
                f.tenant_id,
                NewDefectType {
                    name: "Mancha".to_string(),
                    description: None,
                },
            )
            .unwrap()
            .id_typed();

        let unknown_defect = f
            .service
            .register_defect(
                f.tenant_id,
                f.user,
                inspection.id_typed(),
                RegisterDefectRequest {
                    item_no: 1,
                    defect_id: goodsin_catalog::DefectId::generate(),
                    quantity: Quantity::from(1),
                },
            )
            .unwrap_err();
        assert!(matches!(unknown_defect, DispatchError::Validation { field: Some(ref field), .. } if field == "defect_id"));

        let unknown_item = f
            .service
            .register_defect(
                f.tenant_id,
                f.user,
                inspection.id_typed(),
                RegisterDefectRequest {
                    item_no: 7,
                    defect_id: defect,
                    quantity: Quantity::from(1),
                },
            )
            .unwrap_err();
        assert!(matches!(unknown_item, DispatchError::NotFound(_)));
    }

    #[test]
    fn concurrent_defects_never_exceed_counted_quantity() {
        let f = Fixture::new();
        let m1 = f.material("M1");
        let defect = f
            .service
            .register_defect_type(
                f.tenant_id,
                NewDefectType {
                    name: "Furo".to_string(),
                    description: None,
                },
            )
            .unwrap()
            .id_typed();
        let record_id = f.receiving(&[(m1, 20, 20)]);
        f.count(record_id, m1, 20);
        let inspection_id = f
            .service
            .start_inspection(f.tenant_id, f.user, record_id)
            .unwrap()
            .id_typed();

        let racers = 10;
        let barrier = Arc::new(Barrier::new(racers));
        let handles: Vec<_> = (0..racers)
            .map(|_| {
                let service = f.service.clone();
                let barrier = barrier.clone();
                let (tenant_id, user) = (f.tenant_id, f.user);
                thread::spawn(move || {
                    barrier.wait();
                    service.register_defect(
                        tenant_id,
                        user,
                        inspection_id,
                        RegisterDefectRequest {
                            item_no: 1,
                            defect_id: defect,
                            quantity: Quantity::from(3),
                        },
                    )
                })
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let accepted = results.iter().filter(|r| r.is_ok()).count();
        let rejected = results
            .iter()
            .filter(|r| matches!(r, Err(DispatchError::Validation { .. })))
            .count();

        assert_eq!(accepted, 6);
        assert_eq!(rejected, 4);

        let item = f
            .service
            .get_inspection(f.tenant_id, inspection_id)
            .unwrap()
            .item(1)
            .cloned()
            .unwrap();
        assert_eq!(item.defective_quantity(), Quantity::from(18));
    }

    #[test]
    fn out_of_range_quantities_never_reach_the_record() {
        let f = Fixture::new();
        let m1 = f.material("M1");
        let record_id = f.receiving(&[(m1, 10, 10)]);
        let huge: Quantity = "79228162514264337593543950335".parse().unwrap();

        for _ in 0..2 {
            let err = f
                .service
                .add_received_item(f.tenant_id, record_id, m1, huge)
                .unwrap_err();
            assert_eq!(field_of(&err), Some("quantity"), "{err:?}");
        }
        let too_precise: Quantity = "1.005".parse().unwrap();
        let err = f
            .service
            .add_received_item(f.tenant_id, record_id, m1, too_precise)
            .unwrap_err();
        assert_eq!(field_of(&err), Some("quantity"), "{err:?}");

        // The largest accepted counts still add up without trouble.
        f.service
            .add_received_item(f.tenant_id, record_id, m1, Quantity::MAX)
            .unwrap();
        f.service
            .add_received_item(f.tenant_id, record_id, m1, Quantity::MAX)
            .unwrap();
        let report = f.service.reconcile(f.tenant_id, record_id).unwrap();
        assert_eq!(
            report.get(m1).unwrap().received_qty,
            Quantity::MAX.checked_add(Quantity::MAX).unwrap()
        );

        let err = f
            .service
            .create_plan(
                f.tenant_id,
                f.user,
                NewPlan {
                    code: "PC-BIG".to_string(),
                    supplier_id: f.supplier,
                    expected_delivery: None,
                    items: vec![NewPlanItem {
                        material_id: m1,
                        expected_quantity: huge,
                        color: None,
                    }],
                },
            )
            .unwrap_err();
        assert_eq!(field_of(&err), Some("items[0].expected_quantity"), "{err:?}");
    }

    #[test]
    fn ids_of_another_aggregate_kind_are_unknown_references() {
        let f = Fixture::new();
        let m1 = f.material("M1");
        let defect = f.defect_type("Risco");
        let record_id = f.receiving(&[(m1, 1, 1)]);
        let plan_id = f
            .service
            .get_receiving(f.tenant_id, record_id)
            .unwrap()
            .plan_id()
            .unwrap();
        let plan_events = f.store.load_stream(f.tenant_id, plan_id.aggregate_id()).unwrap().len();

        let err = f
            .service
            .add_received_item(
                f.tenant_id,
                record_id,
                MaterialId::new(defect.aggregate_id()),
                Quantity::from(1),
            )
            .unwrap_err();
        assert_eq!(field_of(&err), Some("material_id"), "{err:?}");

        let plan_as_record = ReceivingRecordId::new(plan_id.aggregate_id());
        let material_as_record = ReceivingRecordId::new(m1.aggregate_id());
        for wrong in [plan_as_record, material_as_record] {
            let err = f
                .service
                .start_inspection(f.tenant_id, f.user, wrong)
                .unwrap_err();
            assert!(matches!(err, DispatchError::NotFound(_)), "{err:?}");

            let err = f.service.reconcile(f.tenant_id, wrong).unwrap_err();
            assert!(matches!(err, DispatchError::NotFound(_)), "{err:?}");
        }

        assert_eq!(
            f.store.load_stream(f.tenant_id, plan_id.aggregate_id()).unwrap().len(),
            plan_events
        );
    }

    #[test]
    fn supplier_cnpj_is_unique_per_tenant() {
        let f = Fixture::new();

        let err = f
            .service
            .register_supplier(f.tenant_id, new_supplier("12345678000190"))
            .unwrap_err();
        assert!(matches!(err, DispatchError::Conflict(_)), "{err:?}");

        let err = f
            .service
            .register_supplier(f.tenant_id, new_supplier("123.456"))
            .unwrap_err();
        assert_eq!(field_of(&err), Some("cnpj"), "{err:?}");

        let other = f.supplier("98.765.432/0001-10");
        let listed: Vec<SupplierId> = f
            .service
            .list_suppliers(f.tenant_id)
            .unwrap()
            .iter()
            .map(|s| s.id_typed())
            .collect();
        assert_eq!(listed, vec![f.supplier, other]);

        // Another tenant may register the same company.
        assert!(
            f.service
                .register_supplier(TenantId::new(), new_supplier("12.345.678/0001-90"))
                .is_ok()
        );
    }

    #[test]
    fn concurrent_supplier_registration_has_one_winner() {
        let f = Fixture::new();
        let racers = 8;
        let barrier = Arc::new(Barrier::new(racers));
        let handles: Vec<_> = (0..racers)
            .map(|_| {
                let service = f.service.clone();
                let barrier = barrier.clone();
                let tenant_id = f.tenant_id;
                thread::spawn(move || {
                    barrier.wait();
                    service.register_supplier(tenant_id, new_supplier("11.222.333/0001-44"))
                })
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(
            results
                .iter()
                .filter_map(|r| r.as_ref().err())
                .all(|e| matches!(e, DispatchError::Conflict(_)))
        );
        assert_eq!(f.service.list_suppliers(f.tenant_id).unwrap().len(), 2);
    }

    #[test]
    fn invoice_numbers_are_unique_per_supplier() {
        let f = Fixture::new();
        let m1 = f.material("M1");
        let other = f.supplier("98.765.432/0001-10");

        let first = f.invoice(f.supplier, "NF-9", &[(m1, 1)]).unwrap();
        let err = f.invoice(f.supplier, " NF-9 ", &[(m1, 2)]).unwrap_err();
        assert!(matches!(err, DispatchError::Conflict(_)), "{err:?}");

        let reloaded = f.service.get_invoice(f.tenant_id, first.id_typed()).unwrap();
        assert_eq!(reloaded.items().len(), 1);

        let same_number = f.invoice(other, "NF-9", &[]).unwrap();
        assert_ne!(same_number.id_typed(), first.id_typed());
        assert_eq!(same_number.supplier_id(), Some(other));
    }

    #[test]
    fn plan_and_invoice_must_come_from_one_supplier() {
        let f = Fixture::new();
        let m1 = f.material("M1");
        let other = f.supplier("98.765.432/0001-10");
        let plan_id = f.plan(f.supplier, &[(m1, 5)]);
        let invoice = f.invoice(other, "NF-77", &[(m1, 5)]).unwrap();

        let err = f
            .service
            .open_receiving(
                f.tenant_id,
                f.user,
                OpenReceivingRequest {
                    plan_id,
                    invoice_id: invoice.id_typed(),
                    notes: None,
                },
            )
            .unwrap_err();
        assert_eq!(field_of(&err), Some("invoice_id"), "{err:?}");

        assert!(!f.service.get_plan(f.tenant_id, plan_id).unwrap().is_locked());
        assert!(!f.service.get_invoice(f.tenant_id, invoice.id_typed()).unwrap().is_locked());
    }

    #[test]
    fn plans_and_invoices_need_a_registered_supplier() {
        let f = Fixture::new();
        let m1 = f.material("M1");

        let err = f
            .service
            .create_plan(
                f.tenant_id,
                f.user,
                NewPlan {
                    code: "PC-X".to_string(),
                    supplier_id: SupplierId::new(m1.aggregate_id()),
                    expected_delivery: None,
                    items: vec![],
                },
            )
            .unwrap_err();
        assert_eq!(field_of(&err), Some("supplier_id"), "{err:?}");

        let err = f.invoice(SupplierId::generate(), "NF-1", &[]).unwrap_err();
        assert_eq!(field_of(&err), Some("supplier_id"), "{err:?}");
    }

    #[test]
    fn defect_types_are_listed_in_registration_order() {
        let f = Fixture::new();
        f.defect_type("Risco");
        f.defect_type("Mancha");
        f.material("M1");

        let names: Vec<String> = f
            .service
            .list_defect_types(f.tenant_id)
            .unwrap()
            .iter()
            .map(|d| d.name().to_string())
            .collect();
        assert_eq!(names, vec!["Risco", "Mancha"]);
        assert!(f.service.list_defect_types(TenantId::new()).unwrap().is_empty());
    }
}
