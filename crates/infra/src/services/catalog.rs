use chrono::Utc;
use serde_json::Value as JsonValue;

use goodsin_catalog::{
    Cnpj, CreateDefect, CreateMaterial, CreateSupplier, Defect, DefectCommand, DefectId, Material,
    MaterialCommand, MaterialId, Supplier, SupplierCommand, SupplierId, UnitOfMeasure,
};
use goodsin_core::TenantId;
use goodsin_events::{EventBus, EventEnvelope};

use super::{GoodsInService, aggregate_types};
use crate::command_dispatcher::DispatchError;
use crate::event_store::EventStore;

#[derive(Debug, Clone)]
pub struct NewMaterial {
    pub code: String,
    pub description: String,
    pub unit: UnitOfMeasure,
}

#[derive(Debug, Clone)]
pub struct NewDefectType {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewSupplier {
    pub legal_name: String,
    pub trade_name: Option<String>,
    /// Raw CNPJ as typed; punctuation is accepted.
    pub cnpj: String,
}

impl<S, B> GoodsInService<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    pub fn register_material(
        &self,
        tenant_id: TenantId,
        input: NewMaterial,
    ) -> Result<Material, DispatchError> {
        let material_id = MaterialId::generate();
        let cmd = MaterialCommand::CreateMaterial(CreateMaterial {
            tenant_id,
            material_id,
            code: input.code,
            description: input.description,
            unit: input.unit,
            occurred_at: Utc::now(),
        });

        self.execute(
            tenant_id,
            material_id.aggregate_id(),
            aggregate_types::MATERIAL,
            cmd,
            move |_, _| Material::empty(material_id),
        )
    }

    pub fn get_material(
        &self,
        tenant_id: TenantId,
        material_id: MaterialId,
    ) -> Result<Material, DispatchError> {
        self.load_existing(
            tenant_id,
            material_id.aggregate_id(),
            aggregate_types::MATERIAL,
            "material",
            |_, _| Material::empty(material_id),
            Material::is_created,
        )
    }

    pub fn register_defect_type(
        &self,
        tenant_id: TenantId,
        input: NewDefectType,
    ) -> Result<Defect, DispatchError> {
        let defect_id = DefectId::generate();
        let cmd = DefectCommand::CreateDefect(CreateDefect {
            tenant_id,
            defect_id,
            name: input.name,
            description: input.description,
            occurred_at: Utc::now(),
        });

        self.execute(
            tenant_id,
            defect_id.aggregate_id(),
            aggregate_types::DEFECT,
            cmd,
            move |_, _| Defect::empty(defect_id),
        )
    }

    pub fn get_defect_type(
        &self,
        tenant_id: TenantId,
        defect_id: DefectId,
    ) -> Result<Defect, DispatchError> {
        self.load_existing(
            tenant_id,
            defect_id.aggregate_id(),
            aggregate_types::DEFECT,
            "defect",
            |_, _| Defect::empty(defect_id),
            Defect::is_created,
        )
    }

    /// Defect types in registration order.
    pub fn list_defect_types(&self, tenant_id: TenantId) -> Result<Vec<Defect>, DispatchError> {
        self.list_existing(
            tenant_id,
            aggregate_types::DEFECT,
            |_, id| Defect::empty(DefectId::new(id)),
            Defect::is_created,
        )
    }

    /// Register a supplier. A second registration of the same CNPJ is a
    /// [`DispatchError::Conflict`], also under concurrent calls: both land on the
    /// stream derived from the CNPJ and only one create can win it.
    pub fn register_supplier(
        &self,
        tenant_id: TenantId,
        input: NewSupplier,
    ) -> Result<Supplier, DispatchError> {
        let cnpj = Cnpj::parse(&input.cnpj)?;
        let supplier_id = SupplierId::for_cnpj(&cnpj);

        self.execute(
            tenant_id,
            supplier_id.aggregate_id(),
            aggregate_types::SUPPLIER,
            SupplierCommand::CreateSupplier(CreateSupplier {
                tenant_id,
                supplier_id,
                legal_name: input.legal_name,
                trade_name: input.trade_name,
                cnpj,
                occurred_at: Utc::now(),
            }),
            move |_, _| Supplier::empty(supplier_id),
        )
    }

    pub fn get_supplier(
        &self,
        tenant_id: TenantId,
        supplier_id: SupplierId,
    ) -> Result<Supplier, DispatchError> {
        self.load_existing(
            tenant_id,
            supplier_id.aggregate_id(),
            aggregate_types::SUPPLIER,
            "supplier",
            |_, _| Supplier::empty(supplier_id),
            Supplier::is_created,
        )
    }

    pub fn list_suppliers(&self, tenant_id: TenantId) -> Result<Vec<Supplier>, DispatchError> {
        self.list_existing(
            tenant_id,
            aggregate_types::SUPPLIER,
            |_, id| Supplier::empty(SupplierId::new(id)),
            Supplier::is_created,
        )
    }

    /// Resolve a supplier referenced from a request body.
    pub(crate) fn require_supplier(
        &self,
        tenant_id: TenantId,
        supplier_id: SupplierId,
        field: &str,
    ) -> Result<Supplier, DispatchError> {
        match self.get_supplier(tenant_id, supplier_id) {
            Err(DispatchError::NotFound(_)) => Err(DispatchError::invalid_field(
                field,
                format!("unknown supplier {supplier_id}"),
            )),
            other => other,
        }
    }

    /// Resolve a material referenced from a request body.
    ///
    /// An unknown material is a problem with the request, not a missing resource.
    pub(crate) fn require_material(
        &self,
        tenant_id: TenantId,
        material_id: MaterialId,
        field: &str,
    ) -> Result<Material, DispatchError> {
        match self.get_material(tenant_id, material_id) {
            Err(DispatchError::NotFound(_)) => Err(DispatchError::invalid_field(
                field,
                format!("unknown material {material_id}"),
            )),
            other => other,
        }
    }
}
