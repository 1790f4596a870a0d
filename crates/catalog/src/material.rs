use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use goodsin_core::{Aggregate, AggregateRoot, DomainError, TenantId};
use goodsin_events::Event;

goodsin_core::aggregate_id!(
    /// Material identifier (tenant-scoped via `tenant_id` fields in events/commands).
    MaterialId
);

/// Unit a material is counted in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitOfMeasure {
    /// Square metres (leather, fabric).
    M2,
    Kg,
    Pair,
    Unit,
}

/// Aggregate root: Material.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Material {
    id: MaterialId,
    tenant_id: Option<TenantId>,
    code: String,
    description: String,
    unit: UnitOfMeasure,
    version: u64,
    created: bool,
}

impl Material {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: MaterialId) -> Self {
        Self {
            id,
            tenant_id: None,
            code: String::new(),
            description: String::new(),
            unit: UnitOfMeasure::Unit,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> MaterialId {
        self.id
    }

    pub fn is_created(&self) -> bool {
        self.created
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
    }

    /// Internal material code; reconciliation reports are ordered by it.
    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn unit(&self) -> UnitOfMeasure {
        self.unit
    }
}

impl AggregateRoot for Material {
    type Id = MaterialId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreateMaterial.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateMaterial {
    pub tenant_id: TenantId,
    pub material_id: MaterialId,
    pub code: String,
    pub description: String,
    pub unit: UnitOfMeasure,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MaterialCommand {
    CreateMaterial(CreateMaterial),
}

/// Event: MaterialCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaterialCreated {
    pub tenant_id: TenantId,
    pub material_id: MaterialId,
    pub code: String,
    pub description: String,
    pub unit: UnitOfMeasure,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MaterialEvent {
    MaterialCreated(MaterialCreated),
}

impl Event for MaterialEvent {
    fn event_type(&self) -> &'static str {
        match self {
            MaterialEvent::MaterialCreated(_) => "catalog.material.created",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            MaterialEvent::MaterialCreated(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Material {
    type Command = MaterialCommand;
    type Event = MaterialEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            MaterialEvent::MaterialCreated(e) => {
                self.id = e.material_id;
                self.tenant_id = Some(e.tenant_id);
                self.code = e.code.clone();
                self.description = e.description.clone();
                self.unit = e.unit;
                self.created = true;
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            MaterialCommand::CreateMaterial(cmd) => self.handle_create(cmd),
        }
    }
}

impl Material {
    fn handle_create(&self, cmd: &CreateMaterial) -> Result<Vec<MaterialEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("material already exists"));
        }

        let code = cmd.code.trim();
        if code.is_empty() {
            return Err(DomainError::invalid_field("code", "cannot be empty"));
        }

        Ok(vec![MaterialEvent::MaterialCreated(MaterialCreated {
            tenant_id: cmd.tenant_id,
            material_id: cmd.material_id,
            code: code.to_string(),
            description: cmd.description.trim().to_string(),
            unit: cmd.unit,
            occurred_at: cmd.occurred_at,
        })])
    }
}
