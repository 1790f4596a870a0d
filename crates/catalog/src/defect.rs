use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use goodsin_core::{Aggregate, AggregateRoot, DomainError, TenantId};
use goodsin_events::Event;

goodsin_core::aggregate_id!(
    /// Defect type identifier (e.g. "scratch", "wrong color").
    DefectId
);

/// Aggregate root: Defect (catalog entry, immutable once created).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Defect {
    id: DefectId,
    tenant_id: Option<TenantId>,
    name: String,
    description: Option<String>,
    version: u64,
    created: bool,
}

impl Defect {
    pub fn empty(id: DefectId) -> Self {
        Self {
            id,
            tenant_id: None,
            name: String::new(),
            description: None,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> DefectId {
        self.id
    }

    pub fn is_created(&self) -> bool {
        self.created
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }
}

impl AggregateRoot for Defect {
    type Id = DefectId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateDefect {
    pub tenant_id: TenantId,
    pub defect_id: DefectId,
    pub name: String,
    pub description: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DefectCommand {
    CreateDefect(CreateDefect),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefectCreated {
    pub tenant_id: TenantId,
    pub defect_id: DefectId,
    pub name: String,
    pub description: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DefectEvent {
    DefectCreated(DefectCreated),
}

impl Event for DefectEvent {
    fn event_type(&self) -> &'static str {
        match self {
            DefectEvent::DefectCreated(_) => "catalog.defect.created",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            DefectEvent::DefectCreated(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Defect {
    type Command = DefectCommand;
    type Event = DefectEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            DefectEvent::DefectCreated(e) => {
                self.id = e.defect_id;
                self.tenant_id = Some(e.tenant_id);
                self.name = e.name.clone();
                self.description = e.description.clone();
                self.created = true;
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            DefectCommand::CreateDefect(cmd) => {
                if self.created {
                    return Err(DomainError::conflict("defect already exists"));
                }
                let name = cmd.name.trim();
                if name.is_empty() {
                    return Err(DomainError::invalid_field("name", "cannot be empty"));
                }

                Ok(vec![DefectEvent::DefectCreated(DefectCreated {
                    tenant_id: cmd.tenant_id,
                    defect_id: cmd.defect_id,
                    name: name.to_string(),
                    description: cmd
                        .description
                        .as_deref()
                        .map(str::trim)
                        .filter(|d| !d.is_empty())
                        .map(str::to_string),
                    occurred_at: cmd.occurred_at,
                })])
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_defect_drops_blank_description() {
        let defect_id = DefectId::generate();
        let mut defect = Defect::empty(defect_id);

        let events = defect
            .handle(&DefectCommand::CreateDefect(CreateDefect {
                tenant_id: TenantId::new(),
                defect_id,
                name: "Risco".to_string(),
                description: Some("  ".to_string()),
                occurred_at: Utc::now(),
            }))
            .unwrap();
        defect.apply(&events[0]);

        assert!(defect.is_created());
        assert_eq!(defect.name(), "Risco");
        assert_eq!(defect.description(), None);
    }

    #[test]
    fn blank_name_is_rejected() {
        let defect_id = DefectId::generate();
        let err = Defect::empty(defect_id)
            .handle(&DefectCommand::CreateDefect(CreateDefect {
                tenant_id: TenantId::new(),
                defect_id,
                name: String::new(),
                description: None,
                occurred_at: Utc::now(),
            }))
            .unwrap_err();

        assert_eq!(err, DomainError::invalid_field("name", "cannot be empty"));
    }
}
