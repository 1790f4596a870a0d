use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use goodsin_core::{Aggregate, AggregateId, AggregateRoot, DomainError, TenantId};
use goodsin_events::Event;

goodsin_core::aggregate_id!(
    /// Supplier identifier, derived from the CNPJ (one stream per company).
    SupplierId
);

impl SupplierId {
    /// The only id a supplier with this CNPJ can have.
    pub fn for_cnpj(cnpj: &Cnpj) -> Self {
        Self(AggregateId::from_natural_key("catalog.supplier", cnpj.as_str()))
    }
}

/// Brazilian company registry number, stored as its 14 digits.
///
/// Accepts the usual `12.345.678/0001-90` punctuation on input.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Cnpj(String);

impl Cnpj {
    pub const DIGITS: usize = 14;

    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        let mut digits = String::with_capacity(Self::DIGITS);
        for c in raw.trim().chars() {
            match c {
                '0'..='9' => digits.push(c),
                '.' | '/' | '-' | ' ' => {}
                other => {
                    return Err(DomainError::invalid_field(
                        "cnpj",
                        format!("unexpected character '{other}'"),
                    ));
                }
            }
        }
        if digits.len() != Self::DIGITS {
            return Err(DomainError::invalid_field(
                "cnpj",
                format!("must have {} digits, got {}", Self::DIGITS, digits.len()),
            ));
        }
        Ok(Self(digits))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Cnpj {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Cnpj> for String {
    fn from(value: Cnpj) -> Self {
        value.0
    }
}

impl core::fmt::Display for Cnpj {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Aggregate root: Supplier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Supplier {
    id: SupplierId,
    tenant_id: Option<TenantId>,
    legal_name: String,
    trade_name: Option<String>,
    cnpj: Option<Cnpj>,
    version: u64,
    created: bool,
}

impl Supplier {
    pub fn empty(id: SupplierId) -> Self {
        Self {
            id,
            tenant_id: None,
            legal_name: String::new(),
            trade_name: None,
            cnpj: None,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> SupplierId {
        self.id
    }

    pub fn is_created(&self) -> bool {
        self.created
    }

    pub fn legal_name(&self) -> &str {
        &self.legal_name
    }

    pub fn trade_name(&self) -> Option<&str> {
        self.trade_name.as_deref()
    }

    /// Trade name when set, legal name otherwise.
    pub fn display_name(&self) -> &str {
        self.trade_name().unwrap_or(&self.legal_name)
    }

    pub fn cnpj(&self) -> Option<&Cnpj> {
        self.cnpj.as_ref()
    }
}

impl AggregateRoot for Supplier {
    type Id = SupplierId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreateSupplier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateSupplier {
    pub tenant_id: TenantId,
    pub supplier_id: SupplierId,
    pub legal_name: String,
    pub trade_name: Option<String>,
    pub cnpj: Cnpj,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SupplierCommand {
    CreateSupplier(CreateSupplier),
}

/// Event: SupplierCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupplierCreated {
    pub tenant_id: TenantId,
    pub supplier_id: SupplierId,
    pub legal_name: String,
    pub trade_name: Option<String>,
    pub cnpj: Cnpj,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SupplierEvent {
    SupplierCreated(SupplierCreated),
}

impl Event for SupplierEvent {
    fn event_type(&self) -> &'static str {
        match self {
            SupplierEvent::SupplierCreated(_) => "catalog.supplier.created",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            SupplierEvent::SupplierCreated(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Supplier {
    type Command = SupplierCommand;
    type Event = SupplierEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            SupplierEvent::SupplierCreated(e) => {
                self.id = e.supplier_id;
                self.tenant_id = Some(e.tenant_id);
                self.legal_name = e.legal_name.clone();
                self.trade_name = e.trade_name.clone();
                self.cnpj = Some(e.cnpj.clone());
                self.created = true;
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            SupplierCommand::CreateSupplier(cmd) => self.handle_create(cmd),
        }
    }
}

impl Supplier {
    fn handle_create(&self, cmd: &CreateSupplier) -> Result<Vec<SupplierEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict(format!(
                "supplier with CNPJ {} already exists",
                cmd.cnpj
            )));
        }
        if cmd.supplier_id != SupplierId::for_cnpj(&cmd.cnpj) {
            return Err(DomainError::invariant("supplier id does not match its CNPJ"));
        }

        let legal_name = cmd.legal_name.trim();
        if legal_name.is_empty() {
            return Err(DomainError::invalid_field("legal_name", "cannot be empty"));
        }
        let trade_name = cmd
            .trade_name
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        Ok(vec![SupplierEvent::SupplierCreated(SupplierCreated {
            tenant_id: cmd.tenant_id,
            supplier_id: cmd.supplier_id,
            legal_name: legal_name.to_string(),
            trade_name,
            cnpj: cmd.cnpj.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_cmd(cnpj: &str, legal_name: &str) -> SupplierCommand {
        let cnpj = Cnpj::parse(cnpj).unwrap();
        SupplierCommand::CreateSupplier(CreateSupplier {
            tenant_id: TenantId::new(),
            supplier_id: SupplierId::for_cnpj(&cnpj),
            legal_name: legal_name.to_string(),
            trade_name: Some("  ".to_string()),
            cnpj,
            occurred_at: Utc::now(),
        })
    }

    #[test]
    fn cnpj_keeps_only_the_digits() {
        let cnpj = Cnpj::parse(" 12.345.678/0001-90 ").unwrap();
        assert_eq!(cnpj.as_str(), "12345678000190");
        assert_eq!(
            SupplierId::for_cnpj(&cnpj),
            SupplierId::for_cnpj(&Cnpj::parse("12345678000190").unwrap())
        );
    }

    #[test]
    fn cnpj_must_have_fourteen_digits() {
        assert_eq!(
            Cnpj::parse("1234567800019").unwrap_err(),
            DomainError::invalid_field("cnpj", "must have 14 digits, got 13")
        );
        assert!(Cnpj::parse("12345678000190a").is_err());
        assert!(serde_json::from_str::<Cnpj>("\"123\"").is_err());
    }

    #[test]
    fn create_applies_and_blank_trade_name_is_dropped() {
        let cmd = create_cmd("12345678000190", " Curtume Vale Ltda ");
        let SupplierCommand::CreateSupplier(inner) = &cmd;
        let mut supplier = Supplier::empty(inner.supplier_id);

        let events = supplier.handle(&cmd).unwrap();
        supplier.apply(&events[0]);

        assert!(supplier.is_created());
        assert_eq!(supplier.legal_name(), "Curtume Vale Ltda");
        assert_eq!(supplier.trade_name(), None);
        assert_eq!(supplier.display_name(), "Curtume Vale Ltda");
        assert_eq!(supplier.version(), 1);
    }

    #[test]
    fn second_create_with_same_cnpj_conflicts() {
        let cmd = create_cmd("12345678000190", "Curtume Vale");
        let SupplierCommand::CreateSupplier(inner) = &cmd;
        let mut supplier = Supplier::empty(inner.supplier_id);
        let events = supplier.handle(&cmd).unwrap();
        supplier.apply(&events[0]);

        assert!(matches!(supplier.handle(&cmd), Err(DomainError::Conflict(_))));
    }

    #[test]
    fn empty_legal_name_is_rejected() {
        let cmd = create_cmd("12345678000190", "   ");
        let SupplierCommand::CreateSupplier(inner) = &cmd;
        let supplier = Supplier::empty(inner.supplier_id);

        assert_eq!(
            supplier.handle(&cmd).unwrap_err(),
            DomainError::invalid_field("legal_name", "cannot be empty")
        );
    }
}
