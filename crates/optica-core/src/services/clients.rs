//! Client record service.

use serde_json::json;
use tracing::{debug, info, warn};

use super::{InvoiceService, ServiceError, ServiceResult};
use crate::db::{collections, Database};
use crate::listing::sort_by_recency;
use crate::models::{
    normalize_email, normalize_national_id, Client, ClientUpdate, DebtSummary, FieldError,
    NewClient, ValidationErrors,
};

/// What the UI shows before asking to confirm a deactivation.
#[derive(Debug, Clone, PartialEq)]
pub struct DeactivationCheck {
    pub client: Client,
    pub debt: DebtSummary,
    /// Deactivation must be explicitly confirmed when the client owes money
    pub requires_confirmation: bool,
}

/// CRUD over client documents.
pub struct ClientService<'a> {
    db: &'a Database,
}

impl<'a> ClientService<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Active clients, newest first.
    pub fn list(&self) -> ServiceResult<Vec<Client>> {
        let mut clients: Vec<Client> = self
            .db
            .list_as::<Client>(collections::CLIENTS)?
            .into_iter()
            .filter(|c| c.active)
            .collect();
        sort_by_recency(&mut clients);
        debug!(count = clients.len(), "listed active clients");
        Ok(clients)
    }

    /// Every client, including deactivated ones, newest first.
    pub fn list_including_inactive(&self) -> ServiceResult<Vec<Client>> {
        let mut clients = self.db.list_as::<Client>(collections::CLIENTS)?;
        sort_by_recency(&mut clients);
        Ok(clients)
    }

    /// Get a client (active or not) by ID.
    pub fn get_by_id(&self, id: &str) -> ServiceResult<Client> {
        self.db
            .get_as::<Client>(collections::CLIENTS, id)?
            .ok_or_else(|| ServiceError::not_found(collections::CLIENTS, id))
    }

    /// Validate and store a new client.
    #[tracing::instrument(skip(self, fields))]
    pub fn create(&self, fields: NewClient) -> ServiceResult<Client> {
        let fields = fields.normalized();

        let mut errors = fields.validate();
        errors.extend(self.validate_uniqueness(
            &fields.national_id,
            fields.email.as_deref(),
            None,
        )?);
        if !errors.is_empty() {
            warn!(%errors, "client rejected");
            return Err(ServiceError::ValidationFailed(errors));
        }

        let client = fields.into_client(uuid::Uuid::new_v4().to_string(), self.db.now());
        // The store's unique indexes settle races the pre-check cannot see.
        self.db.insert_as(collections::CLIENTS, &client.id, &client)?;

        info!(client_id = %client.id, "client created");
        Ok(client)
    }

    /// Merge the given fields into an active client.
    #[tracing::instrument(skip(self, update))]
    pub fn update(&self, id: &str, update: ClientUpdate) -> ServiceResult<Client> {
        let mut client = self.get_by_id(id)?;
        if !client.active {
            return Err(ServiceError::InvalidState(format!(
                "client {} is deactivated",
                id
            )));
        }
        if update.is_empty() {
            return Ok(client);
        }

        client.apply(update);

        let mut errors = client.validate();
        errors.extend(self.validate_uniqueness(
            &client.national_id,
            client.email.as_deref(),
            Some(id),
        )?);
        if !errors.is_empty() {
            warn!(%errors, "client update rejected");
            return Err(ServiceError::ValidationFailed(errors));
        }

        client.updated_at = Some(self.db.now());
        self.db.set_as(collections::CLIENTS, id, &client)?;

        info!(client_id = %id, "client updated");
        Ok(client)
    }

    /// Whether an active client other than `exclude_id` holds `national_id`.
    pub fn exists_by_national_id(
        &self,
        national_id: &str,
        exclude_id: Option<&str>,
    ) -> ServiceResult<bool> {
        let national_id = normalize_national_id(national_id);
        if national_id.is_empty() {
            return Ok(false);
        }
        self.exists_by_field("national_id", &national_id, exclude_id)
    }

    /// Whether an active client other than `exclude_id` holds `email`.
    pub fn exists_by_email(&self, email: &str, exclude_id: Option<&str>) -> ServiceResult<bool> {
        match normalize_email(Some(email.to_string())) {
            Some(email) => self.exists_by_field("email", &email, exclude_id),
            None => Ok(false),
        }
    }

    /// Linear scan of the collection for live holders of a field value.
    fn exists_by_field(
        &self,
        field: &str,
        value: &str,
        exclude_id: Option<&str>,
    ) -> ServiceResult<bool> {
        let holders = self
            .db
            .find_as::<Client>(collections::CLIENTS, field, &json!(value))?;
        Ok(holders
            .iter()
            .any(|c| c.active && Some(c.id.as_str()) != exclude_id))
    }

    /// Availability check run before a save.
    ///
    /// Two callers checking the same value without coordination can both
    /// see it as available; only the store's unique index decides which
    /// write wins.
    pub fn validate_uniqueness(
        &self,
        national_id: &str,
        email: Option<&str>,
        exclude_id: Option<&str>,
    ) -> ServiceResult<ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if self.exists_by_national_id(national_id, exclude_id)? {
            errors.add("national_id", FieldError::NationalIdTaken);
        }
        if let Some(email) = email {
            if self.exists_by_email(email, exclude_id)? {
                errors.add("email", FieldError::EmailTaken);
            }
        }
        Ok(errors)
    }

    /// Debt information shown in the deactivation confirmation step.
    pub fn deactivation_check(&self, id: &str) -> ServiceResult<DeactivationCheck> {
        let client = self.get_by_id(id)?;
        let debt = InvoiceService::new(self.db).debt_summary(id)?;
        Ok(DeactivationCheck {
            requires_confirmation: debt.has_debt(),
            client,
            debt,
        })
    }

    /// Soft-delete a client. Clients with outstanding debt are only
    /// deactivated when `confirmed` is set.
    #[tracing::instrument(skip(self))]
    pub fn deactivate(&self, id: &str, confirmed: bool) -> ServiceResult<Client> {
        let check = self.deactivation_check(id)?;
        let mut client = check.client;
        if !client.active {
            return Ok(client);
        }
        if check.requires_confirmation && !confirmed {
            return Err(ServiceError::ConfirmationRequired(format!(
                "client {} owes {} across {} invoice(s)",
                client.full_name(),
                check.debt.total_owed,
                check.debt.pending_count
            )));
        }

        client.active = false;
        client.updated_at = Some(self.db.now());
        self.db.set_as(collections::CLIENTS, id, &client)?;

        info!(client_id = %id, "client deactivated");
        Ok(client)
    }

    /// Undo a deactivation, provided nobody took the client's national ID
    /// or email in the meantime.
    #[tracing::instrument(skip(self))]
    pub fn reactivate(&self, id: &str) -> ServiceResult<Client> {
        let mut client = self.get_by_id(id)?;
        if client.active {
            return Ok(client);
        }

        let errors =
            self.validate_uniqueness(&client.national_id, client.email.as_deref(), Some(id))?;
        if !errors.is_empty() {
            return Err(ServiceError::ValidationFailed(errors));
        }

        client.active = true;
        client.updated_at = Some(self.db.now());
        self.db.set_as(collections::CLIENTS, id, &client)?;

        info!(client_id = %id, "client reactivated");
        Ok(client)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup_db() -> Database {
        Database::open_in_memory().unwrap()
    }

    fn new_client(national_id: &str, email: &str) -> NewClient {
        NewClient {
            first_name: "Ana".into(),
            last_name: "Torres".into(),
            national_id: national_id.into(),
            email: Some(email.into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_create_and_get() {
        let db = setup_db();
        let service = ClientService::new(&db);

        let client = service.create(new_client("1234567890", "a@b.com")).unwrap();
        assert_eq!(client.id.len(), 36);
        assert!(client.created_at.is_some());
        assert!(client.active);

        let fetched = service.get_by_id(&client.id).unwrap();
        assert_eq!(fetched, client);
    }

    #[test]
    fn test_get_missing_is_not_found() {
        let db = setup_db();
        let result = ClientService::new(&db).get_by_id("nope");
        assert!(matches!(result, Err(ServiceError::NotFound { .. })));
    }

    #[test]
    fn test_duplicate_national_id_rejected() {
        let db = setup_db();
        let service = ClientService::new(&db);

        service.create(new_client("1234567890", "a@b.com")).unwrap();
        let result = service.create(new_client("1234567890", "other@b.com"));

        match result {
            Err(ServiceError::ValidationFailed(errors)) => {
                assert_eq!(errors.get("national_id"), Some(FieldError::NationalIdTaken));
                assert_eq!(errors.get("email"), None);
            }
            other => panic!("expected validation failure, got {:?}", other),
        }
    }

    #[test]
    fn test_duplicate_email_case_insensitive() {
        let db = setup_db();
        let service = ClientService::new(&db);

        service.create(new_client("1234567890", "a@b.com")).unwrap();
        assert!(service.exists_by_email("A@B.COM", None).unwrap());
    }

    #[test]
    fn test_exclude_self_when_editing() {
        let db = setup_db();
        let service = ClientService::new(&db);

        let client = service.create(new_client("1234567890", "a@b.com")).unwrap();
        assert!(service.exists_by_national_id("1234567890", None).unwrap());
        assert!(!service
            .exists_by_national_id("1234567890", Some(&client.id))
            .unwrap());
    }

    #[test]
    fn test_update_merges_given_fields() {
        let db = setup_db();
        let service = ClientService::new(&db);

        let client = service.create(new_client("1234567890", "a@b.com")).unwrap();
        let updated = service
            .update(
                &client.id,
                ClientUpdate {
                    phone: Some("0991234567".into()),
                    ..Default::default()
                },
            )
            .unwrap();

        assert_eq!(updated.phone.as_deref(), Some("0991234567"));
        assert_eq!(updated.email.as_deref(), Some("a@b.com"));
        assert_eq!(updated.created_at, client.created_at);
    }

    #[test]
    fn test_update_to_taken_email_rejected() {
        let db = setup_db();
        let service = ClientService::new(&db);

        service.create(new_client("1234567890", "a@b.com")).unwrap();
        let second = service.create(new_client("0987654321", "c@d.com")).unwrap();

        let result = service.update(
            &second.id,
            ClientUpdate {
                email: Some("a@b.com".into()),
                ..Default::default()
            },
        );
        assert!(matches!(result, Err(ServiceError::ValidationFailed(_))));

        // Stored record unchanged
        let stored = service.get_by_id(&second.id).unwrap();
        assert_eq!(stored.email.as_deref(), Some("c@d.com"));
    }

    #[test]
    fn test_deactivate_hides_from_list_and_frees_id() {
        let db = setup_db();
        let service = ClientService::new(&db);

        let client = service.create(new_client("1234567890", "a@b.com")).unwrap();
        service.deactivate(&client.id, false).unwrap();

        assert!(service.list().unwrap().is_empty());
        assert_eq!(service.list_including_inactive().unwrap().len(), 1);
        // Record still exists
        assert!(!service.get_by_id(&client.id).unwrap().active);

        // The national ID can be reused by a new active client
        assert!(service.create(new_client("1234567890", "a@b.com")).is_ok());

        // ...which blocks reactivation of the old record
        assert!(matches!(
            service.reactivate(&client.id),
            Err(ServiceError::ValidationFailed(_))
        ));
    }

    #[test]
    fn test_reactivate() {
        let db = setup_db();
        let service = ClientService::new(&db);

        let client = service.create(new_client("1234567890", "a@b.com")).unwrap();
        service.deactivate(&client.id, false).unwrap();
        let reactivated = service.reactivate(&client.id).unwrap();

        assert!(reactivated.active);
        assert_eq!(service.list().unwrap().len(), 1);
    }

    #[test]
    fn test_update_inactive_rejected() {
        let db = setup_db();
        let service = ClientService::new(&db);

        let client = service.create(new_client("1234567890", "a@b.com")).unwrap();
        service.deactivate(&client.id, false).unwrap();

        let result = service.update(
            &client.id,
            ClientUpdate {
                notes: Some("x".into()),
                ..Default::default()
            },
        );
        assert!(matches!(result, Err(ServiceError::InvalidState(_))));
    }
}
