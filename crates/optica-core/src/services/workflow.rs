//! Client form save: client fields and clinical history together.

use tracing::info;

use super::{ClientService, ClinicalHistoryService, ServiceError, ServiceResult};
use crate::db::Database;
use crate::models::{Client, ClientUpdate, ClinicalHistory, ClinicalHistoryFields, NewClient};

/// Result of a combined save.
#[derive(Debug, Clone, PartialEq)]
pub struct SavedClient {
    pub client: Client,
    /// `None` when no history fields were given and none existed
    pub history: Option<ClinicalHistory>,
}

/// Saves the client form as one unit: either both the client record and
/// its clinical history are written, or neither is.
pub struct ClientWorkflow<'a> {
    db: &'a Database,
}

impl<'a> ClientWorkflow<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Create a client and, if any history fields are given, its history.
    #[tracing::instrument(skip_all)]
    pub fn create_client_with_history(
        &self,
        fields: NewClient,
        history: &ClinicalHistoryFields,
    ) -> ServiceResult<SavedClient> {
        let saved = self.db.atomically(|db| {
            let client = ClientService::new(db).create(fields)?;
            let history = if history.is_empty() {
                None
            } else {
                Some(ClinicalHistoryService::new(db).save(&client.id, history)?)
            };
            Ok::<_, ServiceError>(SavedClient { client, history })
        })?;

        info!(client_id = %saved.client.id, "client saved with history");
        Ok(saved)
    }

    /// Update an existing client and merge its history fields.
    #[tracing::instrument(skip(self, client_update, history))]
    pub fn save_client_with_history(
        &self,
        client_id: &str,
        client_update: ClientUpdate,
        history: &ClinicalHistoryFields,
    ) -> ServiceResult<SavedClient> {
        let saved = self.db.atomically(|db| {
            let client = ClientService::new(db).update(client_id, client_update)?;
            let histories = ClinicalHistoryService::new(db);
            let history = if history.is_empty() {
                histories.get(client_id)?
            } else {
                Some(histories.save(client_id, history)?)
            };
            Ok::<_, ServiceError>(SavedClient { client, history })
        })?;

        info!(client_id, "client saved with history");
        Ok(saved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EyeRefraction;

    fn new_client() -> NewClient {
        NewClient {
            first_name: "Ana".into(),
            last_name: "Torres".into(),
            national_id: "1234567890".into(),
            ..Default::default()
        }
    }

    fn history() -> ClinicalHistoryFields {
        ClinicalHistoryFields {
            frame_material: Some("metal".into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_create_with_history() {
        let db = Database::open_in_memory().unwrap();
        let saved = ClientWorkflow::new(&db)
            .create_client_with_history(new_client(), &history())
            .unwrap();

        let stored = ClinicalHistoryService::new(&db)
            .get(&saved.client.id)
            .unwrap()
            .unwrap();
        assert_eq!(stored.fields.frame_material.as_deref(), Some("metal"));
    }

    #[test]
    fn test_history_failure_discards_client() {
        let db = Database::open_in_memory().unwrap();
        let bad_history = ClinicalHistoryFields {
            right_eye: Some(EyeRefraction {
                axis: Some(500),
                ..Default::default()
            }),
            ..Default::default()
        };

        let result = ClientWorkflow::new(&db).create_client_with_history(new_client(), &bad_history);
        assert!(matches!(result, Err(ServiceError::ValidationFailed(_))));
        assert!(ClientService::new(&db).list().unwrap().is_empty());
    }

    #[test]
    fn test_history_failure_discards_client_update() {
        let db = Database::open_in_memory().unwrap();
        let workflow = ClientWorkflow::new(&db);
        let saved = workflow
            .create_client_with_history(new_client(), &history())
            .unwrap();

        let result = workflow.save_client_with_history(
            &saved.client.id,
            ClientUpdate {
                phone: Some("0999999999".into()),
                ..Default::default()
            },
            &ClinicalHistoryFields {
                pupillary_distance: Some(-3.0),
                ..Default::default()
            },
        );
        assert!(matches!(result, Err(ServiceError::ValidationFailed(_))));

        let stored = ClientService::new(&db).get_by_id(&saved.client.id).unwrap();
        assert_eq!(stored.phone, None);
    }

    #[test]
    fn test_update_without_history_fields_keeps_history() {
        let db = Database::open_in_memory().unwrap();
        let workflow = ClientWorkflow::new(&db);
        let saved = workflow
            .create_client_with_history(new_client(), &history())
            .unwrap();

        let updated = workflow
            .save_client_with_history(
                &saved.client.id,
                ClientUpdate {
                    phone: Some("0999999999".into()),
                    ..Default::default()
                },
                &ClinicalHistoryFields::default(),
            )
            .unwrap();

        assert_eq!(updated.client.phone.as_deref(), Some("0999999999"));
        assert_eq!(updated.history, saved.history);
    }
}
