//! Clinical history service.

use serde_json::{json, Value};
use tracing::{debug, info};

use super::{ServiceError, ServiceResult};
use crate::db::{collections, Database};
use crate::models::{ClinicalHistory, ClinicalHistoryEntry, ClinicalHistoryFields, FieldError};

/// Reads and field-level saves of a client's clinical history.
pub struct ClinicalHistoryService<'a> {
    db: &'a Database,
}

impl<'a> ClinicalHistoryService<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Merge `fields` into the client's history, creating it on first save.
    ///
    /// `created_at` is written only when the history does not exist yet;
    /// `updated_at` is refreshed on every save. Fields absent from `fields`
    /// keep their stored values. A dated entry with the merged result is
    /// appended in the same atomic scope.
    #[tracing::instrument(skip(self, fields))]
    pub fn save(
        &self,
        client_id: &str,
        fields: &ClinicalHistoryFields,
    ) -> ServiceResult<ClinicalHistory> {
        if let Some(field) = fields.out_of_range_field() {
            return Err(ServiceError::invalid_field(field, FieldError::InvalidFormat));
        }

        let history = self.db.atomically(|db| {
            if !db.document_exists(collections::CLIENTS, client_id)? {
                return Err(ServiceError::not_found(collections::CLIENTS, client_id));
            }

            let now = db.now();
            let first_save = !db.document_exists(collections::CLINICAL_HISTORIES, client_id)?;

            let mut patch = serde_json::to_value(fields)?;
            if let Value::Object(map) = &mut patch {
                map.insert("client_id".into(), json!(client_id));
                map.insert("updated_at".into(), serde_json::to_value(now)?);
                if first_save {
                    map.insert("created_at".into(), serde_json::to_value(now)?);
                }
            }

            let merged = db.merge_document(collections::CLINICAL_HISTORIES, client_id, &patch)?;
            let history: ClinicalHistory = serde_json::from_value(merged)?;

            let entry = ClinicalHistoryEntry {
                id: uuid::Uuid::new_v4().to_string(),
                client_id: client_id.to_string(),
                recorded_at: now,
                fields: history.fields.clone(),
            };
            db.insert_as(collections::CLINICAL_HISTORY_ENTRIES, &entry.id, &entry)?;

            Ok::<_, ServiceError>((history, first_save))
        });

        let (history, first_save) = history?;
        info!(client_id, first_save, "clinical history saved");
        Ok(history)
    }

    /// The client's history, if one was ever saved.
    pub fn get(&self, client_id: &str) -> ServiceResult<Option<ClinicalHistory>> {
        let history = self
            .db
            .get_as::<ClinicalHistory>(collections::CLINICAL_HISTORIES, client_id)?;
        debug!(client_id, found = history.is_some(), "clinical history lookup");
        Ok(history)
    }

    /// Every dated entry of the client, newest first.
    pub fn list_all(&self, client_id: &str) -> ServiceResult<Vec<ClinicalHistoryEntry>> {
        let mut entries = self.db.find_as::<ClinicalHistoryEntry>(
            collections::CLINICAL_HISTORY_ENTRIES,
            "client_id",
            &json!(client_id),
        )?;
        entries.sort_by(|a, b| b.recorded_at.cmp(&a.recorded_at));
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::models::{EyeRefraction, NewClient};
    use crate::services::ClientService;
    use chrono::{Duration, TimeZone, Utc};
    use std::sync::Arc;

    fn setup() -> (Database, Arc<ManualClock>, String) {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap(),
        ));
        let db = Database::open_in_memory_with_clock(clock.clone()).unwrap();
        let client = ClientService::new(&db)
            .create(NewClient {
                first_name: "Luis".into(),
                last_name: "Mora".into(),
                national_id: "1712345678".into(),
                ..Default::default()
            })
            .unwrap();
        (db, clock, client.id)
    }

    fn fields(material: Option<&str>, color: Option<&str>) -> ClinicalHistoryFields {
        ClinicalHistoryFields {
            frame_material: material.map(String::from),
            frame_color: color.map(String::from),
            ..Default::default()
        }
    }

    #[test]
    fn test_first_save_sets_both_timestamps() {
        let (db, _clock, client_id) = setup();
        let service = ClinicalHistoryService::new(&db);

        let history = service
            .save(&client_id, &fields(Some("metal"), Some("black")))
            .unwrap();

        assert_eq!(history.created_at, history.updated_at);
        assert_eq!(history.client_id, client_id);
    }

    #[test]
    fn test_second_save_merges_fields() {
        let (db, clock, client_id) = setup();
        let service = ClinicalHistoryService::new(&db);

        let first = service
            .save(&client_id, &fields(Some("metal"), Some("black")))
            .unwrap();
        clock.advance(Duration::minutes(5));
        let second = service.save(&client_id, &fields(None, Some("blue"))).unwrap();

        assert_eq!(second.fields.frame_material.as_deref(), Some("metal"));
        assert_eq!(second.fields.frame_color.as_deref(), Some("blue"));
        assert_eq!(second.created_at, first.created_at);
        assert!(second.updated_at > first.updated_at);

        let stored = service.get(&client_id).unwrap().unwrap();
        assert_eq!(stored, second);
    }

    #[test]
    fn test_nested_eye_fields_merge() {
        let (db, _clock, client_id) = setup();
        let service = ClinicalHistoryService::new(&db);

        service
            .save(
                &client_id,
                &ClinicalHistoryFields {
                    right_eye: Some(EyeRefraction {
                        sphere: Some(-1.25),
                        axis: Some(90),
                        ..Default::default()
                    }),
                    ..Default::default()
                },
            )
            .unwrap();
        let history = service
            .save(
                &client_id,
                &ClinicalHistoryFields {
                    right_eye: Some(EyeRefraction {
                        axis: Some(180),
                        ..Default::default()
                    }),
                    ..Default::default()
                },
            )
            .unwrap();

        let right = history.fields.right_eye.unwrap();
        assert_eq!(right.sphere, Some(-1.25));
        assert_eq!(right.axis, Some(180));
    }

    #[test]
    fn test_save_for_unknown_client() {
        let (db, _clock, _client_id) = setup();
        let result = ClinicalHistoryService::new(&db).save("missing", &fields(Some("metal"), None));

        assert!(matches!(result, Err(ServiceError::NotFound { .. })));
        assert!(ClinicalHistoryService::new(&db).get("missing").unwrap().is_none());
    }

    #[test]
    fn test_out_of_range_axis_rejected() {
        let (db, _clock, client_id) = setup();
        let result = ClinicalHistoryService::new(&db).save(
            &client_id,
            &ClinicalHistoryFields {
                left_eye: Some(EyeRefraction {
                    axis: Some(200),
                    ..Default::default()
                }),
                ..Default::default()
            },
        );

        match result {
            Err(ServiceError::ValidationFailed(errors)) => {
                assert_eq!(errors.get("left_eye.axis"), Some(FieldError::InvalidFormat));
            }
            other => panic!("expected validation failure, got {:?}", other),
        }
    }

    #[test]
    fn test_list_all_newest_first() {
        let (db, clock, client_id) = setup();
        let service = ClinicalHistoryService::new(&db);

        service.save(&client_id, &fields(Some("metal"), None)).unwrap();
        clock.advance(Duration::days(30));
        service.save(&client_id, &fields(None, Some("red"))).unwrap();

        let entries = service.list_all(&client_id).unwrap();
        assert_eq!(entries.len(), 2);
        assert!(entries[0].recorded_at > entries[1].recorded_at);
        // Entries are snapshots of the merged history
        assert_eq!(entries[0].fields.frame_material.as_deref(), Some("metal"));
        assert_eq!(entries[1].fields.frame_color, None);
    }
}
