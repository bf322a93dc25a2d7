//! Clinical (optometry) history models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Refraction and acuity measurements for one eye.
///
/// Every measurement is optional so the same type serves as a partial
/// update: absent values are not serialized and therefore never overwrite
/// stored ones.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EyeRefraction {
    /// Sphere (SPH), diopters
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sphere: Option<f64>,
    /// Cylinder (CYL), diopters
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cylinder: Option<f64>,
    /// Axis, degrees (0-180)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub axis: Option<u16>,
    /// Near addition (ADD), diopters
    #[serde(skip_serializing_if = "Option::is_none")]
    pub addition: Option<f64>,
    /// Visual acuity without correction (e.g. "20/40")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub acuity_uncorrected: Option<String>,
    /// Visual acuity with correction
    #[serde(skip_serializing_if = "Option::is_none")]
    pub acuity_corrected: Option<String>,
}

/// Clinical history fields. Used both as the stored body and as a partial
/// update merged field by field into it.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ClinicalHistoryFields {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub right_eye: Option<EyeRefraction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub left_eye: Option<EyeRefraction>,
    /// Pupillary distance, mm
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pupillary_distance: Option<f64>,
    /// Preferred frame material (metal, acetate, ...)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frame_material: Option<String>,
    /// Preferred frame color
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frame_color: Option<String>,
    /// Lens type (single vision, bifocal, progressive, ...)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lens_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnosis: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observations: Option<String>,
}

impl ClinicalHistoryFields {
    pub fn is_empty(&self) -> bool {
        *self == ClinicalHistoryFields::default()
    }

    /// Axis must be 0-180 and pupillary distance positive.
    pub fn out_of_range_field(&self) -> Option<&'static str> {
        let axis_out = |eye: &Option<EyeRefraction>| {
            eye.as_ref()
                .and_then(|e| e.axis)
                .map_or(false, |axis| axis > 180)
        };
        if axis_out(&self.right_eye) {
            return Some("right_eye.axis");
        }
        if axis_out(&self.left_eye) {
            return Some("left_eye.axis");
        }
        if self.pupillary_distance.map_or(false, |pd| pd <= 0.0) {
            return Some("pupillary_distance");
        }
        None
    }
}

/// The canonical clinical history of one client (document ID = client ID).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClinicalHistory {
    pub client_id: String,
    #[serde(flatten)]
    pub fields: ClinicalHistoryFields,
    /// Set on the first save only
    pub created_at: DateTime<Utc>,
    /// Refreshed on every save
    pub updated_at: DateTime<Utc>,
}

/// A dated snapshot of a client's clinical history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClinicalHistoryEntry {
    pub id: String,
    pub client_id: String,
    pub recorded_at: DateTime<Utc>,
    #[serde(flatten)]
    pub fields: ClinicalHistoryFields,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_partial_fields_skip_absent_values() {
        let fields = ClinicalHistoryFields {
            frame_color: Some("blue".into()),
            right_eye: Some(EyeRefraction {
                axis: Some(90),
                ..Default::default()
            }),
            ..Default::default()
        };

        let value = serde_json::to_value(&fields).unwrap();
        assert_eq!(value, json!({"frame_color": "blue", "right_eye": {"axis": 90}}));
    }

    #[test]
    fn test_history_roundtrip_flattened() {
        let json = json!({
            "client_id": "c1",
            "frame_material": "metal",
            "left_eye": {"sphere": -1.5},
            "created_at": "2024-01-15T10:00:00Z",
            "updated_at": "2024-01-16T10:00:00Z"
        });

        let history: ClinicalHistory = serde_json::from_value(json).unwrap();
        assert_eq!(history.fields.frame_material.as_deref(), Some("metal"));
        assert_eq!(history.fields.left_eye.unwrap().sphere, Some(-1.5));
        assert_eq!(history.fields.frame_color, None);
    }

    #[test]
    fn test_out_of_range() {
        let mut fields = ClinicalHistoryFields::default();
        assert_eq!(fields.out_of_range_field(), None);

        fields.left_eye = Some(EyeRefraction {
            axis: Some(181),
            ..Default::default()
        });
        assert_eq!(fields.out_of_range_field(), Some("left_eye.axis"));

        fields.left_eye = None;
        fields.pupillary_distance = Some(0.0);
        assert_eq!(fields.out_of_range_field(), Some("pupillary_distance"));
    }
}
