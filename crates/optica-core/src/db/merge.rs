//! Field-level document merging.

use serde_json::Value;

/// Merge `patch` into `target`.
///
/// Objects merge key by key, recursively. Any other patch value (including
/// arrays and explicit `null`) replaces the target value. Keys absent from
/// the patch are left untouched.
pub fn deep_merge(target: &mut Value, patch: &Value) {
    match (target, patch) {
        (Value::Object(target_map), Value::Object(patch_map)) => {
            for (key, patch_value) in patch_map {
                match target_map.get_mut(key) {
                    Some(existing) if existing.is_object() && patch_value.is_object() => {
                        deep_merge(existing, patch_value);
                    }
                    _ => {
                        target_map.insert(key.clone(), patch_value.clone());
                    }
                }
            }
        }
        (target, patch) => {
            *target = patch.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_merge_keeps_unspecified_fields() {
        let mut doc = json!({"frame_material": "metal", "frame_color": "black"});
        deep_merge(&mut doc, &json!({"frame_color": "blue"}));

        assert_eq!(doc, json!({"frame_material": "metal", "frame_color": "blue"}));
    }

    #[test]
    fn test_merge_nested_objects() {
        let mut doc = json!({"right_eye": {"sphere": -1.25, "cylinder": -0.5}});
        deep_merge(&mut doc, &json!({"right_eye": {"axis": 90}}));

        assert_eq!(
            doc,
            json!({"right_eye": {"sphere": -1.25, "cylinder": -0.5, "axis": 90}})
        );
    }

    #[test]
    fn test_merge_replaces_arrays_and_nulls() {
        let mut doc = json!({"tags": ["a", "b"], "notes": "old"});
        deep_merge(&mut doc, &json!({"tags": ["c"], "notes": null}));

        assert_eq!(doc, json!({"tags": ["c"], "notes": null}));
    }

    #[test]
    fn test_merge_object_over_scalar() {
        let mut doc = json!({"claims": "none"});
        deep_merge(&mut doc, &json!({"claims": {"role": "admin"}}));

        assert_eq!(doc, json!({"claims": {"role": "admin"}}));
    }
}
