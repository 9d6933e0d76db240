//! Content keys of experiment configurations.

use crate::common::*;

/// Serializes a configuration to its canonical JSON text.
pub fn canonical_json<T>(config: &T) -> Result<String>
where
    T: Serialize + ?Sized,
{
    let value = serde_json::to_value(config).context("failed to serialize the configuration")?;
    let text = canonicalize_to_string(&value);
    Ok(text)
}

/// Computes the cache key of a configuration.
///
/// The key is a name-based UUID over the canonical JSON text, so equal
/// configurations get equal keys regardless of field order.
pub fn config_uuid<T>(config: &T) -> Result<Uuid>
where
    T: Serialize + ?Sized,
{
    let text = canonical_json(config)?;
    Ok(Uuid::new_v5(&Uuid::NAMESPACE_OID, text.as_bytes()))
}

// serde_json may be built with `preserve_order`, which makes `Map` keep the
// insertion order. Write the objects out by hand to stay independent of it.
fn canonicalize_to_string(value: &Value) -> String {
    match value {
        Value::Object(map) => {
            let entries = map
                .iter()
                .sorted_by(|(lhs, _), (rhs, _)| lhs.cmp(rhs))
                .map(|(key, value)| {
                    format!(
                        "{}:{}",
                        Value::String(key.clone()),
                        canonicalize_to_string(value)
                    )
                })
                .join(",");
            format!("{{{}}}", entries)
        }
        Value::Array(values) => {
            let entries = values.iter().map(canonicalize_to_string).join(",");
            format!("[{}]", entries)
        }
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn identical_configs_share_key() -> Result<()> {
        let lhs = json!({ "dname": "gopro", "ws": 8, "isize": "512_512", "nested": { "b": 1, "a": [2, 3] } });
        let rhs = json!({ "nested": { "a": [2, 3], "b": 1 }, "isize": "512_512", "ws": 8, "dname": "gopro" });
        assert_eq!(canonical_json(&lhs)?, canonical_json(&rhs)?);
        assert_eq!(config_uuid(&lhs)?, config_uuid(&rhs)?);
        assert_eq!(config_uuid(&lhs)?, config_uuid(&lhs.clone())?);
        Ok(())
    }

    #[test]
    fn different_configs_differ() -> Result<()> {
        let lhs = json!({ "ws": 8, "wt": 0 });
        let rhs = json!({ "ws": 8, "wt": 1 });
        assert_ne!(config_uuid(&lhs)?, config_uuid(&rhs)?);

        // array order is significant
        assert_ne!(config_uuid(&json!([1, 2]))?, config_uuid(&json!([2, 1]))?);
        Ok(())
    }

    #[test]
    fn canonical_text_is_sorted() -> Result<()> {
        let text = canonical_json(&json!({ "z": null, "a": "x", "m": [true, 1.5] }))?;
        assert_eq!(text, r#"{"a":"x","m":[true,1.5],"z":null}"#);
        Ok(())
    }
}
