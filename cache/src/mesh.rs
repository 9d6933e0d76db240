//! Cartesian meshing of option lists into experiment configurations.

use crate::common::*;

/// A concrete experiment configuration as a flat JSON object.
pub type ConfigMap = Map<String, Value>;

/// Candidate values per configuration key. The key order decides the mesh order.
pub type OptionLists = IndexMap<String, Vec<Value>>;

/// Expands option lists into the Cartesian product of their values.
///
/// The last key varies fastest. A key with no candidate values produces an
/// empty mesh, while an empty list map produces a single empty configuration.
pub fn mesh(lists: &OptionLists) -> Vec<ConfigMap> {
    if lists.is_empty() {
        return vec![ConfigMap::new()];
    }

    lists
        .values()
        .map(|values| values.iter())
        .multi_cartesian_product()
        .map(|values| {
            lists
                .keys()
                .cloned()
                .zip(values.into_iter().cloned())
                .collect()
        })
        .collect()
}

/// Fills each configuration with the defaults it does not carry yet.
///
/// Values already present in a configuration are never overwritten.
pub fn append_defaults(configs: &mut [ConfigMap], defaults: &ConfigMap) {
    configs.iter_mut().for_each(|config| {
        defaults.iter().for_each(|(key, value)| {
            config
                .entry(key.clone())
                .or_insert_with(|| value.clone());
        });
    });
}

/// A base option list with partial overrides, each meshed separately.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MeshGroups {
    /// The option lists shared by every variant.
    pub base: OptionLists,
    /// Keys replaced in the base per variant. The meshes are concatenated in
    /// order. When empty, only the base is meshed.
    #[serde(default)]
    pub variants: Vec<OptionLists>,
}

impl MeshGroups {
    pub fn mesh(&self) -> Vec<ConfigMap> {
        if self.variants.is_empty() {
            return mesh(&self.base);
        }

        self.variants
            .iter()
            .flat_map(|overrides| {
                let mut lists = self.base.clone();
                overrides.iter().for_each(|(key, values)| {
                    lists.insert(key.clone(), values.clone());
                });
                mesh(&lists)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn lists(value: Value) -> OptionLists {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn mesh_is_cartesian_product() {
        let lists = lists(json!({
            "model_type": ["original", "aug_dnls"],
            "ws": [8, 16, 32],
            "dset": ["te"],
        }));
        let configs = mesh(&lists);
        assert_eq!(configs.len(), 2 * 3 * 1);

        // last key varies fastest
        assert_eq!(configs[0]["model_type"], json!("original"));
        assert_eq!(configs[0]["ws"], json!(8));
        assert_eq!(configs[1]["ws"], json!(16));
        assert_eq!(configs[3]["model_type"], json!("aug_dnls"));

        let unique: std::collections::HashSet<_> =
            configs.iter().map(|config| Value::from(config.clone()).to_string()).collect();
        assert_eq!(unique.len(), configs.len());
        assert!(configs.iter().all(|config| config.len() == 3));
    }

    #[test]
    fn mesh_edge_cases() {
        assert_eq!(mesh(&OptionLists::new()), vec![ConfigMap::new()]);

        let lists = lists(json!({ "ws": [8, 16], "wt": [] }));
        assert!(mesh(&lists).is_empty());
    }

    #[test]
    fn variants_override_base() {
        let groups: MeshGroups = serde_json::from_value(json!({
            "base": {
                "model_type": ["aug_dnls", "product_dnls"],
                "ws": [8],
                "use_train": [false],
            },
            "variants": [
                { "model_type": ["original"], "ws": [-1] },
                {},
                { "use_train": [true], "model_type": ["product_dnls"] },
            ],
        }))
        .unwrap();

        let configs = groups.mesh();
        assert_eq!(configs.len(), 1 + 2 + 1);
        assert_eq!(configs[0]["model_type"], json!("original"));
        assert_eq!(configs[0]["ws"], json!(-1));
        assert_eq!(configs[1]["model_type"], json!("aug_dnls"));
        assert_eq!(configs[2]["model_type"], json!("product_dnls"));
        assert_eq!(configs[3]["use_train"], json!(true));
        assert_eq!(configs[3]["ws"], json!(8));
    }

    #[test]
    fn defaults_do_not_override() {
        let mut configs = mesh(&lists(json!({ "nframes": [4], "ws": [8, 16] })));
        let defaults = json!({ "nframes": 1, "sigma": 50.0 });
        append_defaults(&mut configs, defaults.as_object().unwrap());

        assert!(configs.iter().all(|config| config["nframes"] == json!(4)));
        assert!(configs.iter().all(|config| config["sigma"] == json!(50.0)));
    }
}
