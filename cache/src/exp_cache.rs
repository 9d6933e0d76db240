//! The on-disk experiment cache.

use crate::{common::*, key};
use async_std::{
    fs::{self, File},
    io::BufWriter,
};

const CONFIG_FILE: &str = "config.json";
const RESULTS_FILE: &str = "results.json";

/// A cached experiment with its key, configuration and results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record<C, R> {
    pub uuid: Uuid,
    pub config: C,
    pub results: R,
}

/// Stores experiment results on disk, one slot per configuration key.
///
/// The slot of a configuration lives in `<dir>/<name>/<uuid>/` and holds the
/// configuration and the results as JSON files.
#[derive(Debug, Clone)]
pub struct ExpCache {
    cache_dir: PathBuf,
}

impl ExpCache {
    /// Opens the named cache under `dir`, creating the directories if needed.
    pub async fn new(dir: impl AsRef<Path>, name: &str) -> Result<Self> {
        ensure!(!name.is_empty(), "cache name must not be empty");

        let encoded_name =
            percent_encoding::utf8_percent_encode(name, NON_ALPHANUMERIC).to_string();
        let cache_dir = dir.as_ref().join(encoded_name);
        fs::create_dir_all(async_path(&cache_dir))
            .await
            .with_context(|| format!("failed to create cache dir {}", cache_dir.display()))?;

        Ok(Self { cache_dir })
    }

    /// The directory holding the slots of this cache.
    pub fn dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Computes the key of a configuration.
    pub fn uuid<C>(&self, config: &C) -> Result<Uuid>
    where
        C: Serialize,
    {
        key::config_uuid(config)
    }

    fn slot_dir(&self, uuid: &Uuid) -> PathBuf {
        self.cache_dir.join(uuid.to_string())
    }

    /// Loads the results of a configuration, or `None` if it was never saved.
    pub async fn load_exp<C, R>(&self, config: &C) -> Result<Option<R>>
    where
        C: Serialize,
        R: DeserializeOwned,
    {
        let uuid = self.uuid(config)?;
        let slot_dir = self.slot_dir(&uuid);
        let config_path = slot_dir.join(CONFIG_FILE);
        let results_path = slot_dir.join(RESULTS_FILE);

        let is_complete = async_path(&config_path).is_file().await
            && async_path(&results_path).is_file().await;
        if !is_complete {
            return Ok(None);
        }

        // the stored configuration must be the queried one
        let stored_config: Value = {
            let text = fs::read_to_string(async_path(&config_path)).await?;
            serde_json::from_str(&text)
                .with_context(|| format!("failed to parse {}", config_path.display()))?
        };
        if key::canonical_json(&stored_config)? != key::canonical_json(config)? {
            warn!(
                "configuration mismatch in cache slot {}, treating it as a miss",
                slot_dir.display()
            );
            return Ok(None);
        }

        let text = fs::read_to_string(async_path(&results_path)).await?;
        let results = serde_json::from_str(&text)
            .with_context(|| format!("failed to parse {}", results_path.display()))?;
        Ok(Some(results))
    }

    /// Saves the configuration and its results into the slot of `uuid`.
    pub async fn save_exp<C, R>(&self, uuid: &Uuid, config: &C, results: &R) -> Result<()>
    where
        C: Serialize,
        R: Serialize,
    {
        let slot_dir = self.slot_dir(uuid);
        fs::create_dir_all(async_path(&slot_dir)).await?;

        // results go last so that an interrupted write is a cache miss
        write_json(&slot_dir.join(CONFIG_FILE), config).await?;
        write_json(&slot_dir.join(RESULTS_FILE), results).await?;

        info!("saved experiment {} to cache", uuid);
        Ok(())
    }

    /// Removes the slot of `uuid`. Missing slots are ignored.
    pub async fn clear_exp(&self, uuid: &Uuid) -> Result<()> {
        let slot_dir = self.slot_dir(uuid);
        if async_path(&slot_dir).is_dir().await {
            fs::remove_dir_all(async_path(&slot_dir))
                .await
                .with_context(|| format!("failed to remove {}", slot_dir.display()))?;
            info!("cleared experiment {} from cache", uuid);
        }
        Ok(())
    }

    /// Removes every slot of the cache.
    pub async fn clear(&self) -> Result<()> {
        let cache_dir = async_path(&self.cache_dir);
        if cache_dir.is_dir().await {
            fs::remove_dir_all(cache_dir).await?;
        }
        fs::create_dir_all(cache_dir).await?;
        info!("cleared cache {}", self.cache_dir.display());
        Ok(())
    }

    /// Loads the records of the cached configurations in query order.
    ///
    /// Configurations without results are skipped.
    pub async fn load_records<C, R>(&self, configs: &[C]) -> Result<Vec<Record<C, R>>>
    where
        C: Serialize + Clone,
        R: DeserializeOwned,
    {
        let mut records = vec![];

        for config in configs {
            let uuid = self.uuid(config)?;
            if let Some(results) = self.load_exp(config).await? {
                records.push(Record {
                    uuid,
                    config: config.clone(),
                    results,
                });
            }
        }

        Ok(records)
    }
}

fn async_path(path: &Path) -> &async_std::path::Path {
    async_std::path::Path::new(path.as_os_str())
}

async fn write_json<T>(path: &Path, value: &T) -> Result<()>
where
    T: Serialize + ?Sized,
{
    let text = serde_json::to_string_pretty(value)?;
    let mut writer = BufWriter::new(File::create(async_path(path)).await?);
    writer.write_all(text.as_bytes()).await?;
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Config {
        vid_name: String,
        ws: i64,
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Results {
        psnrs: Vec<Vec<f64>>,
    }

    fn config(vid_name: &str, ws: i64) -> Config {
        Config {
            vid_name: vid_name.into(),
            ws,
        }
    }

    #[async_std::test]
    async fn save_then_load() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let cache = ExpCache::new(dir.path(), "gopro bench").await?;
        let config = config("01", 8);
        let results = Results {
            psnrs: vec![vec![30.5, 31.25]],
        };

        assert_eq!(cache.load_exp::<_, Results>(&config).await?, None);

        let uuid = cache.uuid(&config)?;
        cache.save_exp(&uuid, &config, &results).await?;
        assert_eq!(cache.load_exp(&config).await?, Some(results.clone()));

        // reopening sees the same slot
        let reopened = ExpCache::new(dir.path(), "gopro bench").await?;
        assert_eq!(reopened.load_exp(&config).await?, Some(results));
        assert!(reopened.dir().ends_with("gopro%20bench"));
        Ok(())
    }

    #[async_std::test]
    async fn clear_slots() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let cache = ExpCache::new(dir.path(), "bench").await?;
        let results = Results { psnrs: vec![] };
        let lhs = config("01", 8);
        let rhs = config("02", 8);

        cache.save_exp(&cache.uuid(&lhs)?, &lhs, &results).await?;
        cache.save_exp(&cache.uuid(&rhs)?, &rhs, &results).await?;

        cache.clear_exp(&cache.uuid(&lhs)?).await?;
        cache.clear_exp(&cache.uuid(&lhs)?).await?;
        assert_eq!(cache.load_exp::<_, Results>(&lhs).await?, None);
        assert_eq!(cache.load_exp(&rhs).await?, Some(results));

        cache.clear().await?;
        assert_eq!(cache.load_exp::<_, Results>(&rhs).await?, None);
        assert!(cache.dir().is_dir());
        Ok(())
    }

    #[async_std::test]
    async fn mismatched_slot_is_a_miss() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let cache = ExpCache::new(dir.path(), "bench").await?;
        let config = config("01", 8);
        let other = self::config("01", 16);
        let results = Results { psnrs: vec![] };

        // store another configuration under the key of `config`
        cache.save_exp(&cache.uuid(&config)?, &other, &results).await?;
        assert_eq!(cache.load_exp::<_, Results>(&config).await?, None);
        Ok(())
    }

    #[async_std::test]
    async fn slot_without_results_is_a_miss() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let cache = ExpCache::new(dir.path(), "bench").await?;
        let config = config("01", 8);
        let uuid = cache.uuid(&config)?;
        let results = Results {
            psnrs: vec![vec![30.0]],
        };

        // an interrupted save leaves the configuration only
        cache.save_exp(&uuid, &config, &results).await?;
        std::fs::remove_file(cache.dir().join(uuid.to_string()).join(RESULTS_FILE))?;
        assert_eq!(cache.load_exp::<_, Results>(&config).await?, None);

        let records: Vec<Record<Config, Results>> = cache.load_records(&[config]).await?;
        assert!(records.is_empty());
        Ok(())
    }

    #[async_std::test]
    async fn float_configs_hit_after_reload() -> Result<()> {
        #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
        struct NoisyConfig {
            vid_name: String,
            sigma: f64,
        }

        let dir = tempfile::tempdir()?;
        let cache = ExpCache::new(dir.path(), "bench").await?;
        let results = Results { psnrs: vec![] };
        let sigmas = [
            39.430133835633676,
            18.233521453552402,
            98.56906946328695,
            21.291890726713458,
            0.1,
            50.0,
        ];

        for &sigma in &sigmas {
            let config = NoisyConfig {
                vid_name: "01".into(),
                sigma,
            };
            cache.save_exp(&cache.uuid(&config)?, &config, &results).await?;

            let reopened = ExpCache::new(dir.path(), "bench").await?;
            assert_eq!(
                reopened.load_exp(&config).await?,
                Some(results.clone()),
                "sigma {} missed",
                sigma
            );
        }
        Ok(())
    }

    #[async_std::test]
    async fn records_follow_query_order() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let cache = ExpCache::new(dir.path(), "bench").await?;
        let configs = vec![config("01", 8), config("02", 8), config("03", 8)];

        for (index, config) in configs.iter().enumerate() {
            if index == 1 {
                continue;
            }
            let results = Results {
                psnrs: vec![vec![index as f64]],
            };
            cache.save_exp(&cache.uuid(config)?, config, &results).await?;
        }

        let records: Vec<Record<Config, Results>> = cache.load_records(&configs).await?;
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].config, configs[0]);
        assert_eq!(records[1].config, configs[2]);
        assert_eq!(records[1].results.psnrs, vec![vec![2.0]]);
        assert_eq!(records[1].uuid, cache.uuid(&configs[2])?);
        Ok(())
    }
}
