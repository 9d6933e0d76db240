//! The deblurring benchmark program.

pub mod common;
pub mod config;
pub mod dataset;
pub mod experiment;
pub mod flow;
pub mod io;
pub mod metrics;
pub mod model;
pub mod report;
pub mod runner;
pub mod timer;

pub use runner::run_exp;

use crate::{
    common::*,
    config::Config,
    experiment::{ExpConfig, ExpResults},
};

/// The entry of the benchmark program.
///
/// Every meshed experiment is either loaded from the cache or evaluated and
/// saved. The cached records of all experiments are then summarized.
pub async fn start(config: Arc<Config>, clear_cache: bool) -> Result<()> {
    info!("process id {}", std::process::id());

    let exps = experiment::mesh_experiments(&config.experiments, &config.defaults)?;
    info!("{} experiments to run", exps.len());

    let cache = ExpCache::new(&config.cache.dir, &config.cache.name).await?;
    info!("use experiment cache at {}", cache.dir().display());
    if clear_cache || config.cache.clear_all {
        warn!("clear all cached experiments");
        cache.clear().await?;
    }

    for (index, exp) in exps.iter().enumerate() {
        let uuid = cache.uuid(exp)?;
        info!(
            "[{}/{}] experiment {}: {} on video {} (use_train={}, flow={})",
            index + 1,
            exps.len(),
            uuid,
            exp.model_type.name(),
            exp.vid_name,
            exp.use_train,
            exp.flow
        );

        if config.cache.refresh_trained && exp.use_train {
            cache.clear_exp(&uuid).await?;
        }

        let cached: Option<ExpResults> = cache.load_exp(exp).await?;
        if let Some(cached) = cached {
            info!("load {} samples from cache", cached.num_samples());
            continue;
        }

        let results = {
            let config = config.clone();
            let exp = exp.clone();
            tokio::task::spawn_blocking(move || run_exp(&config, &exp))
                .map(|result| Fallible::Ok(result??))
                .instrument(info_span!("run_exp", %uuid))
                .await?
        };
        cache.save_exp(&uuid, exp, &results).await?;
    }

    let records: Vec<Record<ExpConfig, ExpResults>> = cache.load_records(&exps).await?;
    let rows = report::flatten_records(&records);
    let summaries = report::summarize(&rows);
    report::log_summaries(&summaries);
    report::write_csv(&config.report.csv_file, &summaries)?;
    info!("report saved to {}", config.report.csv_file.display());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(dir: &Path, refresh_trained: bool) -> Result<Config> {
        let text = format!(
            r#"{{
                version: "0.1.0",
                cache: {{ dir: "{dir}/cache", name: "gopro bench", refresh_trained: {refresh} }},
                datasets: {{ gopro: {{ type: "GoPro", dataset_dir: "{dir}/data" }} }},
                model: {{
                    weights_dir: "{dir}/weights",
                    checkpoint_dir: "{dir}/checkpoints",
                    load_checkpoint: {{ type: "Disabled" }},
                }},
                experiments: {{
                    base: {{
                        dname: ["gopro"],
                        dset: ["te"],
                        vid_name: ["00"],
                        model_type: ["original", "aug_dnls"],
                        use_train: ["false", "true"],
                    }},
                }},
                defaults: {{ device: "cpu", saved_dir: "{dir}/saved" }},
                report: {{ csv_file: "{dir}/report.csv" }},
            }}"#,
            dir = dir.display(),
            refresh = refresh_trained,
        );
        Ok(json5::from_str(&text)?)
    }

    async fn fill_cache(config: &Config) -> Result<()> {
        let exps = experiment::mesh_experiments(&config.experiments, &config.defaults)?;
        let cache = ExpCache::new(&config.cache.dir, &config.cache.name).await?;

        for exp in &exps {
            let results = ExpResults {
                psnrs: vec![vec![30.0]],
                ssims: vec![vec![0.9]],
                noisy_psnrs: vec![vec![25.0]],
                noisy_ssims: vec![vec![0.8]],
                deno_fns: vec![vec![]],
                vid_frames: vec![vec![0]],
                vid_name: vec![exp.vid_name.clone()],
                timer_flow: vec![0.0],
                timer_deno: vec![0.5],
            };
            cache.save_exp(&cache.uuid(exp)?, exp, &results).await?;
        }
        Ok(())
    }

    #[tokio::test]
    async fn report_cached_experiments() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let config = Arc::new(config(dir.path(), false)?);
        fill_cache(&config).await?;

        start(config.clone(), false).await?;

        let text = fs::read_to_string(&config.report.csv_file)?;
        assert_eq!(text.lines().count(), 1 + 4);
        assert!(text.contains("aug_dnls,true,1,00,1,30.0,"));
        Ok(())
    }

    #[tokio::test]
    async fn clear_cache_drops_every_slot() -> Result<()> {
        async fn cached_count(config: &Config) -> Result<usize> {
            let exps = experiment::mesh_experiments(&config.experiments, &config.defaults)?;
            let cache = ExpCache::new(&config.cache.dir, &config.cache.name).await?;
            let records: Vec<Record<ExpConfig, ExpResults>> = cache.load_records(&exps).await?;
            Ok(records.len())
        }

        // by the command line flag
        let dir = tempfile::tempdir()?;
        let config = Arc::new(config(dir.path(), false)?);
        fill_cache(&config).await?;
        assert_eq!(cached_count(&config).await?, 4);

        // the rerun fails for lack of a dataset
        assert!(start(config.clone(), true).await.is_err());
        assert_eq!(cached_count(&config).await?, 0);
        assert!(!config.report.csv_file.exists());

        // by the configuration
        let dir = tempfile::tempdir()?;
        let mut config = self::config(dir.path(), false)?;
        config.cache.clear_all = true;
        let config = Arc::new(config);
        fill_cache(&config).await?;

        assert!(start(config.clone(), false).await.is_err());
        assert_eq!(cached_count(&config).await?, 0);
        Ok(())
    }

    #[tokio::test]
    async fn refresh_reruns_trained_experiments() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let config = Arc::new(config(dir.path(), true)?);
        fill_cache(&config).await?;

        // the rerun fails for lack of a dataset
        assert!(start(config.clone(), false).await.is_err());
        assert!(!config.report.csv_file.exists());
        Ok(())
    }
}
