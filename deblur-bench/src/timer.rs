//! Named wall-clock sections of an experiment.

use crate::common::*;

#[derive(Debug, Clone, Default)]
struct Section {
    started: Option<Instant>,
    elapsed: Duration,
}

/// Accumulates the time spent in named sections.
///
/// Sections are reported in the order they were first started. Starting a
/// section again adds to its total.
#[derive(Debug, Clone, Default)]
pub struct ExpTimer {
    sections: IndexMap<String, Section>,
}

impl ExpTimer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&mut self, name: &str) {
        let section = self.sections.entry(name.to_string()).or_default();
        if section.started.is_some() {
            warn!("timer section '{}' is restarted before stopped", name);
        }
        section.started = Some(Instant::now());
    }

    pub fn stop(&mut self, name: &str) -> Result<Duration> {
        let section = self
            .sections
            .get_mut(name)
            .ok_or_else(|| format_err!("timer section '{}' is not started", name))?;
        let started = section
            .started
            .take()
            .ok_or_else(|| format_err!("timer section '{}' is already stopped", name))?;
        let elapsed = started.elapsed();
        section.elapsed += elapsed;
        Ok(elapsed)
    }

    /// Runs `f` inside the named section.
    pub fn time<T, F>(&mut self, name: &str, f: F) -> Result<T>
    where
        F: FnOnce() -> Result<T>,
    {
        self.start(name);
        let output = f();
        self.stop(name)?;
        output
    }

    /// The accumulated seconds of a section.
    pub fn seconds(&self, name: &str) -> Option<f64> {
        self.sections
            .get(name)
            .map(|section| section.elapsed.as_secs_f64())
    }

    pub fn items(&self) -> impl Iterator<Item = (&str, f64)> + '_ {
        self.sections
            .iter()
            .map(|(name, section)| (name.as_str(), section.elapsed.as_secs_f64()))
    }

    pub fn report(&self) {
        let text = self
            .items()
            .map(|(name, secs)| format!("{}: {:.3}s", name, secs))
            .join(", ");
        debug!("timing: {}", text);
    }
}

/// Waits for the kernels producing `tensor` so that timings cover the device work.
///
/// CUDA tensors are reduced and read back to the host, which blocks until the
/// queued work is done.
pub fn sync_tensor(tensor: &Tensor) -> Result<()> {
    if let Device::Cuda(_) = tensor.device() {
        tensor.f_sum(Kind::Double)?.f_double_value(&[])?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sections_in_start_order() -> Result<()> {
        let mut timer = ExpTimer::new();
        timer.start("flow");
        std::thread::sleep(Duration::from_millis(5));
        timer.stop("flow")?;

        let value = timer.time("deno", || Ok(1 + 1))?;
        assert_eq!(value, 2);

        timer.start("flow");
        timer.stop("flow")?;

        let names: Vec<_> = timer.items().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["flow", "deno"]);
        assert!(timer.seconds("flow").unwrap() >= 0.005);
        assert!(timer.seconds("load").is_none());
        Ok(())
    }

    #[test]
    fn stop_requires_start() {
        let mut timer = ExpTimer::new();
        assert!(timer.stop("deno").is_err());

        timer.start("deno");
        assert!(timer.stop("deno").is_ok());
        assert!(timer.stop("deno").is_err());
    }

    #[test]
    fn sync_tensor_on_devices() -> Result<()> {
        let tensor = Tensor::ones(&[2, 3], FLOAT_CPU);
        sync_tensor(&tensor)?;

        if tch::Cuda::is_available() {
            let tensor = tensor.to_device(Device::Cuda(0)) * 2.0;
            let mut timer = ExpTimer::new();
            timer.time("deno", || sync_tensor(&tensor))?;
            assert!(timer.seconds("deno").is_some());
        }
        Ok(())
    }

    #[test]
    fn failed_section_is_stopped() {
        let mut timer = ExpTimer::new();
        let result: Result<()> = timer.time("deno", || bail!("out of memory"));
        assert!(result.is_err());
        assert!(timer.stop("deno").is_err());
    }
}
