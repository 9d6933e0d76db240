//! Optical flow estimation.

use crate::{common::*, config::FlowConfig};

/// Forward and backward optical flows of a frame batch, each `T×2×H×W`.
#[derive(Debug)]
pub struct Flows {
    pub forward: Tensor,
    pub backward: Tensor,
}

impl Flows {
    /// Zero flows for `T×C×H×W` frames.
    pub fn zeros_like(frames: &Tensor) -> Result<Self> {
        let (t, _c, h, w) = frames.size4()?;
        let options = (frames.kind(), frames.device());
        Ok(Self {
            forward: Tensor::f_zeros(&[t, 2, h, w], options)?,
            backward: Tensor::f_zeros(&[t, 2, h, w], options)?,
        })
    }

    pub fn nframes(&self) -> Result<i64> {
        let (t, _c, _h, _w) = self.forward.size4()?;
        Ok(t)
    }

    /// The flows of frames in `range`.
    pub fn narrow(&self, range: Range<i64>) -> Result<Self> {
        let len = range.end - range.start;
        Ok(Self {
            forward: self.forward.f_narrow(0, range.start, len)?,
            backward: self.backward.f_narrow(0, range.start, len)?,
        })
    }

    /// Applies `f` to both flows.
    pub fn try_map<F>(&self, mut f: F) -> Result<Self>
    where
        F: FnMut(&Tensor) -> Result<Tensor>,
    {
        Ok(Self {
            forward: f(&self.forward)?,
            backward: f(&self.backward)?,
        })
    }

    pub fn to_ivalue(&self) -> IValue {
        IValue::Tuple(vec![
            IValue::Tensor(self.forward.shallow_clone()),
            IValue::Tensor(self.backward.shallow_clone()),
        ])
    }
}

/// Computes optical flows of a frame batch.
pub trait FlowEstimator
where
    Self: Debug,
{
    /// Takes `T×3×H×W` frames in `[0, 255]` and the noise level of the input.
    fn compute_flow(&self, frames: &Tensor, sigma: f64) -> Result<Flows>;
}

/// A TorchScript flow module.
///
/// Its forward method takes `(frames, sigma)` and returns a
/// `(forward, backward)` tuple.
#[derive(Debug)]
pub struct ScriptedFlow {
    module: CModule,
}

impl ScriptedFlow {
    pub fn load(config: &FlowConfig, device: Device) -> Result<Self> {
        let FlowConfig { script_file } = config;
        let mut module = CModule::load_on_device(script_file, device).with_context(|| {
            format!("failed to load flow module {}", script_file.display())
        })?;
        module.set_eval();
        info!("loaded flow module {}", script_file.display());
        Ok(Self { module })
    }
}

impl FlowEstimator for ScriptedFlow {
    fn compute_flow(&self, frames: &Tensor, sigma: f64) -> Result<Flows> {
        let output = tch::no_grad(|| {
            self.module.forward_is(&[
                IValue::Tensor(frames.shallow_clone()),
                IValue::Double(sigma),
            ])
        })?;

        let values = match output {
            IValue::Tuple(values) | IValue::GenericList(values) => values,
            _ => bail!("the flow module must return a pair of tensors"),
        };
        let flows = match <[IValue; 2]>::try_from(values) {
            Ok([IValue::Tensor(forward), IValue::Tensor(backward)]) => Flows { forward, backward },
            _ => bail!("the flow module must return a pair of tensors"),
        };

        let (t, _c, h, w) = frames.size4()?;
        for flow in [&flows.forward, &flows.backward] {
            ensure!(
                flow.size() == [t, 2, h, w],
                "expect flows of shape {:?}, but get {:?}",
                [t, 2, h, w],
                flow.size()
            );
        }

        Ok(flows)
    }
}
