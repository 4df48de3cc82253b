use candle_core::{
    DType,
    Device,
    Result,
    Tensor,
};

/// An Ornstein-Uhlenbeck process for temporally correlated exploration
/// noise on deterministic policies.
///
/// The state follows `x ← x + θ(μ − x)Δt + σ√Δt·𝒩(0, 1)` and starts at
/// zero when the process is created.
pub struct OuNoise {
    mu: f64,
    theta: f64,
    sigma: f64,
    dt: f64,
    state: Tensor,
}

impl OuNoise {
    pub fn new(
        mu: f64,
        theta: f64,
        sigma: f64,
        dt: f64,
        size_action: usize,
        device: &Device,
    ) -> Result<Self> {
        Ok(Self {
            mu,
            theta,
            sigma,
            dt,
            state: Tensor::zeros(size_action, DType::F64, device)?,
        })
    }

    pub fn sample(&mut self) -> Result<Tensor> {
        let rand = self.state.randn_like(0.0, 1.0)?;
        let dx = ((self.theta * self.dt * (self.mu - &self.state)?)?
            + (self.sigma * self.dt.sqrt() * rand)?)?;
        self.state = (&self.state + dx)?;
        Ok(self.state.clone())
    }

    pub fn reset(&mut self) -> Result<()> {
        self.state = self.state.zeros_like()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_persists_between_samples() {
        let mut noise = OuNoise::new(0.0, 0.15, 0.2, 1e-2, 3, &Device::Cpu).unwrap();
        let a = noise.sample().unwrap().to_vec1::<f64>().unwrap();
        let b = noise.sample().unwrap().to_vec1::<f64>().unwrap();
        assert_ne!(a, b);

        noise.reset().unwrap();
        let zeros = noise.state.to_vec1::<f64>().unwrap();
        assert_eq!(zeros, vec![0.0; 3]);
    }
}
