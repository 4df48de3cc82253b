use {
    candle_core::{
        DType,
        Device,
        Module,
        Result,
        Tensor,
        Var,
    },
    candle_nn::{
        func,
        linear,
        sequential::seq,
        Activation,
        Sequential,
        VarBuilder,
        VarMap,
    },
    std::path::Path,
};

/// The output activation of a network role.
pub enum Head {
    /// Raw outputs: logits, values, Q-values.
    Linear,
    /// Bounded outputs in [-1, 1]: deterministic actions and Gaussian means.
    Tanh,
}

/// A fully-connected network with its own parameter store.
///
/// Every layer is registered under a stable `fc{i}` name, so two `Mlp`s
/// built from the same dimensions expose their parameters in the same
/// order — target networks pair with their online copies positionally.
pub struct Mlp {
    varmap: VarMap,
    network: Sequential,
}

impl Mlp {
    pub fn new(
        device: &Device,
        dims: &[(usize, usize)],
        head: Head,
    ) -> Result<Self> {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F64, device);

        let mut network = seq();
        for (i, &(in_dim, out_dim)) in dims.iter().enumerate() {
            network = network.add(linear(in_dim, out_dim, vb.pp(format!("fc{i}")))?);
            if i + 1 < dims.len() {
                network = network.add(Activation::Relu);
            }
        }
        if let Head::Tanh = head {
            network = network.add(func(|xs| xs.tanh()));
        }

        Ok(Self { varmap, network })
    }

    pub fn forward(
        &self,
        xs: &Tensor,
    ) -> Result<Tensor> {
        self.network.forward(xs)
    }

    /// All trainable parameters, sorted by name.
    pub fn vars(&self) -> Vec<Var> {
        let data = self.varmap.data().lock().unwrap();
        let mut named = data
            .iter()
            .map(|(name, var)| (name.clone(), var.clone()))
            .collect::<Vec<_>>();
        named.sort_by(|a, b| a.0.cmp(&b.0));
        named.into_iter().map(|(_, var)| var).collect()
    }

    pub fn save(
        &self,
        path: &Path,
    ) -> Result<()> {
        self.varmap.save(path)
    }

    pub fn load(
        &mut self,
        path: &Path,
    ) -> Result<()> {
        self.varmap.load(path)
    }
}

/// A state-action value network: Q(s, a) over the concatenation of the
/// observation features and the action.
pub struct QNetwork {
    mlp: Mlp,
}

impl QNetwork {
    pub fn forward(
        &self,
        features: &Tensor,
        action: &Tensor,
    ) -> Result<Tensor> {
        let xs = Tensor::cat(&[features, action], 1)?;
        self.mlp.forward(&xs)
    }

    pub fn vars(&self) -> Vec<Var> {
        self.mlp.vars()
    }

    pub fn save(
        &self,
        path: &Path,
    ) -> Result<()> {
        self.mlp.save(path)
    }

    pub fn load(
        &mut self,
        path: &Path,
    ) -> Result<()> {
        self.mlp.load(path)
    }
}

/// Deterministic action / Gaussian mean head, bounded to [-1, 1].
pub fn actor_continuous(
    device: &Device,
    in_dim: usize,
    hidden: (usize, usize),
    out_dim: usize,
) -> Result<Mlp> {
    Mlp::new(
        device,
        &[(in_dim, hidden.0), (hidden.0, hidden.1), (hidden.1, out_dim)],
        Head::Tanh,
    )
}

/// Categorical logits head.
pub fn actor_logits(
    device: &Device,
    in_dim: usize,
    hidden: (usize, usize),
    out_dim: usize,
) -> Result<Mlp> {
    Mlp::new(
        device,
        &[(in_dim, hidden.0), (hidden.0, hidden.1), (hidden.1, out_dim)],
        Head::Linear,
    )
}

/// State-value head V(s).
pub fn critic_v(
    device: &Device,
    in_dim: usize,
    hidden: (usize, usize),
) -> Result<Mlp> {
    Mlp::new(
        device,
        &[(in_dim, hidden.0), (hidden.0, hidden.1), (hidden.1, 1)],
        Head::Linear,
    )
}

/// Q(s, a) head over concatenated features and action.
pub fn critic_q(
    device: &Device,
    in_dim: usize,
    action_dim: usize,
    hidden: (usize, usize),
) -> Result<QNetwork> {
    Ok(QNetwork {
        mlp: Mlp::new(
            device,
            &[
                (in_dim + action_dim, hidden.0),
                (hidden.0, hidden.1),
                (hidden.1, 1),
            ],
            Head::Linear,
        )?,
    })
}

/// Q(s, ·) head over every discrete action at once.
pub fn critic_q_all(
    device: &Device,
    in_dim: usize,
    hidden: (usize, usize),
    action_count: usize,
) -> Result<Mlp> {
    Mlp::new(
        device,
        &[
            (in_dim, hidden.0),
            (hidden.0, hidden.1),
            (hidden.1, action_count),
        ],
        Head::Linear,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_shapes_match_the_role() {
        let device = Device::Cpu;
        let xs = Tensor::zeros((5, 3), DType::F64, &device).unwrap();

        let actor = actor_continuous(&device, 3, (8, 8), 2).unwrap();
        assert_eq!(actor.forward(&xs).unwrap().dims(), &[5, 2]);

        let v = critic_v(&device, 3, (8, 8)).unwrap();
        assert_eq!(v.forward(&xs).unwrap().dims(), &[5, 1]);

        let q_all = critic_q_all(&device, 3, (8, 8), 4).unwrap();
        assert_eq!(q_all.forward(&xs).unwrap().dims(), &[5, 4]);

        let action = Tensor::zeros((5, 2), DType::F64, &device).unwrap();
        let q = critic_q(&device, 3, 2, (8, 8)).unwrap();
        assert_eq!(q.forward(&xs, &action).unwrap().dims(), &[5, 1]);
    }

    #[test]
    fn twin_networks_expose_parameters_in_the_same_order() {
        let device = Device::Cpu;
        let a = actor_continuous(&device, 3, (8, 8), 2).unwrap();
        let b = actor_continuous(&device, 3, (8, 8), 2).unwrap();
        let dims_a: Vec<_> = a.vars().iter().map(|v| v.dims().to_vec()).collect();
        let dims_b: Vec<_> = b.vars().iter().map(|v| v.dims().to_vec()).collect();
        assert_eq!(dims_a, dims_b);
    }
}
