//! Stacked LSTM regressor with a linear read-out
//!
//! The read-out maps the last layer's final hidden state to the forecast
//! horizon. Dropout on the read-out input draws its masks from the model's
//! own seeded generator, so a training run is reproducible.

use crate::error::ForecastError;
use crate::nn::{
    CpuBackend, Mode, ModelParams, Optimizer, SequenceModel, StepOutput, TrainBackend,
};
use burn::backend::ndarray::NdArrayDevice;
use burn::config::Config;
use burn::module::{AutodiffModule, Module};
use burn::nn::loss::{MseLoss, Reduction};
use burn::nn::{Linear, LinearConfig, Lstm, LstmConfig};
use burn::optim::GradientsParams;
use burn::record::{BinFileRecorder, FullPrecisionSettings, Recorder};
use burn::tensor::backend::Backend;
use burn::tensor::{ElementConversion, Tensor, TensorData};
use ndarray::{Array2, ArrayView2, ArrayView3};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Bernoulli, Distribution};
use std::path::Path;
use std::sync::Mutex;

/// Held while the shared backend generator is seeded and drawn from
static INIT_LOCK: Mutex<()> = Mutex::new(());

type WeightRecorder = BinFileRecorder<FullPrecisionSettings>;

/// LSTM layers followed by a linear head
#[derive(Module, Debug)]
pub struct LstmNet<B: Backend> {
    layers: Vec<Lstm<B>>,
    head: Linear<B>,
}

/// Shape of an [`LstmNet`]
#[derive(Config, Debug)]
pub struct LstmNetConfig {
    pub input_size: usize,
    pub hidden_size: usize,
    pub num_layers: usize,
    pub output_size: usize,
}

impl LstmNetConfig {
    pub fn from_params(params: &ModelParams) -> Self {
        Self::new(
            params.input_size,
            params.hidden_size,
            params.num_layers,
            params.output_size,
        )
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> LstmNet<B> {
        let layers = (0..self.num_layers)
            .map(|l| {
                let input = if l == 0 {
                    self.input_size
                } else {
                    self.hidden_size
                };
                LstmConfig::new(input, self.hidden_size, true).init(device)
            })
            .collect();
        let head = LinearConfig::new(self.hidden_size, self.output_size).init(device);

        LstmNet { layers, head }
    }
}

impl<B: Backend> LstmNet<B> {
    /// `[batch, n_in, input]` to `[batch, output]`.
    ///
    /// `mask` multiplies the read-out input element-wise.
    pub fn forward(&self, input: Tensor<B, 3>, mask: Option<Tensor<B, 2>>) -> Tensor<B, 2> {
        let mut x = input;
        for layer in &self.layers {
            let (output, _state) = layer.forward(x, None);
            x = output;
        }

        let [batch, steps, hidden] = x.dims();
        let mut last = x
            .slice([0..batch, steps - 1..steps, 0..hidden])
            .reshape([batch, hidden]);
        if let Some(mask) = mask {
            last = last * mask;
        }
        self.head.forward(last)
    }
}

/// Stacked LSTM sequence regressor
#[derive(Debug, Clone)]
pub struct LstmModel {
    params: ModelParams,
    net: LstmNet<TrainBackend>,
    dropout: f64,
    mode: Mode,
    rng: StdRng,
    device: NdArrayDevice,
}

impl LstmModel {
    /// Create a model whose initial weights depend only on `seed`
    pub fn new(params: ModelParams, dropout: f64, seed: u64) -> crate::error::Result<Self> {
        params.validate()?;
        if !(0.0..1.0).contains(&dropout) {
            return Err(ForecastError::InvalidParameter(format!(
                "dropout must be in [0, 1), got {}",
                dropout
            )));
        }

        let device = NdArrayDevice::default();
        let net = init_net(&params, seed, &device)?;
        Ok(Self {
            params,
            net,
            dropout,
            mode: Mode::Eval,
            rng: StdRng::seed_from_u64(seed),
            device,
        })
    }

    /// Rebuild a model from weights written by [`Self::save_weights`]
    pub fn load_weights<P: AsRef<Path>>(params: ModelParams, path: P) -> crate::error::Result<Self> {
        let path = path.as_ref();
        let mut model = Self::new(params, 0.0, 0)?;

        let record = <WeightRecorder as Recorder<TrainBackend>>::load(
            &WeightRecorder::new(),
            path.to_path_buf(),
            &model.device,
        )
        .map_err(|e| {
            ForecastError::SchemaMismatch(format!(
                "cannot read weights from {}: {:?}",
                path.display(),
                e
            ))
        })?;

        let expected = model.net.num_params();
        let net = model.net.clone().load_record(record);
        if net.num_params() != expected {
            return Err(ForecastError::SchemaMismatch(format!(
                "{} holds {} weights, the architecture has {}",
                path.display(),
                net.num_params(),
                expected
            )));
        }
        model.net = net;
        Ok(model)
    }

    /// Write the learned weights to `path` at full precision
    pub fn save_weights<P: AsRef<Path>>(&self, path: P) -> crate::error::Result<()> {
        let path = path.as_ref();
        <WeightRecorder as Recorder<TrainBackend>>::record(
            &WeightRecorder::new(),
            self.net.clone().into_record(),
            path.to_path_buf(),
        )
        .map_err(|e| {
            ForecastError::TrainingError(format!(
                "cannot write weights to {}: {:?}",
                path.display(),
                e
            ))
        })?;
        Ok(())
    }

    /// The burn network
    pub fn net(&self) -> &LstmNet<TrainBackend> {
        &self.net
    }

    /// Dropout rate applied to the read-out input while training
    pub fn dropout(&self) -> f64 {
        self.dropout
    }

    fn input_tensor<B: Backend>(
        &self,
        inputs: ArrayView3<'_, f64>,
        device: &B::Device,
    ) -> crate::error::Result<Tensor<B, 3>> {
        let (batch, steps, features) = inputs.dim();
        if features != self.params.input_size {
            return Err(ForecastError::SchemaMismatch(format!(
                "model expects {} features per step, got {}",
                self.params.input_size, features
            )));
        }
        if batch == 0 || steps == 0 {
            return Err(ForecastError::EmptySplit(
                "forward pass over an empty batch".to_string(),
            ));
        }

        let values: Vec<f32> = inputs.iter().map(|&v| v as f32).collect();
        Ok(Tensor::from_data(
            TensorData::new(values, [batch, steps, features]),
            device,
        ))
    }

    fn dropout_mask(&mut self, batch: usize) -> crate::error::Result<Option<Tensor<TrainBackend, 2>>> {
        if self.mode != Mode::Train || self.dropout == 0.0 {
            return Ok(None);
        }

        let keep = Bernoulli::new(1.0 - self.dropout)
            .map_err(|e| ForecastError::InvalidParameter(e.to_string()))?;
        let scale = (1.0 / (1.0 - self.dropout)) as f32;
        let hidden = self.params.hidden_size;
        let values: Vec<f32> = (0..batch * hidden)
            .map(|_| if keep.sample(&mut self.rng) { scale } else { 0.0 })
            .collect();

        Ok(Some(Tensor::from_data(
            TensorData::new(values, [batch, hidden]),
            &self.device,
        )))
    }
}

impl SequenceModel for LstmModel {
    type Net = LstmNet<TrainBackend>;

    fn params(&self) -> &ModelParams {
        &self.params
    }

    fn forward(&mut self, inputs: ArrayView3<'_, f64>) -> crate::error::Result<Array2<f64>> {
        match self.mode {
            Mode::Eval => {
                let x = self.input_tensor::<CpuBackend>(inputs, &self.device)?;
                to_array(self.net.valid().forward(x, None))
            }
            Mode::Train => {
                let x = self.input_tensor::<TrainBackend>(inputs, &self.device)?;
                let mask = self.dropout_mask(inputs.dim().0)?;
                to_array(self.net.forward(x, mask))
            }
        }
    }

    fn step(
        &mut self,
        inputs: ArrayView3<'_, f64>,
        targets: ArrayView2<'_, f64>,
        optimizer: &mut dyn Optimizer<Self::Net>,
    ) -> crate::error::Result<StepOutput> {
        let batch = inputs.dim().0;
        if targets.dim() != (batch, self.params.output_size) {
            return Err(ForecastError::SchemaMismatch(format!(
                "targets of shape {:?} for a batch of {} with horizon {}",
                targets.shape(),
                batch,
                self.params.output_size
            )));
        }

        let x = self.input_tensor::<TrainBackend>(inputs, &self.device)?;
        let y = Tensor::<TrainBackend, 2>::from_data(
            TensorData::new(
                targets.iter().map(|&v| v as f32).collect::<Vec<_>>(),
                [batch, self.params.output_size],
            ),
            &self.device,
        );
        let mask = self.dropout_mask(batch)?;

        let output = self.net.forward(x, mask);
        let loss = MseLoss::new().forward(output.clone(), y, Reduction::Mean);
        let value = loss.clone().into_scalar().elem::<f64>();
        if !value.is_finite() {
            return Err(ForecastError::NumericalInstability(format!(
                "training loss became {}",
                value
            )));
        }
        let predictions = to_array(output)?;

        let grads = GradientsParams::from_grads(loss.backward(), &self.net);
        self.net = optimizer.step(self.net.clone(), grads);

        Ok(StepOutput {
            loss: value,
            predictions,
        })
    }

    fn set_mode(&mut self, mode: Mode) {
        self.mode = mode;
    }

    fn mode(&self) -> Mode {
        self.mode
    }
}

fn init_net(
    params: &ModelParams,
    seed: u64,
    device: &NdArrayDevice,
) -> crate::error::Result<LstmNet<TrainBackend>> {
    let _guard = INIT_LOCK.lock().map_err(|_| {
        ForecastError::TrainingError("weight initialisation lock poisoned".to_string())
    })?;
    TrainBackend::seed(seed);
    Ok(LstmNetConfig::from_params(params).init(device))
}

fn to_array<B: Backend>(output: Tensor<B, 2>) -> crate::error::Result<Array2<f64>> {
    let [rows, cols] = output.dims();
    let values = output
        .into_data()
        .to_vec::<f32>()
        .map_err(|e| ForecastError::TrainingError(format!("unreadable model output: {:?}", e)))?;
    Ok(Array2::from_shape_vec(
        (rows, cols),
        values.into_iter().map(f64::from).collect(),
    )?)
}
