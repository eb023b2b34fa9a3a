//! Command line entry point: train, baseline and predict

use clap::{Args, Parser, Subcommand};
use seq_forecast::{
    BaselineModel, ConfigUpdate, DropIncomplete, Imputer, PredictionInput, Result, Table,
    TrainConfig, Trainer,
};
use std::io;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "seq-forecast", version, about = "Train and evaluate short-horizon forecasters")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Train the sequence model and print its report as JSON
    Train(TrainArgs),
    /// Fit the ARIMA baseline and print its report as JSON
    Baseline(BaselineArgs),
    /// Forecast from the freshest rows of a CSV with a stored model
    Predict(PredictArgs),
}

/// Options shared by commands that read a training configuration
#[derive(Args, Debug)]
struct ConfigArgs {
    /// JSON document with configuration overrides
    #[arg(long)]
    config: Option<PathBuf>,

    /// Input rows per window
    #[arg(long)]
    n_in: Option<usize>,

    /// Forecast horizon
    #[arg(long)]
    n_out: Option<usize>,

    /// Hidden state width
    #[arg(long)]
    hidden_size: Option<usize>,

    /// Stacked recurrent layers
    #[arg(long)]
    num_layers: Option<usize>,
}

impl ConfigArgs {
    fn load(&self) -> Result<TrainConfig> {
        let config = match &self.config {
            Some(path) => TrainConfig::from_json_file(path)?,
            None => TrainConfig::default(),
        };
        let config = config.merged(ConfigUpdate {
            n_in: self.n_in,
            n_out: self.n_out,
            hidden_size: self.hidden_size,
            num_layers: self.num_layers,
            ..Default::default()
        });
        config.validate()?;
        Ok(config)
    }
}

#[derive(Args, Debug)]
struct TrainArgs {
    #[command(flatten)]
    config: ConfigArgs,

    /// CSV to train on; overrides `data_path` from the config
    #[arg(long)]
    data: Option<PathBuf>,

    /// Number of full passes over the training split
    #[arg(long)]
    num_epochs: Option<usize>,

    /// Windows per batch
    #[arg(long)]
    batch_size: Option<usize>,

    /// Where to store the trained model
    #[arg(long)]
    model_out: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct BaselineArgs {
    /// CSV with the series to fit
    #[arg(long)]
    data: PathBuf,

    /// Rows held out for evaluation
    #[arg(long, default_value_t = 3)]
    n_out: usize,

    /// Column to forecast; defaults to the last numeric column
    #[arg(long)]
    target: Option<String>,
}

#[derive(Args, Debug)]
struct PredictArgs {
    #[command(flatten)]
    config: ConfigArgs,

    /// Stored model
    #[arg(long)]
    model: PathBuf,

    /// CSV whose freshest rows form the input window
    #[arg(long)]
    data: PathBuf,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    match Cli::parse().command {
        Command::Train(args) => train(args),
        Command::Baseline(args) => baseline(args),
        Command::Predict(args) => predict(args),
    }
}

fn train(args: TrainArgs) -> Result<()> {
    let mut trainer = Trainer::new(args.config.load()?);
    trainer.update_params(ConfigUpdate {
        data_path: args.data.map(Some),
        num_epochs: args.num_epochs,
        batch_size: args.batch_size,
        ..Default::default()
    });

    let result = trainer.fit()?;
    if let Some(path) = &args.model_out {
        trainer.save_model(path)?;
        tracing::info!(path = %path.display(), "model saved");
    }
    println!("{}", result.to_json()?);
    Ok(())
}

fn baseline(args: BaselineArgs) -> Result<()> {
    let table = DropIncomplete::new().transform(Table::from_csv(&args.data)?)?;
    let mut model = BaselineModel::arima(args.n_out).with_target(args.target);
    model.fit(&table)?;
    println!("{}", model.get_metrics()?.to_json()?);
    Ok(())
}

fn predict(args: PredictArgs) -> Result<()> {
    let table = DropIncomplete::new().transform(Table::from_csv(&args.data)?)?;
    let mut trainer = Trainer::new(args.config.load()?);
    let target = trainer
        .load_model(&args.model, table.feature_columns().len())?
        .target_column()
        .to_string();

    let forecast = trainer.predict(PredictionInput::Table(table))?;

    let mut writer = csv::Writer::from_writer(io::stdout());
    writer
        .write_record(["step", target.as_str()])
        .map_err(csv_error)?;
    for (step, value) in forecast.row(0).iter().enumerate() {
        writer
            .write_record([(step + 1).to_string(), value.to_string()])
            .map_err(csv_error)?;
    }
    writer.flush()?;
    Ok(())
}

fn csv_error(e: csv::Error) -> seq_forecast::ForecastError {
    seq_forecast::ForecastError::DataError(format!("failed to write forecast: {}", e))
}
