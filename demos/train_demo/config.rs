//! Configuration schemas for the training demo.
//!
//! The root [`TrainConfig`] holds a few scalar settings plus two swappable
//! sub-configs: `optim` (Adam or SGD) and `model` (a small MLP or a
//! Segformer, whose own `backbone` is swappable again).
//!
//! Each type implements [`ConfigType`], so its schema is built once and
//! shared. [`TrainView`] is the typed struct handed to the "training loop".

use std::sync::Arc;

use nestfig::{ConfigType, Field, NestfigError, Schema, SubConfig, ValueType, schema_of};
use serde::Deserialize;

pub struct Adam;
pub struct Sgd;
pub struct Mlp;
pub struct Segformer;
pub struct Mit;
pub struct Resnet;
pub struct TrainConfig;

impl ConfigType for Adam {
    fn declare() -> Result<Arc<Schema>, NestfigError> {
        Schema::builder("Adam")
            .description("Adam optimizer")
            .field("lr", Field::new(0.001).ty(ValueType::Float).help("Learning rate"))
            .field("betas", Field::new(vec![0.9, 0.999]).help("Moment decay rates"))
            .build()
    }
}

impl ConfigType for Sgd {
    fn declare() -> Result<Arc<Schema>, NestfigError> {
        Schema::builder("Sgd")
            .description("Stochastic gradient descent")
            .field("lr", Field::new(0.01).ty(ValueType::Float).help("Learning rate"))
            .field("momentum", Field::new(0.9).help("Momentum factor"))
            .field("nesterov", Field::new(false).flag().help("Nesterov momentum"))
            .build()
    }
}

impl ConfigType for Mlp {
    fn declare() -> Result<Arc<Schema>, NestfigError> {
        Schema::builder("Mlp")
            .field("hidden", Field::new(vec![128, 64]).help("Hidden layer widths"))
            .value("num_classes", 10)
            .build()
    }
}

impl ConfigType for Mit {
    fn declare() -> Result<Arc<Schema>, NestfigError> {
        Schema::builder("Mit").value("width", 64).build()
    }
}

impl ConfigType for Resnet {
    fn declare() -> Result<Arc<Schema>, NestfigError> {
        Schema::builder("Resnet")
            .field("depth", Field::new(50).choices([18, 34, 50, 101]))
            .build()
    }
}

impl ConfigType for Segformer {
    fn declare() -> Result<Arc<Schema>, NestfigError> {
        let mit = schema_of::<Mit>()?;
        Schema::builder("Segformer")
            .value("num_classes", 19)
            .subconfig(
                "backbone",
                SubConfig::new(mit.clone())
                    .choice("mit", mit)
                    .choice("resnet", schema_of::<Resnet>()?)
                    .help("Encoder backbone"),
            )
            .build()
    }
}

impl ConfigType for TrainConfig {
    fn declare() -> Result<Arc<Schema>, NestfigError> {
        let adam = schema_of::<Adam>()?;
        let mlp = schema_of::<Mlp>()?;
        Schema::builder("Train")
            .description("Train a model (demo, nothing is trained)")
            .field(
                "data",
                Field::new(serde_json::Value::Null)
                    .position(0)
                    .group("Data")
                    .help("Dataset root"),
            )
            .field("batch_size", Field::new(32).short('b').group("Data"))
            .field(
                "epochs",
                Field::new(10).ty(ValueType::Int).alias("n_epochs").short('e').help("Number of epochs"),
            )
            .field("verbose", Field::new(0).counter().short('v').help("Verbosity"))
            .field("amp", Field::new(false).flag().mutex_group("precision").help("Mixed precision"))
            .field("fp64", Field::new(false).flag().mutex_group("precision").help("Double precision"))
            .subconfig(
                "optim",
                SubConfig::new(adam.clone())
                    .choice("adam", adam)
                    .choice("sgd", schema_of::<Sgd>()?)
                    .help("Optimizer"),
            )
            .subconfig(
                "model",
                SubConfig::new(mlp.clone())
                    .choice("mlp", mlp)
                    .choice("segformer", schema_of::<Segformer>()?)
                    .help("Model architecture"),
            )
            .build()
    }
}

/// Typed projection of the resolved config. Sub-configs stay as raw values
/// since their shape depends on the selected variant.
#[derive(Deserialize, Debug)]
pub struct TrainView {
    pub data: Option<String>,
    pub batch_size: u32,
    pub epochs: u32,
    pub verbose: u8,
    pub amp: bool,
    pub optim: serde_json::Value,
    pub model: serde_json::Value,
}
