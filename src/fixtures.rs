#[cfg(test)]
pub mod test {
    use std::sync::Arc;

    use serde_json::Value;

    use crate::error::NestfigError;
    use crate::field::Field;
    use crate::registry::{ConfigType, schema_of};
    use crate::schema::{Schema, SubConfig};
    use crate::smartcast::ValueType;

    pub struct Adam;
    pub struct Sgd;
    pub struct RmsProp;
    pub struct TrainConfig;

    impl ConfigType for Adam {
        fn declare() -> Result<Arc<Schema>, NestfigError> {
            Schema::builder("Adam")
                .description("Adam optimizer")
                .field("lr", Field::new(0.001).ty(ValueType::Float).help("Learning rate"))
                .value("beta1", 0.9)
                .build()
        }
    }

    impl ConfigType for Sgd {
        fn declare() -> Result<Arc<Schema>, NestfigError> {
            Schema::builder("Sgd")
                .description("Stochastic gradient descent")
                .field("lr", Field::new(0.01).ty(ValueType::Float).help("Learning rate"))
                .field("momentum", Field::new(0.9).help("Momentum factor"))
                .build()
        }
    }

    impl ConfigType for RmsProp {
        fn declare() -> Result<Arc<Schema>, NestfigError> {
            Schema::builder("RmsProp")
                .value("lr", 0.01)
                .value("alpha", 0.99)
                .build()
        }
    }

    impl ConfigType for TrainConfig {
        fn declare() -> Result<Arc<Schema>, NestfigError> {
            let adam = schema_of::<Adam>()?;
            Schema::builder("Train")
                .description("Train a model")
                .field(
                    "epochs",
                    Field::new(10)
                        .ty(ValueType::Int)
                        .alias("n_epochs")
                        .short('e')
                        .help("Number of epochs"),
                )
                .field("batch_size", Field::new(32).group("Data"))
                .value("name", "run")
                .field("verbose", Field::new(0).counter().short('v').help("Verbosity"))
                .field("use_amp", Field::new(false).flag().help("Mixed precision"))
                .field(
                    "data_path",
                    Field::new(Value::Null).position(0).group("Data").help("Dataset root"),
                )
                .subconfig(
                    "optim",
                    SubConfig::new(adam.clone())
                        .choice("adam", adam)
                        .choice("sgd", schema_of::<Sgd>()?)
                        .help("Optimizer"),
                )
                .build()
        }
    }

    pub fn adam() -> Arc<Schema> {
        schema_of::<Adam>().unwrap()
    }

    pub fn sgd() -> Arc<Schema> {
        schema_of::<Sgd>().unwrap()
    }

    pub fn rmsprop() -> Arc<Schema> {
        schema_of::<RmsProp>().unwrap()
    }

    pub fn train_schema() -> Arc<Schema> {
        schema_of::<TrainConfig>().unwrap()
    }

    // -- Two levels of sub-configs ---------------------------------------------

    fn mit() -> Arc<Schema> {
        Schema::builder("Mit").value("width", 64).build().unwrap()
    }

    fn resnet() -> Arc<Schema> {
        Schema::builder("Resnet").value("depth", 50).build().unwrap()
    }

    fn simple() -> Arc<Schema> {
        Schema::builder("Simple")
            .value("num_classes", 10)
            .value("hidden", 64)
            .build()
            .unwrap()
    }

    fn segformer() -> Arc<Schema> {
        Schema::builder("Segformer")
            .value("num_classes", 19)
            .subconfig(
                "backbone",
                SubConfig::new(mit()).choice("mit", mit()).choice("resnet", resnet()),
            )
            .build()
            .unwrap()
    }

    pub fn model_schema() -> Arc<Schema> {
        Schema::builder("Experiment")
            .subconfig(
                "model",
                SubConfig::new(simple())
                    .choice("simple", simple())
                    .choice("segformer", segformer()),
            )
            .build()
            .unwrap()
    }

    #[test]
    fn train_schema_loads_defaults() {
        let config = crate::resolve::defaults(&train_schema()).unwrap();
        assert_eq!(config["epochs"], serde_json::json!(10));
        assert_eq!(config["optim.lr"], serde_json::json!(0.001));
        assert_eq!(config.section("optim").unwrap().selector(), Some("adam"));
    }
}
