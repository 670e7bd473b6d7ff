//! # nestfig demo application
//!
//! A sample training CLI that showcases how to drive a program from a
//! nestfig schema. Nothing is trained; the demo prints what it would run
//! with.
//!
//! ## Running
//!
//! ```sh
//! cargo run --example train_demo -- --help
//! cargo run --example train_demo -- ./data --optim sgd --optim.momentum 0.8
//! ```
//!
//! ## Features demonstrated
//!
//! | Feature                   | How to exercise it                                                   |
//! |---------------------------|----------------------------------------------------------------------|
//! | Schema defaults           | `cargo run --example train_demo`                                     |
//! | Config file (cwd)         | Create `train.yaml` in cwd, then run without arguments               |
//! | Extra config file         | `cargo run --example train_demo -- --config run.json`                |
//! | Selector (sugar)          | `cargo run --example train_demo -- --optim sgd`                      |
//! | Variant-aware flags/help  | `cargo run --example train_demo -- --optim sgd --help`               |
//! | Nested selector           | `cargo run --example train_demo -- --model segformer --model.backbone resnet` |
//! | Smart casting             | `cargo run --example train_demo -- --model.hidden 256,128,64`        |
//! | Aliases and shorts        | `cargo run --example train_demo -- --n_epochs 3 -b 8`                |
//! | Counters and toggles      | `cargo run --example train_demo -- -vv --amp`                        |
//! | Positional                | `cargo run --example train_demo -- /datasets/cifar`                  |
//! | Dump resolved config      | `cargo run --example train_demo -- --optim sgd --dumps`              |
//! | Keyword overrides         | `TRAIN_DEMO_SEED_EPOCHS=1` is read and passed as a kwarg             |

mod config;

use std::path::Path;
use std::process::ExitCode;

use nestfig::{Config, Nestfig, NestfigError, ops};

use config::{TrainConfig, TrainView};

fn load() -> Result<Option<Config>, NestfigError> {
    let mut builder = Nestfig::builder_for::<TrainConfig>()?;
    if Path::new("train.yaml").exists() {
        builder = builder.file_path("train.yaml");
    }
    let seed_epochs = std::env::var("TRAIN_DEMO_SEED_EPOCHS").ok();

    let (config, action) = builder
        .kwarg("epochs", seed_epochs.and_then(|e| e.parse::<i64>().ok()))
        .argv(std::env::args())
        .load_with_action()?;

    if let Some(action) = action {
        println!("{}", ops::handle(&config, &action)?);
        return Ok(None);
    }
    Ok(Some(config))
}

fn run(config: &Config) -> Result<(), NestfigError> {
    let view: TrainView = config.view()?;
    if view.verbose > 0 {
        println!("{}", ops::list_values(config));
        println!();
    }

    let optim = config.section("optim").and_then(|s| s.selector()).unwrap_or("?");
    let model = config.section("model").and_then(|s| s.selector()).unwrap_or("?");
    println!(
        "training {model} with {optim} for {} epochs (batch {}) on {}",
        view.epochs,
        view.batch_size,
        view.data.as_deref().unwrap_or("<no data>"),
    );
    if view.amp {
        println!("mixed precision on");
    }
    if view.verbose > 1 {
        println!("optim = {}", view.optim);
        println!("model = {}", view.model);
        println!("explicit: {}", config.explicit_keys().join(", "));
    }
    Ok(())
}

fn main() -> ExitCode {
    let result = load().and_then(|config| match config {
        Some(config) => run(&config),
        None => Ok(()),
    });
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(NestfigError::Cli(e)) => e.exit(),
        Err(e) => {
            eprintln!("Failed to load config:\n{e}");
            ExitCode::FAILURE
        }
    }
}
