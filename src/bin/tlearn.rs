//! Train and evaluate a linear classifier from the command line.
//!
//! Usage:
//!   tlearn --training-file train.bin --testing-file test.bin [options]
//!
//! Options:
//!   --training-file PATH   Training data (binary, svmlight, or ASCII)
//!   --testing-file PATH    Testing data in the same format
//!   --lambda X             L2 regularization strength (default: 1e-5)
//!   --rounds N             Passes over the training set (default: 1)
//!   --offset N             Time-step offset t0 (default: 0)
//!   --threads N            Worker count for SGD (default: 1)
//!   --loss NAME            square | hinge | ramp | logistic (default: hinge)
//!   --clf NAME             gd | sgd-nolock | sgd-lock (default: sgd-nolock)
//!   --seed N               Permutation RNG seed (default: 42)
//!   --quiet                Suppress per-round progress

use std::path::PathBuf;
use std::process::ExitCode;

use ndarray::ArrayView1;

use parsgd::data::io::{detect_format, read_dataset};
use parsgd::data::Dataset;
use parsgd::training::metrics::accuracy;
use parsgd::{Gd, GdParams, LinearModel, Loss, ParSgd, ParSgdParams, Verbosity};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ClfKind {
    Gd,
    SgdNoLock,
    SgdLock,
}

struct Args {
    training_file: PathBuf,
    testing_file: PathBuf,
    lambda: f64,
    rounds: usize,
    offset: usize,
    threads: usize,
    loss: Loss,
    clf: ClfKind,
    seed: u64,
    verbosity: Verbosity,
}

fn parse_args() -> Result<Args, String> {
    let mut training_file: Option<PathBuf> = None;
    let mut testing_file: Option<PathBuf> = None;
    let mut lambda = 1e-5;
    let mut rounds = 1usize;
    let mut offset = 0usize;
    let mut threads = 1usize;
    let mut loss = Loss::Hinge;
    let mut clf = ClfKind::SgdNoLock;
    let mut seed = 42u64;
    let mut verbosity = Verbosity::Info;

    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        let mut value = |flag: &str| it.next().ok_or_else(|| format!("{flag} needs a value"));
        match arg.as_str() {
            "--training-file" => training_file = Some(PathBuf::from(value("--training-file")?)),
            "--testing-file" => testing_file = Some(PathBuf::from(value("--testing-file")?)),
            "--lambda" => {
                lambda = value("--lambda")?
                    .parse()
                    .map_err(|_| "bad --lambda value".to_string())?
            }
            "--rounds" => {
                rounds = value("--rounds")?
                    .parse()
                    .map_err(|_| "bad --rounds value".to_string())?
            }
            "--offset" => {
                offset = value("--offset")?
                    .parse()
                    .map_err(|_| "bad --offset value".to_string())?
            }
            "--threads" => {
                threads = value("--threads")?
                    .parse()
                    .map_err(|_| "bad --threads value".to_string())?
            }
            "--loss" => {
                let name = value("--loss")?;
                loss = Loss::from_name(&name)
                    .ok_or_else(|| format!("unknown loss {name:?} (square, hinge, ramp, logistic)"))?;
            }
            "--clf" => {
                let name = value("--clf")?;
                clf = match name.as_str() {
                    "gd" => ClfKind::Gd,
                    "sgd-nolock" => ClfKind::SgdNoLock,
                    "sgd-lock" => ClfKind::SgdLock,
                    other => return Err(format!("unknown clf {other:?} (gd, sgd-nolock, sgd-lock)")),
                };
            }
            "--seed" => {
                seed = value("--seed")?
                    .parse()
                    .map_err(|_| "bad --seed value".to_string())?
            }
            "--quiet" => verbosity = Verbosity::Silent,
            "--help" => {
                eprintln!(
                    "tlearn\n\n  --training-file <path>  Training data\n  --testing-file <path>   Testing data (same format)\n  --lambda <x>            L2 strength (default 1e-5)\n  --rounds <n>            Training rounds (default 1)\n  --offset <n>            Time-step offset (default 0)\n  --threads <n>           SGD workers (default 1)\n  --loss <name>           square | hinge | ramp | logistic\n  --clf <name>            gd | sgd-nolock | sgd-lock\n  --seed <n>              Permutation seed (default 42)\n  --quiet                 Suppress progress output"
                );
                std::process::exit(0);
            }
            other => return Err(format!("unknown arg: {other}")),
        }
    }

    let training_file = training_file.ok_or("--training-file is required")?;
    let testing_file = testing_file.ok_or("--testing-file is required")?;
    Ok(Args {
        training_file,
        testing_file,
        lambda,
        rounds,
        offset,
        threads,
        loss,
        clf,
        seed,
        verbosity,
    })
}

fn run(args: &Args) -> Result<(), String> {
    let train_format = detect_format(&args.training_file).map_err(|e| e.to_string())?;
    let test_format = detect_format(&args.testing_file).map_err(|e| e.to_string())?;
    if train_format != test_format {
        return Err(format!(
            "input file formats must match: training is {train_format:?}, testing is {test_format:?}"
        ));
    }

    let training = read_dataset(&args.training_file)
        .map_err(|e| format!("could not read training file: {e}"))?;
    let testing = read_dataset(&args.testing_file)
        .map_err(|e| format!("could not read testing file: {e}"))?;
    println!("[INFO] training set n={}", training.len());
    println!("[INFO] testing set n={}", testing.len());
    println!("[INFO] training max norm {}", training.max_x_norm());

    let model = LinearModel::new(args.lambda, args.loss).map_err(|e| e.to_string())?;

    match args.clf {
        ClfKind::Gd => {
            let params = GdParams {
                n_rounds: args.rounds,
                t_offset: args.offset,
                c0: 1.0,
                verbosity: args.verbosity,
            };
            let mut clf = Gd::new(model, params).map_err(|e| e.to_string())?;
            clf.fit(&training, false).map_err(|e| e.to_string())?;
            report(clf.model(), &clf.jsonconfig(), &training, &testing);
        }
        ClfKind::SgdNoLock | ClfKind::SgdLock => {
            let params = ParSgdParams {
                n_rounds: args.rounds,
                n_workers: args.threads,
                locking: args.clf == ClfKind::SgdLock,
                t_offset: args.offset,
                c0: 1.0,
                seed: args.seed,
                verbosity: args.verbosity,
            };
            let mut clf = ParSgd::new(model, params).map_err(|e| e.to_string())?;
            clf.fit(&training, false).map_err(|e| e.to_string())?;
            report(clf.model(), &clf.jsonconfig(), &training, &testing);
        }
    }
    Ok(())
}

fn report(model: &LinearModel, jsonconfig: &str, training: &Dataset, testing: &Dataset) {
    let train_predictions = model.predict(training);
    let test_predictions = model.predict(testing);
    let train_acc = accuracy(
        ArrayView1::from(training.labels()),
        train_predictions.view(),
    );
    let test_acc = accuracy(ArrayView1::from(testing.labels()), test_predictions.view());

    println!("[INFO] norm(w): {}", model.weight_norm());
    println!("[INFO] infnorm(w): {}", model.weight_inf_norm());
    println!("[INFO] empirical risk: {}", model.empirical_risk(training));
    println!(
        "[INFO] norm gradient: {}",
        model.norm_grad_empirical_risk(training)
    );
    println!("[INFO] classifier: {jsonconfig}");
    println!("[INFO] acc on train: {train_acc}");
    println!("[INFO] acc on test: {test_acc}");
}

fn main() -> ExitCode {
    let args = match parse_args() {
        Ok(args) => args,
        Err(msg) => {
            eprintln!("[ERROR] {msg}");
            return ExitCode::FAILURE;
        }
    };
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(msg) => {
            eprintln!("[ERROR] {msg}");
            ExitCode::FAILURE
        }
    }
}
