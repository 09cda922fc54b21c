mod cli;
mod session;
mod tokenizer;

use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use cli::{ClassifyTextArgs, Cli, Command, EvalArgs, InspectArgs};
use npzeval_core::IOName;
use npzeval_npy::Archive;
use npzeval_runtime::{
    EncodeOptions, EvalOptions, Evaluator, FeedConfig, MemberSpec, SampleFeedBuilder,
    TextClassifier, TextConfig,
};
use tracing_subscriber::EnvFilter;

use session::{load_onnx, parse_device};
use tokenizer::HfTokenizer;

const DEFAULT_TEXTS: [&str; 5] = [
    "This movie is great!",
    "This movie is terrible.",
    "I really loved this film.",
    "I really hated this film.",
    "The plot was boring and slow.",
];

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let command = match cli.into_command() {
        Ok(command) => command,
        Err(err) => err.exit(),
    };

    let outcome = match command {
        Command::Eval(args) => eval(args),
        Command::Inspect(args) => inspect(args),
        Command::ClassifyText(args) => classify_text(args),
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn eval(args: EvalArgs) -> Result<()> {
    let device = parse_device(&args.device)?;
    let archive = Archive::open(&args.archive)?;

    let mut members = vec![MemberSpec::input(
        &args.input_member,
        &args.input_name,
        args.input_dtype,
        &args.sample_shape,
    )];
    if !args.no_labels {
        members.push(MemberSpec::label(&args.label_member, args.label_dtype));
    }
    let config = FeedConfig {
        members,
        num_classes: args.num_classes,
    };
    let feeds = SampleFeedBuilder::new(&archive, &config)?;

    let total = feeds.sample_count();
    let per_sample = feeds.input_len(&args.input_name).unwrap_or_default();
    match feeds.labels() {
        Some(labels) => println!(
            "loaded test set: N={total}, {}={}, {}={}",
            args.input_member,
            total * per_sample,
            args.label_member,
            labels.len()
        ),
        None => println!(
            "loaded test set: N={total}, {}={}",
            args.input_member,
            total * per_sample
        ),
    }

    let session = load_onnx(&args.model, device)?;
    let mut evaluator = Evaluator::new(
        session,
        EvalOptions {
            output_name: IOName::new(&args.output_name),
            num_classes: args.num_classes,
        },
    );

    let mut done = 0;
    let mut correct = 0;
    let result = evaluator.run_with(&feeds, |outcome| {
        done += 1;
        correct += usize::from(outcome.is_correct() == Some(true));
        if args.per_sample {
            let label = outcome
                .label
                .map_or_else(|| "-".to_string(), |l| l.to_string());
            println!(
                "sample {}: pred={} label={label} ({} us)",
                outcome.index, outcome.predicted, outcome.backend_us
            );
        } else if args.progress_every > 0 && done % args.progress_every == 0 {
            println!("progress: {done}/{total} (correct so far: {correct})");
        }
    })?;

    tracing::info!(
        backend_ms = result.backend_us / 1000,
        mean_us = result.backend_us / result.total_samples as u64,
        "backend time"
    );
    if result.labeled > 0 {
        println!("Test accuracy (Rust + ONNX, from npz): {:.4}", result.accuracy);
    } else {
        println!("predicted {} samples (no labels)", result.total_samples);
    }
    Ok(())
}

fn inspect(args: InspectArgs) -> Result<()> {
    let archive = Archive::open(&args.archive)?;
    println!("Keys in NPZ: {:?}", archive.names().collect::<Vec<_>>());
    for array in archive.iter() {
        println!(
            "{}: shape={} dtype={} order={:?}",
            array.name(),
            array.shape(),
            array.dtype(),
            array.order()
        );
        println!(
            "  first {} elements: {}",
            args.preview.min(array.len()),
            array.data().preview(args.preview)
        );
    }
    Ok(())
}

fn classify_text(args: ClassifyTextArgs) -> Result<()> {
    let device = parse_device(&args.device)?;
    let tokenizer = HfTokenizer::from_file(&args.tokenizer)?;
    let session = load_onnx(&args.model, device)?;

    let texts: Vec<String> = if args.texts.is_empty() {
        DEFAULT_TEXTS.iter().map(|t| t.to_string()).collect()
    } else {
        args.texts
    };
    let expected = (!args.expect.is_empty()).then_some(args.expect.as_slice());

    let config = TextConfig {
        ids_input: IOName::new(args.ids_input),
        mask_input: IOName::new(args.mask_input),
        output_name: IOName::new(args.output_name),
        encode: EncodeOptions::fixed(args.max_length),
        label_names: args.labels,
    };
    let mut classifier = TextClassifier::new(session, Box::new(tokenizer), config);

    let result = classifier.evaluate(&texts, expected, |text, prediction| {
        println!("text: {text}");
        println!("  logits: {}", fmt_values(&prediction.logits));
        println!("  probs : {}", fmt_values(&prediction.probabilities));
        println!("  pred  : {} -> {}", prediction.class, prediction.label_name);
        println!("----------------------------------------");
    })?;

    if result.labeled > 0 {
        println!("accuracy: {:.4} ({}/{})", result.accuracy, result.correct, result.labeled);
    }
    println!("DONE");
    Ok(())
}

/// `[a b c]`
fn fmt_values(values: &[f32]) -> String {
    let joined = values
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(" ");
    format!("[{joined}]")
}
