// Aadhaar card verification from the command line

use aadhaar_verifier::{
    models::{ClassifierLabel, VerificationRecord, VerificationReport},
    storage::{JsonLinesStore, VerificationStore},
    utils::VerifyError,
    verification::{Classifier, CommandClassifier, FixedClassifier},
    DocumentVerifier, VerifierConfig,
};
use clap::{Parser, Subcommand};
use log::error;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "aadhaar-verify")]
#[command(version, about = "Verify Aadhaar card photos by fusing OCR fields with an authenticity classifier", long_about = None)]
struct Cli {
    /// JSON configuration file (defaults are used for missing keys)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verification history file
    #[arg(long, global = true, default_value = "verification_results.jsonl")]
    history_file: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Verify one or more card images
    Verify {
        /// Image files (png, jpg, jpeg)
        images: Vec<PathBuf>,

        /// Detector program; receives the image path as its last argument and prints JSON detections
        #[arg(long)]
        classifier_cmd: Option<PathBuf>,

        /// Extra arguments passed to the detector before the image path
        #[arg(long = "classifier-arg", allow_hyphen_values = true)]
        classifier_args: Vec<String>,

        /// Use a fixed classifier label instead of running a detector
        #[arg(long, conflicts_with = "classifier_cmd")]
        label: Option<String>,

        /// Confidence for --label
        #[arg(long, default_value_t = 1.0)]
        confidence: f32,

        /// Do not write results to the history file
        #[arg(long)]
        no_store: bool,

        /// Print reports as JSON
        #[arg(long)]
        json: bool,
    },

    /// List stored verification results, newest first
    History {
        /// Print records as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            error!("{}", e);
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode, VerifyError> {
    let config = match &cli.config {
        Some(path) => VerifierConfig::from_file(path)?,
        None => VerifierConfig::default(),
    };

    match cli.command {
        Commands::Verify {
            images,
            classifier_cmd,
            classifier_args,
            label,
            confidence,
            no_store,
            json,
        } => {
            if images.is_empty() {
                return Err(VerifyError::IntakeError("no images given".to_string()));
            }

            let classifier: Box<dyn Classifier> = match (classifier_cmd, label) {
                (Some(program), _) => {
                    Box::new(CommandClassifier::new(program).with_args(classifier_args))
                }
                (None, Some(label)) => {
                    Box::new(FixedClassifier::single(ClassifierLabel::parse(&label), confidence))
                }
                (None, None) => Box::new(FixedClassifier::default()),
            };

            let mut verifier = DocumentVerifier::new(config, classifier);
            if !no_store {
                verifier = verifier.with_store(Arc::new(JsonLinesStore::open(&cli.history_file)?));
            }

            let mut failures = 0;
            for image in &images {
                match verifier.verify_file(image) {
                    Ok(report) if json => print_json(&report),
                    Ok(report) => print_report(&report),
                    Err(e) => {
                        failures += 1;
                        eprintln!("{}: {}", image.display(), e);
                    }
                }
            }

            Ok(if failures == 0 {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        Commands::History { json } => {
            let store = JsonLinesStore::open(&cli.history_file)?;
            let records = store.history()?;
            if json {
                print_json(&records);
            } else {
                print_history(&records);
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn print_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{}", text),
        Err(e) => eprintln!("Failed to render JSON: {}", e),
    }
}

fn print_report(report: &VerificationReport) {
    println!("\n===============================================");
    println!("      AADHAAR VERIFICATION REPORT");
    println!("===============================================\n");

    println!("DOCUMENT: {}", report.document_id);
    println!("  SHA-256: {}", report.digest);

    println!("\nEXTRACTED DETAILS:");
    println!("  Name: {}", report.fields.name);
    println!("  Date of Birth: {}", report.fields.date_of_birth);
    println!("  Gender: {}", report.fields.gender);
    println!("  Aadhaar Number: {}", report.fields.identity_number);

    println!("\nCHECKS:");
    println!(
        "  1. Classifier: {} ({:.2})",
        describe_label(report.detection.label, &report.detection.class_name),
        report.detection.confidence
    );
    println!(
        "  2. Number Format: {}",
        if report.identity_number_valid {
            "PASSED"
        } else {
            "FAILED"
        }
    );

    println!("\nVerdict: {}", report.verdict);
    if !report.persisted {
        println!("(result not stored)");
    }
}

/// The parsed label, followed by the model's own class name when the two differ.
fn describe_label(label: ClassifierLabel, class_name: &str) -> String {
    if class_name.eq_ignore_ascii_case(label.as_str()) {
        label.to_string()
    } else {
        format!("{} ({})", label, class_name)
    }
}

fn print_history(records: &[VerificationRecord]) {
    if records.is_empty() {
        println!("No verification results stored.");
        return;
    }

    for record in records {
        println!(
            "#{:<4} {}  {:<24} {:<22} {:.2}  {}",
            record.id,
            record.timestamp.format("%Y-%m-%d %H:%M:%S"),
            record.document_id,
            describe_label(record.label, &record.class_name),
            record.confidence,
            record.verdict
        );
    }
}
