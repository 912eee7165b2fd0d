// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// Entry point for all user interaction, built on `clap`.
// All business logic is delegated to Layer 2 (application).
//
// Two commands are supported:
//   1. `run`      — (optionally train,) restore, caption test images
//   2. `mappings` — list / export the test-set caption mappings
//
// Reference: Rust Book §7 (Modules), §12 (CLI programs)

pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, InferenceAction, MappingsArgs, RunArgs};

use crate::domain::caption::GeneratedCaption;

#[derive(Parser, Debug)]
#[command(
    name = "bangla-caption",
    version,
    about = "Train or restore a Bangla image-captioning model and caption a test set."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Route to the matching use case; this layer only prints.
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Run(args)      => run_session(args),
            Commands::Mappings(args) => run_mappings(args),
        }
    }
}

fn run_session(args: RunArgs) -> Result<()> {
    use crate::application::session::Session;
    use crate::ml::TrainBackend;

    let action = args.action;
    let count  = args.count;

    let device  = burn::backend::wgpu::WgpuDevice::default();
    tracing::info!("Using WGPU device: {:?}", device);

    let session    = Session::<TrainBackend>::new(args.into(), device)?;
    let mut runner = session.start()?;
    println!("Test set: {} captioned images", runner.test_set().len());

    let captions = match action {
        InferenceAction::FirstN       => runner.run_first_n(count)?,
        InferenceAction::RandomSingle => vec![runner.run_random_single()?],
        InferenceAction::RandomBatch  => runner.run_random_batch(count)?,
    };

    print_captions(&captions);
    println!("\nResults written to {}", runner.results_dir().display());
    Ok(())
}

fn print_captions(captions: &[GeneratedCaption]) {
    for c in captions {
        println!("\n{}", c.image.display());
        println!("  → {}  (mean log-prob {:.3})", c.text(), c.mean_log_prob);
    }
}

fn run_mappings(args: MappingsArgs) -> Result<()> {
    use crate::application::mappings_use_case::{preview, MappingsUseCase};

    println!("Scanning directories in {}...", args.base.display());
    let use_case = MappingsUseCase::new(&args.base, !args.no_validate);
    let mapping  = use_case.collect()?;

    println!("\nTotal consolidated caption mappings: {}", mapping.len());
    for (image, captions) in preview(&mapping) {
        println!("{} {:?}", image.display(), captions);
    }

    if let Some(out) = args.write_json {
        let root = std::env::current_dir()?;
        use_case.write_json(&mapping, &out, &root)?;
        println!("\nWrote consolidated mappings to {}", out.display());
    }
    Ok(())
}
