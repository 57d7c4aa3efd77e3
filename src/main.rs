//! Digit Expand - parallel, size-bounded expansion of digit runs
//!
//! Main entry point for the command-line application.

use clap::Parser;
use std::process;

use digit_expand::cli::Args;
use digit_expand::processor::{Processor, ProcessorConfig};
use digit_expand::progress::{
    print_banner, print_error, print_header, print_info, print_summary, format_number,
};

fn main() {
    // Parse command-line arguments
    let args = Args::parse();

    // Set up logging
    if args.verbose {
        std::env::set_var("RUST_LOG", "debug");
    } else if !args.quiet {
        std::env::set_var("RUST_LOG", "info");
    }
    env_logger::init();

    // Run the application
    if let Err(e) = run(args) {
        print_error(&format!("{}", e));

        // Print chain of errors
        let mut source = e.source();
        while let Some(err) = source {
            print_error(&format!("  Caused by: {}", err));
            source = err.source();
        }

        process::exit(1);
    }
}

fn run(args: Args) -> anyhow::Result<()> {
    // Print banner unless quiet mode
    if !args.quiet {
        print_banner();
    }

    // Validate arguments
    validate_args(&args)?;

    // Create processor configuration
    let config = ProcessorConfig::from_args(&args)?;

    if !args.quiet {
        print_config(&args, &config);
    }

    let processor = Processor::new(config);

    // Ctrl-C stops the run but still ends in an orderly shutdown and a summary
    let cancel = processor.cancel_signal();
    ctrlc::set_handler(move || {
        if cancel.cancel() {
            log::warn!("Interrupt received, stopping...");
        }
    })?;

    let summary = processor.process(&args.input, &args.output)?;

    if !args.quiet {
        print_summary(&summary);
    }

    Ok(())
}

/// Validate command-line arguments
fn validate_args(args: &Args) -> anyhow::Result<()> {
    if !args.input.is_file() {
        anyhow::bail!("Input file does not exist: {:?}", args.input);
    }

    if args.output.is_dir() {
        anyhow::bail!("Output path is a directory: {:?}", args.output);
    }

    if args.slow_threshold < 0.0 || !args.slow_threshold.is_finite() {
        anyhow::bail!("Slow threshold must be a non-negative number: {}", args.slow_threshold);
    }

    Ok(())
}

/// Print configuration summary
fn print_config(args: &Args, config: &ProcessorConfig) {
    print_header("Configuration");

    print_info(&format!("Input:           {:?}", args.input));
    print_info(&format!("Output:          {:?}", args.output));
    print_info(&format!("Limit:           {}", bytesize::ByteSize(config.limit_bytes)));
    print_info(&format!("Workers:         {}", config.workers));
    print_info(&format!("Max per line:    {}", format_number(config.max_line)));
    print_info(&format!(
        "Chunking:        >= {} in chunks of {}",
        format_number(config.chunk_threshold),
        format_number(config.chunk_size)
    ));
    print_info(&format!("Pattern dedup:   {}", config.pattern_dedup));
    print_info(&format!("Emit originals:  {}", config.emit_originals));

    print_header("Expanding...");
}
