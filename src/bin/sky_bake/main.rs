//! sky-bake CLI - bake sky occlusion for probes described in a JSON file.

use sky_bake::bake::{
    partition_sequential, BakeEvent, BakeEventKind, BakeReport, BakeRequest, CpuBackend, SkyOcclusionBaker,
};
use sky_bake::Result;
use std::env;
use std::path::Path;
use tracing_subscriber::EnvFilter;

/// Environment variable overriding the log filter.
const LOG_ENV: &str = "SKY_BAKE_LOG";

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(format!("sky_bake={level}")));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let args: Vec<String> = env::args().collect();

    // Parse global flags
    let mut level = "info";
    let mut filtered_args: Vec<&str> = Vec::new();
    for arg in &args[1..] {
        match arg.as_str() {
            "-v" | "--verbose" => level = "debug",
            "-vv" | "--trace" => level = "trace",
            "-q" | "--quiet" => level = "warn",
            _ => filtered_args.push(arg),
        }
    }
    init_logging(level);

    if filtered_args.is_empty() {
        print_help();
        return;
    }

    let result = match filtered_args[0] {
        // Bake command - run the full bake and write results
        "bake" | "b" => {
            let (positional, output) = split_output(&filtered_args[1..]);
            let Some(input) = positional.first() else {
                eprintln!("Error: missing file argument");
                eprintln!("Usage: sky-bake bake <scene.json> [-o out.json]");
                std::process::exit(1);
            };
            cmd_bake(input, output)
        }

        // Jobs command - show the partition without baking
        "jobs" | "j" => {
            let Some(input) = filtered_args.get(1) else {
                eprintln!("Error: missing file argument");
                eprintln!("Usage: sky-bake jobs <scene.json>");
                std::process::exit(1);
            };
            cmd_jobs(input)
        }

        "version" | "--version" | "-V" => {
            println!("sky-bake {} (built {})", env!("CARGO_PKG_VERSION"), env!("SKY_BAKE_BUILD_DATE"));
            Ok(())
        }

        "help" | "--help" | "-h" => {
            print_help();
            Ok(())
        }

        other => {
            eprintln!("Unknown command: {}", other);
            print_help();
            std::process::exit(1);
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Separate `-o/--output <path>` from positional arguments, in any order.
fn split_output<'a>(args: &[&'a str]) -> (Vec<&'a str>, Option<&'a str>) {
    let mut positional = Vec::new();
    let mut output = None;
    let mut iter = args.iter().copied();
    while let Some(arg) = iter.next() {
        match arg {
            "-o" | "--output" => output = iter.next(),
            _ => positional.push(arg),
        }
    }
    (positional, output)
}

fn print_help() {
    println!("sky-bake - batched sky occlusion baker");
    println!();
    println!("Usage: sky-bake [flags] <command> [args]");
    println!();
    println!("Commands:");
    println!("  bake, b <scene.json> [-o out.json]   Bake probes, write JSON results (stdout if no -o)");
    println!("  jobs, j <scene.json>                 Show job partition");
    println!("  version                              Show version");
    println!();
    println!("Flags:");
    println!("  -v, --verbose    Debug logging");
    println!("  -vv, --trace     Trace logging");
    println!("  -q, --quiet      Warnings only");
    println!();
    println!("Set {LOG_ENV} to override the log filter (e.g. {LOG_ENV}=sky_bake=debug).");
}

fn cmd_bake(input: &str, output: Option<&str>) -> Result<()> {
    let request = BakeRequest::load(input)?;
    let settings = request.settings.clone();
    let jobs = partition_sequential(request.probes.len(), settings.max_probes_per_job, settings.job_sampling())?;
    let job_count = jobs.len();

    let mut baker = SkyOcclusionBaker::new(CpuBackend::new(), settings, request.scene)?;
    baker.on(BakeEventKind::JobCompleted, move |event| {
        if let BakeEvent::JobCompleted { job, completed_probes } = event {
            tracing::info!("job {}/{} done ({} probes)", job + 1, job_count, completed_probes);
        }
    });

    let started = std::time::Instant::now();
    baker.start(jobs, &request.probes)?;
    let report = BakeReport::from(baker.run_to_completion()?);
    baker.dispose();
    tracing::info!("baked {} probes in {:.2}s", report.probe_count, started.elapsed().as_secs_f32());

    let json = report.to_json()?;
    match output {
        Some(path) => {
            std::fs::write(Path::new(path), json)?;
            tracing::info!("wrote {}", path);
        }
        None => println!("{}", json),
    }
    Ok(())
}

fn cmd_jobs(input: &str) -> Result<()> {
    let request = BakeRequest::load(input)?;
    let s = &request.settings;
    let jobs = partition_sequential(request.probes.len(), s.max_probes_per_job, s.job_sampling())?;

    println!("Probes:  {}", request.probes.len());
    println!("Jobs:    {}", jobs.len());
    println!("Samples: {} ({} steps per job)", s.samples, s.samples.div_ceil(sky_bake::bake::SAMPLES_PER_STEP));
    println!("Bounces: {}", s.bounces);
    for (i, job) in jobs.iter().enumerate() {
        println!("  job {:>4}: offset {:>8}  probes {:>6}", i, job.start_offset, job.len());
    }
    Ok(())
}
