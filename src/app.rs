use crate::cli::{Cli, Commands, JobArgs};
use std::path::PathBuf;
use std::process;
use stillcut::config::Config;
use stillcut::engine::{
    self, BackendPreference, DryRunRunner, EffectConfig, JobRequest, JobSettings, JobWorker,
    Pipeline, SystemRunner, WorkerMessage,
};

pub fn run(cli: Cli) {
    match cli.command {
        Commands::Render(args) => handle_render(args),
        Commands::DryRun(args) => handle_dry_run(args),
        Commands::CheckFfmpeg => handle_check_ffmpeg(),
        Commands::CheckNvenc => handle_check_nvenc(),
        Commands::Probe { file } => handle_probe(file),
        Commands::Scan { directory } => handle_scan(directory),
        Commands::InitConfig => handle_init_config(),
    }
}

fn load_config() -> Config {
    match Config::load() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            process::exit(1);
        }
    }
}

/// Command-line flags switch effects on; config defaults fill in the rest.
fn effects_for(args: &JobArgs, cfg: &Config) -> EffectConfig {
    let defaults = cfg.default_effects();
    EffectConfig {
        zoom: args.zoom || defaults.zoom,
        blur_background: args.blur_bg || defaults.blur_background,
        dissolve: args.dissolve || defaults.dissolve,
    }
}

fn output_path_for(args: &JobArgs, cfg: &Config) -> PathBuf {
    let suffix = &cfg.defaults.output_suffix;
    match &args.output {
        Some(out) if out.is_dir() => engine::derive_output_path(&args.audio, Some(out), suffix),
        Some(out) => out.clone(),
        None => engine::derive_output_path(&args.audio, None, suffix),
    }
}

fn job_for(args: &JobArgs, cfg: &Config) -> (JobRequest, JobSettings) {
    let mut settings = match cfg.job_settings() {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            process::exit(1);
        }
    };
    if args.software {
        settings.backend = BackendPreference::Software;
    }

    let request = JobRequest {
        image_dir: args.images.clone(),
        audio_path: args.audio.clone(),
        output_path: output_path_for(args, cfg),
        effects: effects_for(args, cfg),
    };
    (request, settings)
}

fn handle_render(args: JobArgs) {
    let cfg = load_config();
    let (request, settings) = job_for(&args, &cfg);

    println!(
        "Rendering {} + {} -> {} (effects: {})",
        request.image_dir.display(),
        request.audio_path.display(),
        request.output_path.display(),
        request.effects
    );

    let worker = JobWorker::new();
    let (job_id, handle) = worker.spawn_job(request, settings);

    let mut failed = false;
    for msg in worker.receiver().iter() {
        if msg.job_id() != job_id {
            continue;
        }
        let done = msg.is_final();
        match msg {
            WorkerMessage::JobStarted { .. } => {}
            WorkerMessage::Progress { message, .. } => println!("  {}", message),
            WorkerMessage::JobCompleted { output, .. } => {
                println!("Done: {}", output.display());
            }
            WorkerMessage::JobFailed { error, .. } => {
                eprintln!("Error: {}", error);
                failed = true;
            }
        }
        if done {
            break;
        }
    }

    if handle.join().is_err() {
        eprintln!("Error: render thread panicked");
        failed = true;
    }
    if failed {
        process::exit(1);
    }
}

fn handle_dry_run(args: JobArgs) {
    let cfg = load_config();
    let (request, settings) = job_for(&args, &cfg);
    println!(
        "Dry run: ffmpeg commands for {} -> {}",
        request.image_dir.display(),
        request.output_path.display()
    );

    let runner = DryRunRunner::new(SystemRunner, settings.ffprobe.clone());
    let result = Pipeline::new(&runner, settings).run(&request, |event| {
        println!("# {}", event.message);
    });

    for cmd in runner.planned() {
        println!("{}", cmd);
    }

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn handle_check_ffmpeg() {
    let cfg = load_config();
    match engine::ffmpeg_version(&SystemRunner, &cfg.tools.ffmpeg) {
        Ok(version) => {
            println!("ffmpeg found: {}", version);
            match engine::ffprobe_version(&SystemRunner, &cfg.tools.ffprobe) {
                Ok(probe_version) => {
                    println!("ffprobe found: {}", probe_version);
                    process::exit(0);
                }
                Err(e) => {
                    eprintln!("Error: {:#}", e);
                    process::exit(1);
                }
            }
        }
        Err(e) => {
            eprintln!("Error: {:#}", e);
            process::exit(1);
        }
    }
}

fn handle_check_nvenc() {
    let cfg = load_config();
    let settings = match cfg.job_settings() {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            process::exit(1);
        }
    };

    println!(
        "Running a {}s test encode with h264_nvenc...",
        settings.probe_timeout.as_secs()
    );
    let available = engine::hardware::check_nvenc_available(
        &SystemRunner,
        &settings.ffmpeg,
        settings.probe_timeout,
    );
    let backend = if available {
        engine::EncoderBackend::Hardware
    } else {
        engine::EncoderBackend::Software
    };
    println!(
        "   NVENC: {}",
        if available { "OK" } else { "unavailable" }
    );
    println!("   Renders will use: {}", backend.display_name());
    if settings.backend == BackendPreference::Software {
        println!("   (config sets backend = \"software\", so the probe is skipped during renders)");
    }
}

fn handle_probe(file: PathBuf) {
    let cfg = load_config();
    let track = engine::probe::probe_audio_track(&SystemRunner, &cfg.tools.ffprobe, &file);
    if !track.is_readable() {
        eprintln!("Error: could not read a duration from {}", file.display());
        process::exit(1);
    }
    println!(
        "Duration: {} ({:.2} seconds)",
        engine::probe::format_clock(track.duration_secs),
        track.duration_secs
    );
}

fn handle_scan(directory: PathBuf) {
    println!("Scanning directory: {}", directory.display());

    match engine::resolve_image_set(&directory) {
        Ok(images) => {
            for (i, image) in images.iter().enumerate() {
                println!("{:>4}. {}", i + 1, image.display());
            }
            println!("Total images: {}", images.len());
        }
        Err(e) => {
            eprintln!("Error scanning directory: {:#}", e);
            process::exit(1);
        }
    }
}

fn handle_init_config() {
    if Config::exists() {
        match Config::load() {
            Ok(cfg) => {
                match Config::config_path() {
                    Ok(path) => println!("Config loaded successfully from {}", path.display()),
                    Err(e) => println!("Config loaded, but config path unknown: {:#}", e),
                }
                println!("{:#?}", cfg);
            }
            Err(e) => {
                eprintln!("Config invalid: {:#}", e);
                process::exit(1);
            }
        }
        return;
    }

    println!("No config file found, creating default config...");
    if let Err(err) = Config::ensure_default() {
        eprintln!("Failed to save default config: {:#}", err);
        process::exit(1);
    }
    match Config::config_path() {
        Ok(path) => println!("Default config saved to {}", path.display()),
        Err(e) => println!("Default config saved (path unknown): {:#}", e),
    }
}
