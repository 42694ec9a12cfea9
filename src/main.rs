mod cli;
mod config;
mod pipelines;
mod utils;

use std::env;
use std::fs;
use std::io::Write;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use env_logger::Builder;
use log::{debug, error, info, LevelFilter};
use tokio::sync::Semaphore;

use crate::cli::parse;
use crate::config::defs::RunConfig;
use crate::config::S3_PREFIX;
use crate::utils::notify::send_run_notification;
use crate::utils::system::detect_cores_and_load;
use pipelines::typing;

#[tokio::main]
async fn main() -> Result<()> {
    let run_start = Instant::now();

    let args = parse();

    let log_level = if args.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    Builder::new()
        .filter_level(log_level)
        .format(|buf, record| {
            writeln!(
                buf,
                "[{}] {}: {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.args()
            )
        })
        .init();

    println!("\n-------------\n BacTyper\n-------------\n");

    let dir = env::current_dir()?;
    info!("The current directory is {:?}", dir);

    let input = match config::resolve(&args, &dir) {
        Ok(input) => input,
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };

    // Cloud configurations validate here but execute through the batch
    // wrapper, not this binary.
    if args.outdir.starts_with(S3_PREFIX) {
        error!(
            "Output directory {} is remote; submit this run through the AWS Batch wrapper",
            args.outdir
        );
        std::process::exit(1);
    }

    let out_dir = {
        let path = std::path::PathBuf::from(&args.outdir);
        if path.is_absolute() {
            path
        } else {
            dir.join(path)
        }
    };
    fs::create_dir_all(&out_dir)?;

    let (max_cores, cpu_load) = detect_cores_and_load(args.threads).await?;
    debug!(
        "Detected {} usable cores; CPU load {:.1}%",
        max_cores, cpu_load
    );

    let sample_semaphore = Arc::new(Semaphore::new(args.max_parallel_samples.max(1)));

    let run_config = Arc::new(RunConfig {
        cwd: dir,
        out_dir,
        args,
        input,
        max_cores,
        sample_semaphore,
        log_level,
    });

    if let Err(e) = typing::run(Arc::clone(&run_config)).await {
        error!(
            "Pipeline failed: {} at {} milliseconds.",
            e,
            run_start.elapsed().as_millis()
        );
        let body = format!(
            "Pipeline failed after {} ms.\n\nError: {}\nOutput directory: {}",
            run_start.elapsed().as_millis(),
            e,
            run_config.out_dir.display()
        );
        send_run_notification(&run_config, false, &body).await;
        std::process::exit(1);
    }

    let body = format!(
        "Pipeline completed in {} ms.\nOutput directory: {}",
        run_start.elapsed().as_millis(),
        run_config.out_dir.display()
    );
    send_run_notification(&run_config, true, &body).await;

    println!("Run complete: {} milliseconds.", run_start.elapsed().as_millis());
    Ok(())
}
