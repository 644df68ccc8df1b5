//! Upload Batch CLI
//!
//! Uploads files into a local directory tree and appends one record per
//! file to a JSON Lines log.

use clap::{Arg, ArgAction, Command};
use std::path::PathBuf;
use std::sync::Arc;
use upload_orchestrator::{
    FsStorage, JsonlMetadata, TaskState, UploadFile, UploadOrchestrator, UploaderConfig,
};

fn command() -> Command {
    Command::new("upload-batch")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Upload a batch of files and record each one")
        .arg(
            Arg::new("files")
                .help("Files to upload")
                .required(true)
                .num_args(1..)
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("dest")
                .short('d')
                .long("dest")
                .help("Directory the files are stored under")
                .default_value("uploads")
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("records")
                .short('r')
                .long("records")
                .help("JSON Lines file receiving one record per upload")
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .help("JSON configuration file; flags override its values")
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .arg(Arg::new("owner").long("owner").help("Owner id of the uploads"))
        .arg(
            Arg::new("container")
                .long("container")
                .help("Container id the files are attached to"),
        )
        .arg(
            Arg::new("max-size")
                .long("max-size")
                .help("Largest accepted file in bytes")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new("accept")
                .long("accept")
                .help("Accepted type pattern (MIME type, wildcard or .ext); repeatable")
                .action(ArgAction::Append),
        )
        .arg(
            Arg::new("concurrency")
                .short('j')
                .long("concurrency")
                .help("Maximum number of concurrent uploads")
                .value_parser(clap::value_parser!(usize)),
        )
        .arg(
            Arg::new("timeout")
                .long("timeout")
                .help("Timeout for each storage or record call, in seconds")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Verbose output")
                .action(ArgAction::SetTrue),
        )
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let matches = command().get_matches();

    let level = if matches.get_flag("verbose") {
        "debug"
    } else {
        "info"
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let mut config = match matches.get_one::<PathBuf>("config") {
        Some(path) => UploaderConfig::from_file(path)?,
        None => UploaderConfig::new().owner_id("local").container_id("default"),
    };
    if let Some(owner) = matches.get_one::<String>("owner") {
        config = config.owner_id(owner.as_str());
    }
    if let Some(container) = matches.get_one::<String>("container") {
        config = config.container_id(container.as_str());
    }
    if let Some(&max_size) = matches.get_one::<u64>("max-size") {
        config = config.max_file_size(max_size);
    }
    if let Some(kinds) = matches.get_many::<String>("accept") {
        config = config.accepted_kinds(kinds.cloned());
    }
    if let Some(&concurrency) = matches.get_one::<usize>("concurrency") {
        config = config.max_concurrent_uploads(concurrency);
    }
    if let Some(&timeout) = matches.get_one::<u64>("timeout") {
        config = config.call_timeout(timeout);
    }

    let dest = matches
        .get_one::<PathBuf>("dest")
        .cloned()
        .unwrap_or_else(|| PathBuf::from("uploads"));
    let records = matches
        .get_one::<PathBuf>("records")
        .cloned()
        .unwrap_or_else(|| dest.join("records.jsonl"));

    let files = matches
        .get_many::<PathBuf>("files")
        .into_iter()
        .flatten()
        .map(UploadFile::from_path)
        .collect::<Result<Vec<_>, _>>()?;

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async {
        tokio::fs::create_dir_all(&dest).await?;

        let orchestrator = UploadOrchestrator::new(
            config,
            Arc::new(FsStorage::new(dest.clone())),
            Arc::new(JsonlMetadata::new(records.clone())),
        )?;

        orchestrator.admit(files);
        let summary = orchestrator.run().await?;
        log::debug!("Run summary: {:?}", summary);

        for task in orchestrator.tasks() {
            match task.state() {
                TaskState::Completed(record) => {
                    println!("  ok    {} -> {} ({})", task.file().name(), record.path, record.id)
                }
                TaskState::Failed(failure) => {
                    println!("  error {}: {}", task.file().name(), failure)
                }
                other => println!("  {} {}", other.status(), task.file().name()),
            }
        }
        println!("{}", orchestrator.stats());

        let failed = orchestrator.stats().failed;
        if failed > 0 {
            return Err(format!("{} of {} files failed to upload", failed, orchestrator.len()).into());
        }
        Ok::<(), Box<dyn std::error::Error>>(())
    })
}
