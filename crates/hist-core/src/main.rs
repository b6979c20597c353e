//! historian - ingest and query topic time series.
//!
//! All command output is JSON on stdout; logs go to stderr.
//!
//! With the default `memory` backend nothing survives the process. Configure
//! `storage.backend = "duckdb"` with a `path` (and build with the `duckdb`
//! feature) to keep data between runs.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};

use clap::{ArgAction, Parser, Subcommand};
use hist_common::{Error, Metadata, Order, PublishRecord, QueryRequest, QueryResult, Result, SCHEMA_VERSION};
use hist_config::{resolve_config, Backend, ConfigPaths, HistorianConfig};
use hist_core::logging::{init_logging, LogFormat};
use hist_core::{BatchReport, ExitCode, Historian, PointRejection};
use hist_store::{MemoryStore, StorageClient};
use serde::Serialize;
use tracing::{error, info, info_span, warn};

/// Time-series historian: ingest measurement batches and query topic history.
#[derive(Parser)]
#[command(name = "historian", version, about)]
struct Cli {
    /// Config file (.toml or .json); otherwise HISTORIAN_CONFIG, then the user config dir
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Log line format on stderr
    #[arg(long, value_enum, default_value_t = LogFormat::Text, global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Ingest publish records from a JSON-lines file ("-" for stdin)
    Ingest {
        file: PathBuf,

        /// Records per batch; each batch is acknowledged separately
        #[arg(long, default_value_t = 100, value_parser = clap::value_parser!(u64).range(1..))]
        batch_size: u64,
    },
    /// Query the history of one topic, e.g. `device/building/ahu1/temp`
    Query {
        topic: String,

        /// Inclusive lower bound (ISO-8601); defaults to now when no bound is given
        #[arg(long)]
        start: Option<String>,

        /// Exclusive upper bound (ISO-8601)
        #[arg(long)]
        end: Option<String>,

        /// FIRST_TO_LAST or LAST_TO_FIRST
        #[arg(long, default_value = "FIRST_TO_LAST")]
        order: String,

        /// Rows to skip
        #[arg(long, default_value_t = 0)]
        skip: u64,

        /// Maximum rows to return (configured default when omitted)
        #[arg(long)]
        count: Option<u64>,
    },
    /// List every known topic
    Topics,
    /// Show the stored metadata of one or more topics
    Metadata {
        #[arg(required = true)]
        topics: Vec<String>,
    },
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.log_format);
    let code = run(cli);
    std::process::exit(code.as_i32());
}

fn fail(err: &Error) -> ExitCode {
    error!(code = err.code(), "{err}");
    eprintln!("historian: {err}");
    ExitCode::from(err)
}

fn emit<T: Serialize>(value: &T) -> ExitCode {
    match serde_json::to_string_pretty(value) {
        Ok(text) => {
            println!("{text}");
            ExitCode::Clean
        }
        Err(err) => {
            eprintln!("historian: failed to render output: {err}");
            ExitCode::InternalError
        }
    }
}

fn open_client(config: &HistorianConfig) -> Result<Box<dyn StorageClient>> {
    match config.storage.backend {
        Backend::Memory => {
            if config.storage.path.is_some() {
                warn!("storage.path is ignored by the memory backend");
            }
            Ok(Box::new(MemoryStore::new()))
        }
        #[cfg(feature = "duckdb")]
        Backend::Duckdb => {
            let layout = hist_store::TableLayout::with_prefix(config.tables.prefix.clone());
            let client = hist_store::DuckDbClient::open(config.storage.path.as_deref(), layout)?;
            Ok(Box::new(client))
        }
        #[cfg(not(feature = "duckdb"))]
        Backend::Duckdb => Err(Error::Config(
            "duckdb backend requested but this build lacks the `duckdb` feature".into(),
        )),
    }
}

fn run(cli: Cli) -> ExitCode {
    let resolved = match resolve_config(&ConfigPaths::discover(cli.config.clone())) {
        Ok(resolved) => resolved,
        Err(err) => return fail(&err.into()),
    };
    info!(
        source = ?resolved.snapshot.source,
        path = ?resolved.snapshot.path,
        fingerprint = %resolved.snapshot.fingerprint,
        "configuration resolved"
    );

    let client = match open_client(&resolved.config) {
        Ok(client) => client,
        Err(err) => return fail(&err),
    };
    let root = info_span!("historian_cli");
    let mut historian = Historian::new(client, resolved.config, &root);
    if let Err(err) = historian.setup() {
        return fail(&err);
    }

    match cli.command {
        Command::Ingest { file, batch_size } => cmd_ingest(&mut historian, &file, batch_size),
        Command::Query {
            topic,
            start,
            end,
            order,
            skip,
            count,
        } => {
            let order: Order = match order.parse() {
                Ok(order) => order,
                Err(err) => return fail(&err),
            };
            let request = QueryRequest {
                topic,
                start,
                end,
                order,
                skip,
                count,
            };
            match historian.query(&request) {
                Ok(result) => emit(&QueryOutput {
                    schema_version: SCHEMA_VERSION,
                    topic: &request.topic,
                    result,
                }),
                Err(err) => fail(&err),
            }
        }
        Command::Topics => emit(&TopicsOutput {
            schema_version: SCHEMA_VERSION,
            topics: historian.topic_list(),
        }),
        Command::Metadata { topics } => emit(&MetadataOutput {
            schema_version: SCHEMA_VERSION,
            metadata: historian.topics_metadata(topics.as_slice()),
        }),
    }
}

#[derive(Serialize)]
struct QueryOutput<'a> {
    schema_version: &'static str,
    topic: &'a str,
    #[serde(flatten)]
    result: QueryResult,
}

#[derive(Serialize)]
struct TopicsOutput {
    schema_version: &'static str,
    topics: Vec<String>,
}

#[derive(Serialize)]
struct MetadataOutput {
    schema_version: &'static str,
    metadata: BTreeMap<String, Metadata>,
}

#[derive(Serialize)]
struct FailedBatch {
    batch: usize,
    /// Index of the batch's first record in the input.
    first_record: usize,
    records: usize,
    error: String,
}

#[derive(Serialize, Default)]
struct IngestOutput {
    schema_version: &'static str,
    batches: usize,
    acknowledged: usize,
    received: usize,
    stored: usize,
    inserted: usize,
    metadata_writes: usize,
    /// Record indexes are positions in the whole input.
    rejected: Vec<PointRejection>,
    unacknowledged: Vec<FailedBatch>,
}

impl IngestOutput {
    fn absorb(&mut self, report: BatchReport, offset: usize) {
        self.received += report.received;
        self.stored += report.stored;
        self.inserted += report.inserted;
        self.metadata_writes += report.metadata_writes;
        self.rejected
            .extend(report.rejected.into_iter().map(|mut rejection| {
                rejection.index += offset;
                rejection
            }));
    }
}

/// Parse JSON-lines publish records. Blank lines are skipped.
fn read_records(path: &Path) -> Result<Vec<PublishRecord>> {
    let reader: Box<dyn BufRead> = if path == Path::new("-") {
        Box::new(BufReader::new(io::stdin()))
    } else {
        Box::new(BufReader::new(File::open(path)?))
    };

    let mut records = Vec::new();
    for (lineno, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let record: PublishRecord = serde_json::from_str(&line).map_err(|e| {
            Error::InvalidRecord(format!("{}:{}: {e}", path.display(), lineno + 1))
        })?;
        records.push(record);
    }
    Ok(records)
}

fn cmd_ingest<C: StorageClient>(historian: &mut Historian<C>, file: &Path, batch_size: u64) -> ExitCode {
    let records = match read_records(file) {
        Ok(records) => records,
        Err(err) => return fail(&err),
    };
    let size = usize::try_from(batch_size).unwrap_or(usize::MAX);

    let mut output = IngestOutput {
        schema_version: SCHEMA_VERSION,
        ..IngestOutput::default()
    };
    for (batch, chunk) in records.chunks(size).enumerate() {
        let offset = batch * size;
        let mut acked = false;
        let mut ack = |_: &BatchReport| acked = true;
        output.batches += 1;
        match historian.publish(chunk, &mut ack) {
            Ok(report) => {
                if acked {
                    output.acknowledged += 1;
                }
                output.absorb(report, offset);
            }
            Err(err) => {
                warn!(batch, error = %err, "batch not acknowledged");
                output.unacknowledged.push(FailedBatch {
                    batch,
                    first_record: offset,
                    records: chunk.len(),
                    error: err.to_string(),
                });
            }
        }
    }

    let code = emit(&output);
    if code.is_success() && !output.unacknowledged.is_empty() {
        ExitCode::BatchNotAcknowledged
    } else {
        code
    }
}
