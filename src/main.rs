//! Purpose: `rscpq` CLI entry point and command dispatch.
//! Role: Binary crate root; parses args, decodes requests, emits JSON on stdout.
//! Invariants: Decoded output goes to stdout; errors and logs go to stderr.
//! Invariants: Non-interactive errors are emitted as a JSON envelope on stderr.
//! Invariants: Process exit code is derived from `api::to_exit_code`.
use std::io::{self, IsTerminal, Read};

use clap::{CommandFactory, Parser, Subcommand, error::ErrorKind as ClapErrorKind};
use clap_complete::aot::Shell;
use serde::Serialize;
use serde_json::{Map, Value, json};
use tracing_subscriber::EnvFilter;

use rscpq::api::{
    Error, ErrorKind, Registry, RequestDecoder, message_json, messages_json, to_exit_code,
};

#[derive(Copy, Clone, Debug)]
struct RunOutcome {
    exit_code: i32,
}

impl RunOutcome {
    fn ok() -> Self {
        Self { exit_code: 0 }
    }

    fn with_code(exit_code: i32) -> Self {
        Self { exit_code }
    }
}

fn main() {
    init_tracing();
    let exit_code = match run() {
        Ok(outcome) => outcome.exit_code,
        Err(err) => {
            emit_error(&err);
            to_exit_code(err.kind())
        }
    };
    std::process::exit(exit_code);
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("RSCPQ_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn run() -> Result<RunOutcome, Error> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => match err.kind() {
            ClapErrorKind::DisplayHelp
            | ClapErrorKind::DisplayVersion
            | ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => {
                err.print().map_err(|io_err| {
                    Error::new(ErrorKind::Io)
                        .with_message("failed to write help")
                        .with_source(io_err)
                })?;
                let exit_code = if matches!(
                    err.kind(),
                    ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
                ) {
                    2
                } else {
                    0
                };
                return Ok(RunOutcome::with_code(exit_code));
            }
            _ => {
                return Err(Error::new(ErrorKind::Usage)
                    .with_message(err.to_string())
                    .with_hint("Run `rscpq --help` for usage."));
            }
        },
    };

    let registry = Registry::new();
    dispatch_command(cli.command, &registry)
}

#[derive(Parser)]
#[command(
    name = "rscpq",
    version,
    about = "Decode terse operator JSON into canonical RSCP request messages"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Decode one request (bare tag, tuple, or object) and print it.
    Decode {
        /// The JSON request; read from stdin when omitted.
        request: Option<String>,
    },
    /// Decode a batch array of requests and print the decoded sequence.
    Batch {
        /// The JSON batch array; read from stdin when omitted.
        requests: Option<String>,
    },
    /// List the known tags with their wire ids and default datatypes.
    Tags,
    /// List the known datatypes with their wire ids.
    Datatypes,
    /// Generate shell completions.
    Completion { shell: Shell },
}

#[derive(Serialize)]
struct TagRow {
    tag: &'static str,
    id: u32,
    data_type: &'static str,
}

#[derive(Serialize)]
struct DataTypeRow {
    data_type: &'static str,
    id: u8,
}

fn dispatch_command(command: Command, registry: &Registry) -> Result<RunOutcome, Error> {
    match command {
        Command::Decode { request } => {
            let input = read_request_input(request)?;
            let decoder = RequestDecoder::new(registry);
            let message = decoder.decode_one(input.as_bytes())?;
            tracing::debug!(tag = %message.tag.name(), "decoded request");
            emit_json(message_json(&message));
            Ok(RunOutcome::ok())
        }
        Command::Batch { requests } => {
            let input = read_request_input(requests)?;
            let decoder = RequestDecoder::new(registry);
            let messages = decoder.decode_many(input.as_bytes())?;
            tracing::debug!(count = messages.len(), "decoded batch");
            emit_json(messages_json(&messages));
            Ok(RunOutcome::ok())
        }
        Command::Tags => {
            let rows = registry
                .tags()
                .map(|(tag, id, data_type)| TagRow {
                    tag,
                    id,
                    data_type: data_type.name(),
                })
                .collect::<Vec<_>>();
            let value = serde_json::to_value(&rows).map_err(|err| {
                Error::new(ErrorKind::Internal)
                    .with_message("failed to encode tag listing")
                    .with_source(err)
            })?;
            emit_json(json!({ "tags": value }));
            Ok(RunOutcome::ok())
        }
        Command::Datatypes => {
            let rows = registry
                .data_types()
                .map(|(data_type, id)| DataTypeRow { data_type, id })
                .collect::<Vec<_>>();
            let value = serde_json::to_value(&rows).map_err(|err| {
                Error::new(ErrorKind::Internal)
                    .with_message("failed to encode datatype listing")
                    .with_source(err)
            })?;
            emit_json(json!({ "datatypes": value }));
            Ok(RunOutcome::ok())
        }
        Command::Completion { shell } => {
            let mut cmd = Cli::command();
            clap_complete::aot::generate(shell, &mut cmd, "rscpq", &mut io::stdout());
            Ok(RunOutcome::ok())
        }
    }
}

fn read_request_input(arg: Option<String>) -> Result<String, Error> {
    if let Some(input) = arg {
        return Ok(input);
    }
    if io::stdin().is_terminal() {
        return Err(Error::new(ErrorKind::Usage)
            .with_message("no request provided")
            .with_hint("Pass the JSON request as an argument or pipe it on stdin."));
    }
    let mut input = String::new();
    io::stdin().read_to_string(&mut input).map_err(|err| {
        Error::new(ErrorKind::Io)
            .with_message("failed to read stdin")
            .with_source(err)
    })?;
    Ok(input)
}

fn emit_json(value: Value) {
    let json = if io::stdout().is_terminal() {
        serde_json::to_string_pretty(&value)
            .unwrap_or_else(|_| "{\"error\":\"json encode failed\"}".to_string())
    } else {
        serde_json::to_string(&value)
            .unwrap_or_else(|_| "{\"error\":\"json encode failed\"}".to_string())
    };
    println!("{json}");
}

fn emit_error(err: &Error) {
    if io::stderr().is_terminal() {
        eprintln!("error: {}", error_message(err));
        if let Some(name) = err.name() {
            eprintln!("name: {name}");
        }
        if let Some(hint) = err.hint() {
            eprintln!("hint: {hint}");
        }
        return;
    }

    let value = error_json(err);
    let json = serde_json::to_string(&value).unwrap_or_else(|_| {
        "{\"error\":{\"kind\":\"Internal\",\"message\":\"json encode failed\"}}".to_string()
    });
    eprintln!("{json}");
}

fn error_message(err: &Error) -> String {
    if let Some(message) = err.message() {
        return message.to_string();
    }
    match err.kind() {
        ErrorKind::Internal => "internal error".to_string(),
        ErrorKind::Usage => "usage error".to_string(),
        ErrorKind::Parse => "invalid json input".to_string(),
        ErrorKind::UnknownTag => "unknown tag".to_string(),
        ErrorKind::UnknownDataType => "unknown datatype".to_string(),
        ErrorKind::InvalidShape => "invalid request shape".to_string(),
        ErrorKind::Coercion => "value coercion failed".to_string(),
        ErrorKind::Io => "i/o error".to_string(),
    }
}

fn error_causes(err: &Error) -> Vec<String> {
    use std::error::Error as StdError;
    let mut causes = Vec::new();
    let mut cur = err.source();
    while let Some(source) = cur {
        causes.push(source.to_string());
        cur = source.source();
    }
    causes
}

fn error_json(err: &Error) -> Value {
    let mut inner = Map::new();
    inner.insert("kind".to_string(), json!(format!("{:?}", err.kind())));
    inner.insert("message".to_string(), json!(error_message(err)));
    if let Some(name) = err.name() {
        inner.insert("name".to_string(), json!(name));
    }
    if let Some(hint) = err.hint() {
        inner.insert("hint".to_string(), json!(hint));
    }
    let causes = error_causes(err);
    if !causes.is_empty() {
        inner.insert("causes".to_string(), json!(causes));
    }

    let mut outer = Map::new();
    outer.insert("error".to_string(), Value::Object(inner));
    Value::Object(outer)
}
