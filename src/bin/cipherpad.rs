//! Cipherpad CLI - passphrase-based text encryption
//!
//! Encrypts text or files into a base64 envelope using AES-256-GCM with a
//! SHA-256 passphrase key, and decrypts such envelopes back.

use clap::{Args, Parser, Subcommand};
use std::error::Error as StdError;
use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::process;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cipherpad::error::{CipherpadError, ErrorCategory, ErrorKind, Result};
use cipherpad::passphrase::{
    self, ConstantPassphraseReader, PassphraseReader, ReaderPassphraseReader,
    TerminalPassphraseReader,
};
use cipherpad::text_ops::{self, IvSource};

#[derive(Parser)]
#[command(name = "cipherpad")]
#[command(version)]
#[command(about = "Passphrase-based text encryption.", long_about = None)]
struct Cli {
    /// Read passphrase from stdin instead of from terminal
    #[arg(long, global = true)]
    passphrase_stdin: bool,

    /// More log output on stderr (-v debug, -vv trace); RUST_LOG overrides
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct IoArgs {
    /// Path to the file to read; stdin if neither this nor --text is given
    #[arg(short, long, value_name = "FILE", conflicts_with = "text")]
    input: Option<PathBuf>,

    /// Text to process, given directly on the command line
    #[arg(short, long, value_name = "TEXT")]
    text: Option<String>,

    /// Path to the file to write the result to; stdout if omitted
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Encrypt text into an envelope
    #[command(alias = "e")]
    Encrypt {
        #[command(flatten)]
        io: IoArgs,
    },

    /// Decrypt an envelope, or bare ciphertext together with its IV
    #[command(alias = "d")]
    Decrypt {
        #[command(flatten)]
        io: IoArgs,

        /// Base64 IV to pair with bare ciphertext
        #[arg(long, value_name = "BASE64")]
        iv: Option<String>,

        /// Take the IV from a previously saved envelope file
        #[arg(long, value_name = "FILE")]
        iv_from: Option<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut reader = get_passphrase_reader(cli.passphrase_stdin);
    let result = match cli.command {
        Commands::Encrypt { io } => run_encrypt(&io, cli.passphrase_stdin, &mut *reader),
        Commands::Decrypt { io, iv, iv_from } => {
            run_decrypt(&io, iv, iv_from, cli.passphrase_stdin, &mut *reader)
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {}", render_error(&e));
        process::exit(1);
    }
}

fn run_encrypt(
    args: &IoArgs,
    passphrase_stdin: bool,
    reader: &mut dyn PassphraseReader,
) -> Result<()> {
    let mut reader = checked_passphrase(reader)?;

    let plaintext = match (&args.input, &args.text) {
        (Some(path), _) => {
            if let Some(output) = &args.output {
                return text_ops::encrypt_file(path, output, &mut reader);
            }
            std::fs::read(path).map_err(|e| {
                CipherpadError::io(
                    ErrorCategory::User,
                    format!("failed to read from {}", path.display()),
                    e,
                )
            })?
        }
        (None, Some(text)) => text.clone().into_bytes(),
        (None, None) => read_stdin(passphrase_stdin)?,
    };

    let armored = text_ops::encrypt_text(&plaintext, &mut reader)?;
    match &args.output {
        Some(path) => text_ops::export_file(path, armored.as_bytes()),
        None => write_stdout(format!("{}\n", armored).as_bytes()),
    }
}

fn run_decrypt(
    args: &IoArgs,
    iv: Option<String>,
    iv_from: Option<PathBuf>,
    passphrase_stdin: bool,
    reader: &mut dyn PassphraseReader,
) -> Result<()> {
    let mut reader = checked_passphrase(reader)?;

    // A file without an IV is not an error; the input may hold a full envelope.
    let carried = iv_from
        .as_deref()
        .map(text_ops::read_iv_file)
        .transpose()?
        .flatten();
    let iv = IvSource {
        carried,
        supplied: iv,
    };

    let (input, iv) = match (&args.input, &args.text) {
        (Some(path), _) => {
            if let Some(output) = &args.output {
                return text_ops::decrypt_file(path, output, &iv, &mut reader);
            }
            let imported = text_ops::import_file(path)?;
            let iv = IvSource {
                carried: imported.carried_iv().map(str::to_string).or(iv.carried),
                supplied: iv.supplied,
            };
            (imported.input_text().to_string(), iv)
        }
        (None, Some(text)) => (text.clone(), iv),
        (None, None) => {
            let bytes = read_stdin(passphrase_stdin)?;
            let text = String::from_utf8(bytes).map_err(|e| {
                CipherpadError::with_kind_and_source(
                    ErrorCategory::User,
                    ErrorKind::Io,
                    "input is not valid UTF-8",
                    e,
                )
            })?;
            (text, iv)
        }
    };

    let plaintext = text_ops::decrypt_text(&input, &iv, &mut reader)?;
    match &args.output {
        Some(path) => text_ops::export_file(path, &plaintext),
        None => write_stdout(&plaintext),
    }
}

/// Read the passphrase before touching any input so an empty one is
/// reported ahead of file errors.
fn checked_passphrase(reader: &mut dyn PassphraseReader) -> Result<ConstantPassphraseReader> {
    let passphrase = passphrase::read_required(reader)?;
    Ok(ConstantPassphraseReader::new(passphrase.to_vec()))
}

fn read_stdin(passphrase_stdin: bool) -> Result<Vec<u8>> {
    if passphrase_stdin {
        return Err(CipherpadError::with_kind(
            ErrorCategory::User,
            ErrorKind::Io,
            "stdin carries the passphrase; give the input with --input or --text",
        ));
    }
    let mut data = Vec::new();
    io::stdin()
        .read_to_end(&mut data)
        .map_err(|e| CipherpadError::io(ErrorCategory::Internal, "failed to read stdin", e))?;
    Ok(data)
}

fn write_stdout(data: &[u8]) -> Result<()> {
    let mut stdout = io::stdout().lock();
    stdout
        .write_all(data)
        .and_then(|()| stdout.flush())
        .map_err(|e| CipherpadError::io(ErrorCategory::Internal, "failed to write stdout", e))
}

fn get_passphrase_reader(use_stdin: bool) -> Box<dyn PassphraseReader> {
    if use_stdin {
        Box::new(ReaderPassphraseReader::new(Box::new(io::stdin())))
    } else {
        Box::new(TerminalPassphraseReader)
    }
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_level.into()))
        .init();
}

/// The message followed by every source in the chain, colon-separated.
fn render_error(err: &CipherpadError) -> String {
    let mut rendered = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        rendered.push_str(": ");
        rendered.push_str(&cause.to_string());
        source = cause.source();
    }
    rendered
}
