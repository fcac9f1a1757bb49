//! qcrypt: Quick Crypt command-line interface
//!
//! Commands:
//!   encrypt  - encrypt a file or stdin, one pass per `--alg`
//!   decrypt  - decrypt every pass, prompting for each password
//!   info     - show the verified block0 metadata (no password needed)
//!   bench    - recommend a PBKDF2 iteration count for this machine
//!
//! Logs go to stderr; stdout carries cipher or clear data.

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use clap::{Parser, Subcommand, ValueEnum};
use tokio::io::{AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info};

use qcrypt_core::config::{CryptoConfig, QcryptConfig};
use qcrypt_crypto::bench::{MAX_HASH_MILLIS, TARGET_HASH_MILLIS, TEST_SIZE};
use qcrypt_crypto::{
    benchmark, decrypt_stream, encrypt_stream, get_cipher_stream_info, read_all, Algorithm,
    BoxedReader, CipherDataInfo, CipherError, CipherResult, Credentials, EContext, UserCred,
};

/// Skips every password prompt when set.
const PASSWORD_ENV: &str = "QCRYPT_PASSWORD";

// ── CLI structure ──────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "qcrypt",
    version,
    about = "Quick Crypt file encryption",
    long_about = "qcrypt: password-based, multi-pass streaming encryption with password hints"
)]
struct Cli {
    /// Path to qcrypt.toml (default: $XDG_CONFIG_HOME/qcrypt/qcrypt.toml)
    #[arg(long, short = 'c', env = "QCRYPT_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); overrides the config file
    #[arg(long, env = "QCRYPT_LOG")]
    log_level: Option<String>,

    /// Log format; overrides the config file
    #[arg(long)]
    log_format: Option<LogFormat>,

    /// 32-byte user credential, base64url encoded
    #[arg(long, env = "QCRYPT_USER_CRED", hide_env_values = true)]
    user_cred: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Encrypt data, one loop per --alg (innermost first)
    Encrypt {
        /// Clear data to read (default: stdin)
        #[arg(long, short = 'i')]
        input: Option<PathBuf>,

        /// Where to write cipher data (default: stdout)
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,

        /// Cipher for one loop: AES-GCM, X20-PLY or AEGIS-256. Repeat for more loops
        #[arg(long = "alg")]
        algs: Vec<Algorithm>,

        /// PBKDF2 iteration count (default from config)
        #[arg(long)]
        ic: Option<u32>,

        /// Password hint stored encrypted with every loop
        #[arg(long)]
        hint: Option<String>,

        /// Write base64url text instead of binary
        #[arg(long)]
        armor: bool,
    },

    /// Decrypt data produced by any supported format version
    Decrypt {
        /// Cipher data to read (default: stdin)
        #[arg(long, short = 'i')]
        input: Option<PathBuf>,

        /// Where to write clear data (default: stdout)
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,

        /// Input is base64url text
        #[arg(long)]
        armor: bool,
    },

    /// Show the outermost loop's parameters and hint
    Info {
        /// Cipher data to read (default: stdin)
        #[arg(long, short = 'i')]
        input: Option<PathBuf>,

        /// Input is base64url text
        #[arg(long)]
        armor: bool,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Time PBKDF2 and suggest an iteration count
    Bench {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum, PartialEq)]
enum LogFormat {
    Json,
    Text,
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config_path = cli.config.clone().unwrap_or_else(default_config_path);
    let config = QcryptConfig::load(&config_path)
        .with_context(|| format!("loading config: {}", config_path.display()))?;

    let level = cli.log_level.as_deref().unwrap_or(&config.logging.level);
    let format = cli
        .log_format
        .unwrap_or_else(|| LogFormat::from_str(&config.logging.format, true).unwrap_or(LogFormat::Text));
    init_logging(level, format);

    debug!(
        version = env!("CARGO_PKG_VERSION"),
        config = %config_path.display(),
        "qcrypt starting"
    );

    match cli.command {
        Commands::Encrypt { input, output, algs, ic, hint, armor } => {
            let user_cred = parse_user_cred(cli.user_cred.as_deref())?;
            cmd_encrypt(&config.crypto, user_cred, input.as_deref(), output.as_deref(), &algs, ic, hint, armor)
                .await
        }
        Commands::Decrypt { input, output, armor } => {
            let user_cred = parse_user_cred(cli.user_cred.as_deref())?;
            cmd_decrypt(user_cred, input.as_deref(), output.as_deref(), armor).await
        }
        Commands::Info { input, armor, json } => {
            let user_cred = parse_user_cred(cli.user_cred.as_deref())?;
            cmd_info(user_cred, input.as_deref(), armor, json).await
        }
        Commands::Bench { json } => cmd_bench(json).await,
    }
}

fn init_logging(level: &str, format: LogFormat) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    match format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json().with_writer(io::stderr))
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_writer(io::stderr))
                .init();
        }
    }
}

fn default_config_path() -> PathBuf {
    let base = std::env::var_os("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".config")))
        .unwrap_or_else(|| PathBuf::from("."));
    base.join("qcrypt").join("qcrypt.toml")
}

// ── Argument helpers ──────────────────────────────────────────────────────────

fn parse_user_cred(encoded: Option<&str>) -> Result<UserCred> {
    let encoded = encoded.context("user credential not set\nPass --user-cred or set QCRYPT_USER_CRED")?;
    let bytes = URL_SAFE_NO_PAD
        .decode(encoded.trim().trim_end_matches('='))
        .context("user credential is not valid base64url")?;
    Ok(UserCred::try_from(bytes.as_slice())?)
}

/// Command-line algorithms win; otherwise the configured list.
fn resolve_algorithms(requested: &[Algorithm], config: &CryptoConfig) -> Result<Vec<Algorithm>> {
    if !requested.is_empty() {
        return Ok(requested.to_vec());
    }
    config
        .algorithms
        .iter()
        .map(|name| {
            name.parse::<Algorithm>()
                .with_context(|| format!("config crypto.algorithms: {name}"))
        })
        .collect()
}

fn decode_armor(text: &str) -> Result<Vec<u8>> {
    let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    URL_SAFE_NO_PAD
        .decode(compact.trim_end_matches('='))
        .context("input is not valid base64url")
}

/// Turn engine errors into messages for people.
fn explain(err: CipherError) -> anyhow::Error {
    match err {
        CipherError::CryptoOperationFailure => anyhow::anyhow!("wrong password or user credential"),
        CipherError::IntegrityFailure => {
            anyhow::anyhow!("integrity check failed: wrong user credential or altered cipher data")
        }
        CipherError::Cancelled => anyhow::anyhow!("cancelled"),
        other => anyhow::Error::new(other),
    }
}

// ── Passwords ─────────────────────────────────────────────────────────────────

fn loop_label(info: &CipherDataInfo) -> String {
    if info.lp_end > 1 {
        format!(" for loop {} of {}", info.lp, info.lp_end)
    } else {
        String::new()
    }
}

/// Blocking tty prompt. An empty answer cancels.
async fn read_password(prompt: String) -> CipherResult<String> {
    let password = tokio::task::spawn_blocking(move || rpassword::prompt_password(prompt))
        .await
        .map_err(|e| CipherError::Io(io::Error::other(e)))?
        .map_err(CipherError::Io)?;
    if password.is_empty() {
        return Err(CipherError::Cancelled);
    }
    Ok(password)
}

async fn new_password(info: CipherDataInfo, hint: Option<String>) -> CipherResult<Credentials> {
    if let Ok(password) = std::env::var(PASSWORD_ENV) {
        return Ok(Credentials::new(password, hint));
    }
    let label = loop_label(&info);
    let password = read_password(format!("Password{label} ({}): ", info.alg)).await?;
    let confirm = read_password(format!("Confirm password{label}: ")).await?;
    if password != confirm {
        return Err(CipherError::InvalidArgument("passwords do not match".into()));
    }
    Ok(Credentials::new(password, hint))
}

async fn existing_password(info: CipherDataInfo) -> CipherResult<Credentials> {
    if let Ok(password) = std::env::var(PASSWORD_ENV) {
        return Ok(Credentials::new(password, None));
    }
    let mut prompt = String::new();
    if let Some(hint) = info.hint.as_deref().filter(|h| !h.is_empty()) {
        prompt.push_str(&format!("Hint: {hint}\n"));
    }
    prompt.push_str(&format!("Password{}: ", loop_label(&info)));
    Ok(Credentials::new(read_password(prompt).await?, None))
}

// ── I/O ───────────────────────────────────────────────────────────────────────

async fn open_input(path: Option<&Path>, armor: bool) -> Result<BoxedReader> {
    let mut reader: BoxedReader = match path {
        Some(p) => Box::pin(
            tokio::fs::File::open(p)
                .await
                .with_context(|| format!("opening input: {}", p.display()))?,
        ),
        None => Box::pin(tokio::io::stdin()),
    };
    if !armor {
        return Ok(reader);
    }
    let mut text = String::new();
    reader
        .read_to_string(&mut text)
        .await
        .context("reading armored input")?;
    Ok(Box::pin(io::Cursor::new(decode_armor(&text)?)))
}

/// Copy `reader` to `path` or stdout. A partially written file is removed
/// on failure.
async fn write_output(reader: BoxedReader, path: Option<&Path>, armor: bool) -> Result<u64> {
    let Some(p) = path else {
        return drain(reader, tokio::io::stdout(), armor).await;
    };
    let file = tokio::fs::File::create(p)
        .await
        .with_context(|| format!("creating output: {}", p.display()))?;
    let result = drain(reader, file, armor).await;
    if result.is_err() {
        if let Err(e) = tokio::fs::remove_file(p).await {
            debug!("could not remove partial output {}: {e}", p.display());
        }
    }
    result
}

async fn drain<W>(mut reader: BoxedReader, mut out: W, armor: bool) -> Result<u64>
where
    W: AsyncWrite + Unpin,
{
    let written = if armor {
        let data = read_all(reader).await.map_err(explain)?;
        let text = format!("{}\n", URL_SAFE_NO_PAD.encode(data));
        out.write_all(text.as_bytes()).await.context("writing output")?;
        text.len() as u64
    } else {
        tokio::io::copy(&mut reader, &mut out)
            .await
            .map_err(|e| explain(CipherError::from(e)))?
    };
    out.flush().await.context("flushing output")?;
    Ok(written)
}

// ── `qcrypt encrypt` ──────────────────────────────────────────────────────────

#[allow(clippy::too_many_arguments)]
async fn cmd_encrypt(
    config: &CryptoConfig,
    user_cred: UserCred,
    input: Option<&Path>,
    output: Option<&Path>,
    algs: &[Algorithm],
    ic: Option<u32>,
    hint: Option<String>,
    armor: bool,
) -> Result<()> {
    let algs = resolve_algorithms(algs, config)?;
    let ic = ic.unwrap_or(config.iterations);
    let ctx = EContext::new(algs, ic)?.with_read_start(config.read_size_start);

    let clear = open_input(input, false).await?;
    let provider = move |info: CipherDataInfo| new_password(info, hint.clone());
    let cipher = encrypt_stream(&ctx, provider, user_cred, clear)?;
    let written = write_output(cipher, output, armor).await?;

    info!(
        bytes = written,
        loops = ctx.lp_end(),
        ic = ctx.ic(),
        algs = ?ctx.algs(),
        "encrypted"
    );
    Ok(())
}

// ── `qcrypt decrypt` ──────────────────────────────────────────────────────────

async fn cmd_decrypt(user_cred: UserCred, input: Option<&Path>, output: Option<&Path>, armor: bool) -> Result<()> {
    let cipher = open_input(input, armor).await?;
    let clear = decrypt_stream(existing_password, user_cred, cipher)
        .await
        .map_err(explain)?;
    let written = write_output(clear, output, false).await?;
    info!(bytes = written, "decrypted");
    Ok(())
}

// ── `qcrypt info` ─────────────────────────────────────────────────────────────

async fn cmd_info(user_cred: UserCred, input: Option<&Path>, armor: bool, json: bool) -> Result<()> {
    let cipher = open_input(input, armor).await?;
    let info = get_cipher_stream_info(user_cred, cipher).await.map_err(explain)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&info)?);
        return Ok(());
    }
    for line in info_lines(&info) {
        println!("{line}");
    }
    Ok(())
}

fn info_lines(info: &CipherDataInfo) -> Vec<String> {
    vec![
        format!("version:     {}", info.ver),
        format!("algorithm:   {} ({})", info.alg, info.alg.description()),
        format!("iterations:  {}", info.ic),
        format!("loop:        {}/{}", info.lp, info.lp_end),
        format!("salt:        {}", URL_SAFE_NO_PAD.encode(info.slt)),
        format!("iv:          {}", URL_SAFE_NO_PAD.encode(&info.iv)),
        format!("hint:        {}", info.hint.as_deref().unwrap_or("(none)")),
    ]
}

// ── `qcrypt bench` ────────────────────────────────────────────────────────────

async fn cmd_bench(json: bool) -> Result<()> {
    let estimate = benchmark(
        TEST_SIZE,
        Duration::from_millis(TARGET_HASH_MILLIS),
        Duration::from_millis(MAX_HASH_MILLIS),
    )
    .await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&estimate)?);
        return Ok(());
    }
    println!("hash rate:    {:.0} iterations/ms", estimate.hash_rate);
    println!("recommended:  {} iterations (~{TARGET_HASH_MILLIS} ms)", estimate.ic);
    println!("maximum:      {} iterations", estimate.ic_max);
    Ok(())
}
