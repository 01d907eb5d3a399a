use anyhow::{Context, Result, anyhow, bail};
use clap::{Parser, Subcommand};
use scryptenc::{Error, Params};
use std::fs::File;
use std::io::{self, Read, Write};
use std::process;

mod auth;
use auth::PassphraseEntry;

#[derive(Debug, Parser)]
#[command(name = "scrypt")]
#[command(
    version,
    about = "Encrypt and decrypt files using the scrypt key derivation function."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Encrypt infile and write the result to outfile
    Enc(ModeArgs),
    /// Decrypt infile and write the result to outfile
    Dec(ModeArgs),
    /// Print the encryption parameters used for infile
    Info(ModeArgs),
}

#[derive(Debug, clap::Args)]
struct ModeArgs {
    /// Bypass memory and CPU time feasibility checks
    #[arg(short = 'f')]
    force: bool,

    /// Maximum memory to use, as a size with an optional SI suffix (e.g. 500M)
    #[arg(short = 'M', value_name = "maxmem")]
    max_mem: Option<String>,

    /// Maximum fraction of physical memory to use
    #[arg(short = 'm', value_name = "maxmemfrac")]
    max_mem_frac: Option<f64>,

    /// Maximum CPU time to spend, in seconds
    #[arg(short = 't', value_name = "maxtime")]
    max_time: Option<f64>,

    /// scrypt cost parameter as log2(N)
    #[arg(short = 'l', value_name = "logN")]
    log_n: Option<u8>,

    /// scrypt block size parameter
    #[arg(short = 'r', value_name = "r")]
    r: Option<u32>,

    /// scrypt parallelism parameter
    #[arg(short = 'p', value_name = "p")]
    p: Option<u32>,

    /// Print the N, r and p parameters to standard error
    #[arg(short = 'v')]
    verbose: bool,

    /// Read the passphrase from standard input, once, without confirmation
    #[arg(short = 'P')]
    passphrase_stdin: bool,

    /// Passphrase source, as method:arg (dev:tty-stdin, dev:stdin-once,
    /// dev:tty-once, env:NAME, file:PATH)
    #[arg(long = "passphrase", value_name = "method:arg")]
    passphrase: Option<String>,

    /// Input file, or - for standard input
    infile: String,

    /// Output file; standard output if omitted
    outfile: Option<String>,
}

enum Mode {
    Enc,
    Dec,
    Info,
}

fn main() {
    // Usage errors exit 1; --help and --version are not failures.
    let cli = Cli::try_parse().unwrap_or_else(|e| {
        let code = if e.use_stderr() { 1 } else { 0 };
        let _ = e.print();
        process::exit(code);
    });

    if let Err(err) = run(cli) {
        eprintln!("scrypt: {err:#}");
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let (mode, args) = match cli.command {
        Commands::Enc(args) => (Mode::Enc, args),
        Commands::Dec(args) => (Mode::Dec, args),
        Commands::Info(args) => (Mode::Info, args),
    };

    let params = resolve_params(&mode, &args)?;
    let entry = resolve_passphrase_entry(&args)?;

    let stdin_input = args.infile == "-";
    let mut input: Box<dyn Read> = if stdin_input {
        if entry == PassphraseEntry::StdinOnce {
            bail!("Cannot read both passphrase and input file from standard input");
        }
        Box::new(io::stdin().lock())
    } else {
        Box::new(
            File::open(&args.infile)
                .with_context(|| format!("Cannot open input file: {}", args.infile))?,
        )
    };

    if let Mode::Info = mode {
        let info = scryptenc::file_info(&mut input)
            .map_err(|e| describe(e, &args.infile, args.outfile.as_deref()))?;
        println!("{info}");
        return Ok(());
    }

    let confirm = matches!(mode, Mode::Enc);
    let passwd = auth::read_passphrase(&entry, confirm)?;

    match mode {
        Mode::Enc => {
            let mut output = open_output(args.outfile.as_deref())?;
            scryptenc::encrypt(
                &mut input,
                &mut output,
                passwd.as_bytes(),
                &params,
                args.verbose,
                args.force,
            )
            .map_err(|e| describe(e, &args.infile, args.outfile.as_deref()))?;
        }
        Mode::Dec => {
            // Validate the header and passphrase before the output file
            // exists, so a wrong passphrase leaves nothing behind.
            let cookie = scryptenc::decrypt_prep(
                input,
                passwd.as_bytes(),
                &params,
                args.verbose,
                args.force,
            )
            .map_err(|e| describe(e, &args.infile, args.outfile.as_deref()))?;

            let mut output = open_output(args.outfile.as_deref())?;
            cookie
                .copy(&mut output)
                .map_err(|e| describe(e, &args.infile, args.outfile.as_deref()))?;
        }
        Mode::Info => unreachable!("handled above"),
    }

    Ok(())
}

fn resolve_params(mode: &Mode, args: &ModeArgs) -> Result<Params> {
    let mut params = match mode {
        Mode::Enc => Params::for_encrypt(),
        Mode::Dec | Mode::Info => Params::for_decrypt(),
    };

    if let Some(log_n) = args.log_n {
        if !(10..=40).contains(&log_n) {
            bail!("Invalid option: -l {log_n}");
        }
        params.log_n = log_n;
    }
    if let Some(r) = args.r {
        if !(1..=128).contains(&r) {
            bail!("Invalid option: -r {r}");
        }
        params.r = r;
    }
    if let Some(p) = args.p {
        if !(1..=128).contains(&p) {
            bail!("Invalid option: -p {p}");
        }
        params.p = p;
    }
    if let Some(size) = &args.max_mem {
        params.max_mem =
            parse_size(size).ok_or_else(|| anyhow!("Could not parse the parameter to -M."))?;
    }
    if let Some(frac) = args.max_mem_frac {
        if !(0.0..=1.0).contains(&frac) {
            bail!("Invalid option: -m {frac}");
        }
        params.max_mem_frac = frac;
    }
    if let Some(time) = args.max_time {
        if time < 0.0 || time.is_nan() {
            bail!("Invalid option: -t {time}");
        }
        params.max_time = time;
    }

    Ok(params)
}

fn resolve_passphrase_entry(args: &ModeArgs) -> Result<PassphraseEntry> {
    match (&args.passphrase, args.passphrase_stdin) {
        (Some(_), true) => {
            bail!("You can only enter one --passphrase or -P argument")
        }
        (Some(arg), false) => arg
            .parse()
            .map_err(|()| anyhow!("Invalid option: --passphrase {arg}")),
        (None, true) => Ok(PassphraseEntry::StdinOnce),
        (None, false) => Ok(PassphraseEntry::TtyStdin),
    }
}

fn open_output(outfile: Option<&str>) -> Result<Box<dyn Write>> {
    match outfile {
        Some(name) => Ok(Box::new(
            File::create(name).with_context(|| format!("Cannot open output file: {name}"))?,
        )),
        None => Ok(Box::new(io::stdout().lock())),
    }
}

/// Attaches the file name to I/O failures; every other error kind already
/// carries its own message.
fn describe(err: Error, infile: &str, outfile: Option<&str>) -> anyhow::Error {
    match err {
        Error::ReadFile(e) => {
            let name = if infile == "-" { "standard input" } else { infile };
            anyhow!("Error reading file: {name}: {e}")
        }
        Error::WriteFile(e) => {
            let name = outfile.unwrap_or("standard output");
            anyhow!("Error writing file: {name}: {e}")
        }
        other => anyhow!(other),
    }
}

/// Parses a byte count with an optional SI decimal suffix ("500M", "1kB").
fn parse_size(s: &str) -> Option<u64> {
    let digits_end = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    if digits_end == 0 {
        return None;
    }

    let value: u64 = s[..digits_end].parse().ok()?;
    let multiplier: u64 = match &s[digits_end..] {
        "" | "B" => 1,
        "k" | "kB" | "K" | "KB" => 1_000,
        "M" | "MB" => 1_000_000,
        "G" | "GB" => 1_000_000_000,
        "T" | "TB" => 1_000_000_000_000,
        "P" | "PB" => 1_000_000_000_000_000,
        "E" | "EB" => 1_000_000_000_000_000_000,
        _ => return None,
    };

    value.checked_mul(multiplier)
}
