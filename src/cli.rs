//! Command-line surface: `encrypt`/`decrypt` subcommands mapping flags onto `VolumeConfig`,
//! plus the archive/split glue each subcommand needs. No cryptographic option has a default
//! that silently changes behaviour between runs; every flag here is load-bearing.

use std::fs::{self, File};
use std::io::Cursor;
use std::path::{Path, PathBuf};

use anyhow::{bail, ensure, Context, Result};
use clap::{Parser, Subcommand};
use dialoguer::theme::ColorfulTheme;
use dialoguer::Password;
use secrecy::SecretString;

use crate::archive;
use crate::config::INCOMPLETE_SUFFIX;
use crate::deniability;
use crate::progress::TerminalProgress;
use crate::split;
use crate::volume::{self, DecryptOutcome};
use crate::volume_config::{CancelToken, KeyMaterial, VolumeConfig};

const PASSWORD_MIN_LENGTH: usize = 8;

#[derive(Parser)]
#[command(name = "duskcrypt")]
#[command(version)]
#[command(about = "Streaming authenticated-encryption volume codec with Reed-Solomon protected headers and optional deniable containers.")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Encrypt one or more files into a volume.
    Encrypt {
        /// Input file(s). More than one is zipped into a single archive before encrypting.
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Output volume path (defaults to `<first-input>.pcv`).
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Password (prompted interactively if omitted).
        #[arg(short, long)]
        password: Option<String>,

        /// Keyfile(s); order matters only when --keyfile-ordered is also given.
        #[arg(short, long)]
        keyfile: Vec<PathBuf>,

        /// Treat keyfile order as part of the key material.
        #[arg(long)]
        keyfile_ordered: bool,

        /// Stronger Argon2id profile and an added Serpent-CTR layer.
        #[arg(long)]
        paranoid: bool,

        /// Wrap every 128 bytes of ciphertext in an RS(128,136) frame for bit-rot resilience.
        #[arg(long)]
        reed_solomon: bool,

        /// Wrap the finished volume in a plaintext-indistinguishable deniability layer.
        #[arg(long)]
        deniability: bool,

        /// Compress multi-input archives with Deflate instead of storing them.
        #[arg(long)]
        compress: bool,

        /// Delete the original input(s) after a successful encrypt.
        #[arg(long)]
        delete: bool,

        /// Free-form comment stored (RS-protected, still plaintext-visible) in the header.
        #[arg(long)]
        comments: Option<String>,

        /// Split the finished volume into chunks of at most this many bytes.
        #[arg(long)]
        split: Option<u64>,
    },

    /// Decrypt a volume (or a `.pcv.0`/... chunk set) back to its original file(s).
    Decrypt {
        /// Input volume path. A path ending `.pcv.<digits>` triggers chunk joining first.
        input: PathBuf,

        /// Output path (defaults to the input with its `.pcv` suffix stripped).
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[arg(short, long)]
        password: Option<String>,

        #[arg(short, long)]
        keyfile: Vec<PathBuf>,

        #[arg(long)]
        keyfile_ordered: bool,

        /// Best-effort decrypt: keep the output even on a damaged header or failed MAC check.
        #[arg(long)]
        force_decrypt: bool,
    },
}

fn read_keyfiles(paths: &[PathBuf]) -> Result<Vec<Vec<u8>>> {
    paths.iter().map(|p| fs::read(p).with_context(|| format!("reading keyfile {}", p.display()))).collect()
}

fn prompt_password(confirm: bool) -> Result<String> {
    let theme = ColorfulTheme::default();
    let validate = |input: &String| -> std::result::Result<(), String> {
        if input.trim().is_empty() {
            return Err("password cannot be empty or whitespace only".into());
        }
        if input.len() < PASSWORD_MIN_LENGTH {
            return Err(format!("password must be at least {PASSWORD_MIN_LENGTH} characters long"));
        }
        Ok(())
    };

    let mut prompt = Password::with_theme(&theme).with_prompt("Password").validate_with(validate);
    if confirm {
        prompt = prompt.with_confirmation("Confirm password", "passwords do not match");
    }
    prompt.interact().context("password input failed")
}

fn incomplete_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(INCOMPLETE_SUFFIX);
    PathBuf::from(name)
}

fn finish_write(incomplete: &Path, final_path: &Path) -> Result<()> {
    fs::rename(incomplete, final_path)
        .with_context(|| format!("renaming {} to {}", incomplete.display(), final_path.display()))
}

pub fn run() -> Result<()> {
    match Cli::parse().command {
        Commands::Encrypt {
            inputs,
            output,
            password,
            keyfile,
            keyfile_ordered,
            paranoid,
            reed_solomon,
            deniability: use_deniability,
            compress,
            delete,
            comments,
            split: split_size,
        } => run_encrypt(EncryptArgs {
            inputs,
            output,
            password,
            keyfile_paths: keyfile,
            keyfile_ordered,
            paranoid,
            reed_solomon,
            deniability: use_deniability,
            compress,
            delete,
            comments,
            split_size,
        }),
        Commands::Decrypt { input, output, password, keyfile, keyfile_ordered, force_decrypt } => {
            run_decrypt(&input, output, password, &keyfile, keyfile_ordered, force_decrypt)
        }
    }
}

struct EncryptArgs {
    inputs: Vec<PathBuf>,
    output: Option<PathBuf>,
    password: Option<String>,
    keyfile_paths: Vec<PathBuf>,
    keyfile_ordered: bool,
    paranoid: bool,
    reed_solomon: bool,
    deniability: bool,
    compress: bool,
    delete: bool,
    comments: Option<String>,
    split_size: Option<u64>,
}

fn run_encrypt(args: EncryptArgs) -> Result<()> {
    for path in &args.inputs {
        ensure!(path.exists(), "input {} does not exist", path.display());
    }

    let password = match args.password {
        Some(p) => p,
        None => prompt_password(true)?,
    };
    let keyfiles = read_keyfiles(&args.keyfile_paths)?;

    let config = VolumeConfig {
        paranoid: args.paranoid,
        full_reed_solomon: args.reed_solomon,
        deniability: args.deniability,
        force_decrypt: false,
        comments: args.comments.unwrap_or_default().into_bytes(),
        key_material: KeyMaterial {
            password: SecretString::from(password),
            keyfiles,
            keyfile_ordered: args.keyfile_ordered,
        },
    };

    let output = args.output.unwrap_or_else(|| {
        let mut name = args.inputs[0].as_os_str().to_os_string();
        name.push(".pcv");
        PathBuf::from(name)
    });

    // Multi-input or explicitly compressed runs go through the archive packer first; a single
    // input that isn't being compressed is encrypted directly.
    let (plaintext_source, plaintext_len): (Box<dyn std::io::Read>, u64) =
        if args.inputs.len() > 1 || args.compress {
            let root = args.inputs[0].parent().unwrap_or_else(|| Path::new("."));
            let mut zip_buf = Cursor::new(Vec::new());
            archive::pack(&mut zip_buf, root, &args.inputs, args.compress)?;
            let bytes = zip_buf.into_inner();
            let len = bytes.len() as u64;
            (Box::new(Cursor::new(bytes)), len)
        } else {
            let file = File::open(&args.inputs[0])?;
            let len = file.metadata()?.len();
            (Box::new(file), len)
        };

    let inner_incomplete = incomplete_path(&output);
    {
        let mut inner_writer = File::create(&inner_incomplete)?;
        let mut progress = TerminalProgress::new();
        volume::encrypt(
            plaintext_source,
            &mut inner_writer,
            plaintext_len,
            &config,
            &mut progress,
            &CancelToken::new(),
        )?;
    }

    if args.deniability {
        let inner_len = fs::metadata(&inner_incomplete)?.len();
        let wrapped_tmp = output.with_extension("denwrap.incomplete");
        {
            let inner_reader = File::open(&inner_incomplete)?;
            let mut wrapped_writer = File::create(&wrapped_tmp)?;
            let mut progress = TerminalProgress::new();
            deniability::wrap(
                inner_reader,
                &mut wrapped_writer,
                config.key_material.password_bytes(),
                inner_len,
                &mut progress,
                &CancelToken::new(),
            )?;
        }
        fs::remove_file(&inner_incomplete)?;
        finish_write(&wrapped_tmp, &output)?;
    } else {
        finish_write(&inner_incomplete, &output)?;
    }

    if let Some(chunk_size) = args.split_size {
        let chunks = split::split(&output, &output, chunk_size)?;
        fs::remove_file(&output)?;
        println!("split into {} chunk(s)", chunks.len());
    }

    if args.delete {
        for path in &args.inputs {
            fs::remove_file(path).with_context(|| format!("deleting {}", path.display()))?;
        }
    }

    println!("encrypted -> {}", output.display());
    Ok(())
}

fn run_decrypt(
    input: &Path,
    output: Option<PathBuf>,
    password: Option<String>,
    keyfile_paths: &[PathBuf],
    keyfile_ordered: bool,
    force_decrypt: bool,
) -> Result<()> {
    let joined_input;
    let input = if let Some((base, _)) = split::parse_chunk_name(input) {
        joined_input = split::join(&base, &base)?;
        joined_input.as_path()
    } else {
        input
    };

    let password = match password {
        Some(p) => p,
        None => prompt_password(false)?,
    };
    let keyfiles = read_keyfiles(keyfile_paths)?;

    let config = VolumeConfig {
        paranoid: false,
        full_reed_solomon: false,
        deniability: false,
        force_decrypt,
        comments: Vec::new(),
        key_material: KeyMaterial { password: SecretString::from(password), keyfiles, keyfile_ordered },
    };

    let total_len = fs::metadata(input)?.len();
    let source = File::open(input)?;

    let output = output.unwrap_or_else(|| {
        let name = input.to_string_lossy();
        PathBuf::from(name.strip_suffix(".pcv").unwrap_or(&name))
    });

    let output_incomplete = incomplete_path(&output);
    let outcome: DecryptOutcome = {
        let mut writer = File::create(&output_incomplete)?;
        let mut progress = TerminalProgress::new();
        match volume::decrypt(source, &mut writer, total_len, &config, &mut progress, &CancelToken::new()) {
            Ok(outcome) => outcome,
            Err(err) => {
                drop(writer);
                let _ = fs::remove_file(&output_incomplete);
                bail!(err);
            }
        }
    };
    finish_write(&output_incomplete, &output)?;

    if outcome.kept {
        eprintln!("warning: output kept despite a damaged header or failed authentication check");
    }
    println!("decrypted -> {}", output.display());
    Ok(())
}
