//! duskcrypt - streaming authenticated-encryption volume codec.
//!
//! XChaCha20 always, optional Serpent-CTR layering, keyed BLAKE2b/HMAC-SHA3 authentication,
//! Reed-Solomon protected headers and optional inner erasure framing, archive packing, chunk
//! splitting, and an optional deniability wrapper.

mod archive;
mod cipher;
mod cli;
mod config;
mod deniability;
mod error;
mod frame;
mod header;
mod io_util;
mod kdf;
mod progress;
mod rs;
mod split;
mod volume;
mod volume_config;

use std::process;

fn init_tracing() {
    let subscriber = tracing_subscriber::fmt().with_file(true).with_line_number(true).finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

fn main() {
    init_tracing();
    if let Err(err) = cli::run() {
        eprintln!("Error: {err:?}");
        process::exit(1);
    }
}
