//! Archive packer (ARC): bundles multiple inputs into one ZIP stream for VOL to encrypt as a
//! single file, and its inverse. The pre-encryption temp file is never written as plaintext:
//! every byte is XORed with an ephemeral ChaCha20 keystream discarded at process exit.

use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use chacha20::cipher::{KeyIvInit, StreamCipher};
use chacha20::ChaCha20;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::config::{ARCHIVE_XOR_KEY_LEN, ARCHIVE_XOR_NONCE_LEN};
use crate::error::VolumeError;
use crate::kdf;

/// Writer adapter that XORs every byte with a fresh ChaCha20 keystream before passing it on.
/// Not an authenticated cipher: it only keeps the temp file unintelligible to a casual reader of
/// the disk, not to an attacker who can observe the in-memory key.
pub struct XorWriter<W: Write> {
    inner: W,
    cipher: ChaCha20,
}

impl<W: Write> XorWriter<W> {
    pub fn new(inner: W, key: &[u8; ARCHIVE_XOR_KEY_LEN], nonce: &[u8; ARCHIVE_XOR_NONCE_LEN]) -> Self {
        Self { inner, cipher: ChaCha20::new(key.into(), nonce.into()) }
    }
}

impl<W: Write> Write for XorWriter<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let mut scratch = buf.to_vec();
        self.cipher.apply_keystream(&mut scratch);
        self.inner.write_all(&scratch)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}

/// Mirrors `XorWriter` on the read side.
pub struct XorReader<R: Read> {
    inner: R,
    cipher: ChaCha20,
}

impl<R: Read> XorReader<R> {
    pub fn new(inner: R, key: &[u8; ARCHIVE_XOR_KEY_LEN], nonce: &[u8; ARCHIVE_XOR_NONCE_LEN]) -> Self {
        Self { inner, cipher: ChaCha20::new(key.into(), nonce.into()) }
    }
}

impl<R: Read> Read for XorReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.cipher.apply_keystream(&mut buf[..n]);
        Ok(n)
    }
}

/// Generates a fresh ephemeral XOR key/nonce pair for one archive-packing pass.
pub fn ephemeral_xor_params() -> Result<([u8; ARCHIVE_XOR_KEY_LEN], [u8; ARCHIVE_XOR_NONCE_LEN]), VolumeError> {
    Ok((kdf::random_bytes::<ARCHIVE_XOR_KEY_LEN>()?, kdf::random_bytes::<ARCHIVE_XOR_NONCE_LEN>()?))
}

/// Packs `entries` (paths relativised to `root`) into a ZIP stream written to `writer`.
pub fn pack(
    writer: impl Write + std::io::Seek,
    root: &Path,
    entries: &[PathBuf],
    compress: bool,
) -> Result<(), VolumeError> {
    let mut zip = ZipWriter::new(writer);
    let method = if compress { CompressionMethod::Deflated } else { CompressionMethod::Stored };
    let options = SimpleFileOptions::default().compression_method(method);

    for entry in entries {
        let relative = entry.strip_prefix(root).unwrap_or(entry);
        let name = relative.to_string_lossy().replace('\\', "/");
        zip.start_file(name, options).map_err(|e| std::io::Error::other(e.to_string()))?;
        let mut file = fs::File::open(entry)?;
        std::io::copy(&mut file, &mut zip)?;
    }
    zip.finish().map_err(|e| std::io::Error::other(e.to_string()))?;
    Ok(())
}

/// Unpacks a ZIP stream into `dest_dir`, rejecting any entry whose normalized path would escape
/// it (a ZIP with `../../etc/passwd`-style entries).
pub fn unpack(reader: impl Read + std::io::Seek, dest_dir: &Path) -> Result<Vec<PathBuf>, VolumeError> {
    let mut archive = ZipArchive::new(reader).map_err(|e| std::io::Error::other(e.to_string()))?;
    let mut written = Vec::with_capacity(archive.len());

    for i in 0..archive.len() {
        let mut file = archive.by_index(i).map_err(|e| std::io::Error::other(e.to_string()))?;
        let enclosed = file.enclosed_name().ok_or_else(|| VolumeError::PathEscape { entry: file.name().to_string() })?;
        let out_path = dest_dir.join(&enclosed);
        if !out_path.starts_with(dest_dir) {
            return Err(VolumeError::PathEscape { entry: file.name().to_string() });
        }

        if file.is_dir() {
            fs::create_dir_all(&out_path)?;
            continue;
        }
        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut out_file = fs::File::create(&out_path)?;
        std::io::copy(&mut file, &mut out_file)?;
        written.push(out_path);
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn xor_writer_then_reader_roundtrips() {
        let key = [1u8; ARCHIVE_XOR_KEY_LEN];
        let nonce = [2u8; ARCHIVE_XOR_NONCE_LEN];
        let plaintext = b"pretend this is a zip file".to_vec();

        let mut obfuscated = Vec::new();
        {
            let mut writer = XorWriter::new(&mut obfuscated, &key, &nonce);
            writer.write_all(&plaintext).unwrap();
        }
        assert_ne!(obfuscated, plaintext);

        let mut reader = XorReader::new(Cursor::new(&obfuscated), &key, &nonce);
        let mut recovered = Vec::new();
        reader.read_to_end(&mut recovered).unwrap();
        assert_eq!(recovered, plaintext);
    }

    #[test]
    fn pack_then_unpack_roundtrips_file_contents() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("src");
        fs::create_dir_all(&root).unwrap();
        let file_path = root.join("a.txt");
        fs::write(&file_path, b"hello archive").unwrap();

        let mut zip_bytes = Cursor::new(Vec::new());
        pack(&mut zip_bytes, &root, &[file_path.clone()], true).unwrap();

        let dest = dir.path().join("out");
        fs::create_dir_all(&dest).unwrap();
        zip_bytes.set_position(0);
        let written = unpack(zip_bytes, &dest).unwrap();
        assert_eq!(written.len(), 1);
        assert_eq!(fs::read(&written[0]).unwrap(), b"hello archive");
    }
}
