//! Header checks for the IDX files of the corpus. The decoder aborts the process on anything it
//! doesn't like, so every file is looked at before it's handed over.

use std::{
    fs::File,
    io::{self, Read},
    path::Path,
};

use super::IMAGE_SIDE;
use crate::{MlErr, Result};

const IMAGES_MAGIC: u32 = 0x0000_0803;
const LABELS_MAGIC: u32 = 0x0000_0801;

fn unavailable(path: &Path, reason: impl std::fmt::Display) -> MlErr {
    MlErr::DataUnavailable(format!("{}: {reason}", path.display()))
}

/// Reads the first `N` big endian words of the file, along with the file's length.
fn read_header<const N: usize>(path: &Path) -> io::Result<([u32; N], u64)> {
    let mut file = File::open(path)?;
    let file_len = file.metadata()?.len();

    let mut header = [0u32; N];
    let mut word = [0u8; 4];
    for value in header.iter_mut() {
        file.read_exact(&mut word)?;
        *value = u32::from_be_bytes(word);
    }

    Ok((header, file_len))
}

/// Checks that `path` is an IDX image file holding exactly `count` `28x28` images.
pub(super) fn check_images(path: &Path, count: usize) -> Result<()> {
    let ([magic, n, rows, cols], file_len) =
        read_header::<4>(path).map_err(|e| unavailable(path, e))?;

    if magic != IMAGES_MAGIC {
        return Err(unavailable(path, format!("bad magic number {magic:#x}")));
    }

    if n as usize != count {
        return Err(unavailable(path, format!("holds {n} images, expected {count}")));
    }

    if (rows as usize, cols as usize) != (IMAGE_SIDE, IMAGE_SIDE) {
        return Err(unavailable(path, format!("images are {rows}x{cols}")));
    }

    let expected_len = 16 + (count * IMAGE_SIDE * IMAGE_SIDE) as u64;
    if file_len != expected_len {
        return Err(unavailable(
            path,
            format!("is {file_len} bytes long, expected {expected_len}"),
        ));
    }

    Ok(())
}

/// Checks that `path` is an IDX label file holding exactly `count` labels.
pub(super) fn check_labels(path: &Path, count: usize) -> Result<()> {
    let ([magic, n], file_len) = read_header::<2>(path).map_err(|e| unavailable(path, e))?;

    if magic != LABELS_MAGIC {
        return Err(unavailable(path, format!("bad magic number {magic:#x}")));
    }

    if n as usize != count {
        return Err(unavailable(path, format!("holds {n} labels, expected {count}")));
    }

    let expected_len = 8 + count as u64;
    if file_len != expected_len {
        return Err(unavailable(
            path,
            format!("is {file_len} bytes long, expected {expected_len}"),
        ));
    }

    Ok(())
}
