//! Built-in datasets for easy testing and experimentation.

use std::env;
use std::fs::{create_dir_all, rename, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::Context;

use crate::data::{Rating, Ratings};

const MOVIELENS_100K_URL: &str =
    "https://files.grouplens.org/datasets/movielens/ml-100k/u.data";

fn default_data_dir() -> PathBuf {
    env::temp_dir().join(".receval-data")
}

fn download(url: &str, dest_filename: &Path, data_dir: Option<&Path>) -> anyhow::Result<PathBuf> {
    let data_dir = data_dir
        .map(Path::to_path_buf)
        .unwrap_or_else(default_data_dir);
    if !data_dir.exists() {
        create_dir_all(&data_dir)
            .with_context(|| format!("creating data directory {}", data_dir.display()))?;
    }

    let desired_filename = data_dir.join(dest_filename);
    let temp_filename = env::temp_dir().join(dest_filename);

    if !desired_filename.exists() {
        let file = File::create(&temp_filename)?;
        let mut writer = BufWriter::new(file);

        let mut response = reqwest::blocking::get(url)
            .and_then(|response| response.error_for_status())
            .with_context(|| format!("downloading {url}"))?;
        response.copy_to(&mut writer)?;
        writer.flush()?;

        rename(&temp_filename, &desired_filename)?;
    }

    Ok(desired_filename)
}

/// Download the MovieLens 100K ratings and return them.
///
/// The raw file (`u.data`) is tab-separated `user id`, `item id`,
/// `rating`, `timestamp` rows without a header. It is cached under
/// `data_dir`, or a directory inside the system temp dir when `None`.
pub fn download_movielens_100k(data_dir: Option<&Path>) -> anyhow::Result<Ratings> {
    let path = download(
        MOVIELENS_100K_URL,
        Path::new("movielens_100k.tsv"),
        data_dir,
    )?;

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .from_path(&path)
        .with_context(|| format!("opening dataset {}", path.display()))?;

    let rows: Vec<Rating> = reader
        .deserialize()
        .collect::<Result<_, _>>()
        .with_context(|| format!("parsing dataset {}", path.display()))?;

    Ok(Ratings::from(rows))
}
