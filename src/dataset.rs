//! The ICBM 2009c Nonlinear Symmetric brain template.
//!
//! The archive is downloaded once into a local directory and unpacked; later
//! runs load the extracted NIfTI files directly. See
//! <http://www.bic.mni.mcgill.ca/ServicesAtlases/ICBM152NLin2009>.

use crate::volume::Volume;
use crate::volume_loader::{VolumeLoader, VolumeLoaderError};

use futures::StreamExt;
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

pub const ARCHIVE_NAME: &str = "mni_icbm152_nlin_sym_09c_nifti";
pub const TEMPLATE_DIR: &str = "mni_icbm152_nlin_sym_09c";
pub const DEFAULT_URL: &str =
    "https://www.bic.mni.mcgill.ca/~vfonov/icbm/2009/mni_icbm152_nlin_sym_09c_nifti.zip";
pub const DEFAULT_DOWNLOAD_DIR: &str = "./data";

const USER_AGENT: &str = concat!("volslice/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Download of {url} failed with status {status}")]
    HttpStatus { url: String, status: u16 },

    #[error("Archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to load {label}: {source}")]
    Load {
        label: TemplateLabel,
        #[source]
        source: VolumeLoaderError,
    },

    #[error("Unknown template label: {0}")]
    UnknownLabel(String),
}

/// Images shipped with the template, keyed by anatomical label.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TemplateLabel {
    T1,
    T2,
    Brain,
    Eyes,
    Face,
    Gm,
    Wm,
    Csf,
}

impl TemplateLabel {
    pub const ALL: [TemplateLabel; 8] = [
        TemplateLabel::T1,
        TemplateLabel::T2,
        TemplateLabel::Brain,
        TemplateLabel::Eyes,
        TemplateLabel::Face,
        TemplateLabel::Gm,
        TemplateLabel::Wm,
        TemplateLabel::Csf,
    ];

    pub fn name(self) -> &'static str {
        match self {
            TemplateLabel::T1 => "t1",
            TemplateLabel::T2 => "t2",
            TemplateLabel::Brain => "brain",
            TemplateLabel::Eyes => "eyes",
            TemplateLabel::Face => "face",
            TemplateLabel::Gm => "gm",
            TemplateLabel::Wm => "wm",
            TemplateLabel::Csf => "csf",
        }
    }

    /// File name inside the template directory
    pub fn file_name(self) -> String {
        let (modality, suffix) = match self {
            TemplateLabel::T1 => ("t1", ""),
            TemplateLabel::T2 => ("t2", ""),
            TemplateLabel::Brain => ("t1", "_mask"),
            TemplateLabel::Eyes => ("t1", "_eye_mask"),
            TemplateLabel::Face => ("t1", "_face_mask"),
            TemplateLabel::Gm => ("gm", ""),
            TemplateLabel::Wm => ("wm", ""),
            TemplateLabel::Csf => ("csf", ""),
        };
        format!("mni_icbm152_{modality}_tal_nlin_sym_09c{suffix}.nii")
    }
}

impl fmt::Display for TemplateLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TemplateLabel {
    type Err = DatasetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TemplateLabel::ALL
            .into_iter()
            .find(|label| label.name() == s)
            .ok_or_else(|| DatasetError::UnknownLabel(s.to_string()))
    }
}

/// Where the template comes from and where it is kept.
#[derive(Clone, Debug)]
pub struct DatasetConfig {
    pub url: String,
    pub download_dir: PathBuf,
    /// Remove the archive and anything else next to the template directory
    pub remove_zip: bool,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_URL.to_string(),
            download_dir: PathBuf::from(DEFAULT_DOWNLOAD_DIR),
            remove_zip: true,
        }
    }
}

impl DatasetConfig {
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn with_download_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.download_dir = dir.into();
        self
    }

    pub fn with_remove_zip(mut self, remove_zip: bool) -> Self {
        self.remove_zip = remove_zip;
        self
    }

    pub fn template_dir(&self) -> PathBuf {
        self.download_dir.join(TEMPLATE_DIR)
    }

    pub fn zip_path(&self) -> PathBuf {
        self.download_dir.join(format!("{ARCHIVE_NAME}.zip"))
    }
}

/// The loaded template volumes.
#[derive(Debug)]
pub struct Icbm2009NonLinSym {
    dir: PathBuf,
    volumes: BTreeMap<TemplateLabel, Volume>,
}

impl Icbm2009NonLinSym {
    /// Download and unpack the template unless it is already present, then
    /// load every labelled volume.
    ///
    /// `progress` receives the number of bytes downloaded so far and the
    /// total size when the server reports one.
    pub async fn fetch(
        config: &DatasetConfig,
        progress: impl FnMut(u64, Option<u64>),
    ) -> Result<Self, DatasetError> {
        let dir = Self::ensure_downloaded(config, progress).await?;
        tokio::task::spawn_blocking(move || Self::load(dir))
            .await
            .map_err(io::Error::other)?
    }

    /// Make sure the extracted template directory exists and return it.
    pub async fn ensure_downloaded(
        config: &DatasetConfig,
        progress: impl FnMut(u64, Option<u64>),
    ) -> Result<PathBuf, DatasetError> {
        let template_dir = config.template_dir();
        if tokio::fs::try_exists(&template_dir).await? {
            debug!(dir = %template_dir.display(), "template already present");
            return Ok(template_dir);
        }

        tokio::fs::create_dir_all(&config.download_dir).await?;
        let zip_path = config.zip_path();
        info!(url = %config.url, "downloading template");
        let bytes = download(&config.url, &zip_path, progress).await?;
        info!(bytes, path = %zip_path.display(), "download complete");

        let download_dir = config.download_dir.clone();
        let archive = zip_path.clone();
        tokio::task::spawn_blocking(move || extract(&archive, &download_dir))
            .await
            .map_err(io::Error::other)??;
        info!(dir = %template_dir.display(), "extracted template");

        if config.remove_zip {
            let download_dir = config.download_dir.clone();
            tokio::task::spawn_blocking(move || remove_other_entries(&download_dir, TEMPLATE_DIR))
                .await
                .map_err(io::Error::other)??;
        }
        Ok(template_dir)
    }

    /// Load every labelled volume from an extracted template directory.
    pub fn load(dir: impl Into<PathBuf>) -> Result<Self, DatasetError> {
        Self::load_labels(dir, &TemplateLabel::ALL)
    }

    /// Load a subset of the labelled volumes.
    pub fn load_labels(
        dir: impl Into<PathBuf>,
        labels: &[TemplateLabel],
    ) -> Result<Self, DatasetError> {
        let dir = dir.into();
        let volumes = labels
            .par_iter()
            .map(|&label| {
                VolumeLoader::load_nifti(dir.join(label.file_name()))
                    .map(|volume| (label, volume))
                    .map_err(|source| DatasetError::Load { label, source })
            })
            .collect::<Result<BTreeMap<_, _>, _>>()?;
        debug!(dir = %dir.display(), count = volumes.len(), "loaded template volumes");
        Ok(Self { dir, volumes })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn get(&self, label: TemplateLabel) -> Option<&Volume> {
        self.volumes.get(&label)
    }

    pub fn labels(&self) -> impl Iterator<Item = TemplateLabel> + '_ {
        self.volumes.keys().copied()
    }

    pub fn volumes(&self) -> &BTreeMap<TemplateLabel, Volume> {
        &self.volumes
    }

    pub fn into_volumes(self) -> BTreeMap<TemplateLabel, Volume> {
        self.volumes
    }
}

async fn download(
    url: &str,
    dest: &Path,
    mut progress: impl FnMut(u64, Option<u64>),
) -> Result<u64, DatasetError> {
    let client = reqwest::Client::builder().user_agent(USER_AGENT).build()?;
    let response = client.get(url).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(DatasetError::HttpStatus {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }

    let total = response.content_length();
    let mut file = tokio::fs::File::create(dest).await?;
    let mut stream = response.bytes_stream();
    let mut downloaded = 0u64;
    progress(downloaded, total);

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        file.write_all(&chunk).await?;
        downloaded += chunk.len() as u64;
        progress(downloaded, total);
    }
    file.flush().await?;
    Ok(downloaded)
}

fn extract(archive: &Path, dest: &Path) -> Result<(), DatasetError> {
    let file = fs::File::open(archive)?;
    let mut zip = zip::ZipArchive::new(file)?;
    debug!(entries = zip.len(), "extracting archive");
    zip.extract(dest)?;
    Ok(())
}

/// Remove everything in `dir` except the entry named `keep`. Failures are
/// logged and skipped.
fn remove_other_entries(dir: &Path, keep: &str) -> Result<(), DatasetError> {
    remove_other_entries_with(dir, keep, remove_path)
}

fn remove_other_entries_with(
    dir: &Path,
    keep: &str,
    remove: impl Fn(&Path) -> io::Result<()>,
) -> Result<(), DatasetError> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_name() == keep {
            continue;
        }
        let path = entry.path();
        match remove(&path) {
            Ok(()) => debug!(path = %path.display(), "removed"),
            Err(e) => warn!(path = %path.display(), error = %e, "failed to remove"),
        }
    }
    Ok(())
}

fn remove_path(path: &Path) -> io::Result<()> {
    fs::remove_dir_all(path).or_else(|_| fs::remove_file(path))
}
