//! Asset loading collaborators.
//!
//! Loads run on a background thread and report back through a [`LoadHandle`]
//! that the frame loop polls. Nothing here touches the scene: the controller
//! decides what to do with a finished load.

pub mod gltf;
pub mod texture;

use std::io::Read;
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};

use crate::scene::material::OverlayImage;
use crate::scene::Model;

pub use self::gltf::GltfLoader;
pub use self::texture::ImageLoader;

const READ_CHUNK: usize = 64 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("unsupported URI scheme in {uri}")]
    UnsupportedScheme { uri: String },
    #[error("failed to parse glTF: {0}")]
    Gltf(#[from] ::gltf::Error),
    #[error("failed to read glTF header: {0}")]
    Header(#[from] serde_json::Error),
    #[error("asset requires {extension} but no decoder path is configured")]
    MissingDecoder { extension: String },
    #[error("decoder path {path} does not exist")]
    DecoderNotFound { path: String },
    #[error("asset requires unsupported extension {extension}")]
    UnsupportedExtension { extension: String },
    #[error("glTF has no scene to instantiate")]
    NoScene,
    #[error("failed to decode image: {0}")]
    Image(#[from] image::ImageError),
    #[error("failed to start loader thread: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("loader stopped before reporting a result")]
    Interrupted,
}

#[derive(Debug)]
pub enum LoadEvent<T> {
    Progress { loaded: u64, total: Option<u64> },
    Finished(Result<T, AssetError>),
}

#[derive(Debug)]
pub enum LoadPoll<T> {
    Pending { loaded: u64, total: Option<u64> },
    Ready(Result<T, AssetError>),
}

/// Producer side of a load: reports progress and the terminal result.
pub struct Completer<T> {
    sender: Sender<LoadEvent<T>>,
}

impl<T> Completer<T> {
    pub fn progress(&self, loaded: u64, total: Option<u64>) {
        let _ = self.sender.send(LoadEvent::Progress { loaded, total });
    }

    pub fn finish(self, result: Result<T, AssetError>) {
        let _ = self.sender.send(LoadEvent::Finished(result));
    }
}

/// Consumer side of a load. Poll until it yields `Ready`, then drop it.
pub struct LoadHandle<T> {
    uri: String,
    receiver: Receiver<LoadEvent<T>>,
    loaded: u64,
    total: Option<u64>,
    finished: bool,
}

impl<T> LoadHandle<T> {
    pub fn pair(uri: impl Into<String>) -> (Completer<T>, LoadHandle<T>) {
        let (sender, receiver) = mpsc::channel();
        let handle = LoadHandle {
            uri: uri.into(),
            receiver,
            loaded: 0,
            total: None,
            finished: false,
        };
        (Completer { sender }, handle)
    }

    /// A handle that resolves on the first poll.
    pub fn ready(uri: impl Into<String>, result: Result<T, AssetError>) -> Self {
        let (completer, handle) = Self::pair(uri);
        completer.finish(result);
        handle
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Drains pending events without blocking.
    pub fn poll(&mut self) -> LoadPoll<T> {
        if self.finished {
            return LoadPoll::Ready(Err(AssetError::Interrupted));
        }
        loop {
            match self.receiver.try_recv() {
                Ok(LoadEvent::Progress { loaded, total }) => {
                    self.loaded = loaded;
                    self.total = total;
                }
                Ok(LoadEvent::Finished(result)) => {
                    self.finished = true;
                    return LoadPoll::Ready(result);
                }
                Err(TryRecvError::Empty) => {
                    return LoadPoll::Pending {
                        loaded: self.loaded,
                        total: self.total,
                    }
                }
                Err(TryRecvError::Disconnected) => {
                    self.finished = true;
                    return LoadPoll::Ready(Err(AssetError::Interrupted));
                }
            }
        }
    }

    /// Blocks until the load finishes.
    pub fn wait(mut self) -> Result<T, AssetError> {
        loop {
            match self.receiver.recv() {
                Ok(LoadEvent::Progress { loaded, total }) => {
                    self.loaded = loaded;
                    self.total = total;
                }
                Ok(LoadEvent::Finished(result)) => return result,
                Err(_) => return Err(AssetError::Interrupted),
            }
        }
    }
}

impl<T: Send + 'static> LoadHandle<T> {
    /// Runs `job` on a named loader thread.
    pub fn spawn<F>(uri: impl Into<String>, job: F) -> Self
    where
        F: FnOnce(&Completer<T>) -> Result<T, AssetError> + Send + 'static,
    {
        let uri = uri.into();
        let (completer, handle) = Self::pair(uri.clone());
        let spawned = std::thread::Builder::new()
            .name(format!("load:{}", short_name(&uri)))
            .spawn(move || {
                let result = job(&completer);
                completer.finish(result);
            });
        match spawned {
            Ok(_) => handle,
            Err(err) => Self::ready(uri, Err(AssetError::Spawn(err))),
        }
    }
}

pub trait ModelSource {
    fn load_model(&self, uri: &str) -> LoadHandle<Model>;
}

pub trait TextureSource {
    fn load_texture(&self, uri: &str) -> LoadHandle<OverlayImage>;
}

/// Maps a bare path or `file://` URI onto a local path.
pub fn resolve_uri(uri: &str) -> Result<PathBuf, AssetError> {
    if let Some(path) = uri.strip_prefix("file://") {
        return Ok(PathBuf::from(path));
    }
    if let Some((scheme, _)) = uri.split_once("://") {
        if scheme.chars().all(|c| c.is_ascii_alphanumeric() || c == '+') {
            return Err(AssetError::UnsupportedScheme {
                uri: uri.to_string(),
            });
        }
    }
    Ok(PathBuf::from(uri))
}

/// Reads a whole file in chunks, reporting progress after each one.
pub fn read_with_progress<T>(uri: &str, completer: &Completer<T>) -> Result<Vec<u8>, AssetError> {
    let path = resolve_uri(uri)?;
    let read_err = |source| AssetError::Read {
        path: path.display().to_string(),
        source,
    };
    let mut file = std::fs::File::open(&path).map_err(read_err)?;
    let total = file.metadata().ok().map(|meta| meta.len());
    let mut bytes = Vec::with_capacity(total.unwrap_or(0) as usize);
    let mut chunk = vec![0u8; READ_CHUNK];
    loop {
        let count = file.read(&mut chunk).map_err(read_err)?;
        if count == 0 {
            break;
        }
        bytes.extend_from_slice(&chunk[..count]);
        completer.progress(bytes.len() as u64, total);
    }
    Ok(bytes)
}

/// File name without directories, for log lines and thread names.
pub fn short_name(uri: &str) -> &str {
    uri.rsplit(['/', '\\']).next().unwrap_or(uri)
}

#[cfg(test)]
pub(crate) fn temp_path(prefix: &str, extension: &str) -> PathBuf {
    let nonce = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|elapsed| elapsed.as_nanos())
        .unwrap_or_default();
    let mut path = std::env::temp_dir();
    path.push(format!(
        "modelstage_{}_{}_{}.{}",
        prefix,
        std::process::id(),
        nonce,
        extension
    ));
    path
}
