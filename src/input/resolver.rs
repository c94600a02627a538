//! Validation and normalization of request inputs.
//!
//! URL requests are checked before they reach the model: inline images are
//! accepted as they are, every other URL must answer a HEAD probe with an
//! `image/*` content type. Uploaded files are checked against the extension
//! allow-list and written to temporary files that are deleted when the
//! returned [`ResolvedInputs`] is dropped.

use crate::constants::{ALLOWED_EXTENSIONS, INLINE_IMAGE_PREFIX};
use crate::error::{Error, Result};
use crate::input::remote::RemoteImages;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::TempPath;
use tracing::{debug, info};

/// A file uploaded with a request.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    /// Name the client gave the file.
    pub filename: String,
    /// File contents.
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    /// Read a file from disk, keeping its base name.
    pub fn from_path(path: &Path) -> Result<Self> {
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let bytes = std::fs::read(path).map_err(|e| Error::InputFileRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        Ok(Self { filename, bytes })
    }
}

/// How the images of a request were supplied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    /// Remote or inline URLs.
    Url,
    /// Uploaded files persisted locally.
    Local,
}

/// One validated, addressable image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    /// `http(s)` URL that passed the probe.
    Remote(String),
    /// `data:image/...;base64,` URL.
    Inline(String),
    /// Temporary copy of an uploaded file.
    Local {
        /// Temporary file path.
        path: PathBuf,
        /// Name the client gave the file.
        filename: String,
    },
}

impl ImageSource {
    /// Short name for logs and error messages.
    pub fn display_name(&self) -> &str {
        match self {
            Self::Remote(url) => url,
            Self::Inline(_) => "inline image",
            Self::Local { filename, .. } => filename,
        }
    }
}

/// Validated inputs of one request.
///
/// Owns the temporary files of uploaded inputs; they are removed on drop,
/// whichever way the request ends.
#[derive(Debug)]
pub struct ResolvedInputs {
    mode: InputMode,
    sources: Vec<ImageSource>,
    _temp_files: Vec<TempPath>,
}

impl ResolvedInputs {
    /// How the inputs were supplied.
    pub fn mode(&self) -> InputMode {
        self.mode
    }

    /// The images, in request order.
    pub fn sources(&self) -> &[ImageSource] {
        &self.sources
    }

    /// Number of images.
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    /// Whether there are no images.
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

/// Turns request inputs into [`ResolvedInputs`].
#[derive(Debug, Clone)]
pub struct InputResolver {
    remote: RemoteImages,
}

impl InputResolver {
    /// Create a resolver probing URLs with `remote`.
    pub fn new(remote: RemoteImages) -> Self {
        Self { remote }
    }

    /// HTTP client shared with image loading.
    pub fn remote(&self) -> &RemoteImages {
        &self.remote
    }

    /// Validate a list of URLs.
    pub async fn resolve_urls(&self, urls: &[String]) -> Result<ResolvedInputs> {
        if urls.is_empty() {
            return Err(Error::EmptyQuery);
        }

        let mut sources = Vec::with_capacity(urls.len());
        for url in urls {
            if url.starts_with(INLINE_IMAGE_PREFIX) {
                sources.push(ImageSource::Inline(url.clone()));
                continue;
            }
            self.remote.probe(url).await?;
            sources.push(ImageSource::Remote(url.clone()));
        }

        info!("Resolved {} url input(s)", sources.len());
        Ok(ResolvedInputs {
            mode: InputMode::Url,
            sources,
            _temp_files: Vec::new(),
        })
    }

    /// Validate uploaded files and persist them to temporary files.
    ///
    /// Every extension is checked before anything is written.
    pub fn resolve_files(&self, files: &[UploadedFile]) -> Result<ResolvedInputs> {
        if files.is_empty() {
            return Err(Error::EmptyQuery);
        }

        for file in files {
            check_extension(&file.filename)?;
        }

        let mut sources = Vec::with_capacity(files.len());
        let mut temp_files = Vec::with_capacity(files.len());
        for file in files {
            let temp = persist(file)?;
            sources.push(ImageSource::Local {
                path: temp.to_path_buf(),
                filename: file.filename.clone(),
            });
            temp_files.push(temp);
        }

        info!("Resolved {} file input(s)", sources.len());
        Ok(ResolvedInputs {
            mode: InputMode::Local,
            sources,
            _temp_files: temp_files,
        })
    }
}

/// Extension after the last dot; the whole name when there is none.
fn extension(filename: &str) -> &str {
    let base = filename.rsplit(['/', '\\']).next().unwrap_or(filename);
    base.rsplit('.').next().unwrap_or(base)
}

/// Case-sensitive allow-list check.
pub fn check_extension(filename: &str) -> Result<()> {
    if ALLOWED_EXTENSIONS.contains(&extension(filename)) {
        return Ok(());
    }
    Err(Error::UnsupportedExtension {
        filename: filename.to_string(),
        allowed: ALLOWED_EXTENSIONS.join(", "),
    })
}

fn persist(file: &UploadedFile) -> Result<TempPath> {
    let suffix = format!(".{}", extension(&file.filename));
    let mut temp = tempfile::Builder::new()
        .prefix("imgclas-")
        .suffix(&suffix)
        .tempfile()?;
    temp.write_all(&file.bytes)?;
    temp.flush()?;

    let path = temp.into_temp_path();
    debug!("Stored {} at {}", file.filename, path.display());
    Ok(path)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::HttpConfig;

    fn resolver() -> InputResolver {
        InputResolver::new(RemoteImages::new(&HttpConfig::default()).unwrap())
    }

    fn upload(name: &str) -> UploadedFile {
        UploadedFile {
            filename: name.to_string(),
            bytes: b"not really an image".to_vec(),
        }
    }

    #[test]
    fn test_extension_matching_is_case_sensitive() {
        for ok in ["a.png", "a.jpg", "a.jpeg", "a.PNG", "a.JPG", "a.JPEG", "x.tar.png"] {
            assert!(check_extension(ok).is_ok(), "{ok} should be accepted");
        }
        for bad in ["image.gif", "image.Jpg", "image", "image.png.exe"] {
            assert!(
                matches!(check_extension(bad), Err(Error::UnsupportedExtension { .. })),
                "{bad} should be rejected"
            );
        }
        // a dotless name is its own extension
        assert!(check_extension("png").is_ok());
    }

    #[test]
    fn test_extension_uses_base_name() {
        assert_eq!(extension("dir.v2/photo"), "photo");
        assert_eq!(extension("dir/photo.jpeg"), "jpeg");
    }

    #[test]
    fn test_missing_input_file_is_client_error() {
        let err = UploadedFile::from_path(Path::new("/nonexistent/rose.png")).unwrap_err();
        assert!(matches!(err, Error::InputFileRead { .. }));
        assert_eq!(err.kind(), crate::error::ErrorKind::ClientInput);
    }

    #[test]
    fn test_from_path_keeps_base_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("oak.png");
        std::fs::write(&path, b"bytes").unwrap();
        let file = UploadedFile::from_path(&path).unwrap();
        assert_eq!(file.filename, "oak.png");
        assert_eq!(file.bytes, b"bytes");
    }

    #[test]
    fn test_empty_file_list_is_empty_query() {
        assert!(matches!(
            resolver().resolve_files(&[]),
            Err(Error::EmptyQuery)
        ));
    }

    #[test]
    fn test_files_are_persisted_and_removed_on_drop() {
        let inputs = resolver()
            .resolve_files(&[upload("rose.JPG"), upload("oak.png")])
            .unwrap();
        assert_eq!(inputs.mode(), InputMode::Local);

        let paths: Vec<PathBuf> = inputs
            .sources()
            .iter()
            .map(|source| match source {
                ImageSource::Local { path, .. } => path.clone(),
                other => panic!("unexpected source {other:?}"),
            })
            .collect();
        assert!(paths.iter().all(|p| p.exists()));
        assert_eq!(std::fs::read(&paths[0]).unwrap(), b"not really an image");

        drop(inputs);
        assert!(paths.iter().all(|p| !p.exists()));
    }

    #[test]
    fn test_rejected_file_writes_nothing() {
        let result = resolver().resolve_files(&[upload("rose.png"), upload("oak.gif")]);
        assert!(matches!(result, Err(Error::UnsupportedExtension { .. })));
    }

    #[tokio::test]
    async fn test_empty_url_list_is_empty_query() {
        assert!(matches!(
            resolver().resolve_urls(&[]).await,
            Err(Error::EmptyQuery)
        ));
    }

    #[tokio::test]
    async fn test_inline_images_skip_the_probe() {
        let urls = vec!["data:image/png;base64,AAAA".to_string()];
        let inputs = resolver().resolve_urls(&urls).await.unwrap();
        assert_eq!(inputs.mode(), InputMode::Url);
        assert_eq!(inputs.sources(), &[ImageSource::Inline(urls[0].clone())]);
    }

    #[tokio::test]
    async fn test_unreachable_url() {
        let urls = vec!["http://127.0.0.1:1/rose.png".to_string()];
        let result = resolver().resolve_urls(&urls).await;
        assert!(matches!(result, Err(Error::UnreachableUrl { .. })));
    }

    #[tokio::test]
    async fn test_silent_server_times_out() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        // Accept and hold connections without ever answering.
        std::thread::spawn(move || {
            let held: Vec<_> = listener.incoming().take(4).collect();
            std::thread::sleep(std::time::Duration::from_secs(30));
            drop(held);
        });

        let config = HttpConfig {
            probe_timeout_secs: 1,
            ..HttpConfig::default()
        };
        let resolver = InputResolver::new(RemoteImages::new(&config).unwrap());
        let urls = vec![format!("http://{addr}/rose.png")];

        let started = std::time::Instant::now();
        let result = resolver.resolve_urls(&urls).await;
        assert!(matches!(result, Err(Error::UnreachableUrl { .. })));
        assert!(started.elapsed() < std::time::Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_malformed_url_is_unreachable() {
        let urls = vec!["not a url".to_string()];
        let result = resolver().resolve_urls(&urls).await;
        assert!(matches!(result, Err(Error::UnreachableUrl { .. })));
    }
}
