//! Storage for the photo attached to each post, kept as `<post id>.<ext>` files in one directory.

use photogram_common::model::{Id, post::PostMarker};
use std::{
    io::{self, ErrorKind},
    path::PathBuf,
};
use tokio::fs;
use tracing::debug;

const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
const JPEG_SIGNATURE: [u8; 3] = [0xFF, 0xD8, 0xFF];

#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum ImageFormat {
    Png,
    Jpeg,
}

impl ImageFormat {
    pub const ALL: [ImageFormat; 2] = [ImageFormat::Png, ImageFormat::Jpeg];

    /// Detects the format from the leading magic bytes.
    #[must_use]
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(&PNG_SIGNATURE) {
            Some(ImageFormat::Png)
        } else if bytes.starts_with(&JPEG_SIGNATURE) {
            Some(ImageFormat::Jpeg)
        } else {
            None
        }
    }

    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            ImageFormat::Png => "png",
            ImageFormat::Jpeg => "jpeg",
        }
    }

    #[must_use]
    pub fn mime_type(self) -> &'static str {
        match self {
            ImageFormat::Png => "image/png",
            ImageFormat::Jpeg => "image/jpeg",
        }
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct ImageStore {
    dir: PathBuf,
}

impl ImageStore {
    pub async fn open(dir: impl Into<PathBuf>) -> io::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).await?;

        Ok(Self { dir })
    }

    #[cfg(test)]
    pub(crate) fn dir(&self) -> &std::path::Path {
        &self.dir
    }

    fn path(&self, post_id: Id<PostMarker>, format: ImageFormat) -> PathBuf {
        self.dir.join(format!("{post_id}.{}", format.extension()))
    }

    pub async fn save(
        &self,
        post_id: Id<PostMarker>,
        format: ImageFormat,
        bytes: &[u8],
    ) -> io::Result<()> {
        let path = self.path(post_id, format);
        fs::write(&path, bytes).await?;
        debug!(path = %path.display(), len = bytes.len(), "Saved image");

        Ok(())
    }

    pub async fn load(&self, post_id: Id<PostMarker>) -> io::Result<Option<(ImageFormat, Vec<u8>)>> {
        for format in ImageFormat::ALL {
            match fs::read(self.path(post_id, format)).await {
                Ok(bytes) => return Ok(Some((format, bytes))),
                Err(err) if err.kind() == ErrorKind::NotFound => {}
                Err(err) => return Err(err),
            }
        }

        Ok(None)
    }

    /// Removes the post's image. Returns `false` if there was none.
    pub async fn remove(&self, post_id: Id<PostMarker>) -> io::Result<bool> {
        let mut removed = false;
        for format in ImageFormat::ALL {
            match fs::remove_file(self.path(post_id, format)).await {
                Ok(()) => removed = true,
                Err(err) if err.kind() == ErrorKind::NotFound => {}
                Err(err) => return Err(err),
            }
        }

        Ok(removed)
    }
}
