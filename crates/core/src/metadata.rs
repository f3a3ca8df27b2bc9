use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum MetadataSource {
    Exif,
    FallbackFileModified,
}

/// Container format sniffed from the leading bytes of a file.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ImageFormat {
    Jpeg,
    Png,
    Tiff,
    Webp,
    Heif,
    Gif,
    Bmp,
}

impl ImageFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "JPEG",
            ImageFormat::Png => "PNG",
            ImageFormat::Tiff => "TIFF",
            ImageFormat::Webp => "WEBP",
            ImageFormat::Heif => "HEIF",
            ImageFormat::Gif => "GIF",
            ImageFormat::Bmp => "BMP",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhotoMetadata {
    pub source: MetadataSource,
    pub format: ImageFormat,
    pub date: NaiveDateTime,
    pub artist: Option<String>,
    pub camera_make: Option<String>,
    pub camera_model: Option<String>,
    pub folder: String,
    pub original_name: String,
    pub path: PathBuf,
}

impl PhotoMetadata {
    pub fn normalized_artist(&self) -> Option<&str> {
        normalized(self.artist.as_deref())
    }

    pub fn normalized_camera_make(&self) -> Option<&str> {
        normalized(self.camera_make.as_deref())
    }

    pub fn normalized_camera_model(&self) -> Option<&str> {
        normalized(self.camera_model.as_deref())
    }
}

fn normalized(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartialMetadata {
    pub date: Option<NaiveDateTime>,
    pub artist: Option<String>,
    pub camera_make: Option<String>,
    pub camera_model: Option<String>,
}
