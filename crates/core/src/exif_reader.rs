use crate::metadata::{ImageFormat, PartialMetadata};
use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use exif::{In, Reader, Tag, Value};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

const SNIFF_LEN: usize = 16;

const DATE_TAGS: &[Tag] = &[Tag::DateTimeOriginal, Tag::DateTimeDigitized, Tag::DateTime];

const HEIF_BRANDS: &[&[u8; 4]] = &[
    b"heic", b"heix", b"heim", b"heis", b"hevc", b"hevx", b"mif1", b"msf1", b"avif",
];

/// Returns `Ok(None)` when the file opens fine but is not an image we know.
pub fn detect_image_format(path: &Path) -> Result<Option<ImageFormat>> {
    let mut file =
        File::open(path).with_context(|| format!("could not open file: {}", path.display()))?;
    let mut head = [0u8; SNIFF_LEN];
    let mut filled = 0usize;
    while filled < SNIFF_LEN {
        let n = file
            .read(&mut head[filled..])
            .with_context(|| format!("could not read file: {}", path.display()))?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(sniff_format(&head[..filled]))
}

fn sniff_format(head: &[u8]) -> Option<ImageFormat> {
    if head.starts_with(&[0xFF, 0xD8, 0xFF]) {
        return Some(ImageFormat::Jpeg);
    }
    if head.starts_with(b"\x89PNG\r\n\x1a\n") {
        return Some(ImageFormat::Png);
    }
    if head.starts_with(b"II*\0") || head.starts_with(b"MM\0*") {
        return Some(ImageFormat::Tiff);
    }
    if head.len() >= 12 && &head[..4] == b"RIFF" && &head[8..12] == b"WEBP" {
        return Some(ImageFormat::Webp);
    }
    if head.len() >= 12
        && &head[4..8] == b"ftyp"
        && HEIF_BRANDS.iter().any(|brand| &head[8..12] == brand.as_slice())
    {
        return Some(ImageFormat::Heif);
    }
    if head.starts_with(b"GIF87a") || head.starts_with(b"GIF89a") {
        return Some(ImageFormat::Gif);
    }
    if head.starts_with(b"BM") && head.len() >= 14 {
        return Some(ImageFormat::Bmp);
    }
    None
}

pub fn read_exif_metadata(path: &Path) -> Result<PartialMetadata> {
    let file = File::open(path)
        .with_context(|| format!("could not open file for EXIF: {}", path.display()))?;
    let mut buf = BufReader::new(file);
    let exif = Reader::new()
        .read_from_container(&mut buf)
        .with_context(|| format!("could not parse EXIF: {}", path.display()))?;

    let date = DATE_TAGS
        .iter()
        .filter_map(|tag| ascii_field(&exif, *tag))
        .find_map(|raw| parse_date(&raw));

    Ok(PartialMetadata {
        date,
        artist: ascii_field(&exif, Tag::Artist),
        camera_make: ascii_field(&exif, Tag::Make),
        camera_model: ascii_field(&exif, Tag::Model),
    })
}

fn ascii_field(exif: &exif::Exif, tag: Tag) -> Option<String> {
    let field = exif.get_field(tag, In::PRIMARY)?;
    match &field.value {
        Value::Ascii(chunks) => chunks
            .iter()
            .map(|chunk| String::from_utf8_lossy(chunk).trim_matches(['\0', ' ']).to_string())
            .find(|s| !s.is_empty()),
        _ => None,
    }
}

fn parse_date(input: &str) -> Option<NaiveDateTime> {
    let normalized = input.trim();

    let candidates = [
        "%Y:%m:%d %H:%M:%S",
        "%Y:%m:%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%Y/%m/%d %H:%M:%S",
    ];

    candidates
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(normalized, fmt).ok())
}
