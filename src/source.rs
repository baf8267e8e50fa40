//! Input documents – kind detection, text decoding and image wrapping.

use std::fs;
use std::io::Cursor;
use std::path::Path;

use base64::{engine::general_purpose::STANDARD as BASE64_STD, Engine as _};
use image::{DynamicImage, ImageFormat};
use serde::Serialize;

use crate::error::ConvertError;

/// What an input file is, judged by its extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    Pdf,
    Html,
    Spreadsheet,
    WordProcessing,
    Image,
}

impl DocumentKind {
    /// Classify a file name by extension, case-insensitively.
    pub fn from_name(name: &str) -> Result<Self, ConvertError> {
        let ext = extension(name);
        match ext.as_str() {
            "pdf" => Ok(Self::Pdf),
            "html" | "htm" => Ok(Self::Html),
            "xls" | "xlsx" => Ok(Self::Spreadsheet),
            "docx" => Ok(Self::WordProcessing),
            "jpg" | "jpeg" | "png" | "gif" | "bmp" | "tif" | "tiff" | "webp" | "svg" => {
                Ok(Self::Image)
            }
            "" => Err(ConvertError::UnsupportedFormat(format!(
                "`{name}` has no file extension"
            ))),
            other => Err(ConvertError::UnsupportedFormat(format!(
                "`.{other}` files are not supported"
            ))),
        }
    }
}

/// Lower-cased extension of `name` without the dot, or `""`.
pub fn extension(name: &str) -> String {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default()
}

/// One uploaded/input file: its display name and raw bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDocument {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl SourceDocument {
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }

    /// Read a file from disk; the name is the path's file name.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConvertError> {
        let path = path.as_ref();
        let bytes = fs::read(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self { name, bytes })
    }

    pub fn kind(&self) -> Result<DocumentKind, ConvertError> {
        DocumentKind::from_name(&self.name)
    }

    /// File name without directories, safe to create inside a work dir.
    pub fn file_name(&self) -> String {
        Path::new(&self.name)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| "source".to_string())
    }
}

/// Decode HTML bytes as UTF-8, falling back to Latin-1. Never fails.
pub fn decode_text(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => {
            log::debug!("input is not UTF-8, decoding as Latin-1");
            bytes.iter().map(|&b| b as char).collect()
        }
    }
}

/// MIME type for an image extension.
pub fn image_mime(ext: &str) -> &'static str {
    match ext {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "bmp" => "image/bmp",
        "tif" | "tiff" => "image/tiff",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        _ => "application/octet-stream",
    }
}

/// `data:<mime>;base64,<payload>`.
pub fn data_uri(mime: &str, bytes: &[u8]) -> String {
    format!("data:{mime};base64,{}", BASE64_STD.encode(bytes))
}

/// Parse a `data:<mime>;base64,<data>` URI and return the raw decoded bytes.
///
/// Returns `Err` if `src` is not a data URI or does not use base64 encoding.
pub fn parse_data_uri(src: &str) -> Result<Vec<u8>, String> {
    let Some(rest) = src.strip_prefix("data:") else {
        let preview: String = src.chars().take(80).collect();
        return Err(format!("not a data URI: {preview:?}"));
    };
    let (header, payload) = rest
        .split_once(',')
        .ok_or_else(|| "invalid data URI: missing `,` separator".to_string())?;
    if !header.contains(";base64") {
        return Err("only base64-encoded data URIs are supported".to_string());
    }
    BASE64_STD
        .decode(payload.trim())
        .map_err(|e| format!("base64 decode error: {e}"))
}

/// Wrap an image in a minimal single-image page.
///
/// Decodable images are normalized to RGB PNG; anything the `image` crate
/// cannot read (SVG, exotic TIFFs) is embedded as-is under its
/// extension's MIME type.
pub fn image_to_html(name: &str, bytes: &[u8]) -> String {
    let fallback = image_mime(&extension(name));
    let (mime, payload) = match image::load_from_memory(bytes) {
        Ok(img) => match to_png(&DynamicImage::ImageRgb8(img.to_rgb8())) {
            Ok(png) => ("image/png", png),
            Err(e) => {
                log::warn!("{name}: PNG re-encode failed ({e}), embedding original bytes");
                (fallback, bytes.to_vec())
            }
        },
        Err(e) => {
            log::debug!("{name}: not decodable ({e}), embedding as {fallback}");
            (fallback, bytes.to_vec())
        }
    };

    let alt = name.replace('&', "&amp;").replace('"', "&quot;").replace('<', "&lt;");
    format!(
        "<html><head><meta charset=\"utf-8\">\n<style>\n\
         html, body {{ margin: 0; padding: 0; }}\n\
         .wrap {{ padding: 0; margin: 0 auto; }}\n\
         img {{ display: block; max-width: 100%; height: auto; margin: 0 auto; }}\n\
         </style></head>\n<body><div class=\"wrap\"><img alt=\"{alt}\" src=\"{}\"/></div></body></html>",
        data_uri(mime, &payload)
    )
}

fn to_png(img: &DynamicImage) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, ImageFormat::Png)?;
    Ok(buf.into_inner())
}
