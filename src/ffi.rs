//! C-compatible FFI API for cross-language bindings.
//!
//! # ABI Contract
//!
//! All exported functions use `extern "C"` calling convention and `#[no_mangle]`
//! to ensure stable symbol names.
//!
//! ## Memory management
//! - Buffers and strings returned by `pdfu_*` functions are allocated on the
//!   Rust heap.
//! - Callers **must** free them with `pdfu_free_buffer` / `pdfu_free_string`.
//! - Passing a null pointer to a free function is a no-op.
//!
//! ## Error handling
//! - Functions that can fail return a `c_int`:
//!   `0` success, `1` null pointer, `2` invalid UTF-8, `3` conversion failed.
//! - Error details can be retrieved via `pdfu_last_error`. When every
//!   degradation tier was rejected the message names the last tier tried.
//!
//! ## Thread safety
//! - `pdfu_last_error` uses a thread-local, so it is safe to call from
//!   multiple threads.
//!
//! ## Usage from Go (cgo)
//! ```go
//! // #cgo LDFLAGS: -lpdf_unify
//! // #include "pdf_unify.h"
//! import "C"
//! ```

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::{c_char, c_int};
use std::path::PathBuf;
use std::ptr;
use std::slice;

use crate::css::sanitize_css;
use crate::html::sanitize_html;
use crate::pipeline::{generate_pdf, PageOrientation, PageSize, PipelineConfig};
use crate::render::NativeRenderer;

const ERR_NULL: c_int = 1;
const ERR_UTF8: c_int = 2;
const ERR_CONVERT: c_int = 3;

thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

fn set_last_error(msg: &str) {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = CString::new(msg).ok();
    });
}

// ---------------------------------------------------------------------------
// C-compatible configuration types
// ---------------------------------------------------------------------------

/// Page orientation for use in [`PdfuConvertConfig`].
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub enum PdfuPageOrientation {
    /// Portrait mode: height > width (default).
    Portrait = 0,
    /// Landscape mode: width > height.
    Landscape = 1,
}

/// Paper size for use in [`PdfuConvertConfig`].
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub enum PdfuPageSize {
    A4 = 0,
    Letter = 1,
}

/// Optional configuration passed to `pdfu_convert_html_ex`.
///
/// `margin_mm = 0` and null pointers fall back to the defaults
/// (10 mm margins, title "pdf-unify output", a private scratch directory).
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct PdfuConvertConfig {
    /// Null-terminated UTF-8 document title, or `NULL`.
    pub title: *const c_char,
    /// Left/right margin in millimetres, clamped to 5..=25.
    pub margin_mm: u32,
    pub page_size: PdfuPageSize,
    pub orientation: PdfuPageOrientation,
    /// When false the `@page` rule also pins paper size and orientation.
    pub preserve_layout: bool,
    /// Whether the first tier is sanitized.
    pub sanitize: bool,
    /// Whether the built-in renderer rejects unsupported CSS.
    pub strict: bool,
    /// Null-terminated directory that relative resources resolve against,
    /// or `NULL`.
    pub base_dir: *const c_char,
}

/// # Safety
/// `ptr`, if non-null, must point to a valid null-terminated string.
unsafe fn optional_str(ptr: *const c_char) -> Result<Option<String>, c_int> {
    if ptr.is_null() {
        return Ok(None);
    }
    match CStr::from_ptr(ptr).to_str() {
        Ok(s) => Ok(Some(s.to_string())),
        Err(e) => {
            set_last_error(&format!("Invalid UTF-8: {e}"));
            Err(ERR_UTF8)
        }
    }
}

/// # Safety
/// `cfg.title` and `cfg.base_dir`, if non-null, must point to valid
/// null-terminated strings.
unsafe fn pipeline_config_from_c(
    cfg: &PdfuConvertConfig,
) -> Result<(PipelineConfig, Option<PathBuf>), c_int> {
    let defaults = PipelineConfig::default();
    let title = optional_str(cfg.title)?.unwrap_or(defaults.title);
    let base_dir = optional_str(cfg.base_dir)?.map(PathBuf::from);

    let config = PipelineConfig {
        title,
        margin_mm: if cfg.margin_mm == 0 { defaults.margin_mm } else { cfg.margin_mm },
        page_size: match cfg.page_size {
            PdfuPageSize::A4 => PageSize::A4,
            PdfuPageSize::Letter => PageSize::Letter,
        },
        orientation: match cfg.orientation {
            PdfuPageOrientation::Portrait => PageOrientation::Portrait,
            PdfuPageOrientation::Landscape => PageOrientation::Landscape,
        },
        preserve_layout: cfg.preserve_layout,
        sanitize: cfg.sanitize,
        ..defaults
    };
    Ok((config, base_dir))
}

/// # Safety
/// `ptr` must point to `len` valid bytes.
unsafe fn input_str<'a>(ptr: *const u8, len: u32) -> Result<&'a str, c_int> {
    let bytes = slice::from_raw_parts(ptr, len as usize);
    std::str::from_utf8(bytes).map_err(|e| {
        set_last_error(&format!("Invalid UTF-8: {e}"));
        ERR_UTF8
    })
}

/// # Safety
/// `out_buf` and `out_len` must be valid pointers.
unsafe fn hand_out_buffer(bytes: Vec<u8>, out_buf: *mut *mut u8, out_len: *mut u32) {
    let len = bytes.len() as u32;
    let raw = Box::into_raw(bytes.into_boxed_slice()) as *mut u8;
    *out_buf = raw;
    *out_len = len;
}

/// # Safety
/// `out_str` must be a valid pointer.
unsafe fn hand_out_string(text: String, out_str: *mut *mut c_char) -> c_int {
    match CString::new(text) {
        Ok(cs) => {
            *out_str = cs.into_raw();
            0
        }
        Err(e) => {
            set_last_error(&format!("Output contains a NUL byte: {e}"));
            *out_str = ptr::null_mut();
            ERR_CONVERT
        }
    }
}

// ---------------------------------------------------------------------------
// Core API
// ---------------------------------------------------------------------------

/// Sanitize a stylesheet for a CSS2.1-class renderer.
///
/// # Returns
/// `0` on success; `*out_str` receives a null-terminated string to be freed
/// with `pdfu_free_string`.
///
/// # Safety
/// - `css_ptr` must point to `css_len` valid bytes.
/// - `out_str` must be a valid pointer.
#[no_mangle]
pub unsafe extern "C" fn pdfu_sanitize_css(
    css_ptr: *const u8,
    css_len: u32,
    out_str: *mut *mut c_char,
) -> c_int {
    if css_ptr.is_null() || out_str.is_null() {
        set_last_error("Null pointer argument");
        return ERR_NULL;
    }
    match input_str(css_ptr, css_len) {
        Ok(css) => hand_out_string(sanitize_css(css), out_str),
        Err(code) => code,
    }
}

/// Rewrite every stylesheet and `style` attribute of an HTML document and
/// inject `page_css` (pass `NULL` for the default 10 mm margins).
///
/// # Safety
/// - `html_ptr` must point to `html_len` valid bytes.
/// - `page_css`, if non-null, must be a valid null-terminated string.
/// - `out_str` must be a valid pointer; free the result with
///   `pdfu_free_string`.
#[no_mangle]
pub unsafe extern "C" fn pdfu_sanitize_html(
    html_ptr: *const u8,
    html_len: u32,
    page_css: *const c_char,
    out_str: *mut *mut c_char,
) -> c_int {
    if html_ptr.is_null() || out_str.is_null() {
        set_last_error("Null pointer argument");
        return ERR_NULL;
    }
    let html = match input_str(html_ptr, html_len) {
        Ok(s) => s,
        Err(code) => return code,
    };
    let page_css = match optional_str(page_css) {
        Ok(css) => css.unwrap_or_else(|| PipelineConfig::default().page_css()),
        Err(code) => return code,
    };
    hand_out_string(sanitize_html(html, &page_css), out_str)
}

/// Convert an HTML document to PDF with the built-in renderer, walking the
/// degradation ladder until a tier renders.
///
/// # Parameters
/// - `html_ptr`: pointer to UTF-8 HTML bytes (not necessarily null-terminated)
/// - `html_len`: length of the HTML data in bytes
/// - `out_buf`: on success, receives a pointer to heap-allocated PDF bytes
/// - `out_len`: on success, receives the length of the PDF buffer
///
/// # Returns
/// `0` on success, non-zero on error. On error, call `pdfu_last_error`.
///
/// # Safety
/// - `html_ptr` must point to `html_len` valid bytes.
/// - `out_buf` and `out_len` must be valid pointers.
/// - The caller must free `*out_buf` by calling `pdfu_free_buffer`.
#[no_mangle]
pub unsafe extern "C" fn pdfu_convert_html(
    html_ptr: *const u8,
    html_len: u32,
    out_buf: *mut *mut u8,
    out_len: *mut u32,
) -> c_int {
    pdfu_convert_html_ex(html_ptr, html_len, ptr::null(), out_buf, out_len)
}

/// Like [`pdfu_convert_html`] but with an explicit configuration.
/// Passing `NULL` for `cfg` uses the defaults.
///
/// # Safety
/// Same as `pdfu_convert_html`. `cfg`, if non-null, must point to a valid
/// `PdfuConvertConfig` whose string fields are null or valid.
#[no_mangle]
pub unsafe extern "C" fn pdfu_convert_html_ex(
    html_ptr: *const u8,
    html_len: u32,
    cfg: *const PdfuConvertConfig,
    out_buf: *mut *mut u8,
    out_len: *mut u32,
) -> c_int {
    if html_ptr.is_null() || out_buf.is_null() || out_len.is_null() {
        set_last_error("Null pointer argument");
        return ERR_NULL;
    }
    let html = match input_str(html_ptr, html_len) {
        Ok(s) => s,
        Err(code) => return code,
    };

    let (config, base_dir, strict) = if cfg.is_null() {
        (PipelineConfig::default(), None, true)
    } else {
        match pipeline_config_from_c(&*cfg) {
            Ok((config, base_dir)) => (config, base_dir, (*cfg).strict),
            Err(code) => return code,
        }
    };

    let renderer = NativeRenderer::new(&config).strict(strict);
    let result = match base_dir {
        Some(dir) => generate_pdf(html, &config, &renderer, &dir),
        None => tempfile::tempdir()
            .map_err(Into::into)
            .and_then(|dir| generate_pdf(html, &config, &renderer, dir.path())),
    };

    match result {
        Ok(rendered) => {
            log::debug!("pdfu_convert_html_ex: rendered with {}", rendered.label());
            hand_out_buffer(rendered.bytes, out_buf, out_len);
            0
        }
        Err(e) => {
            set_last_error(&e.to_string());
            ERR_CONVERT
        }
    }
}

// ---------------------------------------------------------------------------
// Memory management
// ---------------------------------------------------------------------------

/// Free a PDF buffer returned by `pdfu_convert_html` (or `_ex`).
///
/// # Safety
/// `buf` must have been returned by a previous conversion call, and `len`
/// must be the corresponding length.
#[no_mangle]
pub unsafe extern "C" fn pdfu_free_buffer(buf: *mut u8, len: u32) {
    if !buf.is_null() {
        let _ = Box::from_raw(slice::from_raw_parts_mut(buf, len as usize));
    }
}

/// Free a string returned by `pdfu_sanitize_css` or `pdfu_sanitize_html`.
///
/// # Safety
/// `s` must have been returned by Rust's `CString::into_raw`.
#[no_mangle]
pub unsafe extern "C" fn pdfu_free_string(s: *mut c_char) {
    if !s.is_null() {
        let _ = CString::from_raw(s);
    }
}

/// Retrieve the last error message. Returns a null-terminated string.
///
/// The returned pointer is valid until the next `pdfu_*` call on the same
/// thread. The caller should **not** free this pointer – it is managed
/// internally.
///
/// Returns null if no error has occurred.
#[no_mangle]
pub extern "C" fn pdfu_last_error() -> *const c_char {
    LAST_ERROR.with(|e| {
        let borrow = e.borrow();
        match borrow.as_ref() {
            Some(cs) => cs.as_ptr(),
            None => ptr::null(),
        }
    })
}

/// Return the library version as a null-terminated string.
/// The caller must **not** free this pointer.
#[no_mangle]
pub extern "C" fn pdfu_version() -> *const c_char {
    concat!(env!("CARGO_PKG_VERSION"), "\0").as_ptr() as *const c_char
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn default_c_config() -> PdfuConvertConfig {
        PdfuConvertConfig {
            title: ptr::null(),
            margin_mm: 0,
            page_size: PdfuPageSize::A4,
            orientation: PdfuPageOrientation::Portrait,
            preserve_layout: true,
            sanitize: true,
            strict: true,
            base_dir: ptr::null(),
        }
    }

    fn take_string(ptr: *mut c_char) -> String {
        let s = unsafe { CStr::from_ptr(ptr) }.to_str().unwrap().to_string();
        unsafe { pdfu_free_string(ptr) };
        s
    }

    fn last_error() -> String {
        unsafe { CStr::from_ptr(pdfu_last_error()) }
            .to_str()
            .unwrap()
            .to_string()
    }

    #[test]
    fn ffi_sanitize_css() {
        let css = b".a{display:flex;color:red}";
        let mut out: *mut c_char = ptr::null_mut();
        let rc = unsafe { pdfu_sanitize_css(css.as_ptr(), css.len() as u32, &mut out) };
        assert_eq!(rc, 0);
        let cleaned = take_string(out);
        assert!(cleaned.contains("display:block"));
        assert!(cleaned.contains("color:red"));
    }

    #[test]
    fn ffi_sanitize_html_default_page_css() {
        let html = b"<html><head></head><body><p style=\"gap:4px;color:red\">x</p></body></html>";
        let mut out: *mut c_char = ptr::null_mut();
        let rc = unsafe {
            pdfu_sanitize_html(html.as_ptr(), html.len() as u32, ptr::null(), &mut out)
        };
        assert_eq!(rc, 0);
        let cleaned = take_string(out);
        assert!(cleaned.contains("margin-left: 10mm"));
        assert!(!cleaned.contains("gap"));
    }

    #[test]
    fn ffi_convert_html() {
        let html = b"<h1>Hello FFI</h1>";
        let mut out_buf: *mut u8 = ptr::null_mut();
        let mut out_len: u32 = 0;

        let rc = unsafe {
            pdfu_convert_html(html.as_ptr(), html.len() as u32, &mut out_buf, &mut out_len)
        };

        assert_eq!(rc, 0, "Expected success");
        assert!(!out_buf.is_null());
        assert!(out_len > 100);

        let bytes = unsafe { slice::from_raw_parts(out_buf, out_len as usize) };
        assert_eq!(&bytes[0..5], b"%PDF-");

        unsafe { pdfu_free_buffer(out_buf, out_len) };
    }

    #[test]
    fn ffi_null_input() {
        let mut out_buf: *mut u8 = ptr::null_mut();
        let mut out_len: u32 = 0;

        let rc = unsafe { pdfu_convert_html(ptr::null(), 0, &mut out_buf, &mut out_len) };

        assert_eq!(rc, ERR_NULL);
        assert_eq!(last_error(), "Null pointer argument");
    }

    #[test]
    fn ffi_invalid_utf8() {
        let bad = [0xffu8, 0xfe, 0xfd];
        let mut out: *mut c_char = ptr::null_mut();
        let rc = unsafe { pdfu_sanitize_css(bad.as_ptr(), bad.len() as u32, &mut out) };
        assert_eq!(rc, ERR_UTF8);
        assert!(last_error().starts_with("Invalid UTF-8"));
    }

    #[test]
    fn ffi_version() {
        let v = pdfu_version();
        let version = unsafe { CStr::from_ptr(v) }.to_str().unwrap();
        assert_eq!(version, env!("CARGO_PKG_VERSION"));
    }

    #[test]
    fn ffi_convert_html_ex_custom_config() {
        let html = b"<div style=\"display:flex\"><h1>Landscape Test</h1></div>";
        let title = CString::new("My Custom Title").unwrap();
        let cfg = PdfuConvertConfig {
            title: title.as_ptr(),
            margin_mm: 20,
            page_size: PdfuPageSize::Letter,
            orientation: PdfuPageOrientation::Landscape,
            preserve_layout: false,
            sanitize: false,
            ..default_c_config()
        };

        let mut out_buf: *mut u8 = ptr::null_mut();
        let mut out_len: u32 = 0;
        let rc = unsafe {
            pdfu_convert_html_ex(html.as_ptr(), html.len() as u32, &cfg, &mut out_buf, &mut out_len)
        };

        assert_eq!(rc, 0, "Expected success");
        let bytes = unsafe { slice::from_raw_parts(out_buf, out_len as usize) };
        assert_eq!(&bytes[0..5], b"%PDF-");
        unsafe { pdfu_free_buffer(out_buf, out_len) };
    }

    #[test]
    fn ffi_config_conversion() {
        let title = CString::new("T").unwrap();
        let cfg = PdfuConvertConfig {
            title: title.as_ptr(),
            margin_mm: 40,
            page_size: PdfuPageSize::Letter,
            ..default_c_config()
        };
        let (config, base_dir) = unsafe { pipeline_config_from_c(&cfg) }.unwrap();
        assert_eq!(config.title, "T");
        assert_eq!(config.margin_mm(), PipelineConfig::MAX_MARGIN_MM);
        assert_eq!(config.page_size, PageSize::Letter);
        assert!(base_dir.is_none());

        let defaults = unsafe { pipeline_config_from_c(&default_c_config()) }.unwrap().0;
        assert_eq!(defaults, PipelineConfig::default());
    }
}
