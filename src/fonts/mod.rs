//! Font discovery for the invoice renderer.
//!
//! Fonts are looked up once, when the renderer is created.  The bundled Roboto family is
//! preferred; when it is missing the platform's metric-compatible sans-serif family is used.

use std::env;
use std::io;
use std::path::{Path, PathBuf};

use genpdf::error::{Error, ErrorKind};
use genpdf::fonts::{self, FontData, FontFamily};
use log::{debug, warn};

/// Name of the bundled font family.
pub const DEFAULT_FONT_FAMILY_NAME: &str = "Roboto";

/// Overrides the directory searched for the bundled font files.
pub const FONTS_DIR_ENV: &str = "INVOICE_PDF_FONTS_DIR";

/// Overrides the directory searched for the system fallback family.
pub const SYSTEM_FONTS_DIR_ENV: &str = "INVOICE_PDF_SYSTEM_FONTS_DIR";

const FONT_FILES: &[&str] = &[
    "Roboto-Regular.ttf",
    "Roboto-Bold.ttf",
    "Roboto-Italic.ttf",
    "Roboto-BoldItalic.ttf",
];

/// File names of a fallback family, one per style.
struct FallbackFamily {
    name: &'static str,
    directories: &'static [&'static str],
    regular: &'static str,
    bold: &'static str,
    italic: &'static str,
    bold_italic: &'static str,
}

const LIBERATION_SANS: FallbackFamily = FallbackFamily {
    name: "Liberation Sans",
    directories: &[
        "/usr/share/fonts/truetype/liberation",
        "/usr/share/fonts/liberation-sans",
        "/usr/share/fonts/liberation",
        "/usr/share/fonts/TTF",
    ],
    regular: "LiberationSans-Regular.ttf",
    bold: "LiberationSans-Bold.ttf",
    italic: "LiberationSans-Italic.ttf",
    bold_italic: "LiberationSans-BoldItalic.ttf",
};

const ARIAL: FallbackFamily = FallbackFamily {
    name: "Arial",
    directories: &[],
    regular: "arial.ttf",
    bold: "arialbd.ttf",
    italic: "ariali.ttf",
    bold_italic: "arialbi.ttf",
};

fn env_path(var: &str) -> Option<PathBuf> {
    env::var_os(var).and_then(|value| {
        let path = PathBuf::from(value);
        if path.as_os_str().is_empty() {
            None
        } else {
            Some(path)
        }
    })
}

fn push_unique(candidates: &mut Vec<PathBuf>, candidate: PathBuf) {
    if !candidates.iter().any(|existing| existing == &candidate) {
        candidates.push(candidate);
    }
}

fn font_directory_candidates() -> Vec<PathBuf> {
    let mut candidates = Vec::new();

    if let Some(path) = env_path(FONTS_DIR_ENV) {
        candidates.push(path);
    }

    if let Ok(current_exe) = env::current_exe() {
        if let Some(bin_dir) = current_exe.parent() {
            push_unique(&mut candidates, bin_dir.join("assets/fonts"));
        }
    }

    push_unique(
        &mut candidates,
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("assets/fonts"),
    );

    candidates
}

fn missing_font_files(path: &Path) -> Vec<PathBuf> {
    FONT_FILES
        .iter()
        .map(|name| path.join(name))
        .filter(|candidate| !candidate.is_file())
        .collect()
}

fn resolve_font_directory() -> Result<PathBuf, Error> {
    let mut attempts = Vec::new();

    for candidate in font_directory_candidates() {
        let exists = candidate.is_dir();
        let missing = missing_font_files(&candidate);

        if exists && missing.is_empty() {
            return Ok(candidate);
        }

        let reason = if !exists {
            format!("directory missing at {}", candidate.display())
        } else {
            let missing_list = missing
                .iter()
                .map(|path| path.file_name().unwrap_or_default().to_string_lossy())
                .collect::<Vec<_>>()
                .join(", ");
            format!("missing files [{}]", missing_list)
        };

        attempts.push(format!("{} ({})", candidate.display(), reason));
    }

    Err(Error::new(
        format!(
            "Unable to locate bundled font directory. Checked: {}. See assets/fonts/README.md or set {}.",
            attempts.join(", "),
            FONTS_DIR_ENV
        ),
        io::Error::new(io::ErrorKind::NotFound, "bundled fonts directory not found"),
    ))
}

fn load_bundled_font_family() -> Result<FontFamily<FontData>, Error> {
    let directory = resolve_font_directory()?;
    debug!("Loading {} fonts from {}", DEFAULT_FONT_FAMILY_NAME, directory.display());

    fonts::from_files(&directory, DEFAULT_FONT_FAMILY_NAME, None).map_err(|err| {
        Error::new(
            format!(
                "Failed to load default font family '{}' from {}: {}",
                DEFAULT_FONT_FAMILY_NAME,
                directory.display(),
                err
            ),
            io::Error::new(io::ErrorKind::Other, err.to_string()),
        )
    })
}

fn system_font_directories(family: &FallbackFamily) -> Vec<PathBuf> {
    let mut directories = Vec::new();
    if let Some(path) = env_path(SYSTEM_FONTS_DIR_ENV) {
        directories.push(path);
    }
    for directory in family.directories {
        push_unique(&mut directories, PathBuf::from(directory));
    }
    #[cfg(windows)]
    {
        for var in ["WINDIR", "SystemRoot"] {
            if let Some(root) = env_path(var) {
                push_unique(&mut directories, root.join("Fonts"));
            }
        }
    }
    directories
}

fn load_fallback_font(directory: &Path, file: &str, style: &str) -> Result<FontData, Error> {
    let path = directory.join(file);
    FontData::load(&path, None).map_err(|err| {
        let io_kind = if path.is_file() {
            io::ErrorKind::Other
        } else {
            io::ErrorKind::NotFound
        };
        Error::new(
            format!(
                "Failed to load fallback {} font at {}: {}",
                style,
                path.display(),
                err
            ),
            io::Error::new(io_kind, err.to_string()),
        )
    })
}

fn load_fallback_family(family: &FallbackFamily) -> Result<FontFamily<FontData>, Error> {
    let directory = system_font_directories(family)
        .into_iter()
        .find(|directory| directory.join(family.regular).is_file())
        .ok_or_else(|| {
            Error::new(
                format!("No directory contains the {} family", family.name),
                io::Error::new(io::ErrorKind::NotFound, "system fonts directory not found"),
            )
        })?;

    Ok(FontFamily {
        regular: load_fallback_font(&directory, family.regular, "regular")?,
        bold: load_fallback_font(&directory, family.bold, "bold")?,
        italic: load_fallback_font(&directory, family.italic, "italic")?,
        bold_italic: load_fallback_font(&directory, family.bold_italic, "bold italic")?,
    })
}

fn platform_fallback() -> &'static FallbackFamily {
    if cfg!(windows) {
        &ARIAL
    } else {
        &LIBERATION_SANS
    }
}

fn fonts_missing(err: &Error) -> bool {
    matches!(
        err.kind(),
        ErrorKind::IoError(io_err)
            if io_err.kind() == io::ErrorKind::NotFound
                || io_err.kind() == io::ErrorKind::PermissionDenied
    )
}

/// Returns the bundled Roboto family, or the platform fallback family when it is missing.
pub fn default_font_family() -> Result<FontFamily<FontData>, Error> {
    match load_bundled_font_family() {
        Ok(family) => Ok(family),
        Err(err) if fonts_missing(&err) => {
            let fallback = platform_fallback();
            match load_fallback_family(fallback) {
                Ok(family) => {
                    warn!(
                        "Bundled fonts unavailable ({}); falling back to the '{}' family.",
                        err, fallback.name
                    );
                    Ok(family)
                }
                Err(fallback_err) => {
                    warn!(
                        "Bundled fonts unavailable ({}); {} fallback failed: {}",
                        err, fallback.name, fallback_err
                    );
                    Err(Error::new(
                        format!(
                            "Bundled fonts unavailable and {} fallback failed: {}",
                            fallback.name, fallback_err
                        ),
                        io::Error::new(io::ErrorKind::NotFound, "default fonts are not available"),
                    ))
                }
            }
        }
        Err(err) => Err(err),
    }
}

/// Indicates whether [`default_font_family`] can find a usable family on this machine.
pub fn default_fonts_available() -> bool {
    resolve_font_directory().is_ok()
        || system_font_directories(platform_fallback())
            .iter()
            .any(|directory| directory.join(platform_fallback().regular).is_file())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manifest_directory_is_always_searched() {
        let manifest = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("assets/fonts");
        assert!(font_directory_candidates().contains(&manifest));
    }

    #[test]
    fn missing_files_are_reported_by_name() {
        let missing = missing_font_files(Path::new("/nonexistent-font-dir"));
        assert_eq!(missing.len(), FONT_FILES.len());
        assert!(missing[0].ends_with("Roboto-Regular.ttf"));
    }

    #[test]
    fn fallback_directory_errors_count_as_missing_fonts() {
        let err = load_fallback_font(Path::new("/nonexistent-font-dir"), "arial.ttf", "regular")
            .unwrap_err();
        assert!(fonts_missing(&err));
    }
}
