//! Platform resolution from image references.
//!
//! Nodes may omit their platform tag; it is then recovered from the image
//! file name. Two naming schemes are recognised:
//!
//! - qcow2 images: `8101-32FH-x64-25.1.2.qcow2` -> `8101-32FH`
//! - release tarballs: `8000-2512-f-8101-image-eft15.1.tar` -> `8101-32H`
//!
//! Update the tables below when new platforms are released.

use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;

use crate::topology::Node;

/// Platform used when nothing can be inferred from the image name
pub const DEFAULT_PLATFORM: &str = "8201-32FH";

/// Model numbers and platform variants to the platform tag they stand for
const PLATFORM_MAPPING: &[(&str, &str)] = &[
    ("8000", "8000"),
    ("8101", "8101-32H"),
    ("8102", "8102-64H"),
    ("8122", "8122-64EHF-O"),
    ("8201", "8201-32FH"),
    ("8202", "8202"),
    ("8212", "8212-48FH-M"),
    ("8711", "8711-32FH-M"),
    ("8804", "8804"),
    ("8808", "8800-lc-36fh-m"),
    ("8101-32FH", "8101-32FH"),
    ("8101-32H", "8101-32H"),
    ("8102-64H", "8102-64H"),
    ("8111-32EH", "8111-32EH"),
    ("8122-64EHF-O", "8122-64EHF-O"),
    ("8201-24H8FH", "8201-24H8FH"),
    ("8201-sys", "8201-sys"),
    ("8201-32FH", "8201-32FH"),
    ("8202-32FH-M", "8202-32FH-M"),
    ("8212-48FH-M", "8212-48FH-M"),
    ("8711-32FH-M", "8711-32FH-M"),
    ("ncs1010", "ncs1010"),
];

/// qcow2 base names (version stripped) to platform tags
const QCOW2_TO_PLATFORM: &[(&str, &str)] = &[
    ("8000-x64", "8201-sys"),
    ("8101-x64", "8101-32H"),
    ("8101-32FH-x64", "8101-32FH"),
    ("8102-x64", "8102-64H"),
    ("8111-32EH-x64", "8111-32EH"),
    ("8122-64EHF-O-x64", "8122-64EHF-O"),
    ("8201-x64", "8201-32FH"),
    ("8202-x64", "8202"),
    ("8202-32FH-M-x64", "8202-32FH-M"),
    ("8212-48FH-M-x64", "8212-48FH-M"),
    ("8711-32FH-M-x64", "8711-32FH-M"),
];

static VERSION_SUFFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"-x64-\d+\.\d+\.\d+$|-\d+\.\d+\.\d+$").expect("version suffix pattern is valid")
});

static MODEL_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{4})").expect("model prefix pattern is valid"));

fn lookup(table: &'static [(&'static str, &'static str)], key: &str) -> Option<&'static str> {
    table.iter().find(|(k, _)| *k == key).map(|(_, v)| *v)
}

/// Infer a platform tag from a qcow2 image file name
///
/// Tries, in order: exact match on the version-stripped base name, match
/// ignoring the `-x64` marker, then the leading four-digit model number.
pub fn platform_from_qcow2_name(file_name: &str) -> Option<String> {
    let base_name = file_name.trim_end_matches(".qcow2");
    let base_name = VERSION_SUFFIX.replace(base_name, "");
    log::debug!("Processing qcow2 base name: {}", base_name);

    if let Some(platform) = lookup(QCOW2_TO_PLATFORM, &base_name) {
        return Some(platform.to_string());
    }

    for (pattern, platform) in QCOW2_TO_PLATFORM {
        if pattern.replace("-x64", "") == base_name {
            return Some(platform.to_string());
        }
    }

    MODEL_PREFIX.captures(&base_name).map(|caps| {
        let model = &caps[1];
        lookup(PLATFORM_MAPPING, model).unwrap_or(model).to_string()
    })
}

/// Infer a platform tag from a release tarball file name
///
/// Handles distributed (`...-d-8804-...`) and fixed (`...-f-8101-...`)
/// platform markers, `ncs1010` images, and finally any four-digit `8xxx`
/// model number in the name.
pub fn platform_from_tar_name(file_name: &str) -> Option<String> {
    let parts: Vec<&str> = file_name.split('-').collect();

    for marker in ["d", "f"] {
        if let Some(index) = parts.iter().position(|part| *part == marker) {
            if let Some(platform) = parts.get(index + 1).and_then(|part| lookup(PLATFORM_MAPPING, part)) {
                return Some(platform.to_string());
            }
        }
    }

    if file_name.contains("ncs1010") {
        return Some("ncs1010".to_string());
    }

    parts
        .iter()
        .find(|part| part.len() == 4 && part.starts_with('8') && part.chars().all(|c| c.is_ascii_digit()))
        .map(|model| lookup(PLATFORM_MAPPING, model).unwrap_or(*model).to_string())
}

/// Infer a platform tag from an image reference (path or URI)
pub fn infer_platform(image: &str) -> Option<String> {
    let file_name = Path::new(image)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| image.to_string());

    if file_name.ends_with(".tar") {
        platform_from_tar_name(&file_name)
    } else {
        let stem = file_name.trim_end_matches(".iso");
        platform_from_qcow2_name(stem)
    }
}

/// Platform tag for a node: the declared one, else inferred from the image,
/// else `DEFAULT_PLATFORM`.
pub fn resolve_platform(node: &Node) -> String {
    if let Some(platform) = &node.platform {
        return platform.clone();
    }

    match infer_platform(&node.image) {
        Some(platform) => {
            log::info!("Inferred platform {} for node {} from image '{}'", platform, node.id, node.image);
            platform
        }
        None => {
            log::warn!(
                "Could not infer platform for node {} from image '{}', using default {}",
                node.id, node.image, DEFAULT_PLATFORM
            );
            DEFAULT_PLATFORM.to_string()
        }
    }
}
