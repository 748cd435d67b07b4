use regex::Regex;
use sha2::{Digest, Sha256};
use std::sync::OnceLock;

/// Sign upload/destroy parameters the way Cloudinary expects:
/// sorted `key=value` pairs joined by `&`, secret appended, SHA-256 hex.
/// Empty values are left out of the string to sign.
pub fn sign(params: &[(&str, &str)], api_secret: &str) -> String {
    let mut pairs: Vec<_> = params.iter().filter(|(_, v)| !v.is_empty()).collect();
    pairs.sort_by(|a, b| a.0.cmp(b.0));

    let to_sign = pairs
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&");

    let mut hasher = Sha256::new();
    hasher.update(to_sign.as_bytes());
    hasher.update(api_secret.as_bytes());
    hex::encode(hasher.finalize())
}

fn public_id_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^([^?#]+?)(?:\.[A-Za-z0-9]+)?(?:[?#].*)?$").ok())
        .as_ref()
}

pub fn is_cloudinary_url(url: &str) -> bool {
    url.contains("res.cloudinary.com/") && url.contains("/upload/")
}

/// Public id of an uploaded asset, folder included and extension stripped.
///
/// `https://res.cloudinary.com/demo/image/upload/v1712/inventario-3g/articulos/articulo_x.jpg`
/// yields `inventario-3g/articulos/articulo_x`.
pub fn public_id_from_url(url: &str) -> Option<String> {
    if !is_cloudinary_url(url) {
        return None;
    }

    // Transformation segments (c_limit,w_800) sit before the version segment
    let after_upload = url.split_once("/upload/")?.1;
    let path = match after_upload.split('/').position(is_version_segment) {
        Some(idx) => after_upload.split('/').skip(idx + 1).collect::<Vec<_>>().join("/"),
        None => after_upload.to_string(),
    };

    public_id_pattern()?
        .captures(&path)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .filter(|id| !id.is_empty())
}

fn is_version_segment(segment: &str) -> bool {
    segment.len() > 1
        && segment.starts_with('v')
        && segment[1..].chars().all(|c| c.is_ascii_digit())
}
