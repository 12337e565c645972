use url::Url;
use crate::core::{AssetKind, UploadError};

/// Object key for an asset: `<prefix>/<file name>`.
///
/// Only the final path component of `name` is kept, so the key is fully
/// determined by the asset's file name and its kind.
pub fn destination_key(kind: AssetKind, name: &str) -> Result<String, UploadError> {
    let file_name = name
        .rsplit(|c| c == '/' || c == '\\')
        .next()
        .unwrap_or_default()
        .trim();

    if file_name.is_empty() || file_name == "." || file_name == ".." {
        return Err(UploadError::InvalidName(name.to_string()));
    }

    Ok(format!("{}/{}", kind.prefix(), file_name))
}

/// Raw URL an S3-style endpoint exposes for `key`.
pub fn raw_object_url(bucket: &str, region: &str, key: &str) -> String {
    format!("https://{}.s3.{}.amazonaws.com/{}", bucket, region, key)
}

/// Rewrites `raw` so it is served from the public prefix, keeping the path.
/// Unparseable input is returned as is.
pub fn canonical_public_url(raw: &str, public_prefix: &str) -> String {
    match Url::parse(raw) {
        Ok(url) => format!("{}{}", public_prefix.trim_end_matches('/'), url.path()),
        Err(_) => raw.to_string(),
    }
}
