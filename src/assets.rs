use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;

/// Number of random bytes behind every asset key.
pub const ASSET_KEY_BYTES: usize = 32;

/// Length of the encoded random part of an asset key (43 chars for 32 bytes).
pub const ASSET_KEY_ENCODED_LEN: usize = 43;

const FALLBACK_EXT: &str = ".bin";

/// Aspect ratio bucket reported by the prober.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AspectRatio {
    Landscape,
    Portrait,
    Other,
}

impl AspectRatio {
    /// Classify stream dimensions.
    ///
    /// Uses the truncating integer test `w == 16*h/9` / `h == 16*w/9` rather than
    /// a float tolerance, so e.g. 854x480 lands in `Other`.
    pub fn classify(width: u32, height: u32) -> Self {
        let (w, h) = (u64::from(width), u64::from(height));
        if w == 16 * h / 9 {
            AspectRatio::Landscape
        } else if h == 16 * w / 9 {
            AspectRatio::Portrait
        } else {
            AspectRatio::Other
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AspectRatio::Landscape => "16:9",
            AspectRatio::Portrait => "9:16",
            AspectRatio::Other => "other",
        }
    }

    /// Object key prefix for videos of this shape.
    pub fn directory(&self) -> &'static str {
        match self {
            AspectRatio::Landscape => "landscape",
            AspectRatio::Portrait => "portrait",
            AspectRatio::Other => "other",
        }
    }
}

impl std::fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Map a media type such as `video/mp4` to a file extension (`.mp4`).
pub fn media_type_to_ext(media_type: &str) -> String {
    let parts: Vec<&str> = media_type.split('/').collect();
    match parts.as_slice() {
        [kind, subtype] if !kind.is_empty() && !subtype.is_empty() => format!(".{}", subtype),
        _ => FALLBACK_EXT.to_string(),
    }
}

/// Build an asset key from caller-supplied random bytes.
pub fn asset_key_from_bytes(random: &[u8; ASSET_KEY_BYTES], media_type: &str) -> String {
    format!("{}{}", URL_SAFE_NO_PAD.encode(random), media_type_to_ext(media_type))
}

/// Generate a fresh, collision-resistant asset key for an upload.
///
/// The key never contains anything derived from the client's file name.
pub fn new_asset_key(media_type: &str) -> String {
    let random: [u8; ASSET_KEY_BYTES] = rand::random();
    asset_key_from_bytes(&random, media_type)
}

/// Full object key for a video: `<directory>/<asset key>`.
pub fn video_object_key(ratio: AspectRatio, media_type: &str) -> String {
    format!("{}/{}", ratio.directory(), new_asset_key(media_type))
}

pub fn thumbnail_object_key(media_type: &str) -> String {
    format!("thumbnails/{}", new_asset_key(media_type))
}

/// Stored form of an object reference (`bucket,key`), resolved to a presigned URL on read.
pub fn encode_object_ref(bucket: &str, key: &str) -> String {
    format!("{},{}", bucket, key)
}

/// Split a stored reference back into `(bucket, key)`; `None` for plain URLs.
pub fn decode_object_ref(stored: &str) -> Option<(&str, &str)> {
    let (bucket, key) = stored.split_once(',')?;
    if bucket.is_empty() || key.is_empty() {
        return None;
    }
    Some((bucket, key))
}
