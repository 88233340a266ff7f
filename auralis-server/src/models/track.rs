use serde::{Deserialize, Serialize};

/// A library track. `filepath` is server-internal and is skipped by
/// `Serialize` so it can never leak into a client-facing JSON response —
/// handlers that need it read the field directly, never through a DTO that
/// derives `Serialize` on this struct's full field set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Track {
    pub id: u32,
    #[serde(skip_serializing)]
    pub filepath: String,
    pub duration_s: f64,
    pub sample_rate: u32,
    pub channels: u16,
    pub bit_depth: u16,
    pub title: String,
    pub artists: Vec<String>,
    pub album: Option<String>,
    pub genres: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Album {
    pub id: u32,
    pub title: String,
    pub artist: Option<String>,
    pub track_ids: Vec<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Artist {
    pub id: u32,
    pub name: String,
    pub album_ids: Vec<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filepath_never_serializes() {
        let track = Track {
            id: 1,
            filepath: "/home/user/Music/secret.flac".to_string(),
            duration_s: 180.0,
            sample_rate: 44100,
            channels: 2,
            bit_depth: 16,
            title: "Title".to_string(),
            artists: vec!["Artist".to_string()],
            album: None,
            genres: vec![],
        };
        let json = serde_json::to_string(&track).unwrap();
        assert!(!json.contains("secret.flac"));
        assert!(!json.contains("filepath"));
    }
}
