//! Loading composition cassettes for replay.

use std::path::Path;

use tracing::debug;

use super::format::Cassette;
use super::replayer::CassetteReplayer;
use super::{GENERATE_METHOD, GENERATOR_PORT};

/// Load a cassette file and create a replayer.
///
/// Only generator calls are replayed; fetches and uploads always run live,
/// so a cassette recording any other port is rejected up front.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed, or if it records
/// anything other than generator calls.
pub fn load_cassette(path: &Path) -> Result<CassetteReplayer, String> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("Failed to read cassette file {}: {e}", path.display()))?;
    let cassette: Cassette = serde_yaml::from_str(&content)
        .map_err(|e| format!("Failed to parse cassette file {}: {e}", path.display()))?;

    if let Some(other) = cassette
        .interactions
        .iter()
        .find(|i| i.port != GENERATOR_PORT || i.method != GENERATE_METHOD)
    {
        return Err(format!(
            "Cassette {} records {}::{} at seq {}; only {GENERATOR_PORT}::{GENERATE_METHOD} calls can be replayed",
            path.display(),
            other.port,
            other.method,
            other.seq
        ));
    }
    debug!(cassette = %cassette.name, calls = cassette.interactions.len(), "loaded cassette");
    Ok(CassetteReplayer::new(&cassette))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cassette::format::{Cassette, Interaction};
    use chrono::Utc;
    use serde_json::json;

    #[test]
    fn load_valid_cassette() {
        let dir = std::env::temp_dir().join("adcraft_cassette_config_test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("test.cassette.yaml");

        let cassette = Cassette {
            name: "test".into(),
            recorded_at: Utc::now(),
            commit: "abc".into(),
            interactions: vec![Interaction {
                seq: 0,
                port: "image_generator".into(),
                method: "generate".into(),
                input: json!({}),
                output: json!({"Ok": {"parts": [{"text": "no image"}]}}),
            }],
        };
        let yaml = serde_yaml::to_string(&cassette).unwrap();
        std::fs::write(&path, yaml).unwrap();

        let mut replayer = load_cassette(&path).unwrap();
        let i = replayer.next_interaction("image_generator", "generate").unwrap();
        assert_eq!(i.seq, 0);
        assert_eq!(i.output["Ok"]["parts"][0]["text"], "no image");

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn storage_interactions_are_rejected() {
        let dir = std::env::temp_dir().join("adcraft_cassette_config_storage_test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("upload.cassette.yaml");
        std::fs::write(
            &path,
            "name: upload\nrecorded_at: \"2026-01-01T00:00:00Z\"\ncommit: abc\ninteractions:\n  - seq: 0\n    port: object_store\n    method: put\n    input: {}\n    output: {}\n",
        )
        .unwrap();

        let err = load_cassette(&path).unwrap_err();
        assert!(err.contains("object_store::put"), "{err}");

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn load_nonexistent_fails() {
        assert!(load_cassette(Path::new("/nonexistent/cassette.yaml")).is_err());
    }
}
