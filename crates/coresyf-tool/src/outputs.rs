use crate::errors::OutputError;
use coresyf_manifest::{Bindings, Manifest};
use std::fs;
use std::path::PathBuf;
use tracing::debug;

/// Check that every bound output path exists and is non-empty.
/// A directory counts as empty when it has no entries.
pub fn check_outputs(manifest: &Manifest, bindings: &Bindings) -> Result<(), OutputError> {
    for spec in manifest.outputs() {
        for path in bindings.paths(&spec.identifier) {
            check_output(&spec.identifier, path)?;
        }
    }
    Ok(())
}

fn check_output(identifier: &str, path: PathBuf) -> Result<(), OutputError> {
    if !path.exists() {
        return Err(OutputError::MissingOutputFile {
            identifier: identifier.to_string(),
            path,
        });
    }

    let empty = if path.is_dir() {
        fs::read_dir(&path)?.next().is_none()
    } else {
        fs::metadata(&path)?.len() == 0
    };
    if empty {
        return Err(OutputError::EmptyOutputFile {
            identifier: identifier.to_string(),
            path,
        });
    }

    debug!("Output '{}' ok: {}", identifier, path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use coresyf_manifest::BindingValue;
    use serde_json::json;
    use tempfile::TempDir;

    fn setup() -> Option<(TempDir, Manifest)> {
        let dir = TempDir::new().ok()?;
        let manifest = Manifest::from_value(json!({
            "name": "t",
            "arguments": [
                {"identifier": "tiles", "type": "output", "multiple": true},
                {"identifier": "log", "type": "output", "required": false}
            ]
        }));
        assert!(manifest.is_ok());
        Some((dir, manifest.ok()?))
    }

    fn bind_tiles(paths: &[PathBuf]) -> Bindings {
        let mut bindings = Bindings::new();
        bindings.insert(
            "tiles",
            BindingValue::Sequence(
                paths
                    .iter()
                    .map(|p| p.to_string_lossy().into_owned())
                    .collect(),
            ),
        );
        bindings
    }

    #[test]
    fn test_every_element_checked() {
        let Some((dir, manifest)) = setup() else {
            return;
        };
        let good = dir.path().join("t1.tif");
        let missing = dir.path().join("t2.tif");
        assert!(fs::write(&good, "data").is_ok());

        assert!(check_outputs(&manifest, &bind_tiles(&[good.clone()])).is_ok());
        assert!(matches!(
            check_outputs(&manifest, &bind_tiles(&[good, missing.clone()])),
            Err(OutputError::MissingOutputFile { ref path, .. }) if *path == missing
        ));
    }

    #[test]
    fn test_empty_file_and_directory() {
        let Some((dir, manifest)) = setup() else {
            return;
        };
        let empty_file = dir.path().join("empty.tif");
        let empty_dir = dir.path().join("tiles");
        assert!(fs::write(&empty_file, "").is_ok());
        assert!(fs::create_dir(&empty_dir).is_ok());

        assert!(matches!(
            check_outputs(&manifest, &bind_tiles(&[empty_file])),
            Err(OutputError::EmptyOutputFile { .. })
        ));
        assert!(matches!(
            check_outputs(&manifest, &bind_tiles(&[empty_dir.clone()])),
            Err(OutputError::EmptyOutputFile { .. })
        ));

        assert!(fs::write(empty_dir.join("tile_0.tif"), "x").is_ok());
        assert!(check_outputs(&manifest, &bind_tiles(&[empty_dir])).is_ok());
    }
}
