use crate::types::{Polarization, SarError, SarResult};
use std::path::{Path, PathBuf};

/// Suffix of a Sentinel-1 SAFE product folder
pub const SAFE_SUFFIX: &str = ".SAFE";

/// Position of the polarization token in hyphen-delimited measurement names,
/// e.g. `s1b-iw-grd-vh-20190220t050359-...-002.tiff`
const POLARIZATION_TOKEN: usize = 3;

/// An unpacked Sentinel-1 SAFE product on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SafeArchive {
    path: PathBuf,
}

impl SafeArchive {
    /// Find the SAFE folder below `<input_root>/<data_path>`
    ///
    /// Candidates are sorted by name so the choice does not depend on
    /// directory iteration order.
    pub fn locate<P: AsRef<Path>>(input_root: P, data_path: &str) -> SarResult<Self> {
        let scene_dir = input_root.as_ref().join(data_path);
        let entries = match std::fs::read_dir(&scene_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(SarError::MissingArchive(scene_dir))
            }
            Err(e) => return Err(e.into()),
        };

        let mut candidates = Vec::new();
        for entry in entries {
            let path = entry?.path();
            let is_safe = path
                .file_name()
                .and_then(|n| n.to_str())
                .map(|n| n.ends_with(SAFE_SUFFIX))
                .unwrap_or(false);
            if is_safe && path.is_dir() {
                candidates.push(path);
            }
        }
        candidates.sort();

        match candidates.into_iter().next() {
            Some(path) => {
                log::debug!("Using SAFE archive {}", path.display());
                Ok(Self { path })
            }
            None => Err(SarError::MissingArchive(scene_dir)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Folder name, e.g. `S1B_IW_GRDH_1SDV_..._4EA4.SAFE`
    pub fn name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Folder name without the `.SAFE` suffix
    pub fn product_id(&self) -> String {
        let name = self.name();
        name.strip_suffix(SAFE_SUFFIX).unwrap_or(&name).to_string()
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.path.join("manifest.safe")
    }

    /// Polarizations with a raster in `measurement/`, in file name order
    pub fn polarizations(&self) -> SarResult<Vec<Polarization>> {
        let measurement_dir = self.path.join("measurement");
        if !measurement_dir.is_dir() {
            log::warn!("No measurement folder in {}", self.path.display());
            return Ok(Vec::new());
        }

        let mut files: Vec<PathBuf> = std::fs::read_dir(&measurement_dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.extension().map(|ext| ext == "tiff").unwrap_or(false))
            .collect();
        files.sort();

        let mut polarizations = Vec::new();
        for file in files {
            let stem = file
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            match stem
                .split('-')
                .nth(POLARIZATION_TOKEN)
                .map(str::parse::<Polarization>)
            {
                Some(Ok(pol)) => {
                    if !polarizations.contains(&pol) {
                        polarizations.push(pol);
                    }
                }
                _ => log::debug!("Skipping measurement file without polarization token: {}", stem),
            }
        }

        Ok(polarizations)
    }
}

/// True when every requested polarization is available
pub fn validate_polarisations(requested: &[Polarization], available: &[Polarization]) -> bool {
    requested.iter().all(|pol| available.contains(pol))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const SAFE_NAME: &str = "S1B_IW_GRDH_1SDV_20190220T050359_20190220T050424_015025_01C12F_4EA4.SAFE";

    fn dummy_scene(root: &Path, data_path: &str) -> PathBuf {
        let safe = root.join(data_path).join(SAFE_NAME);
        let measurement = safe.join("measurement");
        fs::create_dir_all(&measurement).unwrap();
        fs::write(safe.join("manifest.safe"), "").unwrap();
        fs::write(
            measurement.join("s1b-iw-grd-vh-20190220t050359-20190220t050424-015025-01c12f-002.tiff"),
            "",
        )
        .unwrap();
        fs::write(
            measurement.join("s1b-iw-grd-vv-20190220t050359-20190220t050424-015025-01c12f-001.tiff"),
            "",
        )
        .unwrap();
        safe
    }

    #[test]
    fn test_validate_polarisations() {
        use Polarization::*;
        let cases = vec![
            (vec![VV], vec![VV], true),
            (vec![HH], vec![HH], true),
            (vec![VV], vec![HH], false),
            (vec![VV, VH], vec![VV, VH], true),
            (vec![VV, VH], vec![HH, HV], false),
            (vec![VV, VH], vec![VV], false),
            (vec![HH], vec![HH, HV], true),
            (vec![VV], vec![], false),
        ];
        for (requested, available, expected) in cases {
            assert_eq!(validate_polarisations(&requested, &available), expected);
        }
    }

    #[test]
    fn test_locate_and_extract() {
        let tmp = TempDir::new().unwrap();
        let safe = dummy_scene(tmp.path(), "0a99c5a1-75c0-4a0d-a7dc-c2a551936be4");

        let archive = SafeArchive::locate(tmp.path(), "0a99c5a1-75c0-4a0d-a7dc-c2a551936be4").unwrap();
        assert_eq!(archive.name(), SAFE_NAME);
        assert_eq!(archive.manifest_path(), safe.join("manifest.safe"));
        assert_eq!(
            archive.product_id(),
            "S1B_IW_GRDH_1SDV_20190220T050359_20190220T050424_015025_01C12F_4EA4"
        );

        let mut pols = archive.polarizations().unwrap();
        pols.sort_by_key(|p| p.to_string());
        assert_eq!(pols, vec![Polarization::VH, Polarization::VV]);
    }

    #[test]
    fn test_missing_archive() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("scene").join("not_a_safe")).unwrap();
        assert!(matches!(
            SafeArchive::locate(tmp.path(), "scene"),
            Err(SarError::MissingArchive(_))
        ));
        assert!(matches!(
            SafeArchive::locate(tmp.path(), "absent"),
            Err(SarError::MissingArchive(_))
        ));
    }
}
