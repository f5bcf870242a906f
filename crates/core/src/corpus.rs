//! Case corpus construction.
//!
//! Every immediate sub-folder of the case root is one candidate case. Its tree is walked top
//! down; each file becomes an [`ImageRef`] labelled with the folder path between the case
//! folder and the file. Cases without any file are dropped, and a case whose tree cannot be
//! read is skipped with a warning rather than aborting the build.

use crate::constants::{MAX_CASE_DEPTH, ROOT_IMAGE_LABEL, UNKNOWN_CLINICAL_INFO, UNKNOWN_DIAGNOSIS};
use crate::metadata::MetadataIndex;
use crate::{BenchError, BenchResult};
use orbit_types::CaseId;
use std::cmp::Ordering;
use std::fs;
use std::path::{Path, PathBuf};

/// One image of a case.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImageRef {
    pub path: PathBuf,
    /// Underscore-joined folder segments, e.g. `CT_Axial_bone_window`.
    pub label: String,
}

/// One case of the corpus. Never mutated once the corpus is built.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CaseRecord {
    pub case_id: CaseId,
    pub diagnosis: String,
    pub clinical_info: String,
    pub images: Vec<ImageRef>,
}

/// Builds the corpus from the case root and the case index.
///
/// Cases are returned in numeric folder order (non-numeric names after, alphabetically).
///
/// # Errors
///
/// Returns [`BenchError::CaseRootRead`] if the case root cannot be resolved or listed.
/// Failures inside a single case folder only drop that case.
pub fn build_corpus(case_root: &Path, index: &MetadataIndex) -> BenchResult<Vec<CaseRecord>> {
    let root_error = |source: std::io::Error| BenchError::CaseRootRead {
        path: case_root.to_path_buf(),
        source,
    };

    let root = fs::canonicalize(case_root).map_err(root_error)?;
    let entries = fs::read_dir(&root).map_err(root_error)?;

    let mut candidates: Vec<(CaseId, PathBuf)> = Vec::new();
    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!("skipping unreadable entry in {}: {}", root.display(), e);
                continue;
            }
        };

        // A linked case folder counts; links below it are handled by `collect_images`.
        let is_case_folder = match entry.file_type() {
            Ok(ft) if ft.is_symlink() => fs::metadata(entry.path()).map(|m| m.is_dir()),
            Ok(ft) => Ok(ft.is_dir()),
            Err(e) => Err(e),
        };
        match is_case_folder {
            Ok(true) => {}
            Ok(false) => continue,
            Err(e) => {
                tracing::warn!("skipping {}: {}", entry.path().display(), e);
                continue;
            }
        }

        let name = entry.file_name();
        let Some(case_id) = name.to_str().and_then(|n| CaseId::new(n).ok()) else {
            tracing::warn!(
                "skipping case folder with unusable name: {}",
                entry.path().display()
            );
            continue;
        };
        candidates.push((case_id, entry.path()));
    }

    candidates.sort_by(|(a, _), (b, _)| case_order(a, b));

    let mut corpus = Vec::with_capacity(candidates.len());
    for (case_id, folder) in candidates {
        let mut images = Vec::new();
        let mut segments = Vec::new();
        if let Err(e) = collect_images(&folder, &mut segments, &mut images) {
            tracing::warn!("skipping case {}: {}", case_id, e);
            continue;
        }

        if images.is_empty() {
            tracing::info!("skipping case {}: no image files", case_id);
            continue;
        }

        let (diagnosis, clinical_info) = match index.lookup(&case_id) {
            Some(row) => (row.diagnosis.clone(), row.clinical_info()),
            None => {
                tracing::warn!("case {} has no case index row", case_id);
                (
                    UNKNOWN_DIAGNOSIS.to_string(),
                    UNKNOWN_CLINICAL_INFO.to_string(),
                )
            }
        };

        tracing::debug!("case {}: {} image(s)", case_id, images.len());
        corpus.push(CaseRecord {
            case_id,
            diagnosis,
            clinical_info,
            images,
        });
    }

    tracing::info!("built corpus of {} case(s) from {}", corpus.len(), root.display());
    Ok(corpus)
}

/// Label for images found under `segments` (relative to the case folder).
pub fn image_label(segments: &[String]) -> String {
    if segments.is_empty() {
        ROOT_IMAGE_LABEL.to_string()
    } else {
        segments.join("_")
    }
}

fn case_order(a: &CaseId, b: &CaseId) -> Ordering {
    match (a.as_str().parse::<u64>(), b.as_str().parse::<u64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y).then_with(|| a.cmp(b)),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    }
}

/// Walks one directory: its files first (sorted by name), then its sub-folders.
///
/// Symlinked files are followed; symlinked folders are not, so a link cycle cannot recurse.
fn collect_images(
    dir: &Path,
    segments: &mut Vec<String>,
    images: &mut Vec<ImageRef>,
) -> BenchResult<()> {
    if segments.len() > MAX_CASE_DEPTH {
        return Err(BenchError::InvalidInput(format!(
            "{} is nested more than {} folders deep",
            dir.display(),
            MAX_CASE_DEPTH
        )));
    }

    let folder_error = |source: std::io::Error| BenchError::CaseFolderRead {
        path: dir.to_path_buf(),
        source,
    };

    let mut files = Vec::new();
    let mut subdirs = Vec::new();
    for entry in fs::read_dir(dir).map_err(folder_error)? {
        let entry = entry.map_err(folder_error)?;
        let file_type = entry.file_type().map_err(folder_error)?;
        let path = entry.path();

        if file_type.is_dir() {
            subdirs.push((entry.file_name(), path));
        } else if file_type.is_file() {
            files.push((entry.file_name(), path));
        } else if file_type.is_symlink() {
            match fs::metadata(&path) {
                Ok(target) if target.is_file() => files.push((entry.file_name(), path)),
                Ok(_) => tracing::debug!("not following folder link {}", path.display()),
                Err(e) => tracing::warn!("skipping broken link {}: {}", path.display(), e),
            }
        }
    }

    files.sort();
    subdirs.sort();

    if !files.is_empty() {
        let label = image_label(segments);
        images.extend(files.into_iter().map(|(_, path)| ImageRef {
            path,
            label: label.clone(),
        }));
    }

    for (name, path) in subdirs {
        segments.push(name.to_string_lossy().into_owned());
        let walked = collect_images(&path, segments, images);
        segments.pop();
        walked?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const HEADER: &str = "idnum,Diagnosis,Presentation,Age,Gender\n";

    struct Fixture {
        _temp: TempDir,
        root: PathBuf,
        index: MetadataIndex,
    }

    fn fixture(index_rows: &str) -> Fixture {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("Cases");
        fs::create_dir_all(&root).unwrap();
        let index_path = temp.path().join("case_index.csv");
        fs::write(&index_path, format!("{}{}", HEADER, index_rows)).unwrap();
        let index = MetadataIndex::load(&index_path).unwrap();
        Fixture {
            _temp: temp,
            root,
            index,
        }
    }

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"\xFF\xD8\xFF\xE0").unwrap();
    }

    #[test]
    fn single_case_with_nested_images() {
        let fx = fixture("19,orbital lymphoma,painless proptosis,45,M\n");
        touch(&fx.root.join("19/CT/Axial/bone_window/a.jpg"));
        touch(&fx.root.join("19/CT/Axial/bone_window/b.jpg"));

        let corpus = build_corpus(&fx.root, &fx.index).unwrap();

        assert_eq!(corpus.len(), 1);
        let case = &corpus[0];
        assert_eq!(case.case_id.as_str(), "19");
        assert_eq!(case.diagnosis, "orbital lymphoma");
        assert_eq!(case.clinical_info, "45 year old male. painless proptosis");
        assert_eq!(case.images.len(), 2);
        assert!(case
            .images
            .iter()
            .all(|i| i.label == "CT_Axial_bone_window" && i.path.is_absolute()));
    }

    #[test]
    fn empty_case_is_dropped() {
        let fx = fixture("");
        fs::create_dir_all(fx.root.join("5/MRI/Axial/T1")).unwrap();
        touch(&fx.root.join("6/MRI/Axial/T1/a.jpg"));

        let corpus = build_corpus(&fx.root, &fx.index).unwrap();

        let ids: Vec<&str> = corpus.iter().map(|c| c.case_id.as_str()).collect();
        assert_eq!(ids, ["6"]);
    }

    #[test]
    fn case_without_index_row_is_unknown() {
        let fx = fixture("1,x,y,30,F\n");
        touch(&fx.root.join("2/CT/a.jpg"));

        let corpus = build_corpus(&fx.root, &fx.index).unwrap();

        assert_eq!(corpus[0].clinical_info, UNKNOWN_CLINICAL_INFO);
        assert_eq!(corpus[0].diagnosis, UNKNOWN_DIAGNOSIS);
    }

    #[test]
    fn female_code_yields_female() {
        let fx = fixture("4,d,p,52,F\n");
        touch(&fx.root.join("4/MRI/a.jpg"));

        let corpus = build_corpus(&fx.root, &fx.index).unwrap();
        assert!(corpus[0].clinical_info.starts_with("52 year old female."));
    }

    #[test]
    fn root_level_images_get_root_label_and_come_first() {
        let fx = fixture("");
        touch(&fx.root.join("8/overview.jpg"));
        touch(&fx.root.join("8/MRI/Coronal/T2/b.jpg"));
        touch(&fx.root.join("8/CT/Sagittal/non-contrast/a.jpg"));

        let corpus = build_corpus(&fx.root, &fx.index).unwrap();
        let labels: Vec<&str> = corpus[0].images.iter().map(|i| i.label.as_str()).collect();

        assert_eq!(labels, ["root", "CT_Sagittal_non-contrast", "MRI_Coronal_T2"]);
    }

    #[test]
    fn cases_are_ordered_numerically() {
        let fx = fixture("");
        for id in ["10", "9", "alpha", "100"] {
            touch(&fx.root.join(id).join("x/a.jpg"));
        }

        let corpus = build_corpus(&fx.root, &fx.index).unwrap();
        let ids: Vec<&str> = corpus.iter().map(|c| c.case_id.as_str()).collect();

        assert_eq!(ids, ["9", "10", "100", "alpha"]);
    }

    #[test]
    fn files_in_case_root_folder_are_ignored() {
        let fx = fixture("");
        touch(&fx.root.join("notes.txt"));
        touch(&fx.root.join("3/a.jpg"));

        let corpus = build_corpus(&fx.root, &fx.index).unwrap();
        assert_eq!(corpus.len(), 1);
    }

    #[test]
    fn missing_root_is_fatal() {
        let fx = fixture("");
        let result = build_corpus(&fx.root.join("missing"), &fx.index);
        assert!(matches!(result, Err(BenchError::CaseRootRead { .. })));
    }

    #[test]
    fn overly_deep_case_is_skipped() {
        let fx = fixture("");
        let mut deep = fx.root.join("11");
        for i in 0..=MAX_CASE_DEPTH + 1 {
            deep = deep.join(format!("d{}", i));
        }
        touch(&deep.join("a.jpg"));
        touch(&fx.root.join("12/a.jpg"));

        let corpus = build_corpus(&fx.root, &fx.index).unwrap();
        let ids: Vec<&str> = corpus.iter().map(|c| c.case_id.as_str()).collect();
        assert_eq!(ids, ["12"]);
    }

    #[cfg(unix)]
    #[test]
    fn linked_case_folder_is_included() {
        let fx = fixture("19,orbital lymphoma,painless proptosis,45,M\n");
        let store = fx.root.parent().unwrap().join("store/19");
        touch(&store.join("CT/Axial/a.jpg"));
        std::os::unix::fs::symlink(&store, fx.root.join("19")).unwrap();

        let corpus = build_corpus(&fx.root, &fx.index).unwrap();

        assert_eq!(corpus.len(), 1);
        assert_eq!(corpus[0].case_id.as_str(), "19");
        assert_eq!(corpus[0].diagnosis, "orbital lymphoma");
        assert_eq!(corpus[0].images.len(), 1);
        assert_eq!(corpus[0].images[0].label, "CT_Axial");
    }

    #[test]
    fn image_label_joins_segments() {
        assert_eq!(image_label(&[]), ROOT_IMAGE_LABEL);
        assert_eq!(
            image_label(&["MRI".into(), "Axial".into(), "T1_C+".into()]),
            "MRI_Axial_T1_C+"
        );
    }
}
