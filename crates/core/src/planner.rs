use crate::collector::collect_files;
use crate::exif_reader::{detect_image_format, read_exif_metadata};
use crate::metadata::{ImageFormat, MetadataSource, PartialMetadata, PhotoMetadata};
use crate::sanitize::finalize_stem;
use crate::sequence::{SequenceCounter, DEFAULT_SEQUENCE_WIDTH};
use crate::template::{parse_template, render_template, TemplatePart};
use crate::DEFAULT_TEMPLATE;
use anyhow::Result;
use chrono::{DateTime, Local, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct PlanOptions {
    pub inputs: Vec<PathBuf>,
    pub recursive: bool,
    pub include_hidden: bool,
    pub template: String,
    pub sequence_start: u64,
    pub sequence_width: usize,
    pub ext_from_format: bool,
}

impl Default for PlanOptions {
    fn default() -> Self {
        Self {
            inputs: Vec::new(),
            recursive: false,
            include_hidden: false,
            template: DEFAULT_TEMPLATE.to_string(),
            sequence_start: 1,
            sequence_width: DEFAULT_SEQUENCE_WIDTH,
            ext_from_format: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenameCandidate {
    pub original_path: PathBuf,
    pub target_path: PathBuf,
    pub sequence: u64,
    pub metadata: PhotoMetadata,
    pub changed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum SkipReason {
    NotFound,
    NotAnImage,
    Unreadable(String),
    NoTimestamp,
    TargetExists(PathBuf),
    RenameFailed(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NotFound => write!(f, "path does not exist"),
            SkipReason::NotAnImage => write!(f, "not an image file"),
            SkipReason::Unreadable(msg) => write!(f, "could not read file: {msg}"),
            SkipReason::NoTimestamp => write!(f, "no timestamp found"),
            SkipReason::TargetExists(target) => {
                write!(f, "target already exists: {}", target.display())
            }
            SkipReason::RenameFailed(msg) => write!(f, "failed to rename file: {msg}"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RenameStats {
    pub scanned_files: usize,
    pub image_files: usize,
    pub skipped_hidden: usize,
    pub skipped_non_image: usize,
    pub skipped_collision: usize,
    pub planned: usize,
    pub unchanged: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenamePlan {
    pub template: String,
    pub candidates: Vec<RenameCandidate>,
    pub skipped: Vec<SkippedFile>,
    pub stats: RenameStats,
}

/// Tracks the names a sequential run would see on disk: targets claimed by earlier
/// files are taken, sources they moved away from are free again.
#[derive(Debug, Default)]
struct NameLedger {
    claimed: HashSet<PathBuf>,
    vacated: HashSet<PathBuf>,
}

impl NameLedger {
    fn is_taken(&self, candidate: &Path, original_path: &Path) -> bool {
        if candidate == original_path {
            return false;
        }
        if self.claimed.contains(candidate) {
            return true;
        }
        !self.vacated.contains(candidate) && path_occupied(candidate)
    }

    fn record(&mut self, original_path: &Path, target: &Path) {
        if original_path == target {
            self.claimed.insert(target.to_path_buf());
            return;
        }
        self.vacated.insert(original_path.to_path_buf());
        self.claimed.remove(original_path);
        self.claimed.insert(target.to_path_buf());
        self.vacated.remove(target);
    }
}

/// True when anything sits at `path`, including a symlink whose target is gone.
pub(crate) fn path_occupied(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok()
}

/// Resolves every input into a rename plan without touching the filesystem.
///
/// The template is validated before anything is scanned, so a bad format string
/// fails the whole call. Per-file problems become [`SkippedFile`] entries.
pub fn generate_plan(options: &PlanOptions) -> Result<RenamePlan> {
    let parts = parse_template(&options.template)?;
    let collected = collect_files(&options.inputs, options.recursive, options.include_hidden)?;

    let mut stats = RenameStats {
        scanned_files: collected.stats.scanned_files,
        skipped_hidden: collected.stats.skipped_hidden,
        ..RenameStats::default()
    };
    let mut skipped: Vec<SkippedFile> = collected
        .missing
        .into_iter()
        .map(|path| SkippedFile {
            path,
            reason: SkipReason::NotFound,
        })
        .chain(
            collected
                .unreadable
                .into_iter()
                .map(|(path, msg)| SkippedFile {
                    path,
                    reason: SkipReason::Unreadable(msg),
                }),
        )
        .collect();

    let mut sequence = SequenceCounter::new(options.sequence_start, options.sequence_width);
    let mut ledger = NameLedger::default();
    let mut candidates = Vec::with_capacity(collected.files.len());

    for path in collected.files {
        let metadata = match resolve_metadata(&path) {
            Ok(metadata) => metadata,
            Err(reason) => {
                if reason == SkipReason::NotAnImage {
                    stats.skipped_non_image += 1;
                }
                warn!(path = %path.display(), %reason, "skipping file");
                skipped.push(SkippedFile { path, reason });
                continue;
            }
        };
        stats.image_files += 1;

        let target = target_path_for(&parts, &metadata, &sequence, options.ext_from_format);
        if ledger.is_taken(&target, &path) {
            stats.skipped_collision += 1;
            let reason = SkipReason::TargetExists(target);
            warn!(path = %path.display(), %reason, "skipping file");
            skipped.push(SkippedFile { path, reason });
            continue;
        }

        ledger.record(&path, &target);
        let changed = target != path;
        if !changed {
            stats.unchanged += 1;
        }
        stats.planned += 1;

        candidates.push(RenameCandidate {
            original_path: path,
            target_path: target,
            sequence: sequence.current(),
            metadata,
            changed,
        });
        sequence.advance();
    }

    Ok(RenamePlan {
        template: options.template.clone(),
        candidates,
        skipped,
        stats,
    })
}

fn target_path_for(
    parts: &[TemplatePart],
    metadata: &PhotoMetadata,
    sequence: &SequenceCounter,
    ext_from_format: bool,
) -> PathBuf {
    let file_name = file_name_for(parts, metadata, sequence, ext_from_format);
    match metadata.path.parent() {
        Some(parent) => parent.join(file_name),
        None => PathBuf::from(file_name),
    }
}

fn file_name_for(
    parts: &[TemplatePart],
    metadata: &PhotoMetadata,
    sequence: &SequenceCounter,
    ext_from_format: bool,
) -> String {
    let rendered = render_template(parts, metadata, &sequence.formatted());
    let stem = finalize_stem(&rendered);
    match extension_for(metadata, ext_from_format) {
        Some(ext) => format!("{stem}.{ext}"),
        None => stem,
    }
}

fn extension_for(metadata: &PhotoMetadata, ext_from_format: bool) -> Option<String> {
    if ext_from_format {
        return Some(metadata.format.extension().to_string());
    }
    metadata
        .path
        .extension()
        .map(|ext| ext.to_string_lossy().to_string())
}

fn resolve_metadata(path: &Path) -> std::result::Result<PhotoMetadata, SkipReason> {
    let format = match detect_image_format(path) {
        Ok(Some(format)) => format,
        Ok(None) => return Err(SkipReason::NotAnImage),
        Err(err) => return Err(SkipReason::Unreadable(format!("{err:#}"))),
    };

    let exif = match read_exif_metadata(path) {
        Ok(exif) => exif,
        Err(err) => {
            debug!(
                path = %path.display(),
                error = %format!("{err:#}"),
                "no usable EXIF, using file timestamps"
            );
            PartialMetadata::default()
        }
    };

    let (date, source) = match exif.date {
        Some(date) => (date, MetadataSource::Exif),
        None => {
            let modified = file_modified_to_local(path).ok_or(SkipReason::NoTimestamp)?;
            (modified, MetadataSource::FallbackFileModified)
        }
    };

    let metadata = to_photo_metadata(exif, source, format, date, path);
    debug!(
        path = %path.display(),
        source = ?metadata.source,
        date = %metadata.date,
        make = ?metadata.camera_make,
        model = ?metadata.camera_model,
        "resolved metadata"
    );
    Ok(metadata)
}

fn to_photo_metadata(
    partial: PartialMetadata,
    source: MetadataSource,
    format: ImageFormat,
    date: NaiveDateTime,
    path: &Path,
) -> PhotoMetadata {
    let folder = path
        .parent()
        .and_then(Path::file_name)
        .map(|v| v.to_string_lossy().to_string())
        .unwrap_or_default();
    let original_name = path
        .file_stem()
        .map(|v| v.to_string_lossy().to_string())
        .unwrap_or_default();

    PhotoMetadata {
        source,
        format,
        date,
        artist: partial.artist,
        camera_make: partial.camera_make,
        camera_model: partial.camera_model,
        folder,
        original_name,
        path: path.to_path_buf(),
    }
}

fn file_modified_to_local(path: &Path) -> Option<NaiveDateTime> {
    let time = fs::metadata(path).ok()?.modified().ok()?;
    Some(DateTime::<Local>::from(time).naive_local())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exif_reader::fixtures::{bare_jpeg, jpeg_with_exif, ExifFields};
    use chrono::TimeZone;
    use filetime::FileTime;
    use tempfile::tempdir;

    fn write_exif_jpeg(path: &Path, date: &str) {
        let bytes = jpeg_with_exif(&ExifFields {
            date: Some(date),
            make: Some("PENTAX"),
            model: Some("PENTAX K-x"),
            artist: None,
        });
        fs::write(path, bytes).expect("write jpeg");
    }

    fn options(root: &Path, template: &str) -> PlanOptions {
        PlanOptions {
            inputs: vec![root.to_path_buf()],
            template: template.to_string(),
            ..PlanOptions::default()
        }
    }

    fn target_names(plan: &RenamePlan) -> Vec<String> {
        plan.candidates
            .iter()
            .map(|c| {
                c.target_path
                    .file_name()
                    .expect("file name")
                    .to_string_lossy()
                    .to_string()
            })
            .collect()
    }

    #[test]
    fn plan_renders_wedding_shoot_example() {
        let temp = tempdir().expect("tempdir");
        let folder = temp.path().join("Wedding_Shoot");
        fs::create_dir_all(&folder).expect("mkdir");
        write_exif_jpeg(&folder.join("DSC_0001.JPEG"), "2014:05:09 11:00:00");
        write_exif_jpeg(&folder.join("DSC_0002.JPEG"), "2014:05:09 11:05:00");

        let plan = generate_plan(&options(&folder, "{YYYY}-{MM}-{DD}-{Folder}-{Seq}"))
            .expect("plan");
        assert_eq!(
            target_names(&plan),
            vec![
                "2014-05-09-Wedding_Shoot-001.JPEG",
                "2014-05-09-Wedding_Shoot-002.JPEG"
            ]
        );
        assert!(plan.skipped.is_empty());
        assert_eq!(plan.stats.planned, 2);
        assert!(plan
            .candidates
            .iter()
            .all(|c| c.metadata.source == MetadataSource::Exif));
    }

    #[test]
    fn plan_does_not_touch_filesystem() {
        let temp = tempdir().expect("tempdir");
        write_exif_jpeg(&temp.path().join("a.jpg"), "2020:01:02 03:04:05");

        let plan = generate_plan(&options(temp.path(), "{YYYY}{MM}{DD}_{Seq}")).expect("plan");
        assert_eq!(target_names(&plan), vec!["20200102_001.jpg"]);
        assert!(temp.path().join("a.jpg").exists());
        assert!(!temp.path().join("20200102_001.jpg").exists());
    }

    #[test]
    fn invalid_template_fails_before_scanning() {
        let options = PlanOptions {
            inputs: vec![PathBuf::from("/definitely/not/here")],
            template: "{YYYY}-{Nope}".to_string(),
            ..PlanOptions::default()
        };
        let err = generate_plan(&options).expect_err("template must be rejected");
        assert!(err.to_string().contains("Nope"));
    }

    #[test]
    fn non_images_and_missing_inputs_are_skipped() {
        let temp = tempdir().expect("tempdir");
        fs::write(temp.path().join("notes.txt"), b"hello").expect("write txt");
        write_exif_jpeg(&temp.path().join("photo.jpg"), "2020:01:02 03:04:05");

        let mut opts = options(temp.path(), "{Seq}");
        opts.inputs.push(temp.path().join("gone"));
        let plan = generate_plan(&opts).expect("plan");

        assert_eq!(target_names(&plan), vec!["001.jpg"]);
        assert_eq!(plan.stats.skipped_non_image, 1);
        let reasons: Vec<&SkipReason> = plan.skipped.iter().map(|s| &s.reason).collect();
        assert!(reasons.contains(&&SkipReason::NotAnImage));
        assert!(reasons.contains(&&SkipReason::NotFound));
    }

    #[test]
    fn missing_exif_falls_back_to_modified_time() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("scan.jpg");
        fs::write(&path, bare_jpeg()).expect("write");
        let mtime = Local
            .with_ymd_and_hms(2019, 12, 31, 23, 58, 7)
            .single()
            .expect("unambiguous local time");
        filetime::set_file_mtime(&path, FileTime::from_unix_time(mtime.timestamp(), 0))
            .expect("set mtime");

        let plan = generate_plan(&options(temp.path(), "{YYYY}{MM}{DD}-{hh}{mm}{ss}-[{Make}]"))
            .expect("plan");
        assert_eq!(target_names(&plan), vec!["20191231-235807-[].jpg"]);
        assert_eq!(
            plan.candidates[0].metadata.source,
            MetadataSource::FallbackFileModified
        );
    }

    #[test]
    fn existing_target_is_skipped_and_sequence_not_consumed() {
        let temp = tempdir().expect("tempdir");
        let root = temp.path();
        write_exif_jpeg(&root.join("a.jpg"), "2020:01:01 00:00:00");
        write_exif_jpeg(&root.join("b.jpg"), "2020:01:01 00:00:00");
        write_exif_jpeg(&root.join("c.jpg"), "2020:01:02 00:00:00");
        fs::write(root.join("20200101.jpg"), b"already here").expect("write");

        let plan = generate_plan(&options(root, "{YYYY}{MM}{DD}")).expect("plan");

        assert_eq!(target_names(&plan), vec!["20200102.jpg"]);
        let skipped: Vec<PathBuf> = plan.skipped.iter().map(|s| s.path.clone()).collect();
        assert_eq!(skipped, vec![root.join("a.jpg"), root.join("b.jpg")]);
        assert_eq!(plan.stats.skipped_collision, 2);
    }

    #[test]
    fn later_file_collides_with_name_claimed_earlier_in_run() {
        let temp = tempdir().expect("tempdir");
        let root = temp.path();
        write_exif_jpeg(&root.join("a.jpg"), "2020:01:01 00:00:00");
        write_exif_jpeg(&root.join("b.jpg"), "2020:01:01 00:00:00");

        let plan = generate_plan(&options(root, "{YYYY}-{Seq}")).expect("plan");
        assert_eq!(target_names(&plan), vec!["2020-001.jpg", "2020-002.jpg"]);

        let plan = generate_plan(&options(root, "{YYYY}")).expect("plan");
        assert_eq!(target_names(&plan), vec!["2020.jpg"]);
        assert_eq!(
            plan.skipped[0].reason,
            SkipReason::TargetExists(root.join("2020.jpg"))
        );
    }

    #[test]
    fn source_name_vacated_earlier_in_run_is_free() {
        let temp = tempdir().expect("tempdir");
        let root = temp.path();
        write_exif_jpeg(&root.join("001.jpg"), "2020:01:01 00:00:00");
        write_exif_jpeg(&root.join("002.jpg"), "2020:01:01 00:00:00");

        let mut opts = options(root, "{Seq}");
        opts.sequence_start = 2;
        let plan = generate_plan(&opts).expect("plan");

        // 001.jpg -> 002.jpg collides with the untouched 002.jpg; 002.jpg keeps its name.
        assert_eq!(target_names(&plan), vec!["002.jpg"]);
        assert!(!plan.candidates[0].changed);
        assert_eq!(plan.stats.unchanged, 1);
        assert_eq!(plan.skipped.len(), 1);

        let temp = tempdir().expect("tempdir");
        let root = temp.path();
        write_exif_jpeg(&root.join("001.jpg"), "2020:01:01 00:00:00");
        write_exif_jpeg(&root.join("x.jpg"), "2020:01:01 00:00:00");

        let mut opts = options(root, "{Seq}");
        opts.sequence_start = 0;
        let plan = generate_plan(&opts).expect("plan");
        assert_eq!(target_names(&plan), vec!["000.jpg", "001.jpg"]);
        assert!(plan.skipped.is_empty());
    }

    #[test]
    fn sequence_is_shared_across_folders_and_strictly_increasing() {
        let temp = tempdir().expect("tempdir");
        let root = temp.path();
        fs::create_dir_all(root.join("day1")).expect("mkdir");
        fs::create_dir_all(root.join("day2")).expect("mkdir");
        write_exif_jpeg(&root.join("top.jpg"), "2020:01:01 00:00:00");
        write_exif_jpeg(&root.join("day1").join("x.jpg"), "2020:01:01 00:00:00");
        write_exif_jpeg(&root.join("day2").join("y.jpg"), "2020:01:02 00:00:00");
        write_exif_jpeg(&root.join("day2").join("z.jpg"), "2020:01:02 00:00:00");

        let mut opts = options(root, "{Folder}_{Seq}");
        opts.recursive = true;
        opts.sequence_start = 9;
        opts.sequence_width = 2;
        let plan = generate_plan(&opts).expect("plan");

        let sequences: Vec<u64> = plan.candidates.iter().map(|c| c.sequence).collect();
        assert_eq!(sequences, vec![9, 10, 11, 12]);
        let names = target_names(&plan);
        assert_eq!(names[1], "day1_10.jpg");
        assert_eq!(names[3], "day2_12.jpg");
    }

    #[test]
    fn ext_from_format_uses_container_name() {
        let temp = tempdir().expect("tempdir");
        write_exif_jpeg(&temp.path().join("photo.jpg"), "2014:05:09 00:00:00");

        let mut opts = options(temp.path(), "{YYYY}_{Seq}");
        opts.ext_from_format = true;
        let plan = generate_plan(&opts).expect("plan");
        assert_eq!(target_names(&plan), vec!["2014_001.JPEG"]);
    }

    #[test]
    fn plan_serializes_to_json() {
        let temp = tempdir().expect("tempdir");
        write_exif_jpeg(&temp.path().join("a.jpg"), "2014:05:09 00:00:00");
        let plan = generate_plan(&options(temp.path(), "{Seq}")).expect("plan");
        let json = serde_json::to_string(&plan).expect("serialize");
        assert!(json.contains("\"target_path\""));
        assert!(json.contains("001.jpg"));
    }

    #[cfg(unix)]
    #[test]
    fn dangling_symlink_at_target_counts_as_taken() {
        let temp = tempdir().expect("tempdir");
        let root = temp.path();
        write_exif_jpeg(&root.join("a.jpg"), "2014:05:09 00:00:00");
        std::os::unix::fs::symlink(root.join("missing.jpg"), root.join("2014.jpg"))
            .expect("symlink");

        let plan = generate_plan(&options(root, "{YYYY}")).expect("plan");
        assert!(plan.candidates.is_empty());
        assert_eq!(
            plan.skipped,
            vec![SkippedFile {
                path: root.join("a.jpg"),
                reason: SkipReason::TargetExists(root.join("2014.jpg")),
            }]
        );
    }

    #[cfg(unix)]
    #[test]
    fn unreadable_file_is_skipped_without_consuming_sequence() {
        use std::os::unix::fs::PermissionsExt;

        let temp = tempdir().expect("tempdir");
        let root = temp.path();
        write_exif_jpeg(&root.join("a.jpg"), "2014:05:09 00:00:00");
        write_exif_jpeg(&root.join("b.jpg"), "2014:05:09 00:00:00");
        let locked = root.join("a.jpg");
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).expect("chmod");
        if fs::File::open(&locked).is_ok() {
            // Permissions are not enforced for this user.
            return;
        }

        let plan = generate_plan(&options(root, "{Seq}"));
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o644)).expect("restore");

        let plan = plan.expect("plan");
        assert_eq!(target_names(&plan), vec!["001.jpg"]);
        assert_eq!(plan.skipped.len(), 1);
        assert_eq!(plan.skipped[0].path, locked);
        assert!(matches!(plan.skipped[0].reason, SkipReason::Unreadable(_)));
    }

    #[cfg(unix)]
    #[test]
    fn recursive_plan_continues_past_unreadable_folder() {
        use std::os::unix::fs::PermissionsExt;

        let temp = tempdir().expect("tempdir");
        let root = temp.path();
        let locked = root.join("locked");
        fs::create_dir_all(&locked).expect("mkdir");
        write_exif_jpeg(&locked.join("inner.jpg"), "2014:05:09 00:00:00");
        write_exif_jpeg(&root.join("a.jpg"), "2014:05:09 00:00:00");
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).expect("chmod");
        if fs::read_dir(&locked).is_ok() {
            fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).expect("restore");
            return;
        }

        let mut opts = options(root, "{Folder}_{Seq}");
        opts.recursive = true;
        let plan = generate_plan(&opts);
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).expect("restore");

        let plan = plan.expect("an unreadable folder must not abort the plan");
        assert_eq!(plan.candidates.len(), 1);
        assert_eq!(plan.candidates[0].original_path, root.join("a.jpg"));
        assert_eq!(plan.skipped.len(), 1);
        assert_eq!(plan.skipped[0].path, locked);
        assert!(matches!(plan.skipped[0].reason, SkipReason::Unreadable(_)));
    }
}
