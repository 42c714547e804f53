//! End-to-end batch runs against a generated source wheel.

use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tempfile::TempDir;
use wheelwright_core::io::extract::extract_zip;
use wheelwright_core::repack::repack;
use wheelwright_core::verify::verify_archive;
use wheelwright_core::{
    BatchError, Issue, NullReporter, Pipeline, RepackConfig, RepackError, Reporter, Stage,
    TimestampPolicy, error_chain,
};
use wheelwright_schema::{PlatformDescriptor, PlatformTag, Record, RecordEntry, RecordHash};
use zip::ZipArchive;
use zip::write::{SimpleFileOptions, ZipWriter};

const SOURCE_NAME: &str = "xspectrampoline-0.1.0-py3-none-any.whl";
const DIST_INFO: &str = "xspectrampoline-0.1.0.dist-info";
const LINUX: &str = "py3-none-linux_x86_64";
const MACOS: &str = "py3-none-macosx_11_0_arm64";
const WHEEL: &str =
    "Wheel-Version: 1.0\nGenerator: setuptools (75.1.0)\nRoot-Is-Purelib: true\nTag: py3-none-any\n\n";

/// Scratch area with a source wheel, artifact trees and an output directory.
struct Fixture {
    dir: TempDir,
}

impl Fixture {
    fn new() -> Self {
        Self::with_wheel_file(WHEEL)
    }

    fn with_wheel_file(wheel: &str) -> Self {
        let fixture = Self {
            dir: TempDir::new().unwrap(),
        };
        fixture.write_source(wheel);
        fixture.write_artifacts("x86_64-linux-gnu-libgfortran5");
        fixture
    }

    fn path(&self) -> &Path {
        self.dir.path()
    }

    fn source(&self) -> PathBuf {
        self.path().join(SOURCE_NAME)
    }

    fn pristine(&self) -> PathBuf {
        self.path().join("pristine").join(SOURCE_NAME)
    }

    fn output(&self) -> PathBuf {
        self.path().join("dist")
    }

    /// Put a fresh copy of the source wheel in place.
    fn restore_source(&self) {
        fs::copy(self.pristine(), self.source()).unwrap();
    }

    fn write_source(&self, wheel: &str) {
        let files: [(String, &[u8]); 3] = [
            ("xspectrampoline/__init__.py".to_string(), b"from .core import model\n"),
            ("xspectrampoline/core.py".to_string(), b"def model():\n    return 1\n"),
            (format!("{DIST_INFO}/WHEEL"), wheel.as_bytes()),
        ];

        let mut record: Record = files
            .iter()
            .map(|(path, data)| {
                RecordEntry::new(path.as_str(), RecordHash::sha256_bytes(data), data.len() as u64)
            })
            .collect();
        record.push(RecordEntry::unhashed(format!("{DIST_INFO}/RECORD")));
        let record = record.to_string();

        let pristine = self.pristine();
        fs::create_dir_all(pristine.parent().unwrap()).unwrap();
        let mut zip = ZipWriter::new(File::create(&pristine).unwrap());
        for (path, data) in &files {
            zip.start_file(path.as_str(), SimpleFileOptions::default()).unwrap();
            zip.write_all(data).unwrap();
        }
        zip.start_file(format!("{DIST_INFO}/RECORD"), SimpleFileOptions::default())
            .unwrap();
        zip.write_all(record.as_bytes()).unwrap();
        zip.finish().unwrap();

        self.restore_source();
    }

    fn write_artifacts(&self, triple: &str) {
        let native = self.path().join(format!("artifacts/LibXSPEC.v6.35.1.{triple}"));
        let support = self
            .path()
            .join(format!("artifacts/CompilerSupportLibraries.v1.1.1.{triple}"));
        write(&native.join("lib/libXS.so"), b"0123456789");
        write(&native.join("lib/empty.cfg"), b"");
        write(&native.join("spectral/modelData/abund.dat"), b"H 12.0\n");
        write(&support.join("lib/libgfortran.so.5"), b"gfortran");
        write(&support.join("share/licenses/LICENSE"), b"GPL");
        write(&support.join("include/ignored.h"), b"not merged");
    }

    fn platform(tag: &str, triple: &str) -> PlatformDescriptor {
        PlatformDescriptor {
            tag: PlatformTag::new(tag).unwrap(),
            native: format!("LibXSPEC.v6.35.1.{triple}"),
            support: format!("CompilerSupportLibraries.v1.1.1.{triple}"),
        }
    }

    fn config(&self, platforms: Vec<PlatformDescriptor>) -> RepackConfig {
        let mut config = RepackConfig::new("xspectrampoline", platforms);
        config.artifacts_dir = self.path().join("artifacts");
        config.output_dir = self.output();
        config.workspace_dir = Some(self.path().join("delete-me"));
        config
    }

    fn linux_config(&self) -> RepackConfig {
        self.config(vec![Self::platform(LINUX, "x86_64-linux-gnu-libgfortran5")])
    }
}

fn write(path: &Path, data: &[u8]) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, data).unwrap();
}

fn read_entry(archive: &Path, name: &str) -> Vec<u8> {
    let mut zip = ZipArchive::new(File::open(archive).unwrap()).unwrap();
    let mut data = Vec::new();
    zip.by_name(name).unwrap().read_to_end(&mut data).unwrap();
    data
}

fn read_record(archive: &Path) -> Record {
    let text = String::from_utf8(read_entry(archive, &format!("{DIST_INFO}/RECORD"))).unwrap();
    Record::parse(&text).unwrap()
}

/// Collects every event it receives.
#[derive(Default)]
struct RecordingReporter {
    started: Mutex<Vec<String>>,
    stages: Mutex<Vec<Stage>>,
    done: Mutex<Vec<String>>,
    failed: Mutex<Vec<(String, String)>>,
    summary: Mutex<Option<(usize, usize)>>,
}

impl Reporter for RecordingReporter {
    fn platform_started(&self, tag: &PlatformTag, _index: usize, _total: usize) {
        self.started.lock().unwrap().push(tag.to_string());
    }
    fn stage(&self, _tag: &PlatformTag, stage: Stage) {
        self.stages.lock().unwrap().push(stage);
    }
    fn platform_done(&self, tag: &PlatformTag, _archive: &Path) {
        self.done.lock().unwrap().push(tag.to_string());
    }
    fn platform_failed(&self, tag: &PlatformTag, error: &RepackError) {
        self.failed
            .lock()
            .unwrap()
            .push((tag.to_string(), error_chain(error)));
    }
    fn summary(&self, succeeded: usize, failed: usize, _elapsed_secs: f64) {
        *self.summary.lock().unwrap() = Some((succeeded, failed));
    }
}

#[test]
fn test_single_platform_produces_consistent_wheel() {
    let fx = Fixture::new();
    let config = fx.linux_config();
    let reporter = RecordingReporter::default();

    let report = Pipeline::new(&config, &reporter).run(&fx.source()).unwrap();

    let archive = fx.output().join("xspectrampoline-0.1.0-py3-none-linux_x86_64.whl");
    assert_eq!(report.archives().collect::<Vec<_>>(), [archive.as_path()]);
    assert!(!fx.source().exists(), "source wheel should be removed");
    assert!(!fx.path().join("delete-me").exists(), "workspace should be removed");
    assert_eq!(*reporter.stages.lock().unwrap(), Stage::ORDER);
    assert_eq!(*reporter.summary.lock().unwrap(), Some((1, 0)));

    let check = verify_archive(&archive).unwrap();
    assert!(check.is_consistent(), "{:?}", check.issues);

    let record = read_record(&archive);
    let lib = record
        .get("xspectrampoline/LibXSPEC_v6_35_1/lib/libXS.so")
        .unwrap();
    assert_eq!(
        lib.to_string(),
        format!(
            "xspectrampoline/LibXSPEC_v6_35_1/lib/libXS.so,{},10",
            RecordHash::sha256_bytes(b"0123456789")
        )
    );
    let empty = record
        .get("xspectrampoline/LibXSPEC_v6_35_1/lib/empty.cfg")
        .unwrap();
    assert_eq!(
        empty.to_string(),
        "xspectrampoline/LibXSPEC_v6_35_1/lib/empty.cfg,sha256=47DEQpj8HBSa-_TImW-5JCeuQeRkm5NMpJWZG3hSuFU,0"
    );
    assert!(record.get("xspectrampoline/LibXSPEC_v6_35_1/share/licenses/LICENSE").is_some());
    assert!(record.get("xspectrampoline/LibXSPEC_v6_35_1/include/ignored.h").is_none());

    // Exactly one WHEEL record, matching the rewritten file
    let wheel_key = format!("{DIST_INFO}/WHEEL");
    let wheel = read_entry(&archive, &wheel_key);
    assert_eq!(record.count(&wheel_key), 1);
    assert_eq!(
        record.get(&wheel_key).unwrap().hash,
        Some(RecordHash::sha256_bytes(&wheel))
    );
    assert_eq!(
        String::from_utf8(wheel).unwrap(),
        WHEEL.replace("py3-none-any", LINUX)
    );

    // Untouched package files come back byte for byte
    assert_eq!(
        read_entry(&archive, "xspectrampoline/__init__.py"),
        b"from .core import model\n"
    );
    assert_eq!(
        read_entry(&archive, "xspectrampoline/LibXSPEC_v6_35_1/lib/libXS.so"),
        b"0123456789"
    );
}

#[test]
fn test_failed_platform_keeps_source_and_continues() {
    let fx = Fixture::new();
    // No artifacts exist for macOS
    let config = fx.config(vec![
        Fixture::platform(MACOS, "aarch64-apple-darwin-libgfortran5"),
        Fixture::platform(LINUX, "x86_64-linux-gnu-libgfortran5"),
    ]);
    let reporter = RecordingReporter::default();

    let err = Pipeline::new(&config, &reporter)
        .run(&fx.source())
        .unwrap_err();

    assert!(matches!(
        err,
        BatchError::PlatformsFailed {
            failed: 1,
            total: 2
        }
    ));
    assert!(fx.source().exists(), "source wheel must be kept");
    assert!(
        fx.output()
            .join("xspectrampoline-0.1.0-py3-none-linux_x86_64.whl")
            .exists()
    );
    assert!(
        !fx.output()
            .join("xspectrampoline-0.1.0-py3-none-macosx_11_0_arm64.whl")
            .exists()
    );

    assert_eq!(*reporter.started.lock().unwrap(), [MACOS, LINUX]);
    assert_eq!(*reporter.done.lock().unwrap(), [LINUX]);
    let failed = reporter.failed.lock().unwrap();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].0, MACOS);
    assert!(failed[0].1.contains("does not exist"), "{}", failed[0].1);
    assert_eq!(*reporter.summary.lock().unwrap(), Some((1, 1)));
}

#[test]
fn test_repeat_runs_give_identical_manifests() {
    let fx = Fixture::new();
    let config = fx.linux_config();
    let archive = fx.output().join("xspectrampoline-0.1.0-py3-none-linux_x86_64.whl");

    Pipeline::new(&config, &NullReporter).run(&fx.source()).unwrap();
    let first = read_record(&archive);

    fx.restore_source();
    Pipeline::new(&config, &NullReporter).run(&fx.source()).unwrap();
    let second = read_record(&archive);

    assert_eq!(first, second);
}

#[test]
fn test_fixed_epoch_is_byte_reproducible() {
    let fx = Fixture::new();
    let mut config = fx.linux_config();
    config.source_date_epoch = Some(315_532_800);
    let archive = fx.output().join("xspectrampoline-0.1.0-py3-none-linux_x86_64.whl");

    Pipeline::new(&config, &NullReporter).run(&fx.source()).unwrap();
    let first = fs::read(&archive).unwrap();

    fx.restore_source();
    Pipeline::new(&config, &NullReporter).run(&fx.source()).unwrap();
    let second = fs::read(&archive).unwrap();

    assert_eq!(first, second);
}

#[test]
fn test_default_workspace_is_temporary() {
    let fx = Fixture::new();
    let mut config = fx.linux_config();
    config.workspace_dir = None;

    let report = Pipeline::new(&config, &NullReporter).run(&fx.source()).unwrap();
    assert_eq!(report.outcomes.len(), 1);
    assert_eq!(report.outcomes[0].tag.as_str(), LINUX);
}

#[test]
fn test_missing_sentinel_fails_platform() {
    let fx = Fixture::with_wheel_file("Wheel-Version: 1.0\nTag: py3-none-manylinux1_x86_64\n");
    let config = fx.linux_config();
    let reporter = RecordingReporter::default();

    let err = Pipeline::new(&config, &reporter)
        .run(&fx.source())
        .unwrap_err();

    assert!(matches!(err, BatchError::PlatformsFailed { failed: 1, total: 1 }));
    let failed = reporter.failed.lock().unwrap();
    assert!(failed[0].1.contains("'Tag: py3-none-any' not found"), "{}", failed[0].1);
    assert!(fx.source().exists());
}

#[test]
fn test_invalid_source_name() {
    let fx = Fixture::new();
    let config = fx.linux_config();
    let bogus = fx.path().join("not-a-wheel.zip");
    fs::write(&bogus, b"").unwrap();

    let err = Pipeline::new(&config, &NullReporter).run(&bogus).unwrap_err();
    assert!(matches!(err, BatchError::InvalidSource(_)));
}

#[test]
fn test_verify_rejects_tampered_archive() {
    let fx = Fixture::new();
    let config = fx.linux_config();
    let report = Pipeline::new(&config, &NullReporter).run(&fx.source()).unwrap();
    let archive = report.outcomes[0].archive.clone();

    // Rewrite the archive with one payload file altered
    let tampered = fx.path().join("tampered.whl");
    let mut src = ZipArchive::new(File::open(&archive).unwrap()).unwrap();
    let mut dst = ZipWriter::new(File::create(&tampered).unwrap());
    for i in 0..src.len() {
        let mut entry = src.by_index(i).unwrap();
        let mut data = Vec::new();
        entry.read_to_end(&mut data).unwrap();
        if entry.name().ends_with("libXS.so") {
            data = b"9876543210".to_vec();
        }
        dst.start_file(entry.name().to_string(), SimpleFileOptions::default())
            .unwrap();
        dst.write_all(&data).unwrap();
    }
    dst.finish().unwrap();

    let check = verify_archive(&tampered).unwrap();
    assert_eq!(
        check.issues,
        [Issue::HashMismatch(
            "xspectrampoline/LibXSPEC_v6_35_1/lib/libXS.so".to_string()
        )]
    );
}

#[test]
fn test_output_replacing_source_is_not_removed() {
    let fx = Fixture::new();
    // Built directly, so validation does not reject the generic tag
    let mut config = fx.config(vec![Fixture::platform(
        "py3-none-any",
        "x86_64-linux-gnu-libgfortran5",
    )]);
    config.output_dir = fx.path().to_path_buf();

    let report = Pipeline::new(&config, &NullReporter).run(&fx.source()).unwrap();

    assert_eq!(report.outcomes[0].archive, fx.source());
    assert!(fx.source().exists(), "repacked wheel must survive");
    let check = verify_archive(&fx.source()).unwrap();
    assert!(check.is_consistent(), "{:?}", check.issues);
    assert!(
        read_record(&fx.source())
            .get("xspectrampoline/LibXSPEC_v6_35_1/lib/libXS.so")
            .is_some()
    );
}

#[test]
fn test_extract_then_repack_preserves_entries() {
    let fx = Fixture::new();
    let ws = fx.path().join("ws");
    extract_zip(&fx.pristine(), &ws).unwrap();

    let archive = repack(
        &ws,
        "xspectrampoline-0.1.0-py3-none-any",
        &[DIST_INFO, "xspectrampoline"],
        &fx.output(),
        TimestampPolicy::Fixed(315_532_800),
    )
    .unwrap();

    let source = ZipArchive::new(File::open(fx.pristine()).unwrap()).unwrap();
    let mut names: Vec<String> = source.file_names().map(str::to_string).collect();
    names.sort();
    let repacked = ZipArchive::new(File::open(&archive).unwrap()).unwrap();
    let mut repacked_names: Vec<String> = repacked.file_names().map(str::to_string).collect();
    repacked_names.sort();
    assert_eq!(names, repacked_names);

    for name in &names {
        assert_eq!(read_entry(&archive, name), read_entry(&fx.pristine(), name), "{name}");
    }
    assert!(verify_archive(&archive).unwrap().is_consistent());
}
