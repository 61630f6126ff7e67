//! Whole-build driver: read the input, translate classes on a worker pool, write the outputs
//!
//! Output layout (under `Settings::output`):
//!
//! ```text
//! classes/...                     rewritten classes, the loader class, copied resources
//! <output_jar>                    ...or all of the above in one archive
//! cpp/jvm2native_bridge.hpp       bridge support header
//! cpp/jvm2native_bridge.cpp       bridge support source
//! cpp/classes/<index>_<name>.cpp  one unit per translated class
//! cpp/jvm2native_output.cpp       JNI entry point of the loader class
//! ```

use super::{
    translate_class, BuildReport, ClassEvent, ClassMethodFilter, ClassOutcome, Diagnostic, Error,
    ProgressListener, Settings,
};
use crate::bridge::{check_link, support_header, support_source, SUPPORT_HEADER_NAME, SUPPORT_SOURCE_NAME};
use crate::jvm::class_file::ClassFile;
use crate::jvm::model::{ClassUnit, MethodUnit};
use crate::jvm::BinaryName;
use crate::native::{emit_class_unit, emit_entry_point, unit_file_name, CppWriter};
use crate::protect::Protection;
use crate::rewrite::{generate_loader, rewrite_class};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{self, BufReader, Read, Write};
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tempfile::NamedTempFile;
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// Name of the unit holding the loader's JNI entry point
pub const ENTRY_POINT_NAME: &str = "jvm2native_output.cpp";

/// Directory (under the output directory) receiving classes when no output jar is requested
pub const CLASSES_DIR: &str = "classes";

/// Directory (under the output directory) receiving the C++ sources
pub const CPP_DIR: &str = "cpp";

const CLASS_SUFFIX: &str = ".class";

/// Translate everything under `settings.input`
///
/// Returns once every output has been written. Class and method problems end up in the report;
/// only build level errors (I/O, archives, configuration, bridge link) abort the run.
pub fn translate_input(
    settings: &Settings,
    progress: &dyn ProgressListener,
) -> Result<BuildReport, Error> {
    settings.validate()?;
    log::info!("reading {}", settings.input.display());
    let entries = read_input(&settings.input)?;
    translate_entries(entries, settings, progress)
}

/// Translate in-memory entries, keyed by `/` separated path
pub fn translate_entries(
    entries: BTreeMap<String, Vec<u8>>,
    settings: &Settings,
    progress: &dyn ProgressListener,
) -> Result<BuildReport, Error> {
    settings.validate()?;
    for name in entries.keys() {
        entry_segments(name)?;
    }
    let loader = settings.loader_class()?;
    let loader_entry = format!("{}{}", loader, CLASS_SUFFIX);
    let loader_package = format!("{}/", settings.loader_package()?);
    if entries.keys().any(|name| name.starts_with(&loader_package)) {
        log::warn!(
            "input already has classes in the loader package {}",
            settings.loader_package()?
        );
    }

    let output = OutputWriter::create(&settings.output, settings.output_jar.as_deref())?;
    let header = support_header();
    output.write_cpp(SUPPORT_HEADER_NAME, header.as_bytes())?;
    output.write_cpp(SUPPORT_SOURCE_NAME, support_source().as_bytes())?;

    // Indices follow the sorted entry names, whatever order workers finish in
    let mut report = BuildReport::default();
    let mut tasks = vec![];
    let mut next_index: u32 = 0;
    for (name, bytes) in entries {
        if name == loader_entry {
            log::warn!("replacing {} with the generated loader", name);
            continue;
        }
        if name.ends_with(CLASS_SUFFIX) && ClassFile::has_magic(&bytes) {
            tasks.push(ClassTask {
                name,
                bytes,
                index: next_index,
            });
            next_index += 1;
        } else {
            log::trace!("copying resource {}", name);
            output.write_class_entry(&name, &bytes)?;
            report.resources += 1;
        }
    }
    log::info!(
        "translating {} classes on {} threads",
        tasks.len(),
        settings.threads
    );

    let context = Context {
        filter: settings.filter(),
        protection: settings.protection,
        seed: settings.seed,
        strip_markers: settings.annotations,
        loader: loader.clone(),
        header,
        output: &output,
        progress,
        abort: AtomicBool::new(false),
    };
    let mut natives = run_workers(&context, tasks, settings.threads, &mut report)?;
    natives.sort_by_key(|(index, _)| *index);

    output.write_class_entry(&loader_entry, &generate_loader(&loader, &settings.library)?)?;
    let mut entry_point = CppWriter::new(vec![]);
    emit_entry_point(&loader, &natives, &mut entry_point)?;
    output.write_cpp(ENTRY_POINT_NAME, &entry_point.close()?)?;
    output.finish()?;

    report.sort();
    Ok(report)
}

/// Read a directory tree or an archive into `/` separated entry names
pub fn read_input(input: &Path) -> Result<BTreeMap<String, Vec<u8>>, Error> {
    let mut entries = BTreeMap::new();
    if input.is_dir() {
        for entry in WalkDir::new(input).sort_by_file_name() {
            let entry = entry.map_err(io::Error::from)?;
            if !entry.file_type().is_file() {
                continue;
            }
            let relative = entry
                .path()
                .strip_prefix(input)
                .map_err(|err| Error::Config(format!("{}: {}", entry.path().display(), err)))?;
            entries.insert(slash_name(relative), fs::read(entry.path())?);
        }
    } else {
        let mut archive = ZipArchive::new(BufReader::new(File::open(input)?))?;
        for i in 0..archive.len() {
            let mut file = archive.by_index(i)?;
            if file.is_dir() {
                continue;
            }
            let name = match file.enclosed_name() {
                Some(path) => slash_name(&path),
                None => return Err(unsafe_entry(file.name())),
            };
            let mut data = Vec::with_capacity(file.size() as usize);
            file.read_to_end(&mut data)?;
            entries.insert(name, data);
        }
    }
    Ok(entries)
}

fn slash_name(relative: &Path) -> String {
    relative
        .components()
        .map(|component| component.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

struct ClassTask {
    name: String,
    bytes: Vec<u8>,
    index: u32,
}

/// Outcome of a task: its part of the report, plus the class if it now has a native unit
struct ClassDone {
    report: BuildReport,
    native: Option<(u32, BinaryName)>,
}

/// Read-only state shared by the workers
struct Context<'a> {
    filter: ClassMethodFilter,
    protection: Protection,
    seed: u64,
    strip_markers: bool,
    loader: BinaryName,
    header: String,
    output: &'a OutputWriter,
    progress: &'a dyn ProgressListener,
    /// Set once a build level error occurs, so that workers stop picking up classes
    abort: AtomicBool,
}

fn run_workers(
    context: &Context,
    tasks: Vec<ClassTask>,
    threads: usize,
    report: &mut BuildReport,
) -> Result<Vec<(u32, BinaryName)>, Error> {
    let (task_tx, task_rx) = crossbeam::channel::unbounded::<ClassTask>();
    let (done_tx, done_rx) = crossbeam::channel::unbounded::<Result<ClassDone, Error>>();
    let threads = threads.min(tasks.len()).max(1);
    for task in tasks {
        // The receiver is still alive, so this cannot fail
        let _ = task_tx.send(task);
    }
    drop(task_tx);

    let mut natives = vec![];
    let mut failure: Option<Error> = None;
    std::thread::scope(|scope| {
        for worker in 0..threads {
            let task_rx = task_rx.clone();
            let done_tx = done_tx.clone();
            scope.spawn(move || {
                log::trace!("worker {} started", worker);
                for task in task_rx.iter() {
                    if context.abort.load(Ordering::Relaxed) {
                        break;
                    }
                    let done = process_class(context, task);
                    if done.is_err() {
                        context.abort.store(true, Ordering::Relaxed);
                    }
                    if done_tx.send(done).is_err() {
                        break;
                    }
                }
            });
        }
        drop(done_tx);

        for done in done_rx.iter() {
            match done {
                Ok(done) => {
                    report.merge(done.report);
                    natives.extend(done.native);
                }
                Err(err) => {
                    log::error!("aborting build: {}", err);
                    failure.get_or_insert(err);
                }
            }
        }
    });

    match failure {
        Some(err) => Err(err),
        None => Ok(natives),
    }
}

/// Load, filter, translate, emit, rewrite, and write one class
///
/// `Err` only for build level errors. Everything else is reported in the returned report.
fn process_class(context: &Context, task: ClassTask) -> Result<ClassDone, Error> {
    let ClassTask { name, bytes, index } = task;
    let mut done = ClassDone {
        report: BuildReport::default(),
        native: None,
    };
    let display_name = name.trim_end_matches(CLASS_SUFFIX).to_string();

    let class = match ClassUnit::load(&bytes) {
        Ok(class) => class,
        Err(err) => {
            let error = Error::from(err);
            if let Error::UnsupportedVersion(_) = error {
                context.output.write_class_entry(&name, &bytes)?;
                done.report.unchanged_classes.push(display_name.clone());
                finish(context, &mut done, display_name, ClassOutcome::Unchanged, error);
            } else {
                done.report.failed_classes.push(display_name.clone());
                finish(context, &mut done, display_name, ClassOutcome::Failed, error);
            }
            return Ok(done);
        }
    };
    let class_name = class.name.to_string();
    log::debug!("translating {} as class {}", class_name, index);

    let translation = match translate_class(
        &class,
        index,
        &context.filter,
        context.protection,
        context.seed,
    ) {
        Ok(translation) => translation,
        Err(err) if err.is_fatal() => return Err(err),
        Err(err) => {
            context.output.write_class_entry(&name, &bytes)?;
            done.report.unchanged_classes.push(class_name.clone());
            finish(context, &mut done, class_name, ClassOutcome::Unchanged, err);
            return Ok(done);
        }
    };
    done.report
        .skipped_methods
        .extend(translation.skipped.iter().map(|(method, _)| method.clone()));
    done.report.diagnostics.extend(translation.diagnostics);

    let native = match translation.native {
        Some(native) => native,
        None => {
            context.output.write_class_entry(&name, &bytes)?;
            done.report.unchanged_classes.push(class_name.clone());
            notify(context, class_name, ClassOutcome::Unchanged);
            return Ok(done);
        }
    };
    let translated: Vec<usize> = native.methods.iter().map(|method| method.index).collect();

    let mut unit = CppWriter::new(vec![]);
    let ops = emit_class_unit(&native, &mut unit)?;
    let unit = unit.close()?;
    check_link(&context.header, &ops)?;

    let rewritten = match rewrite_class(
        &class,
        &translated,
        &native.hidden,
        index,
        &context.loader,
        context.strip_markers,
    ) {
        Ok(rewritten) => rewritten,
        Err(err) if err.is_fatal() => return Err(err),
        Err(err) => {
            context.output.write_class_entry(&name, &bytes)?;
            done.report.unchanged_classes.push(class_name.clone());
            finish(context, &mut done, class_name, ClassOutcome::Unchanged, err);
            return Ok(done);
        }
    };

    let unit_path = format!("{}/{}", CLASSES_DIR, unit_file_name(index, &class.name));
    context.output.write_cpp(&unit_path, &unit)?;
    context.output.write_class_entry(&name, &rewritten)?;

    done.report.translated_methods.extend(
        translated
            .iter()
            .filter_map(|method| class.methods.get(*method))
            .map(MethodUnit::describe),
    );
    done.report
        .translated_classes
        .push((index, class_name.clone()));
    done.native = Some((index, class.name.clone()));
    notify(
        context,
        class_name,
        ClassOutcome::Translated {
            methods: translated.len(),
        },
    );
    Ok(done)
}

/// Record a class level diagnostic and notify the listener
fn finish(context: &Context, done: &mut ClassDone, class: String, outcome: ClassOutcome, error: Error) {
    log::debug!("{}: {}", class, error);
    done.report.diagnostics.push(Diagnostic {
        class: class.clone(),
        method: None,
        error,
    });
    notify(context, class, outcome);
}

fn notify(context: &Context, class: String, outcome: ClassOutcome) {
    context
        .progress
        .class_finished(&ClassEvent { class, outcome });
}

/// Where rewritten classes and resources go
enum ClassSink {
    Directory(PathBuf),
    Archive {
        path: PathBuf,
        writer: ZipWriter<NamedTempFile>,
    },
}

/// Serialises every output write
///
/// Files are written to a temporary file next to their destination and renamed into place, so
/// readers never see partial files. An output archive is only renamed into place by
/// [`OutputWriter::finish`].
struct OutputWriter {
    classes: Mutex<ClassSink>,
    cpp: PathBuf,
}

impl OutputWriter {
    fn create(output: &Path, output_jar: Option<&str>) -> Result<OutputWriter, Error> {
        fs::create_dir_all(output)?;
        let cpp = output.join(CPP_DIR);
        fs::create_dir_all(cpp.join(CLASSES_DIR))?;

        let classes = match output_jar {
            Some(jar) => ClassSink::Archive {
                path: output.join(jar),
                writer: ZipWriter::new(NamedTempFile::new_in(output)?),
            },
            None => ClassSink::Directory(output.join(CLASSES_DIR)),
        };
        Ok(OutputWriter {
            classes: Mutex::new(classes),
            cpp,
        })
    }

    /// Write a class or resource, named by its `/` separated path
    fn write_class_entry(&self, name: &str, bytes: &[u8]) -> Result<(), Error> {
        match &mut *self.classes.lock() {
            ClassSink::Directory(root) => write_atomically(&join_entry(root, name)?, bytes),
            ClassSink::Archive { writer, .. } => {
                let options =
                    SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
                writer.start_file(entry_segments(name)?.join("/"), options)?;
                writer.write_all(bytes)?;
                Ok(())
            }
        }
    }

    /// Write a file under `cpp/`
    fn write_cpp(&self, name: &str, bytes: &[u8]) -> Result<(), Error> {
        let _guard = self.classes.lock();
        write_atomically(&join_entry(&self.cpp, name)?, bytes)
    }

    fn finish(self) -> Result<(), Error> {
        match self.classes.into_inner() {
            ClassSink::Directory(_) => Ok(()),
            ClassSink::Archive { path, writer } => {
                let file = writer.finish()?;
                file.persist(&path).map_err(|err| err.error)?;
                Ok(())
            }
        }
    }
}

/// Segments of a `/` separated entry name, which must stay below the directory it is written to
fn entry_segments(name: &str) -> Result<Vec<&str>, Error> {
    if name.starts_with('/') {
        return Err(unsafe_entry(name));
    }
    name.split('/')
        .filter(|segment| !segment.is_empty())
        .map(|segment| {
            let mut components = Path::new(segment).components();
            match (components.next(), components.next()) {
                (Some(Component::Normal(_)), None) => Ok(segment),
                _ => Err(unsafe_entry(name)),
            }
        })
        .collect()
}

fn unsafe_entry(name: &str) -> Error {
    Error::Config(format!("entry {:?} would be written outside the output", name))
}

fn join_entry(root: &Path, name: &str) -> Result<PathBuf, Error> {
    Ok(entry_segments(name)?
        .into_iter()
        .fold(root.to_path_buf(), |path, segment| path.join(segment)))
}

fn write_atomically(path: &Path, bytes: &[u8]) -> Result<(), Error> {
    let parent = path
        .parent()
        .ok_or_else(|| Error::Config(format!("{} has no parent directory", path.display())))?;
    fs::create_dir_all(parent)?;
    let mut file = NamedTempFile::new_in(parent)?;
    file.write_all(bytes)?;
    file.persist(path).map_err(|err| err.error)?;
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn entry_names_map_onto_directories() {
        let root = Path::new("out");
        assert_eq!(
            join_entry(root, "com/example/Main.class").unwrap(),
            root.join("com").join("example").join("Main.class")
        );
        assert_eq!(
            join_entry(root, "META-INF//MANIFEST.MF").unwrap(),
            root.join("META-INF").join("MANIFEST.MF")
        );
    }

    #[test]
    fn entry_names_cannot_leave_the_root() {
        let root = Path::new("out");
        for name in ["../escaped.txt", "a/../../b", "/etc/passwd", "a/./b"] {
            assert!(
                matches!(join_entry(root, name), Err(Error::Config(_))),
                "{} was accepted",
                name
            );
        }
    }

    #[test]
    fn directory_input_uses_slash_names() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("a").join("b")).unwrap();
        fs::write(dir.path().join("a").join("b").join("C.class"), b"x").unwrap();
        fs::write(dir.path().join("readme.txt"), b"y").unwrap();

        let entries = read_input(dir.path()).unwrap();
        let names: Vec<&str> = entries.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["a/b/C.class", "readme.txt"]);
    }
}
