use jvm2native::*;

use clap::{crate_version, value_parser, Arg, ArgAction, ArgMatches, Command};
use protect::Protection;
use std::path::PathBuf;
use translate::{ConsoleProgress, ProgressListener, Settings, SilentProgress};

fn main() -> Result<(), translate::Error> {
    let matches = Command::new("JVM to native converter")
        .version(crate_version!())
        .about("Moves the bytecode of JVM methods into JNI native code")
        .arg(
            Arg::new("INPUT")
                .help("Sets the input class directory or jar")
                .value_parser(value_parser!(PathBuf))
                .index(1),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .value_name("FILE")
                .value_parser(value_parser!(PathBuf))
                .help("Reads settings from a TOML file (flags override it)"),
        )
        .arg(
            Arg::new("output")
                .long("output-directory")
                .value_name("DIRECTORY")
                .value_parser(value_parser!(PathBuf))
                .help("Sets the output directory [default: out]"),
        )
        .arg(
            Arg::new("output jar")
                .long("output-jar")
                .value_name("JAR")
                .help("Writes classes into this jar in the output directory"),
        )
        .arg(
            Arg::new("loader")
                .long("loader")
                .value_name("PACKAGE")
                .help("Sets the package of the generated loader class"),
        )
        .arg(
            Arg::new("library")
                .long("library")
                .value_name("NAME")
                .help("Sets the library loaded with `System.loadLibrary`"),
        )
        .arg(
            Arg::new("annotations")
                .long("annotations")
                .action(ArgAction::SetTrue)
                .help("Only translates methods selected with the marker annotations"),
        )
        .arg(
            Arg::new("include")
                .long("include")
                .value_name("PREFIX")
                .action(ArgAction::Append)
                .help("Only translates classes with this name prefix (repeatable)"),
        )
        .arg(
            Arg::new("exclude")
                .long("exclude")
                .value_name("PREFIX")
                .action(ArgAction::Append)
                .help("Never translates classes with this name prefix (repeatable)"),
        )
        .arg(
            Arg::new("protection")
                .long("protection")
                .value_name("LEVEL")
                .value_parser(|level: &str| level.parse::<Protection>())
                .help("Sets which constants are encoded: none, strings, or full"),
        )
        .arg(
            Arg::new("seed")
                .long("seed")
                .value_name("SEED")
                .value_parser(value_parser!(u64))
                .help("Sets the seed of the constant encoding keys"),
        )
        .arg(
            Arg::new("threads")
                .long("threads")
                .value_name("COUNT")
                .value_parser(value_parser!(usize))
                .help("Sets the number of worker threads"),
        )
        .arg(
            Arg::new("quiet")
                .long("quiet")
                .action(ArgAction::SetTrue)
                .help("Does not print a line per class"),
        )
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .short('v')
                .action(ArgAction::SetTrue)
                .help("Logs at debug level unless `RUST_LOG` says otherwise"),
        )
        .get_matches();

    let default_level = if matches.get_flag("verbose") {
        "debug"
    } else {
        "info"
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    let settings = settings_from(&matches)?;
    log::info!(
        "translating '{}' into '{}'",
        settings.input.display(),
        settings.output.display()
    );

    let progress: Box<dyn ProgressListener> = if matches.get_flag("quiet") {
        Box::new(SilentProgress)
    } else {
        Box::new(ConsoleProgress::new())
    };
    let report = translate::translate_input(&settings, progress.as_ref())?;
    report.log_summary();

    Ok(())
}

/// Settings from the TOML file (if any), overridden by flags
fn settings_from(matches: &ArgMatches) -> Result<Settings, translate::Error> {
    let mut settings = match matches.get_one::<PathBuf>("config") {
        Some(path) => Settings::load(path)?,
        None => Settings {
            output: PathBuf::from("out"),
            ..Settings::default()
        },
    };

    if let Some(input) = matches.get_one::<PathBuf>("INPUT") {
        settings.input = input.clone();
    }
    if let Some(output) = matches.get_one::<PathBuf>("output") {
        settings.output = output.clone();
    }
    if let Some(jar) = matches.get_one::<String>("output jar") {
        settings.output_jar = Some(jar.clone());
    }
    if let Some(loader) = matches.get_one::<String>("loader") {
        settings.loader = loader.clone();
    }
    if let Some(library) = matches.get_one::<String>("library") {
        settings.library = library.clone();
    }
    if matches.get_flag("annotations") {
        settings.annotations = true;
    }
    if let Some(include) = matches.get_many::<String>("include") {
        settings.include = include.cloned().collect();
    }
    if let Some(exclude) = matches.get_many::<String>("exclude") {
        settings.exclude = exclude.cloned().collect();
    }
    if let Some(protection) = matches.get_one::<Protection>("protection") {
        settings.protection = *protection;
    }
    if let Some(seed) = matches.get_one::<u64>("seed") {
        settings.seed = *seed;
    }
    if let Some(threads) = matches.get_one::<usize>("threads") {
        settings.threads = *threads;
    }

    if settings.input.as_os_str().is_empty() {
        return Err(translate::Error::Config(String::from(
            "no input given (pass INPUT or set `input` in the config file)",
        )));
    }
    if settings.output.as_os_str().is_empty() {
        settings.output = PathBuf::from("out");
    }
    settings.validate()?;
    Ok(settings)
}
