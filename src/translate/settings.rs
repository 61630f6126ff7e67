use super::{ClassMethodFilter, Error};
use crate::jvm::{BinaryName, Name, UnqualifiedName};
use crate::protect::Protection;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Everything that controls a build
///
/// Can be read from a TOML file with the same keys as the command line flags.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Directory tree or `.jar`/`.zip` archive holding the classes to translate
    pub input: PathBuf,

    /// Directory receiving `classes/` (or the output jar) and `cpp/`
    pub output: PathBuf,

    /// Write the classes into this jar (under the output directory) instead of a `classes/` tree
    pub output_jar: Option<String>,

    /// Package of the generated loader class, written as `my/pkg` or `my.pkg`
    pub loader: String,

    /// Name passed to `System.loadLibrary` by the loader class
    pub library: String,

    /// Select methods with the marker annotations instead of translating every method
    pub annotations: bool,

    /// Only classes with one of these name prefixes are translated (all classes when empty)
    pub include: Vec<String>,

    /// Classes with one of these name prefixes are never translated
    pub exclude: Vec<String>,

    /// How much of the constant data is encoded in the generated units
    pub protection: Protection,

    /// Seed for the protected constant keys
    pub seed: u64,

    /// Worker threads (one class per task)
    pub threads: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            input: PathBuf::new(),
            output: PathBuf::new(),
            output_jar: None,
            loader: String::from("native0"),
            library: String::from("jvm2native"),
            annotations: false,
            include: vec![],
            exclude: vec![],
            protection: Protection::default(),
            seed: 0,
            threads: num_cpus::get(),
        }
    }
}

impl Settings {
    /// Parse settings from TOML. Missing keys keep their default.
    pub fn from_toml(text: &str) -> Result<Settings, Error> {
        Ok(toml::from_str(text)?)
    }

    pub fn load(path: &Path) -> Result<Settings, Error> {
        let text = std::fs::read_to_string(path).map_err(|err| {
            Error::Config(format!("cannot read {}: {}", path.display(), err))
        })?;
        Settings::from_toml(&text)
    }

    /// Binary name of the loader package
    pub fn loader_package(&self) -> Result<BinaryName, Error> {
        BinaryName::from_string(self.loader.replace('.', "/"))
            .map_err(|err| Error::Config(format!("invalid loader package: {}", err)))
    }

    /// Binary name of the generated loader class
    pub fn loader_class(&self) -> Result<BinaryName, Error> {
        Ok(self.loader_package()?.join(UnqualifiedName::LOADER))
    }

    pub fn filter(&self) -> ClassMethodFilter {
        ClassMethodFilter::new(self.annotations, &self.include, &self.exclude)
    }

    /// Check the settings describe a possible build
    pub fn validate(&self) -> Result<(), Error> {
        self.loader_package()?;
        if self.library.is_empty() || self.library.contains(['/', '\\']) {
            return Err(Error::Config(format!(
                "invalid library name {:?}",
                self.library
            )));
        }
        if self.threads == 0 {
            return Err(Error::Config(String::from("threads must be at least 1")));
        }
        if let Some(jar) = &self.output_jar {
            if jar.is_empty() || Path::new(jar).components().count() != 1 {
                return Err(Error::Config(format!("invalid output jar name {:?}", jar)));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn toml_keys_override_defaults() {
        let settings = Settings::from_toml(
            r#"
            input = "app.jar"
            loader = "com.example.boot"
            protection = "full"
            include = ["com/example/"]
            seed = 7
            "#,
        )
        .unwrap();
        assert_eq!(settings.input, PathBuf::from("app.jar"));
        assert_eq!(settings.protection, Protection::Full);
        assert_eq!(settings.seed, 7);
        assert_eq!(settings.library, "jvm2native");
        assert_eq!(
            settings.loader_class().unwrap().as_str(),
            "com/example/boot/Loader"
        );
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn rejects_bad_settings() {
        assert!(matches!(
            Settings::from_toml("unknown_key = 1"),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            Settings::from_toml("protection = \"some\""),
            Err(Error::Config(_))
        ));

        let settings = Settings {
            threads: 0,
            ..Settings::default()
        };
        assert!(settings.validate().is_err());

        let settings = Settings {
            loader: String::from("a//b"),
            ..Settings::default()
        };
        assert!(settings.validate().is_err());
    }
}
