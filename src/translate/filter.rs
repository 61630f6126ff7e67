use crate::jvm::model::{ClassUnit, MethodUnit};
use crate::jvm::{BinaryName, Name};

/// Decides which classes and methods get translated
///
/// Classes are selected by name prefix. In annotations mode, methods are further selected by the
/// marker annotations: a method marker always wins over a class marker.
#[derive(Clone, Debug)]
pub struct ClassMethodFilter {
    annotations: bool,
    include: Vec<String>,
    exclude: Vec<String>,
}

impl ClassMethodFilter {
    /// Descriptor of the annotation selecting a method (or every method of a class)
    pub const INCLUDE_MARKER: &'static str = "Ljvm2native/Native;";

    /// Descriptor of the annotation keeping a method in bytecode
    pub const EXCLUDE_MARKER: &'static str = "Ljvm2native/NotNative;";

    /// Prefixes may be written with either `.` or `/` separators
    pub fn new(annotations: bool, include: &[String], exclude: &[String]) -> ClassMethodFilter {
        let normalize =
            |prefixes: &[String]| prefixes.iter().map(|p| p.replace('.', "/")).collect();
        ClassMethodFilter {
            annotations,
            include: normalize(include),
            exclude: normalize(exclude),
        }
    }

    /// Everything is translated
    pub fn all() -> ClassMethodFilter {
        ClassMethodFilter::new(false, &[], &[])
    }

    pub fn uses_annotations(&self) -> bool {
        self.annotations
    }

    pub fn accepts_class(&self, name: &BinaryName) -> bool {
        let name = name.as_str();
        let included =
            self.include.is_empty() || self.include.iter().any(|prefix| name.starts_with(prefix));
        included && !self.exclude.iter().any(|prefix| name.starts_with(prefix))
    }

    pub fn accepts_method(&self, class: &ClassUnit, method: &MethodUnit) -> bool {
        if !self.annotations {
            return true;
        }
        let has = |annotations: &[String], marker: &str| annotations.iter().any(|a| a == marker);
        if has(&method.annotations, Self::INCLUDE_MARKER) {
            true
        } else if has(&method.annotations, Self::EXCLUDE_MARKER) {
            false
        } else {
            has(&class.annotations, Self::INCLUDE_MARKER)
        }
    }

    /// Whether a method was picked out by an annotation (rather than by default)
    pub fn explicitly_selected(&self, method: &MethodUnit) -> bool {
        self.annotations
            && method
                .annotations
                .iter()
                .any(|annotation| annotation == Self::INCLUDE_MARKER)
    }

    /// Annotation types removed from translated classes
    pub fn is_marker(descriptor: &str) -> bool {
        descriptor == Self::INCLUDE_MARKER || descriptor == Self::EXCLUDE_MARKER
    }
}
