use super::hidden::HiddenMethods;
use super::method::translate_method;
use super::{ClassMethodFilter, Diagnostic, Error};
use crate::jvm::model::{ClassUnit, MethodUnit};
use crate::jvm::{MethodAccessFlags, Name, RenderDescriptor, UnqualifiedName};
use crate::native::{NativeClass, Registration, SymbolTable};
use crate::protect::{ProtectedPool, Protection};

/// Why a method was left as bytecode without it being an error
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum SkipReason {
    /// Rejected by the class/method filter
    Filtered,
    /// `abstract` or `native`
    NoCode,
}

/// Result of translating the methods of one class
#[derive(Debug)]
pub struct ClassTranslation {
    /// `None` when no method could be translated
    pub native: Option<NativeClass>,
    /// `Owner.name(descriptor)` of skipped methods
    pub skipped: Vec<(String, SkipReason)>,
    pub diagnostics: Vec<Diagnostic>,
}

impl ClassTranslation {
    /// Indices of the methods that now run natively
    pub fn translated_methods(&self) -> Vec<usize> {
        self.native
            .iter()
            .flat_map(|native| native.methods.iter().map(|method| method.index))
            .collect()
    }
}

/// Translate every selected method of a class
///
/// Errors returned here concern the whole class. Problems with single methods end up as
/// diagnostics, and those methods stay as bytecode.
pub fn translate_class(
    class: &ClassUnit,
    index: u32,
    filter: &ClassMethodFilter,
    protection: Protection,
    seed: u64,
) -> Result<ClassTranslation, Error> {
    if class.marker.is_some() {
        return Err(Error::AlreadyTranslated);
    }

    let mut translation = ClassTranslation {
        native: None,
        skipped: vec![],
        diagnostics: vec![],
    };
    if !filter.accepts_class(&class.name) {
        for method in &class.methods {
            translation
                .skipped
                .push((method.describe(), SkipReason::Filtered));
        }
        return Ok(translation);
    }

    let mut symbols = SymbolTable::new();
    let mut pool = ProtectedPool::new(seed, class.name.as_str(), protection);
    let mut hidden = HiddenMethods::new(class);
    let mut methods = vec![];

    for method in &class.methods {
        if !filter.accepts_method(class, method) {
            translation
                .skipped
                .push((method.describe(), SkipReason::Filtered));
            continue;
        }
        if let Some(conflict) = rewrite_conflict(class, method) {
            if method.code.is_none() && !filter.explicitly_selected(method) {
                translation
                    .skipped
                    .push((method.describe(), SkipReason::NoCode));
            } else {
                translation.diagnostics.push(Diagnostic {
                    class: class.name.as_str().to_owned(),
                    method: Some(method.describe()),
                    error: Error::RewriteConflict(conflict),
                });
            }
            continue;
        }

        let mut method_symbols = symbols.clone();
        let mut method_pool = pool.clone();
        let mut method_hidden = hidden.clone();
        match translate_method(
            class,
            method,
            &mut method_symbols,
            &mut method_pool,
            &mut method_hidden,
        ) {
            Ok(native) => {
                log::debug!("translated {}", method.describe());
                symbols = method_symbols;
                pool = method_pool;
                hidden = method_hidden;
                methods.push(native);
            }
            Err(error) => {
                log::debug!("{} stays as bytecode: {}", method.describe(), error);
                translation.diagnostics.push(Diagnostic {
                    class: class.name.as_str().to_owned(),
                    method: Some(method.describe()),
                    error,
                });
            }
        }
    }

    if methods.is_empty() {
        return Ok(translation);
    }

    let registrations = methods
        .iter()
        .map(|method| Registration {
            method_index: method.index,
            name: pool.intern_str(method.name.as_str()),
            descriptor: pool.intern_str(&method.descriptor.render()),
        })
        .collect();
    translation.native = Some(NativeClass {
        index,
        name: class.name.clone(),
        methods,
        registrations,
        symbols,
        pool,
        hidden: hidden.into_methods(),
    });
    Ok(translation)
}

/// Reason a method cannot become a `native` stub
fn rewrite_conflict(class: &ClassUnit, method: &MethodUnit) -> Option<String> {
    let describe = method.describe();
    if method.access_flags.contains(MethodAccessFlags::NATIVE) {
        Some(format!("{} is already native", describe))
    } else if method.code.is_none() {
        Some(format!("{} is abstract", describe))
    } else if method.name == UnqualifiedName::INIT {
        Some(format!("{} is a constructor", describe))
    } else if method.name == UnqualifiedName::CLINIT {
        Some(format!("{} is a static initializer", describe))
    } else if class.is_interface() {
        Some(format!("{} belongs to an interface", describe))
    } else {
        None
    }
}
