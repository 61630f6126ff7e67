use crate::protect::ProtectedPool;
use std::collections::HashMap;

macro_rules! symbol_id {
    ($id:ident) => {
        #[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
        pub struct $id(pub usize);
    };
}

symbol_id!(ClassId);
symbol_id!(MethodId);
symbol_id!(FieldId);
symbol_id!(StringId);

/// Method or field looked up through JNI
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct MemberSymbol {
    pub class: ClassId,
    /// Protected pool entries
    pub name: usize,
    pub descriptor: usize,
    pub is_static: bool,
}

#[derive(Clone, PartialEq, Eq, Hash, Debug)]
enum SymbolKey {
    Class(String),
    Method(ClassId, String, String, bool),
    Field(ClassId, String, String, bool),
    String(String),
}

/// Everything a class's native code resolves at runtime
///
/// Each symbol gets one cache slot in the generated unit. Names are stored as indices into the
/// class's protected pool.
#[derive(Clone, Debug, Default)]
pub struct SymbolTable {
    /// Class names in the form accepted by `FindClass` (arrays as descriptors)
    pub classes: Vec<usize>,
    pub methods: Vec<MemberSymbol>,
    pub fields: Vec<MemberSymbol>,
    pub strings: Vec<usize>,
    lookup: HashMap<SymbolKey, usize>,
}

impl SymbolTable {
    pub fn new() -> SymbolTable {
        SymbolTable::default()
    }

    pub fn class(&mut self, pool: &mut ProtectedPool, name: &str) -> ClassId {
        let key = SymbolKey::Class(name.to_owned());
        if let Some(idx) = self.lookup.get(&key) {
            return ClassId(*idx);
        }
        let idx = self.classes.len();
        self.classes.push(pool.intern_str(name));
        self.lookup.insert(key, idx);
        ClassId(idx)
    }

    pub fn method(
        &mut self,
        pool: &mut ProtectedPool,
        class: &str,
        name: &str,
        descriptor: &str,
        is_static: bool,
    ) -> (ClassId, MethodId) {
        let class = self.class(pool, class);
        let key = SymbolKey::Method(class, name.to_owned(), descriptor.to_owned(), is_static);
        if let Some(idx) = self.lookup.get(&key) {
            return (class, MethodId(*idx));
        }
        let idx = self.methods.len();
        self.methods.push(MemberSymbol {
            class,
            name: pool.intern_str(name),
            descriptor: pool.intern_str(descriptor),
            is_static,
        });
        self.lookup.insert(key, idx);
        (class, MethodId(idx))
    }

    pub fn field(
        &mut self,
        pool: &mut ProtectedPool,
        class: &str,
        name: &str,
        descriptor: &str,
        is_static: bool,
    ) -> (ClassId, FieldId) {
        let class = self.class(pool, class);
        let key = SymbolKey::Field(class, name.to_owned(), descriptor.to_owned(), is_static);
        if let Some(idx) = self.lookup.get(&key) {
            return (class, FieldId(*idx));
        }
        let idx = self.fields.len();
        self.fields.push(MemberSymbol {
            class,
            name: pool.intern_str(name),
            descriptor: pool.intern_str(descriptor),
            is_static,
        });
        self.lookup.insert(key, idx);
        (class, FieldId(idx))
    }

    pub fn string(&mut self, pool: &mut ProtectedPool, value: &str) -> StringId {
        let key = SymbolKey::String(value.to_owned());
        if let Some(idx) = self.lookup.get(&key) {
            return StringId(*idx);
        }
        let idx = self.strings.len();
        self.strings.push(pool.intern_str(value));
        self.lookup.insert(key, idx);
        StringId(idx)
    }
}
