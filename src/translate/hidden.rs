use crate::jvm::class_file::ConstantIndex;
use crate::jvm::model::ClassUnit;
use crate::jvm::{BinaryName, FieldType, MethodDescriptor, Name, UnqualifiedName};
use crate::native::{HiddenBody, HiddenMethod};
use crate::util::Offset;
use std::collections::{HashMap, HashSet};

/// Hidden methods needed by the methods of one class
///
/// Every `invokedynamic` instruction is its own call site, so it gets a method of its own.
/// Constants resolve once per constant pool entry, so loads of the same entry share one.
#[derive(Clone, Debug)]
pub struct HiddenMethods {
    methods: Vec<HiddenMethod>,
    sites: HashMap<Site, usize>,
    taken: HashSet<String>,
}

#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
enum Site {
    CallSite { method: usize, offset: Offset },
    Constant(ConstantIndex),
}

impl HiddenMethods {
    pub const PREFIX: &'static str = "jvm2native$";

    pub fn new(class: &ClassUnit) -> HiddenMethods {
        HiddenMethods {
            methods: vec![],
            sites: HashMap::new(),
            taken: class
                .methods
                .iter()
                .map(|method| method.name.as_str().to_owned())
                .collect(),
        }
    }

    /// Method standing in for the `invokedynamic` at `offset` of method `method`
    pub fn call_site(
        &mut self,
        method: usize,
        offset: Offset,
        index: ConstantIndex,
        descriptor: &MethodDescriptor<BinaryName>,
    ) -> &HiddenMethod {
        self.get_or_add(
            Site::CallSite { method, offset },
            "indy",
            descriptor.clone(),
            HiddenBody::InvokeDynamic(index),
        )
    }

    /// Method returning the loadable constant at `index`, of type `ty`
    pub fn constant(&mut self, index: ConstantIndex, ty: &FieldType<BinaryName>) -> &HiddenMethod {
        let descriptor = MethodDescriptor {
            parameters: vec![],
            return_type: Some(ty.clone()),
        };
        self.get_or_add(
            Site::Constant(index),
            "ldc",
            descriptor,
            HiddenBody::Constant(index),
        )
    }

    fn get_or_add(
        &mut self,
        site: Site,
        kind: &str,
        descriptor: MethodDescriptor<BinaryName>,
        body: HiddenBody,
    ) -> &HiddenMethod {
        let idx = match self.sites.get(&site) {
            Some(idx) => *idx,
            None => {
                let name = self.fresh_name(kind);
                self.methods.push(HiddenMethod {
                    name,
                    descriptor,
                    body,
                });
                self.sites.insert(site, self.methods.len() - 1);
                self.methods.len() - 1
            }
        };
        &self.methods[idx]
    }

    fn fresh_name(&mut self, kind: &str) -> UnqualifiedName {
        let mut counter = self.methods.len();
        loop {
            let name = format!("{}{}${}", Self::PREFIX, kind, counter);
            if self.taken.insert(name.clone()) {
                if let Ok(name) = UnqualifiedName::from_string(name) {
                    return name;
                }
            }
            counter += 1;
        }
    }

    pub fn into_methods(self) -> Vec<HiddenMethod> {
        self.methods
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::jvm::{ParseDescriptor, RenderDescriptor};

    fn registry() -> HiddenMethods {
        HiddenMethods {
            methods: vec![],
            sites: HashMap::new(),
            taken: [String::from("jvm2native$indy$0")].into_iter().collect(),
        }
    }

    #[test]
    fn call_sites_are_per_instruction() {
        let mut hidden = registry();
        let descriptor = MethodDescriptor::parse("(I)Ljava/lang/String;").unwrap();
        let first = hidden
            .call_site(0, Offset(3), ConstantIndex(9), &descriptor)
            .name
            .clone();
        let again = hidden
            .call_site(0, Offset(3), ConstantIndex(9), &descriptor)
            .name
            .clone();
        let other = hidden
            .call_site(1, Offset(3), ConstantIndex(9), &descriptor)
            .name
            .clone();

        assert_eq!(first, again);
        assert_ne!(first, other);
        assert_eq!(first.as_str(), "jvm2native$indy$1");
        assert_eq!(hidden.into_methods().len(), 2);
    }

    #[test]
    fn constants_are_shared() {
        let mut hidden = registry();
        let ty = FieldType::parse("Ljava/lang/invoke/MethodType;").unwrap();
        let first = hidden.constant(ConstantIndex(4), &ty).clone();
        let second = hidden.constant(ConstantIndex(4), &ty).clone();
        assert_eq!(first, second);
        assert_eq!(first.body, HiddenBody::Constant(ConstantIndex(4)));
        assert_eq!(first.descriptor.render(), "()Ljava/lang/invoke/MethodType;");
    }
}
