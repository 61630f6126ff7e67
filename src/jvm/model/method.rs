use super::{annotation_types, ClassRef, ConstantPool};
use crate::jvm::class_file::{
    AttributeLike, ClassFile, Code, ConstantIndex, FrameType, Method, StackMapFrame,
    StackMapTable, VerificationType,
};
use crate::jvm::{
    decode_code, BaseType, BinaryName, Error, FieldType, InstructionNode, MethodAccessFlags,
    MethodDescriptor, Name, ParseDescriptor, RefType, RenderDescriptor, UnqualifiedName,
};
use crate::util::{Offset, OffsetVec};
use std::collections::BTreeMap;

/// Verification type with class references resolved and `new` sites as code offsets
pub type FrameSlot = VerificationType<ClassRef, Offset>;

/// State declared by a `StackMapTable` frame at some offset
///
/// Both locals and stack are indexed by slot, so `long` and `double` occupy two offsets.
#[derive(Clone, PartialEq, Debug)]
pub struct FrameHint {
    pub locals: OffsetVec<FrameSlot>,
    pub stack: OffsetVec<FrameSlot>,
}

/// Entry of a method's exception table
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct ExceptionHandlerRange {
    /// Inclusive
    pub start: Offset,
    /// Exclusive
    pub end: Offset,
    pub handler: Offset,
    /// `None` catches everything
    pub catch_type: Option<BinaryName>,
}

impl ExceptionHandlerRange {
    pub fn covers(&self, offset: Offset) -> bool {
        self.start <= offset && offset < self.end
    }
}

/// Decoded `Code` attribute
#[derive(Clone, Debug)]
pub struct MethodCode {
    pub max_stack: u16,
    pub max_locals: u16,
    pub code_length: usize,
    /// Sorted by offset
    pub instructions: Vec<(Offset, InstructionNode)>,
    /// In declaration order, which is also priority order
    pub handlers: Vec<ExceptionHandlerRange>,
    pub frames: BTreeMap<Offset, FrameHint>,
}

impl MethodCode {
    pub fn is_instruction_boundary(&self, offset: Offset) -> bool {
        self.instruction_index(offset).is_some()
    }

    /// Position of the instruction starting at `offset`
    pub fn instruction_index(&self, offset: Offset) -> Option<usize> {
        self.instructions
            .binary_search_by_key(&offset, |(at, _)| *at)
            .ok()
    }
}

/// Method of a loaded class
#[derive(Clone, Debug)]
pub struct MethodUnit {
    pub owner: BinaryName,
    /// Position in the class's method list
    pub index: usize,
    pub access_flags: MethodAccessFlags,
    pub name: UnqualifiedName,
    pub descriptor: MethodDescriptor<BinaryName>,
    /// Descriptors of annotation types on the method
    pub annotations: Vec<String>,
    /// Absent for `abstract` and `native` methods
    pub code: Option<MethodCode>,
}

impl MethodUnit {
    pub(super) fn load(
        owner: &BinaryName,
        index: usize,
        method: &Method,
        class_file: &ClassFile,
        pool: &ConstantPool,
    ) -> Result<MethodUnit, Error> {
        let name = pool.utf8(method.name_index.0)?;
        let name = UnqualifiedName::from_string(name.to_owned())
            .map_err(|err| Error::malformed(format!("method #{}: {}", index, err)))?;
        let descriptor_str = pool.utf8(method.descriptor_index.0)?;
        let descriptor = MethodDescriptor::parse(descriptor_str).map_err(|err| {
            Error::malformed(format!("method {}{}: {}", name, descriptor_str, err))
        })?;

        let mut unit = MethodUnit {
            owner: owner.clone(),
            index,
            access_flags: method.access_flags,
            name,
            descriptor,
            annotations: annotation_types(class_file, &method.attributes)?,
            code: None,
        };

        let mut code_attributes = method
            .attributes
            .iter()
            .filter(|attribute| class_file.attribute_name(attribute) == Some(Code::NAME));
        if let Some(attribute) = code_attributes.next() {
            if code_attributes.next().is_some() {
                return Err(unit.malformed("more than one Code attribute"));
            }
            let code: Code = attribute
                .decode()
                .map_err(|err| Error::from_read(err, &format!("{} Code", unit.describe())))?;
            unit.code = Some(unit.load_code(&code, class_file, pool)?);
        }

        Ok(unit)
    }

    pub fn is_static(&self) -> bool {
        self.access_flags.contains(MethodAccessFlags::STATIC)
    }

    /// `Owner.name(descriptor)`, used in diagnostics
    pub fn describe(&self) -> String {
        format!("{}.{}{}", self.owner, self.name, self.descriptor.render())
    }

    fn malformed(&self, msg: impl std::fmt::Display) -> Error {
        Error::malformed(format!("{}: {}", self.describe(), msg))
    }

    /// Locals on entry, as the verifier sees them
    pub fn initial_locals(&self) -> OffsetVec<FrameSlot> {
        let mut locals = OffsetVec::new();
        if !self.is_static() {
            if self.name == UnqualifiedName::INIT && self.owner != BinaryName::OBJECT {
                locals.push(VerificationType::UninitializedThis);
            } else {
                locals.push(VerificationType::Object(RefType::Object(self.owner.clone())));
            }
        }
        for parameter in &self.descriptor.parameters {
            locals.push(match parameter {
                FieldType::Base(BaseType::Long) => VerificationType::Long,
                FieldType::Base(BaseType::Double) => VerificationType::Double,
                FieldType::Base(BaseType::Float) => VerificationType::Float,
                FieldType::Base(_) => VerificationType::Integer,
                FieldType::Ref(ref_type) => VerificationType::Object(ref_type.clone()),
            });
        }
        locals
    }

    fn load_code(
        &self,
        code: &Code,
        class_file: &ClassFile,
        pool: &ConstantPool,
    ) -> Result<MethodCode, Error> {
        let code_length = code.code_array.0.len();
        let instructions = decode_code(&code.code_array.0)
            .map_err(|err| self.malformed(err))?;
        let mut method_code = MethodCode {
            max_stack: code.max_stack,
            max_locals: code.max_locals,
            code_length,
            instructions,
            handlers: vec![],
            frames: BTreeMap::new(),
        };

        for handler in &code.exception_table {
            let start = Offset(handler.start_pc.0 as usize);
            let end = Offset(handler.end_pc.0 as usize);
            let entry = Offset(handler.handler_pc.0 as usize);
            let end_ok = end.0 == code_length || method_code.is_instruction_boundary(end);
            if start >= end
                || !method_code.is_instruction_boundary(start)
                || !end_ok
                || !method_code.is_instruction_boundary(entry)
            {
                return Err(self.malformed(format!(
                    "bad exception range [{}, {}) -> {}",
                    start, end, entry
                )));
            }
            let catch_type = if handler.catch_type.0 == ConstantIndex::NONE {
                None
            } else {
                Some(pool.object_class(handler.catch_type.0)?.clone())
            };
            method_code.handlers.push(ExceptionHandlerRange {
                start,
                end,
                handler: entry,
                catch_type,
            });
        }

        let stack_maps = code
            .attributes
            .iter()
            .filter(|attribute| class_file.attribute_name(attribute) == Some(StackMapTable::NAME));
        for attribute in stack_maps {
            let table: StackMapTable = attribute
                .decode()
                .map_err(|err| Error::from_read(err, &format!("{} StackMapTable", self.describe())))?;
            method_code.frames = self.decode_frames(&table, &method_code, pool)?;
        }

        Ok(method_code)
    }

    /// Turn the delta-encoded frames into full frames at absolute offsets
    fn decode_frames(
        &self,
        table: &StackMapTable,
        code: &MethodCode,
        pool: &ConstantPool,
    ) -> Result<BTreeMap<Offset, FrameHint>, Error> {
        let resolve = |frame_type: &FrameType| -> Result<FrameSlot, Error> {
            Ok(match frame_type {
                VerificationType::Top => VerificationType::Top,
                VerificationType::Integer => VerificationType::Integer,
                VerificationType::Float => VerificationType::Float,
                VerificationType::Double => VerificationType::Double,
                VerificationType::Long => VerificationType::Long,
                VerificationType::Null => VerificationType::Null,
                VerificationType::UninitializedThis => VerificationType::UninitializedThis,
                VerificationType::Object(class) => {
                    VerificationType::Object(pool.class(class.0)?.clone())
                }
                VerificationType::Uninitialized(offset) => {
                    VerificationType::Uninitialized(Offset(*offset as usize))
                }
            })
        };
        let resolve_all = |types: &[FrameType]| {
            types.iter().map(resolve).collect::<Result<OffsetVec<_>, Error>>()
        };

        let mut frames = BTreeMap::new();
        let mut locals = self.initial_locals();
        let mut previous: Option<Offset> = None;
        for frame in &table.0 {
            let delta = frame.offset_delta() as usize;
            let offset = match previous {
                None => Offset(delta),
                Some(Offset(prev)) => Offset(prev + delta + 1),
            };
            if !code.is_instruction_boundary(offset) {
                return Err(self.malformed(format!(
                    "stack map frame at {} is not on an instruction",
                    offset
                )));
            }
            let stack = match frame {
                StackMapFrame::SameLocalsNoStack { .. } => OffsetVec::new(),
                StackMapFrame::SameLocalsOneStack { stack, .. } => {
                    resolve_all(std::slice::from_ref(stack))?
                }
                StackMapFrame::ChopLocalsNoStack { chopped_k, .. } => {
                    if !locals.truncate_entries(*chopped_k as usize) {
                        return Err(self.malformed(format!(
                            "stack map frame at {} chops more locals than exist",
                            offset
                        )));
                    }
                    OffsetVec::new()
                }
                StackMapFrame::AppendLocalsNoStack {
                    locals: appended, ..
                } => {
                    for appended in appended {
                        locals.push(resolve(appended)?);
                    }
                    OffsetVec::new()
                }
                StackMapFrame::Full {
                    locals: full_locals,
                    stack,
                    ..
                } => {
                    locals = resolve_all(full_locals)?;
                    resolve_all(stack)?
                }
            };
            frames.insert(
                offset,
                FrameHint {
                    locals: locals.clone(),
                    stack,
                },
            );
            previous = Some(offset);
        }
        Ok(frames)
    }
}
