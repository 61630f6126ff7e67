//! Registration prologue injected at the start of `<clinit>`

use super::decode;
use crate::jvm::class_file::{
    Attribute, AttributeLike, BytecodeArray, BytecodeIndex, ClassFile, Code, ConstantsPool,
    LineNumberTable, LocalVariableTable, LocalVariableTypeTable, Method, StackMapTable,
    VerificationType,
};
use crate::jvm::{opcode, BinaryName, MethodAccessFlags, Name, UnqualifiedName};
use crate::translate::Error;

/// Length of the prologue, a multiple of 4 so `tableswitch`/`lookupswitch` padding is unchanged
pub const PROLOGUE_LENGTH: u16 = 12;

/// Descriptor of `<loader>.registerNatives`
pub const REGISTER_NATIVES_DESCRIPTOR: &str = "(ILjava/lang/Class;)V";

/// Largest code array the JVM accepts
const MAX_CODE_LENGTH: usize = 65535;

/// `sipush|ldc_w index; ldc_w this; invokestatic registerNatives; nop; nop; nop`
pub fn prologue(
    pool: &mut ConstantsPool,
    this_class: &str,
    class_index: u32,
    loader: &BinaryName,
) -> Result<Vec<u8>, Error> {
    let mut code = Vec::with_capacity(PROLOGUE_LENGTH as usize);
    match i16::try_from(class_index) {
        Ok(small) => {
            code.push(opcode::SIPUSH);
            code.extend_from_slice(&small.to_be_bytes());
        }
        Err(_) => {
            let value = i32::try_from(class_index).map_err(|_| {
                Error::RewriteConflict(format!("class index {} is too large", class_index))
            })?;
            let constant = pool.get_integer(value).map_err(crate::jvm::Error::from)?;
            code.push(opcode::LDC_W);
            code.extend_from_slice(&constant.0.to_be_bytes());
        }
    }

    let class = pool.get_class(this_class).map_err(crate::jvm::Error::from)?;
    code.push(opcode::LDC_W);
    code.extend_from_slice(&class.0 .0.to_be_bytes());

    let register = pool
        .get_method_ref(
            loader.as_str(),
            UnqualifiedName::REGISTERNATIVES.as_str(),
            REGISTER_NATIVES_DESCRIPTOR,
            false,
        )
        .map_err(crate::jvm::Error::from)?;
    code.push(opcode::INVOKESTATIC);
    code.extend_from_slice(&register.0 .0.to_be_bytes());

    code.extend_from_slice(&[opcode::NOP; 3]);
    debug_assert_eq!(code.len(), PROLOGUE_LENGTH as usize);
    Ok(code)
}

/// Run the prologue first thing in the class's static initializer, creating one if needed
///
/// `original` is the unmodified class, used to resolve names since constant indices are stable.
pub fn install(
    original: &ClassFile,
    file: &mut ClassFile,
    pool: &mut ConstantsPool,
    prologue: Vec<u8>,
) -> Result<(), Error> {
    let existing = file.methods.iter().position(|method| {
        original.utf8(method.name_index) == Some(UnqualifiedName::CLINIT.as_str())
            && original.utf8(method.descriptor_index) == Some("()V")
    });

    match existing {
        Some(idx) => {
            let method = &mut file.methods[idx];
            let code_position = method
                .attributes
                .iter()
                .position(|attribute| original.attribute_name(attribute) == Some(Code::NAME))
                .ok_or_else(|| Error::RewriteConflict(String::from("<clinit> has no code")))?;
            let code: Code = decode(&method.attributes[code_position])?;
            let code = prepend(original, pool, code, prologue)?;
            method.attributes[code_position] = pool.get_attribute(&code)?;
        }
        None => {
            let mut bytes = prologue;
            bytes.push(opcode::RETURN);
            let code = Code {
                max_stack: 2,
                max_locals: 0,
                code_array: BytecodeArray(bytes),
                exception_table: vec![],
                attributes: vec![],
            };
            let name_index = pool
                .get_utf8(UnqualifiedName::CLINIT.as_str())
                .map_err(crate::jvm::Error::from)?;
            let descriptor_index = pool.get_utf8("()V").map_err(crate::jvm::Error::from)?;
            file.methods.push(Method {
                access_flags: MethodAccessFlags::STATIC,
                name_index,
                descriptor_index,
                attributes: vec![pool.get_attribute(&code)?],
            });
        }
    }
    Ok(())
}

fn shifted(index: BytecodeIndex) -> Result<BytecodeIndex, Error> {
    index
        .0
        .checked_add(PROLOGUE_LENGTH)
        .map(BytecodeIndex)
        .ok_or_else(|| Error::RewriteConflict(String::from("code offset overflows after shifting")))
}

/// Prepend the prologue to existing code, shifting everything that records code offsets
///
/// Code attributes other than the stack map and debug tables may embed offsets in ways this
/// crate does not model, so they are dropped.
fn prepend(
    original: &ClassFile,
    pool: &mut ConstantsPool,
    code: Code,
    prologue: Vec<u8>,
) -> Result<Code, Error> {
    let mut bytes = prologue;
    bytes.extend_from_slice(&code.code_array.0);
    if bytes.len() > MAX_CODE_LENGTH {
        return Err(Error::RewriteConflict(format!(
            "<clinit> code would grow to {} bytes",
            bytes.len()
        )));
    }

    let mut exception_table = code.exception_table;
    for handler in &mut exception_table {
        handler.start_pc = shifted(handler.start_pc)?;
        handler.end_pc = shifted(handler.end_pc)?;
        handler.handler_pc = shifted(handler.handler_pc)?;
    }

    let mut attributes: Vec<Attribute> = vec![];
    for attribute in &code.attributes {
        match original.attribute_name(attribute) {
            Some(name) if name == StackMapTable::NAME => {
                let mut table: StackMapTable = decode(attribute)?;
                if let Some(first) = table.0.first_mut() {
                    let delta = first.offset_delta_mut();
                    *delta = delta.checked_add(PROLOGUE_LENGTH).ok_or_else(|| {
                        Error::RewriteConflict(String::from("stack map offset overflows"))
                    })?;
                }
                for frame in &mut table.0 {
                    for frame_type in frame.types_mut() {
                        if let VerificationType::Uninitialized(offset) = frame_type {
                            *offset = shifted(BytecodeIndex(*offset))?.0;
                        }
                    }
                }
                attributes.push(pool.get_attribute(&table)?);
            }
            Some(name) if name == LineNumberTable::NAME => {
                let mut table: LineNumberTable = decode(attribute)?;
                for line in &mut table.0 {
                    line.start_pc = shifted(line.start_pc)?;
                }
                attributes.push(pool.get_attribute(&table)?);
            }
            Some(name) if name == LocalVariableTable::NAME => {
                let mut table: LocalVariableTable = decode(attribute)?;
                for variable in &mut table.0 {
                    variable.start_pc = shifted(variable.start_pc)?;
                }
                attributes.push(pool.get_attribute(&table)?);
            }
            Some(name) if name == LocalVariableTypeTable::NAME => {
                let mut table: LocalVariableTypeTable = decode(attribute)?;
                for variable in &mut table.0 {
                    variable.start_pc = shifted(variable.start_pc)?;
                }
                attributes.push(pool.get_attribute(&table)?);
            }
            name => log::debug!("dropping <clinit> code attribute {:?}", name),
        }
    }

    Ok(Code {
        max_stack: code.max_stack.max(2),
        max_locals: code.max_locals,
        code_array: BytecodeArray(bytes),
        exception_table,
        attributes,
    })
}
