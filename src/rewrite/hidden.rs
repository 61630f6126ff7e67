//! Bytecode of hidden methods

use crate::jvm::class_file::{BytecodeArray, Code, ConstantsPool, Method};
use crate::jvm::{opcode, MethodAccessFlags, Name, RenderDescriptor};
use crate::native::{HiddenBody, HiddenMethod, SlotType};
use crate::translate::Error;
use crate::util::Width;

/// `private static synthetic` method running the hidden instruction on its own arguments
pub fn method(pool: &mut ConstantsPool, hidden: &HiddenMethod) -> Result<Method, Error> {
    let mut code = vec![];
    let mut locals: u16 = 0;
    match hidden.body {
        HiddenBody::InvokeDynamic(call_site) => {
            for parameter in &hidden.descriptor.parameters {
                let ty = SlotType::from_field_type(parameter);
                let slot = u8::try_from(locals).map_err(|_| {
                    Error::RewriteConflict(format!(
                        "{} has too many parameters",
                        hidden.name.as_str()
                    ))
                })?;
                code.extend_from_slice(&[load_opcode(ty), slot]);
                locals += ty.width() as u16;
            }
            code.push(opcode::INVOKEDYNAMIC);
            code.extend_from_slice(&call_site.0.to_be_bytes());
            code.extend_from_slice(&[0, 0]);
        }
        HiddenBody::Constant(constant) => {
            let wide = returned(hidden).map_or(false, SlotType::is_wide);
            code.push(if wide { opcode::LDC2_W } else { opcode::LDC_W });
            code.extend_from_slice(&constant.0.to_be_bytes());
        }
    }
    code.push(match returned(hidden) {
        Some(ty) => return_opcode(ty),
        None => opcode::RETURN,
    });

    let result_width = returned(hidden).map_or(0, |ty| ty.width() as u16);
    let code = Code {
        max_stack: locals.max(result_width),
        max_locals: locals,
        code_array: BytecodeArray(code),
        exception_table: vec![],
        attributes: vec![],
    };
    let name_index = pool
        .get_utf8(hidden.name.as_str())
        .map_err(crate::jvm::Error::from)?;
    let descriptor_index = pool
        .get_utf8(&hidden.descriptor.render())
        .map_err(crate::jvm::Error::from)?;
    Ok(Method {
        access_flags: MethodAccessFlags::PRIVATE
            | MethodAccessFlags::STATIC
            | MethodAccessFlags::SYNTHETIC,
        name_index,
        descriptor_index,
        attributes: vec![pool.get_attribute(&code)?],
    })
}

fn returned(hidden: &HiddenMethod) -> Option<SlotType> {
    hidden
        .descriptor
        .return_type
        .as_ref()
        .map(SlotType::from_field_type)
}

fn load_opcode(ty: SlotType) -> u8 {
    match ty {
        SlotType::Long => opcode::LLOAD,
        SlotType::Float => opcode::FLOAD,
        SlotType::Double => opcode::DLOAD,
        SlotType::Ref => opcode::ALOAD,
        SlotType::Int | SlotType::Top => opcode::ILOAD,
    }
}

fn return_opcode(ty: SlotType) -> u8 {
    match ty {
        SlotType::Long => opcode::LRETURN,
        SlotType::Float => opcode::FRETURN,
        SlotType::Double => opcode::DRETURN,
        SlotType::Ref => opcode::ARETURN,
        SlotType::Int | SlotType::Top => opcode::IRETURN,
    }
}
