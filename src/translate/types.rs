//! Abstract interpretation state for translating one method
//!
//! A [`Frame`] tracks the computational type of every local and operand stack slot at some
//! program point. Stack positions are slot offsets: a `long` at depth `d` lives in `Stack(d)` and
//! makes the next value start at `d + 2`.

use crate::jvm::class_file::VerificationType;
use crate::jvm::model::{FrameHint, FrameSlot, MethodUnit};
use crate::native::{SlotType, Var};
use crate::util::Width;
use std::fmt;

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct TypeError(pub String);

impl fmt::Display for TypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn type_error<T>(msg: impl Into<String>) -> Result<T, TypeError> {
    Err(TypeError(msg.into()))
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Frame {
    /// One entry per local slot (a wide local is followed by `Top`)
    locals: Vec<SlotType>,
    /// One entry per value
    stack: Vec<SlotType>,
    max_stack: u16,
}

impl Frame {
    /// Frame on method entry
    pub fn entry(method: &MethodUnit, max_locals: u16, max_stack: u16) -> Result<Frame, TypeError> {
        let mut frame = Frame {
            locals: vec![SlotType::Top; max_locals as usize],
            stack: vec![],
            max_stack,
        };
        for (offset, slot) in method.initial_locals().iter() {
            frame.set_local(offset.0 as u16, slot_type(slot))?;
        }
        Ok(frame)
    }

    /// Frame declared by a stack map entry
    pub fn from_hint(hint: &FrameHint, max_locals: u16, max_stack: u16) -> Result<Frame, TypeError> {
        let mut frame = Frame {
            locals: vec![SlotType::Top; max_locals as usize],
            stack: vec![],
            max_stack,
        };
        for (offset, slot) in hint.locals.iter() {
            let ty = slot_type(slot);
            if ty != SlotType::Top {
                frame.set_local(offset.0 as u16, ty)?;
            }
        }
        for (_, slot) in hint.stack.iter() {
            frame.push(slot_type(slot))?;
        }
        Ok(frame)
    }

    /// Frame at the entry of an exception handler covering code with these locals
    pub fn handler_entry(&self) -> Frame {
        Frame {
            locals: self.locals.clone(),
            stack: vec![SlotType::Ref],
            max_stack: self.max_stack,
        }
    }

    /// Stack depth in slots
    pub fn depth(&self) -> u16 {
        self.stack.iter().map(|ty| ty.width() as u16).sum()
    }

    pub fn stack(&self) -> &[SlotType] {
        &self.stack
    }

    pub fn push(&mut self, ty: SlotType) -> Result<Var, TypeError> {
        let depth = self.depth();
        if ty == SlotType::Top {
            return type_error("pushing an unusable value");
        }
        if depth as usize + ty.width() > self.max_stack as usize {
            return type_error(format!("operand stack overflows max_stack {}", self.max_stack));
        }
        self.stack.push(ty);
        Ok(Var::stack(depth, ty))
    }

    pub fn pop(&mut self) -> Result<Var, TypeError> {
        match self.stack.pop() {
            Some(ty) => Ok(Var::stack(self.depth(), ty)),
            None => type_error("operand stack underflow"),
        }
    }

    pub fn pop_expect(&mut self, expected: SlotType) -> Result<Var, TypeError> {
        let var = self.pop()?;
        if var.ty != expected {
            return type_error(format!(
                "expected {:?} on the stack but found {:?}",
                expected, var.ty
            ));
        }
        Ok(var)
    }

    /// Top of the stack, `depth` values down
    pub fn peek(&self, depth: usize) -> Result<Var, TypeError> {
        let idx = match self.stack.len().checked_sub(depth + 1) {
            Some(idx) => idx,
            None => return type_error("operand stack underflow"),
        };
        let offset = self.stack[..idx].iter().map(|ty| ty.width() as u16).sum();
        Ok(Var::stack(offset, self.stack[idx]))
    }

    pub fn local(&self, index: u16, expected: SlotType) -> Result<Var, TypeError> {
        match self.locals.get(index as usize) {
            Some(ty) if *ty == expected => Ok(Var::local(index, expected)),
            Some(ty) => type_error(format!(
                "local {} holds {:?} where {:?} is used",
                index, ty, expected
            )),
            None => type_error(format!("local {} is out of range", index)),
        }
    }

    pub fn set_local(&mut self, index: u16, ty: SlotType) -> Result<Var, TypeError> {
        let index_usize = index as usize;
        if index_usize + ty.width() > self.locals.len() {
            return type_error(format!("local {} is out of range", index));
        }
        if index_usize > 0 && self.locals[index_usize - 1].is_wide() {
            self.locals[index_usize - 1] = SlotType::Top;
        }
        self.locals[index_usize] = ty;
        if ty.is_wide() {
            self.locals[index_usize + 1] = SlotType::Top;
        }
        Ok(Var::local(index, ty))
    }

    /// Merge another frame reaching the same point into this one
    ///
    /// Locals that disagree become unusable. Stacks must agree exactly. Returns whether this
    /// frame changed.
    pub fn merge(&mut self, other: &Frame) -> Result<bool, TypeError> {
        if self.stack != other.stack {
            return type_error(format!(
                "operand stacks {:?} and {:?} meet at the same point",
                self.stack, other.stack
            ));
        }
        let mut changed = false;
        for (mine, theirs) in self.locals.iter_mut().zip(&other.locals) {
            if *mine != *theirs && *mine != SlotType::Top {
                *mine = SlotType::Top;
                changed = true;
            }
        }
        Ok(changed)
    }

    /// Check an inferred frame against a stack map frame and drop locals the map declares dead
    pub fn apply_hint(&mut self, hint: &Frame) -> Result<(), TypeError> {
        if self.stack.len() != hint.stack.len()
            || self
                .stack
                .iter()
                .zip(&hint.stack)
                .any(|(mine, declared)| mine != declared)
        {
            return type_error(format!(
                "inferred stack {:?} disagrees with the stack map's {:?}",
                self.stack, hint.stack
            ));
        }
        for (idx, (mine, declared)) in self.locals.iter_mut().zip(&hint.locals).enumerate() {
            if *declared == SlotType::Top {
                *mine = SlotType::Top;
            } else if mine != declared {
                return type_error(format!(
                    "local {} is {:?} but the stack map declares {:?}",
                    idx, mine, declared
                ));
            }
        }
        Ok(())
    }
}

/// `null`, objects, and uninitialized objects are all references
pub fn slot_type(slot: &FrameSlot) -> SlotType {
    match slot {
        VerificationType::Top => SlotType::Top,
        VerificationType::Integer => SlotType::Int,
        VerificationType::Float => SlotType::Float,
        VerificationType::Long => SlotType::Long,
        VerificationType::Double => SlotType::Double,
        VerificationType::Null
        | VerificationType::UninitializedThis
        | VerificationType::Object(_)
        | VerificationType::Uninitialized(_) => SlotType::Ref,
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn frame(max_locals: u16, max_stack: u16) -> Frame {
        Frame {
            locals: vec![SlotType::Top; max_locals as usize],
            stack: vec![],
            max_stack,
        }
    }

    #[test]
    fn stack_offsets_count_slots() {
        let mut frame = frame(0, 5);
        assert_eq!(frame.push(SlotType::Int).unwrap(), Var::stack(0, SlotType::Int));
        assert_eq!(frame.push(SlotType::Long).unwrap(), Var::stack(1, SlotType::Long));
        assert_eq!(frame.push(SlotType::Ref).unwrap(), Var::stack(3, SlotType::Ref));
        assert_eq!(frame.depth(), 4);
        assert!(frame.push(SlotType::Double).is_err());
        assert_eq!(frame.peek(1).unwrap(), Var::stack(1, SlotType::Long));
        assert_eq!(frame.pop().unwrap(), Var::stack(3, SlotType::Ref));
        assert!(frame.pop_expect(SlotType::Int).is_err());
    }

    #[test]
    fn wide_locals_clobber_neighbours() {
        let mut frame = frame(4, 0);
        frame.set_local(1, SlotType::Long).unwrap();
        assert!(frame.local(1, SlotType::Long).is_ok());
        frame.set_local(2, SlotType::Int).unwrap();
        assert!(frame.local(1, SlotType::Long).is_err());
        assert!(frame.set_local(3, SlotType::Double).is_err());
    }

    #[test]
    fn merge_forgets_disagreeing_locals() {
        let mut a = frame(2, 2);
        a.set_local(0, SlotType::Int).unwrap();
        a.set_local(1, SlotType::Ref).unwrap();
        let mut b = a.clone();
        b.set_local(0, SlotType::Float).unwrap();

        assert!(a.merge(&b).unwrap());
        assert!(a.local(0, SlotType::Int).is_err());
        assert!(a.local(1, SlotType::Ref).is_ok());
        assert!(!a.merge(&b).unwrap());

        b.push(SlotType::Int).unwrap();
        assert!(a.merge(&b).is_err());
    }
}
