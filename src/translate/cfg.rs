use crate::jvm::model::MethodCode;
use crate::jvm::InstructionNode;
use crate::util::Offset;
use std::collections::BTreeSet;

/// Basic block of a method, as a range of instructions
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct BlockInfo {
    /// Offset of the first instruction
    pub start: Offset,
    /// Offset just past the last instruction
    pub end: Offset,
    /// Indices into [`MethodCode::instructions`] (`last` is inclusive)
    pub first: usize,
    pub last: usize,
}

/// Basic block partition of a method body
///
/// Blocks start at offset 0, at every jump target, after every control transfer, and at the
/// bounds and entries of exception handler ranges. Ranges therefore always cover whole blocks.
#[derive(Clone, Debug)]
pub struct ControlFlow {
    pub blocks: Vec<BlockInfo>,
}

impl ControlFlow {
    pub fn analyze(code: &MethodCode) -> Result<ControlFlow, String> {
        let instructions = &code.instructions;
        if instructions.is_empty() {
            return Err(String::from("empty code array"));
        }

        let mut leaders = BTreeSet::new();
        leaders.insert(Offset(0));
        for (idx, (_, node)) in instructions.iter().enumerate() {
            if let InstructionNode::Branch(branch) = node {
                leaders.extend(branch.jump_targets());
                if let Some((next, _)) = instructions.get(idx + 1) {
                    leaders.insert(*next);
                }
            }
        }
        for handler in &code.handlers {
            leaders.insert(handler.start);
            leaders.insert(handler.handler);
            if handler.end.0 < code.code_length {
                leaders.insert(handler.end);
            }
        }

        let mut blocks = vec![];
        let mut first = 0;
        for idx in 0..instructions.len() {
            let next = instructions.get(idx + 1).map(|(offset, _)| *offset);
            let ends_here = match next {
                None => true,
                Some(next) => leaders.contains(&next),
            };
            if ends_here {
                let end = next.unwrap_or(Offset(code.code_length));
                if next.is_none() {
                    if let (_, InstructionNode::Plain(instruction)) = &instructions[idx] {
                        return Err(format!(
                            "control falls off the end of the code after {:?}",
                            instruction
                        ));
                    }
                    if let (_, InstructionNode::Branch(branch)) = &instructions[idx] {
                        if branch.falls_through() {
                            return Err(String::from(
                                "conditional branch at the end of the code falls off it",
                            ));
                        }
                    }
                }
                blocks.push(BlockInfo {
                    start: instructions[first].0,
                    end,
                    first,
                    last: idx,
                });
                first = idx + 1;
            }
        }
        Ok(ControlFlow { blocks })
    }

    pub fn block_at(&self, offset: Offset) -> Option<&BlockInfo> {
        self.blocks
            .binary_search_by_key(&offset, |block| block.start)
            .ok()
            .map(|idx| &self.blocks[idx])
    }

    pub fn block_index(&self, offset: Offset) -> Option<usize> {
        self.blocks
            .binary_search_by_key(&offset, |block| block.start)
            .ok()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::jvm::model::ExceptionHandlerRange;
    use crate::jvm::{BranchInstruction, Instruction, OrdComparison, ValueKind};
    use std::collections::BTreeMap;

    fn code(instructions: Vec<(usize, InstructionNode)>) -> MethodCode {
        let code_length = instructions.last().map(|(at, _)| at + 1).unwrap_or(0);
        MethodCode {
            max_stack: 2,
            max_locals: 1,
            code_length,
            instructions: instructions
                .into_iter()
                .map(|(at, node)| (Offset(at), node))
                .collect(),
            handlers: vec![],
            frames: BTreeMap::new(),
        }
    }

    #[test]
    fn splits_on_branches_and_targets() {
        // 0: iload_0; 1: ifeq 6; 4: iconst_1; 5: ireturn; 6: iconst_0; 7: ireturn
        let code = code(vec![
            (0, InstructionNode::Plain(Instruction::Load(ValueKind::Int, 0))),
            (1, InstructionNode::Branch(BranchInstruction::If(OrdComparison::EQ, Offset(6)))),
            (4, InstructionNode::Plain(Instruction::IConst(1))),
            (5, InstructionNode::Branch(BranchInstruction::Return(Some(ValueKind::Int)))),
            (6, InstructionNode::Plain(Instruction::IConst(0))),
            (7, InstructionNode::Branch(BranchInstruction::Return(Some(ValueKind::Int)))),
        ]);
        let cfg = ControlFlow::analyze(&code).unwrap();
        let starts: Vec<usize> = cfg.blocks.iter().map(|block| block.start.0).collect();
        assert_eq!(starts, vec![0, 4, 6]);
        assert_eq!(cfg.block_at(Offset(4)).unwrap().last, 3);
        assert!(cfg.block_at(Offset(5)).is_none());
    }

    #[test]
    fn handler_bounds_start_blocks() {
        let mut code = code(vec![
            (0, InstructionNode::Plain(Instruction::Nop)),
            (1, InstructionNode::Plain(Instruction::Nop)),
            (2, InstructionNode::Plain(Instruction::Nop)),
            (3, InstructionNode::Branch(BranchInstruction::Return(None))),
            (4, InstructionNode::Branch(BranchInstruction::AThrow)),
        ]);
        code.handlers.push(ExceptionHandlerRange {
            start: Offset(1),
            end: Offset(2),
            handler: Offset(4),
            catch_type: None,
        });
        let cfg = ControlFlow::analyze(&code).unwrap();
        let starts: Vec<usize> = cfg.blocks.iter().map(|block| block.start.0).collect();
        assert_eq!(starts, vec![0, 1, 2, 4]);
    }

    #[test]
    fn falling_off_the_end_is_rejected() {
        let code = code(vec![(0, InstructionNode::Plain(Instruction::Nop))]);
        assert!(ControlFlow::analyze(&code).is_err());
    }
}
