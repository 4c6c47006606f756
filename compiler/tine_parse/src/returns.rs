//! Return synthesis.
//!
//! Every path through a parsed body must end in a `return`. A trailing
//! `if`/`else` gets the check applied to each branch; anything else gets
//! a value-less `return;` appended, which is an error in a function that
//! returns a value.

use tine_diagnostic::{CompileError, ErrorCode};
use tine_ir::{Ast, Block, CodeLocation, NodeId, NodeKind, ReturnTarget, TypeInfo};

pub(crate) fn synthesize(
    ast: &mut Ast,
    body: NodeId,
    ret: TypeInfo,
    inline: bool,
    loc: CodeLocation,
) -> Result<(), CompileError> {
    let target = if inline {
        ReturnTarget::Inline
    } else {
        ReturnTarget::Function
    };
    let mut ctx = Synthesizer { ast, ret, target, loc };
    ctx.ensure(body)
}

struct Synthesizer<'a> {
    ast: &'a mut Ast,
    ret: TypeInfo,
    target: ReturnTarget,
    loc: CodeLocation,
}

impl Synthesizer<'_> {
    /// Make every path through `node` end in a return.
    fn ensure(&mut self, node: NodeId) -> Result<(), CompileError> {
        match self.ast.kind(node) {
            NodeKind::Return { .. } => Ok(()),
            // Statements after a return are rejected later as dead code.
            NodeKind::Block(block)
                if block
                    .stmts
                    .iter()
                    .any(|s| matches!(self.ast.kind(*s), NodeKind::Return { .. })) =>
            {
                Ok(())
            }
            NodeKind::Block(block) => match block.stmts.last().copied() {
                Some(last) if self.ends_in_return(last) => self.ensure(last),
                _ => self.append_return(node),
            },
            NodeKind::If {
                then_branch,
                else_branch: Some(else_branch),
                ..
            } => {
                let (then_branch, else_branch) = (*then_branch, *else_branch);
                let then_branch = self.as_block(node, then_branch, true);
                let else_branch = self.as_block(node, else_branch, false);
                self.ensure(then_branch)?;
                self.ensure(else_branch)
            }
            _ => Err(self.missing(self.ast.loc(node))),
        }
    }

    /// Whether `node` can be completed in place (instead of appending a
    /// return after it).
    fn ends_in_return(&self, node: NodeId) -> bool {
        match self.ast.kind(node) {
            NodeKind::Return { .. } => true,
            NodeKind::If { else_branch, .. } => else_branch.is_some(),
            NodeKind::Block(block) => block
                .stmts
                .last()
                .is_some_and(|last| self.ends_in_return(*last)),
            _ => false,
        }
    }

    /// Wrap a branch that is a single statement into a block so a return
    /// can be appended to it.
    fn as_block(&mut self, if_node: NodeId, branch: NodeId, then: bool) -> NodeId {
        if matches!(
            self.ast.kind(branch),
            NodeKind::Block(_) | NodeKind::Return { .. }
        ) {
            return branch;
        }
        let loc = self.ast.loc(branch);
        let block = self.ast.push(
            NodeKind::Block(Block {
                stmts: vec![branch],
                scope: None,
            }),
            loc,
        );
        if let NodeKind::If {
            then_branch,
            else_branch,
            ..
        } = self.ast.kind_mut(if_node)
        {
            if then {
                *then_branch = block;
            } else {
                *else_branch = Some(block);
            }
        }
        block
    }

    fn append_return(&mut self, block: NodeId) -> Result<(), CompileError> {
        let loc = match self.ast.kind(block) {
            NodeKind::Block(b) => b.stmts.last().map_or(self.loc, |s| self.ast.loc(*s)),
            _ => self.loc,
        };
        if !self.ret.is_void() {
            return Err(self.missing(loc));
        }
        let ret = self.ast.push(
            NodeKind::Return {
                value: None,
                target: self.target,
            },
            loc,
        );
        if let NodeKind::Block(b) = self.ast.kind_mut(block) {
            b.stmts.push(ret);
        }
        Ok(())
    }

    fn missing(&self, loc: CodeLocation) -> CompileError {
        CompileError::syntax(ErrorCode::E1005, "Not all paths return a value", loc)
    }
}
