// SPDX-FileCopyrightText: 2024 Rot127 <unisono@quyllur.org>
// SPDX-License-Identifier: LGPL-3.0-only

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use lifted_il::{
        Address, BasicBlock, CallTarget, CallingConvention, FunctionCfg, Insn, Op, Operand,
        Program, RetType, Signature, Terminator,
    };

    use crate::components::{partition, Component};

    const A: Address = 0x1000;
    const B: Address = 0x1100;
    const C: Address = 0x2000;
    const D: Address = 0x2100;
    const E: Address = 0x3000;
    const F: Address = 0x4000;
    const G: Address = 0x4100;
    const PUTS: Address = 0x9000;

    fn caller(entry: Address, callees: &[Address]) -> FunctionCfg {
        let insns = callees
            .iter()
            .enumerate()
            .map(|(n, to)| {
                Insn::new(
                    entry + 4 * n as u64,
                    Op::Call {
                        target: CallTarget::Direct(*to),
                        args: Vec::new(),
                        dst: None,
                    },
                )
            })
            .collect();
        let mut f = FunctionCfg::new(entry, &format!("fcn_{:x}", entry), 0);
        f.add_block(BasicBlock::new(
            entry,
            insns,
            Terminator::Return(Some(Operand::imm(0, 64))),
        ));
        f
    }

    /// A -> B, C -> D, E -> E, F <-> G. A and C both call puts.
    fn get_program() -> Program {
        let mut program = Program::new(CallingConvention::sysv_amd64());
        program.add_external(PUTS, Signature::new("puts", vec![], RetType::Scalar));
        program.add_function(caller(A, &[B, PUTS]));
        program.add_function(caller(B, &[]));
        program.add_function(caller(C, &[D, PUTS]));
        program.add_function(caller(D, &[]));
        program.add_function(caller(E, &[E]));
        program.add_function(caller(F, &[G]));
        program.add_function(caller(G, &[F]));
        program
    }

    #[test]
    fn test_partition_roots() {
        let program = get_program();
        let components = partition(&program, &[]);
        assert_eq!(
            components,
            vec![
                Component {
                    functions: BTreeSet::from([A, B]),
                    roots: vec![A],
                },
                Component {
                    functions: BTreeSet::from([C, D]),
                    roots: vec![C],
                },
                Component {
                    functions: BTreeSet::from([E]),
                    roots: vec![E],
                },
                Component {
                    functions: BTreeSet::from([F, G]),
                    roots: vec![F],
                },
            ]
        );
    }

    #[test]
    fn test_partition_entries() {
        let program = get_program();
        let components = partition(&program, &[G, D, B, G]);
        assert_eq!(components.len(), 3);
        assert_eq!(components[0].roots, vec![B]);
        assert_eq!(components[1].roots, vec![D]);
        assert_eq!(components[2].functions, BTreeSet::from([F, G]));
        assert_eq!(components[2].roots, vec![G]);

        let components = partition(&program, &[A, B]);
        assert_eq!(components.len(), 1);
        assert_eq!(components[0].roots, vec![A, B]);
    }

    #[test]
    fn test_partition_empty() {
        let program = Program::new(CallingConvention::sysv_amd64());
        assert!(partition(&program, &[]).is_empty());
    }
}
