//! Property tests for the compatibility resolvers and the editor.
//!
//! Uses proptest to verify:
//! 1. Operators are drawn from both sides' allowances; crossing only for
//!    same-dimension, non-constant pairs
//! 2. Single-output indicators always carry their one output
//! 3. Resolvers are idempotent (no hidden state)
//! 4. Assembled payloads re-normalize to the same dimensions

use condlab_core::compat::{resolve_operators, resolve_right_constraints};
use condlab_core::condition::ConditionBuilder;
use condlab_core::dictionary::{sample_dictionary, Dictionary};
use condlab_core::domain::{IndicatorOperand, Operand, OperandType, OperatorCode, FALLBACK_OPERATORS};
use condlab_core::editor::{conform_operand, default_indicator, EditorAction};
use condlab_core::normalize::{normalize_side, NormalizedSide, SideDimension};
use proptest::prelude::*;
use std::collections::BTreeMap;

// ── Strategies (proptest) ────────────────────────────────────────────

fn dims(dict: &Dictionary) -> Vec<String> {
    dict.dimensions.iter().map(|d| d.id.clone()).collect()
}

fn arb_dimension() -> impl Strategy<Value = String> {
    prop::sample::select(dims(&sample_dictionary()))
}

fn arb_side() -> impl Strategy<Value = NormalizedSide> {
    prop_oneof![
        arb_dimension().prop_map(|d| NormalizedSide {
            operand_type: OperandType::Indicator,
            dimension: SideDimension::Dimension(d),
            value: None,
        }),
        arb_dimension().prop_map(|d| NormalizedSide {
            operand_type: OperandType::Price,
            dimension: SideDimension::Dimension(d),
            value: None,
        }),
        Just(NormalizedSide {
            operand_type: OperandType::Const,
            dimension: SideDimension::Const,
            value: Some(1.0),
        }),
    ]
}

fn arb_indicator_code() -> impl Strategy<Value = String> {
    let codes: Vec<String> = sample_dictionary()
        .indicators
        .iter()
        .map(|i| i.code.clone())
        .collect();
    prop::sample::select(codes)
}

fn arb_operator() -> impl Strategy<Value = OperatorCode> {
    prop::sample::select(OperatorCode::ALL.to_vec())
}

// ── 1. Operator subset + crossing rule ───────────────────────────────

proptest! {
    #[test]
    fn operators_respect_both_sides(l in arb_dimension(), r in arb_dimension()) {
        let dict = sample_dictionary();
        let left = NormalizedSide {
            operand_type: OperandType::Indicator,
            dimension: SideDimension::Dimension(l.clone()),
            value: None,
        };
        let right = NormalizedSide {
            operand_type: OperandType::Indicator,
            dimension: SideDimension::Dimension(r.clone()),
            value: None,
        };
        let ops = resolve_operators(&dict, &left, &right);
        let left_ops = &dict.allowed_operators(&l).unwrap().operators;
        let right_ops = &dict.allowed_operators(&r).unwrap().operators;
        let expected: Vec<OperatorCode> = left_ops
            .iter()
            .filter(|op| right_ops.contains(op))
            .filter(|op| l == r || !op.is_crossing())
            .copied()
            .collect();

        if expected.is_empty() {
            prop_assert_eq!(&ops, &FALLBACK_OPERATORS.to_vec());
        } else {
            prop_assert_eq!(&ops, &expected);
        }
        for op in &ops {
            if op.is_crossing() {
                prop_assert_eq!(&l, &r);
            }
        }
    }

    #[test]
    fn const_side_never_crosses(side in arb_side()) {
        let dict = sample_dictionary();
        let konst = NormalizedSide {
            operand_type: OperandType::Const,
            dimension: SideDimension::Const,
            value: Some(0.0),
        };
        for ops in [
            resolve_operators(&dict, &side, &konst),
            resolve_operators(&dict, &konst, &side),
        ] {
            prop_assert!(!ops.is_empty());
            prop_assert!(ops.iter().all(|op| !op.is_crossing()));
        }
    }
}

// ── 2. Fixed outputs ─────────────────────────────────────────────────

proptest! {
    #[test]
    fn single_output_is_always_assigned(code in arb_indicator_code(), output in "[a-z]{0,8}") {
        let dict = sample_dictionary();
        let def = dict.indicator(&code).unwrap();
        let operand = conform_operand(&dict, &Operand::Indicator(IndicatorOperand {
            code: code.clone(),
            output,
            params: BTreeMap::new(),
            transforms: BTreeMap::new(),
        }));
        let ind = operand.as_indicator().unwrap();
        if def.has_fixed_output() {
            prop_assert_eq!(&ind.output, &def.outputs[0].name);
        } else {
            prop_assert!(def.output(&ind.output).is_some());
        }
    }
}

// ── 3. Idempotence ───────────────────────────────────────────────────

proptest! {
    #[test]
    fn resolvers_are_idempotent(l in arb_side(), r in arb_side()) {
        let dict = sample_dictionary();
        let before = dict.clone();
        prop_assert_eq!(
            resolve_right_constraints(&dict, &l.dimension),
            resolve_right_constraints(&dict, &l.dimension)
        );
        prop_assert_eq!(
            resolve_operators(&dict, &l, &r),
            resolve_operators(&dict, &l, &r)
        );
        prop_assert_eq!(dict, before);
    }
}

// ── 4. Round trip through the payload ────────────────────────────────

proptest! {
    #[test]
    fn payload_round_trip_preserves_dimensions(
        left_code in arb_indicator_code(),
        right_code in arb_indicator_code(),
        operator in arb_operator(),
        value in -1000.0..1000.0_f64,
        use_const in any::<bool>(),
    ) {
        let dict = sample_dictionary();
        let left = Operand::Indicator(default_indicator(dict.indicator(&left_code).unwrap()));
        let right = if use_const {
            Operand::constant(value)
        } else {
            Operand::Indicator(default_indicator(dict.indicator(&right_code).unwrap()))
        };
        let mut builder = ConditionBuilder::with_operands(&dict, left, operator, right);
        if builder.right().operand_type() == OperandType::Const {
            builder.edit_right(EditorAction::SetConstant(Some(value))).unwrap();
        }

        let condition = builder.condition().unwrap();
        prop_assert!(builder.allowed_operators().contains(&condition.operator));
        prop_assert_eq!(condition.is_absolute, builder.right().operand_type() == OperandType::Const);

        let left_again = conform_operand(&dict, &Operand::from(&condition.left_operand));
        let right_again = conform_operand(&dict, &Operand::from(&condition.right_operand));
        prop_assert_eq!(normalize_side(&dict, &left_again).dimension, builder.left_side().dimension);
        prop_assert_eq!(normalize_side(&dict, &right_again).dimension, builder.right_side().dimension);
    }
}
